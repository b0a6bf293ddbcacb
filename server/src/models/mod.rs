// homeworks/src/models/mod.rs

pub mod approval;
pub mod audit;
pub mod daily_report;
pub mod module;
pub mod notification;
pub mod order;
pub mod otp;
pub mod payment;
pub mod report_lock;
pub mod role;
pub mod session;
pub mod user;
pub mod whitelist;
