// homeworks/src/services/mod.rs

//! Domain services and clients for the external integrations.

pub mod auth_service;
pub mod geocode;
pub mod impersonation;
pub mod moderation;
pub mod notifier;
pub mod optimistic;
pub mod otp_service;
pub mod payment_gateway;
pub mod phone;
pub mod policy;
pub mod push;
pub mod routing;
pub mod sms;
pub mod tokens;
