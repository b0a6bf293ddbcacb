// homeworks/src/lib.rs

//! Order, approval and sign-in backend for a multi-role home services company.

pub mod client;
pub mod config;
pub mod errors;
pub mod models;
pub mod pipelines;
pub mod services;
pub mod state;
pub mod store;
pub mod telemetry;
pub mod web;
