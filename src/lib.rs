//! Upload/fetch file proxy with a local disk tier and an S3 fallback tier.

pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
