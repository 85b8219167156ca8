//! # Clinic API Client
//!
//! Typed client for the clinic-management REST API: authenticated HTTP
//! transport, the patient/appointment list-query and pagination layer with
//! its fetch state machine, debounced search, and the appointment status
//! summary.

pub mod auth;
pub mod config;
pub mod error;
pub mod http;
pub mod lazy;
pub mod list;
pub mod models;
pub mod query;
pub mod search;
pub mod services;
pub mod summary;
pub mod telemetry;
pub mod validation;

pub use error::{ClientError, ClientResult, ErrorKind};
pub use http::HttpClient;
