//! # Lonify Shared Library
//!
//! This crate contains the domain model and business rules shared between
//! the Lonify API server and its integration tests.
//!
//! ## Module Organization
//!
//! - `models`: Database models (users, loan products, loan applications)
//!   and the application lifecycle state machine
//! - `auth`: JWT handling, role resolution, and the access guard
//! - `db`: Connection pool and migration utilities
//! - `payments`: Payment-processor gateway for application fees

pub mod auth;
pub mod db;
pub mod models;
pub mod payments;

/// Current version of the Lonify shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
