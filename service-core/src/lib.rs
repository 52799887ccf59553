//! service-core: shared infrastructure for the gateway workspace.
pub mod config;
pub mod error;
pub mod observability;
