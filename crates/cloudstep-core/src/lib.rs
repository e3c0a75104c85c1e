//! Core types and configuration for cloudstep.
//!
//! This crate defines the desired end-state of a Cloud Run deployment
//! ([`DeployOptions`]), the compact secret reference syntax
//! ([`SecretReference`]), the `cloudstep.toml` schema ([`StepConfig`]),
//! and shared error types.

pub mod config;
pub mod error;
pub mod options;
pub mod secret_ref;

pub use config::{ProjectConfig, RunConfig, StepConfig};
pub use error::{Error, Result};
pub use options::{DeployOptions, Ingress, Vpc};
pub use secret_ref::{SecretReference, parse_secret_reference};
