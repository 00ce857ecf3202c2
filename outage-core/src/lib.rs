//! Core library for the `outage-checker` CLI.
//!
//! This crate defines:
//! - The saved default address (config store)
//! - The client for the outage provider
//! - Shared domain models (addresses, schedules, outage windows)
//! - The error taxonomy and its exit codes
//!
//! It is used by `outage-cli`, but can also be reused by other binaries or services.

pub mod config;
pub mod error;
pub mod model;
pub mod provider;

pub use config::{ConfigStore, UserConfig};
pub use error::{Error, Result};
pub use model::{Address, City, DaySchedule, House, HourStatus, OutageWindow, PowerStatus, Street};
pub use provider::{OutageProvider, ProviderOptions, provider_from_options};
