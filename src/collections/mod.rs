//! Collection lifecycle service.
//!
//! This module provides:
//! - `service` - create/read/delete collections with pre-write checks on
//!   schemas and attached function sources
//! - `errors` - the collection failure taxonomy

pub mod errors;
pub mod service;

pub use errors::{CollectionError, FunctionCheckError};
pub use service::{check_function, CollectionService};
