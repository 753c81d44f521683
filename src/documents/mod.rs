//! Document lifecycle service.
//!
//! This module provides:
//! - `service` - create/update/delete/summarize documents against their
//!   collection's latest schema
//! - `errors` - the document mutation failure taxonomy

pub mod errors;
pub mod service;

pub use errors::DocumentError;
pub use service::DocumentService;
