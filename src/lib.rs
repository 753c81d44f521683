//! morphdb - A typed, versioned document store with sandboxed schema migrations
//!
//! Users define collections with recursive, self-describing schemas, store
//! documents validated against them, and evolve a schema while every existing
//! document is re-computed through a sandboxed migration function.

pub mod collections;
pub mod documents;
pub mod files;
pub mod migration;
pub mod sandbox;
pub mod schema;
pub mod store;
