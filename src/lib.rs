//! polydoc - schema-driven document modeling over JSON storage
//!
//! Schemas declare typed paths, defaults, validators, and lifecycle
//! hooks; compiled models dispatch raw documents to discriminator
//! variants by their stored key, at the top level and inside embedded
//! documents and arrays.

pub mod discriminator;
pub mod document;
pub mod hooks;
pub mod model;
pub mod projection;
pub mod schema;
pub mod store;
