//! Object-store boundary: URIs, the client trait and its implementations

pub mod b2;
pub mod client;
pub mod errors;
#[cfg(test)]
pub mod memory;
pub mod uri;

pub use client::{Listing, Metadata, ObjectStoreClient, ObjectSummary, DELIMITER};
pub use errors::StoreError;
pub use uri::ResourceUri;
