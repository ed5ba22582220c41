//! Remote directory listings served over HTTP

pub mod client;

pub use client::{HttpListingClient, ListingClient, RemoteEntry};
