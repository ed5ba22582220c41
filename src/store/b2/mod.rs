//! Backblaze B2 object-store client

pub mod client;
pub mod types;

pub use client::B2Client;
