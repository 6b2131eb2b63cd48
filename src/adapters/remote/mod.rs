//! Remote track store integration

pub mod client;

pub use client::RemoteStoreClient;
