//! Storage/recording API collaborator.
//!
//! Credential exchange, region discovery, object search and the bulk export
//! endpoints, all over HTTPS with bearer-token auth.

mod api;
mod client;
mod locator;
mod models;

#[cfg(test)]
pub(crate) mod mock;

pub use api::StorageApi;
pub use client::StorageClient;
pub use locator::ObjectLocator;
pub use models::{AccessToken, ExportJob, ExportStatus, ObjectFilter, ObjectPage, RemoteObject};
