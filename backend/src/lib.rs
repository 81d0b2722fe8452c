//! Docvault: canonical blob paths and time-limited access URLs for document files

#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    dead_code
)]

/// Document attachments: path resolution, lazy migration and download URLs
pub mod attachments;

/// Signed and public access URLs for blobs
pub mod blob_access;

/// Container creation and uploads
pub mod blob_client;

/// Blob reference normalization
pub mod blob_ref;

/// Configuration, environment and error mapping
pub mod types;
