//! manga-rs: A self-hosted manga and doujinshi library server.
//!
//! The library is a folder of numbered directories, each holding a
//! `meta.json` record and page images named `1.jpg`, `2.png`, ... This
//! crate scans that folder into an in-memory catalog and serves it over a
//! small JSON API.
//!
//! # Features
//!
//! - Catalog built by validating every numbered directory
//! - Atomic catalog swaps on rescan, with the old catalog kept on failure
//! - Page images served whatever their extension on disk
//! - ZIP and PDF downloads of an entry
//! - Search by id, page count, tag and title
//! - Optional periodic rescans

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Configuration and CLI.
pub mod config;
/// Error types.
pub mod error;
/// ZIP and PDF export.
pub mod export;
/// Catalog building and storage.
pub mod library;
/// HTTP server.
pub mod server;


pub use config::{Cli, Command, Config};
pub use error::{AppError, Result};
pub use library::CatalogStore;
pub use server::AppState;
