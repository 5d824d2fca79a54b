//! # tagsweep Registry
//!
//! Docker Registry HTTP API v2 client for tagsweep.
//!
//! The [`Registry`] trait is the seam the scheduler is written against;
//! [`RegistryClient`] implements it over HTTP.
//!
//! ## Features
//!
//! - **Pagination**: catalog and tag listings follow `Link: rel="next"`
//! - **Bounded concurrency**: one shared semaphore caps in-flight requests
//! - **Timeouts**: every exchange, body included, is bounded
//! - **Creation time**: from the OCI annotation or the image config blob
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tagsweep_registry::{Registry, RegistryAuth, RegistryClient, RegistryConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = RegistryConfig::new("https://registry.example.com")
//!         .with_auth(RegistryAuth::basic("robot", "secret"));
//!     let client = RegistryClient::new(config)?;
//!
//!     for tag in client.list_tags("backend").await? {
//!         let record = client.tag_metadata("backend", &tag).await?;
//!         println!("{record} {} {}", record.digest, record.created);
//!     }
//!     Ok(())
//! }
//! ```

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod client;
mod config;
mod error;
pub mod oci;
mod registry;

pub use client::RegistryClient;
pub use config::{RegistryAuth, RegistryConfig, DEFAULT_MAX_CONCURRENT_REQUESTS, DEFAULT_TIMEOUT};
pub use error::{RegistryError, Result};
pub use oci::{Manifest, MediaType};
pub use registry::Registry;
