//! Async Rust client library for the deployment director REST API.
//!
//! Translates typed calls into director HTTP requests, decodes the JSON
//! answers into domain types, and follows long-running operations that the
//! director runs as background tasks until they finish.
//!
//! # Modules
//!
//! - [`config`] — Connection and polling settings, loadable from TOML.
//! - [`error`] — Typed error hierarchy (`DirectorError`) with context layers.
//! - [`time_parser`] — Parsing of the director's timestamp formats.
//! - [`request`] — Synchronous request primitives (`SyncOp`, `ClientRequest`).
//! - [`task`] — Background-task submission and polling (`AsyncOp`, `TaskClientRequest`).
//! - [`client`] — `Client`, the composition of the two executors.
//! - [`orphaned_vms`], [`resurrection`], [`cleanup`], [`resources`],
//!   [`certificates`] — Domain operations and their types.
//! - [`director`] — The `Director` façade and its context-scoped derivation.
//!
//! # Quick Start
//!
//! ```ignore
//! use director_client::{Director, DirectorConfig, DirectorImpl};
//!
//! let config = DirectorConfig::from_file("director.toml")?;
//! let director = DirectorImpl::from_config(&config)?.with_context("req-42");
//! let preview = director.clean_up(true, true).await?;
//! println!("{} releases would be removed", preview.releases.len());
//! ```

#![warn(missing_docs)]

pub mod certificates;
pub mod cleanup;
pub mod client;
pub mod config;
pub mod director;
pub mod error;
pub mod orphaned_vms;
pub mod request;
pub mod resources;
pub mod resurrection;
pub mod task;
pub mod time_parser;

pub use certificates::CertificateExpiryInfo;
pub use cleanup::CleanUp;
pub use client::Client;
pub use config::DirectorConfig;
pub use director::{Director, DirectorImpl};
pub use error::{DirectorError, ErrorKind, Result};
pub use orphaned_vms::OrphanedVm;
pub use request::{ClientRequest, RawResponse, SyncOp};
pub use task::{AsyncOp, PollConfig, TaskClientRequest};
pub use time_parser::TimeParser;
