//! Scrape config compilation for vigil
//!
//! This crate compiles vigil monitoring resources into the collector's scrape
//! configuration:
//!
//! - **Compiler**: assembles one scrape job per endpoint, in a fixed rule order
//! - **Policy**: keeps tenants away from the labels the platform injects
//! - **Secrets**: pools secret references under `namespace/name/key` tokens
//! - **Validation**: round-trips every job through the collector's decoder

pub mod compiler;
pub mod config;
pub mod error;
pub mod http;
pub mod label_mapping;
pub mod labels;
pub mod lineage;
pub mod metadata;
pub mod metrics;
pub mod port;
pub mod protected;
pub mod secrets;
pub mod selector;
pub mod target;
pub mod validate;

pub use compiler::{CompiledBatch, JobContext, RelabelPhase, ScrapeCompiler};
pub use config::CompilerConfig;
pub use error::{CompileError, ResourceError};
pub use metadata::MetadataLabel;
pub use secrets::{SecretKeyRef, SecretRefPool, SecretScope};
pub use target::{EndpointRef, MonitoringTarget};
