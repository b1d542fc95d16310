//! Target relabeling phases
//!
//! A `RelabelPhase` appends one group of target relabeling rules for a job.
//! `ScrapeCompiler` runs its phases in a fixed order for every endpoint, so
//! the position of a group in the output is the position of its phase in the
//! list.

use std::collections::BTreeSet;

use vigil_common::promconfig::RelabelConfig;

use crate::config::CompilerConfig;
use crate::error::CompileError;
use crate::metadata::MetadataLabel;
use crate::port::PortSpec;
use crate::target::{EndpointRef, MonitoringTarget};

/// Immutable context for compiling one endpoint into one job
pub struct JobContext<'a> {
    /// Compiler-wide settings
    pub config: &'a CompilerConfig,
    /// The resource being compiled
    pub target: MonitoringTarget<'a>,
    /// Resource name
    pub name: &'a str,
    /// Resource namespace, for namespaced kinds
    pub namespace: Option<&'a str>,
    /// The endpoint being compiled
    pub endpoint: EndpointRef<'a>,
    /// Resolved port, for pod endpoints
    pub port: Option<PortSpec<'a>>,
    /// Metadata labels the resource asked for
    pub metadata: &'a BTreeSet<MetadataLabel>,
}

/// One step of target relabeling assembly
pub trait RelabelPhase: Send + Sync {
    /// Human-readable name for this phase (used in logging)
    fn name(&self) -> &str;

    /// Append this phase's rules to `rules`
    fn compile(
        &self,
        ctx: &JobContext<'_>,
        rules: &mut Vec<RelabelConfig>,
    ) -> Result<(), CompileError>;
}
