//! Checks applied to assembled jobs

use std::collections::BTreeMap;

use vigil_common::promconfig::{load_scrape_config, ScrapeConfig};

use crate::error::{CompileError, ResourceError};

/// Serialize a job and decode it again with the collector's decoder
///
/// Returns the decoded job, which carries the collector's defaults.
pub fn round_trip(job: &ScrapeConfig) -> Result<ScrapeConfig, CompileError> {
    let yaml = job.to_yaml().map_err(CompileError::RoundTrip)?;
    load_scrape_config(&yaml).map_err(CompileError::RoundTrip)
}

/// Job names accepted so far in a batch, with their batch positions
#[derive(Debug, Default)]
pub struct JobNames {
    seen: BTreeMap<String, usize>,
    next: usize,
}

impl JobNames {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a resource's jobs, or report the first one whose name is taken
    ///
    /// Nothing is registered when any job collides, so a rejected resource
    /// leaves no names behind.
    pub fn register(&mut self, resource: &str, jobs: &[ScrapeConfig]) -> Result<(), ResourceError> {
        let mut local: BTreeMap<&str, usize> = BTreeMap::new();
        for (index, job) in jobs.iter().enumerate() {
            let position = self.next + index;
            let name = job.job_name.as_str();
            if let Some(first) = self.seen.get(name).or_else(|| local.get(name)).copied() {
                return Err(ResourceError::new(
                    resource,
                    Some(index),
                    CompileError::DuplicateJobName {
                        job: name.to_string(),
                        first,
                        second: position,
                    },
                ));
            }
            local.insert(name, position);
        }
        self.next += jobs.len();
        self.seen
            .extend(local.into_iter().map(|(name, position)| (name.to_string(), position)));
        Ok(())
    }

    /// Number of registered jobs
    pub fn len(&self) -> usize {
        self.next
    }

    /// Check if no jobs were registered
    pub fn is_empty(&self) -> bool {
        self.next == 0
    }
}
