//! Compilation metrics
//!
//! Instruments are registered on the global OpenTelemetry meter. Nothing is
//! exported unless the embedding process installs a meter provider.

use std::time::Instant;

use once_cell::sync::Lazy;
use opentelemetry::global;
use opentelemetry::metrics::{Counter, Histogram, Meter};
use opentelemetry::KeyValue;

use crate::error::CompileError;

/// Global meter for vigil metrics
static METER: Lazy<Meter> = Lazy::new(|| global::meter("vigil"));

// ============================================================================
// Compilation Metrics
// ============================================================================

/// Counter of scrape jobs emitted
pub static JOBS_COMPILED: Lazy<Counter<u64>> = Lazy::new(|| {
    METER
        .u64_counter("vigil_scrape_jobs_compiled_total")
        .with_description("Total number of scrape jobs compiled")
        .with_unit("{jobs}")
        .build()
});

/// Counter of rejected resources
///
/// Labels:
/// - `kind`: selector, duration, protected_label, port, tenancy, ...
pub static COMPILE_ERRORS: Lazy<Counter<u64>> = Lazy::new(|| {
    METER
        .u64_counter("vigil_scrape_compile_errors_total")
        .with_description("Total number of resources rejected by the scrape compiler")
        .with_unit("{errors}")
        .build()
});

/// Histogram of batch compilation duration
pub static BATCH_DURATION: Lazy<Histogram<f64>> = Lazy::new(|| {
    METER
        .f64_histogram("vigil_scrape_batch_duration_seconds")
        .with_description("Duration of scrape config batch compilation in seconds")
        .with_unit("s")
        .build()
});

/// Record a rejected resource
pub fn record_error(err: &CompileError) {
    COMPILE_ERRORS.add(1, &[KeyValue::new("kind", err.kind())]);
}

/// Timer for one batch compilation
pub struct BatchTimer {
    start: Instant,
}

impl BatchTimer {
    /// Start timing a batch
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Record the batch duration and the number of jobs it produced
    pub fn complete(self, jobs: usize) {
        BATCH_DURATION.record(self.start.elapsed().as_secs_f64(), &[]);
        JOBS_COMPILED.add(jobs as u64, &[]);
    }
}
