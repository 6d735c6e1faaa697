// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod aggregate;
pub mod cache;
pub mod clock;
pub mod compliance;
pub mod config;
pub mod context;
pub mod error;
pub mod extract;
pub mod format;
pub mod metrics;
pub mod model;
pub mod orchestrator;
pub mod providers;

// ---- Re-exports for stable public API ----
pub use crate::aggregate::{AggregatedData, DataAggregator, FetchTask, MergePolicy};
pub use crate::cache::{SharedCache, TtlCache};
pub use crate::clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use crate::config::EnricherConfig;
pub use crate::context::{EnrichmentContext, EnrichmentContextBuilder};
pub use crate::error::{ComplianceError, FetchError, FormatError, PipelineError};
pub use crate::extract::{ClaimExtractor, ExtractorBackend};
pub use crate::model::{
    Category, Claim, ClaimForm, ClaimType, DataPoint, EnrichmentMetrics, EnrichmentRequest,
    EnrichmentResponse,
};
pub use crate::orchestrator::Enricher;
pub use crate::providers::{DataProvider, ProviderRegistry, StaticProvider};
