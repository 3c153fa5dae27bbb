//! Emoflux - emotion event pipeline
//!
//! Emoflux turns classifier output into a persisted, bounded event log and
//! derives statistics from it: text or facial-expression reading →
//! observation → event store → aggregate statistics, with an optional
//! background fetch of advice for the detected emotion.
//!
//! ## Modules
//!
//! - **Classification**: keyword-based text classifier and facial-expression reading
//! - **Storage**: bounded, newest-first event log over a pluggable persistence backend
//! - **Aggregation**: totals, distribution, hourly and weekly activity
//! - **Ingestion**: coordinator wiring the stages together

pub mod aggregate;
pub mod classifier;
pub mod config;
pub mod display;
pub mod error;
pub mod expression;
pub mod persistence;
pub mod pipeline;
pub mod store;
pub mod suggestion;
pub mod types;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use aggregate::{AggregationEngine, ObservationFilter};
pub use classifier::TextClassifier;
pub use config::FluxConfig;
pub use error::{FluxError, PersistenceError};
pub use persistence::{FileBackend, MemoryBackend, PersistenceBackend};
pub use pipeline::IngestionCoordinator;
pub use store::EventStore;
pub use suggestion::{HttpSuggestionService, PendingSuggestion, SuggestionService};
pub use types::{ClassificationResult, Emotion, EmotionMap, Observation, Source, Statistics};

/// Emoflux library version
pub const EMOFLUX_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name reported by the CLI
pub const PRODUCER_NAME: &str = "emoflux";
