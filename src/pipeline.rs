//! Pipeline orchestration
//!
//! This module provides the ingestion entry point for Emoflux. Classifier
//! output from either source is turned into an `Observation`, appended to the
//! event store, and then used to kick off a background suggestion fetch.
//!
//! Pipeline stages:
//! 1. TextClassifier / facial-expression reading - label and confidence
//! 2. IngestionCoordinator - id, timestamp, observation assembly
//! 3. EventStore - append with eviction
//! 4. SuggestionService - fire-and-forget advice fetch
//! 5. AggregationEngine - statistics on demand

use chrono::{DateTime, FixedOffset, Local};
use std::collections::HashMap;
use std::sync::Arc;

use crate::aggregate::{AggregationEngine, ObservationFilter};
use crate::classifier::TextClassifier;
use crate::error::FluxError;
use crate::expression::dominant_expression;
use crate::persistence::PersistenceBackend;
use crate::store::EventStore;
use crate::suggestion::{PendingSuggestion, SuggestionRequest, SuggestionService};
use crate::types::{ClassificationResult, Emotion, Observation, Source, Statistics};

/// Source of "now" for timestamps and "today"
pub type Clock = Box<dyn Fn() -> DateTime<FixedOffset> + Send + Sync>;

/// Current local time with its UTC offset
pub fn local_now() -> DateTime<FixedOffset> {
    Local::now().fixed_offset()
}

/// Stateful coordinator owning the event store for one user session
pub struct IngestionCoordinator<B: PersistenceBackend> {
    store: EventStore<B>,
    suggestions: Option<Arc<dyn SuggestionService>>,
    pending: Option<PendingSuggestion>,
    clock: Clock,
}

impl<B: PersistenceBackend> IngestionCoordinator<B> {
    /// Create a coordinator without a suggestion service
    pub fn new(store: EventStore<B>) -> Self {
        Self {
            store,
            suggestions: None,
            pending: None,
            clock: Box::new(local_now),
        }
    }

    /// Fetch suggestions from `service` after each successful ingest
    pub fn with_suggestions(mut self, service: Arc<dyn SuggestionService>) -> Self {
        self.suggestions = Some(service);
        self
    }

    /// Replace the clock used for timestamps and "today"
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn store(&self) -> &EventStore<B> {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut EventStore<B> {
        &mut self.store
    }

    pub fn now(&self) -> DateTime<FixedOffset> {
        (self.clock)()
    }

    /// Record one classifier result and return the stored observation
    ///
    /// Persistence errors are returned. The suggestion fetch only starts after
    /// the append succeeded, and its outcome never affects the stored entry.
    pub fn ingest(
        &mut self,
        emotion: Emotion,
        confidence: f64,
        source: Source,
    ) -> Result<Observation, FluxError> {
        let observation = Observation::new(emotion, confidence, source, self.now());
        self.store.append(observation.clone())?;

        log::info!(
            "recorded observation {}: {} at {:.0}% from {}",
            observation.id,
            observation.emotion,
            observation.confidence,
            observation.source
        );

        if let Some(service) = &self.suggestions {
            self.pending = Some(PendingSuggestion::spawn(
                Arc::clone(service),
                SuggestionRequest::for_emotion(emotion),
            ));
        }

        Ok(observation)
    }

    /// Classify `text` and record the dominant label
    ///
    /// Blank text is rejected without touching the store.
    pub fn analyze_text(
        &mut self,
        text: &str,
    ) -> Result<(ClassificationResult, Observation), FluxError> {
        if text.trim().is_empty() {
            return Err(FluxError::EmptyInput);
        }

        let result = TextClassifier::classify(text);
        let observation = self.ingest(result.emotion, result.confidence as f64, Source::Text)?;
        Ok((result, observation))
    }

    /// Record the dominant facial expression; `Ok(None)` when no face was seen
    pub fn ingest_expressions(
        &mut self,
        probabilities: &HashMap<String, f64>,
    ) -> Result<Option<Observation>, FluxError> {
        match dominant_expression(probabilities) {
            Some((emotion, confidence)) => self.ingest(emotion, confidence, Source::Camera).map(Some),
            None => {
                log::info!("no recognizable facial expression in reading");
                Ok(None)
            }
        }
    }

    /// Hand over the suggestion fetch started by the latest ingest
    pub fn take_suggestion(&mut self) -> Option<PendingSuggestion> {
        self.pending.take()
    }

    /// Statistics over the whole log, relative to the coordinator's clock
    pub fn statistics(&self) -> Statistics {
        AggregationEngine::compute(&self.store.all(), self.now())
    }

    /// Statistics over the subset of the log matching `filter`
    pub fn filtered_statistics(&self, filter: &ObservationFilter) -> Statistics {
        let subset = filter.apply(&self.store.all());
        AggregationEngine::compute(&subset, self.now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PersistenceError;
    use crate::persistence::MemoryBackend;
    use crate::suggestion::FALLBACK_SUGGESTION;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn fixed_clock() -> Clock {
        Box::new(|| {
            FixedOffset::east_opt(2 * 3600)
                .unwrap()
                .with_ymd_and_hms(2024, 6, 3, 10, 15, 0)
                .unwrap()
        })
    }

    fn coordinator() -> IngestionCoordinator<MemoryBackend> {
        IngestionCoordinator::new(EventStore::default()).with_clock(fixed_clock())
    }

    struct CountingService {
        calls: AtomicUsize,
    }

    impl SuggestionService for CountingService {
        fn suggest(&self, request: &SuggestionRequest) -> Result<String, FluxError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(format!("advice for {}", request.emotion))
        }
    }

    struct DownService;

    impl SuggestionService for DownService {
        fn suggest(&self, _request: &SuggestionRequest) -> Result<String, FluxError> {
            Err(FluxError::SuggestionRequest("connection refused".to_string()))
        }
    }

    #[test]
    fn test_ingest_assigns_id_and_timestamp() {
        let mut coordinator = coordinator();
        let observation = coordinator.ingest(Emotion::Happy, 87.0, Source::Camera).unwrap();

        assert!(!observation.id.is_empty());
        assert_eq!(observation.timestamp, coordinator.now());
        assert_eq!(observation.source, Source::Camera);
        assert_eq!(coordinator.store().all(), vec![observation]);
    }

    #[test]
    fn test_ids_are_unique() {
        let mut coordinator = coordinator();
        let a = coordinator.ingest(Emotion::Sad, 50.0, Source::Text).unwrap();
        let b = coordinator.ingest(Emotion::Sad, 50.0, Source::Text).unwrap();
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_three_ingests_today() {
        let mut coordinator = coordinator();
        coordinator.ingest(Emotion::Happy, 80.0, Source::Text).unwrap();
        coordinator.ingest(Emotion::Happy, 75.0, Source::Camera).unwrap();
        coordinator.ingest(Emotion::Sad, 62.0, Source::Text).unwrap();

        let stats = coordinator.statistics();
        assert_eq!(stats.today_detections, 3);
        assert_eq!(stats.dominant_emotion, Emotion::Happy);
        assert_eq!(stats.emotion_distribution[Emotion::Happy].count, 2);
        assert_eq!(stats.hourly_activity[10], 3);
    }

    #[test]
    fn test_clear_then_statistics_are_empty() {
        let mut coordinator = coordinator();
        coordinator.ingest(Emotion::Angry, 70.0, Source::Text).unwrap();
        coordinator.store_mut().clear().unwrap();

        assert!(coordinator.store().all().is_empty());
        assert_eq!(coordinator.statistics(), Statistics::empty());
    }

    #[test]
    fn test_analyze_text_records_text_observation() {
        let mut coordinator = coordinator();
        let (result, observation) = coordinator
            .analyze_text("I'm quite worried about the presentation tomorrow.")
            .unwrap();

        assert_eq!(result.emotion, Emotion::Fearful);
        assert_eq!(observation.emotion, Emotion::Fearful);
        assert_eq!(observation.confidence, result.confidence as f64);
        assert_eq!(observation.source, Source::Text);
    }

    #[test]
    fn test_analyze_blank_text_is_rejected() {
        let mut coordinator = coordinator();
        assert!(matches!(coordinator.analyze_text("  "), Err(FluxError::EmptyInput)));
        assert!(coordinator.store().is_empty());
    }

    #[test]
    fn test_ingest_expressions() {
        let mut coordinator = coordinator();
        let readings: HashMap<String, f64> =
            [("surprised".to_string(), 0.91), ("happy".to_string(), 0.05)].into_iter().collect();

        let observation = coordinator.ingest_expressions(&readings).unwrap().unwrap();
        assert_eq!(observation.emotion, Emotion::Surprised);
        assert_eq!(observation.confidence, 91.0);
        assert_eq!(observation.source, Source::Camera);

        assert_eq!(coordinator.ingest_expressions(&HashMap::new()).unwrap(), None);
        assert_eq!(coordinator.store().len(), 1);
    }

    #[test]
    fn test_suggestion_fetched_after_ingest() {
        let service = Arc::new(CountingService {
            calls: AtomicUsize::new(0),
        });
        let mut coordinator = coordinator().with_suggestions(service.clone());

        coordinator.ingest(Emotion::Stressed, 70.0, Source::Text).unwrap();
        let pending = coordinator.take_suggestion().unwrap();

        assert_eq!(pending.emotion(), Emotion::Stressed);
        assert_eq!(pending.wait(Duration::from_secs(5)), "advice for stressed");
        assert_eq!(service.calls.load(Ordering::SeqCst), 1);
        assert!(coordinator.take_suggestion().is_none());
    }

    #[test]
    fn test_suggestion_failure_keeps_observation() {
        let mut coordinator = coordinator().with_suggestions(Arc::new(DownService));

        let observation = coordinator.ingest(Emotion::Sad, 40.0, Source::Camera).unwrap();
        let pending = coordinator.take_suggestion().unwrap();

        assert_eq!(pending.wait(Duration::from_secs(5)), FALLBACK_SUGGESTION);
        assert_eq!(coordinator.store().all(), vec![observation]);
    }

    #[test]
    fn test_write_failure_skips_suggestion() {
        let service = Arc::new(CountingService {
            calls: AtomicUsize::new(0),
        });
        let store = EventStore::new(MemoryBackend::with_quota(16));
        let mut coordinator = IngestionCoordinator::new(store)
            .with_clock(fixed_clock())
            .with_suggestions(service.clone());

        let err = coordinator.ingest(Emotion::Happy, 90.0, Source::Text).unwrap_err();
        assert!(matches!(
            err,
            FluxError::Persistence(PersistenceError::QuotaExceeded { .. })
        ));
        assert!(coordinator.take_suggestion().is_none());
        assert_eq!(service.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_filtered_statistics() {
        let mut coordinator = coordinator();
        coordinator.ingest(Emotion::Happy, 80.0, Source::Text).unwrap();
        coordinator.ingest(Emotion::Sad, 60.0, Source::Camera).unwrap();
        coordinator.ingest(Emotion::Sad, 40.0, Source::Camera).unwrap();

        let filter = ObservationFilter {
            source: Some(Source::Camera),
            ..Default::default()
        };
        let stats = coordinator.filtered_statistics(&filter);

        assert_eq!(stats.total_detections, 2);
        assert_eq!(stats.dominant_emotion, Emotion::Sad);
        assert_eq!(stats.average_confidence, 50);
    }
}
