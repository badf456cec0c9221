//! Citation validation across sampled places.
//!
//! Sampled places wait in a [`BoundedPool`] until a slot frees up, then end
//! as `Valid`, `HasErrors` or `Skipped`. Their error records are handed over a bounded channel to
//! a single writer stage that persists them in batches. A place whose
//! citations or documents cannot be loaded is skipped, not fatal.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::adapters::{CorpusLoader, ErrorStore, ReferenceLookup};
use crate::checks;
use crate::domain::{timestamp_now, Citation, Document, ErrorRecord};

use super::pool::{BoundedPool, ProgressHook};
use super::writer::{drain, BatchWriter, WriteError, WriteStats, DEFAULT_LOCK_TIMEOUT};

/// Run-level validation failures
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error(transparent)]
    Write(#[from] WriteError),

    #[error("Error writer stopped unexpectedly: {0}")]
    WriterStopped(String),
}

/// Tunables for one validation run
#[derive(Debug, Clone)]
pub struct ValidatorConfig {
    /// Places validated concurrently
    pub max_concurrency: usize,
    /// Records per insert transaction
    pub insert_batch_size: usize,
    /// Wait for the error store lock before failing the run
    pub lock_timeout: Duration,
    /// Require the citation year to appear in a source document
    pub check_document_year: bool,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 8,
            insert_batch_size: 100,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            check_document_year: true,
        }
    }
}

/// Final state of a validated place
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaceState {
    Valid,
    HasErrors,
    Skipped,
}

/// Result of validating one place
#[derive(Debug, Clone)]
pub struct PlaceReport {
    pub place_id: i64,
    pub state: PlaceState,
    pub citations_checked: usize,
    pub records: Vec<ErrorRecord>,
    pub skip_reason: Option<String>,
}

impl PlaceReport {
    fn checked(place_id: i64, citations_checked: usize, records: Vec<ErrorRecord>) -> Self {
        let state = if records.is_empty() {
            PlaceState::Valid
        } else {
            PlaceState::HasErrors
        };
        Self {
            place_id,
            state,
            citations_checked,
            records,
            skip_reason: None,
        }
    }

    fn skipped(place_id: i64, reason: String) -> Self {
        Self {
            place_id,
            state: PlaceState::Skipped,
            citations_checked: 0,
            records: Vec::new(),
            skip_reason: Some(reason),
        }
    }
}

/// Summary of a validation run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationOutcome {
    pub run_id: Uuid,
    pub places_total: usize,
    pub places_valid: usize,
    pub places_with_errors: usize,
    pub places_skipped: usize,
    pub citations_checked: usize,
    pub records_produced: usize,
    /// Error rows committed to the store
    pub records_persisted: usize,
    /// Error rows lost to failed transactions
    pub records_dropped: usize,
    pub batches_failed: usize,
    pub duration_ms: u64,
}

impl ValidationOutcome {
    /// Places whose citations were loaded and checked
    pub fn places_checked(&self) -> usize {
        self.places_valid + self.places_with_errors
    }

    fn new(run_id: Uuid, places_total: usize) -> Self {
        Self {
            run_id,
            places_total,
            places_valid: 0,
            places_with_errors: 0,
            places_skipped: 0,
            citations_checked: 0,
            records_produced: 0,
            records_persisted: 0,
            records_dropped: 0,
            batches_failed: 0,
            duration_ms: 0,
        }
    }

    fn tally(&mut self, report: &PlaceReport) {
        match report.state {
            PlaceState::Valid => self.places_valid += 1,
            PlaceState::HasErrors => self.places_with_errors += 1,
            PlaceState::Skipped => self.places_skipped += 1,
        }
        self.citations_checked += report.citations_checked;
        self.records_produced += report.records.len();
    }

    fn apply(&mut self, stats: WriteStats) {
        self.records_persisted = stats.records_persisted;
        self.records_dropped = stats.records_dropped;
        self.batches_failed = stats.batches_failed;
    }
}

/// Validates sampled places and persists their error records
pub struct CitationValidator {
    reference: Arc<dyn ReferenceLookup>,
    corpus: Arc<dyn CorpusLoader>,
    writer: BatchWriter,
    config: ValidatorConfig,
    progress: Option<ProgressHook>,
}

impl CitationValidator {
    pub fn new(
        reference: Arc<dyn ReferenceLookup>,
        corpus: Arc<dyn CorpusLoader>,
        writer: BatchWriter,
        config: ValidatorConfig,
    ) -> Self {
        Self {
            reference,
            corpus,
            writer,
            config,
            progress: None,
        }
    }

    /// Report per-place progress
    pub fn with_progress(mut self, hook: ProgressHook) -> Self {
        self.progress = Some(hook);
        self
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    /// Validate every place and persist the resulting error records.
    ///
    /// Individual bad citations or missing place data never fail the run; a
    /// store lock timeout or a dead writer does.
    #[instrument(skip(self, place_ids), fields(places = place_ids.len()))]
    pub async fn validate(&self, place_ids: Vec<i64>) -> Result<ValidationOutcome, ValidationError> {
        let started = Instant::now();
        let run_id = Uuid::new_v4();
        let mut outcome = ValidationOutcome::new(run_id, place_ids.len());
        info!(%run_id, max_concurrency = self.config.max_concurrency, "Starting validation run");

        let batch_size = self.config.insert_batch_size.max(1);
        let (tx, rx) = mpsc::channel::<ErrorRecord>(batch_size * 2);
        let writer = self.writer.clone();
        let writer_task = tokio::spawn(async move { drain(rx, &writer, batch_size).await });

        let mut pool = BoundedPool::new(self.config.max_concurrency);
        if let Some(hook) = &self.progress {
            pool = pool.with_progress(hook.clone());
        }

        let reference = self.reference.clone();
        let corpus = self.corpus.clone();
        let check_document_year = self.config.check_document_year;
        let mut reports = pool.run(place_ids, move |place_id| {
            let reference = reference.clone();
            let corpus = corpus.clone();
            async move { validate_place(place_id, reference, corpus, check_document_year).await }
        });

        'places: while let Some((place_id, report)) = reports.recv().await {
            debug!(place_id, state = ?report.state, records = report.records.len(), "Place finished");
            outcome.tally(&report);

            for record in report.records {
                if tx.send(record).await.is_err() {
                    error!(place_id, "Error writer stopped; abandoning remaining places");
                    break 'places;
                }
            }
        }

        // Closing the channel is the writer's done-signal
        drop(tx);
        drop(reports);

        let stats = writer_task
            .await
            .map_err(|e| ValidationError::WriterStopped(e.to_string()))??;
        outcome.apply(stats);
        outcome.duration_ms = started.elapsed().as_millis() as u64;

        info!(
            %run_id,
            valid = outcome.places_valid,
            with_errors = outcome.places_with_errors,
            skipped = outcome.places_skipped,
            citations = outcome.citations_checked,
            persisted = outcome.records_persisted,
            dropped = outcome.records_dropped,
            duration_ms = outcome.duration_ms,
            "Validation run completed"
        );

        Ok(outcome)
    }
}

/// Load and check one place
async fn validate_place(
    place_id: i64,
    reference: Arc<dyn ReferenceLookup>,
    corpus: Arc<dyn CorpusLoader>,
    check_document_year: bool,
) -> PlaceReport {
    debug!(place_id, "Validating place");

    let citations = match corpus.load_citations(place_id).await {
        Ok(citations) => citations,
        Err(e) => {
            warn!(place_id, error = %e, "Skipping place: citations unavailable");
            return PlaceReport::skipped(place_id, e.to_string());
        }
    };

    let documents = match corpus.load_documents(place_id).await {
        Ok(documents) => documents,
        Err(e) => {
            warn!(place_id, error = %e, "Skipping place: documents unavailable");
            return PlaceReport::skipped(place_id, e.to_string());
        }
    };

    let citations_checked = citations.len();
    let created_at = timestamp_now();
    let checked = tokio::task::spawn_blocking(move || {
        check_place(
            place_id,
            &citations,
            &documents,
            reference.as_ref(),
            check_document_year,
            &created_at,
        )
    })
    .await;

    match checked {
        Ok(records) => PlaceReport::checked(place_id, citations_checked, records),
        Err(e) => {
            error!(place_id, error = %e, "Checker task failed");
            PlaceReport::skipped(place_id, e.to_string())
        }
    }
}

/// Run all checkers over a place's citations, keeping only failures
pub fn check_place(
    place_id: i64,
    citations: &[Citation],
    documents: &[Document],
    reference: &dyn ReferenceLookup,
    check_document_year: bool,
    created_at: &str,
) -> Vec<ErrorRecord> {
    citations
        .iter()
        .filter_map(|citation| {
            let results = checks::run_all(citation, documents, reference, check_document_year);
            ErrorRecord::from_results(
                citation.content_id.as_str(),
                citation.place_id.unwrap_or(place_id),
                results,
                created_at,
            )
        })
        .collect()
}

/// Validate `place_ids` with default lock timeout and document-year checking.
///
/// Returns the run outcome; `records_persisted` is the number of error rows
/// committed.
pub async fn validate(
    place_ids: Vec<i64>,
    reference: Arc<dyn ReferenceLookup>,
    corpus: Arc<dyn CorpusLoader>,
    error_store: ErrorStore,
    max_concurrency: usize,
    insert_batch_size: usize,
) -> Result<ValidationOutcome, ValidationError> {
    let config = ValidatorConfig {
        max_concurrency,
        insert_batch_size,
        ..Default::default()
    };
    let writer = BatchWriter::new(error_store, config.lock_timeout);
    CitationValidator::new(reference, corpus, writer, config)
        .validate(place_ids)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MemoryReference;
    use crate::domain::DateOrYear;

    fn citation(id: &str, state: &str) -> Citation {
        Citation::new(id, "Garland, Ark., Municipal Code, §14-75 (2007)")
            .with_place(101)
            .with_state(state)
            .with_code_type("Municipal Code")
            .with_date(DateOrYear::Year(2007))
    }

    #[test]
    fn test_check_place_keeps_only_failures() {
        let reference = MemoryReference::new().with_place(101, "Ark.", "C3");
        let documents = vec![Document::new(101, "§ 14-75 ... 2007")];
        let citations = vec![citation("ok", "Ark."), citation("bad", "Tex.")];

        let records = check_place(101, &citations, &documents, &reference, true, "t");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].citation_content_id, "bad");
        assert_eq!(records[0].severity, 5);
    }

    #[test]
    fn test_record_uses_validated_place_when_citation_has_none() {
        let reference = MemoryReference::new().with_place(101, "Ark.", "C3");
        let mut orphan = citation("orphan", "Ark.");
        orphan.place_id = None;

        let records = check_place(101, &[orphan], &[], &reference, true, "t");
        assert_eq!(records[0].place_id, 101);
        assert!(records[0].geography_error.is_some());
    }

    #[test]
    fn test_outcome_tally() {
        let mut outcome = ValidationOutcome::new(Uuid::new_v4(), 3);
        outcome.tally(&PlaceReport::checked(1, 4, Vec::new()));
        outcome.tally(&PlaceReport::skipped(2, "missing".to_string()));
        assert_eq!(outcome.places_valid, 1);
        assert_eq!(outcome.places_skipped, 1);
        assert_eq!(outcome.citations_checked, 4);
        assert_eq!(outcome.places_checked(), 1);
    }
}
