use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{info, warn};

use super::backfill::{import_legacy, LegacySubmission};
use super::intake::{IntakeViolation, SubmissionGuard};
use super::listing::{self, ResponsePage, ResponseQuery};
use super::report::{self, ExportError, SurveyStats};
use super::repository::{
    DedupKey, RepositoryError, ResponseRecord, ResponseRepository, ResponseStatus,
    ResponseStatusView, SurveyCatalog,
};
use super::schema::{ResponseId, SurveyDefinition};
use super::scoring::ScoringEngine;
use super::throttle::{SubmissionThrottle, ThrottleError};

/// Service composing the survey catalog, intake guard, scoring engine and response storage.
pub struct SurveyResponseService<C, R, T> {
    guard: SubmissionGuard,
    engine: ScoringEngine,
    catalog: Arc<C>,
    repository: Arc<R>,
    throttle: Arc<T>,
}

static RESPONSE_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_response_id() -> ResponseId {
    let id = RESPONSE_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    ResponseId(format!("resp-{id:06}"))
}

/// Admin edit of the review fields; answers and scores stay untouched.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ReviewUpdate {
    #[serde(default)]
    pub status: Option<ResponseStatus>,
    #[serde(default, alias = "adminNotes")]
    pub admin_notes: Option<String>,
}

impl<C, R, T> SurveyResponseService<C, R, T>
where
    C: SurveyCatalog + 'static,
    R: ResponseRepository + 'static,
    T: SubmissionThrottle + 'static,
{
    pub fn new(catalog: Arc<C>, repository: Arc<R>, throttle: Arc<T>) -> Self {
        Self {
            guard: SubmissionGuard::new(),
            engine: ScoringEngine::new(),
            catalog,
            repository,
            throttle,
        }
    }

    /// Submit raw answers for the survey published under `slug`.
    pub fn submit(
        &self,
        slug: &str,
        source: &str,
        answers: &Map<String, Value>,
    ) -> Result<ResponseRecord, ResponseServiceError> {
        self.submit_at(slug, source, answers, Utc::now())
    }

    pub fn submit_at(
        &self,
        slug: &str,
        source: &str,
        answers: &Map<String, Value>,
        now: DateTime<Utc>,
    ) -> Result<ResponseRecord, ResponseServiceError> {
        self.throttle.try_acquire(source, now)?;

        match self.store_submission(slug, source, answers, now) {
            Ok(stored) => Ok(stored),
            Err(error) => {
                if let Err(release_error) = self.throttle.release(source, now) {
                    warn!(%source, error = %release_error, "throttle window not released");
                }
                Err(error)
            }
        }
    }

    fn store_submission(
        &self,
        slug: &str,
        source: &str,
        answers: &Map<String, Value>,
        now: DateTime<Utc>,
    ) -> Result<ResponseRecord, ResponseServiceError> {
        let survey = self.survey(slug)?;
        if !survey.is_accepting_responses() {
            return Err(IntakeViolation::SurveyClosed(survey.slug.clone()).into());
        }

        let dedup = self.dedup_key(&survey, answers);
        let records = self.guard.prepare(&survey, answers)?;
        let score = self.engine.score_survey(&survey, &records);

        let record = ResponseRecord {
            id: next_response_id(),
            survey_id: survey.id.clone(),
            answers: records,
            score,
            status: ResponseStatus::Pending,
            admin_notes: None,
            source: source.to_string(),
            created_at: now,
        };

        let stored = match &dedup {
            Some((field_key, key)) => match self.repository.insert_unique(record, key) {
                Err(RepositoryError::DuplicateKey) => {
                    warn!(survey = %survey.slug, field_key = %field_key, "duplicate submission rejected");
                    return Err(ResponseServiceError::Duplicate {
                        field_key: field_key.clone(),
                    });
                }
                other => other?,
            },
            None => self.repository.insert(record)?,
        };

        info!(
            response_id = %stored.id,
            survey = %survey.slug,
            total_score = stored.score.total_score,
            score_percentage = stored.score.score_percentage,
            "survey response scored"
        );
        Ok(stored)
    }

    fn dedup_key(
        &self,
        survey: &SurveyDefinition,
        answers: &Map<String, Value>,
    ) -> Option<(String, DedupKey)> {
        let value = self.guard.dedup_value(survey, answers)?;
        let question = survey.question_by_field_key(survey.dedup_field_key.as_deref()?)?;
        Some((
            question.field_key.clone(),
            DedupKey::new(question.id.clone(), value),
        ))
    }

    pub fn get(&self, response_id: &ResponseId) -> Result<ResponseRecord, ResponseServiceError> {
        let record = self
            .repository
            .fetch(response_id)?
            .ok_or(RepositoryError::NotFound)?;
        Ok(record)
    }

    /// Reviewer view of a stored response, labelled with the survey's rating bands.
    pub fn status_view(
        &self,
        response_id: &ResponseId,
    ) -> Result<ResponseStatusView, ResponseServiceError> {
        let record = self.get(response_id)?;
        let survey = self.survey_by_id(&record.survey_id)?;
        Ok(record.status_view(&survey))
    }

    pub fn review(
        &self,
        response_id: &ResponseId,
        update: ReviewUpdate,
    ) -> Result<ResponseRecord, ResponseServiceError> {
        let ReviewUpdate {
            status,
            admin_notes,
        } = update;
        let record = self.repository.modify(response_id, &mut |record| {
            if let Some(status) = status {
                record.status = status;
            }
            if let Some(notes) = &admin_notes {
                record.admin_notes = Some(notes.clone());
            }
        })?;

        info!(response_id = %record.id, status = record.status.label(), "response reviewed");
        Ok(record)
    }

    /// Recompute a stored response against the survey's current rules and persist the result.
    ///
    /// Only the score is rewritten, so a review landing concurrently keeps its status and notes.
    pub fn rescore(&self, response_id: &ResponseId) -> Result<ResponseRecord, ResponseServiceError> {
        let survey_id = self.get(response_id)?.survey_id;
        let survey = self.survey_by_id(&survey_id)?;

        let mut previous = None;
        let record = self.repository.modify(response_id, &mut |record| {
            let score = self.engine.score_survey(&survey, &record.answers);
            if score != record.score {
                previous = Some(record.score.total_score);
            }
            record.score = score;
        })?;

        if let Some(previous) = previous {
            info!(
                response_id = %record.id,
                previous,
                current = record.score.total_score,
                "response rescored"
            );
        }
        Ok(record)
    }

    pub fn import_legacy(
        &self,
        slug: &str,
        legacy: LegacySubmission,
    ) -> Result<ResponseRecord, ResponseServiceError> {
        let survey = self.survey(slug)?;
        let record = import_legacy(&survey, legacy, next_response_id());
        let stored = self.repository.insert(record)?;
        Ok(stored)
    }

    /// Filtered, ranked page of a survey's responses for reviewers.
    pub fn list(
        &self,
        slug: &str,
        query: &ResponseQuery,
    ) -> Result<ResponsePage, ResponseServiceError> {
        let survey = self.survey(slug)?;
        let responses = self.repository.list_for_survey(&survey.id)?;
        Ok(listing::select(responses, query))
    }

    pub fn stats(&self, slug: &str, now: DateTime<Utc>) -> Result<SurveyStats, ResponseServiceError> {
        let survey = self.survey(slug)?;
        let responses = self.repository.list_for_survey(&survey.id)?;
        Ok(report::compile(&survey, &responses, now))
    }

    pub fn export_csv(&self, slug: &str) -> Result<String, ResponseServiceError> {
        let survey = self.survey(slug)?;
        let responses = self.repository.list_for_survey(&survey.id)?;
        Ok(report::export_csv(&survey, &responses)?)
    }

    fn survey(&self, slug: &str) -> Result<SurveyDefinition, ResponseServiceError> {
        self.catalog
            .by_slug(slug)?
            .ok_or_else(|| ResponseServiceError::SurveyNotFound(slug.to_string()))
    }

    fn survey_by_id(&self, id: &str) -> Result<SurveyDefinition, ResponseServiceError> {
        self.catalog
            .by_id(id)?
            .ok_or_else(|| ResponseServiceError::SurveyNotFound(id.to_string()))
    }
}

/// Error raised by the response service.
#[derive(Debug, thiserror::Error)]
pub enum ResponseServiceError {
    #[error("survey '{0}' not found")]
    SurveyNotFound(String),
    #[error(transparent)]
    Intake(#[from] IntakeViolation),
    #[error("a response with this {field_key} already exists")]
    Duplicate { field_key: String },
    #[error(transparent)]
    Throttled(#[from] ThrottleError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Export(#[from] ExportError),
}
