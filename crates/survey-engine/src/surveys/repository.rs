use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::answers::AnswerRecord;
use super::schema::{QuestionId, RatingBand, ResponseId, SurveyDefinition};
use super::scoring::ScoringResult;

/// Review state an administrator moves a response through.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResponseStatus {
    #[default]
    Pending,
    Shortlisted,
    Selected,
    Rejected,
    Contacted,
}

impl ResponseStatus {
    pub const ALL: [ResponseStatus; 5] = [
        ResponseStatus::Pending,
        ResponseStatus::Shortlisted,
        ResponseStatus::Selected,
        ResponseStatus::Rejected,
        ResponseStatus::Contacted,
    ];

    /// Wire name, as serialized (`PENDING`).
    pub const fn code(self) -> &'static str {
        match self {
            ResponseStatus::Pending => "PENDING",
            ResponseStatus::Shortlisted => "SHORTLISTED",
            ResponseStatus::Selected => "SELECTED",
            ResponseStatus::Rejected => "REJECTED",
            ResponseStatus::Contacted => "CONTACTED",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            ResponseStatus::Pending => "pending",
            ResponseStatus::Shortlisted => "shortlisted",
            ResponseStatus::Selected => "selected",
            ResponseStatus::Rejected => "rejected",
            ResponseStatus::Contacted => "contacted",
        }
    }
}

/// Stored response: immutable answers and score plus the admin-editable review fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseRecord {
    pub id: ResponseId,
    pub survey_id: String,
    pub answers: Vec<AnswerRecord>,
    pub score: ScoringResult,
    pub status: ResponseStatus,
    pub admin_notes: Option<String>,
    /// Submitting address as reported by the edge proxy.
    pub source: String,
    pub created_at: DateTime<Utc>,
}

impl ResponseRecord {
    pub fn answer(&self, question_id: &QuestionId) -> Option<&AnswerRecord> {
        self.answers
            .iter()
            .find(|answer| &answer.question_id == question_id)
    }

    pub fn rating<'b>(&self, bands: &'b [RatingBand]) -> Option<&'b RatingBand> {
        RatingBand::classify(self.score.score_percentage, bands)
    }

    pub fn status_view(&self, survey: &SurveyDefinition) -> ResponseStatusView {
        ResponseStatusView {
            response_id: self.id.clone(),
            survey_slug: survey.slug.clone(),
            status: self.status.label(),
            total_score: self.score.total_score,
            score_percentage: self.score.score_percentage,
            rating: self
                .rating(&survey.rating_bands)
                .map(|band| band.label.clone()),
            score_breakdown: self.score.score_breakdown.clone(),
            admin_notes: self.admin_notes.clone(),
        }
    }
}

/// Read model returned to reviewers.
#[derive(Debug, Clone, Serialize)]
pub struct ResponseStatusView {
    pub response_id: ResponseId,
    pub survey_slug: String,
    pub status: &'static str,
    pub total_score: f64,
    pub score_percentage: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<String>,
    pub score_breakdown: BTreeMap<String, f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_notes: Option<String>,
}

/// Read-only access to published survey definitions.
pub trait SurveyCatalog: Send + Sync {
    fn by_slug(&self, slug: &str) -> Result<Option<SurveyDefinition>, RepositoryError>;
    fn by_id(&self, id: &str) -> Result<Option<SurveyDefinition>, RepositoryError>;
}

/// Answer that must stay unique across the responses to one survey.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey {
    pub question_id: QuestionId,
    pub value: String,
}

impl DedupKey {
    pub fn new(question_id: QuestionId, value: impl Into<String>) -> Self {
        Self {
            question_id,
            value: value.into(),
        }
    }

    /// Whether `record`, a response to `survey_id`, already holds this answer.
    pub fn is_held_by(&self, survey_id: &str, record: &ResponseRecord) -> bool {
        record.survey_id == survey_id
            && record
                .answer(&self.question_id)
                .and_then(|answer| answer.text())
                .is_some_and(|text| text == self.value)
    }
}

/// Storage abstraction for responses so the service can be exercised in isolation.
pub trait ResponseRepository: Send + Sync {
    fn insert(&self, record: ResponseRecord) -> Result<ResponseRecord, RepositoryError>;
    /// Insert unless another response to the same survey already holds `key`.
    ///
    /// The lookup and the write must be one atomic step (a single lock or a unique
    /// constraint); a held key fails with [`RepositoryError::DuplicateKey`].
    fn insert_unique(
        &self,
        record: ResponseRecord,
        key: &DedupKey,
    ) -> Result<ResponseRecord, RepositoryError>;
    fn update(&self, record: ResponseRecord) -> Result<(), RepositoryError>;
    /// Apply `change` to the stored record and persist it without an interleaving write.
    fn modify(
        &self,
        id: &ResponseId,
        change: &mut dyn FnMut(&mut ResponseRecord),
    ) -> Result<ResponseRecord, RepositoryError>;
    fn fetch(&self, id: &ResponseId) -> Result<Option<ResponseRecord>, RepositoryError>;
    fn list_for_survey(&self, survey_id: &str) -> Result<Vec<ResponseRecord>, RepositoryError>;
}

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("dedup value already taken")]
    DuplicateKey,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
