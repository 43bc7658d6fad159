//! Configurable surveys: definitions, answer intake, scoring, and reviewer reporting.
//!
//! A survey is authored as JSON (pages of questions, each optionally carrying a scoring rule
//! and a visibility condition). Submissions are validated by the [`SubmissionGuard`], scored
//! by the stateless [`ScoringEngine`], and stored through the [`ResponseRepository`] port.

pub mod answers;
pub mod backfill;
pub mod intake;
pub mod listing;
pub mod report;
pub mod repository;
pub mod router;
pub mod schema;
pub mod scoring;
pub mod service;
pub mod throttle;
pub mod visibility;

#[cfg(test)]
mod tests;

pub use answers::{normalize, AnswerRecord, AnswerValue};
pub use backfill::{import_legacy, LegacySubmission};
pub use intake::{IntakeViolation, SubmissionGuard};
pub use listing::{ResponsePage, ResponseQuery, ResponseSort};
pub use report::{ExportError, QuestionDetail, QuestionStats, RatingCount, SurveyStats};
pub use repository::{
    DedupKey, RepositoryError, ResponseRecord, ResponseRepository, ResponseStatus,
    ResponseStatusView, SurveyCatalog,
};
pub use router::survey_router;
pub use schema::{
    OptionId, PointMismatch, Question, QuestionId, QuestionOption, QuestionType, RatingBand,
    ResponseId, SchemaError, ScoringRule, ShowIf, SurveyDefinition, SurveyPage, SurveyStatus,
    Tier,
};
pub use scoring::{resolve_tier, score_answer, ScoringEngine, ScoringResult};
pub use service::{ResponseServiceError, ReviewUpdate, SurveyResponseService};
pub use throttle::{
    InMemorySubmissionThrottle, SubmissionThrottle, ThrottleError, Unthrottled,
    DEFAULT_SUBMISSION_WINDOW_SECS,
};
pub use visibility::is_active;
