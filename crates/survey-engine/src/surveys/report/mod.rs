//! Reviewer-facing reporting over stored responses.

mod export;
mod stats;

pub use export::{export_csv, ExportError};
pub use stats::{compile, QuestionDetail, QuestionStats, RatingCount, SurveyStats};
