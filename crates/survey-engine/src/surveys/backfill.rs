//! Import of flat submissions recorded before surveys were configurable.
//!
//! Legacy rows stored one column per field plus a per-category breakdown. Per-answer points
//! are recovered by looking up each question's category in that breakdown, which is exact only
//! while every category maps to a single question.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::answers::normalize;
use super::repository::{ResponseRecord, ResponseStatus};
use super::schema::{ResponseId, SurveyDefinition};
use super::scoring::ScoringResult;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacySubmission {
    /// Flat `fieldKey -> value` columns.
    pub fields: Map<String, Value>,
    #[serde(default)]
    pub score_breakdown: BTreeMap<String, f64>,
    pub total_score: f64,
    pub score_percentage: i32,
    #[serde(default)]
    pub status: ResponseStatus,
    #[serde(default)]
    pub admin_notes: Option<String>,
    #[serde(default)]
    pub source: String,
    pub created_at: DateTime<Utc>,
}

/// Rebuild a response record, keeping the stored totals verbatim.
pub fn import_legacy(
    survey: &SurveyDefinition,
    legacy: LegacySubmission,
    id: ResponseId,
) -> ResponseRecord {
    let mut answers = Vec::new();
    let mut answer_points = BTreeMap::new();

    for question in survey.questions() {
        let Some(raw) = legacy.fields.get(&question.field_key) else {
            continue;
        };

        let points = question
            .scoring_category
            .as_ref()
            .and_then(|category| legacy.score_breakdown.get(category))
            .copied()
            .unwrap_or(0.0);

        answers.push(normalize(question, Some(raw)));
        answer_points.insert(question.id.clone(), points);
    }

    ResponseRecord {
        id,
        survey_id: survey.id.clone(),
        answers,
        score: ScoringResult {
            total_score: legacy.total_score,
            score_percentage: legacy.score_percentage,
            score_breakdown: legacy.score_breakdown,
            answer_points,
        },
        status: legacy.status,
        admin_notes: legacy.admin_notes,
        source: legacy.source,
        created_at: legacy.created_at,
    }
}
