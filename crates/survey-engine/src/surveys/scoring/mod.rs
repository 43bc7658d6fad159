mod rules;
mod tiers;

pub use rules::score_answer;
pub use tiers::resolve_tier;

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::answers::AnswerRecord;
use super::schema::{Question, QuestionId, SurveyDefinition};

/// Stateless engine folding per-question points into a survey score.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScoringEngine;

impl ScoringEngine {
    pub fn new() -> Self {
        Self
    }

    /// Score the answers against every question of the survey, in page order.
    pub fn score_survey(&self, survey: &SurveyDefinition, answers: &[AnswerRecord]) -> ScoringResult {
        let questions: Vec<&Question> = survey.questions().collect();
        self.aggregate(questions, answers, survey.max_score)
    }

    pub fn aggregate<'q, I>(
        &self,
        questions: I,
        answers: &[AnswerRecord],
        declared_max_score: f64,
    ) -> ScoringResult
    where
        I: IntoIterator<Item = &'q Question>,
    {
        let by_question: HashMap<&QuestionId, &AnswerRecord> = answers
            .iter()
            .map(|answer| (&answer.question_id, answer))
            .collect();

        let mut answer_points = BTreeMap::new();
        let mut score_breakdown: BTreeMap<String, f64> = BTreeMap::new();
        let mut total_score = 0.0;

        for question in questions {
            let points = score_answer(question, by_question.get(&question.id).copied());
            answer_points.insert(question.id.clone(), points);
            total_score += points;

            if let Some(category) = &question.scoring_category {
                *score_breakdown.entry(category.clone()).or_insert(0.0) += points;
            }
        }

        let score_percentage = percentage(total_score, declared_max_score);
        debug!(
            total_score,
            score_percentage,
            categories = score_breakdown.len(),
            "aggregated survey score"
        );

        ScoringResult {
            total_score,
            score_percentage,
            score_breakdown,
            answer_points,
        }
    }
}

/// Engine output persisted onto the response and its answers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoringResult {
    pub total_score: f64,
    pub score_percentage: i32,
    /// Summed points per scoring category; uncategorized questions are absent.
    pub score_breakdown: BTreeMap<String, f64>,
    /// Points for every scored question, zero when unanswered.
    pub answer_points: BTreeMap<QuestionId, f64>,
}

impl ScoringResult {
    pub fn points_for(&self, question_id: &QuestionId) -> f64 {
        self.answer_points.get(question_id).copied().unwrap_or(0.0)
    }
}

/// Share of the declared maximum as a whole percent, rounding halves up.
pub fn percentage(total_score: f64, declared_max_score: f64) -> i32 {
    if declared_max_score > 0.0 {
        round_half_up(total_score / declared_max_score * 100.0) as i32
    } else {
        0
    }
}

/// Nearest integer with exact halves moving toward positive infinity (`-2.5 -> -2`).
pub fn round_half_up(value: f64) -> f64 {
    (value + 0.5).floor()
}
