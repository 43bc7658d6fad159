use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;

use crate::surveys::answers::AnswerValue;
use crate::surveys::repository::{ResponseRecord, ResponseStatus};
use crate::surveys::schema::{Question, QuestionId, QuestionType, RatingBand, SurveyDefinition};
use crate::surveys::scoring::round_half_up;

const TIMELINE_DAYS: i64 = 30;
const UNLABELED_CHOICE: &str = "-";

/// Aggregate view over every response to one survey.
#[derive(Debug, Clone, Serialize)]
pub struct SurveyStats {
    pub survey_title: String,
    pub max_score: f64,
    pub total: usize,
    pub avg_score: f64,
    pub selected: usize,
    pub pending: usize,
    pub by_status: BTreeMap<&'static str, usize>,
    pub rating_counts: Vec<RatingCount>,
    pub questions: Vec<QuestionStats>,
    /// Responses per day over the trailing window.
    pub timeline: BTreeMap<NaiveDate, usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RatingCount {
    pub label: String,
    pub min: i32,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuestionStats {
    pub id: QuestionId,
    pub field_key: String,
    pub label: String,
    pub question_type: QuestionType,
    pub total_answers: usize,
    pub detail: QuestionDetail,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QuestionDetail {
    /// Answers per option label.
    Distribution { counts: BTreeMap<String, usize> },
    /// How often each value was picked.
    Frequency { counts: BTreeMap<String, usize> },
    Numeric { avg: f64, min: f64, max: f64 },
    Text { avg_length: f64 },
    Untracked,
}

pub fn compile(
    survey: &SurveyDefinition,
    responses: &[ResponseRecord],
    now: DateTime<Utc>,
) -> SurveyStats {
    let total = responses.len();
    let avg_score = if total > 0 {
        let sum: f64 = responses.iter().map(|r| r.score.total_score).sum();
        round_half_up(sum / total as f64)
    } else {
        0.0
    };

    let mut by_status = BTreeMap::new();
    for response in responses {
        *by_status.entry(response.status.label()).or_insert(0) += 1;
    }

    let count_status = |status: ResponseStatus| by_status.get(status.label()).copied().unwrap_or(0);
    let selected = count_status(ResponseStatus::Selected);
    let pending = count_status(ResponseStatus::Pending);

    let questions = survey
        .questions()
        .map(|question| question_stats(question, responses))
        .collect();

    let since = now - Duration::days(TIMELINE_DAYS);
    let mut timeline = BTreeMap::new();
    for response in responses.iter().filter(|r| r.created_at >= since) {
        *timeline.entry(response.created_at.date_naive()).or_insert(0) += 1;
    }

    SurveyStats {
        survey_title: survey.title.clone(),
        max_score: survey.max_score,
        total,
        avg_score,
        selected,
        pending,
        by_status,
        rating_counts: rating_counts(&survey.rating_bands, responses),
        questions,
        timeline,
    }
}

fn rating_counts(bands: &[RatingBand], responses: &[ResponseRecord]) -> Vec<RatingCount> {
    let mut counts: Vec<RatingCount> = bands
        .iter()
        .map(|band| RatingCount {
            label: band.label.clone(),
            min: band.min,
            count: 0,
        })
        .collect();

    for response in responses {
        let percentage = response.score.score_percentage;
        if let Some(slot) = counts.iter_mut().find(|slot| percentage >= slot.min) {
            slot.count += 1;
        }
    }

    counts
}

fn question_stats(question: &Question, responses: &[ResponseRecord]) -> QuestionStats {
    let answers: Vec<&AnswerValue> = responses
        .iter()
        .filter_map(|response| response.answer(&question.id))
        .map(|answer| &answer.value)
        .collect();

    let detail = match question.question_type {
        QuestionType::Radio | QuestionType::Boolean => choice_distribution(question, &answers),
        QuestionType::Checkbox | QuestionType::ChipSelect => {
            let mut counts = BTreeMap::new();
            for value in &answers {
                if let AnswerValue::Selection(items) = value {
                    for item in items {
                        *counts.entry(item.clone()).or_insert(0) += 1;
                    }
                }
            }
            QuestionDetail::Frequency { counts }
        }
        QuestionType::Number => {
            let numbers: Vec<f64> = answers
                .iter()
                .filter_map(|value| match value {
                    AnswerValue::Number(number) => *number,
                    _ => None,
                })
                .collect();
            if numbers.is_empty() {
                QuestionDetail::Numeric {
                    avg: 0.0,
                    min: 0.0,
                    max: 0.0,
                }
            } else {
                QuestionDetail::Numeric {
                    avg: round_half_up(numbers.iter().sum::<f64>() / numbers.len() as f64),
                    min: numbers.iter().copied().fold(f64::INFINITY, f64::min),
                    max: numbers.iter().copied().fold(f64::NEG_INFINITY, f64::max),
                }
            }
        }
        QuestionType::Text | QuestionType::Textarea => {
            let lengths: Vec<usize> = answers
                .iter()
                .filter_map(|value| match value {
                    AnswerValue::Text(text) => Some(text.chars().count()),
                    _ => None,
                })
                .filter(|length| *length > 0)
                .collect();
            let avg_length = if lengths.is_empty() {
                0.0
            } else {
                round_half_up(lengths.iter().sum::<usize>() as f64 / lengths.len() as f64)
            };
            QuestionDetail::Text { avg_length }
        }
        QuestionType::Consent => QuestionDetail::Untracked,
    };

    QuestionStats {
        id: question.id.clone(),
        field_key: question.field_key.clone(),
        label: question.label.clone(),
        question_type: question.question_type,
        total_answers: answers.len(),
        detail,
    }
}

fn choice_distribution(question: &Question, answers: &[&AnswerValue]) -> QuestionDetail {
    let mut counts: BTreeMap<String, usize> = question
        .options
        .iter()
        .map(|option| (option.label.clone(), 0))
        .collect();

    for value in answers {
        let label = match value {
            AnswerValue::Choice {
                option_id: Some(id),
                ..
            }
            | AnswerValue::Boolean {
                option_id: Some(id),
                ..
            } => question.option(id).map(|option| option.label.clone()),
            _ => None,
        }
        .or_else(|| match value {
            AnswerValue::Choice { value, .. } if !value.is_empty() => Some(value.clone()),
            _ => None,
        })
        .unwrap_or_else(|| UNLABELED_CHOICE.to_string());

        *counts.entry(label).or_insert(0) += 1;
    }

    QuestionDetail::Distribution { counts }
}
