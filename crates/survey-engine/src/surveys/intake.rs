use serde_json::{Map, Value};

use super::answers::{coerce_string, is_blank, is_truthy, normalize, AnswerRecord};
use super::schema::SurveyDefinition;
use super::visibility::is_active;

/// Validation errors raised before a submission is scored.
#[derive(Debug, thiserror::Error)]
pub enum IntakeViolation {
    #[error("survey '{0}' is not accepting responses")]
    SurveyClosed(String),
    #[error("field \"{label}\" is required")]
    MissingRequired { field_key: String, label: String },
}

/// Guard turning a raw `fieldKey -> value` submission into typed answer records.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubmissionGuard;

impl SubmissionGuard {
    pub fn new() -> Self {
        Self
    }

    /// Validate required fields and normalize every active question's answer.
    ///
    /// Questions hidden by their visibility condition are neither required nor recorded, so
    /// they reach the scoring engine as unanswered.
    pub fn prepare(
        &self,
        survey: &SurveyDefinition,
        answers: &Map<String, Value>,
    ) -> Result<Vec<AnswerRecord>, IntakeViolation> {
        if !survey.is_accepting_responses() {
            return Err(IntakeViolation::SurveyClosed(survey.slug.clone()));
        }

        for question in survey.questions().filter(|question| question.required) {
            if !is_active(question, answers) {
                continue;
            }
            if is_blank(answers.get(&question.field_key)) {
                let label = if question.label.is_empty() {
                    question.field_key.clone()
                } else {
                    question.label.clone()
                };
                return Err(IntakeViolation::MissingRequired {
                    field_key: question.field_key.clone(),
                    label,
                });
            }
        }

        Ok(survey
            .questions()
            .filter(|question| is_active(question, answers))
            .map(|question| normalize(question, answers.get(&question.field_key)))
            .collect())
    }

    /// Value of the survey's dedup field when the submission carries a truthy one.
    pub fn dedup_value(
        &self,
        survey: &SurveyDefinition,
        answers: &Map<String, Value>,
    ) -> Option<String> {
        let field_key = survey.dedup_field_key.as_deref()?;
        survey.question_by_field_key(field_key)?;
        answers
            .get(field_key)
            .filter(|value| is_truthy(value))
            .map(coerce_string)
    }
}
