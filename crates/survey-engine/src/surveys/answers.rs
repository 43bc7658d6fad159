//! Typed answer records and the coercion rules that turn raw submitted JSON into them.
//!
//! Raw submissions arrive as a loose `fieldKey -> value` map. Each question type reads the
//! value through its own lens (text, number, truthiness, option match, array), mirroring how
//! browsers and form libraries hand values over, so a malformed value never aborts intake;
//! it simply normalizes to an empty slot.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::schema::{OptionId, Question, QuestionId, QuestionType};

/// Normalized value held by an answer; the variant follows the question type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerValue {
    Text(String),
    Number(Option<f64>),
    Boolean {
        value: bool,
        option_id: Option<OptionId>,
    },
    Choice {
        value: String,
        option_id: Option<OptionId>,
    },
    Selection(Vec<String>),
}

/// One respondent's answer to one question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerRecord {
    pub question_id: QuestionId,
    pub value: AnswerValue,
}

impl AnswerRecord {
    pub fn new(question_id: QuestionId, value: AnswerValue) -> Self {
        Self { question_id, value }
    }

    /// Free text, including the raw value of a single-choice answer.
    pub fn text(&self) -> Option<&str> {
        match &self.value {
            AnswerValue::Text(text) | AnswerValue::Choice { value: text, .. } => Some(text),
            _ => None,
        }
    }

    pub fn number(&self) -> Option<f64> {
        match &self.value {
            AnswerValue::Number(number) => *number,
            _ => None,
        }
    }

    pub fn boolean(&self) -> Option<bool> {
        match &self.value {
            AnswerValue::Boolean { value, .. } => Some(*value),
            _ => None,
        }
    }

    pub fn selection(&self) -> Option<&[String]> {
        match &self.value {
            AnswerValue::Selection(values) => Some(values),
            _ => None,
        }
    }

    pub fn selected_option(&self) -> Option<&OptionId> {
        match &self.value {
            AnswerValue::Boolean { option_id, .. } | AnswerValue::Choice { option_id, .. } => {
                option_id.as_ref()
            }
            _ => None,
        }
    }
}

/// Coerce a raw submitted value into the answer slot the question type reads.
pub fn normalize(question: &Question, raw: Option<&Value>) -> AnswerRecord {
    let matched_option = || {
        raw.map(coerce_string)
            .and_then(|value| question.option_by_value(&value))
            .map(|option| option.id.clone())
    };

    let value = match question.question_type {
        QuestionType::Text | QuestionType::Textarea => AnswerValue::Text(coerce_text(raw)),
        QuestionType::Number => AnswerValue::Number(coerce_number(raw)),
        QuestionType::Boolean => AnswerValue::Boolean {
            value: raw.map(is_truthy).unwrap_or(false),
            option_id: matched_option(),
        },
        QuestionType::Consent => AnswerValue::Boolean {
            value: raw.map(is_truthy).unwrap_or(false),
            option_id: None,
        },
        QuestionType::Radio => AnswerValue::Choice {
            value: coerce_text(raw),
            option_id: matched_option(),
        },
        QuestionType::Checkbox | QuestionType::ChipSelect => {
            AnswerValue::Selection(coerce_selection(raw))
        }
    };

    AnswerRecord::new(question.id.clone(), value)
}

/// Required-field test: absent, `null`, and the empty string count as unanswered.
pub fn is_blank(raw: Option<&Value>) -> bool {
    match raw {
        None | Some(Value::Null) => true,
        Some(Value::String(text)) => text.is_empty(),
        Some(_) => false,
    }
}

pub(crate) fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().map(|n| n != 0.0 && !n.is_nan()).unwrap_or(true),
        Value::String(text) => !text.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// String form used when matching option values and dedup keys.
pub(crate) fn coerce_string(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(flag) => flag.to_string(),
        Value::Number(number) => number.to_string(),
        Value::String(text) => text.clone(),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::Null => String::new(),
                other => coerce_string(other),
            })
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => "[object Object]".to_string(),
    }
}

fn coerce_text(raw: Option<&Value>) -> String {
    match raw {
        Some(value) if is_truthy(value) => coerce_string(value),
        _ => String::new(),
    }
}

fn coerce_number(raw: Option<&Value>) -> Option<f64> {
    let value = raw.filter(|value| is_truthy(value))?;
    let parsed = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => parse_leading_float(text),
        _ => None,
    };
    parsed.filter(|number| number.is_finite())
}

fn coerce_selection(raw: Option<&Value>) -> Vec<String> {
    match raw {
        Some(Value::Array(items)) => items.iter().map(coerce_string).collect(),
        _ => Vec::new(),
    }
}

/// Longest numeric prefix of `text`, so `"1350 points"` reads as 1350.
fn parse_leading_float(text: &str) -> Option<f64> {
    let trimmed = text.trim_start();
    let candidate: String = trimmed
        .chars()
        .take_while(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e' | 'E'))
        .collect();

    (1..=candidate.len())
        .rev()
        .find_map(|end| candidate[..end].parse::<f64>().ok())
}
