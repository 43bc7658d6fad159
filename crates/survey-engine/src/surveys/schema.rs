use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Identifier wrapper for survey questions.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct QuestionId(pub String);

/// Identifier wrapper for the options of a choice question.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OptionId(pub String);

/// Identifier wrapper for stored survey responses.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResponseId(pub String);

impl fmt::Display for QuestionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for ResponseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Input shape of a question; decides which answer slot carries meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuestionType {
    Text,
    Textarea,
    Number,
    Radio,
    Checkbox,
    Boolean,
    ChipSelect,
    Consent,
}

impl QuestionType {
    pub const fn label(self) -> &'static str {
        match self {
            QuestionType::Text => "TEXT",
            QuestionType::Textarea => "TEXTAREA",
            QuestionType::Number => "NUMBER",
            QuestionType::Radio => "RADIO",
            QuestionType::Checkbox => "CHECKBOX",
            QuestionType::Boolean => "BOOLEAN",
            QuestionType::ChipSelect => "CHIP_SELECT",
            QuestionType::Consent => "CONSENT",
        }
    }

    pub const fn is_text(self) -> bool {
        matches!(self, QuestionType::Text | QuestionType::Textarea)
    }

    pub const fn is_multi_select(self) -> bool {
        matches!(self, QuestionType::Checkbox | QuestionType::ChipSelect)
    }
}

/// One step of a tiered rule: measurements at or above `min` earn `points`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tier {
    pub min: f64,
    pub points: f64,
}

/// Declarative scoring configuration attached to a question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ScoringRule {
    #[serde(rename = "option_points")]
    OptionPoints,
    #[serde(rename = "count")]
    Count {
        #[serde(default)]
        tiers: Vec<Tier>,
    },
    #[serde(rename = "textLength")]
    TextLength {
        #[serde(default)]
        tiers: Vec<Tier>,
    },
    #[serde(rename = "range")]
    Range {
        #[serde(default)]
        tiers: Vec<Tier>,
    },
    /// Any tag this build does not know; scores nothing.
    #[serde(other)]
    Unrecognized,
}

impl ScoringRule {
    pub fn tiers(&self) -> Option<&[Tier]> {
        match self {
            ScoringRule::Count { tiers }
            | ScoringRule::TextLength { tiers }
            | ScoringRule::Range { tiers } => Some(tiers),
            ScoringRule::OptionPoints | ScoringRule::Unrecognized => None,
        }
    }

    pub const fn kind(&self) -> &'static str {
        match self {
            ScoringRule::OptionPoints => "option_points",
            ScoringRule::Count { .. } => "count",
            ScoringRule::TextLength { .. } => "textLength",
            ScoringRule::Range { .. } => "range",
            ScoringRule::Unrecognized => "unrecognized",
        }
    }
}

/// Selectable option of a RADIO, BOOLEAN, CHECKBOX or CHIP_SELECT question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionOption {
    pub id: OptionId,
    pub value: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub points: f64,
}

/// Visibility condition: the question is shown only when `field_key` was answered with `value`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShowIf {
    pub field_key: String,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: QuestionId,
    pub field_key: String,
    #[serde(default)]
    pub label: String,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub scoring_category: Option<String>,
    /// Zero marks the question as informational.
    #[serde(default)]
    pub max_points: f64,
    #[serde(default, rename = "scoringRules")]
    pub scoring_rule: Option<ScoringRule>,
    #[serde(default)]
    pub options: Vec<QuestionOption>,
    #[serde(default)]
    pub show_if: Option<ShowIf>,
}

impl Question {
    pub fn option(&self, id: &OptionId) -> Option<&QuestionOption> {
        self.options.iter().find(|option| &option.id == id)
    }

    pub fn option_by_value(&self, value: &str) -> Option<&QuestionOption> {
        self.options.iter().find(|option| option.value == value)
    }

    /// Largest award the configured rule can produce, if the rule is known.
    pub fn achievable_points(&self) -> Option<f64> {
        let awards: Vec<f64> = match &self.scoring_rule {
            None | Some(ScoringRule::OptionPoints) => {
                self.options.iter().map(|option| option.points).collect()
            }
            Some(ScoringRule::Unrecognized) => return None,
            Some(rule) => rule
                .tiers()
                .unwrap_or_default()
                .iter()
                .map(|tier| tier.points)
                .collect(),
        };
        Some(awards.into_iter().fold(0.0, f64::max))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurveyPage {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub questions: Vec<Question>,
}

/// Publication state; only active surveys accept submissions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SurveyStatus {
    #[default]
    Draft,
    Active,
    Closed,
    Archived,
}

impl SurveyStatus {
    pub const fn label(self) -> &'static str {
        match self {
            SurveyStatus::Draft => "draft",
            SurveyStatus::Active => "active",
            SurveyStatus::Closed => "closed",
            SurveyStatus::Archived => "archived",
        }
    }
}

/// Named percentage band used to label candidates in reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingBand {
    pub label: String,
    pub min: i32,
}

impl RatingBand {
    pub fn new(label: impl Into<String>, min: i32) -> Self {
        Self {
            label: label.into(),
            min,
        }
    }

    /// First band, in declared order, whose floor the percentage reaches.
    pub fn classify(percentage: i32, bands: &[RatingBand]) -> Option<&RatingBand> {
        bands.iter().find(|band| percentage >= band.min)
    }
}

pub fn default_rating_bands() -> Vec<RatingBand> {
    vec![
        RatingBand::new("Excellent", 80),
        RatingBand::new("Good", 55),
        RatingBand::new("Average", 30),
        RatingBand::new("Low", 0),
    ]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurveyDefinition {
    pub id: String,
    pub slug: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub status: SurveyStatus,
    /// Denominator of the score percentage.
    #[serde(default)]
    pub max_score: f64,
    #[serde(default)]
    pub dedup_field_key: Option<String>,
    #[serde(default = "default_rating_bands", alias = "scoreTiers")]
    pub rating_bands: Vec<RatingBand>,
    #[serde(default)]
    pub pages: Vec<SurveyPage>,
}

impl SurveyDefinition {
    /// Parse and validate a survey exported as JSON.
    pub fn from_json(raw: &str) -> Result<Self, SchemaError> {
        let survey: SurveyDefinition = serde_json::from_str(raw)?;
        survey.validate()?;
        Ok(survey)
    }

    /// Questions flattened in page order.
    pub fn questions(&self) -> impl Iterator<Item = &Question> + '_ {
        self.pages.iter().flat_map(|page| page.questions.iter())
    }

    pub fn question_by_field_key(&self, field_key: &str) -> Option<&Question> {
        self.questions()
            .find(|question| question.field_key == field_key)
    }

    pub fn is_accepting_responses(&self) -> bool {
        self.status == SurveyStatus::Active
    }

    pub fn validate(&self) -> Result<(), SchemaError> {
        if !self.max_score.is_finite() || self.max_score < 0.0 {
            return Err(SchemaError::InvalidMaxScore(self.max_score));
        }

        let mut ids = HashSet::new();
        let mut field_keys = HashSet::new();
        for question in self.questions() {
            if !ids.insert(&question.id) {
                return Err(SchemaError::DuplicateQuestionId(question.id.clone()));
            }
            if !field_keys.insert(question.field_key.as_str()) {
                return Err(SchemaError::DuplicateFieldKey(question.field_key.clone()));
            }
        }

        for question in self.questions() {
            validate_rule(question)?;

            if let Some(condition) = &question.show_if {
                if !field_keys.contains(condition.field_key.as_str()) {
                    return Err(SchemaError::UnknownShowIfField {
                        field_key: question.field_key.clone(),
                        target: condition.field_key.clone(),
                    });
                }
            }
        }

        if let Some(dedup) = &self.dedup_field_key {
            if !field_keys.contains(dedup.as_str()) {
                return Err(SchemaError::UnknownDedupField(dedup.clone()));
            }
        }

        Ok(())
    }

    /// Questions whose declared ceiling disagrees with what their rule can award,
    /// followed by a survey-level entry when the ceilings do not sum to `max_score`.
    pub fn declared_point_mismatches(&self) -> Vec<PointMismatch> {
        let mut mismatches: Vec<PointMismatch> = self
            .questions()
            .filter(|question| question.max_points > 0.0)
            .filter_map(|question| {
                let achievable = question.achievable_points()?;
                ((achievable - question.max_points).abs() > f64::EPSILON).then(|| PointMismatch {
                    field_key: Some(question.field_key.clone()),
                    declared: question.max_points,
                    achievable,
                })
            })
            .collect();

        let declared_sum: f64 = self.questions().map(|question| question.max_points).sum();
        if (declared_sum - self.max_score).abs() > f64::EPSILON {
            mismatches.push(PointMismatch {
                field_key: None,
                declared: self.max_score,
                achievable: declared_sum,
            });
        }

        mismatches
    }
}

fn validate_rule(question: &Question) -> Result<(), SchemaError> {
    let Some(rule) = &question.scoring_rule else {
        return Ok(());
    };

    if matches!(rule, ScoringRule::Unrecognized) {
        return Err(SchemaError::UnknownRuleType(question.field_key.clone()));
    }

    if let Some(tiers) = rule.tiers() {
        if tiers.is_empty() {
            return Err(SchemaError::EmptyTiers(question.field_key.clone()));
        }
        if tiers
            .iter()
            .any(|tier| !tier.min.is_finite() || !tier.points.is_finite())
        {
            return Err(SchemaError::NonFiniteTier(question.field_key.clone()));
        }
    }

    Ok(())
}

/// Disagreement between a declared point ceiling and the configured rules.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PointMismatch {
    /// `None` for the survey-level total.
    pub field_key: Option<String>,
    pub declared: f64,
    pub achievable: f64,
}

/// Rejections raised while loading a survey definition.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("survey definition is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("maxScore must be a finite, non-negative number (found {0})")]
    InvalidMaxScore(f64),
    #[error("question id {0} appears more than once")]
    DuplicateQuestionId(QuestionId),
    #[error("field key '{0}' appears more than once")]
    DuplicateFieldKey(String),
    #[error("question '{0}' declares an unknown scoring rule type")]
    UnknownRuleType(String),
    #[error("question '{0}' declares a tiered rule without tiers")]
    EmptyTiers(String),
    #[error("question '{0}' declares a tier with a non-finite threshold or award")]
    NonFiniteTier(String),
    #[error("question '{field_key}' is conditioned on unknown field '{target}'")]
    UnknownShowIfField { field_key: String, target: String },
    #[error("dedup field '{0}' does not name a question")]
    UnknownDedupField(String),
}
