use csv::WriterBuilder;

use crate::surveys::answers::{AnswerRecord, AnswerValue};
use crate::surveys::repository::ResponseRecord;
use crate::surveys::schema::{Question, SurveyDefinition};

/// Byte-order mark so spreadsheet tools detect UTF-8.
const BOM: &str = "\u{FEFF}";
const TRAILING_HEADERS: [&str; 5] = ["Score", "Percentage", "Status", "Notes", "Date"];

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("failed to write CSV row: {0}")]
    Csv(#[from] csv::Error),
    #[error("failed to flush CSV buffer: {0}")]
    Flush(String),
    #[error("CSV output is not valid UTF-8: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),
}

/// Semicolon-separated export, one row per response, newest first.
pub fn export_csv(
    survey: &SurveyDefinition,
    responses: &[ResponseRecord],
) -> Result<String, ExportError> {
    let questions: Vec<&Question> = survey.questions().collect();
    let mut writer = WriterBuilder::new().delimiter(b';').from_writer(Vec::new());

    let mut header: Vec<String> = questions
        .iter()
        .map(|question| {
            if question.label.is_empty() {
                question.field_key.clone()
            } else {
                question.label.clone()
            }
        })
        .collect();
    header.extend(TRAILING_HEADERS.iter().map(|title| title.to_string()));
    writer.write_record(&header)?;

    let mut ordered: Vec<&ResponseRecord> = responses.iter().collect();
    ordered.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    for response in ordered {
        let mut row: Vec<String> = questions
            .iter()
            .map(|question| {
                response
                    .answer(&question.id)
                    .map(|answer| render_cell(question, answer))
                    .unwrap_or_default()
            })
            .collect();
        row.push(response.score.total_score.to_string());
        row.push(format!("{}%", response.score.score_percentage));
        row.push(response.status.code().to_string());
        row.push(response.admin_notes.clone().unwrap_or_default());
        row.push(response.created_at.format("%Y-%m-%d").to_string());
        writer.write_record(&row)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|err| ExportError::Flush(err.error().to_string()))?;
    let body = String::from_utf8(bytes)?;
    Ok(format!("{BOM}{body}"))
}

fn render_cell(question: &Question, answer: &AnswerRecord) -> String {
    if let Some(option) = answer
        .selected_option()
        .and_then(|id| question.option(id))
    {
        return option.label.clone();
    }

    match &answer.value {
        AnswerValue::Selection(items) => items.join(", "),
        AnswerValue::Boolean { value: true, .. } => "Yes".to_string(),
        AnswerValue::Boolean { value: false, .. } => "No".to_string(),
        AnswerValue::Number(Some(number)) => number.to_string(),
        AnswerValue::Number(None) => String::new(),
        AnswerValue::Text(text) | AnswerValue::Choice { value: text, .. } => text.clone(),
    }
}
