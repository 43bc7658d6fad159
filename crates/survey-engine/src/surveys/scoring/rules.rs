use crate::surveys::answers::AnswerRecord;
use crate::surveys::schema::{OptionId, Question, ScoringRule};

use super::tiers::resolve_tier;

/// Points earned by a single answer. Every path that cannot determine a value scores zero.
pub fn score_answer(question: &Question, answer: Option<&AnswerRecord>) -> f64 {
    let Some(answer) = answer else {
        return 0.0;
    };
    if question.max_points == 0.0 {
        return 0.0;
    }

    match &question.scoring_rule {
        None | Some(ScoringRule::OptionPoints) => option_points(question, answer),
        Some(ScoringRule::Count { tiers }) => {
            let count = answer.selection().map(<[String]>::len).unwrap_or(0);
            resolve_tier(count as f64, tiers)
        }
        Some(ScoringRule::TextLength { tiers }) => {
            let length = answer
                .text()
                .map(|text| trim_text(text).chars().count())
                .unwrap_or(0);
            resolve_tier(length as f64, tiers)
        }
        Some(ScoringRule::Range { tiers }) => {
            resolve_tier(answer.number().unwrap_or(0.0), tiers)
        }
        Some(ScoringRule::Unrecognized) => 0.0,
    }
}

/// Strips surrounding whitespace plus the byte-order mark that pasted text often carries.
fn trim_text(text: &str) -> &str {
    text.trim_matches(|c: char| c.is_whitespace() || c == '\u{feff}')
}

fn option_points(question: &Question, answer: &AnswerRecord) -> f64 {
    if let Some(option_id) = answer.selected_option() {
        return points_for_option(question, option_id);
    }

    if let Some(flag) = answer.boolean() {
        let value = if flag { "true" } else { "false" };
        return question
            .option_by_value(value)
            .map(|option| option.points)
            .unwrap_or(0.0);
    }

    0.0
}

fn points_for_option(question: &Question, option_id: &OptionId) -> f64 {
    question
        .option(option_id)
        .map(|option| option.points)
        .unwrap_or(0.0)
}
