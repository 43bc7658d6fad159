use serde_json::{Map, Value};

use super::schema::Question;

/// Whether the question was meant to be shown given the other raw answers.
///
/// Unconditional questions are always active. Conditional ones compare the referenced answer
/// to the configured value with strict equality: types must match (`"true"` is not `true`),
/// numbers compare by value, and arrays or objects never match.
pub fn is_active(question: &Question, answers: &Map<String, Value>) -> bool {
    let Some(condition) = &question.show_if else {
        return true;
    };

    answers
        .get(&condition.field_key)
        .map(|answer| strictly_equal(answer, &condition.value))
        .unwrap_or(false)
}

pub(crate) fn strictly_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::String(a), Value::String(b)) => a == b,
        (Value::Number(a), Value::Number(b)) => match (a.as_f64(), b.as_f64()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        },
        _ => false,
    }
}
