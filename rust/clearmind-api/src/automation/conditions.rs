//! Condition evaluation and `{{placeholder}}` rendering over event payloads.

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::domain::{Condition, ConditionOperator};

/// Resolves a dot path such as `page.title` or `item.tags.0`.
pub fn lookup<'a>(payload: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .filter(|segment| !segment.is_empty())
        .try_fold(payload, |current, segment| match current {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Text form used for string comparison and placeholder output.
pub fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn equals(actual: &Value, expected: &Value) -> bool {
    if let (Some(a), Some(b)) = (as_number(actual), as_number(expected)) {
        return (a - b).abs() < f64::EPSILON;
    }
    match (actual, expected) {
        (Value::Null, Value::Null) => true,
        (Value::Null, _) | (_, Value::Null) => false,
        _ => value_text(actual) == value_text(expected),
    }
}

fn contains(actual: &Value, expected: &Value) -> bool {
    match actual {
        Value::Array(items) => items.iter().any(|item| equals(item, expected)),
        Value::Null => false,
        other => value_text(other)
            .to_lowercase()
            .contains(&value_text(expected).to_lowercase()),
    }
}

/// Whether one condition holds for `payload`. A missing field only equals
/// `null`.
pub fn evaluate(condition: &Condition, payload: &Value) -> bool {
    let actual = lookup(payload, &condition.field).unwrap_or(&Value::Null);
    let expected = &condition.value;
    match condition.operator {
        ConditionOperator::Equals => equals(actual, expected),
        ConditionOperator::NotEquals => !equals(actual, expected),
        ConditionOperator::Contains => contains(actual, expected),
        ConditionOperator::GreaterThan => {
            matches!((as_number(actual), as_number(expected)), (Some(a), Some(b)) if a > b)
        }
        ConditionOperator::LessThan => {
            matches!((as_number(actual), as_number(expected)), (Some(a), Some(b)) if a < b)
        }
    }
}

pub fn evaluate_all(conditions: &[Condition], payload: &Value) -> bool {
    conditions.iter().all(|condition| evaluate(condition, payload))
}

/// Replaces `{{now}}` and `{{field.path}}` in one string. Unknown paths
/// render as empty text; an unterminated `{{` is kept verbatim.
pub fn render_str(template: &str, payload: &Value, now: DateTime<Utc>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            out.push_str(&rest[start..]);
            return out;
        };
        let key = after[..end].trim();
        if key == "now" {
            out.push_str(&now.to_rfc3339());
        } else if let Some(value) = lookup(payload, key) {
            out.push_str(&value_text(value));
        }
        rest = &after[end + 2..];
    }
    out.push_str(rest);
    out
}

/// Renders every string inside an action config.
pub fn render_value(value: &Value, payload: &Value, now: DateTime<Utc>) -> Value {
    match value {
        Value::String(s) => Value::String(render_str(s, payload, now)),
        Value::Array(items) => Value::Array(items.iter().map(|v| render_value(v, payload, now)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), render_value(v, payload, now)))
                .collect(),
        ),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cond(field: &str, operator: ConditionOperator, value: Value) -> Condition {
        Condition {
            field: field.to_string(),
            operator,
            value,
        }
    }

    #[test]
    fn lookup_walks_objects_and_arrays() {
        let payload = json!({"item": {"properties": {"tags": ["a", "b"]}}});
        assert_eq!(lookup(&payload, "item.properties.tags.1"), Some(&json!("b")));
        assert_eq!(lookup(&payload, "item.missing"), None);
    }

    #[test]
    fn numbers_compare_numerically_even_as_strings() {
        let payload = json!({"mood": {"moodValue": 2, "energyLevel": "4"}});
        assert!(evaluate(&cond("mood.moodValue", ConditionOperator::LessThan, json!(3)), &payload));
        assert!(evaluate(&cond("mood.energyLevel", ConditionOperator::GreaterThan, json!("3.5")), &payload));
        assert!(evaluate(&cond("mood.moodValue", ConditionOperator::Equals, json!("2")), &payload));
        assert!(!evaluate(&cond("mood.note", ConditionOperator::GreaterThan, json!(1)), &payload));
    }

    #[test]
    fn contains_is_case_insensitive_and_checks_arrays() {
        let payload = json!({"page": {"title": "Weekly Review", "tags": ["work", 3]}});
        assert!(evaluate(&cond("page.title", ConditionOperator::Contains, json!("review")), &payload));
        assert!(evaluate(&cond("page.tags", ConditionOperator::Contains, json!("work")), &payload));
        assert!(evaluate(&cond("page.tags", ConditionOperator::Contains, json!("3")), &payload));
        assert!(!evaluate(&cond("page.icon", ConditionOperator::Contains, json!("x")), &payload));
    }

    #[test]
    fn missing_fields_only_equal_null() {
        let payload = json!({"page": {}});
        assert!(evaluate(&cond("page.icon", ConditionOperator::Equals, Value::Null), &payload));
        assert!(evaluate(&cond("page.icon", ConditionOperator::NotEquals, json!("x")), &payload));
        assert!(evaluate_all(&[], &payload));
    }

    #[test]
    fn placeholders_render_paths_and_now() {
        let now = DateTime::parse_from_rfc3339("2026-03-01T09:00:00Z").unwrap().with_timezone(&Utc);
        let payload = json!({"page": {"title": "Plan", "id": 4}});
        assert_eq!(
            render_str("New page {{ page.title }} (#{{page.id}}) at {{now}}", &payload, now),
            "New page Plan (#4) at 2026-03-01T09:00:00+00:00"
        );
        assert_eq!(render_str("{{missing}}!", &payload, now), "!");
        assert_eq!(render_str("open {{page.title", &payload, now), "open {{page.title");

        let rendered = render_value(&json!({"title": "{{page.title}}", "n": [1, "{{page.id}}"]}), &payload, now);
        assert_eq!(rendered, json!({"title": "Plan", "n": [1, "4"]}));
    }
}
