//! Shape checks for JSON returned by completion calls

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::schema::tags::ReceiptTag;

/// Keys of a monthly summary answer, in prompt order
pub const SUMMARY_KEYS: [&str; 4] = [
    "monthly_summary",
    "monthly_characteristics",
    "positive_points",
    "advice_for_next_month",
];

/// Keys of each record inside a tagging answer
pub const ITEM_KEYS: [&str; 3] = ["name", "tag", "reason"];

/// Why a completion did not match the expected shape
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("response is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("response is not a JSON object")]
    NotAnObject,

    #[error("missing key '{0}'")]
    MissingKey(String),

    #[error("unexpected key '{0}'")]
    UnexpectedKey(String),

    #[error("value of '{0}' is not a string")]
    NotAString(String),

    #[error("'items' is not an array")]
    ItemsNotAnArray,

    #[error("items[{0}] is not an object")]
    ItemNotAnObject(usize),

    #[error("item count mismatch: expected {expected}, got {actual}")]
    ItemCountMismatch { expected: usize, actual: usize },

    #[error("items[{index}] has unknown tag '{tag}'")]
    UnknownTag { index: usize, tag: String },
}

/// Which contract a completion is held to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schema {
    /// Four-key monthly summary
    Summary,
    /// Item tagging; the answer must carry one record per submitted item
    Tags { expected_items: usize },
}

/// Monthly spending summary written by the model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MonthlySummaryResult {
    pub monthly_summary: String,
    pub monthly_characteristics: String,
    pub positive_points: String,
    pub advice_for_next_month: String,
}

/// One tagged item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ItemTag {
    pub name: String,
    pub tag: ReceiptTag,
    pub reason: String,
}

/// Tagging answer for one receipt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReceiptTagResult {
    pub items: Vec<ItemTag>,
}

/// A completion that passed validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validated {
    Summary(MonthlySummaryResult),
    Tags(ReceiptTagResult),
}

impl Validated {
    pub fn into_summary(self) -> Option<MonthlySummaryResult> {
        match self {
            Self::Summary(summary) => Some(summary),
            Self::Tags(_) => None,
        }
    }

    pub fn into_tags(self) -> Option<ReceiptTagResult> {
        match self {
            Self::Tags(tags) => Some(tags),
            Self::Summary(_) => None,
        }
    }
}

/// Check a decoded value against `schema`.
pub fn validate(value: &Value, schema: Schema) -> Result<Validated, SchemaError> {
    match schema {
        Schema::Summary => validate_summary(value).map(Validated::Summary),
        Schema::Tags { expected_items } => validate_tags(value, expected_items).map(Validated::Tags),
    }
}

/// Decode raw completion text and check it against `schema`.
pub fn decode_and_validate(text: &str, schema: Schema) -> Result<Validated, SchemaError> {
    let value: Value = serde_json::from_str(text.trim())
        .map_err(|e| SchemaError::InvalidJson(e.to_string()))?;
    validate(&value, schema)
}

pub fn validate_summary(value: &Value) -> Result<MonthlySummaryResult, SchemaError> {
    let obj = value.as_object().ok_or(SchemaError::NotAnObject)?;
    check_keys(obj, &SUMMARY_KEYS, None)?;

    Ok(MonthlySummaryResult {
        monthly_summary: string_field(obj, "monthly_summary", None)?,
        monthly_characteristics: string_field(obj, "monthly_characteristics", None)?,
        positive_points: string_field(obj, "positive_points", None)?,
        advice_for_next_month: string_field(obj, "advice_for_next_month", None)?,
    })
}

pub fn validate_tags(value: &Value, expected_items: usize) -> Result<ReceiptTagResult, SchemaError> {
    let obj = value.as_object().ok_or(SchemaError::NotAnObject)?;
    check_keys(obj, &["items"], None)?;

    let records = obj
        .get("items")
        .and_then(Value::as_array)
        .ok_or(SchemaError::ItemsNotAnArray)?;

    if records.len() != expected_items {
        return Err(SchemaError::ItemCountMismatch {
            expected: expected_items,
            actual: records.len(),
        });
    }

    let mut items = Vec::with_capacity(records.len());
    for (index, record) in records.iter().enumerate() {
        let record = record
            .as_object()
            .ok_or(SchemaError::ItemNotAnObject(index))?;
        check_keys(record, &ITEM_KEYS, Some(index))?;

        let name = string_field(record, "name", Some(index))?;
        let label = string_field(record, "tag", Some(index))?;
        let reason = string_field(record, "reason", Some(index))?;

        let tag = ReceiptTag::from_str(&label).ok_or(SchemaError::UnknownTag { index, tag: label })?;

        items.push(ItemTag { name, tag, reason });
    }

    Ok(ReceiptTagResult { items })
}

fn key_path(key: &str, index: Option<usize>) -> String {
    match index {
        Some(i) => format!("items[{i}].{key}"),
        None => key.to_string(),
    }
}

fn check_keys(
    obj: &Map<String, Value>,
    allowed: &[&str],
    index: Option<usize>,
) -> Result<(), SchemaError> {
    if let Some(missing) = allowed.iter().find(|key| !obj.contains_key(**key)) {
        return Err(SchemaError::MissingKey(key_path(missing, index)));
    }

    if let Some(extra) = obj.keys().find(|key| !allowed.contains(&key.as_str())) {
        return Err(SchemaError::UnexpectedKey(key_path(extra, index)));
    }

    Ok(())
}

fn string_field(
    obj: &Map<String, Value>,
    key: &str,
    index: Option<usize>,
) -> Result<String, SchemaError> {
    match obj.get(key) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(SchemaError::NotAString(key_path(key, index))),
        None => Err(SchemaError::MissingKey(key_path(key, index))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn summary_json() -> Value {
        json!({
            "monthly_summary": "食費が中心の一か月でした。",
            "monthly_characteristics": "外食が前月より増えました。",
            "positive_points": "日用品の支出を抑えられました。",
            "advice_for_next_month": "外食の回数を見直しましょう。"
        })
    }

    fn tags_json() -> Value {
        json!({
            "items": [
                {"name": "牛乳", "tag": "Food", "reason": "grocery"},
                {"name": "ランチ", "tag": "Eating Out", "reason": "restaurant meal"},
                {"name": "洗剤", "tag": "Daily Necessities", "reason": "household goods"}
            ]
        })
    }

    #[test]
    fn accepts_a_conforming_summary() {
        let summary = validate_summary(&summary_json()).unwrap();
        assert_eq!(summary.positive_points, "日用品の支出を抑えられました。");
    }

    #[test]
    fn summary_with_extra_key_is_rejected() {
        let mut value = summary_json();
        value["note"] = json!("extra");
        assert_eq!(
            validate_summary(&value),
            Err(SchemaError::UnexpectedKey("note".to_string()))
        );
    }

    #[test]
    fn summary_missing_key_is_rejected() {
        let mut value = summary_json();
        value.as_object_mut().unwrap().remove("positive_points");
        assert_eq!(
            validate_summary(&value),
            Err(SchemaError::MissingKey("positive_points".to_string()))
        );
    }

    #[test]
    fn summary_with_non_string_value_is_rejected() {
        let mut value = summary_json();
        value["monthly_summary"] = json!(["a", "b"]);
        assert_eq!(
            validate_summary(&value),
            Err(SchemaError::NotAString("monthly_summary".to_string()))
        );
    }

    #[test]
    fn non_object_is_rejected_for_both_schemas() {
        let value = json!(["monthly_summary"]);
        assert_eq!(validate(&value, Schema::Summary), Err(SchemaError::NotAnObject));
        assert_eq!(
            validate(&value, Schema::Tags { expected_items: 1 }),
            Err(SchemaError::NotAnObject)
        );
    }

    #[test]
    fn accepts_conforming_tags() {
        let tags = validate_tags(&tags_json(), 3).unwrap();
        assert_eq!(tags.items.len(), 3);
        assert_eq!(tags.items[1].tag, ReceiptTag::EatingOut);
    }

    #[test]
    fn fewer_items_than_submitted_is_rejected() {
        let mut value = tags_json();
        value["items"].as_array_mut().unwrap().pop();
        assert_eq!(
            validate_tags(&value, 3),
            Err(SchemaError::ItemCountMismatch { expected: 3, actual: 2 })
        );
    }

    #[test]
    fn tag_outside_vocabulary_is_rejected() {
        let mut value = tags_json();
        value["items"][2]["tag"] = json!("Snacks");
        assert_eq!(
            validate_tags(&value, 3),
            Err(SchemaError::UnknownTag {
                index: 2,
                tag: "Snacks".to_string()
            })
        );
    }

    #[test]
    fn item_records_are_checked_field_by_field() {
        let mut value = tags_json();
        value["items"][0]["reason"] = json!(null);
        assert_eq!(
            validate_tags(&value, 3),
            Err(SchemaError::NotAString("items[0].reason".to_string()))
        );

        let mut value = tags_json();
        value["items"][1].as_object_mut().unwrap().remove("name");
        assert_eq!(
            validate_tags(&value, 3),
            Err(SchemaError::MissingKey("items[1].name".to_string()))
        );

        let mut value = tags_json();
        value["items"][1]["confidence"] = json!("high");
        assert_eq!(
            validate_tags(&value, 3),
            Err(SchemaError::UnexpectedKey("items[1].confidence".to_string()))
        );

        let mut value = tags_json();
        value["items"][2] = json!("洗剤");
        assert_eq!(validate_tags(&value, 3), Err(SchemaError::ItemNotAnObject(2)));
    }

    #[test]
    fn tags_wrapper_must_hold_only_an_items_array() {
        assert_eq!(
            validate_tags(&json!({"items": {"name": "x"}}), 1),
            Err(SchemaError::ItemsNotAnArray)
        );
        assert_eq!(
            validate_tags(&json!({"items": [], "total": 0}), 0),
            Err(SchemaError::UnexpectedKey("total".to_string()))
        );
        assert_eq!(
            validate_tags(&json!({}), 0),
            Err(SchemaError::MissingKey("items".to_string()))
        );
    }

    #[test]
    fn empty_item_list_matches_zero_expected() {
        let tags = validate_tags(&json!({"items": []}), 0).unwrap();
        assert!(tags.items.is_empty());
    }

    #[test]
    fn decode_reports_malformed_text() {
        let err = decode_and_validate("```json\n{}\n```", Schema::Summary).unwrap_err();
        assert!(matches!(err, SchemaError::InvalidJson(_)));
    }

    #[test]
    fn decode_trims_surrounding_whitespace() {
        let text = format!("\n  {}  \n", tags_json());
        let validated = decode_and_validate(&text, Schema::Tags { expected_items: 3 }).unwrap();
        assert_eq!(validated.into_tags().unwrap().items[0].name, "牛乳");
    }

    #[test]
    fn serialized_results_validate_back_to_themselves() {
        let summary = validate_summary(&summary_json()).unwrap();
        let text = serde_json::to_string(&summary).unwrap();
        let again = decode_and_validate(&text, Schema::Summary)
            .unwrap()
            .into_summary()
            .unwrap();
        assert_eq!(again, summary);

        let tags = validate_tags(&tags_json(), 3).unwrap();
        let value = serde_json::to_value(&tags).unwrap();
        assert_eq!(value, tags_json());
        assert_eq!(validate_tags(&value, 3).unwrap(), tags);
    }
}
