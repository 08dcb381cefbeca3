//! Turns raw document-analysis output into a [`ReceiptResult`]
//!
//! The analysis service has shipped several JSON layouts over time (REST
//! `valueString`/`valueArray` nodes, SDK-style `value` nodes, bare values),
//! so every lookup here tries a list of field names and node shapes.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::OnceLock;

use crate::receipt::models::{ReceiptItem, ReceiptResult, ReceiptSummary};
use crate::schema::ReceiptTag;
use crate::{KakeiboError, Result};

const MERCHANT_NAME_KEYS: &[&str] = &["MerchantName", "VendorName", "StoreName"];
const MERCHANT_ADDRESS_KEYS: &[&str] = &["MerchantAddress", "Address", "VendorAddress", "StoreAddress"];
const MERCHANT_PHONE_KEYS: &[&str] = &["MerchantPhoneNumber", "PhoneNumber", "Tel", "Telephone"];
const DATE_KEYS: &[&str] = &["TransactionDate", "Date"];
const TIME_KEYS: &[&str] = &["TransactionTime", "Time"];
const TOTAL_KEYS: &[&str] = &["Total", "Amount", "TotalAmount"];
const TAX_KEYS: &[&str] = &["TotalTax", "Tax", "TaxAmount"];

const ITEMS_KEYS: &[&str] = &["Items", "LineItems", "PurchasedItems"];
const ITEM_NAME_KEYS: &[&str] = &["Description", "Name", "ProductName", "ItemName"];
const ITEM_TOTAL_KEYS: &[&str] = &["TotalPrice", "Amount", "Price", "LineTotal"];
const ITEM_QUANTITY_KEYS: &[&str] = &["Quantity", "Qty"];
const ITEM_UNIT_KEYS: &[&str] = &["UnitPrice", "UnitCost", "Price"];

/// Parse analysis output for the image named `source_file`.
///
/// Fails with [`KakeiboError::NotAReceipt`] when neither a total nor a
/// single line item can be found.
pub fn parse_receipt(raw: Value, source_file: &str) -> Result<ReceiptResult> {
    let empty = Map::new();
    let fields = raw
        .get("documents")
        .and_then(Value::as_array)
        .and_then(|docs| docs.first())
        .and_then(|doc| doc.get("fields"))
        .and_then(Value::as_object)
        .unwrap_or(&empty);

    let mut summary = ReceiptSummary {
        merchant_name: pick_str(fields, MERCHANT_NAME_KEYS),
        merchant_address: pick_str(fields, MERCHANT_ADDRESS_KEYS),
        merchant_phone: pick_str(fields, MERCHANT_PHONE_KEYS)
            .trim_start_matches(':')
            .trim()
            .to_string(),
        date: pick_str(fields, DATE_KEYS),
        time: pick_str(fields, TIME_KEYS),
        total: pick_num(fields, TOTAL_KEYS),
        tax: pick_num(fields, TAX_KEYS),
        ..ReceiptSummary::default()
    };

    if summary.total.is_none() {
        let content = raw.get("content").and_then(Value::as_str).unwrap_or("");
        summary.total = extract_total_from_text(content);
        if let Some(total) = summary.total {
            tracing::debug!("Total recovered from receipt text: {}", total);
        }
    }

    summary.date_iso = normalize_date(&summary.date);
    summary.time_norm = normalize_time(&summary.time);
    summary.total_yen = summary.total.map(to_yen);
    summary.tax_yen = summary.tax.map(to_yen);

    tracing::debug!(
        "merchant={:?} date={:?} date_iso={:?} time={:?} time_norm={:?} total_yen={:?}",
        summary.merchant_name,
        summary.date,
        summary.date_iso,
        summary.time,
        summary.time_norm,
        summary.total_yen
    );

    let mut items = parse_items(fields);

    if summary.total_yen.is_none() && items.is_empty() {
        tracing::info!(
            "Not a receipt: merchant={:?}, no total, no items",
            summary.merchant_name
        );
        return Err(KakeiboError::NotAReceipt(source_file.to_string()));
    }

    summary.has_items = !items.is_empty();

    if let (false, Some(total_yen)) = (summary.has_items, summary.total_yen) {
        tracing::info!("No line items, recording the total as a single item");
        let name = if summary.merchant_name.trim().is_empty() {
            "UNKNOWN".to_string()
        } else {
            summary.merchant_name.clone()
        };
        items.push(ReceiptItem {
            name,
            total_price: summary.total,
            quantity: Some(1.0),
            unit_price: summary.total,
            total_price_yen: Some(total_yen),
            unit_price_yen: Some(total_yen),
            tag: ReceiptTag::Unknown,
            tag_reason: String::new(),
        });
    }

    Ok(ReceiptResult {
        source_file: source_file.to_string(),
        summary,
        items,
        raw,
    })
}

fn parse_items(fields: &Map<String, Value>) -> Vec<ReceiptItem> {
    let Some(node) = ITEMS_KEYS.iter().find_map(|key| fields.get(*key)) else {
        return Vec::new();
    };

    value_array(node)
        .iter()
        .filter_map(value_object)
        .filter_map(|obj| {
            let total_price = pick_num(obj, ITEM_TOTAL_KEYS);
            let unit_price = pick_num(obj, ITEM_UNIT_KEYS);
            let item = ReceiptItem {
                name: pick_str(obj, ITEM_NAME_KEYS),
                total_price,
                quantity: pick_num(obj, ITEM_QUANTITY_KEYS),
                unit_price,
                total_price_yen: total_price.map(to_yen),
                unit_price_yen: unit_price.map(to_yen),
                tag: ReceiptTag::Unknown,
                tag_reason: String::new(),
            };

            if item.name.trim().is_empty() && item.total_price.is_none() && item.unit_price.is_none() {
                return None;
            }

            tracing::debug!(
                "item name={:?} total_yen={:?} unit_yen={:?} qty={:?}",
                item.name,
                item.total_price_yen,
                item.unit_price_yen,
                item.quantity
            );
            Some(item)
        })
        .collect()
}

fn value_array(node: &Value) -> &[Value] {
    if let Some(array) = node.as_array() {
        return array;
    }

    let nested = node
        .get("valueArray")
        .and_then(Value::as_array)
        .or_else(|| node.get("value").and_then(Value::as_array))
        .or_else(|| {
            node.get("value")
                .and_then(|v| v.get("valueArray"))
                .and_then(Value::as_array)
        });

    nested.map(Vec::as_slice).unwrap_or(&[])
}

fn value_object(elem: &Value) -> Option<&Map<String, Value>> {
    elem.get("valueObject")
        .and_then(Value::as_object)
        .or_else(|| elem.get("value").and_then(Value::as_object))
}

fn pick_str(fields: &Map<String, Value>, candidates: &[&str]) -> String {
    candidates
        .iter()
        .filter_map(|key| fields.get(*key))
        .map(text_value)
        .find(|text| !text.trim().is_empty())
        .unwrap_or_default()
}

fn pick_num(fields: &Map<String, Value>, candidates: &[&str]) -> Option<f64> {
    candidates
        .iter()
        .filter_map(|key| fields.get(*key))
        .find_map(number_value)
}

fn text_value(node: &Value) -> String {
    if let Some(s) = node.as_str() {
        return s.to_string();
    }

    ["valueString", "content", "value", "valueDate", "valueTime"]
        .iter()
        .find_map(|key| node.get(*key).and_then(Value::as_str))
        .unwrap_or("")
        .to_string()
}

fn number_value(node: &Value) -> Option<f64> {
    if let Some(n) = node.as_f64() {
        return Some(n);
    }

    node.get("valueNumber")
        .and_then(Value::as_f64)
        .or_else(|| {
            node.get("valueCurrency")
                .and_then(|c| c.get("amount"))
                .and_then(Value::as_f64)
        })
        .or_else(|| node.get("value").and_then(Value::as_f64))
}

/// Round an amount to whole yen, ties to even.
pub fn to_yen(amount: f64) -> i64 {
    amount.round_ties_even() as i64
}

fn date_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d{4})\D+(\d{1,2})\D+(\d{1,2})").expect("valid date pattern"))
}

fn time_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(\d{1,2})\D+(\d{1,2})(?:\D+(\d{1,2}))?").expect("valid time pattern")
    })
}

fn total_patterns() -> &'static [Regex] {
    static RES: OnceLock<Vec<Regex>> = OnceLock::new();
    RES.get_or_init(|| {
        [
            r"金額[:：]?\s*([0-9,]+)\s*円",
            r"合計[:：]?\s*[¥￥]?\s*([0-9,]+)",
            r"[¥￥]\s*([0-9,]+)",
        ]
        .iter()
        .map(|p| Regex::new(p).expect("valid total pattern"))
        .collect()
    })
}

/// Parse a free-form date into a calendar date.
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let s = text.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
        return Some(dt.date());
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }

    let caps = date_pattern().captures(s)?;
    NaiveDate::from_ymd_opt(
        caps[1].parse().ok()?,
        caps[2].parse().ok()?,
        caps[3].parse().ok()?,
    )
}

/// `YYYY-MM-DD`, or empty when unreadable
pub fn normalize_date(text: &str) -> String {
    parse_date(text)
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

/// `HH:MM:SS`, or empty when unreadable
pub fn normalize_time(text: &str) -> String {
    let s = text.trim();
    if s.is_empty() {
        return String::new();
    }

    let from_groups = time_pattern().captures(s).and_then(|caps| {
        let hh = caps[1].parse().ok()?;
        let mm = caps[2].parse().ok()?;
        let ss = match caps.get(3) {
            Some(m) => m.as_str().parse().ok()?,
            None => 0,
        };
        NaiveTime::from_hms_opt(hh, mm, ss)
    });
    if let Some(t) = from_groups {
        return t.format("%H:%M:%S").to_string();
    }

    let digits: String = s.chars().filter(char::is_ascii_digit).collect();
    if digits.len() != 4 && digits.len() != 6 {
        return String::new();
    }

    let part = |range: std::ops::Range<usize>| -> Option<u32> {
        digits.get(range).and_then(|p| p.parse().ok())
    };
    let hh = part(0..2);
    let mm = part(2..4);
    let ss = if digits.len() == 6 { part(4..6) } else { Some(0) };

    match (hh, mm, ss) {
        (Some(hh), Some(mm), Some(ss)) => NaiveTime::from_hms_opt(hh, mm, ss)
            .map(|t| t.format("%H:%M:%S").to_string())
            .unwrap_or_default(),
        _ => String::new(),
    }
}

/// Find a total in the receipt's plain text (transit and hand-written receipts).
pub fn extract_total_from_text(text: &str) -> Option<f64> {
    if text.is_empty() {
        return None;
    }

    total_patterns().iter().find_map(|re| {
        re.captures(text)
            .and_then(|caps| caps[1].replace(',', "").parse::<f64>().ok())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rest_receipt() -> Value {
        json!({
            "content": "スーパーみどり\n合計 ¥1,280",
            "documents": [{
                "fields": {
                    "MerchantName": {"type": "string", "valueString": "スーパーみどり", "content": "スーパーみどり"},
                    "MerchantPhoneNumber": {"type": "phoneNumber", "content": ": 03-1234-5678"},
                    "TransactionDate": {"type": "date", "valueDate": "2026-01-05", "content": "2026年1月5日"},
                    "TransactionTime": {"type": "time", "valueTime": "18:04:00", "content": "18:04"},
                    "Total": {"type": "currency", "valueCurrency": {"amount": 1280.0, "currencyCode": "JPY"}},
                    "Items": {
                        "type": "array",
                        "valueArray": [
                            {"type": "object", "valueObject": {
                                "Description": {"valueString": "牛乳"},
                                "Quantity": {"valueNumber": 2},
                                "Price": {"valueCurrency": {"amount": 198.0}},
                                "TotalPrice": {"valueCurrency": {"amount": 396.0}}
                            }},
                            {"type": "object", "valueObject": {
                                "Description": {"valueString": "食パン"},
                                "TotalPrice": {"valueCurrency": {"amount": 884.0}}
                            }},
                            {"type": "object", "valueObject": {
                                "Quantity": {"valueNumber": 1}
                            }}
                        ]
                    }
                }
            }]
        })
    }

    #[test]
    fn parses_rest_layout() {
        let result = parse_receipt(rest_receipt(), "IMG_0001.jpg").unwrap();

        assert_eq!(result.source_file, "IMG_0001.jpg");
        assert_eq!(result.summary.merchant_name, "スーパーみどり");
        assert_eq!(result.summary.merchant_phone, "03-1234-5678");
        assert_eq!(result.summary.date_iso, "2026-01-05");
        assert_eq!(result.summary.time_norm, "18:04:00");
        assert_eq!(result.summary.total_yen, Some(1280));
        assert!(result.summary.has_items);

        assert_eq!(result.items.len(), 2);
        assert_eq!(result.items[0].name, "牛乳");
        assert_eq!(result.items[0].quantity, Some(2.0));
        assert_eq!(result.items[0].unit_price_yen, Some(198));
        assert_eq!(result.items[0].total_price_yen, Some(396));
        assert_eq!(result.items[1].unit_price_yen, None);
        assert!(result.items.iter().all(|i| i.tag == ReceiptTag::Unknown));
    }

    #[test]
    fn parses_sdk_value_layout() {
        let raw = json!({
            "documents": [{
                "fields": {
                    "MerchantName": {"value": "ドラッグ中央", "content": "ドラッグ中央"},
                    "TransactionDate": {"value": "2025/12/31"},
                    "Total": {"value": 550},
                    "Items": {"value": [
                        {"value": {"Description": {"value": "絆創膏"}, "TotalPrice": {"value": 550}}}
                    ]}
                }
            }]
        });

        let result = parse_receipt(raw, "drug.png").unwrap();
        assert_eq!(result.summary.merchant_name, "ドラッグ中央");
        assert_eq!(result.summary.date_iso, "2025-12-31");
        assert_eq!(result.summary.time_norm, "");
        assert_eq!(result.items.len(), 1);
        assert_eq!(result.items[0].total_price_yen, Some(550));
    }

    #[test]
    fn total_only_receipt_gets_a_pseudo_item() {
        let raw = json!({
            "content": "IC乗車券\n金額: 230円",
            "documents": [{"fields": {"MerchantName": {"valueString": "東日本鉄道"}}}]
        });

        let result = parse_receipt(raw, "ticket.jpg").unwrap();
        assert!(!result.summary.has_items);
        assert_eq!(result.summary.total_yen, Some(230));
        assert_eq!(result.items.len(), 1);
        assert_eq!(result.items[0].name, "東日本鉄道");
        assert_eq!(result.items[0].quantity, Some(1.0));
        assert_eq!(result.items[0].total_price_yen, Some(230));
    }

    #[test]
    fn nothing_recognisable_is_not_a_receipt() {
        let raw = json!({"content": "hello", "documents": []});
        let err = parse_receipt(raw, "cat.jpg").unwrap_err();
        assert!(matches!(err, KakeiboError::NotAReceipt(name) if name == "cat.jpg"));
    }

    #[test]
    fn dates_normalise_from_several_formats() {
        assert_eq!(normalize_date("2026-01-05"), "2026-01-05");
        assert_eq!(normalize_date("2026-01-05T10:11:12"), "2026-01-05");
        assert_eq!(normalize_date("2026年1月5日"), "2026-01-05");
        assert_eq!(normalize_date("2026/13/40"), "");
        assert_eq!(normalize_date(""), "");
    }

    #[test]
    fn times_normalise_from_several_formats() {
        assert_eq!(normalize_time("9:05"), "09:05:00");
        assert_eq!(normalize_time("18時04分33秒"), "18:04:33");
        assert_eq!(normalize_time("1804"), "18:04:00");
        assert_eq!(normalize_time("180433"), "18:04:33");
        assert_eq!(normalize_time("25:61"), "");
        assert_eq!(normalize_time("abc"), "");
    }

    #[test]
    fn totals_are_found_in_text_in_priority_order() {
        assert_eq!(extract_total_from_text("金額：1,200 円"), Some(1200.0));
        assert_eq!(extract_total_from_text("小計 ¥900\n合計 ¥1,000"), Some(1000.0));
        assert_eq!(extract_total_from_text("￥ 450"), Some(450.0));
        assert_eq!(extract_total_from_text("no amount"), None);
    }

    #[test]
    fn yen_rounding_ties_to_even() {
        assert_eq!(to_yen(99.6), 100);
        assert_eq!(to_yen(100.5), 100);
        assert_eq!(to_yen(101.5), 102);
    }
}
