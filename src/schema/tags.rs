//! The closed receipt tag vocabulary

use serde::{Deserialize, Serialize};
use std::fmt;

/// Category assigned to a single receipt item.
///
/// Each tag has three spellings: the label the LLM must answer with
/// (also the serde form), the label written to the ledger files, and a
/// lowercase English phrase used inside summary prompts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ReceiptTag {
    Food,
    #[serde(rename = "Eating Out")]
    EatingOut,
    #[serde(rename = "Daily Necessities")]
    DailyNecessities,
    Medical,
    Transportation,
    Entertainment,
    Clothing,
    Housing,
    Utilities,
    Communication,
    Education,
    Work,
    Other,
    #[default]
    Unknown,
}

impl ReceiptTag {
    /// Every tag, in prompt order
    pub const ALL: [ReceiptTag; 14] = [
        Self::Food,
        Self::EatingOut,
        Self::DailyNecessities,
        Self::Medical,
        Self::Transportation,
        Self::Entertainment,
        Self::Clothing,
        Self::Housing,
        Self::Utilities,
        Self::Communication,
        Self::Education,
        Self::Work,
        Self::Other,
        Self::Unknown,
    ];

    /// Label the model is asked to answer with
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Food => "Food",
            Self::EatingOut => "Eating Out",
            Self::DailyNecessities => "Daily Necessities",
            Self::Medical => "Medical",
            Self::Transportation => "Transportation",
            Self::Entertainment => "Entertainment",
            Self::Clothing => "Clothing",
            Self::Housing => "Housing",
            Self::Utilities => "Utilities",
            Self::Communication => "Communication",
            Self::Education => "Education",
            Self::Work => "Work",
            Self::Other => "Other",
            Self::Unknown => "Unknown",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|tag| tag.as_str() == s)
    }

    /// Label stored in the CSV and JSON ledger
    pub fn ledger_label(&self) -> &'static str {
        match self {
            Self::Food => "食費",
            Self::EatingOut => "外食",
            Self::DailyNecessities => "日用品",
            Self::Medical => "医療",
            Self::Transportation => "交通",
            Self::Entertainment => "娯楽",
            Self::Clothing => "衣類",
            Self::Housing => "住居",
            Self::Utilities => "公共料金",
            Self::Communication => "通信",
            Self::Education => "教育",
            Self::Work => "仕事",
            Self::Other => "その他",
            Self::Unknown => "不明",
        }
    }

    pub fn from_ledger_label(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|tag| tag.ledger_label() == s)
    }

    /// Lowercase phrase used in English prompt sentences
    pub fn english(&self) -> &'static str {
        match self {
            Self::Food => "food",
            Self::EatingOut => "eating out",
            Self::DailyNecessities => "daily necessities",
            Self::Medical => "medical",
            Self::Transportation => "transportation",
            Self::Entertainment => "entertainment",
            Self::Clothing => "clothing",
            Self::Housing => "housing",
            Self::Utilities => "utilities",
            Self::Communication => "communication",
            Self::Education => "education",
            Self::Work => "work",
            Self::Other => "other",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ReceiptTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn vocabulary_has_fourteen_distinct_labels() {
        let wire: HashSet<_> = ReceiptTag::ALL.iter().map(|t| t.as_str()).collect();
        let ledger: HashSet<_> = ReceiptTag::ALL.iter().map(|t| t.ledger_label()).collect();
        assert_eq!(wire.len(), 14);
        assert_eq!(ledger.len(), 14);
    }

    #[test]
    fn labels_map_back_to_the_same_tag() {
        for tag in ReceiptTag::ALL {
            assert_eq!(ReceiptTag::from_str(tag.as_str()), Some(tag));
            assert_eq!(ReceiptTag::from_ledger_label(tag.ledger_label()), Some(tag));
        }
        assert_eq!(ReceiptTag::from_str("Snacks"), None);
        assert_eq!(ReceiptTag::from_str("food"), None);
    }

    #[test]
    fn serde_uses_the_model_label() {
        let json = serde_json::to_string(&ReceiptTag::EatingOut).unwrap();
        assert_eq!(json, "\"Eating Out\"");
        let tag: ReceiptTag = serde_json::from_str("\"Daily Necessities\"").unwrap();
        assert_eq!(tag, ReceiptTag::DailyNecessities);
    }
}
