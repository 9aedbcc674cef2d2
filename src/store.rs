use crate::analysis::Category;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Fixed key the analysis record is handed off under.
pub const ANALYSIS_RESULT_KEY: &str = "analysis_result";

/// One completed classification, as handed from the upload pipeline to the
/// result view. Written once on success, read-only afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub filename: String,
    pub result: Category,
    pub confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    /// RFC 3339, recorded at the moment the response settled.
    pub timestamp: String,
}

/// Session-scoped key-value slot used to hand structured data across the
/// upload-to-result view transition.
///
/// Lives for the process lifetime and is constructed once, then handed to
/// both the upload pipeline (writer) and the result view (reader). There is
/// no expiry; an absent value is a valid state the result view must render.
#[derive(Clone, Default)]
pub struct SessionStore {
    entries: Arc<Mutex<HashMap<String, Value>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a JSON-shaped record under `key`, overwriting any prior value.
    pub fn put<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let json = serde_json::to_value(value).context("Failed to serialize session entry")?;
        self.entries.lock().unwrap().insert(key.to_string(), json);
        Ok(())
    }

    /// Read a record back, or `None` when the key was never written (or the
    /// stored shape no longer matches).
    pub fn get<T: for<'de> Deserialize<'de>>(&self, key: &str) -> Option<T> {
        let entries = self.entries.lock().unwrap();
        entries
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    pub fn store_result(&self, result: &AnalysisResult) -> Result<()> {
        self.put(ANALYSIS_RESULT_KEY, result)
    }

    pub fn load_result(&self) -> Option<AnalysisResult> {
        self.get(ANALYSIS_RESULT_KEY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(filename: &str, result: Category, confidence: f64) -> AnalysisResult {
        AnalysisResult {
            filename: filename.to_string(),
            result,
            confidence,
            suggestion: None,
            timestamp: "2025-03-14T09:26:53.589Z".to_string(),
        }
    }

    #[test]
    fn test_read_before_any_write_is_absent() {
        let store = SessionStore::new();
        assert_eq!(store.load_result(), None);
    }

    #[test]
    fn test_round_trip_returns_equal_record() {
        let store = SessionStore::new();
        let record = sample("sample.wav", Category::Murmur, 0.82);
        store.store_result(&record).unwrap();
        assert_eq!(store.load_result(), Some(record));
    }

    #[test]
    fn test_later_writes_overwrite() {
        let store = SessionStore::new();
        store
            .store_result(&sample("first.wav", Category::Normal, 0.9))
            .unwrap();
        store
            .store_result(&sample("second.wav", Category::Noisy, 0.4))
            .unwrap();

        let loaded = store.load_result().unwrap();
        assert_eq!(loaded.filename, "second.wav");
        assert_eq!(loaded.result, Category::Noisy);
    }

    #[test]
    fn test_absent_suggestion_is_omitted_from_record() {
        let record = sample("sample.wav", Category::Normal, 0.95);
        let json = serde_json::to_value(&record).unwrap();
        assert!(json.get("suggestion").is_none());
        assert_eq!(json["result"], "normal");
    }

    #[test]
    fn test_clones_share_the_same_slot() {
        let store = SessionStore::new();
        let reader = store.clone();
        store
            .store_result(&sample("shared.wav", Category::Normal, 0.7))
            .unwrap();
        assert!(reader.load_result().is_some());
    }
}
