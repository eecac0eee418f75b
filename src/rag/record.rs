//! Document records and ranked retrieval results.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A single indexable unit. Never mutated once ingested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: String,
    pub title: String,
    #[serde(flatten)]
    pub fields: RecordFields,
}

/// The fixed field set of a record plus an open `extra` map.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prep_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cook_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub servings: Option<String>,
    #[serde(default)]
    pub ingredients: String,
    #[serde(default)]
    pub instructions: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

impl DocumentRecord {
    pub fn new(id: impl Into<String>, title: impl Into<String>, fields: RecordFields) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            fields,
        }
    }

    /// Text that gets embedded for this record.
    ///
    /// Order: `Title`, `Ingredients`, `Instructions`, then each non-empty
    /// `extra` entry sorted by key, joined with `" | "`. Structured fields
    /// (category, timing, yield) stay metadata only.
    pub fn searchable_text(&self) -> String {
        let mut text = format!(
            "Title: {} | Ingredients: {} | Instructions: {}",
            self.title, self.fields.ingredients, self.fields.instructions
        );
        for (key, value) in &self.fields.extra {
            if !value.trim().is_empty() {
                text.push_str(&format!(" | {}: {}", key, value));
            }
        }
        text
    }

    /// Hex sha256 of [`Self::searchable_text`].
    pub fn fingerprint(&self) -> String {
        hex::encode(Sha256::digest(self.searchable_text().as_bytes()))
    }
}

/// One entry of a retrieval result. `rank` starts at 1.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedRecord {
    pub record: DocumentRecord,
    pub rank: usize,
    pub score: f32,
}

/// Records ordered by descending relevance, ties broken by ascending id.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RetrievalResult {
    entries: Vec<RankedRecord>,
}

impl RetrievalResult {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Sorts scored records and assigns ranks.
    pub fn from_scored(mut scored: Vec<(DocumentRecord, f32)>) -> Self {
        scored.sort_by(|(left, left_score), (right, right_score)| {
            right_score
                .partial_cmp(left_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| left.id.cmp(&right.id))
        });

        let entries = scored
            .into_iter()
            .enumerate()
            .map(|(idx, (record, score))| RankedRecord {
                record,
                rank: idx + 1,
                score,
            })
            .collect();
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[RankedRecord] {
        &self.entries
    }

    pub fn ids(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.record.id.clone()).collect()
    }

    pub fn into_records(self) -> Vec<DocumentRecord> {
        self.entries.into_iter().map(|e| e.record).collect()
    }
}
