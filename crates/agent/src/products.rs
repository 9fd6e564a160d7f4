//! Product lookups over the drinkware catalogue.
//!
//! The catalogue is a JSON metadata file paired with a prebuilt vector
//! index artifact. Retrieval here is keyword scoring over the metadata;
//! the index file is only checked for presence so a half-deployed
//! catalogue degrades to an honest "not ready" answer instead of stale
//! or empty results.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::summarizer::ProductSummarizer;
use crate::tools::{Tool, ToolContext, ToolResponse};

const TOP_K: usize = 3;
const MIN_TOKEN_LEN: usize = 2;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductRecord {
    pub name: String,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl ProductRecord {
    fn haystack(&self) -> String {
        let mut text = String::new();
        text.push_str(&self.name.to_lowercase());
        text.push(' ');
        text.push_str(&self.description.to_lowercase());
        for tag in &self.tags {
            text.push(' ');
            text.push_str(&tag.to_lowercase());
        }
        text
    }

    fn display_name(&self) -> String {
        match &self.size {
            Some(size) => format!("{} ({size})", self.name),
            None => self.name.clone(),
        }
    }
}

/// Catalogue state loaded once at startup and shared read-only.
pub struct ProductCatalogue {
    records: Vec<ProductRecord>,
    index_present: bool,
    metadata_path: PathBuf,
}

impl ProductCatalogue {
    /// Loads the metadata file and checks that the index artifact exists.
    ///
    /// Missing or unreadable files are not fatal here; the tool reports
    /// an unready catalogue per request instead.
    pub fn load(index_path: &Path, metadata_path: &Path) -> Self {
        let records = match std::fs::read_to_string(metadata_path) {
            Ok(raw) => match serde_json::from_str::<Vec<ProductRecord>>(&raw) {
                Ok(records) => records,
                Err(err) => {
                    tracing::warn!(
                        path = %metadata_path.display(),
                        error = %err,
                        "product metadata is not valid JSON",
                    );
                    Vec::new()
                }
            },
            Err(err) => {
                tracing::warn!(
                    path = %metadata_path.display(),
                    error = %err,
                    "product metadata could not be read",
                );
                Vec::new()
            }
        };
        let index_present = index_path.is_file();
        if !index_present {
            tracing::warn!(path = %index_path.display(), "product index artifact is missing");
        }
        Self {
            records,
            index_present,
            metadata_path: metadata_path.to_path_buf(),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.index_present && !self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Scores records by how many query tokens appear in their text.
    pub fn search(&self, query: &str) -> Vec<&ProductRecord> {
        let lowered = query.to_lowercase();
        let tokens: Vec<&str> = lowered
            .split_whitespace()
            .map(|token| token.trim_matches(|c: char| !c.is_alphanumeric()))
            .filter(|token| token.len() > MIN_TOKEN_LEN)
            .collect();
        if tokens.is_empty() {
            return Vec::new();
        }
        let mut scored: Vec<(usize, &ProductRecord)> = self
            .records
            .iter()
            .filter_map(|record| {
                let haystack = record.haystack();
                let hits = tokens
                    .iter()
                    .filter(|token| haystack.contains(**token))
                    .count();
                (hits > 0).then_some((hits, record))
            })
            .collect();
        scored.sort_by(|a, b| b.0.cmp(&a.0));
        scored
            .into_iter()
            .take(TOP_K)
            .map(|(_, record)| record)
            .collect()
    }
}

pub struct ProductsTool {
    catalogue: Arc<ProductCatalogue>,
    summarizer: Option<Arc<ProductSummarizer>>,
}

impl ProductsTool {
    pub fn new(
        catalogue: Arc<ProductCatalogue>,
        summarizer: Option<Arc<ProductSummarizer>>,
    ) -> Self {
        Self {
            catalogue,
            summarizer,
        }
    }

    /// Shared by the tool path and the HTTP tool endpoint.
    pub async fn lookup(&self, query: &str) -> ToolResponse {
        if !self.catalogue.is_ready() {
            return ToolResponse::failed(
                "Product catalogue is not ready yet. Please try again later.",
                json!({
                    "catalogue_loaded": !self.catalogue.is_empty(),
                    "index_present": self.catalogue.index_present,
                    "metadata_path": self.catalogue.metadata_path.display().to_string(),
                }),
            );
        }
        let results = self.catalogue.search(query);
        if results.is_empty() {
            return ToolResponse::failed(
                "I couldn't find a matching drinkware item. Could you be more specific?",
                json!({ "results": [] }),
            );
        }
        let names: Vec<String> = results.iter().map(|r| r.display_name()).collect();
        let mut content = format!("Top drinkware picks: {}.", names.join("; "));
        if let Some(summarizer) = &self.summarizer {
            if let Some(summary) = summarizer.summarize(query, &results).await {
                content = summary;
            }
        }
        ToolResponse::ok(
            content,
            json!({ "results": results.iter().map(|r| json!(r)).collect::<Vec<_>>() }),
        )
    }
}

#[async_trait]
impl Tool for ProductsTool {
    fn name(&self) -> &'static str {
        "products"
    }

    async fn run(&self, context: ToolContext<'_>) -> anyhow::Result<ToolResponse> {
        let query = context
            .snapshot
            .slots
            .get("product_type")
            .unwrap_or(&context.turn.content);
        Ok(self.lookup(query).await)
    }
}
