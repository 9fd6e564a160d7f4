//! Optional LLM rewrite of product results.
//!
//! When an API key is configured, matched products are sent to an
//! OpenAI-compatible completion endpoint for a friendlier one-liner.
//! Every failure path returns `None` so the caller falls back to the
//! deterministic summary; a flaky upstream must never break a reply.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;

use crate::products::ProductRecord;

const SYSTEM_PROMPT: &str = "You are a concise retail assistant. Summarise the matched drinkware \
     products for the customer in one to two sentences. Mention product names. Do not invent \
     products.";

pub struct ProductSummarizer {
    client: reqwest::Client,
    api_key: SecretString,
    base_url: String,
    model: String,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Deserialize)]
struct CompletionMessage {
    content: String,
}

impl ProductSummarizer {
    pub fn new(
        api_key: SecretString,
        base_url: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self {
            client,
            api_key,
            base_url: base_url.into(),
            model: model.into(),
        }
    }

    pub async fn summarize(&self, query: &str, results: &[&ProductRecord]) -> Option<String> {
        let listing: Vec<String> = results
            .iter()
            .map(|record| match &record.size {
                Some(size) => format!("{} ({size}): {}", record.name, record.description),
                None => format!("{}: {}", record.name, record.description),
            })
            .collect();
        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                {
                    "role": "user",
                    "content": format!(
                        "Customer asked: {query}\nMatched products:\n{}",
                        listing.join("\n"),
                    ),
                },
            ],
        });
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let response = match self
            .client
            .post(&url)
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => {
                tracing::debug!(error = %err, "summarizer request failed");
                return None;
            }
        };
        if !response.status().is_success() {
            tracing::debug!(status = %response.status(), "summarizer returned an error status");
            return None;
        }
        let parsed: CompletionResponse = match response.json().await {
            Ok(parsed) => parsed,
            Err(err) => {
                tracing::debug!(error = %err, "summarizer response was not valid JSON");
                return None;
            }
        };
        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content.trim().to_string())
            .filter(|content| !content.is_empty())
    }
}
