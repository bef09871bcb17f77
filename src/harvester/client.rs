//! Forms-API client: paginated response fetching over reqwest.
//!
//! Cursor pagination follows the upstream contract: request a page of
//! `page_size` items, then pass the last item's token as `before` for the
//! next page; a short page ends the walk. Records are deduplicated by
//! response id so overlapping pages cannot inflate the result.
//!
//! Transient upstream trouble is absorbed here: 5xx retries with
//! exponential backoff, 429 honors Retry-After. Anything still failing
//! after the retry budget surfaces as [`HarvestError::Api`] with the
//! status and body, and the caller writes nothing.

use super::records::SubmissionRecord;
use super::HarvestError;
use serde::Deserialize;
use std::collections::HashSet;
use std::time::Duration;

/// One page of the responses collection.
#[derive(Debug, Deserialize)]
struct ResponsePage {
    #[serde(default)]
    total_items: u64,
    #[serde(default)]
    items: Vec<SubmissionRecord>,
}

/// Client for one survey form on the forms API.
#[derive(Clone)]
pub struct FormsClient {
    http: reqwest::Client,
    base_url: String,
    form_id: String,
    token: String,
    page_size: usize,
    max_retries: u32,
}

impl FormsClient {
    pub fn new(base_url: &str, form_id: &str, token: &str, page_size: usize) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            form_id: form_id.to_string(),
            token: token.to_string(),
            page_size: page_size.max(1),
            max_retries: 2,
        }
    }

    /// Shrink the retry budget (tests).
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    fn responses_url(&self) -> String {
        format!("{}/forms/{}/responses", self.base_url, self.form_id)
    }

    /// Probe the API with a one-record request. Returns the total number
    /// of responses the form has collected.
    pub async fn probe(&self) -> Result<u64, HarvestError> {
        let page = self.get_page(1, None).await?;
        Ok(page.total_items)
    }

    /// Fetch every response, walking the cursor until a short page.
    ///
    /// The result is unique by response id regardless of how the records
    /// were split across pages.
    pub async fn fetch_all(&self) -> Result<Vec<SubmissionRecord>, HarvestError> {
        let mut records: Vec<SubmissionRecord> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut before: Option<String> = None;

        loop {
            let page = self.get_page(self.page_size, before.as_deref()).await?;
            let fetched = page.items.len();

            before = if fetched == self.page_size {
                page.items.last().and_then(|r| r.token.clone())
            } else {
                None
            };

            for record in page.items {
                if seen.insert(record.response_id.clone()) {
                    records.push(record);
                }
            }
            tracing::debug!(fetched, total = records.len(), "fetched response page");

            if before.is_none() {
                break;
            }
            // Politeness delay between pages.
            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        tracing::info!(total = records.len(), "response fetch complete");
        Ok(records)
    }

    /// One GET with retry on 5xx and backoff on 429.
    async fn get_page(
        &self,
        page_size: usize,
        before: Option<&str>,
    ) -> Result<ResponsePage, HarvestError> {
        let mut retries = 0u32;

        loop {
            let mut request = self
                .http
                .get(self.responses_url())
                .bearer_auth(&self.token)
                .query(&[("page_size", page_size.to_string())]);
            if let Some(cursor) = before {
                request = request.query(&[("before", cursor)]);
            }

            let response = match request.send().await {
                Ok(r) => r,
                Err(e) => {
                    if retries < self.max_retries {
                        retries += 1;
                        tokio::time::sleep(backoff(retries)).await;
                        continue;
                    }
                    return Err(e.into());
                }
            };

            let status = response.status().as_u16();

            if status >= 500 && retries < self.max_retries {
                retries += 1;
                tokio::time::sleep(backoff(retries)).await;
                continue;
            }

            if status == 429 && retries < self.max_retries {
                retries += 1;
                let retry_after = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|s| s.parse::<u64>().ok())
                    .unwrap_or(2);
                tokio::time::sleep(Duration::from_secs(retry_after.min(10))).await;
                continue;
            }

            let body = response.text().await.unwrap_or_default();

            if !(200..300).contains(&status) {
                return Err(HarvestError::Api {
                    status,
                    message: truncate_message(&body),
                });
            }

            return Ok(serde_json::from_str(&body)?);
        }
    }
}

fn backoff(retry: u32) -> Duration {
    Duration::from_millis(250 * 2u64.pow(retry.saturating_sub(1)))
}

/// Keep operator-facing error messages readable.
fn truncate_message(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.len() > 300 {
        let mut end = 300;
        while !trimmed.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}…", &trimmed[..end])
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_responses_url_shape() {
        let client = FormsClient::new("https://api.example.com/", "FORM1", "tok", 100);
        assert_eq!(
            client.responses_url(),
            "https://api.example.com/forms/FORM1/responses"
        );
    }

    #[test]
    fn test_truncate_message_short_passthrough() {
        assert_eq!(truncate_message("  boom  "), "boom");
    }
}
