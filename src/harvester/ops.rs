//! Operator actions: the high-level verbs the harvest CLI exposes.
//!
//! Each action is a thin composition of client + records + store. They
//! return structured results so the CLI can render either human text or
//! JSON.

use super::client::FormsClient;
use super::records::{clean_record, CleanedRecord};
use super::store::{FieldReport, ResponseStore, Summary};
use super::HarvestError;
use std::collections::BTreeMap;

/// Result of a full fetch run.
#[derive(Debug, serde::Serialize)]
pub struct FetchReport {
    pub fetched: u64,
    /// Responses this fetch added to the cumulative log (first time seen).
    pub appended: u64,
    pub summary: Summary,
}

/// Verify the API is reachable and the token works. Returns the total
/// response count the form reports.
pub async fn test_connection(client: &FormsClient) -> Result<u64, HarvestError> {
    client.probe().await
}

/// Fetch everything, then rebuild raw, processed, and summary tables and
/// append first-seen responses to the cumulative log, as one transaction.
pub async fn fetch_latest(
    client: &FormsClient,
    store: &mut ResponseStore,
) -> Result<FetchReport, HarvestError> {
    let records = client.fetch_all().await?;
    let cleaned: Vec<CleanedRecord> = records.iter().map(clean_record).collect();
    let summary = summarize(&cleaned);

    let fetch_tag = chrono::Utc::now().format("%Y%m%dT%H%M%SZ").to_string();
    let appended = store.commit_fetch(&records, &cleaned, &summary, &fetch_tag)?;

    tracing::info!(total = summary.total, appended, "harvest complete");
    Ok(FetchReport {
        fetched: records.len() as u64,
        appended,
        summary,
    })
}

/// Recompute the summary from the stored raw rows, without fetching.
pub fn update_summary(store: &mut ResponseStore) -> Result<Summary, HarvestError> {
    let records = store.load_raw()?;
    if records.is_empty() {
        return Err(HarvestError::Precondition(
            "no stored responses; run a fetch first".to_string(),
        ));
    }
    let cleaned: Vec<CleanedRecord> = records.iter().map(clean_record).collect();
    let summary = summarize(&cleaned);
    store.write_summary(&summary)?;
    Ok(summary)
}

/// Rebuild per-field answered/blank reports from the stored raw rows.
pub fn generate_reports(store: &mut ResponseStore) -> Result<Vec<FieldReport>, HarvestError> {
    let records = store.load_raw()?;
    if records.is_empty() {
        return Err(HarvestError::Precondition(
            "no stored responses; run a fetch first".to_string(),
        ));
    }
    let cleaned: Vec<CleanedRecord> = records.iter().map(clean_record).collect();
    let reports = field_reports(&cleaned);
    store.replace_reports(&reports)?;
    Ok(reports)
}

/// Aggregate counts over a cleaned batch.
pub fn summarize(records: &[CleanedRecord]) -> Summary {
    let completed = records.iter().filter(|r| r.is_completed()).count() as u64;
    Summary {
        total: records.len() as u64,
        earliest: records.iter().map(|r| r.submitted_at).min(),
        latest: records.iter().map(|r| r.submitted_at).max(),
        completed,
        partial: records.len() as u64 - completed,
    }
}

/// Per-field counts: a field is answered in a record when its cleaned
/// value is non-empty; absent or empty counts as blank.
pub fn field_reports(records: &[CleanedRecord]) -> Vec<FieldReport> {
    let mut counts: BTreeMap<&str, (u64, u64)> = BTreeMap::new();
    for record in records {
        for field in record.answers.keys() {
            counts.entry(field.as_str()).or_default();
        }
    }
    for record in records {
        for (field, slot) in counts.iter_mut() {
            match record.answers.get(*field) {
                Some(value) if !value.is_empty() => slot.0 += 1,
                _ => slot.1 += 1,
            }
        }
    }
    counts
        .into_iter()
        .map(|(field_id, (answered, blank))| FieldReport {
            field_id: field_id.to_string(),
            answered,
            blank,
        })
        .collect()
}
