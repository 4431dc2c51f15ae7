use automation_common::crypto::generate_hmac;
use ethers::types::Bytes;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{FailureKind, FeedFailure, RequestError, StreamsError};
use crate::request::{LookupVersion, StreamsLookupRequest, BLOCK_NUMBER, FEED_IDS, FEED_ID_HEX, TIMESTAMP};
use crate::retry::{retry_fixed, RetryConfig};
use crate::transport::{HttpResponse, StreamsTransport};

pub const LEGACY_PATH: &str = "/client";
pub const BULK_PATH: &str = "/api/v1/reports/bulk";

pub const HEADER_CONTENT_TYPE: &str = "Content-Type";
pub const HEADER_AUTHORIZATION: &str = "Authorization";
pub const HEADER_TIMESTAMP: &str = "X-Authorization-Timestamp";
pub const HEADER_SIGNATURE: &str = "X-Authorization-Signature-SHA256";
pub const HEADER_UPKEEP_ID: &str = "X-Authorization-Upkeep-Id";

/// Data streams endpoints and API key
#[derive(Clone)]
pub struct Credentials {
    pub client_id: String,
    pub secret: String,
    /// Base URL of the per-feed (v0.2) service
    pub legacy_url: String,
    /// Base URL of the bulk (v0.3) service
    pub url: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("secret", &"<redacted>")
            .field("legacy_url", &self.legacy_url)
            .field("url", &self.url)
            .finish()
    }
}

/// Per-feed endpoint response
#[derive(Debug, Serialize, Deserialize)]
pub struct LegacyReportResponse {
    #[serde(rename = "chainlinkBlob")]
    pub chainlink_blob: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkReport {
    #[serde(rename = "feedID")]
    pub feed_id: String,
    pub valid_from_timestamp: u32,
    pub observations_timestamp: u32,
    pub full_report: String,
}

/// Bulk endpoint response
#[derive(Debug, Serialize, Deserialize)]
pub struct BulkReportResponse {
    pub reports: Vec<BulkReport>,
}

fn decode_blob(blob: &str) -> Result<Bytes, RequestError> {
    let digits = blob.strip_prefix("0x").unwrap_or(blob);
    hex::decode(digits)
        .map(Bytes::from)
        .map_err(|e| RequestError::new(FailureKind::BadResponse, format!("invalid report hex: {}", e)))
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}

/// Client for the data streams lookup service
#[derive(Clone)]
pub struct StreamsClient {
    credentials: Credentials,
    transport: Arc<dyn StreamsTransport>,
    retry: RetryConfig,
}

impl StreamsClient {
    pub fn new(
        credentials: Credentials,
        transport: Arc<dyn StreamsTransport>,
        retry: RetryConfig,
    ) -> Self {
        Self {
            credentials,
            transport,
            retry,
        }
    }

    /// Fetch one signed report per requested feed, aligned with `request.feeds`.
    ///
    /// Any failed feed fails the whole lookup.
    pub async fn fetch(
        &self,
        cancel: &CancellationToken,
        request: &StreamsLookupRequest,
    ) -> Result<Vec<Bytes>, StreamsError> {
        let version = request.validate()?;

        info!(
            upkeep_id = %request.upkeep_id,
            feeds = request.feeds.len(),
            ?version,
            "fetching data streams reports"
        );

        match version {
            LookupVersion::V02 => self.fetch_per_feed(cancel, request).await,
            LookupVersion::V03 => self.fetch_bulk(cancel, request).await,
        }
    }

    async fn fetch_per_feed(
        &self,
        cancel: &CancellationToken,
        request: &StreamsLookupRequest,
    ) -> Result<Vec<Bytes>, StreamsError> {
        let lookups = request
            .feeds
            .iter()
            .map(|feed| self.fetch_feed(cancel, request, feed));
        let outcomes = join_all(lookups).await;

        let mut reports = Vec::with_capacity(request.feeds.len());
        let mut failures = Vec::new();

        for (index, outcome) in outcomes.into_iter().enumerate() {
            match outcome {
                Ok(report) => reports.push(report),
                Err(StreamsError::Cancelled) => return Err(StreamsError::Cancelled),
                Err(error) => failures.push(FeedFailure {
                    index,
                    feed: request.feeds[index].clone(),
                    error,
                }),
            }
        }

        if failures.is_empty() {
            return Ok(reports);
        }

        let retryable = failures.iter().all(|f| f.error.is_retryable());
        warn!(
            upkeep_id = %request.upkeep_id,
            failed = failures.len(),
            total = request.feeds.len(),
            retryable,
            "per-feed lookup failed"
        );

        Err(StreamsError::Feeds {
            total: request.feeds.len(),
            failures,
            retryable,
        })
    }

    async fn fetch_feed(
        &self,
        cancel: &CancellationToken,
        request: &StreamsLookupRequest,
        feed: &str,
    ) -> Result<Bytes, StreamsError> {
        let path = format!(
            "{}?{}={}&{}={}&userId={}",
            LEGACY_PATH, BLOCK_NUMBER, request.time, FEED_ID_HEX, feed, request.upkeep_id
        );
        let url = format!("{}{}", self.credentials.legacy_url.trim_end_matches('/'), path);

        let report = retry_fixed(&self.retry, cancel, || async {
            let response = self.signed_get(&url, &path, None).await?;
            if let Some(kind) = FailureKind::from_status(response.status) {
                return Err(RequestError::new(
                    kind,
                    format!(
                        "upkeep {} block {} received status code {} for feed {}",
                        request.upkeep_id, request.time, response.status, feed
                    ),
                ));
            }

            let body: LegacyReportResponse = serde_json::from_slice(&response.body)
                .map_err(|e| RequestError::new(FailureKind::BadResponse, e.to_string()))?;
            decode_blob(&body.chainlink_blob)
        })
        .await?;

        debug!(feed, bytes = report.len(), "received report");
        Ok(report)
    }

    async fn fetch_bulk(
        &self,
        cancel: &CancellationToken,
        request: &StreamsLookupRequest,
    ) -> Result<Vec<Bytes>, StreamsError> {
        let path = format!(
            "{}?{}={}&{}={}",
            BULK_PATH,
            FEED_IDS,
            request.feeds.join(","),
            TIMESTAMP,
            request.time
        );
        let url = format!("{}{}", self.credentials.url.trim_end_matches('/'), path);

        let reports = retry_fixed(&self.retry, cancel, || async {
            let response = self
                .signed_get(&url, &path, Some(request.upkeep_id.to_string()))
                .await?;

            if response.status == 206 {
                return Err(RequestError::new(
                    FailureKind::PartialContent,
                    "service returned partial content",
                ));
            }
            if let Some(kind) = FailureKind::from_status(response.status) {
                return Err(RequestError::new(
                    kind,
                    format!(
                        "upkeep {} timestamp {} received status code {}",
                        request.upkeep_id, request.time, response.status
                    ),
                ));
            }

            let body: BulkReportResponse = serde_json::from_slice(&response.body)
                .map_err(|e| RequestError::new(FailureKind::BadResponse, e.to_string()))?;
            align_reports(&request.feeds, body.reports)
        })
        .await?;

        debug!(reports = reports.len(), "received bulk reports");
        Ok(reports)
    }

    async fn signed_get(
        &self,
        url: &str,
        path: &str,
        upkeep_id: Option<String>,
    ) -> Result<HttpResponse, RequestError> {
        let timestamp = now_millis();
        let signature = generate_hmac(
            "GET",
            path,
            &[],
            &self.credentials.client_id,
            &self.credentials.secret,
            timestamp,
        );

        let mut headers = vec![
            (HEADER_CONTENT_TYPE, "application/json".to_string()),
            (HEADER_AUTHORIZATION, self.credentials.client_id.clone()),
            (HEADER_TIMESTAMP, timestamp.to_string()),
            (HEADER_SIGNATURE, signature),
        ];
        if let Some(id) = upkeep_id {
            headers.push((HEADER_UPKEEP_ID, id));
        }

        Ok(self.transport.get(url, &headers).await?)
    }
}

/// Order bulk reports like the requested feeds; a missing feed counts as
/// partial content.
fn align_reports(feeds: &[String], reports: Vec<BulkReport>) -> Result<Vec<Bytes>, RequestError> {
    if reports.len() != feeds.len() {
        return Err(RequestError::new(
            FailureKind::PartialContent,
            format!("received {} reports for {} feeds", reports.len(), feeds.len()),
        ));
    }

    let mut taken = vec![false; reports.len()];
    let mut aligned = Vec::with_capacity(feeds.len());

    for feed in feeds {
        let position = (0..reports.len())
            .find(|&i| !taken[i] && reports[i].feed_id.eq_ignore_ascii_case(feed))
            .ok_or_else(|| {
                RequestError::new(FailureKind::PartialContent, format!("no report for feed {}", feed))
            })?;
        taken[position] = true;
        aligned.push(decode_blob(&reports[position].full_report)?);
    }

    Ok(aligned)
}
