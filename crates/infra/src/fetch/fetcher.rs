//! Bulk retrieval over `/invoices/query/metadata`.
//!
//! The endpoint enforces a 20-requests-per-hour sliding quota, so the
//! query range is partitioned into three-month windows and the fetcher
//! pauses between windows long enough to stay inside it. Within a window
//! results are paged by offset. A 401 mid-run triggers an in-place
//! re-authentication; a 429 honors the server's retry delay. Neither loses
//! already-fetched records.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use ksef_core::time::Clock;
use ksef_core::windowing::{self, partition};
use ksef_domain::{DateWindow, InvoiceRecord, KsefError, Result, SubjectType};
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Method, StatusCode};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::auth::AuthSession;
use crate::http::{status_error, HttpClient};

/// The bulk endpoint is slower than the auth endpoints.
const QUERY_TIMEOUT: Duration = Duration::from_secs(60);
/// Pause between pages of one window (the per-second limit is loose).
const PAGE_SLEEP: Duration = Duration::from_millis(300);
/// Attempts per page request, counting 401/429 recoveries.
const MAX_PAGE_ATTEMPTS: u32 = 5;
const MIN_PAGE_SIZE: u32 = 1;
const MAX_PAGE_SIZE: u32 = 1000;

/// Retrieves the complete record set for a category over a date range.
///
/// Borrows the session mutably for its whole lifetime: re-authentication
/// on credential expiry mutates the session in place, and the cached
/// bearer-header snapshot is refreshed right after, so every subsequent
/// retry sees the new credential.
pub struct WindowedFetcher<'a> {
    base_url: String,
    http: HttpClient,
    session: &'a mut AuthSession,
    headers: HeaderMap,
    page_size: u32,
    clock: Arc<dyn Clock>,
}

impl<'a> WindowedFetcher<'a> {
    /// Build a fetcher over an authenticated session. Fails with
    /// `NotAuthenticated` when the session has not completed a handshake.
    pub fn new(
        base_url: impl Into<String>,
        session: &'a mut AuthSession,
        page_size: u32,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let headers = session.auth_headers()?;
        Ok(Self {
            base_url: base_url.into(),
            http: HttpClient::with_timeout(QUERY_TIMEOUT)?,
            session,
            headers,
            page_size: page_size.clamp(MIN_PAGE_SIZE, MAX_PAGE_SIZE),
            clock,
        })
    }

    /// Fetch every record of `subject` in `[from, to]`, in window order,
    /// each tagged with the subject's display label.
    pub async fn fetch_all(
        &mut self,
        subject: SubjectType,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<InvoiceRecord>> {
        let windows = partition(from, to);
        let window_sleep = windowing::window_sleep();
        let eta_min = windows.len() as u64 * window_sleep.as_secs() / 60;
        info!(
            subject = subject.label(),
            %from,
            %to,
            windows = windows.len(),
            eta_min,
            "fetching invoices"
        );

        let mut records = Vec::new();
        let total = windows.len();
        for (index, window) in windows.iter().enumerate() {
            let batch = self.fetch_window(subject, *window).await?;
            records.extend(batch);

            if index + 1 < total {
                info!(
                    window = index + 1,
                    total,
                    sleep_secs = window_sleep.as_secs(),
                    "pausing between windows for the hourly quota"
                );
                self.clock.sleep(window_sleep).await;
            }
        }

        info!(subject = subject.label(), count = records.len(), "fetch complete");
        Ok(records)
    }

    /// All pages of one window, offset-paged from 0.
    async fn fetch_window(
        &mut self,
        subject: SubjectType,
        window: DateWindow,
    ) -> Result<Vec<InvoiceRecord>> {
        let date_from = windowing::start_of_day_iso(window.start);
        let date_to = windowing::end_of_day_iso(window.end);

        let mut records = Vec::new();
        let mut offset: usize = 0;
        loop {
            let page = self.query_page(subject, &date_from, &date_to, offset).await?;
            let invoices = page.get("invoices").and_then(Value::as_array).cloned().unwrap_or_default();
            if invoices.is_empty() {
                break;
            }
            if offset == 0 {
                debug!(start = %window.start, end = %window.end, "window has results");
            }

            offset += invoices.len();
            records.extend(
                invoices.into_iter().map(|fields| InvoiceRecord::new(subject.label(), fields)),
            );

            if !page.get("hasMore").and_then(Value::as_bool).unwrap_or(false) {
                break;
            }
            self.clock.sleep(PAGE_SLEEP).await;
        }
        Ok(records)
    }

    /// One page query with the local recovery policy: 401 re-authenticates
    /// in place, 429 waits out the server-supplied delay, anything else
    /// non-success fails immediately.
    async fn query_page(
        &mut self,
        subject: SubjectType,
        date_from: &str,
        date_to: &str,
        offset: usize,
    ) -> Result<Value> {
        let url = format!("{}/invoices/query/metadata", self.base_url);
        let body = json!({
            "subjectType": subject.wire_value(),
            "dateRange": { "dateType": "Invoicing", "from": date_from, "to": date_to },
        });

        for attempt in 1..=MAX_PAGE_ATTEMPTS {
            let request = self
                .http
                .request(Method::POST, &url)
                .query(&[("pageSize", self.page_size as usize), ("pageOffset", offset)])
                .headers(self.headers.clone())
                .json(&body);
            let response = self.http.send(request).await?;
            let status = response.status();

            if status == StatusCode::UNAUTHORIZED {
                // Access token expired mid-run: re-authenticate in place and
                // retry the same page. Accumulated records are untouched.
                warn!(attempt, max = MAX_PAGE_ATTEMPTS, "access token expired, re-authenticating");
                self.session.authenticate().await?;
                self.headers = self.session.auth_headers()?;
                continue;
            }

            if status == StatusCode::TOO_MANY_REQUESTS {
                let delay = retry_after_secs(response.headers())
                    .unwrap_or_else(|| windowing::window_sleep().as_secs())
                    + 2;
                warn!(attempt, max = MAX_PAGE_ATTEMPTS, delay_secs = delay, "rate limited, backing off");
                self.clock.sleep(Duration::from_secs(delay)).await;
                continue;
            }

            if !status.is_success() {
                let err = status_error(response).await;
                return Err(KsefError::Fetch(format!(
                    "invoice query failed (offset={offset}, from={date_from}): {err}"
                )));
            }

            return response
                .json()
                .await
                .map_err(|err| KsefError::Fetch(format!("malformed query response: {err}")));
        }

        Err(KsefError::Fetch(format!(
            "invoice query retries exhausted (offset={offset}, from={date_from})"
        )))
    }
}

fn retry_after_secs(headers: &HeaderMap) -> Option<u64> {
    headers.get(RETRY_AFTER)?.to_str().ok()?.trim().parse().ok()
}
