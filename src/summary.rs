//! # Appointment Summary
//!
//! Server-computed status tallies for the dashboard header. The tallies are
//! fetched on their own and never merged with or derived from list rows.

use chrono::NaiveDate;
use serde_json::Value;
use tokio::sync::watch;
use tracing::{instrument, warn};

use crate::error::ClientResult;
use crate::http::HttpClient;
use crate::models::StatusSummary;
use crate::query::format_date;

pub const SUMMARY_PATH: &str = "/v1/appointments/summary";

#[derive(Clone)]
pub struct SummaryService {
    http: HttpClient,
    doctor_id: Option<String>,
}

impl SummaryService {
    pub fn new(http: HttpClient, doctor_id: Option<String>) -> Self {
        Self { http, doctor_id }
    }

    /// `GET /v1/appointments/summary?doctor_id=&date=`
    #[instrument(skip(self))]
    pub async fn fetch(&self, date: Option<NaiveDate>) -> ClientResult<StatusSummary> {
        let mut pairs = Vec::new();
        if let Some(doctor_id) = &self.doctor_id {
            pairs.push(("doctor_id".to_string(), doctor_id.clone()));
        }
        if let Some(date) = date {
            pairs.push(("date".to_string(), format_date(date)));
        }

        let body: Value = self.http.get(SUMMARY_PATH, &pairs).await?;
        let body = match body {
            Value::Object(mut map) if map.get("summary").is_some_and(Value::is_object) => {
                map.remove("summary").unwrap_or_default()
            }
            other => other,
        };
        Ok(serde_json::from_value(body)?)
    }
}

/// Latest summary for one doctor/day context, published on a `watch`
/// channel. A failed refresh keeps the previous summary.
pub struct SummaryTracker {
    service: SummaryService,
    date: Option<NaiveDate>,
    latest: watch::Sender<Option<StatusSummary>>,
}

impl SummaryTracker {
    pub fn new(service: SummaryService, date: Option<NaiveDate>) -> Self {
        let (latest, _) = watch::channel(None);
        Self {
            service,
            date,
            latest,
        }
    }

    pub fn date(&self) -> Option<NaiveDate> {
        self.date
    }

    pub fn latest(&self) -> Option<StatusSummary> {
        self.latest.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<StatusSummary>> {
        self.latest.subscribe()
    }

    pub async fn refresh(&self) -> ClientResult<StatusSummary> {
        match self.service.fetch(self.date).await {
            Ok(summary) => {
                self.latest.send_replace(Some(summary.clone()));
                Ok(summary)
            }
            Err(err) => {
                warn!(error = %err, "Summary refresh failed; keeping previous counts");
                Err(err)
            }
        }
    }
}
