use tracing::{info, instrument};

use super::doctor_scope;
use crate::error::ClientResult;
use crate::http::{HttpClient, path_segment};
use crate::list::{ListController, ListService, LoadOutcome, PageFetcher};
use crate::models::{Appointment, AppointmentStatus, AppointmentUpdate, Appointments, StatusSummary};
use crate::summary::{SummaryService, SummaryTracker};

#[derive(Clone)]
pub struct AppointmentService {
    http: HttpClient,
    doctor_id: Option<String>,
}

impl AppointmentService {
    pub fn new(http: HttpClient, doctor_id: Option<String>) -> Self {
        Self { http, doctor_id }
    }

    pub fn list(&self) -> ListService<Appointments> {
        ListService::new(self.http.clone(), self.doctor_id.clone())
    }

    pub fn summary(&self) -> SummaryService {
        SummaryService::new(self.http.clone(), self.doctor_id.clone())
    }

    /// `PATCH /v1/appointments/{id}`. Returns the updated record when the
    /// server echoes it back.
    #[instrument(skip(self, update))]
    pub async fn update(
        &self,
        id: &str,
        update: &AppointmentUpdate,
    ) -> ClientResult<Option<Appointment>> {
        let path = format!("/v1/appointments/{}", path_segment(id));
        let updated = self
            .http
            .patch(&path, &doctor_scope(self.doctor_id.as_deref()), update)
            .await?;
        info!(status = ?update.status, "Appointment updated");
        Ok(updated)
    }

    pub async fn update_status(
        &self,
        id: &str,
        status: AppointmentStatus,
    ) -> ClientResult<Option<Appointment>> {
        self.update(id, &AppointmentUpdate::status(status)).await
    }

    pub async fn confirm(&self, id: &str) -> ClientResult<Option<Appointment>> {
        self.update_status(id, AppointmentStatus::Confirmed).await
    }

    pub async fn complete(&self, id: &str) -> ClientResult<Option<Appointment>> {
        self.update_status(id, AppointmentStatus::Completed).await
    }

    pub async fn cancel(&self, id: &str) -> ClientResult<Option<Appointment>> {
        self.update_status(id, AppointmentStatus::Cancelled).await
    }

    /// Apply `update` and, when it changes a status, refresh both the list
    /// and the summary so the header tallies follow.
    pub async fn update_and_refresh<F>(
        &self,
        id: &str,
        update: &AppointmentUpdate,
        list: &ListController<Appointments, F>,
        summary: &SummaryTracker,
    ) -> ClientResult<(Option<Appointment>, Option<ChangeRefresh>)>
    where
        F: PageFetcher<Appointments>,
    {
        let updated = self.update(id, update).await?;
        let refresh = if update.changes_status() {
            Some(refresh_after_change(list, summary).await)
        } else {
            None
        };
        Ok((updated, refresh))
    }
}

/// Results of the reload pair issued after a status change.
#[derive(Debug)]
pub struct ChangeRefresh {
    pub list: LoadOutcome,
    pub summary: ClientResult<StatusSummary>,
}

/// Reload the list and re-fetch the summary concurrently.
pub async fn refresh_after_change<F>(
    list: &ListController<Appointments, F>,
    summary: &SummaryTracker,
) -> ChangeRefresh
where
    F: PageFetcher<Appointments>,
{
    let (list, summary) = tokio::join!(list.reload(), summary.refresh());
    ChangeRefresh { list, summary }
}
