//! Appointment records and the appointment list endpoint.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::{deserialize_id, deserialize_opt_id};
use crate::query::{ListResource, QueryScope, SortKey, StatusFilter, format_date, parse_date};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(default, alias = "patientId", deserialize_with = "deserialize_opt_id")]
    pub patient_id: Option<String>,
    #[serde(default, alias = "patientName")]
    pub patient_name: Option<String>,
    #[serde(alias = "startTime", alias = "scheduled_at")]
    pub start_time: DateTime<Utc>,
    #[serde(default, alias = "endTime")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default, alias = "durationMinutes")]
    pub duration_minutes: Option<u32>,
    pub status: AppointmentStatus,
    #[serde(default, rename = "type", alias = "appointment_type")]
    pub appointment_type: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
}

impl AppointmentStatus {
    pub const ALL: [AppointmentStatus; 4] = [
        AppointmentStatus::Pending,
        AppointmentStatus::Confirmed,
        AppointmentStatus::Completed,
        AppointmentStatus::Cancelled,
    ];
}

impl StatusFilter for AppointmentStatus {
    fn wire_value(&self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "pending",
            AppointmentStatus::Confirmed => "confirmed",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
        }
    }

    fn from_wire(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.wire_value() == value)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AppointmentSortField {
    #[default]
    StartTime,
    PatientName,
    Status,
    CreatedAt,
}

impl SortKey for AppointmentSortField {
    const ALL: &'static [Self] = &[
        AppointmentSortField::StartTime,
        AppointmentSortField::PatientName,
        AppointmentSortField::Status,
        AppointmentSortField::CreatedAt,
    ];

    fn ui_name(&self) -> &'static str {
        match self {
            AppointmentSortField::StartTime => "startTime",
            AppointmentSortField::PatientName => "patientName",
            AppointmentSortField::Status => "status",
            AppointmentSortField::CreatedAt => "createdAt",
        }
    }

    fn wire_name(&self) -> &'static str {
        match self {
            AppointmentSortField::StartTime => "start_time",
            AppointmentSortField::PatientName => "patient_name",
            AppointmentSortField::Status => "status",
            AppointmentSortField::CreatedAt => "created_at",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CalendarView {
    Day,
    Week,
    Month,
    List,
}

impl CalendarView {
    pub fn as_str(&self) -> &'static str {
        match self {
            CalendarView::Day => "day",
            CalendarView::Week => "week",
            CalendarView::Month => "month",
            CalendarView::List => "list",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "day" => Some(CalendarView::Day),
            "week" => Some(CalendarView::Week),
            "month" => Some(CalendarView::Month),
            "list" => Some(CalendarView::List),
            _ => None,
        }
    }
}

/// Calendar context of an appointment list: which view and which day.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppointmentScope {
    pub view: Option<CalendarView>,
    pub date: Option<NaiveDate>,
}

impl QueryScope for AppointmentScope {
    fn append_pairs(&self, pairs: &mut Vec<(String, String)>) {
        if let Some(view) = self.view {
            pairs.push(("view".to_string(), view.as_str().to_string()));
        }
        if let Some(date) = self.date {
            pairs.push(("date".to_string(), format_date(date)));
        }
    }

    fn from_pairs(pairs: &[(String, String)]) -> Self {
        let mut scope = Self::default();
        for (key, value) in pairs {
            match key.as_str() {
                "view" => scope.view = CalendarView::parse(value),
                "date" => scope.date = parse_date(value),
                _ => {}
            }
        }
        scope
    }
}

/// `GET /v1/appointments`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Appointments;

impl ListResource for Appointments {
    type Item = Appointment;
    type Status = AppointmentStatus;
    type SortField = AppointmentSortField;
    type Scope = AppointmentScope;

    const NAME: &'static str = "appointments";
    const PATH: &'static str = "/v1/appointments";
    const ITEMS_KEY: &'static str = "appointments";
    const DATE_FROM_KEY: &'static str = "date_from";
    const DATE_TO_KEY: &'static str = "date_to";
}

/// Partial update for `PATCH /v1/appointments/{id}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AppointmentUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<AppointmentStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl AppointmentUpdate {
    pub fn status(status: AppointmentStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    /// Status transitions change the dashboard tallies.
    pub fn changes_status(&self) -> bool {
        self.status.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_type_and_aliases() {
        let appt: Appointment = serde_json::from_value(json!({
            "id": "a-1",
            "patientId": 7,
            "patientName": "Sarah Lee",
            "startTime": "2024-03-11T09:00:00Z",
            "status": "confirmed",
            "type": "follow-up"
        }))
        .unwrap();

        assert_eq!(appt.patient_id.as_deref(), Some("7"));
        assert_eq!(appt.status, AppointmentStatus::Confirmed);
        assert_eq!(appt.appointment_type.as_deref(), Some("follow-up"));
    }

    #[test]
    fn update_serializes_only_set_fields() {
        let body = serde_json::to_value(AppointmentUpdate::status(AppointmentStatus::Completed))
            .unwrap();
        assert_eq!(body, json!({"status": "completed"}));
    }
}
