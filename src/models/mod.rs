//! # Data Models
//!
//! Records exchanged with the clinic API and the list-resource descriptors
//! that tie them to their endpoints.

use serde::{Deserialize, Deserializer};

pub mod appointment;
pub mod page;
pub mod patient;

pub use appointment::{
    Appointment, AppointmentScope, AppointmentSortField, AppointmentStatus, AppointmentUpdate,
    Appointments, CalendarView,
};
pub use page::{ListPage, PageMeta, StatusSummary};
pub use patient::{NewPatient, Patient, PatientSortField, PatientStatus, Patients};

/// Record identifiers arrive as strings or integers depending on the backend.
pub(crate) fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(i64),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(text) => text,
        RawId::Number(number) => number.to_string(),
    })
}

/// Same as [`deserialize_id`] for optional references.
pub(crate) fn deserialize_opt_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(i64),
    }

    Ok(
        Option::<RawId>::deserialize(deserializer)?.map(|raw| match raw {
            RawId::Text(text) => text,
            RawId::Number(number) => number.to_string(),
        }),
    )
}
