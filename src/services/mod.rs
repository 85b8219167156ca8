//! # Resource Services
//!
//! Typed operations on patients and appointments. List reads go through
//! [`ListService`](crate::list::ListService); these add the single-record
//! reads and writes around it.

pub mod appointments;
pub mod patients;

pub use appointments::{AppointmentService, ChangeRefresh, refresh_after_change};
pub use patients::PatientService;

/// `doctor_id` scoping parameter shared by every clinic endpoint.
pub(crate) fn doctor_scope(doctor_id: Option<&str>) -> Vec<(String, String)> {
    doctor_id
        .map(|id| vec![("doctor_id".to_string(), id.to_string())])
        .unwrap_or_default()
}
