use tracing::{info, instrument};

use super::doctor_scope;
use crate::error::ClientResult;
use crate::http::{HttpClient, path_segment};
use crate::list::ListService;
use crate::models::{NewPatient, Patient, Patients};

#[derive(Clone)]
pub struct PatientService {
    http: HttpClient,
    doctor_id: Option<String>,
}

impl PatientService {
    pub fn new(http: HttpClient, doctor_id: Option<String>) -> Self {
        Self { http, doctor_id }
    }

    pub fn list(&self) -> ListService<Patients> {
        ListService::new(self.http.clone(), self.doctor_id.clone())
    }

    pub async fn get(&self, id: &str) -> ClientResult<Patient> {
        let path = format!("/v1/patients/{}", path_segment(id));
        self.http
            .get(&path, &doctor_scope(self.doctor_id.as_deref()))
            .await
    }

    /// Validate and register a patient. Nothing is sent when the form is
    /// invalid.
    #[instrument(skip_all)]
    pub async fn create(&self, patient: &NewPatient) -> ClientResult<Patient> {
        let patient = patient.normalized();
        patient.validate()?;
        let created: Patient = self
            .http
            .post(
                "/v1/patients",
                &doctor_scope(self.doctor_id.as_deref()),
                &patient,
            )
            .await?;
        info!(patient_id = %created.id, "Patient created");
        Ok(created)
    }
}
