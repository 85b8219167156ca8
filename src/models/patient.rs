//! Patient records and the patient list endpoint.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::deserialize_id;
use crate::error::{ClientError, ValidationErrors};
use crate::query::{ListResource, SortKey, StatusFilter};
use crate::validation::{validate_email, validate_mrn, validate_required};

/// A patient as returned by `/v1/patients`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(default)]
    pub mrn: Option<String>,
    #[serde(default, alias = "firstName")]
    pub first_name: String,
    #[serde(default, alias = "lastName")]
    pub last_name: String,
    #[serde(default, alias = "dateOfBirth")]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub status: Option<PatientStatus>,
    #[serde(default, alias = "lastVisit")]
    pub last_visit: Option<DateTime<Utc>>,
}

impl Patient {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatientStatus {
    Active,
    Inactive,
    Discharged,
}

impl StatusFilter for PatientStatus {
    fn wire_value(&self) -> &'static str {
        match self {
            PatientStatus::Active => "active",
            PatientStatus::Inactive => "inactive",
            PatientStatus::Discharged => "discharged",
        }
    }

    fn from_wire(value: &str) -> Option<Self> {
        match value {
            "active" => Some(PatientStatus::Active),
            "inactive" => Some(PatientStatus::Inactive),
            "discharged" => Some(PatientStatus::Discharged),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PatientSortField {
    #[default]
    Name,
    LastVisit,
    CreatedAt,
    Mrn,
}

impl SortKey for PatientSortField {
    const ALL: &'static [Self] = &[
        PatientSortField::Name,
        PatientSortField::LastVisit,
        PatientSortField::CreatedAt,
        PatientSortField::Mrn,
    ];

    fn ui_name(&self) -> &'static str {
        match self {
            PatientSortField::Name => "name",
            PatientSortField::LastVisit => "lastVisit",
            PatientSortField::CreatedAt => "createdAt",
            PatientSortField::Mrn => "mrn",
        }
    }

    fn wire_name(&self) -> &'static str {
        match self {
            PatientSortField::Name => "name",
            PatientSortField::LastVisit => "last_visit",
            PatientSortField::CreatedAt => "created_at",
            PatientSortField::Mrn => "mrn",
        }
    }
}

/// `GET /v1/patients`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Patients;

impl ListResource for Patients {
    type Item = Patient;
    type Status = PatientStatus;
    type SortField = PatientSortField;
    type Scope = ();

    const NAME: &'static str = "patients";
    const PATH: &'static str = "/v1/patients";
    const ITEMS_KEY: &'static str = "items";
    const DATE_FROM_KEY: &'static str = "last_visit_from";
    const DATE_TO_KEY: &'static str = "last_visit_to";
}

/// Payload for `POST /v1/patients`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewPatient {
    pub first_name: String,
    pub last_name: String,
    pub mrn: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl NewPatient {
    /// Field checks run before the create request is sent.
    pub fn validate(&self) -> Result<(), ClientError> {
        let mut errors = ValidationErrors::new();
        errors.check("first_name", validate_required(&self.first_name, "First name"));
        errors.check("last_name", validate_required(&self.last_name, "Last name"));
        errors.check("mrn", validate_mrn(&self.mrn));
        if let Some(email) = self.email.as_deref().filter(|e| !e.trim().is_empty()) {
            errors.check("email", validate_email(email));
        }
        if let Some(dob) = self.date_of_birth
            && dob > Utc::now().date_naive()
        {
            errors.add("date_of_birth", "Date of birth cannot be in the future");
        }
        errors.into_result()
    }

    /// Trimmed copy with the MRN upper-cased, as the API stores it.
    pub fn normalized(&self) -> Self {
        let trim_opt = |v: &Option<String>| {
            v.as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        Self {
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            mrn: self.mrn.trim().to_ascii_uppercase(),
            date_of_birth: self.date_of_birth,
            gender: trim_opt(&self.gender),
            email: trim_opt(&self.email),
            phone: trim_opt(&self.phone),
            tags: self
                .tags
                .iter()
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;

    #[test]
    fn decodes_camel_case_and_numeric_ids() {
        let patient: Patient = serde_json::from_value(json!({
            "id": 42,
            "mrn": "MRN-004512",
            "firstName": "Sarah",
            "lastName": "Lee",
            "tags": ["diabetic"],
            "status": "active",
            "lastVisit": "2024-02-01T10:30:00Z"
        }))
        .unwrap();

        assert_eq!(patient.id, "42");
        assert_eq!(patient.full_name(), "Sarah Lee");
        assert_eq!(patient.status, Some(PatientStatus::Active));
        assert!(patient.last_visit.is_some());
    }

    #[test]
    fn new_patient_validation_reports_each_field() {
        let err = NewPatient {
            first_name: " ".into(),
            last_name: "Lee".into(),
            mrn: "12345".into(),
            email: Some("not-an-email".into()),
            ..Default::default()
        }
        .validate()
        .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Validation);
        let ClientError::Validation(errors) = err else {
            panic!("expected validation error");
        };
        assert_eq!(errors.get("first_name"), Some("First name is required"));
        assert!(errors.get("mrn").is_some());
        assert!(errors.get("email").is_some());
        assert!(errors.get("last_name").is_none());
    }

    #[test]
    fn normalized_uppercases_mrn_and_drops_blank_optionals() {
        let patient = NewPatient {
            first_name: " Sarah ".into(),
            last_name: "Lee".into(),
            mrn: " mrn-004512 ".into(),
            phone: Some("  ".into()),
            tags: vec![" cardiac ".into(), "".into()],
            ..Default::default()
        }
        .normalized();

        assert_eq!(patient.mrn, "MRN-004512");
        assert_eq!(patient.first_name, "Sarah");
        assert_eq!(patient.phone, None);
        assert_eq!(patient.tags, vec!["cardiac".to_string()]);
        assert!(patient.validate().is_ok());
    }
}
