//! The consultation record: one clinical encounter per patient visit.

use chrono::{DateTime, Utc};
use consult_types::{BloodPressure, NonEmptyText};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::timer;
use crate::workflow::ConsultationStatus;

/// Reference to a patient: id plus display name, enough to render pickers
/// and queue rows. Patient CRUD itself lives elsewhere.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientRef {
    pub id: Uuid,
    pub display_name: NonEmptyText,
}

/// Reference to a catalog medication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MedicationRef {
    pub id: Uuid,
    pub name: String,
}

/// Physiological measurements recorded during the visit.
///
/// All fields are optional free-form readings; the core performs no unit
/// conversion. Blood pressure is the one field with enough structure to be
/// worth validating at the edge.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Vitals {
    pub temperature: Option<String>,
    pub blood_pressure: Option<BloodPressure>,
    pub blood_glucose: Option<String>,
    pub respiratory_rate: Option<String>,
    pub weight: Option<String>,
    pub height: Option<String>,
}

impl Vitals {
    /// Whether any measurement has been recorded.
    pub fn is_recorded(&self) -> bool {
        self.temperature.is_some()
            || self.blood_pressure.is_some()
            || self.blood_glucose.is_some()
            || self.respiratory_rate.is_some()
            || self.weight.is_some()
            || self.height.is_some()
    }
}

/// Free-text clinical documentation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClinicalNotes {
    pub chief_complaint: Option<String>,
    pub history: Option<String>,
    pub physical_exam: Option<String>,
    pub diagnosis: Option<String>,
    pub treatment_plan: Option<String>,
}

impl ClinicalNotes {
    /// Whether a non-blank chief complaint has been captured. Finalizing a
    /// visit requires one; the service enforces this as the source of truth.
    pub fn has_chief_complaint(&self) -> bool {
        self.chief_complaint
            .as_deref()
            .is_some_and(|c| !c.trim().is_empty())
    }
}

/// A prescription item that violates the catalog/external discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PrescriptionItemError {
    #[error("an external item must carry a medication name")]
    ExternalItemMissingName,
    #[error("a catalog item must reference a medication")]
    CatalogItemMissingRef,
    #[error("an item cannot both reference a catalog medication and be marked external")]
    AmbiguousOrigin,
}

/// One medication line within a prescription.
///
/// Either the line references a catalog medication (`medication` set,
/// `is_external` false) or it is an external free-text medication
/// (`medication` absent, `is_external` true, `medication_name`
/// authoritative). The two forms are mutually exclusive at write time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrescriptionItem {
    pub medication: Option<MedicationRef>,
    pub medication_name: String,
    pub dosage: String,
    pub frequency: String,
    pub duration: String,
    pub instructions: String,
    pub quantity: u32,
    pub is_external: bool,
}

impl PrescriptionItem {
    /// An external (off-catalog) medication line.
    pub fn external(name: impl Into<String>) -> Self {
        Self {
            medication: None,
            medication_name: name.into(),
            dosage: String::new(),
            frequency: String::new(),
            duration: String::new(),
            instructions: String::new(),
            quantity: 1,
            is_external: true,
        }
    }

    /// A line referencing a catalog medication.
    pub fn catalog(medication: MedicationRef) -> Self {
        let name = medication.name.clone();
        Self {
            medication: Some(medication),
            medication_name: name,
            dosage: String::new(),
            frequency: String::new(),
            duration: String::new(),
            instructions: String::new(),
            quantity: 1,
            is_external: false,
        }
    }

    /// Checks the catalog/external discriminant rule.
    ///
    /// # Errors
    ///
    /// Returns a `PrescriptionItemError` describing the first violated rule.
    pub fn validate(&self) -> Result<(), PrescriptionItemError> {
        match (self.is_external, &self.medication) {
            (true, Some(_)) => Err(PrescriptionItemError::AmbiguousOrigin),
            (true, None) => {
                if self.medication_name.trim().is_empty() {
                    Err(PrescriptionItemError::ExternalItemMissingName)
                } else {
                    Ok(())
                }
            }
            (false, None) => Err(PrescriptionItemError::CatalogItemMissingRef),
            (false, Some(_)) => Ok(()),
        }
    }
}

/// One clinical encounter between a patient and a provider.
///
/// `id` is assigned by the consultation service on creation and absent for
/// an unsaved draft. The timestamps are each set at most once under normal
/// flow; elapsed duration is never stored, always derived (see
/// [`crate::timer::elapsed_seconds`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsultationRecord {
    pub id: Option<Uuid>,
    pub patient: Option<PatientRef>,
    pub status: ConsultationStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub vitals: Vitals,
    #[serde(default)]
    pub notes: ClinicalNotes,
    #[serde(default)]
    pub prescription_items: Vec<PrescriptionItem>,
}

impl ConsultationRecord {
    /// A fresh unsaved draft: no patient, no timestamps, status `waiting`.
    pub fn draft() -> Self {
        Self {
            id: None,
            patient: None,
            status: ConsultationStatus::Waiting,
            started_at: None,
            ended_at: None,
            vitals: Vitals::default(),
            notes: ClinicalNotes::default(),
            prescription_items: Vec::new(),
        }
    }

    /// Whether this record has never been persisted.
    pub fn is_new(&self) -> bool {
        self.id.is_none()
    }

    /// Elapsed consultation seconds as of `now`, derived from the
    /// timestamps. Never persisted, so it cannot drift from wall-clock
    /// truth across reloads.
    pub fn elapsed_at(&self, now: DateTime<Utc>) -> u64 {
        timer::elapsed_seconds(self.started_at, self.ended_at, now)
    }

    /// Validates every prescription line, reporting the first offender by
    /// position.
    ///
    /// # Errors
    ///
    /// Returns the zero-based index and rule violation of the first invalid
    /// item.
    pub fn validate_prescription_items(&self) -> Result<(), (usize, PrescriptionItemError)> {
        for (index, item) in self.prescription_items.iter().enumerate() {
            item.validate().map_err(|e| (index, e))?;
        }
        Ok(())
    }
}

impl Default for ConsultationRecord {
    fn default() -> Self {
        Self::draft()
    }
}
