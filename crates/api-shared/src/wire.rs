//! Wire types for the consultation service JSON API.
//!
//! These mirror the domain types in `consult-core` field-for-field but stay
//! plain: statuses travel as strings, blood pressure as its `"120/80"`
//! reading, catalog references as a nullable `medication_id`. Conversions to
//! the domain types validate at the boundary.

use chrono::{DateTime, Utc};
use consult_core::{
    ClinicalNotes, ConsultationRecord, ConsultationUpdate, MedicationRef, NewConsultation,
    PatientRef, PrescriptionItem, PrescriptionRequest, Vitals,
};
use consult_types::{NonEmptyText, TextError};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// A payload that cannot be translated into domain types.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("invalid patient name: {0}")]
    InvalidPatientName(TextError),
    #[error("invalid blood pressure: {0}")]
    InvalidBloodPressure(TextError),
}

/// Vitals as they travel over the wire: all optional free-form strings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct VitalsWire {
    pub temperature: Option<String>,
    pub blood_pressure: Option<String>,
    pub blood_glucose: Option<String>,
    pub respiratory_rate: Option<String>,
    pub weight: Option<String>,
    pub height: Option<String>,
}

impl From<Vitals> for VitalsWire {
    fn from(vitals: Vitals) -> Self {
        Self {
            temperature: vitals.temperature,
            blood_pressure: vitals.blood_pressure.map(|bp| bp.to_string()),
            blood_glucose: vitals.blood_glucose,
            respiratory_rate: vitals.respiratory_rate,
            weight: vitals.weight,
            height: vitals.height,
        }
    }
}

impl TryFrom<VitalsWire> for Vitals {
    type Error = WireError;

    fn try_from(wire: VitalsWire) -> Result<Self, Self::Error> {
        let blood_pressure = wire
            .blood_pressure
            .as_deref()
            .map(str::parse)
            .transpose()
            .map_err(WireError::InvalidBloodPressure)?;
        Ok(Self {
            temperature: wire.temperature,
            blood_pressure,
            blood_glucose: wire.blood_glucose,
            respiratory_rate: wire.respiratory_rate,
            weight: wire.weight,
            height: wire.height,
        })
    }
}

/// Clinical notes as they travel over the wire.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct NotesWire {
    pub chief_complaint: Option<String>,
    pub history: Option<String>,
    pub physical_exam: Option<String>,
    pub diagnosis: Option<String>,
    pub treatment_plan: Option<String>,
}

impl From<ClinicalNotes> for NotesWire {
    fn from(notes: ClinicalNotes) -> Self {
        Self {
            chief_complaint: notes.chief_complaint,
            history: notes.history,
            physical_exam: notes.physical_exam,
            diagnosis: notes.diagnosis,
            treatment_plan: notes.treatment_plan,
        }
    }
}

impl From<NotesWire> for ClinicalNotes {
    fn from(wire: NotesWire) -> Self {
        Self {
            chief_complaint: wire.chief_complaint,
            history: wire.history,
            physical_exam: wire.physical_exam,
            diagnosis: wire.diagnosis,
            treatment_plan: wire.treatment_plan,
        }
    }
}

/// One prescription line on the wire. Catalog items carry `medication_id`;
/// external items carry `medication_id: null` and rely on the name.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PrescriptionItemWire {
    pub medication_id: Option<Uuid>,
    pub medication_name: String,
    #[serde(default)]
    pub dosage: String,
    #[serde(default)]
    pub frequency: String,
    #[serde(default)]
    pub duration: String,
    #[serde(default)]
    pub instructions: String,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    #[serde(default)]
    pub is_external: bool,
}

fn default_quantity() -> u32 {
    1
}

impl From<PrescriptionItem> for PrescriptionItemWire {
    fn from(item: PrescriptionItem) -> Self {
        Self {
            medication_id: item.medication.as_ref().map(|m| m.id),
            medication_name: item.medication_name,
            dosage: item.dosage,
            frequency: item.frequency,
            duration: item.duration,
            instructions: item.instructions,
            quantity: item.quantity,
            is_external: item.is_external,
        }
    }
}

impl From<PrescriptionItemWire> for PrescriptionItem {
    fn from(wire: PrescriptionItemWire) -> Self {
        let medication = wire.medication_id.map(|id| MedicationRef {
            id,
            name: wire.medication_name.clone(),
        });
        Self {
            medication,
            medication_name: wire.medication_name,
            dosage: wire.dosage,
            frequency: wire.frequency,
            duration: wire.duration,
            instructions: wire.instructions,
            quantity: wire.quantity,
            is_external: wire.is_external,
        }
    }
}

/// Request to create a consultation.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateConsultationReq {
    pub patient_id: Uuid,
    pub patient_name: String,
    #[serde(default)]
    pub vitals: VitalsWire,
    #[serde(default)]
    pub notes: NotesWire,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl CreateConsultationReq {
    /// Translates into the domain creation payload.
    ///
    /// # Errors
    ///
    /// Rejects a blank patient name or an unparseable blood pressure.
    pub fn into_new_consultation(self) -> Result<NewConsultation, WireError> {
        let display_name =
            NonEmptyText::new(&self.patient_name).map_err(WireError::InvalidPatientName)?;
        Ok(NewConsultation {
            patient: PatientRef {
                id: self.patient_id,
                display_name,
            },
            vitals: self.vitals.try_into()?,
            notes: self.notes.into(),
            started_at: self.started_at,
            ended_at: self.ended_at,
        })
    }
}

/// Partial update for a consultation. Omitted fields are left untouched
/// server-side.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct UpdateConsultationReq {
    pub vitals: Option<VitalsWire>,
    pub notes: Option<NotesWire>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl UpdateConsultationReq {
    /// Translates into the domain update payload.
    ///
    /// # Errors
    ///
    /// Rejects an unparseable blood pressure.
    pub fn into_update(self) -> Result<ConsultationUpdate, WireError> {
        Ok(ConsultationUpdate {
            vitals: self.vitals.map(Vitals::try_from).transpose()?,
            notes: self.notes.map(ClinicalNotes::from),
            started_at: self.started_at,
            ended_at: self.ended_at,
        })
    }
}

/// A consultation as returned by the service.
///
/// `elapsed_seconds` is derived at response time from the two timestamps;
/// it is never stored.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ConsultationRes {
    pub id: Uuid,
    pub patient_id: Option<Uuid>,
    pub patient_name: Option<String>,
    pub status: String,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub elapsed_seconds: u64,
    pub vitals: VitalsWire,
    pub notes: NotesWire,
    pub prescription_items: Vec<PrescriptionItemWire>,
}

impl ConsultationRes {
    /// Renders a stored record, deriving the elapsed duration as of `now`.
    pub fn from_record(record: ConsultationRecord, now: DateTime<Utc>) -> Self {
        let elapsed_seconds = record.elapsed_at(now);
        Self {
            id: record.id.unwrap_or_else(Uuid::nil),
            patient_id: record.patient.as_ref().map(|p| p.id),
            patient_name: record
                .patient
                .as_ref()
                .map(|p| p.display_name.as_str().to_owned()),
            status: record.status.to_string(),
            started_at: record.started_at,
            ended_at: record.ended_at,
            elapsed_seconds,
            vitals: record.vitals.into(),
            notes: record.notes.into(),
            prescription_items: record
                .prescription_items
                .into_iter()
                .map(PrescriptionItemWire::from)
                .collect(),
        }
    }
}

/// The consultation queue: a filtered list ordered by arrival.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ListConsultationsRes {
    pub consultations: Vec<ConsultationRes>,
}

/// Request to create the prescription for a consultation.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PrescriptionCreateReq {
    pub consultation_id: Uuid,
    pub patient_id: Uuid,
    pub items: Vec<PrescriptionItemWire>,
}

impl From<PrescriptionCreateReq> for PrescriptionRequest {
    fn from(req: PrescriptionCreateReq) -> Self {
        Self {
            consultation_id: req.consultation_id,
            patient_id: req.patient_id,
            items: req.items.into_iter().map(PrescriptionItem::from).collect(),
        }
    }
}

/// Response to a prescription creation.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PrescriptionRes {
    pub id: Uuid,
}

/// Structured error payload; clients extract `error` for display.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorRes {
    pub error: String,
}
