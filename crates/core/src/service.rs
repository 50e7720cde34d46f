//! The remote consultation service contract.
//!
//! The service is the single durable store for consultation records. The
//! workflow controller only ever talks to this trait; the REST store in
//! `api-rest` is one implementation, test doubles are another.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::record::{ClinicalNotes, ConsultationRecord, PatientRef, PrescriptionItem, Vitals};
use crate::workflow::{InvalidTransition, Transition};

/// Failures reported by the consultation service.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("consultation {0} not found")]
    NotFound(Uuid),
    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),
    /// The service rejected the payload (missing patient, blank chief
    /// complaint on completion, inconsistent timestamps, ...).
    #[error("{0}")]
    Validation(String),
    /// The service could not be reached or returned an unreadable payload.
    #[error("consultation service unavailable: {0}")]
    Unavailable(String),
}

impl ServiceError {
    /// The message shown to the user, falling back to a generic line when
    /// the failure carries nothing presentable.
    pub fn user_message(&self) -> String {
        match self {
            ServiceError::NotFound(_) => "This consultation no longer exists.".into(),
            ServiceError::InvalidTransition(e) => e.to_string(),
            ServiceError::Validation(msg) if !msg.trim().is_empty() => msg.clone(),
            ServiceError::Validation(_) | ServiceError::Unavailable(_) => {
                "The consultation could not be saved. Please try again.".into()
            }
        }
    }
}

/// Payload for creating a consultation.
#[derive(Debug, Clone)]
pub struct NewConsultation {
    pub patient: PatientRef,
    pub vitals: Vitals,
    pub notes: ClinicalNotes,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
}

/// Partial field set for updating a consultation.
///
/// `None` means "leave untouched server-side"; there is no way to clear a
/// timing field through this payload, matching the set-at-most-once rule.
#[derive(Debug, Clone, Default)]
pub struct ConsultationUpdate {
    pub vitals: Option<Vitals>,
    pub notes: Option<ClinicalNotes>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
}

/// Payload for the dependent prescription write.
#[derive(Debug, Clone)]
pub struct PrescriptionRequest {
    pub consultation_id: Uuid,
    pub patient_id: Uuid,
    pub items: Vec<PrescriptionItem>,
}

/// The operations the workflow engine requires of its durable store.
#[async_trait]
pub trait ConsultationService: Send + Sync {
    /// Creates a consultation, returning the stored record with its assigned
    /// id. Status is derived server-side: `in_consultation` when created
    /// with a start timestamp, `waiting` otherwise.
    async fn create(&self, new: NewConsultation) -> Result<ConsultationRecord, ServiceError>;

    /// Applies a partial update. Omitted fields are left untouched; an
    /// already-set end timestamp is never overwritten.
    async fn update(
        &self,
        id: Uuid,
        changes: ConsultationUpdate,
    ) -> Result<ConsultationRecord, ServiceError>;

    /// Fetches a consultation with its nested prescription items, for
    /// rehydrating a controller over an existing draft.
    async fn fetch(&self, id: Uuid) -> Result<ConsultationRecord, ServiceError>;

    /// Creates the prescription for a consultation. Fails independently of
    /// the consultation write; callers must surface that distinctly.
    async fn create_prescription(&self, req: PrescriptionRequest) -> Result<Uuid, ServiceError>;

    /// Applies one of the explicit queue transitions (`take-vitals`,
    /// `start-consultation`, `complete`) and returns the updated record.
    async fn apply_transition(
        &self,
        id: Uuid,
        transition: Transition,
    ) -> Result<ConsultationRecord, ServiceError>;
}

// A shared service handle works wherever the service itself does.
#[async_trait]
impl<T: ConsultationService + ?Sized> ConsultationService for std::sync::Arc<T> {
    async fn create(&self, new: NewConsultation) -> Result<ConsultationRecord, ServiceError> {
        (**self).create(new).await
    }

    async fn update(
        &self,
        id: Uuid,
        changes: ConsultationUpdate,
    ) -> Result<ConsultationRecord, ServiceError> {
        (**self).update(id, changes).await
    }

    async fn fetch(&self, id: Uuid) -> Result<ConsultationRecord, ServiceError> {
        (**self).fetch(id).await
    }

    async fn create_prescription(&self, req: PrescriptionRequest) -> Result<Uuid, ServiceError> {
        (**self).create_prescription(req).await
    }

    async fn apply_transition(
        &self,
        id: Uuid,
        transition: Transition,
    ) -> Result<ConsultationRecord, ServiceError> {
        (**self).apply_transition(id, transition).await
    }
}
