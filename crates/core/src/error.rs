use uuid::Uuid;

use crate::record::PrescriptionItemError;
use crate::service::ServiceError;

/// Errors surfaced by the consultation workflow controller.
///
/// Local validation variants are raised before any network call; service
/// variants wrap remote failures. Nothing here is fatal — every error leaves
/// the in-memory record intact so the user can correct and retry.
#[derive(Debug, thiserror::Error)]
pub enum ConsultError {
    #[error("a patient must be selected before the consultation can be saved")]
    MissingPatient,
    #[error("prescription item {index}: {source}")]
    PrescriptionItem {
        index: usize,
        #[source]
        source: PrescriptionItemError,
    },
    #[error("no prescription item at position {0}")]
    NoSuchItem(usize),
    #[error("a completed consultation cannot be modified")]
    AlreadyCompleted,
    #[error("there is no prescription write pending retry")]
    NoPendingPrescription,
    #[error(transparent)]
    Service(#[from] ServiceError),
    /// The consultation write succeeded but the dependent prescription write
    /// did not. The consultation id is carried so the caller can retry the
    /// prescription alone instead of resubmitting the whole visit.
    #[error("consultation {consultation_id} was saved, but its prescription was not: {source}")]
    PrescriptionWriteFailed {
        consultation_id: Uuid,
        #[source]
        source: ServiceError,
    },
}

pub type ConsultResult<T> = std::result::Result<T, ConsultError>;
