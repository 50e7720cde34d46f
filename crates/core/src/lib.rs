//! # Consult Core
//!
//! The consultation workflow engine: the status state machine a patient
//! visit moves through (`waiting` → `ready_for_doctor` → `in_consultation`
//! → `completed`), the wall-clock consultation timer derived from the
//! record's two timestamps, and the controller that owns a record through
//! an editing session and persists it via the consultation service.
//!
//! **No API concerns**: HTTP servers, wire DTOs and OpenAPI documentation
//! belong in `api-rest` and `api-shared`.

pub mod clock;
pub mod config;
pub mod error;
pub mod record;
pub mod service;
pub mod session;
pub mod timer;
pub mod workflow;

pub use clock::{Clock, SystemClock};
pub use config::CoreConfig;
pub use error::{ConsultError, ConsultResult};
pub use record::{
    ClinicalNotes, ConsultationRecord, MedicationRef, PatientRef, PrescriptionItem,
    PrescriptionItemError, Vitals,
};
pub use service::{
    ConsultationService, ConsultationUpdate, NewConsultation, PrescriptionRequest, ServiceError,
};
pub use session::{Command, ConsultationSession, SaveMode, SaveOutcome};
pub use timer::{spawn_ticker, ConsultationTimer, TickerGuard};
pub use workflow::{ConsultationStatus, InvalidTransition, Transition};
