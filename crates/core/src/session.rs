//! The consultation workflow controller.
//!
//! A session owns one consultation record through its editing lifetime: it
//! applies the explicit command set, composes the timer, gates transitions,
//! and persists through the [`ConsultationService`] at the right moments.
//! The record lives exclusively in this session while being edited; the
//! service is the source of truth once a write lands.

use uuid::Uuid;

use crate::clock::{Clock, SystemClock};
use crate::error::{ConsultError, ConsultResult};
use crate::record::{ClinicalNotes, ConsultationRecord, PatientRef, PrescriptionItem, Vitals};
use crate::service::{
    ConsultationService, ConsultationUpdate, NewConsultation, PrescriptionRequest, ServiceError,
};
use crate::timer::ConsultationTimer;
use crate::workflow::{ConsultationStatus, Transition};

/// The explicit mutation set for the consultation being edited.
///
/// Every mutation of the record goes through here rather than through field
/// assignment, so each carries a checkable precondition.
#[derive(Debug, Clone)]
pub enum Command {
    /// Resolve the patient for this visit. On a brand-new record this is the
    /// de-facto entry into active consultation: the timer auto-starts.
    SelectPatient(PatientRef),
    SetVitals(Vitals),
    SetNotes(ClinicalNotes),
    /// Append a prescription line; the catalog/external discriminant is
    /// checked immediately.
    AddMedicationItem(PrescriptionItem),
    RemoveMedicationItem(usize),
    StartTimer,
    StopTimer,
}

/// How a save should treat the visit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveMode {
    /// Persist without forcing a status change and without touching the
    /// timer.
    Draft,
    /// The terminal action: auto-stop the clock if needed, persist, move the
    /// visit to `completed`, then issue the dependent prescription write.
    Finalize,
}

/// What a successful save produced.
#[derive(Debug, Clone)]
pub struct SaveOutcome {
    pub consultation: ConsultationRecord,
    /// Set when a finalize also created a prescription.
    pub prescription_id: Option<Uuid>,
}

/// Owns the consultation record for one editing session.
pub struct ConsultationSession<S, C = SystemClock>
where
    S: ConsultationService,
    C: Clock,
{
    service: S,
    clock: C,
    record: ConsultationRecord,
    timer: ConsultationTimer<C>,
    /// Set when a finalize persisted the consultation but the prescription
    /// write failed; [`Self::retry_prescription`] clears it.
    pending_prescription: bool,
}

impl<S, C> ConsultationSession<S, C>
where
    S: ConsultationService,
    C: Clock,
{
    /// Starts a session over a fresh draft.
    pub fn new(service: S, clock: C) -> Self {
        let timer = ConsultationTimer::new(clock.clone(), None, None);
        Self {
            service,
            clock,
            record: ConsultationRecord::draft(),
            timer,
            pending_prescription: false,
        }
    }

    /// Resumes a session over an already-loaded record. The timer is rebuilt
    /// from the record's timestamps, so a consultation that was running keeps
    /// counting from wall-clock truth.
    pub fn resume(service: S, clock: C, record: ConsultationRecord) -> Self {
        let timer = ConsultationTimer::new(clock.clone(), record.started_at, record.ended_at);
        Self {
            service,
            clock,
            record,
            timer,
            pending_prescription: false,
        }
    }

    /// Fetches a persisted consultation and resumes over it.
    ///
    /// # Errors
    ///
    /// Propagates the service failure when the record cannot be fetched.
    pub async fn open(service: S, clock: C, id: Uuid) -> ConsultResult<Self> {
        let record = service.fetch(id).await?;
        Ok(Self::resume(service, clock, record))
    }

    pub fn record(&self) -> &ConsultationRecord {
        &self.record
    }

    pub fn timer(&self) -> &ConsultationTimer<C> {
        &self.timer
    }

    pub fn has_pending_prescription(&self) -> bool {
        self.pending_prescription
    }

    /// Applies one command to the record.
    ///
    /// # Errors
    ///
    /// Fails on a completed consultation, an invalid prescription item, or
    /// an out-of-range removal. No command touches the service.
    pub fn apply(&mut self, command: Command) -> ConsultResult<()> {
        if self.record.status.is_terminal() {
            return Err(ConsultError::AlreadyCompleted);
        }

        match command {
            Command::SelectPatient(patient) => {
                let auto_start = self.record.is_new() && self.record.started_at.is_none();
                self.record.patient = Some(patient);
                if auto_start {
                    self.begin_consultation();
                }
            }
            Command::SetVitals(vitals) => self.record.vitals = vitals,
            Command::SetNotes(notes) => self.record.notes = notes,
            Command::AddMedicationItem(item) => {
                let index = self.record.prescription_items.len();
                item.validate()
                    .map_err(|source| ConsultError::PrescriptionItem { index, source })?;
                self.record.prescription_items.push(item);
            }
            Command::RemoveMedicationItem(index) => {
                if index >= self.record.prescription_items.len() {
                    return Err(ConsultError::NoSuchItem(index));
                }
                self.record.prescription_items.remove(index);
            }
            Command::StartTimer => self.begin_consultation(),
            Command::StopTimer => {
                if let Some(ended) = self.timer.stop() {
                    self.record.ended_at = Some(ended);
                }
            }
        }
        Ok(())
    }

    /// Persists the record.
    ///
    /// Draft saves create or update without touching status or timer; a
    /// draft save of a brand-new record captures the assigned id so later
    /// saves update rather than recreate.
    ///
    /// Finalize additionally applies the auto-stop rule strictly before the
    /// write, moves the visit to `completed` through the explicit queue
    /// transition, and issues the dependent prescription write. A
    /// prescription failure after the consultation write has landed is
    /// reported as [`ConsultError::PrescriptionWriteFailed`] and can be
    /// retried alone via [`Self::retry_prescription`].
    ///
    /// # Errors
    ///
    /// Local validation failures (missing patient, invalid item) are
    /// returned before any service call; remote failures leave the record in
    /// memory unchanged for retry.
    pub async fn save(&mut self, mode: SaveMode) -> ConsultResult<SaveOutcome> {
        if self.record.status.is_terminal() {
            return Err(ConsultError::AlreadyCompleted);
        }
        let patient = self.record.patient.clone().ok_or(ConsultError::MissingPatient)?;
        self.record
            .validate_prescription_items()
            .map_err(|(index, source)| ConsultError::PrescriptionItem { index, source })?;

        if mode == SaveMode::Finalize
            && self.record.started_at.is_some()
            && self.record.ended_at.is_none()
        {
            // Auto-stop: the user is never blocked on forgetting the clock.
            // Sequenced strictly before the write so the persisted timestamp
            // is the synthesized one.
            let ended = self.timer.stop().unwrap_or_else(|| self.clock.now());
            self.record.ended_at = Some(ended);
        }

        let saved = match self.record.id {
            None => {
                self.service
                    .create(NewConsultation {
                        patient: patient.clone(),
                        vitals: self.record.vitals.clone(),
                        notes: self.record.notes.clone(),
                        started_at: self.record.started_at,
                        ended_at: self.record.ended_at,
                    })
                    .await?
            }
            Some(id) => {
                self.service
                    .update(
                        id,
                        ConsultationUpdate {
                            vitals: Some(self.record.vitals.clone()),
                            notes: Some(self.record.notes.clone()),
                            started_at: self.record.started_at,
                            ended_at: self.record.ended_at,
                        },
                    )
                    .await?
            }
        };
        self.record.id = saved.id;
        self.record.status = saved.status;

        let mut prescription_id = None;
        if mode == SaveMode::Finalize {
            let id = self.record.id.ok_or_else(|| {
                ConsultError::Service(ServiceError::Validation(
                    "the consultation service returned no id".into(),
                ))
            })?;

            let completed = self.service.apply_transition(id, Transition::Complete).await?;
            self.record.status = completed.status;
            if self.record.ended_at.is_none() {
                self.record.ended_at = completed.ended_at;
            }

            if !self.record.prescription_items.is_empty() {
                match self
                    .service
                    .create_prescription(PrescriptionRequest {
                        consultation_id: id,
                        patient_id: patient.id,
                        items: self.record.prescription_items.clone(),
                    })
                    .await
                {
                    Ok(pid) => prescription_id = Some(pid),
                    Err(source) => {
                        self.pending_prescription = true;
                        return Err(ConsultError::PrescriptionWriteFailed {
                            consultation_id: id,
                            source,
                        });
                    }
                }
            }
        }

        tracing::info!(
            consultation = ?self.record.id,
            status = %self.record.status,
            mode = ?mode,
            "consultation saved"
        );
        Ok(SaveOutcome {
            consultation: self.record.clone(),
            prescription_id,
        })
    }

    /// Retries only the prescription write after a
    /// [`ConsultError::PrescriptionWriteFailed`]. The consultation itself is
    /// not resubmitted.
    ///
    /// # Errors
    ///
    /// Fails when no prescription write is pending, or with
    /// `PrescriptionWriteFailed` again when the retry itself fails.
    pub async fn retry_prescription(&mut self) -> ConsultResult<Uuid> {
        if !self.pending_prescription {
            return Err(ConsultError::NoPendingPrescription);
        }
        let consultation_id = self.record.id.ok_or(ConsultError::NoPendingPrescription)?;
        let patient = self.record.patient.clone().ok_or(ConsultError::MissingPatient)?;

        let prescription_id = self
            .service
            .create_prescription(PrescriptionRequest {
                consultation_id,
                patient_id: patient.id,
                items: self.record.prescription_items.clone(),
            })
            .await
            .map_err(|source| ConsultError::PrescriptionWriteFailed {
                consultation_id,
                source,
            })?;
        self.pending_prescription = false;
        Ok(prescription_id)
    }

    /// Starts the clock and enters `in_consultation`. A no-op when the
    /// consultation has already started.
    fn begin_consultation(&mut self) {
        if let Some(started) = self.timer.start() {
            self.record.started_at = Some(started);
            if let Ok(next) = self
                .record
                .status
                .advance_to(ConsultationStatus::InConsultation)
            {
                self.record.status = next;
            }
        }
    }
}
