//! The in-memory consultation store behind the REST surface.
//!
//! Implements [`ConsultationService`], making it the durable side of the
//! workflow: status derivation, timestamp rules and transition checks are
//! enforced here, not trusted from clients.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use uuid::Uuid;

use consult_core::{
    Clock, ConsultationRecord, ConsultationService, ConsultationStatus, ConsultationUpdate,
    NewConsultation, PrescriptionItem, PrescriptionRequest, ServiceError, SystemClock, Transition,
};

/// A persisted prescription, kept separate from its consultation so the two
/// writes can fail independently.
#[derive(Debug, Clone)]
struct StoredPrescription {
    id: Uuid,
    items: Vec<PrescriptionItem>,
}

#[derive(Default)]
struct StoreInner {
    consultations: HashMap<Uuid, ConsultationRecord>,
    // Arrival order, so queue listings stay stable.
    arrival: Vec<Uuid>,
    // One prescription per consultation, keyed by consultation id.
    prescriptions: HashMap<Uuid, StoredPrescription>,
}

/// In-memory implementation of the consultation service.
pub struct InMemoryConsultationStore<C: Clock = SystemClock> {
    clock: C,
    inner: Mutex<StoreInner>,
}

impl InMemoryConsultationStore<SystemClock> {
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl Default for InMemoryConsultationStore<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> InMemoryConsultationStore<C> {
    pub fn with_clock(clock: C) -> Self {
        Self {
            clock,
            inner: Mutex::new(StoreInner::default()),
        }
    }

    fn locked(&self) -> Result<MutexGuard<'_, StoreInner>, ServiceError> {
        self.inner
            .lock()
            .map_err(|_| ServiceError::Unavailable("consultation store lock poisoned".into()))
    }

    /// Consultations in arrival order, optionally narrowed to one queue
    /// stage. Prescription items are attached the same way `fetch` does.
    ///
    /// # Errors
    ///
    /// Returns `Unavailable` if the store lock is poisoned.
    pub fn list(
        &self,
        status: Option<ConsultationStatus>,
    ) -> Result<Vec<ConsultationRecord>, ServiceError> {
        let inner = self.locked()?;
        let records = inner
            .arrival
            .iter()
            .filter_map(|id| inner.consultations.get(id))
            .filter(|record| status.map_or(true, |s| record.status == s))
            .cloned()
            .map(|record| attach_prescription(record, &inner))
            .collect();
        Ok(records)
    }
}

fn attach_prescription(mut record: ConsultationRecord, inner: &StoreInner) -> ConsultationRecord {
    if let Some(id) = record.id {
        if let Some(stored) = inner.prescriptions.get(&id) {
            record.prescription_items = stored.items.clone();
        }
    }
    record
}

#[async_trait]
impl<C: Clock> ConsultationService for InMemoryConsultationStore<C> {
    async fn create(&self, new: NewConsultation) -> Result<ConsultationRecord, ServiceError> {
        if new.ended_at.is_some() && new.started_at.is_none() {
            return Err(ServiceError::Validation(
                "a consultation cannot end before it has started".into(),
            ));
        }
        if let (Some(start), Some(end)) = (new.started_at, new.ended_at) {
            if end < start {
                return Err(ServiceError::Validation(
                    "end time precedes start time".into(),
                ));
            }
        }

        let status = if new.started_at.is_some() {
            ConsultationStatus::InConsultation
        } else {
            ConsultationStatus::Waiting
        };

        let id = Uuid::new_v4();
        let record = ConsultationRecord {
            id: Some(id),
            patient: Some(new.patient),
            status,
            started_at: new.started_at,
            ended_at: new.ended_at,
            vitals: new.vitals,
            notes: new.notes,
            prescription_items: Vec::new(),
        };

        let mut inner = self.locked()?;
        inner.consultations.insert(id, record.clone());
        inner.arrival.push(id);
        tracing::info!(consultation = %id, status = %record.status, "consultation created");
        Ok(record)
    }

    async fn update(
        &self,
        id: Uuid,
        changes: ConsultationUpdate,
    ) -> Result<ConsultationRecord, ServiceError> {
        let mut inner = self.locked()?;
        let record = inner
            .consultations
            .get_mut(&id)
            .ok_or(ServiceError::NotFound(id))?;

        if record.status.is_terminal() {
            return Err(ServiceError::Validation(
                "a completed consultation can no longer be edited".into(),
            ));
        }

        if let Some(vitals) = changes.vitals {
            record.vitals = vitals;
        }
        if let Some(notes) = changes.notes {
            record.notes = notes;
        }
        // Timing fields are set at most once; a second write never moves them.
        if record.started_at.is_none() {
            record.started_at = changes.started_at;
        }
        if record.ended_at.is_none() {
            if let Some(end) = changes.ended_at {
                let start = record.started_at.ok_or_else(|| {
                    ServiceError::Validation(
                        "a consultation cannot end before it has started".into(),
                    )
                })?;
                record.ended_at = Some(end.max(start));
            }
        }

        if record.status == ConsultationStatus::Waiting && record.started_at.is_some() {
            record.status = record.status.advance_to(ConsultationStatus::InConsultation)?;
        }

        let updated = record.clone();
        Ok(attach_prescription(updated, &inner))
    }

    async fn fetch(&self, id: Uuid) -> Result<ConsultationRecord, ServiceError> {
        let inner = self.locked()?;
        let record = inner
            .consultations
            .get(&id)
            .cloned()
            .ok_or(ServiceError::NotFound(id))?;
        Ok(attach_prescription(record, &inner))
    }

    async fn create_prescription(&self, req: PrescriptionRequest) -> Result<Uuid, ServiceError> {
        if req.items.is_empty() {
            return Err(ServiceError::Validation(
                "a prescription needs at least one item".into(),
            ));
        }
        for (index, item) in req.items.iter().enumerate() {
            item.validate()
                .map_err(|e| ServiceError::Validation(format!("item {}: {e}", index + 1)))?;
        }

        let mut inner = self.locked()?;
        let record = inner
            .consultations
            .get(&req.consultation_id)
            .ok_or(ServiceError::NotFound(req.consultation_id))?;
        if record.patient.as_ref().map(|p| p.id) != Some(req.patient_id) {
            return Err(ServiceError::Validation(
                "prescription patient does not match the consultation".into(),
            ));
        }
        if let Some(existing) = inner.prescriptions.get(&req.consultation_id) {
            return Err(ServiceError::Validation(format!(
                "this consultation already has prescription {}",
                existing.id
            )));
        }

        let prescription_id = Uuid::new_v4();
        inner.prescriptions.insert(
            req.consultation_id,
            StoredPrescription {
                id: prescription_id,
                items: req.items,
            },
        );
        tracing::info!(
            consultation = %req.consultation_id,
            prescription = %prescription_id,
            "prescription created"
        );
        Ok(prescription_id)
    }

    async fn apply_transition(
        &self,
        id: Uuid,
        transition: Transition,
    ) -> Result<ConsultationRecord, ServiceError> {
        let now = self.clock.now();
        let mut inner = self.locked()?;
        let record = inner
            .consultations
            .get_mut(&id)
            .ok_or(ServiceError::NotFound(id))?;

        let next = record.status.apply(transition)?;

        match transition {
            Transition::TakeVitals => {
                if !record.vitals.is_recorded() {
                    return Err(ServiceError::Validation(
                        "vitals must be recorded before the patient is ready for the doctor"
                            .into(),
                    ));
                }
            }
            Transition::StartConsultation => {
                if record.started_at.is_none() {
                    record.started_at = Some(now);
                }
            }
            Transition::Complete => {
                if !record.notes.has_chief_complaint() {
                    return Err(ServiceError::Validation(
                        "chief complaint is required to complete a consultation".into(),
                    ));
                }
                let start = *record.started_at.get_or_insert(now);
                if record.ended_at.is_none() {
                    record.ended_at = Some(now.max(start));
                }
            }
        }

        record.status = next;
        tracing::info!(consultation = %id, status = %next, "consultation transitioned");
        let updated = record.clone();
        Ok(attach_prescription(updated, &inner))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use consult_core::{ClinicalNotes, MedicationRef, PatientRef, Vitals};
    use consult_types::NonEmptyText;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 14, 9, 0, 0).unwrap()
    }

    fn patient(name: &str) -> PatientRef {
        PatientRef {
            id: Uuid::new_v4(),
            display_name: NonEmptyText::new(name).unwrap(),
        }
    }

    fn new_consultation(name: &str) -> NewConsultation {
        NewConsultation {
            patient: patient(name),
            vitals: Vitals::default(),
            notes: ClinicalNotes::default(),
            started_at: None,
            ended_at: None,
        }
    }

    fn recorded_vitals() -> Vitals {
        Vitals {
            temperature: Some("37.2".into()),
            ..Vitals::default()
        }
    }

    fn notes_with_complaint() -> ClinicalNotes {
        ClinicalNotes {
            chief_complaint: Some("persistent cough".into()),
            ..ClinicalNotes::default()
        }
    }

    #[tokio::test]
    async fn create_without_start_enters_the_waiting_queue() {
        let store = InMemoryConsultationStore::new();
        let record = store.create(new_consultation("P1")).await.unwrap();
        assert_eq!(record.status, ConsultationStatus::Waiting);
        assert!(record.id.is_some());
    }

    #[tokio::test]
    async fn create_with_start_skips_straight_to_in_consultation() {
        let store = InMemoryConsultationStore::new();
        let record = store
            .create(NewConsultation {
                started_at: Some(t0()),
                ..new_consultation("P1")
            })
            .await
            .unwrap();
        assert_eq!(record.status, ConsultationStatus::InConsultation);
    }

    #[tokio::test]
    async fn create_rejects_an_end_without_a_start() {
        let store = InMemoryConsultationStore::new();
        let result = store
            .create(NewConsultation {
                ended_at: Some(t0()),
                ..new_consultation("P1")
            })
            .await;
        assert!(matches!(result, Err(ServiceError::Validation(_))));
    }

    #[tokio::test]
    async fn update_merges_only_the_provided_fields() {
        let store = InMemoryConsultationStore::new();
        let id = store
            .create(new_consultation("P1"))
            .await
            .unwrap()
            .id
            .unwrap();

        let updated = store
            .update(
                id,
                ConsultationUpdate {
                    vitals: Some(recorded_vitals()),
                    ..ConsultationUpdate::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.vitals.temperature.as_deref(), Some("37.2"));
        assert_eq!(updated.status, ConsultationStatus::Waiting);
    }

    #[tokio::test]
    async fn a_landing_start_time_promotes_a_waiting_record() {
        let store = InMemoryConsultationStore::new();
        let id = store
            .create(new_consultation("P1"))
            .await
            .unwrap()
            .id
            .unwrap();

        let updated = store
            .update(
                id,
                ConsultationUpdate {
                    started_at: Some(t0()),
                    ..ConsultationUpdate::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.status, ConsultationStatus::InConsultation);
        assert_eq!(updated.started_at, Some(t0()));
    }

    #[tokio::test]
    async fn timing_fields_are_set_at_most_once() {
        let store = InMemoryConsultationStore::new();
        let id = store
            .create(NewConsultation {
                started_at: Some(t0()),
                ..new_consultation("P1")
            })
            .await
            .unwrap()
            .id
            .unwrap();

        let end = t0() + Duration::seconds(300);
        store
            .update(
                id,
                ConsultationUpdate {
                    ended_at: Some(end),
                    ..ConsultationUpdate::default()
                },
            )
            .await
            .unwrap();

        // A later write cannot move either timestamp.
        let updated = store
            .update(
                id,
                ConsultationUpdate {
                    started_at: Some(t0() + Duration::hours(1)),
                    ended_at: Some(t0() + Duration::hours(2)),
                    ..ConsultationUpdate::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.started_at, Some(t0()));
        assert_eq!(updated.ended_at, Some(end));
    }

    #[tokio::test]
    async fn an_end_before_the_start_is_clamped_to_the_start() {
        let store = InMemoryConsultationStore::new();
        let id = store
            .create(NewConsultation {
                started_at: Some(t0()),
                ..new_consultation("P1")
            })
            .await
            .unwrap()
            .id
            .unwrap();

        let updated = store
            .update(
                id,
                ConsultationUpdate {
                    ended_at: Some(t0() - Duration::seconds(30)),
                    ..ConsultationUpdate::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.ended_at, Some(t0()));
    }

    #[tokio::test]
    async fn updating_an_unknown_consultation_is_not_found() {
        let store = InMemoryConsultationStore::new();
        let missing = Uuid::new_v4();
        assert!(matches!(
            store.update(missing, ConsultationUpdate::default()).await,
            Err(ServiceError::NotFound(id)) if id == missing
        ));
    }

    #[tokio::test]
    async fn queue_transitions_walk_the_full_path() {
        let store = InMemoryConsultationStore::new();
        let id = store
            .create(new_consultation("P1"))
            .await
            .unwrap()
            .id
            .unwrap();

        store
            .update(
                id,
                ConsultationUpdate {
                    vitals: Some(recorded_vitals()),
                    notes: Some(notes_with_complaint()),
                    ..ConsultationUpdate::default()
                },
            )
            .await
            .unwrap();

        let record = store.apply_transition(id, Transition::TakeVitals).await.unwrap();
        assert_eq!(record.status, ConsultationStatus::ReadyForDoctor);
        assert!(record.started_at.is_none());

        let record = store
            .apply_transition(id, Transition::StartConsultation)
            .await
            .unwrap();
        assert_eq!(record.status, ConsultationStatus::InConsultation);
        assert!(record.started_at.is_some());

        let record = store.apply_transition(id, Transition::Complete).await.unwrap();
        assert_eq!(record.status, ConsultationStatus::Completed);
        assert!(record.ended_at.unwrap() >= record.started_at.unwrap());
    }

    #[tokio::test]
    async fn take_vitals_requires_recorded_vitals() {
        let store = InMemoryConsultationStore::new();
        let id = store
            .create(new_consultation("P1"))
            .await
            .unwrap()
            .id
            .unwrap();

        let result = store.apply_transition(id, Transition::TakeVitals).await;
        assert!(matches!(result, Err(ServiceError::Validation(_))));
        // The status did not move.
        let record = store.fetch(id).await.unwrap();
        assert_eq!(record.status, ConsultationStatus::Waiting);
    }

    #[tokio::test]
    async fn completing_requires_a_chief_complaint() {
        let store = InMemoryConsultationStore::new();
        let id = store
            .create(NewConsultation {
                started_at: Some(t0()),
                ..new_consultation("P1")
            })
            .await
            .unwrap()
            .id
            .unwrap();

        let result = store.apply_transition(id, Transition::Complete).await;
        assert!(matches!(result, Err(ServiceError::Validation(_))));
    }

    #[tokio::test]
    async fn out_of_order_transitions_are_rejected() {
        let store = InMemoryConsultationStore::new();
        let id = store
            .create(new_consultation("P1"))
            .await
            .unwrap()
            .id
            .unwrap();

        let result = store
            .apply_transition(id, Transition::StartConsultation)
            .await;
        assert!(matches!(result, Err(ServiceError::InvalidTransition(_))));
    }

    #[tokio::test]
    async fn a_completed_consultation_rejects_further_edits() {
        let store = InMemoryConsultationStore::new();
        let id = store
            .create(NewConsultation {
                started_at: Some(t0()),
                notes: notes_with_complaint(),
                ..new_consultation("P1")
            })
            .await
            .unwrap()
            .id
            .unwrap();
        store.apply_transition(id, Transition::Complete).await.unwrap();

        let result = store.update(id, ConsultationUpdate::default()).await;
        assert!(matches!(result, Err(ServiceError::Validation(_))));
    }

    #[tokio::test]
    async fn prescription_requires_an_existing_consultation() {
        let store = InMemoryConsultationStore::new();
        let result = store
            .create_prescription(PrescriptionRequest {
                consultation_id: Uuid::new_v4(),
                patient_id: Uuid::new_v4(),
                items: vec![PrescriptionItem::external("Paracetamol")],
            })
            .await;
        assert!(matches!(result, Err(ServiceError::NotFound(_))));
    }

    #[tokio::test]
    async fn prescription_items_are_validated_before_anything_is_stored() {
        let store = InMemoryConsultationStore::new();
        let record = store.create(new_consultation("P1")).await.unwrap();
        let result = store
            .create_prescription(PrescriptionRequest {
                consultation_id: record.id.unwrap(),
                patient_id: record.patient.unwrap().id,
                items: vec![PrescriptionItem::external("  ")],
            })
            .await;
        assert!(matches!(result, Err(ServiceError::Validation(_))));
    }

    #[tokio::test]
    async fn fetch_attaches_the_stored_prescription() {
        let store = InMemoryConsultationStore::new();
        let record = store.create(new_consultation("P1")).await.unwrap();
        let id = record.id.unwrap();
        let patient_id = record.patient.unwrap().id;

        store
            .create_prescription(PrescriptionRequest {
                consultation_id: id,
                patient_id,
                items: vec![
                    PrescriptionItem::external("Paracetamol"),
                    PrescriptionItem::catalog(MedicationRef {
                        id: Uuid::new_v4(),
                        name: "Amoxicillin".into(),
                    }),
                ],
            })
            .await
            .unwrap();

        let fetched = store.fetch(id).await.unwrap();
        assert_eq!(fetched.prescription_items.len(), 2);
        assert_eq!(fetched.prescription_items[0].medication_name, "Paracetamol");
    }

    #[tokio::test]
    async fn a_second_prescription_for_the_same_visit_is_rejected() {
        let store = InMemoryConsultationStore::new();
        let record = store.create(new_consultation("P1")).await.unwrap();
        let id = record.id.unwrap();
        let patient_id = record.patient.unwrap().id;
        let req = || PrescriptionRequest {
            consultation_id: id,
            patient_id,
            items: vec![PrescriptionItem::external("Paracetamol")],
        };

        store.create_prescription(req()).await.unwrap();
        assert!(matches!(
            store.create_prescription(req()).await,
            Err(ServiceError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn list_filters_by_status_in_arrival_order() {
        let store = InMemoryConsultationStore::new();
        let first = store.create(new_consultation("P1")).await.unwrap();
        let second = store.create(new_consultation("P2")).await.unwrap();
        store
            .create(NewConsultation {
                started_at: Some(t0()),
                ..new_consultation("P3")
            })
            .await
            .unwrap();

        let waiting = store.list(Some(ConsultationStatus::Waiting)).unwrap();
        assert_eq!(
            waiting.iter().map(|r| r.id).collect::<Vec<_>>(),
            vec![first.id, second.id]
        );

        let all = store.list(None).unwrap();
        assert_eq!(all.len(), 3);
    }
}
