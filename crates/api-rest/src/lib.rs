//! # API REST
//!
//! REST surface of the consultation service.
//!
//! Handles:
//! - HTTP endpoints with axum (consultation CRUD, queue transitions,
//!   prescriptions)
//! - OpenAPI/Swagger documentation
//! - REST-specific concerns (JSON serialization, CORS, status mapping)
//!
//! Uses `api-shared` for the wire types and `consult-core` for the workflow
//! rules. The store in [`store`] is the durable side of the workflow.

#![warn(rust_2018_idioms)]

pub mod store;

use std::str::FromStr;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, patch, post},
    Router,
};
use chrono::Utc;
use serde::Deserialize;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;
use uuid::Uuid;

use api_shared::{
    ConsultationRes, CreateConsultationReq, ErrorRes, HealthRes, HealthService,
    ListConsultationsRes, PrescriptionCreateReq, PrescriptionRes, UpdateConsultationReq,
    WireError,
};
use consult_core::{
    ConsultationService, ConsultationStatus, CoreConfig, ServiceError, Transition,
};

use store::InMemoryConsultationStore;

/// Application state for the REST API server.
///
/// Shared by all request handlers: the resolved configuration and the
/// consultation store.
#[derive(Clone)]
pub struct AppState {
    cfg: Arc<CoreConfig>,
    store: Arc<InMemoryConsultationStore>,
}

impl AppState {
    pub fn new(cfg: CoreConfig) -> Self {
        Self {
            cfg: Arc::new(cfg),
            store: Arc::new(InMemoryConsultationStore::new()),
        }
    }

    /// The shared store, for wiring a workflow session against the same
    /// backing data the HTTP surface serves.
    pub fn store(&self) -> Arc<InMemoryConsultationStore> {
        self.store.clone()
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health,
        create_consultation,
        list_consultations,
        get_consultation,
        update_consultation,
        take_vitals,
        start_consultation,
        complete_consultation,
        create_prescription,
    ),
    components(schemas(
        HealthRes,
        api_shared::VitalsWire,
        api_shared::NotesWire,
        api_shared::PrescriptionItemWire,
        CreateConsultationReq,
        UpdateConsultationReq,
        ConsultationRes,
        ListConsultationsRes,
        PrescriptionCreateReq,
        PrescriptionRes,
        ErrorRes,
    ))
)]
struct ApiDoc;

/// Builds the REST router over the given state.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/consultations", post(create_consultation))
        .route("/consultations", get(list_consultations))
        .route("/consultations/:id", get(get_consultation))
        .route("/consultations/:id", patch(update_consultation))
        .route("/consultations/:id/take-vitals", post(take_vitals))
        .route("/consultations/:id/start-consultation", post(start_consultation))
        .route("/consultations/:id/complete", post(complete_consultation))
        .route("/prescriptions", post(create_prescription))
        .merge(
            SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}

type ApiError = (StatusCode, Json<ErrorRes>);

fn service_error(err: ServiceError) -> ApiError {
    let status = match &err {
        ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
        ServiceError::InvalidTransition(_) => StatusCode::CONFLICT,
        ServiceError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        ServiceError::Unavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        tracing::error!("consultation service error: {err}");
        return (status, Json(ErrorRes { error: "Internal error".into() }));
    }
    (status, Json(ErrorRes { error: err.to_string() }))
}

fn wire_error(err: WireError) -> ApiError {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(ErrorRes { error: err.to_string() }),
    )
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
/// Health check endpoint, used for monitoring and load balancer probes.
#[axum::debug_handler]
async fn health(State(state): State<AppState>) -> Json<HealthRes> {
    Json(HealthService::check_health(state.cfg.clinic_name()))
}

#[utoipa::path(
    post,
    path = "/consultations",
    request_body = CreateConsultationReq,
    responses(
        (status = 201, description = "Consultation created", body = ConsultationRes),
        (status = 422, description = "Invalid payload", body = ErrorRes)
    )
)]
/// Create a consultation.
///
/// Status is derived server-side: `in_consultation` when the payload carries
/// a start timestamp (the web-form path), `waiting` otherwise (the queue
/// path).
///
/// # Errors
/// Returns `422 Unprocessable Entity` if the patient name is blank, the
/// blood pressure reading is malformed, or the timestamps are inconsistent.
#[axum::debug_handler]
async fn create_consultation(
    State(state): State<AppState>,
    Json(req): Json<CreateConsultationReq>,
) -> Result<(StatusCode, Json<ConsultationRes>), ApiError> {
    let new = req.into_new_consultation().map_err(wire_error)?;
    let record = state.store.create(new).await.map_err(service_error)?;
    Ok((
        StatusCode::CREATED,
        Json(ConsultationRes::from_record(record, Utc::now())),
    ))
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
struct QueueQuery {
    /// Narrow the listing to one queue stage (`waiting`, `ready_for_doctor`,
    /// `in_consultation`, `completed`).
    status: Option<String>,
}

#[utoipa::path(
    get,
    path = "/consultations",
    params(QueueQuery),
    responses(
        (status = 200, description = "Consultations in arrival order", body = ListConsultationsRes),
        (status = 422, description = "Unknown status filter", body = ErrorRes)
    )
)]
/// List consultations in arrival order, optionally filtered by queue stage.
///
/// # Errors
/// Returns `422 Unprocessable Entity` if the status filter names an unknown
/// stage.
#[axum::debug_handler]
async fn list_consultations(
    State(state): State<AppState>,
    Query(query): Query<QueueQuery>,
) -> Result<Json<ListConsultationsRes>, ApiError> {
    let status = query
        .status
        .as_deref()
        .map(ConsultationStatus::from_str)
        .transpose()
        .map_err(|e| {
            (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(ErrorRes { error: e }),
            )
        })?;

    let records = state.store.list(status).map_err(service_error)?;
    let now = Utc::now();
    Ok(Json(ListConsultationsRes {
        consultations: records
            .into_iter()
            .map(|record| ConsultationRes::from_record(record, now))
            .collect(),
    }))
}

#[utoipa::path(
    get,
    path = "/consultations/{id}",
    params(("id" = Uuid, Path, description = "Consultation id")),
    responses(
        (status = 200, description = "Consultation with its prescription items", body = ConsultationRes),
        (status = 404, description = "Not found", body = ErrorRes)
    )
)]
/// Fetch one consultation with its nested prescription items.
///
/// # Errors
/// Returns `404 Not Found` if no consultation has that id.
#[axum::debug_handler]
async fn get_consultation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ConsultationRes>, ApiError> {
    let record = state.store.fetch(id).await.map_err(service_error)?;
    Ok(Json(ConsultationRes::from_record(record, Utc::now())))
}

#[utoipa::path(
    patch,
    path = "/consultations/{id}",
    params(("id" = Uuid, Path, description = "Consultation id")),
    request_body = UpdateConsultationReq,
    responses(
        (status = 200, description = "Consultation updated", body = ConsultationRes),
        (status = 404, description = "Not found", body = ErrorRes),
        (status = 422, description = "Invalid payload", body = ErrorRes)
    )
)]
/// Apply a partial update. Omitted fields are left untouched; timing fields
/// are set at most once and never overwritten.
///
/// # Errors
/// Returns `404 Not Found` for an unknown id, `422 Unprocessable Entity` for
/// a malformed payload or an edit to a completed consultation.
#[axum::debug_handler]
async fn update_consultation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateConsultationReq>,
) -> Result<Json<ConsultationRes>, ApiError> {
    let changes = req.into_update().map_err(wire_error)?;
    let record = state
        .store
        .update(id, changes)
        .await
        .map_err(service_error)?;
    Ok(Json(ConsultationRes::from_record(record, Utc::now())))
}

async fn transition(
    state: &AppState,
    id: Uuid,
    transition: Transition,
) -> Result<Json<ConsultationRes>, ApiError> {
    let record = state
        .store
        .apply_transition(id, transition)
        .await
        .map_err(service_error)?;
    Ok(Json(ConsultationRes::from_record(record, Utc::now())))
}

#[utoipa::path(
    post,
    path = "/consultations/{id}/take-vitals",
    params(("id" = Uuid, Path, description = "Consultation id")),
    responses(
        (status = 200, description = "Patient moved to ready_for_doctor", body = ConsultationRes),
        (status = 404, description = "Not found", body = ErrorRes),
        (status = 409, description = "Stage does not permit this transition", body = ErrorRes),
        (status = 422, description = "No vitals recorded yet", body = ErrorRes)
    )
)]
/// Nurse station: mark vitals as taken, `waiting -> ready_for_doctor`.
///
/// # Errors
/// Returns `409 Conflict` when the consultation is not `waiting`, `422` when
/// no vitals have been recorded.
#[axum::debug_handler]
async fn take_vitals(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ConsultationRes>, ApiError> {
    transition(&state, id, Transition::TakeVitals).await
}

#[utoipa::path(
    post,
    path = "/consultations/{id}/start-consultation",
    params(("id" = Uuid, Path, description = "Consultation id")),
    responses(
        (status = 200, description = "Consultation started", body = ConsultationRes),
        (status = 404, description = "Not found", body = ErrorRes),
        (status = 409, description = "Stage does not permit this transition", body = ErrorRes)
    )
)]
/// Doctor opens the record: `ready_for_doctor -> in_consultation`. Stamps
/// the start time if the record has none yet.
///
/// # Errors
/// Returns `409 Conflict` when the consultation is not `ready_for_doctor`.
#[axum::debug_handler]
async fn start_consultation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ConsultationRes>, ApiError> {
    transition(&state, id, Transition::StartConsultation).await
}

#[utoipa::path(
    post,
    path = "/consultations/{id}/complete",
    params(("id" = Uuid, Path, description = "Consultation id")),
    responses(
        (status = 200, description = "Consultation completed", body = ConsultationRes),
        (status = 404, description = "Not found", body = ErrorRes),
        (status = 409, description = "Stage does not permit this transition", body = ErrorRes),
        (status = 422, description = "Chief complaint missing", body = ErrorRes)
    )
)]
/// Finalize the visit: `in_consultation -> completed`. Stamps the end time
/// if the record has none, never earlier than the start.
///
/// # Errors
/// Returns `409 Conflict` when the consultation is not `in_consultation`,
/// `422` when the clinical notes lack a chief complaint.
#[axum::debug_handler]
async fn complete_consultation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ConsultationRes>, ApiError> {
    transition(&state, id, Transition::Complete).await
}

#[utoipa::path(
    post,
    path = "/prescriptions",
    request_body = PrescriptionCreateReq,
    responses(
        (status = 201, description = "Prescription created", body = PrescriptionRes),
        (status = 404, description = "Consultation not found", body = ErrorRes),
        (status = 422, description = "Invalid items", body = ErrorRes)
    )
)]
/// Create the prescription for a consultation.
///
/// This write is independent of the consultation write: it can fail on its
/// own and be retried without touching the consultation.
///
/// # Errors
/// Returns `404 Not Found` for an unknown consultation, `422 Unprocessable
/// Entity` for an empty or invalid item list or a patient mismatch.
#[axum::debug_handler]
async fn create_prescription(
    State(state): State<AppState>,
    Json(req): Json<PrescriptionCreateReq>,
) -> Result<(StatusCode, Json<PrescriptionRes>), ApiError> {
    let id = state
        .store
        .create_prescription(req.into())
        .await
        .map_err(service_error)?;
    Ok((StatusCode::CREATED, Json(PrescriptionRes { id })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use consult_core::{
        Command, ConsultationSession, PatientRef, PrescriptionItem, SaveMode, SystemClock,
    };
    use consult_types::NonEmptyText;
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn test_state() -> AppState {
        AppState::new(CoreConfig::new("Cabinet Nord".into()).unwrap())
    }

    fn test_app() -> Router {
        app(test_state())
    }

    async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn patch_json(uri: &str, body: Value) -> Request<Body> {
        Request::patch(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_req(uri: &str) -> Request<Body> {
        Request::get(uri).body(Body::empty()).unwrap()
    }

    fn create_body(name: &str) -> Value {
        json!({
            "patient_id": Uuid::new_v4(),
            "patient_name": name,
            "started_at": null,
            "ended_at": null
        })
    }

    #[tokio::test]
    async fn health_names_the_clinic() {
        let app = test_app();
        let (status, body) = send(&app, get_req("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], true);
        assert_eq!(body["message"], "Cabinet Nord consultation service is alive");
    }

    #[tokio::test]
    async fn a_visit_walks_the_queue_over_http() {
        let app = test_app();

        let (status, created) = send(&app, post_json("/consultations", create_body("P1"))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["status"], "waiting");
        assert_eq!(created["elapsed_seconds"], 0);
        let id = created["id"].as_str().unwrap().to_owned();

        // Nurse records vitals, then moves the patient along.
        let (status, _) = send(
            &app,
            patch_json(
                &format!("/consultations/{id}"),
                json!({"vitals": {"temperature": "37.2", "blood_pressure": "120/80"}}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) =
            send(&app, post_json(&format!("/consultations/{id}/take-vitals"), json!({}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ready_for_doctor");

        let (status, body) = send(
            &app,
            post_json(&format!("/consultations/{id}/start-consultation"), json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "in_consultation");
        assert!(body["started_at"].is_string());

        let (status, _) = send(
            &app,
            patch_json(
                &format!("/consultations/{id}"),
                json!({"notes": {"chief_complaint": "persistent cough"}}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) =
            send(&app, post_json(&format!("/consultations/{id}/complete"), json!({}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "completed");
        assert!(body["ended_at"].is_string());
    }

    #[tokio::test]
    async fn unknown_consultations_are_not_found() {
        let app = test_app();
        let (status, body) =
            send(&app, get_req(&format!("/consultations/{}", Uuid::new_v4()))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].as_str().unwrap().contains("not found"));
    }

    #[tokio::test]
    async fn out_of_order_transitions_conflict() {
        let app = test_app();
        let (_, created) = send(&app, post_json("/consultations", create_body("P1"))).await;
        let id = created["id"].as_str().unwrap().to_owned();

        let (status, body) =
            send(&app, post_json(&format!("/consultations/{id}/complete"), json!({}))).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(body["error"].as_str().unwrap().contains("cannot move"));
    }

    #[tokio::test]
    async fn a_malformed_blood_pressure_is_rejected() {
        let app = test_app();
        let mut body = create_body("P1");
        body["vitals"] = json!({"blood_pressure": "not-a-reading"});
        let (status, body) = send(&app, post_json("/consultations", body)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["error"].as_str().unwrap().contains("blood pressure"));
    }

    #[tokio::test]
    async fn an_unknown_status_filter_is_rejected() {
        let app = test_app();
        let (status, body) = send(&app, get_req("/consultations?status=paused")).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["error"].as_str().unwrap().contains("paused"));
    }

    #[tokio::test]
    async fn the_queue_lists_waiting_visits_in_arrival_order() {
        let app = test_app();
        let (_, first) = send(&app, post_json("/consultations", create_body("P1"))).await;
        let (_, second) = send(&app, post_json("/consultations", create_body("P2"))).await;

        let (status, body) = send(&app, get_req("/consultations?status=waiting")).await;
        assert_eq!(status, StatusCode::OK);
        let ids: Vec<&str> = body["consultations"]
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["id"].as_str().unwrap())
            .collect();
        assert_eq!(ids, vec![first["id"].as_str().unwrap(), second["id"].as_str().unwrap()]);
    }

    #[tokio::test]
    async fn prescriptions_are_written_and_attached() {
        let app = test_app();
        let (_, created) = send(&app, post_json("/consultations", create_body("P1"))).await;
        let id = created["id"].as_str().unwrap().to_owned();
        let patient_id = created["patient_id"].as_str().unwrap().to_owned();

        let (status, body) = send(
            &app,
            post_json(
                "/prescriptions",
                json!({
                    "consultation_id": id,
                    "patient_id": patient_id,
                    "items": [{
                        "medication_id": null,
                        "medication_name": "Paracetamol",
                        "dosage": "500mg",
                        "is_external": true
                    }]
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert!(body["id"].is_string());

        let (_, fetched) = send(&app, get_req(&format!("/consultations/{id}"))).await;
        let items = fetched["prescription_items"].as_array().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["medication_name"], "Paracetamol");
        assert_eq!(items[0]["medication_id"], Value::Null);
    }

    #[tokio::test]
    async fn an_empty_prescription_is_rejected() {
        let app = test_app();
        let (_, created) = send(&app, post_json("/consultations", create_body("P1"))).await;
        let (status, _) = send(
            &app,
            post_json(
                "/prescriptions",
                json!({
                    "consultation_id": created["id"],
                    "patient_id": created["patient_id"],
                    "items": []
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    // The workflow session and the HTTP surface share one store; what the
    // session saves must be what the API serves.
    #[tokio::test]
    async fn a_workflow_session_feeds_the_http_queue() {
        let state = test_state();
        let app = app(state.clone());

        let mut session = ConsultationSession::new(state.store(), SystemClock);
        session
            .apply(Command::SelectPatient(PatientRef {
                id: Uuid::new_v4(),
                display_name: NonEmptyText::new("Awa Diallo").unwrap(),
            }))
            .unwrap();
        session
            .apply(Command::SetNotes(consult_core::ClinicalNotes {
                chief_complaint: Some("persistent cough".into()),
                ..Default::default()
            }))
            .unwrap();
        session
            .apply(Command::AddMedicationItem(PrescriptionItem::external(
                "Paracetamol",
            )))
            .unwrap();

        let outcome = session.save(SaveMode::Finalize).await.unwrap();
        let id = outcome.consultation.id.unwrap();
        assert!(outcome.prescription_id.is_some());

        let (status, body) = send(&app, get_req(&format!("/consultations/{id}"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "completed");
        assert_eq!(body["patient_name"], "Awa Diallo");
        assert_eq!(body["prescription_items"][0]["medication_name"], "Paracetamol");

        let (_, listed) = send(&app, get_req("/consultations?status=completed")).await;
        assert_eq!(listed["consultations"].as_array().unwrap().len(), 1);
    }
}
