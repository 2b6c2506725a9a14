use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;

use super::appeal::{AppealError, AppealService};
use super::audit::{AuditAction, AuditQuery};
use super::domain::{AppealId, AppealState, AppealVerdict, DocumentId, EligibilityStatus, InstitutionId};
use super::repository::{AppealFilter, DecisionFilter, RepositoryError};
use super::service::{DocumentUpload, VerificationService, VerificationServiceError};

/// Shared handler state: the verification pipeline and the appeal workflow.
#[derive(Clone)]
pub struct VerificationApi {
    pub verification: Arc<VerificationService>,
    pub appeals: Arc<AppealService>,
}

/// Router builder exposing the institution-facing and operator endpoints.
pub fn verification_router(api: VerificationApi) -> Router {
    Router::new()
        .route("/api/v1/institutions", post(register_handler))
        .route("/api/v1/institutions/:institution_id", get(status_handler))
        .route(
            "/api/v1/institutions/:institution_id/documents",
            post(upload_handler),
        )
        .route(
            "/api/v1/institutions/:institution_id/verify",
            post(verify_handler),
        )
        .route(
            "/api/v1/institutions/:institution_id/expire",
            post(expire_handler),
        )
        .route(
            "/api/v1/institutions/:institution_id/audit",
            get(audit_trail_handler),
        )
        .route(
            "/api/v1/institutions/:institution_id/appeals",
            post(submit_appeal_handler),
        )
        .route("/api/v1/appeals/:appeal_id", get(appeal_handler))
        .route("/api/v1/appeals/:appeal_id/assign", post(assign_handler))
        .route(
            "/api/v1/appeals/:appeal_id/request-info",
            post(request_info_handler),
        )
        .route("/api/v1/appeals/:appeal_id/resubmit", post(resubmit_handler))
        .route("/api/v1/appeals/:appeal_id/decide", post(decide_handler))
        .route("/api/v1/admin/decisions", get(decisions_handler))
        .route("/api/v1/admin/decisions/export", get(export_handler))
        .route("/api/v1/admin/appeals", get(appeals_handler))
        .route("/api/v1/admin/audit", get(audit_query_handler))
        .with_state(api)
}

#[derive(Debug, Deserialize)]
pub struct RegisterInstitutionRequest {
    pub name: String,
    pub student_count: u32,
}

#[derive(Debug, Deserialize)]
pub struct SubmitAppealRequest {
    pub justification: String,
    #[serde(default)]
    pub evidence: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct AssignAppealRequest {
    pub reviewer_id: String,
}

#[derive(Debug, Deserialize)]
pub struct RequestInfoRequest {
    #[serde(default)]
    pub requested_documents: Vec<String>,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct ResubmitAppealRequest {
    #[serde(default)]
    pub evidence: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct DecideAppealRequest {
    pub verdict: AppealVerdict,
    pub reason: String,
    pub reviewer_id: String,
    pub extend_grace_period_days: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DecisionQuery {
    pub institution_id: Option<String>,
    pub status: Option<EligibilityStatus>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl DecisionQuery {
    fn into_filter(self) -> DecisionFilter {
        DecisionFilter {
            institution_id: self.institution_id.map(InstitutionId),
            status: self.status,
            from: self.from,
            to: self.to,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct AppealQuery {
    pub institution_id: Option<String>,
    pub state: Option<AppealState>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl AppealQuery {
    fn into_filter(self) -> AppealFilter {
        AppealFilter {
            institution_id: self.institution_id.map(InstitutionId),
            state: self.state,
            from: self.from,
            to: self.to,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct AuditQueryParams {
    pub institution_id: Option<String>,
    pub action: Option<AuditAction>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl AuditQueryParams {
    fn into_query(self) -> AuditQuery {
        AuditQuery {
            institution_id: self.institution_id.map(InstitutionId),
            action: self.action,
            from: self.from,
            to: self.to,
        }
    }
}

pub(crate) async fn register_handler(
    State(api): State<VerificationApi>,
    axum::Json(request): axum::Json<RegisterInstitutionRequest>,
) -> Response {
    match api
        .verification
        .register_institution(&request.name, request.student_count)
    {
        Ok(institution) => (StatusCode::CREATED, axum::Json(institution)).into_response(),
        Err(error) => verification_error_response(error),
    }
}

pub(crate) async fn status_handler(
    State(api): State<VerificationApi>,
    Path(institution_id): Path<String>,
) -> Response {
    let id = InstitutionId(institution_id);
    match api.verification.status(&id) {
        Ok(view) => (StatusCode::OK, axum::Json(view)).into_response(),
        Err(error) => verification_error_response(error),
    }
}

pub(crate) async fn upload_handler(
    State(api): State<VerificationApi>,
    Path(institution_id): Path<String>,
    axum::Json(upload): axum::Json<DocumentUpload>,
) -> Response {
    let id = InstitutionId(institution_id);
    match api.verification.upload_document(&id, upload) {
        Ok(document) => (StatusCode::CREATED, axum::Json(document)).into_response(),
        Err(error) => verification_error_response(error),
    }
}

pub(crate) async fn verify_handler(
    State(api): State<VerificationApi>,
    Path(institution_id): Path<String>,
) -> Response {
    let id = InstitutionId(institution_id);
    match api.verification.run_verification(&id).await {
        Ok(run) => (StatusCode::OK, axum::Json(run)).into_response(),
        Err(error) => verification_error_response(error),
    }
}

pub(crate) async fn expire_handler(
    State(api): State<VerificationApi>,
    Path(institution_id): Path<String>,
) -> Response {
    let id = InstitutionId(institution_id);
    match api.verification.expire(&id, Utc::now()) {
        Ok(decision) => {
            let payload = json!({
                "expired": decision.is_some(),
                "decision": decision,
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(error) => verification_error_response(error),
    }
}

pub(crate) async fn audit_trail_handler(
    State(api): State<VerificationApi>,
    Path(institution_id): Path<String>,
) -> Response {
    let id = InstitutionId(institution_id);
    match api.verification.audit_trail(&id) {
        Ok(records) => (StatusCode::OK, axum::Json(records)).into_response(),
        Err(error) => verification_error_response(error),
    }
}

pub(crate) async fn submit_appeal_handler(
    State(api): State<VerificationApi>,
    Path(institution_id): Path<String>,
    axum::Json(request): axum::Json<SubmitAppealRequest>,
) -> Response {
    let id = InstitutionId(institution_id);
    let evidence = request.evidence.into_iter().map(DocumentId).collect();
    match api.appeals.submit(&id, &request.justification, evidence) {
        Ok(appeal) => (StatusCode::ACCEPTED, axum::Json(appeal)).into_response(),
        Err(error) => appeal_error_response(error),
    }
}

pub(crate) async fn appeal_handler(
    State(api): State<VerificationApi>,
    Path(appeal_id): Path<String>,
) -> Response {
    let id = AppealId(appeal_id);
    match api.appeals.get(&id) {
        Ok(appeal) => (StatusCode::OK, axum::Json(appeal)).into_response(),
        Err(error) => appeal_error_response(error),
    }
}

pub(crate) async fn assign_handler(
    State(api): State<VerificationApi>,
    Path(appeal_id): Path<String>,
    axum::Json(request): axum::Json<AssignAppealRequest>,
) -> Response {
    let id = AppealId(appeal_id);
    match api.appeals.assign(&id, &request.reviewer_id) {
        Ok(appeal) => (StatusCode::OK, axum::Json(appeal)).into_response(),
        Err(error) => appeal_error_response(error),
    }
}

pub(crate) async fn request_info_handler(
    State(api): State<VerificationApi>,
    Path(appeal_id): Path<String>,
    axum::Json(request): axum::Json<RequestInfoRequest>,
) -> Response {
    let id = AppealId(appeal_id);
    match api
        .appeals
        .request_more_info(&id, request.requested_documents, &request.message)
    {
        Ok(appeal) => (StatusCode::OK, axum::Json(appeal)).into_response(),
        Err(error) => appeal_error_response(error),
    }
}

pub(crate) async fn resubmit_handler(
    State(api): State<VerificationApi>,
    Path(appeal_id): Path<String>,
    axum::Json(request): axum::Json<ResubmitAppealRequest>,
) -> Response {
    let id = AppealId(appeal_id);
    let evidence = request.evidence.into_iter().map(DocumentId).collect();
    match api.appeals.resubmit(&id, evidence) {
        Ok(appeal) => (StatusCode::OK, axum::Json(appeal)).into_response(),
        Err(error) => appeal_error_response(error),
    }
}

pub(crate) async fn decide_handler(
    State(api): State<VerificationApi>,
    Path(appeal_id): Path<String>,
    axum::Json(request): axum::Json<DecideAppealRequest>,
) -> Response {
    let id = AppealId(appeal_id);
    match api.appeals.decide(
        &id,
        request.verdict,
        &request.reason,
        &request.reviewer_id,
        request.extend_grace_period_days,
    ) {
        Ok(appeal) => (StatusCode::OK, axum::Json(appeal)).into_response(),
        Err(error) => appeal_error_response(error),
    }
}

pub(crate) async fn decisions_handler(
    State(api): State<VerificationApi>,
    Query(query): Query<DecisionQuery>,
) -> Response {
    match api.verification.decisions(&query.into_filter()) {
        Ok(decisions) => (StatusCode::OK, axum::Json(decisions)).into_response(),
        Err(error) => verification_error_response(error),
    }
}

pub(crate) async fn export_handler(
    State(api): State<VerificationApi>,
    Query(query): Query<DecisionQuery>,
) -> Response {
    match api.verification.export_decisions_csv(&query.into_filter()) {
        Ok(csv) => ([(header::CONTENT_TYPE, "text/csv")], csv).into_response(),
        Err(error) => verification_error_response(error),
    }
}

pub(crate) async fn appeals_handler(
    State(api): State<VerificationApi>,
    Query(query): Query<AppealQuery>,
) -> Response {
    match api.appeals.list(&query.into_filter()) {
        Ok(appeals) => (StatusCode::OK, axum::Json(appeals)).into_response(),
        Err(error) => appeal_error_response(error),
    }
}

pub(crate) async fn audit_query_handler(
    State(api): State<VerificationApi>,
    Query(query): Query<AuditQueryParams>,
) -> Response {
    match api.verification.audit_query(&query.into_query()) {
        Ok(records) => (StatusCode::OK, axum::Json(records)).into_response(),
        Err(error) => verification_error_response(error),
    }
}

fn verification_error_response(error: VerificationServiceError) -> Response {
    let status = match &error {
        VerificationServiceError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        VerificationServiceError::Repository(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
        VerificationServiceError::Repository(
            RepositoryError::Conflict | RepositoryError::OpenAppealExists,
        ) => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        tracing::error!(%error, "verification request failed");
    }
    (status, axum::Json(json!({ "error": error.to_string() }))).into_response()
}

fn appeal_error_response(error: AppealError) -> Response {
    let status = match &error {
        AppealError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        AppealError::InvalidTransition { .. } => StatusCode::CONFLICT,
        AppealError::Repository(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
        AppealError::Repository(RepositoryError::Conflict | RepositoryError::OpenAppealExists) => {
            StatusCode::CONFLICT
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        tracing::error!(%error, "appeal request failed");
    }
    (status, axum::Json(json!({ "error": error.to_string() }))).into_response()
}
