//! services/api/src/web/visits.rs
//!
//! Axum handlers for the visit session lifecycle.

use axum::{
    extract::{rejection::JsonRejection, Extension, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use visitor_core::{NewVisitRequest, VisitorError};

use crate::web::dto::{
    required_id, AssignVisitRequest, CheckoutRequest, CreateVisitRequest, CreateVisitResponse,
    MessageResponse, PeriodQuery, VisitDecisionRequest, VisitListResponse, VisitView,
};
use crate::web::failure::{Failure, FailureShape};
use crate::web::middleware::Caller;
use crate::web::state::AppState;

const DEFAULT_PERIOD: &str = "monthly";

/// Submit a visit request for a unit.
///
/// Public: used by the visitor kiosk. The unit's resident is alerted.
#[utoipa::path(
    post,
    path = "/visits",
    tag = "visits",
    request_body = CreateVisitRequest,
    responses(
        (status = 201, description = "Visit request created", body = CreateVisitResponse),
        (status = 400, description = "Missing required fields"),
        (status = 404, description = "No resident for the unit"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn create_visit_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CreateVisitRequest>, JsonRejection>,
) -> Result<impl IntoResponse, Failure> {
    const FALLBACK: &str = "Error creating visit request";

    // 1. Parse the request body
    let Json(body) = payload.map_err(|r| Failure::bad_body(r, FailureShape::Message))?;
    let request = NewVisitRequest {
        visitor_name: body.visitor_name.unwrap_or_default(),
        national_id: body.national_id.unwrap_or_default(),
        visitor_phone: body.visitor_phone.unwrap_or_default(),
        unit_number: body.unit_number.unwrap_or_default(),
    };

    // 2. Create the pending session
    let session = state
        .visits
        .create_request(request)
        .await
        .map_err(|e| Failure::message(e, FALLBACK))?;

    Ok((
        StatusCode::CREATED,
        Json(CreateVisitResponse {
            message: "Visit request created".to_string(),
            data: VisitView::from(session),
        }),
    ))
}

/// Approve a pending visit as the resident of its unit.
#[utoipa::path(
    post,
    path = "/visits/approve",
    tag = "visits",
    request_body = VisitDecisionRequest,
    responses(
        (status = 200, description = "Visit approved", body = MessageResponse),
        (status = 400, description = "Missing visit_id"),
        (status = 403, description = "Caller is not the unit's resident"),
        (status = 404, description = "Visit not found"),
        (status = 409, description = "Visit is no longer pending"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer" = []))
)]
pub async fn approve_visit_handler(
    State(state): State<Arc<AppState>>,
    Extension(Caller(caller)): Extension<Caller>,
    payload: Result<Json<VisitDecisionRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, Failure> {
    const FALLBACK: &str = "Error accepting visit";

    let Json(body) = payload.map_err(|r| Failure::bad_body(r, FailureShape::Error))?;
    let visit_id =
        required_id(body.visit_id.as_deref(), "visit_id").map_err(|e| Failure::error(e, FALLBACK))?;

    state
        .visits
        .approve(visit_id, caller)
        .await
        .map_err(|e| Failure::error(e, FALLBACK))?;

    Ok(Json(MessageResponse::new("Visit Accepted")))
}

/// Reject a pending visit as the resident of its unit.
#[utoipa::path(
    post,
    path = "/visits/reject",
    tag = "visits",
    request_body = VisitDecisionRequest,
    responses(
        (status = 200, description = "Visit rejected", body = MessageResponse),
        (status = 400, description = "Missing visit_id"),
        (status = 403, description = "Caller is not the unit's resident"),
        (status = 404, description = "Visit not found"),
        (status = 409, description = "Visit is no longer pending"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer" = []))
)]
pub async fn reject_visit_handler(
    State(state): State<Arc<AppState>>,
    Extension(Caller(caller)): Extension<Caller>,
    payload: Result<Json<VisitDecisionRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, Failure> {
    const FALLBACK: &str = "Error rejecting visit";

    let Json(body) = payload.map_err(|r| Failure::bad_body(r, FailureShape::Error))?;
    let visit_id =
        required_id(body.visit_id.as_deref(), "visit_id").map_err(|e| Failure::error(e, FALLBACK))?;

    state
        .visits
        .reject(visit_id, caller)
        .await
        .map_err(|e| Failure::error(e, FALLBACK))?;

    Ok(Json(MessageResponse::new("Visit Rejected")))
}

/// Register and approve a walk-in visitor as the on-shift officer.
#[utoipa::path(
    post,
    path = "/visits/assign",
    tag = "visits",
    request_body = AssignVisitRequest,
    responses(
        (status = 200, description = "Walk-in registered and approved", body = MessageResponse),
        (status = 400, description = "Missing required fields"),
        (status = 403, description = "Officer is not on shift or is not the caller"),
        (status = 404, description = "No resident for the unit"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer" = []))
)]
pub async fn assign_visit_handler(
    State(state): State<Arc<AppState>>,
    Extension(Caller(caller)): Extension<Caller>,
    payload: Result<Json<AssignVisitRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, Failure> {
    const FALLBACK: &str = "Error assigning security officer.";

    // 1. Parse the body and check the officer id is the caller's own
    let Json(body) = payload.map_err(|r| Failure::bad_body(r, FailureShape::Message))?;
    let officer = required_id(body.auth_uid.as_deref(), "authUid")
        .map_err(|e| Failure::message(e, FALLBACK))?;
    if officer != caller {
        return Err(Failure::message(
            VisitorError::Authorization("Unauthorized".to_string()),
            FALLBACK,
        ));
    }

    // 2. Insert the approved session
    state
        .visits
        .assign_and_approve(
            body.visitor_id.as_deref().unwrap_or_default(),
            body.unit_number.as_deref().unwrap_or_default(),
            officer,
        )
        .await
        .map_err(|e| Failure::message(e, FALLBACK))?;

    Ok(Json(MessageResponse::new(
        "Visit session created and security officer assigned.",
    )))
}

/// Check out the most recent approved visit for a national id.
#[utoipa::path(
    post,
    path = "/visits/checkout",
    tag = "visits",
    request_body = CheckoutRequest,
    responses(
        (status = 200, description = "Visitor checked out", body = MessageResponse),
        (status = 400, description = "Missing national_id"),
        (status = 404, description = "No approved visit for the national id"),
        (status = 409, description = "Visit was checked out concurrently"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer" = []))
)]
pub async fn checkout_visit_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CheckoutRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, Failure> {
    const FALLBACK: &str = "Failed to check out";

    let Json(body) = payload.map_err(|r| Failure::bad_body(r, FailureShape::Error))?;
    state
        .visits
        .checkout(body.national_id.as_deref().unwrap_or_default())
        .await
        .map_err(|e| Failure::error(e, FALLBACK))?;

    Ok(Json(MessageResponse::new("Visitor checked out")))
}

/// List every approved (checked-in) visit.
#[utoipa::path(
    get,
    path = "/visits/active",
    tag = "visits",
    responses(
        (status = 200, description = "Active visits", body = VisitListResponse),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer" = []))
)]
pub async fn list_active_visits_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<VisitListResponse>, Failure> {
    let sessions = state
        .visits
        .list_active()
        .await
        .map_err(|e| Failure::error(e, "Error fetching active visits"))?;
    Ok(Json(VisitListResponse::from_sessions(sessions)))
}

/// List every visit to the caller's unit, newest first.
#[utoipa::path(
    get,
    path = "/visits/mine",
    tag = "visits",
    responses(
        (status = 200, description = "Visits to the caller's unit", body = VisitListResponse),
        (status = 404, description = "Caller has no profile or unit"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer" = []))
)]
pub async fn list_my_visits_handler(
    State(state): State<Arc<AppState>>,
    Extension(Caller(caller)): Extension<Caller>,
) -> Result<Json<VisitListResponse>, Failure> {
    let sessions = state
        .visits
        .list_for_unit(caller)
        .await
        .map_err(|e| Failure::error(e, "Error fetching visits"))?;
    Ok(Json(VisitListResponse::from_sessions(sessions)))
}

/// List the caller's visits checked in within a reporting period.
#[utoipa::path(
    get,
    path = "/visits/period",
    tag = "visits",
    params(PeriodQuery),
    responses(
        (status = 200, description = "Visits in the period", body = [VisitView]),
        (status = 400, description = "Invalid period"),
        (status = 401, description = "Missing or invalid bearer token"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer" = []))
)]
pub async fn list_period_visits_handler(
    State(state): State<Arc<AppState>>,
    Extension(Caller(caller)): Extension<Caller>,
    Query(query): Query<PeriodQuery>,
) -> Result<Json<Vec<VisitView>>, Failure> {
    let period = query.period.as_deref().unwrap_or(DEFAULT_PERIOD);
    let sessions = state
        .visits
        .list_for_period(period, caller)
        .await
        .map_err(|e| Failure::error(e, "Internal Server Error"))?;
    Ok(Json(sessions.into_iter().map(VisitView::from).collect()))
}
