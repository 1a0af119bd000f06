//! services/api/src/web/rest.rs
//!
//! Builds the REST router and holds the master definition for the OpenAPI
//! specification.

use axum::{
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        Method,
    },
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::web::dto::{
    ApprovalEmailRequest, AssignVisitRequest, CheckoutRequest, CreateVisitRequest,
    CreateVisitResponse, MessageResponse, NotificationView, NotifyRequestBody, ShiftLoginRequest,
    UnreadRequest, UnreadResponse, VisitDecisionRequest, VisitListResponse, VisitView,
    VisitorData, WarningResponse,
};
use crate::web::middleware::{preflight_no_content, require_auth};
use crate::web::state::AppState;
use crate::web::{notifications, shifts, visits};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        visits::create_visit_handler,
        visits::approve_visit_handler,
        visits::reject_visit_handler,
        visits::assign_visit_handler,
        visits::checkout_visit_handler,
        visits::list_active_visits_handler,
        visits::list_my_visits_handler,
        visits::list_period_visits_handler,
        shifts::shift_login_handler,
        notifications::notify_handler,
        notifications::unread_notifications_handler,
        notifications::approval_email_handler,
    ),
    components(
        schemas(
            CreateVisitRequest, VisitDecisionRequest, AssignVisitRequest, CheckoutRequest,
            ShiftLoginRequest, NotifyRequestBody, VisitorData, UnreadRequest,
            ApprovalEmailRequest, MessageResponse, WarningResponse, VisitView,
            CreateVisitResponse, VisitListResponse, NotificationView, UnreadResponse
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "visits", description = "Visit requests, approvals and check-in/out."),
        (name = "shifts", description = "Security officer duty shifts."),
        (name = "notifications", description = "In-app notifications, push delivery and emails.")
    )
)]
pub struct ApiDoc;

/// Registers the `bearer` security scheme referenced by protected routes.
struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
            );
        }
    }
}

//=========================================================================================
// Router
//=========================================================================================

/// Builds the complete application: API routes, CORS, preflight handling and Swagger UI.
pub fn build_router(app_state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE]);

    // Public routes (no auth required)
    let public_routes = Router::new().route("/visits", post(visits::create_visit_handler));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route("/visits/approve", post(visits::approve_visit_handler))
        .route("/visits/reject", post(visits::reject_visit_handler))
        .route("/visits/assign", post(visits::assign_visit_handler))
        .route("/visits/checkout", post(visits::checkout_visit_handler))
        .route("/visits/active", get(visits::list_active_visits_handler))
        .route("/visits/mine", get(visits::list_my_visits_handler))
        .route("/visits/period", get(visits::list_period_visits_handler))
        .route("/shifts/login", post(shifts::shift_login_handler))
        .route("/notifications", post(notifications::notify_handler))
        .route(
            "/notifications/unread",
            post(notifications::unread_notifications_handler),
        )
        .route(
            "/notifications/approval-email",
            post(notifications::approval_email_handler),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ));

    let api_router = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(app_state);

    // Merge the API router with the Swagger UI router for a complete application.
    Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(cors)
        .layer(axum_middleware::from_fn(preflight_no_content))
}
