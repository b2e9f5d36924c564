pub mod attendees;
pub mod health;

use axum::Router;
use utoipa::OpenApi;

use crate::error::ApiError;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(attendees::router())
        .merge(crate::gateway::server::router())
        .fallback(not_found)
}

async fn not_found() -> ApiError {
    ApiError::not_found("Route not found")
}

#[derive(OpenApi)]
#[openapi(
    paths(
        // Health
        health::index,
        health::health,
        // Presence
        attendees::get_attendees,
    ),
    components(
        schemas(
            // Error types
            crate::error::ApiErrorBody,
            crate::error::ApiErrorDetail,
            // Route request/response types
            health::HealthResponse,
            attendees::AttendeeCountResponse,
        )
    ),
    tags(
        (name = "Health", description = "Health check"),
        (name = "Presence", description = "Live attendee counts"),
    )
)]
pub struct ApiDoc;
