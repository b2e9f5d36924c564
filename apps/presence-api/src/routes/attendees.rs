use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use utoipa::ToSchema;

use crate::gateway::ids::EventId;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/api/events/{event_id}/attendees", get(get_attendees))
}

/// Current attendee count for an event.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AttendeeCountResponse {
    pub event_id: String,
    pub count: usize,
}

/// Snapshot of the live count. Unknown events report 0; ids are not checked
/// against the event catalog.
#[utoipa::path(
    get,
    path = "/api/events/{event_id}/attendees",
    tag = "Presence",
    params(
        ("event_id" = String, Path, description = "Event ID"),
    ),
    responses(
        (status = 200, description = "Current attendee count", body = AttendeeCountResponse),
    ),
)]
pub async fn get_attendees(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
) -> Json<AttendeeCountResponse> {
    let count = state.presence.count_of(&EventId::from(event_id.as_str()));
    Json(AttendeeCountResponse { event_id, count })
}
