use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde_json::json;
use utoipa::OpenApi;
use uuid::Uuid;
use validator::Validate;

use crate::error::ServerError;
use crate::middleware::AuthUser;
use crate::schemas::api::appointments::{
    AppointmentResponse, AvailabilityQuery, AvailabilityResponse, CreateAppointmentRequest, ListAppointmentsQuery,
    SlotResponse, UpdateAppointmentRequest,
};
use crate::services::{AppointmentChanges, ListQuery, NewBooking};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(
        list_appointments,
        create_appointment,
        get_appointment,
        update_appointment,
        cancel_appointment,
        availability
    ),
    components(schemas(
        AppointmentResponse,
        CreateAppointmentRequest,
        UpdateAppointmentRequest,
        AvailabilityResponse,
        SlotResponse
    ))
)]
pub struct AppointmentsApi;

/// Routes nested under `/api/appointments`.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_appointments).post(create_appointment))
        .route("/availability", get(availability))
        .route(
            "/{id}",
            get(get_appointment).put(update_appointment).delete(cancel_appointment),
        )
}

#[utoipa::path(
    get,
    path = "/api/appointments",
    tag = "appointments",
    params(ListAppointmentsQuery),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Appointments visible to the caller", body = Vec<AppointmentResponse>),
        (status = 401, description = "Missing or invalid token"),
    )
)]
pub async fn list_appointments(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Query(query): Query<ListAppointmentsQuery>,
) -> Result<Json<Vec<AppointmentResponse>>, ServerError> {
    let query = ListQuery { status: query.status, upcoming: query.upcoming.unwrap_or(false) };
    let found = state.booking.list(user.actor(), query, Utc::now()).await?;
    Ok(Json(found.iter().map(|a| a.to_response()).collect()))
}

#[utoipa::path(
    post,
    path = "/api/appointments",
    tag = "appointments",
    request_body = CreateAppointmentRequest,
    security(("bearer" = [])),
    responses(
        (status = 201, description = "Booked", body = AppointmentResponse),
        (status = 400, description = "Start is in the past, off the slot grid or outside opening hours"),
        (status = 404, description = "Unknown provider"),
        (status = 409, description = "Slot already booked"),
    )
)]
pub async fn create_appointment(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(req): Json<CreateAppointmentRequest>,
) -> Result<(StatusCode, Json<AppointmentResponse>), ServerError> {
    req.validate()?;
    let booking = NewBooking {
        provider_id: req.provider_id,
        start_time: req.start_time,
        reason: req.reason,
        metadata: req.metadata.unwrap_or_else(|| json!({})),
    };
    let appointment = state.booking.book(user.id, booking, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(appointment.to_response())))
}

#[utoipa::path(
    get,
    path = "/api/appointments/{id}",
    tag = "appointments",
    params(("id" = Uuid, Path, description = "Appointment id")),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "The appointment", body = AppointmentResponse),
        (status = 404, description = "Missing or not visible to the caller"),
    )
)]
pub async fn get_appointment(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<AppointmentResponse>, ServerError> {
    let appointment = state.booking.get(user.actor(), id).await?;
    Ok(Json(appointment.to_response()))
}

#[utoipa::path(
    put,
    path = "/api/appointments/{id}",
    tag = "appointments",
    params(("id" = Uuid, Path, description = "Appointment id")),
    request_body = UpdateAppointmentRequest,
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Updated", body = AppointmentResponse),
        (status = 400, description = "Invalid new start, or the appointment is no longer scheduled"),
        (status = 403, description = "Only the provider can complete"),
        (status = 404, description = "Missing or not visible to the caller"),
        (status = 409, description = "New slot already booked"),
    )
)]
pub async fn update_appointment(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateAppointmentRequest>,
) -> Result<Json<AppointmentResponse>, ServerError> {
    req.validate()?;
    let changes = AppointmentChanges { start_time: req.start_time, reason: req.reason, status: req.status };
    let appointment = state.booking.update(user.actor(), id, changes, Utc::now()).await?;
    Ok(Json(appointment.to_response()))
}

#[utoipa::path(
    delete,
    path = "/api/appointments/{id}",
    tag = "appointments",
    params(("id" = Uuid, Path, description = "Appointment id")),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Cancelled", body = AppointmentResponse),
        (status = 404, description = "Missing or not visible to the caller"),
    )
)]
pub async fn cancel_appointment(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<AppointmentResponse>, ServerError> {
    let appointment = state.booking.cancel(user.actor(), id, Utc::now()).await?;
    Ok(Json(appointment.to_response()))
}

#[utoipa::path(
    get,
    path = "/api/appointments/availability",
    tag = "appointments",
    params(AvailabilityQuery),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Free slots on that day", body = AvailabilityResponse),
        (status = 404, description = "Unknown provider"),
    )
)]
pub async fn availability(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<AvailabilityResponse>, ServerError> {
    let slots = state.booking.availability(query.provider_id, query.date, Utc::now()).await?;
    Ok(Json(AvailabilityResponse {
        provider_id: query.provider_id,
        date: query.date,
        slots: slots.into_iter().map(SlotResponse::from).collect(),
    }))
}

#[cfg(test)]
mod test {
    use crate::routes::test::{app_with, json_body, quiet_config, register, request};
    use axum::http::{Method, StatusCode};
    use chrono::{Duration, NaiveTime, Utc};
    use serde_json::json;
    use tower::ServiceExt;

    /// Ten o'clock, a week from today.
    fn next_week_at_ten() -> String {
        let day = (Utc::now() + Duration::days(7)).date_naive();
        day.and_time(NaiveTime::from_hms_opt(10, 0, 0).unwrap()).and_utc().to_rfc3339()
    }

    #[tokio::test]
    async fn booking_conflicts_until_cancelled() {
        let (app, _) = app_with(quiet_config());
        let (alice, _) = register(&app, "alice@example.com", "patient").await;
        let (bob, _) = register(&app, "bob@example.com", "patient").await;
        let (_, doctor) = register(&app, "doc@example.com", "provider").await;
        let body = json!({ "provider_id": doctor, "start_time": next_week_at_ten(), "reason": "checkup" });

        let first = app
            .clone()
            .oneshot(request(Method::POST, "/api/appointments", Some(&alice), Some(body.clone())))
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::CREATED);
        let id = json_body(first).await["id"].as_str().unwrap().to_owned();

        let clash = app
            .clone()
            .oneshot(request(Method::POST, "/api/appointments", Some(&bob), Some(body.clone())))
            .await
            .unwrap();
        assert_eq!(clash.status(), StatusCode::CONFLICT);
        assert_eq!(json_body(clash).await["error"], "slot already booked");

        // Bob cannot see, and so cannot cancel, Alice's booking.
        let uri = format!("/api/appointments/{id}");
        let foreign = app.clone().oneshot(request(Method::DELETE, &uri, Some(&bob), None)).await.unwrap();
        assert_eq!(foreign.status(), StatusCode::NOT_FOUND);

        let cancelled = app.clone().oneshot(request(Method::DELETE, &uri, Some(&alice), None)).await.unwrap();
        assert_eq!(cancelled.status(), StatusCode::OK);
        assert_eq!(json_body(cancelled).await["status"], "cancelled");

        let retry = app
            .oneshot(request(Method::POST, "/api/appointments", Some(&bob), Some(body)))
            .await
            .unwrap();
        assert_eq!(retry.status(), StatusCode::CREATED);
    }

    #[tokio::test]
    async fn availability_and_listing() {
        let (app, _) = app_with(quiet_config());
        let (alice, _) = register(&app, "alice@example.com", "patient").await;
        let (doc_token, doctor) = register(&app, "doc@example.com", "provider").await;
        let start = next_week_at_ten();
        let date = &start[..10];

        let uri = format!("/api/appointments/availability?provider_id={doctor}&date={date}");
        let before = json_body(app.clone().oneshot(request(Method::GET, &uri, Some(&alice), None)).await.unwrap()).await;
        assert_eq!(before["slots"].as_array().unwrap().len(), 16);

        let body = json!({ "provider_id": doctor, "start_time": start });
        app.clone()
            .oneshot(request(Method::POST, "/api/appointments", Some(&alice), Some(body)))
            .await
            .unwrap();

        let after = json_body(app.clone().oneshot(request(Method::GET, &uri, Some(&alice), None)).await.unwrap()).await;
        assert_eq!(after["slots"].as_array().unwrap().len(), 15);

        let mine = app
            .clone()
            .oneshot(request(Method::GET, "/api/appointments?upcoming=true", Some(&doc_token), None))
            .await
            .unwrap();
        assert_eq!(json_body(mine).await.as_array().unwrap().len(), 1);

        let providers = app.oneshot(request(Method::GET, "/api/providers", Some(&alice), None)).await.unwrap();
        assert_eq!(json_body(providers).await[0]["id"], doctor);
    }

    #[tokio::test]
    async fn off_grid_start_is_a_bad_request() {
        let (app, _) = app_with(quiet_config());
        let (alice, _) = register(&app, "alice@example.com", "patient").await;
        let (_, doctor) = register(&app, "doc@example.com", "provider").await;
        let start = next_week_at_ten().replace("10:00:00", "10:10:00");
        let body = json!({ "provider_id": doctor, "start_time": start });
        let response = app
            .oneshot(request(Method::POST, "/api/appointments", Some(&alice), Some(body)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn appointments_need_a_token() {
        let (app, _) = app_with(quiet_config());
        let response = app.oneshot(request(Method::GET, "/api/appointments", None, None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
