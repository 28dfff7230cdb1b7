//! HTTP routes.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::routing::post;
use axum::{Json, Router};
use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tower_http::cors::CorsLayer;

use almanac_store::{Database, EventPatch, EventRow, NewEvent, StoreError};

use crate::ApiError;
use crate::auth::{AuthUser, issue_token};
use crate::service::EventService;

const HOLIDAY_API_URL: &str = "https://holidayapi.com/v1/holidays";

/// Shared application state.
pub struct AppState {
    pub db: Arc<Database>,
    pub service: EventService,
    pub jwt_secret: String,
    pub holiday_api_key: Option<String>,
    pub http: reqwest::Client,
}

/// Create the API router.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/auth/me", get(me))
        .route("/events", get(list_events).post(create_event))
        .route(
            "/events/{event_id}",
            get(get_event).put(update_event).delete(delete_event),
        )
        .route("/holidays", get(holidays))
        .route("/holidays/{country_code}", get(holidays))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// =============================================================================
// Auth
// =============================================================================

#[derive(Deserialize)]
struct CredentialsRequest {
    email: String,
    password: String,
}

async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CredentialsRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.email.trim().is_empty() || req.password.is_empty() {
        return Err(ApiError::BadRequest(
            "email and password are required".to_string(),
        ));
    }

    let user = match state.db.create_user(&req.email, &req.password) {
        Ok(user) => user,
        Err(StoreError::DuplicateEmail(_)) => {
            return Err(ApiError::BadRequest("user already exists".to_string()));
        }
        Err(e) => return Err(e.into()),
    };

    Ok((
        StatusCode::CREATED,
        Json(json!({ "id": user.id, "email": user.email })),
    ))
}

async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CredentialsRequest>,
) -> Result<Json<Value>, ApiError> {
    let user = state.db.find_user_by_email(&req.email)?;

    // TODO: hash passwords instead of storing and comparing them as-is
    match user {
        Some(user) if user.password == req.password => {
            let token = issue_token(&state.jwt_secret, user.id)?;
            Ok(Json(json!({
                "access_token": token,
                "user": { "id": user.id, "email": user.email },
            })))
        }
        _ => Err(ApiError::Unauthorized("invalid credentials".to_string())),
    }
}

async fn me(
    AuthUser(user_id): AuthUser,
    State(state): State<Arc<AppState>>,
) -> Result<Json<Value>, ApiError> {
    let user = state
        .db
        .get_user(user_id)?
        .ok_or_else(|| ApiError::Unauthorized("unknown user".to_string()))?;
    Ok(Json(json!({ "id": user.id, "email": user.email })))
}

// =============================================================================
// Events
// =============================================================================

#[derive(Serialize)]
struct EventResponse {
    id: i64,
    title: String,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    description: Option<String>,
    participants: Vec<String>,
    timezone: String,
    started: bool,
}

impl From<EventRow> for EventResponse {
    fn from(event: EventRow) -> Self {
        Self {
            id: event.id,
            title: event.title,
            start_time: event.start_time,
            end_time: event.end_time,
            description: event.description,
            participants: event.participants,
            timezone: event.timezone,
            started: event.started,
        }
    }
}

#[derive(Deserialize)]
struct CreateEventRequest {
    title: String,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    description: Option<String>,
    #[serde(default)]
    participants: Vec<String>,
    timezone: String,
}

#[derive(Deserialize, Default)]
struct UpdateEventRequest {
    title: Option<String>,
    start_time: Option<DateTime<Utc>>,
    end_time: Option<DateTime<Utc>>,
    description: Option<String>,
    participants: Option<Vec<String>>,
    timezone: Option<String>,
}

async fn list_events(
    AuthUser(user_id): AuthUser,
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<EventResponse>>, ApiError> {
    let events = state.service.list(user_id)?;
    Ok(Json(events.into_iter().map(EventResponse::from).collect()))
}

async fn create_event(
    AuthUser(user_id): AuthUser,
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateEventRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let created = state
        .service
        .create(
            user_id,
            NewEvent {
                title: req.title,
                start_time: req.start_time,
                end_time: req.end_time,
                description: req.description,
                participants: req.participants,
                timezone: req.timezone,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(EventResponse::from(created))))
}

async fn get_event(
    AuthUser(user_id): AuthUser,
    State(state): State<Arc<AppState>>,
    Path(event_id): Path<i64>,
) -> Result<Json<EventResponse>, ApiError> {
    let event = state.service.get(user_id, event_id)?;
    Ok(Json(EventResponse::from(event)))
}

async fn update_event(
    AuthUser(user_id): AuthUser,
    State(state): State<Arc<AppState>>,
    Path(event_id): Path<i64>,
    Json(req): Json<UpdateEventRequest>,
) -> Result<Json<EventResponse>, ApiError> {
    let patch = EventPatch {
        title: req.title,
        start_time: req.start_time,
        end_time: req.end_time,
        description: req.description,
        participants: req.participants,
        timezone: req.timezone,
    };
    let updated = state.service.update(user_id, event_id, patch).await?;
    Ok(Json(EventResponse::from(updated)))
}

async fn delete_event(
    AuthUser(user_id): AuthUser,
    State(state): State<Arc<AppState>>,
    Path(event_id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    state.service.delete(user_id, event_id).await?;
    Ok(Json(json!({ "message": "event deleted" })))
}

// =============================================================================
// Holidays (passthrough proxy)
// =============================================================================

async fn holidays(
    AuthUser(_user_id): AuthUser,
    State(state): State<Arc<AppState>>,
    country_code: Option<Path<String>>,
) -> Result<Json<Value>, ApiError> {
    let Some(key) = &state.holiday_api_key else {
        return Err(ApiError::Internal(
            "holiday API key not configured".to_string(),
        ));
    };

    let year = Utc::now().year().to_string();
    let mut request = state
        .http
        .get(HOLIDAY_API_URL)
        .query(&[("year", year.as_str()), ("key", key.as_str())]);
    // The bare route queries the upstream API without a country filter
    if let Some(Path(country)) = &country_code {
        request = request.query(&[("country", country.as_str())]);
    }
    let response = request
        .send()
        .await
        .map_err(|e| ApiError::Internal(format!("holiday API request failed: {e}")))?;

    let body: Value = response
        .json()
        .await
        .map_err(|e| ApiError::Internal(format!("holiday API returned malformed body: {e}")))?;

    Ok(Json(
        body.get("holidays").cloned().unwrap_or(Value::Array(vec![])),
    ))
}
