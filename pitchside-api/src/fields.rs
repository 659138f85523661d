use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    middleware::from_fn_with_state,
    routing::{get, patch, post},
    Extension, Json, Router,
};
use chrono::Utc;
use pitchside_booking::clock::parse_date;
use pitchside_booking::field::terrain_names;
use pitchside_booking::pricing::match_cost;
use pitchside_booking::{BookingError, DaySchedule, Field, FieldPatch, FieldQuery, NewField, Terrain};
use pitchside_core::Role;
use pitchside_shared::Money;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};
use uuid::Uuid;

use crate::availability;
use crate::error::{AppError, AppResult};
use crate::middleware::{auth_middleware, Claims};
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDetail {
    #[serde(flatten)]
    pub field: Field,
    pub terrains: Vec<Terrain>,
}

#[derive(Debug, Deserialize)]
struct DateQuery {
    date: String,
}

#[derive(Debug, Deserialize)]
struct DurationQuery {
    duration: i32,
}

#[derive(Debug, Serialize)]
struct PriceResponse {
    price: Money,
}

pub fn routes(state: AppState) -> Router<AppState> {
    let protected = Router::new()
        .route("/fields", post(create_field))
        .route("/fields/owner/fields", get(owner_fields))
        .route("/fields/{id}", patch(update_field).delete(delete_field))
        .route_layer(from_fn_with_state(state, auth_middleware));

    Router::new()
        .route("/fields", get(list_fields))
        .route("/fields/{id}", get(get_field))
        .route("/fields/{id}/available-time-slots", get(available_time_slots))
        .route("/fields/{id}/calculate-price", get(calculate_price))
        .merge(protected)
}

pub(crate) async fn load_field(state: &AppState, id: Uuid) -> AppResult<Field> {
    Ok(state
        .repos
        .fields
        .get_field(id)
        .await?
        .ok_or_else(|| BookingError::field_not_found(id))?)
}

/// GET /fields
async fn list_fields(State(state): State<AppState>, Query(query): Query<FieldQuery>) -> AppResult<Json<Vec<Field>>> {
    let search = query.into_search()?;
    let fields = state.repos.fields.list_fields(&search).await?;

    let Some((date, start, end)) = search.slot else {
        return Ok(Json(fields));
    };

    let mut open = Vec::with_capacity(fields.len());
    for field in fields {
        if availability::range_is_free(&state, &field, date, start, end).await? {
            open.push(field);
        }
    }
    debug!(%date, %start, %end, matches = open.len(), "Fields filtered by time slot");
    Ok(Json(open))
}

/// GET /fields/:id
async fn get_field(State(state): State<AppState>, Path(id): Path<Uuid>) -> AppResult<Json<FieldDetail>> {
    let field = load_field(&state, id).await?;
    let terrains = state.repos.terrains.list_terrains(id).await?;
    Ok(Json(FieldDetail { field, terrains }))
}

/// POST /fields
async fn create_field(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<NewField>,
) -> AppResult<(StatusCode, Json<FieldDetail>)> {
    claims.require(&[Role::Owner])?;
    let owner = state.repos.users.get_user(claims.user_id()).await?;
    if !owner.is_some_and(|u| u.is_active) {
        return Err(AppError::AuthorizationError("Only active owners can create fields".into()));
    }

    req.validate()?;
    let field = req.into_field(claims.user_id());
    let names = terrain_names(0, field.number_of_terrains);
    let terrains = state.repos.fields.create_field(&field, &names).await?;

    info!(field_id = %field.id, owner_id = %field.owner_id, terrains = terrains.len(), "Field created");
    Ok((StatusCode::CREATED, Json(FieldDetail { field, terrains })))
}

/// GET /fields/owner/fields
async fn owner_fields(State(state): State<AppState>, Extension(claims): Extension<Claims>) -> AppResult<Json<Vec<Field>>> {
    claims.require(&[Role::Owner])?;
    Ok(Json(state.repos.fields.list_fields_by_owner(claims.user_id()).await?))
}

/// PATCH /fields/:id
///
/// Raising the terrain count appends terrains; lowering it drops the highest-numbered
/// terrains without upcoming approved reservations.
async fn update_field(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(patch): Json<FieldPatch>,
) -> AppResult<Json<FieldDetail>> {
    let mut field = load_field(&state, id).await?;
    field.ensure_managed_by(claims.user_id(), claims.is_admin())?;

    let terrains = state.repos.terrains.list_terrains(id).await?;
    let existing = terrains.len() as i32;
    patch.apply(&mut field)?;

    let target = field.number_of_terrains;
    let mut added = Vec::new();
    let mut removed = Vec::new();
    if target > existing {
        added = terrain_names(existing, target);
    } else if target < existing {
        let excess = (existing - target) as usize;
        let today = Utc::now().date_naive();
        for terrain in terrains.iter().rev() {
            if removed.len() == excess {
                break;
            }
            if !state.repos.terrains.has_upcoming_approved(terrain.id, today).await? {
                removed.push(terrain.id);
            }
        }
        if removed.len() < excess {
            return Err(BookingError::Conflict(
                "Cannot reduce terrains: remaining terrains have upcoming approved reservations".into(),
            )
            .into());
        }
    }

    state.repos.fields.update_field(&field, &added, &removed).await?;
    info!(field_id = %id, added = added.len(), removed = removed.len(), "Field updated");

    let terrains = state.repos.terrains.list_terrains(id).await?;
    Ok(Json(FieldDetail { field, terrains }))
}

/// DELETE /fields/:id
async fn delete_field(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    let field = load_field(&state, id).await?;
    field.ensure_managed_by(claims.user_id(), claims.is_admin())?;
    state.repos.fields.delete_field(id).await?;
    info!(field_id = %id, "Field deleted");
    Ok(Json(json!({ "message": "Field deleted successfully" })))
}

/// GET /fields/:id/available-time-slots?date=
async fn available_time_slots(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<DateQuery>,
) -> AppResult<Json<DaySchedule>> {
    let date = parse_date(&query.date)?;
    let field = load_field(&state, id).await?;
    let timeline = availability::timeline(&state, &field, date, None).await?;
    Ok(Json(timeline.schedule(&state.slots)))
}

/// GET /fields/:id/calculate-price?duration=
async fn calculate_price(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<DurationQuery>,
) -> AppResult<Json<PriceResponse>> {
    let field = load_field(&state, id).await?;
    let price = match_cost(field.price_per_hour, query.duration)?;
    Ok(Json(PriceResponse { price }))
}
