use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    middleware::from_fn_with_state,
    routing::{get, patch, post},
    Extension, Json, Router,
};
use pitchside_booking::reservation::{
    Abonnement, ApproveReservation, NewReservation, OwnerReservation, RejectReservation, ReservationPatch,
};
use pitchside_booking::{BookingError, CancelledBy, Field, Reservation, ReservationStatus};
use pitchside_core::{NewNotification, NotificationKind, Role};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};
use uuid::Uuid;

use crate::availability::{self, SLOT_UNAVAILABLE};
use crate::error::{AppError, AppResult};
use crate::fields::load_field;
use crate::middleware::{auth_middleware, Claims};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
struct StatusFilter {
    status: Option<ReservationStatus>,
}

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/reservations", post(create_reservation))
        .route("/reservations/owner", post(create_owner_reservation))
        .route("/reservations/abonnement", post(create_abonnement))
        .route("/reservations/me", get(my_reservations))
        .route("/reservations/field/{field_id}", get(field_reservations))
        .route("/reservations/pending/{field_id}", get(pending_reservations))
        .route(
            "/reservations/{id}",
            get(get_reservation).patch(update_reservation).delete(delete_reservation),
        )
        .route("/reservations/{id}/approve", patch(approve_reservation))
        .route("/reservations/{id}/reject", patch(reject_reservation))
        .route("/reservations/{id}/cancel", patch(cancel_reservation))
        .route_layer(from_fn_with_state(state, auth_middleware))
}

async fn load(state: &AppState, id: Uuid) -> AppResult<Reservation> {
    Ok(state
        .repos
        .reservations
        .get_reservation(id)
        .await?
        .ok_or_else(|| BookingError::reservation_not_found(id))?)
}

/// Creator of the match the reservation was made for, if any.
async fn match_creator(state: &AppState, reservation: &Reservation) -> AppResult<Option<Uuid>> {
    let Some(match_id) = reservation.match_id else {
        return Ok(None);
    };
    Ok(state.repos.matches.get_match(match_id).await?.map(|m| m.creator_id))
}

fn slot_label(reservation: &Reservation) -> String {
    format!("{} {}-{}", reservation.date, reservation.start_time, reservation.end_time)
}

// ============================================================================
// Creation
// ============================================================================

/// POST /reservations
async fn create_reservation(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<NewReservation>,
) -> AppResult<(StatusCode, Json<Reservation>)> {
    claims.require(&[Role::Player])?;
    let field = load_field(&state, req.field_id).await?;
    availability::ensure_slot_free(&state, &field, req.date, req.start_time, req.end_time, None).await?;

    let reservation = req.into_reservation(claims.user_id());
    state.repos.reservations.create_reservation(&reservation).await?;
    state.metrics.reservation(reservation.status.as_str());
    info!(
        reservation_id = %reservation.id,
        field_id = %field.id,
        date = %reservation.date,
        "Reservation requested"
    );

    state
        .notifier
        .send(
            NewNotification::new(
                field.owner_id,
                NotificationKind::Reservation,
                "New Pending Reservation",
                format!("A new reservation for {} on {} is waiting for your approval", field.name, slot_label(&reservation)),
            )
            .related(reservation.id),
        )
        .await;

    Ok((StatusCode::CREATED, Json(reservation)))
}

/// POST /reservations/owner
async fn create_owner_reservation(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<OwnerReservation>,
) -> AppResult<(StatusCode, Json<Reservation>)> {
    claims.require(&[Role::Owner])?;
    let field = load_field(&state, req.field_id).await?;
    field.ensure_owned_by(claims.user_id())?;

    let terrain = availability::field_terrain(&state, &field, req.terrain_id).await?;
    state.slots.place(&field.hours(), req.date, req.start_time, req.end_time)?;
    availability::ensure_terrain_free(&state, &terrain, req.date, req.start_time, req.end_time, None).await?;

    let reservation = req.into_reservation(claims.user_id());
    state.repos.reservations.create_reservation(&reservation).await?;
    state.metrics.reservation(reservation.status.as_str());
    info!(reservation_id = %reservation.id, terrain_id = %terrain.id, "Owner reservation created");

    Ok((StatusCode::CREATED, Json(reservation)))
}

/// POST /reservations/abonnement
///
/// Every week is checked before anything is written.
async fn create_abonnement(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<Abonnement>,
) -> AppResult<(StatusCode, Json<Vec<Reservation>>)> {
    claims.require(&[Role::Owner])?;
    req.validate()?;
    let field = load_field(&state, req.field_id).await?;
    field.ensure_owned_by(claims.user_id())?;
    let terrain = availability::field_terrain(&state, &field, req.terrain_id).await?;

    let reservations = req.reservations(claims.user_id());
    for reservation in &reservations {
        let date = reservation.date;
        if !availability::slot_is_free(&state, &field, date, req.start_time, req.end_time, None).await? {
            return Err(BookingError::Validation(format!("Time slot not available on {}", date)).into());
        }
        if !availability::terrain_is_free(&state, &terrain, date, req.start_time, req.end_time, None).await? {
            return Err(BookingError::Conflict(format!("Terrain not available on {}", date)).into());
        }
    }

    state.repos.reservations.create_reservations(&reservations).await?;
    for reservation in &reservations {
        state.metrics.reservation(reservation.status.as_str());
    }
    info!(field_id = %field.id, weeks = req.weeks, "Abonnement created");

    Ok((StatusCode::CREATED, Json(reservations)))
}

// ============================================================================
// Changes
// ============================================================================

/// PATCH /reservations/:id
async fn update_reservation(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(patch): Json<ReservationPatch>,
) -> AppResult<Json<Reservation>> {
    let mut reservation = load(&state, id).await?;
    let field = load_field(&state, reservation.field_id).await?;
    let creator = match_creator(&state, &reservation).await?;
    if !field.is_owned_by(claims.user_id()) && creator != Some(claims.user_id()) {
        return Err(AppError::AuthorizationError(
            "Only the field owner or the match creator can update this reservation".into(),
        ));
    }

    patch.apply(&mut reservation)?;
    let (date, start, end) = (reservation.date, reservation.start_time, reservation.end_time);
    if patch.reschedules() && !availability::slot_is_free(&state, &field, date, start, end, Some(id)).await? {
        return Err(BookingError::Validation(SLOT_UNAVAILABLE.into()).into());
    }
    if let Some(terrain_id) = reservation.terrain_id {
        if patch.reschedules() || patch.terrain_id.is_some() {
            let terrain = availability::field_terrain(&state, &field, terrain_id).await?;
            if reservation.status == ReservationStatus::Approved {
                availability::ensure_terrain_free(&state, &terrain, date, start, end, Some(id)).await?;
            }
        }
    }

    state.repos.reservations.update_reservation(&reservation).await?;
    Ok(Json(reservation))
}

/// PATCH /reservations/:id/approve
async fn approve_reservation(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(req): Json<ApproveReservation>,
) -> AppResult<Json<Reservation>> {
    let mut reservation = load(&state, id).await?;
    let field = load_field(&state, reservation.field_id).await?;
    field.ensure_owned_by(claims.user_id())?;
    if reservation.status != ReservationStatus::Pending {
        return Err(BookingError::Validation("Reservation is not in PENDING status".into()).into());
    }

    let terrain = availability::field_terrain(&state, &field, req.terrain_id).await?;
    let (date, start, end) = (reservation.date, reservation.start_time, reservation.end_time);
    if let Err(e) = availability::ensure_terrain_free(&state, &terrain, date, start, end, Some(id)).await {
        warn!(reservation_id = %id, terrain_id = %terrain.id, "Double booking refused");
        return Err(e);
    }

    reservation.approve(terrain.id, req.status_comment)?;
    state.repos.reservations.update_reservation(&reservation).await?;
    state.metrics.reservation(reservation.status.as_str());
    info!(reservation_id = %id, terrain_id = %terrain.id, "Reservation approved");

    state
        .notifier
        .send(
            NewNotification::new(
                reservation.user_id,
                NotificationKind::Reservation,
                "Reservation Approved",
                format!("Your reservation at {} on {} was approved", field.name, slot_label(&reservation)),
            )
            .related(reservation.id),
        )
        .await;

    notify_conflicts(&state, &field, &reservation).await?;
    Ok(Json(reservation))
}

/// Warns the holders of other pending requests for the same stretch of time.
async fn notify_conflicts(state: &AppState, field: &Field, approved: &Reservation) -> AppResult<()> {
    let pending = state
        .repos
        .reservations
        .list_by_field(field.id, Some(ReservationStatus::Pending))
        .await?;

    let conflicts = pending
        .iter()
        .filter(|r| r.id != approved.id && r.date == approved.date && r.overlaps(approved))
        .map(|r| {
            NewNotification::new(
                r.user_id,
                NotificationKind::Reservation,
                "Time Slot Conflict",
                format!(
                    "Another reservation was approved at {} for {}; your request may not be accepted",
                    field.name,
                    slot_label(r)
                ),
            )
            .related(r.id)
        })
        .collect::<Vec<_>>();
    state.notifier.send_all(conflicts).await;
    Ok(())
}

/// PATCH /reservations/:id/reject
async fn reject_reservation(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    body: Option<Json<RejectReservation>>,
) -> AppResult<Json<Reservation>> {
    let mut reservation = load(&state, id).await?;
    let field = load_field(&state, reservation.field_id).await?;
    field.ensure_owned_by(claims.user_id())?;

    let comment = body.and_then(|Json(req)| req.status_comment);
    reservation.reject(comment)?;
    state.repos.reservations.update_reservation(&reservation).await?;
    state.metrics.reservation(reservation.status.as_str());

    state
        .notifier
        .send(
            NewNotification::new(
                reservation.user_id,
                NotificationKind::Reservation,
                "Reservation Rejected",
                format!("Your reservation at {} on {} was rejected", field.name, slot_label(&reservation)),
            )
            .related(reservation.id),
        )
        .await;

    Ok(Json(reservation))
}

/// PATCH /reservations/:id/cancel
async fn cancel_reservation(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Reservation>> {
    let mut reservation = load(&state, id).await?;
    let field = load_field(&state, reservation.field_id).await?;
    let caller = claims.user_id();

    let by = if field.is_owned_by(caller) {
        CancelledBy::FieldOwner
    } else if reservation.user_id == caller || match_creator(&state, &reservation).await? == Some(caller) {
        CancelledBy::Reserver
    } else {
        return Err(AppError::AuthorizationError(
            "You do not have permission to cancel this reservation".into(),
        ));
    };

    let previous = reservation.cancel(by)?;
    state.repos.reservations.update_reservation(&reservation).await?;
    state.metrics.reservation(reservation.status.as_str());
    info!(reservation_id = %id, ?by, "Reservation cancelled");

    if previous == ReservationStatus::Approved {
        let (recipient, message) = match by {
            CancelledBy::FieldOwner => (
                reservation.user_id,
                format!("Your reservation at {} on {} was cancelled by the owner", field.name, slot_label(&reservation)),
            ),
            CancelledBy::Reserver => (
                field.owner_id,
                format!("The reservation at {} on {} was cancelled", field.name, slot_label(&reservation)),
            ),
        };
        state
            .notifier
            .send(
                NewNotification::new(recipient, NotificationKind::Reservation, "Reservation Cancelled", message)
                    .related(reservation.id),
            )
            .await;
    }

    Ok(Json(reservation))
}

/// DELETE /reservations/:id
async fn delete_reservation(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    let reservation = load(&state, id).await?;
    let field = load_field(&state, reservation.field_id).await?;
    field.ensure_owned_by(claims.user_id())?;
    state.repos.reservations.delete_reservation(id).await?;
    Ok(Json(json!({ "message": "Reservation deleted successfully" })))
}

// ============================================================================
// Queries
// ============================================================================

/// GET /reservations/:id
async fn get_reservation(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Reservation>> {
    let reservation = load(&state, id).await?;
    if claims.role == Role::Player && reservation.user_id != claims.user_id() {
        return Err(AppError::AuthorizationError("You can only view your own reservations".into()));
    }
    Ok(Json(reservation))
}

/// GET /reservations/field/:fieldId
async fn field_reservations(
    State(state): State<AppState>,
    Path(field_id): Path<Uuid>,
    Query(filter): Query<StatusFilter>,
) -> AppResult<Json<Vec<Reservation>>> {
    let field = load_field(&state, field_id).await?;
    Ok(Json(state.repos.reservations.list_by_field(field.id, filter.status).await?))
}

/// GET /reservations/pending/:fieldId
async fn pending_reservations(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(field_id): Path<Uuid>,
) -> AppResult<Json<Vec<Reservation>>> {
    let field = load_field(&state, field_id).await?;
    field.ensure_owned_by(claims.user_id())?;
    Ok(Json(
        state
            .repos
            .reservations
            .list_by_field(field.id, Some(ReservationStatus::Pending))
            .await?,
    ))
}

/// GET /reservations/me
async fn my_reservations(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> AppResult<Json<Vec<Reservation>>> {
    Ok(Json(state.repos.reservations.list_by_user(claims.user_id()).await?))
}
