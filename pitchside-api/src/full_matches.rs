//! Matches booked with a full lineup. The reservation is sent to the field owner at once and
//! the match can only be edited while the owner has not answered.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    middleware::from_fn_with_state,
    routing::{get, patch},
    Extension, Json, Router,
};
use pitchside_booking::reservation::ROSTER_FULL_COMMENT;
use pitchside_booking::{Reservation, ReservationStatus};
use pitchside_club::full_match::{CANCELLED_AFTER_APPROVAL_COMMENT, CANCELLED_COMMENT};
use pitchside_club::{ClubError, FullMatch, FullMatchPatch, NewFullMatch, Reschedule};
use pitchside_core::{NewNotification, NotificationKind, Role};
use tracing::info;
use uuid::Uuid;

use crate::availability;
use crate::error::{AppError, AppResult};
use crate::fields::load_field;
use crate::middleware::{auth_middleware, Claims};
use crate::state::AppState;

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/full-matches", get(list_own).post(create_match))
        .route("/full-matches/all", get(list_all))
        .route(
            "/full-matches/{id}",
            get(get_match).patch(update_match).delete(delete_match),
        )
        .route("/full-matches/{id}/time-slot", patch(update_time_slot))
        .route("/full-matches/{id}/cancel", patch(cancel_match))
        .route_layer(from_fn_with_state(state, auth_middleware))
}

async fn load(state: &AppState, id: Uuid) -> AppResult<FullMatch> {
    Ok(state.repos.full_matches.get_full_match(id).await?.ok_or_else(ClubError::match_not_found)?)
}

/// The match's reservation, which must still be waiting on the owner.
async fn pending_reservation(state: &AppState, id: Uuid, refusal: &str) -> AppResult<Reservation> {
    let reservation = state.repos.reservations.find_by_match(id).await?;
    match reservation {
        Some(r) if r.status == ReservationStatus::Pending => Ok(r),
        _ => Err(ClubError::Forbidden(refusal.into()).into()),
    }
}

/// POST /full-matches
async fn create_match(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<NewFullMatch>,
) -> AppResult<(StatusCode, Json<FullMatch>)> {
    claims.require(&[Role::Player])?;
    let field = load_field(&state, req.field_id).await?;
    availability::ensure_slot_free(&state, &field, req.date, req.start_time, req.end_time, None).await?;

    let created = req.into_match(claims.user_id())?;
    let mut reservation = Reservation::new(
        field.id,
        created.creator_id,
        created.date,
        created.start_time,
        created.end_time,
        ReservationStatus::Pending,
    );
    reservation.match_id = Some(created.id);
    reservation.phone_number = Some(created.contact_phone.clone());
    reservation.status_comment = Some(ROSTER_FULL_COMMENT.to_string());

    state.repos.full_matches.create_full_match(&created, &reservation).await?;
    state.metrics.reservation(reservation.status.as_str());
    info!(match_id = %created.id, field_id = %field.id, "Full match created");

    state
        .notifier
        .send(
            NewNotification::new(
                field.owner_id,
                NotificationKind::Reservation,
                "New Pending Reservation",
                format!(
                    "A new reservation for {} on {} {}-{} is waiting for your approval",
                    field.name, reservation.date, reservation.start_time, reservation.end_time
                ),
            )
            .related(reservation.id),
        )
        .await;

    Ok((StatusCode::CREATED, Json(created)))
}

/// GET /full-matches
async fn list_own(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> AppResult<Json<Vec<FullMatch>>> {
    Ok(Json(state.repos.full_matches.list_full_matches(Some(claims.user_id())).await?))
}

/// GET /full-matches/all
async fn list_all(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> AppResult<Json<Vec<FullMatch>>> {
    if !claims.is_admin() {
        return Err(AppError::AuthorizationError("Forbidden resource".into()));
    }
    Ok(Json(state.repos.full_matches.list_full_matches(None).await?))
}

/// GET /full-matches/:id
async fn get_match(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<FullMatch>> {
    let m = load(&state, id).await?;
    m.ensure_viewable_by(claims.user_id(), claims.is_admin())?;
    Ok(Json(m))
}

/// PATCH /full-matches/:id
async fn update_match(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(patch): Json<FullMatchPatch>,
) -> AppResult<Json<FullMatch>> {
    let mut m = load(&state, id).await?;
    m.ensure_creator(claims.user_id(), "update")?;
    let mut reservation =
        pending_reservation(&state, id, "Match can only be updated while reservation is pending").await?;

    let phone_changed = patch.apply(&mut m)?;
    if phone_changed {
        reservation.phone_number = Some(m.contact_phone.clone());
    }
    state
        .repos
        .full_matches
        .save_full_match(&m, Some(&reservation).filter(|_| phone_changed))
        .await?;
    Ok(Json(m))
}

/// PATCH /full-matches/:id/time-slot
async fn update_time_slot(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(req): Json<Reschedule>,
) -> AppResult<Json<FullMatch>> {
    let mut m = load(&state, id).await?;
    m.ensure_creator(claims.user_id(), "update time slot")?;
    let mut reservation =
        pending_reservation(&state, id, "Time slot can only be updated while reservation is pending").await?;

    let field = load_field(&state, m.field_id).await?;
    availability::ensure_slot_free(&state, &field, req.date, req.start_time, req.end_time, Some(reservation.id))
        .await?;

    m.reschedule(req.date, req.start_time, req.end_time);
    reservation.date = req.date;
    reservation.start_time = req.start_time;
    reservation.end_time = req.end_time;
    reservation.status_comment = Some(ROSTER_FULL_COMMENT.to_string());
    state.repos.full_matches.save_full_match(&m, Some(&reservation)).await?;
    Ok(Json(m))
}

/// PATCH /full-matches/:id/cancel
async fn cancel_match(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<FullMatch>> {
    let mut m = load(&state, id).await?;
    m.ensure_creator(claims.user_id(), "cancel")?;
    m.cancel()?;

    let mut reservation = state.repos.reservations.find_by_match(id).await?;
    let mut was_approved = false;
    if let Some(r) = reservation.as_mut().filter(|r| !r.status.is_terminal()) {
        was_approved = r.status == ReservationStatus::Approved;
        let comment = if was_approved { CANCELLED_AFTER_APPROVAL_COMMENT } else { CANCELLED_COMMENT };
        r.transition(ReservationStatus::Cancelled, Some(comment.to_string()))?;
    }
    state.repos.full_matches.save_full_match(&m, reservation.as_ref()).await?;
    info!(match_id = %id, "Full match cancelled");

    if let Some(r) = reservation.as_ref().filter(|_| was_approved) {
        let field = load_field(&state, r.field_id).await?;
        state
            .notifier
            .send(
                NewNotification::new(
                    field.owner_id,
                    NotificationKind::Reservation,
                    "Reservation Cancelled",
                    format!("The reservation at {} on {} was cancelled", field.name, r.date),
                )
                .related(r.id),
            )
            .await;
    }
    Ok(Json(m))
}

/// DELETE /full-matches/:id
async fn delete_match(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let mut m = load(&state, id).await?;
    m.ensure_creator(claims.user_id(), "remove")?;
    m.retire()?;
    state.repos.full_matches.retire_full_match(&m).await?;
    info!(match_id = %id, "Full match deleted");
    Ok(StatusCode::NO_CONTENT)
}
