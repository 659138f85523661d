//! Pick-up matches. Every roster change is saved together with the linked reservation,
//! which follows the roster between WAITING and PENDING.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    middleware::from_fn_with_state,
    routing::{delete, get, patch, post},
    Extension, Json, Router,
};
use pitchside_booking::reservation::{ROSTER_FULL_COMMENT, ROSTER_OPEN_COMMENT};
use pitchside_booking::{BookingError, CancelledBy, Field, Reservation, ReservationStatus};
use pitchside_club::{
    ClubError, IncompleteMatch, JoinOutcome, JoinRequest, MatchPatch, MatchQuery, NewMatch, PlayerAction, Reschedule,
    RosterChange,
};
use pitchside_core::repository::MatchFilter;
use pitchside_core::{NewNotification, NotificationKind, Role};
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use crate::availability;
use crate::error::{AppError, AppResult};
use crate::fields::load_field;
use crate::middleware::{auth_middleware, Claims};
use crate::state::AppState;

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/incomplete-matches", get(list_matches).post(create_match))
        .route("/incomplete-matches/join", post(join_match))
        .route("/incomplete-matches/approve", post(approve_request))
        .route("/incomplete-matches/decline", post(decline_request))
        .route("/incomplete-matches/invite", post(invite_player))
        .route(
            "/incomplete-matches/{id}",
            get(get_match).patch(update_match).delete(delete_match),
        )
        .route("/incomplete-matches/{id}/accept-invitation", post(accept_invitation))
        .route("/incomplete-matches/{id}/decline-invitation", post(decline_invitation))
        .route("/incomplete-matches/{id}/leave", post(leave_match))
        .route("/incomplete-matches/{id}/cancel", patch(cancel_match))
        .route("/incomplete-matches/{id}/reschedule", patch(reschedule_match))
        .route("/incomplete-matches/{id}/players/{player_id}", delete(remove_player))
        .route_layer(from_fn_with_state(state, auth_middleware))
}

async fn load(state: &AppState, id: Uuid) -> AppResult<IncompleteMatch> {
    Ok(state.repos.matches.get_match(id).await?.ok_or_else(ClubError::match_not_found)?)
}

fn notice(user_id: Uuid, title: &str, message: String, m: &IncompleteMatch) -> NewNotification {
    NewNotification::new(user_id, NotificationKind::Match, title, message).related(m.id)
}

/// Saves the match after a roster change and moves its reservation along.
async fn save_roster(state: &AppState, m: &IncompleteMatch, change: RosterChange) -> AppResult<()> {
    let mut reservation = state.repos.reservations.find_by_match(m.id).await?;
    let synced = reservation.as_mut().is_some_and(|r| r.sync_with_roster(m.is_full()));
    state
        .repos
        .matches
        .save_match(m, reservation.as_ref().filter(|_| synced))
        .await?;

    if change.became_full() {
        let mut notices = vec![notice(
            m.creator_id,
            "Match Completed",
            format!("{} is full; the reservation now awaits the owner's approval", m.title),
            m,
        )];
        if let Some(reservation) = reservation.as_ref().filter(|_| synced) {
            let field = load_field(state, reservation.field_id).await?;
            notices.push(owner_notice(&field, reservation));
        }
        state.notifier.send_all(notices).await;
    }
    Ok(())
}

fn owner_notice(field: &Field, reservation: &Reservation) -> NewNotification {
    NewNotification::new(
        field.owner_id,
        NotificationKind::Reservation,
        "New Pending Reservation",
        format!(
            "A new reservation for {} on {} {}-{} is waiting for your approval",
            field.name, reservation.date, reservation.start_time, reservation.end_time
        ),
    )
    .related(reservation.id)
}

// ============================================================================
// Creation and queries
// ============================================================================

/// POST /incomplete-matches
async fn create_match(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<NewMatch>,
) -> AppResult<(StatusCode, Json<IncompleteMatch>)> {
    claims.require(&[Role::Player])?;
    req.validate()?;
    let field = load_field(&state, req.field_id).await?;
    availability::ensure_slot_free(&state, &field, req.date, req.start_time, req.end_time, None).await?;

    let created = req.into_match(claims.user_id())?;
    let (status, comment) = if created.is_full() {
        (ReservationStatus::Pending, ROSTER_FULL_COMMENT)
    } else {
        (ReservationStatus::Waiting, ROSTER_OPEN_COMMENT)
    };
    let mut reservation = Reservation::new(
        field.id,
        created.creator_id,
        created.date,
        created.start_time,
        created.end_time,
        status,
    );
    reservation.match_id = Some(created.id);
    reservation.phone_number = created.contact_phone.clone();
    reservation.status_comment = Some(comment.to_string());

    state.repos.matches.create_match(&created, &reservation).await?;
    state.metrics.reservation(reservation.status.as_str());
    info!(match_id = %created.id, field_id = %field.id, status = %created.status, "Match created");

    if created.is_full() {
        state
            .notifier
            .send_all([
                notice(
                    created.creator_id,
                    "Match Completed",
                    format!("{} is full; the reservation now awaits the owner's approval", created.title),
                    &created,
                ),
                owner_notice(&field, &reservation),
            ])
            .await;
    }

    Ok((StatusCode::CREATED, Json(created)))
}

/// GET /incomplete-matches?city=&date=&status=
///
/// Admins see every match; everyone else sees public ones plus their own.
async fn list_matches(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<MatchQuery>,
) -> AppResult<Json<Vec<IncompleteMatch>>> {
    let filter = MatchFilter {
        status: query.status()?,
        city: query.city.map(|c| c.trim().to_string()).filter(|c| !c.is_empty()),
        date: query.date,
        viewer: (!claims.is_admin()).then(|| claims.user_id()),
    };
    Ok(Json(state.repos.matches.list_matches(&filter).await?))
}

/// GET /incomplete-matches/:id
async fn get_match(State(state): State<AppState>, Path(id): Path<Uuid>) -> AppResult<Json<IncompleteMatch>> {
    Ok(Json(load(&state, id).await?))
}

// ============================================================================
// Roster
// ============================================================================

/// POST /incomplete-matches/join
async fn join_match(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<JoinRequest>,
) -> AppResult<Json<IncompleteMatch>> {
    let mut m = load(&state, req.match_id).await?;
    let user = claims.user_id();

    match m.request_to_join(user, &req)? {
        JoinOutcome::Joined(change) => {
            save_roster(&state, &m, change).await?;
            state
                .notifier
                .send(notice(m.creator_id, "New Player Joined", format!("A player joined {}", m.title), &m))
                .await;
        }
        JoinOutcome::Requested => {
            state.repos.matches.save_match(&m, None).await?;
            state
                .notifier
                .send(notice(
                    m.creator_id,
                    "New Join Request",
                    format!("A player asked to join {}", m.title),
                    &m,
                ))
                .await;
        }
    }
    Ok(Json(m))
}

/// POST /incomplete-matches/approve
async fn approve_request(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<PlayerAction>,
) -> AppResult<Json<IncompleteMatch>> {
    let mut m = load(&state, req.match_id).await?;
    m.ensure_creator(claims.user_id(), "approve join requests")?;
    let change = m.approve(req.player_id)?;
    save_roster(&state, &m, change).await?;

    state
        .notifier
        .send(notice(
            req.player_id,
            "Join Request Approved",
            format!("Your request to join {} was approved", m.title),
            &m,
        ))
        .await;
    Ok(Json(m))
}

/// POST /incomplete-matches/decline
async fn decline_request(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<PlayerAction>,
) -> AppResult<Json<IncompleteMatch>> {
    let mut m = load(&state, req.match_id).await?;
    m.ensure_creator(claims.user_id(), "decline join requests")?;
    m.decline(req.player_id)?;
    state.repos.matches.save_match(&m, None).await?;

    state
        .notifier
        .send(notice(
            req.player_id,
            "Join Request Declined",
            format!("Your request to join {} was declined", m.title),
            &m,
        ))
        .await;
    Ok(Json(m))
}

/// POST /incomplete-matches/invite
async fn invite_player(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<PlayerAction>,
) -> AppResult<Json<IncompleteMatch>> {
    let mut m = load(&state, req.match_id).await?;
    m.ensure_creator(claims.user_id(), "invite players")?;

    let invitee = state
        .repos
        .users
        .get_user(req.player_id)
        .await?
        .ok_or_else(|| AppError::NotFoundError(format!("User with ID {} not found", req.player_id)))?;
    if !invitee.is_active_player() {
        return Err(ClubError::Validation("Player must be active and have PLAYER role".into()).into());
    }

    m.invite(invitee.id)?;
    state.repos.matches.save_match(&m, None).await?;
    state
        .notifier
        .send(notice(invitee.id, "Match Invitation", format!("You are invited to {}", m.title), &m))
        .await;
    Ok(Json(m))
}

/// POST /incomplete-matches/:id/accept-invitation
async fn accept_invitation(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<IncompleteMatch>> {
    let mut m = load(&state, id).await?;
    let change = m.accept_invitation(claims.user_id())?;
    save_roster(&state, &m, change).await?;

    state
        .notifier
        .send(notice(
            m.creator_id,
            "Invitation Accepted",
            format!("A player accepted your invitation to {}", m.title),
            &m,
        ))
        .await;
    Ok(Json(m))
}

/// POST /incomplete-matches/:id/decline-invitation
async fn decline_invitation(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<IncompleteMatch>> {
    let mut m = load(&state, id).await?;
    m.decline_invitation(claims.user_id())?;
    state.repos.matches.save_match(&m, None).await?;
    Ok(Json(m))
}

/// POST /incomplete-matches/:id/leave
async fn leave_match(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<IncompleteMatch>> {
    let mut m = load(&state, id).await?;
    let change = m.leave(claims.user_id())?;
    save_roster(&state, &m, change).await?;

    state
        .notifier
        .send(notice(m.creator_id, "Player Left", format!("A player left {}", m.title), &m))
        .await;
    Ok(Json(m))
}

/// DELETE /incomplete-matches/:id/players/:playerId
async fn remove_player(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path((id, player_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<IncompleteMatch>> {
    let mut m = load(&state, id).await?;
    m.ensure_creator(claims.user_id(), "remove players")?;
    let change = m.remove_player(player_id)?;
    save_roster(&state, &m, change).await?;

    state
        .notifier
        .send(notice(player_id, "Removed from Match", format!("You were removed from {}", m.title), &m))
        .await;
    Ok(Json(m))
}

// ============================================================================
// Creator actions
// ============================================================================

/// PATCH /incomplete-matches/:id
async fn update_match(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(patch): Json<MatchPatch>,
) -> AppResult<Json<IncompleteMatch>> {
    let mut m = load(&state, id).await?;
    m.ensure_creator(claims.user_id(), "update the match")?;
    let change = patch.apply(&mut m)?;
    save_roster(&state, &m, change).await?;
    Ok(Json(m))
}

/// PATCH /incomplete-matches/:id/reschedule
async fn reschedule_match(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(req): Json<Reschedule>,
) -> AppResult<Json<IncompleteMatch>> {
    let mut m = load(&state, id).await?;
    m.ensure_creator(claims.user_id(), "reschedule the match")?;

    let mut reservation = state.repos.reservations.find_by_match(id).await?;
    if let Some(r) = &reservation {
        if r.status == ReservationStatus::Approved {
            return Err(BookingError::Validation("An approved reservation cannot be rescheduled".into()).into());
        }
    }
    let field = load_field(&state, m.field_id).await?;
    let exclude = reservation.as_ref().map(|r| r.id);
    availability::ensure_slot_free(&state, &field, req.date, req.start_time, req.end_time, exclude).await?;

    m.reschedule(req.date, req.start_time, req.end_time)?;
    if let Some(r) = reservation.as_mut() {
        r.date = req.date;
        r.start_time = req.start_time;
        r.end_time = req.end_time;
        r.updated_at = m.updated_at;
    }
    state.repos.matches.save_match(&m, reservation.as_ref()).await?;

    let moved = m.others().map(|player| {
        notice(
            player,
            "Match Rescheduled",
            format!("{} moved to {} {}-{}", m.title, m.date, m.start_time, m.end_time),
            &m,
        )
    });
    state.notifier.send_all(moved.collect::<Vec<_>>()).await;
    Ok(Json(m))
}

/// PATCH /incomplete-matches/:id/cancel
async fn cancel_match(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<IncompleteMatch>> {
    let mut m = load(&state, id).await?;
    m.ensure_creator(claims.user_id(), "cancel the match")?;
    m.cancel()?;

    let mut reservation = state.repos.reservations.find_by_match(id).await?;
    let mut was_approved = false;
    if let Some(r) = reservation.as_mut().filter(|r| !r.status.is_terminal()) {
        was_approved = r.cancel(CancelledBy::Reserver)? == ReservationStatus::Approved;
    }
    state.repos.matches.save_match(&m, reservation.as_ref()).await?;
    info!(match_id = %id, "Match cancelled");

    let mut notices: Vec<NewNotification> = m
        .others()
        .map(|player| notice(player, "Match Cancelled", format!("{} has been cancelled", m.title), &m))
        .collect();
    if let Some(r) = reservation.as_ref().filter(|_| was_approved) {
        let field = load_field(&state, r.field_id).await?;
        notices.push(
            NewNotification::new(
                field.owner_id,
                NotificationKind::Reservation,
                "Reservation Cancelled",
                format!("The reservation at {} on {} was cancelled", field.name, r.date),
            )
            .related(r.id),
        );
    }
    state.notifier.send_all(notices).await;
    Ok(Json(m))
}

/// DELETE /incomplete-matches/:id
async fn delete_match(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    let m = load(&state, id).await?;
    m.ensure_creator(claims.user_id(), "delete the match")?;
    state.repos.matches.delete_match(id).await?;
    info!(match_id = %id, "Match deleted");
    Ok(Json(json!({ "message": "Match deleted successfully" })))
}
