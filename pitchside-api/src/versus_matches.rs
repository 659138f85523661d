//! Team against team matches. The linked reservation waits until an opponent is seated and
//! then goes to the field owner, falling back to waiting if the opponent leaves.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    middleware::from_fn_with_state,
    routing::{get, patch, post},
    Extension, Json, Router,
};
use pitchside_booking::reservation::OPPONENT_WAITING_COMMENT;
use pitchside_booking::{BookingError, CancelledBy, Field, Reservation, ReservationStatus};
use pitchside_club::{
    ClubError, InvitationReply, NewTeamMatch, Team, TeamAction, TeamByName, TeamMatch, TeamMatchPatch, TeamMatchSlot,
};
use pitchside_core::{NewNotification, NotificationKind, Role};
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use crate::availability;
use crate::error::AppResult;
use crate::fields::load_field;
use crate::middleware::{auth_middleware, Claims};
use crate::state::AppState;

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/team-vs-team-matches", get(list_matches).post(create_match))
        .route("/team-vs-team-matches/join-request", post(request_to_join))
        .route("/team-vs-team-matches/approve-join", post(approve_join))
        .route("/team-vs-team-matches/decline-join", post(decline_join))
        .route("/team-vs-team-matches/invite", post(invite_team))
        .route("/team-vs-team-matches/respond-invite", post(respond_to_invite))
        .route("/team-vs-team-matches/update-time-slot", patch(update_time_slot))
        .route("/team-vs-team-matches/cancel/{id}", patch(cancel_match))
        .route("/team-vs-team-matches/leave/{match_id}/{team_id}", patch(leave_match))
        .route(
            "/team-vs-team-matches/{id}",
            get(get_match).patch(update_match).delete(delete_match),
        )
        .route_layer(from_fn_with_state(state, auth_middleware))
}

const ROLES: &[Role] = &[Role::Player, Role::Admin];

async fn load(state: &AppState, id: Uuid) -> AppResult<TeamMatch> {
    Ok(state.repos.team_matches.get_team_match(id).await?.ok_or_else(ClubError::match_not_found)?)
}

async fn load_team(state: &AppState, id: Uuid) -> AppResult<Team> {
    Ok(state.repos.teams.get_team(id).await?.ok_or_else(|| ClubError::NotFound("Team not found".into()))?)
}

async fn team_by_name(state: &AppState, name: &str) -> AppResult<Team> {
    Ok(state
        .repos
        .teams
        .find_team_by_name(name.trim())
        .await?
        .ok_or_else(|| ClubError::NotFound("Team not found".into()))?)
}

fn notice(user_id: Uuid, title: &str, message: String, m: &TeamMatch) -> NewNotification {
    NewNotification::new(user_id, NotificationKind::Match, title, message).related(m.id)
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

/// Saves the match and moves its reservation with the lineup. Returns whether the
/// reservation changed status.
async fn save_lineup(state: &AppState, m: &TeamMatch) -> AppResult<bool> {
    let mut reservation = state.repos.reservations.find_by_match(m.id).await?;
    let synced = reservation
        .as_mut()
        .is_some_and(|r| r.follow_lineup(m.has_opponent(), OPPONENT_WAITING_COMMENT));
    let reservation = reservation.filter(|_| synced);
    state.repos.team_matches.save_team_match(m, reservation.as_ref()).await?;

    if let Some(r) = reservation.as_ref().filter(|r| r.status == ReservationStatus::Pending) {
        let field = load_field(state, r.field_id).await?;
        state.notifier.send(owner_notice(&field, r)).await;
    }
    Ok(synced)
}

/// Everyone on either side, creator excluded.
async fn players_of(state: &AppState, m: &TeamMatch) -> AppResult<Vec<Uuid>> {
    let mut players = Vec::new();
    for team_id in std::iter::once(m.team_id).chain(m.opponent_team_id) {
        if let Some(team) = state.repos.teams.get_team(team_id).await? {
            players.push(team.captain_id);
            players.extend(team.players);
        }
    }
    players.retain(|p| *p != m.creator_id);
    Ok(players)
}

// ============================================================================
// Creation and queries
// ============================================================================

/// POST /team-vs-team-matches
async fn create_match(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<NewTeamMatch>,
) -> AppResult<(StatusCode, Json<TeamMatch>)> {
    claims.require(ROLES)?;
    req.validate()?;
    let team = state
        .repos
        .teams
        .get_team(req.team_id)
        .await?
        .ok_or_else(|| ClubError::team_not_found(req.team_id))?;
    let field = load_field(&state, req.field_id).await?;
    availability::ensure_slot_free(&state, &field, req.date, req.start_time, req.end_time, None).await?;

    let created = req.into_match(claims.user_id(), &team)?;
    let mut reservation = Reservation::new(
        field.id,
        created.creator_id,
        created.date,
        created.start_time,
        created.end_time,
        ReservationStatus::Waiting,
    );
    reservation.match_id = Some(created.id);
    reservation.phone_number = Some(created.contact_phone.clone());
    reservation.status_comment = Some(OPPONENT_WAITING_COMMENT.to_string());

    state.repos.team_matches.create_team_match(&created, &reservation).await?;
    state.metrics.reservation(reservation.status.as_str());
    info!(match_id = %created.id, team_id = %team.id, "Team match created");
    Ok((StatusCode::CREATED, Json(created)))
}

/// GET /team-vs-team-matches
///
/// Private matches are listed to their creator and the teams involved.
async fn list_matches(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> AppResult<Json<Vec<TeamMatch>>> {
    claims.require(ROLES)?;
    let matches = state.repos.team_matches.list_team_matches().await?;
    if claims.is_admin() {
        return Ok(Json(matches));
    }
    let user = claims.user_id();
    let teams: Vec<Uuid> = state
        .repos
        .teams
        .list_member_of(user)
        .await?
        .into_iter()
        .map(|t| t.id)
        .collect();
    Ok(Json(matches.into_iter().filter(|m| m.is_visible_to(user, &teams)).collect()))
}

/// GET /team-vs-team-matches/:id
async fn get_match(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<TeamMatch>> {
    claims.require(ROLES)?;
    Ok(Json(load(&state, id).await?))
}

/// PATCH /team-vs-team-matches/:id
async fn update_match(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(patch): Json<TeamMatchPatch>,
) -> AppResult<Json<TeamMatch>> {
    claims.require(ROLES)?;
    let mut m = load(&state, id).await?;
    m.ensure_creator(claims.user_id(), "update the match")?;
    patch.apply(&mut m)?;
    state.repos.team_matches.save_team_match(&m, None).await?;
    Ok(Json(m))
}

/// DELETE /team-vs-team-matches/:id
async fn delete_match(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    claims.require(ROLES)?;
    let m = load(&state, id).await?;
    m.ensure_creator(claims.user_id(), "delete the match")?;
    state.repos.team_matches.delete_team_match(id).await?;
    info!(match_id = %id, "Team match deleted");
    Ok(Json(json!({ "message": "Match deleted successfully" })))
}

// ============================================================================
// Lineup
// ============================================================================

/// POST /team-vs-team-matches/join-request
async fn request_to_join(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<TeamByName>,
) -> AppResult<Json<TeamMatch>> {
    claims.require(ROLES)?;
    let mut m = load(&state, req.match_id).await?;
    let team = team_by_name(&state, &req.team_name).await?;
    m.request_to_join(&team, claims.user_id())?;
    state.repos.team_matches.save_team_match(&m, None).await?;

    state
        .notifier
        .send(notice(
            m.creator_id,
            "Team Join Request",
            format!(
                "Team {} has requested to join your match ({}) on {} from {} to {}",
                team.name, m.title, m.date, m.start_time, m.end_time
            ),
            &m,
        ))
        .await;
    Ok(Json(m))
}

/// POST /team-vs-team-matches/approve-join
async fn approve_join(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<TeamAction>,
) -> AppResult<Json<TeamMatch>> {
    claims.require(ROLES)?;
    let mut m = load(&state, req.match_id).await?;
    m.ensure_creator(claims.user_id(), "approve join requests")?;
    let team = load_team(&state, req.team_id).await?;
    m.approve(&team)?;
    save_lineup(&state, &m).await?;

    state
        .notifier
        .send(notice(
            m.creator_id,
            "Match Completed",
            format!(
                "Your match ({}) is now completed against {}; the reservation is pending owner approval",
                m.title, team.name
            ),
            &m,
        ))
        .await;
    Ok(Json(m))
}

/// POST /team-vs-team-matches/decline-join
async fn decline_join(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<TeamAction>,
) -> AppResult<Json<TeamMatch>> {
    claims.require(ROLES)?;
    let mut m = load(&state, req.match_id).await?;
    m.ensure_creator(claims.user_id(), "decline join requests")?;
    m.decline(req.team_id)?;
    state.repos.team_matches.save_team_match(&m, None).await?;
    Ok(Json(m))
}

/// POST /team-vs-team-matches/invite
async fn invite_team(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<TeamByName>,
) -> AppResult<Json<TeamMatch>> {
    claims.require(ROLES)?;
    let mut m = load(&state, req.match_id).await?;
    m.ensure_creator(claims.user_id(), "invite teams")?;
    let team = team_by_name(&state, &req.team_name).await?;
    m.invite(&team)?;
    state.repos.team_matches.save_team_match(&m, None).await?;

    state
        .notifier
        .send(notice(
            team.captain_id,
            "Match Invitation",
            format!(
                "Your team {} has been invited to join match ({}) on {} from {} to {}",
                team.name, m.title, m.date, m.start_time, m.end_time
            ),
            &m,
        ))
        .await;
    Ok(Json(m))
}

/// POST /team-vs-team-matches/respond-invite
async fn respond_to_invite(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<InvitationReply>,
) -> AppResult<Json<TeamMatch>> {
    claims.require(ROLES)?;
    let mut m = load(&state, req.match_id).await?;
    let captained = state.repos.teams.find_captained_by(claims.user_id()).await?;
    m.respond_to_invitation(captained.as_ref(), req.accept)?;

    let team_name = captained.map(|t| t.name).unwrap_or_default();
    let (title, message) = if req.accept {
        save_lineup(&state, &m).await?;
        (
            "Match Invitation Accepted",
            format!(
                "Team {} has accepted the invitation to join your match ({}); the reservation is pending owner approval",
                team_name, m.title
            ),
        )
    } else {
        state.repos.team_matches.save_team_match(&m, None).await?;
        (
            "Match Invitation Declined",
            format!("Team {} has declined the invitation to join your match ({})", team_name, m.title),
        )
    };
    state.notifier.send(notice(m.creator_id, title, message, &m)).await;
    Ok(Json(m))
}

/// PATCH /team-vs-team-matches/leave/:matchId/:teamId
async fn leave_match(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path((match_id, team_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<TeamMatch>> {
    claims.require(ROLES)?;
    let mut m = load(&state, match_id).await?;
    let team = load_team(&state, team_id).await?;
    m.leave(&team, claims.user_id())?;
    save_lineup(&state, &m).await?;

    state
        .notifier
        .send(notice(m.creator_id, "Team Left", format!("Team {} left {}", team.name, m.title), &m))
        .await;
    Ok(Json(m))
}

// ============================================================================
// Creator actions
// ============================================================================

/// PATCH /team-vs-team-matches/cancel/:id
async fn cancel_match(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<TeamMatch>> {
    claims.require(ROLES)?;
    let mut m = load(&state, id).await?;
    m.ensure_creator(claims.user_id(), "cancel the match")?;
    m.cancel()?;

    let mut reservation = state.repos.reservations.find_by_match(id).await?;
    if let Some(r) = reservation.as_mut().filter(|r| !r.status.is_terminal()) {
        r.cancel(CancelledBy::Reserver)?;
    }
    state.repos.team_matches.save_team_match(&m, reservation.as_ref()).await?;
    info!(match_id = %id, "Team match cancelled");

    let notices: Vec<NewNotification> = players_of(&state, &m)
        .await?
        .into_iter()
        .map(|player| notice(player, "Match Cancelled", format!("{} has been cancelled", m.title), &m))
        .collect();
    state.notifier.send_all(notices).await;
    Ok(Json(m))
}

/// PATCH /team-vs-team-matches/update-time-slot
async fn update_time_slot(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<TeamMatchSlot>,
) -> AppResult<Json<TeamMatch>> {
    claims.require(ROLES)?;
    let mut m = load(&state, req.match_id).await?;
    m.ensure_creator(claims.user_id(), "update time slot")?;

    let mut reservation = state
        .repos
        .reservations
        .find_by_match(m.id)
        .await?
        .ok_or_else(|| BookingError::NotFound("Reservation not found".into()))?;
    if reservation.status == ReservationStatus::Approved {
        return Err(BookingError::Validation("An approved reservation cannot be rescheduled".into()).into());
    }
    let field = load_field(&state, m.field_id).await?;
    availability::ensure_slot_free(&state, &field, req.date, req.start_time, req.end_time, Some(reservation.id))
        .await?;

    m.reschedule(req.date, req.start_time, req.end_time)?;
    reservation.date = req.date;
    reservation.start_time = req.start_time;
    reservation.end_time = req.end_time;
    reservation.follow_lineup(m.has_opponent(), OPPONENT_WAITING_COMMENT);
    state.repos.team_matches.save_team_match(&m, Some(&reservation)).await?;

    let notices: Vec<NewNotification> = players_of(&state, &m)
        .await?
        .into_iter()
        .map(|player| {
            notice(
                player,
                "Match Time Updated",
                format!(
                    "The time for match ({}) has been updated to {} from {} to {}",
                    m.title, m.date, m.start_time, m.end_time
                ),
                &m,
            )
        })
        .collect();
    state.notifier.send_all(notices).await;
    Ok(Json(m))
}
