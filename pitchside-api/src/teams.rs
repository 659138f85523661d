use axum::{
    extract::{Path, State},
    http::StatusCode,
    middleware::from_fn_with_state,
    routing::{delete, get, post},
    Extension, Json, Router,
};
use pitchside_club::{ClubError, NewTeam, Recruit, Team, TeamPatch, TeamSummary};
use pitchside_core::{NewNotification, NotificationKind, Role, User};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::middleware::{auth_middleware, Claims};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddPlayerRequest {
    player_id: Uuid,
}

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/teams", get(list_teams).post(create_team))
        .route("/teams/captained/me", get(captained_team))
        .route("/teams/member/me", get(member_teams))
        .route("/teams/{id}", get(get_team).put(update_team).delete(delete_team))
        .route("/teams/{id}/players", post(add_player))
        .route("/teams/{id}/players/{player_id}", delete(remove_player))
        .route("/teams/{id}/leave", post(leave_team))
        .route("/teams/{id}/transfer-captaincy/{new_captain_id}", post(transfer_captaincy))
        .route_layer(from_fn_with_state(state, auth_middleware))
}

fn recruit(user: &User) -> Recruit {
    Recruit {
        id: user.id,
        is_active: user.is_active,
        is_player: user.role == Role::Player,
    }
}

async fn load(state: &AppState, id: Uuid) -> AppResult<Team> {
    Ok(state.repos.teams.get_team(id).await?.ok_or_else(|| ClubError::team_not_found(id))?)
}

/// POST /teams
async fn create_team(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<NewTeam>,
) -> AppResult<(StatusCode, Json<TeamSummary>)> {
    claims.require(&[Role::Player])?;
    let captain = claims.user_id();
    if state.repos.teams.find_captained_by(captain).await?.is_some() {
        return Err(ClubError::Conflict("User is already captaining a team".into()).into());
    }
    req.validate(captain)?;

    let recruits: Vec<Recruit> = state.repos.users.get_users(&req.players).await?.iter().map(recruit).collect();
    let team = req.into_team(captain, &recruits)?;
    state.repos.teams.create_team(&team).await?;
    info!(team_id = %team.id, captain_id = %captain, players = team.players.len(), "Team created");

    let welcome = team.players.iter().map(|player| {
        NewNotification::new(
            *player,
            NotificationKind::Team,
            "Added to Team",
            format!("You have been added to team {}", team.name),
        )
        .related(team.id)
    }).collect::<Vec<_>>();
    state.notifier.send_all(welcome).await;

    Ok((StatusCode::CREATED, Json(team.summary())))
}

/// GET /teams
async fn list_teams(State(state): State<AppState>) -> AppResult<Json<Vec<TeamSummary>>> {
    let teams = state.repos.teams.list_teams().await?;
    Ok(Json(teams.into_iter().map(Team::summary).collect()))
}

/// GET /teams/:id
async fn get_team(State(state): State<AppState>, Path(id): Path<Uuid>) -> AppResult<Json<TeamSummary>> {
    Ok(Json(load(&state, id).await?.summary()))
}

/// PUT /teams/:id
async fn update_team(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(patch): Json<TeamPatch>,
) -> AppResult<Json<TeamSummary>> {
    let mut team = load(&state, id).await?;
    team.ensure_managed_by(claims.user_id(), claims.is_admin())?;
    patch.apply(&mut team)?;
    state.repos.teams.save_team(&team).await?;
    Ok(Json(team.summary()))
}

/// DELETE /teams/:id
async fn delete_team(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    let team = load(&state, id).await?;
    team.ensure_managed_by(claims.user_id(), claims.is_admin())?;
    state.repos.teams.delete_team(id).await?;
    info!(team_id = %id, "Team deleted");
    Ok(Json(json!({ "message": "Team deleted successfully" })))
}

/// POST /teams/:id/players
async fn add_player(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(req): Json<AddPlayerRequest>,
) -> AppResult<Json<TeamSummary>> {
    let mut team = load(&state, id).await?;
    team.ensure_managed_by(claims.user_id(), claims.is_admin())?;

    let player = state
        .repos
        .users
        .get_user(req.player_id)
        .await?
        .ok_or_else(|| AppError::NotFoundError(format!("User with ID {} not found", req.player_id)))?;
    let completed = team.add_player(&recruit(&player))?;
    state.repos.teams.save_team(&team).await?;

    let mut notices = vec![NewNotification::new(
        player.id,
        NotificationKind::Team,
        "Added to Team",
        format!("You have been added to team {}", team.name),
    )
    .related(team.id)];
    if completed {
        notices.push(
            NewNotification::new(
                team.captain_id,
                NotificationKind::Team,
                "Team Complete",
                format!("Team {} now has all {} members", team.name, team.team_size),
            )
            .related(team.id),
        );
    }
    state.notifier.send_all(notices).await;

    Ok(Json(team.summary()))
}

/// DELETE /teams/:id/players/:playerId
async fn remove_player(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path((id, player_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<TeamSummary>> {
    let mut team = load(&state, id).await?;
    team.ensure_managed_by(claims.user_id(), claims.is_admin())?;
    team.remove_player(player_id)?;
    state.repos.teams.save_team(&team).await?;

    state
        .notifier
        .send(
            NewNotification::new(
                player_id,
                NotificationKind::Team,
                "Removed from Team",
                format!("You have been removed from team {}", team.name),
            )
            .related(team.id),
        )
        .await;

    Ok(Json(team.summary()))
}

/// POST /teams/:id/leave
async fn leave_team(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    let mut team = load(&state, id).await?;
    team.leave(claims.user_id())?;
    state.repos.teams.save_team(&team).await?;
    Ok(Json(json!({ "message": "You have left the team" })))
}

/// POST /teams/:id/transfer-captaincy/:newCaptainId
async fn transfer_captaincy(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path((id, new_captain)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<TeamSummary>> {
    let mut team = load(&state, id).await?;
    team.ensure_managed_by(claims.user_id(), claims.is_admin())?;

    let captains_elsewhere = state
        .repos
        .teams
        .find_captained_by(new_captain)
        .await?
        .is_some_and(|other| other.id != team.id);
    team.transfer_captaincy(new_captain, captains_elsewhere)?;
    state.repos.teams.save_team(&team).await?;
    info!(team_id = %id, captain_id = %new_captain, "Captaincy transferred");

    state
        .notifier
        .send(
            NewNotification::new(
                new_captain,
                NotificationKind::Team,
                "New Captain",
                format!("You are now the captain of team {}", team.name),
            )
            .related(team.id),
        )
        .await;

    Ok(Json(team.summary()))
}

/// GET /teams/captained/me
async fn captained_team(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> AppResult<Json<Option<TeamSummary>>> {
    let team = state.repos.teams.find_captained_by(claims.user_id()).await?;
    Ok(Json(team.map(Team::summary)))
}

/// GET /teams/member/me
async fn member_teams(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> AppResult<Json<Vec<TeamSummary>>> {
    let teams = state.repos.teams.list_member_of(claims.user_id()).await?;
    Ok(Json(teams.into_iter().map(Team::summary).collect()))
}
