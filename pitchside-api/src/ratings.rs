use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    middleware::from_fn_with_state,
    routing::{get, post},
    Extension, Json, Router,
};
use pitchside_club::rating::average;
use pitchside_club::{ClubError, MatchType, NewRating, Played, Rating, Team};
use pitchside_core::{NewNotification, NotificationKind, Role};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::middleware::{auth_middleware, Claims};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AverageQuery {
    match_type: Option<String>,
}

#[derive(Debug, Serialize)]
struct AverageResponse {
    average: f64,
}

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/ratings", post(create_rating))
        .route("/ratings/user/{user_id}", get(user_ratings))
        .route("/ratings/user/{user_id}/received", get(received_ratings))
        .route("/ratings/user/{user_id}/given", get(given_ratings))
        .route("/ratings/user/{user_id}/average", get(average_rating))
        .route("/ratings/match/{match_id}", get(match_ratings))
        .route_layer(from_fn_with_state(state, auth_middleware))
}

fn ensure_self_or_admin(claims: &Claims, user_id: Uuid) -> AppResult<()> {
    if claims.user_id() == user_id || claims.is_admin() {
        Ok(())
    } else {
        Err(AppError::AuthorizationError("You can only view your own ratings".into()))
    }
}

/// Loads the match a rating refers to, with everyone who took part.
async fn load_played(state: &AppState, match_type: MatchType, match_id: Uuid) -> AppResult<Box<dyn Played>> {
    match match_type {
        MatchType::Incomplete => {
            let m = state.repos.matches.get_match(match_id).await?.ok_or_else(ClubError::match_not_found)?;
            Ok(Box::new(m))
        }
        MatchType::TeamVsTeam => {
            let m = state
                .repos
                .team_matches
                .get_team_match(match_id)
                .await?
                .ok_or_else(ClubError::match_not_found)?;
            let mut sides: Vec<Team> = Vec::new();
            for team_id in std::iter::once(m.team_id).chain(m.opponent_team_id) {
                sides.extend(state.repos.teams.get_team(team_id).await?);
            }
            Ok(Box::new(m.roster(&sides)))
        }
    }
}

/// POST /ratings
async fn create_rating(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<NewRating>,
) -> AppResult<(StatusCode, Json<Rating>)> {
    claims.require(&[Role::Player])?;
    let rater = claims.user_id();

    let match_type: MatchType = req.match_type.parse()?;
    let played = load_played(&state, match_type, req.match_id).await?;
    let player = state
        .repos
        .users
        .get_user(req.player_id)
        .await?
        .ok_or_else(|| AppError::NotFoundError(format!("User with ID {} not found", req.player_id)))?;
    let already_rated = state.repos.ratings.rating_exists(rater, player.id, played.match_id()).await?;

    let rating = req.into_rating(rater, played.as_ref(), already_rated)?;
    let tally = state.repos.ratings.create_rating(&rating).await?;
    info!(
        rating_id = %rating.id,
        player_id = %player.id,
        score = rating.score,
        average = tally.average_rating,
        "Rating recorded"
    );

    state
        .notifier
        .send(
            NewNotification::new(
                player.id,
                NotificationKind::NewRating,
                "New Rating",
                format!("You received a rating of {}/10 for {}", rating.score, played.title()),
            )
            .related(rating.id),
        )
        .await;

    Ok((StatusCode::CREATED, Json(rating)))
}

/// GET /ratings/user/:userId
async fn user_ratings(State(state): State<AppState>, Path(user_id): Path<Uuid>) -> AppResult<Json<Vec<Rating>>> {
    Ok(Json(state.repos.ratings.list_for_user(user_id).await?))
}

/// GET /ratings/user/:userId/received
async fn received_ratings(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<Vec<Rating>>> {
    ensure_self_or_admin(&claims, user_id)?;
    Ok(Json(state.repos.ratings.list_received(user_id).await?))
}

/// GET /ratings/user/:userId/given
async fn given_ratings(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<Vec<Rating>>> {
    ensure_self_or_admin(&claims, user_id)?;
    Ok(Json(state.repos.ratings.list_given(user_id).await?))
}

/// GET /ratings/user/:userId/average?matchType=
async fn average_rating(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Query(query): Query<AverageQuery>,
) -> AppResult<Json<AverageResponse>> {
    let match_type: Option<MatchType> = query.match_type.as_deref().map(str::parse).transpose()?;
    let scores: Vec<i32> = state
        .repos
        .ratings
        .list_received(user_id)
        .await?
        .into_iter()
        .filter(|r| match_type.is_none_or(|t| r.match_type == t))
        .map(|r| r.score)
        .collect();
    Ok(Json(AverageResponse { average: average(&scores) }))
}

/// GET /ratings/match/:matchId
async fn match_ratings(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(match_id): Path<Uuid>,
) -> AppResult<Json<Vec<Rating>>> {
    let played = match state.repos.matches.get_match(match_id).await? {
        Some(m) => Box::new(m) as Box<dyn Played>,
        None => load_played(&state, MatchType::TeamVsTeam, match_id).await?,
    };
    if !played.is_participant(claims.user_id()) {
        return Err(ClubError::Forbidden("You can only view ratings of matches you participated in".into()).into());
    }
    Ok(Json(state.repos.ratings.list_for_match(match_id).await?))
}
