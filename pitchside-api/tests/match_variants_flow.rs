mod common;

use axum::http::{Method, StatusCode};
use chrono::{Duration, Utc};
use common::TestApp;
use pitchside_booking::ReservationStatus;
use pitchside_core::Role;
use serde_json::{json, Value};
use uuid::Uuid;

const DATE: &str = "2030-06-14";

async fn open_field(app: &TestApp, owner: &str) -> Value {
    let (status, field) = app
        .send(
            Method::POST,
            "/fields",
            Some(owner),
            Some(json!({
                "name": "Stade Chedly Zouiten",
                "address": "Avenue Mohamed V",
                "city": "Tunis",
                "pricePerHour": 60.0,
                "openingTime": "16:00",
                "closingTime": "23:00"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    field
}

/// A team of `size` led by the token's holder. Returns the team id and the member ids.
async fn squad(app: &TestApp, captain: &str, name: &str, size: usize) -> (String, Vec<Uuid>) {
    let players: Vec<Uuid> = (1..size)
        .map(|n| app.seed_user(Role::Player, true, &format!("{}{}@example.tn", name.to_lowercase(), n)).0.id)
        .collect();
    let (status, team) = app
        .send(
            Method::POST,
            "/teams",
            Some(captain),
            Some(json!({ "name": name, "teamSize": 6, "players": players })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    (team["id"].as_str().unwrap().to_string(), players)
}

fn booking(field_id: &str, date: &str) -> Value {
    json!({
        "title": "Friday night",
        "city": "Tunis",
        "contactPhone": "+21655123456",
        "date": date,
        "startTime": "18:00",
        "endTime": "19:30",
        "fieldId": field_id
    })
}

fn titles(app: &TestApp, user: Uuid) -> Vec<String> {
    app.store.notifications_for(user).into_iter().map(|n| n.title).collect()
}

#[tokio::test]
async fn test_full_match_follows_its_reservation() {
    let app = TestApp::new();
    let (owner, owner_token) = app.seed_user(Role::Owner, true, "owner@example.tn");
    let (_, creator) = app.seed_user(Role::Player, true, "creator@example.tn");
    let (_, stranger) = app.seed_user(Role::Player, true, "stranger@example.tn");
    let field = open_field(&app, &owner_token).await;
    let field_id = field["id"].as_str().unwrap();
    let terrain_id = field["terrains"][0]["id"].as_str().unwrap();

    let mut bad_phone = booking(field_id, DATE);
    bad_phone["contactPhone"] = json!("55123456");
    let (status, _) = app.send(Method::POST, "/full-matches", Some(&creator), Some(bad_phone)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, created) = app
        .send(Method::POST, "/full-matches", Some(&creator), Some(booking(field_id, DATE)))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["status"], "COMPLETED");
    let id: Uuid = created["id"].as_str().unwrap().parse().unwrap();
    let uri = format!("/full-matches/{}", id);

    let reservation = app.store.reservation_for_match(id).unwrap();
    assert_eq!(reservation.status, ReservationStatus::Pending);
    assert_eq!(reservation.status_comment.as_deref(), Some("Pending, awaiting owner approval"));
    assert_eq!(titles(&app, owner.id), vec!["New Pending Reservation"]);

    let (status, body) = app.send(Method::GET, &uri, Some(&stranger), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "You can only view your own matches");
    let (status, body) = app.send(Method::GET, "/full-matches/all", Some(&creator), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Forbidden resource");

    let (status, updated) = app
        .send(Method::PATCH, &uri, Some(&creator), Some(json!({ "contactPhone": "+21698765432" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["contactPhone"], "+21698765432");
    assert_eq!(app.store.reservation_for_match(id).unwrap().phone_number.as_deref(), Some("+21698765432"));

    let (status, body) = app.send(Method::DELETE, &uri, Some(&creator), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Match must be cancelled before deletion");

    let (status, _) = app
        .send(
            Method::PATCH,
            &format!("/reservations/{}/approve", reservation.id),
            Some(&owner_token),
            Some(json!({ "terrainId": terrain_id })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    // the owner has answered, so the match is frozen
    let (status, body) = app
        .send(Method::PATCH, &uri, Some(&creator), Some(json!({ "title": "Renamed" })))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Match can only be updated while reservation is pending");
    let (status, body) = app
        .send(
            Method::PATCH,
            &format!("{}/time-slot", uri),
            Some(&creator),
            Some(json!({ "date": DATE, "startTime": "20:00", "endTime": "21:30" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Time slot can only be updated while reservation is pending");

    let (status, _) = app.send(Method::PATCH, &format!("{}/cancel", uri), Some(&stranger), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, cancelled) = app.send(Method::PATCH, &format!("{}/cancel", uri), Some(&creator), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cancelled["status"], "CANCELLED");

    let reservation = app.store.reservation_for_match(id).unwrap();
    assert_eq!(reservation.status, ReservationStatus::Cancelled);
    assert_eq!(reservation.status_comment.as_deref(), Some("Cancelled by creator after approval"));
    assert_eq!(titles(&app, owner.id).last().unwrap(), "Reservation Cancelled");

    let (status, _) = app.send(Method::DELETE, &uri, Some(&creator), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app.send(Method::GET, &uri, Some(&creator), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(app.store.reservation_for_match(id).is_none());

    let (_, mine) = app.send(Method::GET, "/full-matches", Some(&creator), None).await;
    assert!(mine.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_full_match_reschedule_while_pending() {
    let app = TestApp::new();
    let (_, owner_token) = app.seed_user(Role::Owner, true, "owner@example.tn");
    let (_, creator) = app.seed_user(Role::Player, true, "creator@example.tn");
    let field = open_field(&app, &owner_token).await;
    let field_id = field["id"].as_str().unwrap();

    let (_, created) = app
        .send(Method::POST, "/full-matches", Some(&creator), Some(booking(field_id, DATE)))
        .await;
    let id: Uuid = created["id"].as_str().unwrap().parse().unwrap();
    let uri = format!("/full-matches/{}/time-slot", id);

    let (status, _) = app
        .send(
            Method::PATCH,
            &uri,
            Some(&creator),
            Some(json!({ "date": DATE, "startTime": "22:00", "endTime": "23:30" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, moved) = app
        .send(
            Method::PATCH,
            &uri,
            Some(&creator),
            Some(json!({ "date": "2030-06-15", "startTime": "20:00", "endTime": "21:30" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(moved["date"], "2030-06-15");

    let reservation = app.store.reservation_for_match(id).unwrap();
    assert_eq!(reservation.date.to_string(), "2030-06-15");
    assert_eq!(reservation.start_time.to_string(), "20:00");
    assert_eq!(reservation.status, ReservationStatus::Pending);
}

#[tokio::test]
async fn test_team_against_team_lineup_drives_the_reservation() {
    let app = TestApp::new();
    let (owner, owner_token) = app.seed_user(Role::Owner, true, "owner@example.tn");
    let (home, home_token) = app.seed_user(Role::Player, true, "home@example.tn");
    let (away, away_token) = app.seed_user(Role::Player, true, "away@example.tn");
    let (_, rookie_token) = app.seed_user(Role::Player, true, "rookie@example.tn");
    let field = open_field(&app, &owner_token).await;
    let field_id = field["id"].as_str().unwrap();

    let (home_team, _) = squad(&app, &home_token, "Lions", 6).await;
    let (away_team, away_players) = squad(&app, &away_token, "Tigres", 6).await;
    squad(&app, &rookie_token, "Rookies", 2).await;

    let mut request = booking(field_id, DATE);
    request["teamId"] = json!(home_team);
    let (status, created) = app
        .send(Method::POST, "/team-vs-team-matches", Some(&home_token), Some(request))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["status"], "PENDING");
    let id: Uuid = created["id"].as_str().unwrap().parse().unwrap();

    let reservation = app.store.reservation_for_match(id).unwrap();
    assert_eq!(reservation.status, ReservationStatus::Waiting);
    assert_eq!(reservation.status_comment.as_deref(), Some("Waiting for opponent team"));
    assert!(titles(&app, owner.id).is_empty());

    let (status, body) = app
        .send(
            Method::POST,
            "/team-vs-team-matches/join-request",
            Some(&rookie_token),
            Some(json!({ "matchId": id, "teamName": "Rookies" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Team is not complete");

    let (status, joined) = app
        .send(
            Method::POST,
            "/team-vs-team-matches/join-request",
            Some(&away_token),
            Some(json!({ "matchId": id, "teamName": "Tigres" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(joined["pendingTeams"], json!([away_team]));
    assert_eq!(titles(&app, home.id), vec!["Team Join Request"]);

    let action = json!({ "matchId": id, "teamId": away_team });
    let (status, body) = app
        .send(Method::POST, "/team-vs-team-matches/approve-join", Some(&away_token), Some(action.clone()))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Only creator can approve join requests");

    let (status, approved) = app
        .send(Method::POST, "/team-vs-team-matches/approve-join", Some(&home_token), Some(action))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(approved["opponentTeamId"], away_team);
    assert_eq!(approved["status"], "COMPLETED");
    let reservation = app.store.reservation_for_match(id).unwrap();
    assert_eq!(reservation.status, ReservationStatus::Pending);
    assert_eq!(titles(&app, owner.id), vec!["New Pending Reservation"]);

    let leave = format!("/team-vs-team-matches/leave/{}/{}", id, away_team);
    let (status, left) = app.send(Method::PATCH, &leave, Some(&away_token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(left["status"], "PENDING");
    assert!(left["opponentTeamId"].is_null());
    let reservation = app.store.reservation_for_match(id).unwrap();
    assert_eq!(reservation.status, ReservationStatus::Waiting);
    assert_eq!(reservation.status_comment.as_deref(), Some("Waiting for opponent team"));

    let (status, body) = app
        .send(
            Method::PATCH,
            &format!("/team-vs-team-matches/leave/{}/{}", id, home_team),
            Some(&home_token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Creator's team cannot leave; cancel the match instead");

    let (status, _) = app
        .send(
            Method::POST,
            "/team-vs-team-matches/invite",
            Some(&home_token),
            Some(json!({ "matchId": id, "teamName": "Tigres" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(titles(&app, away.id).last().unwrap(), "Match Invitation");

    let reply = json!({ "matchId": id, "accept": true });
    let (status, body) = app
        .send(Method::POST, "/team-vs-team-matches/respond-invite", Some(&rookie_token), Some(reply.clone()))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Only the team captain can respond to the invitation");

    let (status, accepted) = app
        .send(Method::POST, "/team-vs-team-matches/respond-invite", Some(&away_token), Some(reply))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(accepted["opponentTeamId"], away_team);
    assert_eq!(accepted["invitedTeams"], json!([]));
    assert_eq!(titles(&app, home.id).last().unwrap(), "Match Invitation Accepted");
    assert_eq!(app.store.reservation_for_match(id).unwrap().status, ReservationStatus::Pending);

    let (status, cancelled) = app
        .send(Method::PATCH, &format!("/team-vs-team-matches/cancel/{}", id), Some(&home_token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cancelled["status"], "CANCELLED");
    let reservation = app.store.reservation_for_match(id).unwrap();
    assert_eq!(reservation.status, ReservationStatus::Cancelled);
    assert_eq!(titles(&app, away_players[0]).last().unwrap(), "Match Cancelled");
}

#[tokio::test]
async fn test_private_team_matches_and_team_ratings() {
    let app = TestApp::new();
    let (_, owner_token) = app.seed_user(Role::Owner, true, "owner@example.tn");
    let (home, home_token) = app.seed_user(Role::Player, true, "home@example.tn");
    let (_, away_token) = app.seed_user(Role::Player, true, "away@example.tn");
    let (_, outsider) = app.seed_user(Role::Player, true, "outsider@example.tn");
    let field = open_field(&app, &owner_token).await;
    let field_id = field["id"].as_str().unwrap();

    let (home_team, _) = squad(&app, &home_token, "Lions", 6).await;
    let (_, away_players) = squad(&app, &away_token, "Tigres", 6).await;

    let mut request = booking(field_id, DATE);
    request["teamId"] = json!(home_team);
    request["isPublic"] = json!(false);
    let (_, created) = app
        .send(Method::POST, "/team-vs-team-matches", Some(&home_token), Some(request))
        .await;
    let id = created["id"].as_str().unwrap().to_string();

    let (_, listed) = app.send(Method::GET, "/team-vs-team-matches", Some(&outsider), None).await;
    assert!(listed.as_array().unwrap().is_empty());
    let (_, listed) = app.send(Method::GET, "/team-vs-team-matches", Some(&home_token), None).await;
    assert_eq!(listed.as_array().unwrap().len(), 1);

    app.send(
        Method::POST,
        "/team-vs-team-matches/invite",
        Some(&home_token),
        Some(json!({ "matchId": id, "teamName": "Tigres" })),
    )
    .await;
    // an invited team sees the private match too
    let (_, listed) = app.send(Method::GET, "/team-vs-team-matches", Some(&away_token), None).await;
    assert_eq!(listed.as_array().unwrap().len(), 1);
    app.send(
        Method::POST,
        "/team-vs-team-matches/respond-invite",
        Some(&away_token),
        Some(json!({ "matchId": id, "accept": true })),
    )
    .await;

    let rating = |match_type: &str, player: Uuid| {
        json!({ "playerId": player, "matchId": id, "matchType": match_type, "score": 8 })
    };
    let (status, _) = app
        .send(Method::POST, "/ratings", Some(&home_token), Some(rating("INCOMPLETE", away_players[0])))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app
        .send(Method::POST, "/ratings", Some(&outsider), Some(rating("TEAM_VS_TEAM", away_players[0])))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "You can only rate players from matches you participated in");

    let (status, rated) = app
        .send(Method::POST, "/ratings", Some(&home_token), Some(rating("TEAM_VS_TEAM", away_players[0])))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(rated["matchType"], "TEAM_VS_TEAM");
    let rated_player = app.store.user(away_players[0]).unwrap();
    assert_eq!(rated_player.total_ratings, 1);
    assert_eq!(rated_player.average_rating, 8.0);

    let (status, _) = app
        .send(Method::POST, "/ratings", Some(&home_token), Some(rating("TEAM_VS_TEAM", away_players[0])))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, listed) = app
        .send(Method::GET, &format!("/ratings/match/{}", id), Some(&home_token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed.as_array().unwrap().len(), 1);
    assert_eq!(listed[0]["raterId"], home.id.to_string());
}

#[tokio::test]
async fn test_dashboards_count_matches_and_takings() {
    let app = TestApp::new();
    let (_, owner_token) = app.seed_user(Role::Owner, true, "owner@example.tn");
    let (_, player_token) = app.seed_user(Role::Player, true, "player@example.tn");
    let field = open_field(&app, &owner_token).await;
    let field_id = field["id"].as_str().unwrap();
    let terrain_id = field["terrains"][0]["id"].as_str().unwrap();
    let soon = (Utc::now().date_naive() + Duration::days(2)).to_string();

    let (status, _) = app.send(Method::GET, "/owner/dashboard", Some(&player_token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.send(Method::GET, "/player/dashboard", Some(&owner_token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (team, _) = squad(&app, &player_token, "Lions", 6).await;
    let (_, full) = app
        .send(Method::POST, "/full-matches", Some(&player_token), Some(booking(field_id, &soon)))
        .await;
    let full_id: Uuid = full["id"].as_str().unwrap().parse().unwrap();
    let mut versus = booking(field_id, &soon);
    versus["teamId"] = json!(team);
    versus["startTime"] = json!("20:00");
    versus["endTime"] = json!("21:30");
    let (status, _) = app
        .send(Method::POST, "/team-vs-team-matches", Some(&player_token), Some(versus))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, board) = app.send(Method::GET, "/owner/dashboard", Some(&owner_token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(board["totalFields"], 1);
    assert_eq!(board["pendingReservations"], 1);
    assert_eq!(board["totalRevenue"], 0.0);

    let reservation = app.store.reservation_for_match(full_id).unwrap();
    app.send(
        Method::PATCH,
        &format!("/reservations/{}/approve", reservation.id),
        Some(&owner_token),
        Some(json!({ "terrainId": terrain_id })),
    )
    .await;

    let (_, board) = app.send(Method::GET, "/owner/dashboard", Some(&owner_token), None).await;
    assert_eq!(board["pendingReservations"], 0);
    assert_eq!(board["totalRevenue"], 90.0);
    assert_eq!(board["upcomingReservations"].as_array().unwrap().len(), 1);

    let (status, stats) = app.send(Method::GET, "/owner/statistics", Some(&owner_token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["totalReservations"], 2);
    assert_eq!(stats["approvedReservations"], 1);
    assert_eq!(stats["rejectedReservations"], 0);
    assert_eq!(stats["revenuePerField"][0]["fieldName"], "Stade Chedly Zouiten");
    assert_eq!(stats["revenuePerField"][0]["revenue"], 90.0);

    let (status, board) = app.send(Method::GET, "/player/dashboard", Some(&player_token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(board["totalCreatedMatches"], 2);
    assert_eq!(board["totalJoinedMatches"], 0);
    assert_eq!(board["totalTeams"], 1);
    let kinds: Vec<&str> = board["upcomingMatches"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["matchType"].as_str().unwrap())
        .collect();
    assert_eq!(kinds, vec!["FULL", "TEAM_VS_TEAM"]);
}
