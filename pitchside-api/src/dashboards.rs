use axum::{extract::State, middleware::from_fn_with_state, routing::get, Extension, Json, Router};
use chrono::{Duration, NaiveDate, Utc};
use pitchside_booking::clock::span_minutes;
use pitchside_booking::pricing::booking_revenue;
use pitchside_booking::{BookingError, Field, Reservation, ReservationStatus, TimeOfDay};
use pitchside_club::MatchStatus;
use pitchside_core::repository::MatchFilter;
use pitchside_core::Role;
use pitchside_shared::Money;
use serde::Serialize;
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::{auth_middleware, Claims};
use crate::state::AppState;

const UPCOMING_DAYS: i64 = 7;
const STATISTICS_DAYS: i64 = 30;

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerDashboard {
    pub total_fields: usize,
    pub pending_reservations: usize,
    pub total_revenue: Money,
    pub upcoming_reservations: Vec<Reservation>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldRevenue {
    pub field_id: Uuid,
    pub field_name: String,
    pub revenue: Money,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerStatistics {
    pub total_fields: usize,
    pub total_reservations: usize,
    pub approved_reservations: usize,
    pub rejected_reservations: usize,
    pub total_revenue: Money,
    pub revenue_per_field: Vec<FieldRevenue>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpcomingMatch {
    pub id: Uuid,
    pub title: String,
    pub match_type: &'static str,
    pub date: NaiveDate,
    pub start_time: TimeOfDay,
    pub end_time: TimeOfDay,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerDashboard {
    pub total_created_matches: usize,
    pub total_joined_matches: usize,
    pub total_teams: usize,
    pub average_rating: f64,
    pub total_ratings: i32,
    pub upcoming_matches: Vec<UpcomingMatch>,
}

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/owner/dashboard", get(owner_dashboard))
        .route("/owner/statistics", get(owner_statistics))
        .route("/player/dashboard", get(player_dashboard))
        .route_layer(from_fn_with_state(state, auth_middleware))
}

/// Takings of the approved reservations among `reservations`.
fn approved_revenue<'a>(field: &Field, reservations: impl IntoIterator<Item = &'a Reservation>) -> AppResult<Money> {
    let mut total = Money::ZERO;
    for r in reservations.into_iter().filter(|r| r.status == ReservationStatus::Approved) {
        let takings = booking_revenue(field.price_per_hour, span_minutes(r.start_time, r.end_time))?;
        total = total
            .checked_add(takings)
            .ok_or_else(|| BookingError::Validation("Revenue is too large".into()))?;
    }
    Ok(total)
}

fn add_revenue(total: Money, more: Money) -> AppResult<Money> {
    Ok(total
        .checked_add(more)
        .ok_or_else(|| BookingError::Validation("Revenue is too large".into()))?)
}

async fn owned_fields(state: &AppState, owner: Uuid) -> AppResult<Vec<(Field, Vec<Reservation>)>> {
    let mut owned = Vec::new();
    for field in state.repos.fields.list_fields_by_owner(owner).await? {
        let reservations = state.repos.reservations.list_by_field(field.id, None).await?;
        owned.push((field, reservations));
    }
    Ok(owned)
}

/// GET /owner/dashboard
async fn owner_dashboard(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> AppResult<Json<OwnerDashboard>> {
    claims.require(&[Role::Owner])?;
    let today = Utc::now().date_naive();
    let horizon = today + Duration::days(UPCOMING_DAYS);

    let owned = owned_fields(&state, claims.user_id()).await?;
    let mut total_revenue = Money::ZERO;
    let mut pending_reservations = 0;
    let mut upcoming_reservations = Vec::new();
    for (field, reservations) in &owned {
        total_revenue = add_revenue(total_revenue, approved_revenue(field, reservations)?)?;
        pending_reservations += reservations
            .iter()
            .filter(|r| r.status == ReservationStatus::Pending)
            .count();
        upcoming_reservations.extend(
            reservations
                .iter()
                .filter(|r| r.status == ReservationStatus::Approved && (today..=horizon).contains(&r.date))
                .cloned(),
        );
    }
    upcoming_reservations.sort_by_key(|r| (r.date, r.start_time));

    Ok(Json(OwnerDashboard {
        total_fields: owned.len(),
        pending_reservations,
        total_revenue,
        upcoming_reservations,
    }))
}

/// GET /owner/statistics
///
/// Covers reservations made within the last thirty days.
async fn owner_statistics(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> AppResult<Json<OwnerStatistics>> {
    claims.require(&[Role::Owner])?;
    let since = Utc::now() - Duration::days(STATISTICS_DAYS);

    let owned = owned_fields(&state, claims.user_id()).await?;
    let mut stats = OwnerStatistics {
        total_fields: owned.len(),
        total_reservations: 0,
        approved_reservations: 0,
        rejected_reservations: 0,
        total_revenue: Money::ZERO,
        revenue_per_field: Vec::with_capacity(owned.len()),
    };
    for (field, reservations) in &owned {
        let recent: Vec<&Reservation> = reservations.iter().filter(|r| r.created_at >= since).collect();
        stats.total_reservations += recent.len();
        stats.approved_reservations += recent.iter().filter(|r| r.status == ReservationStatus::Approved).count();
        stats.rejected_reservations += recent.iter().filter(|r| r.status == ReservationStatus::Rejected).count();

        let revenue = approved_revenue(field, recent.iter().copied())?;
        stats.total_revenue = add_revenue(stats.total_revenue, revenue)?;
        stats.revenue_per_field.push(FieldRevenue {
            field_id: field.id,
            field_name: field.name.clone(),
            revenue,
        });
    }
    Ok(Json(stats))
}

/// GET /player/dashboard
async fn player_dashboard(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> AppResult<Json<PlayerDashboard>> {
    claims.require(&[Role::Player])?;
    let me = claims.user_id();
    let today = Utc::now().date_naive();

    let user = state.repos.users.get_user(me).await?;
    let teams: Vec<Uuid> = state.repos.teams.list_member_of(me).await?.into_iter().map(|t| t.id).collect();

    let filter = MatchFilter { viewer: Some(me), ..Default::default() };
    let incomplete = state.repos.matches.list_matches(&filter).await?;
    let full = state.repos.full_matches.list_full_matches(Some(me)).await?;
    let versus = state.repos.team_matches.list_team_matches().await?;

    let mut created = full.len();
    let mut joined = 0;
    let mut upcoming = Vec::new();

    for m in &incomplete {
        let mine = m.creator_id == me;
        if !mine && !m.players.contains(&me) {
            continue;
        }
        if mine {
            created += 1;
        } else {
            joined += 1;
        }
        if m.date >= today && m.status != MatchStatus::Cancelled {
            upcoming.push(UpcomingMatch {
                id: m.id,
                title: m.title.clone(),
                match_type: "INCOMPLETE",
                date: m.date,
                start_time: m.start_time,
                end_time: m.end_time,
            });
        }
    }
    for m in &versus {
        let mine = m.creator_id == me;
        if !mine && !teams.iter().any(|t| m.involves(*t)) {
            continue;
        }
        if mine {
            created += 1;
        } else {
            joined += 1;
        }
        if m.date >= today && m.status != MatchStatus::Cancelled {
            upcoming.push(UpcomingMatch {
                id: m.id,
                title: m.title.clone(),
                match_type: "TEAM_VS_TEAM",
                date: m.date,
                start_time: m.start_time,
                end_time: m.end_time,
            });
        }
    }
    upcoming.extend(
        full.iter()
            .filter(|m| m.date >= today && m.status != MatchStatus::Cancelled)
            .map(|m| UpcomingMatch {
                id: m.id,
                title: m.title.clone(),
                match_type: "FULL",
                date: m.date,
                start_time: m.start_time,
                end_time: m.end_time,
            }),
    );
    upcoming.sort_by_key(|m| (m.date, m.start_time));

    Ok(Json(PlayerDashboard {
        total_created_matches: created,
        total_joined_matches: joined,
        total_teams: teams.len(),
        average_rating: user.as_ref().map_or(0.0, |u| u.average_rating),
        total_ratings: user.as_ref().map_or(0, |u| u.total_ratings),
        upcoming_matches: upcoming,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pitchside_booking::NewField;

    fn booking(start: i32, end: i32, status: ReservationStatus) -> Reservation {
        let date = NaiveDate::from_ymd_opt(2030, 5, 4).unwrap();
        Reservation::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            date,
            TimeOfDay::from_minutes(start),
            TimeOfDay::from_minutes(end),
            status,
        )
    }

    fn pitch(price_per_hour: Money) -> Field {
        NewField {
            name: "Stade".into(),
            description: None,
            address: "1 rue du Stade".into(),
            city: "Lyon".into(),
            price_per_hour,
            match_duration: None,
            has_showers: false,
            has_water: false,
            is_indoor: false,
            image: None,
            number_of_terrains: None,
            opening_time: TimeOfDay::from_minutes(8 * 60),
            closing_time: TimeOfDay::from_minutes(23 * 60),
        }
        .into_field(Uuid::new_v4())
    }

    #[test]
    fn test_revenue_counts_approved_bookings_only() {
        let field = pitch(Money::from_minor(6000));
        let bookings = [
            booking(600, 690, ReservationStatus::Approved),
            booking(720, 780, ReservationStatus::Pending),
            booking(800, 830, ReservationStatus::Approved),
        ];
        assert_eq!(approved_revenue(&field, &bookings).unwrap(), Money::from_minor(12000));
    }

    #[test]
    fn test_revenue_overflow_is_refused() {
        let field = pitch(Money::from_minor(i64::MAX / 2));
        let bookings = [
            booking(0, 120, ReservationStatus::Approved),
            booking(120, 240, ReservationStatus::Approved),
        ];
        assert!(approved_revenue(&field, &bookings).is_err());
    }
}
