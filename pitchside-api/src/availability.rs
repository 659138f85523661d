//! Slot and terrain checks shared by the field, reservation and match handlers.

use chrono::{Duration, NaiveDate};
use pitchside_booking::schedule::terrain_available;
use pitchside_booking::{BookingError, Field, Interval, Occupancy, Placement, Terrain, TimeOfDay, Timeline};
use uuid::Uuid;

use crate::error::AppResult;
use crate::state::AppState;

pub const TERRAIN_TAKEN: &str = "Selected terrain is not available for this time slot";
pub const SLOT_UNAVAILABLE: &str = "Reservation time is outside field operating hours or not available";

/// Timeline of `date`'s opening window. Reservations dated the day before and after are
/// loaded too, so overnight windows see what lands past midnight.
pub async fn timeline(state: &AppState, field: &Field, date: NaiveDate, exclude: Option<Uuid>) -> AppResult<Timeline> {
    let reservations = state
        .repos
        .reservations
        .list_by_field_between(field.id, date - Duration::days(1), date + Duration::days(1))
        .await?;

    let occupancy: Vec<Occupancy> = reservations
        .iter()
        .filter(|r| Some(r.id) != exclude)
        .filter_map(|r| r.occupancy())
        .collect();

    Ok(Timeline::build(date, &field.hours(), field.number_of_terrains, occupancy.iter()))
}

/// Places the requested slot in the field's hours and tells whether every minute of it is
/// still free. Duration and opening-hours violations are errors.
pub async fn slot_is_free(
    state: &AppState,
    field: &Field,
    date: NaiveDate,
    start: TimeOfDay,
    end: TimeOfDay,
    exclude: Option<Uuid>,
) -> AppResult<bool> {
    let placement: Placement = state.slots.place(&field.hours(), date, start, end)?;
    let timeline = timeline(state, field, placement.timeline_date, exclude).await?;
    Ok(timeline.is_placement_free(&placement))
}

/// Whether the field is open and has a free terrain for the whole range. Unlike
/// [`slot_is_free`] the range may have any length, so searches can ask for long windows.
pub async fn range_is_free(
    state: &AppState,
    field: &Field,
    date: NaiveDate,
    start: TimeOfDay,
    end: TimeOfDay,
) -> AppResult<bool> {
    let hours = field.hours();
    let placement = hours.locate(date, start, end);
    if !hours.contains(&placement) {
        return Ok(false);
    }
    let timeline = timeline(state, field, placement.timeline_date, None).await?;
    Ok(timeline.is_placement_free(&placement))
}

pub async fn ensure_slot_free(
    state: &AppState,
    field: &Field,
    date: NaiveDate,
    start: TimeOfDay,
    end: TimeOfDay,
    exclude: Option<Uuid>,
) -> AppResult<()> {
    if !slot_is_free(state, field, date, start, end, exclude).await? {
        return Err(BookingError::Validation(SLOT_UNAVAILABLE.into()).into());
    }
    Ok(())
}

pub async fn field_terrain(state: &AppState, field: &Field, terrain_id: Uuid) -> AppResult<Terrain> {
    Ok(state
        .repos
        .terrains
        .get_terrain(terrain_id)
        .await?
        .filter(|t| t.field_id == field.id)
        .ok_or_else(|| BookingError::terrain_not_found(terrain_id))?)
}

/// Whether `terrain` has no approved reservation overlapping the slot. Inactive terrains are
/// an error.
pub async fn terrain_is_free(
    state: &AppState,
    terrain: &Terrain,
    date: NaiveDate,
    start: TimeOfDay,
    end: TimeOfDay,
    exclude: Option<Uuid>,
) -> AppResult<bool> {
    let candidate = Interval::on(date, start, end);
    let approved: Vec<Interval> = state
        .repos
        .reservations
        .list_approved_on_terrain(terrain.id, date - Duration::days(1), date + Duration::days(1))
        .await?
        .into_iter()
        .filter(|r| Some(r.id) != exclude)
        .map(|r| r.interval())
        .collect();
    Ok(terrain_available(terrain, &candidate, &approved)?)
}

pub async fn ensure_terrain_free(
    state: &AppState,
    terrain: &Terrain,
    date: NaiveDate,
    start: TimeOfDay,
    end: TimeOfDay,
    exclude: Option<Uuid>,
) -> AppResult<()> {
    if !terrain_is_free(state, terrain, date, start, end, exclude).await? {
        return Err(BookingError::Conflict(TERRAIN_TAKEN.into()).into());
    }
    Ok(())
}
