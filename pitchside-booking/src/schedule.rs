//! Per-minute occupancy of a field over one opening window, and the bookable slots derived
//! from it.

use chrono::{Duration, NaiveDate};
use serde::Serialize;

use crate::clock::{span_minutes, Interval, TimeOfDay, MINUTES_PER_DAY};
use crate::field::{OpeningHours, Placement, Terrain};
use crate::BookingError;

pub const PENDING_COMMENT: &str = "This time slot is pending and waiting for owner approval.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotRules {
    /// Shortest bookable stretch.
    pub min_minutes: i32,
    /// Length of a generated slot, and the longest bookable stretch.
    pub slot_minutes: i32,
}

impl Default for SlotRules {
    fn default() -> Self {
        Self { min_minutes: 75, slot_minutes: 90 }
    }
}

impl SlotRules {
    pub fn check_duration(&self, start: TimeOfDay, end: TimeOfDay) -> Result<i32, BookingError> {
        let minutes = span_minutes(start, end);
        if minutes < self.min_minutes || minutes > self.slot_minutes {
            return Err(BookingError::Validation(format!(
                "Reservation duration must be between {} and {} minutes",
                self.min_minutes, self.slot_minutes
            )));
        }
        Ok(minutes)
    }

    /// Duration and opening-hours check for a requested reservation.
    pub fn place(
        &self,
        hours: &OpeningHours,
        date: NaiveDate,
        start: TimeOfDay,
        end: TimeOfDay,
    ) -> Result<Placement, BookingError> {
        self.check_duration(start, end)?;
        let placement = hours.locate(date, start, end);
        if !hours.contains(&placement) {
            return Err(BookingError::Validation(
                "Reservation time is outside field operating hours or not available".into(),
            ));
        }
        Ok(placement)
    }
}

/// A reservation as the timeline sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Occupancy {
    pub interval: Interval,
    pub approved: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TimeSlot {
    pub start_time: TimeOfDay,
    pub end_time: TimeOfDay,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PendingSlot {
    pub start_time: TimeOfDay,
    pub end_time: TimeOfDay,
    pub date: NaiveDate,
    pub comment: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DaySchedule {
    pub available_slots: Vec<TimeSlot>,
    pub pending_slots: Vec<PendingSlot>,
}

/// Minute-by-minute counters from opening to closing of `date`'s window.
/// Index 0 is the opening minute.
#[derive(Debug, Clone)]
pub struct Timeline {
    date: NaiveDate,
    open: i32,
    close: i32,
    terrains: i32,
    approved: Vec<i32>,
    total: Vec<i32>,
}

impl Timeline {
    pub fn build<'a, I>(date: NaiveDate, hours: &OpeningHours, terrains: i32, occupancy: I) -> Self
    where
        I: IntoIterator<Item = &'a Occupancy>,
    {
        let (open, close) = hours.window();
        let length = (close - open) as usize;
        let mut approved = vec![0; length];
        let mut total = vec![0; length];
        let origin = date.and_time(chrono::NaiveTime::default());

        for occ in occupancy {
            let start = (occ.interval.start - origin).num_minutes() as i32;
            let end = (occ.interval.end - origin).num_minutes() as i32;
            if end <= open || start >= close {
                continue;
            }
            let from = (start.max(open) - open) as usize;
            let to = (end.min(close) - open) as usize;
            for minute in from..to {
                total[minute] += 1;
                if occ.approved {
                    approved[minute] += 1;
                }
            }
        }

        Self { date, open, close, terrains, approved, total }
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    fn is_free_at(&self, index: usize) -> bool {
        self.approved[index] < self.terrains
    }

    fn is_pending_at(&self, index: usize) -> bool {
        self.total[index] >= self.terrains && self.approved[index] < self.total[index]
    }

    /// True when every minute of `start..end` (minutes from midnight of the timeline date)
    /// still has a terrain without an approved reservation.
    pub fn is_free(&self, start: i32, end: i32) -> bool {
        if start < self.open || end > self.close || start >= end {
            return false;
        }
        ((start - self.open) as usize..(end - self.open) as usize).all(|i| self.is_free_at(i))
    }

    pub fn is_placement_free(&self, placement: &Placement) -> bool {
        placement.timeline_date == self.date && self.is_free(placement.start, placement.end)
    }

    /// Maximal runs of minutes matching `pred`, as absolute minute ranges.
    fn runs(&self, pred: impl Fn(usize) -> bool) -> Vec<(i32, i32)> {
        let mut runs = Vec::new();
        let mut run_start: Option<usize> = None;
        for i in 0..self.approved.len() {
            match (pred(i), run_start) {
                (true, None) => run_start = Some(i),
                (false, Some(s)) => {
                    runs.push((self.open + s as i32, self.open + i as i32));
                    run_start = None;
                }
                _ => {}
            }
        }
        if let Some(s) = run_start {
            runs.push((self.open + s as i32, self.close));
        }
        runs
    }

    fn slot(&self, start: i32, end: i32) -> TimeSlot {
        let date = if start >= MINUTES_PER_DAY { self.date + Duration::days(1) } else { self.date };
        TimeSlot {
            start_time: TimeOfDay::from_minutes(start),
            end_time: TimeOfDay::from_minutes(end),
            date,
        }
    }

    /// Free runs of at least `min_minutes`, cut into back-to-back `slot_minutes` slots.
    pub fn available_slots(&self, rules: &SlotRules) -> Vec<TimeSlot> {
        let mut slots = Vec::new();
        for (start, end) in self.runs(|i| self.is_free_at(i)) {
            if end - start < rules.min_minutes {
                continue;
            }
            let mut cursor = start;
            while end - cursor >= rules.slot_minutes {
                slots.push(self.slot(cursor, cursor + rules.slot_minutes));
                cursor += rules.slot_minutes;
            }
        }
        slots
    }

    /// Stretches where every terrain is asked for but not all requests are approved yet,
    /// cut into chunks of at most `slot_minutes`; chunks under `min_minutes` are dropped.
    pub fn pending_slots(&self, rules: &SlotRules) -> Vec<PendingSlot> {
        let mut slots = Vec::new();
        for (start, end) in self.runs(|i| self.is_pending_at(i)) {
            let mut cursor = start;
            while end - cursor >= rules.min_minutes {
                let chunk_end = (cursor + rules.slot_minutes).min(end);
                let slot = self.slot(cursor, chunk_end);
                slots.push(PendingSlot {
                    start_time: slot.start_time,
                    end_time: slot.end_time,
                    date: slot.date,
                    comment: PENDING_COMMENT.to_string(),
                });
                cursor += rules.slot_minutes;
            }
        }
        slots
    }

    pub fn schedule(&self, rules: &SlotRules) -> DaySchedule {
        DaySchedule {
            available_slots: self.available_slots(rules),
            pending_slots: self.pending_slots(rules),
        }
    }
}

/// An active terrain is available when no approved reservation on it overlaps `candidate`.
pub fn terrain_available(
    terrain: &Terrain,
    candidate: &Interval,
    approved_on_terrain: &[Interval],
) -> Result<bool, BookingError> {
    if !terrain.is_active {
        return Err(BookingError::Validation("Terrain is not active".into()));
    }
    Ok(!approved_on_terrain.iter().any(|other| other.overlaps(candidate)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn t(s: &str) -> TimeOfDay {
        s.parse().unwrap()
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 5, 24).unwrap()
    }

    fn hours(open: &str, close: &str) -> OpeningHours {
        OpeningHours::new(t(open), t(close)).unwrap()
    }

    fn occ(date: NaiveDate, start: &str, end: &str, approved: bool) -> Occupancy {
        Occupancy { interval: Interval::on(date, t(start), t(end)), approved }
    }

    fn times(slots: &[TimeSlot]) -> Vec<(String, String)> {
        slots.iter().map(|s| (s.start_time.to_string(), s.end_time.to_string())).collect()
    }

    #[test]
    fn test_empty_day_is_cut_into_90_minute_slots() {
        let timeline = Timeline::build(day(), &hours("08:00", "22:00"), 1, &[]);
        let slots = timeline.available_slots(&SlotRules::default());
        // 840 minutes: nine slots, the trailing 30 minutes are dropped
        assert_eq!(slots.len(), 9);
        assert_eq!(times(&slots)[0], ("08:00".into(), "09:30".into()));
        assert_eq!(times(&slots)[8], ("20:00".into(), "21:30".into()));
        assert!(timeline.pending_slots(&SlotRules::default()).is_empty());
    }

    #[test]
    fn test_approved_reservation_blocks_single_terrain() {
        let booked = [occ(day(), "10:00", "11:30", true)];
        let timeline = Timeline::build(day(), &hours("08:00", "22:00"), 1, &booked);
        let slots = timeline.available_slots(&SlotRules::default());

        assert_eq!(times(&slots)[0], ("08:00".into(), "09:30".into()));
        assert_eq!(times(&slots)[1], ("11:30".into(), "13:00".into()));
        assert_eq!(slots.len(), 8);

        assert!(!timeline.is_free(10 * 60, 11 * 60 + 15));
        assert!(timeline.is_free(11 * 60 + 30, 13 * 60));
    }

    #[test]
    fn test_second_terrain_keeps_slot_open() {
        let booked = [occ(day(), "10:00", "11:30", true)];
        let timeline = Timeline::build(day(), &hours("08:00", "22:00"), 2, &booked);
        assert!(timeline.is_free(10 * 60, 11 * 60 + 30));
    }

    #[test]
    fn test_competing_pending_requests_show_as_pending() {
        let requests = [
            occ(day(), "18:00", "19:30", false),
            occ(day(), "18:00", "19:30", false),
        ];
        let timeline = Timeline::build(day(), &hours("08:00", "22:00"), 2, &requests);
        let pending = timeline.pending_slots(&SlotRules::default());

        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].start_time, t("18:00"));
        assert_eq!(pending[0].end_time, t("19:30"));
        assert_eq!(pending[0].comment, PENDING_COMMENT);
        // pending requests do not block the slot yet
        assert!(timeline.is_free(18 * 60, 19 * 60 + 30));
    }

    #[test]
    fn test_short_pending_chunks_are_dropped() {
        // 150 pending minutes: one 90 minute chunk, the 60 minute tail is too short
        let requests = [occ(day(), "12:00", "14:30", false)];
        let timeline = Timeline::build(day(), &hours("08:00", "22:00"), 1, &requests);
        let pending = timeline.pending_slots(&SlotRules::default());
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].end_time, t("13:30"));
    }

    #[test]
    fn test_overnight_slots_carry_next_date() {
        let timeline = Timeline::build(day(), &hours("22:00", "04:00"), 1, &[]);
        let slots = timeline.available_slots(&SlotRules::default());
        let next = day().succ_opt().unwrap();

        assert_eq!(slots.len(), 4);
        assert_eq!((slots[1].start_time, slots[1].end_time, slots[1].date), (t("23:30"), t("01:00"), day()));
        assert_eq!((slots[2].start_time, slots[2].date), (t("01:00"), next));
    }

    #[test]
    fn test_next_day_reservation_lands_after_midnight() {
        let next = day().succ_opt().unwrap();
        let booked = [occ(next, "00:30", "02:00", true)];
        let timeline = Timeline::build(day(), &hours("19:00", "03:00"), 1, &booked);

        assert!(!timeline.is_free(24 * 60 + 30, 26 * 60));
        assert!(timeline.is_free(19 * 60, 20 * 60 + 30));
    }

    #[test]
    fn test_place_request() {
        let rules = SlotRules::default();
        let h = hours("08:00", "22:00");
        assert!(rules.place(&h, day(), t("20:30"), t("22:00")).is_ok());
        assert!(rules.place(&h, day(), t("21:00"), t("22:30")).is_err());
        assert!(rules.place(&h, day(), t("10:00"), t("11:00")).is_err());
        assert!(rules.place(&h, day(), t("10:00"), t("12:00")).is_err());
    }

    #[test]
    fn test_terrain_overlap() {
        let terrain = Terrain { id: Uuid::new_v4(), field_id: Uuid::new_v4(), name: "Terrain 1".into(), is_active: true };
        let taken = [Interval::on(day(), t("18:00"), t("19:30"))];

        let clash = Interval::on(day(), t("19:00"), t("20:30"));
        let after = Interval::on(day(), t("19:30"), t("21:00"));
        assert!(!terrain_available(&terrain, &clash, &taken).unwrap());
        assert!(terrain_available(&terrain, &after, &taken).unwrap());

        let closed = Terrain { is_active: false, ..terrain };
        assert!(terrain_available(&closed, &after, &taken).is_err());
    }
}
