use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::clock::{Interval, TimeOfDay};
use crate::schedule::Occupancy;
use crate::BookingError;

pub const OWNER_CREATED_COMMENT: &str = "Owner-created reservation";
pub const APPROVED_COMMENT: &str = "Reservation approved";
pub const ROSTER_FULL_COMMENT: &str = "Pending, awaiting owner approval";
pub const ROSTER_OPEN_COMMENT: &str = "Waiting for more players";
pub const OPPONENT_WAITING_COMMENT: &str = "Waiting for opponent team";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReservationStatus {
    Pending,
    Approved,
    Rejected,
    Cancelled,
    Waiting,
}

impl ReservationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Pending => "PENDING",
            ReservationStatus::Approved => "APPROVED",
            ReservationStatus::Rejected => "REJECTED",
            ReservationStatus::Cancelled => "CANCELLED",
            ReservationStatus::Waiting => "WAITING",
        }
    }

    /// Statuses that still claim time on the field.
    pub fn holds_slot(&self) -> bool {
        matches!(
            self,
            ReservationStatus::Pending | ReservationStatus::Approved | ReservationStatus::Waiting
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ReservationStatus::Rejected | ReservationStatus::Cancelled)
    }

    pub fn can_transition_to(&self, next: ReservationStatus) -> bool {
        use ReservationStatus::*;
        matches!(
            (self, next),
            (Waiting, Pending)
                | (Waiting, Cancelled)
                | (Pending, Waiting)
                | (Pending, Approved)
                | (Pending, Rejected)
                | (Pending, Cancelled)
                | (Approved, Cancelled)
        )
    }
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReservationStatus {
    type Err = BookingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(ReservationStatus::Pending),
            "APPROVED" => Ok(ReservationStatus::Approved),
            "REJECTED" => Ok(ReservationStatus::Rejected),
            "CANCELLED" => Ok(ReservationStatus::Cancelled),
            "WAITING" => Ok(ReservationStatus::Waiting),
            other => Err(BookingError::Validation(format!("Unknown reservation status: {}", other))),
        }
    }
}

/// Who is cancelling; decides the status comment and who gets told.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelledBy {
    FieldOwner,
    Reserver,
}

impl CancelledBy {
    pub fn comment(&self) -> &'static str {
        match self {
            CancelledBy::FieldOwner => "Reservation cancelled by owner",
            CancelledBy::Reserver => "Reservation cancelled by match creator",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reservation {
    pub id: Uuid,
    pub field_id: Uuid,
    pub terrain_id: Option<Uuid>,
    pub match_id: Option<Uuid>,
    pub user_id: Uuid,
    pub phone_number: Option<String>,
    pub date: NaiveDate,
    pub start_time: TimeOfDay,
    pub end_time: TimeOfDay,
    #[serde(rename = "reservedStatus")]
    pub status: ReservationStatus,
    pub status_comment: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Reservation {
    pub fn new(
        field_id: Uuid,
        user_id: Uuid,
        date: NaiveDate,
        start_time: TimeOfDay,
        end_time: TimeOfDay,
        status: ReservationStatus,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            field_id,
            terrain_id: None,
            match_id: None,
            user_id,
            phone_number: None,
            date,
            start_time,
            end_time,
            status,
            status_comment: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn interval(&self) -> Interval {
        Interval::on(self.date, self.start_time, self.end_time)
    }

    pub fn occupancy(&self) -> Option<Occupancy> {
        self.status.holds_slot().then(|| Occupancy {
            interval: self.interval(),
            approved: self.status == ReservationStatus::Approved,
        })
    }

    pub fn transition(&mut self, next: ReservationStatus, comment: Option<String>) -> Result<(), BookingError> {
        if !self.status.can_transition_to(next) {
            return Err(BookingError::InvalidTransition {
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        self.status = next;
        if comment.is_some() {
            self.status_comment = comment;
        }
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn approve(&mut self, terrain_id: Uuid, comment: Option<String>) -> Result<(), BookingError> {
        if self.status != ReservationStatus::Pending {
            return Err(BookingError::Validation("Reservation is not in PENDING status".into()));
        }
        self.transition(
            ReservationStatus::Approved,
            Some(comment.unwrap_or_else(|| APPROVED_COMMENT.to_string())),
        )?;
        self.terrain_id = Some(terrain_id);
        Ok(())
    }

    pub fn reject(&mut self, comment: Option<String>) -> Result<(), BookingError> {
        if self.status != ReservationStatus::Pending {
            return Err(BookingError::Validation("Reservation is not in PENDING status".into()));
        }
        self.transition(
            ReservationStatus::Rejected,
            Some(comment.unwrap_or_else(|| "Reservation rejected".to_string())),
        )
    }

    /// Returns the status held before cancelling.
    pub fn cancel(&mut self, by: CancelledBy) -> Result<ReservationStatus, BookingError> {
        if self.status.is_terminal() {
            return Err(BookingError::Validation("Reservation is already cancelled or rejected".into()));
        }
        let previous = self.status;
        self.transition(ReservationStatus::Cancelled, Some(by.comment().to_string()))?;
        Ok(previous)
    }

    /// Follows the roster of the linked match: full rosters ask the owner for approval, open
    /// rosters wait. Approved and closed reservations are left alone. Returns whether anything changed.
    pub fn sync_with_roster(&mut self, roster_full: bool) -> bool {
        self.follow_lineup(roster_full, ROSTER_OPEN_COMMENT)
    }

    /// Same as [`Reservation::sync_with_roster`] for lineups that wait on something other
    /// than players, such as an opponent team.
    pub fn follow_lineup(&mut self, ready: bool, waiting_comment: &str) -> bool {
        let (next, comment) = if ready {
            (ReservationStatus::Pending, ROSTER_FULL_COMMENT)
        } else {
            (ReservationStatus::Waiting, waiting_comment)
        };
        if self.status == next || !self.status.can_transition_to(next) {
            return false;
        }
        self.transition(next, Some(comment.to_string())).is_ok()
    }

    pub fn overlaps(&self, other: &Reservation) -> bool {
        self.interval().overlaps(&other.interval())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewReservation {
    pub field_id: Uuid,
    pub date: NaiveDate,
    pub start_time: TimeOfDay,
    pub end_time: TimeOfDay,
    pub match_id: Option<Uuid>,
    pub phone_number: Option<String>,
    pub status_comment: Option<String>,
}

impl NewReservation {
    pub fn into_reservation(self, user_id: Uuid) -> Reservation {
        let mut reservation = Reservation::new(
            self.field_id,
            user_id,
            self.date,
            self.start_time,
            self.end_time,
            ReservationStatus::Pending,
        );
        reservation.match_id = self.match_id;
        reservation.phone_number = self.phone_number;
        reservation.status_comment = self.status_comment;
        reservation
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerReservation {
    pub field_id: Uuid,
    pub terrain_id: Uuid,
    pub date: NaiveDate,
    pub start_time: TimeOfDay,
    pub end_time: TimeOfDay,
    pub phone_number: Option<String>,
    pub status_comment: Option<String>,
}

impl OwnerReservation {
    pub fn into_reservation(self, owner_id: Uuid) -> Reservation {
        let mut reservation = Reservation::new(
            self.field_id,
            owner_id,
            self.date,
            self.start_time,
            self.end_time,
            ReservationStatus::Approved,
        );
        reservation.terrain_id = Some(self.terrain_id);
        reservation.phone_number = self.phone_number;
        reservation.status_comment =
            Some(self.status_comment.unwrap_or_else(|| OWNER_CREATED_COMMENT.to_string()));
        reservation
    }
}

/// A weekly recurring booking made by the field owner.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Abonnement {
    pub field_id: Uuid,
    pub terrain_id: Uuid,
    pub start_date: NaiveDate,
    pub start_time: TimeOfDay,
    pub end_time: TimeOfDay,
    pub weeks: u32,
    pub phone_number: Option<String>,
    pub status_comment: Option<String>,
}

impl Abonnement {
    pub fn validate(&self) -> Result<(), BookingError> {
        if !(1..=52).contains(&self.weeks) {
            return Err(BookingError::Validation("weeks must be between 1 and 52".into()));
        }
        Ok(())
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        (0..self.weeks)
            .map(|week| self.start_date + Duration::weeks(week as i64))
            .collect()
    }

    /// One approved reservation per week, in order.
    pub fn reservations(&self, owner_id: Uuid) -> Vec<Reservation> {
        self.dates()
            .into_iter()
            .enumerate()
            .map(|(week, date)| {
                let mut reservation = Reservation::new(
                    self.field_id,
                    owner_id,
                    date,
                    self.start_time,
                    self.end_time,
                    ReservationStatus::Approved,
                );
                reservation.terrain_id = Some(self.terrain_id);
                reservation.phone_number = self.phone_number.clone();
                reservation.status_comment = Some(
                    self.status_comment
                        .clone()
                        .unwrap_or_else(|| format!("Abonnement reservation for week {}", week + 1)),
                );
                reservation
            })
            .collect()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservationPatch {
    pub date: Option<NaiveDate>,
    pub start_time: Option<TimeOfDay>,
    pub end_time: Option<TimeOfDay>,
    pub terrain_id: Option<Uuid>,
    pub phone_number: Option<String>,
    pub status_comment: Option<String>,
}

impl ReservationPatch {
    /// True when the change moves the reservation in time and has to be re-checked.
    pub fn reschedules(&self) -> bool {
        self.date.is_some() || self.start_time.is_some() || self.end_time.is_some()
    }

    pub fn apply(&self, reservation: &mut Reservation) -> Result<(), BookingError> {
        if reservation.status.is_terminal() {
            return Err(BookingError::Validation(format!(
                "Cannot update a {} reservation",
                reservation.status.as_str().to_lowercase()
            )));
        }
        if let Some(date) = self.date {
            reservation.date = date;
        }
        if let Some(start) = self.start_time {
            reservation.start_time = start;
        }
        if let Some(end) = self.end_time {
            reservation.end_time = end;
        }
        if let Some(terrain) = self.terrain_id {
            reservation.terrain_id = Some(terrain);
        }
        if let Some(phone) = &self.phone_number {
            reservation.phone_number = Some(phone.clone());
        }
        if let Some(comment) = &self.status_comment {
            reservation.status_comment = Some(comment.clone());
        }
        reservation.updated_at = Utc::now();
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApproveReservation {
    pub terrain_id: Uuid,
    pub status_comment: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectReservation {
    pub status_comment: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(s: &str) -> TimeOfDay {
        s.parse().unwrap()
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 2).unwrap()
    }

    fn pending() -> Reservation {
        Reservation::new(Uuid::new_v4(), Uuid::new_v4(), day(), t("18:00"), t("19:30"), ReservationStatus::Pending)
    }

    #[test]
    fn test_reservation_lifecycle() {
        let mut r = Reservation::new(Uuid::new_v4(), Uuid::new_v4(), day(), t("18:00"), t("19:30"), ReservationStatus::Waiting);

        assert!(r.sync_with_roster(true));
        assert_eq!(r.status, ReservationStatus::Pending);
        assert_eq!(r.status_comment.as_deref(), Some(ROSTER_FULL_COMMENT));

        let terrain = Uuid::new_v4();
        r.approve(terrain, None).unwrap();
        assert_eq!(r.status, ReservationStatus::Approved);
        assert_eq!(r.terrain_id, Some(terrain));
        assert_eq!(r.status_comment.as_deref(), Some(APPROVED_COMMENT));

        // approved reservations no longer follow the roster
        assert!(!r.sync_with_roster(false));

        let previous = r.cancel(CancelledBy::FieldOwner).unwrap();
        assert_eq!(previous, ReservationStatus::Approved);
        assert_eq!(r.status_comment.as_deref(), Some("Reservation cancelled by owner"));
    }

    #[test]
    fn test_invalid_transitions() {
        let mut r = pending();
        r.reject(None).unwrap();

        let err = r.cancel(CancelledBy::Reserver).unwrap_err();
        assert_eq!(err.to_string(), "Reservation is already cancelled or rejected");

        let err = r.approve(Uuid::new_v4(), None).unwrap_err();
        assert_eq!(err.to_string(), "Reservation is not in PENDING status");

        let mut waiting = pending();
        waiting.sync_with_roster(false);
        assert!(matches!(
            waiting.transition(ReservationStatus::Approved, None),
            Err(BookingError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_lineup_waiting_on_an_opponent() {
        let mut r = Reservation::new(Uuid::new_v4(), Uuid::new_v4(), day(), t("18:00"), t("19:30"), ReservationStatus::Waiting);
        assert!(!r.follow_lineup(false, OPPONENT_WAITING_COMMENT));

        assert!(r.follow_lineup(true, OPPONENT_WAITING_COMMENT));
        assert_eq!(r.status, ReservationStatus::Pending);

        assert!(r.follow_lineup(false, OPPONENT_WAITING_COMMENT));
        assert_eq!(r.status, ReservationStatus::Waiting);
        assert_eq!(r.status_comment.as_deref(), Some("Waiting for opponent team"));
    }

    #[test]
    fn test_only_live_statuses_occupy_time() {
        let mut r = pending();
        assert_eq!(r.occupancy().map(|o| o.approved), Some(false));
        r.cancel(CancelledBy::Reserver).unwrap();
        assert!(r.occupancy().is_none());
    }

    #[test]
    fn test_abonnement_weeks() {
        let plan = Abonnement {
            field_id: Uuid::new_v4(),
            terrain_id: Uuid::new_v4(),
            start_date: day(),
            start_time: t("20:00"),
            end_time: t("21:30"),
            weeks: 3,
            phone_number: None,
            status_comment: None,
        };
        plan.validate().unwrap();

        let owner = Uuid::new_v4();
        let weekly = plan.reservations(owner);
        assert_eq!(weekly.len(), 3);
        assert_eq!(weekly[2].date, NaiveDate::from_ymd_opt(2025, 6, 16).unwrap());
        assert_eq!(weekly[1].status_comment.as_deref(), Some("Abonnement reservation for week 2"));
        assert!(weekly.iter().all(|r| r.status == ReservationStatus::Approved && r.user_id == owner));

        let too_long = Abonnement { weeks: 53, ..plan };
        assert!(too_long.validate().is_err());
    }

    #[test]
    fn test_status_wire_name() {
        let json = serde_json::to_value(pending()).unwrap();
        assert_eq!(json["reservedStatus"], "PENDING");
        assert_eq!(json["startTime"], "18:00");
    }
}
