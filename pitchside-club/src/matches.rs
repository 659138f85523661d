//! Pick-up matches: a creator books a slot and fills the roster with joiners, approved
//! requests and accepted invitations.

use chrono::{DateTime, NaiveDate, Utc};
use pitchside_booking::TimeOfDay;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::ClubError;

pub const MIN_PLAYERS: i32 = 2;
pub const DEFAULT_MAX_PLAYERS: i32 = 14;
pub const MAX_PLAYERS: i32 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchStatus {
    Pending,
    Ongoing,
    Completed,
    Confirmed,
    Full,
    Cancelled,
}

impl MatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStatus::Pending => "PENDING",
            MatchStatus::Ongoing => "ONGOING",
            MatchStatus::Completed => "COMPLETED",
            MatchStatus::Confirmed => "CONFIRMED",
            MatchStatus::Full => "FULL",
            MatchStatus::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MatchStatus {
    type Err = ClubError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(MatchStatus::Pending),
            "ONGOING" => Ok(MatchStatus::Ongoing),
            "COMPLETED" => Ok(MatchStatus::Completed),
            "CONFIRMED" => Ok(MatchStatus::Confirmed),
            "FULL" => Ok(MatchStatus::Full),
            "CANCELLED" => Ok(MatchStatus::Cancelled),
            other => Err(ClubError::Validation(format!("Unknown match status: {}", other))),
        }
    }
}

/// Fullness of the roster before and after a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RosterChange {
    pub was_full: bool,
    pub is_full: bool,
}

impl RosterChange {
    pub fn became_full(&self) -> bool {
        !self.was_full && self.is_full
    }

    pub fn reopened(&self) -> bool {
        self.was_full && !self.is_full
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinOutcome {
    Joined(RosterChange),
    Requested,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncompleteMatch {
    pub id: Uuid,
    pub title: String,
    pub city: String,
    pub description: Option<String>,
    pub status: MatchStatus,
    pub contact_phone: Option<String>,
    pub date: NaiveDate,
    pub start_time: TimeOfDay,
    pub end_time: TimeOfDay,
    pub is_public: bool,
    pub creator_id: Uuid,
    pub field_id: Uuid,
    pub min_age: Option<i32>,
    pub max_age: Option<i32>,
    pub min_skill_level: Option<f64>,
    pub max_skill_level: Option<f64>,
    /// Head count, including companions of the creator who have no account.
    pub current_players: i32,
    pub max_players: i32,
    pub requires_approval: bool,
    pub players: Vec<Uuid>,
    pub pending_players: Vec<Uuid>,
    pub invited_players: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl IncompleteMatch {
    pub fn is_full(&self) -> bool {
        self.current_players >= self.max_players
    }

    pub fn is_participant(&self, user_id: Uuid) -> bool {
        self.creator_id == user_id || self.players.contains(&user_id)
    }

    /// Private matches show only to their creator and to anyone on the roster, asking or invited.
    pub fn is_visible_to(&self, user_id: Uuid) -> bool {
        self.is_public
            || self.is_participant(user_id)
            || self.pending_players.contains(&user_id)
            || self.invited_players.contains(&user_id)
    }

    pub fn ensure_creator(&self, user_id: Uuid, action: &str) -> Result<(), ClubError> {
        if self.creator_id != user_id {
            return Err(ClubError::Forbidden(format!("Only creator can {}", action)));
        }
        Ok(())
    }

    fn ensure_not_cancelled(&self) -> Result<(), ClubError> {
        if self.status == MatchStatus::Cancelled {
            return Err(ClubError::Validation("Match is cancelled".into()));
        }
        Ok(())
    }

    fn ensure_room(&self) -> Result<(), ClubError> {
        self.ensure_not_cancelled()?;
        if self.status == MatchStatus::Completed || self.is_full() {
            return Err(ClubError::Validation("Match is full or already completed".into()));
        }
        Ok(())
    }

    /// Runs a roster edit and settles the status: full rosters complete the match.
    fn change_roster(&mut self, edit: impl FnOnce(&mut Self)) -> RosterChange {
        let was_full = self.is_full();
        edit(self);
        self.status = if self.is_full() { MatchStatus::Completed } else { MatchStatus::Pending };
        self.updated_at = Utc::now();
        RosterChange { was_full, is_full: self.is_full() }
    }

    fn seat(&mut self, user_id: Uuid) -> RosterChange {
        self.change_roster(|m| {
            m.pending_players.retain(|p| *p != user_id);
            m.invited_players.retain(|p| *p != user_id);
            m.players.push(user_id);
            m.current_players += 1;
        })
    }

    fn check_profile(&self, request: &JoinRequest) -> Result<(), ClubError> {
        if let Some(min) = self.min_age.filter(|min| request.age < *min) {
            return Err(ClubError::Validation(format!("You must be at least {} years old", min)));
        }
        if let Some(max) = self.max_age.filter(|max| request.age > *max) {
            return Err(ClubError::Validation(format!("You must be at most {} years old", max)));
        }
        if let Some(min) = self.min_skill_level.filter(|min| request.skill_level < *min) {
            return Err(ClubError::Validation(format!("Skill level must be at least {}", min)));
        }
        if let Some(max) = self.max_skill_level.filter(|max| request.skill_level > *max) {
            return Err(ClubError::Validation(format!("Skill level must be at most {}", max)));
        }
        Ok(())
    }

    pub fn request_to_join(&mut self, user_id: Uuid, request: &JoinRequest) -> Result<JoinOutcome, ClubError> {
        self.ensure_not_cancelled()?;
        if self.is_participant(user_id)
            || self.pending_players.contains(&user_id)
            || self.invited_players.contains(&user_id)
        {
            return Err(ClubError::Validation("Already joined, requested, or invited".into()));
        }
        self.ensure_room()?;
        self.check_profile(request)?;

        if self.requires_approval {
            self.pending_players.push(user_id);
            self.updated_at = Utc::now();
            Ok(JoinOutcome::Requested)
        } else {
            Ok(JoinOutcome::Joined(self.seat(user_id)))
        }
    }

    pub fn approve(&mut self, player_id: Uuid) -> Result<RosterChange, ClubError> {
        self.ensure_room()?;
        if !self.pending_players.contains(&player_id) {
            return Err(ClubError::Validation("No such pending request".into()));
        }
        Ok(self.seat(player_id))
    }

    pub fn decline(&mut self, player_id: Uuid) -> Result<(), ClubError> {
        self.ensure_not_cancelled()?;
        if !self.pending_players.contains(&player_id) {
            return Err(ClubError::Validation("No such pending request".into()));
        }
        self.pending_players.retain(|p| *p != player_id);
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn invite(&mut self, player_id: Uuid) -> Result<(), ClubError> {
        self.ensure_room()?;
        if self.is_participant(player_id) {
            return Err(ClubError::Validation("Player already joined".into()));
        }
        if self.pending_players.contains(&player_id) {
            return Err(ClubError::Validation("Player has a pending join request".into()));
        }
        if self.invited_players.contains(&player_id) {
            return Err(ClubError::Validation("Player already invited".into()));
        }
        self.invited_players.push(player_id);
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn accept_invitation(&mut self, user_id: Uuid) -> Result<RosterChange, ClubError> {
        if !self.invited_players.contains(&user_id) {
            return Err(ClubError::Validation("You were not invited to this match".into()));
        }
        self.ensure_room()?;
        if self.players.contains(&user_id) {
            return Err(ClubError::Validation("You are already a player in this match".into()));
        }
        Ok(self.seat(user_id))
    }

    pub fn decline_invitation(&mut self, user_id: Uuid) -> Result<(), ClubError> {
        if !self.invited_players.contains(&user_id) {
            return Err(ClubError::Validation("You were not invited to this match".into()));
        }
        self.invited_players.retain(|p| *p != user_id);
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn leave(&mut self, user_id: Uuid) -> Result<RosterChange, ClubError> {
        self.ensure_not_cancelled()?;
        if user_id == self.creator_id {
            return Err(ClubError::Validation("Match creator cannot leave the match. Cancel it instead.".into()));
        }
        if !self.players.contains(&user_id) {
            return Err(ClubError::Validation("You are not a player in this match".into()));
        }
        Ok(self.unseat(user_id))
    }

    pub fn remove_player(&mut self, player_id: Uuid) -> Result<RosterChange, ClubError> {
        self.ensure_not_cancelled()?;
        if player_id == self.creator_id {
            return Err(ClubError::Validation("Cannot remove the match creator".into()));
        }
        if !self.players.contains(&player_id) {
            return Err(ClubError::Validation("Player is not in this match".into()));
        }
        Ok(self.unseat(player_id))
    }

    fn unseat(&mut self, user_id: Uuid) -> RosterChange {
        self.change_roster(|m| {
            m.players.retain(|p| *p != user_id);
            m.current_players = (m.current_players - 1).max(1);
        })
    }

    pub fn cancel(&mut self) -> Result<(), ClubError> {
        self.ensure_not_cancelled()?;
        self.status = MatchStatus::Cancelled;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Everyone besides the creator who should hear about the match.
    pub fn others(&self) -> impl Iterator<Item = Uuid> + '_ {
        self.players.iter().copied().filter(move |p| *p != self.creator_id)
    }

    pub fn reschedule(&mut self, date: NaiveDate, start: TimeOfDay, end: TimeOfDay) -> Result<(), ClubError> {
        self.ensure_not_cancelled()?;
        self.date = date;
        self.start_time = start;
        self.end_time = end;
        self.updated_at = Utc::now();
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMatch {
    pub title: String,
    pub city: String,
    pub description: Option<String>,
    pub contact_phone: Option<String>,
    pub date: NaiveDate,
    pub start_time: TimeOfDay,
    pub end_time: TimeOfDay,
    #[serde(default = "default_public")]
    pub is_public: bool,
    pub field_id: Uuid,
    pub min_age: Option<i32>,
    pub max_age: Option<i32>,
    pub min_skill_level: Option<f64>,
    pub max_skill_level: Option<f64>,
    pub current_players: Option<i32>,
    pub max_players: Option<i32>,
    #[serde(default)]
    pub requires_approval: bool,
}

pub(crate) fn default_public() -> bool {
    true
}

pub(crate) fn check_bounds(
    min_age: Option<i32>,
    max_age: Option<i32>,
    min_skill: Option<f64>,
    max_skill: Option<f64>,
) -> Result<(), ClubError> {
    if let (Some(min), Some(max)) = (min_age, max_age) {
        if min > max {
            return Err(ClubError::Validation("minAge cannot exceed maxAge".into()));
        }
    }
    if let (Some(min), Some(max)) = (min_skill, max_skill) {
        if min > max {
            return Err(ClubError::Validation("minSkillLevel cannot exceed maxSkillLevel".into()));
        }
    }
    Ok(())
}

impl NewMatch {
    pub fn validate(&self) -> Result<(), ClubError> {
        if self.title.trim().is_empty() || self.city.trim().is_empty() {
            return Err(ClubError::Validation("title and city should not be empty".into()));
        }
        let current = self.current_players.unwrap_or(MIN_PLAYERS);
        let max = self.max_players.unwrap_or(DEFAULT_MAX_PLAYERS);
        if current < MIN_PLAYERS {
            return Err(ClubError::Validation(format!("Initial currentPlayers must be at least {}", MIN_PLAYERS)));
        }
        if max > MAX_PLAYERS {
            return Err(ClubError::Validation(format!("maxPlayers must be at most {}", MAX_PLAYERS)));
        }
        if current > max {
            return Err(ClubError::Validation("currentPlayers cannot exceed maxPlayers".into()));
        }
        check_bounds(self.min_age, self.max_age, self.min_skill_level, self.max_skill_level)
    }

    pub fn into_match(self, creator_id: Uuid) -> Result<IncompleteMatch, ClubError> {
        self.validate()?;
        let now = Utc::now();
        let mut created = IncompleteMatch {
            id: Uuid::new_v4(),
            title: self.title.trim().to_string(),
            city: self.city.trim().to_string(),
            description: self.description,
            status: MatchStatus::Pending,
            contact_phone: self.contact_phone,
            date: self.date,
            start_time: self.start_time,
            end_time: self.end_time,
            is_public: self.is_public,
            creator_id,
            field_id: self.field_id,
            min_age: self.min_age,
            max_age: self.max_age,
            min_skill_level: self.min_skill_level,
            max_skill_level: self.max_skill_level,
            current_players: self.current_players.unwrap_or(MIN_PLAYERS),
            max_players: self.max_players.unwrap_or(DEFAULT_MAX_PLAYERS),
            requires_approval: self.requires_approval,
            players: vec![creator_id],
            pending_players: Vec::new(),
            invited_players: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        created.change_roster(|_| {});
        Ok(created)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchPatch {
    pub title: Option<String>,
    pub city: Option<String>,
    pub description: Option<String>,
    pub min_age: Option<i32>,
    pub max_age: Option<i32>,
    pub min_skill_level: Option<f64>,
    pub max_skill_level: Option<f64>,
    pub added_current_players: Option<i32>,
    pub removed_current_players: Option<i32>,
    pub requires_approval: Option<bool>,
    pub is_public: Option<bool>,
    pub contact_phone: Option<String>,
}

impl MatchPatch {
    pub fn apply(&self, target: &mut IncompleteMatch) -> Result<RosterChange, ClubError> {
        target.ensure_not_cancelled()?;
        let added = self.added_current_players.unwrap_or(0);
        let removed = self.removed_current_players.unwrap_or(0);
        if added < 0 {
            return Err(ClubError::Validation("addedCurrentPlayers cannot be negative".into()));
        }
        if removed < 0 {
            return Err(ClubError::Validation("removedCurrentPlayers cannot be negative".into()));
        }
        if removed > target.current_players - 1 {
            return Err(ClubError::Validation(format!(
                "Cannot remove more than {} players",
                target.current_players - 1
            )));
        }
        let head_count = target.current_players + added - removed;
        if head_count < MIN_PLAYERS {
            return Err(ClubError::Validation(format!("Total currentPlayers must be at least {}", MIN_PLAYERS)));
        }
        if head_count > target.max_players {
            return Err(ClubError::Validation("Total currentPlayers cannot exceed maxPlayers".into()));
        }
        check_bounds(
            self.min_age.or(target.min_age),
            self.max_age.or(target.max_age),
            self.min_skill_level.or(target.min_skill_level),
            self.max_skill_level.or(target.max_skill_level),
        )?;

        if let Some(title) = self.title.as_ref().filter(|t| !t.trim().is_empty()) {
            target.title = title.trim().to_string();
        }
        if let Some(city) = self.city.as_ref().filter(|c| !c.trim().is_empty()) {
            target.city = city.trim().to_string();
        }
        if let Some(description) = &self.description {
            target.description = Some(description.clone());
        }
        if let Some(phone) = &self.contact_phone {
            target.contact_phone = Some(phone.clone());
        }
        target.min_age = self.min_age.or(target.min_age);
        target.max_age = self.max_age.or(target.max_age);
        target.min_skill_level = self.min_skill_level.or(target.min_skill_level);
        target.max_skill_level = self.max_skill_level.or(target.max_skill_level);
        if let Some(flag) = self.requires_approval {
            target.requires_approval = flag;
        }
        if let Some(flag) = self.is_public {
            target.is_public = flag;
        }
        Ok(target.change_roster(|m| m.current_players = head_count))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRequest {
    pub match_id: Uuid,
    pub age: i32,
    pub skill_level: f64,
}

/// Body of approve/decline/invite calls.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerAction {
    pub match_id: Uuid,
    pub player_id: Uuid,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reschedule {
    pub date: NaiveDate,
    pub start_time: TimeOfDay,
    pub end_time: TimeOfDay,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchQuery {
    pub city: Option<String>,
    pub date: Option<NaiveDate>,
    pub status: Option<String>,
}

impl MatchQuery {
    pub fn status(&self) -> Result<Option<MatchStatus>, ClubError> {
        self.status.as_deref().map(str::parse).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(s: &str) -> TimeOfDay {
        s.parse().unwrap()
    }

    fn new_match(current: i32, max: i32, requires_approval: bool) -> IncompleteMatch {
        NewMatch {
            title: "Friday five-a-side".into(),
            city: "Tunis".into(),
            description: None,
            contact_phone: None,
            date: NaiveDate::from_ymd_opt(2025, 7, 4).unwrap(),
            start_time: t("20:00"),
            end_time: t("21:30"),
            is_public: true,
            field_id: Uuid::new_v4(),
            min_age: Some(18),
            max_age: Some(40),
            min_skill_level: Some(2.0),
            max_skill_level: None,
            current_players: Some(current),
            max_players: Some(max),
            requires_approval,
        }
        .into_match(Uuid::new_v4())
        .unwrap()
    }

    fn request(age: i32, skill: f64) -> JoinRequest {
        JoinRequest { match_id: Uuid::new_v4(), age, skill_level: skill }
    }

    #[test]
    fn test_direct_join_fills_roster() {
        let mut m = new_match(3, 4, false);
        let player = Uuid::new_v4();

        let outcome = m.request_to_join(player, &request(25, 3.0)).unwrap();
        assert_eq!(outcome, JoinOutcome::Joined(RosterChange { was_full: false, is_full: true }));
        assert_eq!(m.status, MatchStatus::Completed);
        assert_eq!(m.current_players, 4);

        let err = m.request_to_join(Uuid::new_v4(), &request(25, 3.0)).unwrap_err();
        assert_eq!(err.to_string(), "Match is full or already completed");
    }

    #[test]
    fn test_join_request_needs_approval() {
        let mut m = new_match(2, 10, true);
        let player = Uuid::new_v4();
        assert_eq!(m.request_to_join(player, &request(30, 2.5)).unwrap(), JoinOutcome::Requested);
        assert_eq!(
            m.request_to_join(player, &request(30, 2.5)).unwrap_err().to_string(),
            "Already joined, requested, or invited"
        );

        let change = m.approve(player).unwrap();
        assert!(!change.is_full);
        assert!(m.players.contains(&player));
        assert!(m.pending_players.is_empty());
        assert!(m.approve(player).is_err());
    }

    #[test]
    fn test_profile_bounds() {
        let mut m = new_match(2, 10, false);
        assert_eq!(
            m.request_to_join(Uuid::new_v4(), &request(16, 3.0)).unwrap_err().to_string(),
            "You must be at least 18 years old"
        );
        assert_eq!(
            m.request_to_join(Uuid::new_v4(), &request(20, 1.0)).unwrap_err().to_string(),
            "Skill level must be at least 2"
        );
    }

    #[test]
    fn test_leave_reopens_completed_match() {
        let mut m = new_match(3, 4, false);
        let player = Uuid::new_v4();
        m.request_to_join(player, &request(25, 3.0)).unwrap();

        let change = m.leave(player).unwrap();
        assert!(change.reopened());
        assert_eq!(m.status, MatchStatus::Pending);
        assert_eq!(m.leave(m.creator_id).unwrap_err().to_string(), "Match creator cannot leave the match. Cancel it instead.");
    }

    #[test]
    fn test_invitation_flow() {
        let mut m = new_match(2, 10, true);
        let guest = Uuid::new_v4();
        m.invite(guest).unwrap();
        assert_eq!(m.invite(guest).unwrap_err().to_string(), "Player already invited");

        m.accept_invitation(guest).unwrap();
        assert!(m.invited_players.is_empty());
        assert_eq!(m.current_players, 3);
        assert_eq!(
            m.decline_invitation(guest).unwrap_err().to_string(),
            "You were not invited to this match"
        );
    }

    #[test]
    fn test_cancelled_match_refuses_roster_changes() {
        let mut m = new_match(2, 10, false);
        m.cancel().unwrap();
        assert_eq!(m.request_to_join(Uuid::new_v4(), &request(25, 3.0)).unwrap_err().to_string(), "Match is cancelled");
        assert!(m.invite(Uuid::new_v4()).is_err());
        assert!(m.cancel().is_err());
    }

    #[test]
    fn test_patch_head_count() {
        let mut m = new_match(5, 8, false);
        let too_many = MatchPatch { removed_current_players: Some(5), ..Default::default() };
        assert_eq!(too_many.apply(&mut m).unwrap_err().to_string(), "Cannot remove more than 4 players");

        let fill = MatchPatch { added_current_players: Some(3), ..Default::default() };
        assert!(fill.apply(&mut m).unwrap().became_full());
        assert_eq!(m.status, MatchStatus::Completed);
    }

    #[test]
    fn test_creation_limits() {
        let mut draft = NewMatch {
            title: "x".into(),
            city: "Sousse".into(),
            description: None,
            contact_phone: None,
            date: NaiveDate::from_ymd_opt(2025, 7, 4).unwrap(),
            start_time: t("20:00"),
            end_time: t("21:30"),
            is_public: true,
            field_id: Uuid::new_v4(),
            min_age: None,
            max_age: None,
            min_skill_level: None,
            max_skill_level: None,
            current_players: Some(1),
            max_players: None,
            requires_approval: false,
        };
        assert!(draft.validate().is_err());
        draft.current_players = None;
        draft.max_players = Some(17);
        assert_eq!(draft.validate().unwrap_err().to_string(), "maxPlayers must be at most 16");
    }
}
