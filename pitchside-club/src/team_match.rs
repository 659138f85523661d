//! Team against team. The creator's team books the slot; the match completes once an
//! opponent is approved from the join requests or accepts an invitation.

use chrono::{DateTime, NaiveDate, Utc};
use pitchside_booking::TimeOfDay;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::full_match::check_phone;
use crate::matches::{check_bounds, default_public, MatchStatus};
use crate::rating::{MatchType, Played};
use crate::team::Team;
use crate::ClubError;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamMatch {
    pub id: Uuid,
    pub title: String,
    pub city: String,
    pub description: Option<String>,
    pub status: MatchStatus,
    pub contact_phone: String,
    pub date: NaiveDate,
    pub start_time: TimeOfDay,
    pub end_time: TimeOfDay,
    pub is_public: bool,
    pub creator_id: Uuid,
    pub field_id: Uuid,
    pub team_id: Uuid,
    pub opponent_team_id: Option<Uuid>,
    pub pending_teams: Vec<Uuid>,
    pub invited_teams: Vec<Uuid>,
    pub min_age: Option<i32>,
    pub max_age: Option<i32>,
    pub min_skill_level: Option<f64>,
    pub max_skill_level: Option<f64>,
    pub team_size: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn ensure_member(team: &Team, user_id: Uuid) -> Result<(), ClubError> {
    if !team.is_member(user_id) {
        return Err(ClubError::Forbidden("You are not a member of this team".into()));
    }
    Ok(())
}

fn ensure_complete(team: &Team) -> Result<(), ClubError> {
    if !team.is_complete() {
        return Err(ClubError::Validation("Team is not complete".into()));
    }
    Ok(())
}

impl TeamMatch {
    pub fn ensure_creator(&self, user_id: Uuid, action: &str) -> Result<(), ClubError> {
        if self.creator_id != user_id {
            return Err(ClubError::Forbidden(format!("Only creator can {}", action)));
        }
        Ok(())
    }

    pub fn has_opponent(&self) -> bool {
        self.opponent_team_id.is_some()
    }

    pub fn involves(&self, team_id: Uuid) -> bool {
        self.team_id == team_id || self.opponent_team_id == Some(team_id)
    }

    /// Public matches, plus private ones the user created or plays in through `teams`.
    pub fn is_visible_to(&self, user_id: Uuid, teams: &[Uuid]) -> bool {
        self.is_public
            || self.creator_id == user_id
            || teams.iter().any(|t| self.involves(*t) || self.invited_teams.contains(t) || self.pending_teams.contains(t))
    }

    fn ensure_open(&self) -> Result<(), ClubError> {
        if self.status == MatchStatus::Cancelled {
            return Err(ClubError::Validation("Match is cancelled".into()));
        }
        if self.has_opponent() {
            return Err(ClubError::Validation("Match already has two teams".into()));
        }
        Ok(())
    }

    /// Both bounds must be set and the team must carry a rating for the range to apply.
    fn check_skill(&self, team: &Team) -> Result<(), ClubError> {
        if let (Some(min), Some(max)) = (self.min_skill_level, self.max_skill_level) {
            if team.average_rating > 0.0 && !(min..=max).contains(&team.average_rating) {
                return Err(ClubError::Validation("Team rating out of skill level range".into()));
            }
        }
        Ok(())
    }

    fn seat_opponent(&mut self, team_id: Uuid) {
        self.opponent_team_id = Some(team_id);
        self.pending_teams.retain(|t| *t != team_id);
        self.invited_teams.retain(|t| *t != team_id);
        self.status = MatchStatus::Completed;
        self.updated_at = Utc::now();
    }

    /// `user_id` asks on behalf of `team`.
    pub fn request_to_join(&mut self, team: &Team, user_id: Uuid) -> Result<(), ClubError> {
        ensure_member(team, user_id)?;
        ensure_complete(team)?;
        if self.involves(team.id) {
            return Err(ClubError::Validation("Team already joined".into()));
        }
        if self.pending_teams.contains(&team.id) {
            return Err(ClubError::Validation("Join request already sent".into()));
        }
        if self.invited_teams.contains(&team.id) {
            return Err(ClubError::Validation("Team already invited".into()));
        }
        self.ensure_open()?;
        self.check_skill(team)?;
        self.pending_teams.push(team.id);
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn approve(&mut self, team: &Team) -> Result<(), ClubError> {
        self.ensure_open()?;
        if !self.pending_teams.contains(&team.id) {
            return Err(ClubError::Validation("Team not in pending list".into()));
        }
        ensure_complete(team)?;
        self.seat_opponent(team.id);
        Ok(())
    }

    pub fn decline(&mut self, team_id: Uuid) -> Result<(), ClubError> {
        if !self.pending_teams.contains(&team_id) {
            return Err(ClubError::Validation("Team not in pending list".into()));
        }
        self.pending_teams.retain(|t| *t != team_id);
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn invite(&mut self, team: &Team) -> Result<(), ClubError> {
        self.ensure_open()?;
        ensure_complete(team)?;
        if self.invited_teams.contains(&team.id) {
            return Err(ClubError::Validation("Team already invited".into()));
        }
        if self.pending_teams.contains(&team.id) {
            return Err(ClubError::Validation("Team has already requested to join".into()));
        }
        if self.team_id == team.id {
            return Err(ClubError::Validation("Cannot invite own team".into()));
        }
        self.check_skill(team)?;
        self.invited_teams.push(team.id);
        self.updated_at = Utc::now();
        Ok(())
    }

    /// `captained` is the team the responding user captains, if any.
    pub fn respond_to_invitation(&mut self, captained: Option<&Team>, accept: bool) -> Result<(), ClubError> {
        self.ensure_open()?;
        let team = captained
            .filter(|t| self.invited_teams.contains(&t.id))
            .ok_or_else(|| ClubError::Forbidden("Only the team captain can respond to the invitation".into()))?;
        ensure_complete(team)?;
        if accept {
            self.seat_opponent(team.id);
        } else {
            self.invited_teams.retain(|t| *t != team.id);
            self.updated_at = Utc::now();
        }
        Ok(())
    }

    /// The opponent walks out and the match waits for a new one.
    pub fn leave(&mut self, team: &Team, user_id: Uuid) -> Result<(), ClubError> {
        ensure_member(team, user_id)?;
        if !self.involves(team.id) {
            return Err(ClubError::Validation("Team is not part of the match".into()));
        }
        if self.team_id == team.id {
            return Err(ClubError::Validation("Creator's team cannot leave; cancel the match instead".into()));
        }
        self.opponent_team_id = None;
        self.status = MatchStatus::Pending;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn cancel(&mut self) -> Result<(), ClubError> {
        if self.status == MatchStatus::Cancelled {
            return Err(ClubError::Validation("Match is cancelled".into()));
        }
        self.status = MatchStatus::Cancelled;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn reschedule(&mut self, date: NaiveDate, start: TimeOfDay, end: TimeOfDay) -> Result<(), ClubError> {
        if self.status == MatchStatus::Cancelled {
            return Err(ClubError::Validation("Match is cancelled".into()));
        }
        self.date = date;
        self.start_time = start;
        self.end_time = end;
        self.status = if self.has_opponent() { MatchStatus::Completed } else { MatchStatus::Pending };
        self.updated_at = Utc::now();
        Ok(())
    }
}

/// A team match together with everyone on either side.
#[derive(Debug, Clone)]
pub struct TeamMatchRoster {
    pub game: TeamMatch,
    pub members: Vec<Uuid>,
}

impl TeamMatch {
    /// `sides` are the teams the match refers to; unrelated teams are ignored.
    pub fn roster<'a>(self, sides: impl IntoIterator<Item = &'a Team>) -> TeamMatchRoster {
        let members = sides
            .into_iter()
            .filter(|t| self.involves(t.id))
            .flat_map(|t| std::iter::once(t.captain_id).chain(t.players.iter().copied()))
            .collect();
        TeamMatchRoster { game: self, members }
    }
}

impl Played for TeamMatchRoster {
    fn match_id(&self) -> Uuid {
        self.game.id
    }

    fn match_type(&self) -> MatchType {
        MatchType::TeamVsTeam
    }

    fn title(&self) -> &str {
        &self.game.title
    }

    fn is_participant(&self, user_id: Uuid) -> bool {
        self.members.contains(&user_id)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTeamMatch {
    pub title: String,
    pub city: String,
    pub description: Option<String>,
    pub contact_phone: String,
    pub date: NaiveDate,
    pub start_time: TimeOfDay,
    pub end_time: TimeOfDay,
    #[serde(default = "default_public")]
    pub is_public: bool,
    pub field_id: Uuid,
    pub team_id: Uuid,
    pub min_age: Option<i32>,
    pub max_age: Option<i32>,
    pub min_skill_level: Option<f64>,
    pub max_skill_level: Option<f64>,
    pub team_size: Option<i32>,
}

impl NewTeamMatch {
    pub fn validate(&self) -> Result<(), ClubError> {
        if self.title.trim().is_empty() || self.city.trim().is_empty() {
            return Err(ClubError::Validation("title and city should not be empty".into()));
        }
        check_phone(&self.contact_phone)?;
        check_bounds(self.min_age, self.max_age, self.min_skill_level, self.max_skill_level)
    }

    /// `team` is the creator's own side and must be complete.
    pub fn into_match(self, creator_id: Uuid, team: &Team) -> Result<TeamMatch, ClubError> {
        self.validate()?;
        if team.id != self.team_id {
            return Err(ClubError::team_not_found(self.team_id));
        }
        ensure_member(team, creator_id)?;
        if !team.is_complete() {
            return Err(ClubError::Validation("Your team is not complete".into()));
        }
        let now = Utc::now();
        Ok(TeamMatch {
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
            team_id: team.id,
            opponent_team_id: None,
            pending_teams: Vec::new(),
            invited_teams: Vec::new(),
            min_age: self.min_age,
            max_age: self.max_age,
            min_skill_level: self.min_skill_level,
            max_skill_level: self.max_skill_level,
            team_size: self.team_size,
            created_at: now,
            updated_at: now,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamMatchPatch {
    pub title: Option<String>,
    pub city: Option<String>,
    pub description: Option<String>,
    pub contact_phone: Option<String>,
    pub is_public: Option<bool>,
    pub min_age: Option<i32>,
    pub max_age: Option<i32>,
    pub min_skill_level: Option<f64>,
    pub max_skill_level: Option<f64>,
    pub team_size: Option<i32>,
}

impl TeamMatchPatch {
    pub fn apply(&self, target: &mut TeamMatch) -> Result<(), ClubError> {
        if let Some(phone) = &self.contact_phone {
            check_phone(phone)?;
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
            target.contact_phone = phone.clone();
        }
        if let Some(flag) = self.is_public {
            target.is_public = flag;
        }
        target.min_age = self.min_age.or(target.min_age);
        target.max_age = self.max_age.or(target.max_age);
        target.min_skill_level = self.min_skill_level.or(target.min_skill_level);
        target.max_skill_level = self.max_skill_level.or(target.max_skill_level);
        target.team_size = self.team_size.or(target.team_size);
        target.updated_at = Utc::now();
        Ok(())
    }
}

/// Body of join-request and invite calls; teams are addressed by name.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamByName {
    pub match_id: Uuid,
    pub team_name: String,
}

/// Body of approve-join and decline-join calls.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamAction {
    pub match_id: Uuid,
    pub team_id: Uuid,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvitationReply {
    pub match_id: Uuid,
    pub accept: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamMatchSlot {
    pub match_id: Uuid,
    pub date: NaiveDate,
    pub start_time: TimeOfDay,
    pub end_time: TimeOfDay,
}
