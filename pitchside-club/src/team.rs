use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ClubError;

pub const MIN_TEAM_SIZE: i32 = 6;
pub const DEFAULT_TEAM_SIZE: i32 = 7;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Team {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub logo: Option<String>,
    pub team_size: i32,
    pub captain_id: Uuid,
    /// Members other than the captain.
    pub players: Vec<Uuid>,
    pub wins: i32,
    pub losses: i32,
    pub average_rating: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Team as returned by the API, with roster figures worked out.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamSummary {
    #[serde(flatten)]
    pub team: Team,
    pub total_members: i32,
    pub is_complete: bool,
    pub players_needed: i32,
}

/// What the roster rules need to know about a prospective member.
#[derive(Debug, Clone, Copy)]
pub struct Recruit {
    pub id: Uuid,
    pub is_active: bool,
    pub is_player: bool,
}

impl Team {
    pub fn total_members(&self) -> i32 {
        self.players.len() as i32 + 1
    }

    pub fn is_complete(&self) -> bool {
        self.total_members() >= self.team_size
    }

    pub fn players_needed(&self) -> i32 {
        (self.team_size - self.total_members()).max(0)
    }

    pub fn is_member(&self, user_id: Uuid) -> bool {
        self.captain_id == user_id || self.players.contains(&user_id)
    }

    pub fn ensure_managed_by(&self, user_id: Uuid, is_admin: bool) -> Result<(), ClubError> {
        if self.captain_id == user_id || is_admin {
            Ok(())
        } else {
            Err(ClubError::Forbidden("Only the team captain or an admin can manage this team".into()))
        }
    }

    /// Returns true when this addition completes the team.
    pub fn add_player(&mut self, recruit: &Recruit) -> Result<bool, ClubError> {
        if self.is_complete() {
            return Err(ClubError::Validation("Team is already complete".into()));
        }
        if !recruit.is_active || !recruit.is_player {
            return Err(ClubError::Validation("Player must be active and have PLAYER role".into()));
        }
        if self.is_member(recruit.id) {
            return Err(ClubError::Conflict("Player is already a member of this team".into()));
        }
        self.players.push(recruit.id);
        self.updated_at = Utc::now();
        Ok(self.is_complete())
    }

    pub fn remove_player(&mut self, player_id: Uuid) -> Result<(), ClubError> {
        if player_id == self.captain_id {
            return Err(ClubError::Validation("Cannot remove team captain".into()));
        }
        let before = self.players.len();
        self.players.retain(|p| *p != player_id);
        if self.players.len() == before {
            return Err(ClubError::NotFound("Player not found in team".into()));
        }
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn leave(&mut self, user_id: Uuid) -> Result<(), ClubError> {
        if user_id == self.captain_id {
            return Err(ClubError::Validation("Captain cannot leave team. Transfer captaincy first.".into()));
        }
        if !self.players.contains(&user_id) {
            return Err(ClubError::Validation("You are not a member of this team".into()));
        }
        self.players.retain(|p| *p != user_id);
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Swaps the captain with one of the players; the old captain stays on as a player.
    pub fn transfer_captaincy(&mut self, new_captain: Uuid, captains_elsewhere: bool) -> Result<(), ClubError> {
        if new_captain == self.captain_id {
            return Err(ClubError::Validation("User is already the captain of this team".into()));
        }
        if !self.players.contains(&new_captain) {
            return Err(ClubError::Validation("New captain must be a member of this team".into()));
        }
        if captains_elsewhere {
            return Err(ClubError::Conflict("User is already captaining a team".into()));
        }
        let old = self.captain_id;
        self.players.retain(|p| *p != new_captain);
        self.players.push(old);
        self.captain_id = new_captain;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn summary(self) -> TeamSummary {
        TeamSummary {
            total_members: self.total_members(),
            is_complete: self.is_complete(),
            players_needed: self.players_needed(),
            team: self,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTeam {
    pub name: String,
    pub description: Option<String>,
    pub logo: Option<String>,
    pub team_size: Option<i32>,
    #[serde(default)]
    pub players: Vec<Uuid>,
}

impl NewTeam {
    pub fn validate(&self, captain_id: Uuid) -> Result<(), ClubError> {
        if self.name.trim().is_empty() {
            return Err(ClubError::Validation("name should not be empty".into()));
        }
        let size = self.team_size.unwrap_or(DEFAULT_TEAM_SIZE);
        if size < MIN_TEAM_SIZE {
            return Err(ClubError::Validation(format!("teamSize must not be less than {}", MIN_TEAM_SIZE)));
        }
        if self.players.contains(&captain_id) {
            return Err(ClubError::Validation("Captain cannot be listed as a player".into()));
        }
        if self.players.len() as i32 > size - 1 {
            return Err(ClubError::Validation(format!("A team of {} can list at most {} players", size, size - 1)));
        }
        let mut seen = self.players.clone();
        seen.sort();
        seen.dedup();
        if seen.len() != self.players.len() {
            return Err(ClubError::Validation("Players must be unique".into()));
        }
        Ok(())
    }

    /// `recruits` must describe every listed player.
    pub fn into_team(self, captain_id: Uuid, recruits: &[Recruit]) -> Result<Team, ClubError> {
        self.validate(captain_id)?;
        for id in &self.players {
            match recruits.iter().find(|r| r.id == *id) {
                None => return Err(ClubError::NotFound(format!("User with ID {} not found", id))),
                Some(r) if !r.is_active || !r.is_player => {
                    return Err(ClubError::Validation("Player must be active and have PLAYER role".into()))
                }
                Some(_) => {}
            }
        }
        let now = Utc::now();
        Ok(Team {
            id: Uuid::new_v4(),
            name: self.name.trim().to_string(),
            description: self.description,
            logo: self.logo,
            team_size: self.team_size.unwrap_or(DEFAULT_TEAM_SIZE),
            captain_id,
            players: self.players,
            wins: 0,
            losses: 0,
            average_rating: 0.0,
            created_at: now,
            updated_at: now,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub logo: Option<String>,
    pub team_size: Option<i32>,
}

impl TeamPatch {
    pub fn apply(&self, team: &mut Team) -> Result<(), ClubError> {
        if let Some(name) = &self.name {
            if name.trim().is_empty() {
                return Err(ClubError::Validation("name should not be empty".into()));
            }
            team.name = name.trim().to_string();
        }
        if let Some(size) = self.team_size {
            if size < MIN_TEAM_SIZE {
                return Err(ClubError::Validation(format!("teamSize must not be less than {}", MIN_TEAM_SIZE)));
            }
            if size < team.total_members() {
                return Err(ClubError::Validation(format!(
                    "Team size cannot be less than current members ({})",
                    team.total_members()
                )));
            }
            team.team_size = size;
        }
        if let Some(description) = &self.description {
            team.description = Some(description.clone());
        }
        if let Some(logo) = &self.logo {
            team.logo = Some(logo.clone());
        }
        team.updated_at = Utc::now();
        Ok(())
    }
}
