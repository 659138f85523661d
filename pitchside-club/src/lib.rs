pub mod team;
pub mod matches;
pub mod full_match;
pub mod team_match;
pub mod rating;

pub use team::{NewTeam, Recruit, Team, TeamPatch, TeamSummary};
pub use matches::{
    IncompleteMatch, JoinOutcome, JoinRequest, MatchPatch, MatchQuery, MatchStatus, NewMatch, PlayerAction,
    Reschedule, RosterChange,
};
pub use full_match::{FullMatch, FullMatchPatch, NewFullMatch};
pub use team_match::{
    InvitationReply, NewTeamMatch, TeamAction, TeamByName, TeamMatch, TeamMatchPatch, TeamMatchRoster, TeamMatchSlot,
};
pub use rating::{MatchType, NewRating, Played, Rating, RatingTally};

#[derive(Debug, thiserror::Error)]
pub enum ClubError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Conflict(String),
}

impl ClubError {
    pub fn team_not_found(id: uuid::Uuid) -> Self {
        ClubError::NotFound(format!("Team with ID {} not found", id))
    }

    pub fn match_not_found() -> Self {
        ClubError::NotFound("Match not found".into())
    }
}
