use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::matches::IncompleteMatch;
use crate::ClubError;

pub const MIN_SCORE: i32 = 4;
pub const MAX_SCORE: i32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchType {
    Incomplete,
    TeamVsTeam,
}

impl MatchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchType::Incomplete => "INCOMPLETE",
            MatchType::TeamVsTeam => "TEAM_VS_TEAM",
        }
    }
}

impl fmt::Display for MatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MatchType {
    type Err = ClubError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "INCOMPLETE" => Ok(MatchType::Incomplete),
            "TEAM_VS_TEAM" => Ok(MatchType::TeamVsTeam),
            _ => Err(ClubError::Validation("Invalid match type".into())),
        }
    }
}

/// A match whose players may rate each other.
pub trait Played: Send + Sync {
    fn match_id(&self) -> Uuid;

    fn match_type(&self) -> MatchType;

    fn title(&self) -> &str;

    fn is_participant(&self, user_id: Uuid) -> bool;
}

impl Played for IncompleteMatch {
    fn match_id(&self) -> Uuid {
        self.id
    }

    fn match_type(&self) -> MatchType {
        MatchType::Incomplete
    }

    fn title(&self) -> &str {
        &self.title
    }

    fn is_participant(&self, user_id: Uuid) -> bool {
        IncompleteMatch::is_participant(self, user_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rating {
    pub id: Uuid,
    pub rater_id: Uuid,
    pub player_id: Uuid,
    pub match_id: Uuid,
    pub match_type: MatchType,
    pub score: i32,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRating {
    pub player_id: Uuid,
    pub match_id: Uuid,
    /// Kept as text so unsupported kinds get a readable refusal.
    pub match_type: String,
    pub score: i32,
    pub comment: Option<String>,
}

impl NewRating {
    /// Checks the rating against the match it refers to. `already_rated` reports whether
    /// this rater has rated this player for this match before.
    pub fn into_rating(
        self,
        rater_id: Uuid,
        played: &dyn Played,
        already_rated: bool,
    ) -> Result<Rating, ClubError> {
        let match_type: MatchType = self.match_type.parse()?;
        if match_type != played.match_type() {
            return Err(ClubError::Validation(format!(
                "Match {} is not a {} match",
                played.match_id(),
                match_type
            )));
        }
        if !(MIN_SCORE..=MAX_SCORE).contains(&self.score) {
            return Err(ClubError::Validation(format!(
                "score must be between {} and {}",
                MIN_SCORE, MAX_SCORE
            )));
        }
        if rater_id == self.player_id {
            return Err(ClubError::Validation("You cannot rate yourself".into()));
        }
        if !played.is_participant(rater_id) {
            return Err(ClubError::Validation(
                "You can only rate players from matches you participated in".into(),
            ));
        }
        if !played.is_participant(self.player_id) {
            return Err(ClubError::Validation(
                "You can only rate players who participated in the match".into(),
            ));
        }
        if already_rated {
            return Err(ClubError::Conflict("You have already rated this player for this match".into()));
        }
        Ok(Rating {
            id: Uuid::new_v4(),
            rater_id,
            player_id: self.player_id,
            match_id: played.match_id(),
            match_type,
            score: self.score,
            comment: self.comment,
            created_at: Utc::now(),
        })
    }
}

/// Running rating aggregate kept on the user row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingTally {
    pub total_ratings: i32,
    pub rating_sum: i64,
    pub average_rating: f64,
}

impl RatingTally {
    pub fn record(self, score: i32) -> Self {
        let total_ratings = self.total_ratings + 1;
        let rating_sum = self.rating_sum + score as i64;
        Self {
            total_ratings,
            rating_sum,
            average_rating: round2(rating_sum as f64 / total_ratings as f64),
        }
    }
}

pub fn average(scores: &[i32]) -> f64 {
    if scores.is_empty() {
        return 0.0;
    }
    round2(scores.iter().map(|s| *s as f64).sum::<f64>() / scores.len() as f64)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matches::NewMatch;
    use chrono::NaiveDate;

    fn played_match(creator: Uuid, players: &[Uuid]) -> IncompleteMatch {
        let mut m = NewMatch {
            title: "Sunday match".into(),
            city: "Tunis".into(),
            description: None,
            contact_phone: None,
            date: NaiveDate::from_ymd_opt(2025, 7, 6).unwrap(),
            start_time: "18:00".parse().unwrap(),
            end_time: "19:30".parse().unwrap(),
            is_public: true,
            field_id: Uuid::new_v4(),
            min_age: None,
            max_age: None,
            min_skill_level: None,
            max_skill_level: None,
            current_players: None,
            max_players: None,
            requires_approval: false,
        }
        .into_match(creator)
        .unwrap();
        m.players.extend_from_slice(players);
        m
    }

    fn draft(player: Uuid, score: i32, kind: &str) -> NewRating {
        NewRating { player_id: player, match_id: Uuid::new_v4(), match_type: kind.into(), score, comment: None }
    }

    #[test]
    fn test_rating_between_participants() {
        let (creator, mate) = (Uuid::new_v4(), Uuid::new_v4());
        let played = played_match(creator, &[mate]);

        let rating = draft(mate, 8, "INCOMPLETE").into_rating(creator, &played, false).unwrap();
        assert_eq!(rating.match_id, played.id);
        assert_eq!(rating.score, 8);
    }

    #[test]
    fn test_rating_rules() {
        let (creator, mate, stranger) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let played = played_match(creator, &[mate]);

        let err = |d: NewRating, rater: Uuid, dup: bool| d.into_rating(rater, &played, dup).unwrap_err().to_string();

        assert_eq!(err(draft(creator, 8, "INCOMPLETE"), creator, false), "You cannot rate yourself");
        assert_eq!(
            err(draft(mate, 8, "INCOMPLETE"), stranger, false),
            "You can only rate players from matches you participated in"
        );
        assert_eq!(
            err(draft(stranger, 8, "INCOMPLETE"), creator, false),
            "You can only rate players who participated in the match"
        );
        assert_eq!(
            err(draft(mate, 8, "INCOMPLETE"), creator, true),
            "You have already rated this player for this match"
        );
        assert_eq!(err(draft(mate, 8, "FRIENDLY"), creator, false), "Invalid match type");
        assert_eq!(
            err(draft(mate, 8, "TEAM_VS_TEAM"), creator, false),
            format!("Match {} is not a TEAM_VS_TEAM match", played.id)
        );
        assert!(err(draft(mate, 3, "INCOMPLETE"), creator, false).contains("between 4 and 10"));
    }

    #[test]
    fn test_tally() {
        let tally = RatingTally::default().record(7).record(8).record(8);
        assert_eq!(tally.total_ratings, 3);
        assert_eq!(tally.rating_sum, 23);
        assert_eq!(tally.average_rating, 7.67);
        assert_eq!(average(&[]), 0.0);
        assert_eq!(average(&[5, 6]), 5.5);
    }

    #[test]
    fn test_match_type_wire_names() {
        assert_eq!(serde_json::to_value(MatchType::TeamVsTeam).unwrap(), "TEAM_VS_TEAM");
        let parsed: MatchType = serde_json::from_value(serde_json::json!("INCOMPLETE")).unwrap();
        assert_eq!(parsed, MatchType::Incomplete);
        assert_eq!("TEAM_VS_TEAM".parse::<MatchType>().unwrap(), MatchType::TeamVsTeam);
    }
}
