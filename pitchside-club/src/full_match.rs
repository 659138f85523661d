//! Matches booked with a complete lineup. They are settled from the start, so the
//! reservation goes straight to the owner and most edits stop once it is approved.

use chrono::{DateTime, NaiveDate, Utc};
use pitchside_booking::TimeOfDay;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::matches::{default_public, MatchStatus};
use crate::ClubError;

pub const CANCELLED_COMMENT: &str = "Cancelled by creator";
pub const CANCELLED_AFTER_APPROVAL_COMMENT: &str = "Cancelled by creator after approval";

/// Accepts `+` followed by 8 to 15 digits.
pub(crate) fn check_phone(phone: &str) -> Result<(), ClubError> {
    let digits = phone.strip_prefix('+').unwrap_or("");
    if (8..=15).contains(&digits.len()) && digits.bytes().all(|b| b.is_ascii_digit()) {
        Ok(())
    } else {
        Err(ClubError::Validation(
            "contactPhone must be a valid phone number starting with + followed by 8-15 digits".into(),
        ))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FullMatch {
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
    pub is_deleted: bool,
    pub creator_id: Uuid,
    pub field_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FullMatch {
    pub fn ensure_creator(&self, user_id: Uuid, action: &str) -> Result<(), ClubError> {
        if self.creator_id != user_id {
            return Err(ClubError::Forbidden(format!("Only creator can {}", action)));
        }
        Ok(())
    }

    pub fn ensure_viewable_by(&self, user_id: Uuid, is_admin: bool) -> Result<(), ClubError> {
        if self.creator_id == user_id || is_admin {
            Ok(())
        } else {
            Err(ClubError::Forbidden("You can only view your own matches".into()))
        }
    }

    pub fn reschedule(&mut self, date: NaiveDate, start: TimeOfDay, end: TimeOfDay) {
        self.date = date;
        self.start_time = start;
        self.end_time = end;
        self.updated_at = Utc::now();
    }

    pub fn cancel(&mut self) -> Result<(), ClubError> {
        if self.status == MatchStatus::Cancelled {
            return Err(ClubError::Validation("Match is cancelled".into()));
        }
        self.status = MatchStatus::Cancelled;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Only cancelled matches may be removed.
    pub fn retire(&mut self) -> Result<(), ClubError> {
        if self.status != MatchStatus::Cancelled {
            return Err(ClubError::Forbidden("Match must be cancelled before deletion".into()));
        }
        self.is_deleted = true;
        self.updated_at = Utc::now();
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewFullMatch {
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
}

impl NewFullMatch {
    pub fn into_match(self, creator_id: Uuid) -> Result<FullMatch, ClubError> {
        if self.title.trim().is_empty() || self.city.trim().is_empty() {
            return Err(ClubError::Validation("title and city should not be empty".into()));
        }
        check_phone(&self.contact_phone)?;
        let now = Utc::now();
        Ok(FullMatch {
            id: Uuid::new_v4(),
            title: self.title.trim().to_string(),
            city: self.city.trim().to_string(),
            description: self.description,
            status: MatchStatus::Completed,
            contact_phone: self.contact_phone,
            date: self.date,
            start_time: self.start_time,
            end_time: self.end_time,
            is_public: self.is_public,
            is_deleted: false,
            creator_id,
            field_id: self.field_id,
            created_at: now,
            updated_at: now,
        })
    }
}

/// Descriptive edits; the slot moves through the time-slot call.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FullMatchPatch {
    pub title: Option<String>,
    pub city: Option<String>,
    pub description: Option<String>,
    pub contact_phone: Option<String>,
    pub is_public: Option<bool>,
}

impl FullMatchPatch {
    /// Returns whether the contact phone changed, which the reservation mirrors.
    pub fn apply(&self, target: &mut FullMatch) -> Result<bool, ClubError> {
        if let Some(phone) = &self.contact_phone {
            check_phone(phone)?;
        }
        if let Some(title) = self.title.as_ref().filter(|t| !t.trim().is_empty()) {
            target.title = title.trim().to_string();
        }
        if let Some(city) = self.city.as_ref().filter(|c| !c.trim().is_empty()) {
            target.city = city.trim().to_string();
        }
        if let Some(description) = &self.description {
            target.description = Some(description.clone());
        }
        if let Some(flag) = self.is_public {
            target.is_public = flag;
        }
        let phone_changed = match &self.contact_phone {
            Some(phone) if *phone != target.contact_phone => {
                target.contact_phone = phone.clone();
                true
            }
            _ => false,
        };
        target.updated_at = Utc::now();
        Ok(phone_changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn booked() -> FullMatch {
        NewFullMatch {
            title: "  Friday league ".into(),
            city: "Sousse".into(),
            description: None,
            contact_phone: "+21698765432".into(),
            date: NaiveDate::from_ymd_opt(2030, 5, 3).unwrap(),
            start_time: "19:00".parse().unwrap(),
            end_time: "20:30".parse().unwrap(),
            is_public: true,
            field_id: Uuid::new_v4(),
        }
        .into_match(Uuid::new_v4())
        .unwrap()
    }

    #[test]
    fn test_full_match_starts_completed() {
        let m = booked();
        assert_eq!(m.status, MatchStatus::Completed);
        assert_eq!(m.title, "Friday league");
        assert!(!m.is_deleted);
    }

    #[test]
    fn test_phone_format() {
        assert!(check_phone("+21698765432").is_ok());
        assert!(check_phone("21698765432").is_err());
        assert!(check_phone("+2169").is_err());
        assert!(check_phone("+21698x65432").is_err());
    }

    #[test]
    fn test_only_cancelled_matches_retire() {
        let mut m = booked();
        assert_eq!(m.retire().unwrap_err().to_string(), "Match must be cancelled before deletion");
        m.cancel().unwrap();
        assert!(m.cancel().is_err());
        m.retire().unwrap();
        assert!(m.is_deleted);
    }

    #[test]
    fn test_patch_reports_phone_changes() {
        let mut m = booked();
        let patch = FullMatchPatch { title: Some("Derby".into()), ..Default::default() };
        assert!(!patch.apply(&mut m).unwrap());
        assert_eq!(m.title, "Derby");

        let patch = FullMatchPatch { contact_phone: Some("+21611111111".into()), ..Default::default() };
        assert!(patch.apply(&mut m).unwrap());

        let stranger = Uuid::new_v4();
        assert!(m.ensure_viewable_by(stranger, false).is_err());
        assert!(m.ensure_viewable_by(stranger, true).is_ok());
        assert_eq!(
            m.ensure_creator(stranger, "update").unwrap_err().to_string(),
            "Only creator can update"
        );
    }
}
