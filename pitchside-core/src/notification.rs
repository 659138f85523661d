use chrono::{DateTime, Utc};
use pitchside_shared::models::events::NotificationEvent;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Reservation,
    Match,
    Team,
    NewRating,
    System,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Reservation => "reservation",
            NotificationKind::Match => "match",
            NotificationKind::Team => "team",
            NotificationKind::NewRating => "new_rating",
            NotificationKind::System => "system",
        }
    }
}

impl FromStr for NotificationKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "reservation" => Ok(NotificationKind::Reservation),
            "match" => Ok(NotificationKind::Match),
            "team" => Ok(NotificationKind::Team),
            "new_rating" => Ok(NotificationKind::NewRating),
            "system" => Ok(NotificationKind::System),
            other => Err(CoreError::ValidationError(format!("Unknown notification type: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub related_id: Option<String>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn event(&self) -> NotificationEvent {
        NotificationEvent {
            id: self.id,
            user_id: self.user_id,
            title: self.title.clone(),
            message: self.message.clone(),
            kind: self.kind.as_str().to_string(),
            related_id: self.related_id.clone(),
            timestamp: self.created_at.timestamp_millis(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewNotification {
    pub user_id: Uuid,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub related_id: Option<String>,
}

impl NewNotification {
    pub fn new(user_id: Uuid, kind: NotificationKind, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            user_id,
            kind,
            title: title.into(),
            message: message.into(),
            related_id: None,
        }
    }

    pub fn related(mut self, id: impl ToString) -> Self {
        self.related_id = Some(id.to_string());
        self
    }

    pub fn into_notification(self) -> Notification {
        Notification {
            id: Uuid::new_v4(),
            user_id: self.user_id,
            title: self.title,
            message: self.message,
            kind: self.kind,
            related_id: self.related_id,
            is_read: false,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_carries_wire_type() {
        let user = Uuid::new_v4();
        let related = Uuid::new_v4();
        let n = NewNotification::new(user, NotificationKind::NewRating, "New Rating", "You were rated 8/10")
            .related(related)
            .into_notification();

        let event = n.event();
        assert!(event.is_for(user));
        assert_eq!(event.kind, "new_rating");
        assert_eq!(event.related_id, Some(related.to_string()));

        let json = serde_json::to_value(&n).unwrap();
        assert_eq!(json["type"], "new_rating");
        assert_eq!(json["isRead"], false);
    }
}
