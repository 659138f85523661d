use uuid::Uuid;

/// Published on the in-process broadcast channel whenever a notification row is written.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct NotificationEvent {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub related_id: Option<String>,
    pub timestamp: i64,
}

impl NotificationEvent {
    pub fn is_for(&self, user_id: Uuid) -> bool {
        self.user_id == user_id
    }
}
