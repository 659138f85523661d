use async_trait::async_trait;
use pitchside_shared::Masked;
use serde::Serialize;

use crate::RepoResult;

#[derive(Debug, Clone, Serialize)]
pub struct OutgoingMail {
    pub to: String,
    pub subject: String,
    pub text: String,
}

impl OutgoingMail {
    pub fn reset_code(to: &str, first_name: &str, code: &str, valid_for_minutes: i64) -> Self {
        Self {
            to: to.to_string(),
            subject: "Password Reset Code".to_string(),
            text: format!(
                "Hello {},\n\nYour password reset code is {}. It expires in {} minutes.\n\nIf you did not ask for a reset, ignore this message.",
                first_name, code, valid_for_minutes
            ),
        }
    }
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: OutgoingMail) -> RepoResult<()>;
}

/// Writes mail to the log instead of delivering it.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, mail: OutgoingMail) -> RepoResult<()> {
        tracing::info!(to = %Masked(&mail.to), subject = %mail.subject, "Mail handed to log mailer");
        tracing::debug!(body = %mail.text, "Mail body");
        Ok(())
    }
}
