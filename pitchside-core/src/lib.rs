pub mod identity;
pub mod credentials;
pub mod mailer;
pub mod notification;
pub mod repository;

pub use identity::{NewUser, Role, User, UserPatch, UserProfile};
pub use notification::{NewNotification, Notification, NotificationKind};

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("{0}")]
    ValidationError(String),
    #[error("{0}")]
    AuthenticationError(String),
    #[error("{0}")]
    ForbiddenError(String),
    #[error("{0}")]
    NotFoundError(String),
    #[error("{0}")]
    ConflictError(String),
    #[error("Internal service error: {0}")]
    InternalError(String),
}

pub type CoreResult<T> = Result<T, CoreError>;

pub type RepoError = Box<dyn std::error::Error + Send + Sync>;
pub type RepoResult<T> = Result<T, RepoError>;
