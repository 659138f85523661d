use chrono::{DateTime, NaiveDate, Utc};
use pitchside_club::RatingTally;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::{CoreError, CoreResult};

pub const MIN_PASSWORD_LENGTH: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Player,
    Owner,
    Admin,
    Webadmin,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Player, Role::Owner, Role::Admin, Role::Webadmin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Player => "PLAYER",
            Role::Owner => "OWNER",
            Role::Admin => "ADMIN",
            Role::Webadmin => "WEBADMIN",
        }
    }

    pub fn is_admin(&self) -> bool {
        *self == Role::Admin
    }

    /// Storefront back office.
    pub fn manages_shop(&self) -> bool {
        matches!(self, Role::Admin | Role::Webadmin)
    }

    pub fn can_self_register(&self) -> bool {
        matches!(self, Role::Player | Role::Owner)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| CoreError::ValidationError(format!("Unknown role: {}", s)))
    }
}

/// A stored account. Secrets never leave through [`UserProfile`].
#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password_hash: String,
    pub refresh_token_hash: Option<String>,
    pub role: Role,
    pub city: Option<String>,
    pub phone_number: Option<String>,
    pub profile_picture: Option<String>,
    pub bio: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub is_replacement_player: bool,
    pub is_active: bool,
    pub total_ratings: i32,
    pub rating_sum: i64,
    pub average_rating: f64,
    pub reset_code_hash: Option<String>,
    pub reset_code_expires_at: Option<DateTime<Utc>>,
    /// Wrong codes submitted against the pending reset code.
    pub reset_attempts: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub role: Role,
    pub city: Option<String>,
    pub phone_number: Option<String>,
    pub profile_picture: Option<String>,
    pub bio: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub is_replacement_player: bool,
    pub is_active: bool,
    pub total_ratings: i32,
    pub average_rating: f64,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id,
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            email: self.email.clone(),
            role: self.role,
            city: self.city.clone(),
            phone_number: self.phone_number.clone(),
            profile_picture: self.profile_picture.clone(),
            bio: self.bio.clone(),
            date_of_birth: self.date_of_birth,
            is_replacement_player: self.is_replacement_player,
            is_active: self.is_active,
            total_ratings: self.total_ratings,
            average_rating: self.average_rating,
            created_at: self.created_at,
        }
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn is_active_player(&self) -> bool {
        self.is_active && self.role == Role::Player
    }

    pub fn tally(&self) -> RatingTally {
        RatingTally {
            total_ratings: self.total_ratings,
            rating_sum: self.rating_sum,
            average_rating: self.average_rating,
        }
    }

    /// Self or an admin.
    pub fn ensure_can_edit(&self, actor_id: Uuid, actor_role: Role) -> CoreResult<()> {
        if self.id == actor_id || actor_role.is_admin() {
            Ok(())
        } else {
            Err(CoreError::ForbiddenError("You can only update your own profile".into()))
        }
    }
}

pub fn validate_email(email: &str) -> CoreResult<()> {
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !email.contains(char::is_whitespace)
                && domain.split('.').count() >= 2
                && domain.split('.').all(|part| !part.is_empty())
        }
        None => false,
    };
    if !valid {
        return Err(CoreError::ValidationError("email must be an email".into()));
    }
    Ok(())
}

pub fn validate_password(password: &str) -> CoreResult<()> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(CoreError::ValidationError(format!(
            "password must be longer than or equal to {} characters",
            MIN_PASSWORD_LENGTH
        )));
    }
    Ok(())
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    pub role: Option<Role>,
    pub city: Option<String>,
    pub phone_number: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default)]
    pub is_replacement_player: bool,
}

impl NewUser {
    pub fn role(&self) -> Role {
        self.role.unwrap_or(Role::Player)
    }

    pub fn validate(&self) -> CoreResult<()> {
        if self.first_name.trim().is_empty() || self.last_name.trim().is_empty() {
            return Err(CoreError::ValidationError("firstName and lastName should not be empty".into()));
        }
        validate_email(self.email.trim())?;
        validate_password(&self.password)?;
        if !self.role().can_self_register() {
            return Err(CoreError::ForbiddenError(format!("Cannot self-register as {}", self.role())));
        }
        Ok(())
    }

    /// Owners wait for an administrator before they can sign in.
    pub fn into_user(self, password_hash: String) -> User {
        let now = Utc::now();
        let role = self.role();
        User {
            id: Uuid::new_v4(),
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            email: normalize_email(&self.email),
            password_hash,
            refresh_token_hash: None,
            role,
            city: self.city,
            phone_number: self.phone_number,
            profile_picture: None,
            bio: None,
            date_of_birth: self.date_of_birth,
            is_replacement_player: self.is_replacement_player,
            is_active: role != Role::Owner,
            total_ratings: 0,
            rating_sum: 0,
            average_rating: 0.0,
            reset_code_hash: None,
            reset_code_expires_at: None,
            reset_attempts: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPatch {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub city: Option<String>,
    pub phone_number: Option<String>,
    pub profile_picture: Option<String>,
    pub bio: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub is_replacement_player: Option<bool>,
}

impl UserPatch {
    pub fn apply(&self, user: &mut User) -> CoreResult<()> {
        for name in [&self.first_name, &self.last_name].into_iter().flatten() {
            if name.trim().is_empty() {
                return Err(CoreError::ValidationError("firstName and lastName should not be empty".into()));
            }
        }
        if let Some(v) = &self.first_name {
            user.first_name = v.trim().to_string();
        }
        if let Some(v) = &self.last_name {
            user.last_name = v.trim().to_string();
        }
        if let Some(v) = &self.city {
            user.city = Some(v.clone());
        }
        if let Some(v) = &self.phone_number {
            user.phone_number = Some(v.clone());
        }
        if let Some(v) = &self.profile_picture {
            user.profile_picture = Some(v.clone());
        }
        if let Some(v) = &self.bio {
            user.bio = Some(v.clone());
        }
        if let Some(v) = self.date_of_birth {
            user.date_of_birth = Some(v);
        }
        if let Some(v) = self.is_replacement_player {
            user.is_replacement_player = v;
        }
        user.updated_at = Utc::now();
        Ok(())
    }
}

#[cfg(test)]
pub(crate) fn sample_user(role: Role) -> User {
    NewUser {
        first_name: "Yassine".into(),
        last_name: "Trabelsi".into(),
        email: "Yassine@Example.tn".into(),
        password: "secret1".into(),
        role: Some(role),
        city: Some("Tunis".into()),
        phone_number: None,
        date_of_birth: None,
        is_replacement_player: false,
    }
    .into_user("hash".into())
}
