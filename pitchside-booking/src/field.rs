use chrono::{DateTime, Duration, NaiveDate, Utc};
use pitchside_shared::Money;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::clock::{span_minutes, TimeOfDay, MINUTES_PER_DAY};
use crate::BookingError;

pub const DEFAULT_MATCH_DURATION: i32 = 90;

/// Daily opening window of a field. A closing time at or before the opening time means the
/// field stays open past midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpeningHours {
    pub opening: TimeOfDay,
    pub closing: TimeOfDay,
}

/// Where a requested slot sits: the day whose timeline it belongs to and its minutes from
/// that day's midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub timeline_date: NaiveDate,
    pub start: i32,
    pub end: i32,
}

impl Placement {
    pub fn minutes(&self) -> i32 {
        self.end - self.start
    }
}

impl OpeningHours {
    pub fn new(opening: TimeOfDay, closing: TimeOfDay) -> Result<Self, BookingError> {
        if opening == closing {
            return Err(BookingError::Validation(
                "Invalid time range: opening time must be before closing time and properly formatted".into(),
            ));
        }
        Ok(Self { opening, closing })
    }

    pub fn is_overnight(&self) -> bool {
        self.closing <= self.opening
    }

    /// Opening and closing as minutes from the opening day's midnight.
    pub fn window(&self) -> (i32, i32) {
        let open = self.opening.minutes();
        (open, open + span_minutes(self.opening, self.closing))
    }

    /// After-midnight slots of an overnight field belong to the previous day's timeline.
    pub fn locate(&self, date: NaiveDate, start: TimeOfDay, end: TimeOfDay) -> Placement {
        let length = span_minutes(start, end);
        if self.is_overnight() && start < self.opening {
            let previous = date - Duration::days(1);
            let start = start.minutes() + MINUTES_PER_DAY;
            Placement { timeline_date: previous, start, end: start + length }
        } else {
            Placement { timeline_date: date, start: start.minutes(), end: start.minutes() + length }
        }
    }

    pub fn contains(&self, placement: &Placement) -> bool {
        let (open, close) = self.window();
        placement.start >= open && placement.end <= close
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub address: String,
    pub city: String,
    pub price_per_hour: Money,
    pub match_duration: i32,
    pub has_showers: bool,
    pub has_water: bool,
    pub is_indoor: bool,
    pub image: Option<String>,
    pub number_of_terrains: i32,
    pub opening_time: TimeOfDay,
    pub closing_time: TimeOfDay,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Field {
    pub fn hours(&self) -> OpeningHours {
        OpeningHours { opening: self.opening_time, closing: self.closing_time }
    }

    pub fn is_owned_by(&self, user_id: Uuid) -> bool {
        self.owner_id == user_id
    }

    /// Owner of the field, or an administrator.
    pub fn ensure_managed_by(&self, user_id: Uuid, is_admin: bool) -> Result<(), BookingError> {
        if is_admin || self.is_owned_by(user_id) {
            Ok(())
        } else {
            Err(BookingError::Forbidden("You do not have permission to manage this field".into()))
        }
    }

    pub fn ensure_owned_by(&self, user_id: Uuid) -> Result<(), BookingError> {
        if self.is_owned_by(user_id) {
            Ok(())
        } else {
            Err(BookingError::Forbidden("You are not the owner of this field".into()))
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Terrain {
    pub id: Uuid,
    pub field_id: Uuid,
    pub name: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TerrainPatch {
    pub name: Option<String>,
    pub is_active: Option<bool>,
}

impl TerrainPatch {
    pub fn apply(&self, terrain: &mut Terrain) -> Result<(), BookingError> {
        if let Some(name) = &self.name {
            if name.trim().is_empty() {
                return Err(BookingError::Validation("name should not be empty".into()));
            }
            terrain.name = name.trim().to_string();
        }
        if let Some(active) = self.is_active {
            terrain.is_active = active;
        }
        Ok(())
    }
}

/// Names for terrains `existing + 1 ..= target`.
pub fn terrain_names(existing: i32, target: i32) -> Vec<String> {
    ((existing + 1)..=target).map(|n| format!("Terrain {}", n)).collect()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewField {
    pub name: String,
    pub description: Option<String>,
    pub address: String,
    pub city: String,
    pub price_per_hour: Money,
    pub match_duration: Option<i32>,
    #[serde(default)]
    pub has_showers: bool,
    #[serde(default)]
    pub has_water: bool,
    #[serde(default)]
    pub is_indoor: bool,
    pub image: Option<String>,
    pub number_of_terrains: Option<i32>,
    pub opening_time: TimeOfDay,
    pub closing_time: TimeOfDay,
}

impl NewField {
    pub fn validate(&self) -> Result<(), BookingError> {
        for (name, value) in [("name", &self.name), ("address", &self.address), ("city", &self.city)] {
            if value.trim().is_empty() {
                return Err(BookingError::Validation(format!("{} should not be empty", name)));
            }
        }
        validate_common(
            self.price_per_hour,
            self.match_duration.unwrap_or(DEFAULT_MATCH_DURATION),
            self.number_of_terrains.unwrap_or(1),
        )?;
        OpeningHours::new(self.opening_time, self.closing_time)?;
        Ok(())
    }

    pub fn into_field(self, owner_id: Uuid) -> Field {
        let now = Utc::now();
        Field {
            id: Uuid::new_v4(),
            owner_id,
            name: self.name.trim().to_string(),
            description: self.description,
            address: self.address,
            city: self.city.trim().to_string(),
            price_per_hour: self.price_per_hour,
            match_duration: self.match_duration.unwrap_or(DEFAULT_MATCH_DURATION),
            has_showers: self.has_showers,
            has_water: self.has_water,
            is_indoor: self.is_indoor,
            image: self.image,
            number_of_terrains: self.number_of_terrains.unwrap_or(1),
            opening_time: self.opening_time,
            closing_time: self.closing_time,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub price_per_hour: Option<Money>,
    pub match_duration: Option<i32>,
    pub has_showers: Option<bool>,
    pub has_water: Option<bool>,
    pub is_indoor: Option<bool>,
    pub image: Option<String>,
    pub number_of_terrains: Option<i32>,
    pub opening_time: Option<TimeOfDay>,
    pub closing_time: Option<TimeOfDay>,
}

impl FieldPatch {
    pub fn apply(&self, field: &mut Field) -> Result<(), BookingError> {
        if let Some(v) = &self.name {
            field.name = v.trim().to_string();
        }
        if let Some(v) = &self.description {
            field.description = Some(v.clone());
        }
        if let Some(v) = &self.address {
            field.address = v.clone();
        }
        if let Some(v) = &self.city {
            field.city = v.trim().to_string();
        }
        if let Some(v) = self.price_per_hour {
            field.price_per_hour = v;
        }
        if let Some(v) = self.match_duration {
            field.match_duration = v;
        }
        if let Some(v) = self.has_showers {
            field.has_showers = v;
        }
        if let Some(v) = self.has_water {
            field.has_water = v;
        }
        if let Some(v) = self.is_indoor {
            field.is_indoor = v;
        }
        if let Some(v) = &self.image {
            field.image = Some(v.clone());
        }
        if let Some(v) = self.number_of_terrains {
            field.number_of_terrains = v;
        }
        if let Some(v) = self.opening_time {
            field.opening_time = v;
        }
        if let Some(v) = self.closing_time {
            field.closing_time = v;
        }

        if field.name.is_empty() || field.city.is_empty() {
            return Err(BookingError::Validation("name and city should not be empty".into()));
        }
        validate_common(field.price_per_hour, field.match_duration, field.number_of_terrains)?;
        OpeningHours::new(field.opening_time, field.closing_time)?;
        field.updated_at = Utc::now();
        Ok(())
    }
}

fn validate_common(price_per_hour: Money, match_duration: i32, terrains: i32) -> Result<(), BookingError> {
    if price_per_hour.minor() < 0 {
        return Err(BookingError::Validation("pricePerHour cannot be negative".into()));
    }
    if !(75..=120).contains(&match_duration) {
        return Err(BookingError::Validation("matchDuration must be between 75 and 120 minutes".into()));
    }
    if terrains < 1 {
        return Err(BookingError::Validation("Number of terrains must be at least 1".into()));
    }
    Ok(())
}

/// Query string of `GET /fields`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldQuery {
    pub city: Option<String>,
    pub max_price_per_hour: Option<f64>,
    pub has_showers: Option<bool>,
    pub has_water: Option<bool>,
    pub is_indoor: Option<bool>,
    pub date: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldSearch {
    pub city: Option<String>,
    pub max_price_per_hour: Option<Money>,
    pub has_showers: Option<bool>,
    pub has_water: Option<bool>,
    pub is_indoor: Option<bool>,
    /// When set, only fields with this whole slot free are kept.
    pub slot: Option<(NaiveDate, TimeOfDay, TimeOfDay)>,
}

impl FieldQuery {
    pub fn into_search(self) -> Result<FieldSearch, BookingError> {
        let slot = match (&self.date, &self.start_time, &self.end_time) {
            (None, None, None) => None,
            (Some(date), Some(start), Some(end)) => {
                let date = crate::clock::parse_date(date)?;
                let start: TimeOfDay = start.parse()?;
                let end: TimeOfDay = end.parse()?;
                let length = span_minutes(start, end);
                if !(75..=120).contains(&length) {
                    return Err(BookingError::Validation(
                        "Time slot must be between 75 and 120 minutes".into(),
                    ));
                }
                Some((date, start, end))
            }
            _ => {
                return Err(BookingError::Validation(
                    "date, startTime and endTime must be provided together".into(),
                ))
            }
        };

        Ok(FieldSearch {
            city: self.city.map(|c| c.trim().to_string()).filter(|c| !c.is_empty()),
            max_price_per_hour: self.max_price_per_hour.map(Money::from_major),
            has_showers: self.has_showers,
            has_water: self.has_water,
            is_indoor: self.is_indoor,
            slot,
        })
    }
}

#[cfg(test)]
pub(crate) fn sample_field(opening: &str, closing: &str, terrains: i32) -> Field {
    let now = Utc::now();
    Field {
        id: Uuid::new_v4(),
        owner_id: Uuid::new_v4(),
        name: "Stade Municipal".into(),
        description: None,
        address: "Rue du Stade".into(),
        city: "Tunis".into(),
        price_per_hour: Money::from_minor(6000),
        match_duration: 90,
        has_showers: true,
        has_water: true,
        is_indoor: false,
        image: None,
        number_of_terrains: terrains,
        opening_time: opening.parse().unwrap(),
        closing_time: closing.parse().unwrap(),
        created_at: now,
        updated_at: now,
    }
}
