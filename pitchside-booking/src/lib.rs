pub mod clock;
pub mod field;
pub mod schedule;
pub mod reservation;
pub mod pricing;

pub use clock::{Interval, TimeOfDay};
pub use field::{Field, FieldPatch, FieldQuery, FieldSearch, NewField, OpeningHours, Placement, Terrain, TerrainPatch};
pub use schedule::{DaySchedule, Occupancy, PendingSlot, SlotRules, TimeSlot, Timeline};
pub use reservation::{Reservation, ReservationStatus, CancelledBy};

#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Invalid reservation status transition from {from} to {to}")]
    InvalidTransition {
        from: String,
        to: String,
    },
}

impl BookingError {
    pub fn field_not_found(id: uuid::Uuid) -> Self {
        BookingError::NotFound(format!("Field with ID {} not found", id))
    }

    pub fn reservation_not_found(id: uuid::Uuid) -> Self {
        BookingError::NotFound(format!("Reservation with ID {} not found", id))
    }

    pub fn terrain_not_found(id: uuid::Uuid) -> Self {
        BookingError::NotFound(format!("Terrain with ID {} not found or not in this field", id))
    }
}
