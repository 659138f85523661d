use crate::models::{Order, OrderStatus};

/// What a status update actually did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusChange {
    Unchanged,
    Changed { from: OrderStatus, to: OrderStatus },
}

impl StatusChange {
    pub fn cancelled(&self) -> bool {
        matches!(self, StatusChange::Changed { to: OrderStatus::Cancelled, .. })
    }
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }

    /// pending → shipped | completed | cancelled, shipped → completed | cancelled.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Shipped) | (Pending, Completed) | (Pending, Cancelled)
                | (Shipped, Completed) | (Shipped, Cancelled)
        )
    }
}

/// Moves an order to `next`. Re-applying the current status is accepted and changes nothing.
pub fn transition(order: &mut Order, next: OrderStatus) -> Result<StatusChange, OrderError> {
    let current = order.status;
    if current == next {
        return Ok(StatusChange::Unchanged);
    }
    if !current.can_transition_to(next) {
        return Err(OrderError::InvalidTransition {
            from: current.as_str().to_string(),
            to: next.as_str().to_string(),
        });
    }

    order.update_status(next);
    Ok(StatusChange::Changed { from: current, to: next })
}

#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("Order with ID {0} not found")]
    NotFound(i32),

    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition {
        from: String,
        to: String,
    },

    #[error("{0}")]
    Validation(String),

    #[error("Order totals do not match items")]
    TotalsMismatch,

    #[error("Only pending orders can be edited")]
    NotEditable,

    #[error("Order {0} was changed by another request")]
    StaleStatus(i32),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PaymentKind, PaymentMethod, ShippingAddress};
    use chrono::Utc;
    use pitchside_shared::Money;

    fn order() -> Order {
        Order {
            id: 1,
            order_number: "ORD-1".into(),
            user_id: None,
            subtotal: Money::from_minor(1000),
            shipping: Money::from_minor(1500),
            tax: Money::from_minor(80),
            total: Money::from_minor(2580),
            status: OrderStatus::Pending,
            shipping_address: ShippingAddress {
                first_name: "A".into(),
                last_name: "B".into(),
                email: "a@b.tn".into(),
                address: "x".into(),
                city: "Sfax".into(),
                zip_code: "3000".into(),
            },
            payment_method: PaymentMethod { kind: PaymentKind::Card, last4: None },
            items: vec![],
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_order_lifecycle() {
        let mut order = order();

        // pending → shipped
        let change = transition(&mut order, OrderStatus::Shipped).unwrap();
        assert_eq!(change, StatusChange::Changed { from: OrderStatus::Pending, to: OrderStatus::Shipped });

        // shipped → shipped is a no-op
        assert_eq!(transition(&mut order, OrderStatus::Shipped).unwrap(), StatusChange::Unchanged);

        // shipped → completed
        transition(&mut order, OrderStatus::Completed).unwrap();
        assert_eq!(order.status, OrderStatus::Completed);
        assert!(order.status.is_terminal());
    }

    #[test]
    fn test_invalid_transition() {
        let mut order = order();
        transition(&mut order, OrderStatus::Cancelled).unwrap();

        let result = transition(&mut order, OrderStatus::Pending);
        assert!(matches!(result, Err(OrderError::InvalidTransition { .. })));
        assert_eq!(
            result.unwrap_err().to_string(),
            "Invalid state transition from cancelled to pending"
        );
    }

    #[test]
    fn test_shipped_cannot_go_back_to_pending() {
        let mut order = order();
        transition(&mut order, OrderStatus::Shipped).unwrap();
        assert!(transition(&mut order, OrderStatus::Pending).is_err());

        let change = transition(&mut order, OrderStatus::Cancelled).unwrap();
        assert!(change.cancelled());
    }
}
