use chrono::{DateTime, Utc};
use pitchside_shared::Money;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::OrderError;

/// Order status in the lifecycle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    #[default]
    Pending,
    Shipped,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

impl FromStr for OrderStatus {
    type Err = OrderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OrderStatus::Pending),
            "shipped" => Ok(OrderStatus::Shipped),
            "completed" => Ok(OrderStatus::Completed),
            "cancelled" => Ok(OrderStatus::Cancelled),
            other => Err(OrderError::Validation(format!("Unknown order status: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentKind {
    Card,
    HandToHand,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PaymentMethod {
    #[serde(rename = "type")]
    pub kind: PaymentKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last4: Option<String>,
}

impl PaymentMethod {
    pub fn validate(&self) -> Result<(), OrderError> {
        if let Some(last4) = &self.last4 {
            if last4.len() != 4 || !last4.chars().all(|c| c.is_ascii_digit()) {
                return Err(OrderError::Validation("last4 must be exactly 4 digits".into()));
            }
            if self.kind == PaymentKind::HandToHand {
                return Err(OrderError::Validation(
                    "last4 only applies to card payments".into(),
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddress {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub address: String,
    pub city: String,
    pub zip_code: String,
}

impl ShippingAddress {
    pub fn validate(&self) -> Result<(), OrderError> {
        let required = [
            ("firstName", &self.first_name),
            ("lastName", &self.last_name),
            ("address", &self.address),
            ("city", &self.city),
            ("zipCode", &self.zip_code),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(OrderError::Validation(format!("shippingAddress.{} should not be empty", name)));
            }
        }
        let email = self.email.trim();
        match email.split_once('@') {
            Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
            _ => Err(OrderError::Validation("shippingAddress.email must be an email".into())),
        }
    }
}

/// A storefront purchase
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: i32,
    pub order_number: String,
    pub user_id: Option<Uuid>,
    pub subtotal: Money,
    pub shipping: Money,
    pub tax: Money,
    pub total: Money,
    pub status: OrderStatus,
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
    pub items: Vec<OrderItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Update order status
    pub fn update_status(&mut self, new_status: OrderStatus) {
        self.status = new_status;
        self.updated_at = Utc::now();
    }

    /// Only pending orders may have their lines edited.
    pub fn ensure_editable(&self) -> Result<(), OrderError> {
        if self.status != OrderStatus::Pending {
            return Err(OrderError::NotEditable);
        }
        Ok(())
    }

    pub fn is_visible_to(&self, user_id: Uuid) -> bool {
        self.user_id == Some(user_id)
    }
}

/// One line of an order
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub id: i32,
    pub order_id: i32,
    pub product_id: i32,
    pub product_name: Option<String>,
    pub quantity: i32,
    /// Unit price at the time of purchase.
    pub price: Money,
}

impl OrderItem {
    pub fn line_total(&self) -> Result<Money, OrderError> {
        line_total(self.price, self.quantity)
    }
}

/// Upper bound on the quantity of a single line.
pub const MAX_QUANTITY: i32 = 10_000;
/// Upper bound on a unit price, in minor units.
pub const MAX_UNIT_PRICE_MINOR: i64 = 100_000_000;

fn line_total(price: Money, quantity: i32) -> Result<Money, OrderError> {
    price
        .checked_mul(quantity as i64)
        .ok_or_else(|| OrderError::Validation("Order total is too large".into()))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrderItem {
    pub product_id: i32,
    pub quantity: i32,
    pub price: Money,
}

impl NewOrderItem {
    pub fn validate(&self) -> Result<(), OrderError> {
        if self.product_id <= 0 {
            return Err(OrderError::Validation("productId must be a positive number".into()));
        }
        if self.quantity <= 0 {
            return Err(OrderError::Validation("quantity must be a positive number".into()));
        }
        if self.quantity > MAX_QUANTITY {
            return Err(OrderError::Validation(format!("quantity must not exceed {}", MAX_QUANTITY)));
        }
        if !self.price.is_positive() {
            return Err(OrderError::Validation("price must be a positive number".into()));
        }
        if self.price.minor() > MAX_UNIT_PRICE_MINOR {
            return Err(OrderError::Validation(format!(
                "price must not exceed {}",
                Money::from_minor(MAX_UNIT_PRICE_MINOR)
            )));
        }
        Ok(())
    }

    pub fn line_total(&self) -> Result<Money, OrderError> {
        line_total(self.price, self.quantity)
    }
}

/// Checkout payload
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrder {
    pub order_number: Option<String>,
    pub subtotal: Money,
    pub shipping: Money,
    pub tax: Money,
    pub total: Money,
    pub status: Option<OrderStatus>,
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
    pub items: Vec<NewOrderItem>,
}

impl NewOrder {
    pub fn validate(&self) -> Result<(), OrderError> {
        if self.items.is_empty() {
            return Err(OrderError::Validation("items should not be empty".into()));
        }
        for item in &self.items {
            item.validate()?;
        }
        if let Some(status) = self.status {
            if status != OrderStatus::Pending {
                return Err(OrderError::Validation("New orders start as pending".into()));
            }
        }
        if let Some(number) = &self.order_number {
            if number.trim().is_empty() {
                return Err(OrderError::Validation("orderNumber should not be empty".into()));
            }
        }
        self.shipping_address.validate()?;
        self.payment_method.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn address() -> ShippingAddress {
        ShippingAddress {
            first_name: "Amira".into(),
            last_name: "Ben Salah".into(),
            email: "amira@example.tn".into(),
            address: "12 Rue de Marseille".into(),
            city: "Tunis".into(),
            zip_code: "1000".into(),
        }
    }

    #[test]
    fn test_payment_method_wire_format() {
        let method: PaymentMethod = serde_json::from_str(r#"{"type":"hand_to_hand"}"#).unwrap();
        assert_eq!(method.kind, PaymentKind::HandToHand);
        assert!(method.validate().is_ok());

        let card = PaymentMethod { kind: PaymentKind::Card, last4: Some("42".into()) };
        assert!(card.validate().is_err());
    }

    #[test]
    fn test_address_validation() {
        assert!(address().validate().is_ok());

        let mut missing_city = address();
        missing_city.city = " ".into();
        assert!(missing_city.validate().is_err());

        let mut bad_email = address();
        bad_email.email = "amira".into();
        assert!(bad_email.validate().is_err());
    }

    #[test]
    fn test_item_bounds() {
        let item = NewOrderItem { product_id: 1, quantity: MAX_QUANTITY, price: Money::from_minor(MAX_UNIT_PRICE_MINOR) };
        assert!(item.validate().is_ok());
        assert_eq!(item.line_total().unwrap().minor(), MAX_UNIT_PRICE_MINOR * MAX_QUANTITY as i64);

        let too_many = NewOrderItem { quantity: i32::MAX, ..item.clone() };
        assert!(matches!(too_many.validate(), Err(OrderError::Validation(_))));

        let too_dear = NewOrderItem { price: Money::from_minor(MAX_UNIT_PRICE_MINOR + 1), ..item };
        assert!(matches!(too_dear.validate(), Err(OrderError::Validation(_))));
    }

    #[test]
    fn test_stored_line_total_overflow_is_an_error() {
        let line = OrderItem {
            id: 1,
            order_id: 1,
            product_id: 1,
            product_name: None,
            quantity: i32::MAX,
            price: Money::from_minor(i64::MAX / 2),
        };
        assert!(line.line_total().is_err());
    }

    #[test]
    fn test_status_parse() {
        assert_eq!("shipped".parse::<OrderStatus>().unwrap(), OrderStatus::Shipped);
        assert!("lost".parse::<OrderStatus>().is_err());
        assert_eq!(serde_json::to_string(&OrderStatus::Cancelled).unwrap(), "\"cancelled\"");
    }
}
