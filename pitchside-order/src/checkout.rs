use chrono::{DateTime, Utc};
use pitchside_shared::Money;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::models::{NewOrder, NewOrderItem, OrderItem, PaymentKind};
use crate::OrderError;

/// Allowed gap between client and server totals, in minor units.
const TOLERANCE: i64 = 1;

/// Shipping and tax rules for the storefront checkout
#[derive(Debug, Clone)]
pub struct CheckoutRules {
    pub tax_rate: f64,
    pub card_shipping: Money,
    pub hand_to_hand_shipping: Money,
}

impl Default for CheckoutRules {
    fn default() -> Self {
        Self {
            tax_rate: 0.08,
            card_shipping: Money::from_minor(1500),
            hand_to_hand_shipping: Money::from_minor(1),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub subtotal: Money,
    pub shipping: Money,
    pub tax: Money,
    pub total: Money,
}

impl CheckoutRules {
    pub fn shipping_for(&self, kind: PaymentKind) -> Money {
        match kind {
            PaymentKind::Card => self.card_shipping,
            PaymentKind::HandToHand => self.hand_to_hand_shipping,
        }
    }

    pub fn quote(&self, items: &[NewOrderItem], kind: PaymentKind) -> Result<Quote, OrderError> {
        if items.is_empty() {
            return Err(OrderError::Validation("items should not be empty".into()));
        }
        for item in items {
            item.validate()?;
        }
        let lines = items
            .iter()
            .map(NewOrderItem::line_total)
            .collect::<Result<Vec<_>, _>>()?;
        self.price(lines, self.shipping_for(kind))
    }

    /// Totals after a line was edited; shipping stays what the customer agreed to.
    pub fn requote(&self, items: &[OrderItem], shipping: Money) -> Result<Quote, OrderError> {
        let lines = items
            .iter()
            .map(OrderItem::line_total)
            .collect::<Result<Vec<_>, _>>()?;
        self.price(lines, shipping)
    }

    /// Checks the totals the client computed against the items it sent.
    pub fn verify(&self, order: &NewOrder) -> Result<Quote, OrderError> {
        order.validate()?;
        let quote = self.quote(&order.items, order.payment_method.kind)?;

        let submitted = [order.subtotal, order.shipping, order.tax, order.total];
        let expected = [quote.subtotal, quote.shipping, quote.tax, quote.total];
        let matches = submitted
            .iter()
            .zip(expected.iter())
            .all(|(a, b)| a.abs_diff(*b) <= TOLERANCE);

        if !matches {
            return Err(OrderError::TotalsMismatch);
        }
        Ok(quote)
    }

    fn price(&self, lines: Vec<Money>, shipping: Money) -> Result<Quote, OrderError> {
        let too_large = || OrderError::Validation("Order total is too large".into());
        let subtotal = Money::checked_sum(lines).ok_or_else(too_large)?;
        let tax = subtotal.percent(self.tax_rate);
        let total = Money::checked_sum([subtotal, shipping, tax]).ok_or_else(too_large)?;
        Ok(Quote {
            subtotal,
            shipping,
            tax,
            total,
        })
    }
}

/// `ORD-<unix millis>-<4 digits>`
pub fn generate_order_number(now: DateTime<Utc>) -> String {
    let suffix: u16 = rand::thread_rng().gen_range(0..10_000);
    format!("ORD-{}-{:04}", now.timestamp_millis(), suffix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PaymentMethod, ShippingAddress};

    fn items() -> Vec<NewOrderItem> {
        vec![
            NewOrderItem { product_id: 1, quantity: 2, price: Money::from_minor(4500) },
            NewOrderItem { product_id: 2, quantity: 1, price: Money::from_minor(1999) },
        ]
    }

    fn order(quote: Quote, kind: PaymentKind) -> NewOrder {
        NewOrder {
            order_number: None,
            subtotal: quote.subtotal,
            shipping: quote.shipping,
            tax: quote.tax,
            total: quote.total,
            status: None,
            shipping_address: ShippingAddress {
                first_name: "Youssef".into(),
                last_name: "Trabelsi".into(),
                email: "youssef@example.tn".into(),
                address: "Avenue Habib Bourguiba".into(),
                city: "Sousse".into(),
                zip_code: "4000".into(),
            },
            payment_method: PaymentMethod { kind, last4: None },
            items: items(),
        }
    }

    #[test]
    fn test_card_quote() {
        let rules = CheckoutRules::default();
        let quote = rules.quote(&items(), PaymentKind::Card).unwrap();
        assert_eq!(quote.subtotal.minor(), 10999);
        assert_eq!(quote.shipping.minor(), 1500);
        assert_eq!(quote.tax.minor(), 880); // 8% of 109.99 = 8.7992
        assert_eq!(quote.total.minor(), 10999 + 1500 + 880);
    }

    #[test]
    fn test_hand_to_hand_has_token_shipping() {
        let rules = CheckoutRules::default();
        let quote = rules.quote(&items(), PaymentKind::HandToHand).unwrap();
        assert_eq!(quote.shipping.minor(), 1);
    }

    #[test]
    fn test_verify_accepts_cent_rounding_and_rejects_tampering() {
        let rules = CheckoutRules::default();
        let quote = rules.quote(&items(), PaymentKind::Card).unwrap();

        let mut submitted = order(quote, PaymentKind::Card);
        submitted.tax = Money::from_minor(quote.tax.minor() - 1);
        assert!(rules.verify(&submitted).is_ok());

        submitted.total = Money::from_minor(100);
        assert!(matches!(rules.verify(&submitted), Err(OrderError::TotalsMismatch)));
    }

    #[test]
    fn test_requote_after_line_edit() {
        let rules = CheckoutRules::default();
        let lines = vec![OrderItem {
            id: 1,
            order_id: 1,
            product_id: 1,
            product_name: None,
            quantity: 3,
            price: Money::from_minor(1000),
        }];
        let quote = rules.requote(&lines, Money::from_minor(1500)).unwrap();
        assert_eq!(quote.subtotal.minor(), 3000);
        assert_eq!(quote.tax.minor(), 240);
        assert_eq!(quote.total.minor(), 4740);
    }

    #[test]
    fn test_huge_quote_is_a_validation_error() {
        let rules = CheckoutRules::default();
        let lines = vec![
            NewOrderItem { product_id: 1, quantity: i32::MAX, price: Money::from_major(1e13) },
        ];
        assert!(matches!(rules.quote(&lines, PaymentKind::Card), Err(OrderError::Validation(_))));

        let stored = vec![OrderItem {
            id: 1,
            order_id: 1,
            product_id: 1,
            product_name: None,
            quantity: 2,
            price: Money::from_minor(i64::MAX / 2),
        }];
        assert!(rules.requote(&stored, Money::ZERO).is_err());
    }

    #[test]
    fn test_order_number_shape() {
        let number = generate_order_number(Utc::now());
        let parts: Vec<&str> = number.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "ORD");
        assert_eq!(parts[2].len(), 4);
    }
}
