pub mod models;
pub mod lifecycle;
pub mod checkout;

pub use models::{Order, OrderItem, OrderStatus, NewOrder, NewOrderItem, PaymentKind, PaymentMethod, ShippingAddress};
pub use lifecycle::{transition, OrderError, StatusChange};
pub use checkout::{generate_order_number, CheckoutRules, Quote};
