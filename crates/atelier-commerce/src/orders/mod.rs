//! Orders as managed from the back-office.

mod address;
mod order;

pub use address::Address;
pub use order::{generate_order_number, Order, OrderDraft, OrderLineItem, OrderStatus};
