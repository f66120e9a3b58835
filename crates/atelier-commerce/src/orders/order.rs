//! Order types.

use crate::error::CommerceError;
use crate::ids::RecordId;
use crate::money::{Currency, Money};
use crate::orders::Address;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Order status.
///
/// Any status may be set from any other; the back-office is trusted to
/// move orders sensibly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    /// Order placed, awaiting processing.
    #[default]
    Pending,
    /// Order being prepared.
    Processing,
    /// Order shipped.
    Shipped,
    /// Order delivered.
    Delivered,
    /// Order cancelled.
    Cancelled,
    /// Order refunded.
    Refunded,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 6] = [
        OrderStatus::Pending,
        OrderStatus::Processing,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
        OrderStatus::Refunded,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Refunded => "refunded",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "Pending",
            OrderStatus::Processing => "Processing",
            OrderStatus::Shipped => "Shipped",
            OrderStatus::Delivered => "Delivered",
            OrderStatus::Cancelled => "Cancelled",
            OrderStatus::Refunded => "Refunded",
        }
    }

    /// Check if order is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Delivered | OrderStatus::Cancelled | OrderStatus::Refunded
        )
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = CommerceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| CommerceError::UnknownOrderStatus(s.to_string()))
    }
}

/// A customer order as seen by the back-office.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
    /// Unique order identifier.
    pub id: RecordId,
    /// Human-readable order number (e.g., "ORD-1700000000000").
    pub order_number: String,
    pub customer_name: String,
    pub customer_email: String,
    pub shipping_address: Address,
    /// Line items, snapshotted at purchase time.
    pub items: Vec<OrderLineItem>,
    pub subtotal: Money,
    pub tax: Money,
    pub shipping: Money,
    pub total: Money,
    /// Current status.
    pub status: OrderStatus,
    /// Carrier tracking number, once shipped.
    pub tracking_number: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Order {
    pub fn from_draft(id: RecordId, draft: OrderDraft, now: i64) -> Self {
        let order_number = draft
            .order_number
            .unwrap_or_else(|| generate_order_number(now));
        Self {
            id,
            order_number,
            customer_name: draft.customer_name,
            customer_email: draft.customer_email,
            shipping_address: draft.shipping_address,
            items: draft.items,
            subtotal: draft.subtotal,
            tax: draft.tax,
            shipping: draft.shipping,
            total: draft.total,
            status: draft.status,
            tracking_number: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Get total item count.
    pub fn item_count(&self) -> u32 {
        self.items.iter().map(|i| i.quantity).sum()
    }

    /// Set status and optionally a tracking number, stamping `updated_at`.
    ///
    /// A `None` tracking number leaves any existing one in place.
    pub fn set_status(&mut self, status: OrderStatus, tracking_number: Option<String>, now: i64) {
        self.status = status;
        if tracking_number.is_some() {
            self.tracking_number = tracking_number;
        }
        self.updated_at = now;
    }
}

/// Generate an order number from a millisecond timestamp.
pub fn generate_order_number(now_millis: i64) -> String {
    format!("ORD-{now_millis}")
}

/// A line item in an order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderLineItem {
    /// Product the line was bought from, if it still exists.
    pub product_id: Option<RecordId>,
    /// Product name at time of order.
    pub name: String,
    pub size: Option<String>,
    pub color: Option<String>,
    /// Unit price at time of order.
    pub unit_price: Money,
    /// Quantity ordered.
    pub quantity: u32,
}

impl OrderLineItem {
    /// Unit price times quantity.
    pub fn line_total(&self) -> Money {
        self.unit_price.times(self.quantity)
    }
}

/// Fields for a new order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct OrderDraft {
    /// Generated from the clock when absent.
    pub order_number: Option<String>,
    pub customer_name: String,
    pub customer_email: String,
    pub shipping_address: Address,
    pub items: Vec<OrderLineItem>,
    pub subtotal: Money,
    pub tax: Money,
    pub shipping: Money,
    pub total: Money,
    pub status: OrderStatus,
}

impl OrderDraft {
    pub fn new(customer_name: impl Into<String>, customer_email: impl Into<String>) -> Self {
        Self {
            customer_name: customer_name.into(),
            customer_email: customer_email.into(),
            ..Default::default()
        }
    }

    /// Append a line and recompute subtotal and total from the lines.
    ///
    /// Tax and shipping are left as set by the caller.
    pub fn with_item(mut self, item: OrderLineItem) -> Self {
        self.items.push(item);
        let currency = self.items.first().map(|i| i.unit_price.currency).unwrap_or(Currency::GBP);
        self.subtotal = self
            .items
            .iter()
            .fold(Money::zero(currency), |acc, i| acc.try_add(&i.line_total()).unwrap_or(acc));
        self.total = [self.tax, self.shipping]
            .iter()
            .fold(self.subtotal, |acc, m| acc.try_add(m).unwrap_or(acc));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(price: i64, qty: u32) -> OrderLineItem {
        OrderLineItem {
            product_id: Some(RecordId::confirmed("p1")),
            name: "Silk Scarf".into(),
            size: None,
            color: Some("Ivory".into()),
            unit_price: Money::gbp(price),
            quantity: qty,
        }
    }

    #[test]
    fn test_status_roundtrip_strings() {
        for status in OrderStatus::ALL {
            assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), status);
        }
        assert!("lost".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn test_any_transition_allowed() {
        let mut order = Order::from_draft(RecordId::confirmed("o1"), OrderDraft::new("Jo", "jo@example.com"), 10);
        order.set_status(OrderStatus::Delivered, None, 20);
        order.set_status(OrderStatus::Pending, Some("RM123".into()), 30);
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.tracking_number.as_deref(), Some("RM123"));
        assert_eq!(order.updated_at, 30);

        order.set_status(OrderStatus::Shipped, None, 40);
        assert_eq!(order.tracking_number.as_deref(), Some("RM123"));
    }

    #[test]
    fn test_order_number_generated() {
        let order = Order::from_draft(RecordId::confirmed("o1"), OrderDraft::default(), 1234);
        assert_eq!(order.order_number, "ORD-1234");
    }

    #[test]
    fn test_draft_totals() {
        let mut draft = OrderDraft::new("Jo", "jo@example.com");
        draft.shipping = Money::gbp(499);
        let draft = draft.with_item(line(2500, 2)).with_item(line(1000, 1));
        assert_eq!(draft.subtotal, Money::gbp(6000));
        assert_eq!(draft.total, Money::gbp(6499));

        let order = Order::from_draft(RecordId::confirmed("o1"), draft, 0);
        assert_eq!(order.item_count(), 3);
    }
}
