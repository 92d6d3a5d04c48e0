//! Orders and order lines.
//!
//! Orders are write-once snapshots of a cart: each line freezes the product
//! name, unit price and subtotal at the moment of checkout.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use community_mart_core::{
    AddressId, OrderId, OrderItemId, OrderStatus, PaymentMethod, PaymentStatus, Price, ProductId,
    ProfileId,
};

use super::address::Address;

/// An `orders` row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    /// Human-facing number, `ORD` followed by the Unix time in milliseconds.
    pub order_number: String,
    pub user_id: ProfileId,
    pub address_id: AddressId,
    pub total_amount: Price,
    #[serde(default)]
    pub status: OrderStatus,
    #[serde(default)]
    pub payment_method: Option<PaymentMethod>,
    #[serde(default)]
    pub payment_status: PaymentStatus,
    #[serde(default)]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// Order number for an order placed at `placed_at`.
    #[must_use]
    pub fn number_for(placed_at: DateTime<Utc>) -> String {
        format!("ORD{}", placed_at.timestamp_millis())
    }
}

/// An `order_items` row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub product_name: String,
    pub product_price: Price,
    pub quantity: i32,
    pub subtotal: Price,
    pub created_at: DateTime<Utc>,
}

/// An order line about to be written, before it has an order to belong to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewOrderItem {
    pub product_id: ProductId,
    pub product_name: String,
    pub product_price: Price,
    pub quantity: i32,
    pub subtotal: Price,
}

/// An order with its shipping address and lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderDetails {
    pub order: Order,
    /// `None` if the address has since been deleted.
    pub address: Option<Address>,
    pub items: Vec<OrderItem>,
}

impl OrderDetails {
    /// Total number of units across all lines.
    #[must_use]
    pub fn item_count(&self) -> i32 {
        self.items.iter().map(|item| item.quantity).sum()
    }
}

/// Which orders to list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrderFilter {
    #[default]
    All,
    Status(OrderStatus),
}

impl OrderFilter {
    /// Whether `order` passes the filter.
    #[must_use]
    pub fn matches(&self, order: &Order) -> bool {
        match self {
            Self::All => true,
            Self::Status(status) => order.status == *status,
        }
    }
}

impl std::str::FromStr for OrderFilter {
    type Err = community_mart_core::UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "all" {
            Ok(Self::All)
        } else {
            s.parse().map(Self::Status)
        }
    }
}
