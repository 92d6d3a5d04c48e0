//! Order repository: `orders` and `order_items`.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use tracing::instrument;

use community_mart_core::{
    AddressId, OrderId, OrderItemId, OrderStatus, PaymentStatus, Price, ProfileId,
};

use super::{AddressRepository, distinct};
use crate::models::{NewOrderItem, Order, OrderDetails, OrderFilter, OrderItem};
use crate::store::{BackendError, DataStore, Query, decode_row, decode_rows, tables};

/// Repository for orders and their lines.
pub struct OrderRepository<'a> {
    store: &'a dyn DataStore,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(store: &'a dyn DataStore) -> Self {
        Self { store }
    }

    /// Insert a pending, unpaid order row.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` if the insert fails.
    #[instrument(skip(self))]
    pub async fn insert_order(
        &self,
        user_id: ProfileId,
        address_id: AddressId,
        total_amount: Price,
        placed_at: DateTime<Utc>,
    ) -> Result<Order, BackendError> {
        let row = json!({
            "id": OrderId::generate(),
            "order_number": Order::number_for(placed_at),
            "user_id": user_id,
            "address_id": address_id,
            "total_amount": total_amount,
            "status": OrderStatus::Pending,
            "payment_status": PaymentStatus::Unpaid,
        });
        let inserted = self.store.insert(tables::ORDERS, row).await?;
        decode_row(tables::ORDERS, inserted)
    }

    /// Insert all lines of an order in one request.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` if the insert fails.
    #[instrument(skip(self, items), fields(items = items.len()))]
    pub async fn insert_items(
        &self,
        order_id: OrderId,
        items: &[NewOrderItem],
    ) -> Result<Vec<OrderItem>, BackendError> {
        let rows: Vec<Value> = items
            .iter()
            .map(|item| {
                json!({
                    "id": OrderItemId::generate(),
                    "order_id": order_id,
                    "product_id": item.product_id,
                    "product_name": item.product_name,
                    "product_price": item.product_price,
                    "quantity": item.quantity,
                    "subtotal": item.subtotal,
                })
            })
            .collect();

        let inserted = self.store.insert_many(tables::ORDER_ITEMS, rows).await?;
        decode_rows(tables::ORDER_ITEMS, inserted)
    }

    /// Delete an order row.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` if the delete fails.
    #[instrument(skip(self))]
    pub async fn delete_order(&self, id: OrderId) -> Result<(), BackendError> {
        self.store.delete(tables::ORDERS, id.as_uuid()).await
    }

    /// A user's orders, newest first, each with its address and lines.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` if a query fails or a row is malformed.
    #[instrument(skip(self))]
    pub async fn list(
        &self,
        user_id: ProfileId,
        filter: OrderFilter,
    ) -> Result<Vec<OrderDetails>, BackendError> {
        let mut query = Query::new().eq("user_id", user_id);
        if let OrderFilter::Status(status) = filter {
            query = query.eq("status", status);
        }
        let query = query.order_desc("created_at");

        let orders: Vec<Order> =
            decode_rows(tables::ORDERS, self.store.select(tables::ORDERS, &query).await?)?;
        if orders.is_empty() {
            return Ok(Vec::new());
        }

        let order_ids = distinct(&orders, |o| o.id);
        let items: Vec<OrderItem> = decode_rows(
            tables::ORDER_ITEMS,
            self.store
                .select(
                    tables::ORDER_ITEMS,
                    &Query::new().is_in("order_id", &order_ids).order_asc("created_at"),
                )
                .await?,
        )?;
        let mut items_by_order: HashMap<OrderId, Vec<OrderItem>> = HashMap::new();
        for item in items {
            items_by_order.entry(item.order_id).or_default().push(item);
        }

        let address_ids = distinct(&orders, |o| o.address_id);
        let addresses: HashMap<AddressId, _> = AddressRepository::new(self.store)
            .by_ids(&address_ids)
            .await?
            .into_iter()
            .map(|a| (a.id, a))
            .collect();

        Ok(orders
            .into_iter()
            .filter(|order| filter.matches(order))
            .map(|order| OrderDetails {
                address: addresses.get(&order.address_id).cloned(),
                items: items_by_order.remove(&order.id).unwrap_or_default(),
                order,
            })
            .collect())
    }
}
