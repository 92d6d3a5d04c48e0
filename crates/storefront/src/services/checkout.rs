//! Checkout: turning the cart view into an order.
//!
//! No payment happens here. An order is recorded as `pending` / `unpaid`
//! with every line's price frozen at the effective unit price of the day.
//! The order row and its lines are two writes with no transaction around
//! them; if the lines fail, the order row is deleted again on a best-effort
//! basis. The cart itself is left untouched.

use chrono::Utc;
use tracing::{error, info, instrument};

use community_mart_core::AddressId;

use super::cart::CartReconciler;
use crate::db::addresses::default_for;
use crate::db::{AddressRepository, OrderRepository};
use crate::error::{AppError, Result, add_breadcrumb};
use crate::models::{Address, Identity, NewOrderItem, OrderDetails};
use crate::store::DataStore;

/// Places orders from a cart view.
pub struct Checkout<'a> {
    store: &'a dyn DataStore,
}

impl<'a> Checkout<'a> {
    /// Create a checkout over a data store.
    #[must_use]
    pub const fn new(store: &'a dyn DataStore) -> Self {
        Self { store }
    }

    /// Record an order for everything in `cart`, shipped to `address_id` or,
    /// when `None`, to the user's default address.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Unauthorized` if `cart` belongs to someone else,
    /// `AppError::Validation` if the cart is empty or there is no usable
    /// address, or `AppError::Backend` if a write fails.
    #[instrument(skip(self, user, cart), fields(user_id = %user.id))]
    pub async fn place_order(
        &self,
        user: &Identity,
        cart: &CartReconciler,
        address_id: Option<AddressId>,
    ) -> Result<OrderDetails> {
        if cart.user_id() != Some(user.id) {
            return Err(AppError::Unauthorized(
                "cart does not belong to the logged-in user".to_string(),
            ));
        }
        if cart.is_empty() {
            return Err(AppError::Validation("cart is empty".to_string()));
        }

        let address = self.shipping_address(user, address_id).await?;

        let today = Utc::now().date_naive();
        let items: Vec<NewOrderItem> = cart
            .lines()
            .iter()
            .map(|line| NewOrderItem {
                product_id: line.product_id,
                product_name: line.snapshot.product.name.clone(),
                product_price: line.unit_price(today),
                quantity: line.quantity,
                subtotal: line.subtotal(today),
            })
            .collect();
        let total = cart.total_price_on(today);

        let orders = OrderRepository::new(self.store);
        let order = orders
            .insert_order(user.id, address.id, total, Utc::now())
            .await?;

        let items = match orders.insert_items(order.id, &items).await {
            Ok(items) => items,
            Err(e) => {
                error!(order_id = %order.id, error = %e, "Order lines failed; removing order");
                if let Err(cleanup) = orders.delete_order(order.id).await {
                    error!(
                        order_id = %order.id,
                        error = %cleanup,
                        "Failed to remove order without lines"
                    );
                }
                return Err(e.into());
            }
        };

        add_breadcrumb(
            "checkout",
            "Order placed",
            Some(&[("order_number", order.order_number.as_str())]),
        );
        info!(
            order_number = %order.order_number,
            total = %order.total_amount,
            lines = items.len(),
            "Order placed"
        );

        Ok(OrderDetails {
            order,
            address: Some(address),
            items,
        })
    }

    async fn shipping_address(
        &self,
        user: &Identity,
        address_id: Option<AddressId>,
    ) -> Result<Address> {
        let addresses = AddressRepository::new(self.store);
        match address_id {
            Some(id) => addresses
                .get(user.id, id)
                .await?
                .ok_or_else(|| AppError::Validation(format!("address {id} not found"))),
            None => {
                let all = addresses.list(user.id).await?;
                default_for(&all)
                    .cloned()
                    .ok_or_else(|| AppError::Validation("add a shipping address first".to_string()))
            }
        }
    }
}
