//! Cart commands.

use chrono::Utc;

use community_mart_core::{CartItemId, ProductId};
use community_mart_storefront::error::Result;
use community_mart_storefront::state::AppState;

/// Print the cart view.
pub fn show(state: &AppState) -> Result<()> {
    state.require_identity()?;
    let cart = state.cart();
    if cart.is_empty() {
        println!("Cart is empty");
        return Ok(());
    }

    let today = Utc::now().date_naive();
    for line in cart.lines() {
        let promo = if line.snapshot.promotion.is_some() {
            " (promo)"
        } else {
            ""
        };
        println!(
            "{:<20} {} × {}{} = {}  {}",
            line.snapshot.product.name,
            line.unit_price(today),
            line.quantity,
            promo,
            line.subtotal(today),
            line.id
        );
    }
    println!("{} item(s), total {}", cart.total_items(), cart.total_price());
    Ok(())
}

/// Add a product to the cart.
pub async fn add(state: &mut AppState, product: ProductId, quantity: i32) -> Result<()> {
    state.require_identity()?;
    state.cart_mut().add(product, quantity).await?;
    show(state)
}

/// Change a line's quantity; 0 removes it.
pub async fn set(state: &mut AppState, line: CartItemId, quantity: i32) -> Result<()> {
    state.cart_mut().set_quantity(line, quantity).await?;
    show(state)
}
