//! Checkout and order history.

use community_mart_core::AddressId;
use community_mart_storefront::error::Result;
use community_mart_storefront::models::{OrderDetails, OrderFilter};
use community_mart_storefront::state::AppState;

/// Place an order for the cart.
pub async fn checkout(state: &AppState, address: Option<AddressId>) -> Result<()> {
    let placed = state.checkout(address).await?;
    println!("Order placed, awaiting payment");
    print_order(&placed);
    Ok(())
}

/// List orders, newest first.
pub async fn list(state: &AppState, filter: OrderFilter) -> Result<()> {
    let orders = state.orders(filter).await?;
    if orders.is_empty() {
        println!("No orders");
    }
    for details in &orders {
        print_order(details);
    }
    Ok(())
}

fn print_order(details: &OrderDetails) {
    let order = &details.order;
    println!(
        "{}  {}  {}  {}/{}  {} item(s)",
        order.order_number,
        order.created_at.format("%Y-%m-%d %H:%M"),
        order.total_amount,
        order.status.as_str(),
        order.payment_status.as_str(),
        details.item_count()
    );
    match &details.address {
        Some(address) => println!("  to {} {}", address.recipient_name, address.full_address()),
        None => println!("  to (address deleted)"),
    }
    for item in &details.items {
        println!(
            "  {:<20} {} × {} = {}",
            item.product_name, item.product_price, item.quantity, item.subtotal
        );
    }
}
