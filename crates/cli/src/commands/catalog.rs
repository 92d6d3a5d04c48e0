//! Catalog browsing.

use community_mart_core::CategoryId;
use community_mart_storefront::error::{AppError, Result};
use community_mart_storefront::models::Product;
use community_mart_storefront::state::AppState;

/// List categories.
pub async fn categories(state: &AppState) -> Result<()> {
    for category in state.catalog().categories().await?.iter() {
        println!("{} {}  {}", category.icon, category.name, category.id);
    }
    Ok(())
}

/// List featured products.
pub async fn featured(state: &AppState) -> Result<()> {
    print_products(&state.catalog().featured_products().await?);
    Ok(())
}

/// List the products of a category given by ID or name.
pub async fn products(state: &AppState, category: &str) -> Result<()> {
    let id = match category.parse::<CategoryId>() {
        Ok(id) => id,
        Err(_) => state
            .catalog()
            .categories()
            .await?
            .iter()
            .find(|c| c.name == category)
            .map(|c| c.id)
            .ok_or_else(|| AppError::NotFound(format!("category {category}")))?,
    };
    print_products(&state.catalog().products_in_category(id).await?);
    Ok(())
}

/// List today's promotions.
pub async fn promotions(state: &AppState) -> Result<()> {
    let listings = state.catalog().todays_promotions().await?;
    if listings.is_empty() {
        println!("No promotions today");
    }
    for listing in listings {
        println!(
            "{:<20} {} (was {}, save {}) until {}  {}",
            listing.product.name,
            listing.promotion.promotion_price,
            listing.product.price,
            listing.savings(),
            listing.promotion.end_date,
            listing.product.id
        );
    }
    Ok(())
}

fn print_products(products: &[Product]) {
    if products.is_empty() {
        println!("No products");
    }
    for product in products {
        println!(
            "{:<20} {}/{}  stock {}  {}",
            product.name, product.price, product.unit, product.stock, product.id
        );
    }
}
