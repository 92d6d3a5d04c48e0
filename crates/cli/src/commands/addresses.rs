//! Shipping address commands.

use community_mart_core::AddressId;
use community_mart_storefront::error::Result;
use community_mart_storefront::models::{Address, NewAddress};
use community_mart_storefront::state::AppState;

/// List addresses, default first.
pub async fn list(state: &AppState) -> Result<()> {
    let addresses = state.addresses().await?;
    if addresses.is_empty() {
        println!("No addresses");
    }
    for address in &addresses {
        print_address(address);
    }
    Ok(())
}

/// Save a new address.
pub async fn add(state: &AppState, address: &NewAddress) -> Result<()> {
    let saved = state.add_address(address).await?;
    print_address(&saved);
    Ok(())
}

/// Make an address the default.
pub async fn set_default(state: &AppState, id: AddressId) -> Result<()> {
    let updated = state.set_default_address(id).await?;
    print_address(&updated);
    Ok(())
}

/// Delete an address.
pub async fn delete(state: &AppState, id: AddressId) -> Result<()> {
    state.delete_address(id).await?;
    println!("Deleted {id}");
    Ok(())
}

fn print_address(address: &Address) {
    let marker = if address.is_default { "*" } else { " " };
    println!(
        "{marker} {} {}  {}  {}",
        address.recipient_name,
        address.phone,
        address.full_address(),
        address.id
    );
}
