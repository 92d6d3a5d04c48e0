//! Login, logout and whoami.

use community_mart_storefront::error::Result;
use community_mart_storefront::state::AppState;

/// Log in, creating the identity on first use.
pub async fn login(state: &mut AppState, phone: &str, name: &str) -> Result<()> {
    let identity = state.login(phone, name).await?;
    println!(
        "Logged in as {} ({})",
        identity.display_name(),
        identity.phone.masked()
    );
    println!("Cart: {} item(s)", state.cart().total_items());
    Ok(())
}

/// Forget the saved session.
pub async fn logout(state: &mut AppState) {
    state.logout().await;
    println!("Logged out");
}

/// Print the restored identity, if any.
pub fn whoami(state: &AppState) {
    match state.identity() {
        Some(identity) => println!(
            "{} ({}) id={}",
            identity.display_name(),
            identity.phone.masked(),
            identity.id
        ),
        None => println!("Not logged in"),
    }
}
