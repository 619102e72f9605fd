//! Walks a shopper through the cart: add, adjust, persist, check out.
//!
//! ```text
//! RUST_LOG=debug cargo run --example checkout_flow
//! CART_API_BASE=http://localhost:8000/api/ cargo run --example checkout_flow
//! ```
//!
//! Without `CART_API_BASE` the cart runs offline and checkout is refused.
//! Cookies are kept in a JSON file in the temp directory, so a second run
//! starts from the cart the first run left behind.

use std::sync::Arc;

use storefront_cart::backend::HttpCartBackend;
use storefront_cart::cart::{CartItem, CartWorker, ModelType};
use storefront_cart::config::CartConfig;
use storefront_cart::cookies::{CookieStore, JsonCookieStore, ProfileId};
use storefront_cart::events::CartEvent;
use storefront_cart::persistence::CartPersistence;
use storefront_cart::CartError;
use uuid::Uuid;

// fixed so reruns find the same jar
const DEMO_PROFILE: Uuid = Uuid::from_u128(0x5ca1ab1e_0000_4000_8000_000000000001);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let api_base = std::env::var("CART_API_BASE").ok();
    let mut builder = CartConfig::builder()
        .site_url("http://localhost:3000/")
        .backend_enabled(api_base.is_some());
    if let Some(api_base) = api_base {
        builder = builder.api_base(api_base);
    }
    let config = builder.build()?;

    let store = JsonCookieStore::new(std::env::temp_dir().join("storefront-cart-demo.json"))?;
    let jar = store
        .jar_for(ProfileId::from(DEMO_PROFILE))
        .ok_or_else(|| anyhow::anyhow!("cookie store did not provide a jar"))?;

    let backend = Arc::new(HttpCartBackend::new(&config, jar.clone())?);
    let (cart, worker) = CartWorker::spawn(&config, CartPersistence::new(jar, &config), backend);

    let mut events = cart.subscribe();
    let printer = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                CartEvent::CheckoutRedirect { url } => println!("-> redirect shopper to {url}"),
                other => println!("   event: {other}"),
            }
        }
    });

    let before = cart.snapshot().await?;
    println!("restored cart: {} item(s), ${:.2}", before.total_items(), before.total_price());

    cart.add_item(
        CartItem::new("1-blackCherry", "Raptor Grip", 250.0, 1)
            .with_variant("Black Cherry")
            .with_model_type(ModelType::Grip),
    )
    .await?;
    cart.add_item(CartItem::new("2", "Raptor Throttle", 300.0, 1).with_model_type(ModelType::Throttle))
        .await?;
    cart.update_quantity("2", 2).await?;
    cart.close().await?;

    let state = cart.snapshot().await?;
    println!("cart now: {} item(s), ${:.2}", state.total_items(), state.total_price());
    for item in &state.items {
        println!("  {} x{} @ ${:.2}", item.name, item.quantity, item.price);
    }

    match cart.checkout().await {
        Ok(url) => println!("checkout ready at {url}"),
        Err(CartError::BackendDisabled) => println!("checkout unavailable offline (set CART_API_BASE)"),
        Err(e) => println!("checkout failed: {e}"),
    }

    cart.shutdown().await?;
    worker.await?;
    printer.abort();
    store.persist_all();
    Ok(())
}
