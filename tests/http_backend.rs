//! HTTP backend tests against a mock server.
//!
//! Run with: `cargo test --test http_backend`

use mockito::{Matcher, Server};
use serde_json::json;
use std::time::Duration;
use storefront_cart::backend::{CartBackend, HttpCartBackend};
use storefront_cart::cart::{self, CartItem, ProductId};
use storefront_cart::config::CartConfig;
use storefront_cart::cookies::{Cookie, CookieJarHandle, DefaultCookieJar};
use storefront_cart::errors::{BackendError, CartError};
use storefront_cart::events::CartEvent;
use url::Url;

// ============================================================================
// Helpers
// ============================================================================

fn config_for(server: &Server) -> CartConfig {
    CartConfig::builder()
        .api_base(format!("{}/api/", server.url()))
        .site_url("https://shop.example.com/")
        .request_timeout(Duration::from_secs(5))
        .build()
        .expect("valid test config")
}

fn backend_for(server: &Server) -> (HttpCartBackend, CookieJarHandle) {
    let jar: CookieJarHandle = DefaultCookieJar::new().into();
    let backend = HttpCartBackend::new(&config_for(server), jar.clone()).expect("client builds");
    (backend, jar)
}

fn cart_body() -> String {
    json!({
        "id": 1,
        "cart_id": "c-123",
        "items": [
            {"id": 7, "product": {"id": 1, "name": "Raptor Grip", "price": "250.00", "image": "/grip.png"}, "quantity": 2, "total_price": "500.00"}
        ],
        "total_items": 2,
        "total_price": "500.00"
    })
    .to_string()
}

// ============================================================================
// Backend client
// ============================================================================

#[tokio::test]
async fn fetch_cart_sends_ajax_headers_and_translates_items() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/api/cart/current/")
        .match_header("x-requested-with", "XMLHttpRequest")
        .match_header("content-type", "application/json")
        .match_header("x-csrftoken", Matcher::Missing)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(cart_body())
        .create_async()
        .await;

    let (backend, _jar) = backend_for(&server);
    let snapshot = backend.fetch_cart().await.unwrap();

    mock.assert_async().await;
    assert_eq!(snapshot.cart_id.as_deref(), Some("c-123"));
    let items = snapshot.items.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].id, "1");
    assert_eq!(items[0].price, 250.0);
    assert_eq!(items[0].quantity, 2);
    assert_eq!(items[0].image.as_deref(), Some("/grip.png"));
}

#[tokio::test]
async fn backend_cookies_round_trip_through_the_jar() {
    let mut server = Server::new_async().await;
    let first = server
        .mock("GET", "/api/cart/current/")
        .match_header("cookie", Matcher::Missing)
        .with_status(200)
        .with_header("set-cookie", "cart_id=c-123; Path=/; Max-Age=2592000; SameSite=Lax")
        .with_body(cart_body())
        .create_async()
        .await;

    let (backend, jar) = backend_for(&server);
    backend.fetch_cart().await.unwrap();
    first.assert_async().await;

    let api = Url::parse(&format!("{}/api/", server.url())).unwrap();
    assert_eq!(jar.read().get_cookie(&api, "cart_id").unwrap().value, "c-123");

    let second = server
        .mock("POST", "/api/cart/clear/")
        .match_header("cookie", "cart_id=c-123")
        .with_status(200)
        .with_body(json!({"message": "Cart cleared"}).to_string())
        .create_async()
        .await;

    backend.clear().await.unwrap();
    second.assert_async().await;
}

#[tokio::test]
async fn csrf_token_is_forwarded() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/api/cart/remove_item/")
        .match_header("x-csrftoken", "tok-1")
        .match_body(Matcher::Json(json!({"product_id": "3"})))
        .with_status(200)
        .with_body("{}")
        .create_async()
        .await;

    let (backend, jar) = backend_for(&server);
    let site = Url::parse("https://shop.example.com/").unwrap();
    jar.write().set_cookie(&site, Cookie::new("csrftoken", "tok-1"));

    backend.remove_item(&ProductId::normalize("3").unwrap()).await.unwrap();
    mock.assert_async().await;
}

#[tokio::test]
async fn mirror_calls_send_the_normalized_product_id() {
    let mut server = Server::new_async().await;
    let add = server
        .mock("POST", "/api/cart/add_item/")
        .match_body(Matcher::Json(json!({"product_id": "1", "quantity": 2})))
        .with_status(201)
        .with_body(json!({"cart_id": "c-9", "items": []}).to_string())
        .create_async()
        .await;
    let update = server
        .mock("POST", "/api/cart/update_item/")
        .match_body(Matcher::Json(json!({"product_id": "1", "quantity": 5})))
        .with_status(200)
        .with_body("{}")
        .create_async()
        .await;

    let (backend, _jar) = backend_for(&server);
    let id = ProductId::normalize("1-blackCherry").unwrap();

    let ack = backend.add_item(&id, 2).await.unwrap();
    assert_eq!(ack.cart_id.as_deref(), Some("c-9"));
    let ack = backend.update_item(&id, 5).await.unwrap();
    assert!(ack.cart_id.is_none());

    add.assert_async().await;
    update.assert_async().await;
}

#[tokio::test]
async fn non_json_success_bodies_still_acknowledge_mirrors() {
    let mut server = Server::new_async().await;
    let remove = server
        .mock("POST", "/api/cart/remove_item/")
        .with_status(200)
        .with_header("content-type", "text/html")
        .with_body("<p>removed</p>")
        .create_async()
        .await;
    let update = server
        .mock("POST", "/api/cart/update_item/")
        .with_status(200)
        .with_body("ok")
        .create_async()
        .await;
    let clear = server
        .mock("POST", "/api/cart/clear/")
        .with_status(204)
        .create_async()
        .await;

    let (backend, _jar) = backend_for(&server);
    let id = ProductId::normalize("1").unwrap();

    assert_eq!(backend.remove_item(&id).await.unwrap().cart_id, None);
    assert_eq!(backend.update_item(&id, 3).await.unwrap().cart_id, None);
    assert_eq!(backend.clear().await.unwrap().cart_id, None);

    remove.assert_async().await;
    update.assert_async().await;
    clear.assert_async().await;
}

#[tokio::test]
async fn error_status_carries_the_body() {
    let mut server = Server::new_async().await;
    let _m = server
        .mock("POST", "/api/cart/remove_item/")
        .with_status(404)
        .with_body("Item not in cart")
        .create_async()
        .await;

    let (backend, _jar) = backend_for(&server);
    let err = backend
        .remove_item(&ProductId::normalize("99").unwrap())
        .await
        .unwrap_err();

    match err {
        BackendError::Status { status, body } => {
            assert_eq!(status, 404);
            assert_eq!(body, "Item not in cart");
        }
        other => panic!("expected Status, got {other:?}"),
    }
}

#[tokio::test]
async fn html_instead_of_json_is_malformed() {
    let mut server = Server::new_async().await;
    let _m = server
        .mock("GET", "/api/cart/current/")
        .with_status(200)
        .with_header("content-type", "text/html")
        .with_body("<!doctype html><title>Login</title>")
        .create_async()
        .await;

    let (backend, _jar) = backend_for(&server);
    let err = backend.fetch_cart().await.unwrap_err();
    assert!(matches!(err, BackendError::MalformedResponse(_)));
}

#[tokio::test]
async fn checkout_session_returns_the_payment_url() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/api/cart/create_checkout_session/")
        .match_body(Matcher::Json(json!({
            "success_url": "https://shop.example.com/checkout-success",
            "cancel_url": "https://shop.example.com/"
        })))
        .with_status(200)
        .with_body(json!({"checkout_url": "https://checkout.stripe.com/c/pay/cs_test_1"}).to_string())
        .create_async()
        .await;

    let (backend, _jar) = backend_for(&server);
    let config = config_for(&server);
    let url = backend
        .create_checkout_session(&config.checkout_success_url(), &config.checkout_cancel_url())
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(url.as_str(), "https://checkout.stripe.com/c/pay/cs_test_1");
}

#[tokio::test]
async fn checkout_without_url_is_an_error() {
    let mut server = Server::new_async().await;
    let _m = server
        .mock("POST", "/api/cart/create_checkout_session/")
        .with_status(200)
        .with_body(json!({"session_id": "cs_1"}).to_string())
        .create_async()
        .await;

    let (backend, _jar) = backend_for(&server);
    let config = config_for(&server);
    let err = backend
        .create_checkout_session(&config.checkout_success_url(), &config.checkout_cancel_url())
        .await
        .unwrap_err();
    assert!(matches!(err, BackendError::MissingCheckoutUrl));
    assert_eq!(err.to_string(), "No checkout URL returned");
}

// ============================================================================
// Full cart against the mock server
// ============================================================================

#[tokio::test]
async fn cart_adds_mirrors_reconciles_and_checks_out() {
    let mut server = Server::new_async().await;
    let fetch = server
        .mock("GET", "/api/cart/current/")
        .with_status(200)
        .with_body(cart_body())
        .expect_at_least(2)
        .create_async()
        .await;
    let add = server
        .mock("POST", "/api/cart/add_item/")
        .match_body(Matcher::Json(json!({"product_id": "1", "quantity": 2})))
        .with_status(201)
        .with_body(json!({"cart_id": "c-123"}).to_string())
        .create_async()
        .await;
    let checkout = server
        .mock("POST", "/api/cart/create_checkout_session/")
        .with_status(200)
        .with_body(json!({"checkout_url": "https://checkout.stripe.com/c/pay/cs_test_2"}).to_string())
        .create_async()
        .await;

    let config = config_for(&server);
    let (handle, _worker) = cart::start(&config, DefaultCookieJar::new().into()).unwrap();
    let mut events = handle.subscribe();

    handle
        .add_item(CartItem::new("1-blackCherry", "Raptor Grip", 250.0, 2))
        .await
        .unwrap();

    // wait for the reconcile that follows the add; the local composite id is
    // replaced by the backend's numeric one
    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            if let Ok(CartEvent::Synced { cart_id }) = events.recv().await {
                let items = handle.snapshot().await.unwrap().items;
                if !items.is_empty() && items.iter().all(|i| i.id == "1") {
                    assert_eq!(cart_id.as_deref(), Some("c-123"));
                    break;
                }
            }
        }
    })
    .await
    .expect("cart never synced");

    let state = handle.snapshot().await.unwrap();
    assert_eq!(state.total_items(), 2);
    assert_eq!(state.total_price(), 500.0);

    let url = handle.checkout().await.unwrap();
    assert_eq!(url.host_str(), Some("checkout.stripe.com"));

    add.assert_async().await;
    fetch.assert_async().await;
    checkout.assert_async().await;

    handle.shutdown().await.unwrap();
    assert!(matches!(handle.snapshot().await, Err(CartError::WorkerGone)));
}
