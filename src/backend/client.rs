use crate::backend::wire::{
    AddItemRequest, CartResponse, CheckoutRequest, CheckoutResponse, MirrorResponse, RemoveItemRequest,
    UpdateItemRequest,
};
use crate::backend::{CartBackend, CartSnapshot, MirrorAck};
use crate::cart::item::{CartItem, ProductId};
use crate::config::CartConfig;
use crate::cookies::CookieJarHandle;
use crate::errors::BackendError;
use crate::net::{fetch, FetchOptions, Response};
use crate::persistence::CartPersistence;
use async_trait::async_trait;
use reqwest::Method;
use serde::Serialize;
use std::time::Duration;
use url::Url;

/// [`CartBackend`] over HTTP.
///
/// Every request carries the jar's cookies for the API origin and the CSRF
/// token, and every response's `Set-Cookie` headers land back in the jar.
pub struct HttpCartBackend {
    client: reqwest::Client,
    api_base: Url,
    jar: CookieJarHandle,
    persistence: CartPersistence,
    timeout: Option<Duration>,
}

impl HttpCartBackend {
    pub fn new(config: &CartConfig, jar: CookieJarHandle) -> Result<Self, BackendError> {
        let mut builder = reqwest::Client::builder();
        if let Some(ua) = &config.user_agent {
            builder = builder.user_agent(ua.clone());
        }

        Ok(Self {
            client: builder.build()?,
            api_base: config.api_base.clone(),
            persistence: CartPersistence::new(jar.clone(), config),
            jar,
            timeout: config.request_timeout,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, BackendError> {
        Ok(self.api_base.join(path)?)
    }

    async fn send<B: Serialize + Sync>(&self, method: Method, path: &str, body: Option<&B>) -> Result<Response, BackendError> {
        let url = self.endpoint(path)?;
        let json = body
            .map(serde_json::to_value)
            .transpose()
            .map_err(|e| BackendError::MalformedResponse(e.to_string()))?;

        let opts = FetchOptions {
            jar: Some(&self.jar),
            csrf_token: self.persistence.read_csrf_token(&self.api_base),
            timeout: self.timeout,
            json,
        };

        let response = fetch(&self.client, method, url, opts).await?;
        response.error_for_status()
    }

    /// Posts a mirror call. Only a successful status is required; the body
    /// is left to callers that need something from it.
    async fn mirror<B: Serialize + Sync>(&self, path: &str, body: Option<&B>) -> Result<Response, BackendError> {
        self.send(Method::POST, path, body).await
    }
}

#[async_trait]
impl CartBackend for HttpCartBackend {
    async fn fetch_cart(&self) -> Result<CartSnapshot, BackendError> {
        let response = self.send::<()>(Method::GET, "cart/current/", None).await?;
        let cart: CartResponse = response.json()?;

        Ok(CartSnapshot {
            cart_id: cart.cart_id,
            items: cart
                .items
                .map(|items| items.into_iter().map(CartItem::from).collect()),
        })
    }

    async fn add_item(&self, product_id: &ProductId, quantity: u32) -> Result<MirrorAck, BackendError> {
        let body = AddItemRequest {
            product_id: product_id.as_str(),
            quantity,
        };
        let response = self.mirror("cart/add_item/", Some(&body)).await?;

        // the add response is where a new cart's id first shows up
        let ack: Option<MirrorResponse> = response.json()?;
        Ok(MirrorAck {
            cart_id: ack.and_then(|a| a.cart_id),
        })
    }

    async fn remove_item(&self, product_id: &ProductId) -> Result<MirrorAck, BackendError> {
        let body = RemoveItemRequest {
            product_id: product_id.as_str(),
        };
        self.mirror("cart/remove_item/", Some(&body)).await?;
        Ok(MirrorAck::default())
    }

    async fn update_item(&self, product_id: &ProductId, quantity: u32) -> Result<MirrorAck, BackendError> {
        let body = UpdateItemRequest {
            product_id: product_id.as_str(),
            quantity,
        };
        self.mirror("cart/update_item/", Some(&body)).await?;
        Ok(MirrorAck::default())
    }

    async fn clear(&self) -> Result<MirrorAck, BackendError> {
        self.mirror::<()>("cart/clear/", None).await?;
        Ok(MirrorAck::default())
    }

    async fn create_checkout_session(&self, success_url: &Url, cancel_url: &Url) -> Result<Url, BackendError> {
        let body = CheckoutRequest {
            success_url: success_url.as_str(),
            cancel_url: cancel_url.as_str(),
        };
        let response = self
            .send(Method::POST, "cart/create_checkout_session/", Some(&body))
            .await?;

        let checkout: CheckoutResponse = response.json()?;
        let url = checkout
            .checkout_url
            .filter(|u| !u.is_empty())
            .ok_or(BackendError::MissingCheckoutUrl)?;

        log::info!("[cart] checkout session created");
        Ok(Url::parse(&url)?)
    }
}
