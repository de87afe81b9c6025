//! HTTP layer: request DTOs, validation, and routing to services.

pub mod carts;
pub mod common;
pub mod orders;
pub mod payment_webhooks;
pub mod products;

use std::sync::Arc;

use crate::services::{CartService, CatalogService, CheckoutService};

/// Shared service handles, cloned into every request via `AppState`.
#[derive(Clone)]
pub struct AppServices {
    pub catalog: Arc<CatalogService>,
    pub cart: Arc<CartService>,
    pub checkout: Arc<CheckoutService>,
}

impl AppServices {
    pub fn new(
        catalog: CatalogService,
        cart: CartService,
        checkout: CheckoutService,
    ) -> Self {
        Self {
            catalog: Arc::new(catalog),
            cart: Arc::new(cart),
            checkout: Arc::new(checkout),
        }
    }
}
