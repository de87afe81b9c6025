//! Business logic, one service per aggregate. Handlers stay thin and
//! delegate here; services own transactions and emit domain events after
//! their writes commit.

pub mod cart;
pub mod catalog;
pub mod checkout;

pub use cart::CartService;
pub use catalog::CatalogService;
pub use checkout::CheckoutService;
