//! The visitor's cart.
//!
//! The cart lives in the visitor's session as a JSON list of
//! [`CartItem`]s. [`CartStore`] is the only writer: every mutation saves
//! the whole list first, then replaces its in-memory copy, then announces
//! the change on [`CartEvents`]. A failed save leaves both copies as they
//! were.
//!
//! There is no locking across tabs or requests. Two concurrent writers
//! both succeed and the later save wins.

mod events;

pub use events::{CartChanged, CartEvents, CartNotifier};

use std::collections::HashSet;
use std::future::Future;

use thiserror::Error;
use tower_sessions::Session;
use tracing::instrument;

use thriftshop_core::{Price, ProductId};

use crate::backend::{CartItem, Product};
use crate::models::session_keys;

/// Errors from reading or writing the cart.
#[derive(Debug, Error)]
pub enum CartError {
    /// The session store failed.
    #[error("session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// Any other storage failure.
    #[error("cart storage error: {0}")]
    Storage(String),
}

/// Where the cart list is persisted.
pub trait CartStorage: Send + Sync {
    /// Read the stored list. A missing list is an empty cart.
    fn load(&self) -> impl Future<Output = Result<Vec<CartItem>, CartError>> + Send;

    /// Replace the stored list.
    fn save(&self, items: &[CartItem]) -> impl Future<Output = Result<(), CartError>> + Send;
}

impl CartStorage for Session {
    async fn load(&self) -> Result<Vec<CartItem>, CartError> {
        Ok(self
            .get::<Vec<CartItem>>(session_keys::CART)
            .await?
            .unwrap_or_default())
    }

    async fn save(&self, items: &[CartItem]) -> Result<(), CartError> {
        self.insert(session_keys::CART, items).await?;
        Ok(())
    }
}

/// Totals over the checked subset of the cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartSelection {
    /// Selected items, in cart order.
    pub items: Vec<CartItem>,
    /// Σ price × quantity.
    pub subtotal: Price,
    /// Σ weight × quantity in grams, 1000 g per unit when unknown.
    pub weight_grams: u64,
}

impl CartSelection {
    /// Whether nothing is selected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Ids of the selected items.
    #[must_use]
    pub fn ids(&self) -> Vec<ProductId> {
        self.items.iter().map(|i| i.product.id.clone()).collect()
    }
}

/// The visitor's cart, backed by `S`.
#[derive(Debug)]
pub struct CartStore<S> {
    storage: S,
    items: Vec<CartItem>,
    notifier: Option<CartNotifier>,
}

impl<S: CartStorage> CartStore<S> {
    /// Read the cart from storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage cannot be read.
    pub async fn load(storage: S, notifier: Option<CartNotifier>) -> Result<Self, CartError> {
        let items = storage.load().await?;
        Ok(Self {
            storage,
            items,
            notifier,
        })
    }

    /// Current items, in the order they were added.
    #[must_use]
    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    /// Whether the cart has no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Σ quantity, shown on the navbar badge.
    #[must_use]
    pub fn count(&self) -> u32 {
        self.items.iter().map(|i| i.quantity).sum()
    }

    /// Whether `id` is in the cart.
    #[must_use]
    pub fn contains(&self, id: &ProductId) -> bool {
        self.items.iter().any(|i| &i.product.id == id)
    }

    /// Persist `next`, then adopt it and announce the change.
    async fn commit(&mut self, next: Vec<CartItem>) -> Result<(), CartError> {
        self.storage.save(&next).await?;
        self.items = next;
        if let Some(notifier) = &self.notifier {
            notifier.notify(self.count());
        }
        Ok(())
    }

    /// Add one unit of `product`.
    ///
    /// # Errors
    ///
    /// Returns an error if the cart cannot be saved.
    #[instrument(skip(self, product), fields(product_id = %product.id))]
    pub async fn add(&mut self, product: Product) -> Result<(), CartError> {
        let mut next = self.items.clone();
        if let Some(existing) = next.iter_mut().find(|i| i.product.id == product.id) {
            existing.quantity = existing.quantity.saturating_add(1);
        } else {
            next.push(CartItem::new(product));
        }
        self.commit(next).await
    }

    /// Change the quantity of `id` by `delta`, never going below 1.
    ///
    /// Unknown ids leave the cart unchanged.
    ///
    /// # Errors
    ///
    /// Returns an error if the cart cannot be saved.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn change_quantity(&mut self, id: &ProductId, delta: i32) -> Result<(), CartError> {
        let mut next = self.items.clone();
        let Some(item) = next.iter_mut().find(|i| &i.product.id == id) else {
            return Ok(());
        };
        let updated = i64::from(item.quantity) + i64::from(delta);
        item.quantity = u32::try_from(updated.max(1)).unwrap_or(u32::MAX);
        self.commit(next).await
    }

    /// Remove `id` entirely.
    ///
    /// # Errors
    ///
    /// Returns an error if the cart cannot be saved.
    pub async fn remove(&mut self, id: &ProductId) -> Result<(), CartError> {
        self.remove_many(std::slice::from_ref(id)).await
    }

    /// Remove every listed id. Other items keep their quantities.
    ///
    /// # Errors
    ///
    /// Returns an error if the cart cannot be saved.
    #[instrument(skip(self, ids), fields(count = ids.len()))]
    pub async fn remove_many(&mut self, ids: &[ProductId]) -> Result<(), CartError> {
        let drop: HashSet<&ProductId> = ids.iter().collect();
        let next = self
            .items
            .iter()
            .filter(|i| !drop.contains(&i.product.id))
            .cloned()
            .collect();
        self.commit(next).await
    }

    /// Empty the cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the cart cannot be saved.
    pub async fn clear(&mut self) -> Result<(), CartError> {
        self.commit(Vec::new()).await
    }

    /// Totals over exactly the listed ids. Ids not in the cart are ignored.
    #[must_use]
    pub fn selection(&self, ids: &[ProductId]) -> CartSelection {
        let wanted: HashSet<&ProductId> = ids.iter().collect();
        let items: Vec<CartItem> = self
            .items
            .iter()
            .filter(|i| wanted.contains(&i.product.id))
            .cloned()
            .collect();
        let subtotal = items.iter().map(CartItem::line_total).sum();
        let weight_grams = items.iter().map(CartItem::line_weight).sum();
        CartSelection {
            items,
            subtotal,
            weight_grams,
        }
    }

    /// Totals over the whole cart.
    #[must_use]
    pub fn all(&self) -> CartSelection {
        let ids: Vec<ProductId> = self.items.iter().map(|i| i.product.id.clone()).collect();
        self.selection(&ids)
    }
}
