//! Persistence seams for products and carts.
//!
//! Services only talk to these traits; [`mongo`] holds the MongoDB-backed
//! implementations used by the server.

use async_trait::async_trait;
use mongodb::bson::{oid::ObjectId, DateTime};

use crate::error::StoreError;
use crate::models::{Cart, Category, LineItem, Product};

pub mod mongo;

pub use mongo::{MongoCartStore, MongoProductStore};

/// Selection applied by the store before any derived-field processing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductFilter {
    pub category: Option<Category>,
    /// Case-insensitive literal substring of the title.
    pub search_term: Option<String>,
    pub in_stock_only: bool,
    /// Only products with a discounted price set (not necessarily lower).
    pub discounted_only: bool,
}

impl ProductFilter {
    pub fn matches(&self, product: &Product) -> bool {
        if self.category.is_some_and(|category| category != product.category) {
            return false;
        }
        if self.in_stock_only && !product.in_stock {
            return false;
        }
        if self.discounted_only && product.discounted_price.is_none() {
            return false;
        }
        match &self.search_term {
            Some(term) => product.title.to_lowercase().contains(&term.to_lowercase()),
            None => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// The line item appeared concurrently; the caller should increment instead.
    AlreadyPresent,
}

#[async_trait]
pub trait ProductStore: Send + Sync {
    async fn find_products(&self, filter: &ProductFilter) -> Result<Vec<Product>, StoreError>;

    async fn find_product(&self, id: ObjectId) -> Result<Option<Product>, StoreError>;

    async fn find_products_by_ids(&self, ids: &[ObjectId]) -> Result<Vec<Product>, StoreError>;

    async fn insert_product(&self, product: &Product) -> Result<(), StoreError>;
}

/// Cart persistence. Every mutation is a single atomic document update.
#[async_trait]
pub trait CartStore: Send + Sync {
    async fn find_cart(&self, session_id: &str) -> Result<Option<Cart>, StoreError>;

    /// Adds `quantity` to an existing line. Returns `false` when the cart has no such line.
    async fn increment_item(
        &self,
        session_id: &str,
        product_id: ObjectId,
        quantity: i64,
        now: DateTime,
    ) -> Result<bool, StoreError>;

    /// Appends a new line, creating the cart when the session has none.
    async fn insert_item(
        &self,
        session_id: &str,
        item: LineItem,
        now: DateTime,
    ) -> Result<InsertOutcome, StoreError>;

    /// Sets an existing line to an absolute quantity. Returns `false` when no such line exists.
    async fn set_item_quantity(
        &self,
        session_id: &str,
        product_id: ObjectId,
        quantity: i64,
        now: DateTime,
    ) -> Result<bool, StoreError>;

    /// Removes a line. Returns `false` when no such line existed.
    async fn remove_item(
        &self,
        session_id: &str,
        product_id: ObjectId,
        now: DateTime,
    ) -> Result<bool, StoreError>;

    /// Deletes the whole cart. Returns `false` when there was nothing to delete.
    async fn delete_cart(&self, session_id: &str) -> Result<bool, StoreError>;
}
