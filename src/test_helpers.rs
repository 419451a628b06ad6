//! In-memory stores and fixtures for tests.

use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use mongodb::bson::{oid::ObjectId, DateTime};

use crate::error::StoreError;
use crate::models::{Cart, Category, LineItem, Product};
use crate::store::{CartStore, InsertOutcome, ProductFilter, ProductStore};

const FIXTURE_EPOCH_MILLIS: i64 = 1_700_000_000_000;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn product(
    title: &str,
    price: f64,
    discounted_price: Option<f64>,
    category: Category,
    in_stock: bool,
) -> Product {
    Product {
        id: ObjectId::new(),
        title: title.to_string(),
        description: format!("Specifications: {title} spec | Features: Fast, Light"),
        price,
        discounted_price,
        image: format!("{}.png", title.to_lowercase().replace(' ', "-")),
        category,
        in_stock,
        created_at: DateTime::from_millis(FIXTURE_EPOCH_MILLIS),
    }
}

#[derive(Debug, Default)]
pub(crate) struct MemoryProductStore {
    products: Mutex<Vec<Product>>,
}

impl MemoryProductStore {
    /// Stores `products` in order, stamping them one millisecond apart.
    pub(crate) fn with(products: Vec<Product>) -> Self {
        let products = products
            .into_iter()
            .enumerate()
            .map(|(offset, product)| Product {
                created_at: DateTime::from_millis(FIXTURE_EPOCH_MILLIS + offset as i64),
                ..product
            })
            .collect();
        MemoryProductStore {
            products: Mutex::new(products),
        }
    }

    pub(crate) fn ids(&self) -> Vec<ObjectId> {
        lock(&self.products).iter().map(|product| product.id).collect()
    }

    pub(crate) fn remove(&self, id: ObjectId) {
        lock(&self.products).retain(|product| product.id != id);
    }
}

#[async_trait]
impl ProductStore for MemoryProductStore {
    async fn find_products(&self, filter: &ProductFilter) -> Result<Vec<Product>, StoreError> {
        Ok(lock(&self.products)
            .iter()
            .filter(|product| filter.matches(product))
            .cloned()
            .collect())
    }

    async fn find_product(&self, id: ObjectId) -> Result<Option<Product>, StoreError> {
        Ok(lock(&self.products).iter().find(|product| product.id == id).cloned())
    }

    async fn find_products_by_ids(&self, ids: &[ObjectId]) -> Result<Vec<Product>, StoreError> {
        Ok(lock(&self.products)
            .iter()
            .filter(|product| ids.contains(&product.id))
            .cloned()
            .collect())
    }

    async fn insert_product(&self, product: &Product) -> Result<(), StoreError> {
        lock(&self.products).push(product.clone());
        Ok(())
    }
}

#[derive(Debug, Default)]
pub(crate) struct MemoryCartStore {
    carts: Mutex<Vec<Cart>>,
}

impl MemoryCartStore {
    pub(crate) fn cart(&self, session_id: &str) -> Option<Cart> {
        lock(&self.carts)
            .iter()
            .find(|cart| cart.session_id == session_id)
            .cloned()
    }

    fn with_line<F>(&self, session_id: &str, product_id: ObjectId, now: DateTime, f: F) -> bool
    where
        F: FnOnce(&mut Cart, usize),
    {
        let mut carts = lock(&self.carts);
        let Some(cart) = carts.iter_mut().find(|cart| cart.session_id == session_id) else {
            return false;
        };
        let Some(index) = cart.items.iter().position(|item| item.product_id == product_id) else {
            return false;
        };
        f(cart, index);
        cart.updated_at = now;
        true
    }
}

#[async_trait]
impl CartStore for MemoryCartStore {
    async fn find_cart(&self, session_id: &str) -> Result<Option<Cart>, StoreError> {
        Ok(self.cart(session_id))
    }

    async fn increment_item(
        &self,
        session_id: &str,
        product_id: ObjectId,
        quantity: i64,
        now: DateTime,
    ) -> Result<bool, StoreError> {
        Ok(self.with_line(session_id, product_id, now, |cart, index| {
            let line = &mut cart.items[index];
            line.quantity = line.quantity.saturating_add(quantity);
        }))
    }

    async fn insert_item(
        &self,
        session_id: &str,
        item: LineItem,
        now: DateTime,
    ) -> Result<InsertOutcome, StoreError> {
        let mut carts = lock(&self.carts);
        match carts.iter_mut().find(|cart| cart.session_id == session_id) {
            Some(cart) if cart.items.iter().any(|line| line.product_id == item.product_id) => {
                Ok(InsertOutcome::AlreadyPresent)
            }
            Some(cart) => {
                cart.items.push(item);
                cart.updated_at = now;
                Ok(InsertOutcome::Inserted)
            }
            None => {
                carts.push(Cart {
                    id: ObjectId::new(),
                    session_id: session_id.to_string(),
                    items: vec![item],
                    created_at: now,
                    updated_at: now,
                });
                Ok(InsertOutcome::Inserted)
            }
        }
    }

    async fn set_item_quantity(
        &self,
        session_id: &str,
        product_id: ObjectId,
        quantity: i64,
        now: DateTime,
    ) -> Result<bool, StoreError> {
        Ok(self.with_line(session_id, product_id, now, |cart, index| {
            cart.items[index].quantity = quantity;
        }))
    }

    async fn remove_item(
        &self,
        session_id: &str,
        product_id: ObjectId,
        now: DateTime,
    ) -> Result<bool, StoreError> {
        Ok(self.with_line(session_id, product_id, now, |cart, index| {
            cart.items.remove(index);
        }))
    }

    async fn delete_cart(&self, session_id: &str) -> Result<bool, StoreError> {
        let mut carts = lock(&self.carts);
        let before = carts.len();
        carts.retain(|cart| cart.session_id != session_id);
        Ok(carts.len() < before)
    }
}
