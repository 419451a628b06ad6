//! Cart Aggregation Service.
//!
//! Carts only hold `(productId, quantity)` lines. Titles, prices and
//! subtotals are joined from the live product catalog on every read.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::warn;
use mongodb::bson::{self, oid::ObjectId};
use serde::{Deserialize, Serialize};

use crate::error::{ServiceError, StoreError};
use crate::models::LineItem;
use crate::pricing::round2;
use crate::session::SessionId;
use crate::store::{CartStore, InsertOutcome, ProductStore};

const CART_NOT_FOUND: &str = "Cart not found";
const ITEM_NOT_FOUND: &str = "Item not found in cart";
const PRODUCT_NOT_FOUND: &str = "Product not found";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AddedItem {
    pub cart_id: String,
    pub total_items: i64,
}

/// A line item joined against the current product record.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub id: String,
    pub product_id: String,
    pub title: String,
    pub price: f64,
    pub image: String,
    pub quantity: i64,
    pub subtotal: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct CartSummary {
    pub total_items: i64,
    pub total_amount: f64,
}

impl CartSummary {
    pub fn of(lines: &[CartLine]) -> Self {
        CartSummary {
            total_items: lines
                .iter()
                .fold(0, |total: i64, line| total.saturating_add(line.quantity)),
            total_amount: round2(lines.iter().map(|line| line.subtotal).sum()),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CartView {
    pub session_id: String,
    pub items: Vec<CartLine>,
    pub summary: CartSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl CartView {
    fn empty(session: &SessionId) -> Self {
        CartView {
            session_id: session.to_string(),
            items: vec![],
            summary: CartSummary::default(),
            created_at: None,
            updated_at: None,
        }
    }
}

#[derive(Clone)]
pub struct CartService {
    products: Arc<dyn ProductStore>,
    carts: Arc<dyn CartStore>,
}

impl CartService {
    pub fn new(products: Arc<dyn ProductStore>, carts: Arc<dyn CartStore>) -> Self {
        CartService { products, carts }
    }

    /// Adds `quantity` of a product, creating the cart or the line as needed.
    pub async fn add_item(
        &self,
        session: &SessionId,
        product_id: &str,
        quantity: i64,
    ) -> Result<AddedItem, ServiceError> {
        if quantity < 1 {
            return Err(ServiceError::BadRequest("Quantity must be at least 1".to_string()));
        }

        let product_id =
            ObjectId::parse_str(product_id).map_err(|_| ServiceError::NotFound(PRODUCT_NOT_FOUND))?;
        let product = self
            .products
            .find_product(product_id)
            .await?
            .ok_or(ServiceError::NotFound(PRODUCT_NOT_FOUND))?;
        if !product.in_stock {
            return Err(ServiceError::OutOfStock);
        }

        self.upsert_line(session, product_id, quantity).await?;

        let cart = self
            .carts
            .find_cart(session.as_str())
            .await?
            .ok_or_else(|| StoreError::Conflict(session.to_string()))?;

        Ok(AddedItem {
            cart_id: cart.id.to_hex(),
            total_items: cart.total_items(),
        })
    }

    async fn upsert_line(
        &self,
        session: &SessionId,
        product_id: ObjectId,
        quantity: i64,
    ) -> Result<(), ServiceError> {
        // A concurrent first add for the same line surfaces as AlreadyPresent,
        // after which the increment path wins.
        for _ in 0..2 {
            let now = bson::DateTime::now();
            if self
                .carts
                .increment_item(session.as_str(), product_id, quantity, now)
                .await?
            {
                return Ok(());
            }

            let item = LineItem::new(product_id, quantity);
            match self.carts.insert_item(session.as_str(), item, now).await? {
                InsertOutcome::Inserted => return Ok(()),
                InsertOutcome::AlreadyPresent => continue,
            }
        }

        Err(StoreError::Conflict(session.to_string()).into())
    }

    /// Returns the cart joined with live product data. A session without a
    /// cart gets the empty shape rather than an error.
    pub async fn get_cart(&self, session: &SessionId) -> Result<CartView, ServiceError> {
        let Some(cart) = self.carts.find_cart(session.as_str()).await? else {
            return Ok(CartView::empty(session));
        };

        let ids: Vec<ObjectId> = cart.items.iter().map(|item| item.product_id).collect();
        let products: HashMap<ObjectId, _> = self
            .products
            .find_products_by_ids(&ids)
            .await?
            .into_iter()
            .map(|product| (product.id, product))
            .collect();

        let mut items = Vec::with_capacity(cart.items.len());
        for item in &cart.items {
            let Some(product) = products.get(&item.product_id) else {
                warn!(
                    "cart {} references missing product {}; skipping line",
                    session, item.product_id
                );
                continue;
            };

            items.push(CartLine {
                id: item.id.to_hex(),
                product_id: product.id.to_hex(),
                title: product.title.clone(),
                price: product.price,
                image: product.image.clone(),
                quantity: item.quantity,
                subtotal: round2(product.price * item.quantity as f64),
            });
        }

        Ok(CartView {
            session_id: session.to_string(),
            summary: CartSummary::of(&items),
            items,
            created_at: Some(cart.created_at.to_chrono()),
            updated_at: Some(cart.updated_at.to_chrono()),
        })
    }

    /// Sets a line to an absolute quantity; zero or less removes it.
    pub async fn update_item_quantity(
        &self,
        session: &SessionId,
        product_id: &str,
        quantity: i64,
    ) -> Result<(), ServiceError> {
        let now = bson::DateTime::now();
        let updated = match ObjectId::parse_str(product_id) {
            Ok(id) if quantity <= 0 => self.carts.remove_item(session.as_str(), id, now).await?,
            Ok(id) => {
                self.carts
                    .set_item_quantity(session.as_str(), id, quantity, now)
                    .await?
            }
            Err(_) => false,
        };
        if updated {
            return Ok(());
        }

        match self.carts.find_cart(session.as_str()).await? {
            None => Err(ServiceError::NotFound(CART_NOT_FOUND)),
            Some(_) => Err(ServiceError::NotFound(ITEM_NOT_FOUND)),
        }
    }

    /// Removes a line. Unlike [`CartService::update_item_quantity`], a missing
    /// line in an existing cart is not an error.
    pub async fn remove_item(&self, session: &SessionId, product_id: &str) -> Result<(), ServiceError> {
        if let Ok(id) = ObjectId::parse_str(product_id) {
            let now = bson::DateTime::now();
            if self.carts.remove_item(session.as_str(), id, now).await? {
                return Ok(());
            }
        }

        match self.carts.find_cart(session.as_str()).await? {
            None => Err(ServiceError::NotFound(CART_NOT_FOUND)),
            Some(_) => Ok(()),
        }
    }

    /// Deletes the cart. Succeeds whether or not one existed.
    pub async fn clear_cart(&self, session: &SessionId) -> Result<(), ServiceError> {
        if !self.carts.delete_cart(session.as_str()).await? {
            log::debug!("clear requested for session {session} without a cart");
        }
        Ok(())
    }
}
