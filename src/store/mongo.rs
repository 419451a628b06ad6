use async_trait::async_trait;
use futures::stream::StreamExt;
use mongodb::bson::{doc, oid::ObjectId, DateTime, Document};
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::UpdateOptions;
use mongodb::Collection;

use crate::error::StoreError;
use crate::models::{Cart, LineItem, Product};
use crate::store::{CartStore, InsertOutcome, ProductFilter, ProductStore};

const DUPLICATE_KEY: i32 = 11000;

/// Escapes PCRE metacharacters so a search term matches literally inside a
/// MongoDB `$regex`. Only the `i` option is ever set, so `#` and whitespace
/// stay literal, and `-` is only special inside a class, which `[` escapes.
fn escape_regex(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if "\\^$.|?*+()[]{}".contains(c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn product_query(filter: &ProductFilter) -> Document {
    let mut query = Document::new();
    if let Some(category) = filter.category {
        query.insert("category", category.as_str());
    }
    if let Some(term) = &filter.search_term {
        query.insert("title", doc! { "$regex": escape_regex(term), "$options": "i" });
    }
    if filter.in_stock_only {
        query.insert("inStock", true);
    }
    if filter.discounted_only {
        query.insert("discountedPrice", doc! { "$ne": null });
    }
    query
}

fn is_duplicate_key(error: &mongodb::error::Error) -> bool {
    matches!(
        error.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(failure)) if failure.code == DUPLICATE_KEY
    )
}

#[derive(Debug, Clone)]
pub struct MongoProductStore {
    collection: Collection<Product>,
}

impl MongoProductStore {
    pub fn new(collection: Collection<Product>) -> Self {
        MongoProductStore { collection }
    }

    /// Drops every product and inserts `products` in their place.
    pub async fn replace_all(&self, products: &[Product]) -> Result<u64, StoreError> {
        let deleted = self.collection.delete_many(doc! {}, None).await?;
        log::info!("removed {} existing products", deleted.deleted_count);

        if products.is_empty() {
            return Ok(0);
        }
        let result = self.collection.insert_many(products, None).await?;
        Ok(result.inserted_ids.len() as u64)
    }

    async fn collect(&self, query: Document) -> Result<Vec<Product>, StoreError> {
        let mut products = vec![];
        let mut cursor = self.collection.find(query, None).await?;
        while let Some(result) = cursor.next().await {
            products.push(result?);
        }
        Ok(products)
    }
}

#[async_trait]
impl ProductStore for MongoProductStore {
    async fn find_products(&self, filter: &ProductFilter) -> Result<Vec<Product>, StoreError> {
        self.collect(product_query(filter)).await
    }

    async fn find_product(&self, id: ObjectId) -> Result<Option<Product>, StoreError> {
        Ok(self.collection.find_one(doc! { "_id": id }, None).await?)
    }

    async fn find_products_by_ids(&self, ids: &[ObjectId]) -> Result<Vec<Product>, StoreError> {
        if ids.is_empty() {
            return Ok(vec![]);
        }
        self.collect(doc! { "_id": { "$in": ids.to_vec() } }).await
    }

    async fn insert_product(&self, product: &Product) -> Result<(), StoreError> {
        self.collection.insert_one(product, None).await?;
        Ok(())
    }
}

fn line_filter(session_id: &str, product_id: ObjectId) -> Document {
    doc! { "sessionId": session_id, "items.productId": product_id }
}

fn increment_update(quantity: i64, now: DateTime) -> Document {
    doc! {
        "$inc": { "items.$.quantity": quantity },
        "$set": { "updatedAt": now },
    }
}

// The $ne guard keeps one line per product; when the cart already holds
// the product the upsert collides with the unique sessionId index.
fn insert_filter(session_id: &str, product_id: ObjectId) -> Document {
    doc! {
        "sessionId": session_id,
        "items.productId": { "$ne": product_id },
    }
}

fn insert_update(item: &LineItem, now: DateTime) -> Document {
    doc! {
        "$push": { "items": {
            "_id": item.id,
            "productId": item.product_id,
            "quantity": item.quantity,
        } },
        "$set": { "updatedAt": now },
        "$setOnInsert": { "createdAt": now },
    }
}

fn set_quantity_update(quantity: i64, now: DateTime) -> Document {
    doc! { "$set": { "items.$.quantity": quantity, "updatedAt": now } }
}

fn pull_update(product_id: ObjectId, now: DateTime) -> Document {
    doc! {
        "$pull": { "items": { "productId": product_id } },
        "$set": { "updatedAt": now },
    }
}

#[derive(Debug, Clone)]
pub struct MongoCartStore {
    collection: Collection<Cart>,
}

impl MongoCartStore {
    pub fn new(collection: Collection<Cart>) -> Self {
        MongoCartStore { collection }
    }

    async fn update_line(&self, filter: Document, update: Document) -> Result<bool, StoreError> {
        let result = self.collection.update_one(filter, update, None).await?;
        Ok(result.matched_count > 0)
    }
}

#[async_trait]
impl CartStore for MongoCartStore {
    async fn find_cart(&self, session_id: &str) -> Result<Option<Cart>, StoreError> {
        Ok(self
            .collection
            .find_one(doc! { "sessionId": session_id }, None)
            .await?)
    }

    async fn increment_item(
        &self,
        session_id: &str,
        product_id: ObjectId,
        quantity: i64,
        now: DateTime,
    ) -> Result<bool, StoreError> {
        self.update_line(line_filter(session_id, product_id), increment_update(quantity, now))
            .await
    }

    async fn insert_item(
        &self,
        session_id: &str,
        item: LineItem,
        now: DateTime,
    ) -> Result<InsertOutcome, StoreError> {
        let filter = insert_filter(session_id, item.product_id);
        let update = insert_update(&item, now);
        let options = UpdateOptions::builder().upsert(true).build();

        match self.collection.update_one(filter, update, options).await {
            Ok(_) => Ok(InsertOutcome::Inserted),
            Err(e) if is_duplicate_key(&e) => Ok(InsertOutcome::AlreadyPresent),
            Err(e) => Err(e.into()),
        }
    }

    async fn set_item_quantity(
        &self,
        session_id: &str,
        product_id: ObjectId,
        quantity: i64,
        now: DateTime,
    ) -> Result<bool, StoreError> {
        self.update_line(line_filter(session_id, product_id), set_quantity_update(quantity, now))
            .await
    }

    async fn remove_item(
        &self,
        session_id: &str,
        product_id: ObjectId,
        now: DateTime,
    ) -> Result<bool, StoreError> {
        self.update_line(line_filter(session_id, product_id), pull_update(product_id, now))
            .await
    }

    async fn delete_cart(&self, session_id: &str) -> Result<bool, StoreError> {
        let result = self
            .collection
            .delete_one(doc! { "sessionId": session_id }, None)
            .await?;
        Ok(result.deleted_count > 0)
    }
}
