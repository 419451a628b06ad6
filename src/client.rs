//! Client Query Layer: a typed, caching HTTP client for the storefront API.
//!
//! Query responses are cached by URL and tagged with the resources they
//! contain. Mutations invalidate tags, so the next query for an affected
//! resource goes back to the server. The cart session is always an explicit
//! argument.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::warn;
use moka::sync::Cache;
use reqwest::{Method, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use crate::cart::{AddedItem, CartView};
use crate::catalog::ListingQuery;
use crate::models::{Category, CreateProductRequest};
use crate::pricing::round2;
use crate::session::SessionId;

pub const FREE_SHIPPING_THRESHOLD: f64 = 50.0;
pub const FLAT_SHIPPING: f64 = 10.0;

const CACHE_CAPACITY: u64 = 1_000;
const CACHE_TTL: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid base url: {0}")]
    InvalidUrl(String),

    #[error("server responded {status}: {message}")]
    Api { status: u16, message: String },

    #[error("unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("cart is empty")]
    EmptyCart,
}

/// Resource tags attached to cached responses.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Tag {
    ProductList,
    ProductFeatured,
    Product(String),
    Cart(String),
}

#[derive(Debug, Clone)]
struct CacheEntry {
    body: Value,
    tags: Vec<Tag>,
}

/// Bounded response cache. Entries expire after a minute and the least
/// useful ones are evicted past capacity.
#[derive(Clone)]
pub struct QueryCache {
    entries: Cache<String, CacheEntry>,
}

impl QueryCache {
    pub fn with_capacity(capacity: u64) -> Self {
        QueryCache {
            entries: Cache::builder()
                .max_capacity(capacity)
                .time_to_live(CACHE_TTL)
                .support_invalidation_closures()
                .build(),
        }
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.entries.get(key).map(|entry| entry.body)
    }

    pub fn insert(&self, key: String, body: Value, tags: Vec<Tag>) {
        self.entries.insert(key, CacheEntry { body, tags });
    }

    /// Drops every entry carrying `tag` that was cached before this call.
    pub fn invalidate(&self, tag: &Tag) {
        let tag = tag.clone();
        if let Err(e) = self
            .entries
            .invalidate_entries_if(move |_, entry| entry.tags.contains(&tag))
        {
            warn!("tag invalidation unavailable ({e}); dropping every cached response");
            self.entries.invalidate_all();
        }
    }

    /// Approximate until pending evictions have been applied.
    pub fn entry_count(&self) -> u64 {
        self.entries.entry_count()
    }
}

impl Default for QueryCache {
    fn default() -> Self {
        QueryCache::with_capacity(CACHE_CAPACITY)
    }
}

impl fmt::Debug for QueryCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryCache")
            .field("entries", &self.entries.entry_count())
            .finish()
    }
}

fn product_tags(body: &Value, list_tag: Tag) -> Vec<Tag> {
    let mut tags: Vec<Tag> = body["data"]
        .as_array()
        .into_iter()
        .flatten()
        .filter_map(|product| product["_id"].as_str())
        .map(|id| Tag::Product(id.to_string()))
        .collect();
    tags.push(list_tag);
    tags
}

/// Product as served by the API, derived fields included when present.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RemoteProduct {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    pub description: String,
    pub price: f64,
    pub discounted_price: Option<f64>,
    pub effective_price: Option<f64>,
    pub has_discount: Option<bool>,
    pub discount_percentage: Option<u32>,
    pub savings: Option<f64>,
    pub image: String,
    pub category: Category,
    pub in_stock: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProductPage {
    pub data: Vec<RemoteProduct>,
    pub total: usize,
    pub page: usize,
    pub total_pages: usize,
    pub has_next_page: bool,
    pub has_prev_page: bool,
}

#[derive(Deserialize)]
struct DataEnvelope<T> {
    data: T,
}

/// Totals shown at checkout. Payment itself is simulated.
#[derive(Serialize, Debug, Clone, Copy, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutQuote {
    pub total_items: i64,
    pub subtotal: f64,
    pub shipping: f64,
    pub total: f64,
}

impl CheckoutQuote {
    pub fn from_cart(cart: &CartView) -> Self {
        let subtotal = round2(
            cart.items
                .iter()
                .map(|line| line.price * line.quantity as f64)
                .sum(),
        );
        let shipping = if subtotal > FREE_SHIPPING_THRESHOLD {
            0.0
        } else {
            FLAT_SHIPPING
        };

        CheckoutQuote {
            total_items: cart.summary.total_items,
            subtotal,
            shipping,
            total: round2(subtotal + shipping),
        }
    }
}

#[derive(Debug)]
pub struct StorefrontClient {
    http: reqwest::Client,
    base_url: Url,
    cache: QueryCache,
}

impl StorefrontClient {
    /// `base_url` points at the API root, e.g. `http://localhost:5000/api`.
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let base_url = Url::parse(base_url).map_err(|e| ClientError::InvalidUrl(e.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::InvalidUrl(base_url.to_string()));
        }
        Ok(StorefrontClient {
            http: reqwest::Client::new(),
            base_url,
            cache: QueryCache::default(),
        })
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ClientError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ClientError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn listing_url(&self, query: &ListingQuery) -> Result<Url, ClientError> {
        let mut url = self.endpoint(&["products"])?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs
                .append_pair("page", &query.page.to_string())
                .append_pair("limit", &query.limit.to_string())
                .append_pair("sortBy", query.sort.as_str());
            if let Some(category) = query.category {
                pairs.append_pair("category", category.as_str());
            }
            if let Some(term) = &query.search_term {
                pairs.append_pair("searchTerm", term);
            }
        }
        Ok(url)
    }

    async fn send(&self, method: Method, url: Url, body: Option<Value>) -> Result<Value, ClientError> {
        let mut request = self.http.request(method, url);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await?;
        let status = response.status();
        let body: Value = response.json().await?;

        if status.is_success() {
            Ok(body)
        } else {
            Err(ClientError::Api {
                status: status.as_u16(),
                message: body["error"].as_str().unwrap_or("request failed").to_string(),
            })
        }
    }

    async fn query<T: DeserializeOwned>(
        &self,
        url: Url,
        tags: impl FnOnce(&Value) -> Vec<Tag>,
    ) -> Result<T, ClientError> {
        let key = url.to_string();
        let body = match self.cache.get(&key) {
            Some(body) => body,
            None => {
                let body = self.send(Method::GET, url, None).await?;
                self.cache.insert(key, body.clone(), tags(&body));
                body
            }
        };
        Ok(serde_json::from_value(body)?)
    }

    async fn mutate(
        &self,
        method: Method,
        url: Url,
        body: Option<Value>,
        invalidates: &[Tag],
    ) -> Result<Value, ClientError> {
        let result = self.send(method, url, body).await;
        // invalidate on failure too: the server state may still have changed
        for tag in invalidates {
            self.cache.invalidate(tag);
        }
        result
    }

    pub async fn products(&self, query: &ListingQuery) -> Result<ProductPage, ClientError> {
        let url = self.listing_url(query)?;
        self.query(url, |body| product_tags(body, Tag::ProductList)).await
    }

    pub async fn featured_products(&self) -> Result<Vec<RemoteProduct>, ClientError> {
        let url = self.endpoint(&["products", "featured"])?;
        let envelope: DataEnvelope<Vec<RemoteProduct>> = self
            .query(url, |body| product_tags(body, Tag::ProductFeatured))
            .await?;
        Ok(envelope.data)
    }

    pub async fn product(&self, id: &str) -> Result<RemoteProduct, ClientError> {
        let url = self.endpoint(&["products", id])?;
        let tag = Tag::Product(id.to_string());
        let envelope: DataEnvelope<RemoteProduct> = self.query(url, |_| vec![tag]).await?;
        Ok(envelope.data)
    }

    /// Creates a product. Cached listings and the featured set are dropped.
    pub async fn create_product(&self, product: &CreateProductRequest) -> Result<RemoteProduct, ClientError> {
        let url = self.endpoint(&["products"])?;
        let body = serde_json::to_value(product)?;
        let response = self
            .mutate(
                Method::POST,
                url,
                Some(body),
                &[Tag::ProductList, Tag::ProductFeatured],
            )
            .await?;
        let envelope: DataEnvelope<RemoteProduct> = serde_json::from_value(response)?;
        Ok(envelope.data)
    }

    pub async fn cart(&self, session: &SessionId) -> Result<CartView, ClientError> {
        let url = self.endpoint(&["cart", session.as_str()])?;
        let tag = Tag::Cart(session.to_string());
        let envelope: DataEnvelope<CartView> = self.query(url, |_| vec![tag]).await?;
        Ok(envelope.data)
    }

    pub async fn add_to_cart(
        &self,
        session: &SessionId,
        product_id: &str,
        quantity: i64,
    ) -> Result<AddedItem, ClientError> {
        let url = self.endpoint(&["cart", "add"])?;
        let body = json!({ "sessionId": session, "productId": product_id, "quantity": quantity });
        let response = self
            .mutate(Method::POST, url, Some(body), &[Tag::Cart(session.to_string())])
            .await?;
        let envelope: DataEnvelope<AddedItem> = serde_json::from_value(response)?;
        Ok(envelope.data)
    }

    pub async fn update_cart_item(
        &self,
        session: &SessionId,
        product_id: &str,
        quantity: i64,
    ) -> Result<(), ClientError> {
        let url = self.endpoint(&["cart", "update"])?;
        let body = json!({ "sessionId": session, "productId": product_id, "quantity": quantity });
        self.mutate(Method::PUT, url, Some(body), &[Tag::Cart(session.to_string())])
            .await?;
        Ok(())
    }

    pub async fn remove_from_cart(&self, session: &SessionId, product_id: &str) -> Result<(), ClientError> {
        let url = self.endpoint(&["cart", session.as_str(), "item", product_id])?;
        self.mutate(Method::DELETE, url, None, &[Tag::Cart(session.to_string())])
            .await?;
        Ok(())
    }

    pub async fn clear_cart(&self, session: &SessionId) -> Result<(), ClientError> {
        let url = self.endpoint(&["cart", session.as_str()])?;
        self.mutate(Method::DELETE, url, None, &[Tag::Cart(session.to_string())])
            .await?;
        Ok(())
    }

    /// Simulated checkout: quotes the current cart, then clears it.
    pub async fn checkout(&self, session: &SessionId) -> Result<CheckoutQuote, ClientError> {
        self.cache.invalidate(&Tag::Cart(session.to_string()));
        let cart = self.cart(session).await?;
        if cart.items.is_empty() {
            return Err(ClientError::EmptyCart);
        }

        let quote = CheckoutQuote::from_cart(&cart);
        self.clear_cart(session).await?;
        log::info!(
            "checkout for {session}: {} items, total {:.2}",
            quote.total_items,
            quote.total
        );
        Ok(quote)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use actix_web::{web, App, HttpServer};

    use super::*;
    use crate::cart::{CartLine, CartSummary};
    use crate::catalog::SortKey;
    use crate::handlers::configure;
    use crate::handlers::testing::state;
    use crate::handlers::AppState;
    use crate::test_helpers::{product, MemoryCartStore, MemoryProductStore};

    /// Serves the API on an ephemeral port and returns its `/api` base url.
    fn serve(state: web::Data<AppState>) -> String {
        let server = HttpServer::new(move || App::new().app_data(state.clone()).configure(configure))
            .workers(1)
            .disable_signals()
            .bind(("127.0.0.1", 0))
            .unwrap();
        let addr = server.addrs()[0];
        actix_web::rt::spawn(server.run());
        format!("http://{addr}/api")
    }

    fn shop() -> (Arc<MemoryProductStore>, String) {
        let products = Arc::new(MemoryProductStore::with(vec![
            product("Charger", 19.99, None, Category::Accessories, true),
            product("iPhone 15", 1000.0, Some(800.0), Category::Mobiles, true),
        ]));
        let base = serve(state(products.clone(), Arc::new(MemoryCartStore::default())));
        (products, base)
    }

    fn cart_with(lines: &[(f64, i64)]) -> CartView {
        let items: Vec<CartLine> = lines
            .iter()
            .map(|&(price, quantity)| CartLine {
                id: String::new(),
                product_id: String::new(),
                title: String::new(),
                price,
                image: String::new(),
                quantity,
                subtotal: round2(price * quantity as f64),
            })
            .collect();
        CartView {
            session_id: "s".to_string(),
            summary: CartSummary::of(&items),
            items,
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn cache_invalidation_is_scoped_to_tag() {
        let cache = QueryCache::default();
        cache.insert("a".into(), json!(1), vec![Tag::Cart("s1".into())]);
        cache.insert("b".into(), json!(2), vec![Tag::Cart("s2".into())]);
        cache.insert("c".into(), json!(3), vec![Tag::ProductList, Tag::Product("p".into())]);

        cache.invalidate(&Tag::Cart("s1".into()));
        assert!(cache.get("a").is_none());
        assert_eq!(cache.get("b"), Some(json!(2)));
        assert_eq!(cache.get("c"), Some(json!(3)));

        cache.invalidate(&Tag::Product("p".into()));
        assert!(cache.get("c").is_none());
        assert_eq!(cache.get("b"), Some(json!(2)));
    }

    #[test]
    fn entries_cached_after_invalidation_survive_it() {
        let cache = QueryCache::default();
        cache.insert("a".into(), json!(1), vec![Tag::ProductList]);
        cache.invalidate(&Tag::ProductList);

        cache.insert("a".into(), json!(2), vec![Tag::ProductList]);

        assert_eq!(cache.get("a"), Some(json!(2)));
    }

    #[test]
    fn cache_is_bounded() {
        let cache = QueryCache::with_capacity(4);
        for page in 0..50 {
            cache.insert(format!("/products?page={page}"), json!(page), vec![Tag::ProductList]);
        }

        cache.entries.run_pending_tasks();

        assert!(cache.entry_count() <= 4);
    }

    #[test]
    fn product_tags_cover_every_listed_id() {
        let body = json!({ "data": [{ "_id": "a" }, { "_id": "b" }] });

        assert_eq!(
            product_tags(&body, Tag::ProductList),
            vec![Tag::Product("a".into()), Tag::Product("b".into()), Tag::ProductList]
        );
        assert_eq!(product_tags(&json!({}), Tag::ProductFeatured), vec![Tag::ProductFeatured]);
    }

    #[test]
    fn quote_charges_shipping_up_to_threshold() {
        let quote = CheckoutQuote::from_cart(&cart_with(&[(19.99, 2)]));

        assert_eq!(quote.subtotal, 39.98);
        assert_eq!(quote.shipping, FLAT_SHIPPING);
        assert_eq!(quote.total, 49.98);
        assert_eq!(quote.total_items, 2);

        let exactly_threshold = CheckoutQuote::from_cart(&cart_with(&[(25.0, 2)]));
        assert_eq!(exactly_threshold.shipping, FLAT_SHIPPING);
    }

    #[test]
    fn quote_ships_free_above_threshold() {
        let quote = CheckoutQuote::from_cart(&cart_with(&[(800.0, 1), (0.1, 3)]));

        assert_eq!(quote.subtotal, 800.3);
        assert_eq!(quote.shipping, 0.0);
        assert_eq!(quote.total, 800.3);
    }

    #[test]
    fn endpoints_are_percent_encoded_under_base_path() {
        let client = StorefrontClient::new("http://localhost:5000/api/").unwrap();

        let url = client.endpoint(&["cart", "my session", "item", "abc"]).unwrap();

        assert_eq!(url.as_str(), "http://localhost:5000/api/cart/my%20session/item/abc");
    }

    #[test]
    fn listing_url_carries_query_parameters() {
        let client = StorefrontClient::new("http://localhost:5000/api").unwrap();
        let query = ListingQuery {
            category: Some(Category::Laptops),
            search_term: Some("mac book".to_string()),
            sort: SortKey::Newest,
            page: 2,
            limit: 5,
        };

        let url = client.listing_url(&query).unwrap();

        assert_eq!(
            url.as_str(),
            "http://localhost:5000/api/products?page=2&limit=5&sortBy=newest&category=Laptops&searchTerm=mac+book"
        );
    }

    #[test]
    fn rejects_non_base_urls() {
        assert!(matches!(
            StorefrontClient::new("mailto:shop@example.com"),
            Err(ClientError::InvalidUrl(_))
        ));
        assert!(StorefrontClient::new("not a url").is_err());
    }

    #[actix_web::test]
    async fn cached_queries_skip_the_network() {
        // nothing listens on the discard port; a cache miss would fail
        let client = StorefrontClient::new("http://127.0.0.1:9/api").unwrap();
        let session = SessionId::parse("cached").unwrap();
        let url = client.endpoint(&["cart", "cached"]).unwrap();
        client.cache().insert(
            url.to_string(),
            json!({
                "success": true,
                "data": {
                    "sessionId": "cached",
                    "items": [],
                    "summary": { "totalItems": 0, "totalAmount": 0.0 }
                }
            }),
            vec![Tag::Cart("cached".into())],
        );

        let cart = client.cart(&session).await.unwrap();

        assert_eq!(cart.session_id, "cached");
        assert!(cart.items.is_empty());
    }

    #[actix_web::test]
    async fn checkout_quotes_then_clears_the_cart() {
        let (products, base) = shop();
        let client = StorefrontClient::new(&base).unwrap();
        let session = SessionId::parse("session_checkout").unwrap();
        let charger = products.ids()[0].to_hex();

        client.add_to_cart(&session, &charger, 2).await.unwrap();
        assert_eq!(client.cart(&session).await.unwrap().summary.total_items, 2);

        let quote = client.checkout(&session).await.unwrap();

        assert_eq!(
            quote,
            CheckoutQuote {
                total_items: 2,
                subtotal: 39.98,
                shipping: FLAT_SHIPPING,
                total: 49.98,
            }
        );
        assert!(client.cart(&session).await.unwrap().items.is_empty());
    }

    #[actix_web::test]
    async fn checkout_refetches_and_rejects_an_empty_cart() {
        let (products, base) = shop();
        let client = StorefrontClient::new(&base).unwrap();
        let session = SessionId::parse("session_stale").unwrap();

        // a stale cached cart must not be checked out
        let url = client.endpoint(&["cart", session.as_str()]).unwrap();
        client.cache().insert(
            url.to_string(),
            json!({
                "success": true,
                "data": {
                    "sessionId": "session_stale",
                    "items": [{
                        "id": "line",
                        "productId": products.ids()[1].to_hex(),
                        "title": "iPhone 15",
                        "price": 1000.0,
                        "image": "iphone-15.png",
                        "quantity": 1,
                        "subtotal": 1000.0
                    }],
                    "summary": { "totalItems": 1, "totalAmount": 1000.0 }
                }
            }),
            vec![Tag::Cart(session.to_string())],
        );

        let result = client.checkout(&session).await;

        assert!(matches!(result, Err(ClientError::EmptyCart)));
    }

    #[actix_web::test]
    async fn creating_a_product_refreshes_cached_listings() {
        let (_, base) = shop();
        let client = StorefrontClient::new(&base).unwrap();
        let query = ListingQuery::default();

        assert_eq!(client.products(&query).await.unwrap().total, 2);
        assert_eq!(client.featured_products().await.unwrap().len(), 1);

        let created = client
            .create_product(&CreateProductRequest {
                title: Some("Magic Mouse".to_string()),
                description: Some("Specifications: Bluetooth | Features: Multi-touch".to_string()),
                price: Some(79.0),
                discounted_price: Some(59.0),
                image: Some("mouse.png".to_string()),
                category: Some("Accessories".to_string()),
                in_stock: None,
            })
            .await
            .unwrap();

        let page = client.products(&query).await.unwrap();
        assert_eq!(page.total, 3);
        assert!(page.data.iter().any(|p| p.id == created.id));
        assert_eq!(client.featured_products().await.unwrap().len(), 2);
    }
}
