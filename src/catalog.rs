//! Catalog Query Service: derived pricing, search, sorting and pagination of
//! product listings.
//!
//! Price sorts depend on the effective price, which is never stored, so the
//! whole matching set is loaded, decorated, sorted and only then sliced.

use std::cmp::Ordering;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

use crate::error::ServiceError;
use crate::models::{Category, CreateProductRequest, DescriptionParts, Product};
use crate::pricing::Pricing;
use crate::store::{ProductFilter, ProductStore};

pub const DEFAULT_PAGE: usize = 1;
pub const DEFAULT_LIMIT: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    #[default]
    PriceAsc,
    PriceDesc,
    NameAsc,
    NameDesc,
    Newest,
}

impl SortKey {
    /// Unknown keys fall back to `price-asc`.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some("price-desc") => SortKey::PriceDesc,
            Some("name-asc") => SortKey::NameAsc,
            Some("name-desc") => SortKey::NameDesc,
            Some("newest") => SortKey::Newest,
            _ => SortKey::PriceAsc,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SortKey::PriceAsc => "price-asc",
            SortKey::PriceDesc => "price-desc",
            SortKey::NameAsc => "name-asc",
            SortKey::NameDesc => "name-desc",
            SortKey::Newest => "newest",
        }
    }

    fn compare(&self, a: &ProductView, b: &ProductView) -> Ordering {
        match self {
            SortKey::PriceAsc => a.effective_price().total_cmp(&b.effective_price()),
            SortKey::PriceDesc => b.effective_price().total_cmp(&a.effective_price()),
            SortKey::NameAsc => compare_titles(&a.title, &b.title),
            SortKey::NameDesc => compare_titles(&b.title, &a.title),
            SortKey::Newest => b.created_at.cmp(&a.created_at),
        }
    }
}

fn compare_titles(a: &str, b: &str) -> Ordering {
    a.to_lowercase().cmp(&b.to_lowercase())
}

/// Raw listing query string. Everything arrives as text and is coerced by
/// [`ListingQuery::from_params`].
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct ListingParams {
    pub category: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
    pub sort_by: Option<String>,
    pub search_term: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListingQuery {
    pub category: Option<Category>,
    pub search_term: Option<String>,
    pub sort: SortKey,
    pub page: usize,
    pub limit: usize,
}

impl Default for ListingQuery {
    fn default() -> Self {
        ListingQuery {
            category: None,
            search_term: None,
            sort: SortKey::default(),
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
        }
    }
}

fn positive_or(raw: Option<&str>, default: usize) -> usize {
    raw.and_then(|value| value.trim().parse::<usize>().ok())
        .filter(|value| *value >= 1)
        .unwrap_or(default)
}

fn non_empty(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|value| !value.is_empty())
}

impl ListingQuery {
    pub fn from_params(params: &ListingParams) -> Result<Self, ServiceError> {
        let category = non_empty(params.category.as_deref())
            .map(str::parse::<Category>)
            .transpose()?;

        Ok(ListingQuery {
            category,
            search_term: non_empty(params.search_term.as_deref()).map(str::to_string),
            sort: SortKey::parse(params.sort_by.as_deref()),
            page: positive_or(params.page.as_deref(), DEFAULT_PAGE),
            limit: positive_or(params.limit.as_deref(), DEFAULT_LIMIT),
        })
    }
}

/// One page of a sorted result set.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total_count: usize,
    pub page: usize,
    pub total_pages: usize,
    pub has_next_page: bool,
    pub has_prev_page: bool,
}

pub fn paginate<T>(items: Vec<T>, page: usize, limit: usize) -> Page<T> {
    let limit = limit.max(1);
    let page = page.max(1);
    let total_count = items.len();
    let total_pages = total_count.div_ceil(limit);
    let start = (page - 1).saturating_mul(limit);

    Page {
        items: items.into_iter().skip(start).take(limit).collect(),
        total_count,
        page,
        total_pages,
        has_next_page: page < total_pages,
        has_prev_page: page > 1,
    }
}

/// A product as returned by the API, with derived fields attached.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProductView {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    pub description: String,
    pub price: f64,
    pub discounted_price: Option<f64>,
    pub image: String,
    pub category: Category,
    pub in_stock: bool,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub pricing: Option<Pricing>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub savings: Option<f64>,
    #[serde(flatten)]
    pub details: Option<DescriptionParts>,
}

impl ProductView {
    /// The stored record only, without derived fields.
    pub fn plain(product: &Product) -> Self {
        ProductView {
            id: product.id.to_hex(),
            title: product.title.clone(),
            description: product.description.clone(),
            price: product.price,
            discounted_price: product.discounted_price,
            image: product.image.clone(),
            category: product.category,
            in_stock: product.in_stock,
            created_at: product.created_at.to_chrono(),
            pricing: None,
            savings: None,
            details: None,
        }
    }

    pub fn priced(product: &Product) -> Self {
        ProductView {
            pricing: Some(Pricing::of(product.price, product.discounted_price)),
            ..ProductView::plain(product)
        }
    }

    pub fn effective_price(&self) -> f64 {
        self.pricing
            .map_or(self.price, |pricing| pricing.effective_price)
    }
}

#[derive(Clone)]
pub struct CatalogService {
    products: Arc<dyn ProductStore>,
}

impl CatalogService {
    pub fn new(products: Arc<dyn ProductStore>) -> Self {
        CatalogService { products }
    }

    pub async fn list_products(&self, query: &ListingQuery) -> Result<Page<ProductView>, ServiceError> {
        let filter = ProductFilter {
            category: query.category,
            search_term: query.search_term.clone(),
            ..ProductFilter::default()
        };

        let mut views: Vec<ProductView> = self
            .products
            .find_products(&filter)
            .await?
            .iter()
            .map(ProductView::priced)
            .collect();

        // stable: equal keys keep store order
        views.sort_by(|a, b| query.sort.compare(a, b));

        Ok(paginate(views, query.page, query.limit))
    }

    /// In-stock products whose discounted price is strictly below the base price.
    pub async fn featured_products(&self) -> Result<Vec<ProductView>, ServiceError> {
        let filter = ProductFilter {
            in_stock_only: true,
            discounted_only: true,
            ..ProductFilter::default()
        };

        let featured = self
            .products
            .find_products(&filter)
            .await?
            .iter()
            .map(ProductView::priced)
            .filter(|view| view.pricing.is_some_and(|pricing| pricing.has_discount))
            .map(|view| ProductView {
                savings: view.pricing.map(|pricing| pricing.savings(view.price)),
                ..view
            })
            .collect();

        Ok(featured)
    }

    pub async fn product_by_id(&self, id: &str) -> Result<ProductView, ServiceError> {
        let not_found = || ServiceError::NotFound("Product not found");

        let id = ObjectId::parse_str(id).map_err(|_| not_found())?;
        let product = self.products.find_product(id).await?.ok_or_else(not_found)?;

        Ok(ProductView {
            details: Some(DescriptionParts::parse(&product.description)),
            ..ProductView::priced(&product)
        })
    }

    pub async fn create_product(&self, request: CreateProductRequest) -> Result<ProductView, ServiceError> {
        let product = Product::create(request.validate()?, mongodb::bson::DateTime::now());
        self.products.insert_product(&product).await?;

        log::info!("created product {} ({})", product.id, product.title);
        Ok(ProductView::plain(&product))
    }
}
