use std::fmt;
use std::str::FromStr;

use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};

use crate::error::{FieldError, ServiceError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Mobiles,
    Laptops,
    Accessories,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Mobiles, Category::Laptops, Category::Accessories];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Mobiles => "Mobiles",
            Category::Laptops => "Laptops",
            Category::Accessories => "Accessories",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = ServiceError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|category| category.as_str() == value)
            .ok_or_else(|| {
                ServiceError::BadRequest(format!(
                    "Invalid category '{value}', expected one of: Mobiles, Laptops, Accessories"
                ))
            })
    }
}

fn default_in_stock() -> bool {
    true
}

/// A product as stored in the `products` collection.
///
/// Derived pricing fields are never stored; see [`crate::pricing::Pricing`].
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub title: String,
    pub description: String,
    pub price: f64,
    #[serde(default)]
    pub discounted_price: Option<f64>,
    pub image: String,
    pub category: Category,
    #[serde(default = "default_in_stock")]
    pub in_stock: bool,
    pub created_at: DateTime,
}

impl Product {
    pub fn create(new: NewProduct, created_at: DateTime) -> Self {
        Product {
            id: ObjectId::new(),
            title: new.title,
            description: new.description,
            price: new.price,
            discounted_price: new.discounted_price,
            image: new.image,
            category: new.category,
            in_stock: new.in_stock,
            created_at,
        }
    }
}

/// Validated input for a product insert.
#[derive(Debug, Clone, PartialEq)]
pub struct NewProduct {
    pub title: String,
    pub description: String,
    pub price: f64,
    pub discounted_price: Option<f64>,
    pub image: String,
    pub category: Category,
    pub in_stock: bool,
}

/// Raw product payload as posted by an administrator or read from a seed file.
///
/// Every field is optional here so that validation can report all missing
/// fields at once instead of failing on the first one.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct CreateProductRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub discounted_price: Option<f64>,
    pub image: Option<String>,
    pub category: Option<String>,
    pub in_stock: Option<bool>,
}

impl CreateProductRequest {
    pub fn validate(self) -> Result<NewProduct, ServiceError> {
        let mut errors = Vec::new();

        let title = self.title.as_deref().map(str::trim).unwrap_or_default();
        if title.is_empty() {
            errors.push(FieldError::new("title", "is required"));
        }

        if self.description.is_none() {
            errors.push(FieldError::new("description", "is required"));
        }

        match self.price {
            None => errors.push(FieldError::new("price", "is required")),
            Some(price) if !price.is_finite() || price < 0.0 => {
                errors.push(FieldError::new("price", "must be a non-negative number"))
            }
            Some(_) => {}
        }

        if let Some(discounted) = self.discounted_price {
            if !discounted.is_finite() || discounted < 0.0 {
                errors.push(FieldError::new("discountedPrice", "must be a non-negative number"));
            } else if matches!(self.price, Some(price) if discounted > price) {
                errors.push(FieldError::new("discountedPrice", "must not exceed price"));
            }
        }

        if self.image.as_deref().map_or(true, str::is_empty) {
            errors.push(FieldError::new("image", "is required"));
        }

        let category = match self.category.as_deref() {
            None | Some("") => {
                errors.push(FieldError::new("category", "is required"));
                None
            }
            Some(raw) => match raw.parse::<Category>() {
                Ok(category) => Some(category),
                Err(_) => {
                    errors.push(FieldError::new(
                        "category",
                        "must be one of Mobiles, Laptops, Accessories",
                    ));
                    None
                }
            },
        };

        match (errors.is_empty(), self.price, category) {
            (true, Some(price), Some(category)) => Ok(NewProduct {
                title: title.to_string(),
                description: self.description.unwrap_or_default(),
                price,
                discounted_price: self.discounted_price,
                image: self.image.unwrap_or_default(),
                category,
                in_stock: self.in_stock.unwrap_or(true),
            }),
            _ => Err(ServiceError::Validation(errors)),
        }
    }
}

/// Structured view of a description written as
/// `Specifications: a, b | Features: c, d`.
#[derive(Serialize, Debug, Clone, PartialEq, Default)]
pub struct DescriptionParts {
    pub specifications: Vec<String>,
    pub features: Vec<String>,
}

impl DescriptionParts {
    pub fn parse(description: &str) -> Self {
        let mut parts = description.split(" | ");
        let specifications = parts
            .next()
            .map(|part| split_list(part.strip_prefix("Specifications: ").unwrap_or(part)))
            .unwrap_or_default();
        let features = parts
            .next()
            .map(|part| split_list(part.strip_prefix("Features: ").unwrap_or(part)))
            .unwrap_or_default();

        DescriptionParts { specifications, features }
    }
}

fn split_list(list: &str) -> Vec<String> {
    list.split(", ")
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}

/// A session's cart as stored in the `carts` collection.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub session_id: String,
    #[serde(default)]
    pub items: Vec<LineItem>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

impl Cart {
    pub fn total_items(&self) -> i64 {
        self.items
            .iter()
            .fold(0, |total: i64, item| total.saturating_add(item.quantity))
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub product_id: ObjectId,
    pub quantity: i64,
}

impl LineItem {
    pub fn new(product_id: ObjectId, quantity: i64) -> Self {
        LineItem {
            id: ObjectId::new(),
            product_id,
            quantity,
        }
    }
}
