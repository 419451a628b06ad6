//! Replaces the product catalog with the records in a JSON file.
//!
//! Usage: `seed <products.json>`

use std::env;
use std::fs;
use std::io::{self, ErrorKind};

use log::info;
use mongodb::bson::DateTime;

use tech_store::config::AppConfig;
use tech_store::db;
use tech_store::models::{CreateProductRequest, Product};
use tech_store::store::MongoProductStore;

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let path = env::args()
        .nth(1)
        .ok_or_else(|| io::Error::new(ErrorKind::InvalidInput, "usage: seed <products.json>"))?;
    let requests: Vec<CreateProductRequest> = serde_json::from_str(&fs::read_to_string(&path)?)?;

    // Validate everything before touching the database
    let now = DateTime::now();
    let products = requests
        .into_iter()
        .enumerate()
        .map(|(index, request)| {
            request
                .validate()
                .map(|new| Product::create(new, now))
                .map_err(|e| io::Error::new(ErrorKind::InvalidData, format!("product #{index}: {e}")))
        })
        .collect::<io::Result<Vec<_>>>()?;

    let config = AppConfig::from_env().map_err(io::Error::other)?;
    let database = db::connect(&config).await.map_err(io::Error::other)?;
    let store = MongoProductStore::new(db::products(&database));

    let inserted = store.replace_all(&products).await.map_err(io::Error::other)?;
    info!("{inserted} products inserted into {}", config.database_name);

    for product in &products {
        let discount = product
            .discounted_price
            .map(|price| format!(" (discounted: ${price})"))
            .unwrap_or_default();
        info!("- {} ({}) - ${}{}", product.title, product.category, product.price, discount);
    }

    Ok(())
}
