use mongodb::bson::doc;
use mongodb::options::{ClientOptions, IndexOptions};
use mongodb::{Client, Collection, Database, IndexModel};

use crate::config::AppConfig;
use crate::models::{Cart, Product};

pub async fn connect(config: &AppConfig) -> Result<Database, mongodb::error::Error> {
    // Parse the connection string into client options
    let client_options = ClientOptions::parse(&config.database_url).await?;

    let client = Client::with_options(client_options)?;

    Ok(client.database(&config.database_name))
}

pub fn products(db: &Database) -> Collection<Product> {
    db.collection("products")
}

pub fn carts(db: &Database) -> Collection<Cart> {
    db.collection("carts")
}

/// One cart per session; the cart store's upsert path relies on this index.
pub async fn ensure_indexes(db: &Database) -> Result<(), mongodb::error::Error> {
    let index = IndexModel::builder()
        .keys(doc! { "sessionId": 1 })
        .options(IndexOptions::builder().unique(true).build())
        .build();
    carts(db).create_index(index, None).await?;
    Ok(())
}
