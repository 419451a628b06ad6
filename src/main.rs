use std::io;
use std::sync::Arc;

use actix_web::middleware::Logger;
use actix_web::{web, App, HttpServer};
use log::info;

use tech_store::cart::CartService;
use tech_store::catalog::CatalogService;
use tech_store::config::AppConfig;
use tech_store::db;
use tech_store::handlers::{self, AppState};
use tech_store::middleware::Cors;
use tech_store::store::{MongoCartStore, MongoProductStore};

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenv::dotenv().ok(); // Load environment variables from .env file
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = AppConfig::from_env().map_err(io::Error::other)?;

    // Connect to the MongoDB database
    let database = db::connect(&config).await.map_err(io::Error::other)?;
    db::ensure_indexes(&database).await.map_err(io::Error::other)?;
    info!("connected to database {}", config.database_name);

    let products = Arc::new(MongoProductStore::new(db::products(&database)));
    let carts = Arc::new(MongoCartStore::new(db::carts(&database)));
    let state = web::Data::new(AppState::new(
        CatalogService::new(products.clone()),
        CartService::new(products, carts),
    ));
    let cors = Cors::new(config.cors_origin.clone());

    info!("tech store listening on {}:{}", config.host, config.port);
    HttpServer::new(move || {
        App::new()
            .wrap(cors.clone())
            .wrap(Logger::default())
            .app_data(state.clone()) // Share the services with handlers
            .configure(handlers::configure)
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await
}
