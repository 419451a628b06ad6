//! HTTP API layer. Every route lives under `/api` except the index.

use actix_web::{web, HttpRequest, HttpResponse, Responder};
use serde_json::json;

use crate::cart::CartService;
use crate::catalog::CatalogService;
use crate::error::ServiceError;

pub mod cart;
pub mod products;

/// Services shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub catalog: CatalogService,
    pub carts: CartService,
}

impl AppState {
    pub fn new(catalog: CatalogService, carts: CartService) -> Self {
        AppState { catalog, carts }
    }
}

async fn index() -> impl Responder {
    HttpResponse::Ok().json(json!({
        "message": "Tech Store API is running!",
        "endpoints": {
            "products": "/api/products",
            "cart": "/api/cart",
        },
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

fn json_error(err: actix_web::error::JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    ServiceError::BadRequest(format!("Invalid JSON body: {err}")).into()
}

fn query_error(err: actix_web::error::QueryPayloadError, _req: &HttpRequest) -> actix_web::Error {
    ServiceError::BadRequest(format!("Invalid query string: {err}")).into()
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(json_error))
        .app_data(web::QueryConfig::default().error_handler(query_error))
        .route("/", web::get().to(index))
        .service(
            web::scope("/api")
                .service(
                    web::scope("/products")
                        .route("", web::get().to(products::list_products))
                        .route("", web::post().to(products::create_product))
                        .route("/featured", web::get().to(products::featured_products))
                        .route("/{id}", web::get().to(products::get_product)),
                )
                .service(
                    web::scope("/cart")
                        .route("/add", web::post().to(cart::add_to_cart))
                        .route("/update", web::put().to(cart::update_cart_item))
                        .route("/{session_id}", web::get().to(cart::get_cart))
                        .route("/{session_id}", web::delete().to(cart::clear_cart))
                        .route(
                            "/{session_id}/item/{product_id}",
                            web::delete().to(cart::remove_from_cart),
                        ),
                ),
        );
}
