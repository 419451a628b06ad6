use actix_web::{web, HttpResponse};

use crate::catalog::{ListingParams, ListingQuery};
use crate::error::ServiceError;
use crate::handlers::AppState;
use crate::models::CreateProductRequest;
use crate::response::{CountMeta, ListingMeta, Success};

pub async fn list_products(
    state: web::Data<AppState>,
    params: web::Query<ListingParams>,
) -> Result<HttpResponse, ServiceError> {
    let query = ListingQuery::from_params(&params)?;
    let page = state.catalog.list_products(&query).await?;

    let meta = ListingMeta {
        count: page.items.len(),
        total: page.total_count,
        page: page.page,
        total_pages: page.total_pages,
        has_next_page: page.has_next_page,
        has_prev_page: page.has_prev_page,
        sort_by: query.sort.as_str(),
    };
    Ok(HttpResponse::Ok().json(Success::data(page.items).with_meta(meta)))
}

pub async fn featured_products(state: web::Data<AppState>) -> Result<HttpResponse, ServiceError> {
    let products = state.catalog.featured_products().await?;
    let meta = CountMeta {
        count: products.len(),
    };
    Ok(HttpResponse::Ok().json(Success::data(products).with_meta(meta)))
}

pub async fn get_product(
    state: web::Data<AppState>,
    id: web::Path<String>,
) -> Result<HttpResponse, ServiceError> {
    let product = state.catalog.product_by_id(&id.into_inner()).await?;
    Ok(HttpResponse::Ok().json(Success::data(product)))
}

pub async fn create_product(
    state: web::Data<AppState>,
    data: web::Json<CreateProductRequest>,
) -> Result<HttpResponse, ServiceError> {
    let product = state.catalog.create_product(data.into_inner()).await?;
    Ok(HttpResponse::Created().json(Success::data(product).with_message("Product created successfully")))
}
