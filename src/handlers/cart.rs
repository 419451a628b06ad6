use actix_web::{web, HttpResponse};
use serde::Deserialize;

use crate::error::ServiceError;
use crate::handlers::AppState;
use crate::response::Success;
use crate::session::SessionId;

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct AddToCartRequest {
    pub session_id: Option<String>,
    pub product_id: Option<String>,
    pub quantity: Option<i64>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCartRequest {
    pub session_id: Option<String>,
    pub product_id: Option<String>,
    pub quantity: Option<i64>,
}

fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

pub async fn add_to_cart(
    state: web::Data<AppState>,
    data: web::Json<AddToCartRequest>,
) -> Result<HttpResponse, ServiceError> {
    let data = data.into_inner();
    let (Some(session_id), Some(product_id)) = (present(data.session_id), present(data.product_id))
    else {
        return Err(ServiceError::BadRequest(
            "Session ID and Product ID are required".to_string(),
        ));
    };

    let session = SessionId::parse(&session_id)?;
    let added = state
        .carts
        .add_item(&session, &product_id, data.quantity.unwrap_or(1))
        .await?;

    Ok(HttpResponse::Ok().json(Success::data(added).with_message("Item added to cart")))
}

pub async fn get_cart(
    state: web::Data<AppState>,
    session_id: web::Path<String>,
) -> Result<HttpResponse, ServiceError> {
    let session = SessionId::parse(&session_id)?;
    let cart = state.carts.get_cart(&session).await?;
    Ok(HttpResponse::Ok().json(Success::data(cart)))
}

pub async fn update_cart_item(
    state: web::Data<AppState>,
    data: web::Json<UpdateCartRequest>,
) -> Result<HttpResponse, ServiceError> {
    let data = data.into_inner();
    let (Some(session_id), Some(product_id), Some(quantity)) =
        (present(data.session_id), present(data.product_id), data.quantity)
    else {
        return Err(ServiceError::BadRequest(
            "Session ID, Product ID, and quantity are required".to_string(),
        ));
    };

    let session = SessionId::parse(&session_id)?;
    state
        .carts
        .update_item_quantity(&session, &product_id, quantity)
        .await?;

    Ok(HttpResponse::Ok().json(Success::message("Cart updated successfully")))
}

pub async fn remove_from_cart(
    state: web::Data<AppState>,
    path: web::Path<(String, String)>,
) -> Result<HttpResponse, ServiceError> {
    let (session_id, product_id) = path.into_inner();
    let session = SessionId::parse(&session_id)?;
    state.carts.remove_item(&session, &product_id).await?;
    Ok(HttpResponse::Ok().json(Success::message("Item removed from cart")))
}

pub async fn clear_cart(
    state: web::Data<AppState>,
    session_id: web::Path<String>,
) -> Result<HttpResponse, ServiceError> {
    let session = SessionId::parse(&session_id)?;
    state.carts.clear_cart(&session).await?;
    Ok(HttpResponse::Ok().json(Success::message("Cart cleared successfully")))
}
