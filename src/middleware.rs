use actix_web::body::EitherBody;
use actix_web::dev::{ServiceRequest, ServiceResponse, Transform};
use actix_web::http::header::{self, HeaderMap, HeaderValue};
use actix_web::http::Method;
use actix_web::{Error, HttpResponse};
use actix_service::{forward_ready, Service};
use futures::future::{ok, LocalBoxFuture, Ready};
use std::rc::Rc;

const ALLOWED_METHODS: &str = "GET, POST, PUT, DELETE, OPTIONS";
const ALLOWED_HEADERS: &str = "Content-Type";

fn apply_cors_headers(headers: &mut HeaderMap, origin: &HeaderValue) {
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin.clone());
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(ALLOWED_METHODS),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(ALLOWED_HEADERS),
    );
}

// Middleware factory
#[derive(Clone)]
pub struct Cors {
    origin: HeaderValue,
}

impl Cors {
    pub fn new(origin: HeaderValue) -> Self {
        Cors { origin }
    }
}

impl<S, B> Transform<S, ServiceRequest> for Cors
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = CorsMiddleware<S>;
    type InitError = ();

    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(CorsMiddleware {
            service: Rc::new(service),
            origin: self.origin.clone(),
        })
    }
}

pub struct CorsMiddleware<S> {
    service: Rc<S>,
    origin: HeaderValue,
}

impl<S, B> Service<ServiceRequest> for CorsMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let origin = self.origin.clone();
        let service = self.service.clone();

        Box::pin(async move {
            // Preflight requests never reach a handler
            if req.method() == Method::OPTIONS {
                let mut response = HttpResponse::NoContent().finish();
                apply_cors_headers(response.headers_mut(), &origin);
                return Ok(req.into_response(response).map_into_right_body());
            }

            let mut response = service.call(req).await?;
            apply_cors_headers(response.headers_mut(), &origin);
            Ok(response.map_into_left_body())
        })
    }
}
