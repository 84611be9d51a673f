//! 重定向路径的限流中间件
//!
//! 仅挂载在重定向 scope 上；API 路径不受限。放行与拒绝的响应
//! 都带 X-RateLimit-* 头，拒绝时额外带 Retry-After。

use std::rc::Rc;
use std::sync::Arc;

use actix_service::{Service, Transform};
use actix_web::body::EitherBody;
use actix_web::http::StatusCode;
use actix_web::http::header::{HeaderName, HeaderValue};
use actix_web::{
    Error, HttpResponse,
    dev::{ServiceRequest, ServiceResponse},
};
use futures_util::future::{LocalBoxFuture, Ready, ready};

use super::RateLimiter;
use crate::utils::ip::extract_forwarded_ip;

/// 限流中间件工厂
#[derive(Clone)]
pub struct RateLimitMiddleware {
    limiter: Arc<RateLimiter>,
}

impl RateLimitMiddleware {
    pub fn new(limiter: Arc<RateLimiter>) -> Self {
        Self { limiter }
    }
}

impl<S, B> Transform<S, ServiceRequest> for RateLimitMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = RateLimitService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RateLimitService {
            service: Rc::new(service),
            limiter: Arc::clone(&self.limiter),
        }))
    }
}

pub struct RateLimitService<S> {
    service: Rc<S>,
    limiter: Arc<RateLimiter>,
}

impl<S, B> Service<ServiceRequest> for RateLimitService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(
        &self,
        ctx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.service.poll_ready(ctx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let srv = self.service.clone();
        let limiter = Arc::clone(&self.limiter);

        // 客户端 IP：X-Forwarded-For 第一个元素 → X-Real-IP → 对端地址
        let client_ip = extract_forwarded_ip(req.headers())
            .or_else(|| req.peer_addr().map(|a| a.ip().to_string()))
            .unwrap_or_else(|| "unknown".to_string());

        Box::pin(async move {
            let allowed = limiter.is_allowed(&client_ip).await;
            let remaining = limiter.remaining(&client_ip).await;
            let reset = limiter.reset_in_seconds(&client_ip).await;

            if !allowed {
                let retry_after = if reset > 0 {
                    reset
                } else {
                    // TTL 读取失败时按整个窗口上报
                    limiter.window_secs() as i64
                };

                let mut builder = HttpResponse::build(StatusCode::TOO_MANY_REQUESTS);
                builder
                    .insert_header(("X-RateLimit-Limit", limiter.limit().to_string()))
                    .insert_header(("X-RateLimit-Remaining", remaining.to_string()))
                    .insert_header(("X-RateLimit-Reset", reset.to_string()))
                    .insert_header(("Retry-After", retry_after.to_string()))
                    .insert_header(("Cache-Control", "no-cache, no-store, must-revalidate"));

                let response = builder.json(serde_json::json!({
                    "error": "Rate Limit Exceeded",
                    "message": "Too many requests. Please try again later.",
                    "status": 429,
                }));

                return Ok(req.into_response(response).map_into_right_body());
            }

            let mut res = srv.call(req).await?.map_into_left_body();

            let headers = res.headers_mut();
            if let Ok(v) = HeaderValue::from_str(&limiter.limit().to_string()) {
                headers.insert(HeaderName::from_static("x-ratelimit-limit"), v);
            }
            if let Ok(v) = HeaderValue::from_str(&remaining.to_string()) {
                headers.insert(HeaderName::from_static("x-ratelimit-remaining"), v);
            }
            if reset > 0 {
                if let Ok(v) = HeaderValue::from_str(&reset.to_string()) {
                    headers.insert(HeaderName::from_static("x-ratelimit-reset"), v);
                }
            }

            Ok(res)
        })
    }
}
