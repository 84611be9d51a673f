// 重定向端点：快路径 + 密码门
//
// 所有响应都带 Cache-Control: no-cache, no-store, must-revalidate，
// 速率限制头由挂在本 scope 上的中间件补齐。点击追踪在 302 写出
// 之后异步进行，请求上下文以快照形式传递。

use std::sync::Arc;

use actix_web::http::StatusCode;
use actix_web::{HttpRequest, HttpResponse, Responder, web};
use tracing::debug;

use crate::api::types::{PasswordVerifyRequest, RedirectQuery};
use crate::ratelimit::{RateLimitMiddleware, RateLimiter};
use crate::services::click_tracker::{ClickSnapshot, ClickTracker};
use crate::services::resolver::{ResolveOutcome, Resolver};
use crate::utils::is_valid_effective_key;

const NO_STORE: (&str, &str) = ("Cache-Control", "no-cache, no-store, must-revalidate");

pub struct RedirectService;

impl RedirectService {
    /// GET /{key}[?password=…]
    pub async fn handle_redirect(
        req: HttpRequest,
        path: web::Path<String>,
        query: web::Query<RedirectQuery>,
        resolver: web::Data<Arc<Resolver>>,
        tracker: web::Data<ClickTracker>,
    ) -> impl Responder {
        let key = path.into_inner();

        if !is_valid_effective_key(&key) {
            debug!("Invalid redirect key rejected: {}", key);
            return Self::json_error(StatusCode::NOT_FOUND, "Not Found", "Short URL not found");
        }

        let password = query.password.as_deref().filter(|p| !p.is_empty());

        match resolver.resolve(&key, password).await {
            Ok(ResolveOutcome::Redirect { original_url, .. }) => {
                // 快照必须在请求线程上截取，后台任务不碰请求对象
                let snapshot = ClickSnapshot::capture(&req);
                tracker.track(&key, snapshot).await;
                Self::found(&original_url)
            }
            Ok(ResolveOutcome::NeedsPassword) => HttpResponse::Unauthorized()
                .insert_header(("Content-Type", "text/html; charset=utf-8"))
                .insert_header(NO_STORE)
                .body(password_form_html(&key, None)),
            Ok(ResolveOutcome::BadPassword) => HttpResponse::Unauthorized()
                .insert_header(("Content-Type", "text/html; charset=utf-8"))
                .insert_header(NO_STORE)
                .body(password_form_html(
                    &key,
                    Some("Invalid password. Please try again."),
                )),
            Ok(ResolveOutcome::NotFound) => {
                Self::json_error(StatusCode::NOT_FOUND, "Not Found", "Short URL not found")
            }
            Ok(ResolveOutcome::Expired) => {
                Self::json_error(StatusCode::GONE, "URL Expired", "This short URL has expired")
            }
            Ok(ResolveOutcome::Inactive) => Self::json_error(
                StatusCode::FORBIDDEN,
                "URL Inactive",
                "This short URL has been deactivated",
            ),
            Err(e) => {
                tracing::error!("Redirect resolution failed for {}: {}", key, e);
                Self::json_error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Error",
                    "Internal server error",
                )
            }
        }
    }

    /// POST /{key}/unlock，密码在 JSON body 中
    pub async fn handle_unlock(
        req: HttpRequest,
        path: web::Path<String>,
        body: web::Json<PasswordVerifyRequest>,
        resolver: web::Data<Arc<Resolver>>,
        tracker: web::Data<ClickTracker>,
    ) -> impl Responder {
        let key = path.into_inner();

        if !is_valid_effective_key(&key) {
            return Self::json_error(StatusCode::NOT_FOUND, "Not Found", "Short URL not found");
        }

        match resolver.resolve(&key, Some(&body.password)).await {
            Ok(ResolveOutcome::Redirect { original_url, .. }) => {
                let snapshot = ClickSnapshot::capture(&req);
                tracker.track(&key, snapshot).await;
                Self::found(&original_url)
            }
            Ok(ResolveOutcome::NeedsPassword) | Ok(ResolveOutcome::BadPassword) => {
                Self::json_error(
                    StatusCode::UNAUTHORIZED,
                    "Invalid Password",
                    "The supplied password is incorrect",
                )
            }
            Ok(ResolveOutcome::NotFound) => {
                Self::json_error(StatusCode::NOT_FOUND, "Not Found", "Short URL not found")
            }
            Ok(ResolveOutcome::Expired) => {
                Self::json_error(StatusCode::GONE, "URL Expired", "This short URL has expired")
            }
            Ok(ResolveOutcome::Inactive) => Self::json_error(
                StatusCode::FORBIDDEN,
                "URL Inactive",
                "This short URL has been deactivated",
            ),
            Err(e) => {
                tracing::error!("Unlock failed for {}: {}", key, e);
                Self::json_error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Error",
                    "Internal server error",
                )
            }
        }
    }

    #[inline]
    fn found(location: &str) -> HttpResponse {
        HttpResponse::Found()
            .insert_header(("Location", location))
            .insert_header(NO_STORE)
            .finish()
    }

    #[inline]
    fn json_error(status: StatusCode, error: &str, message: &str) -> HttpResponse {
        HttpResponse::build(status)
            .insert_header(NO_STORE)
            .json(serde_json::json!({
                "error": error,
                "message": message,
                "status": status.as_u16(),
            }))
    }
}

/// 密码门的 HTML 表单页（GET 流程专用；unlock 走 JSON）
fn password_form_html(key: &str, error: Option<&str>) -> String {
    let error_html = error
        .map(|msg| {
            format!(
                "<div class=\"error\"><strong>&#9888;</strong> {}</div>",
                msg
            )
        })
        .unwrap_or_default();

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<title>Password Required</title>
<style>
body {{ font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
       background: #f3f4f6; margin: 0; min-height: 100vh;
       display: flex; align-items: center; justify-content: center; }}
.container {{ background: white; padding: 40px; border-radius: 12px;
             box-shadow: 0 8px 30px rgba(0,0,0,0.12); max-width: 400px; width: 100%; }}
h1 {{ color: #1f2937; margin: 0 0 10px 0; font-size: 24px; }}
.subtitle {{ color: #6b7280; margin: 0 0 24px 0; font-size: 14px; }}
.error {{ color: #dc2626; background: #fee2e2; padding: 12px; border-radius: 6px;
         margin-bottom: 20px; font-size: 14px; }}
label {{ display: block; margin-bottom: 8px; color: #374151; font-size: 14px; }}
input {{ width: 100%; padding: 12px; border: 2px solid #e5e7eb; border-radius: 8px;
        font-size: 16px; box-sizing: border-box; }}
button {{ width: 100%; margin-top: 20px; padding: 14px; background: #4f46e5; color: white;
         border: none; border-radius: 8px; font-size: 16px; cursor: pointer; }}
</style>
</head>
<body>
<div class="container">
<h1>Password Required</h1>
<p class="subtitle">This link is password protected. Please enter the password to continue.</p>
{error_html}
<form method="GET" action="/{key}">
<label for="password">Password</label>
<input type="password" id="password" name="password" placeholder="Enter password" required autofocus>
<button type="submit">Unlock &amp; Continue</button>
</form>
</div>
</body>
</html>"#
    )
}

/// 重定向路由（挂载限流中间件，只作用于本 scope）
pub fn redirect_routes(limiter: Arc<RateLimiter>) -> impl actix_web::dev::HttpServiceFactory {
    web::scope("")
        .wrap(RateLimitMiddleware::new(limiter))
        .route("/{key}", web::get().to(RedirectService::handle_redirect))
        .route("/{key}", web::head().to(RedirectService::handle_redirect))
        .route(
            "/{key}/unlock",
            web::post().to(RedirectService::handle_unlock),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_form_contains_action() {
        let html = password_form_html("abc123", None);
        assert!(html.contains("action=\"/abc123\""));
        assert!(!html.contains("Invalid password"));

        let html = password_form_html("abc123", Some("Invalid password. Please try again."));
        assert!(html.contains("Invalid password. Please try again."));
    }
}
