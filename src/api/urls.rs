// /api/urls 下的管理与查询端点
//
// 创建、批量创建（JSON 与 CSV 上传）、列表、统计、维度分析、
// 二维码、预览、密码保护查询。API 路径不做速率限制。

use actix_multipart::Multipart;
use actix_web::{HttpResponse, web};
use futures_util::TryStreamExt;
use tracing::{info, warn};

use crate::api::types::{BulkCreateRequest, CreateUrlRequest, QrCodeQuery};
use crate::errors::LinkletError;
use crate::services::Shortener;
use crate::services::qr;
use crate::utils::csv_parser::{MAX_CSV_BYTES, parse_csv_urls};

pub struct UrlApiService;

impl UrlApiService {
    /// POST /api/urls
    pub async fn create(
        shortener: web::Data<Shortener>,
        request: web::Json<CreateUrlRequest>,
    ) -> Result<HttpResponse, LinkletError> {
        info!("Creating short URL for: {}", request.original_url);
        let response = shortener.create(&request).await?;
        Ok(HttpResponse::Created().json(response))
    }

    /// POST /api/urls/bulk（≤100 条）
    pub async fn create_bulk(
        shortener: web::Data<Shortener>,
        request: web::Json<BulkCreateRequest>,
    ) -> Result<HttpResponse, LinkletError> {
        if request.urls.is_empty() {
            return Err(LinkletError::validation("Bulk request contains no URLs"));
        }
        if request.urls.len() > 100 {
            return Err(LinkletError::validation(
                "Bulk request exceeds the limit of 100 URLs",
            ));
        }

        info!("Bulk creating {} short URLs", request.urls.len());
        let response = shortener.create_bulk(&request).await;
        info!(
            "Bulk creation completed: {} success, {} failed",
            response.success_count, response.failed_count
        );
        Ok(HttpResponse::Created().json(response))
    }

    /// POST /api/urls/bulk/csv（multipart 上传，≤1MB，≤100 行）
    pub async fn create_bulk_csv(
        shortener: web::Data<Shortener>,
        mut payload: Multipart,
    ) -> Result<HttpResponse, LinkletError> {
        let mut file_bytes: Vec<u8> = Vec::new();
        let mut fetch_metadata = false;
        let mut enable_ai_analysis = false;

        while let Some(mut field) = payload
            .try_next()
            .await
            .map_err(|e| LinkletError::validation(format!("Malformed multipart payload: {}", e)))?
        {
            let name = field
                .content_disposition()
                .get_name()
                .unwrap_or_default()
                .to_string();

            let mut data: Vec<u8> = Vec::new();
            while let Some(chunk) = field.try_next().await.map_err(|e| {
                LinkletError::validation(format!("Failed to read multipart field: {}", e))
            })? {
                if data.len() + chunk.len() > MAX_CSV_BYTES {
                    return Err(LinkletError::validation(format!(
                        "CSV file exceeds maximum size of {} bytes",
                        MAX_CSV_BYTES
                    )));
                }
                data.extend_from_slice(&chunk);
            }

            match name.as_str() {
                "file" => file_bytes = data,
                "fetchMetadata" => {
                    fetch_metadata = String::from_utf8_lossy(&data).trim().eq_ignore_ascii_case("true")
                }
                "enableAiAnalysis" => {
                    enable_ai_analysis =
                        String::from_utf8_lossy(&data).trim().eq_ignore_ascii_case("true")
                }
                other => warn!("Ignoring unknown multipart field: {}", other),
            }
        }

        if file_bytes.is_empty() {
            return Err(LinkletError::validation("CSV file is required"));
        }

        let urls = parse_csv_urls(&file_bytes)?;
        info!("Bulk creating {} short URLs from CSV upload", urls.len());

        let bulk = BulkCreateRequest {
            urls: urls
                .into_iter()
                .map(|original_url| CreateUrlRequest {
                    original_url,
                    custom_alias: None,
                    password: None,
                    expires_at: None,
                    fetch_metadata,
                    enable_ai_analysis,
                    generate_qr_code: false,
                })
                .collect(),
            fetch_metadata: Some(fetch_metadata),
            enable_ai_analysis: Some(enable_ai_analysis),
        };

        let response = shortener.create_bulk(&bulk).await;
        info!(
            "Bulk CSV creation completed: {} success, {} failed",
            response.success_count, response.failed_count
        );
        Ok(HttpResponse::Created().json(response))
    }

    /// GET /api/urls — 最近 20 条活跃映射
    pub async fn list(shortener: web::Data<Shortener>) -> Result<HttpResponse, LinkletError> {
        let items = shortener.list_recent().await?;
        Ok(HttpResponse::Ok().json(items))
    }

    /// GET /api/urls/{key}/stats
    pub async fn stats(
        shortener: web::Data<Shortener>,
        path: web::Path<String>,
    ) -> Result<HttpResponse, LinkletError> {
        let stats = shortener.stats(&path).await?;
        Ok(HttpResponse::Ok().json(stats))
    }

    /// GET /api/urls/{key}/analytics
    pub async fn analytics(
        shortener: web::Data<Shortener>,
        path: web::Path<String>,
    ) -> Result<HttpResponse, LinkletError> {
        let analytics = shortener.analytics(&path).await?;
        Ok(HttpResponse::Ok().json(analytics))
    }

    /// GET /api/urls/{key}/qrcode?size=…&fgColor=…&bgColor=…
    pub async fn qrcode(
        shortener: web::Data<Shortener>,
        path: web::Path<String>,
        query: web::Query<QrCodeQuery>,
    ) -> Result<HttpResponse, LinkletError> {
        let short_url = shortener.short_url_for(&path).await?;

        let size = query.size.unwrap_or(qr::DEFAULT_SIZE);
        let fg = qr::parse_color(query.fg_color.as_deref().unwrap_or(""), [0, 0, 0]);
        let bg = qr::parse_color(query.bg_color.as_deref().unwrap_or(""), [255, 255, 255]);

        let png = qr::render_png(&short_url, size, fg, bg)?;
        Ok(HttpResponse::Ok().content_type("image/png").body(png))
    }

    /// GET /api/urls/{key}/preview — 密码门前的装饰信息
    pub async fn preview(
        shortener: web::Data<Shortener>,
        path: web::Path<String>,
    ) -> Result<HttpResponse, LinkletError> {
        let preview = shortener.preview(&path).await?;
        Ok(HttpResponse::Ok().json(preview))
    }

    /// GET /api/urls/{key}/protected
    pub async fn protected(
        shortener: web::Data<Shortener>,
        path: web::Path<String>,
    ) -> Result<HttpResponse, LinkletError> {
        let protected = shortener.is_protected(&path).await?;
        Ok(HttpResponse::Ok().json(protected))
    }
}

/// /api/urls 路由配置
pub fn api_routes() -> actix_web::Scope {
    web::scope("/api/urls")
        .route("", web::post().to(UrlApiService::create))
        .route("", web::get().to(UrlApiService::list))
        .route("/bulk", web::post().to(UrlApiService::create_bulk))
        .route("/bulk/csv", web::post().to(UrlApiService::create_bulk_csv))
        .route("/{key}/stats", web::get().to(UrlApiService::stats))
        .route("/{key}/analytics", web::get().to(UrlApiService::analytics))
        .route("/{key}/qrcode", web::get().to(UrlApiService::qrcode))
        .route("/{key}/preview", web::get().to(UrlApiService::preview))
        .route("/{key}/protected", web::get().to(UrlApiService::protected))
}
