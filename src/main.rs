//! Linklet - URL shortening and redirection service
//!
//! Startup order: environment → config → logging → database +
//! migrations → caches/limiter/executor → services → HTTP server.

use std::sync::Arc;

use actix_web::{App, HttpServer, web};
use color_eyre::Result;
use dotenv::dotenv;
use tracing::{info, warn};

use linklet::api;
use linklet::cache::build_cache;
use linklet::config::{get_config, init_config};
use linklet::ratelimit::RateLimiter;
use linklet::services::ai::{AiService, OllamaClient};
use linklet::services::sweeper::spawn_expiry_sweeper;
use linklet::services::{
    AnalyticsExecutor, ClickTracker, GeoIpClient, MetadataFetcher, Resolver, Shortener,
};
use linklet::storage::{AnnotationStore, ClickStore, MappingStore, connect, run_migrations};
use linklet::system::logging::init_logging;

#[actix_web::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    dotenv().ok();

    init_config();
    let config = get_config();

    let logging = init_logging(&config.logging);
    let _log_guard = logging.guard;
    if let Some(warning) = logging.warning {
        warn!("{}", warning);
    }

    // 数据库与迁移
    let db = connect(&config.database.database_url).await?;
    run_migrations(&db).await?;

    let mappings = MappingStore::new(db.clone());
    let clicks = ClickStore::new(db.clone());
    let annotations = AnnotationStore::new(db, config.ollama.cache_days);

    // 缓存、限流、分析执行器
    let cache = build_cache(&config).await;
    let limiter = Arc::new(
        RateLimiter::new(
            &config.rate_limit.redis_url,
            config.rate_limit.max_requests,
            config.rate_limit.window_secs,
        )
        .await,
    );
    let executor = AnalyticsExecutor::start(
        config.analytics_workers(),
        config.analytics.queue_capacity,
    );

    // 外部协作方
    let geoip = Arc::new(GeoIpClient::new());
    let metadata = Arc::new(MetadataFetcher::new(
        config.metadata.fetch_timeout_secs,
        config.metadata.max_body_size,
    ));
    let ollama = Arc::new(OllamaClient::new(
        &config.ollama.base_url,
        &config.ollama.model,
    ));

    // 服务编排
    let ai = AiService::new(
        ollama,
        annotations,
        mappings.clone(),
        Arc::clone(&executor),
    );
    let resolver = Arc::new(Resolver::new(mappings.clone(), Arc::clone(&cache)));
    let tracker = ClickTracker::new(
        mappings.clone(),
        clicks.clone(),
        geoip,
        Arc::clone(&executor),
    );
    let shortener = Shortener::new(
        mappings.clone(),
        clicks,
        Arc::clone(&cache),
        metadata,
        ai,
        &config.server.base_url,
    );

    spawn_expiry_sweeper(mappings);

    let bind_addr = (config.server.host.clone(), config.server.port);
    info!(
        "Linklet listening on {}:{} (base URL {})",
        bind_addr.0, bind_addr.1, config.server.base_url
    );

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(Arc::clone(&resolver)))
            .app_data(web::Data::new(tracker.clone()))
            .app_data(web::Data::new(shortener.clone()))
            .service(api::api_routes())
            .service(api::redirect_routes(Arc::clone(&limiter)))
    })
    .bind(bind_addr)?
    .run()
    .await?;

    Ok(())
}
