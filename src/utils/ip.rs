//! IP 地址处理工具
//!
//! 提供统一的客户端 IP 提取（X-Forwarded-For → X-Real-IP → 连接对端）
//! 和私有地址检测（GeoIP 查询前过滤）。

use std::net::IpAddr;

use actix_web::HttpRequest;
use actix_web::http::header::HeaderMap;

/// 检查 IP 是否为私有地址或 localhost
///
/// 覆盖 RFC 1918、loopback、link-local，以及 IPv6 的
/// fc00::/7 (ULA) 与 fe80::/10 (link-local)。
pub fn is_private_or_local(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_private() || v4.is_loopback() || v4.is_link_local(),
        IpAddr::V6(v6) => {
            v6.is_loopback()
                || (v6.segments()[0] & 0xfe00) == 0xfc00 // fc00::/7 (包含 fc00 和 fd00)
                || (v6.segments()[0] & 0xffc0) == 0xfe80 // fe80::/10 (link-local)
        }
    }
}

/// 字符串形式的 IP 是否值得做 GeoIP 查询（公网地址才查）
pub fn is_lookup_worthy(ip: &str) -> bool {
    match ip.parse::<IpAddr>() {
        Ok(addr) => !is_private_or_local(&addr),
        // 无法解析的字符串（如 "localhost"）不查
        Err(_) => false,
    }
}

/// 从请求头提取转发的客户端 IP（X-Forwarded-For 优先，取第一个元素）
pub fn extract_forwarded_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|h| h.to_str().ok())
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        })
}

/// 提取真实客户端 IP
///
/// 优先级：X-Forwarded-For 第一个元素 → X-Real-IP → socket 对端地址
pub fn extract_client_ip(req: &HttpRequest) -> Option<String> {
    extract_forwarded_ip(req.headers())
        .or_else(|| req.peer_addr().map(|addr| addr.ip().to_string()))
}
