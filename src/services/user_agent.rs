//! User-Agent 解析
//!
//! woothee 提供浏览器/系统识别；设备分类在其 family 基础上
//! 叠加 token 启发式（爬虫、移动、平板、桌面）。

use woothee::parser::Parser;

use crate::storage::models::DeviceType;

/// 解析后的 UA 维度，字段允许缺失
#[derive(Debug, Clone, Default)]
pub struct ParsedUserAgent {
    pub browser_name: Option<String>,
    pub browser_version: Option<String>,
    pub os_name: Option<String>,
    pub os_version: Option<String>,
    pub device_type: DeviceType,
}

const BOT_TOKENS: &[&str] = &[
    "bot", "crawler", "spider", "scraper", "crawling", "headless", "phantom", "selenium",
    "webdriver",
];

const MOBILE_TOKENS: &[&str] = &[
    "mobile",
    "android",
    "iphone",
    "ipod",
    "blackberry",
    "windows phone",
    "opera mini",
    "opera mobi",
    "iemobile",
];

const TABLET_TOKENS: &[&str] = &[
    "tablet",
    "ipad",
    "playbook",
    "kindle",
    "xoom",
    "galaxy tab",
    "nexus 7",
    "nexus 9",
    "nexus 10",
    "sm-t",
];

const DESKTOP_TOKENS: &[&str] = &["windows", "macintosh", "linux", "x11", "unix", "bsd"];

/// 解析完整 UA 字符串
pub fn parse_user_agent(ua: Option<&str>) -> ParsedUserAgent {
    let Some(ua) = ua.filter(|s| !s.is_empty()) else {
        return ParsedUserAgent::default();
    };

    let parser = Parser::new();
    let result = parser.parse(ua);

    let mut parsed = ParsedUserAgent {
        device_type: classify_device(ua, result.as_ref().map(|r| r.category)),
        ..Default::default()
    };

    if let Some(result) = result {
        if result.name != "UNKNOWN" {
            parsed.browser_name = Some(result.name.to_string());
        }
        if !result.version.is_empty() && result.version != "UNKNOWN" {
            parsed.browser_version = Some(result.version.to_string());
        }
        if result.os != "UNKNOWN" {
            parsed.os_name = Some(result.os.to_string());
        }
        if !result.os_version.is_empty() && result.os_version != "UNKNOWN" {
            parsed.os_version = Some(result.os_version.to_string());
        }
    }

    parsed
}

/// 设备分类
///
/// 优先级：已知设备 family → 爬虫 token → 移动 token（含平板覆写）
/// → 平板 token → 桌面 token → Unknown
pub fn classify_device(ua: &str, woothee_category: Option<&str>) -> DeviceType {
    let ua = ua.to_lowercase();
    if ua.is_empty() {
        return DeviceType::Unknown;
    }

    // 1. 明确的设备 family
    if ua.contains("iphone") || ua.contains("ipod") {
        return DeviceType::Mobile;
    }
    if ua.contains("ipad") || ua.contains("kindle") || ua.contains("playbook") {
        return DeviceType::Tablet;
    }
    if ua.contains("android") {
        // Android 既有手机也有平板，看平板标记
        if TABLET_TOKENS.iter().any(|t| ua.contains(t)) {
            return DeviceType::Tablet;
        }
        return DeviceType::Mobile;
    }
    if ua.contains("blackberry") || ua.contains("windows phone") {
        return DeviceType::Mobile;
    }

    // 2. 爬虫
    if woothee_category == Some("crawler") || BOT_TOKENS.iter().any(|t| ua.contains(t)) {
        return DeviceType::Bot;
    }

    // 3. 移动 token（先排除平板标记）
    if MOBILE_TOKENS.iter().any(|t| ua.contains(t)) {
        if TABLET_TOKENS.iter().any(|t| ua.contains(t)) {
            return DeviceType::Tablet;
        }
        return DeviceType::Mobile;
    }

    // 4. 平板 token
    if TABLET_TOKENS.iter().any(|t| ua.contains(t)) {
        return DeviceType::Tablet;
    }

    // 5. 桌面 token
    if DESKTOP_TOKENS.iter().any(|t| ua.contains(t)) {
        return DeviceType::Desktop;
    }

    DeviceType::Unknown
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHROME_WIN: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
    const SAFARI_IPHONE: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Mobile/15E148 Safari/604.1";
    const IPAD: &str = "Mozilla/5.0 (iPad; CPU OS 16_6 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/16.6 Mobile/15E148 Safari/604.1";
    const ANDROID_PHONE: &str = "Mozilla/5.0 (Linux; Android 14; Pixel 8) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Mobile Safari/537.36";
    const ANDROID_TABLET: &str = "Mozilla/5.0 (Linux; Android 13; SM-T870) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36";
    const GOOGLEBOT: &str = "Mozilla/5.0 (compatible; Googlebot/2.1; +http://www.google.com/bot.html)";

    #[test]
    fn test_parse_chrome_windows() {
        let parsed = parse_user_agent(Some(CHROME_WIN));
        assert_eq!(parsed.browser_name.as_deref(), Some("Chrome"));
        assert!(parsed.browser_version.is_some());
        assert_eq!(parsed.os_name.as_deref(), Some("Windows 10"));
        assert_eq!(parsed.device_type, DeviceType::Desktop);
    }

    #[test]
    fn test_parse_iphone() {
        let parsed = parse_user_agent(Some(SAFARI_IPHONE));
        assert_eq!(parsed.browser_name.as_deref(), Some("Safari"));
        assert_eq!(parsed.device_type, DeviceType::Mobile);
    }

    #[test]
    fn test_classify_tablets() {
        assert_eq!(classify_device(IPAD, None), DeviceType::Tablet);
        assert_eq!(classify_device(ANDROID_TABLET, None), DeviceType::Tablet);
        assert_eq!(
            classify_device("Mozilla/5.0 (Linux; Android 11; Kindle Fire)", None),
            DeviceType::Tablet
        );
    }

    #[test]
    fn test_classify_android_phone() {
        assert_eq!(classify_device(ANDROID_PHONE, None), DeviceType::Mobile);
    }

    #[test]
    fn test_classify_bots() {
        let parsed = parse_user_agent(Some(GOOGLEBOT));
        assert_eq!(parsed.device_type, DeviceType::Bot);

        assert_eq!(
            classify_device("curl-spider/1.0 crawling", None),
            DeviceType::Bot
        );
        assert_eq!(
            classify_device("HeadlessChrome/119.0 selenium webdriver", None),
            DeviceType::Bot
        );
    }

    #[test]
    fn test_classify_unknown() {
        assert_eq!(classify_device("weird-client/0.1", None), DeviceType::Unknown);
        let parsed = parse_user_agent(None);
        assert_eq!(parsed.device_type, DeviceType::Unknown);
        assert!(parsed.browser_name.is_none());
    }
}
