//! LLM 输出的阶梯式解析
//!
//! 小模型经常给出不合法的 JSON。解析按阶梯推进，第一段成功即停：
//! 提取大括号片段 → 去掉 Markdown 围栏 → 修补不完整 JSON →
//! serde_json 解析 → 逐字段正则兜底。无论哪一段成功，
//! 出口都是清洗过的 `AiAnalysis`。

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use super::{AiAnalysis, default_analysis};

/// 固定分类表
pub const CATEGORIES: &[&str] = &[
    "Technology",
    "News",
    "Entertainment",
    "Education",
    "Business",
    "Social",
    "Shopping",
    "Health",
    "Travel",
    "Finance",
    "Sports",
    "Other",
];

const MAX_SUMMARY_LEN: usize = 500;
const MAX_TAGS: usize = 10;
const MAX_REASONS: usize = 5;
const MAX_ALIASES: usize = 5;

static JSON_SPAN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\{.*\}").unwrap());
static TRAILING_COMMA_BRACE: Lazy<Regex> = Lazy::new(|| Regex::new(r",\s*\}").unwrap());
static TRAILING_COMMA_BRACKET: Lazy<Regex> = Lazy::new(|| Regex::new(r",\s*\]").unwrap());

/// 解析原始模型输出为清洗后的分析结果（`from_cache` 恒为 false）
pub fn parse_analysis(raw: &str) -> AiAnalysis {
    let raw = raw.trim();
    if raw.is_empty() {
        return default_analysis();
    }

    // Stage A: 贪婪提取 {...} 片段
    let mut json_str = extract_json(raw).unwrap_or_else(|| raw.to_string());

    // Stage B: 没有大括号就先剥掉 Markdown 围栏再找
    if !json_str.contains('{') {
        json_str = strip_markdown(&json_str);
    }

    // Stage C: 修补不完整 JSON
    let json_str = repair_json(&json_str);

    // Stage D: 正式解析，字段逐个容错提取
    if let Ok(value) = serde_json::from_str::<Value>(&json_str) {
        return sanitize(analysis_from_value(&value));
    }

    // Stage E: 逐字段正则兜底
    sanitize(parse_fields_manually(raw))
}

/// 贪婪提取首个大括号到最后一个大括号的片段
fn extract_json(response: &str) -> Option<String> {
    if let Some(m) = JSON_SPAN.find(response) {
        return Some(m.as_str().to_string());
    }

    let start = response.find('{')?;
    let end = response.rfind('}')?;
    if end > start {
        Some(response[start..=end].to_string())
    } else {
        None
    }
}

/// 去掉 ```json / ``` 围栏后再找大括号片段
fn strip_markdown(text: &str) -> String {
    let cleaned = text.replace("```json", "").replace("```", "");
    let cleaned = cleaned.trim();

    if let (Some(start), Some(end)) = (cleaned.find('{'), cleaned.rfind('}')) {
        if end > start {
            return cleaned[start..=end].to_string();
        }
    }
    cleaned.to_string()
}

/// 修补不完整 JSON：补齐未闭合的大括号/中括号，去掉悬挂的
/// 尾逗号与闭合符前的逗号
fn repair_json(json_str: &str) -> String {
    let mut repaired = json_str.trim().to_string();
    if repaired.is_empty() {
        return repaired;
    }

    let open_braces = repaired.matches('{').count();
    let close_braces = repaired.matches('}').count();
    let open_brackets = repaired.matches('[').count();
    let close_brackets = repaired.matches(']').count();

    if repaired.ends_with(',') && (open_braces > close_braces || open_brackets > close_brackets) {
        repaired.pop();
    }

    // 先闭合内层的中括号，再闭合大括号
    if open_brackets > close_brackets {
        for _ in close_brackets..open_brackets {
            repaired.push(']');
        }
    }

    if open_braces > close_braces {
        for _ in close_braces..open_braces {
            repaired.push('}');
        }
    }

    let repaired = TRAILING_COMMA_BRACE.replace_all(&repaired, "}");
    let repaired = TRAILING_COMMA_BRACKET.replace_all(&repaired, "]");
    repaired.into_owned()
}

/// 从解析成功的 JSON 值提取字段，类型不符时回退默认
fn analysis_from_value(value: &Value) -> AiAnalysis {
    AiAnalysis {
        summary: get_string(value, "summary").unwrap_or_default(),
        category: get_string(value, "category").unwrap_or_else(|| "Other".to_string()),
        tags: get_string_array(value, "tags"),
        safety_score: get_number(value, "safetyScore").unwrap_or(0.8),
        is_safe: value
            .get("isSafe")
            .and_then(Value::as_bool)
            .unwrap_or(true),
        safety_reasons: get_string_array(value, "safetyReasons"),
        alias_suggestions: get_string_array(value, "aliasSuggestions"),
        from_cache: false,
    }
}

fn get_string(value: &Value, field: &str) -> Option<String> {
    match value.get(field)? {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

fn get_number(value: &Value, field: &str) -> Option<f64> {
    match value.get(field)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn get_string_array(value: &Value, field: &str) -> Vec<String> {
    value
        .get(field)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| match item {
                    Value::String(s) => Some(s.clone()),
                    Value::Null => None,
                    other => Some(other.to_string()),
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Stage E：JSON 彻底解析失败后的逐字段提取
fn parse_fields_manually(text: &str) -> AiAnalysis {
    let summary = extract_field(text, "summary").unwrap_or_default();
    let category = extract_field(text, "category")
        .map(|c| validate_category(&c))
        .unwrap_or_else(|| "Other".to_string());
    let safety_score = extract_field(text, "safetyScore")
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(0.8);

    AiAnalysis {
        summary,
        category,
        tags: extract_string_array(text, "tags"),
        safety_score,
        is_safe: true,
        safety_reasons: Vec::new(),
        alias_suggestions: extract_string_array(text, "aliasSuggestions"),
        from_cache: false,
    }
}

/// 依次尝试 `"field": "value"`、`"field": 'value'`、`field: value`
fn extract_field(text: &str, field: &str) -> Option<String> {
    let patterns = [
        format!(r#"(?i)"{}"\s*:\s*"([^"]+)""#, field),
        format!(r#"(?i)"{}"\s*:\s*'([^']+)'"#, field),
        format!(r#"(?i){}\s*:\s*["']?([^,"'}}\n]+)["']?"#, field),
    ];

    for pattern in &patterns {
        if let Ok(re) = Regex::new(pattern) {
            if let Some(caps) = re.captures(text) {
                let found = caps.get(1)?.as_str().trim();
                if !found.is_empty() {
                    return Some(found.to_string());
                }
            }
        }
    }
    None
}

/// 提取 `"field": ["a", "b"]` 形式的数组
fn extract_string_array(text: &str, field: &str) -> Vec<String> {
    let Ok(array_re) = Regex::new(&format!(r#"(?i)"{}"\s*:\s*\[([^\]]+)\]"#, field)) else {
        return Vec::new();
    };
    let Some(caps) = array_re.captures(text) else {
        return Vec::new();
    };

    static ITEM: Lazy<Regex> = Lazy::new(|| Regex::new(r#"["']([^,"']+)["']"#).unwrap());

    ITEM.captures_iter(caps.get(1).map(|m| m.as_str()).unwrap_or_default())
        .filter_map(|c| {
            let item = c.get(1)?.as_str().trim();
            if item.is_empty() {
                None
            } else {
                Some(item.to_string())
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// 清洗
// ---------------------------------------------------------------------------

fn sanitize(analysis: AiAnalysis) -> AiAnalysis {
    AiAnalysis {
        summary: sanitize_summary(&analysis.summary),
        category: validate_category(&analysis.category),
        tags: sanitize_list(analysis.tags, MAX_TAGS),
        safety_score: clamp_score(analysis.safety_score),
        is_safe: analysis.is_safe,
        safety_reasons: sanitize_list(analysis.safety_reasons, MAX_REASONS),
        alias_suggestions: sanitize_aliases(analysis.alias_suggestions),
        from_cache: analysis.from_cache,
    }
}

/// 分类校验：先精确匹配（忽略大小写和引号），再模糊映射，否则 Other
pub fn validate_category(category: &str) -> String {
    let normalized = category
        .trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .trim();

    if normalized.is_empty() {
        return "Other".to_string();
    }

    for valid in CATEGORIES {
        if valid.eq_ignore_ascii_case(normalized) {
            return valid.to_string();
        }
    }

    let lowered = normalized.to_lowercase();
    let fuzzy: &[(&[&str], &str)] = &[
        (&["tech"], "Technology"),
        (&["news", "journalism"], "News"),
        (&["entertain", "media", "video"], "Entertainment"),
        (&["educat", "learn", "course"], "Education"),
        (&["business", "corporate", "company"], "Business"),
        (&["social", "network"], "Social"),
        (&["shop", "store", "ecommerce"], "Shopping"),
        (&["health", "medical", "wellness"], "Health"),
        (&["travel", "tourism", "hotel"], "Travel"),
        (&["finance", "bank", "money", "invest"], "Finance"),
        (&["sport"], "Sports"),
    ];

    for (tokens, target) in fuzzy {
        if tokens.iter().any(|t| lowered.contains(t)) {
            return target.to_string();
        }
    }

    "Other".to_string()
}

fn clamp_score(score: f64) -> f64 {
    if !score.is_finite() {
        return 0.8;
    }
    score.clamp(0.0, 1.0)
}

/// 摘要清洗：去控制字符、去首尾空白；占位文本和过短文本置空；
/// 截断到 500 字符
fn sanitize_summary(text: &str) -> String {
    let cleaned: String = text
        .chars()
        .filter(|c| !c.is_control())
        .collect::<String>()
        .trim()
        .to_string();

    if cleaned.eq_ignore_ascii_case("Brief description")
        || cleaned.eq_ignore_ascii_case("No summary available")
        || cleaned.chars().count() < 10
    {
        return String::new();
    }

    if cleaned.chars().count() > MAX_SUMMARY_LEN {
        cleaned.chars().take(MAX_SUMMARY_LEN).collect()
    } else {
        cleaned
    }
}

/// 列表清洗：去控制字符、去空白项、截断长度
fn sanitize_list(items: Vec<String>, cap: usize) -> Vec<String> {
    items
        .into_iter()
        .map(|item| {
            item.chars()
                .filter(|c| !c.is_control())
                .collect::<String>()
                .trim()
                .to_string()
        })
        .filter(|item| !item.is_empty())
        .take(cap)
        .collect()
}

/// 别名建议清洗：小写、空白转连字符、去非法字符、折叠连字符、
/// 掐头去尾，长度 3-20，去重，最多 5 个
fn sanitize_aliases(aliases: Vec<String>) -> Vec<String> {
    static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
    static INVALID: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9-]").unwrap());
    static DASHES: Lazy<Regex> = Lazy::new(|| Regex::new(r"-+").unwrap());

    let mut seen = std::collections::HashSet::new();
    aliases
        .into_iter()
        .map(|alias| {
            let lowered = alias.trim().to_lowercase();
            let dashed = WHITESPACE.replace_all(&lowered, "-");
            let cleaned = INVALID.replace_all(&dashed, "");
            let collapsed = DASHES.replace_all(&cleaned, "-");
            collapsed.trim_matches('-').to_string()
        })
        .filter(|alias| alias.len() >= 3 && alias.len() <= 20)
        .filter(|alias| seen.insert(alias.clone()))
        .take(MAX_ALIASES)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_json() {
        let raw = r#"{"summary": "A code hosting platform for developers.", "category": "Technology", "tags": ["code", "git"], "safetyScore": 0.95, "isSafe": true, "safetyReasons": [], "aliasSuggestions": ["code-hub", "git-home"]}"#;
        let a = parse_analysis(raw);
        assert_eq!(a.summary, "A code hosting platform for developers.");
        assert_eq!(a.category, "Technology");
        assert_eq!(a.tags, vec!["code", "git"]);
        assert_eq!(a.safety_score, 0.95);
        assert!(a.is_safe);
        assert_eq!(a.alias_suggestions, vec!["code-hub", "git-home"]);
        assert!(!a.from_cache);
    }

    #[test]
    fn test_json_with_surrounding_prose() {
        let raw = r#"Sure! Here is the analysis you asked for:
{"summary": "An online retailer of electronics.", "category": "Shopping", "safetyScore": 0.9}
Hope this helps."#;
        let a = parse_analysis(raw);
        assert_eq!(a.category, "Shopping");
        assert_eq!(a.summary, "An online retailer of electronics.");
    }

    #[test]
    fn test_markdown_fenced_json() {
        let raw = "```json\n{\"summary\": \"A streaming service for films.\", \"category\": \"Entertainment\"}\n```";
        let a = parse_analysis(raw);
        assert_eq!(a.category, "Entertainment");
        assert_eq!(a.summary, "A streaming service for films.");
    }

    #[test]
    fn test_truncated_json_repaired() {
        // num_predict 截断的典型输出：对象没闭合
        let raw = r#"{"summary": "A university homepage with course catalogs.", "category": "Education", "tags": ["university", "courses""#;
        let a = parse_analysis(raw);
        assert_eq!(a.category, "Education");
        assert!(a.summary.contains("university"));
    }

    #[test]
    fn test_trailing_commas_stripped() {
        let raw = r#"{"summary": "A news aggregation portal site.", "category": "News", "tags": ["headlines",], }"#;
        let a = parse_analysis(raw);
        assert_eq!(a.category, "News");
        assert_eq!(a.tags, vec!["headlines"]);
    }

    #[test]
    fn test_manual_extraction_fallback() {
        // 连修补都救不回来的输出，逐字段正则兜底
        let raw = r#"summary: "A travel booking site for hotels." category: "Travel" safetyScore: 0.85 "tags": ["hotels", "booking"]"#;
        let a = parse_analysis(raw);
        assert_eq!(a.category, "Travel");
        assert_eq!(a.tags, vec!["hotels", "booking"]);
        assert!(a.is_safe);
    }

    #[test]
    fn test_empty_input_gives_default() {
        let a = parse_analysis("");
        assert_eq!(a.category, "Other");
        assert_eq!(a.safety_score, 0.8);
    }

    #[test]
    fn test_wrong_types_tolerated() {
        let raw = r#"{"summary": 42, "category": null, "tags": "not-an-array", "safetyScore": "0.7", "isSafe": "yes"}"#;
        let a = parse_analysis(raw);
        // 数字摘要被字符串化后因过短置空
        assert_eq!(a.summary, "");
        assert_eq!(a.category, "Other");
        assert!(a.tags.is_empty());
        assert_eq!(a.safety_score, 0.7);
        assert!(a.is_safe);
    }

    #[test]
    fn test_category_exact_and_fuzzy() {
        assert_eq!(validate_category("Technology"), "Technology");
        assert_eq!(validate_category("technology"), "Technology");
        assert_eq!(validate_category("\"Finance\""), "Finance");
        assert_eq!(validate_category("tech stuff"), "Technology");
        assert_eq!(validate_category("journalism"), "News");
        assert_eq!(validate_category("e-learning course"), "Education");
        assert_eq!(validate_category("ecommerce store"), "Shopping");
        assert_eq!(validate_category("sports news"), "News");
        assert_eq!(validate_category("completely unrelated"), "Other");
        assert_eq!(validate_category(""), "Other");
    }

    #[test]
    fn test_score_clamping() {
        let a = parse_analysis(r#"{"summary": "A perfectly ordinary web page.", "safetyScore": 3.5}"#);
        assert_eq!(a.safety_score, 1.0);
        let a = parse_analysis(r#"{"summary": "A perfectly ordinary web page.", "safetyScore": -1}"#);
        assert_eq!(a.safety_score, 0.0);
    }

    #[test]
    fn test_summary_placeholder_rejected() {
        let a = parse_analysis(r#"{"summary": "No summary available", "category": "Other"}"#);
        assert_eq!(a.summary, "");
        let a = parse_analysis(r#"{"summary": "short", "category": "Other"}"#);
        assert_eq!(a.summary, "");
    }

    #[test]
    fn test_summary_capped_at_500() {
        let long = "x".repeat(600);
        let a = parse_analysis(&format!(r#"{{"summary": "{}"}}"#, long));
        assert_eq!(a.summary.chars().count(), 500);
    }

    #[test]
    fn test_tag_and_reason_caps() {
        let tags: Vec<String> = (0..15).map(|i| format!("\"tag-number-{}\"", i)).collect();
        let raw = format!(
            r#"{{"summary": "A page with far too many tags attached.", "tags": [{}]}}"#,
            tags.join(",")
        );
        let a = parse_analysis(&raw);
        assert_eq!(a.tags.len(), 10);
    }

    #[test]
    fn test_alias_slugging() {
        let raw = r#"{"summary": "A developer documentation portal site.", "aliasSuggestions": ["My Cool Site", "  Already-Fine  ", "x", "Has!!Symbols##Here", "duplicate", "DUPLICATE", "six", "seven", "eight"]}"#;
        let a = parse_analysis(raw);
        assert!(a.alias_suggestions.contains(&"my-cool-site".to_string()));
        assert!(a.alias_suggestions.contains(&"already-fine".to_string()));
        assert!(a.alias_suggestions.contains(&"hassymbolshere".to_string()));
        // "x" 太短被过滤；大小写重复去重；最多 5 个
        assert!(!a.alias_suggestions.contains(&"x".to_string()));
        assert_eq!(
            a.alias_suggestions
                .iter()
                .filter(|s| s.as_str() == "duplicate")
                .count(),
            1
        );
        assert!(a.alias_suggestions.len() <= 5);
    }

    #[test]
    fn test_repair_balances_brackets() {
        assert_eq!(repair_json(r#"{"a": [1, 2"#), r#"{"a": [1, 2]}"#);
        assert_eq!(repair_json(r#"{"a": 1,"#), r#"{"a": 1}"#);
        assert_eq!(repair_json(""), "");
    }
}
