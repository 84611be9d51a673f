//! 分析提示词构造
//!
//! 固定分类表、固定 JSON 键名，要求模型只输出 JSON。
//! 实际输出仍可能不合法，由阶梯解析兜底。

/// 构造完整分析提示词
pub fn build_analysis_prompt(url: &str, title: Option<&str>, description: Option<&str>) -> String {
    let title = match title {
        Some(t) if !t.is_empty() => t,
        _ => "Unknown",
    };
    let description = match description {
        Some(d) if !d.is_empty() => d,
        _ => "No description available",
    };

    format!(
        r#"Analyze this URL and provide a comprehensive analysis. You MUST respond with ONLY valid JSON, no explanations, no markdown.

URL: {url}
Title: {title}
Description: {description}

Analyze the URL and provide:
1. A brief 1-2 sentence summary of what this website/service is about
2. The most appropriate category from: Technology, News, Entertainment, Education, Business, Social, Shopping, Health, Travel, Finance, Sports, Other
3. 3-5 relevant tags that describe the content/topic
4. A safety score between 0.0 and 1.0 (1.0 = completely safe, 0.0 = dangerous)
5. Whether it's safe (true/false)
6. Any safety concerns as an array (empty if safe)
7. 3-5 short, memorable alias suggestions (2-4 words max, URL-friendly)

Respond with ONLY this JSON structure:
{{
    "summary": "your actual summary here",
    "category": "one of the categories listed above",
    "tags": ["relevant", "tags", "here"],
    "safetyScore": 0.95,
    "isSafe": true,
    "safetyReasons": [],
    "aliasSuggestions": ["short-alias-1", "short-alias-2", "short-alias-3"]
}}

Important: Generate REAL content based on the URL, title, and description. Do NOT use placeholder text.
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_embeds_inputs() {
        let prompt = build_analysis_prompt(
            "https://example.com",
            Some("Example Site"),
            Some("An example"),
        );
        assert!(prompt.contains("URL: https://example.com"));
        assert!(prompt.contains("Title: Example Site"));
        assert!(prompt.contains("Description: An example"));
        assert!(prompt.contains("\"aliasSuggestions\""));
    }

    #[test]
    fn test_prompt_defaults_for_missing_inputs() {
        let prompt = build_analysis_prompt("https://example.com", None, Some(""));
        assert!(prompt.contains("Title: Unknown"));
        assert!(prompt.contains("Description: No description available"));
    }
}
