//! 批量创建用的 CSV 解析
//!
//! 上传文件每行第一列视为 URL；首行若是 `url` / `originalUrl`
//! 表头则跳过。最多接受 100 行。

use csv::ReaderBuilder;

use crate::errors::LinkletError;

pub const MAX_CSV_ROWS: usize = 100;
pub const MAX_CSV_BYTES: usize = 1_048_576;

/// 从 CSV 字节流提取 URL 列表
///
/// 空行和空第一列被跳过；超过 100 行报错。
pub fn parse_csv_urls(data: &[u8]) -> Result<Vec<String>, LinkletError> {
    if data.len() > MAX_CSV_BYTES {
        return Err(LinkletError::validation(format!(
            "CSV file exceeds maximum size of {} bytes",
            MAX_CSV_BYTES
        )));
    }

    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(data);

    let mut urls = Vec::new();

    for (idx, result) in reader.records().enumerate() {
        let record = result.map_err(|e| {
            LinkletError::validation(format!("CSV parse error at row {}: {}", idx + 1, e))
        })?;

        let Some(first) = record.get(0) else {
            continue;
        };
        let first = first.trim();
        if first.is_empty() {
            continue;
        }

        // 首行表头识别（url / originalUrl，不区分大小写）
        if idx == 0 {
            let lowered = first.to_ascii_lowercase();
            if lowered == "url" || lowered == "originalurl" || lowered == "original_url" {
                continue;
            }
        }

        urls.push(first.to_string());

        if urls.len() > MAX_CSV_ROWS {
            return Err(LinkletError::validation(format!(
                "CSV file contains more than {} URLs",
                MAX_CSV_ROWS
            )));
        }
    }

    if urls.is_empty() {
        return Err(LinkletError::validation(
            "CSV file contains no valid URLs",
        ));
    }

    Ok(urls)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_rows() {
        let data = b"https://a.test\nhttps://b.test\n";
        let urls = parse_csv_urls(data).unwrap();
        assert_eq!(urls, vec!["https://a.test", "https://b.test"]);
    }

    #[test]
    fn test_header_row_skipped() {
        let data = b"url\nhttps://a.test\n";
        let urls = parse_csv_urls(data).unwrap();
        assert_eq!(urls, vec!["https://a.test"]);

        let data = b"originalUrl,notes\nhttps://a.test,first\n";
        let urls = parse_csv_urls(data).unwrap();
        assert_eq!(urls, vec!["https://a.test"]);
    }

    #[test]
    fn test_first_column_only() {
        let data = b"https://a.test,ignored,columns\n";
        let urls = parse_csv_urls(data).unwrap();
        assert_eq!(urls, vec!["https://a.test"]);
    }

    #[test]
    fn test_blank_rows_skipped() {
        let data = b"https://a.test\n\n   \nhttps://b.test\n";
        let urls = parse_csv_urls(data).unwrap();
        assert_eq!(urls.len(), 2);
    }

    #[test]
    fn test_empty_file_rejected() {
        assert!(parse_csv_urls(b"").is_err());
        assert!(parse_csv_urls(b"url\n").is_err());
    }

    #[test]
    fn test_row_limit() {
        let mut data = String::new();
        for i in 0..101 {
            data.push_str(&format!("https://example.com/{}\n", i));
        }
        assert!(parse_csv_urls(data.as_bytes()).is_err());
    }

    #[test]
    fn test_size_limit() {
        let data = vec![b'a'; MAX_CSV_BYTES + 1];
        assert!(parse_csv_urls(&data).is_err());
    }
}
