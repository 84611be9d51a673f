//! 短键生成器
//!
//! 使用加密安全随机源生成 6-8 位字母数字短键。
//! 唯一性由 Shortener 结合 MappingStore 的探测与重试保证。

use rand::Rng;

/// 62 个字母数字字符
const ALPHANUMERIC_CHARS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

const DEFAULT_MIN_LENGTH: usize = 6;
const DEFAULT_MAX_LENGTH: usize = 8;
const MAX_KEY_LENGTH: usize = 20;

#[derive(Debug, Clone, Default)]
pub struct KeyMinter;

impl KeyMinter {
    pub fn new() -> Self {
        Self
    }

    /// 生成默认长度（6-8 位，均匀随机）的短键
    pub fn mint(&self) -> String {
        self.mint_range(DEFAULT_MIN_LENGTH, DEFAULT_MAX_LENGTH)
    }

    /// 生成指定长度的短键（碰撞升级时使用）
    pub fn mint_of_length(&self, length: usize) -> String {
        self.mint_range(length, length)
    }

    fn mint_range(&self, min_length: usize, max_length: usize) -> String {
        debug_assert!(min_length >= 1 && max_length >= min_length);

        // ThreadRng 是 CSPRNG，满足加密安全要求
        let mut rng = rand::rng();
        let length = rng.random_range(min_length..=max_length);

        (0..length)
            .map(|_| {
                let idx = rng.random_range(0..ALPHANUMERIC_CHARS.len());
                ALPHANUMERIC_CHARS[idx] as char
            })
            .collect()
    }

    /// 检查字符串是否是合法短键格式（≤20 位、纯字母数字）
    pub fn is_well_formed(key: &str) -> bool {
        !key.is_empty()
            && key.len() <= MAX_KEY_LENGTH
            && key.bytes().all(|b| b.is_ascii_alphanumeric())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mint_default_length() {
        let minter = KeyMinter::new();
        for _ in 0..100 {
            let key = minter.mint();
            assert!(
                key.len() >= 6 && key.len() <= 8,
                "key length {} out of range",
                key.len()
            );
            assert!(KeyMinter::is_well_formed(&key));
        }
    }

    #[test]
    fn test_mint_of_length() {
        let minter = KeyMinter::new();
        let key = minter.mint_of_length(10);
        assert_eq!(key.len(), 10);
        assert!(KeyMinter::is_well_formed(&key));
    }

    #[test]
    fn test_mint_charset() {
        let minter = KeyMinter::new();
        for _ in 0..50 {
            let key = minter.mint();
            assert!(key.bytes().all(|b| b.is_ascii_alphanumeric()));
        }
    }

    #[test]
    fn test_keys_vary() {
        // 100 个键全部相同的概率可以忽略
        let minter = KeyMinter::new();
        let keys: std::collections::HashSet<String> = (0..100).map(|_| minter.mint()).collect();
        assert!(keys.len() > 1);
    }

    #[test]
    fn test_is_well_formed() {
        assert!(KeyMinter::is_well_formed("abc123"));
        assert!(KeyMinter::is_well_formed("ABCdef99"));
        assert!(KeyMinter::is_well_formed(&"a".repeat(20)));
        assert!(!KeyMinter::is_well_formed(""));
        assert!(!KeyMinter::is_well_formed(&"a".repeat(21)));
        assert!(!KeyMinter::is_well_formed("has-dash"));
        assert!(!KeyMinter::is_well_formed("under_score"));
    }
}
