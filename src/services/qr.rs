//! 短链接二维码渲染
//!
//! 纯函数：内容 + 尺寸 + 前景/背景色 → PNG 字节。
//! 颜色接受 `#RRGGBB` 或 `RRGGBB`。

use std::io::Cursor;

use base64::Engine;
use image::{ImageFormat, Rgb, RgbImage};
use qrcode::{Color, QrCode};

use crate::errors::LinkletError;

const QUIET_ZONE_MODULES: u32 = 4;
pub const MIN_SIZE: u32 = 64;
pub const MAX_SIZE: u32 = 1024;
pub const DEFAULT_SIZE: u32 = 300;

/// 解析 `#RRGGBB` / `RRGGBB` 颜色
pub fn parse_color(input: &str, fallback: [u8; 3]) -> [u8; 3] {
    let hex = input.trim().trim_start_matches('#');
    if hex.len() != 6 {
        return fallback;
    }
    let Ok(r) = u8::from_str_radix(&hex[0..2], 16) else {
        return fallback;
    };
    let Ok(g) = u8::from_str_radix(&hex[2..4], 16) else {
        return fallback;
    };
    let Ok(b) = u8::from_str_radix(&hex[4..6], 16) else {
        return fallback;
    };
    [r, g, b]
}

/// 渲染 PNG 二维码
pub fn render_png(
    content: &str,
    size: u32,
    fg: [u8; 3],
    bg: [u8; 3],
) -> Result<Vec<u8>, LinkletError> {
    let size = size.clamp(MIN_SIZE, MAX_SIZE);

    let code = QrCode::new(content.as_bytes())
        .map_err(|e| LinkletError::internal(format!("QR encode failed: {}", e)))?;

    let modules = code.to_colors();
    let width = code.width() as u32;
    let total_modules = width + 2 * QUIET_ZONE_MODULES;
    let scale = (size / total_modules).max(1);
    let dimension = total_modules * scale;

    let fg = Rgb(fg);
    let bg = Rgb(bg);

    let mut img = RgbImage::from_pixel(dimension, dimension, bg);
    for (idx, module) in modules.iter().enumerate() {
        if *module != Color::Dark {
            continue;
        }
        let mx = (idx as u32 % width + QUIET_ZONE_MODULES) * scale;
        let my = (idx as u32 / width + QUIET_ZONE_MODULES) * scale;
        for dy in 0..scale {
            for dx in 0..scale {
                img.put_pixel(mx + dx, my + dy, fg);
            }
        }
    }

    let mut buf = Vec::new();
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .map_err(|e| LinkletError::internal(format!("PNG encode failed: {}", e)))?;

    Ok(buf)
}

/// data-URL 形式（创建响应内嵌用）
pub fn render_data_url(content: &str) -> Result<String, LinkletError> {
    let png = render_png(content, DEFAULT_SIZE, [0, 0, 0], [255, 255, 255])?;
    let encoded = base64::engine::general_purpose::STANDARD.encode(&png);
    Ok(format!("data:image/png;base64,{}", encoded))
}
