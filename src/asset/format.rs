//! # 格式嗅探与归一化
//!
//! ## 设计思路
//!
//! 文件签名（magic bytes）比来源给出的扩展名可靠，因此格式判定顺序固定为：
//! 1. 签名嗅探（`infer`）
//! 2. 来源格式提示
//! 3. 默认 `jpeg`
//!
//! 宿主无法渲染 `apng`，统一改写为 `png`（字节不变，APNG 向下兼容 PNG）。
//!
//! ## 实现思路
//!
//! - 尺寸只读 header，不做完整解码。
//! - WebP 转码先转为 RGBA8 再编码，避免 16 位/灰度图编码失败。
//! - 这里全部是纯函数，由执行上下文中的任务调用。

use std::io::Cursor;

use image::{DynamicImage, ImageFormat};

use super::AssetError;

/// 嗅探与提示均缺失时使用的格式。
pub const DEFAULT_FORMAT: &str = "jpeg";

/// 图片检查结果。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageInspection {
    /// 签名嗅探得到的格式（扩展名形式）。
    pub format: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// 将格式名规范为小写扩展名，并处理宿主不识别的别名。
pub fn canonical_format(format: &str) -> String {
    let lowered = format.trim().trim_start_matches('.').to_ascii_lowercase();
    match lowered.as_str() {
        "apng" => "png".to_string(),
        "svg+xml" => "svg".to_string(),
        _ => lowered,
    }
}

/// 通过文件签名嗅探格式。
pub fn sniff_format(bytes: &[u8]) -> Option<String> {
    if bytes.is_empty() {
        return None;
    }

    let kind = infer::get(bytes)?;
    if kind.matcher_type() != infer::MatcherType::Image {
        log::debug!("🔎 文件签名不是图片类型：{}", kind.mime_type());
    }
    Some(kind.extension().to_string())
}

/// 按“嗅探 → 提示 → 默认”顺序确定最终格式。
///
/// # 示例
/// ```rust
/// use smart_drop::asset::format::resolve_format;
///
/// assert_eq!(resolve_format(b"not an image", Some("APNG")), "png");
/// assert_eq!(resolve_format(b"not an image", None), "jpeg");
/// ```
pub fn resolve_format(bytes: &[u8], hint: Option<&str>) -> String {
    let raw = sniff_format(bytes)
        .or_else(|| {
            hint.map(str::trim)
                .filter(|h| !h.is_empty())
                .map(str::to_string)
        })
        .unwrap_or_else(|| DEFAULT_FORMAT.to_string());
    canonical_format(&raw)
}

/// 读取格式与像素尺寸（仅解析 header）。
pub fn inspect_image(bytes: &[u8]) -> ImageInspection {
    let format = sniff_format(bytes).map(|f| canonical_format(&f));

    let dimensions = image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()
        .and_then(|reader| reader.into_dimensions().ok());

    ImageInspection {
        format,
        width: dimensions.map(|(w, _)| w),
        height: dimensions.map(|(_, h)| h),
    }
}

/// 是否适合转码为 WebP（动图、矢量图与已是 WebP 的除外）。
pub fn is_webp_candidate(format: &str) -> bool {
    matches!(
        canonical_format(format).as_str(),
        "png" | "jpg" | "jpeg" | "bmp" | "tif" | "tiff"
    )
}

/// 转码为 WebP（无损）。
pub fn transcode_to_webp(bytes: &[u8]) -> Result<Vec<u8>, AssetError> {
    let decoded = image::load_from_memory(bytes)
        .map_err(|e| AssetError::Decode(format!("图片解码失败：{}", e)))?;

    let rgba = DynamicImage::ImageRgba8(decoded.to_rgba8());
    let mut cursor = Cursor::new(Vec::new());
    rgba.write_to(&mut cursor, ImageFormat::WebP)
        .map_err(|e| AssetError::Decode(format!("WebP 编码失败：{}", e)))?;

    Ok(cursor.into_inner())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use image::{ImageBuffer, Rgba};

    pub(crate) fn create_png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = ImageBuffer::from_fn(width, height, |x, y| {
            let r = (x % 255) as u8;
            let g = (y % 255) as u8;
            let b = ((x + y) % 255) as u8;
            Rgba([r, g, b, 255])
        });

        let dyn_img = DynamicImage::ImageRgba8(img);
        let mut cursor = Cursor::new(Vec::new());
        dyn_img
            .write_to(&mut cursor, ImageFormat::Png)
            .expect("failed to encode test image");
        cursor.into_inner()
    }

    #[test]
    fn sniff_prefers_signature_over_hint() {
        let png = create_png_bytes(4, 4);
        assert_eq!(resolve_format(&png, Some("gif")), "png");
    }

    #[test]
    fn hint_used_when_signature_unknown() {
        let svg = br#"<svg xmlns="http://www.w3.org/2000/svg"></svg>"#;
        assert_eq!(resolve_format(svg, Some("svg+xml")), "svg");
        assert_eq!(resolve_format(svg, Some("  ")), DEFAULT_FORMAT);
    }

    #[test]
    fn canonical_format_normalizes_aliases() {
        assert_eq!(canonical_format("APNG"), "png");
        assert_eq!(canonical_format(".JPG"), "jpg");
    }

    #[test]
    fn inspect_reads_dimensions_from_header() {
        let png = create_png_bytes(320, 200);
        let inspection = inspect_image(&png);

        assert_eq!(inspection.format.as_deref(), Some("png"));
        assert_eq!(inspection.width, Some(320));
        assert_eq!(inspection.height, Some(200));
    }

    #[test]
    fn inspect_unknown_bytes_yields_empty_result() {
        assert_eq!(inspect_image(b"hello world"), ImageInspection::default());
    }

    #[test]
    fn transcode_produces_webp_signature() {
        let png = create_png_bytes(16, 16);
        let webp = transcode_to_webp(&png).expect("transcode should succeed");

        assert_eq!(sniff_format(&webp).as_deref(), Some("webp"));
        assert_eq!(inspect_image(&webp).width, Some(16));
    }

    #[test]
    fn transcode_rejects_garbage() {
        assert!(matches!(transcode_to_webp(b"garbage"), Err(AssetError::Decode(_))));
    }

    #[test]
    fn webp_candidates_exclude_animated_and_vector() {
        assert!(is_webp_candidate("png"));
        assert!(is_webp_candidate("JPG"));
        assert!(!is_webp_candidate("gif"));
        assert!(!is_webp_candidate("svg"));
        assert!(!is_webp_candidate("webp"));
    }
}
