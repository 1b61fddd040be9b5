//! `data:image/<format>;base64,<payload>` 解析。
//!
//! 解码前先估算体积，超限直接拒绝，避免为超大 payload 分配内存。

use base64::{Engine as _, engine::general_purpose};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::asset::format::canonical_format;
use crate::asset::AssetError;

static DATA_URI_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^data:image/(?P<format>[\w.+\-]+);base64,(?P<payload>.+)$")
        .expect("data uri regex must compile")
});

/// 解析结果：解码后的字节与格式提示。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUri {
    pub format: String,
    pub bytes: Vec<u8>,
}

fn estimate_decoded_upper_bound_len(payload: &str) -> Result<u64, AssetError> {
    let len = payload.len() as u64;
    let groups = len
        .checked_add(3)
        .ok_or_else(|| AssetError::ResourceLimit("Base64 输入长度溢出".to_string()))?
        / 4;

    groups
        .checked_mul(3)
        .ok_or_else(|| AssetError::ResourceLimit("Base64 解码体积估算溢出".to_string()))
}

/// 解析图片 data URI。
///
/// 非图片类型或缺少 `;base64,` 标记时返回 `InvalidFormat`。
pub fn parse_data_uri(uri: &str, max_file_size: u64) -> Result<DataUri, AssetError> {
    let captures = DATA_URI_REGEX
        .captures(uri.trim())
        .ok_or_else(|| AssetError::InvalidFormat("不是 base64 图片 data URI".to_string()))?;

    let format = canonical_format(&captures["format"]);
    let payload: String = captures["payload"]
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();

    let estimated_len = estimate_decoded_upper_bound_len(&payload)?;
    if estimated_len > max_file_size {
        return Err(AssetError::ResourceLimit(format!(
            "Base64 预计解码体积过大：{:.2} MB（限制：{:.2} MB）",
            estimated_len as f64 / 1024.0 / 1024.0,
            max_file_size as f64 / 1024.0 / 1024.0
        )));
    }

    let bytes = general_purpose::STANDARD
        .decode(payload.as_bytes())
        .map_err(|e| AssetError::Decode(format!("Base64 解码失败：{}", e)))?;

    Ok(DataUri { format, bytes })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_png_payload() {
        let parsed = parse_data_uri("data:image/png;base64,aGVsbG8=", u64::MAX)
            .expect("parse should succeed");
        assert_eq!(parsed.format, "png");
        assert_eq!(parsed.bytes, b"hello");
    }

    #[test]
    fn svg_xml_maps_to_svg() {
        let parsed = parse_data_uri("data:image/svg+xml;base64,PHN2Zy8+", u64::MAX)
            .expect("parse should succeed");
        assert_eq!(parsed.format, "svg");
        assert_eq!(parsed.bytes, b"<svg/>");
    }

    #[test]
    fn rejects_non_image_or_non_base64() {
        assert!(matches!(
            parse_data_uri("data:text/plain;base64,aGVsbG8=", u64::MAX),
            Err(AssetError::InvalidFormat(_))
        ));
        assert!(matches!(
            parse_data_uri("data:image/png,raw", u64::MAX),
            Err(AssetError::InvalidFormat(_))
        ));
    }

    #[test]
    fn rejects_large_payload_before_decode() {
        let payload = "A".repeat(4096);
        let uri = format!("data:image/png;base64,{}", payload);
        assert!(matches!(
            parse_data_uri(&uri, 1024),
            Err(AssetError::ResourceLimit(_))
        ));
    }

    #[test]
    fn invalid_base64_is_decode_error() {
        assert!(matches!(
            parse_data_uri("data:image/png;base64,!!!!", u64::MAX),
            Err(AssetError::Decode(_))
        ));
    }
}
