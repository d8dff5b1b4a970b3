//! # 数据模型
//!
//! ## 设计思路
//!
//! 将“外部输入类型”和“流水线中间结果”解耦，每个阶段产出一个不可变值，
//! 由下一阶段按值消费：
//!
//! ```text
//! CapturedImage ─encode→ EncodedPayload ─wrap→ IdentificationRequest
//!     ─send→ RawResponse ─parse→ IdentificationResult
//! ```
//!
//! 只有 `IdentificationResult` 会穿过核心边界交给调用方。

use serde::{Deserialize, Serialize};

use super::IdentifyError;

pub(crate) const UNKNOWN_PLANT_NAME: &str = "Unknown plant";
pub(crate) const NOT_IDENTIFIED_DESCRIPTION: &str = "Could not identify the plant in the image";
pub(crate) const NO_DESCRIPTION: &str = "No description available";
pub(crate) const ERROR_NAME: &str = "Error";

/// 相机交付的一帧原始画面（RGBA8）。
///
/// 由外部拍摄方创建，编排器按值消费，编码后即释放。
pub struct CapturedImage {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl CapturedImage {
    /// 由 RGBA8 像素缓冲构建。
    ///
    /// 只校验缓冲长度与尺寸一致；零尺寸允许构建，由编码阶段拒绝。
    pub fn from_rgba8(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, IdentifyError> {
        let expected_len = (width as usize)
            .checked_mul(height as usize)
            .and_then(|p| p.checked_mul(4))
            .ok_or_else(|| IdentifyError::ResourceLimit("图片尺寸导致内存溢出风险".to_string()))?;

        if pixels.len() != expected_len {
            return Err(IdentifyError::Capture(format!(
                "像素缓冲长度异常：{}（期望 {}x{}x4 = {}）",
                pixels.len(),
                width,
                height,
                expected_len
            )));
        }

        Ok(Self { width, height, pixels })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub(crate) fn into_raw(self) -> (u32, u32, Vec<u8>) {
        (self.width, self.height, self.pixels)
    }
}

impl std::fmt::Debug for CapturedImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapturedImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.pixels.len())
            .finish()
    }
}

/// 编码阶段输出：base64 文本形式的 JPEG。
#[derive(Debug, Clone)]
pub struct EncodedPayload {
    width: u32,
    height: u32,
    jpeg_len: usize,
    base64: String,
}

impl EncodedPayload {
    pub(crate) fn new(width: u32, height: u32, jpeg_len: usize, base64: String) -> Self {
        Self {
            width,
            height,
            jpeg_len,
            base64,
        }
    }

    /// 编码后宽度（像素）。
    pub fn width(&self) -> u32 {
        self.width
    }

    /// 编码后高度（像素）。
    pub fn height(&self) -> u32 {
        self.height
    }

    /// JPEG 字节数（base64 之前）。
    pub fn jpeg_len(&self) -> usize {
        self.jpeg_len
    }

    pub fn as_base64(&self) -> &str {
        &self.base64
    }
}

/// 识别请求体。
///
/// 只能由单个 `EncodedPayload` 构建，因此 `images` 永远恰好一项。
#[derive(Debug, Clone, Serialize)]
pub struct IdentificationRequest {
    images: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    similar_images: Option<bool>,
}

impl IdentificationRequest {
    pub fn single(payload: EncodedPayload, similar_images: bool) -> Self {
        Self {
            images: vec![payload.base64],
            similar_images: similar_images.then_some(true),
        }
    }

    pub fn images(&self) -> &[String] {
        &self.images
    }
}

/// 服务端原始响应：状态码与未经信任的响应体。
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

/// 一次识别的最终结果，也是核心对外的唯一类型。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentificationResult {
    pub success: bool,
    pub name: String,
    pub description: String,
}

impl IdentificationResult {
    pub(crate) fn identified(name: String, description: String) -> Self {
        Self {
            success: true,
            name,
            description,
        }
    }

    /// 响应合法但没有可用候选。
    pub fn not_identified() -> Self {
        Self {
            success: false,
            name: UNKNOWN_PLANT_NAME.to_string(),
            description: NOT_IDENTIFIED_DESCRIPTION.to_string(),
        }
    }

    pub(crate) fn from_error(error: &IdentifyError) -> Self {
        Self {
            success: false,
            name: ERROR_NAME.to_string(),
            description: format!("An error occurred: {}", error),
        }
    }

    /// 是否为错误结果（与“未识别”区分只靠 `name`）。
    pub fn is_error(&self) -> bool {
        !self.success && self.name == ERROR_NAME
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rgba_buffer_length_is_checked() {
        assert!(CapturedImage::from_rgba8(2, 2, vec![0; 16]).is_ok());
        let result = CapturedImage::from_rgba8(2, 2, vec![0; 15]);
        assert!(matches!(result, Err(IdentifyError::Capture(_))));
    }

    #[test]
    fn request_serializes_single_image_envelope() {
        let payload = EncodedPayload::new(1, 1, 3, "QUJD".to_string());
        let request = IdentificationRequest::single(payload.clone(), false);
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json, serde_json::json!({ "images": ["QUJD"] }));

        let request = IdentificationRequest::single(payload, true);
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json, serde_json::json!({ "images": ["QUJD"], "similar_images": true }));
    }

    #[test]
    fn error_and_not_identified_differ_only_by_name() {
        let not_identified = IdentificationResult::not_identified();
        let error = IdentificationResult::from_error(&IdentifyError::Network("boom".to_string()));

        assert!(!not_identified.success);
        assert!(!error.success);
        assert!(!not_identified.is_error());
        assert!(error.is_error());
        assert_eq!(error.description, "An error occurred: 网络错误：boom");
    }
}
