//! # 配置模块
//!
//! ## 设计思路
//!
//! 将所有“可调策略”集中到 `IdentifierConfig`，保证运行时行为可观测、可调整、可测试。
//! 其中编码档位（quality / balanced / speed）作为高层语义，映射到底层参数组合。
//!
//! ## 实现思路
//!
//! - `Default` 提供生产可用的平衡配置（1000px / JPEG 70）。
//! - `EncodingProfile` 负责档位字符串解析与反向输出。
//! - `apply_encoding_profile` 将档位转换为具体参数。
//! - `infer_encoding_profile` 用于从当前配置反推档位。
//! - `validate` 在构造阶段一次性校验，配置错误直接失败，不进入识别链路。

use image::imageops::FilterType;

use super::IdentifyError;

/// Plant.id v3 识别端点。
pub const DEFAULT_ENDPOINT: &str = "https://plant.id/api/v3/identification";

/// 识别流水线配置。
///
/// 字段覆盖了拍摄加载、编码、请求与响应读取四个阶段。
/// 注意：API 密钥不在此处，由 `ApiKey` 在构造客户端时单独注入。
#[derive(Debug, Clone)]
pub struct IdentifierConfig {
    /// 识别服务地址（不含查询参数）。
    pub endpoint: String,
    /// 通过 `details` 查询参数请求的结果字段。
    pub detail_fields: Vec<String>,
    /// 是否在请求体中要求返回相似图片。
    pub request_similar_images: bool,
    /// 编码后宽度上限（像素）。
    pub max_width: u32,
    /// 编码后高度上限（像素）。
    pub max_height: u32,
    /// JPEG 压缩质量（0~100）。
    pub jpeg_quality: u8,
    /// 降采样滤镜策略。
    pub resize_filter: FilterType,
    /// 响应体允许的最大字节数。
    pub max_response_bytes: u64,
    /// 从文件读取拍摄结果时允许的最大体积（字节）。
    pub max_capture_file_size: u64,
    /// 解码拍摄结果时的像素上限（`width * height`）。
    pub max_decoded_pixels: u64,
}

impl Default for IdentifierConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            detail_fields: vec!["common_names".to_string(), "description".to_string()],
            request_similar_images: false,
            max_width: 1000,
            max_height: 1000,
            jpeg_quality: 70,
            resize_filter: FilterType::Triangle,
            max_response_bytes: 4 * 1024 * 1024,
            max_capture_file_size: 50 * 1024 * 1024,
            max_decoded_pixels: 40_000_000,
        }
    }
}

/// 编码档位（面向产品/用户语义）。
///
/// - `Quality`：尽量保真，请求体更大
/// - `Balanced`：默认，1000px / 70
/// - `Speed`：优先上传速度
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodingProfile {
    Quality,
    Balanced,
    Speed,
}

impl EncodingProfile {
    /// 从外部字符串解析档位。
    ///
    /// # 示例
    /// ```rust
    /// use plant_identifier::identification::EncodingProfile;
    ///
    /// let p = EncodingProfile::from_str("Balanced")?;
    /// assert_eq!(p.as_str(), "balanced");
    /// # Ok::<(), plant_identifier::identification::IdentifyError>(())
    /// ```
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(profile: &str) -> Result<Self, IdentifyError> {
        match profile.trim().to_lowercase().as_str() {
            "quality" => Ok(Self::Quality),
            "balanced" => Ok(Self::Balanced),
            "speed" => Ok(Self::Speed),
            other => Err(IdentifyError::InvalidConfig(format!(
                "未知编码档位：{}（可选：quality / balanced / speed）",
                other
            ))),
        }
    }

    /// 将档位输出为稳定字符串。
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Quality => "quality",
            Self::Balanced => "balanced",
            Self::Speed => "speed",
        }
    }
}

impl IdentifierConfig {
    /// 基于当前参数反推编码档位。
    pub(crate) fn infer_encoding_profile(&self) -> EncodingProfile {
        let max_dim = self.max_width.max(self.max_height);

        if max_dim >= 1600 && self.jpeg_quality >= 85 {
            return EncodingProfile::Quality;
        }

        if max_dim <= 640 || self.jpeg_quality <= 60 {
            return EncodingProfile::Speed;
        }

        EncodingProfile::Balanced
    }

    /// 应用指定编码档位到实际参数。
    pub(crate) fn apply_encoding_profile(&mut self, profile: EncodingProfile) {
        match profile {
            EncodingProfile::Quality => {
                self.max_width = 1600;
                self.max_height = 1600;
                self.jpeg_quality = 85;
                self.resize_filter = FilterType::CatmullRom;
            }
            EncodingProfile::Balanced => {
                self.max_width = 1000;
                self.max_height = 1000;
                self.jpeg_quality = 70;
                self.resize_filter = FilterType::Triangle;
            }
            EncodingProfile::Speed => {
                self.max_width = 640;
                self.max_height = 640;
                self.jpeg_quality = 60;
                self.resize_filter = FilterType::Nearest;
            }
        }
    }

    /// 校验参数范围。
    ///
    /// 这里的失败都属于调用方配置错误，构造阶段直接返回，不会被折叠为识别结果。
    pub fn validate(&self) -> Result<(), IdentifyError> {
        let url = reqwest::Url::parse(&self.endpoint)
            .map_err(|e| IdentifyError::InvalidConfig(format!("endpoint 格式错误：{}", e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(IdentifyError::InvalidConfig(format!(
                "endpoint 仅支持 http/https：{}",
                url.scheme()
            )));
        }
        if url.query().is_some() {
            return Err(IdentifyError::InvalidConfig(
                "endpoint 不能携带查询参数，请使用 detail_fields".to_string(),
            ));
        }
        if self.detail_fields.iter().any(|field| field.trim().is_empty()) {
            return Err(IdentifyError::InvalidConfig("detail_fields 不能包含空字段".to_string()));
        }
        if !(1..=8192).contains(&self.max_width) || !(1..=8192).contains(&self.max_height) {
            return Err(IdentifyError::InvalidConfig(
                "max_width / max_height 必须在 1~8192 之间".to_string(),
            ));
        }
        if self.jpeg_quality > 100 {
            return Err(IdentifyError::InvalidConfig("jpeg_quality 必须在 0~100 之间".to_string()));
        }
        if self.max_response_bytes < 1024 {
            return Err(IdentifyError::InvalidConfig("max_response_bytes 不能小于 1KB".to_string()));
        }
        if self.max_decoded_pixels == 0 || self.max_capture_file_size == 0 {
            return Err(IdentifyError::InvalidConfig(
                "max_decoded_pixels / max_capture_file_size 不能为 0".to_string(),
            ));
        }

        Ok(())
    }
}
