//! # 拍摄加载模块
//!
//! ## 设计思路
//!
//! 相机生命周期不在本 crate 内，核心只需要“拿到下一帧”这一能力，
//! 由 `FrameSource` 抽象。这里提供两条落地路径：
//!
//! - 相机交付的压缩缓冲（JPEG/PNG 等）→ `CapturedImage::from_encoded_bytes`
//! - 本地照片文件 → `FileFrameSource`
//!
//! ## 实现思路
//!
//! 先猜测格式并读取 header 尺寸，按像素上限快速拒绝，再做完整解码，
//! 降低恶意或异常输入触发高内存开销的风险。

use image::{GenericImageView, ImageReader};
use std::io::Cursor;
use std::path::{Path, PathBuf};

use super::source::CapturedImage;
use super::{IdentifierConfig, IdentifyError};

/// 外部拍摄能力：每次用户触发拍摄时交付一帧。
///
/// 会话在阻塞线程池中调用 `capture_frame`，实现可以直接做同步 I/O 与解码。
pub trait FrameSource {
    fn capture_frame(&mut self) -> Result<CapturedImage, IdentifyError>;
}

impl CapturedImage {
    /// 解码相机交付的压缩缓冲。
    pub fn from_encoded_bytes(bytes: &[u8], config: &IdentifierConfig) -> Result<Self, IdentifyError> {
        image::guess_format(bytes)
            .map_err(|e| IdentifyError::Capture(format!("不支持的图片格式：{}", e)))?;

        let (header_width, header_height) = inspect_dimensions_from_memory(bytes)?;
        validate_pixel_limits(config, header_width, header_height)?;

        let decoded = image::load_from_memory(bytes)
            .map_err(|e| IdentifyError::Capture(format!("图片解码失败：{}", e)))?;
        let (width, height) = decoded.dimensions();
        validate_pixel_limits(config, width, height)?;

        log::debug!("📷 拍摄帧解码成功：{}x{}", width, height);

        Self::from_rgba8(width, height, decoded.to_rgba8().into_raw())
    }
}

/// 仅通过内存中的图片头信息读取宽高。
fn inspect_dimensions_from_memory(bytes: &[u8]) -> Result<(u32, u32), IdentifyError> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| IdentifyError::Capture(format!("无法识别图片格式：{}", e)))?;

    reader
        .into_dimensions()
        .map_err(|e| IdentifyError::Capture(format!("无法读取图片尺寸：{}", e)))
}

fn validate_pixel_limits(config: &IdentifierConfig, width: u32, height: u32) -> Result<(), IdentifyError> {
    let pixels = (width as u64)
        .checked_mul(height as u64)
        .ok_or_else(|| IdentifyError::ResourceLimit("图片像素数溢出".to_string()))?;

    if pixels > config.max_decoded_pixels {
        return Err(IdentifyError::ResourceLimit(format!(
            "图片像素过大：{} 像素（限制：{} 像素）",
            pixels, config.max_decoded_pixels
        )));
    }

    Ok(())
}

/// 从本地照片文件读取“拍摄帧”。
#[derive(Debug, Clone)]
pub struct FileFrameSource {
    path: PathBuf,
    config: IdentifierConfig,
}

impl FileFrameSource {
    pub fn new(path: impl Into<PathBuf>, config: IdentifierConfig) -> Self {
        Self {
            path: path.into(),
            config,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FrameSource for FileFrameSource {
    fn capture_frame(&mut self) -> Result<CapturedImage, IdentifyError> {
        let path = self.path.as_path();
        log::info!("📁 开始读取本地图片 - 路径: {}", path.display());

        if !path.exists() {
            return Err(IdentifyError::Capture(format!("文件不存在：{}", path.display())));
        }

        let metadata = std::fs::metadata(path)
            .map_err(|e| IdentifyError::Capture(format!("无法读取文件信息：{}", e)))?;

        if metadata.len() > self.config.max_capture_file_size {
            return Err(IdentifyError::ResourceLimit(format!(
                "文件过大：{:.2} MB（限制：{:.2} MB）",
                metadata.len() as f64 / 1024.0 / 1024.0,
                self.config.max_capture_file_size as f64 / 1024.0 / 1024.0
            )));
        }

        let bytes = std::fs::read(path)
            .map_err(|e| IdentifyError::Capture(format!("无法读取图片文件：{}", e)))?;

        CapturedImage::from_encoded_bytes(&bytes, &self.config)
    }
}
