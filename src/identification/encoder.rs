//! # 编码流水线模块
//!
//! ## 设计思路
//!
//! 将“RGBA 帧 → 降采样 → JPEG → base64”的过程集中管理，控制请求体体积。
//!
//! ## 实现思路
//!
//! 1. 拒绝零尺寸帧
//! 2. 计算统一缩放比例（只缩小、不放大，保持宽高比）
//! 3. 需要时降采样（fast_image_resize，失败回退 `image::resize_exact`）
//! 4. 按质量压缩为 JPEG
//! 5. base64 传输编码
//!
//! 中间缓冲都是按值持有的局部变量，任一路径返回时随作用域释放。

use base64::{Engine as _, engine::general_purpose};
use fast_image_resize as fr;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageBuffer, Rgba};

use super::source::{CapturedImage, EncodedPayload};
use super::IdentifyError;

/// 单次编码参数。
#[derive(Debug, Clone, Copy)]
pub struct EncodeParams {
    pub max_width: u32,
    pub max_height: u32,
    pub quality: u8,
    pub filter: FilterType,
}

/// 图片编码器，无状态。
#[derive(Debug, Default, Clone, Copy)]
pub struct ImageEncoder;

impl ImageEncoder {
    /// 编码主入口。
    ///
    /// # 示例
    /// ```rust
    /// use image::imageops::FilterType;
    /// use plant_identifier::identification::{CapturedImage, EncodeParams, ImageEncoder};
    ///
    /// let image = CapturedImage::from_rgba8(4, 2, vec![128; 4 * 2 * 4])?;
    /// let params = EncodeParams { max_width: 2, max_height: 2, quality: 70, filter: FilterType::Triangle };
    /// let payload = ImageEncoder.encode(image, params)?;
    /// assert_eq!((payload.width(), payload.height()), (2, 1));
    /// # Ok::<(), plant_identifier::identification::IdentifyError>(())
    /// ```
    pub fn encode(
        &self,
        image: CapturedImage,
        params: EncodeParams,
    ) -> Result<EncodedPayload, IdentifyError> {
        let (width, height, pixels) = image.into_raw();
        if width == 0 || height == 0 {
            return Err(IdentifyError::Encoding(format!("源图像尺寸退化：{}x{}", width, height)));
        }
        if params.max_width == 0 || params.max_height == 0 {
            return Err(IdentifyError::Encoding(format!(
                "目标尺寸非法：{}x{}",
                params.max_width, params.max_height
            )));
        }

        let rgba = ImageBuffer::<Rgba<u8>, Vec<u8>>::from_raw(width, height, pixels)
            .ok_or_else(|| IdentifyError::Encoding("像素缓冲长度异常".to_string()))?;
        let source = DynamicImage::ImageRgba8(rgba);

        let (target_width, target_height) =
            fit_within(width, height, params.max_width, params.max_height);

        let scaled = if (target_width, target_height) == (width, height) {
            source
        } else {
            log::info!(
                "🧩 降采样：{}x{} -> {}x{}（filter={:?}）",
                width,
                height,
                target_width,
                target_height,
                params.filter
            );
            Self::downscale(source, target_width, target_height, params.filter)
        };

        let jpeg = Self::compress_jpeg(&scaled, params.quality)?;
        drop(scaled);

        log::debug!(
            "🗜️ JPEG 压缩完成：{}x{} quality={} size={}KB",
            target_width,
            target_height,
            params.quality,
            jpeg.len() / 1024
        );

        let base64 = general_purpose::STANDARD.encode(&jpeg);
        Ok(EncodedPayload::new(target_width, target_height, jpeg.len(), base64))
    }

    fn downscale(
        image: DynamicImage,
        target_width: u32,
        target_height: u32,
        filter: FilterType,
    ) -> DynamicImage {
        match Self::resize_with_fast_image_resize(&image, target_width, target_height, filter) {
            Ok(resized) => resized,
            Err(err) => {
                log::warn!("⚠️ fast_image_resize 降采样失败，回退 image::resize_exact：{}", err);
                image.resize_exact(target_width, target_height, filter)
            }
        }
    }

    fn resize_with_fast_image_resize(
        image: &DynamicImage,
        target_width: u32,
        target_height: u32,
        filter: FilterType,
    ) -> Result<DynamicImage, IdentifyError> {
        let src = image.to_rgba8();
        let (src_width, src_height) = src.dimensions();

        let src_image = fr::images::Image::from_vec_u8(
            src_width,
            src_height,
            src.into_raw(),
            fr::PixelType::U8x4,
        )
        .map_err(|e| IdentifyError::Encoding(format!("构建源图像缓冲失败：{}", e)))?;

        let mut dst_image = fr::images::Image::new(target_width, target_height, fr::PixelType::U8x4);

        let mut resizer = fr::Resizer::new();
        let options = fr::ResizeOptions::new()
            .resize_alg(fr::ResizeAlg::Convolution(Self::to_fast_filter(filter)));

        resizer
            .resize(&src_image, &mut dst_image, Some(&options))
            .map_err(|e| IdentifyError::Encoding(format!("fast_image_resize 执行失败：{}", e)))?;

        let rgba = ImageBuffer::<Rgba<u8>, Vec<u8>>::from_raw(
            target_width,
            target_height,
            dst_image.into_vec(),
        )
        .ok_or_else(|| IdentifyError::Encoding("fast_image_resize 输出缓冲长度异常".to_string()))?;

        Ok(DynamicImage::ImageRgba8(rgba))
    }

    fn to_fast_filter(filter: FilterType) -> fr::FilterType {
        match filter {
            FilterType::Nearest => fr::FilterType::Box,
            FilterType::Triangle => fr::FilterType::Bilinear,
            FilterType::CatmullRom => fr::FilterType::CatmullRom,
            FilterType::Gaussian => fr::FilterType::Mitchell,
            FilterType::Lanczos3 => fr::FilterType::Lanczos3,
        }
    }

    /// JPEG 不支持 alpha，先转 RGB8。
    fn compress_jpeg(image: &DynamicImage, quality: u8) -> Result<Vec<u8>, IdentifyError> {
        let rgb = image.to_rgb8();
        let mut bytes = Vec::new();
        JpegEncoder::new_with_quality(&mut bytes, quality.clamp(1, 100))
            .encode_image(&rgb)
            .map_err(|e| IdentifyError::Encoding(format!("JPEG 压缩失败：{}", e)))?;

        if bytes.is_empty() {
            return Err(IdentifyError::Encoding("JPEG 压缩结果为空".to_string()));
        }

        Ok(bytes)
    }
}

/// 计算等比缩放后的目标尺寸。
///
/// 已在范围内时原样返回；否则取所需比例更小的一边作为限制边，
/// 限制边精确落在上限上，另一边四舍五入且不小于 1。
pub fn fit_within(width: u32, height: u32, max_width: u32, max_height: u32) -> (u32, u32) {
    if width <= max_width && height <= max_height {
        return (width, height);
    }

    let (w, h) = (width as u64, height as u64);
    let (mw, mh) = (max_width as u64, max_height as u64);

    // mw / w <= mh / h
    if mw * h <= mh * w {
        let scaled_height = ((h * mw + w / 2) / w).max(1);
        (max_width, scaled_height as u32)
    } else {
        let scaled_width = ((w * mh + h / 2) / h).max(1);
        (scaled_width as u32, max_height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::ImageFormat;
    use proptest::prelude::*;

    fn gradient_image(width: u32, height: u32) -> CapturedImage {
        let img = ImageBuffer::from_fn(width, height, |x, y| {
            let r = (x % 255) as u8;
            let g = (y % 255) as u8;
            let b = ((x + y) % 255) as u8;
            Rgba([r, g, b, 255])
        });
        CapturedImage::from_rgba8(width, height, img.into_raw()).expect("valid test image")
    }

    fn params(max_width: u32, max_height: u32) -> EncodeParams {
        EncodeParams {
            max_width,
            max_height,
            quality: 70,
            filter: FilterType::Triangle,
        }
    }

    #[test]
    fn landscape_2000x1000_scales_to_1000x500_and_decodes_as_jpeg() {
        let payload = ImageEncoder
            .encode(gradient_image(2000, 1000), params(1000, 1000))
            .expect("encode should succeed");

        assert_eq!((payload.width(), payload.height()), (1000, 500));
        assert!(payload.jpeg_len() > 0);

        let bytes = general_purpose::STANDARD
            .decode(payload.as_base64())
            .expect("payload should be valid base64");
        assert_eq!(bytes.len(), payload.jpeg_len());
        assert_eq!(image::guess_format(&bytes).unwrap(), ImageFormat::Jpeg);

        let decoded = image::load_from_memory_with_format(&bytes, ImageFormat::Jpeg)
            .expect("payload should decode as jpeg");
        assert_eq!((decoded.width(), decoded.height()), (1000, 500));
    }

    #[test]
    fn image_within_bounds_is_not_resampled() {
        let payload = ImageEncoder
            .encode(gradient_image(640, 480), params(1000, 1000))
            .expect("encode should succeed");
        assert_eq!((payload.width(), payload.height()), (640, 480));
    }

    #[test]
    fn portrait_image_limited_by_height() {
        let payload = ImageEncoder
            .encode(gradient_image(600, 1800), params(1000, 1000))
            .expect("encode should succeed");
        assert_eq!((payload.width(), payload.height()), (333, 1000));
    }

    #[test]
    fn encoding_is_deterministic() {
        let first = ImageEncoder
            .encode(gradient_image(1200, 900), params(1000, 1000))
            .unwrap();
        let second = ImageEncoder
            .encode(gradient_image(1200, 900), params(1000, 1000))
            .unwrap();
        assert_eq!(first.jpeg_len(), second.jpeg_len());
        assert_eq!(first.as_base64(), second.as_base64());
    }

    #[test]
    fn zero_sized_image_is_rejected() {
        let image = CapturedImage::from_rgba8(0, 10, Vec::new()).unwrap();
        let result = ImageEncoder.encode(image, params(1000, 1000));
        assert!(matches!(result, Err(IdentifyError::Encoding(_))));
    }

    #[test]
    fn quality_zero_is_clamped_not_rejected() {
        let mut p = params(100, 100);
        p.quality = 0;
        let payload = ImageEncoder.encode(gradient_image(64, 64), p).unwrap();
        assert!(payload.jpeg_len() > 0);
    }

    #[test]
    fn fit_within_tie_break_uses_smaller_scale() {
        // 宽需 0.5，高需 0.8 → 以宽为限制边
        assert_eq!(fit_within(2000, 1250, 1000, 1000), (1000, 625));
        // 宽需 0.8，高需 0.5 → 以高为限制边
        assert_eq!(fit_within(1250, 2000, 1000, 1000), (625, 1000));
        assert_eq!(fit_within(3000, 3000, 1000, 1000), (1000, 1000));
        assert_eq!(fit_within(5000, 1, 1000, 1000), (1000, 1));
    }

    proptest! {
        #[test]
        fn fitting_images_keep_their_size(
            (max_w, w) in (1u32..4000).prop_flat_map(|m| (Just(m), 1..=m)),
            (max_h, h) in (1u32..4000).prop_flat_map(|m| (Just(m), 1..=m)),
        ) {
            prop_assert_eq!(fit_within(w, h, max_w, max_h), (w, h));
        }

        #[test]
        fn scaled_images_respect_bounds_and_aspect(
            w in 1u32..10_000,
            h in 1u32..10_000,
            max_w in 1u32..4000,
            max_h in 1u32..4000,
        ) {
            let (tw, th) = fit_within(w, h, max_w, max_h);
            prop_assert!(tw <= max_w && th <= max_h);
            prop_assert!(tw <= w && th <= h);
            prop_assert!(tw >= 1 && th >= 1);

            if w > max_w || h > max_h {
                prop_assert!(tw == max_w || th == max_h);
                // 另一边只有四舍五入（或钳到 1）的误差
                let aspect_err = (tw as f64 * h as f64 - th as f64 * w as f64).abs();
                prop_assert!(aspect_err <= w.max(h) as f64);
            }
        }

        #[test]
        fn landscape_dominant_hits_max_width_exactly(
            max_w in 1u32..2000,
            extra in 1u32..2000,
            h in 1u32..2000,
        ) {
            let w = max_w + extra;
            let (tw, _) = fit_within(w, h, max_w, u32::MAX / 2);
            prop_assert_eq!(tw, max_w);
        }
    }
}
