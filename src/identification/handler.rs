//! # 核心编排模块
//!
//! ## 设计思路
//!
//! `PlantIdentifier` 只负责流程编排与配置管理，不关心相机和 UI。
//! 处理链路固定为：
//! 1. 读取配置快照
//! 2. 编码（降采样 + JPEG + base64，放在阻塞线程池）
//! 3. 发送识别请求
//! 4. 解析响应
//!
//! 状态机：`Idle → Encoding → Sending → Parsing → Done`，
//! 任一阶段失败都直接跳到 `Done`，不进入下一阶段。
//!
//! ## 实现思路
//!
//! - 配置通过 `Arc<RwLock<IdentifierConfig>>` 支持运行时切换编码档位。
//! - 单次识别内使用“同一配置快照”，避免处理中途配置漂移。
//! - 所有运行期错误在这里被擦除为统一的 `IdentificationResult`，
//!   `identify` 不会向调用方返回错误。
//! - 记录 `encode/send/parse/total` 阶段耗时，便于性能诊断。

use std::sync::{Arc, RwLock};
use std::time::Instant;

use super::client::{ApiKey, IdentificationClient};
use super::encoder::{EncodeParams, ImageEncoder};
use super::parser::ResponseParser;
use super::source::{CapturedImage, IdentificationRequest, IdentificationResult};
use super::{EncodingProfile, IdentifierConfig, IdentifyError};

/// 单次识别的阶段。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifyStage {
    Idle,
    Encoding,
    Sending,
    Parsing,
    Done,
}

/// 识别编排器。
///
/// 封装了配置状态与 HTTP 客户端，并编排各子模块实现完整流程。
#[derive(Debug)]
pub struct PlantIdentifier {
    config: Arc<RwLock<IdentifierConfig>>,
    client: IdentificationClient,
    encoder: ImageEncoder,
    parser: ResponseParser,
}

impl PlantIdentifier {
    /// 根据配置与密钥创建编排器。
    ///
    /// 配置非法属于调用方错误，这里直接返回 `InvalidConfig`，不会折叠为识别结果。
    ///
    /// # 示例
    /// ```rust,no_run
    /// use plant_identifier::identification::{ApiKey, IdentifierConfig, PlantIdentifier};
    ///
    /// let key = ApiKey::new(std::env::var("PLANT_ID_API_KEY").unwrap_or_default())?;
    /// let identifier = PlantIdentifier::new(IdentifierConfig::default(), key)?;
    /// # Ok::<(), plant_identifier::identification::IdentifyError>(())
    /// ```
    pub fn new(config: IdentifierConfig, api_key: ApiKey) -> Result<Self, IdentifyError> {
        config.validate()?;
        let client = IdentificationClient::new(&config, api_key)?;

        Ok(Self {
            config: Arc::new(RwLock::new(config)),
            client,
            encoder: ImageEncoder,
            parser: ResponseParser,
        })
    }

    /// 获取配置快照。
    ///
    /// 作用：保证单次识别链路使用一致参数。
    pub fn config_snapshot(&self) -> Result<IdentifierConfig, IdentifyError> {
        self.config
            .read()
            .map(|cfg| cfg.clone())
            .map_err(|_| IdentifyError::Internal("配置读取锁已中毒".to_string()))
    }

    /// 切换编码档位。
    pub fn set_encoding_profile(&self, profile: EncodingProfile) -> Result<(), IdentifyError> {
        let mut config = self
            .config
            .write()
            .map_err(|_| IdentifyError::Internal("配置写入锁已中毒".to_string()))?;
        config.apply_encoding_profile(profile);

        log::info!(
            "⚙️ 已切换编码档位：{:?}（max={}x{}, quality={}, filter={:?}）",
            profile,
            config.max_width,
            config.max_height,
            config.jpeg_quality,
            config.resize_filter
        );

        Ok(())
    }

    /// 获取当前生效档位。
    pub fn encoding_profile(&self) -> Result<EncodingProfile, IdentifyError> {
        let config = self
            .config
            .read()
            .map_err(|_| IdentifyError::Internal("配置读取锁已中毒".to_string()))?;
        Ok(config.infer_encoding_profile())
    }

    /// 识别主入口。任何路径都返回一个 `IdentificationResult`。
    ///
    /// # 示例
    /// ```rust,no_run
    /// use plant_identifier::identification::{ApiKey, CapturedImage, IdentifierConfig, PlantIdentifier};
    ///
    /// # async fn demo() -> Result<(), plant_identifier::identification::IdentifyError> {
    /// let identifier = PlantIdentifier::new(IdentifierConfig::default(), ApiKey::new("key")?)?;
    /// let frame = CapturedImage::from_rgba8(2, 2, vec![0; 16])?;
    /// let result = identifier.identify(frame).await;
    /// println!("{}: {}", result.name, result.description);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn identify(&self, image: CapturedImage) -> IdentificationResult {
        self.identify_with_hooks(image, |_| {}, || false).await
    }

    /// 带阶段回调与取消检查的识别入口。
    ///
    /// `on_stage` 对每次阶段切换调用一次，且 `Done` 在所有路径上恰好出现一次。
    /// `is_cancelled` 在每个阶段开始前检查。
    pub async fn identify_with_hooks<S, C>(
        &self,
        image: CapturedImage,
        on_stage: S,
        is_cancelled: C,
    ) -> IdentificationResult
    where
        S: Fn(IdentifyStage) + Send + Sync,
        C: Fn() -> bool + Send + Sync,
    {
        on_stage(IdentifyStage::Idle);
        let total_start = Instant::now();

        let outcome = self.run_pipeline(image, &on_stage, &is_cancelled).await;
        on_stage(IdentifyStage::Done);

        match outcome {
            Ok(result) => {
                log::info!(
                    "✅ 识别流程完成 - success={} total={}ms",
                    result.success,
                    total_start.elapsed().as_millis()
                );
                result
            }
            Err(err) => {
                log::error!(
                    "❌ 识别流程失败 - {} total={}ms",
                    err,
                    total_start.elapsed().as_millis()
                );
                IdentificationResult::from_error(&err)
            }
        }
    }

    async fn run_pipeline<S, C>(
        &self,
        image: CapturedImage,
        on_stage: &S,
        is_cancelled: &C,
    ) -> Result<IdentificationResult, IdentifyError>
    where
        S: Fn(IdentifyStage) + Send + Sync,
        C: Fn() -> bool + Send + Sync,
    {
        let config = self.config_snapshot()?;

        Self::ensure_not_cancelled(is_cancelled)?;
        on_stage(IdentifyStage::Encoding);
        let encode_start = Instant::now();
        let params = EncodeParams {
            max_width: config.max_width,
            max_height: config.max_height,
            quality: config.jpeg_quality,
            filter: config.resize_filter,
        };
        let encoder = self.encoder;
        let payload = tokio::task::spawn_blocking(move || encoder.encode(image, params))
            .await
            .map_err(|e| IdentifyError::Encoding(format!("编码任务异常退出：{}", e)))??;
        let encode_elapsed = encode_start.elapsed();

        Self::ensure_not_cancelled(is_cancelled)?;
        on_stage(IdentifyStage::Sending);
        let send_start = Instant::now();
        let request = IdentificationRequest::single(payload, config.request_similar_images);
        let raw = self.client.send(&request).await?;
        drop(request);
        let send_elapsed = send_start.elapsed();

        Self::ensure_not_cancelled(is_cancelled)?;
        on_stage(IdentifyStage::Parsing);
        let parse_start = Instant::now();
        let result = self.parser.parse(&raw)?;
        let parse_elapsed = parse_start.elapsed();

        log::info!(
            "⏱️ 阶段耗时 - encode={}ms send={}ms parse={}ms",
            encode_elapsed.as_millis(),
            send_elapsed.as_millis(),
            parse_elapsed.as_millis()
        );

        Ok(result)
    }

    fn ensure_not_cancelled<C>(is_cancelled: &C) -> Result<(), IdentifyError>
    where
        C: Fn() -> bool,
    {
        if is_cancelled() {
            return Err(IdentifyError::Cancelled);
        }
        Ok(())
    }
}
