//! # 错误模型模块
//!
//! ## 设计思路
//!
//! 使用单一错误枚举承载识别链路中的所有错误来源，避免字符串拼接式错误处理。
//! 通过 `thiserror` 保持人类可读错误，同时让调用侧可按分支匹配。
//!
//! 这些错误只在流水线内部流转：编排器（`PlantIdentifier`）是唯一把它们
//! 擦除为统一 `IdentificationResult` 的地方。`InvalidConfig` 例外，
//! 它只在构造阶段出现，属于配置错误，直接返回给调用方。

/// 识别流水线统一错误类型。
#[derive(Debug, thiserror::Error)]
pub enum IdentifyError {
    /// 相机帧获取失败。
    #[error("拍摄失败：{0}")]
    Capture(String),

    /// 源图像退化（零尺寸）或压缩产出为空。
    #[error("编码错误：{0}")]
    Encoding(String),

    /// 连接失败、非 2xx 状态码或响应体读取失败。
    #[error("网络错误：{0}")]
    Network(String),

    /// 响应体不是合法的顶层 JSON 对象。
    #[error("解析错误：{0}")]
    Parse(String),

    /// 输入或响应超出资源上限。
    #[error("资源限制：{0}")]
    ResourceLimit(String),

    /// 调用方已放弃本次识别。
    #[error("识别已取消")]
    Cancelled,

    /// 构造阶段的配置错误（端点、密钥、参数范围）。
    #[error("配置错误：{0}")]
    InvalidConfig(String),

    /// 共享状态不可用（锁中毒）。
    #[error("内部状态错误：{0}")]
    Internal(String),
}
