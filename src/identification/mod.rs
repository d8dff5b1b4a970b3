//! # 植物识别模块（identification）
//!
//! ## 设计思路
//!
//! 该模块将“拍摄帧 → 编码 → 发送 → 解析 → 统一结果”按职责拆分为多个子模块，
//! 避免单文件膨胀与耦合。
//!
//! - `service`：界面侧会话状态（加载中、结果面板、过期结果丢弃、取消）
//! - `handler`：编排整条识别流水线，擦除内部错误
//! - `loader`：帧源抽象与拍摄缓冲/文件解码
//! - `encoder`：降采样、JPEG 压缩、base64
//! - `client`：HTTP 请求与凭据
//! - `parser`：松散 JSON → 强类型结果
//! - `config/error/source`：配置、错误、中间数据模型
//!
//! ## 新同事快速上手
//!
//! 可以按下面顺序理解调用链：
//!
//! ```text
//! 界面层拍摄
//!    ↓
//! service.rs（代次 + 取消令牌 + is_loading）
//!    ↓
//! handler.rs（统一编排 + 阶段耗时日志 + 错误擦除）
//!    ├─ encoder.rs（降采样 + JPEG + base64，阻塞线程池）
//!    ├─ client.rs（POST + Api-Key + details，单次尝试）
//!    └─ parser.rs（逐层 Option 导航 + 具名默认值）
//!    ↓
//! IdentificationResult { success, name, description }
//! ```
//!
//! ## 分层职责建议
//!
//! - 编码参数与档位变更优先改 `config.rs`
//! - 流程顺序变更优先改 `handler.rs`
//! - 服务端字段变更优先改 `parser.rs`
//! - 界面状态问题优先看 `service.rs`

mod client;
mod config;
mod encoder;
mod error;
mod handler;
mod loader;
mod parser;
mod service;
mod source;

pub use client::{ApiKey, IdentificationClient};
pub use config::{DEFAULT_ENDPOINT, EncodingProfile, IdentifierConfig};
pub use encoder::{EncodeParams, ImageEncoder, fit_within};
pub use error::IdentifyError;
pub use handler::{IdentifyStage, PlantIdentifier};
pub use loader::{FileFrameSource, FrameSource};
pub use parser::{ResponseParser, Suggestion};
pub use service::IdentificationSession;
pub use source::{
    CapturedImage, EncodedPayload, IdentificationRequest, IdentificationResult, RawResponse,
};
