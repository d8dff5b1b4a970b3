//! 统一错误类型模块
//!
//! # 设计思路
//!
//! 识别流水线内部错误（`IdentifyError`）在编排器处被擦除为识别结果，
//! 不会到达这里。`AppError` 只覆盖入口层自己的失败：参数、环境、
//! 构造阶段的配置错误、结果输出。
//!
//! # 实现思路
//!
//! - 使用 `thiserror` 派生可读错误消息。
//! - 为 `IdentifyError`、`std::io::Error`、`serde_json::Error` 提供 `From` 转换。

use crate::identification::IdentifyError;

/// 应用级统一错误类型
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// 命令行参数错误
    #[error("参数错误: {0}\n用法: plant-identifier <照片路径> [quality|balanced|speed]")]
    Usage(String),

    /// 缺少必要的环境配置
    #[error("环境配置缺失: {0}")]
    Environment(String),

    /// 识别组件构造失败
    #[error("{0}")]
    Identify(#[from] IdentifyError),

    /// 文件系统 / 标准输出 I/O 错误
    #[error("I/O 错误: {0}")]
    Io(#[from] std::io::Error),

    /// 结果序列化失败
    #[error("结果序列化失败: {0}")]
    Serialize(#[from] serde_json::Error),
}
