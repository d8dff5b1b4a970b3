//! # 植物识别 — 库入口
//!
//! ## 架构总览
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │            界面层（相机预览 / 加载提示 / 结果面板）        │
//! │                                                          │
//! │   FrameSource ──→ 拍摄帧          is_loading / show_result│
//! └───────┼───────────────────────────────────↑──────────────┘
//!         ↓ CapturedImage                     │ IdentificationResult
//! ┌───────┼───────────────────────────────────┼──────────────┐
//! │       ↓            核心 (Rust)             │              │
//! │                                                          │
//! │  ┌─ error ────────── AppError（二进制入口统一错误）        │
//! │  │                                                       │
//! │  └─ identification                                       │
//! │      ├─ service   会话状态 · 取消 · 过期结果丢弃          │
//! │      ├─ handler   编码 → 发送 → 解析 编排                 │
//! │      ├─ encoder   降采样 · JPEG · base64                  │
//! │      ├─ client    Plant.id HTTP 请求                      │
//! │      └─ parser    松散 JSON → 强类型结果                  │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## 模块职责
//!
//! | 模块 | 职责 |
//! |------|------|
//! | [`error`] | 统一错误类型 `AppError`，二进制入口使用 |
//! | [`identification`] | 识别流水线与界面侧会话状态 |

pub mod error;
pub mod identification;
