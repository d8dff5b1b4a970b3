//! # 服务层（界面侧会话状态）
//!
//! ## 设计思路
//!
//! 界面层需要的不只是一个结果，还有：
//! - `is_loading`：从拍摄开始到结果交付期间为 `true`
//! - `show_result`：结果到达后触发结果面板，关闭面板时复位
//! - 过期结果丢弃：用户离开或再次拍摄后，旧结果不能写回界面
//!
//! `IdentificationSession` 持有这些状态，内部持有 `PlantIdentifier`。
//!
//! ## 实现思路
//!
//! - 每次拍摄分配一个递增的 `capture_id`（代次），只有最新代次的结果会被应用。
//! - 每次拍摄持有一个 `CancellationToken`，调用方可按 id 或整体取消。
//! - `begin_capture` 同步进入加载计数并返回 `CaptureTicket`，
//!   票据内的 `LoadingGuard`（RAII）随拍摄结束释放：计数 0→1 置 `true`，
//!   归零时置 `false`，保证任何路径上都恰好清除一次。
//! - 取帧（文件读取 + 解码）与编码一样放在阻塞线程池，调用方只会被挂起。
//! - 状态通过 `tokio::sync::watch` 暴露，界面层订阅即可。

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::loader::FrameSource;
use super::source::{CapturedImage, IdentificationResult};
use super::{IdentifyError, PlantIdentifier};

/// 识别会话。
pub struct IdentificationSession {
    identifier: PlantIdentifier,
    generation: AtomicU64,
    loading: Arc<LoadingTracker>,
    cancel_tokens: Mutex<HashMap<u64, CancellationToken>>,
    latest: Mutex<Option<IdentificationResult>>,
    show_result_tx: watch::Sender<bool>,
}

/// 进行中拍摄计数与加载信号。
struct LoadingTracker {
    in_flight: Mutex<u64>,
    tx: watch::Sender<bool>,
}

/// 进行中计数的 RAII 守卫，可随拍摄移入后台任务。
struct LoadingGuard {
    tracker: Arc<LoadingTracker>,
}

impl LoadingGuard {
    fn enter(tracker: &Arc<LoadingTracker>) -> Self {
        let mut count = tracker.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        *count += 1;
        if *count == 1 {
            tracker.tx.send_replace(true);
        }
        Self {
            tracker: Arc::clone(tracker),
        }
    }
}

impl Drop for LoadingGuard {
    fn drop(&mut self) {
        let mut count = self.tracker.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        *count = count.saturating_sub(1);
        if *count == 0 {
            self.tracker.tx.send_replace(false);
        }
    }
}

/// 一次拍摄的凭据：代次、取消令牌、加载守卫。
struct CaptureTicket {
    id: u64,
    token: CancellationToken,
    loading: LoadingGuard,
}

impl IdentificationSession {
    pub fn new(identifier: PlantIdentifier) -> Self {
        let (loading_tx, _) = watch::channel(false);
        let (show_result_tx, _) = watch::channel(false);

        Self {
            identifier,
            generation: AtomicU64::new(0),
            loading: Arc::new(LoadingTracker {
                in_flight: Mutex::new(0),
                tx: loading_tx,
            }),
            cancel_tokens: Mutex::new(HashMap::new()),
            latest: Mutex::new(None),
            show_result_tx,
        }
    }

    pub fn identifier(&self) -> &PlantIdentifier {
        &self.identifier
    }

    /// 订阅加载状态。
    pub fn subscribe_loading(&self) -> watch::Receiver<bool> {
        self.loading.tx.subscribe()
    }

    /// 订阅结果面板显示触发。
    pub fn subscribe_show_result(&self) -> watch::Receiver<bool> {
        self.show_result_tx.subscribe()
    }

    pub fn is_loading(&self) -> bool {
        *self.loading.tx.borrow()
    }

    /// 最近一次被应用的结果。
    pub fn latest_result(&self) -> Option<IdentificationResult> {
        self.latest.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// 当前最新的拍摄代次。
    pub fn current_capture_id(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// 关闭结果面板。
    pub fn dismiss_result(&self) {
        self.show_result_tx.send_replace(false);
    }

    /// 取消指定拍摄。返回该拍摄是否仍在进行。
    pub fn cancel_capture(&self, capture_id: u64) -> bool {
        let tokens = self.cancel_tokens.lock().unwrap_or_else(|e| e.into_inner());
        match tokens.get(&capture_id) {
            Some(token) => {
                token.cancel();
                log::info!("🛑 已取消拍摄 #{}", capture_id);
                true
            }
            None => false,
        }
    }

    /// 取消所有进行中的拍摄（例如界面离开）。
    pub fn cancel_all(&self) {
        let tokens = self.cancel_tokens.lock().unwrap_or_else(|e| e.into_inner());
        for token in tokens.values() {
            token.cancel();
        }
        if !tokens.is_empty() {
            log::info!("🛑 已取消 {} 个进行中的拍摄", tokens.len());
        }
    }

    /// 识别一帧。
    ///
    /// 返回 `None` 表示本次拍摄已被取消或已被更新的拍摄取代，结果不会写回会话状态。
    pub async fn identify(&self, image: CapturedImage) -> Option<IdentificationResult> {
        let ticket = self.begin_capture();
        self.run_capture(ticket, std::future::ready(Ok(image))).await
    }

    /// 从帧源拍摄并识别。拍摄失败同样折叠为错误结果。
    ///
    /// 加载状态在取帧前就已置为 `true`；`capture_frame` 在阻塞线程池中执行。
    pub async fn capture_and_identify<F>(&self, source: F) -> Option<IdentificationResult>
    where
        F: FrameSource + Send + 'static,
    {
        let ticket = self.begin_capture();
        self.run_capture(ticket, Self::capture_off_thread(source)).await
    }

    /// 在后台任务中识别，完成后把结果交给回调。
    ///
    /// 返回时加载状态已经是 `true`；过期或被取消的结果不会触发回调。
    pub fn spawn_identify<D>(
        self: &Arc<Self>,
        image: CapturedImage,
        deliver: D,
    ) -> (u64, JoinHandle<()>)
    where
        D: FnOnce(IdentificationResult) + Send + 'static,
    {
        let ticket = self.begin_capture();
        let capture_id = ticket.id;
        let session = Arc::clone(self);

        let handle = tokio::spawn(async move {
            if let Some(result) = session.run_capture(ticket, std::future::ready(Ok(image))).await {
                deliver(result);
            }
        });

        (capture_id, handle)
    }

    fn begin_capture(&self) -> CaptureTicket {
        let loading = LoadingGuard::enter(&self.loading);
        let id = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let token = CancellationToken::new();
        self.cancel_tokens
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id, token.clone());

        log::debug!("📸 开始拍摄 #{}", id);
        CaptureTicket { id, token, loading }
    }

    async fn capture_off_thread<F>(mut source: F) -> Result<CapturedImage, IdentifyError>
    where
        F: FrameSource + Send + 'static,
    {
        tokio::task::spawn_blocking(move || source.capture_frame())
            .await
            .map_err(|e| IdentifyError::Capture(format!("取帧任务异常退出：{}", e)))?
    }

    /// 取帧 → 识别。令牌在取帧前、取帧中与识别各阶段之间都会被检查。
    async fn run_capture<Fr>(&self, ticket: CaptureTicket, frame: Fr) -> Option<IdentificationResult>
    where
        Fr: Future<Output = Result<CapturedImage, IdentifyError>>,
    {
        let CaptureTicket {
            id: capture_id,
            token,
            loading: _loading,
        } = ticket;

        let outcome = tokio::select! {
            biased;
            _ = token.cancelled() => None,
            result = self.capture_then_identify(capture_id, frame, &token) => Some(result),
        };

        self.cancel_tokens
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&capture_id);

        let result = outcome?;
        if token.is_cancelled() {
            log::info!("🗑️ 拍摄 #{} 已取消，丢弃结果", capture_id);
            return None;
        }
        self.apply_result(capture_id, result)
    }

    async fn capture_then_identify<Fr>(
        &self,
        capture_id: u64,
        frame: Fr,
        token: &CancellationToken,
    ) -> IdentificationResult
    where
        Fr: Future<Output = Result<CapturedImage, IdentifyError>>,
    {
        match frame.await {
            Ok(image) => {
                self.identifier
                    .identify_with_hooks(
                        image,
                        |stage| log::debug!("🔄 拍摄 #{} 进入阶段 {:?}", capture_id, stage),
                        || token.is_cancelled(),
                    )
                    .await
            }
            Err(err) => {
                log::error!("❌ 拍摄 #{} 获取画面失败：{}", capture_id, err);
                IdentificationResult::from_error(&err)
            }
        }
    }

    /// 只应用最新代次的结果。
    fn apply_result(&self, capture_id: u64, result: IdentificationResult) -> Option<IdentificationResult> {
        let mut latest = self.latest.lock().unwrap_or_else(|e| e.into_inner());
        if capture_id != self.current_capture_id() {
            log::info!(
                "🗑️ 拍摄 #{} 已过期（最新 #{}），丢弃结果",
                capture_id,
                self.current_capture_id()
            );
            return None;
        }

        *latest = Some(result.clone());
        self.show_result_tx.send_replace(true);
        Some(result)
    }
}

impl std::fmt::Debug for IdentificationSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentificationSession")
            .field("generation", &self.current_capture_id())
            .field("is_loading", &self.is_loading())
            .finish_non_exhaustive()
    }
}
