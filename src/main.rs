//! # 植物识别 — 命令行入口
//!
//! 本文件仅负责日志初始化、读取参数与环境、组装会话并输出结果。
//! 业务逻辑分布在 `identification` 各子模块中，详见 `lib.rs` 架构文档。
//!
//! API 密钥只从环境变量读取，不写进源码或仓库。

use std::io::Write;
use std::process::ExitCode;

use plant_identifier::error::AppError;
use plant_identifier::identification::{
    ApiKey, EncodingProfile, FileFrameSource, IdentificationSession, IdentifierConfig,
    PlantIdentifier,
};

const API_KEY_ENV: &str = "PLANT_ID_API_KEY";
const ENDPOINT_ENV: &str = "PLANT_ID_ENDPOINT";

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run().await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(2),
        Err(err) => {
            log::error!("{err}");
            ExitCode::FAILURE
        }
    }
}

/// 返回是否识别成功。
async fn run() -> Result<bool, AppError> {
    let mut args = std::env::args().skip(1);
    let photo = args
        .next()
        .ok_or_else(|| AppError::Usage("缺少照片路径".to_string()))?;
    let profile = args
        .next()
        .map(|p| EncodingProfile::from_str(&p))
        .transpose()?;
    if args.next().is_some() {
        return Err(AppError::Usage("参数过多".to_string()));
    }

    let api_key = std::env::var(API_KEY_ENV)
        .map_err(|_| AppError::Environment(format!("请设置环境变量 {}", API_KEY_ENV)))?;

    let mut config = IdentifierConfig::default();
    if let Ok(endpoint) = std::env::var(ENDPOINT_ENV) {
        log::info!("setup: 使用自定义识别端点");
        config.endpoint = endpoint;
    }

    let identifier = PlantIdentifier::new(config.clone(), ApiKey::new(api_key)?)?;
    if let Some(profile) = profile {
        identifier.set_encoding_profile(profile)?;
    }
    log::info!("setup: identifier ready (profile={})", identifier.encoding_profile()?.as_str());

    let session = IdentificationSession::new(identifier);

    let mut loading = session.subscribe_loading();
    let loading_watcher = tokio::spawn(async move {
        while loading.changed().await.is_ok() {
            if *loading.borrow_and_update() {
                log::info!("⏳ 正在识别…");
            } else {
                log::info!("✔️ 识别结束");
            }
        }
    });

    let source = FileFrameSource::new(&photo, config);
    let outcome = tokio::select! {
        result = session.capture_and_identify(source) => result,
        _ = tokio::signal::ctrl_c() => {
            session.cancel_all();
            None
        }
    };

    drop(session);
    let _ = loading_watcher.await;

    let Some(result) = outcome else {
        log::warn!("识别已取消");
        return Ok(false);
    };

    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, &result)?;
    writeln!(stdout)?;

    Ok(result.success)
}
