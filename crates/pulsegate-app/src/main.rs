//! # pulsegate
//!
//! Pulsegate 에이전트 바이너리 진입점.
//! 설정 로드, 익스포터 와이어링, 자체 수집 루프, 라이프사이클 관리.

mod lifecycle;
mod scheduler;

use anyhow::{Context, Result};
use clap::Parser;
use directories::ProjectDirs;
use pulsegate_core::config::AppConfig;
use pulsegate_core::config_manager::ConfigManager;
use pulsegate_core::ports::host::HostPropertySource;
use pulsegate_exporter::exporter::TelemetryExporter;
use pulsegate_monitor::host::SysInfoHostProperties;
use pulsegate_monitor::system::SystemMetricsCollector;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::lifecycle::AgentLifecycle;
use crate::scheduler::CollectionScheduler;

/// Pulsegate 텔레메트리 에이전트
///
/// 로컬 시스템 메트릭을 수집해 인제스트 엔드포인트로 전송하고
/// 호스트 메타데이터를 디멘션 API에 동기화한다.
#[derive(Parser, Debug)]
#[command(name = "pulsegate")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// 설정 파일 경로 (기본: 플랫폼 설정 디렉토리의 config.json)
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// 인제스트 URL
    #[arg(long)]
    ingest_url: Option<String>,

    /// 디멘션 API URL
    #[arg(long)]
    api_url: Option<String>,

    /// 액세스 토큰
    #[arg(long, short = 't')]
    token: Option<String>,

    /// 로그 레벨 (trace, debug, info, warn, error)
    #[arg(long, short = 'l', default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)),
        )
        .init();

    info!("Pulsegate 에이전트 시작 v{}", env!("CARGO_PKG_VERSION"));

    let config_manager = load_config_manager(args.config.clone())?;
    info!("설정 파일: {}", config_manager.config_path().display());

    let mut config = config_manager.get();
    apply_cli_overrides(&mut config, &args);
    config.validate().context("설정 검증 실패")?;

    if config.ingest.access_token.is_empty() {
        warn!("액세스 토큰 미설정: 인제스트가 요청을 거부할 수 있음");
    }

    let host_source: Arc<dyn HostPropertySource> = Arc::new(SysInfoHostProperties::collect());
    let collector = Arc::new(match host_source.host_name() {
        Some(name) => SystemMetricsCollector::with_host_name(name),
        None => SystemMetricsCollector::new(),
    });

    let exporter = Arc::new(
        TelemetryExporter::from_config(&config, Some(host_source))
            .context("익스포터 생성 실패")?,
    );
    exporter.start().context("익스포터 시작 실패")?;

    let lifecycle = AgentLifecycle::new();
    let scheduler = CollectionScheduler::new(
        Arc::clone(&exporter),
        collector,
        config.collect_interval(),
    );
    let shutdown_rx = lifecycle.subscribe();
    let collection = tokio::spawn(async move { scheduler.run(shutdown_rx).await });

    match lifecycle.wait_for_signal().await {
        Ok(signal) => info!("{signal} 수신"),
        Err(e) => error!("시그널 핸들러 등록 실패: {e}"),
    }

    let report = lifecycle.shutdown(&exporter, collection).await;
    if let Some(stats) = report.collection {
        info!("수집 데이터포인트: 수락 {}건, 유실 {}건", stats.accepted, stats.dropped);
    }
    if report.metadata.dropped_updates > 0 {
        warn!("유실된 메타데이터 업데이트: {}건", report.metadata.dropped_updates);
    }

    info!("Pulsegate 에이전트 종료");
    Ok(())
}

/// 설정 관리자 생성
///
/// 경로가 지정되지 않으면 플랫폼 설정 디렉토리를 사용하고,
/// 실패하면 `ProjectDirs` 기반 경로로 폴백한다.
fn load_config_manager(path: Option<PathBuf>) -> Result<ConfigManager> {
    if let Some(path) = path {
        return ConfigManager::with_path(path).context("설정 파일 로드 실패");
    }

    match ConfigManager::new() {
        Ok(manager) => Ok(manager),
        Err(e) => {
            warn!("기본 설정 디렉토리 사용 불가: {e}");
            let dirs = ProjectDirs::from("io", "pulsegate", "pulsegate")
                .context("설정 디렉토리를 결정할 수 없습니다")?;
            ConfigManager::with_path(dirs.config_dir().join("config.json"))
                .context("설정 파일 로드 실패")
        }
    }
}

/// CLI 인자로 설정 덮어쓰기 (파일에는 저장하지 않음)
fn apply_cli_overrides(config: &mut AppConfig, args: &Args) {
    if let Some(url) = &args.ingest_url {
        config.ingest.ingest_url = url.clone();
    }
    if let Some(url) = &args.api_url {
        config.ingest.api_url = url.clone();
    }
    if let Some(token) = args.token.as_ref().filter(|t| !t.trim().is_empty()) {
        config.ingest.access_token = token.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_overrides_apply_to_config() {
        let args = Args::parse_from([
            "pulsegate",
            "--ingest-url",
            "http://localhost:9943",
            "--token",
            "cli-token",
        ]);
        let mut config = AppConfig::default_config();
        apply_cli_overrides(&mut config, &args);

        assert_eq!(config.ingest.ingest_url, "http://localhost:9943");
        assert_eq!(config.ingest.access_token, "cli-token");
        assert_eq!(config.ingest.api_url, AppConfig::default_config().ingest.api_url);
        assert_eq!(args.log_level, "info");
    }

    #[test]
    fn blank_token_is_ignored() {
        let args = Args::parse_from(["pulsegate", "--token", "  "]);
        let mut config = AppConfig::default_config();
        config.ingest.access_token = "file-token".into();
        apply_cli_overrides(&mut config, &args);
        assert_eq!(config.ingest.access_token, "file-token");
    }

    #[test]
    fn explicit_config_path_is_used() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("agent.json");
        let manager = load_config_manager(Some(path.clone())).unwrap();
        assert_eq!(manager.config_path(), path.as_path());
        assert!(path.exists());
    }
}
