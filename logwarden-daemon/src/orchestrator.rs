//! Daemon orchestration -- assembly and lifecycle of the analysis loop.
//!
//! The [`Orchestrator`] loads configuration, installs the metrics
//! recorder, prepares the incident store, builds the analysis loop, and
//! runs it until a shutdown signal arrives.
//!
//! # Shutdown Order
//!
//! 1. Signal watcher cancels the shared token
//! 2. Analysis loop finishes the cycle in progress and returns
//! 3. Incident dispatcher delivers everything still queued
//! 4. PID file is removed

use std::path::Path;
use std::time::Instant;

use anyhow::Result;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use logwarden_core::LogwardenConfig;
use logwarden_detector::sink::JsonFileStore;
use logwarden_detector::{
    AnalysisLoop, AnalysisLoopBuilder, CycleReport, DetectorConfig, DispatchStats,
};

use crate::metrics_server;

/// The main daemon orchestrator.
pub struct Orchestrator {
    /// Loaded and validated configuration.
    config: LogwardenConfig,
    /// The analysis loop with its dispatcher.
    analysis: AnalysisLoop,
    /// Cancelled on SIGINT/SIGTERM or by [`shutdown_token`](Self::shutdown_token) holders.
    shutdown: CancellationToken,
    /// Daemon start time (for uptime reporting).
    start_time: Instant,
}

impl Orchestrator {
    /// Load configuration and build the orchestrator.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration file cannot be read or parsed
    /// - Configuration validation fails
    /// - The incident store cannot be initialized
    pub async fn build(config_path: &Path) -> Result<Self> {
        let config = LogwardenConfig::load(config_path)
            .await
            .map_err(|e| anyhow::anyhow!("failed to load config: {}", e))?;
        Self::build_from_config(config).await
    }

    /// Build from an already-loaded configuration.
    pub async fn build_from_config(config: LogwardenConfig) -> Result<Self> {
        let detector_config = validate_config(&config)?;

        if config.metrics.enabled {
            metrics_server::install_metrics_recorder(&config.metrics)?;
            record_daemon_metrics();
        }

        JsonFileStore::new(&detector_config.store_path)
            .init()
            .await
            .map_err(|e| anyhow::anyhow!("failed to initialize incident store: {}", e))?;

        let analysis = AnalysisLoopBuilder::new()
            .config(detector_config)
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build analysis loop: {}", e))?;

        tracing::info!(
            sources = analysis.source_count(),
            interval_secs = config.analysis.interval_secs,
            webhook = config.sinks.webhook_enabled,
            "orchestrator initialized"
        );

        Ok(Self {
            config,
            analysis,
            shutdown: CancellationToken::new(),
            start_time: Instant::now(),
        })
    }

    /// Token that stops the daemon when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Get a reference to the loaded configuration.
    pub fn config(&self) -> &LogwardenConfig {
        &self.config
    }

    /// Run the analysis loop until SIGINT/SIGTERM or token cancellation.
    ///
    /// Incidents still queued at shutdown are delivered before returning.
    pub async fn run(mut self) -> Result<DispatchStats> {
        let pid_path = (!self.config.general.pid_file.is_empty())
            .then(|| self.config.general.pid_file.clone());
        if let Some(path) = &pid_path {
            write_pid_file(Path::new(path))?;
        }

        let signal_watcher = match spawn_signal_watcher(self.shutdown.clone()) {
            Ok(task) => task,
            Err(e) => {
                if let Some(path) = &pid_path {
                    remove_pid_file(Path::new(path));
                }
                return Err(e);
            }
        };
        let uptime_updater = self
            .config
            .metrics
            .enabled
            .then(|| spawn_uptime_updater(self.start_time, self.shutdown.clone()));

        self.analysis.run(self.shutdown.clone()).await;

        // The loop only returns once cancelled, but helpers must stop either way.
        self.shutdown.cancel();
        let _ = signal_watcher.await;
        if let Some(task) = uptime_updater {
            let _ = task.await;
        }

        tracing::info!("draining incident dispatcher");
        let stats = self.analysis.shutdown().await;

        if let Some(path) = &pid_path {
            remove_pid_file(Path::new(path));
        }

        tracing::info!(
            uptime_secs = self.start_time.elapsed().as_secs(),
            "logwarden-daemon shut down"
        );
        Ok(stats)
    }

    /// Run a single analysis cycle, deliver its incidents, and return.
    pub async fn run_once(mut self) -> Result<(CycleReport, DispatchStats)> {
        let report = self.analysis.run_cycle().await;
        let stats = self.analysis.shutdown().await;
        tracing::info!(
            lines = report.lines,
            incidents = report.incidents,
            source_errors = report.source_errors,
            delivered = stats.delivered,
            failed = stats.failed,
            "single analysis cycle finished"
        );
        Ok((report, stats))
    }
}

/// Validate the configuration and derive the detector configuration.
///
/// Used both at startup and by `--validate`.
pub fn validate_config(config: &LogwardenConfig) -> Result<DetectorConfig> {
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;
    let detector_config = DetectorConfig::from_core(config)
        .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;
    detector_config
        .validate()
        .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;
    Ok(detector_config)
}

/// Spawn a task that cancels `shutdown` on SIGTERM or SIGINT.
///
/// Signal handlers are installed before returning so a signal that
/// arrives right after startup is not lost.
///
/// # Errors
///
/// Returns an error if signal handlers cannot be installed.
fn spawn_signal_watcher(shutdown: CancellationToken) -> Result<JoinHandle<()>> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("failed to install SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("failed to install SIGINT handler: {}", e))?;

    Ok(tokio::spawn(async move {
        let received = tokio::select! {
            _ = sigterm.recv() => "SIGTERM",
            _ = sigint.recv() => "SIGINT",
            _ = shutdown.cancelled() => return,
        };
        tracing::info!(signal = received, "shutdown signal received");
        shutdown.cancel();
    }))
}

/// Write the current process PID to a file.
///
/// Used to prevent duplicate daemon instances.
///
/// # Security
///
/// - Uses `create_new(true)` to atomically create file (prevents TOCTOU races)
/// - Verifies the created file is a regular file (prevents symlink attacks)
/// - Creates parent directory with restrictive permissions (0o700)
pub fn write_pid_file(path: &Path) -> Result<()> {
    use std::fs::{self, OpenOptions};
    use std::io::{ErrorKind, Write};

    if let Some(parent) = path.parent() {
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            fs::DirBuilder::new()
                .mode(0o700)
                .recursive(true)
                .create(parent)?;
        }
        #[cfg(not(unix))]
        {
            fs::create_dir_all(parent)?;
        }
    }

    let pid = std::process::id();

    let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            let existing_pid = fs::read_to_string(path).unwrap_or_else(|_| "unknown".to_owned());
            return Err(anyhow::anyhow!(
                "PID file {} already exists with PID: {}. Is another instance running?",
                path.display(),
                existing_pid.trim()
            ));
        }
        Err(e) => return Err(e.into()),
    };

    if !file.metadata()?.is_file() {
        let _ = fs::remove_file(path);
        return Err(anyhow::anyhow!(
            "PID file {} is not a regular file (possible symlink attack)",
            path.display()
        ));
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
    }

    writeln!(file, "{}", pid)?;

    tracing::info!(pid = pid, path = %path.display(), "PID file written");
    Ok(())
}

/// Remove the PID file on daemon shutdown.
///
/// Logs a warning but does not fail if the file cannot be removed.
pub fn remove_pid_file(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        tracing::warn!(path = %path.display(), error = %e, "failed to remove PID file");
    } else {
        tracing::info!(path = %path.display(), "PID file removed");
    }
}

/// Record daemon-level metrics (build info).
fn record_daemon_metrics() {
    use logwarden_core::metrics as m;

    metrics::gauge!(m::DAEMON_BUILD_INFO, "version" => env!("CARGO_PKG_VERSION")).set(1.0);
    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "daemon metrics recorded");
}

/// Spawn a background task that periodically updates the uptime metric.
fn spawn_uptime_updater(start_time: Instant, shutdown: CancellationToken) -> JoinHandle<()> {
    use logwarden_core::metrics as m;

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(10));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    #[allow(clippy::cast_precision_loss)]
                    metrics::gauge!(m::DAEMON_UPTIME_SECONDS).set(start_time.elapsed().as_secs() as f64);
                }
                _ = shutdown.cancelled() => {
                    tracing::debug!("uptime updater shutting down");
                    break;
                }
            }
        }
    })
}
