use log::{info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::assemble::assemble;
use super::persist::{PersistOptions, PersistReport, Persistence};
use super::sweep::{ImpedanceSweep, SweepConfig};
use crate::config::QcConfig;
use crate::error::Result;
use crate::hal::{ControlBoard, ControlBoardProxy, DeviceInfo, DeviceInfoProxy, RemoteClient, WaitFn};
use crate::observability::{MetricsSnapshot, ScanMetrics};

/// Asks the operator where to save results; `None` cancels the scan
pub trait OutputPrompt: Send + Sync {
    fn choose_output(&self, default_filename: &str) -> Option<PathBuf>;
}

/// Always answers with the same path
pub struct FixedOutput(pub PathBuf);

impl OutputPrompt for FixedOutput {
    fn choose_output(&self, _default_filename: &str) -> Option<PathBuf> {
        Some(self.0.clone())
    }
}

/// Lets the operator review the proposed sweep; `None` cancels the scan
pub trait SweepParameterSource: Send + Sync {
    fn review(&self, proposed: SweepConfig) -> Option<SweepConfig>;
}

pub struct AcceptDefaults;

impl SweepParameterSource for AcceptDefaults {
    fn review(&self, proposed: SweepConfig) -> Option<SweepConfig> {
        Some(proposed)
    }
}

#[derive(Debug, Clone)]
pub struct ScanOutcome {
    pub output_path: PathBuf,
    pub rows: usize,
    pub report: PersistReport,
    pub metrics: MetricsSnapshot,
}

/// Prompt, sweep, assemble and persist: the "Run channel impedance scan" action
pub struct ChannelImpedanceScan {
    board: Arc<dyn ControlBoard>,
    device_info: Arc<dyn DeviceInfo>,
    config: QcConfig,
    persistence: Persistence,
    parameters: Box<dyn SweepParameterSource>,
}

impl ChannelImpedanceScan {
    pub fn new(
        board: Arc<dyn ControlBoard>,
        device_info: Arc<dyn DeviceInfo>,
        config: QcConfig,
    ) -> Self {
        Self {
            board,
            device_info,
            config,
            persistence: Persistence::new(),
            parameters: Box::new(AcceptDefaults),
        }
    }

    /// Reach both peers through `client` under the configured names
    pub fn from_client(
        client: Arc<dyn RemoteClient>,
        config: QcConfig,
        wait_func: Option<WaitFn>,
    ) -> Self {
        let mut board = ControlBoardProxy::new(client.clone(), &config.remote.control_board_peer);
        let mut device_info = DeviceInfoProxy::new(client, &config.remote.device_info_peer);
        if let Some(wait_func) = wait_func {
            board = board.with_wait_func(wait_func.clone());
            device_info = device_info.with_wait_func(wait_func);
        }
        Self::new(Arc::new(board), Arc::new(device_info), config)
    }

    pub fn with_persistence(mut self, persistence: Persistence) -> Self {
        self.persistence = persistence;
        self
    }

    pub fn with_parameters(mut self, parameters: impl SweepParameterSource + 'static) -> Self {
        self.parameters = Box::new(parameters);
        self
    }

    pub fn config(&self) -> &QcConfig {
        &self.config
    }

    /// Run a scan; `Ok(None)` when the operator cancels.
    pub async fn run(
        &self,
        prompt: &dyn OutputPrompt,
        default_filename: Option<&str>,
        slow_scan: bool,
    ) -> Result<Option<ScanOutcome>> {
        self.config.validate()?;
        let default_filename = default_filename.unwrap_or(self.config.persist.default_filename.as_str());
        let Some(output_path) = prompt.choose_output(default_filename) else {
            info!("Channel impedance scan cancelled");
            return Ok(None);
        };

        let device = self
            .device_info
            .get_device(self.config.remote.device_timeout())
            .await?;
        let defaults = &self.config.sweep;
        let proposed = SweepConfig::new(device.channels(), defaults.voltage, defaults.frequency)
            .with_sampling_windows(defaults.n_sampling_windows)
            .with_slow_scan(slow_scan);
        let Some(sweep_config) = self.parameters.review(proposed) else {
            info!("Channel impedance scan cancelled");
            return Ok(None);
        };

        self.execute(&sweep_config, &output_path).await.map(Some)
    }

    /// Sweep -> assemble -> persist for an already chosen configuration
    pub async fn execute(&self, sweep_config: &SweepConfig, output_path: &Path) -> Result<ScanOutcome> {
        self.config.validate()?;
        let metrics = Arc::new(ScanMetrics::new());
        let sweep = ImpedanceSweep::new(self.board.clone(), self.config.remote.clone())
            .with_metrics(metrics.clone());

        let table = sweep.run(sweep_config).await?;
        if table.is_empty() {
            warn!("No channel passed the actuation check");
        }

        let structures = assemble(
            self.device_info.as_ref(),
            &table,
            self.config.remote.device_timeout(),
        )
        .await?;

        let persist = &self.config.persist;
        let options = PersistOptions {
            hdf_root: persist.hdf_root.clone(),
            save_plot: persist.save_plot,
            open_plot: persist.open_plot,
            compression_level: persist.compression_level,
        };
        let report = self.persistence.persist(&structures, output_path, &options)?;
        info!("Channel impedances saved.");

        Ok(ScanOutcome {
            output_path: output_path.to_path_buf(),
            rows: table.len(),
            report,
            metrics: metrics.snapshot(),
        })
    }
}
