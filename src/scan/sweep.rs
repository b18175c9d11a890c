use chrono::Utc;
use log::{debug, info, warn};
use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;

use crate::config::RemoteConfig;
use crate::core::{ImpedanceRow, ImpedanceTable, RawImpedanceRow};
use crate::error::{QcError, Result};
use crate::hal::{ChannelStates, ControlBoard, MeasurementRequest};
use crate::observability::ScanMetrics;

/// Fraction of the commanded voltage a reading must exceed to be kept
pub const ACTUATION_THRESHOLD: f64 = 0.9;

/// Parameters of one impedance sweep
#[derive(Debug, Clone, PartialEq)]
pub struct SweepConfig {
    pub channels: BTreeSet<usize>,
    pub voltage: f64,
    pub frequency: f64,
    pub n_sampling_windows: usize,
    pub slow_scan: bool,
}

impl SweepConfig {
    pub fn new(channels: impl IntoIterator<Item = usize>, voltage: f64, frequency: f64) -> Self {
        Self {
            channels: channels.into_iter().collect(),
            voltage,
            frequency,
            n_sampling_windows: 5,
            slow_scan: false,
        }
    }

    pub fn with_sampling_windows(mut self, n_sampling_windows: usize) -> Self {
        self.n_sampling_windows = n_sampling_windows;
        self
    }

    pub fn with_slow_scan(mut self, slow_scan: bool) -> Self {
        self.slow_scan = slow_scan;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.channels.is_empty() {
            return Err(QcError::InvalidConfig("no channels requested".into()));
        }
        if !(self.voltage.is_finite() && self.voltage > 0.0) {
            return Err(QcError::InvalidConfig(format!(
                "voltage must be positive, got {}",
                self.voltage
            )));
        }
        if !(self.frequency.is_finite() && self.frequency > 0.0) {
            return Err(QcError::InvalidConfig(format!(
                "frequency must be positive, got {}",
                self.frequency
            )));
        }
        if self.n_sampling_windows == 0 {
            return Err(QcError::InvalidConfig(
                "n_sampling_windows must be at least 1".into(),
            ));
        }
        Ok(())
    }

    fn request(&self, state: ChannelStates) -> MeasurementRequest {
        MeasurementRequest {
            state,
            voltage: self.voltage,
            frequency: self.frequency,
            n_sampling_windows: self.n_sampling_windows,
        }
    }
}

/// Measures channel impedances through a control board
pub struct ImpedanceSweep {
    board: Arc<dyn ControlBoard>,
    remote: RemoteConfig,
    metrics: Arc<ScanMetrics>,
}

impl ImpedanceSweep {
    pub fn new(board: Arc<dyn ControlBoard>, remote: RemoteConfig) -> Self {
        Self {
            board,
            remote,
            metrics: Arc::new(ScanMetrics::new()),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<ScanMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn metrics(&self) -> &Arc<ScanMetrics> {
        &self.metrics
    }

    async fn tracked<T, F>(&self, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let start = self.metrics.start_call();
        let result = call.await;
        self.metrics.finish_call(start, result.is_ok());
        result
    }

    /// Run the sweep and keep only adequately actuated readings
    pub async fn run(&self, config: &SweepConfig) -> Result<ImpedanceTable> {
        config.validate()?;
        self.remote.validate()?;

        let channel_count = self
            .tracked(self.board.channel_count(self.remote.channel_count_timeout()))
            .await?;
        if let Some(&channel) = config.channels.iter().next_back() {
            if channel >= channel_count {
                return Err(QcError::InvalidChannel {
                    channel,
                    channel_count,
                });
            }
        }

        info!(
            "Measuring {} of {} channels at {} V / {} Hz ({} mode)",
            config.channels.len(),
            channel_count,
            config.voltage,
            config.frequency,
            if config.slow_scan { "slow" } else { "fast" }
        );

        let rows = if config.slow_scan {
            self.slow(config, channel_count).await?
        } else {
            self.fast(config, channel_count).await?
        };

        let received = rows.len();
        let kept = retain_actuated(rows, config);
        self.metrics.record_rows(received, received - kept.len());
        if kept.len() < received {
            warn!(
                "Rejected {} of {} readings below {:.0}% actuation",
                received - kept.len(),
                received,
                ACTUATION_THRESHOLD * 100.0
            );
        }

        Ok(ImpedanceTable::new(kept))
    }

    async fn fast(&self, config: &SweepConfig, channel_count: usize) -> Result<Vec<ImpedanceRow>> {
        let state = ChannelStates::new(channel_count, config.channels.iter().copied())?;
        let timeout = self.remote.sweep_timeout.timeout_for(config.channels.len());

        let raw = self
            .tracked(self.board.sweep_channels(&config.request(state), timeout))
            .await?;
        Ok(complete_rows(&raw))
    }

    /// One call per channel; stops at the first execution failure and
    /// returns what was collected up to that point.
    async fn slow(&self, config: &SweepConfig, channel_count: usize) -> Result<Vec<ImpedanceRow>> {
        let timeout = self.remote.measure_timeout();
        let mut rows = Vec::new();

        for &channel in &config.channels {
            let state = ChannelStates::single(channel_count, channel)?;
            let call_start = Utc::now();

            match self
                .tracked(self.board.measure_impedance(&config.request(state), timeout))
                .await
            {
                Ok(raw) => {
                    debug!("channel {}: {} readings", channel, raw.len());
                    rows.extend(complete_rows(&raw).into_iter().map(|mut row| {
                        row.utc_start = call_start;
                        row
                    }));
                }
                Err(err @ QcError::RemoteExecution { .. }) => {
                    warn!(
                        "Stopping slow scan at channel {}: {}; keeping {} readings",
                        channel,
                        err,
                        rows.len()
                    );
                    break;
                }
                Err(err) => return Err(err),
            }
        }

        Ok(rows)
    }
}

fn complete_rows(raw: &[RawImpedanceRow]) -> Vec<ImpedanceRow> {
    raw.iter().filter_map(RawImpedanceRow::complete).collect()
}

/// Readings above the actuation threshold on requested channels
pub fn retain_actuated(rows: Vec<ImpedanceRow>, config: &SweepConfig) -> Vec<ImpedanceRow> {
    let threshold = ACTUATION_THRESHOLD * config.voltage;
    rows.into_iter()
        .filter(|r| r.v_actuation > threshold && config.channels.contains(&r.channel_i))
        .collect()
}
