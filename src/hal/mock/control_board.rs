use crate::core::RawImpedanceRow;
use crate::hal::bus::CommandHandler;
use crate::hal::proxy::CONTROL_BOARD_PEER;
use crate::hal::types::MeasurementRequest;
use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::f64::consts::PI;
use std::sync::{Arc, Mutex};
use tokio::time::{sleep, Duration};

/// Seconds between consecutive sampling windows
const WINDOW_PERIOD_S: f64 = 0.01;

#[derive(Debug, Default)]
struct BoardLog {
    commands: Vec<String>,
    measure_calls: usize,
}

/// Deterministic stand-in for the control-board peer.
///
/// Clones share the same command log, so a clone can be kept for
/// assertions after the original is registered on a hub.
#[derive(Clone)]
pub struct SimulatedControlBoard {
    name: String,
    channel_count: usize,
    sagging: HashSet<usize>,
    missing: HashSet<usize>,
    stray_channel: Option<usize>,
    fail_on_measure: Option<usize>,
    delay: Duration,
    log: Arc<Mutex<BoardLog>>,
}

impl SimulatedControlBoard {
    pub fn new(channel_count: usize) -> Self {
        Self {
            name: CONTROL_BOARD_PEER.to_string(),
            channel_count,
            sagging: HashSet::new(),
            missing: HashSet::new(),
            stray_channel: None,
            fail_on_measure: None,
            delay: Duration::ZERO,
            log: Arc::new(Mutex::new(BoardLog::default())),
        }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    /// Channels whose actuation voltage only reaches half the command
    pub fn with_sagging_channels(mut self, channels: impl IntoIterator<Item = usize>) -> Self {
        self.sagging.extend(channels);
        self
    }

    /// Channels whose capacitance reading comes back empty
    pub fn with_missing_channels(mut self, channels: impl IntoIterator<Item = usize>) -> Self {
        self.missing.extend(channels);
        self
    }

    /// Also report rows for a channel that was not activated
    pub fn with_stray_channel(mut self, channel: usize) -> Self {
        self.stray_channel = Some(channel);
        self
    }

    /// Fail the n-th (1-based) `measure_impedance` call
    pub fn fail_on_measure(mut self, n: usize) -> Self {
        self.fail_on_measure = Some(n);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Commands received so far, in order
    pub fn commands(&self) -> Vec<String> {
        self.log
            .lock()
            .map(|log| log.commands.clone())
            .unwrap_or_default()
    }

    pub fn measurement_calls(&self) -> usize {
        self.commands()
            .iter()
            .filter(|c| *c != "channel_count")
            .count()
    }

    /// Capacitance the simulated board reports for `channel`
    pub fn nominal_capacitance(channel: usize) -> f64 {
        50e-15 + (channel % 16) as f64 * 10e-15
    }

    fn rows_for(&self, channel: usize, request: &MeasurementRequest) -> Vec<RawImpedanceRow> {
        let gain = if self.sagging.contains(&channel) { 0.5 } else { 0.98 };
        let capacitance = Self::nominal_capacitance(channel);
        let stamp = Utc::now();

        (0..request.n_sampling_windows)
            .map(|window| RawImpedanceRow {
                utc_start: Some(stamp),
                seconds: Some(window as f64 * WINDOW_PERIOD_S),
                channel_i: Some(channel),
                frequency: Some(request.frequency),
                v_actuation: Some(request.voltage * gain),
                capacitance: if self.missing.contains(&channel) {
                    None
                } else {
                    Some(capacitance)
                },
                impedance: Some(1.0 / (2.0 * PI * request.frequency * capacitance)),
            })
            .collect()
    }

    fn measure(&self, args: Value) -> Result<Value, String> {
        let request: MeasurementRequest =
            serde_json::from_value(args).map_err(|e| format!("bad arguments: {}", e))?;
        if request.state.len() != self.channel_count {
            return Err(format!(
                "state vector has {} entries, board has {} channels",
                request.state.len(),
                self.channel_count
            ));
        }

        let mut rows: Vec<RawImpedanceRow> = request
            .state
            .active_channels()
            .into_iter()
            .flat_map(|channel| self.rows_for(channel, &request))
            .collect();

        if let Some(stray) = self.stray_channel {
            if !request.state.active_channels().contains(&stray) {
                rows.extend(self.rows_for(stray, &request));
            }
        }

        serde_json::to_value(rows).map_err(|e| e.to_string())
    }
}

#[async_trait]
impl CommandHandler for SimulatedControlBoard {
    fn peer_name(&self) -> &str {
        &self.name
    }

    async fn handle(&self, command: &str, args: Value) -> Result<Value, String> {
        let measure_index = {
            let mut log = self.log.lock().map_err(|_| "board log poisoned".to_string())?;
            log.commands.push(command.to_string());
            if command == "measure_impedance" {
                log.measure_calls += 1;
            }
            log.measure_calls
        };

        if !self.delay.is_zero() {
            sleep(self.delay).await;
        }

        match command {
            "channel_count" => Ok(json!(self.channel_count)),
            "sweep_channels" => self.measure(args),
            "measure_impedance" => {
                if self.fail_on_measure == Some(measure_index) {
                    return Err("simulated hardware fault".to_string());
                }
                self.measure(args)
            }
            _ => Err(format!("unknown command '{}'", command)),
        }
    }
}
