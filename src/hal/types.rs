use serde::{Deserialize, Serialize};

use crate::error::{QcError, Result};

/// Channel activation vector: one 0/1 entry per board channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelStates(Vec<u8>);

impl ChannelStates {
    /// Vector of length `channel_count` with 1 at every listed channel
    pub fn new(channel_count: usize, channels: impl IntoIterator<Item = usize>) -> Result<Self> {
        let mut states = vec![0u8; channel_count];
        for channel in channels {
            Self::validate_channel(channel, channel_count)?;
            states[channel] = 1;
        }
        Ok(Self(states))
    }

    pub fn single(channel_count: usize, channel: usize) -> Result<Self> {
        Self::new(channel_count, [channel])
    }

    fn validate_channel(channel: usize, channel_count: usize) -> Result<()> {
        if channel >= channel_count {
            return Err(QcError::InvalidChannel {
                channel,
                channel_count,
            });
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    pub fn active_channels(&self) -> Vec<usize> {
        self.0
            .iter()
            .enumerate()
            .filter(|(_, &s)| s != 0)
            .map(|(i, _)| i)
            .collect()
    }
}

/// Parameters common to `sweep_channels` and `measure_impedance`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementRequest {
    pub state: ChannelStates,
    pub voltage: f64,
    pub frequency: f64,
    pub n_sampling_windows: usize,
}
