use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

use super::bus::{CallOptions, RemoteClient, WaitFn};
use super::traits::{ControlBoard, DeviceInfo};
use super::types::MeasurementRequest;
use crate::core::{DeviceGeometry, RawImpedanceRow};
use crate::error::{QcError, Result};

pub const CONTROL_BOARD_PEER: &str = "wheelerlab.dmf_control_board_plugin";
pub const DEVICE_INFO_PEER: &str = "wheelerlab.device_info_plugin";

fn decode<T: DeserializeOwned>(command: &str, reply: Value) -> Result<T> {
    serde_json::from_value(reply).map_err(|source| QcError::Decode {
        command: command.to_string(),
        source,
    })
}

/// Shared plumbing of the typed peer proxies
#[derive(Clone)]
struct PeerHandle {
    client: Arc<dyn RemoteClient>,
    peer: String,
    wait_func: Option<WaitFn>,
}

impl PeerHandle {
    async fn call<T: DeserializeOwned>(
        &self,
        command: &str,
        args: Value,
        timeout: Duration,
    ) -> Result<T> {
        let options = CallOptions::new(timeout).with_wait_func(self.wait_func.clone());
        let reply = self
            .client
            .execute(&self.peer, command, args, &options)
            .await?;
        decode(command, reply)
    }
}

/// Control board reached over a [`RemoteClient`]
#[derive(Clone)]
pub struct ControlBoardProxy {
    handle: PeerHandle,
}

impl ControlBoardProxy {
    pub fn new(client: Arc<dyn RemoteClient>, peer: impl Into<String>) -> Self {
        Self {
            handle: PeerHandle {
                client,
                peer: peer.into(),
                wait_func: None,
            },
        }
    }

    pub fn with_wait_func(mut self, wait_func: WaitFn) -> Self {
        self.handle.wait_func = Some(wait_func);
        self
    }

    pub fn peer(&self) -> &str {
        &self.handle.peer
    }
}

#[async_trait]
impl ControlBoard for ControlBoardProxy {
    async fn channel_count(&self, timeout: Duration) -> Result<usize> {
        self.handle.call("channel_count", json!({}), timeout).await
    }

    async fn sweep_channels(
        &self,
        request: &MeasurementRequest,
        timeout: Duration,
    ) -> Result<Vec<RawImpedanceRow>> {
        let args = serde_json::to_value(request).map_err(|source| QcError::Decode {
            command: "sweep_channels".into(),
            source,
        })?;
        self.handle.call("sweep_channels", args, timeout).await
    }

    async fn measure_impedance(
        &self,
        request: &MeasurementRequest,
        timeout: Duration,
    ) -> Result<Vec<RawImpedanceRow>> {
        let args = serde_json::to_value(request).map_err(|source| QcError::Decode {
            command: "measure_impedance".into(),
            source,
        })?;
        self.handle.call("measure_impedance", args, timeout).await
    }
}

/// Device-info service reached over a [`RemoteClient`]
#[derive(Clone)]
pub struct DeviceInfoProxy {
    handle: PeerHandle,
}

impl DeviceInfoProxy {
    pub fn new(client: Arc<dyn RemoteClient>, peer: impl Into<String>) -> Self {
        Self {
            handle: PeerHandle {
                client,
                peer: peer.into(),
                wait_func: None,
            },
        }
    }

    pub fn with_wait_func(mut self, wait_func: WaitFn) -> Self {
        self.handle.wait_func = Some(wait_func);
        self
    }
}

#[async_trait]
impl DeviceInfo for DeviceInfoProxy {
    async fn get_device(&self, timeout: Duration) -> Result<DeviceGeometry> {
        self.handle.call("get_device", json!({}), timeout).await
    }
}
