use async_trait::async_trait;
use log::debug;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{interval, sleep, MissedTickBehavior};

/// Callback invoked periodically while a remote call is pending
pub type WaitFn = Arc<dyn Fn() + Send + Sync>;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Shortest interval between wait callbacks
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RemoteError {
    #[error("{peer}::{command} timed out after {timeout:?}")]
    Timeout {
        peer: String,
        command: String,
        timeout: Duration,
    },

    #[error("{peer}::{command} failed: {message}")]
    Execution {
        peer: String,
        command: String,
        message: String,
    },

    #[error("unknown peer '{0}'")]
    UnknownPeer(String),
}

/// Per-call options: timeout budget and optional wait callback
#[derive(Clone)]
pub struct CallOptions {
    pub timeout: Duration,
    pub wait_func: Option<WaitFn>,
}

impl CallOptions {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            wait_func: None,
        }
    }

    pub fn with_wait_func(mut self, wait_func: Option<WaitFn>) -> Self {
        self.wait_func = wait_func;
        self
    }
}

/// A peer that answers named commands
#[async_trait]
pub trait CommandHandler: Send + Sync {
    /// Name the peer is addressed by on the bus
    fn peer_name(&self) -> &str;

    /// Execute `command` with keyword arguments `args` (a JSON object)
    async fn handle(&self, command: &str, args: Value) -> Result<Value, String>;
}

/// Issues commands to named peers and waits for the reply
#[async_trait]
pub trait RemoteClient: Send + Sync {
    async fn execute(
        &self,
        peer: &str,
        command: &str,
        args: Value,
        options: &CallOptions,
    ) -> Result<Value, RemoteError>;
}

/// In-process message bus routing commands to registered peers
pub struct Hub {
    peers: HashMap<String, Arc<dyn CommandHandler>>,
    poll_interval: Duration,
}

impl Hub {
    pub fn new() -> Self {
        Self {
            peers: HashMap::new(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Clamped to at least [`MIN_POLL_INTERVAL`]
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval.max(MIN_POLL_INTERVAL);
        self
    }

    /// Register a peer under its own name, replacing any previous one
    pub fn register(&mut self, handler: impl CommandHandler + 'static) {
        self.peers
            .insert(handler.peer_name().to_string(), Arc::new(handler));
    }

    /// Register a peer under an explicit name
    pub fn register_as(&mut self, name: &str, handler: impl CommandHandler + 'static) {
        self.peers.insert(name.to_string(), Arc::new(handler));
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn list_peers(&self) -> Vec<String> {
        let mut names: Vec<String> = self.peers.keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for Hub {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteClient for Hub {
    async fn execute(
        &self,
        peer: &str,
        command: &str,
        args: Value,
        options: &CallOptions,
    ) -> Result<Value, RemoteError> {
        let handler = self
            .peers
            .get(peer)
            .cloned()
            .ok_or_else(|| RemoteError::UnknownPeer(peer.to_string()))?;

        debug!("-> {}::{} (timeout {:?})", peer, command, options.timeout);

        let call = handler.handle(command, args);
        tokio::pin!(call);
        let deadline = sleep(options.timeout);
        tokio::pin!(deadline);

        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                result = &mut call => {
                    debug!("<- {}::{} ({})", peer, command, if result.is_ok() { "ok" } else { "error" });
                    return result.map_err(|message| RemoteError::Execution {
                        peer: peer.to_string(),
                        command: command.to_string(),
                        message,
                    });
                }
                _ = &mut deadline => {
                    return Err(RemoteError::Timeout {
                        peer: peer.to_string(),
                        command: command.to_string(),
                        timeout: options.timeout,
                    });
                }
                _ = ticker.tick() => {
                    if let Some(wait) = &options.wait_func {
                        wait();
                    }
                }
            }
        }
    }
}
