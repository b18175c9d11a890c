pub mod assemble;
pub mod channel_scan;
pub mod persist;
pub mod sweep;

pub use assemble::{assemble, structures_from, ResultAssembly};
pub use channel_scan::{
    AcceptDefaults, ChannelImpedanceScan, FixedOutput, OutputPrompt, ScanOutcome,
    SweepParameterSource,
};
pub use persist::{plot_path, PersistOptions, PersistReport, Persistence};
pub use sweep::{retain_actuated, ImpedanceSweep, SweepConfig, ACTUATION_THRESHOLD};
