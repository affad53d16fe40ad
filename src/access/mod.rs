pub mod types;
pub mod decoder;
pub mod history;
pub mod monitor;

pub use types::*;
pub use decoder::{decode_frame, DecodeError, DecoderStats, FrameDecoder};
pub use history::{EventLog, History, LogReader};
pub use monitor::{AccessMonitor, MonitorError, MonitorHandle, MonitorMetrics, MonitorSettings};

// Operator dashboards redraw on this cadence
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 3000;
pub const DEFAULT_BAUD_RATE: u32 = 9600;
pub const DEFAULT_READ_TIMEOUT_MS: u64 = 1000;
// The controller reboots when the port opens
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 2000;
