pub mod serial;
pub mod access;
pub mod config;

use serial::SerialInterface;
use access::{AccessMonitor, MonitorHandle};
use config::{ConfigError, MonitorConfig};

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Serial(#[from] serial::SerialError),
}

/// Open the configured port and start monitoring it on a background task.
///
/// Any failure here is fatal for the session: there is no device to watch.
pub async fn start_session(config: &MonitorConfig) -> Result<MonitorHandle, StartupError> {
  config.validate()?;
  let port = config.port.as_deref().unwrap_or_default();

  let mut interface = SerialInterface::new();
  interface
    .connect(port, config.baud_rate, config.read_timeout(), config.settle_delay())
    .await?;

  let monitor = AccessMonitor::new(interface, config.monitor_settings());
  log::info!("Access monitor session started on {}", port);
  Ok(monitor.spawn())
}
