use std::io::Read;
use std::time::Duration;
use serialport::{ClearBuffer, SerialPort, SerialPortType};

use super::{ByteSource, Result, SerialError, SerialPortSummary};

pub struct SerialInterface {
    port: Option<Box<dyn SerialPort>>,
    port_name: Option<String>,
}

impl SerialInterface {
    pub fn new() -> Self {
        Self {
            port: None,
            port_name: None,
        }
    }

    /// List serial ports visible to the host
    pub fn available_ports() -> Result<Vec<SerialPortSummary>> {
        let ports = serialport::available_ports()?;
        let summaries = ports
            .into_iter()
            .map(|p| {
                let description = match p.port_type {
                    SerialPortType::UsbPort(usb) => Some(format!(
                        "USB {:04X}:{:04X} {}",
                        usb.vid,
                        usb.pid,
                        usb.product.unwrap_or_default()
                    )),
                    SerialPortType::BluetoothPort => Some("Bluetooth".to_string()),
                    SerialPortType::PciPort => Some("PCI".to_string()),
                    SerialPortType::Unknown => None,
                };
                SerialPortSummary { port_name: p.port_name, description }
            })
            .collect();
        Ok(summaries)
    }

    /// Open the lock controller's port.
    ///
    /// The controller resets when the port opens, so we wait `settle_delay`
    /// and then drop whatever it printed while booting.
    pub async fn connect(
        &mut self,
        port_name: &str,
        baud_rate: u32,
        read_timeout: Duration,
        settle_delay: Duration,
    ) -> Result<()> {
        let port = serialport::new(port_name, baud_rate)
            .timeout(read_timeout)
            .open()
            .map_err(|e| match e.kind() {
                serialport::ErrorKind::NoDevice => SerialError::PortNotFound(port_name.to_string()),
                _ => SerialError::ConnectionFailed(format!("{}: {}", port_name, e)),
            })?;

        if !settle_delay.is_zero() {
            tokio::time::sleep(settle_delay).await;
        }
        port.clear(ClearBuffer::Input)?;

        self.port = Some(port);
        self.port_name = Some(port_name.to_string());

        log::info!("Connected to lock controller on {} at {} baud", port_name, baud_rate);
        Ok(())
    }

    /// Release the port
    pub fn disconnect(&mut self) {
        if let Some(name) = self.port_name.take() {
            log::info!("Disconnecting from {}", name);
        }
        self.port = None;
    }

    fn port_mut(&mut self) -> Result<&mut Box<dyn SerialPort>> {
        self.port
            .as_mut()
            .ok_or_else(|| SerialError::ConnectionFailed("Not connected".to_string()))
    }
}

impl Default for SerialInterface {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for SerialInterface {
    fn drop(&mut self) {
        self.disconnect();
    }
}

#[async_trait::async_trait]
impl ByteSource for SerialInterface {
    async fn bytes_available(&mut self) -> Result<usize> {
        let waiting = self.port_mut()?.bytes_to_read()?;
        Ok(waiting as usize)
    }

    async fn read_available(&mut self, buffer: &mut [u8]) -> Result<usize> {
        let port = self.port_mut()?;
        match port.read(buffer) {
            Ok(n) => Ok(n),
            Err(ref e) if e.kind() == std::io::ErrorKind::TimedOut => Err(SerialError::Timeout),
            Err(e) => Err(SerialError::IoError(e)),
        }
    }
}
