//! Serial channel adapter.
//!
//! Implements [`SerialRx`] / [`SerialTx`].
//!
//! - **`target_os = "espidf"`**: `UartDriver` on UART2 (8N1, no flow
//!   control), split into independent TX and RX halves so the ingest and
//!   command tasks never contend for one driver handle.
//! - **all other targets**: an in-memory pair from [`sim_serial`] with a
//!   [`SimSerialDevice`] handle playing the sensor side.

use std::time::Duration;

use crate::app::ports::{SerialRx, SerialTx};
use crate::error::SerialError;

#[cfg(target_os = "espidf")]
pub use esp::{UartSerial, UartSerialRx, UartSerialTx};

#[cfg(not(target_os = "espidf"))]
pub use sim::{SimSerialDevice, SimSerialRx, SimSerialTx, sim_serial};

// ───────────────────────────────────────────────────────────────
// ESP-IDF
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
mod esp {
    use esp_idf_hal::delay::TickType;
    use esp_idf_hal::gpio::{AnyIOPin, Gpio16, Gpio17};
    use esp_idf_hal::uart::{UART2, UartDriver, UartRxDriver, UartTxDriver, config::Config};
    use esp_idf_hal::units::Hertz;
    use log::{error, info};

    use super::*;
    use crate::config::SerialSettings;

    pub struct UartSerialRx {
        rx: UartRxDriver<'static>,
    }

    pub struct UartSerialTx {
        tx: UartTxDriver<'static>,
    }

    pub struct UartSerial;

    impl UartSerial {
        /// Open UART2 on the sensor pins and split it.
        pub fn open(
            uart: UART2,
            tx_pin: Gpio17,
            rx_pin: Gpio16,
            settings: &SerialSettings,
        ) -> Result<(UartSerialRx, UartSerialTx), SerialError> {
            let config = Config::default().baudrate(Hertz(settings.baud_rate));
            let driver = UartDriver::new(
                uart,
                tx_pin,
                rx_pin,
                Option::<AnyIOPin>::None,
                Option::<AnyIOPin>::None,
                &config,
            )
            .map_err(|e| {
                error!("UART: driver init failed — {}", e);
                SerialError::DriverInit
            })?;
            info!("UART2 initialized at {} baud", settings.baud_rate);

            let (tx, rx) = driver.into_split();
            Ok((UartSerialRx { rx }, UartSerialTx { tx }))
        }
    }

    impl SerialRx for UartSerialRx {
        fn read_frame(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, SerialError> {
            self.rx
                .read(buf, TickType::from(timeout).ticks())
                .map_err(|_| SerialError::ReadFailed)
        }
    }

    impl SerialTx for UartSerialTx {
        fn write_frame(&mut self, bytes: &[u8]) -> Result<usize, SerialError> {
            self.tx.write(bytes).map_err(|_| SerialError::WriteFailed)
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Simulation
// ───────────────────────────────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
mod sim {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};

    use super::*;

    /// Gateway-side receive half.
    pub struct SimSerialRx {
        inbound: Receiver<Vec<u8>>,
        /// Bytes of a frame longer than the last read buffer.
        pending: Vec<u8>,
    }

    /// Gateway-side transmit half.
    pub struct SimSerialTx {
        outbound: Sender<Vec<u8>>,
        fail_writes: Arc<AtomicBool>,
    }

    /// Sensor-side handle: inject frames, observe writes.
    pub struct SimSerialDevice {
        inbound: Sender<Vec<u8>>,
        outbound: Receiver<Vec<u8>>,
        fail_writes: Arc<AtomicBool>,
    }

    pub fn sim_serial() -> (SimSerialRx, SimSerialTx, SimSerialDevice) {
        let (in_tx, in_rx) = mpsc::channel();
        let (out_tx, out_rx) = mpsc::channel();
        let fail_writes = Arc::new(AtomicBool::new(false));
        (
            SimSerialRx {
                inbound: in_rx,
                pending: Vec::new(),
            },
            SimSerialTx {
                outbound: out_tx,
                fail_writes: Arc::clone(&fail_writes),
            },
            SimSerialDevice {
                inbound: in_tx,
                outbound: out_rx,
                fail_writes,
            },
        )
    }

    impl SimSerialDevice {
        /// Queue one frame for the gateway to read.
        pub fn send_frame(&self, frame: &[u8]) {
            let _ = self.inbound.send(frame.to_vec());
        }

        /// Wait for the next write from the gateway.
        pub fn next_write(&self, timeout: Duration) -> Option<Vec<u8>> {
            self.outbound.recv_timeout(timeout).ok()
        }

        /// Everything written so far that has not been read.
        pub fn drain_writes(&self) -> Vec<Vec<u8>> {
            self.outbound.try_iter().collect()
        }

        pub fn set_write_failure(&self, fail: bool) {
            self.fail_writes.store(fail, Ordering::Relaxed);
        }
    }

    impl SerialRx for SimSerialRx {
        fn read_frame(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, SerialError> {
            if self.pending.is_empty() {
                match self.inbound.recv_timeout(timeout) {
                    Ok(frame) => self.pending = frame,
                    Err(RecvTimeoutError::Timeout) => return Ok(0),
                    Err(RecvTimeoutError::Disconnected) => return Err(SerialError::Disconnected),
                }
            }
            let n = self.pending.len().min(buf.len());
            buf[..n].copy_from_slice(&self.pending[..n]);
            self.pending.drain(..n);
            Ok(n)
        }
    }

    impl SerialTx for SimSerialTx {
        fn write_frame(&mut self, bytes: &[u8]) -> Result<usize, SerialError> {
            if self.fail_writes.load(Ordering::Relaxed) {
                return Err(SerialError::WriteFailed);
            }
            self.outbound
                .send(bytes.to_vec())
                .map_err(|_| SerialError::Disconnected)?;
            Ok(bytes.len())
        }
    }

}
