//! Pin and peripheral assignments for the gateway board.
//!
//! The UART adapter takes the matching typed pins (`gpio17`, `gpio16`,
//! `uart2`) from `Peripherals`; these constants keep the numbers in one
//! place for logging and board documentation.

// ---------------------------------------------------------------------------
// Sensor link (UART2, 8N1, no flow control)
// ---------------------------------------------------------------------------

/// UART port wired to the sensor node.
pub const SENSOR_UART_PORT: u8 = 2;
/// ESP32 TX2 → sensor RX.
pub const SENSOR_UART_TX_GPIO: i32 = 17;
/// ESP32 RX2 ← sensor TX.
pub const SENSOR_UART_RX_GPIO: i32 = 16;
