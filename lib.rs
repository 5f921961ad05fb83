//! BME280 temperature, humidity and pressure driver for the Raspberry Pi.
//!
//! ```no_run
//! use ambient_bme280::{Bme280, DeviceConfig, PiBus, DEFAULT_ADDRESS};
//!
//! let bus = PiBus::new()?;
//! let sensor = Bme280::new(bus, DEFAULT_ADDRESS, DeviceConfig::default());
//! sensor.open()?;
//! println!("Temperature: {:.2} C", sensor.read_temperature()?);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod bus;
pub mod calibration;
pub mod compensation;
pub mod config;
pub mod error;
pub mod protocol;
pub mod sensor;
pub mod structs;

pub use bus::{HalBus, PiBus, Transport};
pub use config::{DeviceConfig, Filter, Mode, Oversampling, Standby};
pub use error::{Access, Error};
pub use sensor::{Bme280, State, ALTERNATE_ADDRESS, DEFAULT_ADDRESS};
pub use structs::{Coefficients, Measurement, RawData, Temperature};
