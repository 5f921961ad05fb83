use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use log::{info, warn};

use crate::bus::Transport;
use crate::calibration;
use crate::compensation::{compensate_humidity, compensate_pressure, compensate_temperature};
use crate::config::{DeviceConfig, Mode, Oversampling};
use crate::error::Error;
use crate::protocol::Protocol;
use crate::structs::{Coefficients, Measurement, RawData, Temperature};

/// BME280 I2C slave address with SDO tied to GND.
pub const DEFAULT_ADDRESS: u8 = 0x76;
/// BME280 I2C slave address with SDO tied to VDDIO.
pub const ALTERNATE_ADDRESS: u8 = 0x77;

const STATUS_POLLS: usize = 5;
const STATUS_POLL_INTERVAL: Duration = Duration::from_millis(2);

/// Driver lifecycle. `Faulted` sticks until the next [`Bme280::open`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Uninitialized,
    Identified,
    Configured,
    Ready,
    Faulted,
}

struct Inner<T> {
    protocol: Protocol<T>,
    state: State,
    coefficients: Option<Coefficients>,
}

impl<T: Transport> Inner<T> {
    fn open(&mut self, config: &DeviceConfig) -> Result<(), Error<T::Error>> {
        self.protocol.identify()?;
        self.state = State::Identified;

        self.protocol.soft_reset()?;
        let coefficients = calibration::read_coefficients(&mut self.protocol)?;
        self.protocol.write_config(config)?;
        self.coefficients = Some(coefficients);
        self.state = State::Configured;

        if config.mode == Mode::Normal {
            // data registers hold reset values until the first cycle completes
            thread::sleep(measurement_time(config));
        }
        self.state = State::Ready;
        Ok(())
    }

    fn fault(&mut self, err: &Error<T::Error>) {
        warn!("BME280 at {:#04x} faulted: {}", self.protocol.address(), err);
        self.state = State::Faulted;
    }
}

fn measurement_time(config: &DeviceConfig) -> Duration {
    Duration::from_micros(u64::from(config.max_measurement_time_us()))
}

/// A BME280 behind a [`Transport`].
///
/// Every operation locks the device for its whole command/response sequence,
/// so one instance can be shared between threads (e.g. in an `Arc`).
pub struct Bme280<T> {
    inner: Mutex<Inner<T>>,
    config: DeviceConfig,
}

impl<T: Transport> Bme280<T> {
    pub fn new(bus: T, address: u8, config: DeviceConfig) -> Self {
        Bme280 {
            inner: Mutex::new(Inner {
                protocol: Protocol::new(bus, address),
                state: State::Uninitialized,
                coefficients: None,
            }),
            config,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<T>> {
        match self.inner.lock() {
            Ok(inner) => inner,
            Err(poisoned) => {
                // a panic interrupted a bus sequence; the chip state is unknown
                self.inner.clear_poison();
                let mut inner = poisoned.into_inner();
                inner.state = State::Faulted;
                inner
            }
        }
    }

    /// Identifies, resets, calibrates and configures the device.
    ///
    /// Always starts over from `Uninitialized`, so it is also the way out of
    /// `Faulted`. On error the device is left `Faulted`.
    pub fn open(&self) -> Result<(), Error<T::Error>> {
        let mut inner = self.lock();
        inner.state = State::Uninitialized;
        inner.coefficients = None;

        let result = inner.open(&self.config);
        match &result {
            Ok(()) => info!("BME280 at {:#04x} ready", inner.protocol.address()),
            Err(err) => inner.fault(err),
        }
        result
    }

    pub fn state(&self) -> State {
        self.lock().state
    }

    /// Coefficients loaded by the last successful `open()`.
    pub fn coefficients(&self) -> Option<Coefficients> {
        self.lock().coefficients
    }

    pub fn config(&self) -> DeviceConfig {
        self.config
    }

    pub fn address(&self) -> u8 {
        self.lock().protocol.address()
    }

    /// Gives the bus back.
    pub fn release(self) -> T {
        self.inner
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
            .protocol
            .into_inner()
    }

    /// Temperature in °C.
    pub fn read_temperature(&self) -> Result<f64, Error<T::Error>> {
        self.with_ready(|protocol, coefficients, config| {
            measured(config.temperature, "temperature")?;
            prepare(protocol, config)?;
            let raw = protocol.read_raw_temperature()?;
            Ok(compensate_temperature(raw, &coefficients.temperature).celsius)
        })
    }

    /// Pressure in hPa.
    pub fn read_pressure(&self) -> Result<f64, Error<T::Error>> {
        self.with_ready(|protocol, coefficients, config| {
            measured(config.pressure, "pressure")?;
            let (raw, t) = sample(protocol, coefficients, config)?;
            pressure(&raw, &t, coefficients)
        })
    }

    /// Relative humidity in %.
    pub fn read_humidity(&self) -> Result<f64, Error<T::Error>> {
        self.with_ready(|protocol, coefficients, config| {
            measured(config.humidity, "humidity")?;
            let (raw, t) = sample(protocol, coefficients, config)?;
            Ok(compensate_humidity(raw.humidity, t.t_fine, &coefficients.humidity))
        })
    }

    /// All three quantities from one conversion. Fails if any of them is skipped.
    pub fn read(&self) -> Result<Measurement, Error<T::Error>> {
        self.with_ready(|protocol, coefficients, config| {
            measured(config.pressure, "pressure")?;
            measured(config.humidity, "humidity")?;
            let (raw, t) = sample(protocol, coefficients, config)?;
            Ok(Measurement {
                temperature: t.celsius,
                pressure: pressure(&raw, &t, coefficients)?,
                humidity: compensate_humidity(raw.humidity, t.t_fine, &coefficients.humidity),
            })
        })
    }

    fn with_ready<R>(
        &self,
        f: impl FnOnce(&mut Protocol<T>, &Coefficients, &DeviceConfig) -> Result<R, Error<T::Error>>,
    ) -> Result<R, Error<T::Error>> {
        let mut inner = self.lock();
        let coefficients = match (inner.state, inner.coefficients) {
            (State::Ready, Some(coefficients)) => coefficients,
            (state, _) => return Err(Error::NotReady(state)),
        };

        let result = f(&mut inner.protocol, &coefficients, &self.config);
        if let Err(err) = &result {
            if matches!(err, Error::Transport { .. } | Error::MeasurementTimeout) {
                inner.fault(err);
            }
        }
        result
    }
}

/// Outside normal mode, runs one conversion and waits for it to finish.
///
/// A device configured for sleep mode never converts on its own, so it is
/// sampled the same way as in forced mode.
fn prepare<T: Transport>(
    protocol: &mut Protocol<T>,
    config: &DeviceConfig,
) -> Result<(), Error<T::Error>> {
    if config.mode == Mode::Normal {
        return Ok(());
    }
    protocol.trigger_forced(config)?;
    thread::sleep(measurement_time(config));
    for _ in 0..STATUS_POLLS {
        if !protocol.is_measuring()? {
            return Ok(());
        }
        thread::sleep(STATUS_POLL_INTERVAL);
    }
    Err(Error::MeasurementTimeout)
}

// Skipped channels read back as 0x80000 / 0x8000, which still compensate to
// a believable number.
fn measured<E>(oversampling: Oversampling, quantity: &'static str) -> Result<(), Error<E>> {
    match oversampling {
        Oversampling::Skip => Err(Error::Skipped(quantity)),
        _ => Ok(()),
    }
}

fn sample<T: Transport>(
    protocol: &mut Protocol<T>,
    coefficients: &Coefficients,
    config: &DeviceConfig,
) -> Result<(RawData, Temperature), Error<T::Error>> {
    // pressure and humidity need t_fine
    measured(config.temperature, "temperature")?;
    prepare(protocol, config)?;
    let raw = protocol.read_raw()?;
    let t = compensate_temperature(raw.temperature, &coefficients.temperature);
    Ok((raw, t))
}

fn pressure<E>(raw: &RawData, t: &Temperature, coefficients: &Coefficients) -> Result<f64, Error<E>> {
    compensate_pressure(raw.pressure, t.t_fine, &coefficients.pressure)
        .ok_or(Error::InvalidCoefficients("pressure"))
}
