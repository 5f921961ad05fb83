use std::fmt;

use crate::sensor::State;

/// Direction of a failed bus transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
}

/// Driver errors, generic over the bus error type `E`.
#[derive(Debug)]
pub enum Error<E> {
    /// A bus transaction failed. Never retried inside the driver.
    Transport { register: u8, access: Access, source: E },
    /// The chip id register did not hold the BME280 id. Wrong wiring or address.
    UnexpectedDevice { found: u8, expected: u8 },
    /// A bus transaction failed while loading factory calibration.
    Calibration { register: u8, source: E },
    /// The operation needs a `Ready` device.
    NotReady(State),
    /// The named formula is undefined for the stored coefficients.
    InvalidCoefficients(&'static str),
    /// A forced conversion was still running after its maximum duration.
    MeasurementTimeout,
    /// The named quantity is configured with `Oversampling::Skip`.
    Skipped(&'static str),
}

impl<E> Error<E> {
    /// Re-labels a transport failure as a calibration failure.
    pub(crate) fn into_calibration(self) -> Self {
        match self {
            Error::Transport { register, source, .. } => Error::Calibration { register, source },
            other => other,
        }
    }
}

impl<E: fmt::Debug> fmt::Display for Error<E> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Transport { register, access: Access::Read, source } => {
                write!(f, "bus read of register {register:#04x} failed: {source:?}")
            }
            Error::Transport { register, access: Access::Write, source } => {
                write!(f, "bus write to register {register:#04x} failed: {source:?}")
            }
            Error::UnexpectedDevice { found, expected } => write!(
                f,
                "found unknown chip id {found:#04x}, expected {expected:#04x}"
            ),
            Error::Calibration { register, source } => write!(
                f,
                "reading calibration data at register {register:#04x} failed: {source:?}"
            ),
            Error::NotReady(state) => write!(f, "sensor is not ready (state: {state:?})"),
            Error::InvalidCoefficients(what) => {
                write!(f, "calibration coefficients make {what} compensation undefined")
            }
            Error::MeasurementTimeout => write!(f, "forced measurement did not complete"),
            Error::Skipped(what) => write!(f, "{what} measurement is skipped"),
        }
    }
}

impl<E: fmt::Debug> std::error::Error for Error<E> {}
