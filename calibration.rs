//! Factory calibration (NVM) decoding.
//!
//! The coefficients live in two non-adjacent register ranges:
//! 0x88-0x9F for temperature/pressure plus dig_H1 at 0xA1, and 0xE1-0xE7 for the
//! rest of the humidity set. dig_H4 and dig_H5 are signed 12-bit values that
//! share the nibbles of 0xE5:
//!
//! ```text
//! 0xE4        0xE5               0xE6
//! H4[11:4]    H5[3:0] | H4[3:0]  H5[11:4]
//! ```

use log::debug;

use crate::bus::Transport;
use crate::error::Error;
use crate::protocol::{Protocol, REG_CALIB_00, REG_CALIB_25, REG_CALIB_26};
use crate::structs::{
    Coefficients, HumidityCoefficients, PressureCoefficients, TemperatureCoefficients,
};

pub const REG_CALIB_00_LEN: usize = 24;
pub const REG_CALIB_26_LEN: usize = 7;

const NIBBLE_MASK: u8 = 0x0F;
const NIBBLE_SHIFT: u32 = 4;
const I12_SIGN_SHIFT: u32 = 16 - 12;

/// Loads the full coefficient set. Any bus failure is reported as
/// [`Error::Calibration`].
pub fn read_coefficients<T: Transport>(
    protocol: &mut Protocol<T>,
) -> Result<Coefficients, Error<T::Error>> {
    load(protocol).map_err(Error::into_calibration)
}

fn load<T: Transport>(protocol: &mut Protocol<T>) -> Result<Coefficients, Error<T::Error>> {
    let mut block = [0u8; REG_CALIB_00_LEN];
    protocol.read_block(REG_CALIB_00, &mut block)?;
    let (temperature, pressure) = unpack_temperature_pressure(&block);

    // separate register, not covered by either block
    let h1 = protocol.read_byte(REG_CALIB_25)?;

    let mut block = [0u8; REG_CALIB_26_LEN];
    protocol.read_block(REG_CALIB_26, &mut block)?;
    let humidity = unpack_humidity(h1, &block);

    let coefficients = Coefficients { temperature, pressure, humidity };
    debug!("Got calibration data: {coefficients:#?}");
    Ok(coefficients)
}

fn u16_le(data: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([data[at], data[at + 1]])
}

fn i16_le(data: &[u8], at: usize) -> i16 {
    i16::from_le_bytes([data[at], data[at + 1]])
}

pub fn unpack_temperature_pressure(
    data: &[u8; REG_CALIB_00_LEN],
) -> (TemperatureCoefficients, PressureCoefficients) {
    let temperature = TemperatureCoefficients {
        t1: u16_le(data, 0),
        t2: i16_le(data, 2),
        t3: i16_le(data, 4),
    };
    let pressure = PressureCoefficients {
        p1: u16_le(data, 6),
        p2: i16_le(data, 8),
        p3: i16_le(data, 10),
        p4: i16_le(data, 12),
        p5: i16_le(data, 14),
        p6: i16_le(data, 16),
        p7: i16_le(data, 18),
        p8: i16_le(data, 20),
        p9: i16_le(data, 22),
    };
    (temperature, pressure)
}

pub fn unpack_humidity(h1: u8, data: &[u8; REG_CALIB_26_LEN]) -> HumidityCoefficients {
    let (h4, h5) = unpack_h4_h5(data[3], data[4], data[5]);
    HumidityCoefficients {
        h1,
        h2: i16_le(data, 0),
        h3: data[2],
        h4,
        h5,
        h6: data[6] as i8,
    }
}

/// Splits the three shared bytes at 0xE4-0xE6 into dig_H4 and dig_H5.
pub fn unpack_h4_h5(b0: u8, b1: u8, b2: u8) -> (i16, i16) {
    let h4 = (u16::from(b0) << NIBBLE_SHIFT) | u16::from(b1 & NIBBLE_MASK);
    let h5 = (u16::from(b2) << NIBBLE_SHIFT) | u16::from(b1 >> NIBBLE_SHIFT);
    (sign_extend_12(h4), sign_extend_12(h5))
}

fn sign_extend_12(value: u16) -> i16 {
    ((value << I12_SIGN_SHIFT) as i16) >> I12_SIGN_SHIFT
}
