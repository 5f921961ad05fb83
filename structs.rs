use std::ops::RangeInclusive;

/// Plausible operating range of the temperature sensor, in °C.
pub const TEMPERATURE_RANGE: RangeInclusive<f64> = -40.0..=85.0;
/// Plausible operating range of the pressure sensor, in hPa.
pub const PRESSURE_RANGE: RangeInclusive<f64> = 300.0..=1100.0;
/// Relative humidity range, in %RH.
pub const HUMIDITY_RANGE: RangeInclusive<f64> = 0.0..=100.0;

/// dig_T1..dig_T3, registers 0x88-0x8D.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TemperatureCoefficients {
    pub t1: u16,
    pub t2: i16,
    pub t3: i16,
}

/// dig_P1..dig_P9, registers 0x8E-0x9F.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PressureCoefficients {
    pub p1: u16,
    pub p2: i16,
    pub p3: i16,
    pub p4: i16,
    pub p5: i16,
    pub p6: i16,
    pub p7: i16,
    pub p8: i16,
    pub p9: i16,
}

/// dig_H1..dig_H6, register 0xA1 and 0xE1-0xE7.
///
/// `h4` and `h5` are 12-bit signed values on the chip, already sign-extended.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HumidityCoefficients {
    pub h1: u8,
    pub h2: i16,
    pub h3: u8,
    pub h4: i16,
    pub h5: i16,
    pub h6: i8,
}

/// Factory calibration of one device. Read once per `open()`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Coefficients {
    pub temperature: TemperatureCoefficients,
    pub pressure: PressureCoefficients,
    pub humidity: HumidityCoefficients,
}

/// Uncompensated ADC codes. Temperature and pressure are 20-bit, humidity 16-bit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RawData {
    pub temperature: u32,
    pub pressure: u32,
    pub humidity: u32,
}

impl RawData {
    /// Decodes the 8-byte burst starting at 0xF7: press[3], temp[3], hum[2].
    pub fn from_burst(data: &[u8; 8]) -> Self {
        RawData {
            pressure: raw20(data[0], data[1], data[2]),
            temperature: raw20(data[3], data[4], data[5]),
            humidity: (u32::from(data[6]) << 8) | u32::from(data[7]),
        }
    }
}

/// MSB, LSB and the high nibble of XLSB, big-endian.
pub(crate) fn raw20(msb: u8, lsb: u8, xlsb: u8) -> u32 {
    (u32::from(msb) << 12) | (u32::from(lsb) << 4) | (u32::from(xlsb) >> 4)
}

/// Compensated temperature together with the fine temperature fed to the
/// pressure and humidity formulas.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Temperature {
    pub celsius: f64,
    pub t_fine: i32,
}

/// One compensated reading of all three quantities.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    /// °C
    pub temperature: f64,
    /// hPa
    pub pressure: f64,
    /// %RH
    pub humidity: f64,
}

impl Measurement {
    pub fn is_plausible(&self) -> bool {
        TEMPERATURE_RANGE.contains(&self.temperature)
            && PRESSURE_RANGE.contains(&self.pressure)
            && HUMIDITY_RANGE.contains(&self.humidity)
    }
}
