//! Double-precision compensation formulas from the BME280 datasheet.
//!
//! All functions are pure: the same raw code and coefficients always give the
//! same result.

use crate::structs::{
    HumidityCoefficients, PressureCoefficients, Temperature, TemperatureCoefficients,
};

/// Converts a 20-bit temperature code into °C and t_fine.
///
/// The first term is truncated to an integer before the second is added; the
/// result must match the reference output bit for bit, so keep the order.
pub fn compensate_temperature(raw: u32, calib: &TemperatureCoefficients) -> Temperature {
    let raw = f64::from(raw);
    let t1 = f64::from(calib.t1);
    let v1 = (raw / 16384.0 - t1 / 1024.0) * f64::from(calib.t2);
    let v2 = (raw / 131072.0 - t1 / 8192.0).powi(2) * f64::from(calib.t3);
    let fine = v1.trunc() + v2;
    Temperature {
        celsius: fine / 5120.0,
        t_fine: fine as i32,
    }
}

/// Converts a 20-bit pressure code into hPa.
///
/// Returns `None` when dig_P1 makes the divisor zero.
pub fn compensate_pressure(raw: u32, t_fine: i32, calib: &PressureCoefficients) -> Option<f64> {
    let mut v1 = f64::from(t_fine) / 2.0 - 64000.0;
    let mut v2 = v1 * v1 * f64::from(calib.p6) / 32768.0;
    v2 += v1 * f64::from(calib.p5) * 2.0;
    v2 = v2 / 4.0 + f64::from(calib.p4) * 65536.0;
    v1 = (f64::from(calib.p3) * v1 * v1 / 524288.0 + f64::from(calib.p2) * v1) / 524288.0;
    v1 = (1.0 + v1 / 32768.0) * f64::from(calib.p1);
    if v1 == 0.0 {
        return None;
    }
    let mut p = 1048576.0 - f64::from(raw);
    p = (p - v2 / 4096.0) * 6250.0 / v1;
    v1 = f64::from(calib.p9) * p * p / 2147483648.0;
    v2 = p * f64::from(calib.p8) / 32768.0;
    p += (v1 + v2 + f64::from(calib.p7)) / 16.0;
    Some(p / 100.0)
}

/// Converts a 16-bit humidity code into %RH, clamped to 0..=100.
pub fn compensate_humidity(raw: u32, t_fine: i32, calib: &HumidityCoefficients) -> f64 {
    let mut h = f64::from(t_fine) - 76800.0;
    h = (f64::from(raw) - (f64::from(calib.h4) * 64.0 + f64::from(calib.h5) / 16384.0 * h))
        * (f64::from(calib.h2) / 65536.0
            * (1.0
                + f64::from(calib.h6) / 67108864.0
                    * h
                    * (1.0 + f64::from(calib.h3) / 67108864.0 * h)));
    h *= 1.0 - f64::from(calib.h1) * h / 524288.0;
    h.clamp(0.0, 100.0)
}
