use std::env;
use std::process;

use ambient_bme280::{Bme280, DeviceConfig, PiBus, DEFAULT_ADDRESS};
use log::{error, warn};

// Raspberry Pi header pins 3/5.
const DEFAULT_I2C_BUS: u8 = 1;

fn env_u8(key: &str, default: u8) -> u8 {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return default,
    };
    let parsed = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => value.parse(),
    };
    parsed.unwrap_or_else(|_| {
        warn!("ignoring {key}={value}, using {default:#04x}");
        default
    })
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let bus = PiBus::with_bus(env_u8("AMBIENT_I2C_BUS", DEFAULT_I2C_BUS))?;
    let address = env_u8("AMBIENT_BME280_ADDRESS", DEFAULT_ADDRESS);

    let sensor = Bme280::new(bus, address, DeviceConfig::default());
    sensor.open()?;

    let m = sensor.read()?;
    if !m.is_plausible() {
        warn!("reading out of plausible range: {m:?}");
    }
    println!("Temperature: {:.2} C", m.temperature);
    println!("Humidity: {:.2} %", m.humidity);
    println!("Pressure: {:.2} hPa", m.pressure);
    Ok(())
}

fn main() {
    env_logger::init();
    if let Err(e) = run() {
        error!("{e}");
        process::exit(1);
    }
}
