use std::thread;
use std::time::Duration;

use log::debug;

use crate::bus::Transport;
use crate::config::{DeviceConfig, Mode};
use crate::error::{Access, Error};
use crate::structs::{raw20, RawData};

// BME280 register addresses.
pub const REG_CHIP_ID: u8 = 0xD0;
pub const REG_SOFT_RESET: u8 = 0xE0;
pub const REG_CALIB_00: u8 = 0x88;
pub const REG_CALIB_25: u8 = 0xA1;
pub const REG_CALIB_26: u8 = 0xE1;
pub const REG_CTRL_HUM: u8 = 0xF2;
pub const REG_STATUS: u8 = 0xF3;
pub const REG_CTRL_MEAS: u8 = 0xF4;
pub const REG_CONFIG: u8 = 0xF5;
pub const REG_PRESS_MSB: u8 = 0xF7;
pub const REG_TEMP_MSB: u8 = 0xFA;

pub const CHIP_ID: u8 = 0x60;
pub const SOFT_RESET_COMMAND: u8 = 0xB6;
pub const RESET_SETTLE_TIME: Duration = Duration::from_millis(4);

// status bit 3: conversion running
const STATUS_MEASURING: u8 = 0x08;

/// Register-level commands on one device address.
pub struct Protocol<T> {
    bus: T,
    address: u8,
}

impl<T: Transport> Protocol<T> {
    pub fn new(bus: T, address: u8) -> Self {
        Protocol { bus, address }
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    pub fn into_inner(self) -> T {
        self.bus
    }

    pub fn write_byte(&mut self, register: u8, value: u8) -> Result<(), Error<T::Error>> {
        debug!("write {register:#04x} <- {value:#010b}");
        self.bus
            .write_byte(self.address, register, value)
            .map_err(|source| Error::Transport { register, access: Access::Write, source })
    }

    pub fn read_byte(&mut self, register: u8) -> Result<u8, Error<T::Error>> {
        self.select(register)?;
        self.bus
            .read_byte(self.address)
            .map_err(|source| Error::Transport { register, access: Access::Read, source })
    }

    pub fn read_block(&mut self, start: u8, buffer: &mut [u8]) -> Result<(), Error<T::Error>> {
        self.select(start)?;
        self.bus
            .read_block(self.address, buffer)
            .map_err(|source| Error::Transport { register: start, access: Access::Read, source })
    }

    fn select(&mut self, register: u8) -> Result<(), Error<T::Error>> {
        self.bus
            .write_command(self.address, register)
            .map_err(|source| Error::Transport { register, access: Access::Write, source })
    }

    pub fn identify(&mut self) -> Result<(), Error<T::Error>> {
        let found = self.read_byte(REG_CHIP_ID)?;
        if found != CHIP_ID {
            return Err(Error::UnexpectedDevice { found, expected: CHIP_ID });
        }
        debug!("Got chip id: {found:#x}");
        Ok(())
    }

    /// Resets the chip and blocks until it is safe to read the NVM again.
    pub fn soft_reset(&mut self) -> Result<(), Error<T::Error>> {
        self.write_byte(REG_SOFT_RESET, SOFT_RESET_COMMAND)?;
        thread::sleep(RESET_SETTLE_TIME);
        Ok(())
    }

    /// Writes ctrl_hum, ctrl_meas and config.
    ///
    /// ctrl_hum only takes effect after the following ctrl_meas write, and the
    /// chip ignores config writes in normal mode, so normal mode is entered
    /// last with a second ctrl_meas write.
    pub fn write_config(&mut self, config: &DeviceConfig) -> Result<(), Error<T::Error>> {
        self.write_byte(REG_CTRL_HUM, config.ctrl_hum())?;
        if config.mode == Mode::Normal {
            self.write_byte(REG_CTRL_MEAS, config.ctrl_meas(Mode::Sleep))?;
            self.write_byte(REG_CONFIG, config.config())?;
            self.write_byte(REG_CTRL_MEAS, config.ctrl_meas(Mode::Normal))
        } else {
            self.write_byte(REG_CTRL_MEAS, config.ctrl_meas(config.mode))?;
            self.write_byte(REG_CONFIG, config.config())
        }
    }

    pub fn read_status(&mut self) -> Result<u8, Error<T::Error>> {
        self.read_byte(REG_STATUS)
    }

    pub fn is_measuring(&mut self) -> Result<bool, Error<T::Error>> {
        Ok(self.read_status()? & STATUS_MEASURING != 0)
    }

    /// Starts one conversion; the chip returns to sleep when it is done.
    pub fn trigger_forced(&mut self, config: &DeviceConfig) -> Result<(), Error<T::Error>> {
        self.write_byte(REG_CTRL_MEAS, config.ctrl_meas(Mode::Forced))
    }

    /// 20-bit temperature code from 0xFA-0xFC.
    pub fn read_raw_temperature(&mut self) -> Result<u32, Error<T::Error>> {
        let mut data = [0u8; 3];
        self.read_block(REG_TEMP_MSB, &mut data)?;
        Ok(raw20(data[0], data[1], data[2]))
    }

    /// Burst read of 0xF7-0xFE, so all three codes come from the same conversion.
    pub fn read_raw(&mut self) -> Result<RawData, Error<T::Error>> {
        let mut data = [0u8; 8];
        self.read_block(REG_PRESS_MSB, &mut data)?;
        Ok(RawData::from_burst(&data))
    }
}
