//! Byte-level access to a device on the serial bus.

use rppal::i2c::I2c;

/// The four bus primitives the register protocol is built on.
///
/// Register reads are two transactions: `write_command` selects the register,
/// then `read_byte`/`read_block` fetches from it. Implementations must not
/// retry.
pub trait Transport {
    type Error: std::fmt::Debug;

    fn write_byte(&mut self, address: u8, register: u8, value: u8) -> Result<(), Self::Error>;

    fn write_command(&mut self, address: u8, register: u8) -> Result<(), Self::Error>;

    fn read_byte(&mut self, address: u8) -> Result<u8, Self::Error>;

    fn read_block(&mut self, address: u8, buffer: &mut [u8]) -> Result<(), Self::Error>;
}

/// Raspberry Pi I2C bus through `/dev/i2c-N`.
pub struct PiBus {
    i2c: I2c,
    selected: Option<u8>,
}

impl PiBus {
    /// Opens the bus the Pi exposes on its GPIO header.
    pub fn new() -> Result<Self, rppal::i2c::Error> {
        Ok(Self::from_i2c(I2c::new()?))
    }

    pub fn with_bus(bus: u8) -> Result<Self, rppal::i2c::Error> {
        Ok(Self::from_i2c(I2c::with_bus(bus)?))
    }

    pub fn from_i2c(i2c: I2c) -> Self {
        PiBus { i2c, selected: None }
    }

    fn select(&mut self, address: u8) -> Result<(), rppal::i2c::Error> {
        if self.selected != Some(address) {
            self.i2c.set_slave_address(u16::from(address))?;
            self.selected = Some(address);
        }
        Ok(())
    }
}

impl Transport for PiBus {
    type Error = rppal::i2c::Error;

    fn write_byte(&mut self, address: u8, register: u8, value: u8) -> Result<(), Self::Error> {
        self.select(address)?;
        self.i2c.smbus_write_byte(register, value)
    }

    fn write_command(&mut self, address: u8, register: u8) -> Result<(), Self::Error> {
        self.select(address)?;
        self.i2c.write(&[register]).map(|_| ())
    }

    fn read_byte(&mut self, address: u8) -> Result<u8, Self::Error> {
        self.select(address)?;
        let mut data = [0u8; 1];
        self.i2c.read(&mut data)?;
        Ok(data[0])
    }

    fn read_block(&mut self, address: u8, buffer: &mut [u8]) -> Result<(), Self::Error> {
        self.select(address)?;
        self.i2c.read(buffer).map(|_| ())
    }
}

/// Adapter for any `embedded-hal` 1.0 I2C implementation.
pub struct HalBus<I>(pub I);

impl<I> HalBus<I> {
    pub fn into_inner(self) -> I {
        self.0
    }
}

impl<I: embedded_hal::i2c::I2c> Transport for HalBus<I> {
    type Error = I::Error;

    fn write_byte(&mut self, address: u8, register: u8, value: u8) -> Result<(), Self::Error> {
        self.0.write(address, &[register, value])
    }

    fn write_command(&mut self, address: u8, register: u8) -> Result<(), Self::Error> {
        self.0.write(address, &[register])
    }

    fn read_byte(&mut self, address: u8) -> Result<u8, Self::Error> {
        let mut data = [0u8; 1];
        self.0.read(address, &mut data)?;
        Ok(data[0])
    }

    fn read_block(&mut self, address: u8, buffer: &mut [u8]) -> Result<(), Self::Error> {
        self.0.read(address, buffer)
    }
}
