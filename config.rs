//! Measurement settings and their `ctrl_hum`, `ctrl_meas` and `config` encodings.

/// osrs_h / osrs_t / osrs_p field value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Oversampling {
    /// Measurement skipped, output stays at 0x80000 (0x8000 for humidity).
    Skip = 0b000,
    X1 = 0b001,
    X2 = 0b010,
    X4 = 0b011,
    X8 = 0b100,
    X16 = 0b101,
}

impl Oversampling {
    fn factor(self) -> u32 {
        match self {
            Oversampling::Skip => 0,
            Oversampling::X1 => 1,
            Oversampling::X2 => 2,
            Oversampling::X4 => 4,
            Oversampling::X8 => 8,
            Oversampling::X16 => 16,
        }
    }
}

/// IIR filter coefficient, `config` bits 4:2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Filter {
    Off = 0b000,
    X2 = 0b001,
    X4 = 0b010,
    X8 = 0b011,
    X16 = 0b100,
}

/// Inactive time between conversions in normal mode, `config` bits 7:5.
///
/// The encoding is not monotonic: 10 ms and 20 ms sit at the top.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Standby {
    Ms0_5 = 0b000,
    Ms62_5 = 0b001,
    Ms125 = 0b010,
    Ms250 = 0b011,
    Ms500 = 0b100,
    Ms1000 = 0b101,
    Ms10 = 0b110,
    Ms20 = 0b111,
}

/// Power mode, `ctrl_meas` bits 1:0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Mode {
    Sleep = 0b00,
    Forced = 0b01,
    Normal = 0b11,
}

const CTRL_MEAS_OSRS_T_POS: u8 = 5;
const CTRL_MEAS_OSRS_P_POS: u8 = 2;
const CONFIG_T_SB_POS: u8 = 5;
const CONFIG_FILTER_POS: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceConfig {
    pub humidity: Oversampling,
    pub temperature: Oversampling,
    pub pressure: Oversampling,
    pub filter: Filter,
    pub standby: Standby,
    pub mode: Mode,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        DeviceConfig {
            humidity: Oversampling::X1,
            temperature: Oversampling::X1,
            pressure: Oversampling::X16,
            filter: Filter::Off,
            standby: Standby::Ms125,
            mode: Mode::Normal,
        }
    }
}

impl DeviceConfig {
    pub fn with_humidity(mut self, osrs: Oversampling) -> Self {
        self.humidity = osrs;
        self
    }

    pub fn with_temperature(mut self, osrs: Oversampling) -> Self {
        self.temperature = osrs;
        self
    }

    pub fn with_pressure(mut self, osrs: Oversampling) -> Self {
        self.pressure = osrs;
        self
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_standby(mut self, standby: Standby) -> Self {
        self.standby = standby;
        self
    }

    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    pub fn ctrl_hum(&self) -> u8 {
        self.humidity as u8
    }

    /// `ctrl_meas` with the given mode in bits 1:0.
    pub fn ctrl_meas(&self, mode: Mode) -> u8 {
        ((self.temperature as u8) << CTRL_MEAS_OSRS_T_POS)
            | ((self.pressure as u8) << CTRL_MEAS_OSRS_P_POS)
            | mode as u8
    }

    /// `config` register; bit 0 (spi3w_en) is always left clear.
    pub fn config(&self) -> u8 {
        ((self.standby as u8) << CONFIG_T_SB_POS) | ((self.filter as u8) << CONFIG_FILTER_POS)
    }

    /// Worst-case duration of one conversion cycle in microseconds
    /// (datasheet appendix B, maximum values).
    pub fn max_measurement_time_us(&self) -> u32 {
        let mut t = 1250 + 2300 * self.temperature.factor();
        if self.pressure != Oversampling::Skip {
            t += 2300 * self.pressure.factor() + 575;
        }
        if self.humidity != Oversampling::Skip {
            t += 2300 * self.humidity.factor() + 575;
        }
        t
    }
}
