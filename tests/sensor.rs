use std::convert::Infallible;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use ambient_bme280::{
    Bme280, DeviceConfig, Error, HalBus, Mode, Oversampling, State, Transport, ALTERNATE_ADDRESS,
};
use embedded_hal::i2c::ErrorKind;
use embedded_hal_mock::eh1::i2c::{Mock as I2cMock, Transaction};

const ADDR: u8 = 0x76;

const CALIB_00: [u8; 24] = [
    0x70, 0x6B, 0x43, 0x67, 0x18, 0xFC, 0x7D, 0x8E, 0x43, 0xD6, 0xD0, 0x0B, 0x27, 0x0B, 0x8C,
    0x00, 0xF9, 0xFF, 0x8C, 0x3C, 0xF8, 0xC6, 0x70, 0x17,
];
const CALIB_25: u8 = 75;
const CALIB_26: [u8; 7] = [0x6A, 0x01, 0x00, 0x13, 0x29, 0x03, 0x1E];

// adc_T = 519888 (25.08 C)
const TEMP_DATA: [u8; 3] = [0x7E, 0xED, 0x00];
// adc_P = 415148, adc_T = 519888, adc_H = 30000
const BURST_DATA: [u8; 8] = [0x65, 0x5A, 0xC0, 0x7E, 0xED, 0x00, 0x75, 0x30];

fn identify_and_calibrate() -> Vec<Transaction> {
    vec![
        Transaction::write(ADDR, vec![0xD0]),
        Transaction::read(ADDR, vec![0x60]),
        Transaction::write(ADDR, vec![0xE0, 0xB6]),
        Transaction::write(ADDR, vec![0x88]),
        Transaction::read(ADDR, CALIB_00.to_vec()),
        Transaction::write(ADDR, vec![0xA1]),
        Transaction::read(ADDR, vec![CALIB_25]),
        Transaction::write(ADDR, vec![0xE1]),
        Transaction::read(ADDR, CALIB_26.to_vec()),
    ]
}

fn normal_mode_config() -> Vec<Transaction> {
    normal_mode_writes(0b001, 0b001_101_00)
}

/// `ctrl_meas` is given with the mode bits clear.
fn normal_mode_writes(ctrl_hum: u8, ctrl_meas: u8) -> Vec<Transaction> {
    vec![
        Transaction::write(ADDR, vec![0xF2, ctrl_hum]),
        Transaction::write(ADDR, vec![0xF4, ctrl_meas]),
        Transaction::write(ADDR, vec![0xF5, 0b010_000_00]),
        Transaction::write(ADDR, vec![0xF4, ctrl_meas | 0b11]),
    ]
}

#[test]
fn open_configures_normal_mode_in_order() {
    let mut expectations = identify_and_calibrate();
    expectations.extend(normal_mode_config());
    expectations.push(Transaction::write(ADDR, vec![0xFA]));
    expectations.push(Transaction::read(ADDR, TEMP_DATA.to_vec()));

    let mut mock = I2cMock::new(&expectations);
    let sensor = Bme280::new(HalBus(mock.clone()), ADDR, DeviceConfig::default());
    assert_eq!(sensor.state(), State::Uninitialized);

    sensor.open().unwrap();
    assert_eq!(sensor.state(), State::Ready);
    let coefficients = sensor.coefficients().unwrap();
    assert_eq!(coefficients.temperature.t1, 27504);
    assert_eq!(coefficients.humidity.h5, 50);

    let t = sensor.read_temperature().unwrap();
    assert!((t - 25.08).abs() < 0.01);
    assert_eq!(sensor.state(), State::Ready);

    sensor.release();
    mock.done();
}

#[test]
fn read_returns_all_quantities_from_one_burst() {
    let mut expectations = identify_and_calibrate();
    expectations.extend(normal_mode_config());
    expectations.push(Transaction::write(ADDR, vec![0xF7]));
    expectations.push(Transaction::read(ADDR, BURST_DATA.to_vec()));

    let mut mock = I2cMock::new(&expectations);
    let sensor = Bme280::new(HalBus(mock.clone()), ADDR, DeviceConfig::default());
    sensor.open().unwrap();

    let m = sensor.read().unwrap();
    assert!((m.temperature - 25.08).abs() < 0.01);
    assert!((m.pressure - 1006.53).abs() < 0.01);
    assert!((m.humidity - 55.0).abs() < 0.01);
    assert!(m.is_plausible());

    mock.done();
}

#[test]
fn wrong_chip_id_is_rejected() {
    let expectations = [
        Transaction::write(ADDR, vec![0xD0]),
        Transaction::read(ADDR, vec![0x58]),
    ];
    let mut mock = I2cMock::new(&expectations);
    let sensor = Bme280::new(HalBus(mock.clone()), ADDR, DeviceConfig::default());

    match sensor.open() {
        Err(Error::UnexpectedDevice { found: 0x58, expected: 0x60 }) => {}
        other => panic!("unexpected {other:?}"),
    }
    assert_ne!(sensor.state(), State::Ready);
    assert!(sensor.coefficients().is_none());
    assert!(matches!(sensor.read_temperature(), Err(Error::NotReady(State::Faulted))));

    mock.done();
}

#[test]
fn reads_before_open_touch_no_registers() {
    let mut mock = I2cMock::new(&[]);
    let sensor = Bme280::new(HalBus(mock.clone()), ADDR, DeviceConfig::default());

    assert!(matches!(sensor.read_temperature(), Err(Error::NotReady(State::Uninitialized))));
    assert!(matches!(sensor.read(), Err(Error::NotReady(State::Uninitialized))));

    mock.done();
}

#[test]
fn calibration_failure_aborts_open() {
    let expectations = [
        Transaction::write(ADDR, vec![0xD0]),
        Transaction::read(ADDR, vec![0x60]),
        Transaction::write(ADDR, vec![0xE0, 0xB6]),
        Transaction::write(ADDR, vec![0x88]),
        Transaction::read(ADDR, CALIB_00.to_vec()),
        Transaction::write(ADDR, vec![0xA1]),
        Transaction::read(ADDR, vec![CALIB_25]),
        Transaction::write(ADDR, vec![0xE1]),
        Transaction::read(ADDR, CALIB_26.to_vec()).with_error(ErrorKind::Other),
    ];
    let mut mock = I2cMock::new(&expectations);
    let sensor = Bme280::new(HalBus(mock.clone()), ADDR, DeviceConfig::default());

    match sensor.open() {
        Err(Error::Calibration { register: 0xE1, source: ErrorKind::Other }) => {}
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(sensor.state(), State::Faulted);
    assert!(sensor.coefficients().is_none());

    mock.done();
}

#[test]
fn bus_failure_faults_until_reopened() {
    let mut expectations = identify_and_calibrate();
    expectations.extend(normal_mode_config());
    expectations.push(Transaction::write(ADDR, vec![0xFA]).with_error(ErrorKind::Other));
    expectations.extend(identify_and_calibrate());
    expectations.extend(normal_mode_config());
    expectations.push(Transaction::write(ADDR, vec![0xFA]));
    expectations.push(Transaction::read(ADDR, TEMP_DATA.to_vec()));

    let mut mock = I2cMock::new(&expectations);
    let sensor = Bme280::new(HalBus(mock.clone()), ADDR, DeviceConfig::default());
    sensor.open().unwrap();

    assert!(matches!(sensor.read_temperature(), Err(Error::Transport { register: 0xFA, .. })));
    assert_eq!(sensor.state(), State::Faulted);
    assert!(matches!(sensor.read_temperature(), Err(Error::NotReady(State::Faulted))));

    sensor.open().unwrap();
    assert_eq!(sensor.state(), State::Ready);
    assert!(sensor.read_temperature().is_ok());

    mock.done();
}

#[test]
fn forced_mode_triggers_a_conversion_per_read() {
    let mut expectations = identify_and_calibrate();
    expectations.extend([
        Transaction::write(ADDR, vec![0xF2, 0b001]),
        Transaction::write(ADDR, vec![0xF4, 0b001_101_01]),
        Transaction::write(ADDR, vec![0xF5, 0b010_000_00]),
        // read
        Transaction::write(ADDR, vec![0xF4, 0b001_101_01]),
        Transaction::write(ADDR, vec![0xF3]),
        Transaction::read(ADDR, vec![0x08]),
        Transaction::write(ADDR, vec![0xF3]),
        Transaction::read(ADDR, vec![0x00]),
        Transaction::write(ADDR, vec![0xF7]),
        Transaction::read(ADDR, BURST_DATA.to_vec()),
    ]);

    let mut mock = I2cMock::new(&expectations);
    let config = DeviceConfig::default().with_mode(Mode::Forced);
    let sensor = Bme280::new(HalBus(mock.clone()), ADDR, config);
    sensor.open().unwrap();

    let h = sensor.read_humidity().unwrap();
    assert!((h - 55.0).abs() < 0.01);

    mock.done();
}

#[test]
fn forced_conversion_that_never_ends_times_out() {
    let mut expectations = identify_and_calibrate();
    expectations.extend([
        Transaction::write(ADDR, vec![0xF2, 0b001]),
        Transaction::write(ADDR, vec![0xF4, 0b001_101_01]),
        Transaction::write(ADDR, vec![0xF5, 0b010_000_00]),
        Transaction::write(ADDR, vec![0xF4, 0b001_101_01]),
    ]);
    for _ in 0..5 {
        expectations.push(Transaction::write(ADDR, vec![0xF3]));
        expectations.push(Transaction::read(ADDR, vec![0x08]));
    }

    let mut mock = I2cMock::new(&expectations);
    let config = DeviceConfig::default().with_mode(Mode::Forced);
    let sensor = Bme280::new(HalBus(mock.clone()), ADDR, config);
    sensor.open().unwrap();

    assert!(matches!(sensor.read_pressure(), Err(Error::MeasurementTimeout)));
    assert_eq!(sensor.state(), State::Faulted);

    mock.done();
}

#[test]
fn sleep_mode_triggers_a_conversion_per_read() {
    let mut expectations = identify_and_calibrate();
    expectations.extend([
        Transaction::write(ADDR, vec![0xF2, 0b001]),
        Transaction::write(ADDR, vec![0xF4, 0b001_101_00]),
        Transaction::write(ADDR, vec![0xF5, 0b010_000_00]),
        // read
        Transaction::write(ADDR, vec![0xF4, 0b001_101_01]),
        Transaction::write(ADDR, vec![0xF3]),
        Transaction::read(ADDR, vec![0x00]),
        Transaction::write(ADDR, vec![0xFA]),
        Transaction::read(ADDR, TEMP_DATA.to_vec()),
    ]);

    let mut mock = I2cMock::new(&expectations);
    let config = DeviceConfig::default().with_mode(Mode::Sleep);
    let sensor = Bme280::new(HalBus(mock.clone()), ADDR, config);
    sensor.open().unwrap();

    let t = sensor.read_temperature().unwrap();
    assert!((t - 25.08).abs() < 0.01);
    assert_eq!(sensor.state(), State::Ready);

    mock.done();
}

#[test]
fn skipped_humidity_is_an_error() {
    let mut expectations = identify_and_calibrate();
    expectations.extend(normal_mode_writes(0b000, 0b001_101_00));
    expectations.push(Transaction::write(ADDR, vec![0xF7]));
    // humidity channel holds the skipped marker 0x8000
    let burst = [0x65, 0x5A, 0xC0, 0x7E, 0xED, 0x00, 0x80, 0x00];
    expectations.push(Transaction::read(ADDR, burst.to_vec()));

    let mut mock = I2cMock::new(&expectations);
    let config = DeviceConfig::default().with_humidity(Oversampling::Skip);
    let sensor = Bme280::new(HalBus(mock.clone()), ADDR, config);
    sensor.open().unwrap();

    assert!(matches!(sensor.read_humidity(), Err(Error::Skipped("humidity"))));
    assert!(matches!(sensor.read(), Err(Error::Skipped("humidity"))));
    assert_eq!(sensor.state(), State::Ready);

    let p = sensor.read_pressure().unwrap();
    assert!((p - 1006.53).abs() < 0.01);

    mock.done();
}

#[test]
fn skipped_pressure_is_an_error() {
    let mut expectations = identify_and_calibrate();
    expectations.extend(normal_mode_writes(0b001, 0b001_000_00));
    expectations.push(Transaction::write(ADDR, vec![0xF7]));
    let burst = [0x80, 0x00, 0x00, 0x7E, 0xED, 0x00, 0x75, 0x30];
    expectations.push(Transaction::read(ADDR, burst.to_vec()));

    let mut mock = I2cMock::new(&expectations);
    let config = DeviceConfig::default().with_pressure(Oversampling::Skip);
    let sensor = Bme280::new(HalBus(mock.clone()), ADDR, config);
    sensor.open().unwrap();

    assert!(matches!(sensor.read_pressure(), Err(Error::Skipped("pressure"))));
    assert!(matches!(sensor.read(), Err(Error::Skipped("pressure"))));
    assert_eq!(sensor.state(), State::Ready);

    let h = sensor.read_humidity().unwrap();
    assert!((h - 55.0).abs() < 0.01);

    mock.done();
}

#[test]
fn skipped_temperature_fails_every_read() {
    let mut expectations = identify_and_calibrate();
    expectations.extend(normal_mode_writes(0b001, 0b000_101_00));

    let mut mock = I2cMock::new(&expectations);
    let config = DeviceConfig::default().with_temperature(Oversampling::Skip);
    let sensor = Bme280::new(HalBus(mock.clone()), ADDR, config);
    sensor.open().unwrap();

    // pressure and humidity depend on t_fine
    assert!(matches!(sensor.read_temperature(), Err(Error::Skipped("temperature"))));
    assert!(matches!(sensor.read_pressure(), Err(Error::Skipped("temperature"))));
    assert!(matches!(sensor.read_humidity(), Err(Error::Skipped("temperature"))));
    assert!(matches!(sensor.read(), Err(Error::Skipped("temperature"))));
    assert_eq!(sensor.state(), State::Ready);

    mock.done();
}

#[test]
fn release_returns_the_configured_bus() {
    let expectations = [
        Transaction::write(ALTERNATE_ADDRESS, vec![0xD0]),
        Transaction::read(ALTERNATE_ADDRESS, vec![0x60]),
    ];
    let config = DeviceConfig::default().with_mode(Mode::Forced);
    let sensor = Bme280::new(HalBus(I2cMock::new(&expectations)), ALTERNATE_ADDRESS, config);

    assert_eq!(sensor.address(), ALTERNATE_ADDRESS);
    assert_eq!(sensor.config(), config);

    let mut bus = sensor.release();
    bus.write_command(ALTERNATE_ADDRESS, 0xD0).unwrap();
    assert_eq!(bus.read_byte(ALTERNATE_ADDRESS).unwrap(), 0x60);
    bus.into_inner().done();
}

/// Answers like a BME280 and flags any command/read pair that another caller
/// broke into.
#[derive(Clone, Default)]
struct RecordingBus {
    shared: Arc<Mutex<Recording>>,
}

#[derive(Default)]
struct Recording {
    pending: Option<u8>,
    interleaved: bool,
    reads: usize,
}

impl RecordingBus {
    fn respond(register: u8, buffer: &mut [u8]) {
        let data: &[u8] = match register {
            0xD0 => &[0x60],
            0x88 => &CALIB_00,
            0xA1 => &[CALIB_25],
            0xE1 => &CALIB_26,
            0xFA => &TEMP_DATA,
            0xF7 => &BURST_DATA,
            _ => &[],
        };
        for (dst, src) in buffer.iter_mut().zip(data) {
            *dst = *src;
        }
    }
}

impl Transport for RecordingBus {
    type Error = Infallible;

    fn write_byte(&mut self, _address: u8, _register: u8, _value: u8) -> Result<(), Self::Error> {
        let mut rec = self.shared.lock().unwrap();
        if rec.pending.is_some() {
            rec.interleaved = true;
        }
        Ok(())
    }

    fn write_command(&mut self, _address: u8, register: u8) -> Result<(), Self::Error> {
        {
            let mut rec = self.shared.lock().unwrap();
            if rec.pending.is_some() {
                rec.interleaved = true;
            }
            rec.pending = Some(register);
        }
        // leave room for another caller to sneak in
        thread::sleep(Duration::from_micros(200));
        Ok(())
    }

    fn read_byte(&mut self, address: u8) -> Result<u8, Self::Error> {
        let mut data = [0u8; 1];
        self.read_block(address, &mut data)?;
        Ok(data[0])
    }

    fn read_block(&mut self, _address: u8, buffer: &mut [u8]) -> Result<(), Self::Error> {
        let mut rec = self.shared.lock().unwrap();
        match rec.pending.take() {
            Some(register) => Self::respond(register, buffer),
            None => rec.interleaved = true,
        }
        rec.reads += 1;
        Ok(())
    }
}

#[test]
fn concurrent_reads_are_serialized() {
    let bus = RecordingBus::default();
    let shared = bus.shared.clone();
    let sensor = Arc::new(Bme280::new(bus, ADDR, DeviceConfig::default()));
    sensor.open().unwrap();

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let sensor = Arc::clone(&sensor);
            thread::spawn(move || {
                (0..25)
                    .map(|_| {
                        if i % 2 == 0 {
                            sensor.read_temperature().unwrap()
                        } else {
                            sensor.read().unwrap().temperature
                        }
                    })
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    for handle in handles {
        for t in handle.join().unwrap() {
            assert!((t - 25.08).abs() < 0.01);
        }
    }

    let rec = shared.lock().unwrap();
    assert!(!rec.interleaved);
    // 4 reads during open, then one per call
    assert_eq!(rec.reads, 4 + 100);
    assert_eq!(sensor.state(), State::Ready);
}
