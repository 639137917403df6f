//! LIS2DH12 three-axis accelerometer.
//!
//! Output is left-justified in 16-bit registers; the number of valid bits
//! depends on the operating mode:
//!
//! | Resolution | LPen | HR | mg/digit at ±2 / ±4 / ±8 / ±16 g |
//! |------------|------|----|-----------------------------------|
//! | 8 bit      | 1    | 0  | 16 / 32 / 64 / 192                |
//! | 10 bit     | 0    | 0  | 4 / 8 / 16 / 48                   |
//! | 12 bit     | 0    | 1  | 1 / 2 / 4 / 12                    |
//!
//! The chip has no one-shot conversion, so `SingleAsynchronous` is not
//! supported; `SingleBlocking` runs the ODR for one sample period.

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;

use super::bus::RegisterBus;
use super::{Axis3, Dsp, Mode, SampleRate, Sensor, Setting};
use crate::config::TagConfig;
use crate::error::{Error, ErrorAccumulator, Result};

/// SA0 pulled high.
pub const LIS2DH12_ADDRESS: u8 = 0x19;
/// SA0 pulled low.
pub const LIS2DH12_ADDRESS_ALT: u8 = 0x18;

const WHO_AM_I: u8 = 0x0F;
const DEVICE_ID: u8 = 0x33;
const CTRL_REG1: u8 = 0x20;
const CTRL_REG2: u8 = 0x21;
const CTRL_REG4: u8 = 0x23;
const CTRL_REG5: u8 = 0x24;
const OUT_X_L: u8 = 0x28;
const AUTO_INCREMENT: u8 = 0x80;

// CTRL_REG1
const ODR_MASK: u8 = 0xF0;
const LPEN: u8 = 1 << 3;
const XYZ_EN: u8 = 0b0000_0111;

// CTRL_REG2
const HPM_MASK: u8 = 0b1100_0000;
const HPCF_MASK: u8 = 0b0011_0000;
const FDS: u8 = 1 << 3;

// CTRL_REG4
const BDU: u8 = 1 << 7;
const FS_MASK: u8 = 0b0011_0000;
const HR: u8 = 1 << 3;

// CTRL_REG5
const BOOT: u8 = 1 << 7;

/// Boot procedure duration.
const BOOT_MS: u32 = 5;
/// Turn-on margin on top of one ODR period.
const TURN_ON_MS: u32 = 1;

/// Supported rates with their ODR field value.
const RATES: [(u8, u8); 7] = [(1, 1), (10, 2), (25, 3), (50, 4), (100, 5), (200, 6), (255, 7)];
/// 400 Hz does not fit the `u8` rate type; it is reported as 255.
pub const RATE_400_HZ: u8 = 255;

const SCALES: [u8; 4] = [2, 4, 8, 16];
const RESOLUTIONS: [u8; 3] = [8, 10, 12];

pub const DEFAULT_SCALE_G: u8 = 2;
pub const DEFAULT_RESOLUTION_BITS: u8 = 10;

/// Highest high-pass cut-off selector.
pub const HIGH_PASS_MAX: u8 = 3;

/// mg per digit, indexed by resolution then scale.
fn sensitivity_mg(resolution: u8, scale: u8) -> f32 {
    let s = SCALES.iter().position(|&x| x == scale).unwrap_or(0);
    let table: [f32; 4] = match resolution {
        8 => [16.0, 32.0, 64.0, 192.0],
        12 => [1.0, 2.0, 4.0, 12.0],
        _ => [4.0, 8.0, 16.0, 48.0],
    };
    table[s]
}

fn round_up(options: &[u8], setting: Setting, default: u8) -> Result<Option<u8>> {
    let value = match setting {
        Setting::NoChange => return Ok(None),
        Setting::Min => options[0],
        Setting::Max => options[options.len() - 1],
        Setting::Default => default,
        Setting::Value(v) => options
            .iter()
            .copied()
            .find(|&o| v <= o)
            .ok_or(Error::NotSupported)?,
    };
    Ok(Some(value))
}

pub struct Lis2dh12<I2C, D> {
    bus: RegisterBus<I2C>,
    delay: D,
    mode: Mode,
    /// Sample rate in Hz (255 = 400 Hz), 0 when stopped.
    rate_hz: u8,
    resolution: u8,
    scale: u8,
    dsp: (Dsp, u8),
    initialized: bool,
}

impl<I2C: I2c, D: DelayNs> Lis2dh12<I2C, D> {
    pub fn new(i2c: I2C, delay: D) -> Self {
        Self::with_address(i2c, delay, LIS2DH12_ADDRESS)
    }

    pub fn with_address(i2c: I2C, delay: D, address: u8) -> Self {
        Self {
            bus: RegisterBus::new(i2c, address),
            delay,
            mode: Mode::Sleep,
            rate_hz: 10,
            resolution: DEFAULT_RESOLUTION_BITS,
            scale: DEFAULT_SCALE_G,
            dsp: (Dsp::Last, 0),
            initialized: false,
        }
    }

    /// Give the bus and delay back.
    pub fn release(self) -> (I2C, D) {
        (self.bus.release(), self.delay)
    }

    /// Apply the accelerometer part of a configuration.
    pub fn configure(&mut self, config: &TagConfig) -> Result<()> {
        let mut acc = ErrorAccumulator::new();
        acc.record(self.samplerate_set(SampleRate::Hz(config.accel_samplerate_hz)));
        acc.record(self.scale_set(Setting::Value(config.accel_scale_g)));
        acc.record(self.resolution_set(Setting::Value(config.accel_resolution_bits)));
        acc.finish()
    }

    fn require_init(&self) -> Result<()> {
        if self.initialized {
            Ok(())
        } else {
            Err(Error::InvalidState)
        }
    }

    fn odr_field(hz: u8) -> u8 {
        RATES
            .iter()
            .find(|(r, _)| *r == hz)
            .map(|(_, odr)| *odr)
            .unwrap_or(0)
    }

    fn write_odr(&mut self, hz: u8) -> Result<()> {
        self.bus
            .modify_reg(CTRL_REG1, ODR_MASK, Self::odr_field(hz) << 4)
    }

    /// Wait long enough for one sample at `hz`.
    fn settle(&mut self, hz: u8) {
        let hz = if hz == RATE_400_HZ { 400 } else { u32::from(hz.max(1)) };
        self.delay.delay_ms(1000_u32.div_ceil(hz) + TURN_ON_MS);
    }
}

impl<I2C: I2c, D: DelayNs> Sensor for Lis2dh12<I2C, D> {
    type Data = Axis3;

    fn init(&mut self) -> Result<()> {
        let id = self.bus.read_reg(WHO_AM_I).unwrap_or(0);
        if id != DEVICE_ID {
            log::error!("lis2dh12: not found (WHO_AM_I 0x{:02X})", id);
            return Err(Error::NotFound);
        }

        self.bus.modify_reg(CTRL_REG5, BOOT, BOOT)?;
        self.delay.delay_ms(BOOT_MS);

        self.resolution = DEFAULT_RESOLUTION_BITS;
        self.scale = DEFAULT_SCALE_G;
        self.dsp = (Dsp::Last, 0);
        self.mode = Mode::Sleep;

        let mut acc = ErrorAccumulator::new();
        acc.record(self.bus.write_reg(CTRL_REG1, XYZ_EN));
        acc.record(self.bus.write_reg(CTRL_REG2, 0));
        acc.record(self.bus.write_reg(CTRL_REG4, BDU));
        acc.finish()?;

        self.initialized = true;
        log::info!("lis2dh12: ready at 0x{:02X}", self.bus.address());
        Ok(())
    }

    fn uninit(&mut self) -> Result<()> {
        if !self.initialized {
            return Ok(());
        }
        self.initialized = false;
        self.mode = Mode::Sleep;
        self.write_odr(0)
    }

    fn samplerate_set(&mut self, rate: SampleRate) -> Result<()> {
        self.require_init()?;
        let hz = match rate {
            SampleRate::NoChange => return Ok(()),
            SampleRate::Stop => 0,
            SampleRate::Min => RATES[0].0,
            SampleRate::Max => RATE_400_HZ,
            SampleRate::Hz(req) => RATES
                .iter()
                .map(|(r, _)| *r)
                .find(|&r| req <= r)
                .ok_or(Error::NotSupported)?,
        };
        self.rate_hz = hz;
        if hz == 0 {
            self.mode = Mode::Sleep;
            return self.write_odr(0);
        }
        if self.mode == Mode::Continuous {
            self.write_odr(hz)?;
        }
        Ok(())
    }

    fn samplerate_get(&mut self) -> Result<SampleRate> {
        self.require_init()?;
        Ok(match self.rate_hz {
            0 => SampleRate::Stop,
            hz => SampleRate::Hz(hz),
        })
    }

    fn resolution_set(&mut self, resolution: Setting) -> Result<()> {
        self.require_init()?;
        let Some(bits) = round_up(&RESOLUTIONS, resolution, DEFAULT_RESOLUTION_BITS)? else {
            return Ok(());
        };
        let (lpen, hr) = match bits {
            8 => (LPEN, 0),
            12 => (0, HR),
            _ => (0, 0),
        };
        let mut acc = ErrorAccumulator::new();
        acc.record(self.bus.modify_reg(CTRL_REG1, LPEN, lpen));
        acc.record(self.bus.modify_reg(CTRL_REG4, HR, hr));
        acc.finish()?;
        self.resolution = bits;
        Ok(())
    }

    fn resolution_get(&mut self) -> Result<u8> {
        self.require_init()?;
        Ok(self.resolution)
    }

    fn scale_set(&mut self, scale: Setting) -> Result<()> {
        self.require_init()?;
        let Some(g) = round_up(&SCALES, scale, DEFAULT_SCALE_G)? else {
            return Ok(());
        };
        let fs = SCALES.iter().position(|&s| s == g).unwrap_or(0) as u8;
        self.bus.modify_reg(CTRL_REG4, FS_MASK, fs << 4)?;
        self.scale = g;
        Ok(())
    }

    fn scale_get(&mut self) -> Result<u8> {
        self.require_init()?;
        Ok(self.scale)
    }

    fn dsp_set(&mut self, dsp: Dsp, parameter: u8) -> Result<()> {
        self.require_init()?;
        let reg2 = match dsp {
            Dsp::Last => 0,
            Dsp::HighPass if parameter <= HIGH_PASS_MAX => (parameter << 4) | FDS,
            Dsp::HighPass => return Err(Error::InvalidParam),
            Dsp::LowPass | Dsp::Average => return Err(Error::NotSupported),
        };
        self.bus
            .modify_reg(CTRL_REG2, HPM_MASK | HPCF_MASK | FDS, reg2)?;
        self.dsp = (dsp, if dsp == Dsp::Last { 0 } else { parameter });
        Ok(())
    }

    fn dsp_get(&mut self) -> Result<(Dsp, u8)> {
        self.require_init()?;
        Ok(self.dsp)
    }

    fn mode_set(&mut self, mode: Mode) -> Result<()> {
        self.require_init()?;
        match mode {
            Mode::Sleep => {
                self.mode = Mode::Sleep;
                self.write_odr(0)
            }
            Mode::SingleAsynchronous => Err(Error::NotSupported),
            Mode::SingleBlocking => {
                let hz = if self.rate_hz == 0 { RATE_400_HZ } else { self.rate_hz };
                self.mode = Mode::Sleep;
                self.write_odr(hz)?;
                self.settle(hz);
                self.write_odr(0)
            }
            Mode::Continuous => {
                if self.rate_hz == 0 {
                    return Err(Error::InvalidState);
                }
                self.write_odr(self.rate_hz)?;
                self.mode = Mode::Continuous;
                Ok(())
            }
        }
    }

    fn mode_get(&self) -> Result<Mode> {
        self.require_init()?;
        Ok(self.mode)
    }

    fn data_get(&mut self) -> Result<Axis3> {
        self.require_init()?;
        let mut raw = [0u8; 6];
        self.bus.read_regs(OUT_X_L | AUTO_INCREMENT, &mut raw)?;
        let shift = 16 - u32::from(self.resolution);
        let mg = sensitivity_mg(self.resolution, self.scale);
        let axis = |i: usize| {
            let counts = i16::from_le_bytes([raw[i], raw[i + 1]]) >> shift;
            f32::from(counts) * mg
        };
        Ok(Axis3 {
            x: axis(0),
            y: axis(2),
            z: axis(4),
        })
    }
}
