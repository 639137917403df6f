//! LIS2MDL three-axis magnetometer.
//!
//! Fixed ±50 gauss range, 16-bit output at 1.5 mG/LSB.  Rates 10, 20, 50
//! and 100 Hz.  Offset cancellation runs every ODR and temperature
//! compensation is always on.

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;

use super::bus::RegisterBus;
use super::{Axis3, Dsp, Mode, SampleRate, Sensor, Setting};
use crate::error::{Error, ErrorAccumulator, Result};

pub const LIS2MDL_ADDRESS: u8 = 0x1E;

const WHO_AM_I: u8 = 0x4F;
const DEVICE_ID: u8 = 0x40;
const CFG_REG_A: u8 = 0x60;
const CFG_REG_B: u8 = 0x61;
const CFG_REG_C: u8 = 0x62;
const OUTX_L_REG: u8 = 0x68;

// CFG_REG_A
const COMP_TEMP_EN: u8 = 1 << 7;
const SOFT_RST: u8 = 1 << 5;
const ODR_MASK: u8 = 0b0000_1100;
const MD_MASK: u8 = 0b0000_0011;
const MD_CONTINUOUS: u8 = 0b00;
const MD_SINGLE: u8 = 0b01;
const MD_IDLE: u8 = 0b11;

// CFG_REG_B
const OFF_CANC: u8 = 1 << 1;

// CFG_REG_C
const BDU: u8 = 1 << 4;

const MG_PER_LSB: f32 = 1.5;
const SCALE_GAUSS: u8 = 50;
const RESOLUTION_BITS: u8 = 16;

/// Wait after a single-shot trigger.
const SINGLE_SETTLE_MS: u32 = 10;
const RESET_POLL_LIMIT: u32 = 10;

const RATES_HZ: [u8; 4] = [10, 20, 50, 100];

fn odr_bits(hz: u8) -> u8 {
    let index = RATES_HZ.iter().position(|&r| r == hz).unwrap_or(0);
    (index as u8) << 2
}

pub struct Lis2mdl<I2C, D> {
    bus: RegisterBus<I2C>,
    delay: D,
    mode: Mode,
    initialized: bool,
}

impl<I2C: I2c, D: DelayNs> Lis2mdl<I2C, D> {
    pub fn new(i2c: I2C, delay: D) -> Self {
        Self::with_address(i2c, delay, LIS2MDL_ADDRESS)
    }

    pub fn with_address(i2c: I2C, delay: D, address: u8) -> Self {
        Self {
            bus: RegisterBus::new(i2c, address),
            delay,
            mode: Mode::Sleep,
            initialized: false,
        }
    }

    /// Give the bus and delay back.
    pub fn release(self) -> (I2C, D) {
        (self.bus.release(), self.delay)
    }

    fn require_init(&self) -> Result<()> {
        if self.initialized {
            Ok(())
        } else {
            Err(Error::InvalidState)
        }
    }

    fn set_md(&mut self, md: u8) -> Result<()> {
        self.bus.modify_reg(CFG_REG_A, MD_MASK, md)
    }

    fn soft_reset(&mut self) -> Result<()> {
        self.bus.write_reg(CFG_REG_A, SOFT_RST)?;
        for _ in 0..RESET_POLL_LIMIT {
            if self.bus.read_reg(CFG_REG_A)? & SOFT_RST == 0 {
                return Ok(());
            }
            self.delay.delay_ms(1);
        }
        log::error!("lis2mdl: soft reset did not complete");
        Err(Error::Timeout)
    }
}

impl<I2C: I2c, D: DelayNs> Sensor for Lis2mdl<I2C, D> {
    type Data = Axis3;

    fn init(&mut self) -> Result<()> {
        let id = self.bus.read_reg(WHO_AM_I).unwrap_or(0);
        if id != DEVICE_ID {
            log::error!("lis2mdl: not found (WHO_AM_I 0x{:02X})", id);
            return Err(Error::NotFound);
        }
        self.soft_reset()?;

        let mut acc = ErrorAccumulator::new();
        acc.record(self.bus.modify_reg(CFG_REG_C, BDU, 0));
        acc.record(self.bus.modify_reg(CFG_REG_A, ODR_MASK, odr_bits(10)));
        acc.record(self.bus.modify_reg(CFG_REG_B, OFF_CANC, OFF_CANC));
        acc.record(self.bus.modify_reg(CFG_REG_A, COMP_TEMP_EN, COMP_TEMP_EN));
        acc.record(self.set_md(MD_IDLE));
        self.mode = Mode::Sleep;
        acc.finish()?;

        self.initialized = true;
        log::info!("lis2mdl: ready at 0x{:02X}", self.bus.address());
        Ok(())
    }

    fn uninit(&mut self) -> Result<()> {
        if !self.initialized {
            return Ok(());
        }
        self.initialized = false;
        self.mode = Mode::Sleep;
        self.set_md(MD_IDLE)
    }

    fn samplerate_set(&mut self, rate: SampleRate) -> Result<()> {
        self.require_init()?;
        let hz = match rate {
            SampleRate::NoChange => return Ok(()),
            SampleRate::Stop => {
                self.mode = Mode::Sleep;
                return self.set_md(MD_IDLE);
            }
            SampleRate::Min => RATES_HZ[0],
            SampleRate::Max => RATES_HZ[RATES_HZ.len() - 1],
            SampleRate::Hz(req) => RATES_HZ
                .iter()
                .copied()
                .find(|&r| req <= r)
                .ok_or(Error::NotSupported)?,
        };
        self.bus.modify_reg(CFG_REG_A, ODR_MASK, odr_bits(hz))?;
        if self.mode == Mode::Continuous {
            self.set_md(MD_CONTINUOUS)?;
        }
        Ok(())
    }

    fn samplerate_get(&mut self) -> Result<SampleRate> {
        self.require_init()?;
        let cfg = self.bus.read_reg(CFG_REG_A)?;
        let index = usize::from((cfg & ODR_MASK) >> 2);
        Ok(SampleRate::Hz(RATES_HZ[index]))
    }

    fn resolution_set(&mut self, _resolution: Setting) -> Result<()> {
        Err(Error::NotSupported)
    }

    fn resolution_get(&mut self) -> Result<u8> {
        self.require_init()?;
        Ok(RESOLUTION_BITS)
    }

    fn scale_set(&mut self, _scale: Setting) -> Result<()> {
        Err(Error::NotSupported)
    }

    fn scale_get(&mut self) -> Result<u8> {
        self.require_init()?;
        Ok(SCALE_GAUSS)
    }

    fn dsp_set(&mut self, _dsp: Dsp, _parameter: u8) -> Result<()> {
        Err(Error::NotImplemented)
    }

    fn dsp_get(&mut self) -> Result<(Dsp, u8)> {
        Err(Error::NotImplemented)
    }

    fn mode_set(&mut self, mode: Mode) -> Result<()> {
        self.require_init()?;
        match mode {
            Mode::Sleep => {
                self.mode = Mode::Sleep;
                self.set_md(MD_IDLE)
            }
            Mode::SingleAsynchronous => {
                self.mode = Mode::Sleep;
                self.set_md(MD_SINGLE)
            }
            Mode::SingleBlocking => {
                self.mode = Mode::Sleep;
                self.set_md(MD_SINGLE)?;
                self.delay.delay_ms(SINGLE_SETTLE_MS);
                Ok(())
            }
            Mode::Continuous => {
                self.set_md(MD_CONTINUOUS)?;
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
        self.bus.read_regs(OUTX_L_REG, &mut raw)?;
        let axis = |i: usize| f32::from(i16::from_le_bytes([raw[i], raw[i + 1]])) * MG_PER_LSB;
        Ok(Axis3 {
            x: axis(0),
            y: axis(2),
            z: axis(4),
        })
    }
}
