//! Motion sensors behind one capability trait.
//!
//! Every driver exposes the same set of operations.  Capabilities a chip
//! lacks answer `NotSupported` (or `NotImplemented` when reserved), never a
//! silent success.
//!
//! ## Mode state machine
//!
//! ```text
//!   Sleep ◀──────────────▶ Continuous
//!     │  ▲
//!     │  └── one sample ── SingleAsynchronous / SingleBlocking
//!     └──────────────────▶
//! ```
//!
//! The single modes are transient: they trigger one measurement and the
//! driver reports `Sleep` right after.  `SingleBlocking` also waits for the
//! sample to settle before returning.

pub mod bus;
pub mod lis2dh12;
pub mod lis2mdl;

use crate::error::Result;

/// Requested sample rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleRate {
    NoChange,
    /// Power the measurement down.
    Stop,
    Min,
    Max,
    /// At least this many samples per second; rounded up to the next rate
    /// the chip supports.
    Hz(u8),
}

/// Requested resolution or scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Setting {
    NoChange,
    Min,
    Max,
    Default,
    /// Rounded up to the next value the chip supports.
    Value(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Sleep,
    SingleAsynchronous,
    SingleBlocking,
    Continuous,
}

/// On-chip signal processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dsp {
    /// Raw last sample.
    Last,
    HighPass,
    LowPass,
    Average,
}

/// Three-axis sample.  Units depend on the sensor: milli-g for
/// acceleration, milligauss for the magnetic field.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Axis3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

pub trait Sensor {
    type Data;

    /// Probe the chip and load the default configuration.  Leaves the
    /// sensor in `Sleep`.
    fn init(&mut self) -> Result<()>;

    /// Power the chip down.
    fn uninit(&mut self) -> Result<()>;

    fn samplerate_set(&mut self, rate: SampleRate) -> Result<()>;

    /// Current rate, `Hz(n)` or `Stop`.
    fn samplerate_get(&mut self) -> Result<SampleRate>;

    fn resolution_set(&mut self, resolution: Setting) -> Result<()>;

    /// Bits per sample.
    fn resolution_get(&mut self) -> Result<u8>;

    fn scale_set(&mut self, scale: Setting) -> Result<()>;

    /// Full-scale range in the sensor's natural unit (g or gauss).
    fn scale_get(&mut self) -> Result<u8>;

    fn dsp_set(&mut self, dsp: Dsp, parameter: u8) -> Result<()>;

    fn dsp_get(&mut self) -> Result<(Dsp, u8)>;

    fn mode_set(&mut self, mode: Mode) -> Result<()>;

    fn mode_get(&self) -> Result<Mode>;

    /// Latest sample.
    fn data_get(&mut self) -> Result<Self::Data>;
}
