//! Mock hardware for integration tests.
//!
//! Register-file I²C devices for the sensor drivers and a tag emulator that
//! records every file write, so tests can assert on the full history
//! without real hardware.

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::{ErrorKind, ErrorType, I2c, NoAcknowledgeSource, Operation};
use sensortag::error::{Error, Result};
use sensortag::ports::{TagEmulator, TagEvent, TagEventHandler};

// ── I²C register file ─────────────────────────────────────────

/// One I²C device modelled as 256 byte registers.  Register addresses
/// auto-increment across a burst; bit 7 of the address byte is ignored.
pub struct MockBus {
    pub address: u8,
    pub regs: [u8; 256],
    /// `(register, bits)` that read back as zero once written.
    pub self_clearing: Vec<(u8, u8)>,
    pub nack: bool,
}

#[allow(dead_code)]
impl MockBus {
    pub fn new(address: u8) -> Self {
        Self {
            address,
            regs: [0; 256],
            self_clearing: Vec::new(),
            nack: false,
        }
    }

    /// LIS2DH12 at its default address, identity register loaded.
    pub fn lis2dh12() -> Self {
        let mut bus = Self::new(0x19);
        bus.regs[0x0F] = 0x33;
        bus.self_clearing.push((0x24, 0x80));
        bus
    }

    /// LIS2MDL at its fixed address, identity register loaded.
    pub fn lis2mdl() -> Self {
        let mut bus = Self::new(0x1E);
        bus.regs[0x4F] = 0x40;
        bus.self_clearing.push((0x60, 0x20));
        bus
    }

    /// Load three little-endian 16-bit words starting at `reg`.
    pub fn load_axes(&mut self, reg: u8, raw: [i16; 3]) {
        for (i, v) in raw.iter().enumerate() {
            let [lo, hi] = v.to_le_bytes();
            self.regs[reg as usize + 2 * i] = lo;
            self.regs[reg as usize + 2 * i + 1] = hi;
        }
    }
}

impl ErrorType for MockBus {
    type Error = ErrorKind;
}

impl I2c for MockBus {
    fn transaction(&mut self, address: u8, operations: &mut [Operation<'_>]) -> core::result::Result<(), ErrorKind> {
        if self.nack || address != self.address {
            return Err(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address));
        }
        let mut at = 0u8;
        for op in operations {
            match op {
                Operation::Write(bytes) => {
                    let Some((&reg, data)) = bytes.split_first() else {
                        continue;
                    };
                    at = reg & 0x7F;
                    for &b in data.iter() {
                        let clear = self
                            .self_clearing
                            .iter()
                            .filter(|(r, _)| *r == at)
                            .fold(0, |m, (_, bits)| m | bits);
                        self.regs[at as usize] = b & !clear;
                        at = at.wrapping_add(1);
                    }
                }
                Operation::Read(buf) => {
                    for b in buf.iter_mut() {
                        *b = self.regs[at as usize];
                        at = at.wrapping_add(1);
                    }
                }
            }
        }
        Ok(())
    }
}

// ── Delay ─────────────────────────────────────────────────────

/// Returns immediately; keeps the total requested time.
#[derive(Default)]
pub struct NoopDelay {
    pub total_ns: u64,
}

#[allow(dead_code)]
impl NoopDelay {
    pub fn total_ms(&self) -> u64 {
        self.total_ns / 1_000_000
    }
}

impl DelayNs for NoopDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.total_ns += u64::from(ns);
    }
}

// ── Tag emulator ──────────────────────────────────────────────

/// Tag emulator that keeps every file written to it.
pub struct RecordingTag {
    pub writes: Vec<Vec<u8>>,
    pub fail_write: Option<Error>,
    /// What `read_file` returns: NLEN prefix plus message.
    pub file: Vec<u8>,
    handler: Option<TagEventHandler>,
    pub running: bool,
}

#[allow(dead_code)]
impl RecordingTag {
    pub fn new() -> Self {
        Self {
            writes: Vec::new(),
            fail_write: None,
            file: vec![0, 0],
            handler: None,
            running: false,
        }
    }

    /// Deliver `event` through the handler given at setup.
    pub fn emit(&self, event: TagEvent) {
        if let Some(handler) = self.handler {
            handler(event);
        }
    }

    pub fn last_write(&self) -> Option<&[u8]> {
        self.writes.last().map(Vec::as_slice)
    }
}

impl Default for RecordingTag {
    fn default() -> Self {
        Self::new()
    }
}

impl TagEmulator for RecordingTag {
    fn setup(&mut self, handler: TagEventHandler) -> Result<()> {
        self.handler = Some(handler);
        Ok(())
    }

    fn start(&mut self) -> Result<()> {
        self.running = true;
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.running = false;
        Ok(())
    }

    fn write_file(&mut self, file: &[u8]) -> Result<()> {
        if let Some(e) = self.fail_write.take() {
            return Err(e);
        }
        self.writes.push(file.to_vec());
        self.file = file.to_vec();
        Ok(())
    }

    fn read_file(&self, buf: &mut [u8]) -> Result<usize> {
        let n = buf.len().min(self.file.len());
        buf[..n].copy_from_slice(&self.file[..n]);
        Ok(n)
    }

    fn file_capacity(&self) -> usize {
        512
    }
}
