//! RAM-backed type-4 tag emulation.
//!
//! Implements [`TagEmulator`] with the NDEF file held in memory.  The
//! `reader_*` methods play the part of an external reader: they raise the
//! same events a tag library would, from the caller's context.

use crate::comms::nfc::NDEF_FILE_SIZE;
use crate::comms::ndef::NLEN_SIZE;
use crate::error::{Error, Result};
use crate::ports::{TagEmulator, TagEvent, TagEventHandler};

pub struct MemoryTag {
    file: [u8; NDEF_FILE_SIZE],
    handler: Option<TagEventHandler>,
    running: bool,
    field: bool,
}

impl MemoryTag {
    pub fn new() -> Self {
        Self {
            file: [0; NDEF_FILE_SIZE],
            handler: None,
            running: false,
            field: false,
        }
    }

    /// The whole NDEF file, NLEN included.
    pub fn file(&self) -> &[u8] {
        &self.file
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    fn emit(&self, event: TagEvent) {
        if let (true, Some(handler)) = (self.running, self.handler) {
            handler(event);
        }
    }

    /// A reader enters the field.
    pub fn reader_enter(&mut self) {
        if self.running && !self.field {
            self.field = true;
            self.emit(TagEvent::FieldOn);
        }
    }

    /// The reader leaves the field.
    pub fn reader_leave(&mut self) {
        if self.field {
            self.field = false;
            self.emit(TagEvent::FieldOff);
        }
    }

    /// The reader reads the NDEF message.  `None` without a field.
    pub fn reader_read(&self) -> Option<&[u8]> {
        if !self.field {
            return None;
        }
        let len = usize::from(u16::from_be_bytes([self.file[0], self.file[1]]));
        let msg = self.file.get(NLEN_SIZE..NLEN_SIZE + len)?;
        self.emit(TagEvent::NdefRead);
        Some(msg)
    }

    /// The reader writes `msg` the way phones do: NLEN zeroed first, then
    /// the message body, then the final NLEN.
    pub fn reader_write(&mut self, msg: &[u8]) -> Result<()> {
        if !self.field {
            return Err(Error::InvalidState);
        }
        if NLEN_SIZE + msg.len() > NDEF_FILE_SIZE {
            return Err(Error::InvalidLength);
        }
        self.file[..NLEN_SIZE].fill(0);
        self.emit(TagEvent::NdefUpdated(0));
        self.file[NLEN_SIZE..NLEN_SIZE + msg.len()].copy_from_slice(msg);
        self.file[..NLEN_SIZE].copy_from_slice(&(msg.len() as u16).to_be_bytes());
        self.emit(TagEvent::NdefUpdated(msg.len()));
        Ok(())
    }
}

impl Default for MemoryTag {
    fn default() -> Self {
        Self::new()
    }
}

impl TagEmulator for MemoryTag {
    fn setup(&mut self, handler: TagEventHandler) -> Result<()> {
        self.file.fill(0);
        self.handler = Some(handler);
        Ok(())
    }

    fn start(&mut self) -> Result<()> {
        if self.handler.is_none() {
            return Err(Error::InvalidState);
        }
        self.running = true;
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.reader_leave();
        self.running = false;
        self.handler = None;
        Ok(())
    }

    fn write_file(&mut self, file: &[u8]) -> Result<()> {
        if file.len() > NDEF_FILE_SIZE {
            return Err(Error::InvalidLength);
        }
        self.file[..file.len()].copy_from_slice(file);
        Ok(())
    }

    fn read_file(&self, buf: &mut [u8]) -> Result<usize> {
        let n = buf.len().min(NDEF_FILE_SIZE);
        buf[..n].copy_from_slice(&self.file[..n]);
        Ok(n)
    }

    fn file_capacity(&self) -> usize {
        NDEF_FILE_SIZE
    }
}
