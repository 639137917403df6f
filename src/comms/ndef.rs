//! NDEF message encoding for the type-4 tag file.
//!
//! File layout (type-4 tag): a 2-byte big-endian NLEN followed by the NDEF
//! message.  Each record:
//!
//! ```text
//! ┌────────┬──────────┬─────────────────┬──────┬─────────┐
//! │ header │ type_len │ payload_len     │ type │ payload │
//! │ 1 B    │ 1 B      │ 1 B (SR) or 4 B │      │         │
//! └────────┴──────────┴─────────────────┴──────┴─────────┘
//! header = MB | ME | CF | SR | IL | TNF(3 bits)
//! ```

use crate::error::{Error, Result};

/// Size of the NLEN prefix of the tag file.
pub const NLEN_SIZE: usize = 2;

pub const TNF_EMPTY: u8 = 0x00;
pub const TNF_WELL_KNOWN: u8 = 0x01;
pub const TNF_MEDIA_TYPE: u8 = 0x02;

const FLAG_MB: u8 = 0x80;
const FLAG_ME: u8 = 0x40;
const FLAG_CF: u8 = 0x20;
const FLAG_SR: u8 = 0x10;
const FLAG_IL: u8 = 0x08;
const TNF_MASK: u8 = 0x07;

/// Well-known type of a text record.
pub const TEXT_RECORD_TYPE: &[u8] = b"T";

/// Text status byte: UTF-8, language code length in the low six bits.
const TEXT_STATUS_UTF8: u8 = 0x00;

/// One record to encode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Record<'a> {
    /// Well-known text record, UTF-8, with a two-letter language code.
    Text { lang: [u8; 2], text: &'a [u8] },
    /// Media-type record carrying opaque bytes.
    Media { media_type: &'a [u8], payload: &'a [u8] },
}

impl Record<'_> {
    fn tnf(&self) -> u8 {
        match self {
            Self::Text { .. } => TNF_WELL_KNOWN,
            Self::Media { .. } => TNF_MEDIA_TYPE,
        }
    }

    fn record_type(&self) -> &[u8] {
        match self {
            Self::Text { .. } => TEXT_RECORD_TYPE,
            Self::Media { media_type, .. } => media_type,
        }
    }

    fn payload_len(&self) -> usize {
        match self {
            Self::Text { lang, text } => 1 + lang.len() + text.len(),
            Self::Media { payload, .. } => payload.len(),
        }
    }

    /// Encoded size of this record.
    pub fn encoded_len(&self) -> usize {
        let len_field = if self.payload_len() < 256 { 1 } else { 4 };
        2 + len_field + self.record_type().len() + self.payload_len()
    }
}

/// Sequential writer over the output buffer.
struct Cursor<'b> {
    out: &'b mut [u8],
    at: usize,
}

impl Cursor<'_> {
    fn put(&mut self, bytes: &[u8]) -> Result<()> {
        let end = self.at + bytes.len();
        let dst = self.out.get_mut(self.at..end).ok_or(Error::InvalidLength)?;
        dst.copy_from_slice(bytes);
        self.at = end;
        Ok(())
    }
}

/// Encode `records` as a tag file (NLEN prefix included) into `out`.
/// Returns the number of bytes written.  An empty record list produces
/// an empty message, `NLEN = 0`.
pub fn encode_file(records: &[Record<'_>], out: &mut [u8]) -> Result<usize> {
    let body: usize = records.iter().map(Record::encoded_len).sum();
    if body > usize::from(u16::MAX) || NLEN_SIZE + body > out.len() {
        return Err(Error::InvalidLength);
    }

    let mut cur = Cursor { out, at: 0 };
    cur.put(&(body as u16).to_be_bytes())?;

    let last = records.len().saturating_sub(1);
    for (i, rec) in records.iter().enumerate() {
        let payload_len = rec.payload_len();
        let short = payload_len < 256;

        let mut header = rec.tnf();
        if i == 0 {
            header |= FLAG_MB;
        }
        if i == last {
            header |= FLAG_ME;
        }
        if short {
            header |= FLAG_SR;
        }
        cur.put(&[header, rec.record_type().len() as u8])?;
        if short {
            cur.put(&[payload_len as u8])?;
        } else {
            cur.put(&(payload_len as u32).to_be_bytes())?;
        }
        cur.put(rec.record_type())?;

        match rec {
            Record::Text { lang, text } => {
                cur.put(&[TEXT_STATUS_UTF8 | lang.len() as u8])?;
                cur.put(lang)?;
                cur.put(text)?;
            }
            Record::Media { payload, .. } => cur.put(payload)?,
        }
    }
    Ok(cur.at)
}

// ── Parsing ──────────────────────────────────────────────────

/// A record borrowed from a received message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordView<'a> {
    pub tnf: u8,
    pub record_type: &'a [u8],
    pub id: &'a [u8],
    pub payload: &'a [u8],
}

impl<'a> RecordView<'a> {
    /// Language code and text of a well-known text record.
    pub fn as_text(&self) -> Option<(&'a [u8], &'a [u8])> {
        if self.tnf != TNF_WELL_KNOWN || self.record_type != TEXT_RECORD_TYPE {
            return None;
        }
        let (&status, rest) = self.payload.split_first()?;
        let lang_len = usize::from(status & 0x3F);
        if rest.len() < lang_len {
            return None;
        }
        Some(rest.split_at(lang_len))
    }
}

/// Iterator over the records of an NDEF message (without NLEN).
/// Stops at the first malformed or chunked record.
pub struct Records<'a> {
    msg: &'a [u8],
    done: bool,
}

/// Split a tag file into its NDEF message, honouring NLEN.
pub fn file_message(file: &[u8]) -> Result<&[u8]> {
    let nlen = file.get(..NLEN_SIZE).ok_or(Error::InvalidLength)?;
    let len = usize::from(u16::from_be_bytes([nlen[0], nlen[1]]));
    file.get(NLEN_SIZE..NLEN_SIZE + len)
        .ok_or(Error::InvalidLength)
}

pub fn records(msg: &[u8]) -> Records<'_> {
    Records {
        msg,
        done: msg.is_empty(),
    }
}

impl<'a> Records<'a> {
    fn take(&mut self, n: usize) -> Option<&'a [u8]> {
        if self.msg.len() < n {
            return None;
        }
        let (head, tail) = self.msg.split_at(n);
        self.msg = tail;
        Some(head)
    }

    fn next_record(&mut self) -> Option<(RecordView<'a>, bool)> {
        let header = *self.take(1)?.first()?;
        if header & FLAG_CF != 0 {
            return None;
        }
        let type_len = usize::from(*self.take(1)?.first()?);
        let payload_len = if header & FLAG_SR != 0 {
            usize::from(*self.take(1)?.first()?)
        } else {
            let b = self.take(4)?;
            u32::from_be_bytes([b[0], b[1], b[2], b[3]]) as usize
        };
        let id_len = if header & FLAG_IL != 0 {
            usize::from(*self.take(1)?.first()?)
        } else {
            0
        };
        let record_type = self.take(type_len)?;
        let id = self.take(id_len)?;
        let payload = self.take(payload_len)?;
        Some((
            RecordView {
                tnf: header & TNF_MASK,
                record_type,
                id,
                payload,
            },
            header & FLAG_ME != 0,
        ))
    }
}

impl<'a> Iterator for Records<'a> {
    type Item = RecordView<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_record() {
            Some((rec, last)) => {
                self.done = last || self.msg.is_empty();
                Some(rec)
            }
            None => {
                self.done = true;
                None
            }
        }
    }
}
