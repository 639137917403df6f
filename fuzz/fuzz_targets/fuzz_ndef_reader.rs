//! Fuzz target: NFC reader writes
//!
//! Treats the input as an NDEF message written by an external reader.  The
//! message goes through the RAM tag into the NFC channel, is fetched with
//! `message_get` and parsed.  Nothing may panic, and the fetched bytes must
//! be exactly what the reader wrote.
//!
//! cargo fuzz run fuzz_ndef_reader

#![no_main]

use libfuzzer_sys::fuzz_target;
use sensortag::adapters::nfc_tag::MemoryTag;
use sensortag::comms::nfc::{NfcShared, NfcTagChannel};
use sensortag::comms::{Channel, Message, ndef};
use sensortag::ports::TagEvent;

static SHARED: NfcShared = NfcShared::new();

fn on_tag(event: TagEvent) {
    SHARED.on_tag_event(event);
}

fuzz_target!(|data: &[u8]| {
    let mut ch = NfcTagChannel::new(&SHARED, MemoryTag::new(), on_tag);
    if ch.init().is_err() {
        return;
    }

    // The first bytes double as record content for the setters.
    let split = data.len().min(40);
    let _ = ch.set_id(Some(&data[..split]), split);
    let _ = ch.message_put(&Message::new(&data[..split]));

    ch.tag_mut().reader_enter();
    // An empty write only zeroes NLEN and is not reported as received.
    if !data.is_empty() && ch.tag_mut().reader_write(data).is_ok() {
        ch.tag_mut().reader_leave();
        let _ = ch.process_asynchronous();

        let mut buf = [0u8; 512];
        let n = ch.message_get(&mut buf).expect("reader write must be received");
        assert_eq!(&buf[..n], data);
        for rec in ndef::records(&buf[..n]) {
            assert!(rec.payload.len() <= n);
            let _ = rec.as_text();
        }
    }

    let _ = ch.uninit();
});
