//! NFC tag transport against the RAM tag and the recording tag.

use std::sync::atomic::{AtomicUsize, Ordering};

use sensortag::adapters::nfc_tag::MemoryTag;
use sensortag::comms::ndef::{self, Record};
use sensortag::comms::nfc::{DATA_BUFFER_SIZE, NfcShared, NfcState, NfcTagChannel, TEXT_BUFFER_SIZE};
use sensortag::comms::{Channel, Message};
use sensortag::error::Error;
use sensortag::ports::TagEvent;

use crate::mock_hw::RecordingTag;

// ── Reader round trip ─────────────────────────────────────────

static TRIP: NfcShared = NfcShared::new();
static TRIP_RX: AtomicUsize = AtomicUsize::new(0);
static TRIP_TX: AtomicUsize = AtomicUsize::new(0);

fn trip_handler(event: TagEvent) {
    TRIP.on_tag_event(event);
}

fn trip_on_rx() {
    TRIP_RX.fetch_add(1, Ordering::SeqCst);
}

fn trip_on_tx() {
    TRIP_TX.fetch_add(1, Ordering::SeqCst);
}

#[test]
fn reader_sees_records_and_writes_back() {
    let mut ch = NfcTagChannel::new(&TRIP, MemoryTag::new(), trip_handler);
    ch.init().unwrap();
    ch.set_on_rx(Some(trip_on_rx)).unwrap();
    ch.set_on_tx(Some(trip_on_tx)).unwrap();

    ch.set_fw_version(Some(b"1.4.0"), 5).unwrap();
    ch.set_id(Some(b"tag-7"), 5).unwrap();
    ch.message_put(&Message::new(&[0xAA, 0xBB])).unwrap();

    // The reader reads what we wrote.
    ch.tag_mut().reader_enter();
    assert_eq!(ch.state(), NfcState::FieldPresent);
    let seen: Vec<_> = {
        let msg = ch.tag().reader_read().unwrap();
        ndef::records(msg).map(|r| r.payload.to_vec()).collect()
    };
    assert_eq!(TRIP_TX.load(Ordering::SeqCst), 1);
    assert_eq!(seen.len(), 3);
    assert_eq!(seen[2], vec![0xAA, 0xBB]);

    // The reader writes its own message; it can be fetched later.
    let mut reply = [0u8; 32];
    let n = ndef::encode_file(
        &[Record::Text {
            lang: *b"en",
            text: b"hello",
        }],
        &mut reply,
    )
    .unwrap();
    ch.tag_mut().reader_write(&reply[2..n]).unwrap();
    assert_eq!(TRIP_RX.load(Ordering::SeqCst), 1);

    ch.process_asynchronous().unwrap();
    ch.tag_mut().reader_leave();
    ch.process_asynchronous().unwrap();

    let mut buf = [0u8; 64];
    let got = ch.message_get(&mut buf).unwrap();
    assert_eq!(&buf[..got], &reply[2..n]);
    let text = ndef::records(&buf[..got]).next().unwrap().as_text();
    assert_eq!(text, Some((&b"en"[..], &b"hello"[..])));
    assert_eq!(ch.message_get(&mut buf), Err(Error::NotFound));
}

// ── Reader write followed by our own put ──────────────────────

static LEFT: NfcShared = NfcShared::new();

fn left_handler(event: TagEvent) {
    LEFT.on_tag_event(event);
}

#[test]
fn put_after_reader_leaves_keeps_reader_message() {
    let mut ch = NfcTagChannel::new(&LEFT, MemoryTag::new(), left_handler);
    ch.init().unwrap();

    let written = [0xD1, 0x01, 0x02, b'T', 0x02, b'e'];
    ch.tag_mut().reader_enter();
    ch.tag_mut().reader_write(&written).unwrap();
    ch.tag_mut().reader_leave();

    // No processing in between: the put itself replaces the tag file.
    ch.message_put(&Message::new(b"telemetry")).unwrap();
    let msg = ndef::file_message(ch.tag().file()).unwrap();
    assert_eq!(ndef::records(msg).next().map(|r| r.payload), Some(&b"telemetry"[..]));

    let mut buf = [0u8; 64];
    assert_eq!(ch.message_get(&mut buf), Ok(written.len()));
    assert_eq!(&buf[..written.len()], &written);
}

// ── Write while a reader is present ───────────────────────────

static BUSY: NfcShared = NfcShared::new();

fn busy_handler(event: TagEvent) {
    BUSY.on_tag_event(event);
}

#[test]
fn write_during_field_is_deferred() {
    let mut ch = NfcTagChannel::new(&BUSY, RecordingTag::new(), busy_handler);
    ch.init().unwrap();
    ch.message_put(&Message::new(b"one")).unwrap();
    assert_eq!(ch.tag().writes.len(), 1);

    ch.tag().emit(TagEvent::FieldOn);
    assert!(ch.is_connected());
    assert_eq!(ch.message_put(&Message::new(b"two")), Err(Error::InvalidState));
    assert!(ch.pending_rewrite());
    ch.process_asynchronous().unwrap();
    assert_eq!(ch.tag().writes.len(), 1);

    ch.tag().emit(TagEvent::FieldOff);
    ch.process_asynchronous().unwrap();
    assert!(!ch.pending_rewrite());
    assert_eq!(ch.tag().writes.len(), 2);
    let file = ch.tag().last_write().unwrap();
    let msg = ndef::file_message(file).unwrap();
    let rec = ndef::records(msg).last().unwrap();
    assert_eq!(rec.payload, b"two");
}

// ── Non-configurable tag ──────────────────────────────────────

static LOCKED: NfcShared = NfcShared::new();

fn locked_handler(event: TagEvent) {
    LOCKED.on_tag_event(event);
}

#[test]
fn reader_write_is_overwritten_when_not_configurable() {
    let mut ch = NfcTagChannel::new(&LOCKED, MemoryTag::new(), locked_handler);
    ch.init().unwrap();
    ch.set_configurable(false);
    ch.set_address(Some(b"C0:FF:EE"), 8).unwrap();
    ch.process_asynchronous().unwrap();

    ch.tag_mut().reader_enter();
    ch.tag_mut().reader_write(&[0xD0, 0, 0]).unwrap();
    assert!(ch.pending_rewrite());
    ch.tag_mut().reader_leave();
    ch.process_asynchronous().unwrap();

    let msg = ndef::file_message(ch.tag().file()).unwrap();
    let (lang, text) = ndef::records(msg).next().unwrap().as_text().unwrap();
    assert_eq!((lang, text), (&b"ad"[..], &b"C0:FF:EE"[..]));
}

// ── Setter rules ──────────────────────────────────────────────

static SETTERS: NfcShared = NfcShared::new();

fn setters_handler(event: TagEvent) {
    SETTERS.on_tag_event(event);
}

#[test]
fn record_setters_validate_length_and_presence() {
    let mut ch = NfcTagChannel::new(&SETTERS, RecordingTag::new(), setters_handler);
    ch.init().unwrap();

    let long = [b'x'; TEXT_BUFFER_SIZE];
    assert_eq!(ch.set_id(Some(&long), TEXT_BUFFER_SIZE), Err(Error::InvalidLength));
    assert_eq!(ch.set_id(None, 3), Err(Error::Null));
    assert_eq!(ch.set_id(Some(b"ab"), 3), Err(Error::InvalidLength));
    assert_eq!(ch.set_id(None, 0), Ok(()));
    assert_eq!(ch.set_id(Some(&long), TEXT_BUFFER_SIZE - 1), Ok(()));

    let data = [0u8; DATA_BUFFER_SIZE];
    assert_eq!(ch.message_put(&Message::new(&data)), Err(Error::InvalidLength));
    assert_eq!(ch.mtu(), DATA_BUFFER_SIZE - 1);
    assert_eq!(ch.process_synchronous(), Err(Error::NotSupported));
}

// ── Adapter failure ───────────────────────────────────────────

static FAULTY: NfcShared = NfcShared::new();

fn faulty_handler(event: TagEvent) {
    FAULTY.on_tag_event(event);
}

#[test]
fn failed_file_write_stays_pending() {
    let mut tag = RecordingTag::new();
    tag.fail_write = Some(Error::Internal);
    let mut ch = NfcTagChannel::new(&FAULTY, tag, faulty_handler);
    ch.init().unwrap();

    assert_eq!(ch.message_put(&Message::new(b"p")), Err(Error::Internal));
    assert!(ch.pending_rewrite());
    ch.process_asynchronous().unwrap();
    assert!(!ch.pending_rewrite());
    assert_eq!(ch.tag().writes.len(), 1);

    ch.uninit().unwrap();
    assert!(!ch.tag().running);
    assert_eq!(ch.state(), NfcState::Uninitialized);
}
