//! Advertising transport end to end: channel, interrupt-shared queue and
//! the simulated radio delivering advertising events.
//!
//! Tests run in parallel threads, so each one owns its queue, handler and
//! counter statics.

use std::sync::atomic::{AtomicUsize, Ordering};

use sensortag::adapters::radio::{BleRadio, RadioCall};
use sensortag::comms::advdata::ADV_MTU;
use sensortag::comms::advertising::{AdvState, AdvertisementQueue, AdvertisingChannel};
use sensortag::comms::{Channel, Message, Repeat, outbox};
use sensortag::config::TagConfig;
use sensortag::error::Error;

const ADDRESS: u64 = 0xC0FF_EE00_BEEF;

fn channel<const N: usize>(
    queue: &'static AdvertisementQueue<N>,
    handler: fn(bool),
) -> AdvertisingChannel<'static, BleRadio, N> {
    AdvertisingChannel::new(queue, BleRadio::new(), handler, &TagConfig::default(), ADDRESS)
}

// ── Drain scenario ────────────────────────────────────────────

static DRAIN_Q: AdvertisementQueue<5> = AdvertisementQueue::new();
static DRAIN_TX: AtomicUsize = AtomicUsize::new(0);

fn drain_handler(active: bool) {
    DRAIN_Q.on_radio_notification(active);
}

fn drain_on_tx() {
    DRAIN_TX.fetch_add(1, Ordering::SeqCst);
}

#[test]
fn four_single_shots_and_a_beacon_leave_the_beacon() {
    let mut ch = channel(&DRAIN_Q, drain_handler);
    ch.init().unwrap();
    ch.set_on_tx(Some(drain_on_tx)).unwrap();

    for i in 0..4u8 {
        ch.message_put(&Message::new(&[i; 4])).unwrap();
    }
    ch.message_put(&Message::forever(b"beacon")).unwrap();
    assert_eq!(ch.queued(), 5);
    assert_eq!(ch.message_put(&Message::new(b"x")), Err(Error::NoMemory));

    ch.process_asynchronous().unwrap();
    assert_eq!(ch.state(), AdvState::Advertising);

    for _ in 0..5 {
        assert!(ch.radio().advertising_event());
        ch.process_asynchronous().unwrap();
    }
    assert_eq!(ch.queued(), 1);
    assert_eq!(DRAIN_TX.load(Ordering::SeqCst), 5);

    // The beacon cycles and stays on air.
    for _ in 0..3 {
        assert!(ch.radio().advertising_event());
        ch.process_asynchronous().unwrap();
    }
    assert_eq!(ch.queued(), 1);
    assert_eq!(DRAIN_TX.load(Ordering::SeqCst), 8);
    let rec = ch.radio().last_configure().unwrap();
    assert!(rec.advertisement.ends_with(b"beacon"));
    assert_eq!(rec.params, None);

    ch.uninit().unwrap();
    assert_eq!(ch.state(), AdvState::Uninitialized);
    assert!(DRAIN_Q.is_empty());
}

// ── Repeat counts ─────────────────────────────────────────────

static REPEAT_Q: AdvertisementQueue<4> = AdvertisementQueue::new();

fn repeat_handler(active: bool) {
    REPEAT_Q.on_radio_notification(active);
}

#[test]
fn repeated_message_is_sent_count_plus_one_times() {
    let mut ch = channel(&REPEAT_Q, repeat_handler);
    ch.init().unwrap();
    ch.message_put(&Message::with_repeat(b"r", Repeat::Times(2)))
        .unwrap();
    ch.process_asynchronous().unwrap();

    let mut events = 0;
    while ch.queued() > 0 {
        assert!(ch.radio().advertising_event());
        events += 1;
        assert!(events <= 3);
    }
    assert_eq!(events, 3);

    // Empty queue: the event is a no-op.
    assert!(ch.radio().advertising_event());
    assert_eq!(REPEAT_Q.drains(), 3);
}

// ── Oversized payloads ────────────────────────────────────────

static BIG_Q: AdvertisementQueue<4> = AdvertisementQueue::new();

fn big_handler(active: bool) {
    BIG_Q.on_radio_notification(active);
}

#[test]
fn oversized_payload_is_refused_or_chunked() {
    let mut ch = channel(&BIG_Q, big_handler);
    ch.init().unwrap();

    let payload = [0x5Au8; ADV_MTU + 1];
    assert_eq!(
        ch.message_put(&Message::new(&payload)),
        Err(Error::InvalidLength)
    );
    assert_eq!(ch.queued(), 0);

    let (chunks, result) = outbox::put_chunked(&mut ch, &Message::new(&payload));
    assert_eq!((chunks, result), (2, Ok(())));
    assert_eq!(ch.queued(), 2);

    // Three chunks against two free slots: nothing of it repeats forever.
    let long = [0xA5u8; ADV_MTU * 3];
    let (chunks, result) = outbox::put_chunked(&mut ch, &Message::with_repeat(&long, Repeat::Forever));
    assert_eq!((chunks, result), (0, Err(Error::NoMemory)));
    assert_eq!(ch.queued(), 2);
}

// ── Lifecycle ─────────────────────────────────────────────────

static LIFE_Q: AdvertisementQueue<2> = AdvertisementQueue::new();

fn life_handler(active: bool) {
    LIFE_Q.on_radio_notification(active);
}

#[test]
fn lifecycle_and_radio_call_order() {
    let mut ch = channel(&LIFE_Q, life_handler);
    assert_eq!(ch.process_asynchronous(), Err(Error::InvalidState));
    assert_eq!(ch.message_put(&Message::new(b"a")), Err(Error::InvalidState));

    ch.init().unwrap();
    assert_eq!(ch.init(), Err(Error::InvalidState));
    ch.process_asynchronous().unwrap();
    ch.uninit().unwrap();

    let calls = ch.radio().calls();
    assert!(matches!(calls[0], RadioCall::EnableNotifications(_)));
    assert_eq!(
        &calls[1..],
        &[
            RadioCall::SetTxPower(0),
            RadioCall::Configure,
            RadioCall::Start,
            RadioCall::Stop,
            RadioCall::DisableNotifications,
        ]
    );

    // Re-init after uninit works.
    ch.init().unwrap();
    assert!(ch.is_connected());
}

#[test]
fn unsupported_operations() {
    static Q: AdvertisementQueue<1> = AdvertisementQueue::new();
    fn handler(active: bool) {
        Q.on_radio_notification(active);
    }
    let mut ch = channel(&Q, handler);
    ch.init().unwrap();
    let mut buf = [0u8; 8];
    assert_eq!(ch.message_get(&mut buf), Err(Error::NotSupported));
    assert_eq!(ch.process_synchronous(), Err(Error::NotSupported));
    assert_eq!(ch.set_on_connect(None), Err(Error::NotSupported));
    assert_eq!(ch.set_on_rx(None), Err(Error::NotSupported));
    assert_eq!(ch.mtu(), ADV_MTU);
}
