//! One payload fanned out over every transport at once.

use sensortag::adapters::nfc_tag::MemoryTag;
use sensortag::adapters::radio::BleRadio;
use sensortag::comms::advertising::{AdvertisementQueue, AdvertisingChannel};
use sensortag::comms::loopback::LoopbackChannel;
use sensortag::comms::ndef;
use sensortag::comms::nfc::{NfcShared, NfcTagChannel};
use sensortag::comms::{Channel, Message, outbox};
use sensortag::config::TagConfig;
use sensortag::error::Error;
use sensortag::ports::TagEvent;

static ADV_Q: AdvertisementQueue<4> = AdvertisementQueue::new();
static NFC: NfcShared = NfcShared::new();

fn on_radio(active: bool) {
    ADV_Q.on_radio_notification(active);
}

fn on_tag(event: TagEvent) {
    NFC.on_tag_event(event);
}

#[test]
fn broadcast_reaches_every_transport() {
    let mut adv = AdvertisingChannel::new(&ADV_Q, BleRadio::new(), on_radio, &TagConfig::default(), 1);
    let mut nfc = NfcTagChannel::new(&NFC, MemoryTag::new(), on_tag);
    let mut lo = LoopbackChannel::<4>::new();
    adv.init().unwrap();
    nfc.init().unwrap();
    lo.init().unwrap();

    // Larger than the advertising MTU: split there, whole elsewhere.
    let payload: Vec<u8> = (0..40).collect();
    {
        let mut channels: [&mut dyn Channel; 3] = [&mut adv, &mut nfc, &mut lo];
        outbox::broadcast(&mut channels, &Message::new(&payload)).unwrap();
        outbox::process_all(&mut channels).unwrap();
    }

    assert_eq!(adv.queued(), 2);
    assert!(adv.radio().is_advertising());

    let msg = ndef::file_message(nfc.tag().file()).unwrap();
    assert_eq!(ndef::records(msg).last().unwrap().payload, &payload[..]);

    let mut buf = [0u8; 64];
    let n = lo.message_get(&mut buf).unwrap();
    assert_eq!(&buf[..n], &payload[..]);
}

#[test]
fn one_refusing_transport_does_not_block_the_others() {
    static Q: AdvertisementQueue<1> = AdvertisementQueue::new();
    fn radio(active: bool) {
        Q.on_radio_notification(active);
    }
    let mut adv = AdvertisingChannel::new(&Q, BleRadio::new(), radio, &TagConfig::default(), 1);
    let mut lo = LoopbackChannel::<4>::new();
    adv.init().unwrap();
    lo.init().unwrap();

    let mut channels: [&mut dyn Channel; 2] = [&mut adv, &mut lo];
    outbox::broadcast(&mut channels, &Message::new(b"first")).unwrap();
    assert_eq!(
        outbox::broadcast(&mut channels, &Message::new(b"second")),
        Err(Error::NoMemory)
    );
    assert_eq!(lo.pending_tx(), 2);
}
