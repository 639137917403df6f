//! Sensor drivers behind the `Sensor` trait, on register-file buses.

use sensortag::error::Error;
use sensortag::sensors::lis2dh12::{LIS2DH12_ADDRESS_ALT, Lis2dh12, RATE_400_HZ};
use sensortag::sensors::lis2mdl::Lis2mdl;
use sensortag::sensors::{Axis3, Dsp, Mode, SampleRate, Sensor, Setting};

use crate::mock_hw::{MockBus, NoopDelay};

/// Drive any sensor through the common lifecycle.
fn exercise<S: Sensor>(sensor: &mut S) -> Result<S::Data, Error> {
    sensor.init()?;
    assert_eq!(sensor.mode_get(), Ok(Mode::Sleep));
    sensor.samplerate_set(SampleRate::Min)?;
    sensor.mode_set(Mode::Continuous)?;
    assert_eq!(sensor.mode_get(), Ok(Mode::Continuous));
    let data = sensor.data_get()?;
    sensor.mode_set(Mode::Sleep)?;
    sensor.uninit()?;
    Ok(data)
}

#[test]
fn both_drivers_share_the_lifecycle() {
    let mut accel_bus = MockBus::lis2dh12();
    accel_bus.load_axes(0x28, [500 << 6, 0, -(250 << 6)]);
    let mut accel = Lis2dh12::new(accel_bus, NoopDelay::default());
    let a = exercise(&mut accel).unwrap();
    assert_eq!(a, Axis3 { x: 2000.0, y: 0.0, z: -1000.0 });

    let mut mag_bus = MockBus::lis2mdl();
    mag_bus.load_axes(0x68, [100, -200, 0]);
    let mut mag = Lis2mdl::new(mag_bus, NoopDelay::default());
    let m = exercise(&mut mag).unwrap();
    assert_eq!(m, Axis3 { x: 150.0, y: -300.0, z: 0.0 });
}

#[test]
fn operations_before_init_are_rejected() {
    let mut accel = Lis2dh12::new(MockBus::lis2dh12(), NoopDelay::default());
    assert_eq!(accel.data_get(), Err(Error::InvalidState));
    assert_eq!(accel.mode_set(Mode::Continuous), Err(Error::InvalidState));

    let mut mag = Lis2mdl::new(MockBus::lis2mdl(), NoopDelay::default());
    assert_eq!(mag.samplerate_get(), Err(Error::InvalidState));
}

#[test]
fn absent_device_is_not_found() {
    let mut bus = MockBus::lis2dh12();
    bus.nack = true;
    let mut accel = Lis2dh12::new(bus, NoopDelay::default());
    assert_eq!(accel.init(), Err(Error::NotFound));

    // Wrong strap: the chip answers at the other address.
    let mut accel = Lis2dh12::with_address(MockBus::lis2dh12(), NoopDelay::default(), LIS2DH12_ADDRESS_ALT);
    assert_eq!(accel.init(), Err(Error::NotFound));
}

#[test]
fn single_blocking_settles_then_sleeps() {
    let mut accel = Lis2dh12::new(MockBus::lis2dh12(), NoopDelay::default());
    accel.init().unwrap();
    accel.samplerate_set(SampleRate::Hz(1)).unwrap();
    accel.mode_set(Mode::SingleBlocking).unwrap();
    assert_eq!(accel.mode_get(), Ok(Mode::Sleep));
    let (bus, delay) = accel.release();
    // One full 1 Hz period.
    assert!(delay.total_ms() >= 1000);
    assert_eq!(bus.regs[0x20] >> 4, 0);

    let mut mag = Lis2mdl::new(MockBus::lis2mdl(), NoopDelay::default());
    mag.init().unwrap();
    mag.mode_set(Mode::SingleBlocking).unwrap();
    assert_eq!(mag.mode_get(), Ok(Mode::Sleep));
}

#[test]
fn capability_answers_differ_per_chip() {
    let mut accel = Lis2dh12::new(MockBus::lis2dh12(), NoopDelay::default());
    accel.init().unwrap();
    assert_eq!(accel.mode_set(Mode::SingleAsynchronous), Err(Error::NotSupported));
    assert_eq!(accel.dsp_set(Dsp::LowPass, 0), Err(Error::NotSupported));
    accel.samplerate_set(SampleRate::Max).unwrap();
    assert_eq!(accel.samplerate_get(), Ok(SampleRate::Hz(RATE_400_HZ)));
    assert_eq!(accel.scale_set(Setting::NoChange), Ok(()));
    assert_eq!(accel.scale_get(), Ok(2));

    let mut mag = Lis2mdl::new(MockBus::lis2mdl(), NoopDelay::default());
    mag.init().unwrap();
    assert_eq!(mag.scale_set(Setting::Max), Err(Error::NotSupported));
    assert_eq!(mag.resolution_set(Setting::Min), Err(Error::NotSupported));
    assert_eq!(mag.dsp_set(Dsp::Average, 4), Err(Error::NotImplemented));
    assert_eq!(mag.samplerate_set(SampleRate::Hz(101)), Err(Error::NotSupported));
    mag.samplerate_set(SampleRate::Hz(30)).unwrap();
    assert_eq!(mag.samplerate_get(), Ok(SampleRate::Hz(50)));
}
