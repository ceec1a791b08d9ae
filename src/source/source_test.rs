// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use mockall::predicate::eq;
use mockall::Sequence;
use num_complex::{Complex32, Complex64};

use super::{apply_ppm_corr, device_label, Connection, UhdSource};
use crate::args::DeviceArgs;
use crate::device::{MockDeviceHandle, MockDriver, SampleFormat, StreamMode, TuneRequest, TuneResult};
use crate::error::{DriverError, UhdSourceError};
use crate::range::Range;
use crate::{DcOffsetMode, IqBalanceMode};

/// Handle that answers the subdev read-back and stream setup done at
/// construction.
fn mock_handle() -> MockDeviceHandle {
    let mut handle = MockDeviceHandle::new();
    handle
        .expect_subdev_spec()
        .with(eq(0))
        .returning(|_| Ok("A:0".to_string()));
    handle.expect_setup_stream().times(1).returning(|| Ok(()));
    handle
}

fn make_source(handle: MockDeviceHandle, args: &str) -> UhdSource<MockDriver> {
    let mut driver = MockDriver::new();
    driver
        .expect_make()
        .times(1)
        .return_once(move |_, _, _| Ok(handle));
    UhdSource::new(&driver, args).unwrap()
}

/// Handle remembering the last tune request and reporting it back as the
/// current frequency.
fn tracking_handle() -> (MockDeviceHandle, Arc<Mutex<Vec<(TuneRequest, usize)>>>) {
    let requests = Arc::new(Mutex::new(Vec::new()));
    let mut handle = mock_handle();
    let log = requests.clone();
    handle.expect_tune().returning(move |req, chan| {
        log.lock().unwrap().push((*req, chan));
        Ok(TuneResult::default())
    });
    let log = requests.clone();
    handle.expect_center_freq().returning(move |chan| {
        Ok(log
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(_, c)| *c == chan)
            .map(|(req, _)| req.target_freq)
            .unwrap_or(0.0))
    });
    (handle, requests)
}

#[test]
fn test_construct_forwards_filtered_args() {
    let mut handle = mock_handle();
    handle
        .expect_set_subdev_spec()
        .withf(|spec, mboard| spec == "A:0 B:0" && *mboard == 0)
        .times(1)
        .returning(|_, _| Ok(()));

    let mut driver = MockDriver::new();
    driver
        .expect_make()
        .times(1)
        .return_once(move |args, format, nchan| {
            assert_eq!(args, "serial=1234,");
            assert_eq!(format, SampleFormat::ComplexFloat32);
            assert_eq!(nchan, 2);
            Ok(handle)
        });

    let source = UhdSource::new(
        &driver,
        "uhd,nchan=2,subdev=A:0 B:0,lo_offset=1000,clock_source=external,serial=1234",
    )
    .unwrap();
    assert_eq!(source.num_outputs(), 2);
    assert_eq!(source.nchan(), 2);
    assert_eq!(source.lo_offset(), 1000.0);
    assert_eq!(source.configured_clock_source(), "external");
}

#[test]
fn test_subdev_applied_before_stream_setup() {
    let mut handle = MockDeviceHandle::new();
    let mut seq = Sequence::new();
    handle
        .expect_set_subdev_spec()
        .withf(|spec, mboard| spec == "A:A A:B" && *mboard == 0)
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Ok(()));
    handle
        .expect_subdev_spec()
        .with(eq(0))
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok("A:A A:B".to_string()));
    handle
        .expect_setup_stream()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|| Ok(()));

    let source = make_source(handle, "uhd,nchan=2,subdev=A:A A:B");
    assert_eq!(source.num_outputs(), 2);
}

#[test]
fn test_construct_fails_on_stream_setup() {
    let mut handle = MockDeviceHandle::new();
    handle
        .expect_subdev_spec()
        .returning(|_| Ok("A:A".to_string()));
    handle
        .expect_setup_stream()
        .times(1)
        .returning(|| Err(DriverError::new(10, "RX channel 1 out of range").into()));
    let mut driver = MockDriver::new();
    driver.expect_make().return_once(move |_, _, _| Ok(handle));
    let err = UhdSource::new(&driver, "uhd,nchan=2").unwrap_err();
    assert!(matches!(err, UhdSourceError::Driver(_)));
}

#[test]
fn test_construct_reports_lo_offset_and_clock_source() {
    let source = make_source(
        mock_handle(),
        "uhd,nchan=2,lo_offset=1000,clock_source=external",
    );
    assert_eq!(
        source.notices(),
        [
            "Using subdev spec 'A:0'.",
            "Using lo offset of 1000 Hz.",
            "Using clock source external.",
        ]
    );
}

#[test]
fn test_construct_reports_only_subdev_by_default() {
    let source = make_source(mock_handle(), "uhd");
    assert_eq!(source.notices(), ["Using subdev spec 'A:0'."]);
}

#[test]
fn test_nchan_sets_output_ports() {
    for k in 1..=4 {
        let source = make_source(mock_handle(), &format!("uhd,nchan={}", k));
        assert_eq!(source.num_outputs(), k);
        let expected: Vec<Connection> = (0..k)
            .map(|i| Connection {
                device_port: i,
                output_port: i,
            })
            .collect();
        assert_eq!(source.connections(), expected.as_slice());
    }
}

#[test]
fn test_nchan_zero_or_absent_is_one() {
    assert_eq!(make_source(mock_handle(), "uhd,nchan=0").num_outputs(), 1);
    assert_eq!(make_source(mock_handle(), "uhd").num_outputs(), 1);
}

#[test]
fn test_construct_without_subdev_does_not_set_it() {
    let mut handle = mock_handle();
    handle.expect_set_subdev_spec().never();
    make_source(handle, "uhd,type=b200");
}

#[test]
fn test_construct_fails_when_device_missing() {
    let mut driver = MockDriver::new();
    driver
        .expect_make()
        .returning(|_, _, _| Err(DriverError::new(-1, "No devices found").into()));
    let err = UhdSource::new(&driver, "uhd,serial=nope").unwrap_err();
    assert!(matches!(err, UhdSourceError::Driver(_)));
}

#[test]
fn test_construct_fails_on_bad_subdev() {
    let mut handle = MockDeviceHandle::new();
    handle
        .expect_set_subdev_spec()
        .returning(|_, _| Err(DriverError::new(2, "invalid subdev spec").into()));
    handle.expect_setup_stream().never();
    let mut driver = MockDriver::new();
    driver.expect_make().return_once(move |_, _, _| Ok(handle));
    let err = UhdSource::new(&driver, "uhd,subdev=Z:9").unwrap_err();
    assert!(matches!(err, UhdSourceError::Driver(_)));
}

#[test]
fn test_construct_fails_on_malformed_option() {
    let mut driver = MockDriver::new();
    driver.expect_make().never();
    let err = UhdSource::new(&driver, "uhd,lo_offset=abc").unwrap_err();
    assert!(matches!(err, UhdSourceError::ParseFloat(_)));
}

#[test]
fn test_devices_labels() {
    let mut driver = MockDriver::new();
    driver
        .expect_find()
        .withf(|hint| hint.is_empty())
        .returning(|_| {
            Ok(vec![
                DeviceArgs::parse("type=b200,name=lab,serial=30AD2C5"),
                DeviceArgs::parse("type=umtrx,serial=1"),
                DeviceArgs::parse("addr=192.168.10.2"),
            ])
        });

    let devices = UhdSource::devices(&driver).unwrap();
    assert_eq!(
        devices,
        vec![
            "uhd,type=b200,name=lab,serial=30AD2C5,label='Ettus B200 (lab) 30AD2C5'".to_string(),
            "uhd,type=umtrx,serial=1,label='Fairwaves UMTRX 1'".to_string(),
            "uhd,addr=192.168.10.2,label='Ettus USRP'".to_string(),
        ]
    );
}

#[test]
fn test_device_label_empty_type() {
    let dev = DeviceArgs::parse("type=,serial=9");
    assert_eq!(device_label(&dev), "Ettus 9");
}

#[test]
fn test_name_and_channel_count() {
    let mut handle = mock_handle();
    handle
        .expect_mboard_name()
        .with(eq(0))
        .returning(|_| Ok("B210".to_string()));
    // the device may report more channels than the source was built with
    handle.expect_rx_num_channels().returning(|| Ok(2));
    let source = make_source(handle, "uhd");
    assert_eq!(source.name().unwrap(), "B210");
    assert_eq!(source.num_channels().unwrap(), 2);
}

#[test]
fn test_sample_rate() {
    let rate = Arc::new(Mutex::new(0.0));
    let mut handle = mock_handle();
    let stored = rate.clone();
    handle
        .expect_set_sample_rate()
        .times(1)
        .returning(move |r| {
            *stored.lock().unwrap() = r;
            Ok(())
        });
    let stored = rate.clone();
    handle
        .expect_sample_rate()
        .returning(move || Ok(*stored.lock().unwrap()));
    handle.expect_sample_rates().returning(|| {
        Ok(vec![
            Range::new(200e3, 1e6, 0.0),
            Range::new(1e6, 56e6, 0.0),
        ])
    });

    let mut source = make_source(handle, "uhd");
    assert_eq!(source.set_sample_rate(2e6).unwrap(), 2e6);
    assert_eq!(source.sample_rate().unwrap(), 2e6);
    let rates = source.sample_rates().unwrap();
    assert_eq!(rates.len(), 2);
    assert_eq!(rates.start(), Some(200e3));
    assert_eq!(rates.stop(), Some(56e6));
}

#[test]
fn test_center_freq_round_trip() {
    let (handle, requests) = tracking_handle();
    let mut source = make_source(handle, "uhd");
    assert_eq!(source.set_center_freq(100e6, 0).unwrap(), 100e6);
    assert_eq!(source.center_freq(0).unwrap(), 100e6);
    let requests = requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].0, TuneRequest::new(100e6, 0.0));
}

#[test]
fn test_center_freq_carries_lo_offset() {
    let (handle, requests) = tracking_handle();
    let mut source = make_source(handle, "uhd,lo_offset=1000");
    source.set_center_freq(433.92e6, 0).unwrap();
    let request = requests.lock().unwrap()[0].0;
    assert_eq!(request.lo_offset, 1000.0);
    assert_eq!(request.rf_freq(), 433.92e6 + 1000.0);
}

#[test]
fn test_freq_corr_retunes_with_ppm() {
    let (handle, requests) = tracking_handle();
    let mut source = make_source(handle, "uhd");
    let freq = 100e6;
    source.set_center_freq(freq, 0).unwrap();
    assert_eq!(source.set_freq_corr(10.0, 0).unwrap(), 10.0);
    assert_eq!(source.freq_corr(0).unwrap(), 10.0);

    let requests = requests.lock().unwrap();
    assert_eq!(requests.len(), 2);
    let corrected = requests[1].0.target_freq;
    assert!((corrected - freq * (1.0 + 10.0 * 1e-6)).abs() < 1e-6);
    assert!((corrected - 100_001_000.0).abs() < 1e-6);
}

#[test]
fn test_freq_corr_applies_to_later_tuning() {
    let (handle, requests) = tracking_handle();
    let mut source = make_source(handle, "uhd");
    // nothing tuned yet, nothing to retune
    source.set_freq_corr(-2.5, 0).unwrap();
    assert!(requests.lock().unwrap().is_empty());

    source.set_center_freq(1e9, 0).unwrap();
    let target = requests.lock().unwrap()[0].0.target_freq;
    assert_eq!(target, apply_ppm_corr(1e9, -2.5));
}

#[test]
fn test_tuning_state_is_per_channel() {
    let (handle, requests) = tracking_handle();
    let mut source = make_source(handle, "uhd,nchan=2");
    source.set_center_freq(100e6, 0).unwrap();
    source.set_center_freq(200e6, 1).unwrap();
    source.set_freq_corr(5.0, 1).unwrap();

    assert_eq!(source.freq_corr(0).unwrap(), 0.0);
    let requests = requests.lock().unwrap();
    let (last, chan) = requests[2];
    assert_eq!(chan, 1);
    assert_eq!(last.target_freq, apply_ppm_corr(200e6, 5.0));
}

#[test]
fn test_tuning_rejects_unknown_channel() {
    let mut handle = mock_handle();
    handle.expect_tune().never();
    let mut source = make_source(handle, "uhd,nchan=2");
    let err = source.set_center_freq(100e6, 2).unwrap_err();
    assert!(matches!(err, UhdSourceError::UhdSourceErr(_)));
    assert!(source.freq_corr(5).is_err());
}

#[test]
fn test_tune_failure_keeps_previous_request() {
    let mut handle = mock_handle();
    let mut seq = Sequence::new();
    handle
        .expect_tune()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Ok(TuneResult::default()));
    handle
        .expect_tune()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Err(DriverError::new(5, "tune failed").into()));
    handle
        .expect_tune()
        .times(1)
        .in_sequence(&mut seq)
        .withf(|req, _| req.target_freq == apply_ppm_corr(100e6, 1.0))
        .returning(|_, _| Ok(TuneResult::default()));
    handle.expect_center_freq().returning(|_| Ok(100e6));

    let mut source = make_source(handle, "uhd");
    source.set_center_freq(100e6, 0).unwrap();
    assert!(source.set_center_freq(3e12, 0).is_err());
    source.set_freq_corr(1.0, 0).unwrap();
}

#[test]
fn test_clock_source() {
    let mut handle = mock_handle();
    handle
        .expect_set_clock_source()
        .withf(|source, mboard| source == "external" && *mboard == 0)
        .times(1)
        .returning(|_, _| Ok(()));
    handle
        .expect_clock_source()
        .with(eq(0))
        .returning(|_| Ok("external".to_string()));
    let mut source = make_source(handle, "uhd");
    assert_eq!(source.set_clock_source("external", 0).unwrap(), "external");
}

#[test]
fn test_gains() {
    let mut handle = mock_handle();
    handle
        .expect_gain_names()
        .returning(|_| Ok(vec!["PGA0".to_string()]));
    handle
        .expect_gain_range()
        .returning(|_| Ok(vec![Range::new(0.0, 31.5, 0.5)]));
    handle
        .expect_named_gain_range()
        .withf(|name, chan| name == "PGA0" && *chan == 0)
        .returning(|_, _| Ok(vec![Range::new(0.0, 31.5, 0.5)]));
    handle
        .expect_set_gain()
        .with(eq(20.0), eq(0))
        .times(1)
        .returning(|_, _| Ok(()));
    handle.expect_gain().returning(|_| Ok(20.0));
    handle
        .expect_set_named_gain()
        .withf(|gain, name, chan| *gain == 10.0 && name == "PGA0" && *chan == 0)
        .times(1)
        .returning(|_, _, _| Ok(()));
    handle.expect_named_gain().returning(|_, _| Ok(10.0));

    let mut source = make_source(handle, "uhd");
    assert_eq!(source.gain_names(0).unwrap(), vec!["PGA0"]);
    assert_eq!(source.gain_range(0).unwrap().step(), 0.5);
    assert_eq!(source.named_gain_range("PGA0", 0).unwrap().stop(), Some(31.5));
    assert_eq!(source.set_gain(20.0, 0).unwrap(), 20.0);
    assert_eq!(source.set_named_gain(10.0, "PGA0", 0).unwrap(), 10.0);
}

#[test]
fn test_antennas() {
    let mut handle = mock_handle();
    handle
        .expect_antennas()
        .returning(|_| Ok(vec!["TX/RX".to_string(), "RX2".to_string()]));
    handle
        .expect_set_antenna()
        .withf(|antenna, chan| antenna == "RX2" && *chan == 1)
        .times(1)
        .returning(|_, _| Ok(()));
    handle
        .expect_antenna()
        .with(eq(1))
        .returning(|_| Ok("RX2".to_string()));
    let mut source = make_source(handle, "uhd,nchan=2");
    assert_eq!(source.antennas(1).unwrap().len(), 2);
    assert_eq!(source.set_antenna("RX2", 1).unwrap(), "RX2");
}

#[test]
fn test_dc_offset_off_resets_to_zero() {
    let offset = Arc::new(Mutex::new(Complex64::new(0.0, 0.0)));
    let mut handle = mock_handle();
    let mut seq = Sequence::new();
    let stored = offset.clone();
    handle
        .expect_set_dc_offset()
        .times(1)
        .in_sequence(&mut seq)
        .returning(move |o, _| {
            *stored.lock().unwrap() = o;
            Ok(())
        });
    handle
        .expect_set_auto_dc_offset()
        .with(eq(false), eq(0))
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Ok(()));
    let stored = offset.clone();
    handle
        .expect_set_dc_offset()
        .times(1)
        .in_sequence(&mut seq)
        .returning(move |o, _| {
            *stored.lock().unwrap() = o;
            Ok(())
        });

    let mut source = make_source(handle, "uhd");
    source.set_dc_offset(Complex64::new(0.1, -0.2), 0).unwrap();
    source.set_dc_offset_mode(DcOffsetMode::Off, 0).unwrap();
    assert_eq!(*offset.lock().unwrap(), Complex64::new(0.0, 0.0));
}

#[test]
fn test_dc_offset_manual_and_automatic() {
    let mut handle = mock_handle();
    handle
        .expect_set_auto_dc_offset()
        .with(eq(false), eq(0))
        .times(1)
        .returning(|_, _| Ok(()));
    handle
        .expect_set_auto_dc_offset()
        .with(eq(true), eq(0))
        .times(1)
        .returning(|_, _| Ok(()));
    handle.expect_set_dc_offset().never();

    let mut source = make_source(handle, "uhd");
    source.set_dc_offset_mode(DcOffsetMode::Manual, 0).unwrap();
    source.set_dc_offset_mode(DcOffsetMode::Automatic, 0).unwrap();
}

#[test]
fn test_iq_balance_modes() {
    let mut handle = mock_handle();
    handle
        .expect_set_iq_balance()
        .with(eq(Complex64::new(0.0, 0.0)), eq(0))
        .times(1)
        .returning(|_, _| Ok(()));

    let mut source = make_source(handle, "uhd");
    source.set_iq_balance_mode(IqBalanceMode::Off, 0).unwrap();
    source.set_iq_balance_mode(IqBalanceMode::Manual, 0).unwrap();
    let err = source
        .set_iq_balance_mode(IqBalanceMode::Automatic, 0)
        .unwrap_err();
    assert!(matches!(err, UhdSourceError::NotImplemented(_)));
}

#[test]
fn test_iq_balance_value_forwarded() {
    let mut handle = mock_handle();
    handle
        .expect_set_iq_balance()
        .with(eq(Complex64::new(0.01, 0.02)), eq(0))
        .times(1)
        .returning(|_, _| Ok(()));
    let mut source = make_source(handle, "uhd");
    source.set_iq_balance(Complex64::new(0.01, 0.02), 0).unwrap();
}

#[test]
fn test_bandwidth() {
    let mut handle = mock_handle();
    handle
        .expect_set_bandwidth()
        .with(eq(10e6), eq(0))
        .times(1)
        .returning(|_, _| Ok(()));
    handle.expect_bandwidth().returning(|_| Ok(10e6));
    handle
        .expect_bandwidth_range()
        .returning(|_| Ok(vec![Range::new(200e3, 56e6, 0.0)]));
    let mut source = make_source(handle, "uhd");
    assert_eq!(source.set_bandwidth(10e6, 0).unwrap(), 10e6);
    assert_eq!(source.bandwidth_range(0).unwrap().len(), 1);
}

#[test]
fn test_driver_errors_propagate() {
    let mut handle = mock_handle();
    handle
        .expect_set_gain()
        .returning(|_, _| Err(DriverError::new(10, "gain out of range").into()));
    handle
        .expect_freq_range()
        .returning(|_| Err(DriverError::new(3, "bad channel").into()));
    let mut source = make_source(handle, "uhd");
    assert!(matches!(
        source.set_gain(200.0, 0).unwrap_err(),
        UhdSourceError::Driver(_)
    ));
    assert!(source.freq_range(7).is_err());
}

#[test]
fn test_start_stop_issue_stream_commands() {
    let mut handle = mock_handle();
    let mut seq = Sequence::new();
    handle
        .expect_issue_stream_cmd()
        .with(eq(StreamMode::StartContinuous))
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok(()));
    handle
        .expect_issue_stream_cmd()
        .with(eq(StreamMode::StopContinuous))
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok(()));
    let mut source = make_source(handle, "uhd");
    source.start().unwrap();
    source.stop().unwrap();
}

#[test]
fn test_work_forwards_to_device_ports() {
    let mut handle = mock_handle();
    handle.expect_recv().times(1).returning(|buffs, _| {
        for (chan, buff) in buffs.iter_mut().enumerate() {
            for sample in buff.iter_mut() {
                *sample = Complex32::new(chan as f32, 1.0);
            }
        }
        Ok(buffs[0].len())
    });
    let mut source = make_source(handle, "uhd,nchan=2");
    let mut outputs = vec![vec![Complex32::new(0.0, 0.0); 16]; 2];
    let n = source.work(&mut outputs, Duration::from_millis(100)).unwrap();
    assert_eq!(n, 16);
    assert_eq!(outputs[0][15], Complex32::new(0.0, 1.0));
    assert_eq!(outputs[1][0], Complex32::new(1.0, 1.0));
}

#[test]
fn test_work_rejects_port_mismatch() {
    let mut handle = mock_handle();
    handle.expect_recv().never();
    let mut source = make_source(handle, "uhd,nchan=2");
    let mut outputs = vec![vec![Complex32::new(0.0, 0.0); 16]; 1];
    assert!(source.work(&mut outputs, Duration::from_millis(100)).is_err());
}
