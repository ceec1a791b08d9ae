// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! USRP backend over the UHD C API.

use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_int, c_void};
use std::ptr;
use std::time::Duration;

use log::{debug, info, warn};
use num_complex::{Complex32, Complex64};

use super::ffi::*;
use super::{DeviceHandle, Driver, SampleFormat, StreamMode, TuneRequest, TuneResult};
use crate::args::DeviceArgs;
use crate::error::Result;
use crate::error::UhdSourceError::{NotImplemented, UhdSourceErr};
use crate::error::DriverError;
use crate::range::Range;

#[cfg(test)]
#[path = "usrp_test.rs"]
mod usrp_test;

const OTW_FORMAT: &str = "sc16";

fn last_error() -> String {
    let mut buf = vec![0u8; STRBUFFER_LEN];
    unsafe {
        uhd_get_last_error(buf.as_mut_ptr() as *mut c_char, buf.len());
        CStr::from_ptr(buf.as_ptr() as *const c_char)
            .to_string_lossy()
            .into_owned()
    }
}

fn check(err: uhd_error, what: &str) -> Result<()> {
    if err == UHD_ERROR_NONE {
        return Ok(());
    }
    let message = format!("{} failed: {}", what, last_error());
    if err == UHD_ERROR_NOT_IMPLEMENTED {
        warn!("{}", message);
    }
    Err(DriverError::new(err, message).into())
}

fn cstring(s: &str) -> Result<CString> {
    CString::new(s).map_err(|e| UhdSourceErr(format!("invalid string '{}': {}", s, e)))
}

/// Read a string through one of the `(char *out, size_t len)` getters.
fn read_string<F>(what: &str, getter: F) -> Result<String>
where
    F: FnOnce(*mut c_char, usize) -> uhd_error,
{
    let mut buf = vec![0u8; STRBUFFER_LEN];
    check(getter(buf.as_mut_ptr() as *mut c_char, buf.len()), what)?;
    let value = unsafe { CStr::from_ptr(buf.as_ptr() as *const c_char) };
    Ok(value.to_string_lossy().into_owned())
}

struct StringVector(uhd_string_vector_handle);

impl StringVector {
    fn new() -> Result<Self> {
        let mut h: uhd_string_vector_handle = ptr::null_mut();
        check(unsafe { uhd_string_vector_make(&mut h) }, "uhd_string_vector_make")?;
        Ok(StringVector(h))
    }

    fn to_vec(&self) -> Result<Vec<String>> {
        let mut count: usize = 0;
        check(
            unsafe { uhd_string_vector_size(self.0, &mut count) },
            "uhd_string_vector_size",
        )?;
        (0..count)
            .map(|i| {
                read_string("uhd_string_vector_at", |out, len| unsafe {
                    uhd_string_vector_at(self.0, i, out, len)
                })
            })
            .collect()
    }
}

impl Drop for StringVector {
    fn drop(&mut self) {
        unsafe {
            uhd_string_vector_free(&mut self.0);
        }
    }
}

struct MetaRangeHandle(uhd_meta_range_handle);

impl MetaRangeHandle {
    fn new() -> Result<Self> {
        let mut h: uhd_meta_range_handle = ptr::null_mut();
        check(unsafe { uhd_meta_range_make(&mut h) }, "uhd_meta_range_make")?;
        Ok(MetaRangeHandle(h))
    }

    fn to_vec(&self) -> Result<Vec<Range>> {
        let mut count: usize = 0;
        check(
            unsafe { uhd_meta_range_size(self.0, &mut count) },
            "uhd_meta_range_size",
        )?;
        let mut ranges = Vec::with_capacity(count);
        for i in 0..count {
            let mut range = uhd_range_t {
                start: 0.0,
                stop: 0.0,
                step: 0.0,
            };
            check(
                unsafe { uhd_meta_range_at(self.0, i, &mut range) },
                "uhd_meta_range_at",
            )?;
            ranges.push(Range::new(range.start, range.stop, range.step));
        }
        Ok(ranges)
    }
}

impl Drop for MetaRangeHandle {
    fn drop(&mut self) {
        unsafe {
            uhd_meta_range_free(&mut self.0);
        }
    }
}

struct SubdevSpec(uhd_subdev_spec_handle);

impl SubdevSpec {
    fn new(markup: &str) -> Result<Self> {
        let markup = cstring(markup)?;
        let mut h: uhd_subdev_spec_handle = ptr::null_mut();
        check(
            unsafe { uhd_subdev_spec_make(&mut h, markup.as_ptr()) },
            "uhd_subdev_spec_make",
        )?;
        Ok(SubdevSpec(h))
    }
}

impl Drop for SubdevSpec {
    fn drop(&mut self) {
        unsafe {
            uhd_subdev_spec_free(&mut self.0);
        }
    }
}

/// Entry point to the UHD library.
#[derive(Debug, Default, Clone, Copy)]
pub struct UhdDriver;

impl UhdDriver {
    pub fn new() -> Self {
        UhdDriver
    }
}

impl Driver for UhdDriver {
    type Handle = Usrp;

    fn find(&self, hint: &DeviceArgs) -> Result<Vec<DeviceArgs>> {
        let args = cstring(&hint.to_string())?;
        let mut found = StringVector::new()?;
        check(
            unsafe { uhd_usrp_find(args.as_ptr(), &mut found.0) },
            "uhd_usrp_find",
        )?;
        Ok(found
            .to_vec()?
            .iter()
            .map(|addr| DeviceArgs::parse(addr))
            .collect())
    }

    fn make(&self, args: &str, format: SampleFormat, nchan: usize) -> Result<Usrp> {
        Usrp::open(args, format, nchan)
    }
}

/// One constructed USRP. The RX streamer over `nchan` channels exists once
/// [`DeviceHandle::setup_stream`] has run.
pub struct Usrp {
    handle: uhd_usrp_handle,
    streamer: uhd_rx_streamer_handle,
    md: uhd_rx_metadata_handle,
    format: SampleFormat,
    nchan: usize,
}

impl Usrp {
    fn open(args: &str, format: SampleFormat, nchan: usize) -> Result<Usrp> {
        let dev_args = cstring(args)?;
        info!("Opening USRP with args '{}'", args);

        let mut usrp = Usrp {
            handle: ptr::null_mut(),
            streamer: ptr::null_mut(),
            md: ptr::null_mut(),
            format,
            nchan,
        };
        // From here on Drop releases whatever has been created
        check(
            unsafe { uhd_usrp_make(&mut usrp.handle, dev_args.as_ptr()) },
            "uhd_usrp_make",
        )?;
        Ok(usrp)
    }

    fn streamer(&self) -> Result<uhd_rx_streamer_handle> {
        if self.streamer.is_null() || self.md.is_null() {
            return Err(UhdSourceErr("RX stream is not set up".to_string()));
        }
        Ok(self.streamer)
    }

    fn meta_range<F>(&self, what: &str, getter: F) -> Result<Vec<Range>>
    where
        F: FnOnce(uhd_meta_range_handle) -> uhd_error,
    {
        let range = MetaRangeHandle::new()?;
        check(getter(range.0), what)?;
        range.to_vec()
    }

    fn double<F>(&self, what: &str, getter: F) -> Result<f64>
    where
        F: FnOnce(*mut f64) -> uhd_error,
    {
        let mut value: f64 = 0.0;
        check(getter(&mut value as *mut f64), what)?;
        Ok(value)
    }
}

impl DeviceHandle for Usrp {
    fn set_subdev_spec(&mut self, spec: &str, mboard: usize) -> Result<()> {
        let spec = SubdevSpec::new(spec)?;
        check(
            unsafe { uhd_usrp_set_rx_subdev_spec(self.handle, spec.0, mboard) },
            "uhd_usrp_set_rx_subdev_spec",
        )
    }

    fn subdev_spec(&self, mboard: usize) -> Result<String> {
        let spec = SubdevSpec::new("")?;
        check(
            unsafe { uhd_usrp_get_rx_subdev_spec(self.handle, mboard, spec.0) },
            "uhd_usrp_get_rx_subdev_spec",
        )?;
        read_string("uhd_subdev_spec_to_string", |out, len| unsafe {
            uhd_subdev_spec_to_string(spec.0, out, len)
        })
    }

    fn mboard_name(&self, mboard: usize) -> Result<String> {
        read_string("uhd_usrp_get_mboard_name", |out, len| unsafe {
            uhd_usrp_get_mboard_name(self.handle, mboard, out, len)
        })
    }

    fn rx_num_channels(&self) -> Result<usize> {
        let mut count: usize = 0;
        check(
            unsafe { uhd_usrp_get_rx_num_channels(self.handle, &mut count) },
            "uhd_usrp_get_rx_num_channels",
        )?;
        Ok(count)
    }

    fn sample_rates(&self) -> Result<Vec<Range>> {
        self.meta_range("uhd_usrp_get_rx_rates", |out| unsafe {
            uhd_usrp_get_rx_rates(self.handle, 0, out)
        })
    }

    fn set_sample_rate(&mut self, rate: f64) -> Result<()> {
        // every channel shares the rate
        for chan in 0..self.nchan {
            check(
                unsafe { uhd_usrp_set_rx_rate(self.handle, rate, chan) },
                "uhd_usrp_set_rx_rate",
            )?;
        }
        Ok(())
    }

    fn sample_rate(&self) -> Result<f64> {
        self.double("uhd_usrp_get_rx_rate", |out| unsafe {
            uhd_usrp_get_rx_rate(self.handle, 0, out)
        })
    }

    fn freq_range(&self, chan: usize) -> Result<Vec<Range>> {
        self.meta_range("uhd_usrp_get_rx_freq_range", |out| unsafe {
            uhd_usrp_get_rx_freq_range(self.handle, chan, out)
        })
    }

    fn tune(&mut self, request: &TuneRequest, chan: usize) -> Result<TuneResult> {
        let mut tune_req = uhd_tune_request_t {
            target_freq: request.target_freq,
            rf_freq_policy: UHD_TUNE_REQUEST_POLICY_MANUAL,
            rf_freq: request.rf_freq(),
            dsp_freq_policy: UHD_TUNE_REQUEST_POLICY_AUTO,
            dsp_freq: 0.0,
            args: ptr::null_mut(),
        };
        let mut tune_result = uhd_tune_result_t::default();
        check(
            unsafe { uhd_usrp_set_rx_freq(self.handle, &mut tune_req, chan, &mut tune_result) },
            "uhd_usrp_set_rx_freq",
        )?;
        debug!(
            "chan {} tuned: RF {:.1} Hz, DSP {:.1} Hz",
            chan, tune_result.actual_rf_freq, tune_result.actual_dsp_freq
        );
        Ok(TuneResult {
            target_rf_freq: tune_result.target_rf_freq,
            actual_rf_freq: tune_result.actual_rf_freq,
            target_dsp_freq: tune_result.target_dsp_freq,
            actual_dsp_freq: tune_result.actual_dsp_freq,
        })
    }

    fn center_freq(&self, chan: usize) -> Result<f64> {
        self.double("uhd_usrp_get_rx_freq", |out| unsafe {
            uhd_usrp_get_rx_freq(self.handle, chan, out)
        })
    }

    fn set_clock_source(&mut self, source: &str, mboard: usize) -> Result<()> {
        let source = cstring(source)?;
        check(
            unsafe { uhd_usrp_set_clock_source(self.handle, source.as_ptr(), mboard) },
            "uhd_usrp_set_clock_source",
        )
    }

    fn clock_source(&self, mboard: usize) -> Result<String> {
        read_string("uhd_usrp_get_clock_source", |out, len| unsafe {
            uhd_usrp_get_clock_source(self.handle, mboard, out, len)
        })
    }

    fn gain_names(&self, chan: usize) -> Result<Vec<String>> {
        let mut names = StringVector::new()?;
        check(
            unsafe { uhd_usrp_get_rx_gain_names(self.handle, chan, &mut names.0) },
            "uhd_usrp_get_rx_gain_names",
        )?;
        names.to_vec()
    }

    fn gain_range(&self, chan: usize) -> Result<Vec<Range>> {
        self.named_gain_range("", chan)
    }

    fn named_gain_range(&self, name: &str, chan: usize) -> Result<Vec<Range>> {
        let name = cstring(name)?;
        self.meta_range("uhd_usrp_get_rx_gain_range", |out| unsafe {
            uhd_usrp_get_rx_gain_range(self.handle, name.as_ptr(), chan, out)
        })
    }

    fn set_gain(&mut self, gain: f64, chan: usize) -> Result<()> {
        self.set_named_gain(gain, "", chan)
    }

    fn set_named_gain(&mut self, gain: f64, name: &str, chan: usize) -> Result<()> {
        let name = cstring(name)?;
        check(
            unsafe { uhd_usrp_set_rx_gain(self.handle, gain, chan, name.as_ptr()) },
            "uhd_usrp_set_rx_gain",
        )
    }

    fn gain(&self, chan: usize) -> Result<f64> {
        self.named_gain("", chan)
    }

    fn named_gain(&self, name: &str, chan: usize) -> Result<f64> {
        let name = cstring(name)?;
        self.double("uhd_usrp_get_rx_gain", |out| unsafe {
            uhd_usrp_get_rx_gain(self.handle, chan, name.as_ptr(), out)
        })
    }

    fn antennas(&self, chan: usize) -> Result<Vec<String>> {
        let mut antennas = StringVector::new()?;
        check(
            unsafe { uhd_usrp_get_rx_antennas(self.handle, chan, &mut antennas.0) },
            "uhd_usrp_get_rx_antennas",
        )?;
        antennas.to_vec()
    }

    fn set_antenna(&mut self, antenna: &str, chan: usize) -> Result<()> {
        let antenna = cstring(antenna)?;
        check(
            unsafe { uhd_usrp_set_rx_antenna(self.handle, antenna.as_ptr(), chan) },
            "uhd_usrp_set_rx_antenna",
        )
    }

    fn antenna(&self, chan: usize) -> Result<String> {
        read_string("uhd_usrp_get_rx_antenna", |out, len| unsafe {
            uhd_usrp_get_rx_antenna(self.handle, chan, out, len)
        })
    }

    fn set_auto_dc_offset(&mut self, enable: bool, chan: usize) -> Result<()> {
        check(
            unsafe { uhd_usrp_set_rx_dc_offset_enabled(self.handle, enable, chan) },
            "uhd_usrp_set_rx_dc_offset_enabled",
        )
    }

    fn set_dc_offset(&mut self, offset: Complex64, chan: usize) -> Result<()> {
        // Only the enable switch is exposed. Disabling it keeps the last
        // automatic estimate, so not even zero can be loaded.
        warn!("chan {}: cannot load dc offset {} through the UHD C API", chan, offset);
        Err(NotImplemented("manual DC offset is not exposed by the UHD C API"))
    }

    fn set_iq_balance(&mut self, balance: Complex64, chan: usize) -> Result<()> {
        if balance == Complex64::new(0.0, 0.0) {
            return check(
                unsafe { uhd_usrp_set_rx_iq_balance_enabled(self.handle, false, chan) },
                "uhd_usrp_set_rx_iq_balance_enabled",
            );
        }
        Err(NotImplemented("manual IQ balance is not exposed by the UHD C API"))
    }

    fn bandwidth_range(&self, chan: usize) -> Result<Vec<Range>> {
        self.meta_range("uhd_usrp_get_rx_bandwidth_range", |out| unsafe {
            uhd_usrp_get_rx_bandwidth_range(self.handle, chan, out)
        })
    }

    fn set_bandwidth(&mut self, bandwidth: f64, chan: usize) -> Result<()> {
        check(
            unsafe { uhd_usrp_set_rx_bandwidth(self.handle, bandwidth, chan) },
            "uhd_usrp_set_rx_bandwidth",
        )
    }

    fn bandwidth(&self, chan: usize) -> Result<f64> {
        self.double("uhd_usrp_get_rx_bandwidth", |out| unsafe {
            uhd_usrp_get_rx_bandwidth(self.handle, chan, out)
        })
    }

    fn setup_stream(&mut self) -> Result<()> {
        if !self.streamer.is_null() {
            return Err(UhdSourceErr("RX stream is already set up".to_string()));
        }
        check(
            unsafe { uhd_rx_streamer_make(&mut self.streamer) },
            "uhd_rx_streamer_make",
        )?;
        check(
            unsafe { uhd_rx_metadata_make(&mut self.md) },
            "uhd_rx_metadata_make",
        )?;

        let cpu_format = cstring(self.format.cpu_format())?;
        let otw_format = cstring(OTW_FORMAT)?;
        let stream_args = cstring("")?;
        let mut channels: Vec<usize> = (0..self.nchan).collect();
        let mut spec = uhd_stream_args_t {
            cpu_format: cpu_format.as_ptr() as *mut c_char,
            otw_format: otw_format.as_ptr() as *mut c_char,
            args: stream_args.as_ptr() as *mut c_char,
            channel_list: channels.as_mut_ptr(),
            n_channels: self.nchan as c_int,
        };
        check(
            unsafe { uhd_usrp_get_rx_stream(self.handle, &mut spec, self.streamer) },
            "uhd_usrp_get_rx_stream",
        )?;
        debug!("RX stream set up over {} channel(s)", self.nchan);
        Ok(())
    }

    fn issue_stream_cmd(&mut self, mode: StreamMode) -> Result<()> {
        let streamer = self.streamer()?;
        let stream_mode = match mode {
            StreamMode::StartContinuous => UHD_STREAM_MODE_START_CONTINUOUS,
            StreamMode::StopContinuous => UHD_STREAM_MODE_STOP_CONTINUOUS,
        };
        let stream_cmd = uhd_stream_cmd_t {
            stream_mode,
            num_samps: 0,
            stream_now: true,
            time_spec_full_secs: 0,
            time_spec_frac_secs: 0.0,
        };
        check(
            unsafe { uhd_rx_streamer_issue_stream_cmd(streamer, &stream_cmd) },
            "uhd_rx_streamer_issue_stream_cmd",
        )
    }

    fn recv(&mut self, buffs: &mut [Vec<Complex32>], timeout: Duration) -> Result<usize> {
        if buffs.len() != self.nchan {
            return Err(UhdSourceErr(format!(
                "recv needs {} buffers, got {}",
                self.nchan,
                buffs.len()
            )));
        }
        let streamer = self.streamer()?;
        let samps_per_buff = buffs.iter().map(Vec::len).min().unwrap_or(0);
        let mut ptrs: Vec<*mut c_void> = buffs
            .iter_mut()
            .map(|b| b.as_mut_ptr() as *mut c_void)
            .collect();
        let mut num_rx: usize = 0;
        check(
            unsafe {
                uhd_rx_streamer_recv(
                    streamer,
                    ptrs.as_mut_ptr(),
                    samps_per_buff,
                    &mut self.md,
                    timeout.as_secs_f64(),
                    false,
                    &mut num_rx,
                )
            },
            "uhd_rx_streamer_recv",
        )?;

        let mut error_code: c_int = UHD_RX_METADATA_ERROR_CODE_NONE;
        check(
            unsafe { uhd_rx_metadata_error_code(self.md, &mut error_code) },
            "uhd_rx_metadata_error_code",
        )?;
        match error_code {
            UHD_RX_METADATA_ERROR_CODE_NONE => {}
            UHD_RX_METADATA_ERROR_CODE_TIMEOUT => debug!("recv timed out"),
            UHD_RX_METADATA_ERROR_CODE_OVERFLOW => warn!("overflow"),
            code => {
                return Err(DriverError::new(code, "rx metadata reported an error").into());
            }
        }
        Ok(num_rx)
    }
}

impl Drop for Usrp {
    fn drop(&mut self) {
        unsafe {
            if !self.md.is_null() {
                uhd_rx_metadata_free(&mut self.md);
            }
            if !self.streamer.is_null() {
                uhd_rx_streamer_free(&mut self.streamer);
            }
            if !self.handle.is_null() {
                uhd_usrp_free(&mut self.handle);
            }
        }
    }
}
