// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Driver capability set.
//!
//! [`Driver`] discovers and constructs devices, [`DeviceHandle`] is the
//! control and streaming interface of one constructed receive device. The
//! source only talks to hardware through these two traits.

#[cfg(feature = "uhd")]
mod ffi;
#[cfg(feature = "uhd")]
pub mod usrp;

use std::time::Duration;

use num_complex::{Complex32, Complex64};

use crate::args::DeviceArgs;
use crate::error::Result;

#[cfg(test)]
use mockall::automock;

/// Host-side sample format requested from the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SampleFormat {
    /// Complex 32-bit float I/Q
    #[default]
    ComplexFloat32,
}

impl SampleFormat {
    /// Name of the format in the driver's stream arguments.
    pub fn cpu_format(&self) -> &'static str {
        match self {
            SampleFormat::ComplexFloat32 => "fc32",
        }
    }
}

/// Tune to `target_freq` with the LO placed `lo_offset` Hz away; the DSP
/// stage makes up the difference.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TuneRequest {
    pub target_freq: f64,
    pub lo_offset: f64,
}

impl TuneRequest {
    pub fn new(target_freq: f64, lo_offset: f64) -> Self {
        TuneRequest {
            target_freq,
            lo_offset,
        }
    }

    /// Frequency the RF front-end is asked for.
    pub fn rf_freq(&self) -> f64 {
        self.target_freq + self.lo_offset
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TuneResult {
    pub target_rf_freq: f64,
    pub actual_rf_freq: f64,
    pub target_dsp_freq: f64,
    pub actual_dsp_freq: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamMode {
    StartContinuous,
    StopContinuous,
}

/// Device discovery and construction.
#[cfg_attr(test, automock(type Handle = MockDeviceHandle;))]
pub trait Driver {
    type Handle: DeviceHandle;

    /// Find devices matching `hint`; an empty hint matches everything.
    fn find(&self, hint: &DeviceArgs) -> Result<Vec<DeviceArgs>>;

    /// Construct one receive device for `nchan` channels in `format`. The
    /// stream itself is set up later by [`DeviceHandle::setup_stream`].
    fn make(&self, args: &str, format: SampleFormat, nchan: usize) -> Result<Self::Handle>;
}

/// Control and streaming interface of one multi-channel receive device.
#[cfg_attr(test, automock)]
pub trait DeviceHandle {
    fn set_subdev_spec(&mut self, spec: &str, mboard: usize) -> Result<()>;
    fn subdev_spec(&self, mboard: usize) -> Result<String>;
    fn mboard_name(&self, mboard: usize) -> Result<String>;
    fn rx_num_channels(&self) -> Result<usize>;

    fn sample_rates(&self) -> Result<Vec<crate::range::Range>>;
    fn set_sample_rate(&mut self, rate: f64) -> Result<()>;
    fn sample_rate(&self) -> Result<f64>;

    fn freq_range(&self, chan: usize) -> Result<Vec<crate::range::Range>>;
    fn tune(&mut self, request: &TuneRequest, chan: usize) -> Result<TuneResult>;
    fn center_freq(&self, chan: usize) -> Result<f64>;

    fn set_clock_source(&mut self, source: &str, mboard: usize) -> Result<()>;
    fn clock_source(&self, mboard: usize) -> Result<String>;

    fn gain_names(&self, chan: usize) -> Result<Vec<String>>;
    /// Overall gain range across all stages.
    fn gain_range(&self, chan: usize) -> Result<Vec<crate::range::Range>>;
    fn named_gain_range(&self, name: &str, chan: usize) -> Result<Vec<crate::range::Range>>;
    /// Distribute `gain` across all stages.
    fn set_gain(&mut self, gain: f64, chan: usize) -> Result<()>;
    fn set_named_gain(&mut self, gain: f64, name: &str, chan: usize) -> Result<()>;
    fn gain(&self, chan: usize) -> Result<f64>;
    fn named_gain(&self, name: &str, chan: usize) -> Result<f64>;

    fn antennas(&self, chan: usize) -> Result<Vec<String>>;
    fn set_antenna(&mut self, antenna: &str, chan: usize) -> Result<()>;
    fn antenna(&self, chan: usize) -> Result<String>;

    fn set_auto_dc_offset(&mut self, enable: bool, chan: usize) -> Result<()>;
    fn set_dc_offset(&mut self, offset: Complex64, chan: usize) -> Result<()>;
    fn set_iq_balance(&mut self, balance: Complex64, chan: usize) -> Result<()>;

    fn bandwidth_range(&self, chan: usize) -> Result<Vec<crate::range::Range>>;
    fn set_bandwidth(&mut self, bandwidth: f64, chan: usize) -> Result<()>;
    fn bandwidth(&self, chan: usize) -> Result<f64>;

    /// Create the receive stream for the constructed channels. Called once
    /// the subdev spec is final, since it decides the channel count.
    fn setup_stream(&mut self) -> Result<()>;
    fn issue_stream_cmd(&mut self, mode: StreamMode) -> Result<()>;

    /// Receive into one buffer per channel, filling up to the shortest
    /// buffer's length. Returns samples written per channel.
    fn recv(&mut self, buffs: &mut [Vec<Complex32>], timeout: Duration) -> Result<usize>;
}
