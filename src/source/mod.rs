// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::fmt;
use std::time::Duration;

use log::{debug, info};
use num_complex::{Complex32, Complex64};

use crate::args::{Config, DeviceArgs};
use crate::device::{DeviceHandle, Driver, SampleFormat, StreamMode, TuneRequest};
use crate::error::Result;
use crate::error::UhdSourceError::{NotImplemented, UhdSourceErr};
use crate::range::MetaRange;
use crate::{DcOffsetMode, IqBalanceMode};

#[cfg(test)]
mod source_test;

/// Frequency after a parts-per-million oscillator correction.
pub fn apply_ppm_corr(freq: f64, ppm: f64) -> f64 {
    freq * (1.0 + ppm * 0.000_001)
}

/// Build the human-readable label for a discovered device, e.g.
/// `Ettus B200 (lab) 30AD2C5`.
pub fn device_label(dev: &DeviceArgs) -> String {
    let device_type = dev.get_or("type", "usrp");
    let name = dev.get_or("name", "");
    let serial = dev.get_or("serial", "");

    let mut label = String::from(if device_type == "umtrx" {
        "Fairwaves"
    } else {
        "Ettus"
    });
    if !device_type.is_empty() {
        label.push(' ');
        label.push_str(&device_type.to_uppercase());
    }
    if !name.is_empty() {
        label.push_str(&format!(" ({})", name));
    }
    if !serial.is_empty() {
        label.push(' ');
        label.push_str(serial);
    }
    label
}

/// Device output port wired to a source output port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Connection {
    pub device_port: usize,
    pub output_port: usize,
}

/// Requested frequency and correction of one channel.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Tuning {
    center_freq: Option<f64>, // Hz, before correction
    freq_corr: f64,           // PPM
}

/// Messages reported once the device is built: the subdev spec in use and,
/// when configured, the LO offset and clock source.
fn construction_notices(config: &Config, subdev: &str) -> Vec<String> {
    let mut notices = vec![format!("Using subdev spec '{}'.", subdev)];
    if config.lo_offset != 0.0 {
        notices.push(format!("Using lo offset of {} Hz.", config.lo_offset));
    }
    if !config.clock_source.is_empty() {
        notices.push(format!("Using clock source {}.", config.clock_source));
    }
    notices
}

/// Multi-channel receive source over one device.
pub struct UhdSource<D: Driver> {
    src: D::Handle,
    connections: Vec<Connection>,
    tuning: Vec<Tuning>,
    lo_offset: f64,
    clock_source: String,
    notices: Vec<String>,
}

impl<D: Driver> UhdSource<D> {
    /// Parse `args` and construct the device through `driver`.
    pub fn new(driver: &D, args: &str) -> Result<Self> {
        let config = Config::parse(args)?;
        UhdSource::from_config(driver, &config)
    }

    pub fn from_config(driver: &D, config: &Config) -> Result<Self> {
        let nchan = config.nchan.max(1);
        debug!(
            "Constructing {} channel source with driver args '{}'",
            nchan, config.driver_args
        );
        let mut src = driver.make(&config.driver_args, SampleFormat::ComplexFloat32, nchan)?;

        if let Some(subdev) = &config.subdev {
            src.set_subdev_spec(subdev, 0)?;
        }
        let notices = construction_notices(config, &src.subdev_spec(0)?);
        for notice in &notices {
            info!("{}", notice);
        }
        // the subdev spec decides which frontends the stream covers
        src.setup_stream()?;

        let connections = (0..nchan)
            .map(|i| Connection {
                device_port: i,
                output_port: i,
            })
            .collect();

        Ok(UhdSource {
            src,
            connections,
            tuning: vec![Tuning::default(); nchan],
            lo_offset: config.lo_offset,
            clock_source: config.clock_source.clone(),
            notices,
        })
    }

    /// List devices as configuration strings, each with a `label` entry.
    pub fn devices(driver: &D) -> Result<Vec<String>> {
        Ok(driver
            .find(&DeviceArgs::new())?
            .iter()
            .map(|dev| format!("uhd,{},label='{}'", dev, device_label(dev)))
            .collect())
    }

    fn check_chan(&self, chan: usize) -> Result<()> {
        if chan >= self.tuning.len() {
            return Err(UhdSourceErr(format!(
                "Channel {} out of range, source has {} channel(s)",
                chan,
                self.tuning.len()
            )));
        }
        Ok(())
    }

    /// Channel count the source was built with.
    pub fn nchan(&self) -> usize {
        self.tuning.len()
    }

    pub fn lo_offset(&self) -> f64 {
        self.lo_offset
    }

    /// Clock source given in the configuration string, empty when unset.
    /// It is reported at construction but not applied.
    pub fn configured_clock_source(&self) -> &str {
        &self.clock_source
    }

    /// Diagnostics logged while constructing the source.
    pub fn notices(&self) -> &[String] {
        &self.notices
    }

    pub fn name(&self) -> Result<String> {
        self.src.mboard_name(0)
    }

    /// RX channel count reported by the device.
    pub fn num_channels(&self) -> Result<usize> {
        self.src.rx_num_channels()
    }

    pub fn sample_rates(&self) -> Result<MetaRange> {
        Ok(self.src.sample_rates()?.into_iter().collect())
    }

    pub fn set_sample_rate(&mut self, rate: f64) -> Result<f64> {
        self.src.set_sample_rate(rate)?;
        self.sample_rate()
    }

    pub fn sample_rate(&self) -> Result<f64> {
        self.src.sample_rate()
    }

    pub fn freq_range(&self, chan: usize) -> Result<MetaRange> {
        Ok(self.src.freq_range(chan)?.into_iter().collect())
    }

    /// Tune `chan` to `freq` with the channel's PPM correction and the
    /// configured LO offset. Returns the frequency reported by the device.
    pub fn set_center_freq(&mut self, freq: f64, chan: usize) -> Result<f64> {
        self.check_chan(chan)?;
        let corr_freq = apply_ppm_corr(freq, self.tuning[chan].freq_corr);
        let request = TuneRequest::new(corr_freq, self.lo_offset);
        let result = self.src.tune(&request, chan)?;
        debug!(
            "chan {}: requested {} Hz, corrected {} Hz, rf {} Hz",
            chan, freq, corr_freq, result.actual_rf_freq
        );
        self.tuning[chan].center_freq = Some(freq);
        self.center_freq(chan)
    }

    pub fn center_freq(&self, chan: usize) -> Result<f64> {
        self.src.center_freq(chan)
    }

    pub fn set_clock_source(&mut self, clock_source: &str, mboard: usize) -> Result<String> {
        self.src.set_clock_source(clock_source, mboard)?;
        info!("Clock source of mboard {} set to {}", mboard, clock_source);
        self.clock_source(mboard)
    }

    pub fn clock_source(&self, mboard: usize) -> Result<String> {
        self.src.clock_source(mboard)
    }

    /// Store a new PPM correction for `chan` and retune it if it was tuned
    /// before. A channel never tuned only keeps the value for its first
    /// `set_center_freq`.
    pub fn set_freq_corr(&mut self, ppm: f64, chan: usize) -> Result<f64> {
        self.check_chan(chan)?;
        self.tuning[chan].freq_corr = ppm;
        if let Some(freq) = self.tuning[chan].center_freq {
            self.set_center_freq(freq, chan)?;
        }
        self.freq_corr(chan)
    }

    pub fn freq_corr(&self, chan: usize) -> Result<f64> {
        self.check_chan(chan)?;
        Ok(self.tuning[chan].freq_corr)
    }

    pub fn gain_names(&self, chan: usize) -> Result<Vec<String>> {
        self.src.gain_names(chan)
    }

    pub fn gain_range(&self, chan: usize) -> Result<MetaRange> {
        Ok(self.src.gain_range(chan)?.into_iter().collect())
    }

    pub fn named_gain_range(&self, name: &str, chan: usize) -> Result<MetaRange> {
        Ok(self.src.named_gain_range(name, chan)?.into_iter().collect())
    }

    pub fn set_gain(&mut self, gain: f64, chan: usize) -> Result<f64> {
        self.src.set_gain(gain, chan)?;
        self.gain(chan)
    }

    pub fn set_named_gain(&mut self, gain: f64, name: &str, chan: usize) -> Result<f64> {
        self.src.set_named_gain(gain, name, chan)?;
        self.named_gain(name, chan)
    }

    pub fn gain(&self, chan: usize) -> Result<f64> {
        self.src.gain(chan)
    }

    pub fn named_gain(&self, name: &str, chan: usize) -> Result<f64> {
        self.src.named_gain(name, chan)
    }

    pub fn antennas(&self, chan: usize) -> Result<Vec<String>> {
        self.src.antennas(chan)
    }

    pub fn set_antenna(&mut self, antenna: &str, chan: usize) -> Result<String> {
        self.src.set_antenna(antenna, chan)?;
        self.antenna(chan)
    }

    pub fn antenna(&self, chan: usize) -> Result<String> {
        self.src.antenna(chan)
    }

    pub fn set_dc_offset_mode(&mut self, mode: DcOffsetMode, chan: usize) -> Result<()> {
        match mode {
            DcOffsetMode::Off => {
                self.src.set_auto_dc_offset(false, chan)?;
                // driver default
                self.src.set_dc_offset(Complex64::new(0.0, 0.0), chan)?;
            }
            DcOffsetMode::Manual => {
                self.src.set_auto_dc_offset(false, chan)?;
            }
            DcOffsetMode::Automatic => {
                self.src.set_auto_dc_offset(true, chan)?;
            }
        }
        Ok(())
    }

    pub fn set_dc_offset(&mut self, offset: Complex64, chan: usize) -> Result<()> {
        self.src.set_dc_offset(offset, chan)
    }

    pub fn set_iq_balance_mode(&mut self, mode: IqBalanceMode, chan: usize) -> Result<()> {
        match mode {
            IqBalanceMode::Off => {
                self.src.set_iq_balance(Complex64::new(0.0, 0.0), chan)?;
            }
            IqBalanceMode::Manual => {}
            IqBalanceMode::Automatic => {
                return Err(NotImplemented(
                    "Automatic IQ imbalance correction not implemented",
                ));
            }
        }
        Ok(())
    }

    pub fn set_iq_balance(&mut self, balance: Complex64, chan: usize) -> Result<()> {
        self.src.set_iq_balance(balance, chan)
    }

    pub fn set_bandwidth(&mut self, bandwidth: f64, chan: usize) -> Result<f64> {
        self.src.set_bandwidth(bandwidth, chan)?;
        self.bandwidth(chan)
    }

    pub fn bandwidth(&self, chan: usize) -> Result<f64> {
        self.src.bandwidth(chan)
    }

    pub fn bandwidth_range(&self, chan: usize) -> Result<MetaRange> {
        Ok(self.src.bandwidth_range(chan)?.into_iter().collect())
    }

    pub fn num_outputs(&self) -> usize {
        self.connections.len()
    }

    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    pub fn start(&mut self) -> Result<()> {
        self.src.issue_stream_cmd(StreamMode::StartContinuous)
    }

    pub fn stop(&mut self) -> Result<()> {
        self.src.issue_stream_cmd(StreamMode::StopContinuous)
    }

    /// Fill one buffer per output port with samples from the device,
    /// returning the sample count written to each.
    pub fn work(&mut self, outputs: &mut [Vec<Complex32>], timeout: Duration) -> Result<usize> {
        if outputs.len() != self.connections.len() {
            return Err(UhdSourceErr(format!(
                "Expected {} output buffers, got {}",
                self.connections.len(),
                outputs.len()
            )));
        }
        self.src.recv(outputs, timeout)
    }
}

impl<D: Driver> fmt::Debug for UhdSource<D> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("UhdSource")
            .field("nchan", &self.tuning.len())
            .field("lo_offset", &self.lo_offset)
            .field("clock_source", &self.clock_source)
            .finish()
    }
}
