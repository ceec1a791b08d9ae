// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # uhd-source
//! Receive source for USRP devices behind a uniform radio-source interface.
//!
//! A source is built from a configuration string such as
//! `uhd,nchan=2,subdev=A:0 B:0,serial=1234`. Keys the source understands are
//! consumed, everything else goes to the driver untouched. The source then
//! forwards frequency, rate, gain, antenna, bandwidth, clock and correction
//! calls to the device and exposes one output port per channel.
//!
//! Hardware access goes through the [`Driver`] and [`DeviceHandle`] traits.
//! The `uhd` feature provides an implementation on top of libuhd.

pub mod args;
mod device;
pub mod error;
pub mod range;
mod source;

pub use args::{Config, DeviceArgs};
pub use device::{DeviceHandle, Driver, SampleFormat, StreamMode, TuneRequest, TuneResult};
pub use range::{MetaRange, Range};
pub use source::{apply_ppm_corr, device_label, Connection, UhdSource};

#[cfg(feature = "uhd")]
pub use device::usrp::{UhdDriver, Usrp};

/// Source backed by real hardware.
#[cfg(feature = "uhd")]
pub type UsrpSource = UhdSource<UhdDriver>;

pub const DEFAULT_BUF_LENGTH: usize = 16 * 16384;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DcOffsetMode {
    Off,
    Manual,
    Automatic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IqBalanceMode {
    Off,
    Manual,
    Automatic, // not supported by the driver
}
