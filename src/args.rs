// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Configuration strings.
//!
//! A configuration string is a comma separated list of `key=value` or bare
//! `key` entries, e.g. `uhd,nchan=2,subdev=A:0 B:0,serial=1234`. Values may be
//! single-quoted to carry commas: `label='Ettus B200, lab bench'`.

use std::fmt;
use std::str::FromStr;

use crate::error::{Result, UhdSourceError};

#[cfg(test)]
#[path = "args_test.rs"]
mod args_test;

/// Presence-only key selecting this source among other radio backends.
pub const SELECTOR_KEY: &str = "uhd";

/// Keys consumed by the source itself and never forwarded to the driver.
pub const RESERVED_KEYS: [&str; 5] = [SELECTOR_KEY, "nchan", "subdev", "lo_offset", "clock_source"];

const SEPARATOR: char = ',';
const QUOTE: char = '\'';
const ESCAPE: char = '\\';

/// Ordered key/value map built from a configuration string.
///
/// Lookups are by key. Iteration and re-serialization follow the order in
/// which keys first appeared. Inserting an existing key replaces its value
/// in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceArgs {
    entries: Vec<(String, String)>,
}

impl DeviceArgs {
    pub fn new() -> Self {
        DeviceArgs {
            entries: Vec::new(),
        }
    }

    pub fn parse(args: &str) -> Self {
        let mut dict = DeviceArgs::new();
        for param in split_params(args) {
            let (key, value) = split_pair(&param);
            dict.insert(key, value);
        }
        dict
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn get_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get(key).unwrap_or(default)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Parse the value stored under `key`, `Ok(None)` when the key is absent.
    pub fn parse_value<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: FromStr,
        UhdSourceError: From<T::Err>,
    {
        match self.get(key) {
            Some(value) => Ok(Some(value.parse::<T>()?)),
            None => Ok(None),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Rebuild an argument string for the driver, skipping `excluded` keys.
    ///
    /// Every entry is written as `key=value,`, trailing comma included.
    pub fn to_driver_args(&self, excluded: &[&str]) -> String {
        let mut arguments = String::new();
        for (key, value) in self.iter() {
            if excluded.contains(&key) {
                continue;
            }
            arguments.push_str(key);
            arguments.push('=');
            arguments.push_str(value);
            arguments.push(SEPARATOR);
        }
        arguments
    }
}

/// Renders in the driver's device address format, `key=value,key=value`.
impl fmt::Display for DeviceArgs {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (i, (key, value)) in self.iter().enumerate() {
            if i > 0 {
                write!(f, "{}", SEPARATOR)?;
            }
            write!(f, "{}={}", key, value)?;
        }
        Ok(())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for DeviceArgs {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut dict = DeviceArgs::new();
        for (key, value) in iter {
            dict.insert(key, value);
        }
        dict
    }
}

/// Split on commas outside of single quotes. Quotes are dropped, a backslash
/// takes the next character literally, empty parameters are skipped.
fn split_params(args: &str) -> Vec<String> {
    let mut params = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut chars = args.chars();

    while let Some(c) = chars.next() {
        match c {
            ESCAPE => {
                if let Some(escaped) = chars.next() {
                    current.push(escaped);
                }
            }
            QUOTE => quoted = !quoted,
            SEPARATOR if !quoted => {
                if !current.is_empty() {
                    params.push(std::mem::take(&mut current));
                }
            }
            _ => current.push(c),
        }
    }
    if !current.is_empty() {
        params.push(current);
    }
    params
}

fn split_pair(param: &str) -> (&str, &str) {
    param.split_once('=').unwrap_or((param, ""))
}

/// Options recognised by the source, extracted from a configuration string.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Number of receive channels, never less than 1.
    pub nchan: usize,
    /// LO offset in Hz applied to every tune request.
    pub lo_offset: f64,
    /// Requested clock source, empty when unset.
    pub clock_source: String,
    /// Driver-specific sub-device spec markup.
    pub subdev: Option<String>,
    /// Everything else, ready for the driver's own argument parser.
    pub driver_args: String,
}

impl Config {
    pub fn parse(args: &str) -> Result<Config> {
        Config::from_args(&DeviceArgs::parse(args))
    }

    pub fn from_args(dict: &DeviceArgs) -> Result<Config> {
        let nchan = match dict.parse_value::<usize>("nchan")? {
            Some(0) | None => 1,
            Some(n) => n,
        };
        let lo_offset = dict.parse_value::<f64>("lo_offset")?.unwrap_or(0.0);
        let clock_source = dict.get_or("clock_source", "").to_string();
        let subdev = dict.get("subdev").map(str::to_string);

        Ok(Config {
            nchan,
            lo_offset,
            clock_source,
            subdev,
            driver_args: dict.to_driver_args(&RESERVED_KEYS),
        })
    }
}

impl FromStr for Config {
    type Err = UhdSourceError;

    fn from_str(s: &str) -> Result<Config> {
        Config::parse(s)
    }
}
