// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Ranges of tunable values (frequency, gain, sample rate, bandwidth).

use std::ops::AddAssign;

#[cfg(test)]
#[path = "range_test.rs"]
mod range_test;

/// Closed interval `[start, stop]` with a `step` granularity; 0 step means
/// continuous.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Range {
    start: f64,
    stop: f64,
    step: f64,
}

impl Range {
    pub fn new(start: f64, stop: f64, step: f64) -> Self {
        Range { start, stop, step }
    }

    /// A range holding exactly one value.
    pub fn point(value: f64) -> Self {
        Range::new(value, value, 0.0)
    }

    pub fn start(&self) -> f64 {
        self.start
    }

    pub fn stop(&self) -> f64 {
        self.stop
    }

    pub fn step(&self) -> f64 {
        self.step
    }
}

/// Ordered union of ranges as reported by the driver.
///
/// Sub-ranges are accumulated as given, overlapping or not.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetaRange {
    ranges: Vec<Range>,
}

impl MetaRange {
    pub fn new() -> Self {
        MetaRange { ranges: Vec::new() }
    }

    pub fn push(&mut self, range: Range) {
        self.ranges.push(range);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Range> {
        self.ranges.iter()
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Lowest start over all ranges.
    pub fn start(&self) -> Option<f64> {
        self.ranges.iter().map(Range::start).reduce(f64::min)
    }

    /// Highest stop over all ranges.
    pub fn stop(&self) -> Option<f64> {
        self.ranges.iter().map(Range::stop).reduce(f64::max)
    }

    /// Smallest non-zero step, counting both the step of each range and the
    /// gap between consecutive ranges. 0 when every range is continuous and
    /// the ranges touch or overlap. Assumes ranges are in ascending order.
    pub fn step(&self) -> f64 {
        let gaps = self
            .ranges
            .windows(2)
            .map(|pair| pair[1].start - pair[0].stop);
        self.ranges
            .iter()
            .map(Range::step)
            .chain(gaps)
            .filter(|step| *step > 0.0)
            .reduce(f64::min)
            .unwrap_or(0.0)
    }

    /// Every discrete value of the set. Continuous ranges contribute their
    /// endpoints only.
    pub fn values(&self) -> Vec<f64> {
        let mut values = Vec::new();
        for range in &self.ranges {
            if range.start == range.stop {
                values.push(range.start);
            } else if range.step > 0.0 {
                let count = ((range.stop - range.start) / range.step + 1e-9).floor() as usize;
                values.extend((0..=count).map(|i| range.start + i as f64 * range.step));
            } else {
                values.push(range.start);
                values.push(range.stop);
            }
        }
        values
    }

    /// Nearest value inside the set, optionally snapped to the step of the
    /// range it falls in. Assumes ranges are in ascending order.
    pub fn clip(&self, value: f64, clip_step: bool) -> Option<f64> {
        let mut last_stop = self.ranges.first()?.stop;
        for range in &self.ranges {
            if value < range.start {
                // between two ranges, take the closer edge
                return Some(if (value - range.start).abs() < (value - last_stop).abs() {
                    range.start
                } else {
                    last_stop
                });
            }
            if value <= range.stop {
                if !clip_step || range.step == 0.0 {
                    return Some(value);
                }
                let steps = ((value - range.start) / range.step).round();
                return Some(range.start + steps * range.step);
            }
            last_stop = range.stop;
        }
        Some(last_stop)
    }
}

impl AddAssign<Range> for MetaRange {
    fn add_assign(&mut self, range: Range) {
        self.push(range);
    }
}

impl FromIterator<Range> for MetaRange {
    fn from_iter<I: IntoIterator<Item = Range>>(iter: I) -> Self {
        MetaRange {
            ranges: iter.into_iter().collect(),
        }
    }
}

impl Extend<Range> for MetaRange {
    fn extend<I: IntoIterator<Item = Range>>(&mut self, iter: I) {
        self.ranges.extend(iter);
    }
}

impl<'a> IntoIterator for &'a MetaRange {
    type Item = &'a Range;
    type IntoIter = std::slice::Iter<'a, Range>;

    fn into_iter(self) -> Self::IntoIter {
        self.ranges.iter()
    }
}
