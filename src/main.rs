// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/// Capture I/Q samples from a USRP to a file.
///
/// Command-line options:
///
/// - `--list` or `-l`: Print the available devices and exit.
/// - `--args <config>` or `-a <config>`: Source configuration string.
///   - Example: `--args uhd,serial=30AD2C5,subdev=A:0`
/// - `--freq <Hz>` or `-f <Hz>`: Center frequency, default 100 MHz.
/// - `--rate <S/s>` or `-s <S/s>`: Sample rate, default 1 MS/s.
/// - `--gain <dB>` or `-g <dB>`: Overall gain, device default when absent.
/// - `--ppm <ppm>` or `-p <ppm>`: Frequency correction.
///
/// The last free argument is the output file. Samples of channel 0 are
/// written as interleaved little-endian f32 I/Q until Ctrl-C.
use byteorder::{LittleEndian, WriteBytesExt};
use log::info;
use std::env;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use uhd_source::error::{Result, UhdSourceError};
use uhd_source::{UhdDriver, UsrpSource, DEFAULT_BUF_LENGTH};

const DEFAULT_FREQUENCY: f64 = 100_000_000.0;
const DEFAULT_SAMPLE_RATE: f64 = 1_000_000.0;
const RECV_TIMEOUT: Duration = Duration::from_secs(3);

static SHUTDOWN: AtomicBool = AtomicBool::new(false);

#[derive(Debug)]
struct Options {
    list: bool,
    args: String,
    freq: f64,
    rate: f64,
    gain: Option<f64>,
    ppm: f64,
    output: Option<String>,
}

fn parse_options() -> Result<Options> {
    let mut opts = Options {
        list: false,
        args: String::from("uhd"),
        freq: DEFAULT_FREQUENCY,
        rate: DEFAULT_SAMPLE_RATE,
        gain: None,
        ppm: 0.0,
        output: None,
    };
    let mut args_iter = env::args().skip(1);
    while let Some(arg) = args_iter.next() {
        let mut value = || {
            args_iter
                .next()
                .ok_or_else(|| UhdSourceError::UhdSourceErr(format!("Missing value for {}", arg)))
        };
        match arg.as_str() {
            "--list" | "-l" => opts.list = true,
            "--args" | "-a" => opts.args = value()?,
            "--freq" | "-f" => opts.freq = value()?.parse()?,
            "--rate" | "-s" => opts.rate = value()?.parse()?,
            "--gain" | "-g" => opts.gain = Some(value()?.parse()?),
            "--ppm" | "-p" => opts.ppm = value()?.parse()?,
            _ => opts.output = Some(arg.clone()),
        }
    }
    Ok(opts)
}

fn main() {
    stderrlog::new()
        .verbosity(log::Level::Info)
        .init()
        .unwrap();
    if let Err(err) = run() {
        eprintln!("uhd_rx: {}", err);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let opts = parse_options()?;
    let driver = UhdDriver::new();

    if opts.list {
        for dev in UsrpSource::devices(&driver)? {
            println!("{}", dev);
        }
        return Ok(());
    }
    let path = opts
        .output
        .clone()
        .ok_or_else(|| UhdSourceError::UhdSourceErr("No output file given".to_string()))?;

    ctrlc::set_handler(|| SHUTDOWN.store(true, Ordering::SeqCst))
        .map_err(|e| UhdSourceError::UhdSourceErr(format!("Failed to set signal handler: {}", e)))?;

    let mut sdr = UsrpSource::new(&driver, &opts.args)?;
    info!("Opened {}", sdr.name()?);

    let rate = sdr.set_sample_rate(opts.rate)?;
    info!("Sampling at {} S/s", rate);
    if opts.ppm != 0.0 {
        sdr.set_freq_corr(opts.ppm, 0)?;
    }
    let freq = sdr.set_center_freq(opts.freq, 0)?;
    info!("Tuned to {} Hz", freq);
    if let Some(gain) = opts.gain {
        info!("Gain set to {} dB", sdr.set_gain(gain, 0)?);
    }

    let file = File::create(&path)
        .map_err(|e| UhdSourceError::UhdSourceErr(format!("{}: {}", path, e)))?;
    let mut out = BufWriter::new(file);
    let mut buffs = vec![vec![Default::default(); DEFAULT_BUF_LENGTH / 8]; sdr.num_outputs()];
    let mut total: u64 = 0;

    sdr.start()?;
    while !SHUTDOWN.load(Ordering::SeqCst) {
        let n = sdr.work(&mut buffs, RECV_TIMEOUT)?;
        for sample in &buffs[0][..n] {
            out.write_f32::<LittleEndian>(sample.re)
                .and_then(|_| out.write_f32::<LittleEndian>(sample.im))
                .map_err(|e| UhdSourceError::UhdSourceErr(format!("write failed: {}", e)))?;
        }
        total += n as u64;
    }
    sdr.stop()?;
    out.flush()
        .map_err(|e| UhdSourceError::UhdSourceErr(format!("flush failed: {}", e)))?;
    info!("Wrote {} samples to {}", total, path);
    Ok(())
}
