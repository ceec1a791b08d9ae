// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use uhd_source::{Config, DeviceArgs, MetaRange, Range};

const ARGS: &str = "uhd,nchan=2,subdev=A:0 B:0,lo_offset=1000,clock_source=external,\
serial=30AD2C5,type=b200,name='lab bench, rack 2',recv_frame_size=8192";

fn bench_config(c: &mut Criterion) {
    c.bench_function("config_parse", |b| {
        b.iter(|| Config::parse(black_box(ARGS)).unwrap())
    });
    c.bench_function("device_args_display", |b| {
        let dict = DeviceArgs::parse(ARGS);
        b.iter(|| black_box(&dict).to_string())
    });
}

fn bench_range(c: &mut Criterion) {
    let range: MetaRange = (0..64)
        .map(|i| Range::new(i as f64 * 10.0, i as f64 * 10.0 + 5.0, 0.25))
        .collect();
    c.bench_function("meta_range_clip", |b| {
        b.iter(|| range.clip(black_box(317.3), true))
    });
}

criterion_group!(benches, bench_config, bench_range);
criterion_main!(benches);
