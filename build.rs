// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

fn main() {
    if std::env::var_os("CARGO_FEATURE_UHD").is_some() {
        println!("cargo:rustc-link-lib=uhd");
    }
}
