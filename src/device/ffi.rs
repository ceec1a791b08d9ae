// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Minimal UHD C API bindings (uhd.h), only what the receive source uses.
#![allow(non_camel_case_types, dead_code)]

use std::os::raw::{c_char, c_double, c_int, c_void};

pub type uhd_error = c_int;
pub const UHD_ERROR_NONE: uhd_error = 0;
pub const UHD_ERROR_NOT_IMPLEMENTED: uhd_error = 20;

pub type uhd_usrp_handle = *mut c_void;
pub type uhd_rx_streamer_handle = *mut c_void;
pub type uhd_rx_metadata_handle = *mut c_void;
pub type uhd_string_vector_handle = *mut c_void;
pub type uhd_meta_range_handle = *mut c_void;
pub type uhd_subdev_spec_handle = *mut c_void;

// Tune request policies
pub const UHD_TUNE_REQUEST_POLICY_NONE: c_int = 78;
pub const UHD_TUNE_REQUEST_POLICY_AUTO: c_int = 65;
pub const UHD_TUNE_REQUEST_POLICY_MANUAL: c_int = 77;

// Stream modes
pub const UHD_STREAM_MODE_START_CONTINUOUS: c_int = 97;
pub const UHD_STREAM_MODE_STOP_CONTINUOUS: c_int = 111;

// RX metadata error codes
pub const UHD_RX_METADATA_ERROR_CODE_NONE: c_int = 0x0;
pub const UHD_RX_METADATA_ERROR_CODE_TIMEOUT: c_int = 0x1;
pub const UHD_RX_METADATA_ERROR_CODE_OVERFLOW: c_int = 0x8;

pub const STRBUFFER_LEN: usize = 1024;

#[repr(C)]
pub struct uhd_range_t {
    pub start: c_double,
    pub stop: c_double,
    pub step: c_double,
}

#[repr(C)]
pub struct uhd_tune_request_t {
    pub target_freq: c_double,
    pub rf_freq_policy: c_int,
    pub rf_freq: c_double,
    pub dsp_freq_policy: c_int,
    pub dsp_freq: c_double,
    pub args: *mut c_char,
}

#[repr(C)]
#[derive(Default)]
pub struct uhd_tune_result_t {
    pub clipped_rf_freq: c_double,
    pub target_rf_freq: c_double,
    pub actual_rf_freq: c_double,
    pub target_dsp_freq: c_double,
    pub actual_dsp_freq: c_double,
}

#[repr(C)]
pub struct uhd_stream_args_t {
    pub cpu_format: *mut c_char,
    pub otw_format: *mut c_char,
    pub args: *mut c_char,
    pub channel_list: *mut usize,
    pub n_channels: c_int,
}

#[repr(C)]
pub struct uhd_stream_cmd_t {
    pub stream_mode: c_int,
    pub num_samps: usize,
    pub stream_now: bool,
    pub time_spec_full_secs: i64,
    pub time_spec_frac_secs: c_double,
}

extern "C" {
    pub fn uhd_get_last_error(error_out: *mut c_char, strbuffer_len: usize) -> uhd_error;

    // String vector
    pub fn uhd_string_vector_make(h: *mut uhd_string_vector_handle) -> uhd_error;
    pub fn uhd_string_vector_free(h: *mut uhd_string_vector_handle) -> uhd_error;
    pub fn uhd_string_vector_size(h: uhd_string_vector_handle, size_out: *mut usize)
        -> uhd_error;
    pub fn uhd_string_vector_at(
        h: uhd_string_vector_handle,
        index: usize,
        value_out: *mut c_char,
        strbuffer_len: usize,
    ) -> uhd_error;

    // Meta range
    pub fn uhd_meta_range_make(h: *mut uhd_meta_range_handle) -> uhd_error;
    pub fn uhd_meta_range_free(h: *mut uhd_meta_range_handle) -> uhd_error;
    pub fn uhd_meta_range_size(h: uhd_meta_range_handle, size_out: *mut usize) -> uhd_error;
    pub fn uhd_meta_range_at(
        h: uhd_meta_range_handle,
        num: usize,
        range_out: *mut uhd_range_t,
    ) -> uhd_error;

    // Subdev spec
    pub fn uhd_subdev_spec_make(h: *mut uhd_subdev_spec_handle, markup: *const c_char)
        -> uhd_error;
    pub fn uhd_subdev_spec_free(h: *mut uhd_subdev_spec_handle) -> uhd_error;
    pub fn uhd_subdev_spec_to_string(
        h: uhd_subdev_spec_handle,
        string_out: *mut c_char,
        strbuffer_len: usize,
    ) -> uhd_error;

    // USRP
    pub fn uhd_usrp_find(args: *const c_char, strings_out: *mut uhd_string_vector_handle)
        -> uhd_error;
    pub fn uhd_usrp_make(h: *mut uhd_usrp_handle, args: *const c_char) -> uhd_error;
    pub fn uhd_usrp_free(h: *mut uhd_usrp_handle) -> uhd_error;
    pub fn uhd_usrp_get_rx_stream(
        h: uhd_usrp_handle,
        stream_args: *mut uhd_stream_args_t,
        h_out: uhd_rx_streamer_handle,
    ) -> uhd_error;
    pub fn uhd_usrp_set_rx_subdev_spec(
        h: uhd_usrp_handle,
        subdev_spec: uhd_subdev_spec_handle,
        mboard: usize,
    ) -> uhd_error;
    pub fn uhd_usrp_get_rx_subdev_spec(
        h: uhd_usrp_handle,
        mboard: usize,
        subdev_spec_out: uhd_subdev_spec_handle,
    ) -> uhd_error;
    pub fn uhd_usrp_get_mboard_name(
        h: uhd_usrp_handle,
        mboard: usize,
        mboard_name_out: *mut c_char,
        strbuffer_len: usize,
    ) -> uhd_error;
    pub fn uhd_usrp_get_rx_num_channels(h: uhd_usrp_handle, num_channels_out: *mut usize)
        -> uhd_error;
    pub fn uhd_usrp_set_rx_rate(h: uhd_usrp_handle, rate: c_double, chan: usize) -> uhd_error;
    pub fn uhd_usrp_get_rx_rate(h: uhd_usrp_handle, chan: usize, rate_out: *mut c_double)
        -> uhd_error;
    pub fn uhd_usrp_get_rx_rates(
        h: uhd_usrp_handle,
        chan: usize,
        rates_out: uhd_meta_range_handle,
    ) -> uhd_error;
    pub fn uhd_usrp_set_rx_freq(
        h: uhd_usrp_handle,
        tune_request: *mut uhd_tune_request_t,
        chan: usize,
        tune_result: *mut uhd_tune_result_t,
    ) -> uhd_error;
    pub fn uhd_usrp_get_rx_freq(h: uhd_usrp_handle, chan: usize, freq_out: *mut c_double)
        -> uhd_error;
    pub fn uhd_usrp_get_rx_freq_range(
        h: uhd_usrp_handle,
        chan: usize,
        freq_range_out: uhd_meta_range_handle,
    ) -> uhd_error;
    pub fn uhd_usrp_set_clock_source(
        h: uhd_usrp_handle,
        clock_source: *const c_char,
        mboard: usize,
    ) -> uhd_error;
    pub fn uhd_usrp_get_clock_source(
        h: uhd_usrp_handle,
        mboard: usize,
        clock_source_out: *mut c_char,
        strbuffer_len: usize,
    ) -> uhd_error;
    pub fn uhd_usrp_set_rx_gain(
        h: uhd_usrp_handle,
        gain: c_double,
        chan: usize,
        gain_name: *const c_char,
    ) -> uhd_error;
    pub fn uhd_usrp_get_rx_gain(
        h: uhd_usrp_handle,
        chan: usize,
        gain_name: *const c_char,
        gain_out: *mut c_double,
    ) -> uhd_error;
    pub fn uhd_usrp_get_rx_gain_range(
        h: uhd_usrp_handle,
        name: *const c_char,
        chan: usize,
        gain_range_out: uhd_meta_range_handle,
    ) -> uhd_error;
    pub fn uhd_usrp_get_rx_gain_names(
        h: uhd_usrp_handle,
        chan: usize,
        gain_names_out: *mut uhd_string_vector_handle,
    ) -> uhd_error;
    pub fn uhd_usrp_set_rx_antenna(h: uhd_usrp_handle, ant: *const c_char, chan: usize)
        -> uhd_error;
    pub fn uhd_usrp_get_rx_antenna(
        h: uhd_usrp_handle,
        chan: usize,
        ant_out: *mut c_char,
        strbuffer_len: usize,
    ) -> uhd_error;
    pub fn uhd_usrp_get_rx_antennas(
        h: uhd_usrp_handle,
        chan: usize,
        antennas_out: *mut uhd_string_vector_handle,
    ) -> uhd_error;
    pub fn uhd_usrp_set_rx_bandwidth(h: uhd_usrp_handle, bandwidth: c_double, chan: usize)
        -> uhd_error;
    pub fn uhd_usrp_get_rx_bandwidth(
        h: uhd_usrp_handle,
        chan: usize,
        bandwidth_out: *mut c_double,
    ) -> uhd_error;
    pub fn uhd_usrp_get_rx_bandwidth_range(
        h: uhd_usrp_handle,
        chan: usize,
        bandwidth_range_out: uhd_meta_range_handle,
    ) -> uhd_error;
    pub fn uhd_usrp_set_rx_dc_offset_enabled(h: uhd_usrp_handle, enb: bool, chan: usize)
        -> uhd_error;
    pub fn uhd_usrp_set_rx_iq_balance_enabled(h: uhd_usrp_handle, enb: bool, chan: usize)
        -> uhd_error;

    // RX streamer
    pub fn uhd_rx_streamer_make(h: *mut uhd_rx_streamer_handle) -> uhd_error;
    pub fn uhd_rx_streamer_free(h: *mut uhd_rx_streamer_handle) -> uhd_error;
    pub fn uhd_rx_streamer_recv(
        h: uhd_rx_streamer_handle,
        buffs: *mut *mut c_void,
        samps_per_buff: usize,
        md: *mut uhd_rx_metadata_handle,
        timeout: c_double,
        one_packet: bool,
        items_recvd: *mut usize,
    ) -> uhd_error;
    pub fn uhd_rx_streamer_issue_stream_cmd(
        h: uhd_rx_streamer_handle,
        stream_cmd: *const uhd_stream_cmd_t,
    ) -> uhd_error;

    // RX metadata
    pub fn uhd_rx_metadata_make(handle: *mut uhd_rx_metadata_handle) -> uhd_error;
    pub fn uhd_rx_metadata_free(handle: *mut uhd_rx_metadata_handle) -> uhd_error;
    pub fn uhd_rx_metadata_error_code(
        h: uhd_rx_metadata_handle,
        error_code_out: *mut c_int,
    ) -> uhd_error;
}
