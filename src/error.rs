// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::num::{ParseFloatError, ParseIntError};
use std::{fmt, result};

/// A result of a function that may return a `UhdSourceError`.
pub type Result<T> = result::Result<T, UhdSourceError>;

/// Failure reported by the underlying device driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverError {
    /// Driver-specific status code, 0 when the driver gives none.
    pub code: i32,
    pub message: String,
}

impl DriverError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        DriverError {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.code == 0 {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{} (driver error {})", self.message, self.code)
        }
    }
}

impl std::error::Error for DriverError {}

// Macro to create an error enum with From converters for each input error class
macro_rules! define_errcodes {
    [ $typename:ident => $( $name:ident : $class:ty ),+ ] => {
        #[derive(Debug)]
        pub enum $typename {
            $(
                $name($class),
            )+
        }

        impl fmt::Display for $typename {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                match *self {
                    $(
                        $typename::$name(ref err) => fmt::Display::fmt(err, f),
                    )+
                }
            }
        }

        $(
            impl From<$class> for $typename {
                fn from(e: $class) -> Self {
                    $typename::$name(e)
                }
            }
        )+
    };
}

define_errcodes![
    UhdSourceError =>
    ParseInt: ParseIntError,
    ParseFloat: ParseFloatError,
    Driver: DriverError,
    NotImplemented: &'static str,
    UhdSourceErr: String
];

impl std::error::Error for UhdSourceError {}
