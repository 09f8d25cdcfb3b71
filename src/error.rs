// Copyright 2025 The smckit Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Unified error types for the smckit library.
//!
//! Every failing operation returns a distinguishable error kind; nothing
//! is swallowed or coerced. Hardware-reported conditions never panic.

use thiserror::Error;

use crate::key::FourCc;

/// The main error type for SMC operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The SMC device could not be opened.
    ///
    /// Fatal to the whole session: unsupported hardware, missing
    /// `AppleSMC` service, or permission denied. Never retried.
    #[error("SMC connection failed: {0}")]
    Connection(String),

    /// An exchange with the SMC failed.
    ///
    /// Transient failures are retried internally a bounded number of
    /// times before surfacing as this variant.
    #[error("SMC I/O error: {0}")]
    Io(String),

    /// The device reported it is busy.
    ///
    /// Normally retried internally; callers only see this if a single
    /// raw [`Transport::exchange`](crate::transport::Transport::exchange)
    /// is issued outside the retrying path.
    #[error("SMC device busy")]
    Busy,

    /// The key is not present on this machine.
    #[error("SMC key {0} not found on this machine")]
    UnknownKey(FourCc),

    /// The raw bytes could not be interpreted as the reported data type.
    #[error("failed to decode SMC value: {0}")]
    Decode(String),

    /// The value cannot be represented in its wire format, e.g. a
    /// fixed-point number outside the 16-bit range. Refused before any
    /// write reaches the device.
    #[error("failed to encode SMC value: {0}")]
    Encode(String),

    /// A write or well-known-key read did not match the type the SMC
    /// reports for that key. Writes are refused before any exchange.
    #[error("type mismatch for SMC key {key}: expected {expected}, found {found}")]
    TypeMismatch {
        key: FourCc,
        expected: FourCc,
        found: FourCc,
    },

    /// The key name is not a valid FourCC (exactly 4 ASCII characters).
    #[error("invalid SMC key name: {0:?}")]
    InvalidKey(String),

    /// A fan speed override above the fan's reported maximum was refused.
    #[error("refusing unsafe fan speed {rpm} RPM (fan maximum is {max} RPM)")]
    UnsafeFanSpeed { rpm: u32, max: u32 },

    /// SMC access requires macOS.
    #[error("SMC access is not supported on this platform")]
    Unsupported,
}

/// A specialized Result type for SMC operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Connection("AppleSMC service not found".to_string());
        assert_eq!(
            err.to_string(),
            "SMC connection failed: AppleSMC service not found"
        );

        let err = Error::UnknownKey(FourCc::from_bytes(*b"TC0P"));
        assert_eq!(err.to_string(), "SMC key TC0P not found on this machine");

        let err = Error::TypeMismatch {
            key: FourCc::from_bytes(*b"F0Mn"),
            expected: FourCc::from_bytes(*b"fpe2"),
            found: FourCc::from_bytes(*b"flt "),
        };
        assert_eq!(
            err.to_string(),
            "type mismatch for SMC key F0Mn: expected fpe2, found flt "
        );

        let err = Error::Encode("20000 is out of range for fixed-point type fpe2".to_string());
        assert_eq!(
            err.to_string(),
            "failed to encode SMC value: 20000 is out of range for fixed-point type fpe2"
        );

        let err = Error::UnsafeFanSpeed {
            rpm: 9000,
            max: 6500,
        };
        assert_eq!(
            err.to_string(),
            "refusing unsafe fan speed 9000 RPM (fan maximum is 6500 RPM)"
        );
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Error>();
    }
}
