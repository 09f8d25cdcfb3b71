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

//! SMC key identifiers.
//!
//! SMC keys are 4-character codes (FourCC) that identify specific sensors
//! and controls, e.g. `TC0P` (CPU proximity temperature) or `F0Ac` (fan 0
//! actual speed). On the wire a key travels as a big-endian `u32`; the same
//! packing is used for the data-type tags the SMC reports (`flt `, `sp78`,
//! `fpe2`, ...).

use std::fmt;

use crate::error::{Error, Result};

/// A 4-character code packed big-endian into a `u32`.
///
/// Used for both key identifiers and data-type tags.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FourCc(u32);

impl FourCc {
    /// Pack four ASCII bytes into a code.
    pub const fn from_bytes(bytes: [u8; 4]) -> Self {
        FourCc(u32::from_be_bytes(bytes))
    }

    /// Wrap a raw wire value, as reported by the SMC.
    pub const fn from_raw(raw: u32) -> Self {
        FourCc(raw)
    }

    /// Parse a human-readable key name. Must be exactly 4 ASCII characters.
    pub fn from_name(name: &str) -> Result<Self> {
        let bytes = name.as_bytes();
        if bytes.len() != 4 || !bytes.iter().all(|b| b.is_ascii()) {
            return Err(Error::InvalidKey(name.to_string()));
        }
        Ok(FourCc(u32::from_be_bytes([
            bytes[0], bytes[1], bytes[2], bytes[3],
        ])))
    }

    /// The raw wire representation.
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// The 4-character name. Inverse of [`FourCc::from_name`] for valid
    /// ASCII codes.
    pub fn name(self) -> String {
        self.0.to_be_bytes().iter().map(|&b| b as char).collect()
    }
}

impl fmt::Display for FourCc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

impl fmt::Debug for FourCc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FourCc({:?})", self.name())
    }
}

/// Metadata the SMC reports for a key. Immutable once resolved.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct KeyInfo {
    /// Data-type tag, e.g. `flt `, `sp78`, `fpe2`.
    pub data_type: FourCc,
    /// Number of value bytes for this key.
    pub data_size: u32,
}

/// A resolved SMC key: identifier plus cached metadata.
///
/// Keys are value types compared by identifier alone.
#[derive(Clone, Copy, Debug)]
pub struct SmcKey {
    pub code: FourCc,
    pub info: KeyInfo,
}

impl PartialEq for SmcKey {
    fn eq(&self, other: &Self) -> bool {
        self.code == other.code
    }
}

impl Eq for SmcKey {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fourcc_roundtrip() {
        for name in ["TC0P", "PSTR", "#KEY", "F0Ac", "flt ", "{fds"] {
            let code = FourCc::from_name(name).unwrap();
            assert_eq!(code.name(), name);
            assert_eq!(code, FourCc::from_raw(code.raw()));
        }
    }

    #[test]
    fn test_fourcc_matches_wire_packing() {
        assert_eq!(
            FourCc::from_name("TC0P").unwrap().raw(),
            u32::from_be_bytes(*b"TC0P")
        );
        // "flt " packs to 1718383648, the value mactop filters on.
        assert_eq!(FourCc::from_bytes(*b"flt ").raw(), 1_718_383_648);
    }

    #[test]
    fn test_invalid_names_rejected() {
        assert!(matches!(
            FourCc::from_name("ABC"),
            Err(Error::InvalidKey(_))
        ));
        assert!(matches!(
            FourCc::from_name("ABCDE"),
            Err(Error::InvalidKey(_))
        ));
        assert!(matches!(
            FourCc::from_name("T°0P"),
            Err(Error::InvalidKey(_))
        ));
    }

    #[test]
    fn test_keys_compare_by_identifier() {
        let a = SmcKey {
            code: FourCc::from_bytes(*b"TC0P"),
            info: KeyInfo {
                data_type: FourCc::from_bytes(*b"flt "),
                data_size: 4,
            },
        };
        let b = SmcKey {
            code: FourCc::from_bytes(*b"TC0P"),
            info: KeyInfo {
                data_type: FourCc::from_bytes(*b"sp78"),
                data_size: 2,
            },
        };
        assert_eq!(a, b);
    }
}
