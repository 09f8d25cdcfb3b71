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

//! Typed SMC values and the codecs between them and raw key bytes.
//!
//! The SMC reports a data-type tag and size per key; decoding dispatches on
//! that tag. All multi-byte values are big-endian on the wire. Unrecognized
//! tags decode to the opaque [`SmcValue::Bytes`] variant so every key stays
//! retrievable.
//!
//! ## Fixed-point formats
//! `fp`/`sp` tags name unsigned/signed 16-bit fixed-point numbers; the two
//! hex digits in the tag give integer and fraction bit counts, e.g. `fpe2`
//! is 14.2 and `sp78` is a sign bit plus 7.8. The tag-to-shift mapping is
//! the fixed table below, never inferred.
//! See <https://stackoverflow.com/questions/22160746/fpe2-and-sp78-data-types>

use crate::error::{Error, Result};
use crate::key::FourCc;

pub const TYPE_FLAG: FourCc = FourCc::from_bytes(*b"flag");
pub const TYPE_UI8: FourCc = FourCc::from_bytes(*b"ui8 ");
pub const TYPE_UI16: FourCc = FourCc::from_bytes(*b"ui16");
pub const TYPE_UI32: FourCc = FourCc::from_bytes(*b"ui32");
pub const TYPE_SI8: FourCc = FourCc::from_bytes(*b"si8 ");
pub const TYPE_SI16: FourCc = FourCc::from_bytes(*b"si16");
pub const TYPE_SI32: FourCc = FourCc::from_bytes(*b"si32");
pub const TYPE_FLT: FourCc = FourCc::from_bytes(*b"flt ");
pub const TYPE_FPE2: FourCc = FourCc::from_bytes(*b"fpe2");
pub const TYPE_SP78: FourCc = FourCc::from_bytes(*b"sp78");
/// Fan description struct defined by AppleSMC.kext; 16 bytes, name in the
/// last 12.
pub const TYPE_FDS: FourCc = FourCc::from_bytes(*b"{fds");

/// One entry of the fixed-point format table: tag, fractional bits,
/// signedness. All formats are 2 bytes wide.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct FixedFormat {
    tag: FourCc,
    fraction_bits: u8,
    signed: bool,
}

impl FixedFormat {
    const fn new(tag: [u8; 4], fraction_bits: u8, signed: bool) -> Self {
        FixedFormat {
            tag: FourCc::from_bytes(tag),
            fraction_bits,
            signed,
        }
    }

    /// Look a tag up in the fixed table.
    pub fn for_tag(tag: FourCc) -> Option<FixedFormat> {
        FIXED_FORMATS.iter().copied().find(|f| f.tag == tag)
    }

    pub const fn tag(self) -> FourCc {
        self.tag
    }

    pub const fn fraction_bits(self) -> u8 {
        self.fraction_bits
    }

    pub const fn is_signed(self) -> bool {
        self.signed
    }

    fn divisor(self) -> f64 {
        f64::from(1u32 << self.fraction_bits)
    }
}

/// The fixed-point formats the SMC is known to use.
pub const FIXED_FORMATS: &[FixedFormat] = &[
    // Unsigned fp family: integer.fraction bits sum to 16.
    FixedFormat::new(*b"fp1f", 15, false),
    FixedFormat::new(*b"fp2e", 14, false),
    FixedFormat::new(*b"fp3d", 13, false),
    FixedFormat::new(*b"fp4c", 12, false),
    FixedFormat::new(*b"fp5b", 11, false),
    FixedFormat::new(*b"fp6a", 10, false),
    FixedFormat::new(*b"fp79", 9, false),
    FixedFormat::new(*b"fp88", 8, false),
    FixedFormat::new(*b"fpa6", 6, false),
    FixedFormat::new(*b"fpc4", 4, false),
    FixedFormat::new(*b"fpe2", 2, false),
    // Signed sp family: sign bit plus integer.fraction summing to 15.
    FixedFormat::new(*b"sp1e", 14, true),
    FixedFormat::new(*b"sp3c", 12, true),
    FixedFormat::new(*b"sp4b", 11, true),
    FixedFormat::new(*b"sp5a", 10, true),
    FixedFormat::new(*b"sp69", 9, true),
    FixedFormat::new(*b"sp78", 8, true),
    FixedFormat::new(*b"sp87", 7, true),
    FixedFormat::new(*b"sp96", 6, true),
    FixedFormat::new(*b"spa5", 5, true),
    FixedFormat::new(*b"spb4", 4, true),
    FixedFormat::new(*b"spf0", 0, true),
];

/// A decoded SMC value, tagged by the key's reported data type.
#[derive(Clone, Debug, PartialEq)]
pub enum SmcValue {
    U8(u8),
    U16(u16),
    U32(u32),
    I8(i8),
    I16(i16),
    I32(i32),
    /// IEEE 754 single precision (`flt `).
    Float(f32),
    /// 16-bit fixed point, already scaled by the format's fractional shift.
    Fixed { format: FixedFormat, value: f64 },
    /// One-byte boolean (`flag`).
    Flag(bool),
    /// Opaque fallback for tags outside the known set. The original tag is
    /// kept so the value can be written back unchanged.
    Bytes { data_type: FourCc, bytes: Vec<u8> },
}

fn expect_size(data_type: FourCc, declared: usize, expected: usize) -> Result<()> {
    if declared != expected {
        return Err(Error::Decode(format!(
            "type {data_type} expects {expected} bytes, SMC declared {declared}"
        )));
    }
    Ok(())
}

impl SmcValue {
    /// Decode value bytes according to the SMC-reported type tag and size.
    ///
    /// Only `data_size` bytes of `buf` are interpreted. A `data_size`
    /// exceeding the buffer is a [`Error::Decode`], as is a numeric tag
    /// whose declared size does not match the width of that type.
    /// Unrecognized tags fall back to [`SmcValue::Bytes`].
    pub fn decode(buf: &[u8], data_type: FourCc, data_size: u32) -> Result<SmcValue> {
        let size = data_size as usize;
        if size > buf.len() {
            return Err(Error::Decode(format!(
                "declared size {size} for type {data_type} exceeds {} available bytes",
                buf.len()
            )));
        }
        let data = &buf[..size];

        match data_type {
            TYPE_UI8 => {
                expect_size(data_type, size, 1)?;
                Ok(SmcValue::U8(data[0]))
            }
            TYPE_UI16 => {
                expect_size(data_type, size, 2)?;
                Ok(SmcValue::U16(u16::from_be_bytes([data[0], data[1]])))
            }
            TYPE_UI32 => {
                expect_size(data_type, size, 4)?;
                Ok(SmcValue::U32(u32::from_be_bytes([
                    data[0], data[1], data[2], data[3],
                ])))
            }
            TYPE_SI8 => {
                expect_size(data_type, size, 1)?;
                Ok(SmcValue::I8(data[0] as i8))
            }
            TYPE_SI16 => {
                expect_size(data_type, size, 2)?;
                Ok(SmcValue::I16(i16::from_be_bytes([data[0], data[1]])))
            }
            TYPE_SI32 => {
                expect_size(data_type, size, 4)?;
                Ok(SmcValue::I32(i32::from_be_bytes([
                    data[0], data[1], data[2], data[3],
                ])))
            }
            TYPE_FLT => {
                expect_size(data_type, size, 4)?;
                Ok(SmcValue::Float(f32::from_be_bytes([
                    data[0], data[1], data[2], data[3],
                ])))
            }
            TYPE_FLAG => {
                expect_size(data_type, size, 1)?;
                Ok(SmcValue::Flag(data[0] != 0))
            }
            other => {
                if let Some(format) = FixedFormat::for_tag(other) {
                    expect_size(other, size, 2)?;
                    let value = if format.signed {
                        f64::from(i16::from_be_bytes([data[0], data[1]])) / format.divisor()
                    } else {
                        f64::from(u16::from_be_bytes([data[0], data[1]])) / format.divisor()
                    };
                    Ok(SmcValue::Fixed { format, value })
                } else {
                    Ok(SmcValue::Bytes {
                        data_type: other,
                        bytes: data.to_vec(),
                    })
                }
            }
        }
    }

    /// Encode back to wire bytes. Inverse of [`SmcValue::decode`]: for every
    /// tag in the fixed-point table the round trip is bit-for-bit.
    ///
    /// A fixed-point value outside its format's 16-bit range (or a
    /// non-finite one) is an [`Error::Encode`]; the `as` casts would
    /// saturate it into a wrong-but-plausible wire pattern otherwise.
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(match self {
            SmcValue::U8(v) => vec![*v],
            SmcValue::U16(v) => v.to_be_bytes().to_vec(),
            SmcValue::U32(v) => v.to_be_bytes().to_vec(),
            SmcValue::I8(v) => vec![*v as u8],
            SmcValue::I16(v) => v.to_be_bytes().to_vec(),
            SmcValue::I32(v) => v.to_be_bytes().to_vec(),
            SmcValue::Float(v) => v.to_be_bytes().to_vec(),
            SmcValue::Fixed { format, value } => {
                let scaled = (value * format.divisor()).round();
                if format.signed {
                    if !(f64::from(i16::MIN)..=f64::from(i16::MAX)).contains(&scaled) {
                        return Err(Error::Encode(format!(
                            "{value} is out of range for fixed-point type {}",
                            format.tag()
                        )));
                    }
                    (scaled as i16).to_be_bytes().to_vec()
                } else {
                    if !(0.0..=f64::from(u16::MAX)).contains(&scaled) {
                        return Err(Error::Encode(format!(
                            "{value} is out of range for fixed-point type {}",
                            format.tag()
                        )));
                    }
                    (scaled as u16).to_be_bytes().to_vec()
                }
            }
            SmcValue::Flag(v) => vec![u8::from(*v)],
            SmcValue::Bytes { bytes, .. } => bytes.clone(),
        })
    }

    /// The type tag this value encodes as.
    pub fn data_type(&self) -> FourCc {
        match self {
            SmcValue::U8(_) => TYPE_UI8,
            SmcValue::U16(_) => TYPE_UI16,
            SmcValue::U32(_) => TYPE_UI32,
            SmcValue::I8(_) => TYPE_SI8,
            SmcValue::I16(_) => TYPE_SI16,
            SmcValue::I32(_) => TYPE_SI32,
            SmcValue::Float(_) => TYPE_FLT,
            SmcValue::Fixed { format, .. } => format.tag(),
            SmcValue::Flag(_) => TYPE_FLAG,
            SmcValue::Bytes { data_type, .. } => *data_type,
        }
    }

    /// Numeric view of the value, if it has one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SmcValue::U8(v) => Some(f64::from(*v)),
            SmcValue::U16(v) => Some(f64::from(*v)),
            SmcValue::U32(v) => Some(f64::from(*v)),
            SmcValue::I8(v) => Some(f64::from(*v)),
            SmcValue::I16(v) => Some(f64::from(*v)),
            SmcValue::I32(v) => Some(f64::from(*v)),
            SmcValue::Float(v) => Some(f64::from(*v)),
            SmcValue::Fixed { value, .. } => Some(*value),
            SmcValue::Flag(_) | SmcValue::Bytes { .. } => None,
        }
    }
}
