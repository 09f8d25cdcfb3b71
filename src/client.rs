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

//! The SMC client: typed read/write accessors, convenience getters for
//! temperatures, fans, and battery state, and key enumeration.
//!
//! One client owns one device channel. The underlying device serializes
//! all exchanges, so the transport and metadata cache live behind a single
//! mutex and every logical operation (resolve plus read or write) holds it
//! for its full duration. Calls block until the device answers or the
//! retry budget runs out; there is no cancellation.

use std::sync::{Mutex, MutexGuard};

use tracing::debug;

use crate::error::{Error, Result};
use crate::key::{FourCc, SmcKey};
use crate::registry::KeyCache;
use crate::sensors::{self, TemperatureSensor};
use crate::transport::{
    cmd, exchange, result_code, SmcKeyInfoData, SmcParamStruct, Transport, MAX_PAYLOAD,
};
use crate::value::{FixedFormat, SmcValue, TYPE_FDS, TYPE_FLAG, TYPE_FLT, TYPE_FPE2, TYPE_UI32, TYPE_UI8};

/// Temperature units for the convenience getters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum TemperatureUnit {
    #[default]
    Celsius,
    Fahrenheit,
    Kelvin,
}

struct Inner {
    transport: Box<dyn Transport>,
    cache: KeyCache,
}

/// A connection to the System Management Controller.
///
/// Safe to share across threads; exchanges are serialized internally. The
/// channel closes when the client is dropped (or via [`Smc::close`]).
///
/// # Example
///
/// ```rust,no_run
/// use smckit::Smc;
///
/// fn main() -> smckit::Result<()> {
///     let smc = Smc::open()?;
///     println!("CPU proximity: {:?}", smc.read_value("TC0P")?);
///     for key in smc.keys()? {
///         println!("{}", key?.code);
///     }
///     Ok(())
/// }
/// ```
pub struct Smc {
    inner: Mutex<Inner>,
}

impl Smc {
    /// Open the AppleSMC device channel.
    #[cfg(target_os = "macos")]
    pub fn open() -> Result<Self> {
        let transport = crate::transport::IoKitTransport::open()?;
        debug!("opened AppleSMC connection");
        Ok(Self::with_transport(Box::new(transport)))
    }

    /// SMC access requires macOS; this always fails elsewhere.
    #[cfg(not(target_os = "macos"))]
    pub fn open() -> Result<Self> {
        Err(Error::Unsupported)
    }

    /// Build a client over any transport, e.g. the
    /// [`MockSmc`](crate::mock::MockSmc) simulator.
    pub fn with_transport(transport: Box<dyn Transport>) -> Self {
        Smc {
            inner: Mutex::new(Inner {
                transport,
                cache: KeyCache::new(),
            }),
        }
    }

    /// Explicitly shut the channel down. Equivalent to dropping.
    pub fn close(self) {}

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A panic while holding the guard leaves no broken invariant
        // behind; recover the inner state instead of propagating poison.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Resolve a key's metadata (type tag and size), from cache when known.
    pub fn key_information(&self, name: &str) -> Result<SmcKey> {
        let code = FourCc::from_name(name)?;
        self.lock().resolve(code)
    }

    /// Whether a key exists on this machine. Useful for probing which
    /// sensors or fans a model has.
    pub fn is_key_valid(&self, name: &str) -> Result<bool> {
        let code = FourCc::from_name(name)?;
        self.probe(code)
    }

    fn probe(&self, code: FourCc) -> Result<bool> {
        match self.lock().resolve(code) {
            Ok(_) => Ok(true),
            Err(Error::UnknownKey(_)) => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Read and decode a key's current value.
    pub fn read_value(&self, name: &str) -> Result<SmcValue> {
        let code = FourCc::from_name(name)?;
        self.lock().read_key(code)
    }

    /// Write a typed value to a key.
    ///
    /// The value's type tag and width must match what the SMC reports for
    /// the key; mismatches are refused with [`Error::TypeMismatch`] before
    /// any write reaches the device. SMC writes drive hardware (fan
    /// control among them) and silently corrupted widths are not an
    /// acceptable failure mode.
    pub fn write_value(&self, name: &str, value: &SmcValue) -> Result<()> {
        let code = FourCc::from_name(name)?;
        self.lock().write_key(code, value)
    }

    /// Number of keys this machine's SMC exposes (the `#KEY` read).
    pub fn key_count(&self) -> Result<u32> {
        match self.lock().read_key(sensors::KEY_COUNT)? {
            SmcValue::U32(count) => Ok(count),
            other => Err(Error::TypeMismatch {
                key: sensors::KEY_COUNT,
                expected: TYPE_UI32,
                found: other.data_type(),
            }),
        }
    }

    /// Lazily enumerate every key the SMC exposes, in index order.
    ///
    /// Each step is one read-by-index exchange plus a (cached) metadata
    /// resolve. A terminal error is yielded once, then the iterator ends;
    /// call `keys()` again to restart from index 0.
    pub fn keys(&self) -> Result<KeyIter<'_>> {
        let count = self.key_count()?;
        Ok(KeyIter {
            smc: self,
            index: 0,
            count,
            done: false,
        })
    }

    fn key_at_index(&self, index: u32) -> Result<SmcKey> {
        let mut inner = self.lock();
        let input = SmcParamStruct {
            data8: cmd::READ_INDEX,
            data32: index,
            ..Default::default()
        };
        let output = exchange(inner.transport.as_mut(), &input)?;
        if output.result != result_code::SUCCESS {
            return Err(Error::Io(format!(
                "read of key index {index} failed with SMC result {:#04x}",
                output.result
            )));
        }
        let code = FourCc::from_raw(output.key);
        inner.resolve(code)
    }
}

/// Convenience accessors over well-known keys. All are thin projections
/// over the typed read/write path and share its error taxonomy, adding
/// [`Error::TypeMismatch`] when hardware reports an unexpected type for a
/// well-known key.
impl Smc {
    /// Temperature of a sensor in Celsius.
    pub fn temperature(&self, sensor: FourCc) -> Result<f64> {
        self.temperature_in(sensor, TemperatureUnit::Celsius)
    }

    /// Temperature of a sensor in the requested unit.
    ///
    /// Accepts `flt ` (Apple Silicon) and the fixed-point `sp` readings
    /// (Intel, typically `sp78`).
    pub fn temperature_in(&self, sensor: FourCc, unit: TemperatureUnit) -> Result<f64> {
        let value = self.lock().read_key(sensor)?;
        let celsius = match &value {
            SmcValue::Float(v) => f64::from(*v),
            SmcValue::Fixed { value, .. } => *value,
            other => {
                return Err(Error::TypeMismatch {
                    key: sensor,
                    expected: TYPE_FLT,
                    found: other.data_type(),
                })
            }
        };
        Ok(match unit {
            TemperatureUnit::Celsius => celsius,
            TemperatureUnit::Fahrenheit => celsius * 1.8 + 32.0,
            TemperatureUnit::Kelvin => celsius + 273.15,
        })
    }

    /// The subset of [`sensors::TEMPERATURE_SENSORS`] present on this
    /// machine.
    pub fn known_temperature_sensors(&self) -> Result<Vec<TemperatureSensor>> {
        let mut present = Vec::new();
        for sensor in sensors::TEMPERATURE_SENSORS {
            if self.probe(sensor.code)? {
                present.push(*sensor);
            }
        }
        Ok(present)
    }

    /// Number of fans on this machine (`FNum`, a `ui8 `).
    pub fn fan_count(&self) -> Result<u32> {
        match self.lock().read_key(sensors::FAN_COUNT)? {
            SmcValue::U8(count) => Ok(u32::from(count)),
            other => Err(Error::TypeMismatch {
                key: sensors::FAN_COUNT,
                expected: TYPE_UI8,
                found: other.data_type(),
            }),
        }
    }

    /// Current speed of a fan in RPM (`F{n}Ac`).
    pub fn fan_current_speed(&self, fan: u32) -> Result<f64> {
        self.fan_reading(fan, "Ac")
    }

    /// Minimum speed of a fan in RPM (`F{n}Mn`).
    pub fn fan_min_speed(&self, fan: u32) -> Result<f64> {
        self.fan_reading(fan, "Mn")
    }

    /// Maximum speed of a fan in RPM (`F{n}Mx`).
    pub fn fan_max_speed(&self, fan: u32) -> Result<f64> {
        self.fan_reading(fan, "Mx")
    }

    fn fan_reading(&self, fan: u32, suffix: &str) -> Result<f64> {
        let code = sensors::fan_key(fan, suffix)?;
        let value = self.lock().read_key(code)?;
        value.as_f64().ok_or(Error::TypeMismatch {
            key: code,
            expected: TYPE_FPE2,
            found: value.data_type(),
        })
    }

    /// Name of a fan from its `{fds` description struct (`F{n}ID`).
    pub fn fan_name(&self, fan: u32) -> Result<String> {
        let code = sensors::fan_key(fan, "ID")?;
        match self.lock().read_key(code)? {
            SmcValue::Bytes { data_type, bytes } if data_type == TYPE_FDS => {
                // Name lives in the last 12 bytes of the 16-byte struct,
                // NUL padded.
                let name: String = bytes
                    .get(4..)
                    .unwrap_or(&[])
                    .iter()
                    .take_while(|&&b| b != 0)
                    .map(|&b| b as char)
                    .collect();
                Ok(name.trim().to_string())
            }
            other => Err(Error::TypeMismatch {
                key: code,
                expected: TYPE_FDS,
                found: other.data_type(),
            }),
        }
    }

    /// Override a fan's minimum speed. Requires root.
    ///
    /// macOS may still raise the fan above this floor, but never below.
    /// Requests above the fan's reported maximum are refused with
    /// [`Error::UnsafeFanSpeed`] before anything is written. The max read,
    /// the check, and the write run under one lock acquisition so no other
    /// caller can interleave.
    pub fn set_fan_min_speed(&self, fan: u32, rpm: u32) -> Result<()> {
        let max_code = sensors::fan_key(fan, "Mx")?;
        let code = sensors::fan_key(fan, "Mn")?;

        let mut inner = self.lock();
        let max_value = inner.read_key(max_code)?;
        let max = max_value.as_f64().ok_or(Error::TypeMismatch {
            key: max_code,
            expected: TYPE_FPE2,
            found: max_value.data_type(),
        })?;
        if f64::from(rpm) > max {
            return Err(Error::UnsafeFanSpeed {
                rpm,
                max: max as u32,
            });
        }

        let key = inner.resolve(code)?;
        let value = if let Some(format) = FixedFormat::for_tag(key.info.data_type) {
            SmcValue::Fixed {
                format,
                value: f64::from(rpm),
            }
        } else if key.info.data_type == TYPE_FLT {
            SmcValue::Float(rpm as f32)
        } else {
            return Err(Error::TypeMismatch {
                key: code,
                expected: TYPE_FPE2,
                found: key.info.data_type,
            });
        };
        debug!(fan, rpm, key = %code, "setting fan minimum speed");
        inner.write_key(code, &value)
    }

    /// Whether the machine is running on battery power (`BATP`).
    pub fn is_on_battery_power(&self) -> Result<bool> {
        self.flag(sensors::BATTERY_POWERED)
    }

    /// Whether the battery is charging (`BSIn` bit 0).
    pub fn is_charging(&self) -> Result<bool> {
        Ok(self.battery_info_bits()? & 1 == 1)
    }

    /// Whether AC power is present (`BSIn` bit 1).
    pub fn is_ac_present(&self) -> Result<bool> {
        Ok((self.battery_info_bits()? >> 1) & 1 == 1)
    }

    /// Whether the battery reports itself healthy (`BSIn` bit 6).
    pub fn is_battery_ok(&self) -> Result<bool> {
        Ok((self.battery_info_bits()? >> 6) & 1 == 1)
    }

    /// Maximum number of batteries (`BNum`): 0 for desktops, 1 for
    /// laptops.
    pub fn battery_count(&self) -> Result<u32> {
        match self.lock().read_key(sensors::BATTERY_COUNT)? {
            SmcValue::U8(count) => Ok(u32::from(count)),
            other => Err(Error::TypeMismatch {
                key: sensors::BATTERY_COUNT,
                expected: TYPE_UI8,
                found: other.data_type(),
            }),
        }
    }

    /// Whether the optical disk drive has a disk inserted (`MSDI`).
    pub fn is_optical_disk_drive_full(&self) -> Result<bool> {
        self.flag(sensors::OPTICAL_DISK_FULL)
    }

    fn battery_info_bits(&self) -> Result<u8> {
        match self.lock().read_key(sensors::BATTERY_INFO)? {
            SmcValue::U8(bits) => Ok(bits),
            other => Err(Error::TypeMismatch {
                key: sensors::BATTERY_INFO,
                expected: TYPE_UI8,
                found: other.data_type(),
            }),
        }
    }

    fn flag(&self, code: FourCc) -> Result<bool> {
        match self.lock().read_key(code)? {
            SmcValue::Flag(flag) => Ok(flag),
            other => Err(Error::TypeMismatch {
                key: code,
                expected: TYPE_FLAG,
                found: other.data_type(),
            }),
        }
    }
}

impl Inner {
    fn resolve(&mut self, code: FourCc) -> Result<SmcKey> {
        self.cache.resolve(self.transport.as_mut(), code)
    }

    fn read_key(&mut self, code: FourCc) -> Result<SmcValue> {
        let key = self.resolve(code)?;
        let input = SmcParamStruct {
            key: code.raw(),
            key_info: SmcKeyInfoData {
                data_size: key.info.data_size,
                ..Default::default()
            },
            data8: cmd::READ_BYTES,
            ..Default::default()
        };
        let output = exchange(self.transport.as_mut(), &input)?;
        check_result(code, output.result)?;
        SmcValue::decode(&output.bytes, key.info.data_type, key.info.data_size)
    }

    fn write_key(&mut self, code: FourCc, value: &SmcValue) -> Result<()> {
        let key = self.resolve(code)?;

        // The device answers metadata; a size past the wire payload is a
        // malformed report, not a caller bug.
        let size = key.info.data_size as usize;
        if size > MAX_PAYLOAD {
            return Err(Error::Decode(format!(
                "declared size {size} for key {code} exceeds the {MAX_PAYLOAD}-byte payload"
            )));
        }

        let found = value.data_type();
        if found != key.info.data_type {
            return Err(Error::TypeMismatch {
                key: code,
                expected: key.info.data_type,
                found,
            });
        }
        let data = value.encode()?;
        if data.len() != size {
            return Err(Error::TypeMismatch {
                key: code,
                expected: key.info.data_type,
                found,
            });
        }

        let mut input = SmcParamStruct {
            key: code.raw(),
            key_info: SmcKeyInfoData {
                data_size: key.info.data_size,
                ..Default::default()
            },
            data8: cmd::WRITE_BYTES,
            ..Default::default()
        };
        input.bytes[..data.len()].copy_from_slice(&data);

        let output = exchange(self.transport.as_mut(), &input)?;
        check_result(code, output.result)
    }
}

fn check_result(code: FourCc, result: u8) -> Result<()> {
    match result {
        result_code::SUCCESS => Ok(()),
        result_code::KEY_NOT_FOUND => Err(Error::UnknownKey(code)),
        other => Err(Error::Io(format!(
            "exchange for {code} failed with SMC result {other:#04x}"
        ))),
    }
}

/// Lazy, restartable walk over every key the SMC exposes.
pub struct KeyIter<'a> {
    smc: &'a Smc,
    index: u32,
    count: u32,
    done: bool,
}

impl KeyIter<'_> {
    /// Total number of keys the device reported at iterator creation.
    pub fn total(&self) -> u32 {
        self.count
    }
}

impl Iterator for KeyIter<'_> {
    type Item = Result<SmcKey>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.index >= self.count {
            return None;
        }
        match self.smc.key_at_index(self.index) {
            Ok(key) => {
                self.index += 1;
                Some(Ok(key))
            }
            Err(err) => {
                // Terminal: surface once, then end rather than silently
                // truncate.
                self.done = true;
                Some(Err(err))
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.done {
            return (0, Some(0));
        }
        let remaining = (self.count - self.index) as usize;
        (0, Some(remaining))
    }
}
