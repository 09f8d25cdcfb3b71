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

//! Well-known SMC keys.
//!
//! Key codes are 4-byte multi-character constants. Not every key exists on
//! every machine, and the letter meanings are presumed rather than
//! documented (T = temperature, C = CPU, G = GPU, P = proximity,
//! D = diode, H = heatsink). Collected from smcFanControl,
//! OSX-Monitoring-Tools, and the istatpro key lists.

use crate::error::{Error, Result};
use crate::key::FourCc;

/// `#KEY`: total number of keys this machine's SMC exposes (ui32).
pub const KEY_COUNT: FourCc = FourCc::from_bytes(*b"#KEY");
/// `FNum`: number of fans (ui8).
pub const FAN_COUNT: FourCc = FourCc::from_bytes(*b"FNum");
/// `BATP`: machine is running on battery power (flag).
pub const BATTERY_POWERED: FourCc = FourCc::from_bytes(*b"BATP");
/// `BSIn`: battery state bitfield (bit 0 charging, bit 1 AC present).
pub const BATTERY_INFO: FourCc = FourCc::from_bytes(*b"BSIn");
/// `BNum`: maximum number of batteries (ui8).
pub const BATTERY_COUNT: FourCc = FourCc::from_bytes(*b"BNum");
/// `MSDI`: optical disk drive has a disk inserted (flag).
pub const OPTICAL_DISK_FULL: FourCc = FourCc::from_bytes(*b"MSDI");

/// A temperature sensor with a known hardware mapping.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TemperatureSensor {
    pub code: FourCc,
    pub label: &'static str,
}

const fn sensor(code: [u8; 4], label: &'static str) -> TemperatureSensor {
    TemperatureSensor {
        code: FourCc::from_bytes(code),
        label,
    }
}

/// Temperature sensors whose hardware mapping is known. The list is
/// incomplete by nature; machines expose different subsets.
pub const TEMPERATURE_SENSORS: &[TemperatureSensor] = &[
    sensor(*b"TA0P", "Ambient air 0"),
    sensor(*b"TA1P", "Ambient air 1"),
    sensor(*b"TB0T", "Enclosure base 0"),
    sensor(*b"TB1T", "Enclosure base 1"),
    sensor(*b"TB2T", "Enclosure base 2"),
    sensor(*b"TC0D", "CPU 0 diode"),
    sensor(*b"TC0F", "CPU 0 die"),
    sensor(*b"TC0H", "CPU 0 heatsink"),
    sensor(*b"TC0P", "CPU 0 proximity"),
    sensor(*b"TG0D", "GPU 0 diode"),
    sensor(*b"TG0H", "GPU 0 heatsink"),
    sensor(*b"TG0P", "GPU 0 proximity"),
    sensor(*b"TH0P", "Hard drive bay"),
    sensor(*b"Th0H", "Heatsink 0"),
    sensor(*b"Th1H", "Heatsink 1"),
    sensor(*b"TI0P", "Thunderbolt 0"),
    sensor(*b"TI1P", "Thunderbolt 1"),
    sensor(*b"TL0P", "LCD proximity"),
    sensor(*b"TM0P", "Memory slots proximity"),
    sensor(*b"TM0S", "Memory slot 0"),
    sensor(*b"Tm0P", "Misc proximity"),
    sensor(*b"TN0D", "Northbridge diode"),
    sensor(*b"TN0H", "Northbridge heatsink"),
    sensor(*b"TN0P", "Northbridge proximity"),
    sensor(*b"TO0P", "Optical drive proximity"),
    sensor(*b"Tp0P", "Power supply proximity"),
    sensor(*b"Ts0P", "Palm rest"),
];

/// Build a fan key such as `F0Ac` (actual RPM), `F0Mn` (minimum),
/// `F0Mx` (maximum), `F0ID` (description), `F0Tg` (target).
///
/// Fan ids above 9 would not fit the FourCC and no machine has that many.
pub fn fan_key(fan: u32, suffix: &str) -> Result<FourCc> {
    if fan > 9 {
        return Err(Error::InvalidKey(format!("fan id {fan} out of range")));
    }
    FourCc::from_name(&format!("F{fan}{suffix}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fan_key_format() {
        assert_eq!(fan_key(0, "Ac").unwrap().name(), "F0Ac");
        assert_eq!(fan_key(3, "Mx").unwrap().name(), "F3Mx");
    }

    #[test]
    fn test_fan_id_out_of_range() {
        assert!(matches!(fan_key(10, "Ac"), Err(Error::InvalidKey(_))));
    }

    #[test]
    fn test_sensor_codes_are_valid_fourcc() {
        for sensor in TEMPERATURE_SENSORS {
            assert_eq!(sensor.code.name().len(), 4);
            assert!(!sensor.label.is_empty());
        }
    }
}
