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

//! Integration tests for the convenience accessors: temperatures, fans,
//! battery and power state.

use smckit::mock::MockSmc;
use smckit::{Error, FourCc, Smc, TemperatureUnit};

fn laptop() -> (Smc, smckit::mock::MockHandle) {
    let mock = MockSmc::new()
        // Apple Silicon style float sensor and an Intel style sp78 diode.
        .with_key("TC0P", "flt ", &[0x42, 0x00, 0x00, 0x00])
        .with_key("TC0D", "sp78", &[0x20, 0x00])
        // One exhaust fan: 1200 current, 600 min, 7000 max.
        .with_key("FNum", "ui8 ", &[0x01])
        .with_key("F0Ac", "fpe2", &[0x12, 0xc0])
        .with_key("F0Mn", "fpe2", &[0x09, 0x60])
        .with_key("F0Mx", "fpe2", &[0x6d, 0x60])
        .with_key(
            "F0ID",
            "{fds",
            &[
                0x00, 0x00, 0x00, 0x00, b'E', b'x', b'h', b'a', b'u', b's', b't', 0x00, 0x00,
                0x00, 0x00, 0x00,
            ],
        )
        // On AC, charging, battery healthy (bit 6).
        .with_key("BATP", "flag", &[0x00])
        .with_key("BSIn", "ui8 ", &[0b0100_0011])
        .with_key("BNum", "ui8 ", &[0x01])
        .with_key("MSDI", "flag", &[0x00]);
    let handle = mock.handle();
    (Smc::with_transport(Box::new(mock)), handle)
}

#[test]
fn test_temperature_celsius_from_float_sensor() {
    let (smc, _) = laptop();
    let code = FourCc::from_bytes(*b"TC0P");
    assert_eq!(smc.temperature(code).unwrap(), 32.0);
}

#[test]
fn test_temperature_from_sp78_sensor() {
    let (smc, _) = laptop();
    let code = FourCc::from_bytes(*b"TC0D");
    assert_eq!(smc.temperature(code).unwrap(), 32.0);
}

#[test]
fn test_temperature_unit_conversion() {
    let (smc, _) = laptop();
    let code = FourCc::from_bytes(*b"TC0P");
    let fahrenheit = smc
        .temperature_in(code, TemperatureUnit::Fahrenheit)
        .unwrap();
    assert!((fahrenheit - 89.6).abs() < 1e-9);
    let kelvin = smc.temperature_in(code, TemperatureUnit::Kelvin).unwrap();
    assert!((kelvin - 305.15).abs() < 1e-9);
}

#[test]
fn test_temperature_of_non_numeric_key_is_type_mismatch() {
    let (smc, _) = laptop();
    let code = FourCc::from_bytes(*b"BATP");
    assert!(matches!(
        smc.temperature(code),
        Err(Error::TypeMismatch { .. })
    ));
}

#[test]
fn test_known_temperature_sensors_probes_table() {
    let (smc, _) = laptop();
    let sensors = smc.known_temperature_sensors().unwrap();
    let codes: Vec<_> = sensors.iter().map(|s| s.code.name()).collect();
    // Table order: the diode entry precedes the proximity entry.
    assert_eq!(codes, vec!["TC0D", "TC0P"]);
}

#[test]
fn test_fan_count_and_speeds() {
    let (smc, _) = laptop();
    assert_eq!(smc.fan_count().unwrap(), 1);
    assert_eq!(smc.fan_current_speed(0).unwrap(), 1200.0);
    assert_eq!(smc.fan_min_speed(0).unwrap(), 600.0);
    assert_eq!(smc.fan_max_speed(0).unwrap(), 7000.0);
}

#[test]
fn test_fan_name_from_fds_struct() {
    let (smc, _) = laptop();
    assert_eq!(smc.fan_name(0).unwrap(), "Exhaust");
}

#[test]
fn test_missing_fan_is_unknown_key() {
    let (smc, _) = laptop();
    assert!(matches!(
        smc.fan_current_speed(1),
        Err(Error::UnknownKey(_))
    ));
}

#[test]
fn test_set_fan_min_speed_writes_fpe2() {
    let (smc, handle) = laptop();
    smc.set_fan_min_speed(0, 1200).unwrap();
    assert_eq!(handle.write_count(), 1);
    assert_eq!(handle.key_bytes("F0Mn").unwrap(), vec![0x12, 0xc0]);
}

#[test]
fn test_unsafe_fan_speed_refused_before_write() {
    let (smc, handle) = laptop();
    assert!(matches!(
        smc.set_fan_min_speed(0, 9000),
        Err(Error::UnsafeFanSpeed { rpm: 9000, max: 7000 })
    ));
    assert_eq!(handle.write_count(), 0);
}

#[test]
fn test_battery_and_power_state() {
    let (smc, _) = laptop();
    assert!(!smc.is_on_battery_power().unwrap());
    assert!(smc.is_charging().unwrap());
    assert!(smc.is_ac_present().unwrap());
    assert!(smc.is_battery_ok().unwrap());
    assert_eq!(smc.battery_count().unwrap(), 1);
}

#[test]
fn test_failing_battery_reported_not_ok() {
    // Discharging with the health bit clear.
    let mock = MockSmc::new().with_key("BSIn", "ui8 ", &[0b0000_0000]);
    let smc = Smc::with_transport(Box::new(mock));
    assert!(!smc.is_battery_ok().unwrap());
    assert!(!smc.is_charging().unwrap());
}

#[test]
fn test_optical_disk_drive_empty() {
    let (smc, _) = laptop();
    assert!(!smc.is_optical_disk_drive_full().unwrap());
}

#[test]
fn test_fan_count_with_unexpected_type_is_mismatch() {
    // FNum carries ui8; a fixed-point report must not coerce through a
    // numeric cast (a negative reading would become 0).
    let mock = MockSmc::new().with_key("FNum", "fpe2", &[0x00, 0x04]);
    let smc = Smc::with_transport(Box::new(mock));
    assert!(matches!(smc.fan_count(), Err(Error::TypeMismatch { .. })));
}

#[test]
fn test_well_known_key_with_unexpected_type_is_mismatch() {
    // A machine whose #KEY misreports as ui8 must not silently coerce.
    let mock = MockSmc::new().with_key("#KEY", "ui8 ", &[0x05]);
    let smc = Smc::with_transport(Box::new(mock));
    assert!(matches!(
        smc.key_count(),
        Err(Error::TypeMismatch { .. })
    ));
}

#[test]
fn test_is_key_valid() {
    let (smc, _) = laptop();
    assert!(smc.is_key_valid("TC0P").unwrap());
    assert!(!smc.is_key_valid("TW0P").unwrap());
}
