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

//! Typed access to the Apple System Management Controller (SMC).
//!
//! The SMC manages sensors independent of the main processor: temperature
//! diodes, fan tachometers and targets, battery state. Each value is named
//! by a 4-character key (e.g. `TC0P`, CPU proximity temperature) and
//! carries a type tag the SMC reports alongside the bytes. This crate
//! talks to the AppleSMC kernel extension over IOKit and decodes those
//! values into a typed enum.
//!
//! # Example
//!
//! ```rust,no_run
//! use smckit::Smc;
//!
//! fn main() -> smckit::Result<()> {
//!     let smc = Smc::open()?;
//!     for sensor in smc.known_temperature_sensors()? {
//!         let celsius = smc.temperature(sensor.code)?;
//!         println!("{:24} {:5.1} °C", sensor.label, celsius);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! Everything above the IOKit call is platform-neutral: the
//! [`mock::MockSmc`] simulator implements the same wire protocol and
//! drives the full stack in tests and on non-Apple machines.

pub mod client;
pub mod error;
pub mod key;
pub mod mock;
pub mod sensors;
pub mod transport;
pub mod value;

mod registry;

pub use client::{KeyIter, Smc, TemperatureUnit};
pub use error::{Error, Result};
pub use key::{FourCc, KeyInfo, SmcKey};
pub use sensors::TemperatureSensor;
pub use value::{FixedFormat, SmcValue};
