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

//! Simulated SMC device.
//!
//! [`MockSmc`] speaks the real [`SmcParamStruct`] protocol over an
//! in-memory key table: register keys with a type tag and value bytes,
//! hand the transport to [`Smc::with_transport`](crate::Smc::with_transport),
//! and drive the full client stack without hardware. A [`MockHandle`]
//! stays usable after the transport is moved into the client and exposes
//! exchange counters, written-back bytes, and a transient-failure
//! injector.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::{Error, Result};
use crate::key::{FourCc, KeyInfo};
use crate::sensors;
use crate::transport::{cmd, result_code, SmcParamStruct, Transport, MAX_PAYLOAD};
use crate::value;

struct MockKey {
    code: FourCc,
    info: KeyInfo,
    bytes: [u8; MAX_PAYLOAD],
}

#[derive(Default)]
struct MockShared {
    keys: Mutex<Vec<MockKey>>,
    exchanges: AtomicUsize,
    write_exchanges: AtomicUsize,
    busy_remaining: AtomicUsize,
}

/// In-memory SMC device implementing [`Transport`].
///
/// Enumeration order follows registration order. The `#KEY` count key is
/// synthesized from the number of registered keys unless a key table entry
/// overrides it.
pub struct MockSmc {
    shared: Arc<MockShared>,
}

impl Default for MockSmc {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSmc {
    pub fn new() -> Self {
        MockSmc {
            shared: Arc::default(),
        }
    }

    /// Register a key. Builder-style companion to [`MockSmc::insert_key`].
    pub fn with_key(self, name: &str, data_type: &str, data: &[u8]) -> Self {
        self.insert_key(name, data_type, data);
        self
    }

    /// Register a key with its type tag and value bytes. The declared size
    /// is the byte count given here.
    ///
    /// Panics on malformed names or oversized payloads; this is test
    /// scaffolding and misuse is a bug in the test.
    pub fn insert_key(&self, name: &str, data_type: &str, data: &[u8]) {
        let code = match FourCc::from_name(name) {
            Ok(code) => code,
            Err(_) => panic!("mock key name {name:?} is not a FourCC"),
        };
        let tag = match FourCc::from_name(data_type) {
            Ok(tag) => tag,
            Err(_) => panic!("mock data type {data_type:?} is not a FourCC"),
        };
        assert!(
            data.len() <= MAX_PAYLOAD,
            "mock value for {name} exceeds the {MAX_PAYLOAD}-byte payload"
        );

        let mut bytes = [0u8; MAX_PAYLOAD];
        bytes[..data.len()].copy_from_slice(data);
        let key = MockKey {
            code,
            info: KeyInfo {
                data_type: tag,
                data_size: data.len() as u32,
            },
            bytes,
        };

        let mut keys = lock(&self.shared.keys);
        if let Some(existing) = keys.iter_mut().find(|k| k.code == code) {
            *existing = key;
        } else {
            keys.push(key);
        }
    }

    /// Handle for counters and state inspection; stays valid after the
    /// transport is moved into a client.
    pub fn handle(&self) -> MockHandle {
        MockHandle {
            shared: Arc::clone(&self.shared),
        }
    }
}

/// Observer/controller handle for a [`MockSmc`].
#[derive(Clone)]
pub struct MockHandle {
    shared: Arc<MockShared>,
}

impl MockHandle {
    /// Total exchanges attempted, including ones that failed busy.
    pub fn exchange_count(&self) -> usize {
        self.shared.exchanges.load(Ordering::SeqCst)
    }

    /// Write exchanges that reached the device.
    pub fn write_count(&self) -> usize {
        self.shared.write_exchanges.load(Ordering::SeqCst)
    }

    /// Reset the exchange and write counters.
    pub fn reset_counters(&self) {
        self.shared.exchanges.store(0, Ordering::SeqCst);
        self.shared.write_exchanges.store(0, Ordering::SeqCst);
    }

    /// Fail the next `n` exchanges with a transient busy error.
    pub fn fail_next(&self, n: usize) {
        self.shared.busy_remaining.store(n, Ordering::SeqCst);
    }

    /// Current value bytes of a registered key, e.g. to assert a write
    /// landed.
    pub fn key_bytes(&self, name: &str) -> Option<Vec<u8>> {
        let code = FourCc::from_name(name).ok()?;
        let keys = lock(&self.shared.keys);
        keys.iter()
            .find(|k| k.code == code)
            .map(|k| k.bytes[..k.info.data_size as usize].to_vec())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MockShared {
    fn key_count_bytes(&self) -> [u8; 4] {
        let count = lock(&self.keys).len() as u32;
        count.to_be_bytes()
    }
}

impl Transport for MockSmc {
    fn exchange(&mut self, input: &SmcParamStruct) -> Result<SmcParamStruct> {
        self.shared.exchanges.fetch_add(1, Ordering::SeqCst);

        if self.shared.busy_remaining.load(Ordering::SeqCst) > 0 {
            self.shared.busy_remaining.fetch_sub(1, Ordering::SeqCst);
            return Err(Error::Busy);
        }

        let code = FourCc::from_raw(input.key);
        let mut output = SmcParamStruct {
            key: input.key,
            ..Default::default()
        };

        match input.data8 {
            cmd::READ_KEY_INFO => {
                let keys = lock(&self.shared.keys);
                if let Some(key) = keys.iter().find(|k| k.code == code) {
                    output.key_info.data_type = key.info.data_type.raw();
                    output.key_info.data_size = key.info.data_size;
                } else if code == sensors::KEY_COUNT {
                    output.key_info.data_type = value::TYPE_UI32.raw();
                    output.key_info.data_size = 4;
                } else {
                    output.result = result_code::KEY_NOT_FOUND;
                }
            }
            cmd::READ_BYTES => {
                let keys = lock(&self.shared.keys);
                if let Some(key) = keys.iter().find(|k| k.code == code) {
                    output.bytes = key.bytes;
                } else if code == sensors::KEY_COUNT {
                    drop(keys);
                    output.bytes[..4].copy_from_slice(&self.shared.key_count_bytes());
                } else {
                    output.result = result_code::KEY_NOT_FOUND;
                }
            }
            cmd::WRITE_BYTES => {
                self.shared.write_exchanges.fetch_add(1, Ordering::SeqCst);
                let mut keys = lock(&self.shared.keys);
                if let Some(key) = keys.iter_mut().find(|k| k.code == code) {
                    if input.key_info.data_size != key.info.data_size {
                        output.result = result_code::ERROR;
                    } else {
                        let size = key.info.data_size as usize;
                        key.bytes[..size].copy_from_slice(&input.bytes[..size]);
                    }
                } else {
                    output.result = result_code::KEY_NOT_FOUND;
                }
            }
            cmd::READ_INDEX => {
                let keys = lock(&self.shared.keys);
                match keys.get(input.data32 as usize) {
                    Some(key) => output.key = key.code.raw(),
                    None => output.result = result_code::KEY_NOT_FOUND,
                }
            }
            _ => output.result = result_code::ERROR,
        }

        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_key_info_and_bytes() {
        let mut mock = MockSmc::new().with_key("TC0P", "flt ", &[0x42, 0x48, 0x00, 0x00]);

        let info = mock
            .exchange(&SmcParamStruct {
                key: FourCc::from_bytes(*b"TC0P").raw(),
                data8: cmd::READ_KEY_INFO,
                ..Default::default()
            })
            .unwrap();
        assert_eq!(info.result, result_code::SUCCESS);
        assert_eq!(info.key_info.data_type, u32::from_be_bytes(*b"flt "));
        assert_eq!(info.key_info.data_size, 4);

        let read = mock
            .exchange(&SmcParamStruct {
                key: FourCc::from_bytes(*b"TC0P").raw(),
                data8: cmd::READ_BYTES,
                ..Default::default()
            })
            .unwrap();
        assert_eq!(&read.bytes[..4], &[0x42, 0x48, 0x00, 0x00]);
    }

    #[test]
    fn test_synthesized_key_count() {
        let mut mock = MockSmc::new()
            .with_key("TC0P", "flt ", &[0x42, 0x48, 0x00, 0x00])
            .with_key("F0Ac", "fpe2", &[0x12, 0xc0]);

        let read = mock
            .exchange(&SmcParamStruct {
                key: sensors::KEY_COUNT.raw(),
                data8: cmd::READ_BYTES,
                ..Default::default()
            })
            .unwrap();
        assert_eq!(&read.bytes[..4], &2u32.to_be_bytes());
    }

    #[test]
    fn test_busy_injection_decrements() {
        let mut mock = MockSmc::new();
        let handle = mock.handle();
        handle.fail_next(1);

        let input = SmcParamStruct {
            key: sensors::KEY_COUNT.raw(),
            data8: cmd::READ_KEY_INFO,
            ..Default::default()
        };
        assert!(matches!(mock.exchange(&input), Err(Error::Busy)));
        assert!(mock.exchange(&input).is_ok());
        assert_eq!(handle.exchange_count(), 2);
    }

    #[test]
    fn test_unknown_command_reports_error() {
        let mut mock = MockSmc::new();
        let out = mock
            .exchange(&SmcParamStruct {
                data8: 0x7f,
                ..Default::default()
            })
            .unwrap();
        assert_eq!(out.result, result_code::ERROR);
    }
}
