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

//! Key metadata cache.
//!
//! The SMC key set and per-key metadata are static for a running system,
//! so metadata discovered by a read-key-info exchange is kept for the
//! lifetime of the process. Failures are never cached: a missing key is
//! reported each time, and transient I/O errors are not masked as
//! permanent absence.

use std::collections::HashMap;

use tracing::debug;

use crate::error::{Error, Result};
use crate::key::{FourCc, KeyInfo, SmcKey};
use crate::transport::{cmd, exchange, result_code, SmcParamStruct, Transport};

/// Process-lifetime cache of resolved key metadata. Grows monotonically;
/// no eviction, no invalidation.
#[derive(Default)]
pub(crate) struct KeyCache {
    entries: HashMap<FourCc, KeyInfo>,
}

impl KeyCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve a key's metadata, hitting the device only on first access.
    pub fn resolve(&mut self, transport: &mut dyn Transport, code: FourCc) -> Result<SmcKey> {
        if let Some(&info) = self.entries.get(&code) {
            return Ok(SmcKey { code, info });
        }

        let input = SmcParamStruct {
            key: code.raw(),
            data8: cmd::READ_KEY_INFO,
            ..Default::default()
        };
        let output = exchange(transport, &input)?;

        match output.result {
            result_code::SUCCESS => {}
            result_code::KEY_NOT_FOUND => return Err(Error::UnknownKey(code)),
            other => {
                return Err(Error::Io(format!(
                    "key info exchange for {code} failed with SMC result {other:#04x}"
                )))
            }
        }

        let info = KeyInfo {
            data_type: FourCc::from_raw(output.key_info.data_type),
            data_size: output.key_info.data_size,
        };
        debug!(key = %code, data_type = %info.data_type, size = info.data_size, "resolved SMC key");
        self.entries.insert(code, info);
        Ok(SmcKey { code, info })
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockSmc;

    #[test]
    fn test_second_resolve_served_from_cache() {
        let mut mock = MockSmc::new().with_key("TC0P", "flt ", &[0x42, 0x48, 0x00, 0x00]);
        let handle = mock.handle();
        let mut cache = KeyCache::new();
        let code = FourCc::from_bytes(*b"TC0P");

        let first = cache.resolve(&mut mock, code).unwrap();
        let second = cache.resolve(&mut mock, code).unwrap();

        assert_eq!(first.info, second.info);
        assert_eq!(handle.exchange_count(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_missing_key_not_cached() {
        let mut mock = MockSmc::new();
        let handle = mock.handle();
        let mut cache = KeyCache::new();
        let code = FourCc::from_bytes(*b"ZZZZ");

        assert!(matches!(
            cache.resolve(&mut mock, code),
            Err(Error::UnknownKey(_))
        ));
        assert!(matches!(
            cache.resolve(&mut mock, code),
            Err(Error::UnknownKey(_))
        ));
        // Both misses hit the device; negative results are never cached.
        assert_eq!(handle.exchange_count(), 2);
        assert_eq!(cache.len(), 0);
    }
}
