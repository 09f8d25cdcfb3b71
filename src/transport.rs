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

//! The SMC device channel: wire framing, the [`Transport`] seam, and the
//! IOKit-backed implementation for macOS.
//!
//! The AppleSMC driver takes a fixed 80-byte parameter struct per call and
//! returns one back; field order and sizes are dictated by the kernel
//! extension and are not negotiable. The struct definition surfaced in
//! Apple's PowerManagement project (PrivateLib.c, around version 211) and
//! is the same layout macmon, mactop, and SMCKit use.
//!
//! The device serializes all requests; there is no interleaving and no
//! async mode. Callers above this module hold one lock per logical
//! operation. Timeouts are enforced by the kernel call itself.

use tracing::debug;

use crate::error::{Error, Result};

/// IOConnectCallStructMethod selector for AppleSMC (kSMCHandleYPCEvent).
pub const KERNEL_INDEX_SMC: u32 = 2;

/// Command bytes understood by the SMC, placed in `SmcParamStruct::data8`.
pub mod cmd {
    pub const READ_BYTES: u8 = 5;
    pub const WRITE_BYTES: u8 = 6;
    pub const READ_INDEX: u8 = 8;
    pub const READ_KEY_INFO: u8 = 9;
}

/// Result codes the SMC places in `SmcParamStruct::result`.
pub mod result_code {
    pub const SUCCESS: u8 = 0;
    pub const ERROR: u8 = 1;
    /// Key absent on this hardware revision.
    pub const KEY_NOT_FOUND: u8 = 0x84;
    /// Device busy; transient, worth retrying.
    pub const BUSY: u8 = 0xb0;
}

/// Total attempts per exchange before a busy device surfaces as I/O error.
pub const MAX_EXCHANGE_ATTEMPTS: u32 = 3;

/// Maximum value payload per exchange, fixed by the wire struct.
pub const MAX_PAYLOAD: usize = 32;

/// SMC firmware version block. Part of the fixed wire layout.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct SmcVersion {
    pub major: u8,
    pub minor: u8,
    pub build: u8,
    pub reserved: u8,
    pub release: u16,
}

/// Power limit block. Part of the fixed wire layout; unused by this crate
/// but required for the struct to match the kernel's expectation.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct SmcPLimitData {
    pub version: u16,
    pub length: u16,
    pub cpu_p_limit: u32,
    pub gpu_p_limit: u32,
    pub mem_p_limit: u32,
}

/// Key metadata block: how many bytes are in `bytes` and how to read them.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct SmcKeyInfoData {
    pub data_size: u32,
    pub data_type: u32,
    pub data_attributes: u8,
}

/// The fixed-size request/response structure exchanged with the SMC.
///
/// Must be exactly 80 bytes; the kernel rejects anything else.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct SmcParamStruct {
    pub key: u32,
    pub vers: SmcVersion,
    pub p_limit_data: SmcPLimitData,
    pub key_info: SmcKeyInfoData,
    pub result: u8,
    pub status: u8,
    pub data8: u8,
    pub data32: u32,
    pub bytes: [u8; MAX_PAYLOAD],
}

/// One blocking request/response round-trip with the SMC device.
///
/// Implementations map hardware-level busy conditions to [`Error::Busy`]
/// so the retrying path above can distinguish transient from fatal.
pub trait Transport: Send {
    fn exchange(&mut self, input: &SmcParamStruct) -> Result<SmcParamStruct>;
}

/// Issue an exchange, retrying transient busy failures.
///
/// Retries up to [`MAX_EXCHANGE_ATTEMPTS`] total attempts with no backoff;
/// each attempt is already a blocking kernel call with its own timeout
/// ceiling. A busy device after the last attempt surfaces as [`Error::Io`].
/// Non-transient failures surface immediately.
pub(crate) fn exchange(
    transport: &mut dyn Transport,
    input: &SmcParamStruct,
) -> Result<SmcParamStruct> {
    for attempt in 1..=MAX_EXCHANGE_ATTEMPTS {
        match transport.exchange(input) {
            Ok(output) if output.result == result_code::BUSY => {
                debug!(attempt, "SMC reported busy, retrying");
            }
            Ok(output) => return Ok(output),
            Err(Error::Busy) => {
                debug!(attempt, "SMC exchange returned busy, retrying");
            }
            Err(err) => return Err(err),
        }
    }
    Err(Error::Io(format!(
        "device busy after {MAX_EXCHANGE_ATTEMPTS} attempts"
    )))
}

#[cfg(target_os = "macos")]
pub use iokit::IoKitTransport;

#[cfg(target_os = "macos")]
mod iokit {
    use std::ffi::c_void;

    use tracing::warn;

    use super::{SmcParamStruct, Transport, KERNEL_INDEX_SMC};
    use crate::error::{Error, Result};

    // IOKit framework linkage
    #[link(name = "IOKit", kind = "framework")]
    unsafe extern "C" {
        fn mach_task_self() -> u32;
        fn IOServiceMatching(name: *const i8) -> *mut c_void;
        fn IOServiceGetMatchingService(master_port: u32, matching: *mut c_void) -> u32;
        fn IOServiceOpen(device: u32, owning_task: u32, conn_type: u32, conn: *mut u32) -> i32;
        fn IOServiceClose(conn: u32) -> i32;
        fn IOObjectRelease(object: u32) -> i32;
        fn IOConnectCallStructMethod(
            conn: u32,
            selector: u32,
            input: *const c_void,
            input_size: usize,
            output: *mut c_void,
            output_size: *mut usize,
        ) -> i32;
    }

    const IOSERVICE_SMC: &std::ffi::CStr = c"AppleSMC";

    // I/O Kit common error codes, built the way <IOKit/IOReturn.h> does:
    // system 0x38, subsystem 0, specific code in the low 14 bits.
    const SYS_IOKIT: u32 = (0x38 & 0x3f) << 26;
    const SUB_IOKIT_COMMON: u32 = 0;

    const fn iokit_common_err(code: u32) -> i32 {
        (SYS_IOKIT | SUB_IOKIT_COMMON | code) as i32
    }

    const KIO_RETURN_BUSY: i32 = iokit_common_err(0x2d5);
    const KIO_RETURN_NOT_READY: i32 = iokit_common_err(0x2d8);
    const KIO_RETURN_NOT_PRIVILEGED: i32 = iokit_common_err(0x2c1);

    /// Connection to the AppleSMC kernel extension.
    ///
    /// Exactly one live connection per process is assumed; the device is a
    /// singleton resource. Closed on drop.
    pub struct IoKitTransport {
        conn: u32,
    }

    impl IoKitTransport {
        /// Open a connection to the AppleSMC IOService.
        pub fn open() -> Result<Self> {
            unsafe {
                let matching = IOServiceMatching(IOSERVICE_SMC.as_ptr());
                if matching.is_null() {
                    return Err(Error::Connection(
                        "failed to create IOService matching dictionary".to_string(),
                    ));
                }

                // IOServiceGetMatchingService consumes the dictionary.
                let device = IOServiceGetMatchingService(0, matching);
                if device == 0 {
                    return Err(Error::Connection(
                        "AppleSMC service not found; unsupported hardware".to_string(),
                    ));
                }

                let mut conn: u32 = 0;
                let result = IOServiceOpen(device, mach_task_self(), 0, &mut conn);
                IOObjectRelease(device);

                match result {
                    0 => Ok(Self { conn }),
                    KIO_RETURN_NOT_PRIVILEGED => Err(Error::Connection(
                        "permission denied opening AppleSMC".to_string(),
                    )),
                    code => Err(Error::Connection(format!(
                        "IOServiceOpen failed: {code:#010x}"
                    ))),
                }
            }
        }
    }

    impl Transport for IoKitTransport {
        fn exchange(&mut self, input: &SmcParamStruct) -> Result<SmcParamStruct> {
            let mut output = SmcParamStruct::default();
            let mut output_size = std::mem::size_of::<SmcParamStruct>();

            let result = unsafe {
                IOConnectCallStructMethod(
                    self.conn,
                    KERNEL_INDEX_SMC,
                    input as *const SmcParamStruct as *const c_void,
                    std::mem::size_of::<SmcParamStruct>(),
                    &mut output as *mut SmcParamStruct as *mut c_void,
                    &mut output_size,
                )
            };

            match result {
                0 => Ok(output),
                KIO_RETURN_BUSY | KIO_RETURN_NOT_READY => Err(Error::Busy),
                code => Err(Error::Io(format!(
                    "IOConnectCallStructMethod failed: {code:#010x}"
                ))),
            }
        }
    }

    impl Drop for IoKitTransport {
        fn drop(&mut self) {
            let result = unsafe { IOServiceClose(self.conn) };
            if result != 0 {
                warn!(result, "IOServiceClose failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // The kernel validates the struct by size; anything but 80 bytes fails.
    #[test]
    fn test_param_struct_is_80_bytes() {
        assert_eq!(std::mem::size_of::<SmcParamStruct>(), 80);
    }

    struct FlakyTransport {
        busy_remaining: u32,
        attempts: u32,
    }

    impl Transport for FlakyTransport {
        fn exchange(&mut self, _input: &SmcParamStruct) -> Result<SmcParamStruct> {
            self.attempts += 1;
            if self.busy_remaining > 0 {
                self.busy_remaining -= 1;
                return Err(Error::Busy);
            }
            Ok(SmcParamStruct::default())
        }
    }

    #[test]
    fn test_retry_recovers_from_two_busy_attempts() {
        let mut transport = FlakyTransport {
            busy_remaining: 2,
            attempts: 0,
        };
        let input = SmcParamStruct::default();
        assert!(exchange(&mut transport, &input).is_ok());
        assert_eq!(transport.attempts, 3);
    }

    #[test]
    fn test_retry_budget_exhaustion_surfaces_io_error() {
        let mut transport = FlakyTransport {
            busy_remaining: MAX_EXCHANGE_ATTEMPTS,
            attempts: 0,
        };
        let input = SmcParamStruct::default();
        assert!(matches!(
            exchange(&mut transport, &input),
            Err(Error::Io(_))
        ));
        assert_eq!(transport.attempts, MAX_EXCHANGE_ATTEMPTS);
    }

    #[test]
    fn test_busy_result_code_in_response_is_retried() {
        struct BusyResult {
            attempts: u32,
        }
        impl Transport for BusyResult {
            fn exchange(&mut self, _input: &SmcParamStruct) -> Result<SmcParamStruct> {
                self.attempts += 1;
                let mut out = SmcParamStruct::default();
                if self.attempts == 1 {
                    out.result = result_code::BUSY;
                }
                Ok(out)
            }
        }
        let mut transport = BusyResult { attempts: 0 };
        let out = exchange(&mut transport, &SmcParamStruct::default()).unwrap();
        assert_eq!(out.result, result_code::SUCCESS);
        assert_eq!(transport.attempts, 2);
    }

    #[test]
    fn test_hard_failure_not_retried() {
        struct Broken {
            attempts: u32,
        }
        impl Transport for Broken {
            fn exchange(&mut self, _input: &SmcParamStruct) -> Result<SmcParamStruct> {
                self.attempts += 1;
                Err(Error::Io("device unplugged".to_string()))
            }
        }
        let mut transport = Broken { attempts: 0 };
        assert!(exchange(&mut transport, &SmcParamStruct::default()).is_err());
        assert_eq!(transport.attempts, 1);
    }
}
