use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

bitflags! {
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caps: u8 {
const REG1_RESERVED = 1 << 0; // register %01 must not be used
const REGS_80_TO_EF = 1 << 1; // extended register file
const SIO = 1 << 2;           // serial I/O register %F0
const SPH_RESERVED = 1 << 3;  // %FE is not a stack pointer byte
const WATCHDOG = 1 << 4;      // WDH / WDT
}
}

/// One member of the Z8 family, resolved by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CpuVariant {
    pub name: &'static str,
    pub caps: Caps,
}

const U88X: Caps = Caps::SIO;
const C0X: Caps = Caps::REG1_RESERVED.union(Caps::SPH_RESERVED);
const E0X: Caps = Caps::REG1_RESERVED.union(Caps::WATCHDOG);

pub const VARIANTS: &[CpuVariant] = &[
    CpuVariant { name: "U881", caps: U88X },
    CpuVariant { name: "U882", caps: U88X },
    CpuVariant { name: "U883", caps: U88X },
    CpuVariant { name: "U884", caps: U88X },
    CpuVariant { name: "U886", caps: U88X },
    CpuVariant { name: "Z8", caps: Caps::REGS_80_TO_EF.union(Caps::SIO).union(Caps::WATCHDOG) },
    CpuVariant { name: "Z8601", caps: U88X },
    CpuVariant { name: "Z8603", caps: U88X },
    CpuVariant { name: "Z8611", caps: U88X },
    CpuVariant { name: "Z8612", caps: U88X },
    CpuVariant { name: "Z8613", caps: U88X },
    CpuVariant { name: "Z8671", caps: U88X },
    CpuVariant { name: "Z8681", caps: U88X },
    CpuVariant { name: "Z8682", caps: U88X },
    CpuVariant { name: "Z86C04", caps: C0X },
    CpuVariant { name: "Z86C08", caps: C0X },
    CpuVariant { name: "Z86C93", caps: Caps::REG1_RESERVED.union(Caps::REGS_80_TO_EF).union(Caps::SIO) },
    CpuVariant { name: "Z86E04", caps: E0X },
    CpuVariant { name: "Z86E08", caps: E0X },
];

impl CpuVariant {
    pub fn resolve(name: &str) -> Result<CpuVariant> {
        let name = name.trim();
        VARIANTS
            .iter()
            .find(|v| v.name.eq_ignore_ascii_case(name))
            .copied()
            .ok_or_else(|| Error::UnknownCpu(name.to_string()))
    }

    pub fn has(&self, caps: Caps) -> bool {
        self.caps.contains(caps)
    }

    /// Warning text if `reg` is not usable on this CPU.
    pub fn check_register(&self, reg: u8) -> Option<String> {
        if reg == 0x01 && self.has(Caps::REG1_RESERVED) {
            Some(format!("register %01 is reserved on {}", self.name))
        } else if (0x80..=0xEF).contains(&reg) && !self.has(Caps::REGS_80_TO_EF) {
            Some(format!("register %{reg:02X} does not exist on {}", self.name))
        } else if reg == 0xF0 && !self.has(Caps::SIO) {
            Some(format!("register %F0 (SIO) does not exist on {}", self.name))
        } else if reg == 0xFE && self.has(Caps::SPH_RESERVED) {
            Some(format!("register %FE (SPH) is reserved on {}", self.name))
        } else {
            None
        }
    }

    pub fn check_watchdog(&self) -> Result<()> {
        if self.has(Caps::WATCHDOG) {
            Ok(())
        } else {
            Err(Error::WatchdogUnsupported(self.name))
        }
    }
}

/// Register check used when no CPU was named: only the extended range is
/// questionable, and only if the caller did not promise it exists.
pub fn default_register_check(reg: u8, regs_80_to_ef: bool) -> Option<String> {
    if (0x80..=0xEF).contains(&reg) && !regs_80_to_ef {
        Some(format!("register %{reg:02X} does not exist in all Z8 CPUs"))
    } else {
        None
    }
}

pub const WATCHDOG_NOT_PORTABLE: &str = "watchdog instructions are not supported by all Z8 CPUs";
