//! Common platform definitions shared by the expression evaluator, the watchpoint pool and the emulator.

use std::{fmt, str::FromStr};

use thiserror::Error;

/// A machine word. Register values and expression results are all this wide.
pub type Word = u32;

/// The signed view of a [Word], used for division.
pub type SWord = i32;

/// An error for the core platform definitions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlatformError {
    #[error("unknown register: {0}")]
    UnknownRegister(String),
}

/// Type alias for Result<T, [PlatformError]>.
pub type PResult<T> = Result<T, PlatformError>;

/// The number of general purpose registers.
pub const NR_GPR: usize = 32;

/// The registers visible to the debugger: `x0` - `x31` by ABI name, plus the program counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum Register {
    /// Hard-wired zero
    Zero = 0,
    /// Return address
    Ra,
    /// Stack pointer
    Sp,
    /// Global pointer
    Gp,
    /// Thread pointer
    Tp,
    T0,
    T1,
    T2,
    /// Saved register / frame pointer
    S0,
    S1,
    A0,
    A1,
    A2,
    A3,
    A4,
    A5,
    A6,
    A7,
    S2,
    S3,
    S4,
    S5,
    S6,
    S7,
    S8,
    S9,
    S10,
    S11,
    T3,
    T4,
    T5,
    T6,
    /// Program counter
    Pc,
}

const ABI_NAMES: [&str; NR_GPR + 1] = [
    "zero", "ra", "sp", "gp", "tp", "t0", "t1", "t2", "s0", "s1", "a0", "a1", "a2", "a3", "a4",
    "a5", "a6", "a7", "s2", "s3", "s4", "s5", "s6", "s7", "s8", "s9", "s10", "s11", "t3", "t4",
    "t5", "t6", "pc",
];

impl Register {
    /// Every register, in encoding order. `Pc` comes last.
    pub const ALL: [Register; NR_GPR + 1] = [
        Self::Zero,
        Self::Ra,
        Self::Sp,
        Self::Gp,
        Self::Tp,
        Self::T0,
        Self::T1,
        Self::T2,
        Self::S0,
        Self::S1,
        Self::A0,
        Self::A1,
        Self::A2,
        Self::A3,
        Self::A4,
        Self::A5,
        Self::A6,
        Self::A7,
        Self::S2,
        Self::S3,
        Self::S4,
        Self::S5,
        Self::S6,
        Self::S7,
        Self::S8,
        Self::S9,
        Self::S10,
        Self::S11,
        Self::T3,
        Self::T4,
        Self::T5,
        Self::T6,
        Self::Pc,
    ];

    /// The ABI name of the register, without the `$` sigil.
    pub fn name(self) -> &'static str {
        ABI_NAMES[self as usize]
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

impl FromStr for Register {
    type Err = PlatformError;

    /// Accepts ABI names (`a0`), numeric aliases (`x10`) and `fp` for `s0`.
    fn from_str(s: &str) -> PResult<Self> {
        if s == "fp" {
            return Ok(Self::S0);
        }
        if let Some(pos) = ABI_NAMES.iter().position(|name| *name == s) {
            return Ok(Self::ALL[pos]);
        }
        s.strip_prefix('x')
            .and_then(|n| n.parse::<u8>().ok())
            .filter(|n| (*n as usize) < NR_GPR)
            .map(|n| Self::ALL[n as usize])
            .ok_or_else(|| PlatformError::UnknownRegister(s.to_string()))
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_names() {
        assert_eq!("a0".parse::<Register>().unwrap(), Register::A0);
        assert_eq!("x10".parse::<Register>().unwrap(), Register::A0);
        assert_eq!("fp".parse::<Register>().unwrap(), Register::S0);
        assert_eq!("pc".parse::<Register>().unwrap(), Register::Pc);
        assert_eq!("zero".parse::<Register>().unwrap(), Register::Zero);
        assert_eq!(Register::T6.to_string(), "t6");
    }

    #[test]
    fn test_register_unknown() {
        assert_eq!(
            "x32".parse::<Register>(),
            Err(PlatformError::UnknownRegister("x32".to_string()))
        );
        assert!("eax".parse::<Register>().is_err());
        assert!("xpc".parse::<Register>().is_err());
    }

    #[test]
    fn test_register_index() {
        for (i, reg) in Register::ALL.iter().enumerate() {
            assert_eq!(reg.index(), i);
            assert_eq!(reg.name().parse::<Register>().unwrap(), *reg);
        }
    }
}
