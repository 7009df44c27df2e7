//! Grammar modes and compile flags.

use crate::error::ConfigurationError;
use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use std::str::FromStr;

/// Which grammar the source must satisfy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Mode {
    /// A sequence of statements (a module).
    #[default]
    Exec,
    /// Exactly one expression.
    Eval,
    /// One interactive statement: a single logical line of simple statements
    /// or one compound statement.
    Single,
}

impl Mode {
    pub const NAMES: &'static [&'static str] = &["exec", "eval", "single"];

    pub fn name(&self) -> &'static str {
        match self {
            Mode::Exec => "exec",
            Mode::Eval => "eval",
            Mode::Single => "single",
        }
    }
}

impl FromStr for Mode {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "exec" => Ok(Mode::Exec),
            "eval" => Ok(Mode::Eval),
            "single" => Ok(Mode::Single),
            other => Err(ConfigurationError {
                option: "mode",
                value: other.to_string(),
                expected: Self::NAMES,
            }),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Bitset of parse/compile switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CompileFlags(u32);

impl CompileFlags {
    pub const NONE: CompileFlags = CompileFlags(0);
    /// Do not synthesize the dedents that close open blocks at end of input.
    /// A block then has to be terminated by an explicit blank line.
    pub const DONT_IMPLY_DEDENT: CompileFlags = CompileFlags(0x200);

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn from_bits(bits: u32) -> Self {
        CompileFlags(bits)
    }

    pub const fn contains(self, other: CompileFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for CompileFlags {
    type Output = CompileFlags;

    fn bitor(self, rhs: Self) -> Self::Output {
        CompileFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for CompileFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_modes() {
        assert_eq!("exec".parse::<Mode>().unwrap(), Mode::Exec);
        assert_eq!("eval".parse::<Mode>().unwrap(), Mode::Eval);
        assert_eq!("single".parse::<Mode>().unwrap(), Mode::Single);
    }

    #[test]
    fn rejects_unknown_mode() {
        let err = "statement".parse::<Mode>().unwrap_err();
        assert_eq!(err.option, "mode");
        assert_eq!(err.value, "statement");
    }

    #[test]
    fn flags_combine() {
        let mut flags = CompileFlags::NONE;
        assert!(!flags.contains(CompileFlags::DONT_IMPLY_DEDENT));
        flags |= CompileFlags::DONT_IMPLY_DEDENT;
        assert!(flags.contains(CompileFlags::DONT_IMPLY_DEDENT));
        assert_eq!(CompileFlags::from_bits(flags.bits()), flags);
    }
}
