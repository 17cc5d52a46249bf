use std::fmt;

use crate::cpu::op::Op;
use crate::cpu::parameter::{Parameter, ParameterSet};

/// One decoded instruction. Operands are fully resolved; the repeat
/// mode records a REP/REPNE prefix attached to a string operation.
#[derive(Clone, Debug, PartialEq)]
pub struct Instruction {
    pub command: Op,
    pub params: ParameterSet,
    pub repeat: RepeatMode,
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let prefix = self.repeat.as_str();
        match self.params.dst {
            Parameter::None => write!(f, "{}{}", prefix, self.command),
            _ => match self.params.src {
                Parameter::None => write!(f, "{}{} {}", prefix, self.command, self.params.dst),
                _ => write!(f, "{}{} {}, {}", prefix, self.command, self.params.dst, self.params.src),
            },
        }
    }
}

impl Instruction {
    pub fn new(op: Op) -> Self {
        Instruction {
            command: op,
            params: ParameterSet::none(),
            repeat: RepeatMode::None,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum RepeatMode {
    None,
    Rep,
    Repe, // alias repz
    Repne, // alias repnz
}

impl RepeatMode {
    pub fn as_str(self) -> &'static str {
        match self {
            RepeatMode::None => "",
            RepeatMode::Rep => "Rep ",
            RepeatMode::Repe => "Repe ",
            RepeatMode::Repne => "Repne ",
        }
    }
}

/// Instruction encoding layout for Mod/Reg/RM byte
#[derive(Debug)]
pub struct ModRegRm {
    /// "mod" is correct name, but is reserved keyword
    /// High 2 bits
    pub md: u8,

    /// mid 3 bits
    pub reg: u8,

    /// low 3 bits
    pub rm: u8,
}

impl ModRegRm {
    pub fn u8(&self) -> u8 {
        (self.md << 6) |  // high 2 bits
        (self.reg << 3) | // mid 3 bits
        self.rm           // low 3 bits
    }
}
