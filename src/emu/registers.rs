use crate::{
    expr::RegisterResolver,
    plat::{Register, Word, NR_GPR},
};

/// The full set of registers in the emulator. `zero` reads as 0 no matter what is written to it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegisterFile {
    gpr: [Word; NR_GPR],
    pub pc: Word,
}

impl RegisterFile {
    /// Creates a register file with every register cleared and `pc` at `reset_vector`.
    pub fn new(reset_vector: Word) -> Self {
        Self {
            gpr: [0; NR_GPR],
            pc: reset_vector,
        }
    }

    pub fn get(&self, reg: Register) -> Word {
        match reg {
            Register::Pc => self.pc,
            reg => self.gpr[reg.index()],
        }
    }

    pub fn set(&mut self, reg: Register, value: Word) {
        match reg {
            Register::Zero => {}
            Register::Pc => self.pc = value,
            reg => self.gpr[reg.index()] = value,
        }
    }

    /// Iterates over every register and its value, `pc` last.
    pub fn iter(&self) -> impl Iterator<Item = (Register, Word)> + '_ {
        Register::ALL.into_iter().map(|reg| (reg, self.get(reg)))
    }
}

impl RegisterResolver for RegisterFile {
    fn reg_value(&self, name: &str) -> Option<Word> {
        name.parse::<Register>().ok().map(|reg| self.get(reg))
    }
}
