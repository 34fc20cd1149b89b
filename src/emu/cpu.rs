use anyhow::Result;

use crate::plat::{Register, Word};

use super::registers::RegisterFile;

/// What happened when a [Cpu] executed an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpuEvent {
    /// The instruction retired normally.
    Continue,
    /// The program asked to stop. `code` is its exit status.
    Halt { code: Word },
}

/// An instruction set implementation the emulator can step.
pub trait Cpu {
    /// Executes a single instruction against `regs`.
    fn exec_once(&mut self, regs: &mut RegisterFile) -> Result<CpuEvent>;
}

/// A deterministic stand-in CPU.
///
/// Every instruction advances `pc` by 4 and increments `a0`; `a1` holds `a0 / 4`, so it changes
/// on every fourth instruction. The instruction after the `limit`-th one halts with code 0.
#[derive(Debug, Clone)]
pub struct CountingCpu {
    limit: u64,
    executed: u64,
}

impl CountingCpu {
    pub fn new(limit: u64) -> Self {
        Self { limit, executed: 0 }
    }

    pub fn executed(&self) -> u64 {
        self.executed
    }
}

impl Cpu for CountingCpu {
    fn exec_once(&mut self, regs: &mut RegisterFile) -> Result<CpuEvent> {
        if self.executed >= self.limit {
            return Ok(CpuEvent::Halt { code: 0 });
        }
        self.executed += 1;
        regs.pc = regs.pc.wrapping_add(4);
        let a0 = regs.get(Register::A0).wrapping_add(1);
        regs.set(Register::A0, a0);
        regs.set(Register::A1, a0 / 4);
        Ok(CpuEvent::Continue)
    }
}
