use anyhow::{Error, Result};

use crate::plat::Word;

use super::{
    cpu::{Cpu, CpuEvent},
    registers::RegisterFile,
    EmuError,
};

/// Where `pc` points after reset.
pub const RESET_VECTOR: Word = 0x8000_0000;

/// The emulator's current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmuState {
    /// Instructions are being executed.
    Running,
    /// Execution is paused, e.g. by a triggered watchpoint or an exhausted step count. Can be resumed.
    Stop,
    /// The program halted on its own. `halt_code` holds its exit status.
    End,
    /// The CPU failed to execute an instruction.
    Abort,
    /// The user asked to leave.
    Quit,
}

/// The main emulation context.
pub struct Emulator<C> {
    pub registers: RegisterFile,
    pub state: EmuState,
    /// Number of retired instructions.
    pub instr_count: u64,
    pub halt_code: Option<Word>,
    cpu: C,
}

impl<C: Cpu> Emulator<C> {
    /// Creates a stopped emulator with `pc` at [RESET_VECTOR].
    pub fn new(cpu: C) -> Self {
        Self {
            registers: RegisterFile::new(RESET_VECTOR),
            state: EmuState::Stop,
            instr_count: 0,
            halt_code: None,
            cpu,
        }
    }

    /// True once the program can no longer be resumed.
    pub fn is_finished(&self) -> bool {
        matches!(self.state, EmuState::End | EmuState::Abort | EmuState::Quit)
    }

    /// Executes a single instruction. Only valid in the [Running][EmuState::Running] state.
    ///
    /// # Errors
    ///
    /// Returns the CPU's error after moving to [Abort][EmuState::Abort].
    pub fn step(&mut self) -> Result<()> {
        if self.state != EmuState::Running {
            return Err(Error::from(EmuError::NotRunnable(self.state)));
        }
        match self.cpu.exec_once(&mut self.registers) {
            Ok(CpuEvent::Continue) => {
                self.instr_count += 1;
                log::trace!("> pc={:#010x}", self.registers.pc);
            }
            Ok(CpuEvent::Halt { code }) => {
                self.state = EmuState::End;
                self.halt_code = Some(code);
                log::info!(
                    "halted at pc={:#010x} with code {} after {} instructions",
                    self.registers.pc,
                    code,
                    self.instr_count
                );
            }
            Err(e) => {
                self.state = EmuState::Abort;
                log::error!("aborted at pc={:#010x}: {}", self.registers.pc, e);
                return Err(e);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{emu::cpu::CountingCpu, plat::Register};

    struct FaultyCpu;

    impl Cpu for FaultyCpu {
        fn exec_once(&mut self, _regs: &mut RegisterFile) -> Result<CpuEvent> {
            Err(anyhow::anyhow!("illegal instruction"))
        }
    }

    #[test]
    fn test_step_until_halt() {
        let mut emu = Emulator::new(CountingCpu::new(3));
        emu.state = EmuState::Running;
        while emu.state == EmuState::Running {
            emu.step().unwrap();
        }
        assert_eq!(emu.state, EmuState::End);
        assert_eq!(emu.halt_code, Some(0));
        assert_eq!(emu.instr_count, 3);
        assert_eq!(emu.registers.get(Register::A0), 3);
        assert!(emu.is_finished());
        assert!(emu.step().is_err());
    }

    #[test]
    fn test_step_requires_running() {
        let mut emu = Emulator::new(CountingCpu::new(3));
        assert!(emu.step().is_err());
        assert_eq!(emu.instr_count, 0);
        assert_eq!(emu.registers.pc, RESET_VECTOR);
    }

    #[test]
    fn test_abort() {
        let mut emu = Emulator::new(FaultyCpu);
        emu.state = EmuState::Running;
        assert!(emu.step().is_err());
        assert_eq!(emu.state, EmuState::Abort);
        assert!(emu.is_finished());
    }
}
