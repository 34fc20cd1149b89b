//! The emulator/debugger module: a register file, a run/stop state machine and the interactive
//! debugger that drives them.

use thiserror::Error;

pub mod cpu;
pub mod debugger;
pub mod emulator;
pub mod registers;

#[derive(Debug, Error)]
pub enum EmuError {
    #[error("program execution has ended, restart the debugger to run it again")]
    Finished,
    #[error("cannot step while the emulator is in the {0:?} state")]
    NotRunnable(emulator::EmuState),
}
