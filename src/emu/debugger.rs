use std::cell::RefCell;

use anyhow::{Error, Result};
use easy_repl::{command, repl::LoopStatus, Command, CommandStatus, Repl};

use crate::{
    expr::{expr, ExprError},
    plat::{Register, SWord, Word},
    wp::{PoolError, Triggered, Watchpoint, WatchpointId, WatchpointPool},
};

use super::{
    cpu::Cpu,
    emulator::{EmuState, Emulator},
    EmuError,
};

/// Why [Debugger::exec] returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// The requested number of instructions ran.
    StepsDone,
    /// One or more watchpoints changed value.
    Watchpoint(Vec<Triggered>),
    /// The program halted.
    Halted(Word),
}

/// Owns the emulator and its watchpoints, and implements the debugger commands on top of them.
pub struct Debugger<C> {
    pub emu: Emulator<C>,
    pub wps: WatchpointPool,
}

impl<C: Cpu> Debugger<C> {
    pub fn new(emu: Emulator<C>) -> Self {
        Self::with_pool(emu, WatchpointPool::new())
    }

    pub fn with_pool(emu: Emulator<C>, wps: WatchpointPool) -> Self {
        Self { emu, wps }
    }

    /// Runs up to `n` instructions, checking watchpoints after each one.
    ///
    /// # Errors
    ///
    /// Fails if the program has already finished or the CPU aborts.
    pub fn exec(&mut self, n: u64) -> Result<StopReason> {
        if self.emu.is_finished() {
            return Err(Error::from(EmuError::Finished));
        }
        self.emu.state = EmuState::Running;
        for _ in 0..n {
            self.emu.step()?;
            if let EmuState::End = self.emu.state {
                return Ok(StopReason::Halted(self.emu.halt_code.unwrap_or_default()));
            }
            let triggered = self.wps.check(&self.emu.registers);
            if !triggered.is_empty() {
                self.emu.state = EmuState::Stop;
                return Ok(StopReason::Watchpoint(triggered));
            }
        }
        self.emu.state = EmuState::Stop;
        Ok(StopReason::StepsDone)
    }

    /// Runs until a watchpoint triggers or the program halts.
    pub fn cont(&mut self) -> Result<StopReason> {
        self.exec(u64::MAX)
    }

    pub fn eval(&self, text: &str) -> Result<Word, ExprError> {
        expr(text, &self.emu.registers)
    }

    pub fn watch(&mut self, text: &str) -> Result<WatchpointId, PoolError> {
        self.wps.watch(text, &self.emu.registers)
    }

    pub fn delete_watch(&mut self, id: WatchpointId) -> Result<Watchpoint, PoolError> {
        self.wps.delete(id)
    }

    pub fn info_watch(&self) -> Vec<String> {
        if self.wps.is_empty() {
            return vec!["No watchpoints.".to_string()];
        }
        self.wps.list().map(|wp| wp.to_string()).collect()
    }

    pub fn info_regs(&self) -> Vec<String> {
        self.emu
            .registers
            .iter()
            .map(|(reg, val)| format!("{:<4} {:#010x} {}", reg, val, val as SWord))
            .collect()
    }

    /// Sets `reg` (with or without the `$` sigil) to the value of `text`.
    pub fn set_reg(&mut self, reg: &str, text: &str) -> Result<Word> {
        let reg: Register = reg.strip_prefix('$').unwrap_or(reg).parse()?;
        let value = self.eval(text)?;
        self.emu.registers.set(reg, value);
        Ok(value)
    }

    /// Runs the interactive debugger until the user quits or the input ends.
    pub fn repl(&mut self) -> Result<()> {
        let this = &RefCell::new(self);
        let mut repl = repl_commands(this)
            .into_iter()
            .fold(
                Repl::builder().description("sdb debug REPL"),
                |builder, (name, cmd)| builder.add(name, cmd),
            )
            .build()?;
        eprintln!("sdb debug REPL");
        'repl: loop {
            eprintln!();
            {
                let this = this.borrow();
                eprintln!(
                    "[pc={:#010x}] {} instructions executed",
                    this.emu.registers.pc, this.emu.instr_count
                );
            }

            let status = repl.next()?;
            if let LoopStatus::Break = status {
                break 'repl;
            }
            if let EmuState::Quit = this.borrow().emu.state {
                break 'repl;
            }
        }
        Ok(())
    }
}

/// The debugger's REPL commands, each sharing `this`.
fn repl_commands<'a, 'd: 'a, C: Cpu + 'a>(
    this: &'a RefCell<&'d mut Debugger<C>>,
) -> Vec<(&'static str, Command<'a>)> {
    vec![
        (
            "c",
            command! {
                "Continue execution",
                () => || {
                    let reason = this.borrow_mut().cont();
                    report_stop(reason);
                    Ok(CommandStatus::Done)
                }
            },
        ),
        (
            "si",
            command! {
                "Step one instruction",
                () => || {
                    let reason = this.borrow_mut().exec(1);
                    report_stop(reason);
                    Ok(CommandStatus::Done)
                }
            },
        ),
        (
            "si",
            command! {
                "Step N instructions",
                (n:u64) => |n| {
                    let reason = this.borrow_mut().exec(n);
                    report_stop(reason);
                    Ok(CommandStatus::Done)
                }
            },
        ),
        (
            "p",
            command! {
                "Print the value of an expression (quote it if it contains spaces)",
                (e:String) => |e: String| {
                    match this.borrow().eval(&e) {
                        Ok(val) => eprintln!("{} = {} ({:#x})", e, val as SWord, val),
                        Err(err) => eprintln!("{}", err),
                    }
                    Ok(CommandStatus::Done)
                }
            },
        ),
        (
            "w",
            command! {
                "Stop when the value of an expression changes",
                (e:String) => |e: String| {
                    match this.borrow_mut().watch(&e) {
                        Ok(id) => eprintln!("Watchpoint {}: {}", id, e.trim()),
                        Err(err) => eprintln!("{}", err),
                    }
                    Ok(CommandStatus::Done)
                }
            },
        ),
        (
            "d",
            command! {
                "Delete watchpoint N",
                (n:usize) => |n| {
                    match this.borrow_mut().delete_watch(n) {
                        Ok(_) => eprintln!("Deleted watchpoint {}", n),
                        Err(err) => eprintln!("{}", err),
                    }
                    Ok(CommandStatus::Done)
                }
            },
        ),
        (
            "info",
            command! {
                "Print registers (r) or watchpoints (w)",
                (what:String) => |what: String| {
                    let this = this.borrow();
                    let lines = match what.as_str() {
                        "r" => this.info_regs(),
                        "w" => this.info_watch(),
                        _ => vec![format!("unknown subcommand: {}", what)],
                    };
                    for line in lines {
                        eprintln!("{}", line);
                    }
                    Ok(CommandStatus::Done)
                }
            },
        ),
        (
            "set",
            command! {
                "Set a register to the value of an expression",
                (reg:String, e:String) => |reg: String, e: String| {
                    match this.borrow_mut().set_reg(&reg, &e) {
                        Ok(val) => eprintln!("{} = {:#x}", reg, val),
                        Err(err) => eprintln!("{}", err),
                    }
                    Ok(CommandStatus::Done)
                }
            },
        ),
        (
            "q",
            command! {
                "Quit",
                () => || {
                    this.borrow_mut().emu.state = EmuState::Quit;
                    Ok(CommandStatus::Quit)
                }
            },
        ),
    ]
}

/// Prints the outcome of a run command.
pub fn report_stop(reason: Result<StopReason>) {
    match reason {
        Ok(StopReason::StepsDone) => {}
        Ok(StopReason::Watchpoint(hits)) => {
            for hit in hits {
                eprintln!("\n{}", hit);
            }
        }
        Ok(StopReason::Halted(code)) => {
            if code == 0 {
                eprintln!("HIT GOOD TRAP");
            } else {
                eprintln!("HIT BAD TRAP (code {})", code);
            }
        }
        Err(e) => eprintln!("{}", e),
    }
}
