use anyhow::Result;
use clap::Parser;
use simplelog::LevelFilter;

use sdb::emu::{
    cpu::CountingCpu,
    debugger::{report_stop, Debugger},
    emulator::Emulator,
};

/// An interactive debugger with expression evaluation and watchpoints.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Log level (off, error, warn, info, debug, trace).
    #[arg(long, default_value_t = LevelFilter::Info)]
    log_level: LevelFilter,
    /// Number of instructions the program runs before it halts.
    #[arg(long, default_value_t = 1000)]
    halt_after: u64,
    /// Run to completion without the REPL, reporting every triggered watchpoint.
    #[arg(short, long)]
    batch: bool,
    /// Watch an expression from the start. May be repeated.
    #[arg(short, long = "watch", value_name = "EXPR")]
    watches: Vec<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    simplelog::TermLogger::init(
        #[cfg(debug_assertions)]
        args.log_level.max(LevelFilter::Debug),
        #[cfg(not(debug_assertions))]
        args.log_level,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )?;

    let mut dbg = Debugger::new(Emulator::new(CountingCpu::new(args.halt_after)));
    for watch in &args.watches {
        let id = dbg.watch(watch)?;
        eprintln!("Watchpoint {}: {}", id, watch.trim());
    }

    if args.batch {
        while !dbg.emu.is_finished() {
            report_stop(dbg.cont());
        }
        Ok(())
    } else {
        dbg.repl()
    }
}
