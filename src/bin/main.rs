//! Run an LS-8 program.
//!
//! Usage: `ls8 <program> [--trace]`

use std::io;
use std::path::PathBuf;
use std::process;

use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use emulator::region::Chunk;
use emulator::vm::Vm;

#[derive(Parser, Debug)]
#[command(name = "ls8")]
#[command(about = "Run a program on the LS-8 emulator")]
struct Args {
  /// Program file, one binary byte per line
  program: PathBuf,

  /// Log the machine state before every instruction
  #[arg(long)]
  trace: bool,
}

fn init_logging(trace: bool) {
  let filter = if trace {
    EnvFilter::new("warn,emulator=trace")
  } else {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
  };

  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_target(false)
    .with_writer(io::stderr)
    .init();
}

fn main() {
  let args = Args::parse();
  init_logging(args.trace);

  let chunk = match Chunk::from_file(&args.program) {
    Ok(chunk) => chunk,
    Err(err) => {
      error!("{err}");
      process::exit(1);
    }
  };

  let mut vm = match Vm::with_program(&chunk) {
    Ok(vm) => vm,
    Err(err) => {
      error!("{err}");
      process::exit(1);
    }
  };

  let mut out = io::stdout().lock();
  if let Err(err) = vm.run(&mut out) {
    error!(pc = vm.pc(), "{err}");
    process::exit(1);
  }
}
