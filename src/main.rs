mod cli;
mod dump;

use std::fs;
use std::io::{self, Read, Write};

use clap::Parser;
use colored::Colorize;

use bfopt::error::ExecError;
use bfopt::lower::lower;
use bfopt::vm::{InputSource, OutputSink, RunState, Vm};

use cli::Cli;

/// Reads bytes from stdin on first use, sentinel `-1` on EOF.
struct StdinInput {
    stdin: io::Stdin,
}

impl InputSource for StdinInput {
    fn next_byte(&mut self) -> Option<i64> {
        let mut buf = [0u8; 1];
        match self.stdin.read(&mut buf) {
            Ok(1) => Some(buf[0] as i64),
            _ => Some(-1),
        }
    }
}

/// Buffers output and flushes once the program halts (or fails).
struct StdoutOutput {
    buf: Vec<u8>,
}

impl OutputSink for StdoutOutput {
    fn put_byte(&mut self, byte: i64) {
        self.buf.push(byte as u8);
    }
}

impl StdoutOutput {
    fn flush(&self) {
        let mut stdout = io::stdout().lock();
        let _ = stdout.write_all(&self.buf);
        let _ = stdout.flush();
    }
}

fn read_source(args: &Cli) -> io::Result<Vec<u8>> {
    match &args.file_path {
        Some(path) => fs::read(path),
        None => {
            let mut buf = Vec::new();
            io::stdin().read_to_end(&mut buf)?;
            Ok(buf)
        }
    }
}

fn main() {
    let args = Cli::parse();

    let source = match read_source(&args) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("{} {e}", "error:".red());
            std::process::exit(-1);
        }
    };

    let (prog, stop_pos) = match lower(&source) {
        Ok(result) => result,
        Err(e) => {
            eprintln!("{} {e}", "error:".red());
            std::process::exit(-1);
        }
    };

    if args.ir {
        dump::print_ir_human(&prog);
        return;
    }
    if args.json {
        if let Err(e) = dump::print_ir_json(&prog) {
            eprintln!("{} {e}", "error:".red());
            std::process::exit(-1);
        }
        return;
    }

    let input_buf = match source.get(stop_pos) {
        Some(b'!') => source[stop_pos + 1..].to_vec(),
        _ => Vec::new(),
    };

    if args.metrics {
        dump::print_metrics(&source, &prog);
    }

    let exit_code = run_with_cell(&args, prog, input_buf);
    std::process::exit(exit_code);
}

fn run_with_cell(args: &Cli, prog: bfopt::ir::Program, input_buf: Vec<u8>) -> i32 {
    macro_rules! run_as {
        ($cell:ty) => {{
            let mut vm: Vm<$cell> = Vm::new(prog, args.tape_size, input_buf);
            let mut input = StdinInput { stdin: io::stdin() };
            let mut output = StdoutOutput { buf: Vec::new() };

            let code = loop {
                match vm.run(args.budget, &mut input, &mut output) {
                    RunState::Running => continue,
                    RunState::Halted => break 0,
                    RunState::Err(ExecError::OutOfBounds { pc, sp }) => {
                        eprintln!(
                            "{} tape pointer out of bounds at pc {pc}, sp {sp}",
                            "error:".red()
                        );
                        break 1;
                    }
                }
            };

            output.flush();
            code
        }};
    }

    match (args.cell_size, args.signed) {
        (8, false) => run_as!(u8),
        (8, true) => run_as!(i8),
        (16, false) => run_as!(u16),
        (16, true) => run_as!(i16),
        (32, false) => run_as!(u32),
        (32, true) => run_as!(i32),
        (other, _) => {
            eprintln!("{} unsupported cell size {other} (expected 8, 16 or 32)", "error:".red());
            -1
        }
    }
}
