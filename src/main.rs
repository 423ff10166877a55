// ABOUTME: CLI entry point and the read-eval-print loop

use clap::Parser;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use sch::builtins::io::load_file;
use sch::config::{CONTINUATION_PROMPT, GOODBYE_MESSAGE, PROMPT, WELCOME_MESSAGE};
use sch::error::SchError;
use sch::eval::eval;
use sch::heap::Heap;
use sch::port::InPort;
use sch::printer::print_to_string;
use sch::reader::read_datum;
use std::path::PathBuf;
use std::process;

/// An interactive interpreter for a small Scheme dialect
#[derive(Parser, Debug)]
#[command(name = "sch")]
#[command(version)]
#[command(about = "An interactive Scheme-subset interpreter")]
struct CliArgs {
    /// Script file to evaluate (optional - if not provided, starts the REPL)
    #[arg(value_name = "FILE")]
    script: Option<PathBuf>,
}

fn main() {
    let args = CliArgs::parse();
    if let Err(e) = run(args) {
        eprintln!("*** {}", e);
        process::exit(1);
    }
}

fn run(args: CliArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut heap = Heap::new()?;

    if let Some(script) = args.script {
        load_file(&mut heap, &script.to_string_lossy())?;
        return Ok(());
    }

    repl(&mut heap)
}

fn repl(heap: &mut Heap) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", WELCOME_MESSAGE);

    let mut rl = DefaultEditor::new()?;
    let mut pending = String::new();

    loop {
        let prompt = if pending.is_empty() {
            PROMPT
        } else {
            CONTINUATION_PROMPT
        };
        match rl.readline(prompt) {
            Ok(line) => {
                if pending.is_empty() && line.trim().is_empty() {
                    continue;
                }
                pending.push_str(&line);
                pending.push('\n');
                if !input_is_complete(&pending) {
                    continue;
                }
                let source = std::mem::take(&mut pending);
                let _ = rl.add_history_entry(source.trim());
                evaluate_source(heap, source)?;
            }
            Err(ReadlineError::Interrupted) => {
                pending.clear();
            }
            Err(ReadlineError::Eof) => {
                println!("{}", GOODBYE_MESSAGE);
                return Ok(());
            }
            Err(e) => return Err(Box::new(e)),
        }
    }
}

/// Read, evaluate and print every expression in the buffer.
fn evaluate_source(heap: &mut Heap, source: String) -> Result<(), SchError> {
    let port = InPort::from_bytes(source.into_bytes());
    loop {
        let expr = read_datum(heap, &port)?;
        if expr == heap.eof {
            return Ok(());
        }
        let global = heap.global_env;
        let result = eval(heap, expr, global)?;
        println!("{}", print_to_string(heap, result));
        // transient roots never accumulate across top-level expressions
        heap.clear_roots();
    }
}

/// A buffer is complete once its parentheses balance outside of string
/// literals and comments and it holds at least one token.
fn input_is_complete(source: &str) -> bool {
    let mut depth: i32 = 0;
    let mut in_string = false;
    let mut escaped = false;
    let mut significant = false;
    let mut bytes = source.bytes();
    while let Some(b) = bytes.next() {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => {
                in_string = true;
                significant = true;
            }
            b'(' => {
                depth += 1;
                significant = true;
            }
            b')' => depth -= 1,
            b';' => {
                for c in bytes.by_ref() {
                    if c == b'\n' {
                        break;
                    }
                }
            }
            c if !c.is_ascii_whitespace() => significant = true,
            _ => {}
        }
    }
    significant && depth <= 0 && !in_string
}
