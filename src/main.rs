//! Command-line front-end: `squill [script-path]`.
//!
//! With a path, the file runs as one fragment and the process exits 0
//! on success or 1 with the error on stderr. Without one, an
//! interactive session starts: lines buffer until they form a
//! complete fragment, then the fragment executes against the
//! persistent session and the result is printed with its evaluation
//! time. Errors print in the warning color and clear the buffer.

use std::env;
use std::fs;
use std::process;
use std::time::Instant;

use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

use squill::script::{Script, is_complete_fragment};

const RESET: &str = "\x1b[0m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[38;2;121;146;227m";
const RED: &str = "\x1b[38;2;161;115;131m";
const GRAY: &str = "\x1b[90m";

fn main() {
    match env::args().nth(1) {
        Some(path) => run_file(&path),
        None => run_repl(),
    }
}

fn run_file(path: &str) {
    let source = match fs::read_to_string(path) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("{path}: {err}");
            process::exit(1);
        }
    };

    let mut script = Script::new();
    script.append(&source);
    if let Err(err) = script.execute() {
        eprintln!("{err}");
        process::exit(1);
    }
}

fn print_banner() {
    println!();
    println!(
        "{CYAN}squill{RESET} {GRAY}v{}{RESET} - an embeddable script interpreter",
        env!("CARGO_PKG_VERSION")
    );
    println!("C-like syntax, first-class functions, tables.");
    println!("{GRAY}Try: f = function(n) {{ if (n < 2) n else f(n-1) + f(n-2) }}; f(10){RESET}");
    println!("{GRAY}Ctrl+C or Ctrl+D to exit.{RESET}");
    println!();
}

fn run_repl() {
    print_banner();

    let mut editor = match DefaultEditor::new() {
        Ok(editor) => editor,
        Err(err) => {
            eprintln!("could not initialize line editor: {err}");
            process::exit(1);
        }
    };

    let mut script = Script::new();
    let mut buffer = String::new();

    loop {
        let prompt = if buffer.is_empty() { ">>> " } else { "... " };
        match editor.readline(prompt) {
            Ok(line) => {
                if buffer.is_empty() && line.trim().is_empty() {
                    continue;
                }
                if !buffer.is_empty() {
                    buffer.push(' ');
                }
                buffer.push_str(&line);

                match is_complete_fragment(&buffer) {
                    Ok(false) => continue,
                    Ok(true) => {
                        let _ = editor.add_history_entry(buffer.as_str());
                        script.append(&buffer);
                        let start = Instant::now();
                        match script.execute() {
                            Ok(result) => {
                                let elapsed_ms =
                                    start.elapsed().as_secs_f64() * 1000.0;
                                println!(
                                    "{GRAY}(return: {CYAN}{result}{GRAY}, time: {RED}{elapsed_ms:.3}ms{GRAY}){RESET}"
                                );
                            }
                            Err(err) => {
                                println!("{RED}{err}{RESET}");
                            }
                        }
                        buffer.clear();
                    }
                    Err(err) => {
                        println!("{RED}{err}{RESET}");
                        buffer.clear();
                    }
                }
            }
            Err(ReadlineError::Eof) | Err(ReadlineError::Interrupted) => {
                println!("{YELLOW}Goodbye!{RESET}");
                break;
            }
            Err(err) => {
                eprintln!("input error: {err:?}");
                process::exit(1);
            }
        }
    }
}
