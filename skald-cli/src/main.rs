//! Skald CLI — assemble and execute scripts.
//!
//! Exit codes:
//! - 0: Success
//! - 1: Input or assembly error
//! - 3: Runtime error

mod commands;

use std::process;

fn main() {
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_usage();
        process::exit(1);
    }

    let result = match args[1].as_str() {
        "run" => commands::run(&args[2..]),
        "dis" => commands::dis(&args[2..]),
        "--help" | "-h" | "help" => {
            print_usage();
            process::exit(0);
        }
        other => {
            eprintln!("error: unknown command '{other}'");
            eprintln!();
            print_usage();
            process::exit(1);
        }
    };

    if let Err(code) = result {
        process::exit(code);
    }
}

fn print_usage() {
    eprintln!("Usage: skald <command> [args]");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  run [--stack-size N] <script.skd>   Assemble and execute a script");
    eprintln!("  dis <script.skd>                    Assemble a script and print its bytecode listing");
}
