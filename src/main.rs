//! Filegate entry point
//!
//! Delegates everything to the CLI module and exits non-zero on failure.

use filegate::cli;

fn main() {
    if let Err(e) = cli::run() {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}
