//! Terminal front end for the community feed.
//!
//! # Responsibility
//! - Parse arguments, load configuration and initialize logging.
//! - Hand control to the interactive session on a single-threaded runtime.

mod app;
mod cli;
mod view;

fn main() {
    if let Err(err) = cli::run() {
        eprintln!("{err:#}");
        std::process::exit(1);
    }
}
