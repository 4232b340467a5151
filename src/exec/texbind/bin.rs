use std::process;

use clap::Parser;
use texbind::tools::texbind::{TexbindArgs, run_cli};

fn main() {
    let args = TexbindArgs::parse();
    if let Err(err) = run_cli(&args) {
        eprintln!("error: {err}");
        process::exit(1);
    }
}
