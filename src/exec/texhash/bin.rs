use std::process;

use clap::Parser;
use texbind::tools::texhash::{TexhashArgs, run_cli};

fn main() {
    let args = TexhashArgs::parse();
    if let Err(err) = run_cli(&args) {
        eprintln!("error: {err}");
        process::exit(1);
    }
}
