//! Command-line front ends. The binaries under `src/exec` only parse
//! arguments and map errors to an exit code.

pub mod texbind;
pub mod texhash;
