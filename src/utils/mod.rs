pub mod atomic;
pub mod paths;

pub use atomic::*;
pub use paths::*;
