//! Texture-set resolution, top-mip hashing, derived texture synthesis and a
//! USDA material overlay for large DDS texture corpora.
//!
//! The registry pipeline drives everything: it indexes the corpus, resolves
//! each diffuse texture's companions, collapses textures whose top mip hashes
//! equal into one material, synthesizes missing maps and writes the document.

pub mod config;
pub mod dds;
pub mod derive;
pub mod error;
pub mod hash;
pub mod logging;
pub mod registry;
pub mod resolve;
pub mod tools;
pub mod utils;

pub use config::GenConfig;
pub use error::{Result, TexbindError};
pub use hash::ContentHash;
pub use registry::{PipelineOptions, RunReport, run};
pub use resolve::{Slot, SlotMap};
