mod format;
#[cfg(feature = "toml")]
pub mod toml;
mod types;

pub use format::*;
pub use types::*;
