mod acme;
mod config;
mod domain;
mod log;

pub use acme::*;
pub use config::*;
pub use domain::*;
pub use self::log::*;
