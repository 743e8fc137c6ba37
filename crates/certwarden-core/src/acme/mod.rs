// The ACME certificate provider: account handling, issuance, renewal and the
// certificate cache published to the proxy.

mod account;
mod cache;
mod client;
mod provider;
mod renewal;
mod store;
mod tracker;
mod watcher;

pub use account::*;
pub use cache::*;
pub use client::*;
pub use provider::*;
pub use renewal::*;
pub use store::*;
pub use tracker::*;
pub use watcher::*;
