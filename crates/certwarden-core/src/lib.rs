pub mod acme;
pub mod config;
pub mod domain;
pub mod dynamic;
pub mod error;
pub mod tls;
