/* src/quic/mod.rs */

pub mod auth;
pub mod bootstrap;
pub mod client;
pub mod service;
