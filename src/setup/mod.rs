/* src/setup/mod.rs */

pub mod cert;
pub mod check;
pub mod config;
pub mod gen_conf;
