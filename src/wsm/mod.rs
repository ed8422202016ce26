/* src/wsm/mod.rs */

pub mod endpoints;
pub mod header;
pub mod messages;
