/* src/lib.rs */

//! Configure a device by dropping files on it. Uploading a file named after
//! a command keyword (`ip.txt`, `reboot.txt`, ...) triggers the matching
//! action; disruptive ones are queued until the next reboot.

pub mod cli;
pub mod device;
pub mod quic;
pub mod setup;
pub mod wsm;
