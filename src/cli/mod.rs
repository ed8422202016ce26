/* src/cli/mod.rs */

mod get;
mod put;

use crate::quic::client::Session;
use crate::setup::config::Config;
use lazy_static::lazy_static;
use log::info;
use regex::Regex;
use std::error::Error;

lazy_static! {
    static ref RESOURCE_NAME: Regex = Regex::new(r"^/?[a-zA-Z0-9_.@-]+(/[a-zA-Z0-9_.@-]+)*$").unwrap();
}

pub const USAGE: &str = "Usage: devdrop -c <config> put <local_file> <remote_name>\n       devdrop -c <config> get <remote_name> <local_file>";

pub async fn dispatch_command(args: &[String], cfg: &Config) -> Result<(), Box<dyn Error + Send + Sync>> {
    let Some((command, rest)) = args.split_first() else {
        return Err(USAGE.into());
    };
    info!("Executing command: '{}' with args: {:?}", command, rest);

    match command.to_lowercase().as_str() {
        "put" | "get" => {}
        other => return Err(format!("Unknown command: {}\n{}", other, USAGE).into()),
    }
    let [first, second] = rest else {
        return Err(USAGE.into());
    };

    let session = Session::connect(cfg).await?;
    let result = if command.eq_ignore_ascii_case("put") {
        put::execute(&session, first, second).await
    } else {
        get::execute(&session, first, second).await
    };
    session.close().await;
    result
}

pub fn check_resource_name(name: &str) -> Result<(), String> {
    if RESOURCE_NAME.is_match(name) {
        Ok(())
    } else {
        Err(format!(
            "Remote name '{}' contains invalid characters. Allowed are a-z, A-Z, 0-9, _, ., -, @ and '/' between segments.",
            name
        ))
    }
}
