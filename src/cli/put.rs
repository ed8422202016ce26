/* src/cli/put.rs */

use super::check_resource_name;
use crate::quic::client::Session;
use log::info;
use std::error::Error;
use std::path::Path;

pub async fn execute(
    session: &Session,
    local_path: &str,
    remote_name: &str,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    check_resource_name(remote_name)?;

    let local = Path::new(local_path);
    if !local.is_file() {
        return Err(format!("'{}' is not a file.", local_path).into());
    }

    info!("Uploading '{}' as '{}'...", local_path, remote_name);
    let receipt = session.put(local, remote_name).await?;
    println!(
        "Success, {} bytes sent (sha256 {})",
        receipt.bytes, receipt.sha256
    );
    println!("Device: {} -> {}", receipt.command, receipt.outcome);
    Ok(())
}
