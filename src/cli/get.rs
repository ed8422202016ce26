/* src/cli/get.rs */

use super::check_resource_name;
use crate::quic::client::Session;
use std::error::Error;
use std::path::Path;

pub async fn execute(
    session: &Session,
    remote_name: &str,
    local_path: &str,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    check_resource_name(remote_name)?;
    let received = session.get(remote_name, Path::new(local_path)).await?;
    println!("Success, {} bytes received into '{}'", received, local_path);
    Ok(())
}
