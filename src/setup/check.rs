/* src/setup/check.rs */

use super::config::{Config, DeviceConfig};
use lazy_static::lazy_static;
use log::warn;
use pnet::datalink;
use regex::Regex;
use std::fs;
use std::path::Path;
use uuid::Uuid;

lazy_static! {
    static ref INTERFACE_NAME: Regex = Regex::new(r"^[a-zA-Z0-9_.:-]+$").unwrap();
}

// Main validation entry point
pub fn validate_server_config(config: &Config) -> Result<(), String> {
    println!("> Performing server configuration checks...");

    let device = config.device.as_ref().ok_or_else(|| {
        "Configuration error: The 'device' table is missing, which is required for server mode."
            .to_string()
    })?;

    validate_queue(device)?;
    validate_interface(device)?;
    validate_data_root(&device.data_root)?;

    println!("+ Configuration checks passed successfully.");
    Ok(())
}

fn validate_queue(device: &DeviceConfig) -> Result<(), String> {
    if device.queue_capacity == 0 {
        return Err("Configuration error: queue_capacity must be at least 1.".to_string());
    }
    if device.max_upload_bytes == 0 || device.max_upload_bytes > u32::MAX as u64 {
        return Err(format!(
            "Configuration error: max_upload_bytes must be between 1 and {}.",
            u32::MAX
        ));
    }
    if device.netconf_tool.trim().is_empty() {
        return Err("Configuration error: netconf_tool must not be empty.".to_string());
    }
    Ok(())
}

// interface must be a plain name; absence on this host is only a warning
fn validate_interface(device: &DeviceConfig) -> Result<(), String> {
    if !INTERFACE_NAME.is_match(&device.interface) {
        return Err(format!(
            "Configuration error: interface '{}' contains invalid characters.",
            device.interface
        ));
    }
    let present = datalink::interfaces()
        .iter()
        .any(|iface| iface.name == device.interface);
    if !present {
        warn!(
            "Interface '{}' not found on this host; IP change jobs will likely fail.",
            device.interface
        );
    }
    Ok(())
}

// data_root must be a writable directory, created when absent
fn validate_data_root(data_root: &str) -> Result<(), String> {
    if data_root.is_empty() {
        return Err("Configuration error: data_root must not be empty.".to_string());
    }

    let path = Path::new(data_root);
    if !path.exists() {
        fs::create_dir_all(path).map_err(|e| {
            format!(
                "Configuration error: Failed to create data_root '{}': {}",
                data_root, e
            )
        })?;
        println!("> Created data_root '{}'.", data_root);
    } else if !path.is_dir() {
        return Err(format!(
            "Configuration error: data_root '{}' is not a directory.",
            data_root
        ));
    }

    // Attempt to write and delete a temporary file
    let temp_path = path.join(format!("devdrop-write-check-{}.tmp", Uuid::new_v4()));
    if fs::write(&temp_path, "test").is_err() {
        return Err(format!(
            "Configuration error: No write permission for data_root '{}'.",
            data_root
        ));
    }
    if fs::remove_file(&temp_path).is_err() {
        return Err(format!(
            "Configuration error: Failed to clean up temporary file in data_root '{}'. Check permissions.",
            data_root
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::setup::config::Config;

    fn config_with(data_root: &str, interface: &str, capacity: usize) -> Config {
        Config::from_toml(&format!(
            r#"
[setup]
mode = "server"
certificate = "cert.crt"
private_key = "cert.key"
auth_token = "secret"
log_level = "info"

[network]
listen = "0.0.0.0"
address = "127.0.0.1"
port = 33321

[device]
data_root = "{}"
interface = "{}"
queue_capacity = {}
"#,
            data_root, interface, capacity
        ))
        .unwrap()
    }

    #[test]
    fn accepts_a_writable_root_and_creates_missing_ones() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("fresh/data");
        let cfg = config_with(root.to_str().unwrap(), "lo", 9);

        validate_server_config(&cfg).unwrap();
        assert!(root.is_dir());
        assert_eq!(fs::read_dir(&root).unwrap().count(), 0);
    }

    #[test]
    fn rejects_bad_interface_and_capacity() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_str().unwrap();

        assert!(validate_server_config(&config_with(root, "eth0; reboot", 9)).is_err());
        assert!(validate_server_config(&config_with(root, "eth0", 0)).is_err());
    }

    #[test]
    fn rejects_a_file_as_root() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("plain");
        fs::write(&file, "x").unwrap();
        assert!(validate_server_config(&config_with(file.to_str().unwrap(), "eth0", 9)).is_err());
    }
}
