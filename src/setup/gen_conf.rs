/* src/setup/gen_conf.rs */

use super::cert::generate_certificate;
use pnet::datalink;
use std::error::Error;
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use uuid::Uuid;

// Scans for available IPv4 addresses and prompts the user to select one.
fn select_ip_address() -> io::Result<String> {
    let ipv4_addrs: Vec<String> = datalink::interfaces()
        .into_iter()
        .flat_map(|iface| iface.ips)
        .filter(|ip| ip.is_ipv4() && !ip.ip().is_loopback())
        .map(|ip| ip.ip().to_string())
        .collect();

    match ipv4_addrs.as_slice() {
        [] => {
            println!("> No network interfaces with a valid IPv4 address found. Falling back to 127.0.0.1.");
            Ok("127.0.0.1".to_string())
        }
        [ip] => {
            println!("> Found a single IPv4 address: {}. Using it.", ip);
            Ok(ip.clone())
        }
        _ => {
            println!("> Multiple IPv4 addresses found. Please choose one:");
            for (i, ip) in ipv4_addrs.iter().enumerate() {
                println!("  {}) {}", i + 1, ip);
            }

            loop {
                print!("> Enter the number of the IP address to use: ");
                io::stdout().flush()?;

                let mut input = String::new();
                if io::stdin().read_line(&mut input)? == 0 {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "no address selected",
                    ));
                }

                match input.trim().parse::<usize>() {
                    Ok(n) if n > 0 && n <= ipv4_addrs.len() => {
                        let selected_ip = ipv4_addrs[n - 1].clone();
                        println!("> You selected: {}", selected_ip);
                        return Ok(selected_ip);
                    }
                    _ => {
                        println!(
                            "! Invalid selection. Please enter a number between 1 and {}.",
                            ipv4_addrs.len()
                        );
                    }
                }
            }
        }
    }
}

pub fn render_default_config(cert_path: &str, key_path: &str, token: &str, ip: &str) -> String {
    format!(
        r#"[setup]
mode = "server"
certificate = "{cert_path}"
private_key = "{key_path}"
auth_token = "{token}"
log_level = "info"

[network]
listen = "0.0.0.0"
address = "{ip}"
port = 33321
idle_timeout_secs = 10

[device]
data_root = "/var/lib/devdrop"
interface = "eth0"
netconf_tool = "ifconfig"
queue_capacity = 9
drain_delay_ms = 10
max_upload_bytes = 1048576
"#
    )
}

// Generates a default configuration file after prompting the user to select an IP address.
pub fn generate_default_config<P: AsRef<Path>>(path: P) -> Result<(), Box<dyn Error>> {
    let selected_ip = select_ip_address()?;
    let cert_path = "cert.crt";
    let key_path = "cert.key";

    println!(
        "> Generating certificate '{}' and key '{}' for IP address {}...",
        cert_path, key_path, selected_ip
    );
    generate_certificate(cert_path, key_path, &selected_ip)?;
    println!("+ Certificate and key generated successfully.");

    let token = Uuid::new_v4().to_string();
    let content = render_default_config(cert_path, key_path, &token, &selected_ip);
    fs::write(path, content)?;
    println!("+ Default configuration file created successfully.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::setup::config::Config;

    #[test]
    fn rendered_config_parses_back() {
        let text = render_default_config("c.crt", "c.key", "tok", "192.168.0.7");
        let cfg = Config::from_toml(&text).unwrap();
        assert_eq!(cfg.setup.auth_token, "tok");
        assert_eq!(cfg.network.address, "192.168.0.7");
        let device = cfg.device.unwrap();
        assert_eq!(device.data_root, "/var/lib/devdrop");
        assert_eq!(device.queue_capacity, 9);
    }
}
