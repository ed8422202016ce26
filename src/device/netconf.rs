/* src/device/netconf.rs */

use super::error::DeviceError;
use super::queue::Job;
use log::{error, info};
use std::fmt;
use std::net::Ipv4Addr;
use std::process::Command;

pub const DEFAULT_TOOL: &str = "ifconfig";
pub const DEFAULT_INTERFACE: &str = "eth0";

const ADDRESS_KEY: &str = "IP:";
const MASK_KEY: &str = "NETMASK:";

/// Which executable to run and on which interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetconfTarget {
    pub tool: String,
    pub interface: String,
}

impl Default for NetconfTarget {
    fn default() -> Self {
        NetconfTarget {
            tool: DEFAULT_TOOL.to_string(),
            interface: DEFAULT_INTERFACE.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetReconfig {
    pub address: Ipv4Addr,
    pub mask: Ipv4Addr,
}

impl fmt::Display for NetReconfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.address, self.mask)
    }
}

impl NetReconfig {
    /// Parses `IP: <address> NETMASK: <mask>` (any whitespace between fields).
    pub fn parse(payload: &[u8]) -> Result<Self, DeviceError> {
        let text = String::from_utf8_lossy(payload);
        let fields: Vec<&str> = text.split_whitespace().collect();

        if fields.is_empty() {
            return Err(DeviceError::Format);
        }
        if fields[0] != ADDRESS_KEY {
            return Err(DeviceError::AddressMissing);
        }
        let address = fields.get(1).ok_or(DeviceError::AddressMissing)?;
        if fields.get(2) != Some(&MASK_KEY) {
            return Err(DeviceError::MaskMissing);
        }
        let mask = fields.get(3).ok_or(DeviceError::MaskMissing)?;

        let address: Ipv4Addr = address
            .parse()
            .map_err(|_| DeviceError::InvalidAddress(address.to_string()))?;
        let parsed_mask: Ipv4Addr = mask
            .parse()
            .map_err(|_| DeviceError::InvalidMask(mask.to_string()))?;
        if !is_contiguous(parsed_mask) {
            return Err(DeviceError::InvalidMask(mask.to_string()));
        }

        Ok(NetReconfig {
            address,
            mask: parsed_mask,
        })
    }

    pub fn into_job(self, target: NetconfTarget) -> Job {
        Job::new(format!("netconf {}", self), move || {
            self.apply(&target).map(|_| ())
        })
    }

    /// Runs `<tool> <interface> <address> netmask <mask>` and returns its combined output.
    pub fn apply(&self, target: &NetconfTarget) -> Result<String, DeviceError> {
        info!("Trying to change IP/MASK to {}", self);

        let tool_path = which::which(&target.tool).map_err(|source| {
            error!("'{}' not found on PATH: {}", target.tool, source);
            DeviceError::ExternalToolMissing {
                tool: target.tool.clone(),
                source,
            }
        })?;

        let output = Command::new(&tool_path)
            .arg(&target.interface)
            .arg(self.address.to_string())
            .arg("netmask")
            .arg(self.mask.to_string())
            .output()
            .map_err(|source| DeviceError::ToolSpawn {
                tool: target.tool.clone(),
                source,
            })?;

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        if !output.status.success() {
            error!("Unsuccessfully! IP not changed: {}", combined.trim());
            return Err(DeviceError::ToolFailed {
                tool: target.tool.clone(),
                status: output.status,
                output: combined,
            });
        }

        info!("Successfully: {}", combined.trim());
        Ok(combined)
    }
}

fn is_contiguous(mask: Ipv4Addr) -> bool {
    let bits = u32::from(mask);
    bits.leading_ones() + bits.trailing_zeros() == 32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_address_and_mask() {
        let req = NetReconfig::parse(b"IP: 192.168.1.5 NETMASK: 255.255.255.0").unwrap();
        assert_eq!(req.address, Ipv4Addr::new(192, 168, 1, 5));
        assert_eq!(req.mask, Ipv4Addr::new(255, 255, 255, 0));

        let req = NetReconfig::parse(b"IP:\t10.0.0.2\r\nNETMASK:  255.0.0.0\n").unwrap();
        assert_eq!(req.to_string(), "10.0.0.2/255.0.0.0");
    }

    #[test]
    fn reports_which_part_is_missing() {
        assert!(matches!(NetReconfig::parse(b""), Err(DeviceError::Format)));
        assert!(matches!(NetReconfig::parse(b"  \n "), Err(DeviceError::Format)));
        assert!(matches!(
            NetReconfig::parse(b"NETMASK: 255.255.255.0"),
            Err(DeviceError::AddressMissing)
        ));
        assert!(matches!(
            NetReconfig::parse(b"IP:"),
            Err(DeviceError::AddressMissing)
        ));
        assert!(matches!(
            NetReconfig::parse(b"IP: 192.168.1.5"),
            Err(DeviceError::MaskMissing)
        ));
        assert!(matches!(
            NetReconfig::parse(b"IP: 192.168.1.5 MASK: 255.255.255.0"),
            Err(DeviceError::MaskMissing)
        ));
        assert!(matches!(
            NetReconfig::parse(b"IP: 192.168.1.5 NETMASK:"),
            Err(DeviceError::MaskMissing)
        ));
    }

    #[test]
    fn rejects_malformed_addresses() {
        assert!(matches!(
            NetReconfig::parse(b"IP: 300.1.1.1 NETMASK: 255.255.255.0"),
            Err(DeviceError::InvalidAddress(a)) if a == "300.1.1.1"
        ));
        assert!(matches!(
            NetReconfig::parse(b"IP: 10.0.0.1 NETMASK: 255.0.255.0"),
            Err(DeviceError::InvalidMask(_))
        ));
        assert!(NetReconfig::parse(b"IP: 10.0.0.1 NETMASK: 0.0.0.0").is_ok());
    }

    #[test]
    fn missing_tool_fails_only_this_job() {
        let req = NetReconfig::parse(b"IP: 10.0.0.1 NETMASK: 255.255.255.0").unwrap();
        let target = NetconfTarget {
            tool: "devdrop-no-such-netconf-tool".to_string(),
            interface: "eth0".to_string(),
        };
        assert!(matches!(
            req.apply(&target),
            Err(DeviceError::ExternalToolMissing { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn passes_positional_arguments_to_the_tool() {
        let req = NetReconfig::parse(b"IP: 10.0.0.1 NETMASK: 255.255.255.0").unwrap();
        let target = NetconfTarget {
            tool: "echo".to_string(),
            interface: "eth9".to_string(),
        };
        let output = req.apply(&target).unwrap();
        assert_eq!(output.trim(), "eth9 10.0.0.1 netmask 255.255.255.0");
    }
}
