/* src/device/error.rs */

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Everything that can go wrong while serving a transfer or handling a command.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),

    #[error("resource '{0}' resolves outside the data root")]
    OutsideRoot(String),

    #[error("open error on '{}': {source}", path.display())]
    Open { path: PathBuf, source: io::Error },

    #[error("create error on '{}': {source}", path.display())]
    Create { path: PathBuf, source: io::Error },

    #[error("mkdir error on '{}': {source}", path.display())]
    MkdirAll { path: PathBuf, source: io::Error },

    #[error("read error on '{}': {source}", path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("write error on '{}': {source}", path.display())]
    Write { path: PathBuf, source: io::Error },

    #[error("incorrect format")]
    Format,

    #[error("IP not found")]
    AddressMissing,

    #[error("MASK not found")]
    MaskMissing,

    #[error("'{0}' is not a valid IPv4 address")]
    InvalidAddress(String),

    #[error("'{0}' is not a valid netmask")]
    InvalidMask(String),

    #[error("unregistered command '{0}'")]
    UnrecognizedCommand(String),

    #[error("network tool '{tool}' not found: {source}")]
    ExternalToolMissing { tool: String, source: which::Error },

    #[error("failed to run '{tool}': {source}")]
    ToolSpawn { tool: String, source: io::Error },

    #[error("'{tool}' exited with {status}: {output}")]
    ToolFailed {
        tool: String,
        status: std::process::ExitStatus,
        output: String,
    },
}
