/* src/device/mod.rs */

pub mod command;
pub mod download;
pub mod error;
pub mod netconf;
pub mod path;
pub mod queue;
pub mod upload;

use crate::setup::config::DeviceConfig;
use command::CommandProcessor;
use download::DownloadSource;
use error::DeviceError;
use netconf::NetconfTarget;
use path::DataRoot;
use queue::JobQueue;
use std::sync::Arc;
use std::time::Duration;
use upload::UploadSink;

/// Everything a transfer handler needs, shared across connections.
#[derive(Clone)]
pub struct Device {
    pub download: DownloadSource,
    pub upload: UploadSink,
    pub queue: Arc<JobQueue>,
    pub max_upload_bytes: u64,
}

impl Device {
    pub fn from_config(cfg: &DeviceConfig) -> Result<Self, DeviceError> {
        let root = DataRoot::new(cfg.data_root.clone())?;
        let queue = Arc::new(JobQueue::new(cfg.queue_capacity));
        let processor = CommandProcessor::new(
            Arc::clone(&queue),
            NetconfTarget {
                tool: cfg.netconf_tool.clone(),
                interface: cfg.interface.clone(),
            },
            Duration::from_millis(cfg.drain_delay_ms),
        );

        Ok(Device {
            download: DownloadSource::new(root.clone()),
            upload: UploadSink::new(root, Arc::new(processor)),
            queue,
            max_upload_bytes: cfg.max_upload_bytes,
        })
    }
}
