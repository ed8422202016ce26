/* src/device/upload.rs */

use super::command::{CommandOutcome, CommandProcessor};
use super::error::DeviceError;
use super::path::{split_path, DataRoot};
use log::{error, info};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::{DirBuilder, File};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};

const COPY_BUFFER: usize = 8192;

#[cfg(unix)]
const DIR_MODE: u32 = 0o755;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReceipt {
    pub path: PathBuf,
    pub bytes: u64,
    pub sha256: String,
    pub token: String,
    pub outcome: CommandOutcome,
}

/// The lower-cased base name of a remote resource name.
pub fn command_token(name: &str) -> String {
    split_path(name).1.to_lowercase()
}

/// Persists uploads under the data root and hands their content to the
/// command processor.
#[derive(Clone)]
pub struct UploadSink {
    root: DataRoot,
    processor: Arc<CommandProcessor>,
}

impl UploadSink {
    pub fn new(root: DataRoot, processor: Arc<CommandProcessor>) -> Self {
        UploadSink { root, processor }
    }

    /// Writes `source` to disk and into memory at the same time, then runs the
    /// command named by the base name. A failing command leaves the file in place.
    pub async fn accept<R>(&self, name: &str, source: &mut R) -> Result<UploadReceipt, DeviceError>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        info!("Query for {}", name);
        let path = self.root.resolve(name)?;
        info!("Write to {}", path.display());

        let path_str = path.to_string_lossy();
        let (dir, _) = split_path(&path_str);
        if !dir.is_empty() {
            create_dir_all(Path::new(dir)).await.map_err(|source| {
                error!("MkdirAll error {}", source);
                DeviceError::MkdirAll {
                    path: PathBuf::from(dir),
                    source,
                }
            })?;
        }

        let mut file = File::create(&path).await.map_err(|source| {
            error!("Open error {}", source);
            DeviceError::Create {
                path: path.clone(),
                source,
            }
        })?;

        let payload = tee(source, &mut file).await.map_err(|source| {
            error!("Write error {}", source);
            DeviceError::Write {
                path: path.clone(),
                source,
            }
        })?;
        let bytes = payload.len() as u64;
        let sha256 = hex::encode(Sha256::digest(&payload));
        info!("{} bytes received (sha256 {})", bytes, sha256);

        let token = command_token(name);
        let outcome = self.processor.process(&token, &payload)?;
        info!("Command {} handled: {}", token, outcome);

        Ok(UploadReceipt {
            path,
            bytes,
            sha256,
            token,
            outcome,
        })
    }
}

// Every chunk goes to the file and then to the buffer, once and in order.
async fn tee<R>(source: &mut R, file: &mut File) -> std::io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut captured = Vec::new();
    let mut chunk = [0u8; COPY_BUFFER];
    loop {
        let n = source.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        file.write_all(&chunk[..n]).await?;
        captured.extend_from_slice(&chunk[..n]);
    }
    file.flush().await?;
    Ok(captured)
}

async fn create_dir_all(dir: &Path) -> std::io::Result<()> {
    let mut builder = DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    builder.mode(DIR_MODE);
    builder.create(dir).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::command::{Command, DEFAULT_DRAIN_DELAY};
    use crate::device::download::DownloadSource;
    use crate::device::netconf::NetconfTarget;
    use crate::device::queue::{JobQueue, DEFAULT_CAPACITY};

    fn sink_at(root: &Path) -> (UploadSink, Arc<JobQueue>) {
        let queue = Arc::new(JobQueue::new(DEFAULT_CAPACITY));
        let processor = CommandProcessor::new(
            Arc::clone(&queue),
            NetconfTarget::default(),
            DEFAULT_DRAIN_DELAY,
        );
        let root = DataRoot::new(root.to_str().unwrap()).unwrap();
        (UploadSink::new(root, Arc::new(processor)), queue)
    }

    #[test]
    fn token_is_lowercased_base_name() {
        assert_eq!(command_token("/cfg/IP.TXT"), "ip.txt");
        assert_eq!(command_token("Ip.Txt"), "ip.txt");
        assert_eq!(command_token("a/b/Reboot.TXT"), "reboot.txt");
    }

    #[tokio::test]
    async fn ip_command_dispatches_regardless_of_case() {
        let dir = tempfile::tempdir().unwrap();
        let (sink, queue) = sink_at(dir.path());

        for name in ["IP.TXT", "ip.txt", "/net/Ip.Txt"] {
            let mut payload: &[u8] = b"IP: 192.168.1.5 NETMASK: 255.255.255.0";
            let receipt = sink.accept(name, &mut payload).await.unwrap();
            assert_eq!(receipt.token, "ip.txt");
            assert!(matches!(receipt.outcome, CommandOutcome::Queued { .. }));
        }
        assert_eq!(queue.len(), 3);
    }

    #[tokio::test]
    async fn persists_content_and_creates_directories() {
        let dir = tempfile::tempdir().unwrap();
        let (sink, _) = sink_at(dir.path());

        let mut payload: &[u8] = b"ACME lighting";
        let receipt = sink.accept("/deep/nested/brand.txt", &mut payload).await.unwrap();

        assert_eq!(receipt.bytes, 13);
        assert_eq!(receipt.outcome, CommandOutcome::Acknowledged(Command::Brand));
        assert_eq!(
            receipt.sha256,
            hex::encode(Sha256::digest(b"ACME lighting"))
        );
        let on_disk = std::fs::read(dir.path().join("deep/nested/brand.txt")).unwrap();
        assert_eq!(on_disk, b"ACME lighting");
    }

    #[tokio::test]
    async fn unknown_command_still_writes_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let (sink, _) = sink_at(dir.path());

        let mut payload: &[u8] = b"\x00\x01raw bytes\xff";
        match sink.accept("unknown.dat", &mut payload).await {
            Err(DeviceError::UnrecognizedCommand(token)) => assert_eq!(token, "unknown.dat"),
            other => panic!("unexpected result {:?}", other),
        }
        let on_disk = std::fs::read(dir.path().join("unknown.dat")).unwrap();
        assert_eq!(on_disk, b"\x00\x01raw bytes\xff");
    }

    #[tokio::test]
    async fn bad_ip_payload_fails_after_the_write() {
        let dir = tempfile::tempdir().unwrap();
        let (sink, queue) = sink_at(dir.path());

        let mut payload: &[u8] = b"NETMASK: 255.255.255.0";
        assert!(matches!(
            sink.accept("ip.txt", &mut payload).await,
            Err(DeviceError::AddressMissing)
        ));
        assert!(dir.path().join("ip.txt").exists());
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn escaping_names_are_refused_before_touching_disk() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("root");
        std::fs::create_dir(&root).unwrap();
        let (sink, _) = sink_at(&root);

        let mut payload: &[u8] = b"x";
        assert!(matches!(
            sink.accept("../dummy.txt", &mut payload).await,
            Err(DeviceError::OutsideRoot(_))
        ));
        assert!(!dir.path().join("dummy.txt").exists());
    }

    #[tokio::test]
    async fn upload_then_download_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let (sink, _) = sink_at(dir.path());
        let source = DownloadSource::new(DataRoot::new(dir.path().to_str().unwrap()).unwrap());

        let content: Vec<u8> = (0..20_000u32).map(|i| (i % 251) as u8).collect();
        let mut reader: &[u8] = &content;
        sink.accept("/fw/boot.bin", &mut reader).await.unwrap();

        let mut back = Vec::new();
        let n = source.serve("/fw/boot.bin", &mut back).await.unwrap();
        assert_eq!(n, content.len() as u64);
        assert_eq!(back, content);
    }
}
