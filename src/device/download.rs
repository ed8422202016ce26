/* src/device/download.rs */

use super::error::DeviceError;
use super::path::DataRoot;
use log::{error, info};
use std::path::PathBuf;
use tokio::fs::File;
use tokio::io::{self, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// An opened local file ready to be streamed to a peer.
#[derive(Debug)]
pub struct OpenedFile {
    pub path: PathBuf,
    pub len: u64,
    file: File,
}

/// Serves files under the data root for download requests.
#[derive(Debug, Clone)]
pub struct DownloadSource {
    root: DataRoot,
}

impl DownloadSource {
    pub fn new(root: DataRoot) -> Self {
        DownloadSource { root }
    }

    pub async fn open(&self, name: &str) -> Result<OpenedFile, DeviceError> {
        info!("Query for {}", name);
        let path = self.root.resolve(name)?;
        info!("Read from {}", path.display());

        let file = File::open(&path).await.map_err(|source| {
            error!("Open error {}", source);
            DeviceError::Open {
                path: path.clone(),
                source,
            }
        })?;
        let meta = file.metadata().await.map_err(|source| DeviceError::Open {
            path: path.clone(),
            source,
        })?;
        if !meta.is_file() {
            error!("Open error {} is not a regular file", path.display());
            return Err(DeviceError::Open {
                path,
                source: io::Error::new(io::ErrorKind::InvalidInput, "not a regular file"),
            });
        }
        Ok(OpenedFile {
            path,
            len: meta.len(),
            file,
        })
    }

    /// Copies exactly the length seen at open into `sink`. A file that
    /// shrank meanwhile is a Read error; growth past it is not sent.
    pub async fn stream<W>(&self, opened: OpenedFile, sink: &mut W) -> Result<u64, DeviceError>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let OpenedFile { path, len, file } = opened;
        let sent = async {
            let n = io::copy(&mut file.take(len), &mut *sink).await?;
            sink.flush().await?;
            if n != len {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("file ended after {} of {} bytes", n, len),
                ));
            }
            Ok::<u64, io::Error>(n)
        }
        .await
        .map_err(|source| {
            error!("Read error {}", source);
            DeviceError::Read { path, source }
        })?;
        info!("{} bytes sent", sent);
        Ok(sent)
    }

    pub async fn serve<W>(&self, name: &str, sink: &mut W) -> Result<u64, DeviceError>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let opened = self.open(name).await?;
        self.stream(opened, sink).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn serves_file_content() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("cfg")).unwrap();
        std::fs::write(dir.path().join("cfg/brand.txt"), b"ACME").unwrap();

        let source = DownloadSource::new(DataRoot::new(dir.path().to_str().unwrap()).unwrap());
        let mut sink = Vec::new();
        let n = source.serve("/cfg/brand.txt", &mut sink).await.unwrap();

        assert_eq!(n, 4);
        assert_eq!(sink, b"ACME");
    }

    #[tokio::test]
    async fn missing_file_is_an_open_error() {
        let dir = tempdir().unwrap();
        let source = DownloadSource::new(DataRoot::new(dir.path().to_str().unwrap()).unwrap());
        let mut sink = Vec::new();
        assert!(matches!(
            source.serve("nope.txt", &mut sink).await,
            Err(DeviceError::Open { .. })
        ));
        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn directory_is_refused_at_open() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("cfg")).unwrap();
        let source = DownloadSource::new(DataRoot::new(dir.path().to_str().unwrap()).unwrap());

        assert!(matches!(source.open("cfg").await, Err(DeviceError::Open { .. })));
        let mut sink = Vec::new();
        assert!(matches!(
            source.serve("cfg", &mut sink).await,
            Err(DeviceError::Open { .. })
        ));
        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn stream_sends_only_the_length_seen_at_open() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("brand.txt");
        std::fs::write(&file, b"ACME").unwrap();
        let source = DownloadSource::new(DataRoot::new(dir.path().to_str().unwrap()).unwrap());

        let opened = source.open("brand.txt").await.unwrap();
        assert_eq!(opened.len, 4);
        std::fs::write(&file, b"ACME and much more").unwrap();

        let mut sink = Vec::new();
        assert_eq!(source.stream(opened, &mut sink).await.unwrap(), 4);
        assert_eq!(sink, b"ACME");
    }

    #[tokio::test]
    async fn file_shrunk_after_open_is_a_read_error() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("brand.txt");
        std::fs::write(&file, b"ACME").unwrap();
        let source = DownloadSource::new(DataRoot::new(dir.path().to_str().unwrap()).unwrap());

        let opened = source.open("brand.txt").await.unwrap();
        std::fs::write(&file, b"AC").unwrap();

        let mut sink = Vec::new();
        assert!(matches!(
            source.stream(opened, &mut sink).await,
            Err(DeviceError::Read { .. })
        ));
    }
}
