/* src/quic/client.rs */

use crate::quic::auth;
use crate::setup::config::Config;
use crate::wsm::header::{OpCode, PayloadType, WsmHeader};
use crate::wsm::messages::{ReceiptMessage, TransferRequest};
use log::info;
use quinn::{ClientConfig, Connection, Endpoint, IdleTimeout, TransportConfig};
use rustls::{ClientConfig as RustlsClientConfig, RootCertStore};
use std::error::Error;
use std::fs::File;
use std::io::BufReader;
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::fs as tokio_fs;
use tokio::io::AsyncReadExt;

type BoxError = Box<dyn Error + Send + Sync>;

const MAX_RECEIPT_LEN: usize = 64 * 1024;

/// An authenticated session with a device.
pub struct Session {
    endpoint: Endpoint,
    connection: Connection,
}

impl Session {
    pub async fn connect(cfg: &Config) -> Result<Self, BoxError> {
        let mut roots = RootCertStore::empty();
        let mut reader = BufReader::new(File::open(&cfg.setup.certificate)?);
        for cert in rustls_pemfile::certs(&mut reader) {
            roots.add(cert?)?;
        }
        let tls_config = RustlsClientConfig::builder()
            .with_root_certificates(roots)
            .with_no_client_auth();

        let mut transport = TransportConfig::default();
        transport.keep_alive_interval(Some(Duration::from_secs(3)));
        transport.max_idle_timeout(Some(IdleTimeout::try_from(Duration::from_secs(
            cfg.network.idle_timeout_secs,
        ))?));

        let mut client_config = ClientConfig::new(Arc::new(
            quinn::crypto::rustls::QuicClientConfig::try_from(tls_config)?,
        ));
        client_config.transport_config(Arc::new(transport));

        let mut endpoint = Endpoint::client("[::]:0".parse()?)?;
        endpoint.set_default_client_config(client_config);

        let addr_str = format!("{}:{}", cfg.network.address, cfg.network.port);
        let remote_addr: SocketAddr = addr_str
            .to_socket_addrs()?
            .next()
            .ok_or("Invalid address")?;

        let connection = endpoint.connect(remote_addr, "localhost")?.await?;
        info!("Connection established with {}", connection.remote_address());

        auth::login(&connection, &cfg.setup.auth_token, rand::random::<u8>()).await?;
        Ok(Session {
            endpoint,
            connection,
        })
    }

    /// Uploads `local` as `resource`; the device may act on it as a command.
    pub async fn put(&self, local: &Path, resource: &str) -> Result<ReceiptMessage, BoxError> {
        let content = tokio_fs::read(local).await?;
        let local_hash = sha256_hex(&content);
        let message_id = rand::random::<u8>();

        let request = serde_json::to_vec(&TransferRequest {
            resource: resource.to_string(),
            size: Some(content.len() as u64),
        })?;

        let (mut send, mut recv) = self.connection.open_bi().await?;
        send.write_all(&WsmHeader::frame(OpCode::Write, message_id, PayloadType::Json, &request))
            .await?;
        send.write_all(&content).await?;
        send.finish()?;
        info!("{} bytes sent as '{}' (id: {})", content.len(), resource, message_id);

        let header = auth::read_header(&mut recv).await?;
        let payload = recv.read_to_end(MAX_RECEIPT_LEN).await?;
        match header.op() {
            Ok(OpCode::Ack) => {
                let receipt: ReceiptMessage = serde_json::from_slice(&payload)?;
                if receipt.sha256 != local_hash {
                    return Err(format!(
                        "checksum mismatch: sent {}, device stored {}",
                        local_hash, receipt.sha256
                    )
                    .into());
                }
                Ok(receipt)
            }
            _ => Err(format!("Device refused '{}': {}", resource, String::from_utf8_lossy(&payload)).into()),
        }
    }

    /// Downloads `resource` into `local` and returns the byte count.
    pub async fn get(&self, resource: &str, local: &Path) -> Result<u64, BoxError> {
        let message_id = rand::random::<u8>();
        let request = serde_json::to_vec(&TransferRequest {
            resource: resource.to_string(),
            size: None,
        })?;

        let (mut send, mut recv) = self.connection.open_bi().await?;
        send.write_all(&WsmHeader::frame(OpCode::Read, message_id, PayloadType::Json, &request))
            .await?;
        send.finish()?;

        let header = auth::read_header(&mut recv).await?;
        if header.op() != Ok(OpCode::Ack) {
            let reason = recv.read_to_end(MAX_RECEIPT_LEN).await?;
            return Err(format!("Device refused '{}': {}", resource, String::from_utf8_lossy(&reason)).into());
        }

        let expected = u64::from(header.payload_len);
        let mut file = tokio_fs::File::create(local).await?;
        let mut body = (&mut recv).take(expected);
        let received = tokio::io::copy(&mut body, &mut file).await?;
        if received != expected {
            return Err(format!("download ended after {} of {} bytes", received, expected).into());
        }
        info!("{} bytes received from '{}'", received, resource);
        Ok(received)
    }

    pub async fn close(self) {
        self.connection.close(0u32.into(), b"done");
        self.endpoint.wait_idle().await;
    }
}

pub fn sha256_hex(data: &[u8]) -> String {
    use sha2::{Digest, Sha256};
    hex::encode(Sha256::digest(data))
}
