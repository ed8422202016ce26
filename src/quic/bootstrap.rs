/* src/quic/bootstrap.rs */

use crate::device::Device;
use crate::quic::{auth, service};
use crate::setup::check::validate_server_config;
use crate::setup::config::Config;
use log::{info, warn};
use quinn::{Endpoint, IdleTimeout, ServerConfig, TransportConfig};
use std::error::Error;
use std::{fs::File, io::BufReader, net::SocketAddr, sync::Arc, time::Duration};

pub async fn start_quic_server(cfg: Config) -> Result<(), Box<dyn Error>> {
    validate_server_config(&cfg)?;
    let device_cfg = cfg
        .device
        .as_ref()
        .ok_or("Configuration error: missing 'device' table")?;
    let device = Arc::new(Device::from_config(device_cfg)?);

    let certs = rustls_pemfile::certs(&mut BufReader::new(File::open(&cfg.setup.certificate)?))
        .collect::<Result<Vec<_>, _>>()?;
    let key = rustls_pemfile::private_key(&mut BufReader::new(File::open(&cfg.setup.private_key)?))?
        .ok_or("Failed to find private key")?;

    let mut transport = TransportConfig::default();
    transport.max_concurrent_bidi_streams(32u32.into());
    transport.keep_alive_interval(Some(Duration::from_secs(5)));
    transport.max_idle_timeout(Some(IdleTimeout::try_from(Duration::from_secs(
        cfg.network.idle_timeout_secs,
    ))?));

    let mut server_config = ServerConfig::with_single_cert(certs, key)?;
    server_config.transport = Arc::new(transport);

    let addr: SocketAddr = format!("{}:{}", cfg.network.listen, cfg.network.port).parse()?;
    let endpoint = Endpoint::server(server_config, addr)?;
    println!("> devdrop server running on {}", addr);
    println!("> Use local directory for data {}", device_cfg.data_root);
    println!("> Expected auth token: {}", mask_token(&cfg.setup.auth_token));

    loop {
        tokio::select! {
            incoming = endpoint.accept() => {
                let Some(incoming) = incoming else { break };
                let expected_token = cfg.setup.auth_token.clone();
                let device = Arc::clone(&device);
                tokio::spawn(async move {
                    match incoming.await {
                        Ok(conn) => {
                            println!("+ New connection from {}", conn.remote_address());
                            match auth::authenticate(&conn, &expected_token).await {
                                Ok(()) => {
                                    println!("+ Auth success: {}", conn.remote_address());
                                    service::handle_authenticated_client(conn, device).await;
                                }
                                Err(e) => {
                                    println!("! Auth failed: {} ({})", conn.remote_address(), e);
                                    conn.close(1u32.into(), b"unauthorized");
                                }
                            }
                        }
                        Err(e) => println!("! Connection failed: {}", e),
                    }
                });
            }
            _ = tokio::signal::ctrl_c() => {
                println!("> Shutting down.");
                if device.queue.cancel_pending_drain() {
                    info!("A scheduled drain was cancelled by shutdown");
                }
                if !device.queue.is_empty() {
                    warn!("{} queued job(s) dropped at shutdown", device.queue.len());
                }
                endpoint.close(0u32.into(), b"shutdown");
                break;
            }
        }
    }

    endpoint.wait_idle().await;
    Ok(())
}

fn mask_token(token: &str) -> String {
    let len = token.chars().count();
    if len > 4 {
        let first: String = token.chars().take(1).collect();
        let last: String = token.chars().skip(len - 3).collect();
        format!("{}{}{}", first, "*".repeat(len - 4), last)
    } else {
        token.to_string()
    }
}
