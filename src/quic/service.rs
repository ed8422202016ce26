/* src/quic/service.rs */

use crate::device::Device;
use crate::wsm::endpoints;
use quinn::{Connection, ConnectionError};
use std::sync::Arc;

// Every further bidirectional stream is one READ or WRITE request.
pub async fn handle_authenticated_client(conn: Connection, device: Arc<Device>) {
    let peer = conn.remote_address();
    println!("-> Serving requests from {}.", peer);

    loop {
        match conn.accept_bi().await {
            Ok((send, recv)) => {
                let device = Arc::clone(&device);
                tokio::spawn(async move {
                    endpoints::dispatch_server(send, recv, &device, peer).await;
                });
            }
            Err(ConnectionError::ApplicationClosed(_)) | Err(ConnectionError::LocallyClosed) => break,
            Err(e) => {
                println!("! Connection from {} lost: {}", peer, e);
                break;
            }
        }
    }
    println!("- Connection from {} closed.", peer);
}
