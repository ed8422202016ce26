/* src/wsm/endpoints.rs */

use crate::device::Device;
use crate::wsm::header::{HEADER_LEN, OpCode, PayloadType, WsmHeader};
use crate::wsm::messages::{ReceiptMessage, TransferRequest};
use log::{error, info, warn};
use quinn::{ReadExactError, RecvStream, SendStream, VarInt};
use std::net::SocketAddr;

// Request metadata is a short JSON object; anything larger is refused.
const MAX_REQUEST_LEN: u32 = 4096;

const RESET_TRANSFER_FAILED: u32 = 1;

#[derive(Debug)]
enum Failure {
    /// Nothing was sent yet, the peer gets a NACK with the reason.
    Rejected(String),
    /// Data was already flowing, the stream is reset.
    Aborted(String),
}

/// Serves one request stream: READ streams a file back, WRITE stores an
/// upload and runs its command.
pub async fn dispatch_server(
    mut send: SendStream,
    mut recv: RecvStream,
    device: &Device,
    peer: SocketAddr,
) {
    let mut header_buf = [0u8; HEADER_LEN];
    if let Err(e) = recv.read_exact(&mut header_buf).await {
        warn!("! {}: failed to read request header: {}", peer, e);
        return;
    }
    let header = WsmHeader::from_bytes(&header_buf);

    let result = match header.op() {
        Ok(OpCode::Read) => handle_read(&header, &mut send, &mut recv, device).await,
        Ok(OpCode::Write) => handle_write(&header, &mut send, &mut recv, device).await,
        Ok(op) => Err(Failure::Rejected(format!("unexpected opcode {:?}", op))),
        Err(code) => Err(Failure::Rejected(format!("unknown opcode {:#04X}", code))),
    };

    match result {
        Ok(()) => {
            let _ = send.finish();
        }
        Err(Failure::Rejected(reason)) => {
            warn!("! {}: request {} rejected: {}", peer, header.message_id, reason);
            let nack = WsmHeader::frame(
                OpCode::Nack,
                header.message_id,
                PayloadType::Raw,
                reason.as_bytes(),
            );
            if send.write_all(&nack).await.is_err() {
                error!("! {}: failed to send NACK", peer);
            }
            let _ = send.finish();
        }
        Err(Failure::Aborted(reason)) => {
            error!("! {}: transfer {} aborted: {}", peer, header.message_id, reason);
            let _ = send.reset(VarInt::from_u32(RESET_TRANSFER_FAILED));
        }
    }
}

async fn read_request(header: &WsmHeader, recv: &mut RecvStream) -> Result<TransferRequest, Failure> {
    if header.payload_type != PayloadType::Json as u8 {
        return Err(Failure::Rejected("request metadata must be JSON".to_string()));
    }
    if header.payload_len == 0 || header.payload_len > MAX_REQUEST_LEN {
        return Err(Failure::Rejected(format!(
            "request metadata length {} out of range",
            header.payload_len
        )));
    }
    let mut payload = vec![0u8; header.payload_len as usize];
    recv.read_exact(&mut payload)
        .await
        .map_err(|e| Failure::Rejected(format!("failed to read request metadata: {}", e)))?;
    serde_json::from_slice(&payload)
        .map_err(|e| Failure::Rejected(format!("malformed request metadata: {}", e)))
}

async fn handle_read(
    header: &WsmHeader,
    send: &mut SendStream,
    recv: &mut RecvStream,
    device: &Device,
) -> Result<(), Failure> {
    let request = read_request(header, recv).await?;
    let opened = device
        .download
        .open(&request.resource)
        .await
        .map_err(|e| Failure::Rejected(e.to_string()))?;
    let len = u32::try_from(opened.len)
        .map_err(|_| Failure::Rejected(format!("'{}' is too large", request.resource)))?;

    let ack = WsmHeader::new(OpCode::Ack, header.message_id, PayloadType::Raw, len);
    send.write_all(&ack.to_bytes())
        .await
        .map_err(|e| Failure::Aborted(e.to_string()))?;
    device
        .download
        .stream(opened, send)
        .await
        .map_err(|e| Failure::Aborted(e.to_string()))?;
    Ok(())
}

async fn handle_write(
    header: &WsmHeader,
    send: &mut SendStream,
    recv: &mut RecvStream,
    device: &Device,
) -> Result<(), Failure> {
    let request = read_request(header, recv).await?;
    let size = request
        .size
        .ok_or_else(|| Failure::Rejected("WRITE request without size".to_string()))?;
    if size > device.max_upload_bytes {
        return Err(Failure::Rejected(format!(
            "upload of {} bytes exceeds the {} byte limit",
            size, device.max_upload_bytes
        )));
    }

    let mut body = vec![0u8; size as usize];
    recv.read_exact(&mut body).await.map_err(|e| match e {
        ReadExactError::FinishedEarly(got) => Failure::Rejected(format!(
            "transfer error: upload ended after {} of {} bytes",
            got, size
        )),
        ReadExactError::ReadError(e) => Failure::Rejected(format!("transfer error: {}", e)),
    })?;

    let receipt = device
        .upload
        .accept(&request.resource, &mut body.as_slice())
        .await
        .map_err(|e| Failure::Rejected(e.to_string()))?;
    info!(
        "+ Upload '{}' stored at {} ({} bytes): {}",
        request.resource,
        receipt.path.display(),
        receipt.bytes,
        receipt.outcome
    );

    let body = serde_json::to_vec(&ReceiptMessage::from(&receipt))
        .map_err(|e| Failure::Rejected(e.to_string()))?;
    let ack = WsmHeader::frame(OpCode::Ack, header.message_id, PayloadType::Json, &body);
    send.write_all(&ack)
        .await
        .map_err(|e| Failure::Aborted(e.to_string()))?;
    Ok(())
}
