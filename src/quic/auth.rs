/* src/quic/auth.rs */

use crate::wsm::header::{HEADER_LEN, OpCode, PayloadType, WsmHeader};
use log::info;
use quinn::{Connection, RecvStream, SendStream};

const MAX_TOKEN_LEN: u32 = 256;

// [SERVER-SIDE] The first bidirectional stream of a connection carries AUTH.
pub async fn authenticate(conn: &Connection, expected_token: &str) -> Result<(), String> {
    let (mut send, mut recv) = conn
        .accept_bi()
        .await
        .map_err(|e| format!("no auth stream: {}", e))?;

    let header = read_header(&mut recv).await?;
    if header.op() != Ok(OpCode::Auth) || header.payload_len > MAX_TOKEN_LEN {
        reply(&mut send, header.message_id, Some("Expected authentication")).await;
        return Err(format!("unexpected first opcode {:#04X}", header.opcode));
    }

    let mut token_buf = vec![0; header.payload_len as usize];
    recv.read_exact(&mut token_buf)
        .await
        .map_err(|e| format!("failed to read token: {}", e))?;

    if String::from_utf8_lossy(&token_buf) == expected_token {
        reply(&mut send, header.message_id, None).await;
        Ok(())
    } else {
        reply(&mut send, header.message_id, Some("Invalid authentication token")).await;
        Err("token mismatch".to_string())
    }
}

async fn reply(send: &mut SendStream, message_id: u8, reason: Option<&str>) {
    let message = match reason {
        None => WsmHeader::frame(OpCode::Ack, message_id, PayloadType::Raw, &[]),
        Some(reason) => WsmHeader::frame(OpCode::Nack, message_id, PayloadType::Raw, reason.as_bytes()),
    };
    let _ = send.write_all(&message).await;
    let _ = send.finish();
}

// [CLIENT-SIDE] Sends the token and waits for the verdict.
pub async fn login(conn: &Connection, token: &str, message_id: u8) -> Result<(), String> {
    let (mut send, mut recv) = conn
        .open_bi()
        .await
        .map_err(|e| format!("failed to open auth stream: {}", e))?;

    let request = WsmHeader::frame(OpCode::Auth, message_id, PayloadType::Raw, token.as_bytes());
    info!("Sending authentication request...");
    send.write_all(&request)
        .await
        .map_err(|e| format!("failed to send token: {}", e))?;
    let _ = send.finish();

    let header = read_header(&mut recv).await?;
    match header.op() {
        Ok(OpCode::Ack) => {
            info!("WSM: Authentication successful.");
            Ok(())
        }
        _ => {
            let mut reason_buf = vec![0; header.payload_len.min(MAX_TOKEN_LEN) as usize];
            let reason = match recv.read_exact(&mut reason_buf).await {
                Ok(()) => String::from_utf8_lossy(&reason_buf).into_owned(),
                Err(_) => "Could not read reason".to_string(),
            };
            Err(format!("Authentication failed. Reason: {}", reason))
        }
    }
}

pub async fn read_header(recv: &mut RecvStream) -> Result<WsmHeader, String> {
    let mut header_buf = [0u8; HEADER_LEN];
    recv.read_exact(&mut header_buf)
        .await
        .map_err(|e| format!("failed to read header: {}", e))?;
    Ok(WsmHeader::from_bytes(&header_buf))
}
