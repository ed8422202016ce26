/* src/wsm/header.rs */

/**
 * @file header.rs
 * @brief WSM 8-byte header framing every devdrop request and reply
 */


pub const HEADER_LEN: usize = 8;

// Operation code for identifying the protocol message type.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpCode {
    Ack = 0x00,
    Auth = 0x03,
    Read = 0x05,
    Write = 0x06,
    Nack = 0x0E,
}

impl TryFrom<u8> for OpCode {
    type Error = u8;

    fn try_from(code: u8) -> Result<Self, u8> {
        match code {
            0x00 => Ok(OpCode::Ack),
            0x03 => Ok(OpCode::Auth),
            0x05 => Ok(OpCode::Read),
            0x06 => Ok(OpCode::Write),
            0x0E => Ok(OpCode::Nack),
            other => Err(other),
        }
    }
}

// Type of the payload following the header
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadType {
    Json = 0x01,
    Raw = 0x03,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WsmHeader {
    pub opcode: u8,
    pub message_id: u8,
    pub payload_type: u8,
    pub reserved: u8,
    pub payload_len: u32,
}

impl WsmHeader {
    pub fn new(opcode: OpCode, message_id: u8, payload_type: PayloadType, payload_len: u32) -> Self {
        WsmHeader {
            opcode: opcode as u8,
            message_id,
            payload_type: payload_type as u8,
            reserved: 0,
            payload_len,
        }
    }

    pub fn op(&self) -> Result<OpCode, u8> {
        OpCode::try_from(self.opcode)
    }

    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut buf = [0u8; HEADER_LEN];
        buf[0] = self.opcode;
        buf[1] = self.message_id;
        buf[2] = self.payload_type;
        buf[3] = self.reserved;
        buf[4..8].copy_from_slice(&self.payload_len.to_le_bytes());
        buf
    }

    pub fn from_bytes(buf: &[u8; HEADER_LEN]) -> Self {
        let payload_len = u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]);
        WsmHeader {
            opcode: buf[0],
            message_id: buf[1],
            payload_type: buf[2],
            reserved: buf[3],
            payload_len,
        }
    }

    /// Header followed by `payload`, ready to write.
    pub fn frame(opcode: OpCode, message_id: u8, payload_type: PayloadType, payload: &[u8]) -> Vec<u8> {
        let header = WsmHeader::new(opcode, message_id, payload_type, payload.len() as u32);
        let mut message = header.to_bytes().to_vec();
        message.extend_from_slice(payload);
        message
    }
}
