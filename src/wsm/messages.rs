/* src/wsm/messages.rs */

use crate::device::upload::UploadReceipt;
use serde::{Deserialize, Serialize};

/// JSON body of READ and WRITE requests. `size` is required for WRITE.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    pub resource: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

/// JSON body of the ACK that closes a successful WRITE.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ReceiptMessage {
    pub bytes: u64,
    pub sha256: String,
    pub command: String,
    pub outcome: String,
}

impl From<&UploadReceipt> for ReceiptMessage {
    fn from(receipt: &UploadReceipt) -> Self {
        ReceiptMessage {
            bytes: receipt.bytes,
            sha256: receipt.sha256.clone(),
            command: receipt.token.clone(),
            outcome: receipt.outcome.to_string(),
        }
    }
}
