//! Wire frames for the client RPC channel

use chain_hub::SubscriberId;
use chain_types::Block;
use serde::Deserialize;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Operation names. `main` is the protocol-level name of the join
/// operation.
pub const OP_PING: &str = "ping";
pub const OP_MAIN: &str = "main";
pub const OP_GET_PEERS: &str = "get_peers";
pub const OP_GET_STRONGEST_BLOCKS: &str = "get_strongest_blocks";

/// Version carried by every currently-defined operation.
pub const VERSION_0: u32 = 0;

/// One request frame. Operations are addressed by `(method, version)`.
#[derive(Debug, Deserialize)]
pub struct RpcRequest {
    pub id: Value,
    pub method: String,
    #[serde(default)]
    pub version: u32,
    #[serde(default)]
    pub params: Value,
}

/// Parameters of the `main/0` (join) operation.
#[derive(Debug, Deserialize)]
pub struct JoinRequest {
    pub storage_location: PathBuf,
    #[serde(default)]
    pub initial_peers: Vec<SocketAddr>,
    #[serde(default)]
    pub should_mine: bool,
    pub self_address: SocketAddr,
}

/// Error type of the tip stream.
///
/// Deliberately uninhabited: no application-level condition ever
/// produces a stream error, and keeping the type empty makes dead
/// error paths unrepresentable. The only observable failure mode is
/// the stream ending on transport close.
#[derive(Debug)]
pub enum StreamError {}

/// One delivered tip-stream element.
pub type StreamItem = Result<Block, StreamError>;

/// Success response frame.
pub fn ok_response(id: &Value, result: Value) -> Value {
    json!({
        "id": id,
        "result": result
    })
}

/// Error response frame.
pub fn error_response(id: &Value, code: i32, message: &str) -> Value {
    json!({
        "id": id,
        "error": {
            "code": code,
            "message": message
        }
    })
}

/// Notification frame carrying one tip-stream element.
pub fn block_notification(subscription: SubscriberId, item: StreamItem) -> Value {
    let block = match item {
        Ok(block) => block,
        Err(never) => match never {},
    };
    json!({
        "method": "block_notification",
        "params": {
            "subscription": subscription,
            "result": {
                "hash": block.hash(),
                "block": block
            }
        }
    })
}
