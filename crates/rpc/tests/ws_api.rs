//! End-to-end exercise of the WebSocket RPC surface against stub
//! collaborators.

use async_trait::async_trait;
use chain_bootstrap::{
    ConsensusEngine, EngineError, HubEndpoints, Membership, NodeAddressing, Prover, ProverError,
    ProverFactory,
};
use chain_hub::StrongestChainHub;
use chain_rpc::{RpcContext, RpcServer};
use chain_types::{Block, Proof};
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

const PEER: &str = "10.0.0.9:9301";

struct StubProverFactory {
    fail_verification: bool,
}

struct StubProver {
    fail_verification: bool,
}

#[async_trait]
impl ProverFactory for StubProverFactory {
    async fn create(&self, _storage_location: &Path) -> Result<Box<dyn Prover>, ProverError> {
        Ok(Box::new(StubProver {
            fail_verification: self.fail_verification,
        }))
    }
}

#[async_trait]
impl Prover for StubProver {
    async fn genesis_proof(&self) -> Result<Proof, ProverError> {
        Ok(Proof::new(vec![1; 4]))
    }

    async fn verify_chain(&self, _block: &Block) -> Result<(), ProverError> {
        if self.fail_verification {
            Err(ProverError::Verification("stub rejection".into()))
        } else {
            Ok(())
        }
    }
}

struct StubMembership;

impl Membership for StubMembership {
    fn peers(&self) -> Vec<SocketAddr> {
        vec![PEER.parse().unwrap()]
    }
}

struct StubEngine;

#[async_trait]
impl ConsensusEngine for StubEngine {
    async fn start(
        &self,
        _genesis: Block,
        _endpoints: HubEndpoints,
        _initial_peers: Vec<SocketAddr>,
        _should_mine: bool,
        _addressing: NodeAddressing,
    ) -> Result<Box<dyn Membership>, EngineError> {
        Ok(Box::new(StubMembership))
    }
}

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn start_server(fail_verification: bool) -> (StrongestChainHub, Client) {
    let hub = StrongestChainHub::new();
    let context = Arc::new(RpcContext::new(
        hub.clone(),
        Arc::new(StubProverFactory { fail_verification }),
        Arc::new(StubEngine),
    ));

    let server = RpcServer::bind("127.0.0.1:0".parse().unwrap(), context)
        .await
        .unwrap();
    let addr = server.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = server.run().await;
    });

    let (client, _) = connect_async(format!("ws://{}", addr)).await.unwrap();
    (hub, client)
}

async fn call(client: &mut Client, request: Value) -> Value {
    client
        .send(Message::Text(request.to_string()))
        .await
        .unwrap();
    next_frame(client).await
}

async fn next_frame(client: &mut Client) -> Value {
    let msg = timeout(Duration::from_secs(5), client.next())
        .await
        .expect("timed out waiting for frame")
        .expect("connection closed")
        .unwrap();
    match msg {
        Message::Text(text) => serde_json::from_str(&text).unwrap(),
        other => panic!("unexpected frame: {:?}", other),
    }
}

fn join_request(id: u64) -> Value {
    json!({
        "id": id,
        "method": "main",
        "version": 0,
        "params": {
            "storage_location": "/tmp/chain-test",
            "initial_peers": [],
            "should_mine": false,
            "self_address": "127.0.0.1:8301"
        }
    })
}

#[tokio::test]
async fn ping_join_peers_and_stream() {
    let (hub, mut client) = start_server(false).await;

    // Liveness, no side effects.
    let reply = call(&mut client, json!({"id": 1, "method": "ping", "version": 0})).await;
    assert_eq!(reply["result"], json!("ack"));

    // Not yet joined.
    let reply = call(&mut client, json!({"id": 2, "method": "get_peers", "version": 0})).await;
    assert!(reply["result"].is_null());

    // Join; acknowledged once the engine has started.
    let reply = call(&mut client, join_request(3)).await;
    assert_eq!(reply["result"], json!("ack"));

    let reply = call(&mut client, json!({"id": 4, "method": "get_peers", "version": 0})).await;
    assert_eq!(reply["result"], json!([PEER]));

    // Subscribe to the tip stream, then publish.
    let reply = call(
        &mut client,
        json!({"id": 5, "method": "get_strongest_blocks", "version": 0}),
    )
    .await;
    let subscription = reply["result"].as_u64().unwrap();

    let mut tip = Block::genesis();
    tip.header.nonce = 7;
    hub.publish(tip.clone()).await;

    let frame = next_frame(&mut client).await;
    assert_eq!(frame["method"], json!("block_notification"));
    assert_eq!(frame["params"]["subscription"], json!(subscription));
    assert_eq!(frame["params"]["result"]["block"]["header"]["nonce"], json!(7));
    assert_eq!(frame["params"]["result"]["hash"], json!(tip.hash().to_hex()));

    // Closing the connection unsubscribes the stream. The only hub
    // consumer left afterwards is the orchestrator's tip cell.
    client.close(None).await.unwrap();
    for _ in 0..100 {
        if hub.subscriber_count() == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(hub.subscriber_count(), 1);
}

#[tokio::test]
async fn failed_join_leaves_node_unjoined() {
    let (hub, mut client) = start_server(true).await;

    let reply = call(&mut client, join_request(1)).await;
    assert!(reply["error"]["message"].is_string());

    // No membership was recorded and no consumer wiring survives.
    let reply = call(&mut client, json!({"id": 2, "method": "get_peers", "version": 0})).await;
    assert!(reply["result"].is_null());
    assert_eq!(hub.subscriber_count(), 0);
}

#[tokio::test]
async fn unknown_operation_closes_the_connection() {
    let (_hub, mut client) = start_server(false).await;

    client
        .send(Message::Text(
            json!({"id": 1, "method": "bogus", "version": 0}).to_string(),
        ))
        .await
        .unwrap();

    assert_connection_closed(&mut client).await;
}

#[tokio::test]
async fn malformed_frame_closes_the_connection() {
    let (_hub, mut client) = start_server(false).await;

    client
        .send(Message::Text("not json".to_string()))
        .await
        .unwrap();

    assert_connection_closed(&mut client).await;
}

async fn assert_connection_closed(client: &mut Client) {
    let deadline = Duration::from_secs(5);
    loop {
        match timeout(deadline, client.next()).await.expect("no close seen") {
            Some(Ok(Message::Close(_))) | None => break,
            Some(Err(_)) => break,
            Some(Ok(_)) => panic!("expected close, got a data frame"),
        }
    }
}
