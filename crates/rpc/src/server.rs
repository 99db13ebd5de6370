//! WebSocket RPC server

use crate::protocol::{
    self, block_notification, error_response, ok_response, JoinRequest, RpcRequest,
};
use chain_bootstrap::{join, ConsensusEngine, JoinParams, NodeContext, ProverFactory};
use chain_hub::{StrongestChainHub, TipSubscription};
use futures::{SinkExt, StreamExt};
use parking_lot::RwLock;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{accept_async, tungstenite::Message};

/// Outbound frames queued per connection before the writer task
/// applies transport backpressure to handlers and stream forwarders.
const OUTBOUND_QUEUE: usize = 64;

/// Shared state injected into every connection handler.
pub struct RpcContext {
    pub hub: StrongestChainHub,
    pub prover_factory: Arc<dyn ProverFactory>,
    pub engine: Arc<dyn ConsensusEngine>,
    /// Set by a successful `main/0`; last join wins.
    node: RwLock<Option<NodeContext>>,
}

impl RpcContext {
    pub fn new(
        hub: StrongestChainHub,
        prover_factory: Arc<dyn ProverFactory>,
        engine: Arc<dyn ConsensusEngine>,
    ) -> Self {
        Self {
            hub,
            prover_factory,
            engine,
            node: RwLock::new(None),
        }
    }

    /// Context of the joined node, if any join has completed.
    pub fn node(&self) -> Option<NodeContext> {
        self.node.read().clone()
    }

    /// Record a joined node's context. Later installs overwrite
    /// earlier ones (last join wins).
    pub fn install_node(&self, context: NodeContext) {
        let replaced = self.node.write().replace(context).is_some();
        if replaced {
            tracing::warn!("Join completed over an already-joined node; new membership wins");
        }
    }
}

/// The client-facing RPC server.
pub struct RpcServer {
    context: Arc<RpcContext>,
    listener: TcpListener,
}

impl RpcServer {
    /// Bind the listening socket. `run` must be called to serve it.
    pub async fn bind(addr: SocketAddr, context: Arc<RpcContext>) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        tracing::info!("RPC server listening on {}", listener.local_addr()?);
        Ok(Self { context, listener })
    }

    /// The bound address (useful when binding port 0).
    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until the task is dropped.
    pub async fn run(self) -> anyhow::Result<()> {
        loop {
            let (stream, peer_addr) = self.listener.accept().await?;
            let context = self.context.clone();
            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, context).await {
                    tracing::warn!("RPC connection error from {}: {}", peer_addr, e);
                }
            });
        }
    }
}

/// Handle one client connection until it closes or misbehaves.
async fn handle_connection(stream: TcpStream, context: Arc<RpcContext>) -> anyhow::Result<()> {
    let ws_stream = accept_async(stream).await?;
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    // The writer task owns the sink; request replies and stream
    // notifications are multiplexed through one bounded queue.
    let (out_tx, mut out_rx) = mpsc::channel::<Message>(OUTBOUND_QUEUE);
    let writer = tokio::spawn(async move {
        while let Some(frame) = out_rx.recv().await {
            if ws_sender.send(frame).await.is_err() {
                break;
            }
        }
        let _ = ws_sender.close().await;
    });

    // Tip-stream forwarders started by this connection.
    let mut stream_tasks: Vec<JoinHandle<()>> = Vec::new();

    while let Some(msg) = ws_receiver.next().await {
        let msg = match msg {
            Ok(msg) => msg,
            Err(e) => {
                tracing::warn!("WebSocket error: {}", e);
                break;
            }
        };

        match msg {
            Message::Text(text) => {
                let request: RpcRequest = match serde_json::from_str(&text) {
                    Ok(request) => request,
                    Err(e) => {
                        // Malformed request: close this connection.
                        tracing::warn!("Malformed RPC frame, closing connection: {}", e);
                        break;
                    }
                };

                match dispatch(&context, request, &out_tx, &mut stream_tasks).await {
                    Some(reply) => {
                        if out_tx.send(Message::Text(reply.to_string())).await.is_err() {
                            break;
                        }
                    }
                    // Unknown operation: close this connection.
                    None => break,
                }
            }
            Message::Close(_) => break,
            Message::Ping(_) | Message::Pong(_) => {}
            _ => {
                tracing::warn!("Non-text RPC frame, closing connection");
                break;
            }
        }
    }

    // Closing the connection promptly releases its hub consumers:
    // aborting a forwarder drops its subscription, which unsubscribes.
    for task in stream_tasks {
        task.abort();
    }
    drop(out_tx);
    let _ = writer.await;

    Ok(())
}

/// Dispatch one request. Returns the reply frame, or `None` when the
/// operation is unknown and the connection must be closed.
async fn dispatch(
    context: &Arc<RpcContext>,
    request: RpcRequest,
    out_tx: &mpsc::Sender<Message>,
    stream_tasks: &mut Vec<JoinHandle<()>>,
) -> Option<Value> {
    match (request.method.as_str(), request.version) {
        (protocol::OP_PING, protocol::VERSION_0) => Some(ok_response(&request.id, json!("ack"))),

        (protocol::OP_MAIN, protocol::VERSION_0) => {
            let join_request: JoinRequest = match serde_json::from_value(request.params) {
                Ok(join_request) => join_request,
                Err(e) => {
                    return Some(error_response(
                        &request.id,
                        -32602,
                        &format!("invalid join parameters: {}", e),
                    ));
                }
            };
            Some(handle_join(context, &request.id, join_request).await)
        }

        (protocol::OP_GET_PEERS, protocol::VERSION_0) => {
            // Null until a join has completed successfully.
            let peers = context.node().map(|node| {
                node.peers()
                    .iter()
                    .map(|addr| addr.to_string())
                    .collect::<Vec<_>>()
            });
            Some(ok_response(&request.id, json!(peers)))
        }

        (protocol::OP_GET_STRONGEST_BLOCKS, protocol::VERSION_0) => {
            // Fresh, independent queue per caller; no history replay.
            let subscription = context.hub.subscribe();
            let subscription_id = subscription.id();
            stream_tasks.push(tokio::spawn(forward_tip_stream(
                subscription,
                out_tx.clone(),
            )));
            Some(ok_response(&request.id, json!(subscription_id)))
        }

        (method, version) => {
            tracing::warn!(
                "Unknown operation {}/{}, closing connection",
                method,
                version
            );
            None
        }
    }
}

/// Run the join sequence and record the resulting context.
async fn handle_join(context: &Arc<RpcContext>, id: &Value, request: JoinRequest) -> Value {
    let params = JoinParams {
        storage_location: request.storage_location,
        initial_peers: request.initial_peers,
        should_mine: request.should_mine,
        self_address: request.self_address,
    };

    match join(
        context.prover_factory.as_ref(),
        context.engine.as_ref(),
        &context.hub,
        params,
    )
    .await
    {
        Ok(node) => {
            context.install_node(node);
            // Acknowledged once the engine has started, not once the
            // node is synchronized.
            ok_response(id, json!("ack"))
        }
        Err(e) => {
            tracing::error!("Join failed: {:#}", anyhow::Error::new(e));
            error_response(id, -32000, "node startup failed")
        }
    }
}

/// Forward every delivered tip to the remote caller until the
/// connection (or the hub) goes away.
async fn forward_tip_stream(mut subscription: TipSubscription, out_tx: mpsc::Sender<Message>) {
    let subscription_id = subscription.id();
    while let Some(block) = subscription.recv().await {
        let frame = block_notification(subscription_id, Ok(block));
        if out_tx.send(Message::Text(frame.to_string())).await.is_err() {
            break;
        }
    }
}
