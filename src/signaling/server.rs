use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::{Bytes, Message};
use tracing::{debug, error, info, warn};

use super::actor::CoordinatorHandle;
use super::messages::{ClientMessage, ServerMessage};
use crate::delivery::{ChannelHub, OutboundMessage};
use crate::identity::ClientId;

pub const DEFAULT_SIGNALING_PORT: u16 = 3479;
pub const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_PONG_TIMEOUT: Duration = Duration::from_secs(10);

/// Ping cadence used to detect dead connections
#[derive(Debug, Clone, Copy)]
pub struct Liveness {
    pub ping_interval: Duration,
    pub pong_timeout: Duration,
}

impl Default for Liveness {
    fn default() -> Self {
        Self {
            ping_interval: DEFAULT_PING_INTERVAL,
            pong_timeout: DEFAULT_PONG_TIMEOUT,
        }
    }
}

/// Shared by every connection task
#[derive(Clone)]
struct Context {
    handle: CoordinatorHandle,
    hub: ChannelHub,
    liveness: Liveness,
}

pub struct SignalingServer {
    listener: TcpListener,
    ctx: Context,
}

impl SignalingServer {
    /// `hub` must be the same delivery channel the coordinator behind
    /// `handle` sends through.
    pub async fn bind(
        addr: &str,
        handle: CoordinatorHandle,
        hub: ChannelHub,
        liveness: Liveness,
    ) -> std::io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        info!("Signaling server listening on {}", listener.local_addr()?);

        Ok(Self {
            listener,
            ctx: Context {
                handle,
                hub,
                liveness,
            },
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub async fn run(self) -> std::io::Result<()> {
        loop {
            let (stream, addr) = self.listener.accept().await?;
            let ctx = self.ctx.clone();

            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, addr, ctx).await {
                    error!("Connection error from {}: {}", addr, e);
                }
            });
        }
    }
}

async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    ctx: Context,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let ws_stream = tokio_tungstenite::accept_async(stream).await?;
    let (mut ws_tx, mut ws_rx) = ws_stream.split();

    info!("WebSocket connection from {}", addr);

    let (tx, mut rx) = mpsc::unbounded_channel::<OutboundMessage>();
    let (ctrl_tx, mut ctrl_rx) = mpsc::unbounded_channel::<Message>();

    // identity of this connection once it has joined or attached
    let mut client: Option<ClientId> = None;
    let ping_period = ctx.liveness.ping_interval;
    let mut ping_interval =
        tokio::time::interval_at(tokio::time::Instant::now() + ping_period, ping_period);
    let mut waiting_for_pong = false;
    let mut pong_deadline: Option<tokio::time::Instant> = None;

    let send_task = tokio::spawn(async move {
        loop {
            tokio::select! {
                Some(msg) = rx.recv() => {
                    let ws_msg = Message::Text(msg.into_inner());
                    if ws_tx.send(ws_msg).await.is_err() {
                        break;
                    }
                }
                Some(ctrl_msg) = ctrl_rx.recv() => {
                    if ws_tx.send(ctrl_msg).await.is_err() {
                        break;
                    }
                }
                else => break,
            }
        }
    });

    loop {
        let pong_timeout = async {
            match pong_deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            _ = ping_interval.tick() => {
                if waiting_for_pong {
                    warn!("No Pong received, disconnecting {}", addr);
                    break;
                }
                if ctrl_tx.send(Message::Ping(Bytes::new())).is_err() {
                    break;
                }
                waiting_for_pong = true;
                pong_deadline = Some(tokio::time::Instant::now() + ctx.liveness.pong_timeout);
                debug!("Ping sent to {}", addr);
            }

            _ = pong_timeout => {
                warn!("Pong timeout, disconnecting {}", addr);
                break;
            }

            msg = ws_rx.next() => {
                let msg = match msg {
                    Some(Ok(m)) => m,
                    Some(Err(e)) => {
                        warn!("WebSocket error: {}", e);
                        break;
                    }
                    None => break,
                };

                match msg {
                    Message::Text(text) => {
                        if let Err(e) = handle_text_message(&text, &tx, &ctx, &mut client).await {
                            warn!("Message handling error: {}", e);
                        }
                    }
                    Message::Pong(_) => {
                        waiting_for_pong = false;
                        pong_deadline = None;
                        debug!("Pong received from {}", addr);
                    }
                    Message::Close(_) => {
                        info!("Close received from {}", addr);
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    if let Some(client) = client.take() {
        leave(&ctx, &client).await;
    }

    send_task.abort();
    info!("WebSocket disconnected: {}", addr);

    Ok(())
}

async fn handle_text_message(
    text: &str,
    tx: &mpsc::UnboundedSender<OutboundMessage>,
    ctx: &Context,
    client: &mut Option<ClientId>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let client_msg: ClientMessage = match serde_json::from_str(text) {
        Ok(m) => m,
        Err(e) => {
            return reply_error(tx, format!("Invalid message: {}", e));
        }
    };

    match client_msg {
        ClientMessage::Join { room } => {
            if let Some(current) = client.as_ref() {
                return reply_error(tx, format!("already joined as {}", current));
            }
            match ctx.handle.join(room).await {
                Ok(ticket) => {
                    let response = ServerMessage::Joined {
                        room: ticket.client.room.clone(),
                        user: ticket.client.user.clone(),
                        token: ticket.token,
                    };
                    *client = Some(ticket.client);
                    reply(tx, &response)?;
                }
                Err(e) => reply_error(tx, e.to_string())?,
            }
        }

        ClientMessage::Connect { token } => {
            let target = match ctx.hub.lookup(&token) {
                Ok(id) => id,
                Err(e) => return reply_error(tx, e.to_string()),
            };
            if let Some(current) = client.as_ref().filter(|c| **c != target) {
                return reply_error(tx, format!("already joined as {}", current));
            }
            let attached = match ctx.hub.attach(&token, tx.clone()) {
                Ok(id) => id,
                Err(e) => return reply_error(tx, e.to_string()),
            };
            match ctx.handle.peer_connected(&attached).await {
                Ok(()) => *client = Some(attached),
                Err(e) => {
                    ctx.hub.detach(&attached);
                    reply_error(tx, e.to_string())?;
                }
            }
        }

        ClientMessage::Message { data } => match client.as_ref() {
            Some(from) => {
                if let Err(e) = ctx.handle.relay_message(from, data).await {
                    reply_error(tx, e.to_string())?;
                }
            }
            None => reply_error(tx, "join a room first".to_string())?,
        },

        ClientMessage::Leave => match client.take() {
            Some(current) => leave(ctx, &current).await,
            None => reply_error(tx, "not in a room".to_string())?,
        },
    }

    Ok(())
}

/// Removes `client` from its room, then tears down its delivery session.
async fn leave(ctx: &Context, client: &ClientId) {
    if let Err(e) = ctx.handle.peer_disconnected(client).await {
        warn!(%client, "Disconnect failed: {}", e);
    }
    ctx.hub.detach(client);
}

fn reply(
    tx: &mpsc::UnboundedSender<OutboundMessage>,
    msg: &ServerMessage,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let _ = tx.send(OutboundMessage::from(serde_json::to_string(msg)?));
    Ok(())
}

fn reply_error(
    tx: &mpsc::UnboundedSender<OutboundMessage>,
    message: String,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    reply(tx, &ServerMessage::Error { message })
}
