//! Command line and environment configuration for the server binary.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::identity::DEFAULT_USER_ID_LEN;
use crate::signaling::{DEFAULT_QUEUE_DEPTH, DEFAULT_SIGNALING_PORT, Liveness};

#[derive(Debug, Clone, Parser)]
#[command(name = "rendezvous", about = "Two-party WebRTC signaling relay")]
pub struct Config {
    /// Address to listen on.
    #[arg(long, env = "RENDEZVOUS_BIND", default_value = "0.0.0.0")]
    pub bind: String,

    /// Port to listen on.
    #[arg(short, long, env = "RENDEZVOUS_PORT", default_value_t = DEFAULT_SIGNALING_PORT)]
    pub port: u16,

    /// Persist rooms to this JSON file instead of keeping them in memory.
    #[arg(long, env = "RENDEZVOUS_STATE_FILE")]
    pub state_file: Option<PathBuf>,

    /// Length of generated user ids.
    #[arg(long, default_value_t = DEFAULT_USER_ID_LEN)]
    pub user_id_len: usize,

    /// Seconds between pings to each client.
    #[arg(long, default_value_t = 30)]
    pub ping_interval: u64,

    /// Seconds to wait for a pong before dropping the client.
    #[arg(long, default_value_t = 10)]
    pub pong_timeout: u64,

    /// Depth of the coordinator command queue.
    #[arg(long, default_value_t = DEFAULT_QUEUE_DEPTH)]
    pub queue_depth: usize,
}

impl Config {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }

    pub fn liveness(&self) -> Liveness {
        Liveness {
            ping_interval: Duration::from_secs(self.ping_interval.max(1)),
            pong_timeout: Duration::from_secs(self.pong_timeout.max(1)),
        }
    }
}
