// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `Transport` — the request/reply and fire-and-forget delivery contract
//! peer managers, the parent rank, and the controller are reached through
//! (spec §2 Out of scope "Message transport", §4.5, §4.6, §4.7).

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::net::TcpStream;

use crate::framing::{read_framed, write_framed, ProtocolError};
use crate::messages::OutboundMessage;
use crate::reply_codes::ReplyCode;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connect to {addr} failed: {source}")]
    Connect { addr: SocketAddr, source: std::io::Error },
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
    #[error("request to {addr} timed out after {budget:?}")]
    Timeout { addr: SocketAddr, budget: Duration },
}

/// The reply frame a request/reply RPC expects back: just a controller
/// result code (spec §4.6 "expects a response code").
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct ReplyFrame {
    code: i32,
}

/// Delivery contract every outbound message in this crate goes through.
/// `send` is fire-and-forget (launch replies, task-exit messages); `request`
/// is request/reply with a caller-supplied timeout budget (step-complete,
/// batch-complete).
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn send(&self, addr: SocketAddr, msg: &OutboundMessage) -> Result<(), TransportError>;

    async fn request(
        &self,
        addr: SocketAddr,
        msg: &OutboundMessage,
        budget: Duration,
    ) -> Result<ReplyCode, TransportError>;
}

/// TCP implementation of `Transport` using the length-prefixed JSON framing
/// in `framing.rs`. One connection per message; the step manager's message
/// volume is low enough that connection reuse isn't worth the complexity.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpTransport;

impl TcpTransport {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn send(&self, addr: SocketAddr, msg: &OutboundMessage) -> Result<(), TransportError> {
        let mut stream =
            TcpStream::connect(addr).await.map_err(|source| TransportError::Connect { addr, source })?;
        write_framed(&mut stream, msg).await?;
        Ok(())
    }

    async fn request(
        &self,
        addr: SocketAddr,
        msg: &OutboundMessage,
        budget: Duration,
    ) -> Result<ReplyCode, TransportError> {
        let attempt = async {
            let mut stream = TcpStream::connect(addr)
                .await
                .map_err(|source| TransportError::Connect { addr, source })?;
            write_framed(&mut stream, msg).await?;
            let reply: ReplyFrame = read_framed(&mut stream).await?;
            Ok::<_, TransportError>(ReplyCode::from_raw(reply.code))
        };
        tokio::time::timeout(budget, attempt)
            .await
            .map_err(|_| TransportError::Timeout { addr, budget })?
    }
}

#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(coverage_nightly, coverage(off))]
mod fake {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::Arc;

    #[derive(Debug, Clone)]
    pub enum RecordedCall {
        Send { addr: SocketAddr, msg: OutboundMessage },
        Request { addr: SocketAddr, msg: OutboundMessage, budget: Duration },
    }

    enum QueuedOutcome {
        Reply(ReplyCode),
        ConnectFailure,
    }

    struct FakeState {
        calls: Vec<RecordedCall>,
        queued: VecDeque<QueuedOutcome>,
    }

    /// In-memory `Transport` double. `request` replies are drawn from a
    /// caller-populated queue; an empty queue fails closed rather than
    /// silently succeeding, so tests must state the outcome they expect.
    #[derive(Clone)]
    pub struct FakeTransport {
        inner: Arc<Mutex<FakeState>>,
    }

    impl Default for FakeTransport {
        fn default() -> Self {
            Self { inner: Arc::new(Mutex::new(FakeState { calls: Vec::new(), queued: VecDeque::new() })) }
        }
    }

    impl FakeTransport {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn calls(&self) -> Vec<RecordedCall> {
            self.inner.lock().calls.clone()
        }

        pub fn queue_reply(&self, code: ReplyCode) {
            self.inner.lock().queued.push_back(QueuedOutcome::Reply(code));
        }

        pub fn queue_connect_failure(&self) {
            self.inner.lock().queued.push_back(QueuedOutcome::ConnectFailure);
        }
    }

    #[async_trait]
    impl Transport for FakeTransport {
        async fn send(&self, addr: SocketAddr, msg: &OutboundMessage) -> Result<(), TransportError> {
            self.inner.lock().calls.push(RecordedCall::Send { addr, msg: msg.clone() });
            Ok(())
        }

        async fn request(
            &self,
            addr: SocketAddr,
            msg: &OutboundMessage,
            budget: Duration,
        ) -> Result<ReplyCode, TransportError> {
            let mut inner = self.inner.lock();
            inner.calls.push(RecordedCall::Request { addr, msg: msg.clone(), budget });
            match inner.queued.pop_front() {
                Some(QueuedOutcome::Reply(code)) => Ok(code),
                Some(QueuedOutcome::ConnectFailure) | None => Err(TransportError::Connect {
                    addr,
                    source: std::io::Error::new(
                        std::io::ErrorKind::ConnectionRefused,
                        "fake transport: no reply queued",
                    ),
                }),
            }
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeTransport, RecordedCall};

#[cfg(test)]
#[path = "transport_tests.rs"]
mod tests;
