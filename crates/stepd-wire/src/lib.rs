// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire messages and transport contract for the step manager: what crosses
//! the process boundary to the node daemon, peer managers, and the
//! controller (spec §6).
//!
//! Wire format: 4-byte length prefix (big-endian) + JSON payload.

mod framing;
mod messages;
mod reply_codes;
mod transport;

pub use framing::{decode, encode, read_framed, read_message, write_framed, write_message, ProtocolError};
pub use messages::{
    MessageTaskExit, OutboundMessage, RequestCompleteBatchScript, RequestStepComplete, StepRequest,
    TreeTopology,
};
pub use reply_codes::ReplyCode;
pub use transport::{TcpTransport, Transport, TransportError};

#[cfg(any(test, feature = "test-support"))]
pub use transport::{FakeTransport, RecordedCall};
