// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A synchronous, reentrant wire-protocol bridge between a browser-hosted
//! scripting plugin and a remote development server.
//!
//! `hostbridge` links a browser-embedded plugin, which hosts scripting
//! objects, to a remote process, which hosts program objects, over a single
//! TCP stream, as if both sides shared one object graph. It provides:
//!
//! - the [`message`] catalog and the [`hostbridge_wire`] codec it is built
//!   on, for framing and (de)serializing every message that crosses the
//!   wire;
//! - the [`tables`] module's two independent object directories, which
//!   assign and pin ids for each side's live objects and batch deallocation
//!   notifications to the peer;
//! - the [`session`] engine, a reentrant pump that multiplexes outbound
//!   calls and inbound, server-initiated callbacks on one connection; and
//! - the [`channel`] and [`allowlist`] modules, a thin, policy-checked
//!   wrapper around the underlying blocking socket.
//!
//! This crate does not itself embed a scripting engine. Callers supply one
//! by implementing [`adapter::ScriptHostAdapter`] and driving a
//! [`session::Session`] with it.

pub mod adapter;
pub mod allowlist;
pub mod channel;
pub mod error;
pub mod message;
pub mod session;
pub mod tables;

pub use adapter::{AdapterOutcome, Reentrant, ScriptHostAdapter};
pub use allowlist::AllowList;
pub use channel::{HostChannel, DEFAULT_PORT};
pub use error::{ProtocolError, SessionError};
pub use message::{Message, SpecialDispatch};
pub use session::{Session, Status, PROTOCOL_VERSION};
pub use tables::{LocalTable, PendingFreeQueue, ProgramObject, RemoteTable};
