// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use hostbridge_wire::{Value, WireError};
use thiserror::Error;

/// A violation of the message-level protocol: the bytes were well-formed at
/// the wire-codec level, but did not make sense as a message.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ProtocolError {
	/// The one-byte message type tag did not match any known [`Message`]
	/// variant.
	///
	/// [`Message`]: crate::message::Message
	#[error("unrecognized message type: {0:#04x}")]
	UnrecognizedMessageType(u8),

	/// A message arrived that is well-formed but not valid in this
	/// direction or pump mode — a `Return` outside of a call, or a
	/// `LoadModule` received instead of sent.
	#[error("unexpected {0} message")]
	UnexpectedMessage(&'static str),

	/// An [`InvokeSpecial`](crate::message::Message::InvokeSpecial) named a
	/// dispatch id this implementation does not recognize.
	#[error("unsupported special dispatch id: {0}")]
	UnsupportedDispatchId(u32),
}

/// Everything a [`Session`](crate::session::Session) operation can fail
/// with.
///
/// Per the error taxonomy, [`Policy`](Self::Policy), [`Wire`](Self::Wire)
/// and [`Protocol`](Self::Protocol) are fatal to the session; only
/// [`RemoteException`](Self::RemoteException) is a normal, non-fatal
/// outcome of [`call`](crate::session::Session::call).
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum SessionError {
	/// The allow-list denied a connection attempt.
	#[error("connection to {host}:{port} denied by allow-list")]
	Policy { host: String, port: u16 },

	/// A wire-codec (I/O or malformed-payload) failure.
	#[error(transparent)]
	Wire(#[from] WireError),

	/// A message-level protocol violation.
	#[error(transparent)]
	Protocol(#[from] ProtocolError),

	/// The peer sent `Quit`, or the session was otherwise torn down, while
	/// a call was outstanding.
	#[error("session was terminated")]
	SessionTerminated,

	/// The session is not connected.
	#[error("not connected")]
	NotConnected,

	/// A well-formed `Return` arrived with its exception flag set; this is
	/// the only non-fatal member of this enum.
	#[error("remote exception: {0:?}")]
	RemoteException(Value),
}

impl SessionError {
	/// Whether this error leaves the session unusable.
	///
	/// Only [`RemoteException`](Self::RemoteException) is a normal result of
	/// a call; every other variant tears down the session (§7).
	#[must_use]
	pub const fn is_fatal(&self) -> bool {
		!matches!(self, Self::RemoteException(_))
	}
}

/// Wraps a raw I/O error as a session-level error, for call sites (explicit
/// socket flushes, shutdowns) that only have a `std::io::Error` rather than
/// one already produced by `hostbridge_wire`'s own codec operations.
pub(crate) fn wire_io(err: std::io::Error) -> WireError {
	WireError::Io(err)
}
