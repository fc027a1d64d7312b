// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The message catalog: every frame that can cross the wire, and its
//! send/receive pair.
//!
//! The original implementation gives each message its own class with a
//! static `send`/`receive` pair (`InvokeMessage`, `ReturnMessage`, ...).
//! Since the full set is small, closed, and discriminated by a single tag
//! byte, this is expressed here as one `Message` enum instead, with the tag
//! dispatch done once in [`Message::receive`] rather than once per type.

use std::io::{Read, Write};

use hostbridge_wire::{
	read_string, read_u32, read_u8, write_i32, write_string, write_u32, write_u8, Value, WireError,
};

use crate::error::ProtocolError;

/// One of the four fixed operations that apply uniformly to any object
/// without a named-method lookup.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
#[repr(u32)]
pub enum SpecialDispatch {
	HasMethod = 0,
	HasProperty = 1,
	GetProperty = 2,
	SetProperty = 3,
}

impl SpecialDispatch {
	/// Maps a dispatch id as it appears on the wire to a recognized variant.
	///
	/// Called by the session layer when dispatching an inbound
	/// `InvokeSpecial`, not by [`Message::receive`]: an unrecognized id is
	/// [`Unsupported`](crate::error::ProtocolError), which §7 requires to be
	/// surfaced as an exception back to the peer without tearing down the
	/// session, so the message catalog hands back a well-formed
	/// `InvokeSpecial` carrying the raw id rather than failing the read
	/// outright.
	pub(crate) fn from_id(id: u32) -> Result<Self, ProtocolError> {
		Ok(match id {
			0 => Self::HasMethod,
			1 => Self::HasProperty,
			2 => Self::GetProperty,
			3 => Self::SetProperty,
			other => return Err(ProtocolError::UnsupportedDispatchId(other)),
		})
	}
}

/// A single frame of the wire protocol, tagged by its one-byte message type.
#[derive(Debug)]
pub enum Message {
	/// `I` — invoke a named method on `this`.
	Invoke {
		this: Value,
		method_name: String,
		args: Vec<Value>,
	},
	/// `S` — invoke one of the four special, name-less dispatches.
	///
	/// The dispatch id is carried raw rather than pre-resolved to a
	/// [`SpecialDispatch`]: an unrecognized id is *not* a framing error (§7
	/// classifies it `Unsupported`, not `Protocol`) and must still produce a
	/// well-formed message for the session to answer with a graceful
	/// exception `Return`, so resolving it is left to the session layer.
	InvokeSpecial { dispatch_id: u32, args: Vec<Value> },
	/// `R` — the result of an `Invoke` or `InvokeSpecial`.
	Return { is_exception: bool, value: Value },
	/// `Q` — orderly shutdown.
	Quit,
	/// `F` — the ids named here are no longer referenced and may be
	/// reclaimed.
	FreeValue { ids: Vec<u32> },
	/// `L` — evaluate `source` in the scripting global scope.
	LoadJsni { source: String },
	/// `M` — the plugin's handshake, opening the session.
	LoadModule {
		version: u32,
		module_name: String,
		user_agent: String,
		session_token: String,
	},
}

const TAG_INVOKE: u8 = b'I';
const TAG_INVOKE_SPECIAL: u8 = b'S';
const TAG_RETURN: u8 = b'R';
const TAG_QUIT: u8 = b'Q';
const TAG_FREE_VALUE: u8 = b'F';
const TAG_LOAD_JSNI: u8 = b'L';
const TAG_LOAD_MODULE: u8 = b'M';

impl Message {
	/// Reads a complete message, starting with its one-byte type tag.
	pub fn receive(r: &mut (impl Read + ?Sized)) -> Result<Self, crate::error::SessionError> {
		let tag = read_u8(r)?;
		Ok(match tag {
			TAG_INVOKE => {
				let this = Value::read_from(r)?;
				let method_name = read_string(r)?;
				let argc = read_u32(r)?;
				let args = read_values(r, argc)?;
				Self::Invoke {
					this,
					method_name,
					args,
				}
			}
			TAG_INVOKE_SPECIAL => {
				let dispatch_id = read_u32(r)?;
				let argc = read_u32(r)?;
				let args = read_values(r, argc)?;
				Self::InvokeSpecial { dispatch_id, args }
			}
			TAG_RETURN => {
				let is_exception = read_u8(r)? != 0;
				let value = Value::read_from(r)?;
				Self::Return {
					is_exception,
					value,
				}
			}
			TAG_QUIT => Self::Quit,
			TAG_FREE_VALUE => {
				let count = read_u32(r)?;
				let mut ids = Vec::with_capacity(count as usize);
				for _ in 0..count {
					ids.push(read_u32(r)?);
				}
				Self::FreeValue { ids }
			}
			TAG_LOAD_JSNI => Self::LoadJsni {
				source: read_string(r)?,
			},
			TAG_LOAD_MODULE => Self::LoadModule {
				version: read_u32(r)?,
				module_name: read_string(r)?,
				user_agent: read_string(r)?,
				session_token: read_string(r)?,
			},
			other => return Err(ProtocolError::UnrecognizedMessageType(other).into()),
		})
	}

	/// Writes this message, starting with its one-byte type tag.
	pub fn send(&self, w: &mut (impl Write + ?Sized)) -> Result<(), WireError> {
		match self {
			Self::Invoke {
				this,
				method_name,
				args,
			} => {
				write_u8(w, TAG_INVOKE)?;
				this.write_to(w)?;
				write_string(w, method_name)?;
				write_values(w, args)?;
			}
			Self::InvokeSpecial { dispatch_id, args } => {
				write_u8(w, TAG_INVOKE_SPECIAL)?;
				write_u32(w, *dispatch_id)?;
				write_values(w, args)?;
			}
			Self::Return {
				is_exception,
				value,
			} => {
				write_u8(w, TAG_RETURN)?;
				write_u8(w, u8::from(*is_exception))?;
				value.write_to(w)?;
			}
			Self::Quit => write_u8(w, TAG_QUIT)?,
			Self::FreeValue { ids } => {
				write_u8(w, TAG_FREE_VALUE)?;
				write_i32(w, ids.len() as i32)?;
				for id in ids {
					write_u32(w, *id)?;
				}
			}
			Self::LoadJsni { source } => {
				write_u8(w, TAG_LOAD_JSNI)?;
				write_string(w, source)?;
			}
			Self::LoadModule {
				version,
				module_name,
				user_agent,
				session_token,
			} => {
				write_u8(w, TAG_LOAD_MODULE)?;
				write_u32(w, *version)?;
				write_string(w, module_name)?;
				write_string(w, user_agent)?;
				write_string(w, session_token)?;
			}
		}

		Ok(())
	}
}

fn read_values(r: &mut (impl Read + ?Sized), count: u32) -> Result<Vec<Value>, WireError> {
	let mut values = Vec::with_capacity(count as usize);
	for _ in 0..count {
		values.push(Value::read_from(r)?);
	}
	Ok(values)
}

fn write_values(w: &mut (impl Write + ?Sized), values: &[Value]) -> Result<(), WireError> {
	write_i32(w, values.len() as i32)?;
	for value in values {
		value.write_to(w)?;
	}
	Ok(())
}
