// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The session engine (§4.4): the reentrant pump that multiplexes outbound
//! calls and inbound server-initiated dispatch on a single TCP connection.
//!
//! This is the hardest subsystem in the bridge. Both [`Session::call`] (an
//! outbound call, blocking for its `Return`) and [`Session::serve`] (the
//! top-level loop) share one pump: a read-dispatch loop that recurses
//! whenever a handler, while reacting to a server-initiated `Invoke`,
//! issues its own outbound call. The recursion bottoms out exactly where
//! the original does — on the native call stack, one frame per nested
//! call — rather than on any explicit queue of our own.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::{debug, error, trace};

use hostbridge_wire::Value;

use crate::adapter::{AdapterOutcome, Reentrant, ScriptHostAdapter};
use crate::allowlist::AllowList;
use crate::channel::HostChannel;
use crate::error::{ProtocolError, SessionError};
use crate::message::{Message, SpecialDispatch};
use crate::tables::{LocalTable, PendingFreeQueue, ProgramObject, RemoteTable};

/// The protocol version this implementation negotiates in `LoadModule`.
pub const PROTOCOL_VERSION: u32 = 2;

/// The session's connection status (§3).
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Status {
	Disconnected,
	Connecting,
	Active,
	Draining,
}

/// Whether the pump should stop at the first matching `Return` (a blocking
/// outbound call) or run until `Quit`/a fatal error (the top-level serve
/// loop). The two differ only in what they do with an inbound `Return`.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
enum PumpMode {
	Call,
	Serve,
}

enum PumpOutcome {
	Return(Value, bool),
	Quit,
}

/// Session state: the socket, the two object tables (§3), the pending-free
/// queue they share, and the negotiated protocol version/status.
///
/// `H` is the opaque handle type the embedding's scripting objects are
/// identified by in the local scripting table **L** (see
/// [`Session::export`]); `A` is the [`AllowList`] implementation the
/// underlying [`HostChannel`] consults before dialing out.
///
/// A `Session` does not own a [`ScriptHostAdapter`]: every entry point that
/// may dispatch inbound messages ([`call`](Self::call),
/// [`serve`](Self::serve)) takes one by `&mut` instead. This is what makes
/// the reentrancy sound without interior mutability: the adapter and the
/// session are always two independent `&mut` borrows, never one nested
/// inside the other.
pub struct Session<A, H> {
	channel: HostChannel<A>,
	local: LocalTable<H>,
	remote: RemoteTable,
	pending_free: Rc<RefCell<PendingFreeQueue>>,
	status: Status,
	protocol_version: Option<u32>,
}

/// The concrete [`Reentrant`] handed to adapter callbacks while the pump is
/// dispatching an inbound `Invoke`/`InvokeSpecial`/`LoadJsni`.
struct ReentrantHandle<'session, A, H> {
	session: &'session mut Session<A, H>,
	// The same adapter the engine is already dispatching through — it is
	// simultaneously borrowed as the receiver of the `invoke`/`invoke_special`
	// call this handle was created for. Reconstructing `&mut` from the raw
	// pointer is sound only because use is always strictly sequential on a
	// single thread (the pump never holds two live references to it at
	// once); see `Session::dispatch_invoke`, the only place this is built.
	adapter: *mut dyn ScriptHostAdapter,
}

impl<A: AllowList, H> Reentrant for ReentrantHandle<'_, A, H> {
	fn call(&mut self, message: Message) -> Result<AdapterOutcome, SessionError> {
		// Safety: see the field comment above.
		let adapter = unsafe { &mut *self.adapter };
		self.session.call(adapter, message)
	}
}

impl<A: AllowList, H> Session<A, H> {
	/// Wraps an already-constructed [`HostChannel`] in a fresh, disconnected
	/// session.
	#[must_use]
	pub fn new(channel: HostChannel<A>) -> Self {
		let pending_free = Rc::new(RefCell::new(PendingFreeQueue::new()));
		Self {
			channel,
			local: LocalTable::new(),
			remote: RemoteTable::new(Rc::clone(&pending_free)),
			pending_free,
			status: Status::Disconnected,
			protocol_version: None,
		}
	}

	/// The current connection status.
	#[must_use]
	pub fn status(&self) -> Status {
		self.status
	}

	/// The protocol version negotiated by `LoadModule`, if the handshake has
	/// completed.
	#[must_use]
	pub fn protocol_version(&self) -> Option<u32> {
		self.protocol_version
	}

	/// Consults the allow-list and opens the underlying socket.
	pub fn connect(&mut self, host: &str, port: u16) -> Result<(), SessionError> {
		self.status = Status::Connecting;
		self.channel.connect(host, port)?;
		self.status = Status::Active;
		Ok(())
	}

	/// Orderly shutdown (§4.4): sends `Quit`, flushes, and closes the
	/// socket. Idempotent with an already-disconnected session — calling
	/// this twice is a benign failure, not a panic, so the engine never
	/// double-closes when a protocol error arrives after the peer already
	/// hung up.
	pub fn disconnect(&mut self) -> Result<(), SessionError> {
		if self.status == Status::Disconnected {
			return Err(SessionError::NotConnected);
		}

		self.status = Status::Draining;
		let send_result = Message::Quit.send(&mut self.channel).map_err(SessionError::from);
		let _ = self.channel.flush();
		let _ = self.channel.disconnect();
		self.status = Status::Disconnected;

		send_result
	}

	/// Sends the plugin's opening handshake and blocks for the server's
	/// acknowledging `Return`.
	pub fn load_module(
		&mut self,
		adapter: &mut dyn ScriptHostAdapter,
		module_name: &str,
		user_agent: &str,
		session_token: &str,
	) -> Result<AdapterOutcome, SessionError> {
		let message = Message::LoadModule {
			version: PROTOCOL_VERSION,
			module_name: module_name.to_owned(),
			user_agent: user_agent.to_owned(),
			session_token: session_token.to_owned(),
		};
		let outcome = self.call(adapter, message)?;
		self.protocol_version = Some(PROTOCOL_VERSION);
		Ok(outcome)
	}

	/// Exports `handle` across the wire: leases a fresh id in the local
	/// scripting table **L** and returns the [`Value::ScriptObjectRef`] that
	/// addresses it. Every call leases an independent id, even for a handle
	/// already exported under another id (§4.3).
	pub fn export(&mut self, handle: H) -> Value {
		Value::ScriptObjectRef(self.local.add(handle))
	}

	/// Looks up a handle previously exported via [`export`](Self::export),
	/// if its id is still pinned.
	#[must_use]
	pub fn local_handle(&self, id: u32) -> Option<&H> {
		self.local.get(id)
	}

	/// Resolves a peer-assigned id into a cached or freshly created
	/// [`ProgramObject`] wrapper (§4.3's remote program table **R**).
	pub fn resolve_program(&mut self, id: u32) -> ProgramObject {
		self.remote.wrap(id)
	}

	/// Issues an outbound call: drains the pending-free batch, sends
	/// `message`, then pumps until the matching `Return` arrives,
	/// dispatching any inbound messages that arrive first via `adapter`.
	///
	/// This is also what [`Reentrant::call`] resolves to from within an
	/// adapter callback — the same method serves embedder-initiated calls
	/// and re-entrant ones, which is exactly what makes nesting to
	/// arbitrary depth work: each level is just another stack frame calling
	/// this same method.
	pub fn call(
		&mut self,
		adapter: &mut dyn ScriptHostAdapter,
		message: Message,
	) -> Result<AdapterOutcome, SessionError> {
		if let Err(err) = self.send_bundled(&message) {
			self.fail(&err);
			return Err(err);
		}

		match self.pump(adapter, PumpMode::Call) {
			Ok(PumpOutcome::Return(value, is_exception)) => Ok((value, is_exception)),
			Ok(PumpOutcome::Quit) => unreachable!("PumpMode::Call never yields Quit"),
			Err(err) => Err(err),
		}
	}

	/// Runs the pump until the peer sends `Quit` or a fatal error occurs,
	/// dispatching every inbound message to `adapter`. This is the
	/// background-like loop a server-side embedding runs on its connection
	/// to a plugin.
	pub fn serve(&mut self, adapter: &mut dyn ScriptHostAdapter) -> Result<(), SessionError> {
		match self.pump(adapter, PumpMode::Serve) {
			Ok(PumpOutcome::Quit) => Ok(()),
			Ok(PumpOutcome::Return(..)) => unreachable!("PumpMode::Serve never yields Return"),
			Err(err) => Err(err),
		}
	}

	fn pump(&mut self, adapter: &mut dyn ScriptHostAdapter, mode: PumpMode) -> Result<PumpOutcome, SessionError> {
		loop {
			if let Err(err) = self.channel.flush() {
				self.fail(&err);
				return Err(err);
			}

			let message = match Message::receive(&mut self.channel) {
				Ok(message) => message,
				Err(err) => {
					self.fail(&err);
					return Err(err);
				}
			};

			match message {
				Message::Invoke {
					this,
					method_name,
					args,
				} => {
					let (value, is_exception) = self.dispatch_invoke(adapter, &this, &method_name, &args);
					if let Err(err) = self.send_bundled(&Message::Return { is_exception, value }) {
						self.fail(&err);
						return Err(err);
					}
				}
				Message::InvokeSpecial { dispatch_id, args } => {
					let (value, is_exception) = match SpecialDispatch::from_id(dispatch_id) {
						Ok(dispatch) => self.dispatch_invoke_special(adapter, dispatch, &args),
						Err(err) => {
							// Unsupported is surfaced as a RemoteException-shaped
							// value back to the peer; the session continues (§7).
							trace!(dispatch_id, "Session::pump: unsupported special dispatch id");
							(Value::String(err.to_string()), true)
						}
					};
					if let Err(err) = self.send_bundled(&Message::Return { is_exception, value }) {
						self.fail(&err);
						return Err(err);
					}
				}
				Message::FreeValue { ids } => {
					trace!(?ids, "Session::pump: FreeValue");
					adapter.free_value(&ids);
					for id in &ids {
						self.local.free(*id);
					}
				}
				Message::LoadJsni { source } => {
					trace!("Session::pump: LoadJsni");
					let adapter_ptr: *mut dyn ScriptHostAdapter = adapter;
					let mut reentrant = ReentrantHandle {
						session: self,
						adapter: adapter_ptr,
					};
					adapter.load_jsni(&mut reentrant, &source);
				}
				Message::Return { is_exception, value } => match mode {
					PumpMode::Call => return Ok(PumpOutcome::Return(value, is_exception)),
					PumpMode::Serve => {
						let err = SessionError::from(ProtocolError::UnexpectedMessage("Return"));
						self.fail(&err);
						return Err(err);
					}
				},
				Message::Quit => {
					debug!("Session::pump: peer sent Quit");
					let _ = self.channel.disconnect();
					self.status = Status::Disconnected;
					return match mode {
						PumpMode::Call => Err(SessionError::SessionTerminated),
						PumpMode::Serve => Ok(PumpOutcome::Quit),
					};
				}
				Message::LoadModule { .. } => {
					// `LoadModule` only ever opens a session, sent by the
					// plugin via `load_module`; receiving one mid-session
					// is a protocol violation, not a message the pump
					// dispatches.
					let err = SessionError::from(ProtocolError::UnexpectedMessage("LoadModule"));
					self.fail(&err);
					return Err(err);
				}
			}
		}
	}

	fn dispatch_invoke(
		&mut self,
		adapter: &mut dyn ScriptHostAdapter,
		this: &Value,
		method_name: &str,
		args: &[Value],
	) -> AdapterOutcome {
		let adapter_ptr: *mut dyn ScriptHostAdapter = adapter;
		let mut reentrant = ReentrantHandle {
			session: self,
			adapter: adapter_ptr,
		};
		adapter.invoke(&mut reentrant, this, method_name, args)
	}

	fn dispatch_invoke_special(
		&mut self,
		adapter: &mut dyn ScriptHostAdapter,
		dispatch: SpecialDispatch,
		args: &[Value],
	) -> AdapterOutcome {
		let adapter_ptr: *mut dyn ScriptHostAdapter = adapter;
		let mut reentrant = ReentrantHandle {
			session: self,
			adapter: adapter_ptr,
		};
		adapter.invoke_special(&mut reentrant, dispatch, args)
	}

	/// Drains the pending-free queue into a single `FreeValue`, purges the
	/// corresponding [`RemoteTable`] entries, then sends `message` — the
	/// batched free protocol (§4.3): every outbound `Invoke`/`InvokeSpecial`/
	/// `Return` is immediately preceded by exactly the `FreeValue` naming
	/// what became unreachable since the last one.
	fn send_bundled(&mut self, message: &Message) -> Result<(), SessionError> {
		let ids = self.pending_free.borrow_mut().drain();
		if !ids.is_empty() {
			trace!(?ids, "Session: flushing pending FreeValue batch");
			self.remote.purge(&ids);
			Message::FreeValue { ids }.send(&mut self.channel)?;
		}

		message.send(&mut self.channel)?;
		Ok(())
	}

	/// Tears the session down after a fatal error (§7): the socket is
	/// closed and every live [`ProgramObject`] wrapper is detached so that
	/// future operations on them fail rather than silently resolve against
	/// a table that no longer reflects a real connection.
	fn fail(&mut self, err: &SessionError) {
		error!(error = %err, "Session: fatal error, tearing down");
		self.remote.clear();
		let _ = self.channel.disconnect();
		self.status = Status::Disconnected;
	}
}
