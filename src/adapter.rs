// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The scripting host adapter: the capability record a browser embedding
//! must supply so the session engine can dispatch server-initiated calls
//! into the browser's scripting environment.
//!
//! This is modeled as a trait object held by the session — a capability
//! record, not an inheritance hierarchy (§9 Design Notes) — so that the
//! engine never assumes anything about *how* methods are invoked, only
//! that these four operations exist.

use hostbridge_wire::Value;

use crate::error::SessionError;
use crate::message::{Message, SpecialDispatch};

/// The result of evaluating a method or special dispatch: the value
/// produced, and whether it represents a thrown exception rather than a
/// normal return.
///
/// The wire only ever carries `(is_exception, value)`; mapping that pair to
/// a host environment's native exception mechanism is entirely this
/// adapter's responsibility (§9) — the core never synthesises exception
/// objects from remote values.
pub type AdapterOutcome = (Value, bool);

/// The capability a [`ScriptHostAdapter`] callback uses to issue its own
/// outbound message and block for the matching `Return`, re-entering the
/// session's pump from within the callback.
///
/// This is the reentrancy guarantee (§4.4): a server-side method may call
/// plugin-side script, which may call back into the program, to arbitrary
/// depth, on one thread and one socket, with each `Return` pairing LIFO
/// with its `call`. A `Reentrant` is only ever live for the duration of the
/// callback it was handed to; implementations must not stash it away.
pub trait Reentrant {
	fn call(&mut self, message: Message) -> Result<AdapterOutcome, SessionError>;
}

/// Callbacks the session engine invokes while dispatching inbound messages.
///
/// Implementations may re-enter the session (via the [`Reentrant`] handle
/// passed to [`invoke`](Self::invoke)/[`invoke_special`](Self::invoke_special)/
/// [`load_jsni`](Self::load_jsni)) from within any of these methods; the
/// engine's pump is explicitly designed to support that. None of these
/// methods may assume the call stack is empty on entry.
pub trait ScriptHostAdapter {
	/// Evaluates `method_name` as a function in the scripting environment.
	///
	/// `this` is the receiver the peer supplied; if it is [`Value::Null`],
	/// the global object is used instead. The returned `bool` is `true` if
	/// the scripting environment's evaluation raised an exception, in which
	/// case the accompanying [`Value`] is the exception's value rather than
	/// a normal return.
	fn invoke(
		&mut self,
		reentrant: &mut dyn Reentrant,
		this: &Value,
		method_name: &str,
		args: &[Value],
	) -> AdapterOutcome;

	/// Handles one of the four special, name-less dispatches.
	///
	/// Only [`SpecialDispatch::GetProperty`] and
	/// [`SpecialDispatch::SetProperty`] are expected to be sent by current
	/// servers; [`SpecialDispatch::HasMethod`] and
	/// [`SpecialDispatch::HasProperty`] must still be handled gracefully —
	/// by returning an unexpected-method exception — rather than panicking
	/// or silently doing nothing, since the contract requires graceful
	/// refusal even for operations the peer is not known to send.
	fn invoke_special(
		&mut self,
		reentrant: &mut dyn Reentrant,
		dispatch: SpecialDispatch,
		args: &[Value],
	) -> AdapterOutcome;

	/// Releases the named local-scripting ids from the scripting
	/// environment's own bookkeeping, mirroring the session's own
	/// [`LocalTable::free`](crate::tables::LocalTable::free) for each id.
	fn free_value(&mut self, ids: &[u32]);

	/// Evaluates `source` as a statement in the scripting global scope,
	/// discarding any result.
	fn load_jsni(&mut self, reentrant: &mut dyn Reentrant, source: &str);
}
