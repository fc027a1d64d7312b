// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! End-to-end tests driven purely through the public API, over real
//! loopback TCP sockets opened via [`Session::connect`], rather than the
//! crate-internal test hooks the unit tests in `src/session.rs` use.
//!
//! These exercise the scenarios from the specification's testable
//! properties section that specifically depend on `connect`'s allow-list
//! check, on `Quit` arriving while a call is outstanding, and on
//! reentrancy to depth greater than one — the cases the inline unit tests
//! don't already cover.

use std::net::TcpListener;
use std::sync::Once;
use std::thread;

use hostbridge::allowlist::{AllowAll, DenyAll, ExactMatchAllowList};
use hostbridge::channel::HostChannel;
use hostbridge::message::{Message, SpecialDispatch};
use hostbridge::session::Session;
use hostbridge::{AdapterOutcome, Reentrant, ScriptHostAdapter, SessionError};
use hostbridge_wire::Value;

static INIT_TRACING: Once = Once::new();

fn init_tracing() {
	INIT_TRACING.call_once(|| {
		let _ = tracing_subscriber::fmt().with_test_writer().try_init();
	});
}

/// An adapter that never re-enters the session, answering every `Invoke`
/// with a fixed value and every special dispatch as an unsupported method.
struct NullAdapter;

impl ScriptHostAdapter for NullAdapter {
	fn invoke(
		&mut self,
		_reentrant: &mut dyn Reentrant,
		_this: &Value,
		_method_name: &str,
		_args: &[Value],
	) -> AdapterOutcome {
		(Value::Undefined, false)
	}

	fn invoke_special(
		&mut self,
		_reentrant: &mut dyn Reentrant,
		_dispatch: SpecialDispatch,
		_args: &[Value],
	) -> AdapterOutcome {
		(Value::Undefined, false)
	}

	fn free_value(&mut self, _ids: &[u32]) {}

	fn load_jsni(&mut self, _reentrant: &mut dyn Reentrant, _source: &str) {}
}

#[test]
fn test_connect_denied_by_allowlist_never_dials() {
	init_tracing();

	// A listener is bound but never accepted from: a denial must not even
	// attempt to open the socket.
	let listener = TcpListener::bind("127.0.0.1:0").unwrap();
	let addr = listener.local_addr().unwrap();
	drop(listener);

	let channel = HostChannel::new(DenyAll);
	let mut session = Session::new(channel);

	let err = session.connect(&addr.ip().to_string(), addr.port()).unwrap_err();
	assert!(matches!(err, SessionError::Policy { .. }));
}

#[test]
fn test_connect_and_load_module_end_to_end() {
	init_tracing();

	// Scenario 1: client connects to a loopback listener (standing in for
	// 127.0.0.1:9997), sends LoadModule, and observes the server's Return.
	let listener = TcpListener::bind("127.0.0.1:0").unwrap();
	let addr = listener.local_addr().unwrap();

	let server = thread::spawn(move || {
		let (mut socket, _) = listener.accept().unwrap();
		match Message::receive(&mut socket).unwrap() {
			Message::LoadModule {
				version,
				module_name,
				user_agent,
				session_token,
			} => {
				assert_eq!(version, 2);
				assert_eq!(module_name, "myModule");
				assert_eq!(user_agent, "Browser/10");
				assert_eq!(session_token, "sess");
			}
			other => panic!("expected LoadModule, got {other:?}"),
		}
		Message::Return {
			is_exception: false,
			value: Value::Boolean(true),
		}
		.send(&mut socket)
		.unwrap();
		socket.flush().unwrap();
	});

	let allow_list = ExactMatchAllowList::new().with(addr.ip().to_string(), addr.port());
	let channel = HostChannel::new(allow_list);
	let mut session = Session::new(channel);
	session.connect(&addr.ip().to_string(), addr.port()).unwrap();

	let mut adapter = NullAdapter;
	let (value, is_exception) = session
		.load_module(&mut adapter, "myModule", "Browser/10", "sess")
		.unwrap();

	assert!(!is_exception);
	assert!(matches!(value, Value::Boolean(true)));
	assert_eq!(session.protocol_version(), Some(2));

	server.join().unwrap();
}

#[test]
fn test_get_and_set_property_dispatch() {
	init_tracing();

	// GetProperty/SetProperty are the only two special dispatches current
	// servers are expected to send; this exercises both round-tripping
	// through a session that isn't a no-op adapter for them.
	struct PropertyAdapter {
		stored: Option<Value>,
	}

	impl ScriptHostAdapter for PropertyAdapter {
		fn invoke(
			&mut self,
			_reentrant: &mut dyn Reentrant,
			_this: &Value,
			_method_name: &str,
			_args: &[Value],
		) -> AdapterOutcome {
			(Value::Undefined, false)
		}

		fn invoke_special(
			&mut self,
			_reentrant: &mut dyn Reentrant,
			dispatch: SpecialDispatch,
			args: &[Value],
		) -> AdapterOutcome {
			match dispatch {
				SpecialDispatch::SetProperty => {
					self.stored = args.first().cloned();
					(Value::Undefined, false)
				}
				SpecialDispatch::GetProperty => (self.stored.clone().unwrap_or(Value::Null), false),
				SpecialDispatch::HasMethod | SpecialDispatch::HasProperty => {
					(Value::String("unexpected method".to_owned()), true)
				}
			}
		}

		fn free_value(&mut self, _ids: &[u32]) {}
		fn load_jsni(&mut self, _reentrant: &mut dyn Reentrant, _source: &str) {}
	}

	let listener = TcpListener::bind("127.0.0.1:0").unwrap();
	let addr = listener.local_addr().unwrap();

	let peer = thread::spawn(move || {
		let (mut socket, _) = listener.accept().unwrap();

		Message::InvokeSpecial {
			dispatch_id: 3, // SetProperty
			args: vec![Value::Int(42)],
		}
		.send(&mut socket)
		.unwrap();
		socket.flush().unwrap();
		match Message::receive(&mut socket).unwrap() {
			Message::Return { is_exception, .. } => assert!(!is_exception),
			other => panic!("expected Return, got {other:?}"),
		}

		Message::InvokeSpecial {
			dispatch_id: 2, // GetProperty
			args: vec![],
		}
		.send(&mut socket)
		.unwrap();
		socket.flush().unwrap();
		match Message::receive(&mut socket).unwrap() {
			Message::Return {
				is_exception,
				value: Value::Int(42),
			} => assert!(!is_exception),
			other => panic!("expected Return(Int(42)), got {other:?}"),
		}

		Message::Quit.send(&mut socket).unwrap();
		socket.flush().unwrap();
	});

	let channel = HostChannel::new(AllowAll);
	let mut session = Session::new(channel);
	session.connect(&addr.ip().to_string(), addr.port()).unwrap();

	let mut adapter = PropertyAdapter { stored: None };
	session.serve(&mut adapter).unwrap();

	peer.join().unwrap();
}

#[test]
fn test_quit_mid_call_aborts_caller() {
	init_tracing();

	// §4.4 Shutdown: inbound Quit during a call aborts the caller with an
	// error rather than hanging forever waiting for a Return that will
	// never come.
	let listener = TcpListener::bind("127.0.0.1:0").unwrap();
	let addr = listener.local_addr().unwrap();

	let peer = thread::spawn(move || {
		let (mut socket, _) = listener.accept().unwrap();
		Message::receive(&mut socket).unwrap(); // the outbound Invoke
		Message::Quit.send(&mut socket).unwrap();
		socket.flush().unwrap();
	});

	let channel = HostChannel::new(AllowAll);
	let mut session = Session::new(channel);
	session.connect(&addr.ip().to_string(), addr.port()).unwrap();

	let mut adapter = NullAdapter;
	let err = session
		.call(
			&mut adapter,
			Message::Invoke {
				this: Value::Null,
				method_name: "anything".to_owned(),
				args: vec![],
			},
		)
		.unwrap_err();

	assert!(matches!(err, SessionError::SessionTerminated));

	peer.join().unwrap();
}

#[test]
fn test_reentrancy_to_depth_three() {
	init_tracing();

	// §8 "Reentrancy depth": the session's adapter answers each inbound
	// Invoke by reentrant-calling one level deeper, to depth k = 3, and
	// the peer mirrors that by nesting its own replies the same way. Every
	// Return must pair LIFO with the call it answers, and the value
	// (Int(3), the base case) must bubble all the way back up unchanged.
	let listener = TcpListener::bind("127.0.0.1:0").unwrap();
	let addr = listener.local_addr().unwrap();

	const MAX_DEPTH: u32 = 3;

	// Sends `Invoke(step{n})` and returns once the matching `Return` for
	// it has arrived, answering any more-deeply-nested `Invoke`s the
	// session sends back in the meantime via `answer_invoke`.
	fn call_and_get_return(socket: &mut std::net::TcpStream, n: u32) -> Value {
		Message::Invoke {
			this: Value::Null,
			method_name: format!("step{n}"),
			args: vec![],
		}
		.send(socket)
		.unwrap();
		socket.flush().unwrap();
		wait_for_return(socket)
	}

	fn wait_for_return(socket: &mut std::net::TcpStream) -> Value {
		loop {
			match Message::receive(socket).unwrap() {
				Message::Invoke { method_name, .. } => {
					let n: u32 = method_name.strip_prefix("step").unwrap().parse().unwrap();
					answer_invoke(socket, n);
				}
				Message::Return {
					is_exception,
					value,
				} => {
					assert!(!is_exception);
					return value;
				}
				other => panic!("unexpected message: {other:?}"),
			}
		}
	}

	// Answers an inbound `Invoke(step{n})` the session sent us, recursing
	// one level deeper unless `n` has already reached the base case.
	fn answer_invoke(socket: &mut std::net::TcpStream, n: u32) {
		let value = if n < MAX_DEPTH {
			call_and_get_return(socket, n + 1)
		} else {
			Value::Int(MAX_DEPTH as i32)
		};
		Message::Return {
			is_exception: false,
			value,
		}
		.send(socket)
		.unwrap();
		socket.flush().unwrap();
	}

	let peer = thread::spawn(move || {
		let (mut socket, _) = listener.accept().unwrap();

		let final_value = call_and_get_return(&mut socket, 0);
		assert!(matches!(final_value, Value::Int(v) if v == MAX_DEPTH as i32));

		Message::Quit.send(&mut socket).unwrap();
		socket.flush().unwrap();
	});

	struct RecursingAdapter {
		max_depth: u32,
	}

	impl ScriptHostAdapter for RecursingAdapter {
		fn invoke(
			&mut self,
			reentrant: &mut dyn Reentrant,
			_this: &Value,
			method_name: &str,
			_args: &[Value],
		) -> AdapterOutcome {
			let depth: u32 = method_name
				.strip_prefix("step")
				.and_then(|rest| rest.parse().ok())
				.expect("unexpected method name");

			if depth >= self.max_depth {
				return (Value::Int(depth as i32), false);
			}

			reentrant
				.call(Message::Invoke {
					this: Value::Null,
					method_name: format!("step{}", depth + 1),
					args: vec![],
				})
				.expect("nested call failed")
		}

		fn invoke_special(
			&mut self,
			_reentrant: &mut dyn Reentrant,
			_dispatch: SpecialDispatch,
			_args: &[Value],
		) -> AdapterOutcome {
			(Value::Undefined, false)
		}

		fn free_value(&mut self, _ids: &[u32]) {}
		fn load_jsni(&mut self, _reentrant: &mut dyn Reentrant, _source: &str) {}
	}

	let channel = HostChannel::new(AllowAll);
	let mut session = Session::new(channel);
	session.connect(&addr.ip().to_string(), addr.port()).unwrap();

	let mut adapter = RecursingAdapter { max_depth: 3 };
	session.serve(&mut adapter).unwrap();

	peer.join().unwrap();
}
