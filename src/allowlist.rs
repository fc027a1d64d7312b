// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The connection allow-list: a policy check queried once per connect
//! attempt, before any socket is opened.

/// A predicate on `(host, port)`, consulted exactly once per
/// [`HostChannel::connect`](crate::channel::HostChannel::connect) attempt.
///
/// If [`is_allowed`](Self::is_allowed) returns `false`, no socket is ever
/// opened; the connection attempt fails with
/// [`SessionError::Policy`](crate::error::SessionError::Policy).
pub trait AllowList {
	fn is_allowed(&self, host: &str, port: u16) -> bool;
}

/// An allow-list that permits every destination. Useful for tests and for
/// embeddings that perform their own policy check upstream.
#[derive(Copy, Clone, Debug, Default)]
pub struct AllowAll;

impl AllowList for AllowAll {
	fn is_allowed(&self, _host: &str, _port: u16) -> bool {
		true
	}
}

/// An allow-list that denies every destination. Useful for tests that
/// exercise the policy-denial path.
#[derive(Copy, Clone, Debug, Default)]
pub struct DenyAll;

impl AllowList for DenyAll {
	fn is_allowed(&self, _host: &str, _port: u16) -> bool {
		false
	}
}

/// An allow-list backed by an explicit set of `(host, port)` pairs.
#[derive(Clone, Debug, Default)]
pub struct ExactMatchAllowList {
	allowed: Vec<(String, u16)>,
}

impl ExactMatchAllowList {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	#[must_use]
	pub fn with(mut self, host: impl Into<String>, port: u16) -> Self {
		self.allowed.push((host.into(), port));
		self
	}
}

impl AllowList for ExactMatchAllowList {
	fn is_allowed(&self, host: &str, port: u16) -> bool {
		self.allowed
			.iter()
			.any(|(allowed_host, allowed_port)| allowed_host == host && *allowed_port == port)
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn test_exact_match() {
		let list = ExactMatchAllowList::new().with("127.0.0.1", 9997);
		assert!(list.is_allowed("127.0.0.1", 9997));
		assert!(!list.is_allowed("127.0.0.1", 9998));
		assert!(!list.is_allowed("example.com", 9997));
	}
}
