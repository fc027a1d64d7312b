// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The two object directories (§3, §4.3): the local scripting table **L**
//! and the remote program table **R**, plus the pending-free queue they
//! share.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::rc::{Rc, Weak};

/// The set of remote ids locally released but not yet announced to the
/// peer, drained into a single `FreeValue` before the next outbound
/// call-bearing message.
///
/// Ordered by insertion, not by id: §8's free-batch linearizability property
/// requires ids to appear in the `FreeValue` in the order they became
/// unreachable (the original C++ uses a sorted `std::set`, which does not
/// have this property; see `DESIGN.md`).
#[derive(Default, Debug)]
pub struct PendingFreeQueue {
	order: Vec<u32>,
	member: HashSet<u32>,
}

impl PendingFreeQueue {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	/// Queues `id` for a future `FreeValue`. A no-op if `id` is already
	/// queued.
	pub fn push(&mut self, id: u32) {
		if self.member.insert(id) {
			self.order.push(id);
		}
	}

	/// Removes `id` from the queue if present, reporting whether it was
	/// there. Used by the revival race: an inbound reference to `id` cancels
	/// its pending free.
	pub fn remove(&mut self, id: u32) -> bool {
		if self.member.remove(&id) {
			self.order.retain(|&queued| queued != id);
			true
		} else {
			false
		}
	}

	/// Whether there is nothing queued.
	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.order.is_empty()
	}

	/// Drains the queue, returning the queued ids in insertion order.
	pub fn drain(&mut self) -> Vec<u32> {
		self.member.clear();
		std::mem::take(&mut self.order)
	}
}

/// The local scripting table **L**: `id → scripting object handle`.
///
/// Ids are dense, non-negative, and chosen by this table when a scripting
/// object is first exported across the wire; they are never reused within
/// a session. `H` is whatever opaque handle type the scripting host adapter
/// uses to identify one of its own objects.
#[derive(Debug)]
pub struct LocalTable<H> {
	next_id: u32,
	entries: HashMap<u32, H>,
}

impl<H> Default for LocalTable<H> {
	fn default() -> Self {
		Self {
			next_id: 0,
			entries: HashMap::new(),
		}
	}
}

impl<H> LocalTable<H> {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	/// Leases a fresh id for `handle` and returns it. Each call returns a
	/// new id, even if `handle` aliases an object already present under a
	/// different id: every slot is an independent lease.
	pub fn add(&mut self, handle: H) -> u32 {
		let id = self.next_id;
		self.next_id = self
			.next_id
			.checked_add(1)
			.expect("local scripting table exhausted its id space");
		self.entries.insert(id, handle);
		id
	}

	/// Looks up the handle behind `id`, if it is still pinned.
	#[must_use]
	pub fn get(&self, id: u32) -> Option<&H> {
		self.entries.get(&id)
	}

	/// Drops this table's strong reference to `id`'s handle, returning it
	/// if it was present. The scripting host may reclaim the underlying
	/// object once no other holder remains.
	pub fn free(&mut self, id: u32) -> Option<H> {
		self.entries.remove(&id)
	}
}

struct ProgramObjectInner {
	id: u32,
	/// The number of live [`ProgramObject`] handles referencing this entry,
	/// tracked independently of this `Rc`'s own strong count: the table
	/// itself always keeps one strong reference alive (see
	/// [`RemoteTable`]), so that the entry — and the invariant that a
	/// revived id resolves to the *same* wrapper — survives even after
	/// every external holder has dropped its handle and the id has been
	/// queued for a `FreeValue`.
	holders: Cell<usize>,
	pending_free: Weak<RefCell<PendingFreeQueue>>,
}

/// A reference-counted wrapper for an object whose authoritative
/// representation lives on the peer (program/server) side.
///
/// Cloning a `ProgramObject` hands out another local holder of the same
/// remote id; dropping the last clone queues the id for a batched
/// `FreeValue` to the peer.
pub struct ProgramObject(Rc<ProgramObjectInner>);

impl ProgramObject {
	/// The peer-assigned id this wrapper addresses.
	#[must_use]
	pub fn id(&self) -> u32 {
		self.0.id
	}
}

impl Clone for ProgramObject {
	fn clone(&self) -> Self {
		self.0.holders.set(self.0.holders.get() + 1);
		Self(Rc::clone(&self.0))
	}
}

impl Drop for ProgramObject {
	fn drop(&mut self) {
		let remaining = self.0.holders.get() - 1;
		self.0.holders.set(remaining);

		if remaining == 0 {
			if let Some(pending_free) = self.0.pending_free.upgrade() {
				pending_free.borrow_mut().push(self.0.id);
			}
		}
	}
}

impl std::fmt::Debug for ProgramObject {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ProgramObject").field("id", &self.0.id).finish()
	}
}

/// The remote program table **R**: `id → wrapper`.
///
/// Ids are chosen by the peer. `wrap` caches wrappers so that repeated
/// arrivals of the same id resolve to the same underlying
/// [`ProgramObject`] entry; `release` — driven by [`ProgramObject`]'s
/// `Drop` — queues the id in the shared [`PendingFreeQueue`] instead of
/// removing the entry immediately, so a revival before the next flush can
/// still find it.
pub struct RemoteTable {
	entries: HashMap<u32, Rc<ProgramObjectInner>>,
	pending_free: Rc<RefCell<PendingFreeQueue>>,
}

impl RemoteTable {
	#[must_use]
	pub fn new(pending_free: Rc<RefCell<PendingFreeQueue>>) -> Self {
		Self {
			entries: HashMap::new(),
			pending_free,
		}
	}

	/// Returns the cached wrapper for `id`, creating one bound to this
	/// table if `id` has not been seen before.
	///
	/// If `id` was queued in the pending-free set, it is removed from the
	/// queue first: the peer just proved the id is alive again, so no
	/// `FreeValue` will be sent for it.
	pub fn wrap(&mut self, id: u32) -> ProgramObject {
		self.pending_free.borrow_mut().remove(id);

		if let Some(inner) = self.entries.get(&id) {
			inner.holders.set(inner.holders.get() + 1);
			return ProgramObject(Rc::clone(inner));
		}

		let inner = Rc::new(ProgramObjectInner {
			id,
			holders: Cell::new(1),
			pending_free: Rc::downgrade(&self.pending_free),
		});
		self.entries.insert(id, Rc::clone(&inner));
		ProgramObject(inner)
	}

	/// Removes table entries for ids that have just been announced to the
	/// peer via `FreeValue`. Called once the batch has actually been
	/// flushed, never before.
	pub fn purge(&mut self, ids: &[u32]) {
		for id in ids {
			self.entries.remove(id);
		}
	}

	/// Drops every entry outright, detaching all live wrappers from their
	/// ids without announcing anything to the peer.
	///
	/// Used when the session fails fatally (§7): the connection is gone, so
	/// there is no peer left to send a `FreeValue` to, but holders of
	/// [`ProgramObject`] must stop resolving to a table that no longer
	/// tracks them.
	pub fn clear(&mut self) {
		self.entries.clear();
	}
}
