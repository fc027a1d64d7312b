// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::io;

use thiserror::Error;

/// Everything that can go wrong while reading or writing a primitive or a
/// [`Value`](crate::Value) on the wire.
///
/// `WireError` never distinguishes "the peer is gone" from "the peer sent
/// something we don't understand" on its own; callers that need to tell
/// those apart (the session engine does, per its error taxonomy) match on
/// the variants below.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum WireError {
	/// The underlying stream failed to read or write.
	#[error("i/o error: {0}")]
	Io(#[from] io::Error),

	/// A string's length prefix was negative.
	#[error("string length prefix was negative: {0}")]
	NegativeStringLength(i32),

	/// A [`Value`](crate::Value)'s tag byte did not match any known variant.
	#[error("unrecognized value tag: {0:#04x}")]
	UnrecognizedTag(u8),

	/// A string's bytes were not valid UTF-8.
	#[error("string was not valid utf-8: {0}")]
	InvalidUtf8(#[from] std::string::FromUtf8Error),
}

pub type ReadResult<T> = Result<T, WireError>;
pub type WriteResult = Result<(), WireError>;
