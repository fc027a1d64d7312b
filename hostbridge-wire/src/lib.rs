// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # hostbridge-wire
//!
//! Streaming, big-endian (de)serialization primitives and the tagged
//! [`Value`] type shared by both sides of the hosted-mode bridge.
//!
//! `hostbridge-wire` is not a connection, a session, or a protocol on its
//! own; it is the codec layer that the message catalog and session engine
//! in the `hostbridge` crate build on.

mod error;
mod primitives;
mod value;

pub use error::{ReadResult, WireError, WriteResult};
pub use primitives::{
	read_f32, read_f64, read_i16, read_i32, read_i64, read_i8, read_string, read_u16, read_u32,
	read_u8, write_f32, write_f64, write_i16, write_i32, write_i64, write_i8, write_string,
	write_u16, write_u32, write_u8,
};
pub use value::{Tag, Value};
