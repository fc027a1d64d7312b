// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The tagged [`Value`] union exchanged between the two sides of the
//! bridge, and its wire (de)serialization.

use std::io::{Read, Write};

use crate::error::{ReadResult, WireError, WriteResult};
use crate::primitives::{
	read_f32, read_f64, read_i16, read_i32, read_i64, read_i8, read_string, read_u16, read_u32,
	read_u8, write_f32, write_f64, write_i16, write_i32, write_i64, write_i8, write_string,
	write_u16, write_u32, write_u8,
};

/// The one-byte tag identifying a [`Value`] variant on the wire.
///
/// The tag uniquely determines the payload length; no variant has an
/// ambiguous encoding.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
#[repr(u8)]
pub enum Tag {
	Null = 0,
	ProgramObjectRef = 1,
	ScriptObjectRef = 2,
	Boolean = 3,
	Byte = 4,
	Char = 5,
	Short = 6,
	Int = 7,
	Long = 8,
	Float = 9,
	Double = 10,
	String = 11,
	Undefined = 12,
}

impl Tag {
	fn from_byte(byte: u8) -> ReadResult<Self> {
		Ok(match byte {
			0 => Self::Null,
			1 => Self::ProgramObjectRef,
			2 => Self::ScriptObjectRef,
			3 => Self::Boolean,
			4 => Self::Byte,
			5 => Self::Char,
			6 => Self::Short,
			7 => Self::Int,
			8 => Self::Long,
			9 => Self::Float,
			10 => Self::Double,
			11 => Self::String,
			12 => Self::Undefined,
			other => return Err(WireError::UnrecognizedTag(other)),
		})
	}
}

/// A value exchanged across the bridge: either a primitive, a string, or a
/// reference to an object owned by one side or the other.
///
/// `Null` and `Undefined` are distinct, matching the scripting side's
/// distinction between "no value" and "the absence of a value" (JavaScript's
/// `null` versus `undefined`).
#[derive(Clone, Debug)]
pub enum Value {
	Null,
	Undefined,
	Boolean(bool),
	Byte(i8),
	/// An unsigned UTF-16 code unit.
	Char(u16),
	Short(i16),
	Int(i32),
	Long(i64),
	Float(f32),
	Double(f64),
	String(String),
	/// A reference to an object living on the program (server) side,
	/// addressed by an id the program side assigned.
	ProgramObjectRef(u32),
	/// A reference to an object living on the scripting (plugin) side,
	/// addressed by an id the plugin assigned.
	ScriptObjectRef(u32),
}

impl Value {
	/// The [`Tag`] this value would be encoded with.
	#[must_use]
	pub const fn tag(&self) -> Tag {
		match self {
			Self::Null => Tag::Null,
			Self::Undefined => Tag::Undefined,
			Self::Boolean(_) => Tag::Boolean,
			Self::Byte(_) => Tag::Byte,
			Self::Char(_) => Tag::Char,
			Self::Short(_) => Tag::Short,
			Self::Int(_) => Tag::Int,
			Self::Long(_) => Tag::Long,
			Self::Float(_) => Tag::Float,
			Self::Double(_) => Tag::Double,
			Self::String(_) => Tag::String,
			Self::ProgramObjectRef(_) => Tag::ProgramObjectRef,
			Self::ScriptObjectRef(_) => Tag::ScriptObjectRef,
		}
	}

	/// Reads a tagged [`Value`] from the stream: a one-byte tag followed by
	/// the payload the tag prescribes.
	pub fn read_from(r: &mut (impl Read + ?Sized)) -> ReadResult<Self> {
		Ok(match Tag::from_byte(read_u8(r)?)? {
			Tag::Null => Self::Null,
			Tag::Undefined => Self::Undefined,
			Tag::Boolean => Self::Boolean(read_u8(r)? != 0),
			Tag::Byte => Self::Byte(read_i8(r)?),
			Tag::Char => Self::Char(read_u16(r)?),
			Tag::Short => Self::Short(read_i16(r)?),
			Tag::Int => Self::Int(read_i32(r)?),
			Tag::Long => Self::Long(read_i64(r)?),
			Tag::Float => Self::Float(read_f32(r)?),
			Tag::Double => Self::Double(read_f64(r)?),
			Tag::String => Self::String(read_string(r)?),
			Tag::ProgramObjectRef => Self::ProgramObjectRef(read_u32(r)?),
			Tag::ScriptObjectRef => Self::ScriptObjectRef(read_u32(r)?),
		})
	}

	/// Writes this value's tag followed by its payload.
	pub fn write_to(&self, w: &mut (impl Write + ?Sized)) -> WriteResult {
		write_u8(w, self.tag() as u8)?;

		match self {
			Self::Null | Self::Undefined => {}
			Self::Boolean(value) => write_u8(w, u8::from(*value))?,
			Self::Byte(value) => write_i8(w, *value)?,
			Self::Char(value) => write_u16(w, *value)?,
			Self::Short(value) => write_i16(w, *value)?,
			Self::Int(value) => write_i32(w, *value)?,
			Self::Long(value) => write_i64(w, *value)?,
			Self::Float(value) => write_f32(w, *value)?,
			Self::Double(value) => write_f64(w, *value)?,
			Self::String(value) => write_string(w, value)?,
			Self::ProgramObjectRef(id) | Self::ScriptObjectRef(id) => write_u32(w, *id)?,
		}

		Ok(())
	}
}
