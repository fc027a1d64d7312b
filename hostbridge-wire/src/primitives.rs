// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Streaming (de)serialization of primitive types.
//!
//! Unlike `bytes::Buf`/`BufMut`, which the wire codec of a framed,
//! length-prefixed protocol can use directly on an already-assembled
//! buffer, this protocol's messages have no outer length envelope: the
//! reader must consume bytes directly off the live, blocking socket as it
//! decides what to read next. Each `read_*`/`write_*` pair below therefore
//! operates directly on a generic `Read`/`Write` stream, mirroring the flat
//! method list of the original `HostChannel::readInt`/`sendInt` and friends
//! rather than the teacher's in-memory `Buf`/`BufMut` getters.

use std::io::{Read, Write};

use crate::error::{ReadResult, WireError, WriteResult};

/// Reads a single unsigned byte.
pub fn read_u8(r: &mut (impl Read + ?Sized)) -> ReadResult<u8> {
	let mut buf = [0u8; 1];
	r.read_exact(&mut buf)?;
	Ok(buf[0])
}

/// Writes a single unsigned byte.
pub fn write_u8(w: &mut (impl Write + ?Sized), value: u8) -> WriteResult {
	w.write_all(&[value])?;
	Ok(())
}

/// Reads a single signed byte.
pub fn read_i8(r: &mut (impl Read + ?Sized)) -> ReadResult<i8> {
	Ok(read_u8(r)? as i8)
}

/// Writes a single signed byte.
pub fn write_i8(w: &mut (impl Write + ?Sized), value: i8) -> WriteResult {
	write_u8(w, value as u8)
}

/// Reads a big-endian `i16`.
pub fn read_i16(r: &mut (impl Read + ?Sized)) -> ReadResult<i16> {
	let mut buf = [0u8; 2];
	r.read_exact(&mut buf)?;
	Ok(i16::from_be_bytes(buf))
}

/// Writes a big-endian `i16`.
pub fn write_i16(w: &mut (impl Write + ?Sized), value: i16) -> WriteResult {
	w.write_all(&value.to_be_bytes())?;
	Ok(())
}

/// Reads a big-endian `u16` (used for [`Value::Char`](crate::Value::Char)).
pub fn read_u16(r: &mut (impl Read + ?Sized)) -> ReadResult<u16> {
	let mut buf = [0u8; 2];
	r.read_exact(&mut buf)?;
	Ok(u16::from_be_bytes(buf))
}

/// Writes a big-endian `u16`.
pub fn write_u16(w: &mut (impl Write + ?Sized), value: u16) -> WriteResult {
	w.write_all(&value.to_be_bytes())?;
	Ok(())
}

/// Reads a big-endian `i32`.
pub fn read_i32(r: &mut (impl Read + ?Sized)) -> ReadResult<i32> {
	let mut buf = [0u8; 4];
	r.read_exact(&mut buf)?;
	Ok(i32::from_be_bytes(buf))
}

/// Writes a big-endian `i32`.
pub fn write_i32(w: &mut (impl Write + ?Sized), value: i32) -> WriteResult {
	w.write_all(&value.to_be_bytes())?;
	Ok(())
}

/// Reads a big-endian `u32`.
pub fn read_u32(r: &mut (impl Read + ?Sized)) -> ReadResult<u32> {
	let mut buf = [0u8; 4];
	r.read_exact(&mut buf)?;
	Ok(u32::from_be_bytes(buf))
}

/// Writes a big-endian `u32`.
pub fn write_u32(w: &mut (impl Write + ?Sized), value: u32) -> WriteResult {
	w.write_all(&value.to_be_bytes())?;
	Ok(())
}

/// Reads a big-endian `i64`, transmitted hi-word then lo-word (which is
/// simply big-endian for the full 8 bytes).
pub fn read_i64(r: &mut (impl Read + ?Sized)) -> ReadResult<i64> {
	let mut buf = [0u8; 8];
	r.read_exact(&mut buf)?;
	Ok(i64::from_be_bytes(buf))
}

/// Writes a big-endian `i64`.
pub fn write_i64(w: &mut (impl Write + ?Sized), value: i64) -> WriteResult {
	w.write_all(&value.to_be_bytes())?;
	Ok(())
}

/// Reads a big-endian `f32`, as the raw IEEE-754 bit pattern transmitted as
/// a `u32` of identical width.
pub fn read_f32(r: &mut (impl Read + ?Sized)) -> ReadResult<f32> {
	Ok(f32::from_bits(read_u32(r)?))
}

/// Writes a big-endian `f32`.
pub fn write_f32(w: &mut (impl Write + ?Sized), value: f32) -> WriteResult {
	write_u32(w, value.to_bits())
}

/// Reads a big-endian `f64`, as the raw IEEE-754 bit pattern transmitted as
/// a `u64` of identical width.
pub fn read_f64(r: &mut (impl Read + ?Sized)) -> ReadResult<f64> {
	let mut buf = [0u8; 8];
	r.read_exact(&mut buf)?;
	Ok(f64::from_bits(u64::from_be_bytes(buf)))
}

/// Writes a big-endian `f64`.
pub fn write_f64(w: &mut (impl Write + ?Sized), value: f64) -> WriteResult {
	w.write_all(&value.to_bits().to_be_bytes())?;
	Ok(())
}

/// Reads a length-prefixed UTF-8 string: a 4-byte non-negative length `N`,
/// then `N` bytes of UTF-8.
///
/// The length is read as a signed `i32` and rejected if negative, per the
/// wire codec's contract; the buffer for the string's bytes is always
/// heap-allocated (never a variable-length stack array), bounded by the
/// stated length.
pub fn read_string(r: &mut (impl Read + ?Sized)) -> ReadResult<String> {
	let len = read_i32(r)?;
	if len < 0 {
		return Err(WireError::NegativeStringLength(len));
	}

	let mut buf = vec![0u8; len as usize];
	r.read_exact(&mut buf)?;

	Ok(String::from_utf8(buf)?)
}

/// Writes a length-prefixed UTF-8 string.
pub fn write_string(w: &mut (impl Write + ?Sized), value: &str) -> WriteResult {
	let bytes = value.as_bytes();
	write_i32(w, bytes.len() as i32)?;
	w.write_all(bytes)?;

	Ok(())
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn test_i32_roundtrip() {
		let mut buf = Vec::new();
		write_i32(&mut buf, -12345).unwrap();
		assert_eq!(buf, [0xFF, 0xFF, 0xCF, 0xC7]);
		assert_eq!(read_i32(&mut &buf[..]).unwrap(), -12345);
	}

	#[test]
	fn test_f32_roundtrip_nan_bits() {
		let nan = f32::from_bits(0x7fc0_0001);
		let mut buf = Vec::new();
		write_f32(&mut buf, nan).unwrap();
		let back = read_f32(&mut &buf[..]).unwrap();
		assert_eq!(back.to_bits(), nan.to_bits());
	}

	#[test]
	fn test_string_roundtrip() {
		let mut buf = Vec::new();
		write_string(&mut buf, "héllo").unwrap();
		assert_eq!(read_string(&mut &buf[..]).unwrap(), "héllo");
	}

	#[test]
	fn test_negative_string_length_rejected() {
		let mut buf = Vec::new();
		write_i32(&mut buf, -1).unwrap();
		assert!(matches!(
			read_string(&mut &buf[..]),
			Err(WireError::NegativeStringLength(-1))
		));
	}
}
