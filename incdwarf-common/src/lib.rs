//! Common byte-level encoders for `incdwarf`.
//!
//! This crate exposes the LEB128 encoding primitives that every DWARF
//! section writer in `incdwarf` is built on:
//!
//!  - [`leb128::write_unsigned`] / [`leb128::write_signed`]: variable-length
//!    encodings appended to a byte buffer.
//!  - [`leb128::write_unsigned_fixed`]: a padded encoding that always
//!    occupies a caller-chosen number of bytes, so a value can be patched
//!    in place after the surrounding bytes have been laid out.
//!
//! This crate is part of the `incdwarf` workspace.

#![warn(missing_docs)]

pub mod leb128;
