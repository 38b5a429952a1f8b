//! Helpers for writing target-endian integers into byte buffers.

use gimli::{Endianity, RunTimeEndian};

use crate::ty::PtrWidth;

pub(crate) fn push_u16(buf: &mut Vec<u8>, value: u16, endian: RunTimeEndian) {
    let mut bytes = [0u8; 2];
    endian.write_u16(&mut bytes, value);
    buf.extend_from_slice(&bytes);
}

pub(crate) fn push_u32(buf: &mut Vec<u8>, value: u32, endian: RunTimeEndian) {
    let mut bytes = [0u8; 4];
    endian.write_u32(&mut bytes, value);
    buf.extend_from_slice(&bytes);
}

pub(crate) fn push_u64(buf: &mut Vec<u8>, value: u64, endian: RunTimeEndian) {
    let mut bytes = [0u8; 8];
    endian.write_u64(&mut bytes, value);
    buf.extend_from_slice(&bytes);
}

pub(crate) fn push_addr(buf: &mut Vec<u8>, value: u64, ptr: PtrWidth, endian: RunTimeEndian) {
    match ptr {
        PtrWidth::P32 => push_u32(buf, value as u32, endian),
        PtrWidth::P64 => push_u64(buf, value, endian),
    }
}

pub(crate) fn patch_u32(buf: &mut [u8], offset: usize, value: u32, endian: RunTimeEndian) {
    endian.write_u32(&mut buf[offset..offset + 4], value);
}

pub(crate) fn patch_addr(
    buf: &mut [u8],
    offset: usize,
    value: u64,
    ptr: PtrWidth,
    endian: RunTimeEndian,
) {
    match ptr {
        PtrWidth::P32 => endian.write_u32(&mut buf[offset..offset + 4], value as u32),
        PtrWidth::P64 => endian.write_u64(&mut buf[offset..offset + 8], value),
    }
}
