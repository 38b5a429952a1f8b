//! DWARF location expression (`DW_FORM_exprloc`) emission.
//!
//! Codegen describes where a parameter or variable lives with a
//! [`Location`]; this module lowers it to expression bytes. Locations that
//! name a linker symbol leave a zeroed address slot behind and queue an
//! [`ExprlocReloc`], which the linker patches once the symbol's address is
//! known.

use gimli::constants::*;
use gimli::RunTimeEndian;

use incdwarf_common::leb128;

use crate::atom::AtomIndex;
use crate::private::push_addr;
use crate::ty::PtrWidth;

/// Sub-opcode of `DW_OP_WASM_location` selecting a function local.
const WASM_LOCAL: u8 = 0x00;

/// Fill byte for values without a known bit pattern.
const UNDEF_FILL: u8 = 0xaa;

/// Where a value lives at runtime, as reported by codegen.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Location {
    /// In a machine register.
    Register(u16),
    /// At an offset from a frame base register.
    FrameOffset {
        /// The frame base register.
        reg: u16,
        /// Byte offset relative to it.
        offset: i64,
    },
    /// In a WebAssembly function local.
    WasmLocal(u32),
    /// At a known memory address belonging to a linker symbol.
    Memory {
        /// The address as currently known.
        addr: u64,
        /// Whether the slot holds a pointer to the value.
        is_ptr: bool,
        /// Linker symbol index for late re-patching.
        sym: u32,
    },
    /// At an address only the linker knows; GOT-indirect for pointers.
    LinkerLoad {
        /// Whether the slot holds a pointer to the value.
        is_ptr: bool,
        /// Linker symbol index.
        sym: u32,
    },
    /// A signed compile-time constant.
    ImmediateSigned(i64),
    /// An unsigned compile-time constant.
    ImmediateUnsigned(u64),
    /// The value is known to be uninitialized.
    Undef,
    /// No location is available.
    None,
    /// Explicitly empty expression.
    Nop,
}

/// How the linker resolves a pending exprloc address slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExprlocRelocKind {
    /// Write the symbol's address.
    DirectLoad,
    /// Write the address of the symbol's GOT entry.
    GotLoad,
}

/// A pointer-sized slot inside a `DW_FORM_exprloc` payload awaiting the
/// address of a linker symbol.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExprlocReloc {
    /// Resolution mode.
    pub kind: ExprlocRelocKind,
    /// The `.debug_info` atom holding the slot.
    pub atom: AtomIndex,
    /// Byte offset of the slot within the atom.
    pub offset: u32,
    /// The linker symbol to resolve against.
    pub sym: u32,
}

/// Appends a complete exprloc (ULEB length prefix plus expression bytes)
/// for `loc` to `buf`.
///
/// `ty_size` is the byte size of the described value, used by
/// [`Location::Undef`]. Relocations are recorded against `atom` with
/// offsets relative to the start of `buf`.
pub fn emit_exprloc(
    buf: &mut Vec<u8>,
    relocs: &mut Vec<ExprlocReloc>,
    atom: AtomIndex,
    ptr: PtrWidth,
    endian: RunTimeEndian,
    loc: Location,
    ty_size: u64,
) {
    let mut expr: Vec<u8> = Vec::with_capacity(16);
    // offset within `expr` of a pending address slot, if any
    let mut reloc: Option<(ExprlocRelocKind, usize, u32)> = None;

    match loc {
        Location::Register(reg) => {
            if reg < 32 {
                expr.push(DW_OP_reg0.0 + reg as u8);
            } else {
                expr.push(DW_OP_regx.0);
                leb128::write_unsigned(&mut expr, u64::from(reg));
            }
        }
        Location::FrameOffset { reg, offset } => {
            if reg < 32 {
                expr.push(DW_OP_breg0.0 + reg as u8);
            } else {
                expr.push(DW_OP_bregx.0);
                leb128::write_unsigned(&mut expr, u64::from(reg));
            }
            leb128::write_signed(&mut expr, offset);
        }
        Location::WasmLocal(index) => {
            expr.push(DW_OP_WASM_location.0);
            expr.push(WASM_LOCAL);
            leb128::write_unsigned(&mut expr, u64::from(index));
        }
        Location::Memory { addr, is_ptr, sym } => {
            expr.push(DW_OP_addr.0);
            reloc = Some((ExprlocRelocKind::DirectLoad, expr.len(), sym));
            push_addr(&mut expr, addr, ptr, endian);
            if is_ptr {
                expr.push(DW_OP_deref.0);
            }
        }
        Location::LinkerLoad { is_ptr, sym } => {
            expr.push(DW_OP_addr.0);
            let kind = if is_ptr {
                ExprlocRelocKind::GotLoad
            } else {
                ExprlocRelocKind::DirectLoad
            };
            reloc = Some((kind, expr.len(), sym));
            push_addr(&mut expr, 0, ptr, endian);
            if is_ptr {
                expr.push(DW_OP_deref.0);
            }
        }
        Location::ImmediateSigned(value) => {
            expr.push(DW_OP_consts.0);
            leb128::write_signed(&mut expr, value);
            expr.push(DW_OP_stack_value.0);
        }
        Location::ImmediateUnsigned(value) => {
            expr.push(DW_OP_constu.0);
            leb128::write_unsigned(&mut expr, value);
            expr.push(DW_OP_stack_value.0);
        }
        Location::Undef => {
            expr.push(DW_OP_implicit_value.0);
            leb128::write_unsigned(&mut expr, ty_size);
            expr.extend(std::iter::repeat(UNDEF_FILL).take(ty_size as usize));
        }
        Location::None => {
            expr.push(DW_OP_lit0.0);
            expr.push(DW_OP_stack_value.0);
        }
        Location::Nop => {
            expr.push(DW_OP_nop.0);
        }
    }

    let prefix_len = leb128::unsigned_len(expr.len() as u64);
    if let Some((kind, offset, sym)) = reloc {
        relocs.push(ExprlocReloc {
            kind,
            atom,
            offset: (buf.len() + prefix_len + offset) as u32,
            sym,
        });
    }
    leb128::write_unsigned(buf, expr.len() as u64);
    buf.extend_from_slice(&expr);
}
