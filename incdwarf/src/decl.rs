//! Per-declaration emission state.
//!
//! A [`DeclState`] lives for exactly one init/commit round. Between the two
//! calls, codegen appends line-program steps and parameter/variable DIEs to
//! the state's scratch buffers; every reference to a type lands in the
//! declaration's abbrev table exactly once and leaves a 4-byte relocation
//! behind. The commit resolves those relocations once the owning atom's
//! section offset is known.

use std::collections::HashMap;

use gimli::constants::*;
use gimli::RunTimeEndian;

use incdwarf_common::leb128;

use crate::abbrev::AbbrevCode;
use crate::atom::AtomIndex;
use crate::expr::{emit_exprloc, ExprlocReloc, Location};
use crate::private::{patch_addr, patch_u32, push_u64};
use crate::ty::{PtrWidth, Ty, TypeId, TypePool};

/// Driver-assigned identifier of a declaration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeclIndex(pub u32);

/// What kind of machine artifact a declaration produces.
#[derive(Clone, Copy, Debug)]
pub enum DeclKind {
    /// A function with machine code and a line program.
    Function {
        /// Return type.
        return_ty: TypeId,
        /// Line of the opening brace relative to the declaration.
        lbrace_line: u32,
        /// Line of the closing brace relative to the declaration.
        rbrace_line: u32,
    },
    /// A global with a runtime value but no code.
    Global {
        /// The global's type.
        ty: TypeId,
    },
}

/// One declaration update as reported by the frontend.
#[derive(Clone, Debug)]
pub struct Decl {
    /// Fully qualified name.
    pub name: String,
    /// Absolute directory of the declaring source file.
    pub dir: String,
    /// Basename of the declaring source file.
    pub basename: String,
    /// Zero-based declaration line within the file.
    pub src_line: u32,
    /// Function or global.
    pub kind: DeclKind,
}

/// Byte offset of the `set_address` operand inside a function's line
/// program fragment.
pub const DBG_LINE_VADDR_RELOC_INDEX: u32 = 3;

/// Byte offset of the low-pc slot inside a subprogram DIE.
pub const DBG_INFO_LOW_PC_RELOC_INDEX: u32 = 1;

/// Byte offset of the fixed-width line operand inside a function's line
/// program fragment.
pub(crate) fn line_field_offset(ptr: PtrWidth) -> u32 {
    DBG_LINE_VADDR_RELOC_INDEX + u32::from(ptr.bytes()) + 1
}

/// One distinct type referenced by a declaration.
#[derive(Clone, Copy, Debug)]
pub(crate) struct AbbrevEntry {
    /// The referenced type.
    pub ty: TypeId,
    /// The atom its DIE is emitted into.
    pub atom: AtomIndex,
    /// Offset of the DIE within the atom, assigned during commit.
    pub off: u32,
}

/// A 4-byte slot awaiting a DIE offset.
#[derive(Clone, Copy, Debug)]
pub(crate) struct AbbrevReloc {
    /// Index into the abbrev table, or `None` for a self-relative
    /// reference within the same atom.
    pub target: Option<u32>,
    /// The atom holding the slot.
    pub atom: AtomIndex,
    /// Byte offset of the slot within the atom.
    pub offset: u32,
    /// Added to the resolved target offset.
    pub addend: u32,
}

/// Scratch state accumulated between `init_decl_state` and
/// `commit_decl_state`.
#[derive(Debug)]
pub struct DeclState {
    decl: DeclIndex,
    di_atom: AtomIndex,
    src_fn: Option<AtomIndex>,
    is_function: bool,
    ptr: PtrWidth,
    endian: RunTimeEndian,
    pub(crate) dbg_line: Vec<u8>,
    pub(crate) dbg_info: Vec<u8>,
    pub(crate) abbrev_table: Vec<AbbrevEntry>,
    abbrev_resolver: HashMap<TypeId, u32>,
    pub(crate) abbrev_relocs: Vec<AbbrevReloc>,
    pub(crate) exprloc_relocs: Vec<ExprlocReloc>,
}

impl DeclState {
    pub(crate) fn init(
        pool: &TypePool,
        decl_index: DeclIndex,
        decl: &Decl,
        di_atom: AtomIndex,
        src_fn: Option<AtomIndex>,
        file_index: u32,
        ptr: PtrWidth,
        endian: RunTimeEndian,
    ) -> Self {
        let mut state = Self {
            decl: decl_index,
            di_atom,
            src_fn,
            is_function: false,
            ptr,
            endian,
            dbg_line: Vec::new(),
            dbg_info: Vec::new(),
            abbrev_table: Vec::new(),
            abbrev_resolver: HashMap::new(),
            abbrev_relocs: Vec::new(),
            exprloc_relocs: Vec::new(),
        };
        if let DeclKind::Function {
            return_ty,
            lbrace_line,
            ..
        } = decl.kind
        {
            state.is_function = true;
            state.init_function_line_program(decl.src_line + lbrace_line, file_index);
            state.init_subprogram_die(pool, return_ty, &decl.name);
        }
        state
    }

    fn init_function_line_program(&mut self, line: u32, file_index: u32) {
        let ptr_bytes = usize::from(self.ptr.bytes());
        self.dbg_line.reserve(26);
        self.dbg_line.push(0); // extended opcode
        self.dbg_line.push(self.ptr.bytes() + 1);
        self.dbg_line.push(DW_LNE_set_address.0);
        debug_assert_eq!(self.dbg_line.len(), DBG_LINE_VADDR_RELOC_INDEX as usize);
        self.dbg_line.extend(std::iter::repeat(0).take(ptr_bytes));

        self.dbg_line.push(DW_LNS_advance_line.0);
        debug_assert_eq!(self.dbg_line.len(), line_field_offset(self.ptr) as usize);
        let mut fixed = [0u8; 4];
        leb128::write_unsigned_fixed(&mut fixed, u64::from(line));
        self.dbg_line.extend_from_slice(&fixed);

        self.dbg_line.push(DW_LNS_set_file.0);
        leb128::write_unsigned_fixed(&mut fixed, u64::from(file_index));
        self.dbg_line.extend_from_slice(&fixed);

        self.dbg_line.push(DW_LNS_copy.0);
    }

    fn init_subprogram_die(&mut self, pool: &TypePool, return_ty: TypeId, name: &str) {
        let ret_void = matches!(pool.get(return_ty), Ty::Void);
        self.dbg_info.push(if ret_void {
            AbbrevCode::SubprogramRetVoid.raw()
        } else {
            AbbrevCode::Subprogram.raw()
        });
        debug_assert_eq!(self.dbg_info.len(), DBG_INFO_LOW_PC_RELOC_INDEX as usize);
        let ptr_bytes = usize::from(self.ptr.bytes());
        self.dbg_info.extend(std::iter::repeat(0).take(ptr_bytes)); // low pc
        self.dbg_info.extend_from_slice(&[0; 4]); // high pc
        if !ret_void {
            self.push_type_ref(return_ty);
        }
        self.push_str(name);
    }

    /// The declaration this state belongs to.
    pub fn decl(&self) -> DeclIndex {
        self.decl
    }

    /// The `.debug_info` atom of this declaration.
    pub fn di_atom(&self) -> AtomIndex {
        self.di_atom
    }

    /// The `.debug_line` atom, present for functions only.
    pub fn src_fn(&self) -> Option<AtomIndex> {
        self.src_fn
    }

    pub(crate) fn is_function(&self) -> bool {
        self.is_function
    }

    fn push_str(&mut self, s: &str) {
        self.dbg_info.extend_from_slice(s.as_bytes());
        self.dbg_info.push(0);
    }

    fn intern_type(&mut self, ty: TypeId) -> u32 {
        if let Some(&index) = self.abbrev_resolver.get(&ty) {
            return index;
        }
        let index = self.abbrev_table.len() as u32;
        self.abbrev_table.push(AbbrevEntry {
            ty,
            atom: self.di_atom,
            off: 0,
        });
        self.abbrev_resolver.insert(ty, index);
        index
    }

    fn push_type_ref(&mut self, ty: TypeId) {
        let offset = self.dbg_info.len() as u32;
        self.dbg_info.extend_from_slice(&[0; 4]);
        let target = self.intern_type(ty);
        self.abbrev_relocs.push(AbbrevReloc {
            target: Some(target),
            atom: self.di_atom,
            offset,
            addend: 0,
        });
    }

    // Line program steps, called by codegen as machine code is produced.

    /// Advances the line register by `line_delta` and the address register
    /// by `pc_delta`, then emits a row.
    pub fn advance_pc_and_line(&mut self, line_delta: i64, pc_delta: u64) {
        self.dbg_line.push(DW_LNS_advance_line.0);
        leb128::write_signed(&mut self.dbg_line, line_delta);
        self.dbg_line.push(DW_LNS_advance_pc.0);
        leb128::write_unsigned(&mut self.dbg_line, pc_delta);
        self.dbg_line.push(DW_LNS_copy.0);
    }

    /// Marks the end of the function prologue on the next row.
    pub fn set_prologue_end(&mut self) {
        self.dbg_line.push(DW_LNS_set_prologue_end.0);
    }

    /// Marks the begin of the function epilogue on the next row.
    pub fn set_epilogue_begin(&mut self) {
        self.dbg_line.push(DW_LNS_set_epilogue_begin.0);
    }

    pub(crate) fn finish_line_program(&mut self) {
        self.dbg_line.push(0); // extended opcode
        self.dbg_line.push(1);
        self.dbg_line.push(DW_LNE_end_sequence.0);
    }

    pub(crate) fn patch_function_addrs(&mut self, sym_addr: u64, sym_size: u32) {
        patch_addr(
            &mut self.dbg_line,
            DBG_LINE_VADDR_RELOC_INDEX as usize,
            sym_addr,
            self.ptr,
            self.endian,
        );
        patch_addr(
            &mut self.dbg_info,
            DBG_INFO_LOW_PC_RELOC_INDEX as usize,
            sym_addr,
            self.ptr,
            self.endian,
        );
        let high_pc = DBG_INFO_LOW_PC_RELOC_INDEX as usize + usize::from(self.ptr.bytes());
        patch_u32(&mut self.dbg_info, high_pc, sym_size, self.endian);
    }

    pub(crate) fn close_children(&mut self) {
        self.dbg_info.push(0);
    }

    // DIE emission, called by codegen.

    /// Emits a formal parameter DIE as a child of the subprogram.
    pub fn gen_arg_dbg_info(&mut self, pool: &TypePool, name: &str, ty: TypeId, loc: Location) {
        self.dbg_info.push(AbbrevCode::Parameter.raw());
        self.emit_loc(pool, ty, loc);
        self.push_type_ref(ty);
        self.push_str(name);
    }

    /// Emits a variable DIE: a local when the state belongs to a function,
    /// the value of the declaration itself for a global.
    pub fn gen_var_dbg_info(&mut self, pool: &TypePool, name: &str, ty: TypeId, loc: Location) {
        self.dbg_info.push(AbbrevCode::Variable.raw());
        self.emit_loc(pool, ty, loc);
        self.push_type_ref(ty);
        self.push_str(name);
    }

    fn emit_loc(&mut self, pool: &TypePool, ty: TypeId, loc: Location) {
        emit_exprloc(
            &mut self.dbg_info,
            &mut self.exprloc_relocs,
            self.di_atom,
            self.ptr,
            self.endian,
            loc,
            pool.abi_size(ty),
        );
    }

    /// Appends the DIE for abbrev table entry `entry_index`.
    ///
    /// Child type references are interned into the same table, so the table
    /// may grow while this runs; the commit loop iterates until it drains.
    pub(crate) fn add_type_die(&mut self, pool: &mut TypePool, entry_index: usize) {
        let entry = self.abbrev_table[entry_index];
        let ty_id = entry.ty;
        let ty = pool.get(ty_id).clone();
        match ty {
            Ty::Never => unreachable!("noreturn cannot be described as a value type"),
            Ty::Void => {
                self.dbg_info.push(AbbrevCode::Pad1.raw());
            }
            Ty::Bool => {
                self.dbg_info.push(AbbrevCode::BaseType.raw());
                self.dbg_info.push(DW_ATE_boolean.0);
                leb128::write_unsigned(&mut self.dbg_info, 1);
                self.push_str("bool");
            }
            Ty::Int { signed, .. } => {
                self.dbg_info.push(AbbrevCode::BaseType.raw());
                self.dbg_info.push(if signed {
                    DW_ATE_signed.0
                } else {
                    DW_ATE_unsigned.0
                });
                leb128::write_unsigned(&mut self.dbg_info, pool.abi_size(ty_id));
                self.push_str(&pool.type_name(ty_id));
            }
            Ty::Usize => {
                self.dbg_info.push(AbbrevCode::BaseType.raw());
                self.dbg_info.push(DW_ATE_unsigned.0);
                leb128::write_unsigned(&mut self.dbg_info, pool.abi_size(ty_id));
                self.push_str("usize");
            }
            Ty::Isize => {
                self.dbg_info.push(AbbrevCode::BaseType.raw());
                self.dbg_info.push(DW_ATE_signed.0);
                leb128::write_unsigned(&mut self.dbg_info, pool.abi_size(ty_id));
                self.push_str("isize");
            }
            Ty::Pointer { child } => {
                self.dbg_info.push(AbbrevCode::PtrType.raw());
                self.push_type_ref(child);
            }
            Ty::Slice { .. } => {
                let ptr_bytes = u64::from(self.ptr.bytes());
                let ptr_ty = pool.slice_ptr_type(ty_id);
                self.dbg_info.push(AbbrevCode::StructType.raw());
                leb128::write_unsigned(&mut self.dbg_info, pool.abi_size(ty_id));
                self.push_str(&pool.type_name(ty_id));

                self.dbg_info.push(AbbrevCode::StructMember.raw());
                self.push_str("ptr");
                self.push_type_ref(ptr_ty);
                leb128::write_unsigned(&mut self.dbg_info, 0);

                self.dbg_info.push(AbbrevCode::StructMember.raw());
                self.push_str("len");
                self.push_type_ref(pool.usize_type());
                leb128::write_unsigned(&mut self.dbg_info, ptr_bytes);

                self.dbg_info.push(0);
            }
            Ty::Array { len, elem } => {
                self.dbg_info.push(AbbrevCode::ArrayType.raw());
                self.push_str(&pool.type_name(ty_id));
                self.push_type_ref(elem);

                self.dbg_info.push(AbbrevCode::ArrayDim.raw());
                self.push_type_ref(pool.usize_type());
                leb128::write_unsigned(&mut self.dbg_info, len);

                self.dbg_info.push(0);
            }
            Ty::Optional { child } => {
                if pool.is_ptr_like_optional(ty_id) {
                    self.dbg_info.push(AbbrevCode::BaseType.raw());
                    self.dbg_info.push(DW_ATE_address.0);
                    leb128::write_unsigned(&mut self.dbg_info, pool.abi_size(ty_id));
                    self.push_str(&pool.type_name(ty_id));
                } else {
                    let size = pool.abi_size(ty_id);
                    let payload_size = pool.abi_size(child);
                    self.dbg_info.push(AbbrevCode::StructType.raw());
                    leb128::write_unsigned(&mut self.dbg_info, size);
                    self.push_str(&pool.type_name(ty_id));

                    self.dbg_info.push(AbbrevCode::StructMember.raw());
                    self.push_str("maybe");
                    self.push_type_ref(pool.bool_type());
                    leb128::write_unsigned(&mut self.dbg_info, 0);

                    self.dbg_info.push(AbbrevCode::StructMember.raw());
                    self.push_str("val");
                    self.push_type_ref(child);
                    leb128::write_unsigned(&mut self.dbg_info, size - payload_size);

                    self.dbg_info.push(0);
                }
            }
            Ty::Struct { ref name, ref fields } => {
                self.dbg_info.push(AbbrevCode::StructType.raw());
                leb128::write_unsigned(&mut self.dbg_info, pool.abi_size(ty_id));
                self.push_str(name);
                for (i, field) in fields.iter().enumerate() {
                    if !pool.has_runtime_bits(field.ty) {
                        continue;
                    }
                    self.dbg_info.push(AbbrevCode::StructMember.raw());
                    self.push_str(&field.name);
                    self.push_type_ref(field.ty);
                    leb128::write_unsigned(
                        &mut self.dbg_info,
                        pool.struct_field_offset(ty_id, i),
                    );
                }
                self.dbg_info.push(0);
            }
            Ty::Tuple { ref fields } => {
                self.dbg_info.push(AbbrevCode::StructType.raw());
                leb128::write_unsigned(&mut self.dbg_info, pool.abi_size(ty_id));
                self.push_str(&pool.type_name(ty_id));
                for (i, &field) in fields.iter().enumerate() {
                    if !pool.has_runtime_bits(field) {
                        continue;
                    }
                    self.dbg_info.push(AbbrevCode::StructMember.raw());
                    self.push_str(&i.to_string());
                    self.push_type_ref(field);
                    leb128::write_unsigned(
                        &mut self.dbg_info,
                        pool.struct_field_offset(ty_id, i),
                    );
                }
                self.dbg_info.push(0);
            }
            Ty::Enum { ref name, ref variants } => {
                self.dbg_info.push(AbbrevCode::EnumType.raw());
                leb128::write_unsigned(&mut self.dbg_info, pool.abi_size(ty_id));
                self.push_str(name);
                for (i, variant) in variants.iter().enumerate() {
                    self.dbg_info.push(AbbrevCode::EnumVariant.raw());
                    self.push_str(&variant.name);
                    let value = variant.value.unwrap_or(i as u64);
                    push_u64(&mut self.dbg_info, value, self.endian);
                }
                self.dbg_info.push(0);
            }
            Ty::Union {
                ref name,
                tag,
                ref fields,
            } => {
                let layout = pool.union_layout(ty_id);
                if let Some(tag_ty) = tag.filter(|_| layout.tag_size > 0) {
                    // outer wrapper struct around payload and tag
                    self.dbg_info.push(AbbrevCode::StructType.raw());
                    leb128::write_unsigned(&mut self.dbg_info, layout.abi_size);
                    self.push_str(name);

                    self.dbg_info.push(AbbrevCode::StructMember.raw());
                    self.push_str("payload");
                    let payload_slot = self.dbg_info.len() as u32;
                    self.dbg_info.extend_from_slice(&[0; 4]);
                    leb128::write_unsigned(&mut self.dbg_info, layout.payload_offset);

                    self.dbg_info.push(AbbrevCode::StructMember.raw());
                    self.push_str("tag");
                    self.push_type_ref(tag_ty);
                    leb128::write_unsigned(&mut self.dbg_info, layout.tag_offset);

                    self.dbg_info.push(0);

                    let union_off = self.dbg_info.len() as u32;
                    self.abbrev_relocs.push(AbbrevReloc {
                        target: None,
                        atom: entry.atom,
                        offset: payload_slot,
                        addend: union_off - payload_slot,
                    });
                    self.emit_union_die(pool, "AnonUnion", layout.payload_size, fields);
                } else {
                    self.emit_union_die(pool, name, layout.payload_size, fields);
                }
            }
            Ty::ErrorSet { .. } => {
                // emitted once per module during flush
                unreachable!("error set DIEs are deferred to the module flush")
            }
            Ty::ErrorUnion { error_set, payload } => {
                let layout = pool.error_union_layout(ty_id);
                self.dbg_info.push(AbbrevCode::StructType.raw());
                leb128::write_unsigned(&mut self.dbg_info, layout.abi_size);
                self.push_str(&pool.type_name(ty_id));

                self.dbg_info.push(AbbrevCode::StructMember.raw());
                self.push_str("value");
                self.push_type_ref(payload);
                leb128::write_unsigned(&mut self.dbg_info, layout.value_offset);

                self.dbg_info.push(AbbrevCode::StructMember.raw());
                self.push_str("err");
                self.push_type_ref(error_set);
                leb128::write_unsigned(&mut self.dbg_info, layout.error_offset);

                self.dbg_info.push(0);
            }
            Ty::PackedStruct { ref name, size } => {
                // TODO: describe the fields once a bit-offset scheme exists
                tracing::debug!(name, "packed struct emitted without members");
                self.dbg_info.push(AbbrevCode::StructType.raw());
                leb128::write_unsigned(&mut self.dbg_info, size);
                self.push_str(name);
                self.dbg_info.push(0);
            }
            Ty::Opaque { ref name } => {
                tracing::debug!(name, "type cannot be described yet, emitting placeholder");
                self.dbg_info.push(AbbrevCode::Pad1.raw());
            }
        }
    }

    fn emit_union_die(
        &mut self,
        pool: &TypePool,
        name: &str,
        payload_size: u64,
        fields: &[crate::ty::Field],
    ) {
        self.dbg_info.push(AbbrevCode::UnionType.raw());
        leb128::write_unsigned(&mut self.dbg_info, payload_size);
        self.push_str(name);
        for field in fields {
            if !pool.has_runtime_bits(field.ty) {
                continue;
            }
            self.dbg_info.push(AbbrevCode::StructMember.raw());
            self.push_str(&field.name);
            self.push_type_ref(field.ty);
            leb128::write_unsigned(&mut self.dbg_info, 0);
        }
        self.dbg_info.push(0);
    }
}
