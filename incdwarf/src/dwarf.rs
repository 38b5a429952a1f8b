//! The incremental DWARF emitter.
//!
//! A [`Dwarf`] lives as long as the compilation and owns all state that
//! spans declarations: the atom pools for `.debug_info` and `.debug_line`,
//! the string and file tables, the module-wide relocation queue, and the
//! container the bytes go through. The driver feeds it one declaration at a
//! time:
//!
//! ```text
//! let mut state = dwarf.init_decl_state(&pool, index, &decl);
//! // codegen: state.advance_pc_and_line(..), state.gen_arg_dbg_info(..), ...
//! dwarf.commit_decl_state(&mut pool, index, sym_addr, sym_size, state)?;
//! ```
//!
//! At the end of a compilation, [`Dwarf::write_dbg_abbrev`] must have been
//! called once, then [`Dwarf::flush_module`] resolves the deferred
//! cross-declaration references, and the header writers
//! ([`Dwarf::write_dbg_info_header`], [`Dwarf::write_dbg_line_header`],
//! [`Dwarf::write_dbg_aranges`], [`Dwarf::write_dbg_str`]) bring the fixed
//! section prologues up to date. The header writers are idempotent until
//! the next commit.

use gimli::constants::*;
use gimli::{Endianity, RunTimeEndian};
use indexmap::IndexSet;

use incdwarf_common::leb128;

use crate::abbrev::{self, AbbrevCode};
use crate::atom::{pad_to_ideal, AtomIndex, AtomPool, MIN_NOP_SIZE};
use crate::container::{push_nops, Container, SectionId};
use crate::decl::{line_field_offset, Decl, DeclIndex, DeclKind, DeclState};
use crate::error::{Error, ErrorKind};
use crate::expr::ExprlocReloc;
use crate::private::{push_addr, push_u16, push_u32};
use crate::strtab::StringTable;
use crate::ty::{PtrWidth, Ty, TypePool, ERROR_SET_SIZE};

/// Bytes reserved at the start of `.debug_info` for the compile unit
/// header; the first atom is placed at `pad_to_ideal` of this.
const DBG_INFO_HEADER_RESERVE: u32 = 120;

/// Standard opcode operand counts for `opcode_base = 13`.
const STD_OPCODE_LENGTHS: [u8; 12] = [0, 1, 1, 1, 1, 0, 0, 0, 1, 0, 0, 1];

/// Target description and module metadata the emitter needs up front.
#[derive(Clone, Debug)]
pub struct DwarfConfig {
    /// Byte order of the target.
    pub endian: RunTimeEndian,
    /// Pointer width of the target.
    pub ptr_width: PtrWidth,
    /// Module name for the compile unit DIE.
    pub module_name: String,
    /// Compilation directory for the compile unit DIE.
    pub comp_dir: String,
    /// Producer string for the compile unit DIE.
    pub producer: String,
}

/// A deferred 4-byte reference to the module-wide error set DIE.
#[derive(Clone, Copy, Debug)]
struct GlobalAbbrevReloc {
    /// The atom holding the slot.
    atom: AtomIndex,
    /// Byte offset of the slot within the atom.
    offset: u32,
    /// Added to the resolved DIE offset.
    addend: u32,
}

/// The long-lived emitter object.
#[derive(Debug)]
pub struct Dwarf {
    config: DwarfConfig,
    container: Container,
    strtab: StringTable,
    strtab_written: u32,
    di_atoms: AtomPool,
    src_fns: AtomPool,
    dirs: IndexSet<String>,
    files: IndexSet<(u32, String)>,
    line_header_dirty: bool,
    global_abbrev_relocs: Vec<GlobalAbbrevReloc>,
    pending_exprlocs: Vec<ExprlocReloc>,
    error_set_atom: Option<AtomIndex>,
}

impl Dwarf {
    /// Creates an emitter writing through `container`.
    pub fn new(container: Container, config: DwarfConfig) -> Self {
        Self {
            config,
            container,
            strtab: StringTable::new(),
            strtab_written: 0,
            di_atoms: AtomPool::new(),
            src_fns: AtomPool::new(),
            dirs: IndexSet::new(),
            files: IndexSet::new(),
            line_header_dirty: true,
            global_abbrev_relocs: Vec::new(),
            pending_exprlocs: Vec::new(),
            error_set_atom: None,
        }
    }

    /// The container this emitter writes through.
    pub fn container(&self) -> &Container {
        &self.container
    }

    /// Mutable access to the container, for the surrounding object writer.
    pub fn container_mut(&mut self) -> &mut Container {
        &mut self.container
    }

    /// Registers a source file and returns its 1-based file table index.
    ///
    /// The directory is resolved to its real path when possible; on failure
    /// the path is used as given. A new directory or file marks the
    /// `.debug_line` header dirty.
    pub fn add_source_file(&mut self, dir: &str, basename: &str) -> u32 {
        let resolved = std::fs::canonicalize(dir)
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_else(|_| dir.to_owned());
        let (dir_index, new_dir) = self.dirs.insert_full(resolved);
        let (file_index, new_file) = self
            .files
            .insert_full((dir_index as u32, basename.to_owned()));
        if new_dir || new_file {
            self.line_header_dirty = true;
            self.container.mark_dirty(SectionId::DebugLine);
        }
        file_index as u32 + 1
    }

    /// Begins a declaration update.
    ///
    /// For functions this pre-populates the line program fragment and the
    /// subprogram DIE; codegen then appends to the returned state.
    pub fn init_decl_state(
        &mut self,
        pool: &TypePool,
        index: DeclIndex,
        decl: &Decl,
    ) -> DeclState {
        let di_atom = self.di_atoms.get_or_create_for_decl(index);
        let src_fn = match decl.kind {
            DeclKind::Function { .. } => Some(self.src_fns.get_or_create_for_decl(index)),
            DeclKind::Global { .. } => None,
        };
        let file_index = self.add_source_file(&decl.dir, &decl.basename);
        DeclState::init(
            pool,
            index,
            decl,
            di_atom,
            src_fn,
            file_index,
            self.config.ptr_width,
            self.config.endian,
        )
    }

    /// Finishes a declaration update.
    ///
    /// Appends the DIEs of every type the declaration referenced, places
    /// (or re-places) the declaration's atoms, resolves the local
    /// relocations against the now-final offsets and writes the payloads
    /// through the container. References to error set types are deferred to
    /// [`Dwarf::flush_module`].
    pub fn commit_decl_state(
        &mut self,
        pool: &mut TypePool,
        index: DeclIndex,
        sym_addr: u64,
        sym_size: u32,
        mut state: DeclState,
    ) -> Result<(), Error> {
        if self.di_atoms.for_decl(index) != Some(state.di_atom()) {
            return Err(ErrorKind::UnknownDecl(index.0).into());
        }
        if state.is_function() {
            state.finish_line_program();
            state.patch_function_addrs(sym_addr, sym_size);
            state.close_children();
        }

        // Append one DIE per referenced type. Emitting a DIE can intern
        // further types, so this loops until the table stops growing.
        let mut i = 0;
        while i < state.abbrev_table.len() {
            state.abbrev_table[i].off = state.dbg_info.len() as u32;
            let is_error_set = matches!(pool.get(state.abbrev_table[i].ty), Ty::ErrorSet { .. });
            if !is_error_set {
                state.add_type_die(pool, i);
            }
            i += 1;
        }

        let di_atom = state.di_atom();
        let alloc = self
            .di_atoms
            .allocate(di_atom, state.dbg_info.len() as u32, DBG_INFO_HEADER_RESERVE);

        // Resolve the declaration's relocations against final offsets.
        let endian = self.config.endian;
        for reloc in &state.abbrev_relocs {
            let value = match reloc.target {
                None => self.di_atoms.off(reloc.atom) + reloc.offset + reloc.addend,
                Some(target) => {
                    let entry = state.abbrev_table[target as usize];
                    if matches!(pool.get(entry.ty), Ty::ErrorSet { .. }) {
                        self.global_abbrev_relocs.push(GlobalAbbrevReloc {
                            atom: reloc.atom,
                            offset: reloc.offset,
                            addend: reloc.addend,
                        });
                        continue;
                    }
                    self.di_atoms.off(entry.atom) + entry.off + reloc.addend
                }
            };
            endian.write_u32(
                &mut state.dbg_info[reloc.offset as usize..reloc.offset as usize + 4],
                value,
            );
        }

        self.write_di_atom(di_atom, &state.dbg_info, alloc.vacated)?;

        if let Some(src_fn) = state.src_fn() {
            let header_len = self.dbg_line_header_len();
            let alloc = self
                .src_fns
                .allocate(src_fn, state.dbg_line.len() as u32, header_len);
            self.write_src_fn_atom(src_fn, &state.dbg_line, alloc.vacated)?;
        }

        self.pending_exprlocs.append(&mut state.exprloc_relocs);
        Ok(())
    }

    /// Re-patches the line operand of a committed function's line program
    /// without touching anything else.
    ///
    /// `line` is the same value the init pass computed: declaration line
    /// plus opening-brace line.
    pub fn update_decl_line_number(&mut self, index: DeclIndex, line: u32) -> Result<(), Error> {
        let atom = self
            .src_fns
            .for_decl(index)
            .ok_or(ErrorKind::UnknownDecl(index.0))?;
        let mut fixed = [0u8; 4];
        leb128::write_unsigned_fixed(&mut fixed, u64::from(line));
        let offset = self.src_fns.off(atom) + line_field_offset(self.config.ptr_width);
        self.container
            .write(SectionId::DebugLine, u64::from(offset), &fixed)
    }

    /// Removes a deleted declaration's atoms and pads the vacated ranges.
    pub fn free_decl(&mut self, index: DeclIndex) -> Result<(), Error> {
        if let Some(freed) = self.di_atoms.free(index) {
            self.container.write_with_padding(
                SectionId::DebugInfo,
                u64::from(freed.off),
                0,
                &[],
                freed.len,
                false,
            )?;
            if freed.was_last {
                if let Some(last) = self.di_atoms.last() {
                    // re-terminate the compile unit's children
                    let end = self.di_atoms.off(last) + self.di_atoms.len(last);
                    self.container
                        .write(SectionId::DebugInfo, u64::from(end), &[0])?;
                }
            }
        }
        if let Some(freed) = self.src_fns.free(index) {
            self.container.write_with_padding(
                SectionId::DebugLine,
                u64::from(freed.off),
                0,
                &[],
                freed.len,
                false,
            )?;
        }
        Ok(())
    }

    /// Section offset of a committed declaration's `.debug_info` atom.
    pub fn decl_di_offset(&self, index: DeclIndex) -> Option<u32> {
        let atom = self.di_atoms.for_decl(index)?;
        self.di_atoms.is_linked(atom).then(|| self.di_atoms.off(atom))
    }

    /// Section offset of a committed function's `.debug_line` program.
    pub fn decl_line_program_offset(&self, index: DeclIndex) -> Option<u32> {
        let atom = self.src_fns.for_decl(index)?;
        self.src_fns.is_linked(atom).then(|| self.src_fns.off(atom))
    }

    /// Exprloc relocations recorded since the last call, for the linker to
    /// resolve during symbol resolution.
    pub fn take_exprloc_relocs(&mut self) -> Vec<ExprlocReloc> {
        std::mem::take(&mut self.pending_exprlocs)
    }

    /// Patches a pending exprloc slot with the resolved address of its
    /// symbol: the symbol's own address for a direct load, the address of
    /// its GOT entry for a GOT load.
    pub fn resolve_exprloc_reloc(
        &mut self,
        reloc: &ExprlocReloc,
        addr: u64,
    ) -> Result<(), Error> {
        let mut bytes = [0u8; 8];
        let width = usize::from(self.config.ptr_width.bytes());
        match self.config.ptr_width {
            PtrWidth::P32 => self.config.endian.write_u32(&mut bytes[..4], addr as u32),
            PtrWidth::P64 => self.config.endian.write_u64(&mut bytes[..8], addr),
        }
        let offset = self.di_atoms.off(reloc.atom) + reloc.offset;
        self.container
            .write(SectionId::DebugInfo, u64::from(offset), &bytes[..width])
    }

    /// Resolves every deferred cross-declaration reference.
    ///
    /// When any declaration referenced an error set type, this synthesizes
    /// the module-wide error enumeration DIE as one extra `.debug_info`
    /// atom and patches all deferred slots to its final offset.
    pub fn flush_module(&mut self, pool: &TypePool) -> Result<(), Error> {
        if self.global_abbrev_relocs.is_empty() {
            return Ok(());
        }

        let mut die = Vec::with_capacity(64);
        die.push(AbbrevCode::EnumType.raw());
        leb128::write_unsigned(&mut die, ERROR_SET_SIZE);
        die.extend_from_slice(b"anyerror\0");
        die.push(AbbrevCode::EnumVariant.raw());
        die.extend_from_slice(b"(no error)\0");
        crate::private::push_u64(&mut die, 0, self.config.endian);
        for name in pool.error_names() {
            die.push(AbbrevCode::EnumVariant.raw());
            die.extend_from_slice(name.as_bytes());
            die.push(0);
            crate::private::push_u64(&mut die, pool.error_value(name), self.config.endian);
        }
        die.push(0);

        let atom = match self.error_set_atom {
            Some(atom) => atom,
            None => {
                let atom = self.di_atoms.create();
                self.error_set_atom = Some(atom);
                atom
            }
        };
        let alloc = self
            .di_atoms
            .allocate(atom, die.len() as u32, DBG_INFO_HEADER_RESERVE);
        self.write_di_atom(atom, &die, alloc.vacated)?;

        let endian = self.config.endian;
        let target_off = self.di_atoms.off(atom);
        for reloc in std::mem::take(&mut self.global_abbrev_relocs) {
            if !self.di_atoms.is_linked(reloc.atom) {
                tracing::warn!(
                    atom = reloc.atom.0,
                    offset = reloc.offset,
                    "deferred relocation against a freed atom, leaving slot zero"
                );
                continue;
            }
            let mut bytes = [0u8; 4];
            endian.write_u32(&mut bytes, target_off + reloc.addend);
            let offset = self.di_atoms.off(reloc.atom) + reloc.offset;
            self.container
                .write(SectionId::DebugInfo, u64::from(offset), &bytes)?;
        }
        Ok(())
    }

    /// Writes the static abbreviation table at offset 0 of
    /// `.debug_abbrev`. Called once per module.
    pub fn write_dbg_abbrev(&mut self) -> Result<(), Error> {
        let bytes = abbrev::section_bytes();
        self.container
            .grow_section(SectionId::DebugAbbrev, bytes.len() as u64, 1, true)?;
        self.container.write(SectionId::DebugAbbrev, 0, &bytes)
    }

    fn dbg_info_header_len(&self) -> u32 {
        // unit length, version, abbrev offset, address size
        let unit_header = 4 + 2 + 4 + 1;
        // compile unit DIE: code, stmt list, low/high pc, three strps, language
        let ptr = u32::from(self.config.ptr_width.bytes());
        unit_header + 1 + 4 + 2 * ptr + 3 * 4 + 2
    }

    /// Rewrites the `.debug_info` compile unit header and the padding up to
    /// the first atom.
    ///
    /// `low_pc` and `high_pc` delimit the module's machine code range.
    pub fn write_dbg_info_header(&mut self, low_pc: u64, high_pc: u64) -> Result<(), Error> {
        let endian = self.config.endian;
        let ptr = self.config.ptr_width;
        let header_len = self.dbg_info_header_len();

        let end_off = match self.di_atoms.last() {
            Some(last) => self.di_atoms.off(last) + self.di_atoms.len(last) + 1,
            None => header_len + 1,
        };

        let name = self.strtab.intern(&self.config.module_name);
        let comp_dir = self.strtab.intern(&self.config.comp_dir);
        let producer = self.strtab.intern(&self.config.producer);

        let mut buf = Vec::with_capacity(pad_to_ideal(header_len) as usize + 1);
        push_u32(&mut buf, end_off - 4, endian); // unit length
        push_u16(&mut buf, 4, endian); // version
        push_u32(&mut buf, 0, endian); // abbrev table offset
        buf.push(ptr.bytes());

        buf.push(AbbrevCode::CompileUnit.raw());
        push_u32(&mut buf, 0, endian); // stmt list
        push_addr(&mut buf, low_pc, ptr, endian);
        push_addr(&mut buf, high_pc, ptr, endian);
        push_u32(&mut buf, name, endian);
        push_u32(&mut buf, comp_dir, endian);
        push_u32(&mut buf, producer, endian);
        push_u16(&mut buf, DW_LANG_C99.0, endian);
        debug_assert_eq!(buf.len() as u32, header_len);

        match self.di_atoms.first() {
            Some(first) => {
                let first_off = self.di_atoms.off(first);
                push_nops(SectionId::DebugInfo, &mut buf, first_off - header_len);
            }
            None => buf.push(0), // terminate the compile unit's children
        }

        self.container
            .grow_section(SectionId::DebugInfo, u64::from(end_off), 1, false)?;
        self.container.write(SectionId::DebugInfo, 0, &buf)
    }

    /// Rewrites the module's single `.debug_aranges` tuple.
    pub fn write_dbg_aranges(&mut self, addr: u64, size: u64) -> Result<(), Error> {
        let endian = self.config.endian;
        let ptr = self.config.ptr_width;
        let tuple_align = 2 * u32::from(ptr.bytes());

        let mut buf = Vec::with_capacity(64);
        push_u32(&mut buf, 0, endian); // unit length, patched below
        push_u16(&mut buf, 2, endian); // aranges version
        push_u32(&mut buf, 0, endian); // debug info offset
        buf.push(ptr.bytes());
        buf.push(0); // segment selector size
        while buf.len() % tuple_align as usize != 0 {
            buf.push(0);
        }
        push_addr(&mut buf, addr, ptr, endian);
        push_addr(&mut buf, size, ptr, endian);
        // terminating sentinel tuple
        push_addr(&mut buf, 0, ptr, endian);
        push_addr(&mut buf, 0, ptr, endian);
        let unit_length = buf.len() as u32 - 4;
        endian.write_u32(&mut buf[..4], unit_length);

        self.container.grow_section(
            SectionId::DebugAranges,
            buf.len() as u64,
            u64::from(tuple_align),
            true,
        )?;
        self.container.write(SectionId::DebugAranges, 0, &buf)
    }

    /// Rewrites `.debug_str` when the string table grew since the last
    /// write. Offsets are stable, so the section only ever gains bytes.
    pub fn write_dbg_str(&mut self) -> Result<(), Error> {
        if self.strtab.len() == self.strtab_written {
            return Ok(());
        }
        self.container
            .grow_section(SectionId::DebugStr, u64::from(self.strtab.len()), 1, false)?;
        self.container
            .write(SectionId::DebugStr, 0, self.strtab.bytes())?;
        self.strtab_written = self.strtab.len();
        Ok(())
    }

    fn dbg_line_header_len(&self) -> u32 {
        // unit length, version, header length, then the fixed parameters
        // and the standard opcode length table
        let mut len = 4 + 2 + 4 + 6 + STD_OPCODE_LENGTHS.len();
        for dir in &self.dirs {
            len += dir.len() + 1;
        }
        len += 1;
        for (dir_index, basename) in &self.files {
            len += basename.len() + 1;
            len += leb128::unsigned_len(u64::from(dir_index + 1));
            len += 2; // mtime and size
        }
        len += 1;
        len as u32
    }

    fn build_line_header(&self) -> Vec<u8> {
        let endian = self.config.endian;
        let mut buf = Vec::with_capacity(self.dbg_line_header_len() as usize);
        push_u32(&mut buf, 0, endian); // unit length, patched by the caller
        push_u16(&mut buf, 4, endian); // version
        push_u32(&mut buf, 0, endian); // header length, patched below
        buf.push(1); // minimum instruction length
        buf.push(1); // maximum operations per instruction
        buf.push(1); // default is_stmt
        buf.push(1); // line base
        buf.push(1); // line range
        buf.push(DW_LNS_set_isa.0 + 1); // opcode base
        buf.extend_from_slice(&STD_OPCODE_LENGTHS);
        for dir in &self.dirs {
            buf.extend_from_slice(dir.as_bytes());
            buf.push(0);
        }
        buf.push(0);
        for (dir_index, basename) in &self.files {
            buf.extend_from_slice(basename.as_bytes());
            buf.push(0);
            leb128::write_unsigned(&mut buf, u64::from(dir_index + 1));
            leb128::write_unsigned(&mut buf, 0); // mtime
            leb128::write_unsigned(&mut buf, 0); // size
        }
        buf.push(0);
        let header_length = buf.len() as u32 - 10;
        endian.write_u32(&mut buf[6..10], header_length);
        buf
    }

    /// Rewrites the `.debug_line` header, including the directory and file
    /// tables, and the padding up to the first line program.
    ///
    /// When the tables outgrew the space before the first atom, head atoms
    /// are relocated to the tail until the header fits.
    pub fn write_dbg_line_header(&mut self) -> Result<(), Error> {
        let endian = self.config.endian;
        let mut buf = self.build_line_header();
        let header_len = buf.len() as u32;

        // make room before the first atom if the tables grew past it
        while let Some(first) = self.src_fns.first() {
            if pad_to_ideal(header_len) <= self.src_fns.off(first) {
                break;
            }
            // a lone atom relocates to the fallback offset; keep it far
            // enough out that the vacated range can be padded
            let fallback = pad_to_ideal(header_len).max(self.src_fns.off(first) + MIN_NOP_SIZE);
            let moved = self
                .src_fns
                .relocate_first_to_tail(fallback)
                .expect("non-empty pool relocates");
            tracing::trace!(
                old_off = moved.old_off,
                new_off = moved.new_off,
                "line program moved out of the grown header's way"
            );
            let mut contents = vec![0u8; moved.len as usize];
            self.container
                .read(SectionId::DebugLine, u64::from(moved.old_off), &mut contents)?;
            self.container.grow_section(
                SectionId::DebugLine,
                u64::from(self.src_fns.end_off()),
                1,
                false,
            )?;
            let prev_pad = match self.src_fns.prev(moved.index) {
                Some(prev) => {
                    moved.new_off - (self.src_fns.off(prev) + self.src_fns.len(prev))
                }
                None => 0,
            };
            self.container.write_with_padding(
                SectionId::DebugLine,
                u64::from(moved.new_off),
                prev_pad,
                &contents,
                0,
                false,
            )?;
            // the new location may overlap the old range when the moved
            // atom was alone in the section
            let pad_len = moved.len.min(moved.new_off - moved.old_off);
            self.container.write_with_padding(
                SectionId::DebugLine,
                u64::from(moved.old_off),
                0,
                &[],
                pad_len,
                false,
            )?;
        }

        let end_off = match self.src_fns.last() {
            Some(last) => self.src_fns.off(last) + self.src_fns.len(last),
            None => header_len,
        };
        endian.write_u32(&mut buf[..4], end_off - 4);

        if let Some(first) = self.src_fns.first() {
            let first_off = self.src_fns.off(first);
            push_nops(SectionId::DebugLine, &mut buf, first_off - header_len);
        }

        self.container
            .grow_section(SectionId::DebugLine, u64::from(end_off), 1, false)?;
        self.container.write(SectionId::DebugLine, 0, &buf)?;
        self.line_header_dirty = false;
        Ok(())
    }

    /// Whether the `.debug_line` header must be rewritten before the
    /// container is emitted.
    pub fn line_header_dirty(&self) -> bool {
        self.line_header_dirty
    }

    fn write_di_atom(
        &mut self,
        atom: AtomIndex,
        payload: &[u8],
        vacated: Option<(u32, u32)>,
    ) -> Result<(), Error> {
        if let Some((off, len)) = vacated {
            self.container.write_with_padding(
                SectionId::DebugInfo,
                u64::from(off),
                0,
                &[],
                len,
                false,
            )?;
        }
        let off = self.di_atoms.off(atom);
        let is_last = self.di_atoms.last() == Some(atom);
        let prev_pad = match self.di_atoms.prev(atom) {
            Some(prev) => off - (self.di_atoms.off(prev) + self.di_atoms.len(prev)),
            None => 0,
        };
        let next_pad = match self.di_atoms.next(atom) {
            Some(next) => self.di_atoms.off(next) - (off + payload.len() as u32),
            None => 0,
        };
        self.container.grow_section(
            SectionId::DebugInfo,
            u64::from(self.di_atoms.end_off() + 1),
            1,
            false,
        )?;
        self.container.write_with_padding(
            SectionId::DebugInfo,
            u64::from(off),
            prev_pad,
            payload,
            next_pad,
            is_last,
        )
    }

    fn write_src_fn_atom(
        &mut self,
        atom: AtomIndex,
        payload: &[u8],
        vacated: Option<(u32, u32)>,
    ) -> Result<(), Error> {
        if let Some((off, len)) = vacated {
            self.container.write_with_padding(
                SectionId::DebugLine,
                u64::from(off),
                0,
                &[],
                len,
                false,
            )?;
        }
        let off = self.src_fns.off(atom);
        let prev_pad = match self.src_fns.prev(atom) {
            Some(prev) => off - (self.src_fns.off(prev) + self.src_fns.len(prev)),
            None => 0,
        };
        let next_pad = match self.src_fns.next(atom) {
            Some(next) => self.src_fns.off(next) - (off + payload.len() as u32),
            None => 0,
        };
        self.container.grow_section(
            SectionId::DebugLine,
            u64::from(self.src_fns.end_off()),
            1,
            false,
        )?;
        self.container.write_with_padding(
            SectionId::DebugLine,
            u64::from(off),
            prev_pad,
            payload,
            next_pad,
            false,
        )
    }
}
