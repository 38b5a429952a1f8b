//! The container facade the emitter writes sections through.
//!
//! Exactly three container kinds exist and all are known at build time, so
//! the facade is a plain enum rather than a trait object. It hides where a
//! section's bytes physically live (a window of an ELF file, of a Mach-O
//! dSYM companion, or an in-memory WebAssembly custom-section buffer) and
//! owns the one invariant shared by all of them: any write rewrites the
//! padding on both sides of the payload in the same call, so the section is
//! valid DWARF after every single write.

use gimli::constants::*;

use crate::abbrev::AbbrevCode;
use crate::elf::ElfContainer;
use crate::error::Error;
use crate::macho::MachOContainer;
use crate::wasm::WasmContainer;

/// The debug sections the emitter maintains.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SectionId {
    /// `.debug_info`
    DebugInfo,
    /// `.debug_abbrev`
    DebugAbbrev,
    /// `.debug_line`
    DebugLine,
    /// `.debug_aranges`
    DebugAranges,
    /// `.debug_str`
    DebugStr,
}

impl SectionId {
    /// All maintained sections.
    pub const ALL: [SectionId; 5] = [
        SectionId::DebugInfo,
        SectionId::DebugAbbrev,
        SectionId::DebugLine,
        SectionId::DebugAranges,
        SectionId::DebugStr,
    ];

    pub(crate) fn index(self) -> usize {
        match self {
            SectionId::DebugInfo => 0,
            SectionId::DebugAbbrev => 1,
            SectionId::DebugLine => 2,
            SectionId::DebugAranges => 3,
            SectionId::DebugStr => 4,
        }
    }

    /// Section name in ELF and Wasm spelling.
    pub fn name(self) -> &'static str {
        match self {
            SectionId::DebugInfo => ".debug_info",
            SectionId::DebugAbbrev => ".debug_abbrev",
            SectionId::DebugLine => ".debug_line",
            SectionId::DebugAranges => ".debug_aranges",
            SectionId::DebugStr => ".debug_str",
        }
    }

    /// Section name in Mach-O spelling.
    pub fn macho_name(self) -> &'static str {
        match self {
            SectionId::DebugInfo => "__debug_info",
            SectionId::DebugAbbrev => "__debug_abbrev",
            SectionId::DebugLine => "__debug_line",
            SectionId::DebugAranges => "__debug_aranges",
            SectionId::DebugStr => "__debug_str",
        }
    }
}

/// Over-allocation policy for section capacities, matching the atom policy.
pub(crate) fn ideal_capacity(size: u64) -> u64 {
    size + size / 3
}

/// Appends `len` padding bytes appropriate for `section` to `buf`.
///
/// `.debug_info` pads with one-byte placeholder DIEs. `.debug_line` pads
/// with pairs of `DW_LNS_negate_stmt` (two of them cancel out); an odd
/// count is made even by a three-byte `advance_pc 0` whose operand is a
/// padded ULEB128.
pub(crate) fn push_nops(section: SectionId, buf: &mut Vec<u8>, len: u32) {
    let mut len = len as usize;
    match section {
        SectionId::DebugLine => {
            debug_assert_ne!(len, 1, "cannot pad .debug_line with a single byte");
            if len % 2 == 1 && len >= 3 {
                buf.extend_from_slice(&[DW_LNS_advance_pc.0, 0x80, 0x00]);
                len -= 3;
            }
            buf.extend(std::iter::repeat(DW_LNS_negate_stmt.0).take(len));
        }
        SectionId::DebugInfo => {
            buf.extend(std::iter::repeat(AbbrevCode::Pad1.raw()).take(len));
        }
        _ => buf.extend(std::iter::repeat(0u8).take(len)),
    }
}

/// The tagged union over the three container backends.
#[derive(Debug)]
pub enum Container {
    /// File-backed ELF object.
    Elf(ElfContainer),
    /// File-backed Mach-O dSYM companion.
    MachO(MachOContainer),
    /// Memory-backed WebAssembly custom sections.
    Wasm(WasmContainer),
}

impl Container {
    /// Ensures `section` can hold `needed` bytes, relocating and
    /// re-aligning it within the container when it must grow.
    pub fn grow_section(
        &mut self,
        section: SectionId,
        needed: u64,
        alignment: u64,
        allow_shrink: bool,
    ) -> Result<(), Error> {
        match self {
            Container::Elf(elf) => elf.grow_section(section, needed, alignment, allow_shrink)?,
            Container::MachO(macho) => {
                macho.grow_section(section, needed, alignment, allow_shrink)?
            }
            Container::Wasm(wasm) => wasm.grow_section(section, needed, allow_shrink),
        }
        Ok(())
    }

    /// Writes `payload` at `offset` together with `prev_pad` padding bytes
    /// before it and `next_pad` after it, in one call.
    ///
    /// With `trailing_zero` an extra zero byte follows the padding; the
    /// tail atom of `.debug_info` uses it to terminate the compile unit's
    /// children.
    pub fn write_with_padding(
        &mut self,
        section: SectionId,
        offset: u64,
        prev_pad: u32,
        payload: &[u8],
        next_pad: u32,
        trailing_zero: bool,
    ) -> Result<(), Error> {
        let mut buf =
            Vec::with_capacity(prev_pad as usize + payload.len() + next_pad as usize + 1);
        push_nops(section, &mut buf, prev_pad);
        buf.extend_from_slice(payload);
        push_nops(section, &mut buf, next_pad);
        if trailing_zero {
            buf.push(0);
        }
        self.write(section, offset - u64::from(prev_pad), &buf)
    }

    /// Writes raw bytes at a section offset.
    pub fn write(&mut self, section: SectionId, offset: u64, bytes: &[u8]) -> Result<(), Error> {
        match self {
            Container::Elf(elf) => elf.write_at(section, offset, bytes)?,
            Container::MachO(macho) => macho.write_at(section, offset, bytes)?,
            Container::Wasm(wasm) => wasm.write_at(section, offset, bytes),
        }
        self.mark_dirty(section);
        Ok(())
    }

    /// Reads raw bytes from a section offset.
    pub fn read(
        &mut self,
        section: SectionId,
        offset: u64,
        buf: &mut [u8],
    ) -> Result<(), Error> {
        match self {
            Container::Elf(elf) => elf.read_at(section, offset, buf)?,
            Container::MachO(macho) => macho.read_at(section, offset, buf)?,
            Container::Wasm(wasm) => wasm.read_at(section, offset, buf),
        }
        Ok(())
    }

    /// Reads a whole section.
    pub fn read_section(&mut self, section: SectionId) -> Result<Vec<u8>, Error> {
        let size = self.section_size(section);
        let mut buf = vec![0u8; size as usize];
        self.read(section, 0, &mut buf)?;
        Ok(buf)
    }

    /// Current logical size of a section.
    pub fn section_size(&self, section: SectionId) -> u64 {
        match self {
            Container::Elf(elf) => elf.section_size(section),
            Container::MachO(macho) => macho.section_size(section),
            Container::Wasm(wasm) => wasm.section_size(section),
        }
    }

    /// Flags a section as modified since the container was last emitted.
    pub fn mark_dirty(&mut self, section: SectionId) {
        match self {
            Container::Elf(elf) => elf.mark_dirty(section),
            Container::MachO(macho) => macho.mark_dirty(section),
            Container::Wasm(wasm) => wasm.mark_dirty(section),
        }
    }

    /// Whether a section was modified since the last [`Container::clear_dirty`].
    pub fn is_dirty(&self, section: SectionId) -> bool {
        match self {
            Container::Elf(elf) => elf.is_dirty(section),
            Container::MachO(macho) => macho.is_dirty(section),
            Container::Wasm(wasm) => wasm.is_dirty(section),
        }
    }

    /// Clears a section's dirty flag, typically after the surrounding
    /// object file was rewritten.
    pub fn clear_dirty(&mut self, section: SectionId) {
        match self {
            Container::Elf(elf) => elf.clear_dirty(section),
            Container::MachO(macho) => macho.clear_dirty(section),
            Container::Wasm(wasm) => wasm.clear_dirty(section),
        }
    }
}
