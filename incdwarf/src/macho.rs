//! File-backed debug sections inside a Mach-O dSYM companion.
//!
//! The companion file carries nothing but the `__DWARF` segment, so unlike
//! the ELF case there is no other content to step around: sections live in
//! the segment in fixed order and a section that outgrows its slot moves to
//! the segment's end. Mach-O section headers store 32-bit file offsets,
//! which bounds how far a companion can grow.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};

use crate::container::{ideal_capacity, SectionId};

#[derive(Clone, Copy, Debug, Default)]
struct SectionSlot {
    offset: u32,
    size: u64,
    capacity: u64,
    dirty: bool,
}

/// Debug section slots within the `__DWARF` segment of a dSYM companion.
#[derive(Debug)]
pub struct MachOContainer {
    file: File,
    sections: [SectionSlot; 5],
    segment_end: u32,
}

impl MachOContainer {
    /// Takes over debug-section management for the companion `file`.
    ///
    /// `segment_fileoff` is where the `__DWARF` segment's payload starts.
    pub fn new(mut file: File, segment_fileoff: u32) -> std::io::Result<Self> {
        file.seek(SeekFrom::Start(u64::from(segment_fileoff)))?;
        Ok(Self {
            file,
            sections: [SectionSlot::default(); 5],
            segment_end: segment_fileoff,
        })
    }

    fn slot(&self, section: SectionId) -> &SectionSlot {
        &self.sections[section.index()]
    }

    pub(crate) fn grow_section(
        &mut self,
        section: SectionId,
        needed: u64,
        alignment: u64,
        allow_shrink: bool,
    ) -> std::io::Result<()> {
        let alignment = alignment.max(1) as u32;
        let slot = self.sections[section.index()];
        if needed <= slot.capacity {
            let shrink = needed < slot.size;
            if !shrink || allow_shrink {
                self.sections[section.index()].size = needed;
            }
            return Ok(());
        }

        let capacity = ideal_capacity(needed).next_multiple_of(u64::from(alignment));
        let offset = self.segment_end.next_multiple_of(alignment);
        tracing::trace!(
            section = section.macho_name(),
            old_offset = slot.offset,
            new_offset = offset,
            capacity,
            "moving section to end of segment"
        );
        if slot.size > 0 {
            let mut contents = vec![0u8; slot.size as usize];
            self.file.seek(SeekFrom::Start(u64::from(slot.offset)))?;
            self.file.read_exact(&mut contents)?;
            self.file.seek(SeekFrom::Start(u64::from(offset)))?;
            self.file.write_all(&contents)?;
        }
        self.sections[section.index()] = SectionSlot {
            offset,
            size: needed,
            capacity,
            dirty: slot.dirty,
        };
        self.segment_end = offset + capacity as u32;
        Ok(())
    }

    pub(crate) fn write_at(
        &mut self,
        section: SectionId,
        offset: u64,
        bytes: &[u8],
    ) -> std::io::Result<()> {
        let slot = *self.slot(section);
        debug_assert!(offset + bytes.len() as u64 <= slot.capacity);
        self.file
            .seek(SeekFrom::Start(u64::from(slot.offset) + offset))?;
        self.file.write_all(bytes)
    }

    pub(crate) fn read_at(
        &mut self,
        section: SectionId,
        offset: u64,
        buf: &mut [u8],
    ) -> std::io::Result<()> {
        let slot = *self.slot(section);
        self.file
            .seek(SeekFrom::Start(u64::from(slot.offset) + offset))?;
        self.file.read_exact(buf)
    }

    pub(crate) fn section_size(&self, section: SectionId) -> u64 {
        self.slot(section).size
    }

    pub(crate) fn mark_dirty(&mut self, section: SectionId) {
        self.sections[section.index()].dirty = true;
    }

    pub(crate) fn is_dirty(&self, section: SectionId) -> bool {
        self.slot(section).dirty
    }

    pub(crate) fn clear_dirty(&mut self, section: SectionId) {
        self.sections[section.index()].dirty = false;
    }

    /// File offset of a section's slot, for the load-command writer.
    pub fn section_offset(&self, section: SectionId) -> u32 {
        self.slot(section).offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slots_start_at_the_segment_offset() {
        let file = tempfile::tempfile().unwrap();
        let mut macho = MachOContainer::new(file, 0x1000).unwrap();
        macho
            .grow_section(SectionId::DebugAbbrev, 32, 1, false)
            .unwrap();
        assert!(macho.section_offset(SectionId::DebugAbbrev) >= 0x1000);
        macho.write_at(SectionId::DebugAbbrev, 0, &[1; 32]).unwrap();
        let mut buf = [0u8; 32];
        macho.read_at(SectionId::DebugAbbrev, 0, &mut buf).unwrap();
        assert_eq!(buf, [1; 32]);
    }
}
