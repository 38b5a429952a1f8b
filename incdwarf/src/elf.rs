//! File-backed debug sections inside an ELF object.
//!
//! Debug sections are non-allocated: they occupy file space but are never
//! mapped at runtime, so a section that outgrows its window is simply moved
//! to the end of the file and its old window abandoned. Section windows are
//! over-allocated by a third so that most growth happens in place.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};

use crate::container::{ideal_capacity, SectionId};

#[derive(Clone, Copy, Debug, Default)]
struct SectionWindow {
    sh_offset: u64,
    size: u64,
    capacity: u64,
    dirty: bool,
}

/// Debug section windows within an ELF output file.
#[derive(Debug)]
pub struct ElfContainer {
    file: File,
    sections: [SectionWindow; 5],
    file_end: u64,
}

impl ElfContainer {
    /// Takes over debug-section management for `file`, appending windows
    /// after its current end.
    pub fn new(mut file: File) -> std::io::Result<Self> {
        let file_end = file.seek(SeekFrom::End(0))?;
        Ok(Self {
            file,
            sections: [SectionWindow::default(); 5],
            file_end,
        })
    }

    fn window(&self, section: SectionId) -> &SectionWindow {
        &self.sections[section.index()]
    }

    pub(crate) fn grow_section(
        &mut self,
        section: SectionId,
        needed: u64,
        alignment: u64,
        allow_shrink: bool,
    ) -> std::io::Result<()> {
        let alignment = alignment.max(1);
        let window = self.sections[section.index()];
        if needed <= window.capacity {
            let shrink = needed < window.size;
            if !shrink || allow_shrink {
                self.sections[section.index()].size = needed;
            }
            return Ok(());
        }

        let capacity = ideal_capacity(needed).next_multiple_of(alignment);
        let sh_offset = self.file_end.next_multiple_of(alignment);
        tracing::trace!(
            section = section.name(),
            old_offset = window.sh_offset,
            new_offset = sh_offset,
            capacity,
            "moving section to end of file"
        );
        if window.size > 0 {
            let mut contents = vec![0u8; window.size as usize];
            self.file.seek(SeekFrom::Start(window.sh_offset))?;
            self.file.read_exact(&mut contents)?;
            self.file.seek(SeekFrom::Start(sh_offset))?;
            self.file.write_all(&contents)?;
        }
        self.sections[section.index()] = SectionWindow {
            sh_offset,
            size: needed,
            capacity,
            dirty: window.dirty,
        };
        self.file_end = sh_offset + capacity;
        Ok(())
    }

    pub(crate) fn write_at(
        &mut self,
        section: SectionId,
        offset: u64,
        bytes: &[u8],
    ) -> std::io::Result<()> {
        let window = *self.window(section);
        debug_assert!(offset + bytes.len() as u64 <= window.capacity);
        self.file.seek(SeekFrom::Start(window.sh_offset + offset))?;
        self.file.write_all(bytes)
    }

    pub(crate) fn read_at(
        &mut self,
        section: SectionId,
        offset: u64,
        buf: &mut [u8],
    ) -> std::io::Result<()> {
        let window = *self.window(section);
        self.file.seek(SeekFrom::Start(window.sh_offset + offset))?;
        self.file.read_exact(buf)
    }

    pub(crate) fn section_size(&self, section: SectionId) -> u64 {
        self.window(section).size
    }

    pub(crate) fn mark_dirty(&mut self, section: SectionId) {
        self.sections[section.index()].dirty = true;
    }

    pub(crate) fn is_dirty(&self, section: SectionId) -> bool {
        self.window(section).dirty
    }

    pub(crate) fn clear_dirty(&mut self, section: SectionId) {
        self.sections[section.index()].dirty = false;
    }

    /// File offset of a section's window, for the object writer that
    /// patches the section header table.
    pub fn section_offset(&self, section: SectionId) -> u64 {
        self.window(section).sh_offset
    }
}
