//! An incremental DWARF-4 debug information emitter.
//!
//! Given a stream of per-declaration updates from a compiler frontend, the
//! [`Dwarf`] emitter produces, and continually patches, the `.debug_info`,
//! `.debug_abbrev`, `.debug_line`, `.debug_aranges` and `.debug_str`
//! sections embedded in an ELF object, a Mach-O dSYM companion, or a
//! WebAssembly module. Each declaration owns one or two relocatable
//! [atoms](atom::AtomPool) inside those sections, so editing a single
//! function re-writes a few hundred bytes in place instead of forcing a
//! full relink.
//!
//! The crate deliberately stops at the section payloads: it never opens
//! files on its own, does not write container headers, and leaves symbol
//! resolution to the linker, which drains
//! [`Dwarf::take_exprloc_relocs`] after each commit round.

#![warn(missing_docs)]

pub mod abbrev;
pub mod atom;
pub mod container;
pub mod decl;
pub mod dwarf;
pub mod elf;
pub mod error;
pub mod expr;
pub mod macho;
pub mod strtab;
pub mod ty;
pub mod wasm;

mod private;

pub use crate::abbrev::AbbrevCode;
pub use crate::container::{Container, SectionId};
pub use crate::decl::{Decl, DeclIndex, DeclKind, DeclState};
pub use crate::dwarf::{Dwarf, DwarfConfig};
pub use crate::elf::ElfContainer;
pub use crate::error::{Error, ErrorKind};
pub use crate::expr::{ExprlocReloc, ExprlocRelocKind, Location};
pub use crate::macho::MachOContainer;
pub use crate::strtab::StringTable;
pub use crate::ty::{PtrWidth, Ty, TypeId, TypePool};
pub use crate::wasm::WasmContainer;
