use gimli::constants::*;
use gimli::read::{AttributeValue, DebugAbbrev, DebugInfo, DebugLine, DebugStr};
use gimli::{DebugLineOffset, LittleEndian, RunTimeEndian};
use similar_asserts::assert_eq;

use incdwarf::ty::{EnumVariant, Field};
use incdwarf::{
    abbrev, AbbrevCode, Container, Decl, DeclIndex, DeclKind, Dwarf, DwarfConfig, ElfContainer,
    ExprlocRelocKind, Location, MachOContainer, PtrWidth, SectionId, Ty, TypePool, WasmContainer,
};

const DIR: &str = "/nonexistent/demo";
const BASENAME: &str = "main.zg";

fn config(ptr_width: PtrWidth) -> DwarfConfig {
    DwarfConfig {
        endian: RunTimeEndian::Little,
        ptr_width,
        module_name: "demo".into(),
        comp_dir: DIR.into(),
        producer: "zc 0.11.0".into(),
    }
}

fn wasm_dwarf(ptr_width: PtrWidth) -> Dwarf {
    Dwarf::new(Container::Wasm(WasmContainer::new()), config(ptr_width))
}

fn fn_decl(name: &str, src_line: u32, return_ty: incdwarf::TypeId) -> Decl {
    Decl {
        name: name.into(),
        dir: DIR.into(),
        basename: BASENAME.into(),
        src_line,
        kind: DeclKind::Function {
            return_ty,
            lbrace_line: 0,
            rbrace_line: 2,
        },
    }
}

fn global_decl(name: &str, ty: incdwarf::TypeId) -> Decl {
    Decl {
        name: name.into(),
        dir: DIR.into(),
        basename: BASENAME.into(),
        src_line: 1,
        kind: DeclKind::Global { ty },
    }
}

fn read(dwarf: &mut Dwarf, section: SectionId) -> Vec<u8> {
    dwarf.container_mut().read_section(section).unwrap()
}

/// The end-of-compilation sequence: resolve deferred references, then bring
/// the fixed section prologues up to date.
fn finish(dwarf: &mut Dwarf, pool: &TypePool, low_pc: u64, high_pc: u64) {
    dwarf.flush_module(pool).unwrap();
    dwarf.write_dbg_info_header(low_pc, high_pc).unwrap();
    dwarf.write_dbg_aranges(low_pc, high_pc - low_pc).unwrap();
    dwarf.write_dbg_line_header().unwrap();
    dwarf.write_dbg_str().unwrap();
}

/// One parsed DIE with the attributes the assertions below care about.
#[derive(Debug)]
struct ParsedDie {
    depth: isize,
    offset: usize,
    tag: DwTag,
    name: Option<Vec<u8>>,
    type_ref: Option<usize>,
    byte_size: Option<u64>,
    member_loc: Option<u64>,
    const_value: Option<u64>,
    low_pc: Option<u64>,
    high_pc: Option<u64>,
}

/// Feeds the emitted sections to a conformant DWARF reader.
fn parse_info(info: &[u8], abbrev: &[u8], strings: &[u8]) -> Vec<ParsedDie> {
    let debug_info = DebugInfo::new(info, LittleEndian);
    let debug_abbrev = DebugAbbrev::new(abbrev, LittleEndian);
    let debug_str = DebugStr::new(strings, LittleEndian);

    let mut units = debug_info.units();
    let unit = units.next().unwrap().expect("one compile unit");
    assert!(units.next().unwrap().is_none(), "exactly one compile unit");
    assert_eq!(unit.version(), 4);

    let abbrevs = unit.abbreviations(&debug_abbrev).unwrap();
    let mut entries = unit.entries(&abbrevs);
    let mut parsed = Vec::new();
    let mut depth = 0isize;
    while let Some((delta, entry)) = entries.next_dfs().unwrap() {
        depth += delta;
        let name = match entry.attr_value(DW_AT_name).unwrap() {
            Some(AttributeValue::String(s)) => Some(s.slice().to_vec()),
            Some(AttributeValue::DebugStrRef(offset)) => {
                Some(debug_str.get_str(offset).unwrap().slice().to_vec())
            }
            _ => None,
        };
        let type_ref = match entry.attr_value(DW_AT_type).unwrap() {
            Some(AttributeValue::UnitRef(offset)) => Some(offset.0),
            _ => None,
        };
        let low_pc = match entry.attr_value(DW_AT_low_pc).unwrap() {
            Some(AttributeValue::Addr(addr)) => Some(addr),
            _ => None,
        };
        parsed.push(ParsedDie {
            depth,
            offset: entry.offset().0,
            tag: entry.tag(),
            name,
            type_ref,
            byte_size: entry
                .attr_value(DW_AT_byte_size)
                .unwrap()
                .and_then(|v| v.udata_value()),
            member_loc: entry
                .attr_value(DW_AT_data_member_location)
                .unwrap()
                .and_then(|v| v.udata_value()),
            const_value: entry
                .attr_value(DW_AT_const_value)
                .unwrap()
                .and_then(|v| v.udata_value()),
            low_pc,
            high_pc: entry
                .attr_value(DW_AT_high_pc)
                .unwrap()
                .and_then(|v| v.udata_value()),
        });
    }
    parsed
}

fn parse_sections(dwarf: &mut Dwarf) -> Vec<ParsedDie> {
    let info = read(dwarf, SectionId::DebugInfo);
    let abbrev = read(dwarf, SectionId::DebugAbbrev);
    let strings = read(dwarf, SectionId::DebugStr);
    parse_info(&info, &abbrev, &strings)
}

fn find<'a>(dies: &'a [ParsedDie], tag: DwTag) -> &'a ParsedDie {
    dies.iter().find(|d| d.tag == tag).expect("tag present")
}

fn at_offset<'a>(dies: &'a [ParsedDie], offset: usize) -> &'a ParsedDie {
    dies.iter()
        .find(|d| d.offset == offset)
        .expect("referenced DIE exists")
}

#[test]
fn empty_module_has_the_static_abbrev_table_and_a_bare_compile_unit() {
    let pool = TypePool::new(PtrWidth::P64);
    let mut dwarf = wasm_dwarf(PtrWidth::P64);
    dwarf.write_dbg_abbrev().unwrap();
    finish(&mut dwarf, &pool, 0, 0);

    assert_eq!(read(&mut dwarf, SectionId::DebugAbbrev), abbrev::section_bytes());

    // the unit ends right after the compile unit DIE and one zero byte
    let info = read(&mut dwarf, SectionId::DebugInfo);
    let unit_length = u32::from_le_bytes(info[..4].try_into().unwrap());
    assert_eq!(unit_length as usize, info.len() - 4);
    assert_eq!(*info.last().unwrap(), 0);

    let dies = parse_sections(&mut dwarf);
    assert_eq!(dies.len(), 1);
    assert_eq!(dies[0].tag, DW_TAG_compile_unit);
    assert_eq!(dies[0].name.as_deref(), Some(b"demo".as_slice()));
}

#[test]
fn a_trivial_function_emits_subprogram_and_line_program() {
    let mut pool = TypePool::new(PtrWidth::P32);
    let mut dwarf = wasm_dwarf(PtrWidth::P32);
    dwarf.write_dbg_abbrev().unwrap();

    let decl = fn_decl("f", 10, pool.void());
    let state = dwarf.init_decl_state(&pool, DeclIndex(0), &decl);
    dwarf
        .commit_decl_state(&mut pool, DeclIndex(0), 0x1000, 16, state)
        .unwrap();
    finish(&mut dwarf, &pool, 0x1000, 0x1010);

    // subprogram DIE: retvoid abbrev, low pc, high pc delta, name
    let info = read(&mut dwarf, SectionId::DebugInfo);
    let off = dwarf.decl_di_offset(DeclIndex(0)).unwrap() as usize;
    assert_eq!(info[off], AbbrevCode::SubprogramRetVoid.raw());
    assert_eq!(&info[off + 1..off + 5], &0x1000u32.to_le_bytes());
    assert_eq!(&info[off + 5..off + 9], &16u32.to_le_bytes());
    assert_eq!(&info[off + 9..off + 11], b"f\0");

    // line program: set_address, advance_line, set_file, copy
    let line = read(&mut dwarf, SectionId::DebugLine);
    let off = dwarf.decl_line_program_offset(DeclIndex(0)).unwrap() as usize;
    assert_eq!(&line[off..off + 3], &[0, 5, DW_LNE_set_address.0]);
    assert_eq!(&line[off + 3..off + 7], &0x1000u32.to_le_bytes());
    assert_eq!(line[off + 7], DW_LNS_advance_line.0);
    assert_eq!(&line[off + 8..off + 12], &[0x8a, 0x80, 0x80, 0x00]); // 10
    assert_eq!(line[off + 12], DW_LNS_set_file.0);
    assert_eq!(&line[off + 13..off + 17], &[0x81, 0x80, 0x80, 0x00]); // file 1
    assert_eq!(line[off + 17], DW_LNS_copy.0);
    // closed during commit
    assert_eq!(&line[off + 18..off + 21], &[0, 1, DW_LNE_end_sequence.0]);

    let dies = parse_sections(&mut dwarf);
    let sub = find(&dies, DW_TAG_subprogram);
    assert_eq!(sub.low_pc, Some(0x1000));
    assert_eq!(sub.high_pc, Some(16));
    assert_eq!(sub.name.as_deref(), Some(b"f".as_slice()));
}

#[test]
fn return_types_are_interned_and_emitted_after_the_children_terminator() {
    let mut pool = TypePool::new(PtrWidth::P64);
    let mut dwarf = wasm_dwarf(PtrWidth::P64);
    dwarf.write_dbg_abbrev().unwrap();

    let bool_ty = pool.bool_type();
    let decl = fn_decl("isEven", 4, bool_ty);
    let state = dwarf.init_decl_state(&pool, DeclIndex(0), &decl);
    dwarf
        .commit_decl_state(&mut pool, DeclIndex(0), 0x2000, 32, state)
        .unwrap();
    finish(&mut dwarf, &pool, 0x2000, 0x2020);

    let dies = parse_sections(&mut dwarf);
    let sub = find(&dies, DW_TAG_subprogram);
    let ty = at_offset(&dies, sub.type_ref.expect("subprogram has a type"));
    assert_eq!(ty.tag, DW_TAG_base_type);
    assert_eq!(ty.name.as_deref(), Some(b"bool".as_slice()));
    assert_eq!(ty.byte_size, Some(1));
    // the type DIE is a sibling of the subprogram, inside the same atom
    assert_eq!(ty.depth, sub.depth);
    let atom_off = dwarf.decl_di_offset(DeclIndex(0)).unwrap() as usize;
    let atom_len = {
        let info = read(&mut dwarf, SectionId::DebugInfo);
        info.len() - atom_off // tail atom plus the trailing zero
    };
    assert!(ty.offset > atom_off && ty.offset < atom_off + atom_len);
}

#[test]
fn outgrowing_a_slot_moves_the_atom_and_pads_the_vacated_range() {
    let mut pool = TypePool::new(PtrWidth::P64);
    let mut dwarf = wasm_dwarf(PtrWidth::P64);
    dwarf.write_dbg_abbrev().unwrap();

    for (i, name) in ["f", "g", "h"].iter().enumerate() {
        let decl = fn_decl(name, 1, pool.void());
        let state = dwarf.init_decl_state(&pool, DeclIndex(i as u32), &decl);
        dwarf
            .commit_decl_state(&mut pool, DeclIndex(i as u32), 0x1000 + i as u64 * 0x20, 16, state)
            .unwrap();
    }
    let f_off = dwarf.decl_di_offset(DeclIndex(0)).unwrap();
    let g_old = dwarf.decl_di_offset(DeclIndex(1)).unwrap() as usize;
    let h_off = dwarf.decl_di_offset(DeclIndex(2)).unwrap();
    let g_old_len = (h_off as usize - g_old) - {
        // everything between the payload end and the successor is padding;
        // recover the payload length from the section bytes
        let info = read(&mut dwarf, SectionId::DebugInfo);
        info[g_old..h_off as usize]
            .iter()
            .rev()
            .take_while(|&&b| b == AbbrevCode::Pad1.raw())
            .count()
    };

    // recommit g with enough new children that it cannot fit in place
    let u64_ty = pool.intern(Ty::Int {
        signed: false,
        bits: 64,
    });
    let decl = fn_decl("g", 1, pool.void());
    let mut state = dwarf.init_decl_state(&pool, DeclIndex(1), &decl);
    for name in ["a", "b", "c", "d"] {
        state.gen_arg_dbg_info(&pool, name, u64_ty, Location::Register(0));
    }
    dwarf
        .commit_decl_state(&mut pool, DeclIndex(1), 0x1020, 64, state)
        .unwrap();
    finish(&mut dwarf, &pool, 0x1000, 0x1100);

    // unchanged neighbours kept their offsets, g went to the tail
    assert_eq!(dwarf.decl_di_offset(DeclIndex(0)), Some(f_off));
    assert_eq!(dwarf.decl_di_offset(DeclIndex(2)), Some(h_off));
    let g_new = dwarf.decl_di_offset(DeclIndex(1)).unwrap();
    assert!(g_new > h_off);

    // the vacated range is all padding now
    let info = read(&mut dwarf, SectionId::DebugInfo);
    assert!(info[g_old..g_old + g_old_len]
        .iter()
        .all(|&b| b == AbbrevCode::Pad1.raw()));

    // and the whole section still parses, with g's four parameters
    let dies = parse_sections(&mut dwarf);
    let params: Vec<_> = dies
        .iter()
        .filter(|d| d.tag == DW_TAG_formal_parameter)
        .collect();
    assert_eq!(params.len(), 4);
}

#[test]
fn error_set_references_resolve_to_one_module_wide_enum() {
    let mut pool = TypePool::new(PtrWidth::P64);
    let mut dwarf = wasm_dwarf(PtrWidth::P64);
    dwarf.write_dbg_abbrev().unwrap();

    let set = pool.intern(Ty::ErrorSet {
        name: "anyerror".into(),
        names: vec!["OutOfMemory".into(), "AccessDenied".into()],
    });
    for (i, name) in ["a", "b"].iter().enumerate() {
        let decl = global_decl(name, set);
        let mut state = dwarf.init_decl_state(&pool, DeclIndex(i as u32), &decl);
        state.gen_var_dbg_info(
            &pool,
            name,
            set,
            Location::LinkerLoad {
                is_ptr: false,
                sym: i as u32,
            },
        );
        dwarf
            .commit_decl_state(&mut pool, DeclIndex(i as u32), 0, 0, state)
            .unwrap();
    }
    finish(&mut dwarf, &pool, 0, 0);

    let dies = parse_sections(&mut dwarf);
    let variables: Vec<_> = dies.iter().filter(|d| d.tag == DW_TAG_variable).collect();
    assert_eq!(variables.len(), 2);
    let target = variables[0].type_ref.expect("patched type reference");
    assert_eq!(variables[1].type_ref, Some(target));

    let enum_die = at_offset(&dies, target);
    assert_eq!(enum_die.tag, DW_TAG_enumeration_type);
    assert_eq!(enum_die.name.as_deref(), Some(b"anyerror".as_slice()));
    assert_eq!(enum_die.byte_size, Some(2));

    let enumerators: Vec<_> = dies
        .iter()
        .filter(|d| d.tag == DW_TAG_enumerator)
        .map(|d| {
            (
                String::from_utf8(d.name.clone().unwrap()).unwrap(),
                d.const_value.unwrap(),
            )
        })
        .collect();
    assert_eq!(
        enumerators,
        [
            ("(no error)".to_string(), 0),
            ("OutOfMemory".to_string(), 1),
            ("AccessDenied".to_string(), 2),
        ]
    );
}

#[test]
fn slice_parameters_describe_ptr_and_len_members() {
    let mut pool = TypePool::new(PtrWidth::P64);
    let mut dwarf = wasm_dwarf(PtrWidth::P64);
    dwarf.write_dbg_abbrev().unwrap();

    let u32_ty = pool.intern(Ty::Int {
        signed: false,
        bits: 32,
    });
    let slice = pool.intern(Ty::Slice { child: u32_ty });
    let decl = fn_decl("sum", 3, pool.void());
    let mut state = dwarf.init_decl_state(&pool, DeclIndex(0), &decl);
    state.gen_arg_dbg_info(&pool, "xs", slice, Location::Register(5));
    dwarf
        .commit_decl_state(&mut pool, DeclIndex(0), 0x1000, 64, state)
        .unwrap();
    finish(&mut dwarf, &pool, 0x1000, 0x1040);

    let dies = parse_sections(&mut dwarf);
    let param = find(&dies, DW_TAG_formal_parameter);
    let slice_die = at_offset(&dies, param.type_ref.unwrap());
    assert_eq!(slice_die.tag, DW_TAG_structure_type);
    assert_eq!(slice_die.name.as_deref(), Some(b"[]u32".as_slice()));
    assert_eq!(slice_die.byte_size, Some(16));

    let members: Vec<_> = dies
        .iter()
        .filter(|d| d.tag == DW_TAG_member && d.depth == slice_die.depth + 1)
        .collect();
    assert_eq!(members.len(), 2);
    assert_eq!(members[0].name.as_deref(), Some(b"ptr".as_slice()));
    assert_eq!(members[0].member_loc, Some(0));
    assert_eq!(members[1].name.as_deref(), Some(b"len".as_slice()));
    assert_eq!(members[1].member_loc, Some(8));

    let ptr_die = at_offset(&dies, members[0].type_ref.unwrap());
    assert_eq!(ptr_die.tag, DW_TAG_pointer_type);
    let elem = at_offset(&dies, ptr_die.type_ref.unwrap());
    assert_eq!(elem.tag, DW_TAG_base_type);
    assert_eq!(elem.name.as_deref(), Some(b"u32".as_slice()));

    let len_die = at_offset(&dies, members[1].type_ref.unwrap());
    assert_eq!(len_die.name.as_deref(), Some(b"usize".as_slice()));
}

#[test]
fn recommitting_identical_input_yields_identical_sections() {
    let mut pool = TypePool::new(PtrWidth::P64);
    let mut dwarf = wasm_dwarf(PtrWidth::P64);
    dwarf.write_dbg_abbrev().unwrap();

    let commit = |dwarf: &mut Dwarf, pool: &mut TypePool| {
        let decl = fn_decl("f", 7, pool.void());
        let mut state = dwarf.init_decl_state(pool, DeclIndex(0), &decl);
        state.advance_pc_and_line(1, 8);
        dwarf
            .commit_decl_state(pool, DeclIndex(0), 0x1000, 24, state)
            .unwrap();
        finish(dwarf, pool, 0x1000, 0x1018);
    };

    commit(&mut dwarf, &mut pool);
    let info = read(&mut dwarf, SectionId::DebugInfo);
    let line = read(&mut dwarf, SectionId::DebugLine);

    commit(&mut dwarf, &mut pool);
    assert_eq!(read(&mut dwarf, SectionId::DebugInfo), info);
    assert_eq!(read(&mut dwarf, SectionId::DebugLine), line);
}

#[test]
fn line_rows_round_trip_through_a_dwarf_reader() {
    let mut pool = TypePool::new(PtrWidth::P32);
    let mut dwarf = wasm_dwarf(PtrWidth::P32);
    dwarf.write_dbg_abbrev().unwrap();

    for (i, (name, addr)) in [("f", 0x1000u64), ("g", 0x1100)].iter().enumerate() {
        let decl = fn_decl(name, 10 * (i as u32 + 1), pool.void());
        let mut state = dwarf.init_decl_state(&pool, DeclIndex(i as u32), &decl);
        state.set_prologue_end();
        state.advance_pc_and_line(1, 16);
        dwarf
            .commit_decl_state(&mut pool, DeclIndex(i as u32), *addr, 16, state)
            .unwrap();
    }
    finish(&mut dwarf, &pool, 0x1000, 0x1110);

    let line = read(&mut dwarf, SectionId::DebugLine);
    let debug_line = DebugLine::new(&line, LittleEndian);
    let program = debug_line
        .program(DebugLineOffset(0), 4, None, None)
        .unwrap();
    let (program, sequences) = program.sequences().unwrap();
    assert_eq!(sequences.len(), 2);

    let mut rows = Vec::new();
    for sequence in &sequences {
        let mut sm = program.resume_from(sequence);
        while let Some((_, row)) = sm.next_row().unwrap() {
            if !row.end_sequence() {
                rows.push((row.address(), row.line().map(|l| l.get()).unwrap_or(0)));
            }
        }
    }
    // line register starts at 1 and advances by src_line, then by 1
    assert_eq!(
        rows,
        [(0x1000, 11), (0x1010, 12), (0x1100, 21), (0x1110, 22)]
    );
}

#[test]
fn a_grown_file_table_relocates_line_programs_out_of_its_way() {
    let mut pool = TypePool::new(PtrWidth::P64);
    let mut dwarf = wasm_dwarf(PtrWidth::P64);
    dwarf.write_dbg_abbrev().unwrap();

    let decl = fn_decl("f", 1, pool.void());
    let state = dwarf.init_decl_state(&pool, DeclIndex(0), &decl);
    dwarf
        .commit_decl_state(&mut pool, DeclIndex(0), 0x1000, 16, state)
        .unwrap();
    dwarf.write_dbg_line_header().unwrap();
    let old_off = dwarf.decl_line_program_offset(DeclIndex(0)).unwrap() as usize;
    let line = read(&mut dwarf, SectionId::DebugLine);
    let program = line[old_off..old_off + 25].to_vec();

    // a second declaration drags in several deep directories
    for i in 0..4u32 {
        let mut decl = fn_decl("g", 1, pool.void());
        decl.dir = format!("/nonexistent/some/very/deep/source/tree/number/{i}");
        decl.basename = format!("file{i}.zg");
        let state = dwarf.init_decl_state(&pool, DeclIndex(i + 1), &decl);
        dwarf
            .commit_decl_state(&mut pool, DeclIndex(i + 1), 0x2000 + u64::from(i) * 0x20, 16, state)
            .unwrap();
    }
    assert!(dwarf.line_header_dirty());
    dwarf.write_dbg_line_header().unwrap();

    // f's program survived the relocation byte for byte
    let new_off = dwarf.decl_line_program_offset(DeclIndex(0)).unwrap() as usize;
    assert_ne!(new_off, old_off);
    let line = read(&mut dwarf, SectionId::DebugLine);
    assert_eq!(&line[new_off..new_off + 25], &program[..]);

    // and the reader still sees five sequences
    let debug_line = DebugLine::new(&line, LittleEndian);
    let parsed = debug_line
        .program(DebugLineOffset(0), 8, None, None)
        .unwrap();
    let (_, sequences) = parsed.sequences().unwrap();
    assert_eq!(sequences.len(), 5);
}

#[test]
fn update_decl_line_number_patches_only_the_line_operand() {
    let mut pool = TypePool::new(PtrWidth::P64);
    let mut dwarf = wasm_dwarf(PtrWidth::P64);
    dwarf.write_dbg_abbrev().unwrap();

    let decl = fn_decl("f", 10, pool.void());
    let state = dwarf.init_decl_state(&pool, DeclIndex(0), &decl);
    dwarf
        .commit_decl_state(&mut pool, DeclIndex(0), 0x1000, 16, state)
        .unwrap();
    dwarf.write_dbg_line_header().unwrap();
    let before = read(&mut dwarf, SectionId::DebugLine);

    dwarf.update_decl_line_number(DeclIndex(0), 42).unwrap();
    let after = read(&mut dwarf, SectionId::DebugLine);

    let off = dwarf.decl_line_program_offset(DeclIndex(0)).unwrap() as usize;
    let slot = off + 3 + 8 + 1;
    assert_eq!(&after[slot..slot + 4], &[0xaa, 0x80, 0x80, 0x00]); // 42
    let mut expected = before.clone();
    expected[slot..slot + 4].copy_from_slice(&after[slot..slot + 4]);
    assert_eq!(after, expected);
}

#[test]
fn freed_declarations_leave_valid_padding_behind() {
    let mut pool = TypePool::new(PtrWidth::P64);
    let mut dwarf = wasm_dwarf(PtrWidth::P64);
    dwarf.write_dbg_abbrev().unwrap();

    for (i, name) in ["f", "g"].iter().enumerate() {
        let decl = fn_decl(name, 1, pool.void());
        let state = dwarf.init_decl_state(&pool, DeclIndex(i as u32), &decl);
        dwarf
            .commit_decl_state(&mut pool, DeclIndex(i as u32), 0x1000 + i as u64 * 0x20, 16, state)
            .unwrap();
    }
    let f_off = dwarf.decl_di_offset(DeclIndex(0)).unwrap() as usize;
    dwarf.free_decl(DeclIndex(0)).unwrap();
    assert_eq!(dwarf.decl_di_offset(DeclIndex(0)), None);

    finish(&mut dwarf, &pool, 0x1020, 0x1040);

    let info = read(&mut dwarf, SectionId::DebugInfo);
    assert_eq!(info[f_off], AbbrevCode::Pad1.raw());

    let dies = parse_sections(&mut dwarf);
    let subs: Vec<_> = dies.iter().filter(|d| d.tag == DW_TAG_subprogram).collect();
    assert_eq!(subs.len(), 1);
    assert_eq!(subs[0].name.as_deref(), Some(b"g".as_slice()));
}

#[test]
fn exprloc_relocations_are_handed_off_and_patchable() {
    let mut pool = TypePool::new(PtrWidth::P64);
    let mut dwarf = wasm_dwarf(PtrWidth::P64);
    dwarf.write_dbg_abbrev().unwrap();

    let u8_ty = pool.intern(Ty::Int {
        signed: false,
        bits: 8,
    });
    let decl = global_decl("counter", u8_ty);
    let mut state = dwarf.init_decl_state(&pool, DeclIndex(0), &decl);
    state.gen_var_dbg_info(
        &pool,
        "counter",
        u8_ty,
        Location::LinkerLoad {
            is_ptr: false,
            sym: 7,
        },
    );
    dwarf
        .commit_decl_state(&mut pool, DeclIndex(0), 0, 0, state)
        .unwrap();

    let relocs = dwarf.take_exprloc_relocs();
    assert_eq!(relocs.len(), 1);
    assert_eq!(relocs[0].kind, ExprlocRelocKind::DirectLoad);
    assert_eq!(relocs[0].sym, 7);
    assert!(dwarf.take_exprloc_relocs().is_empty());

    dwarf.resolve_exprloc_reloc(&relocs[0], 0xdead_beef).unwrap();
    let info = read(&mut dwarf, SectionId::DebugInfo);
    let slot = dwarf.decl_di_offset(DeclIndex(0)).unwrap() + relocs[0].offset;
    assert_eq!(
        &info[slot as usize..slot as usize + 8],
        &0xdead_beefu64.to_le_bytes()
    );
}

#[test]
fn aranges_carry_one_tuple_and_a_sentinel() {
    let pool = TypePool::new(PtrWidth::P64);
    let mut dwarf = wasm_dwarf(PtrWidth::P64);
    dwarf.flush_module(&pool).unwrap();
    dwarf.write_dbg_aranges(0x1000, 0x400).unwrap();

    let aranges = read(&mut dwarf, SectionId::DebugAranges);
    assert_eq!(aranges.len(), 48);
    let unit_length = u32::from_le_bytes(aranges[..4].try_into().unwrap());
    assert_eq!(unit_length, 44);
    assert_eq!(u16::from_le_bytes(aranges[4..6].try_into().unwrap()), 2);
    assert_eq!(aranges[10], 8); // address size
    assert_eq!(&aranges[16..24], &0x1000u64.to_le_bytes());
    assert_eq!(&aranges[24..32], &0x400u64.to_le_bytes());
    assert!(aranges[32..48].iter().all(|&b| b == 0));
}

#[test]
fn all_three_containers_carry_identical_section_bytes() {
    let build = |container: Container| -> (Vec<u8>, Vec<u8>) {
        let mut pool = TypePool::new(PtrWidth::P64);
        let mut dwarf = Dwarf::new(container, config(PtrWidth::P64));
        dwarf.write_dbg_abbrev().unwrap();
        let decl = fn_decl("f", 2, pool.void());
        let mut state = dwarf.init_decl_state(&pool, DeclIndex(0), &decl);
        state.advance_pc_and_line(1, 16);
        dwarf
            .commit_decl_state(&mut pool, DeclIndex(0), 0x1000, 32, state)
            .unwrap();
        dwarf.flush_module(&pool).unwrap();
        dwarf.write_dbg_info_header(0x1000, 0x1020).unwrap();
        dwarf.write_dbg_line_header().unwrap();
        (
            read(&mut dwarf, SectionId::DebugInfo),
            read(&mut dwarf, SectionId::DebugLine),
        )
    };

    let wasm = build(Container::Wasm(WasmContainer::new()));
    let elf = build(Container::Elf(
        ElfContainer::new(tempfile::tempfile().unwrap()).unwrap(),
    ));
    let macho = build(Container::MachO(
        MachOContainer::new(tempfile::tempfile().unwrap(), 0x1000).unwrap(),
    ));

    assert_eq!(wasm, elf);
    assert_eq!(wasm, macho);
}

#[test]
fn tagged_unions_parse_as_wrapper_struct_with_anonymous_union() {
    let mut pool = TypePool::new(PtrWidth::P64);
    let mut dwarf = wasm_dwarf(PtrWidth::P64);
    dwarf.write_dbg_abbrev().unwrap();

    let u64_ty = pool.intern(Ty::Int {
        signed: false,
        bits: 64,
    });
    let bool_ty = pool.bool_type();
    let tag = pool.intern(Ty::Enum {
        name: "demo.Kind".into(),
        variants: vec![
            EnumVariant {
                name: "int".into(),
                value: None,
            },
            EnumVariant {
                name: "truth".into(),
                value: None,
            },
        ],
    });
    let union_ty = pool.intern(Ty::Union {
        name: "demo.Value".into(),
        tag: Some(tag),
        fields: vec![
            Field {
                name: "int".into(),
                ty: u64_ty,
            },
            Field {
                name: "truth".into(),
                ty: bool_ty,
            },
        ],
    });

    let decl = fn_decl("take", 9, pool.void());
    let mut state = dwarf.init_decl_state(&pool, DeclIndex(0), &decl);
    state.gen_arg_dbg_info(&pool, "v", union_ty, Location::FrameOffset { reg: 6, offset: -16 });
    dwarf
        .commit_decl_state(&mut pool, DeclIndex(0), 0x1000, 128, state)
        .unwrap();
    finish(&mut dwarf, &pool, 0x1000, 0x1080);

    let dies = parse_sections(&mut dwarf);
    let param = find(&dies, DW_TAG_formal_parameter);
    let wrapper = at_offset(&dies, param.type_ref.unwrap());
    assert_eq!(wrapper.tag, DW_TAG_structure_type);
    assert_eq!(wrapper.name.as_deref(), Some(b"demo.Value".as_slice()));
    assert_eq!(wrapper.byte_size, Some(16));

    let members: Vec<_> = dies
        .iter()
        .filter(|d| d.tag == DW_TAG_member && d.depth == wrapper.depth + 1)
        .collect();
    assert_eq!(members[0].name.as_deref(), Some(b"payload".as_slice()));
    assert_eq!(members[0].member_loc, Some(0));
    assert_eq!(members[1].name.as_deref(), Some(b"tag".as_slice()));
    assert_eq!(members[1].member_loc, Some(8));

    let union_die = at_offset(&dies, members[0].type_ref.unwrap());
    assert_eq!(union_die.tag, DW_TAG_union_type);
    assert_eq!(union_die.name.as_deref(), Some(b"AnonUnion".as_slice()));
    assert_eq!(union_die.byte_size, Some(8));

    let tag_die = at_offset(&dies, members[1].type_ref.unwrap());
    assert_eq!(tag_die.tag, DW_TAG_enumeration_type);
    assert_eq!(tag_die.name.as_deref(), Some(b"demo.Kind".as_slice()));
}
