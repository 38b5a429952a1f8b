//! The static `.debug_abbrev` table.
//!
//! The emitter uses a fixed set of DIE shapes, so the abbreviation table is
//! a single immutable byte sequence written once per module at offset 0.
//! Every DIE in `.debug_info` starts with its [`AbbrevCode`] byte, which is
//! also what padding inside the section is filled with (see
//! [`AbbrevCode::Pad1`]): a lone `DW_TAG_unspecified_type` entry with no
//! attributes and no children, so readers that stream the section skip
//! padding one byte at a time.

use gimli::constants::*;

use incdwarf_common::leb128;

/// Abbreviation codes, in table order.
///
/// The numeric code of each entry equals its position in the table,
/// starting at 1.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum AbbrevCode {
    /// The one compile unit of the module.
    CompileUnit = 1,
    /// A function with a return type.
    Subprogram,
    /// A function returning no value.
    SubprogramRetVoid,
    /// Scalar types: integers, booleans, addresses.
    BaseType,
    /// A thin pointer.
    PtrType,
    /// A structure, also used for slices, optionals and error unions.
    StructType,
    /// One field of a [`AbbrevCode::StructType`].
    StructMember,
    /// An enumeration, also used for error sets.
    EnumType,
    /// One enumerator of an [`AbbrevCode::EnumType`].
    EnumVariant,
    /// A (possibly anonymous) union.
    UnionType,
    /// A one-byte placeholder DIE, doubling as the section padding byte.
    Pad1,
    /// A formal parameter of a subprogram.
    Parameter,
    /// A local or global variable.
    Variable,
    /// An array type.
    ArrayType,
    /// The single dimension of an [`AbbrevCode::ArrayType`].
    ArrayDim,
}

impl AbbrevCode {
    /// The raw one-byte code as it appears in `.debug_info`.
    pub fn raw(self) -> u8 {
        self as u8
    }
}

struct AbbrevSpec {
    code: AbbrevCode,
    tag: DwTag,
    has_children: bool,
    attrs: &'static [(DwAt, DwForm)],
}

const ABBREVS: &[AbbrevSpec] = &[
    AbbrevSpec {
        code: AbbrevCode::CompileUnit,
        tag: DW_TAG_compile_unit,
        has_children: true,
        attrs: &[
            (DW_AT_stmt_list, DW_FORM_sec_offset),
            (DW_AT_low_pc, DW_FORM_addr),
            (DW_AT_high_pc, DW_FORM_addr),
            (DW_AT_name, DW_FORM_strp),
            (DW_AT_comp_dir, DW_FORM_strp),
            (DW_AT_producer, DW_FORM_strp),
            (DW_AT_language, DW_FORM_data2),
        ],
    },
    AbbrevSpec {
        code: AbbrevCode::Subprogram,
        tag: DW_TAG_subprogram,
        has_children: true,
        attrs: &[
            (DW_AT_low_pc, DW_FORM_addr),
            (DW_AT_high_pc, DW_FORM_data4),
            (DW_AT_type, DW_FORM_ref4),
            (DW_AT_name, DW_FORM_string),
        ],
    },
    AbbrevSpec {
        code: AbbrevCode::SubprogramRetVoid,
        tag: DW_TAG_subprogram,
        has_children: true,
        attrs: &[
            (DW_AT_low_pc, DW_FORM_addr),
            (DW_AT_high_pc, DW_FORM_data4),
            (DW_AT_name, DW_FORM_string),
        ],
    },
    AbbrevSpec {
        code: AbbrevCode::BaseType,
        tag: DW_TAG_base_type,
        has_children: false,
        attrs: &[
            (DW_AT_encoding, DW_FORM_data1),
            (DW_AT_byte_size, DW_FORM_udata),
            (DW_AT_name, DW_FORM_string),
        ],
    },
    AbbrevSpec {
        code: AbbrevCode::PtrType,
        tag: DW_TAG_pointer_type,
        has_children: false,
        attrs: &[(DW_AT_type, DW_FORM_ref4)],
    },
    AbbrevSpec {
        code: AbbrevCode::StructType,
        tag: DW_TAG_structure_type,
        has_children: true,
        attrs: &[
            (DW_AT_byte_size, DW_FORM_udata),
            (DW_AT_name, DW_FORM_string),
        ],
    },
    AbbrevSpec {
        code: AbbrevCode::StructMember,
        tag: DW_TAG_member,
        has_children: false,
        attrs: &[
            (DW_AT_name, DW_FORM_string),
            (DW_AT_type, DW_FORM_ref4),
            (DW_AT_data_member_location, DW_FORM_udata),
        ],
    },
    AbbrevSpec {
        code: AbbrevCode::EnumType,
        tag: DW_TAG_enumeration_type,
        has_children: true,
        attrs: &[
            (DW_AT_byte_size, DW_FORM_udata),
            (DW_AT_name, DW_FORM_string),
        ],
    },
    AbbrevSpec {
        code: AbbrevCode::EnumVariant,
        tag: DW_TAG_enumerator,
        has_children: false,
        attrs: &[
            (DW_AT_name, DW_FORM_string),
            (DW_AT_const_value, DW_FORM_data8),
        ],
    },
    AbbrevSpec {
        code: AbbrevCode::UnionType,
        tag: DW_TAG_union_type,
        has_children: true,
        attrs: &[
            (DW_AT_byte_size, DW_FORM_udata),
            (DW_AT_name, DW_FORM_string),
        ],
    },
    AbbrevSpec {
        code: AbbrevCode::Pad1,
        tag: DW_TAG_unspecified_type,
        has_children: false,
        attrs: &[],
    },
    AbbrevSpec {
        code: AbbrevCode::Parameter,
        tag: DW_TAG_formal_parameter,
        has_children: false,
        attrs: &[
            (DW_AT_location, DW_FORM_exprloc),
            (DW_AT_type, DW_FORM_ref4),
            (DW_AT_name, DW_FORM_string),
        ],
    },
    AbbrevSpec {
        code: AbbrevCode::Variable,
        tag: DW_TAG_variable,
        has_children: false,
        attrs: &[
            (DW_AT_location, DW_FORM_exprloc),
            (DW_AT_type, DW_FORM_ref4),
            (DW_AT_name, DW_FORM_string),
        ],
    },
    AbbrevSpec {
        code: AbbrevCode::ArrayType,
        tag: DW_TAG_array_type,
        has_children: true,
        attrs: &[(DW_AT_name, DW_FORM_string), (DW_AT_type, DW_FORM_ref4)],
    },
    AbbrevSpec {
        code: AbbrevCode::ArrayDim,
        tag: DW_TAG_subrange_type,
        has_children: false,
        attrs: &[(DW_AT_type, DW_FORM_ref4), (DW_AT_count, DW_FORM_udata)],
    },
];

/// Renders the complete `.debug_abbrev` contents.
pub fn section_bytes() -> Vec<u8> {
    let mut buf = Vec::with_capacity(256);
    for spec in ABBREVS {
        leb128::write_unsigned(&mut buf, spec.code.raw() as u64);
        leb128::write_unsigned(&mut buf, spec.tag.0 as u64);
        buf.push(if spec.has_children {
            DW_CHILDREN_yes.0
        } else {
            DW_CHILDREN_no.0
        });
        for &(at, form) in spec.attrs {
            leb128::write_unsigned(&mut buf, at.0 as u64);
            leb128::write_unsigned(&mut buf, form.0 as u64);
        }
        buf.push(0);
        buf.push(0);
    }
    // end of abbreviation table
    buf.push(0);
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_consecutive_from_one() {
        for (i, spec) in ABBREVS.iter().enumerate() {
            assert_eq!(spec.code.raw() as usize, i + 1);
        }
    }

    #[test]
    fn table_parses_back() {
        let bytes = section_bytes();
        let debug_abbrev = gimli::read::DebugAbbrev::new(&bytes, gimli::LittleEndian);
        let abbrevs = debug_abbrev
            .abbreviations(gimli::DebugAbbrevOffset(0))
            .unwrap();

        let cu = abbrevs.get(AbbrevCode::CompileUnit.raw() as u64).unwrap();
        assert_eq!(cu.tag(), DW_TAG_compile_unit);
        assert!(cu.has_children());
        assert_eq!(cu.attributes().len(), 7);

        let pad = abbrevs.get(AbbrevCode::Pad1.raw() as u64).unwrap();
        assert_eq!(pad.tag(), DW_TAG_unspecified_type);
        assert!(!pad.has_children());
        assert!(pad.attributes().is_empty());

        let dim = abbrevs.get(AbbrevCode::ArrayDim.raw() as u64).unwrap();
        assert_eq!(dim.tag(), DW_TAG_subrange_type);
        assert_eq!(dim.attributes().len(), 2);
    }
}
