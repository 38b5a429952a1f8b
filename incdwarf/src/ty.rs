//! The frontend type graph consumed by the DIE emitter.
//!
//! The compiler frontend lowers its own type representation into [`Ty`]
//! nodes interned in a [`TypePool`]. The pool answers the ABI layout queries
//! the emitter needs (sizes, alignments, field offsets, union layout) and
//! owns the module-wide error name table that backs error set and error
//! union emission.

use std::collections::HashMap;

use indexmap::IndexSet;

/// Target pointer width, which drives `usize`, pointer and slice layout as
/// well as the `address_size` of every emitted section header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PtrWidth {
    /// 32-bit addresses.
    P32,
    /// 64-bit addresses.
    P64,
}

impl PtrWidth {
    /// Address size in bytes.
    pub fn bytes(self) -> u8 {
        match self {
            PtrWidth::P32 => 4,
            PtrWidth::P64 => 8,
        }
    }
}

/// A handle to an interned [`Ty`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TypeId(pub(crate) u32);

/// A named member of a struct or union type.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Field {
    /// Member name.
    pub name: String,
    /// Member type.
    pub ty: TypeId,
}

/// One enumerator of an [`Ty::Enum`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct EnumVariant {
    /// Enumerator name.
    pub name: String,
    /// Explicit tag value; enumerators without one are numbered
    /// sequentially from 0.
    pub value: Option<u64>,
}

/// A type node.
///
/// The shapes mirror what the frontend can produce. Anything the emitter
/// does not know how to encode is interned as [`Ty::Opaque`] and degrades
/// to a placeholder DIE.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Ty {
    /// The diverging type; it never has a runtime value and it is a bug
    /// for one to reach DIE emission.
    Never,
    /// The zero-sized unit type.
    Void,
    /// One-byte boolean.
    Bool,
    /// An arbitrary-width integer; ABI size rounds the bit count up to a
    /// power of two bytes.
    Int {
        /// Signedness.
        signed: bool,
        /// Bit width as declared, e.g. 24 for a `u24`.
        bits: u16,
    },
    /// Pointer-sized unsigned integer.
    Usize,
    /// Pointer-sized signed integer.
    Isize,
    /// A thin pointer.
    Pointer {
        /// Pointee type.
        child: TypeId,
    },
    /// A pointer-plus-length fat pointer.
    Slice {
        /// Element type.
        child: TypeId,
    },
    /// A fixed-length array; `len` includes a sentinel element if any.
    Array {
        /// Element count.
        len: u64,
        /// Element type.
        elem: TypeId,
    },
    /// An optional value.
    Optional {
        /// Payload type.
        child: TypeId,
    },
    /// A struct with named fields.
    Struct {
        /// Fully qualified name.
        name: String,
        /// Declared fields in order.
        fields: Vec<Field>,
    },
    /// An anonymous struct; members are named by their decimal index.
    Tuple {
        /// Element types in order.
        fields: Vec<TypeId>,
    },
    /// An enumeration.
    Enum {
        /// Fully qualified name.
        name: String,
        /// Enumerators in declaration order.
        variants: Vec<EnumVariant>,
    },
    /// A union, tagged when `tag` carries the tag enum type.
    Union {
        /// Fully qualified name.
        name: String,
        /// Tag enum type for tagged unions.
        tag: Option<TypeId>,
        /// Variant fields.
        fields: Vec<Field>,
    },
    /// A set of error names.
    ErrorSet {
        /// Declared name, or `anyerror` for the inferred global set.
        name: String,
        /// Member error names.
        names: Vec<String>,
    },
    /// An error-or-payload sum.
    ErrorUnion {
        /// The error set side.
        error_set: TypeId,
        /// The payload side.
        payload: TypeId,
    },
    /// A bit-packed struct. Emitted as an opaque struct of its backing
    /// size; per-field bit offsets are not described.
    PackedStruct {
        /// Fully qualified name.
        name: String,
        /// ABI size of the backing integer in bytes.
        size: u64,
    },
    /// A type the emitter cannot describe.
    Opaque {
        /// Display name.
        name: String,
    },
}

/// Layout of a union type as the emitter describes it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UnionLayout {
    /// Size of the largest variant.
    pub payload_size: u64,
    /// Alignment of the most aligned variant.
    pub payload_align: u64,
    /// Size of the tag enum, 0 for untagged unions.
    pub tag_size: u64,
    /// Alignment of the tag enum.
    pub tag_align: u64,
    /// Byte offset of the payload within the outer struct.
    pub payload_offset: u64,
    /// Byte offset of the tag within the outer struct.
    pub tag_offset: u64,
    /// Total size of the (outer) type.
    pub abi_size: u64,
}

/// Layout of an error union: the higher-aligned side sits at offset 0.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ErrorUnionLayout {
    /// Byte offset of the payload member.
    pub value_offset: u64,
    /// Byte offset of the error member.
    pub error_offset: u64,
    /// Total size.
    pub abi_size: u64,
}

/// ABI size of an error value, the backing integer of every error set.
pub const ERROR_SET_SIZE: u64 = 2;

fn align_forward(value: u64, align: u64) -> u64 {
    debug_assert!(align > 0);
    value.div_ceil(align) * align
}

fn int_byte_size(bits: u16) -> u64 {
    if bits == 0 {
        return 0;
    }
    (u64::from(bits).div_ceil(8)).next_power_of_two()
}

/// The interning arena for [`Ty`] nodes.
#[derive(Debug)]
pub struct TypePool {
    ptr_width: PtrWidth,
    tys: Vec<Ty>,
    lookup: HashMap<Ty, TypeId>,
    error_names: IndexSet<String>,
    void: TypeId,
    bool_ty: TypeId,
    usize_ty: TypeId,
}

impl TypePool {
    /// Creates a pool for the given target pointer width with the
    /// well-known types pre-interned.
    pub fn new(ptr_width: PtrWidth) -> Self {
        let mut pool = Self {
            ptr_width,
            tys: Vec::new(),
            lookup: HashMap::new(),
            error_names: IndexSet::new(),
            void: TypeId(0),
            bool_ty: TypeId(0),
            usize_ty: TypeId(0),
        };
        pool.void = pool.intern(Ty::Void);
        pool.bool_ty = pool.intern(Ty::Bool);
        pool.usize_ty = pool.intern(Ty::Usize);
        pool
    }

    /// The target pointer width this pool lays types out for.
    pub fn ptr_width(&self) -> PtrWidth {
        self.ptr_width
    }

    /// Interns a type, returning the id of the existing node when an equal
    /// one was interned before.
    ///
    /// Interning an error set registers its member names in the module-wide
    /// error table, which assigns each distinct name a stable value.
    pub fn intern(&mut self, ty: Ty) -> TypeId {
        if let Some(&id) = self.lookup.get(&ty) {
            return id;
        }
        if let Ty::ErrorSet { ref names, .. } = ty {
            for name in names {
                self.error_names.insert(name.clone());
            }
        }
        let id = TypeId(self.tys.len() as u32);
        self.tys.push(ty.clone());
        self.lookup.insert(ty, id);
        id
    }

    /// Returns the interned node for `id`.
    pub fn get(&self, id: TypeId) -> &Ty {
        &self.tys[id.0 as usize]
    }

    /// The unit type.
    pub fn void(&self) -> TypeId {
        self.void
    }

    /// The boolean type.
    pub fn bool_type(&self) -> TypeId {
        self.bool_ty
    }

    /// The pointer-sized unsigned integer type.
    pub fn usize_type(&self) -> TypeId {
        self.usize_ty
    }

    /// Interns the pointer type to a slice's elements.
    pub fn slice_ptr_type(&mut self, slice: TypeId) -> TypeId {
        match *self.get(slice) {
            Ty::Slice { child } => self.intern(Ty::Pointer { child }),
            _ => unreachable!("slice_ptr_type on non-slice"),
        }
    }

    /// Whether a value of this type carries any bits at runtime.
    pub fn has_runtime_bits(&self, id: TypeId) -> bool {
        self.abi_size(id) > 0
    }

    /// Whether `id` is an optional represented as a bare address.
    pub fn is_ptr_like_optional(&self, id: TypeId) -> bool {
        match *self.get(id) {
            Ty::Optional { child } => matches!(*self.get(child), Ty::Pointer { .. }),
            _ => false,
        }
    }

    /// Payload type of an optional.
    pub fn optional_child(&self, id: TypeId) -> TypeId {
        match *self.get(id) {
            Ty::Optional { child } => child,
            _ => unreachable!("optional_child on non-optional"),
        }
    }

    /// Error set side of an error union.
    pub fn error_union_set(&self, id: TypeId) -> TypeId {
        match *self.get(id) {
            Ty::ErrorUnion { error_set, .. } => error_set,
            _ => unreachable!("error_union_set on non-error-union"),
        }
    }

    /// Payload side of an error union.
    pub fn error_union_payload(&self, id: TypeId) -> TypeId {
        match *self.get(id) {
            Ty::ErrorUnion { payload, .. } => payload,
            _ => unreachable!("error_union_payload on non-error-union"),
        }
    }

    /// Element count of an array, including its sentinel if any.
    pub fn array_len(&self, id: TypeId) -> u64 {
        match *self.get(id) {
            Ty::Array { len, .. } => len,
            _ => unreachable!("array_len on non-array"),
        }
    }

    /// The value assigned to an error name, non-zero for every registered
    /// name; 0 is reserved for "no error".
    pub fn error_value(&self, name: &str) -> u64 {
        match self.error_names.get_index_of(name) {
            Some(index) => index as u64 + 1,
            None => 0,
        }
    }

    /// All error names registered in the module, in registration order.
    pub fn error_names(&self) -> impl Iterator<Item = &str> {
        self.error_names.iter().map(|s| s.as_str())
    }

    /// ABI size of a type in bytes.
    pub fn abi_size(&self, id: TypeId) -> u64 {
        let ptr = u64::from(self.ptr_width.bytes());
        match *self.get(id) {
            Ty::Never | Ty::Void => 0,
            Ty::Bool => 1,
            Ty::Int { bits, .. } => int_byte_size(bits),
            Ty::Usize | Ty::Isize | Ty::Pointer { .. } => ptr,
            Ty::Slice { .. } => ptr * 2,
            Ty::Array { len, elem } => self.abi_size(elem) * len,
            Ty::Optional { child } => {
                if self.is_ptr_like_optional(id) {
                    ptr
                } else {
                    let payload = self.abi_size(child);
                    align_forward(1, self.abi_alignment(child)) + payload
                }
            }
            Ty::Struct { ref fields, .. } => {
                let mut offset = 0;
                let mut align = 1;
                for field in fields {
                    let field_align = self.abi_alignment(field.ty);
                    align = align.max(field_align);
                    offset = align_forward(offset, field_align) + self.abi_size(field.ty);
                }
                align_forward(offset, align)
            }
            Ty::Tuple { ref fields } => {
                let mut offset = 0;
                let mut align = 1;
                for &field in fields {
                    let field_align = self.abi_alignment(field);
                    align = align.max(field_align);
                    offset = align_forward(offset, field_align) + self.abi_size(field);
                }
                align_forward(offset, align)
            }
            Ty::Enum { ref variants, .. } => {
                if variants.is_empty() {
                    return 0;
                }
                let max = variants
                    .iter()
                    .enumerate()
                    .map(|(i, v)| v.value.unwrap_or(i as u64))
                    .max()
                    .unwrap_or(0);
                let bits = 64 - max.leading_zeros() as u16;
                int_byte_size(bits)
            }
            Ty::Union { .. } => self.union_layout(id).abi_size,
            Ty::ErrorSet { .. } => ERROR_SET_SIZE,
            Ty::ErrorUnion { .. } => self.error_union_layout(id).abi_size,
            Ty::PackedStruct { size, .. } => size,
            Ty::Opaque { .. } => 0,
        }
    }

    /// ABI alignment of a type in bytes, at least 1.
    pub fn abi_alignment(&self, id: TypeId) -> u64 {
        let ptr = u64::from(self.ptr_width.bytes());
        match *self.get(id) {
            Ty::Never | Ty::Void | Ty::Opaque { .. } => 1,
            Ty::Bool => 1,
            Ty::Int { bits, .. } => int_byte_size(bits).clamp(1, 16),
            Ty::Usize | Ty::Isize | Ty::Pointer { .. } | Ty::Slice { .. } => ptr,
            Ty::Array { elem, .. } => self.abi_alignment(elem),
            Ty::Optional { child } => {
                if self.is_ptr_like_optional(id) {
                    ptr
                } else {
                    self.abi_alignment(child).max(1)
                }
            }
            Ty::Struct { ref fields, .. } => fields
                .iter()
                .map(|f| self.abi_alignment(f.ty))
                .max()
                .unwrap_or(1),
            Ty::Tuple { ref fields } => fields
                .iter()
                .map(|&f| self.abi_alignment(f))
                .max()
                .unwrap_or(1),
            Ty::Enum { .. } => self.abi_size(id).clamp(1, 16),
            Ty::Union { .. } => {
                let layout = self.union_layout(id);
                layout.payload_align.max(layout.tag_align)
            }
            Ty::ErrorSet { .. } => ERROR_SET_SIZE,
            Ty::ErrorUnion { error_set, payload } => self
                .abi_alignment(error_set)
                .max(self.abi_alignment(payload)),
            Ty::PackedStruct { size, .. } => size.next_power_of_two().clamp(1, 16),
        }
    }

    /// Byte offset of field `index` within a struct or tuple.
    pub fn struct_field_offset(&self, id: TypeId, index: usize) -> u64 {
        let field_tys: Vec<TypeId> = match *self.get(id) {
            Ty::Struct { ref fields, .. } => fields.iter().map(|f| f.ty).collect(),
            Ty::Tuple { ref fields } => fields.clone(),
            _ => unreachable!("struct_field_offset on non-struct"),
        };
        let mut offset = 0;
        for (i, field) in field_tys.into_iter().enumerate() {
            offset = align_forward(offset, self.abi_alignment(field));
            if i == index {
                return offset;
            }
            offset += self.abi_size(field);
        }
        unreachable!("field index out of bounds")
    }

    /// Layout of a union type; `tag_size` is 0 for untagged unions.
    ///
    /// When the tag is at least as aligned as the payload it comes first,
    /// otherwise the payload does.
    pub fn union_layout(&self, id: TypeId) -> UnionLayout {
        let (tag, fields) = match *self.get(id) {
            Ty::Union {
                tag, ref fields, ..
            } => (tag, fields),
            _ => unreachable!("union_layout on non-union"),
        };
        let payload_size = fields.iter().map(|f| self.abi_size(f.ty)).max().unwrap_or(0);
        let payload_align = fields
            .iter()
            .map(|f| self.abi_alignment(f.ty))
            .max()
            .unwrap_or(1);
        let (tag_size, tag_align) = match tag {
            Some(tag) => (self.abi_size(tag), self.abi_alignment(tag).max(1)),
            None => (0, 1),
        };
        if tag_size == 0 {
            return UnionLayout {
                payload_size,
                payload_align,
                tag_size: 0,
                tag_align: 1,
                payload_offset: 0,
                tag_offset: 0,
                abi_size: align_forward(payload_size, payload_align),
            };
        }
        let abi_align = payload_align.max(tag_align);
        if tag_align >= payload_align {
            // tag first
            let payload_offset = align_forward(tag_size, payload_align);
            UnionLayout {
                payload_size,
                payload_align,
                tag_size,
                tag_align,
                payload_offset,
                tag_offset: 0,
                abi_size: align_forward(payload_offset + payload_size, abi_align),
            }
        } else {
            // payload first
            let tag_offset = align_forward(payload_size, tag_align);
            UnionLayout {
                payload_size,
                payload_align,
                tag_size,
                tag_align,
                payload_offset: 0,
                tag_offset,
                abi_size: align_forward(tag_offset + tag_size, abi_align),
            }
        }
    }

    /// Layout of an error union; the higher-aligned member sits at 0.
    pub fn error_union_layout(&self, id: TypeId) -> ErrorUnionLayout {
        let (error_set, payload) = match *self.get(id) {
            Ty::ErrorUnion { error_set, payload } => (error_set, payload),
            _ => unreachable!("error_union_layout on non-error-union"),
        };
        let payload_size = self.abi_size(payload);
        let payload_align = self.abi_alignment(payload);
        let error_size = self.abi_size(error_set);
        let error_align = self.abi_alignment(error_set);
        let abi_align = payload_align.max(error_align);
        if payload_align >= error_align {
            let error_offset = align_forward(payload_size, error_align);
            ErrorUnionLayout {
                value_offset: 0,
                error_offset,
                abi_size: align_forward(error_offset + error_size, abi_align),
            }
        } else {
            let value_offset = align_forward(error_size, payload_align);
            ErrorUnionLayout {
                value_offset,
                error_offset: 0,
                abi_size: align_forward(value_offset + payload_size, abi_align),
            }
        }
    }

    /// Display name of a type, used for DIE name attributes.
    pub fn type_name(&self, id: TypeId) -> String {
        match *self.get(id) {
            Ty::Never => "noreturn".into(),
            Ty::Void => "void".into(),
            Ty::Bool => "bool".into(),
            Ty::Int { signed, bits } => {
                format!("{}{}", if signed { 'i' } else { 'u' }, bits)
            }
            Ty::Usize => "usize".into(),
            Ty::Isize => "isize".into(),
            Ty::Pointer { child } => format!("*{}", self.type_name(child)),
            Ty::Slice { child } => format!("[]{}", self.type_name(child)),
            Ty::Array { len, elem } => format!("[{}]{}", len, self.type_name(elem)),
            Ty::Optional { child } => format!("?{}", self.type_name(child)),
            Ty::Struct { ref name, .. }
            | Ty::Enum { ref name, .. }
            | Ty::Union { ref name, .. }
            | Ty::ErrorSet { ref name, .. }
            | Ty::PackedStruct { ref name, .. }
            | Ty::Opaque { ref name } => name.clone(),
            Ty::Tuple { ref fields } => {
                let names: Vec<String> = fields.iter().map(|&f| self.type_name(f)).collect();
                format!("({})", names.join(","))
            }
            Ty::ErrorUnion { error_set, payload } => {
                format!(
                    "{}!{}",
                    self.type_name(error_set),
                    self.type_name(payload)
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool() -> TypePool {
        TypePool::new(PtrWidth::P64)
    }

    #[test]
    fn int_sizes_round_up_to_powers_of_two() {
        let mut p = pool();
        let u24 = p.intern(Ty::Int {
            signed: false,
            bits: 24,
        });
        assert_eq!(p.abi_size(u24), 4);
        let u0 = p.intern(Ty::Int {
            signed: false,
            bits: 0,
        });
        assert_eq!(p.abi_size(u0), 0);
        assert!(!p.has_runtime_bits(u0));
    }

    #[test]
    fn slice_layout_is_two_words() {
        let mut p = pool();
        let u32_ty = p.intern(Ty::Int {
            signed: false,
            bits: 32,
        });
        let slice = p.intern(Ty::Slice { child: u32_ty });
        assert_eq!(p.abi_size(slice), 16);
        assert_eq!(p.abi_alignment(slice), 8);
        assert_eq!(p.type_name(slice), "[]u32");
    }

    #[test]
    fn optional_of_pointer_is_an_address() {
        let mut p = pool();
        let u8_ty = p.intern(Ty::Int {
            signed: false,
            bits: 8,
        });
        let ptr = p.intern(Ty::Pointer { child: u8_ty });
        let opt = p.intern(Ty::Optional { child: ptr });
        assert!(p.is_ptr_like_optional(opt));
        assert_eq!(p.abi_size(opt), 8);

        let plain = p.intern(Ty::Optional { child: u8_ty });
        assert!(!p.is_ptr_like_optional(plain));
        assert_eq!(p.abi_size(plain), 2);
    }

    #[test]
    fn struct_fields_are_aligned_up() {
        let mut p = pool();
        let u8_ty = p.intern(Ty::Int {
            signed: false,
            bits: 8,
        });
        let u64_ty = p.intern(Ty::Int {
            signed: false,
            bits: 64,
        });
        let s = p.intern(Ty::Struct {
            name: "demo.S".into(),
            fields: vec![
                Field {
                    name: "a".into(),
                    ty: u8_ty,
                },
                Field {
                    name: "b".into(),
                    ty: u64_ty,
                },
            ],
        });
        assert_eq!(p.struct_field_offset(s, 0), 0);
        assert_eq!(p.struct_field_offset(s, 1), 8);
        assert_eq!(p.abi_size(s), 16);
    }

    #[test]
    fn tagged_union_puts_higher_aligned_part_first() {
        let mut p = pool();
        let u64_ty = p.intern(Ty::Int {
            signed: false,
            bits: 64,
        });
        let tag = p.intern(Ty::Enum {
            name: "demo.Tag".into(),
            variants: vec![
                EnumVariant {
                    name: "a".into(),
                    value: None,
                },
                EnumVariant {
                    name: "b".into(),
                    value: None,
                },
            ],
        });
        let tagged = p.intern(Ty::Union {
            name: "demo.U".into(),
            tag: Some(tag),
            fields: vec![Field {
                name: "a".into(),
                ty: u64_ty,
            }],
        });
        let layout = p.union_layout(tagged);
        // payload is more aligned than the one-byte tag
        assert_eq!(layout.payload_offset, 0);
        assert_eq!(layout.tag_offset, 8);
        assert_eq!(layout.abi_size, 16);
    }

    #[test]
    fn error_names_are_assigned_stable_nonzero_values() {
        let mut p = pool();
        p.intern(Ty::ErrorSet {
            name: "error{A,B}".into(),
            names: vec!["A".into(), "B".into()],
        });
        p.intern(Ty::ErrorSet {
            name: "error{B,C}".into(),
            names: vec!["B".into(), "C".into()],
        });
        assert_eq!(p.error_value("A"), 1);
        assert_eq!(p.error_value("B"), 2);
        assert_eq!(p.error_value("C"), 3);
        assert_eq!(p.error_names().collect::<Vec<_>>(), ["A", "B", "C"]);
    }

    #[test]
    fn error_union_puts_higher_aligned_member_at_zero() {
        let mut p = pool();
        let set = p.intern(Ty::ErrorSet {
            name: "anyerror".into(),
            names: vec![],
        });
        let u64_ty = p.intern(Ty::Int {
            signed: false,
            bits: 64,
        });
        let eu = p.intern(Ty::ErrorUnion {
            error_set: set,
            payload: u64_ty,
        });
        let layout = p.error_union_layout(eu);
        assert_eq!(layout.value_offset, 0);
        assert_eq!(layout.error_offset, 8);
        assert_eq!(layout.abi_size, 16);

        let u8_ty = p.intern(Ty::Int {
            signed: false,
            bits: 8,
        });
        let eu8 = p.intern(Ty::ErrorUnion {
            error_set: set,
            payload: u8_ty,
        });
        let layout = p.error_union_layout(eu8);
        assert_eq!(layout.error_offset, 0);
        assert_eq!(layout.value_offset, 2);
        assert_eq!(layout.abi_size, 4);
    }
}
