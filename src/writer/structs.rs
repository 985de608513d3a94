//! Raw little-endian wire structures of the container. The writer emits
//! these field by field; tests reinterpret emitted sections through
//! `plain` to check the byte layout.

use plain::Plain;

pub const DEX_MAGIC: [u8; 4] = *b"dex\n";

pub const DEX_ENDIAN_CONSTANT: u32 = 0x12345678;

/// Header item size; the writer only ever produces the classic layout.
pub const HEADER_SIZE: u32 = 0x70;

pub const CHECKSUM_OFFSET: usize = 8;
pub const SIGNATURE_OFFSET: usize = 12;
pub const SIGNATURE_SIZE: usize = 20;
pub const FILE_SIZE_OFFSET: usize = 32;

/// Sentinel for references into the data section that point at nothing.
pub const NO_OFFSET: u32 = 0;

// --------------------------------------------------------------------
// Header
// --------------------------------------------------------------------
#[repr(C)]
#[derive(Debug, Clone)]
pub struct Header {
    /// magic plus version bytes
    pub magic: [u8; 8],

    /// Adler32 checksum of the rest of the file (everything but `magic`
    /// and this field); used to detect file corruption.
    pub checksum: u32,

    /// SHA-1 signature (hash) of the rest of the file (everything but
    /// `magic`, `checksum`, and this field); used to uniquely identify
    /// files.
    pub signature: [u8; 20],

    /// Size of the entire file including the header.
    pub file_size: u32,

    /// Size of the header (this struct), in bytes. It is always 0x70.
    pub header_size: u32,

    pub endian_tag: u32,

    /// Always zero, the output is never statically linked.
    pub link_size: u32,
    pub link_off: u32,

    pub map_off: u32,

    pub string_ids_size: u32,
    pub string_ids_off: u32,
    pub type_ids_size: u32,
    pub type_ids_off: u32,
    pub proto_ids_size: u32,
    pub proto_ids_off: u32,
    pub field_ids_size: u32,
    pub field_ids_off: u32,
    pub method_ids_size: u32,
    pub method_ids_off: u32,
    pub class_defs_size: u32,
    pub class_defs_off: u32,

    /// size of the data section (in bytes)
    pub data_size: u32,
    pub data_off: u32,
}

unsafe impl Plain for Header {}

// --------------------------------------------------------------------
// Id table entries
// --------------------------------------------------------------------
#[repr(C)]
#[derive(Debug, Clone)]
pub struct StringIdItem {
    pub string_data_off: u32,
}

unsafe impl Plain for StringIdItem {}

#[repr(C)]
#[derive(Debug, Clone)]
pub struct TypeIdItem {
    pub descriptor_idx: u32,
}

unsafe impl Plain for TypeIdItem {}

#[repr(C)]
#[derive(Debug, Clone)]
pub struct ProtoIdItem {
    pub shorty_idx: u32,
    pub return_type_idx: u16,
    pub pad_: u16, // padding = 0
    pub parameters_off: u32,
}

unsafe impl Plain for ProtoIdItem {}

#[repr(C)]
#[derive(Debug, Clone)]
pub struct FieldIdItem {
    pub class_idx: u16,
    pub type_idx: u16,
    pub name_idx: u32,
}

unsafe impl Plain for FieldIdItem {}

#[repr(C)]
#[derive(Debug, Clone)]
pub struct MethodIdItem {
    pub class_idx: u16,
    pub proto_idx: u16,
    pub name_idx: u32,
}

unsafe impl Plain for MethodIdItem {}

#[repr(C)]
#[derive(Debug, Clone)]
pub struct ClassDefItem {
    pub class_idx: u32,
    pub access_flags: u32,
    pub superclass_idx: u32, // NO_INDEX when there is no superclass
    pub interfaces_off: u32,
    pub source_file_idx: u32, // NO_INDEX when unknown
    pub annotations_off: u32,
    pub class_data_off: u32,
    pub static_values_off: u32,
}

unsafe impl Plain for ClassDefItem {}

#[repr(C)]
#[derive(Debug, Clone)]
pub struct CallSiteIdItem {
    pub data_off: u32, // offset of the bootstrap encoded array
}

unsafe impl Plain for CallSiteIdItem {}

#[repr(C)]
#[derive(Debug, Clone)]
pub struct MethodHandleItem {
    pub method_handle_type: u16,
    pub reserved1_: u16,
    pub field_or_method_idx: u16,
    pub reserved2_: u16,
}

unsafe impl Plain for MethodHandleItem {}

// --------------------------------------------------------------------
// Data section items
// --------------------------------------------------------------------
#[repr(C)]
#[derive(Debug, Clone)]
pub struct CodeItem {
    pub registers_size: u16,
    pub ins_size: u16,
    pub outs_size: u16,
    pub tries_size: u16,
    pub debug_info_off: u32,
    pub insns_size: u32, // in 2-byte code units
}

unsafe impl Plain for CodeItem {}

#[repr(C)]
#[derive(Debug, Clone)]
pub struct TryItem {
    pub start_addr: u32,
    pub insn_count: u16,
    pub handler_off: u16, // relative to the start of the handler list
}

unsafe impl Plain for TryItem {}

#[repr(C)]
#[derive(Debug, Clone)]
pub struct AnnotationsDirectoryItem {
    pub class_annotations_off: u32,
    pub fields_size: u32,
    pub methods_size: u32,
    pub parameters_size: u32,
}

unsafe impl Plain for AnnotationsDirectoryItem {}

#[repr(C)]
#[derive(Debug, Clone)]
pub struct MemberAnnotationsItem {
    pub member_idx: u32,
    pub annotations_off: u32,
}

unsafe impl Plain for MemberAnnotationsItem {}

// --------------------------------------------------------------------
// Map list
// --------------------------------------------------------------------
#[repr(C)]
#[derive(Debug, Clone)]
pub struct MapItem {
    pub type_: u16,
    pub unused_: u16,
    pub size: u32,
    pub off: u32,
}

unsafe impl Plain for MapItem {}

#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MapItemType {
    HeaderItem = 0x0000,
    StringIdItem = 0x0001,
    TypeIdItem = 0x0002,
    ProtoIdItem = 0x0003,
    FieldIdItem = 0x0004,
    MethodIdItem = 0x0005,
    ClassDefItem = 0x0006,
    CallSiteIdItem = 0x0007,
    MethodHandleItem = 0x0008,
    MapList = 0x1000,
    TypeList = 0x1001,
    AnnotationSetRefList = 0x1002,
    AnnotationSetItem = 0x1003,
    ClassDataItem = 0x2000,
    CodeItem = 0x2001,
    StringDataItem = 0x2002,
    DebugInfoItem = 0x2003,
    AnnotationItem = 0x2004,
    EncodedArrayItem = 0x2005,
    AnnotationsDirectoryItem = 0x2006,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::size_of;

    #[test]
    fn test_wire_struct_sizes() {
        assert_eq!(size_of::<Header>(), HEADER_SIZE as usize);
        assert_eq!(size_of::<StringIdItem>(), 4);
        assert_eq!(size_of::<TypeIdItem>(), 4);
        assert_eq!(size_of::<ProtoIdItem>(), 12);
        assert_eq!(size_of::<FieldIdItem>(), 8);
        assert_eq!(size_of::<MethodIdItem>(), 8);
        assert_eq!(size_of::<ClassDefItem>(), 32);
        assert_eq!(size_of::<CallSiteIdItem>(), 4);
        assert_eq!(size_of::<MethodHandleItem>(), 8);
        assert_eq!(size_of::<CodeItem>(), 16);
        assert_eq!(size_of::<TryItem>(), 8);
        assert_eq!(size_of::<AnnotationsDirectoryItem>(), 16);
        assert_eq!(size_of::<MemberAnnotationsItem>(), 8);
        assert_eq!(size_of::<MapItem>(), 12);
    }
}
