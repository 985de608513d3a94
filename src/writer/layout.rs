use std::mem::size_of;

use super::structs::{
    CallSiteIdItem, ClassDefItem, FieldIdItem, MethodHandleItem, MethodIdItem, ProtoIdItem,
    StringIdItem, TypeIdItem, HEADER_SIZE,
};
use crate::program::DexProgram;

/// A section start that is recorded exactly once, when the section is
/// materialized.
#[derive(Debug, Clone, Copy, Default)]
pub struct SectionOffset(Option<u32>);

impl SectionOffset {
    pub fn set(&mut self, offset: u32) {
        debug_assert!(self.0.is_none(), "section offset assigned twice");
        self.0 = Some(offset);
    }

    /// Concrete offset; panics if the section was never materialized.
    #[inline]
    pub fn get(&self) -> u32 {
        self.0.expect("section offset read before emission")
    }

    /// Offset for header fields and references, where an absent section
    /// is written as zero.
    #[inline(always)]
    pub fn or_zero(&self) -> u32 {
        self.0.unwrap_or(0)
    }

    #[inline(always)]
    pub fn is_set(&self) -> bool {
        self.0.is_some()
    }
}

/// File layout: an immutable prefix of id-table offsets computed from the
/// pool sizes, plus the mixed-section starts that are filled in while the
/// data section is written. All alignable sections start 4-aligned.
pub struct Layout {
    pub string_ids_offset: u32,
    pub type_ids_offset: u32,
    pub proto_ids_offset: u32,
    pub field_ids_offset: u32,
    pub method_ids_offset: u32,
    pub class_defs_offset: u32,
    pub call_site_ids_offset: u32,
    pub method_handles_offset: u32,
    pub data_section_offset: u32,

    pub codes: SectionOffset,
    pub debug_infos: SectionOffset,
    pub type_lists: SectionOffset,
    pub string_data: SectionOffset,
    pub annotations: SectionOffset,
    pub class_data: SectionOffset,
    pub encoded_arrays: SectionOffset,
    pub annotation_sets: SectionOffset,
    pub annotation_set_ref_lists: SectionOffset,
    pub annotation_directories: SectionOffset,
    pub map: SectionOffset,
}

impl Layout {
    /// Lays out the fixed tables from a running counter seeded at the
    /// header size.
    pub fn plan(program: &DexProgram) -> Layout {
        let mut offset = HEADER_SIZE;
        let mut table = |count: usize, entry_size: usize| -> u32 {
            let start = offset;
            offset += (count * entry_size) as u32;
            start
        };

        let string_ids_offset = table(program.strings.len(), size_of::<StringIdItem>());
        let type_ids_offset = table(program.types.len(), size_of::<TypeIdItem>());
        let proto_ids_offset = table(program.protos.len(), size_of::<ProtoIdItem>());
        let field_ids_offset = table(program.fields.len(), size_of::<FieldIdItem>());
        let method_ids_offset = table(program.methods.len(), size_of::<MethodIdItem>());
        let class_defs_offset = table(program.classes.len(), size_of::<ClassDefItem>());
        let call_site_ids_offset = table(program.call_sites.len(), size_of::<CallSiteIdItem>());
        let method_handles_offset =
            table(program.method_handles.len(), size_of::<MethodHandleItem>());

        let layout = Layout {
            string_ids_offset,
            type_ids_offset,
            proto_ids_offset,
            field_ids_offset,
            method_ids_offset,
            class_defs_offset,
            call_site_ids_offset,
            method_handles_offset,
            data_section_offset: offset,
            codes: SectionOffset::default(),
            debug_infos: SectionOffset::default(),
            type_lists: SectionOffset::default(),
            string_data: SectionOffset::default(),
            annotations: SectionOffset::default(),
            class_data: SectionOffset::default(),
            encoded_arrays: SectionOffset::default(),
            annotation_sets: SectionOffset::default(),
            annotation_set_ref_lists: SectionOffset::default(),
            annotation_directories: SectionOffset::default(),
            map: SectionOffset::default(),
        };
        debug_assert!(layout.data_section_offset % 4 == 0);
        layout
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::PoolBuilder;

    #[test]
    fn test_empty_program_layout() {
        let layout = Layout::plan(&PoolBuilder::new().build());
        assert_eq!(layout.string_ids_offset, HEADER_SIZE);
        assert_eq!(layout.data_section_offset, HEADER_SIZE);
    }

    #[test]
    fn test_tables_follow_in_order() {
        let mut builder = PoolBuilder::new();
        builder.add_method("LFoo;", "bar", &[], "V");
        let program = builder.build();
        // 3 strings, 2 types, 1 proto, 1 method, no fields.
        let layout = Layout::plan(&program);
        assert_eq!(layout.string_ids_offset, 0x70);
        assert_eq!(layout.type_ids_offset, 0x70 + 12);
        assert_eq!(layout.proto_ids_offset, 0x70 + 12 + 8);
        assert_eq!(layout.field_ids_offset, 0x70 + 12 + 8 + 12);
        assert_eq!(layout.method_ids_offset, 0x70 + 12 + 8 + 12);
        assert_eq!(layout.class_defs_offset, 0x70 + 12 + 8 + 12 + 8);
        assert_eq!(layout.data_section_offset, 0x70 + 12 + 8 + 12 + 8);
    }

    #[test]
    #[should_panic(expected = "read before emission")]
    fn test_unset_section_offset_panics() {
        let layout = Layout::plan(&PoolBuilder::new().build());
        layout.codes.get();
    }
}
