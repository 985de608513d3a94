//! Item writers for every section of the data region, the map list, the
//! fixed id tables and the header. Each writer records the offset of an
//! item in the mixed table the moment it starts writing it, which is what
//! later sections rely on for their cross references.

use sha1::{Digest, Sha1};

use super::buffer::OutputBuffer;
use super::code::{size_of_code_item, write_code_item};
use super::encoded_value;
use super::mixed::ParamAnnotations;
use super::structs::{
    MapItemType, CHECKSUM_OFFSET, DEX_ENDIAN_CONSTANT, DEX_MAGIC, FILE_SIZE_OFFSET, HEADER_SIZE,
    NO_OFFSET, SIGNATURE_OFFSET, SIGNATURE_SIZE,
};
use super::DexWriter;
use crate::lens::DesugaredLibraryKeep;
use crate::program::{EncodedField, EncodedMethod, TypeIndex, NO_INDEX};
use crate::{mutf8, write_err, Result};

impl<'a> DexWriter<'a> {
    // ------------------------------------------------------------------
    // Codes and debug infos
    // ------------------------------------------------------------------

    /// Emits the codes region and the debug-info section behind it. The
    /// codes region is skipped first so the debug items it references can
    /// be written, then the cursor comes back for the code items.
    pub(crate) fn emit_codes_and_debug(
        &mut self,
        out: &mut OutputBuffer<'_>,
        keep: &mut dyn DesugaredLibraryKeep,
    ) -> Result<()> {
        let mut order: Vec<usize> = (0..self.mixed.codes.len()).collect();
        order.sort_by(|&a, &b| {
            self.mixed
                .codes
                .get(a)
                .sort_key
                .cmp(&self.mixed.codes.get(b).sort_key)
                .then(a.cmp(&b))
        });
        self.sorted_codes = order;
        self.mixed.codes.mark_all_pending();
        self.mixed.debug_infos.mark_all_pending();

        debug_assert!(out.is_aligned(4));
        let codes_start = out.position();
        let mut region_end = codes_start;
        for &index in &self.sorted_codes {
            region_end = (region_end + 3) & !3;
            region_end += size_of_code_item(&self.mixed.codes.get(index).code, self.graph);
        }
        if !self.mixed.codes.is_empty() {
            self.layout.codes.set(codes_start);
        }
        out.move_to(region_end);

        // Debug items in the order of the sorted codes, deduplicated by
        // the registry.
        for &index in &self.sorted_codes {
            let Some(debug_index) = self.mixed.codes.get(index).debug_info else {
                continue;
            };
            if self.mixed.debug_infos.offset_state(debug_index).is_set() {
                continue;
            }
            if !self.layout.debug_infos.is_set() {
                self.layout.debug_infos.set(out.position());
            }
            let bytes = self.debug_encoder.generate(
                self.mixed.debug_infos.get(debug_index),
                self.program,
                self.graph,
            );
            let offset = out.position();
            self.mixed.debug_infos.set_offset(debug_index, offset);
            out.write_bytes(&bytes)?;
        }
        let resume = out.align(4)?;

        out.move_to(codes_start);
        for position in 0..self.sorted_codes.len() {
            let index = self.sorted_codes[position];
            out.align(4)?;
            let offset = out.position();
            self.mixed.codes.set_offset(index, offset);
            let entry = self.mixed.codes.get(index);
            let debug_info_off = entry
                .debug_info
                .map(|debug_index| self.mixed.debug_infos.offset(debug_index))
                .unwrap_or(NO_OFFSET);
            write_code_item(
                out,
                &entry.code,
                entry.method_idx,
                debug_info_off,
                self.program,
                self.instruction_encoder,
                self.graph,
                keep,
            )?;
        }
        debug_assert_eq!(out.position(), region_end, "codes region size drifted");
        out.move_to(resume);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Type lists
    // ------------------------------------------------------------------
    pub(crate) fn emit_type_lists(&mut self, out: &mut OutputBuffer<'_>) -> Result<()> {
        if self.mixed.type_lists.is_empty() {
            return Ok(());
        }
        self.mixed.type_lists.mark_all_pending();
        let section = out.align(4)?;
        self.layout.type_lists.set(section);
        for index in 0..self.mixed.type_lists.len() {
            out.align(4)?;
            let offset = out.position();
            self.mixed.type_lists.set_offset(index, offset);
            let list = self.mixed.type_lists.get(index);
            out.write_u32(list.len() as u32)?;
            for &ty in list {
                out.write_u16(ty)?;
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // String data
    // ------------------------------------------------------------------
    pub(crate) fn emit_string_data(&mut self, out: &mut OutputBuffer<'_>) -> Result<()> {
        if self.mixed.string_data.is_empty() {
            return Ok(());
        }
        self.mixed.string_data.mark_all_pending();
        self.layout.string_data.set(out.position());
        for index in 0..self.mixed.string_data.len() {
            let offset = out.position();
            self.mixed.string_data.set_offset(index, offset);
            let value = self.program.strings.at(*self.mixed.string_data.get(index));
            out.write_uleb128(mutf8::utf16_length(value) as u32)?;
            out.write_bytes(&mutf8::str_to_mutf8(value))?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Annotations
    // ------------------------------------------------------------------
    pub(crate) fn emit_annotations(&mut self, out: &mut OutputBuffer<'_>) -> Result<()> {
        if self.mixed.annotations.is_empty() {
            return Ok(());
        }
        self.mixed.annotations.mark_all_pending();
        self.layout.annotations.set(out.position());
        for index in 0..self.mixed.annotations.len() {
            let offset = out.position();
            self.mixed.annotations.set_offset(index, offset);
            let annotation = self.mixed.annotations.get(index);
            out.write_u8(annotation.visibility)?;
            encoded_value::write_annotation(out, &annotation.annotation)?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Class data
    // ------------------------------------------------------------------
    pub(crate) fn emit_class_data(&mut self, out: &mut OutputBuffer<'_>) -> Result<()> {
        if self.mixed.class_data.is_empty() {
            return Ok(());
        }
        self.mixed.class_data.mark_all_pending();
        self.layout.class_data.set(out.position());
        for index in 0..self.mixed.class_data.len() {
            let offset = out.position();
            self.mixed.class_data.set_offset(index, offset);
            let class = &self.program.classes[*self.mixed.class_data.get(index)];
            out.write_uleb128(class.static_fields.len() as u32)?;
            out.write_uleb128(class.instance_fields.len() as u32)?;
            out.write_uleb128(class.direct_methods.len() as u32)?;
            out.write_uleb128(class.virtual_methods.len() as u32)?;
            self.write_member_fields(out, &class.static_fields)?;
            self.write_member_fields(out, &class.instance_fields)?;
            self.write_member_methods(out, &class.direct_methods)?;
            self.write_member_methods(out, &class.virtual_methods)?;
        }
        Ok(())
    }

    /// Member indices are delta-encoded against the previous entry, so the
    /// lists go out in ascending index order.
    fn write_member_fields(
        &self,
        out: &mut OutputBuffer<'_>,
        fields: &[EncodedField],
    ) -> Result<()> {
        let mut ordered: Vec<&EncodedField> = fields.iter().collect();
        ordered.sort_by_key(|field| field.field_idx);
        let mut previous = 0;
        for field in ordered {
            out.write_uleb128(field.field_idx - previous)?;
            out.write_uleb128(field.access_flags)?;
            previous = field.field_idx;
        }
        Ok(())
    }

    fn write_member_methods(
        &self,
        out: &mut OutputBuffer<'_>,
        methods: &[EncodedMethod],
    ) -> Result<()> {
        let mut ordered: Vec<&EncodedMethod> = methods.iter().collect();
        ordered.sort_by_key(|method| method.method_idx);
        let mut previous = 0;
        for method in ordered {
            out.write_uleb128(method.method_idx - previous)?;
            out.write_uleb128(method.access_flags)?;
            let code_off = match method.code {
                Some(_) => {
                    let index = self
                        .mixed
                        .codes
                        .index_of(&method.method_idx)
                        .expect("code item was collected");
                    self.mixed.codes.offset(index)
                }
                // Abstract and native methods have no code item.
                None => 0,
            };
            out.write_uleb128(code_off)?;
            previous = method.method_idx;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Encoded arrays
    // ------------------------------------------------------------------
    pub(crate) fn emit_encoded_arrays(&mut self, out: &mut OutputBuffer<'_>) -> Result<()> {
        if self.mixed.encoded_arrays.is_empty() {
            return Ok(());
        }
        self.mixed.encoded_arrays.mark_all_pending();
        self.layout.encoded_arrays.set(out.position());
        for index in 0..self.mixed.encoded_arrays.len() {
            let offset = out.position();
            self.mixed.encoded_arrays.set_offset(index, offset);
            encoded_value::write_array(out, self.mixed.encoded_arrays.get(index))?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Annotation sets
    // ------------------------------------------------------------------
    pub(crate) fn emit_annotation_sets(&mut self, out: &mut OutputBuffer<'_>) -> Result<()> {
        if self.mixed.annotation_sets.is_empty() {
            return Ok(());
        }
        self.mixed.annotation_sets.mark_all_pending();
        let section = out.align(4)?;
        self.layout.annotation_sets.set(section);
        for index in 0..self.mixed.annotation_sets.len() {
            out.align(4)?;
            let offset = out.position();
            self.mixed.annotation_sets.set_offset(index, offset);
            let set = self.mixed.annotation_sets.get(index);
            out.write_u32(set.len() as u32)?;
            for &annotation_index in set {
                out.write_u32(self.mixed.annotations.offset(annotation_index))?;
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Annotation set ref lists
    // ------------------------------------------------------------------
    pub(crate) fn emit_annotation_set_ref_lists(
        &mut self,
        out: &mut OutputBuffer<'_>,
    ) -> Result<()> {
        if self.mixed.annotation_set_ref_lists.is_empty() {
            return Ok(());
        }
        self.mixed.annotation_set_ref_lists.mark_all_pending();
        let section = out.align(4)?;
        self.layout.annotation_set_ref_lists.set(section);
        for index in 0..self.mixed.annotation_set_ref_lists.len() {
            out.align(4)?;
            let offset = out.position();
            self.mixed.annotation_set_ref_lists.set_offset(index, offset);
            let list = self.mixed.annotation_set_ref_lists.get(index);
            // Bug-compatible encoding: the size field counts only the
            // non-missing positions and only those are written, even
            // though readers index the entries positionally.
            let present = list
                .iter()
                .filter(|position| !matches!(position, ParamAnnotations::Missing))
                .count();
            out.write_u32(present as u32)?;
            for position in list {
                match position {
                    ParamAnnotations::Missing => {}
                    ParamAnnotations::Empty => out.write_u32(NO_OFFSET)?,
                    ParamAnnotations::Set(set) => {
                        out.write_u32(self.mixed.annotation_sets.offset(*set))?
                    }
                }
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Annotation directories
    // ------------------------------------------------------------------
    pub(crate) fn emit_annotation_directories(
        &mut self,
        out: &mut OutputBuffer<'_>,
    ) -> Result<()> {
        if self.mixed.annotation_directories.is_empty() {
            return Ok(());
        }
        self.mixed.annotation_directories.mark_all_pending();
        let section = out.align(4)?;
        self.layout.annotation_directories.set(section);
        for index in 0..self.mixed.annotation_directories.len() {
            out.align(4)?;
            let offset = out.position();
            self.mixed.annotation_directories.set_offset(index, offset);
            let entry = self.mixed.annotation_directories.get(index);
            let class_annotations_off = entry
                .class_set
                .map(|set| self.mixed.annotation_sets.offset(set))
                .unwrap_or(NO_OFFSET);
            out.write_u32(class_annotations_off)?;
            out.write_u32(entry.field_sets.len() as u32)?;
            out.write_u32(entry.method_sets.len() as u32)?;
            out.write_u32(entry.parameter_lists.len() as u32)?;
            for &(field_idx, set) in &entry.field_sets {
                out.write_u32(field_idx)?;
                out.write_u32(self.mixed.annotation_sets.offset(set))?;
            }
            for &(method_idx, set) in &entry.method_sets {
                out.write_u32(method_idx)?;
                out.write_u32(self.mixed.annotation_sets.offset(set))?;
            }
            for &(method_idx, list) in &entry.parameter_lists {
                out.write_u32(method_idx)?;
                out.write_u32(self.mixed.annotation_set_ref_lists.offset(list))?;
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Map list
    // ------------------------------------------------------------------
    pub(crate) fn emit_map(&mut self, out: &mut OutputBuffer<'_>) -> Result<()> {
        let map_off = out.align(4)?;
        self.layout.map.set(map_off);

        let mut entries: Vec<(u16, u32, u32)> = vec![(MapItemType::HeaderItem as u16, 1, 0)];
        let mut add = |ty: MapItemType, count: usize, offset: u32| {
            if count > 0 {
                entries.push((ty as u16, count as u32, offset));
            }
        };
        add(
            MapItemType::StringIdItem,
            self.program.strings.len(),
            self.layout.string_ids_offset,
        );
        add(
            MapItemType::TypeIdItem,
            self.program.types.len(),
            self.layout.type_ids_offset,
        );
        add(
            MapItemType::ProtoIdItem,
            self.program.protos.len(),
            self.layout.proto_ids_offset,
        );
        add(
            MapItemType::FieldIdItem,
            self.program.fields.len(),
            self.layout.field_ids_offset,
        );
        add(
            MapItemType::MethodIdItem,
            self.program.methods.len(),
            self.layout.method_ids_offset,
        );
        add(
            MapItemType::ClassDefItem,
            self.program.classes.len(),
            self.layout.class_defs_offset,
        );
        add(
            MapItemType::CallSiteIdItem,
            self.program.call_sites.len(),
            self.layout.call_site_ids_offset,
        );
        add(
            MapItemType::MethodHandleItem,
            self.program.method_handles.len(),
            self.layout.method_handles_offset,
        );
        add(MapItemType::MapList, 1, map_off);
        add(
            MapItemType::TypeList,
            self.mixed.type_lists.len(),
            self.layout.type_lists.or_zero(),
        );
        add(
            MapItemType::AnnotationSetRefList,
            self.mixed.annotation_set_ref_lists.len(),
            self.layout.annotation_set_ref_lists.or_zero(),
        );
        add(
            MapItemType::AnnotationSetItem,
            self.mixed.annotation_sets.len(),
            self.layout.annotation_sets.or_zero(),
        );
        add(
            MapItemType::ClassDataItem,
            self.mixed.class_data.len(),
            self.layout.class_data.or_zero(),
        );
        add(
            MapItemType::CodeItem,
            self.mixed.codes.len(),
            self.layout.codes.or_zero(),
        );
        add(
            MapItemType::StringDataItem,
            self.mixed.string_data.len(),
            self.layout.string_data.or_zero(),
        );
        add(
            MapItemType::DebugInfoItem,
            self.mixed.debug_infos.len(),
            self.layout.debug_infos.or_zero(),
        );
        add(
            MapItemType::AnnotationItem,
            self.mixed.annotations.len(),
            self.layout.annotations.or_zero(),
        );
        add(
            MapItemType::EncodedArrayItem,
            self.mixed.encoded_arrays.len(),
            self.layout.encoded_arrays.or_zero(),
        );
        add(
            MapItemType::AnnotationsDirectoryItem,
            self.mixed.annotation_directories.len(),
            self.layout.annotation_directories.or_zero(),
        );

        entries.sort_by_key(|&(type_code, _, _)| type_code);
        out.write_u32(entries.len() as u32)?;
        for (type_code, count, offset) in entries {
            out.write_u16(type_code)?;
            out.write_u16(0)?;
            out.write_u32(count)?;
            out.write_u32(offset)?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Fixed id tables
    // ------------------------------------------------------------------
    pub(crate) fn emit_id_tables(&self, out: &mut OutputBuffer<'_>) -> Result<()> {
        out.move_to(HEADER_SIZE);
        debug_assert_eq!(out.position(), self.layout.string_ids_offset);

        for index in 0..self.mixed.string_data.len() {
            out.write_u32(self.mixed.string_data.offset(index))?;
        }

        // Name lookups go through the naming lens; the emitted index is
        // the pool position of whatever string the lens hands back.
        for ty in 0..self.program.types.len() {
            let descriptor = self
                .naming
                .type_descriptor(self.program, ty as TypeIndex);
            let Some(index) = self.program.string_index(&descriptor) else {
                return write_err!(StringNotInPool {
                    value: descriptor.into_owned(),
                });
            };
            out.write_u32(index)?;
        }

        for proto in self.program.protos.iter() {
            out.write_u32(proto.shorty_idx)?;
            out.write_u16(proto.return_type_idx)?;
            out.write_u16(0)?;
            let parameters_off = if proto.parameters.is_empty() {
                0
            } else {
                let index = self
                    .mixed
                    .type_lists
                    .index_of(&proto.parameters)
                    .expect("parameter list was collected");
                self.mixed.type_lists.offset(index)
            };
            out.write_u32(parameters_off)?;
        }

        for (position, field) in self.program.fields.iter().enumerate() {
            out.write_u16(field.class_idx)?;
            out.write_u16(field.type_idx)?;
            let name = self.naming.field_name(self.program, position as u32);
            let Some(index) = self.program.string_index(&name) else {
                return write_err!(StringNotInPool {
                    value: name.into_owned(),
                });
            };
            out.write_u32(index)?;
        }

        for (position, method) in self.program.methods.iter().enumerate() {
            out.write_u16(method.class_idx)?;
            out.write_u16(method.proto_idx)?;
            let name = self.naming.method_name(self.program, position as u32);
            let Some(index) = self.program.string_index(&name) else {
                return write_err!(StringNotInPool {
                    value: name.into_owned(),
                });
            };
            out.write_u32(index)?;
        }

        for (class_pos, class) in self.program.classes.iter().enumerate() {
            out.write_u32(class.class_idx as u32)?;
            out.write_u32(class.access_flags)?;
            out.write_u32(
                class
                    .superclass_idx
                    .map(|index| index as u32)
                    .unwrap_or(NO_INDEX),
            )?;
            let interfaces_off = if class.interfaces.is_empty() {
                0
            } else {
                let index = self
                    .mixed
                    .type_lists
                    .index_of(&class.interfaces)
                    .expect("interface list was collected");
                self.mixed.type_lists.offset(index)
            };
            out.write_u32(interfaces_off)?;
            out.write_u32(class.source_file_idx.unwrap_or(NO_INDEX))?;
            out.write_u32(
                self.mixed.class_directories[class_pos]
                    .map(|index| self.mixed.annotation_directories.offset(index))
                    .unwrap_or(NO_OFFSET),
            )?;
            out.write_u32(
                self.mixed
                    .class_data
                    .index_of(&class_pos)
                    .map(|index| self.mixed.class_data.offset(index))
                    .unwrap_or(NO_OFFSET),
            )?;
            let static_values_off = if class.static_values.is_empty() {
                0
            } else {
                let index = self
                    .mixed
                    .encoded_arrays
                    .index_of(&class.static_values)
                    .expect("static values were collected");
                self.mixed.encoded_arrays.offset(index)
            };
            out.write_u32(static_values_off)?;
        }

        for call_site in &self.program.call_sites {
            let index = self
                .mixed
                .encoded_arrays
                .index_of(call_site)
                .expect("call site array was collected");
            out.write_u32(self.mixed.encoded_arrays.offset(index))?;
        }

        for handle in &self.program.method_handles {
            out.write_u16(handle.kind)?;
            out.write_u16(0)?;
            out.write_u16(handle.field_or_method_idx as u16)?;
            out.write_u16(0)?;
        }
        debug_assert_eq!(out.position(), self.layout.data_section_offset);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Header and seals
    // ------------------------------------------------------------------
    pub(crate) fn emit_header(&self, out: &mut OutputBuffer<'_>) -> Result<()> {
        let file_size = out.end_of_file();
        out.move_to(0);
        out.write_bytes(&DEX_MAGIC)?;
        out.write_bytes(&self.options.dex_version_bytes())?;
        out.write_u32(0)?; // checksum, sealed last
        out.write_bytes(&[0u8; SIGNATURE_SIZE])?;
        out.write_u32(file_size)?;
        out.write_u32(HEADER_SIZE)?;
        out.write_u32(DEX_ENDIAN_CONSTANT)?;
        out.write_u32(0)?; // link_size
        out.write_u32(0)?; // link_off
        out.write_u32(self.layout.map.get())?;

        let pool = |count: usize, offset: u32| -> (u32, u32) {
            if count == 0 {
                (0, 0)
            } else {
                (count as u32, offset)
            }
        };
        let tables = [
            pool(self.program.strings.len(), self.layout.string_ids_offset),
            pool(self.program.types.len(), self.layout.type_ids_offset),
            pool(self.program.protos.len(), self.layout.proto_ids_offset),
            pool(self.program.fields.len(), self.layout.field_ids_offset),
            pool(self.program.methods.len(), self.layout.method_ids_offset),
            pool(self.program.classes.len(), self.layout.class_defs_offset),
        ];
        for (count, offset) in tables {
            out.write_u32(count)?;
            out.write_u32(offset)?;
        }
        out.write_u32(file_size - self.layout.data_section_offset)?;
        out.write_u32(self.layout.data_section_offset)?;
        debug_assert_eq!(out.position(), HEADER_SIZE);
        Ok(())
    }

    /// Signature over everything after the signature field, then the
    /// checksum over everything after the checksum field. Both re-read the
    /// finished image.
    pub(crate) fn seal(&self, out: &mut OutputBuffer<'_>) -> Result<()> {
        let mut hasher = Sha1::new();
        hasher.update(&out.written()[FILE_SIZE_OFFSET..]);
        let signature: [u8; SIGNATURE_SIZE] = hasher.finalize().into();
        out.move_to(SIGNATURE_OFFSET as u32);
        out.write_bytes(&signature)?;

        let checksum = adler32::adler32(&out.written()[SIGNATURE_OFFSET..]).unwrap();
        out.move_to(CHECKSUM_OFFSET as u32);
        out.write_u32(checksum)?;
        Ok(())
    }
}
