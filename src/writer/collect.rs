use super::mixed::{CodeEntry, DirectoryEntry, MixedSections, ParamAnnotations};
use crate::lens::NamingLens;
use crate::options::WriterOptions;
use crate::program::{DexAnnotation, DexClass, DexProgram, EncodedMethod, StringIndex};

/// Walks the program in pool order and registers every mixed-section item
/// it transitively needs. Registration order is discovery order, which is
/// what keeps the output deterministic.
pub(crate) struct DependencyCollector<'a> {
    program: &'a DexProgram,
    options: &'a WriterOptions,
    naming: &'a dyn NamingLens,
    mixed: MixedSections,
}

impl<'a> DependencyCollector<'a> {
    pub fn new(
        program: &'a DexProgram,
        options: &'a WriterOptions,
        naming: &'a dyn NamingLens,
    ) -> Self {
        Self {
            program,
            options,
            naming,
            mixed: MixedSections::new(),
        }
    }

    pub fn run(mut self) -> MixedSections {
        // Every pool-visible string owns a string_data_item.
        for index in 0..self.program.strings.len() as StringIndex {
            self.mixed.string_data.intern(index, index);
        }

        // Parameter type lists come from the proto pool; empty lists are
        // never materialized.
        for proto in self.program.protos.iter() {
            if !proto.parameters.is_empty() {
                self.mixed
                    .type_lists
                    .intern(proto.parameters.clone(), proto.parameters.clone());
            }
        }

        // Call sites live in the file as their bootstrap arrays.
        for call_site in &self.program.call_sites {
            self.mixed
                .encoded_arrays
                .intern(call_site.clone(), call_site.clone());
        }

        for (class_pos, class) in self.program.classes.iter().enumerate() {
            self.collect_class(class_pos, class);
        }

        log::debug!(
            "collected mixed items: {} codes, {} debug infos, {} type lists, {} strings, \
             {} annotations, {} sets, {} directories",
            self.mixed.codes.len(),
            self.mixed.debug_infos.len(),
            self.mixed.type_lists.len(),
            self.mixed.string_data.len(),
            self.mixed.annotations.len(),
            self.mixed.annotation_sets.len(),
            self.mixed.annotation_directories.len(),
        );
        self.mixed
    }

    fn collect_class(&mut self, class_pos: usize, class: &DexClass) {
        if !class.interfaces.is_empty() {
            self.mixed
                .type_lists
                .intern(class.interfaces.clone(), class.interfaces.clone());
        }

        if class.has_class_data() {
            self.mixed.class_data.intern(class_pos, class_pos);
        }

        if !class.static_values.is_empty() {
            self.mixed
                .encoded_arrays
                .intern(class.static_values.clone(), class.static_values.clone());
        }

        for method in class.direct_methods.iter().chain(&class.virtual_methods) {
            self.collect_code(method);
        }

        let directory = self.collect_annotations(class);
        self.mixed.class_directories.push(directory);
        debug_assert_eq!(self.mixed.class_directories.len(), class_pos + 1);
    }

    fn collect_code(&mut self, method: &EncodedMethod) {
        let Some(code) = &method.code else {
            return;
        };
        let debug_info = code
            .debug_info
            .as_ref()
            .map(|info| self.mixed.debug_infos.intern(info.clone(), info.clone()));
        let holder = self.program.methods.at(method.method_idx).class_idx;
        let sort_key = format!(
            "{}{}{}",
            self.naming.type_descriptor(self.program, holder),
            self.naming.method_name(self.program, method.method_idx),
            self.program.method_signature(method.method_idx)
        );
        self.mixed.codes.intern(
            method.method_idx,
            CodeEntry {
                method_idx: method.method_idx,
                code: code.clone(),
                debug_info,
                sort_key,
            },
        );
    }

    /// Builds the class's annotations_directory_item, if it needs one.
    fn collect_annotations(&mut self, class: &DexClass) -> Option<usize> {
        let class_set = if class.annotations.is_empty() {
            None
        } else {
            self.intern_annotation_set(&class.annotations)
        };

        let mut field_sets = Vec::new();
        for field in class.static_fields.iter().chain(&class.instance_fields) {
            if field.annotations.is_empty() {
                continue;
            }
            if let Some(set) = self.intern_annotation_set(&field.annotations) {
                field_sets.push((field.field_idx, set));
            }
        }
        field_sets.sort_by_key(|&(field_idx, _)| field_idx);

        let mut method_sets = Vec::new();
        let mut parameter_lists = Vec::new();
        for method in class.direct_methods.iter().chain(&class.virtual_methods) {
            if !method.annotations.is_empty() {
                if let Some(set) = self.intern_annotation_set(&method.annotations) {
                    method_sets.push((method.method_idx, set));
                }
            }
            if method.parameter_annotations.iter().any(Option::is_some) {
                let list = self.intern_parameter_list(&method.parameter_annotations);
                parameter_lists.push((method.method_idx, list));
            }
        }
        method_sets.sort_by_key(|&(method_idx, _)| method_idx);
        parameter_lists.sort_by_key(|&(method_idx, _)| method_idx);

        if class_set.is_none()
            && field_sets.is_empty()
            && method_sets.is_empty()
            && parameter_lists.is_empty()
        {
            return None;
        }
        let entry = DirectoryEntry {
            class_set,
            field_sets,
            method_sets,
            parameter_lists,
        };
        Some(self
            .mixed
            .annotation_directories
            .intern(entry.clone(), entry))
    }

    /// Returns the set's registry index, or `None` when an empty set is
    /// elided and the reference resolves to offset zero. Elision is a
    /// per-writer switch, not a per-item one.
    fn intern_annotation_set(&mut self, annotations: &[DexAnnotation]) -> Option<usize> {
        if annotations.is_empty() && !self.options.materialize_empty_annotation_sets() {
            return None;
        }
        let mut indices: Vec<usize> = annotations
            .iter()
            .map(|annotation| {
                self.mixed
                    .annotations
                    .intern(annotation.clone(), annotation.clone())
            })
            .collect();
        // Ascending annotation type order; discovery order breaks ties so
        // duplicated types keep a stable ordering.
        indices.sort_by_key(|&index| {
            (
                self.mixed.annotations.get(index).annotation.type_idx,
                index,
            )
        });
        Some(self
            .mixed
            .annotation_sets
            .intern(indices.clone(), indices))
    }

    fn intern_parameter_list(
        &mut self,
        parameter_annotations: &[Option<Vec<DexAnnotation>>],
    ) -> usize {
        let list: Vec<ParamAnnotations> = parameter_annotations
            .iter()
            .map(|position| match position {
                None => ParamAnnotations::Missing,
                Some(annotations) => match self.intern_annotation_set(annotations) {
                    Some(set) => ParamAnnotations::Set(set),
                    None => ParamAnnotations::Empty,
                },
            })
            .collect();
        self.mixed
            .annotation_set_ref_lists
            .intern(list.clone(), list)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lens::IdentityLens;
    use crate::program::{
        visibility, DexAnnotation, DexCode, EncodedAnnotation, EncodedField, PoolBuilder,
    };

    fn annotation(type_idx: u16) -> DexAnnotation {
        DexAnnotation {
            visibility: visibility::RUNTIME,
            annotation: EncodedAnnotation {
                type_idx,
                elements: Vec::new(),
            },
        }
    }

    fn collect(program: &DexProgram, options: &WriterOptions) -> MixedSections {
        DependencyCollector::new(program, options, &IdentityLens).run()
    }

    #[test]
    fn test_strings_registered_once() {
        let mut builder = PoolBuilder::new();
        builder.add_string("a");
        builder.add_string("b");
        let program = builder.build();
        let mixed = collect(&program, &WriterOptions::default());
        assert_eq!(mixed.string_data.len(), 2);
    }

    #[test]
    fn test_shared_interfaces_list_deduped() {
        let mut builder = PoolBuilder::new();
        builder.add_type("LA;");
        builder.add_type("LB;");
        builder.add_type("LI;");
        let mut program = builder.build();
        let interface = program.type_index("LI;").unwrap();
        for descriptor in ["LA;", "LB;"] {
            let mut class = DexClass::new(program.type_index(descriptor).unwrap(), 0);
            class.interfaces = vec![interface];
            program.add_class(class);
        }
        let mixed = collect(&program, &WriterOptions::default());
        assert_eq!(mixed.type_lists.len(), 1);
        assert_eq!(mixed.class_data.len(), 0);
    }

    #[test]
    fn test_debug_info_structural_dedup() {
        let mut builder = PoolBuilder::new();
        builder.add_method("LA;", "f", &[], "V");
        builder.add_method("LA;", "g", &[], "V");
        let mut program = builder.build();
        let mut class = DexClass::new(program.type_index("LA;").unwrap(), 0);
        for name in ["f", "g"] {
            let method_idx = program.find_method("LA;", name).unwrap();
            let code = DexCode {
                registers_size: 0,
                ins_size: 0,
                outs_size: 0,
                insns: vec![0x000e],
                tries: Vec::new(),
                handlers: Vec::new(),
                debug_info: Some(crate::program::DexDebugInfo {
                    line_start: 10,
                    parameter_names: Vec::new(),
                    events: Vec::new(),
                }),
            };
            class
                .direct_methods
                .push(EncodedMethod::new(method_idx, 0, Some(code)));
        }
        program.add_class(class);
        let mixed = collect(&program, &WriterOptions::default());
        assert_eq!(mixed.codes.len(), 2);
        assert_eq!(mixed.debug_infos.len(), 1);
    }

    #[test]
    fn test_empty_annotation_set_policy() {
        let mut builder = PoolBuilder::new();
        builder.add_method("LA;", "f", &["I"], "V");
        let mut program = builder.build();
        let mut class = DexClass::new(program.type_index("LA;").unwrap(), 0);
        let method_idx = program.find_method("LA;", "f").unwrap();
        let mut method = EncodedMethod::new(method_idx, 0, None);
        method.parameter_annotations = vec![Some(Vec::new())];
        class.virtual_methods.push(method);
        program.add_class(class);

        let elided = collect(&program, &WriterOptions::for_api(17));
        assert_eq!(elided.annotation_sets.len(), 0);
        assert_eq!(
            elided.annotation_set_ref_lists.get(0),
            &vec![ParamAnnotations::Empty]
        );

        let materialized = collect(&program, &WriterOptions::for_api(16));
        assert_eq!(materialized.annotation_sets.len(), 1);
        assert_eq!(
            materialized.annotation_set_ref_lists.get(0),
            &vec![ParamAnnotations::Set(0)]
        );
    }

    #[test]
    fn test_annotation_sets_sorted_by_type() {
        let mut builder = PoolBuilder::new();
        builder.add_type("LA;");
        builder.add_type("LB;");
        builder.add_type("LC;");
        let mut program = builder.build();
        let type_b = program.type_index("LB;").unwrap();
        let type_a = program.type_index("LA;").unwrap();
        let mut class = DexClass::new(program.type_index("LC;").unwrap(), 0);
        class.annotations = vec![annotation(type_b), annotation(type_a)];
        program.add_class(class);
        let mixed = collect(&program, &WriterOptions::default());
        // Discovery order in the annotation registry, type order in the set.
        assert_eq!(mixed.annotations.get(0).annotation.type_idx, type_b);
        assert_eq!(mixed.annotations.get(1).annotation.type_idx, type_a);
        assert_eq!(mixed.annotation_sets.get(0), &vec![1, 0]);
        assert_eq!(mixed.class_directories, vec![Some(0)]);
    }

    #[test]
    fn test_shared_directories() {
        let mut builder = PoolBuilder::new();
        builder.add_type("LA;");
        builder.add_type("LB;");
        builder.add_field("LA;", "I", "x");
        let mut program = builder.build();
        let anno_type = program.type_index("LA;").unwrap();
        let field_idx = program.find_field("LA;", "x").unwrap();
        for descriptor in ["LA;", "LB;"] {
            let mut class = DexClass::new(program.type_index(descriptor).unwrap(), 0);
            class.static_fields.push(EncodedField {
                field_idx,
                access_flags: 0,
                annotations: vec![annotation(anno_type)],
            });
            program.add_class(class);
        }
        let mixed = collect(&program, &WriterOptions::default());
        assert_eq!(mixed.annotation_directories.len(), 1);
        assert_eq!(mixed.class_directories, vec![Some(0), Some(0)]);
    }
}
