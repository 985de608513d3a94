use std::collections::HashSet;

use super::{DexField, DexMethod, DexProgram, DexProto, DexType, IndexedPool, TypeIndex};
use crate::mutf8;

/// Interning front door for the five canonical pools. Entities are
/// registered by descriptor, then [`build`](PoolBuilder::build) sorts
/// everything into the order the format prescribes and hands back a
/// [`DexProgram`] ready for class registration.
///
/// Pipelines that already maintain canonical pools can populate a
/// `DexProgram` directly and skip this type.
pub struct PoolBuilder {
    strings: HashSet<String>,
    types: HashSet<String>,
    protos: HashSet<(Vec<String>, String)>,
    fields: HashSet<(String, String, String)>,
    methods: HashSet<(String, String, Vec<String>, String)>,
}

impl PoolBuilder {
    pub fn new() -> Self {
        Self {
            strings: HashSet::new(),
            types: HashSet::new(),
            protos: HashSet::new(),
            fields: HashSet::new(),
            methods: HashSet::new(),
        }
    }

    pub fn add_string(&mut self, value: &str) {
        self.strings.insert(value.to_string());
    }

    pub fn add_type(&mut self, descriptor: &str) {
        self.add_string(descriptor);
        self.types.insert(descriptor.to_string());
    }

    pub fn add_proto(&mut self, parameters: &[&str], return_type: &str) {
        self.add_type(return_type);
        for parameter in parameters {
            self.add_type(parameter);
        }
        self.add_string(&shorty_descriptor(parameters, return_type));
        self.protos.insert((
            parameters.iter().map(|p| p.to_string()).collect(),
            return_type.to_string(),
        ));
    }

    pub fn add_field(&mut self, class: &str, field_type: &str, name: &str) {
        self.add_type(class);
        self.add_type(field_type);
        self.add_string(name);
        self.fields
            .insert((class.to_string(), field_type.to_string(), name.to_string()));
    }

    pub fn add_method(&mut self, class: &str, name: &str, parameters: &[&str], return_type: &str) {
        self.add_type(class);
        self.add_string(name);
        self.add_proto(parameters, return_type);
        self.methods.insert((
            class.to_string(),
            name.to_string(),
            parameters.iter().map(|p| p.to_string()).collect(),
            return_type.to_string(),
        ));
    }

    /// Sorts every pool into canonical order and resolves cross indices:
    /// strings by UTF-16 code units, types by descriptor, protos by return
    /// type then parameter list, fields and methods by holder, name and
    /// type. The resulting indices are final.
    pub fn build(self) -> DexProgram {
        let mut program = DexProgram::new();

        let mut strings: Vec<String> = self.strings.into_iter().collect();
        strings.sort_by(|a, b| mutf8::compare_utf16(a, b));
        program.strings = IndexedPool::from_items(strings);

        let mut types: Vec<DexType> = self
            .types
            .iter()
            .map(|descriptor| DexType {
                descriptor_idx: program
                    .strings
                    .index_of(descriptor.as_str())
                    .expect("type descriptor was interned"),
            })
            .collect();
        types.sort_by_key(|ty| ty.descriptor_idx);
        assert!(types.len() <= 1 << 16, "type pool exceeds 16-bit indices");
        program.types = IndexedPool::from_items(types);

        let mut protos: Vec<DexProto> = self
            .protos
            .iter()
            .map(|(parameters, return_type)| {
                resolve_proto(&program, parameters, return_type)
            })
            .collect();
        protos.sort_by(|a, b| {
            (a.return_type_idx, &a.parameters).cmp(&(b.return_type_idx, &b.parameters))
        });
        assert!(protos.len() <= 1 << 16, "proto pool exceeds 16-bit indices");
        program.protos = IndexedPool::from_items(protos);

        let mut fields: Vec<DexField> = self
            .fields
            .iter()
            .map(|(class, field_type, name)| DexField {
                class_idx: resolve_type(&program, class),
                type_idx: resolve_type(&program, field_type),
                name_idx: program
                    .strings
                    .index_of(name.as_str())
                    .expect("field name was interned"),
            })
            .collect();
        fields.sort_by_key(|f| (f.class_idx, f.name_idx, f.type_idx));
        program.fields = IndexedPool::from_items(fields);

        let mut methods: Vec<DexMethod> = self
            .methods
            .iter()
            .map(|(class, name, parameters, return_type)| {
                let proto = resolve_proto(&program, parameters, return_type);
                DexMethod {
                    class_idx: resolve_type(&program, class),
                    proto_idx: program
                        .protos
                        .index_of(&proto)
                        .expect("proto was interned") as u16,
                    name_idx: program
                        .strings
                        .index_of(name.as_str())
                        .expect("method name was interned"),
                }
            })
            .collect();
        methods.sort_by_key(|m| (m.class_idx, m.name_idx, m.proto_idx));
        program.methods = IndexedPool::from_items(methods);

        program
    }
}

impl Default for PoolBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn resolve_type(program: &DexProgram, descriptor: &str) -> TypeIndex {
    let descriptor_idx = program
        .strings
        .index_of(descriptor)
        .expect("descriptor was interned");
    program
        .types
        .index_of(&DexType { descriptor_idx })
        .expect("type was interned") as TypeIndex
}

fn resolve_proto(program: &DexProgram, parameters: &[String], return_type: &str) -> DexProto {
    let borrowed: Vec<&str> = parameters.iter().map(String::as_str).collect();
    DexProto {
        shorty_idx: program
            .strings
            .index_of(shorty_descriptor(&borrowed, return_type).as_str())
            .expect("shorty was interned"),
        return_type_idx: resolve_type(program, return_type),
        parameters: borrowed.iter().map(|p| resolve_type(program, p)).collect(),
    }
}

fn shorty_char(descriptor: &str) -> char {
    match descriptor.as_bytes()[0] {
        b'L' | b'[' => 'L',
        primitive => primitive as char,
    }
}

fn shorty_descriptor(parameters: &[&str], return_type: &str) -> String {
    let mut shorty = String::with_capacity(parameters.len() + 1);
    shorty.push(shorty_char(return_type));
    for parameter in parameters {
        shorty.push(shorty_char(parameter));
    }
    shorty
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strings_sorted_and_deduped() {
        let mut builder = PoolBuilder::new();
        builder.add_string("b");
        builder.add_string("a");
        builder.add_type("V");
        builder.add_string("V");
        let program = builder.build();
        assert_eq!(program.strings.len(), 3);
        assert_eq!(program.string_index("V"), Some(0));
        assert_eq!(program.string_index("a"), Some(1));
        assert_eq!(program.string_index("b"), Some(2));
    }

    #[test]
    fn test_types_sorted_by_descriptor() {
        let mut builder = PoolBuilder::new();
        builder.add_type("LB;");
        builder.add_type("LA;");
        builder.add_type("I");
        let program = builder.build();
        assert_eq!(program.type_index("I"), Some(0));
        assert_eq!(program.type_index("LA;"), Some(1));
        assert_eq!(program.type_index("LB;"), Some(2));
    }

    #[test]
    fn test_protos_sorted_return_major() {
        let mut builder = PoolBuilder::new();
        builder.add_proto(&["I"], "V");
        builder.add_proto(&[], "V");
        builder.add_proto(&[], "I");
        let program = builder.build();
        let orders: Vec<(TypeIndex, usize)> = program
            .protos
            .iter()
            .map(|p| (p.return_type_idx, p.parameters.len()))
            .collect();
        let int_idx = program.type_index("I").unwrap();
        let void_idx = program.type_index("V").unwrap();
        assert_eq!(orders, vec![(int_idx, 0), (void_idx, 0), (void_idx, 1)]);
    }

    #[test]
    fn test_fields_sorted_by_holder_name_type() {
        let mut builder = PoolBuilder::new();
        builder.add_field("LB;", "I", "x");
        builder.add_field("LA;", "I", "y");
        builder.add_field("LA;", "I", "x");
        let program = builder.build();
        assert_eq!(program.find_field("LA;", "x"), Some(0));
        assert_eq!(program.find_field("LA;", "y"), Some(1));
        assert_eq!(program.find_field("LB;", "x"), Some(2));
    }

    #[test]
    fn test_method_signature_and_shorty() {
        let mut builder = PoolBuilder::new();
        builder.add_method("LFoo;", "bar", &["I", "J", "[Ljava/lang/String;"], "Z");
        let program = builder.build();
        let method_idx = program.find_method("LFoo;", "bar").unwrap();
        assert_eq!(
            program.method_signature(method_idx),
            "(IJ[Ljava/lang/String;)Z"
        );
        let method = program.methods.at(method_idx);
        let proto = program.protos.at(method.proto_idx as u32);
        assert_eq!(program.strings.at(proto.shorty_idx), "ZIJL");
    }
}
