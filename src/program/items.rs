use std::hash::{Hash, Hasher};
use std::mem::discriminant;

// --------------------------------------------------------------------
// Pool indices
// --------------------------------------------------------------------
pub type StringIndex = u32;
pub type TypeIndex = u16;
pub type ProtoIndex = u16;
pub type FieldIndex = u32;
pub type MethodIndex = u32;

/// Marks an absent superclass or source file in a class_def_item.
pub const NO_INDEX: u32 = 0xffff_ffff;

// --------------------------------------------------------------------
// DexType
// --------------------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DexType {
    pub descriptor_idx: StringIndex, // index into the string pool
}

// --------------------------------------------------------------------
// DexProto
// --------------------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DexProto {
    pub shorty_idx: StringIndex,     // index into the string pool
    pub return_type_idx: TypeIndex,  // index into the type pool
    pub parameters: Vec<TypeIndex>,  // empty list is never materialized
}

// --------------------------------------------------------------------
// DexField
// --------------------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DexField {
    pub class_idx: TypeIndex, // index into the type pool for the holder
    pub type_idx: TypeIndex,  // index into the type pool for the field type
    pub name_idx: StringIndex,
}

// --------------------------------------------------------------------
// DexMethod
// --------------------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DexMethod {
    pub class_idx: TypeIndex,  // index into the type pool for the holder
    pub proto_idx: ProtoIndex, // index into the proto pool
    pub name_idx: StringIndex,
}

// --------------------------------------------------------------------
// Method handles and call sites
// --------------------------------------------------------------------
#[rustfmt::skip]
pub mod method_handle_type {
    pub const STATIC_PUT: u16         = 0x00;
    pub const STATIC_GET: u16         = 0x01;
    pub const INSTANCE_PUT: u16       = 0x02;
    pub const INSTANCE_GET: u16       = 0x03;
    pub const INVOKE_STATIC: u16      = 0x04;
    pub const INVOKE_INSTANCE: u16    = 0x05;
    pub const INVOKE_CONSTRUCTOR: u16 = 0x06;
    pub const INVOKE_DIRECT: u16      = 0x07;
    pub const INVOKE_INTERFACE: u16   = 0x08;
}

#[derive(Debug, Clone)]
pub struct DexMethodHandle {
    pub kind: u16, // one of the method_handle_type constants
    pub field_or_method_idx: u32,
}

/// A call site is persisted as its bootstrap encoded array: method handle,
/// method name, proto, then any extra bootstrap arguments.
pub type DexCallSite = Vec<EncodedValue>;

// --------------------------------------------------------------------
// Classes and their members
// --------------------------------------------------------------------
#[derive(Debug, Clone)]
pub struct DexClass {
    pub class_idx: TypeIndex,
    pub access_flags: u32,
    pub superclass_idx: Option<TypeIndex>,
    pub interfaces: Vec<TypeIndex>,
    pub source_file_idx: Option<StringIndex>,
    pub annotations: Vec<DexAnnotation>,
    pub static_fields: Vec<EncodedField>,
    pub instance_fields: Vec<EncodedField>,
    pub direct_methods: Vec<EncodedMethod>,
    pub virtual_methods: Vec<EncodedMethod>,
    /// Initial values for the leading static fields, trailing defaults
    /// already trimmed. Empty means no encoded array is emitted.
    pub static_values: Vec<EncodedValue>,
}

impl DexClass {
    pub fn new(class_idx: TypeIndex, access_flags: u32) -> Self {
        Self {
            class_idx,
            access_flags,
            superclass_idx: None,
            interfaces: Vec::new(),
            source_file_idx: None,
            annotations: Vec::new(),
            static_fields: Vec::new(),
            instance_fields: Vec::new(),
            direct_methods: Vec::new(),
            virtual_methods: Vec::new(),
            static_values: Vec::new(),
        }
    }

    #[inline]
    pub fn has_class_data(&self) -> bool {
        !self.static_fields.is_empty()
            || !self.instance_fields.is_empty()
            || !self.direct_methods.is_empty()
            || !self.virtual_methods.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct EncodedField {
    pub field_idx: FieldIndex,
    pub access_flags: u32,
    pub annotations: Vec<DexAnnotation>,
}

#[derive(Debug, Clone)]
pub struct EncodedMethod {
    pub method_idx: MethodIndex,
    pub access_flags: u32,
    /// Absent for abstract and native methods.
    pub code: Option<DexCode>,
    pub annotations: Vec<DexAnnotation>,
    /// Per parameter position; `None` marks a position with no annotation
    /// list at all, as opposed to an explicitly empty one.
    pub parameter_annotations: Vec<Option<Vec<DexAnnotation>>>,
}

impl EncodedMethod {
    pub fn new(method_idx: MethodIndex, access_flags: u32, code: Option<DexCode>) -> Self {
        Self {
            method_idx,
            access_flags,
            code,
            annotations: Vec::new(),
            parameter_annotations: Vec::new(),
        }
    }
}

// --------------------------------------------------------------------
// Code
// --------------------------------------------------------------------
#[derive(Debug, Clone)]
pub struct DexCode {
    pub registers_size: u16,
    pub ins_size: u16,
    pub outs_size: u16,
    /// Pre-encoded instruction stream in 2-byte code units.
    pub insns: Vec<u16>,
    pub tries: Vec<TryBlock>,
    pub handlers: Vec<CatchHandler>,
    pub debug_info: Option<DexDebugInfo>,
}

#[derive(Debug, Clone)]
pub struct TryBlock {
    pub start_addr: u32,
    pub insn_count: u16,
    /// Position in the owning code's handler list. Handlers are shared
    /// between tries, which is why they are not stored inline.
    pub handler_index: usize,
}

#[derive(Debug, Clone)]
pub struct CatchHandler {
    pub pairs: Vec<TypeAddrPair>,
    pub catch_all_addr: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct TypeAddrPair {
    pub type_idx: TypeIndex,
    pub addr: u32,
}

// --------------------------------------------------------------------
// Debug info
// --------------------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DexDebugInfo {
    pub line_start: u32,
    pub parameter_names: Vec<Option<StringIndex>>,
    /// Pre-encoded state machine events without the closing END_SEQUENCE.
    pub events: Vec<u8>,
}

// --------------------------------------------------------------------
// Annotations
// --------------------------------------------------------------------
#[rustfmt::skip]
pub mod visibility {
    pub const BUILD: u8   = 0x00;
    pub const RUNTIME: u8 = 0x01;
    pub const SYSTEM: u8  = 0x02;
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DexAnnotation {
    pub visibility: u8,
    pub annotation: EncodedAnnotation,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EncodedAnnotation {
    pub type_idx: TypeIndex,
    pub elements: Vec<AnnotationElement>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AnnotationElement {
    pub name_idx: StringIndex,
    pub value: EncodedValue,
}

// --------------------------------------------------------------------
// Encoded values
// --------------------------------------------------------------------
#[derive(Debug, Clone)]
pub enum EncodedValue {
    Byte(i8),
    Short(i16),
    Char(u16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    MethodType(u32),
    MethodHandle(u32),
    String(u32),
    Type(u32),
    Field(u32),
    Method(u32),
    Enum(u32),
    Array(Vec<EncodedValue>),
    Annotation(EncodedAnnotation),
    Null,
    Boolean(bool),
}

// Structural identity with floats compared by bit pattern, so values can
// key the deduplication registries.
impl PartialEq for EncodedValue {
    fn eq(&self, other: &Self) -> bool {
        use EncodedValue::*;
        match (self, other) {
            (Byte(a), Byte(b)) => a == b,
            (Short(a), Short(b)) => a == b,
            (Char(a), Char(b)) => a == b,
            (Int(a), Int(b)) => a == b,
            (Long(a), Long(b)) => a == b,
            (Float(a), Float(b)) => a.to_bits() == b.to_bits(),
            (Double(a), Double(b)) => a.to_bits() == b.to_bits(),
            (MethodType(a), MethodType(b)) => a == b,
            (MethodHandle(a), MethodHandle(b)) => a == b,
            (String(a), String(b)) => a == b,
            (Type(a), Type(b)) => a == b,
            (Field(a), Field(b)) => a == b,
            (Method(a), Method(b)) => a == b,
            (Enum(a), Enum(b)) => a == b,
            (Array(a), Array(b)) => a == b,
            (Annotation(a), Annotation(b)) => a == b,
            (Null, Null) => true,
            (Boolean(a), Boolean(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for EncodedValue {}

impl Hash for EncodedValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        use EncodedValue::*;
        discriminant(self).hash(state);
        match self {
            Byte(v) => v.hash(state),
            Short(v) => v.hash(state),
            Char(v) => v.hash(state),
            Int(v) => v.hash(state),
            Long(v) => v.hash(state),
            Float(v) => v.to_bits().hash(state),
            Double(v) => v.to_bits().hash(state),
            MethodType(v) | MethodHandle(v) | String(v) | Type(v) | Field(v) | Method(v)
            | Enum(v) => v.hash(state),
            Array(v) => v.hash(state),
            Annotation(v) => v.hash(state),
            Null => {}
            Boolean(v) => v.hash(state),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_encoded_value_identity() {
        assert_eq!(EncodedValue::Float(1.5), EncodedValue::Float(1.5));
        assert_ne!(EncodedValue::Float(1.5), EncodedValue::Double(1.5));
        assert_ne!(EncodedValue::Int(1), EncodedValue::Long(1));

        let mut seen = HashSet::new();
        assert!(seen.insert(EncodedValue::Array(vec![EncodedValue::Null])));
        assert!(!seen.insert(EncodedValue::Array(vec![EncodedValue::Null])));
    }

    #[test]
    fn test_class_data_presence() {
        let mut class = DexClass::new(0, 0);
        assert!(!class.has_class_data());
        class.virtual_methods.push(EncodedMethod::new(0, 0, None));
        assert!(class.has_class_data());
    }
}
