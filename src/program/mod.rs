pub mod builder;
pub mod items;
pub mod pool;

pub use builder::PoolBuilder;
pub use items::*;
pub use pool::IndexedPool;

/// Fully-resolved application model the writer serializes. The pools are
/// built up front (normally by [`PoolBuilder`] or an optimizer pipeline)
/// and stay immutable during emission; classes, call sites and method
/// handles are registered afterwards with final pool indices.
pub struct DexProgram {
    pub strings: IndexedPool<String>,
    pub types: IndexedPool<DexType>,
    pub protos: IndexedPool<DexProto>,
    pub fields: IndexedPool<DexField>,
    pub methods: IndexedPool<DexMethod>,
    pub classes: Vec<DexClass>,
    pub call_sites: Vec<DexCallSite>,
    pub method_handles: Vec<DexMethodHandle>,
}

impl DexProgram {
    pub fn new() -> Self {
        Self {
            strings: IndexedPool::new(),
            types: IndexedPool::new(),
            protos: IndexedPool::new(),
            fields: IndexedPool::new(),
            methods: IndexedPool::new(),
            classes: Vec::new(),
            call_sites: Vec::new(),
            method_handles: Vec::new(),
        }
    }

    pub fn add_class(&mut self, class: DexClass) {
        self.classes.push(class);
    }

    #[inline]
    pub fn type_descriptor(&self, ty: TypeIndex) -> &str {
        self.strings.at(self.types.at(ty as u32).descriptor_idx)
    }

    #[inline]
    pub fn string_index(&self, value: &str) -> Option<StringIndex> {
        self.strings.index_of(value)
    }

    pub fn type_index(&self, descriptor: &str) -> Option<TypeIndex> {
        let descriptor_idx = self.string_index(descriptor)?;
        self.types
            .index_of(&DexType { descriptor_idx })
            .map(|index| index as TypeIndex)
    }

    /// First method of the given holder and name, in pool order. Meant for
    /// wiring up hand-built programs; production pipelines already hold
    /// the indices.
    pub fn find_method(&self, class_descriptor: &str, name: &str) -> Option<MethodIndex> {
        let class_idx = self.type_index(class_descriptor)?;
        let name_idx = self.string_index(name)?;
        self.methods
            .iter()
            .position(|method| method.class_idx == class_idx && method.name_idx == name_idx)
            .map(|position| position as MethodIndex)
    }

    /// First field of the given holder and name, in pool order.
    pub fn find_field(&self, class_descriptor: &str, name: &str) -> Option<FieldIndex> {
        let class_idx = self.type_index(class_descriptor)?;
        let name_idx = self.string_index(name)?;
        self.fields
            .iter()
            .position(|field| field.class_idx == class_idx && field.name_idx == name_idx)
            .map(|position| position as FieldIndex)
    }

    /// Method descriptor of the form `(Lp0;Lp1;)Lret;`.
    pub fn method_signature(&self, method_idx: MethodIndex) -> String {
        let method = self.methods.at(method_idx);
        let proto = self.protos.at(method.proto_idx as u32);
        let mut signature = String::from("(");
        for &parameter in &proto.parameters {
            signature.push_str(self.type_descriptor(parameter));
        }
        signature.push(')');
        signature.push_str(self.type_descriptor(proto.return_type_idx));
        signature
    }
}

impl Default for DexProgram {
    fn default() -> Self {
        Self::new()
    }
}
