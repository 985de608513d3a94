use std::borrow::Cow;

use crate::program::{DexProgram, FieldIndex, MethodIndex, TypeIndex};

/// Maps program references to the names they are emitted under. The
/// returned string must be present in the string pool; its pool index is
/// what ends up in the id tables. Identity when no minification ran.
pub trait NamingLens {
    fn type_descriptor<'p>(&self, program: &'p DexProgram, ty: TypeIndex) -> Cow<'p, str>;

    fn field_name<'p>(&self, program: &'p DexProgram, field: FieldIndex) -> Cow<'p, str>;

    fn method_name<'p>(&self, program: &'p DexProgram, method: MethodIndex) -> Cow<'p, str>;
}

/// Maps type references to their rewritten form, applied at every
/// try-handler type. Identity when no class merging ran.
pub trait GraphLens {
    fn lookup_type(&self, ty: TypeIndex) -> TypeIndex;
}

/// Records which desugared-library types and members the emitted code
/// actually references, so a later pass can decide what to retain.
pub trait DesugaredLibraryKeep {
    fn record_class(&mut self, ty: TypeIndex);

    fn record_field(&mut self, field: FieldIndex);

    fn record_method(&mut self, method: MethodIndex);

    fn record_hierarchy_of(&mut self, class: TypeIndex);
}

/// The no-minification, no-merging default.
pub struct IdentityLens;

impl NamingLens for IdentityLens {
    fn type_descriptor<'p>(&self, program: &'p DexProgram, ty: TypeIndex) -> Cow<'p, str> {
        Cow::Borrowed(program.type_descriptor(ty))
    }

    fn field_name<'p>(&self, program: &'p DexProgram, field: FieldIndex) -> Cow<'p, str> {
        Cow::Borrowed(program.strings.at(program.fields.at(field).name_idx))
    }

    fn method_name<'p>(&self, program: &'p DexProgram, method: MethodIndex) -> Cow<'p, str> {
        Cow::Borrowed(program.strings.at(program.methods.at(method).name_idx))
    }
}

impl GraphLens for IdentityLens {
    #[inline(always)]
    fn lookup_type(&self, ty: TypeIndex) -> TypeIndex {
        ty
    }
}

/// Keep sink that discards everything.
pub struct NoKeep;

impl DesugaredLibraryKeep for NoKeep {
    fn record_class(&mut self, _ty: TypeIndex) {}

    fn record_field(&mut self, _field: FieldIndex) {}

    fn record_method(&mut self, _method: MethodIndex) {}

    fn record_hierarchy_of(&mut self, _class: TypeIndex) {}
}
