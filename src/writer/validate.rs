use crate::error::DiagnosticSink;
use crate::lens::NamingLens;
use crate::modifiers;
use crate::options::{api, WriterOptions};
use crate::program::{DexClass, DexProgram, EncodedMethod};
use crate::{write_err, Result};

/// Checks every interface method against what the targeted runtime
/// accepts. Runs before any bytes are written; the first violation is
/// reported to the sink and aborts the emission.
pub(crate) fn check_interface_methods(
    program: &DexProgram,
    options: &WriterOptions,
    naming: &dyn NamingLens,
    sink: &dyn DiagnosticSink,
) -> Result<()> {
    for class in &program.classes {
        if !modifiers::is_interface(class.access_flags) {
            continue;
        }
        for method in class.direct_methods.iter().chain(&class.virtual_methods) {
            check_interface_method(program, options, naming, sink, class, method)?;
        }
    }
    Ok(())
}

fn check_interface_method(
    program: &DexProgram,
    options: &WriterOptions,
    naming: &dyn NamingLens,
    sink: &dyn DiagnosticSink,
    class: &DexClass,
    method: &EncodedMethod,
) -> Result<()> {
    let flags = method.access_flags;
    let name = program.strings.at(program.methods.at(method.method_idx).name_idx);
    if name == "<clinit>" {
        return Ok(());
    }
    let describe = || {
        format!(
            "{}->{}{}",
            naming.type_descriptor(program, class.class_idx),
            naming.method_name(program, method.method_idx),
            program.method_signature(method.method_idx)
        )
    };

    if modifiers::is_static(flags) {
        if !options.can_use_default_and_static_interface_methods {
            let method = describe();
            sink.error(&format!("static interface method rejected: {}", method));
            return write_err!(StaticInterfaceMethod { method });
        }
        return Ok(());
    }

    if modifiers::is_constructor(flags) || name == "<init>" {
        let method = describe();
        sink.error(&format!("interface constructor rejected: {}", method));
        return write_err!(InterfaceConstructor { method });
    }

    if modifiers::is_private(flags) {
        if !options.can_use_private_interface_methods {
            let method = describe();
            sink.error(&format!("private interface method rejected: {}", method));
            return write_err!(PrivateInterfaceMethod { method });
        }
        return Ok(());
    }

    if !modifiers::is_public(flags) {
        let method = describe();
        sink.error(&format!(
            "protected or package-private interface method rejected: {}",
            method
        ));
        return write_err!(InterfaceMethodVisibility { method });
    }

    if !modifiers::is_abstract(flags) && !options.can_use_default_and_static_interface_methods {
        let method = describe();
        sink.error(&format!("default interface method rejected: {}", method));
        return write_err!(DefaultInterfaceMethod { method });
    }

    Ok(())
}

/// Call sites and method handles need invoke-custom support at runtime.
pub(crate) fn check_invoke_custom(
    program: &DexProgram,
    options: &WriterOptions,
    sink: &dyn DiagnosticSink,
) -> Result<()> {
    if options.can_use_invoke_custom {
        return Ok(());
    }
    if program.call_sites.is_empty() && program.method_handles.is_empty() {
        return Ok(());
    }
    sink.error("call sites or method handles present without invoke-custom support");
    write_err!(InvokeCustomUnsupported {
        call_sites: program.call_sites.len(),
        method_handles: program.method_handles.len(),
    })
}

// ----------------------------------------------------------------------------
// Name validation (debug builds only)
// ----------------------------------------------------------------------------

/// Member-name grammar of the container format. DEX 040 additionally
/// admits spaces, which maps to Android Q.
pub fn is_valid_simple_name(name: &str, min_api: u32) -> bool {
    if name.is_empty() {
        return false;
    }
    name.chars().all(|c| is_simple_name_char(c, min_api))
}

fn is_simple_name_char(c: char, min_api: u32) -> bool {
    match c {
        'A'..='Z' | 'a'..='z' | '0'..='9' | '$' | '-' | '_' => true,
        ' ' | '\u{00a0}' => min_api >= api::Q,
        '\u{00a1}'..='\u{1fff}'
        | '\u{2010}'..='\u{2027}'
        | '\u{2030}'..='\u{d7ff}'
        | '\u{e000}'..='\u{ffef}'
        | '\u{10000}'..='\u{10ffff}' => true,
        _ => false,
    }
}

/// Reference type descriptors: `Lpkg/Outer$Inner;` with every segment a
/// simple name, or an array of such.
pub fn is_valid_class_descriptor(descriptor: &str, min_api: u32) -> bool {
    let element = descriptor.trim_start_matches('[');
    let Some(interior) = element
        .strip_prefix('L')
        .and_then(|rest| rest.strip_suffix(';'))
    else {
        // Primitives show up through arrays of them.
        return element.len() == 1 && "ZBSCIJFDV".contains(element);
    };
    !interior.is_empty()
        && interior
            .split('/')
            .all(|segment| is_valid_simple_name(segment, min_api))
}

/// Debug-build assertion body: every member name and class descriptor is
/// valid at the target API level. Angle-bracket names (`<init>`,
/// `<clinit>`) are runtime-defined and skipped.
pub(crate) fn names_are_valid(program: &DexProgram, min_api: u32) -> bool {
    for field in program.fields.iter() {
        if !is_valid_simple_name(program.strings.at(field.name_idx), min_api) {
            return false;
        }
    }
    for method in program.methods.iter() {
        let name = program.strings.at(method.name_idx);
        if name.starts_with('<') {
            continue;
        }
        if !is_valid_simple_name(name, min_api) {
            return false;
        }
    }
    for class in &program.classes {
        if !is_valid_class_descriptor(program.type_descriptor(class.class_idx), min_api) {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{DexWriteError, LogSink};
    use crate::lens::IdentityLens;
    use crate::modifiers::{
        ACC_ABSTRACT, ACC_CONSTRUCTOR, ACC_INTERFACE, ACC_PRIVATE, ACC_PUBLIC, ACC_STATIC,
    };
    use crate::program::PoolBuilder;

    fn interface_with_method(name: &str, flags: u32) -> DexProgram {
        let mut builder = PoolBuilder::new();
        builder.add_method("LI;", name, &[], "V");
        let mut program = builder.build();
        let mut class = DexClass::new(
            program.type_index("LI;").unwrap(),
            ACC_PUBLIC | ACC_INTERFACE | ACC_ABSTRACT,
        );
        let method_idx = program.find_method("LI;", name).unwrap();
        let method = EncodedMethod::new(method_idx, flags, None);
        if modifiers::is_static(flags) || name.starts_with('<') {
            class.direct_methods.push(method);
        } else if modifiers::is_private(flags) {
            class.direct_methods.push(method);
        } else {
            class.virtual_methods.push(method);
        }
        program.add_class(class);
        program
    }

    fn check(program: &DexProgram, min_api: u32) -> Result<()> {
        check_interface_methods(
            program,
            &WriterOptions::for_api(min_api),
            &IdentityLens,
            &LogSink,
        )
    }

    #[test]
    fn test_clinit_always_allowed() {
        let program = interface_with_method("<clinit>", ACC_STATIC | ACC_CONSTRUCTOR);
        assert!(check(&program, 1).is_ok());
    }

    #[test]
    fn test_static_interface_method_needs_n() {
        let program = interface_with_method("init", ACC_PUBLIC | ACC_STATIC);
        assert!(matches!(
            check(&program, 23),
            Err(DexWriteError::StaticInterfaceMethod { .. })
        ));
        assert!(check(&program, api::N).is_ok());
    }

    #[test]
    fn test_interface_constructor_rejected() {
        let program = interface_with_method("<init>", ACC_PUBLIC | ACC_CONSTRUCTOR);
        assert!(matches!(
            check(&program, api::N),
            Err(DexWriteError::InterfaceConstructor { .. })
        ));
    }

    #[test]
    fn test_private_interface_method_needs_n() {
        let program = interface_with_method("helper", ACC_PRIVATE);
        assert!(matches!(
            check(&program, 23),
            Err(DexWriteError::PrivateInterfaceMethod { .. })
        ));
        assert!(check(&program, api::N).is_ok());
    }

    #[test]
    fn test_package_private_rejected() {
        let program = interface_with_method("pkg", ACC_ABSTRACT);
        assert!(matches!(
            check(&program, api::N),
            Err(DexWriteError::InterfaceMethodVisibility { .. })
        ));
    }

    #[test]
    fn test_default_method_needs_n() {
        let program = interface_with_method("run", ACC_PUBLIC);
        assert!(matches!(
            check(&program, 23),
            Err(DexWriteError::DefaultInterfaceMethod { .. })
        ));
        assert!(check(&program, api::N).is_ok());
    }

    #[test]
    fn test_abstract_public_method_fine_everywhere() {
        let program = interface_with_method("run", ACC_PUBLIC | ACC_ABSTRACT);
        assert!(check(&program, 1).is_ok());
    }

    #[test]
    fn test_simple_names() {
        assert!(is_valid_simple_name("foo$1-bar_2", 1));
        assert!(is_valid_simple_name("λ", 1));
        assert!(!is_valid_simple_name("", 1));
        assert!(!is_valid_simple_name("a.b", 1));
        assert!(!is_valid_simple_name("with space", 1));
        assert!(is_valid_simple_name("with space", api::Q));
    }

    #[test]
    fn test_class_descriptors() {
        assert!(is_valid_class_descriptor("Ljava/lang/Object;", 1));
        assert!(is_valid_class_descriptor("[[Lfoo/Bar$Baz;", 1));
        assert!(is_valid_class_descriptor("[I", 1));
        assert!(!is_valid_class_descriptor("Lfoo//Bar;", 1));
        assert!(!is_valid_class_descriptor("foo", 1));
        assert!(!is_valid_class_descriptor("L;", 1));
    }
}
