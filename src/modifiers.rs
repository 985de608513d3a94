pub const ACC_PUBLIC: u32 = 0x0001; // class, field, method, ic
pub const ACC_PRIVATE: u32 = 0x0002; // field, method, ic
pub const ACC_PROTECTED: u32 = 0x0004; // field, method, ic
pub const ACC_STATIC: u32 = 0x0008; // field, method, ic
pub const ACC_FINAL: u32 = 0x0010; // class, field, method, ic
pub const ACC_SYNCHRONIZED: u32 = 0x0020; // method (only allowed on natives)
pub const ACC_VOLATILE: u32 = 0x0040; // field
pub const ACC_BRIDGE: u32 = 0x0040; // method (1.5)
pub const ACC_TRANSIENT: u32 = 0x0080; // field
pub const ACC_VARARGS: u32 = 0x0080; // method (1.5)
pub const ACC_NATIVE: u32 = 0x0100; // method
pub const ACC_INTERFACE: u32 = 0x0200; // class, ic
pub const ACC_ABSTRACT: u32 = 0x0400; // class, method, ic
pub const ACC_STRICT: u32 = 0x0800; // method
pub const ACC_SYNTHETIC: u32 = 0x1000; // class, field, method, ic
pub const ACC_ANNOTATION: u32 = 0x2000; // class, ic (1.5)
pub const ACC_ENUM: u32 = 0x4000; // class, field, ic (1.5)

pub const ACC_CONSTRUCTOR: u32 = 0x0001_0000; // method (dex only) <(cl)init>
pub const ACC_DECLARED_SYNCHRONIZED: u32 = 0x0002_0000; // method (dex only)

#[inline(always)]
pub fn is_public(access_flags: u32) -> bool {
    access_flags & ACC_PUBLIC != 0
}

#[inline(always)]
pub fn is_private(access_flags: u32) -> bool {
    access_flags & ACC_PRIVATE != 0
}

#[inline(always)]
pub fn is_protected(access_flags: u32) -> bool {
    access_flags & ACC_PROTECTED != 0
}

#[inline(always)]
pub fn is_static(access_flags: u32) -> bool {
    access_flags & ACC_STATIC != 0
}

#[inline(always)]
pub fn is_abstract(access_flags: u32) -> bool {
    access_flags & ACC_ABSTRACT != 0
}

#[inline(always)]
pub fn is_native(access_flags: u32) -> bool {
    access_flags & ACC_NATIVE != 0
}

#[inline(always)]
pub fn is_interface(access_flags: u32) -> bool {
    access_flags & ACC_INTERFACE != 0
}

#[inline(always)]
pub fn is_constructor(access_flags: u32) -> bool {
    access_flags & ACC_CONSTRUCTOR != 0
}
