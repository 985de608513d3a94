/// Android API levels the emitted format depends on.
#[rustfmt::skip]
pub mod api {
    /// Android 4.2: empty annotation sets no longer need to be materialized.
    pub const J_MR1: u32 = 17;
    /// Android 7.0: default, static and private interface methods.
    pub const N: u32     = 24;
    /// Android 8.0: invoke-custom, call sites and method handles.
    pub const O: u32     = 26;
    /// Android 9.0.
    pub const P: u32     = 28;
    /// Android 10: relaxed member name grammar.
    pub const Q: u32     = 29;
}

/// Emission options. Capabilities default to what the minimum API level
/// supports but can be forced independently, mirroring the runtime flags
/// a compiler pipeline would hand down.
#[derive(Debug, Clone)]
pub struct WriterOptions {
    pub min_api: u32,
    pub can_use_default_and_static_interface_methods: bool,
    pub can_use_private_interface_methods: bool,
    pub can_use_invoke_custom: bool,
    /// Overrides the version bytes derived from `min_api`. Intended for
    /// tests that need to pin the header.
    pub forced_version_bytes: Option<[u8; 4]>,
    pub skip_name_validation: bool,
}

impl Default for WriterOptions {
    fn default() -> Self {
        WriterOptions::for_api(1)
    }
}

impl WriterOptions {
    pub fn for_api(min_api: u32) -> Self {
        Self {
            min_api,
            can_use_default_and_static_interface_methods: min_api >= api::N,
            can_use_private_interface_methods: min_api >= api::N,
            can_use_invoke_custom: min_api >= api::O,
            forced_version_bytes: None,
            skip_name_validation: false,
        }
    }

    pub fn forced_version_bytes(mut self, version_bytes: [u8; 4]) -> Self {
        self.forced_version_bytes = Some(version_bytes);
        self
    }

    pub fn skip_name_validation(mut self, skip: bool) -> Self {
        self.skip_name_validation = skip;
        self
    }

    /// Version bytes written after the magic.
    pub fn dex_version_bytes(&self) -> [u8; 4] {
        if let Some(version_bytes) = self.forced_version_bytes {
            return version_bytes;
        }
        if self.min_api >= api::P {
            *b"039\0"
        } else if self.min_api >= api::O {
            *b"038\0"
        } else if self.min_api >= api::N {
            *b"037\0"
        } else {
            *b"035\0"
        }
    }

    /// Before Android 4.2 the runtime rejects annotation references that
    /// resolve to offset zero, so empty sets have to be written out. The
    /// switch applies to the whole file, never to individual items.
    #[inline]
    pub fn materialize_empty_annotation_sets(&self) -> bool {
        self.min_api < api::J_MR1
    }
}
