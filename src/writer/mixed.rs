use std::collections::HashMap;
use std::hash::Hash;

use crate::program::{
    DexAnnotation, DexCode, DexDebugInfo, EncodedValue, FieldIndex, MethodIndex, StringIndex,
    TypeIndex,
};

// ----------------------------------------------------------------------------
// Offset lifecycle
// ----------------------------------------------------------------------------

/// Lifecycle of a mixed-section item's file offset. Reading a concrete
/// value in any other state is a bug in the phase ordering, never a
/// consequence of bad input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemOffset {
    Unknown,
    /// Enqueued for emission, not yet written.
    Pending,
    At(u32),
}

impl ItemOffset {
    #[inline]
    pub fn get(self) -> u32 {
        match self {
            ItemOffset::At(offset) => offset,
            state => panic!("mixed item offset read in state {:?}", state),
        }
    }

    #[inline(always)]
    pub fn is_set(self) -> bool {
        matches!(self, ItemOffset::At(_))
    }
}

// ----------------------------------------------------------------------------
// MixedSection
// ----------------------------------------------------------------------------

/// Insertion-ordered registry of one mixed-item kind. Identity is the key
/// type: structural for most kinds, the owning method for code items, the
/// class for class data. Discovery order is preserved and is the order
/// items are written in.
pub struct MixedSection<K, T> {
    items: Vec<T>,
    offsets: Vec<ItemOffset>,
    lookup: HashMap<K, usize>,
}

impl<K: Eq + Hash, T> MixedSection<K, T> {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            offsets: Vec::new(),
            lookup: HashMap::new(),
        }
    }

    /// Registers an item unless its key is already known; returns the
    /// registry index either way.
    pub fn intern(&mut self, key: K, item: T) -> usize {
        if let Some(&index) = self.lookup.get(&key) {
            return index;
        }
        let index = self.items.len();
        self.items.push(item);
        self.offsets.push(ItemOffset::Unknown);
        self.lookup.insert(key, index);
        index
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[inline(always)]
    pub fn get(&self, index: usize) -> &T {
        &self.items[index]
    }

    #[inline]
    pub fn index_of(&self, key: &K) -> Option<usize> {
        self.lookup.get(key).copied()
    }

    /// File offset of an emitted item; panics if it has not been written.
    #[inline]
    pub fn offset(&self, index: usize) -> u32 {
        self.offsets[index].get()
    }

    #[inline(always)]
    pub fn offset_state(&self, index: usize) -> ItemOffset {
        self.offsets[index]
    }

    /// Marks every item as enqueued. Called once when the section's
    /// emission starts.
    pub fn mark_all_pending(&mut self) {
        for offset in &mut self.offsets {
            debug_assert_eq!(*offset, ItemOffset::Unknown);
            *offset = ItemOffset::Pending;
        }
    }

    pub fn set_offset(&mut self, index: usize, offset: u32) {
        debug_assert_eq!(self.offsets[index], ItemOffset::Pending);
        self.offsets[index] = ItemOffset::At(offset);
    }
}

impl<K: Eq + Hash, T> Default for MixedSection<K, T> {
    fn default() -> Self {
        Self::new()
    }
}

// ----------------------------------------------------------------------------
// Item payloads
// ----------------------------------------------------------------------------

/// One code item queued for emission, with the key it is sorted under.
pub struct CodeEntry {
    pub method_idx: MethodIndex,
    pub code: DexCode,
    /// Index into the debug-info registry.
    pub debug_info: Option<usize>,
    /// `holder descriptor + method name + signature`, which keeps output
    /// order stable across runs and renamings.
    pub sort_key: String,
}

/// Annotations of one parameter position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamAnnotations {
    /// No annotation list at this position.
    Missing,
    /// An empty list that was elided; the reference is written as zero.
    Empty,
    /// Index into the annotation-set registry.
    Set(usize),
}

/// One annotations_directory_item, member lists already sorted by member
/// index. Structurally deduplicated, so classes with identical annotation
/// layouts share a directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DirectoryEntry {
    pub class_set: Option<usize>,
    pub field_sets: Vec<(FieldIndex, usize)>,
    pub method_sets: Vec<(MethodIndex, usize)>,
    pub parameter_lists: Vec<(MethodIndex, usize)>,
}

// ----------------------------------------------------------------------------
// MixedSections
// ----------------------------------------------------------------------------

/// Per-kind registries of everything the data section will contain.
/// Populated by the dependency collector, consumed by the item writers.
pub struct MixedSections {
    pub codes: MixedSection<MethodIndex, CodeEntry>,
    pub debug_infos: MixedSection<DexDebugInfo, DexDebugInfo>,
    pub type_lists: MixedSection<Vec<TypeIndex>, Vec<TypeIndex>>,
    pub string_data: MixedSection<StringIndex, StringIndex>,
    pub annotations: MixedSection<DexAnnotation, DexAnnotation>,
    /// Values are class positions in the program's class list.
    pub class_data: MixedSection<usize, usize>,
    pub encoded_arrays: MixedSection<Vec<EncodedValue>, Vec<EncodedValue>>,
    /// Sets hold annotation registry indices in ascending type order.
    pub annotation_sets: MixedSection<Vec<usize>, Vec<usize>>,
    pub annotation_set_ref_lists: MixedSection<Vec<ParamAnnotations>, Vec<ParamAnnotations>>,
    pub annotation_directories: MixedSection<DirectoryEntry, DirectoryEntry>,
    /// Directory registry index per class position, parallel to the
    /// program's class list.
    pub class_directories: Vec<Option<usize>>,
}

impl MixedSections {
    pub fn new() -> Self {
        Self {
            codes: MixedSection::new(),
            debug_infos: MixedSection::new(),
            type_lists: MixedSection::new(),
            string_data: MixedSection::new(),
            annotations: MixedSection::new(),
            class_data: MixedSection::new(),
            encoded_arrays: MixedSection::new(),
            annotation_sets: MixedSection::new(),
            annotation_set_ref_lists: MixedSection::new(),
            annotation_directories: MixedSection::new(),
            class_directories: Vec::new(),
        }
    }
}

impl Default for MixedSections {
    fn default() -> Self {
        Self::new()
    }
}
