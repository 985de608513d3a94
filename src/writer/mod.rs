use crate::error::{DiagnosticSink, LogSink};
use crate::lens::{DesugaredLibraryKeep, GraphLens, IdentityLens, NamingLens};
use crate::options::WriterOptions;
use crate::program::DexProgram;
use crate::{write_err, Result};

pub mod buffer;
pub mod code;
mod collect;
pub mod debug_info;
pub mod encoded_value;
pub mod layout;
pub mod mixed;
mod sections;
pub mod structs;
pub mod validate;

pub use buffer::{ByteBufferProvider, HeapBufferProvider, OutputBuffer};
pub use code::{size_of_code_item, InstructionEncoder, RawInstructionEncoder};
pub use debug_info::{DebugEventWriter, DebugInfoEncoder};
pub use validate::{is_valid_class_descriptor, is_valid_simple_name};

use collect::DependencyCollector;
use layout::Layout;
use mixed::MixedSections;

static IDENTITY_LENS: IdentityLens = IdentityLens;
static RAW_INSTRUCTION_ENCODER: RawInstructionEncoder = RawInstructionEncoder;
static DEBUG_EVENT_WRITER: DebugEventWriter = DebugEventWriter;
static LOG_SINK: LogSink = LogSink;

/// Emission advances through these states exactly once, in order. Every
/// phase method asserts its predecessor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Built,
    Collected,
    Planned,
    Emitted,
    Finalised,
}

/// Serializes one [`DexProgram`] into a container image. A writer is
/// single-use: [`generate`](DexWriter::generate) consumes it. Independent
/// writers may run concurrently, each with its own leased buffer.
pub struct DexWriter<'a> {
    program: &'a DexProgram,
    options: WriterOptions,
    naming: &'a dyn NamingLens,
    graph: &'a dyn GraphLens,
    instruction_encoder: &'a dyn InstructionEncoder,
    debug_encoder: &'a dyn DebugInfoEncoder,
    sink: &'a dyn DiagnosticSink,
    mixed: MixedSections,
    layout: Layout,
    sorted_codes: Vec<usize>,
    phase: Phase,
}

impl<'a> DexWriter<'a> {
    pub fn new(program: &'a DexProgram, options: WriterOptions) -> Self {
        let layout = Layout::plan(program);
        Self {
            program,
            options,
            naming: &IDENTITY_LENS,
            graph: &IDENTITY_LENS,
            instruction_encoder: &RAW_INSTRUCTION_ENCODER,
            debug_encoder: &DEBUG_EVENT_WRITER,
            sink: &LOG_SINK,
            mixed: MixedSections::new(),
            layout,
            sorted_codes: Vec::new(),
            phase: Phase::Built,
        }
    }

    pub fn naming_lens(mut self, naming: &'a dyn NamingLens) -> Self {
        self.naming = naming;
        self
    }

    pub fn graph_lens(mut self, graph: &'a dyn GraphLens) -> Self {
        self.graph = graph;
        self
    }

    pub fn instruction_encoder(mut self, encoder: &'a dyn InstructionEncoder) -> Self {
        self.instruction_encoder = encoder;
        self
    }

    pub fn debug_info_encoder(mut self, encoder: &'a dyn DebugInfoEncoder) -> Self {
        self.debug_encoder = encoder;
        self
    }

    pub fn diagnostics(mut self, sink: &'a dyn DiagnosticSink) -> Self {
        self.sink = sink;
        self
    }

    /// Runs the full pipeline and returns the image plus its length. The
    /// buffer lease is returned to the provider on every failure path; on
    /// success ownership moves to the caller.
    pub fn generate(
        mut self,
        provider: &dyn ByteBufferProvider,
        keep: &mut dyn DesugaredLibraryKeep,
    ) -> Result<(Vec<u8>, usize)> {
        self.validate()?;
        self.collect();
        self.plan()?;

        let mut out = OutputBuffer::new(provider, self.estimated_size());
        self.emit(&mut out, keep)?;
        self.finalise(&mut out)?;

        let length = out.end_of_file() as usize;
        log::debug!("emitted {} bytes", length);
        Ok((out.steal_buffer(), length))
    }

    fn advance(&mut self, from: Phase, to: Phase) {
        debug_assert_eq!(self.phase, from, "phase transition out of order");
        self.phase = to;
    }

    /// Everything that can reject the input runs before a single byte is
    /// written.
    fn validate(&mut self) -> Result<()> {
        debug_assert_eq!(self.phase, Phase::Built);
        validate::check_interface_methods(self.program, &self.options, self.naming, self.sink)?;
        validate::check_invoke_custom(self.program, &self.options, self.sink)?;
        debug_assert!(
            self.options.skip_name_validation
                || validate::names_are_valid(self.program, self.options.min_api),
            "invalid member or class name for the target API level"
        );
        Ok(())
    }

    fn collect(&mut self) {
        self.advance(Phase::Built, Phase::Collected);
        self.mixed = DependencyCollector::new(self.program, &self.options, self.naming).run();
    }

    fn plan(&mut self) -> Result<()> {
        self.advance(Phase::Collected, Phase::Planned);
        if self.program.types.len() > 1 << 16 {
            return write_err!(PoolOverflow {
                pool: "type",
                count: self.program.types.len(),
                max: 1 << 16,
            });
        }
        if self.program.protos.len() > 1 << 16 {
            return write_err!(PoolOverflow {
                pool: "proto",
                count: self.program.protos.len(),
                max: 1 << 16,
            });
        }
        log::debug!(
            "fixed layout planned, data section at {:#x}",
            self.layout.data_section_offset
        );
        Ok(())
    }

    fn emit(&mut self, out: &mut OutputBuffer<'_>, keep: &mut dyn DesugaredLibraryKeep) -> Result<()> {
        self.advance(Phase::Planned, Phase::Emitted);
        out.move_to(self.layout.data_section_offset);
        self.emit_codes_and_debug(out, keep)?;
        self.emit_type_lists(out)?;
        self.emit_string_data(out)?;
        self.emit_annotations(out)?;
        self.emit_class_data(out)?;
        self.emit_encoded_arrays(out)?;
        self.emit_annotation_sets(out)?;
        self.emit_annotation_set_ref_lists(out)?;
        self.emit_annotation_directories(out)?;
        self.emit_map(out)?;
        self.emit_id_tables(out)?;
        Ok(())
    }

    fn finalise(&mut self, out: &mut OutputBuffer<'_>) -> Result<()> {
        self.advance(Phase::Emitted, Phase::Finalised);
        self.emit_header(out)?;
        self.seal(out)
    }

    fn estimated_size(&self) -> usize {
        let mut size = self.layout.data_section_offset as usize;
        for index in 0..self.mixed.codes.len() {
            size += size_of_code_item(&self.mixed.codes.get(index).code, self.graph) as usize + 3;
        }
        for string in self.program.strings.iter() {
            size += string.len() + 6;
        }
        size + 512
    }
}
