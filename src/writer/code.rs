use std::mem::size_of;

use super::buffer::OutputBuffer;
use super::structs::{CodeItem, TryItem};
use crate::leb128::{leb128_size, sleb128_size};
use crate::lens::{DesugaredLibraryKeep, GraphLens};
use crate::program::{CatchHandler, DexCode, DexProgram, MethodIndex};
use crate::Result;

/// Writes one method's instruction stream at the buffer's cursor. The
/// stream is already encoded by the pipeline; implementations that patch
/// references on the way out get the pool, the graph lens and the keep
/// sink for their side effects.
pub trait InstructionEncoder {
    fn write_instructions(
        &self,
        out: &mut OutputBuffer<'_>,
        code: &DexCode,
        method_idx: MethodIndex,
        program: &DexProgram,
        graph: &dyn GraphLens,
        keep: &mut dyn DesugaredLibraryKeep,
    ) -> Result<()>;
}

/// Default encoder: copies the pre-encoded code units verbatim.
pub struct RawInstructionEncoder;

impl InstructionEncoder for RawInstructionEncoder {
    fn write_instructions(
        &self,
        out: &mut OutputBuffer<'_>,
        code: &DexCode,
        _method_idx: MethodIndex,
        _program: &DexProgram,
        _graph: &dyn GraphLens,
        _keep: &mut dyn DesugaredLibraryKeep,
    ) -> Result<()> {
        for &unit in &code.insns {
            out.write_u16(unit)?;
        }
        Ok(())
    }
}

/// Byte size of the code_item as it will be written, header through
/// handler table. The codes region is skipped ahead of emission based on
/// these sizes, so this must agree with [`write_code_item`] including its
/// internal padding.
pub fn size_of_code_item(code: &DexCode, graph: &dyn GraphLens) -> u32 {
    let mut size = size_of::<CodeItem>() as u32 + code.insns.len() as u32 * 2;
    if !code.tries.is_empty() {
        if code.insns.len() % 2 == 1 {
            size += 2;
        }
        size += code.tries.len() as u32 * size_of::<TryItem>() as u32;
        size += leb128_size(code.handlers.len() as u32) as u32;
        for handler in &code.handlers {
            size += handler_size(handler, graph);
        }
    }
    size
}

fn handler_size(handler: &CatchHandler, graph: &dyn GraphLens) -> u32 {
    let pair_count = handler.pairs.len() as i32;
    let signed_count = if handler.catch_all_addr.is_some() {
        -pair_count
    } else {
        pair_count
    };
    let mut size = sleb128_size(signed_count) as u32;
    for pair in &handler.pairs {
        size += leb128_size(graph.lookup_type(pair.type_idx) as u32) as u32;
        size += leb128_size(pair.addr) as u32;
    }
    if let Some(addr) = handler.catch_all_addr {
        size += leb128_size(addr) as u32;
    }
    size
}

/// Emits one code_item at the current (4-aligned) cursor: fixed header,
/// instruction stream, then the try and handler tables. The instruction
/// word count is backpatched once the delegated encoder is done, and the
/// handler table goes out before the reserved try records so that the
/// handler offsets are known when the tries are filled in.
#[allow(clippy::too_many_arguments)]
pub(crate) fn write_code_item(
    out: &mut OutputBuffer<'_>,
    code: &DexCode,
    method_idx: MethodIndex,
    debug_info_off: u32,
    program: &DexProgram,
    encoder: &dyn InstructionEncoder,
    graph: &dyn GraphLens,
    keep: &mut dyn DesugaredLibraryKeep,
) -> Result<()> {
    debug_assert!(out.is_aligned(4));
    out.write_u16(code.registers_size)?;
    out.write_u16(code.ins_size)?;
    out.write_u16(code.outs_size)?;
    out.write_u16(code.tries.len() as u16)?;
    out.write_u32(debug_info_off)?;

    let insns_size_pos = out.position();
    out.write_u32(0)?;
    let insns_start = out.position();
    encoder.write_instructions(out, code, method_idx, program, graph, keep)?;
    let insn_bytes = out.position() - insns_start;
    debug_assert!(insn_bytes % 2 == 0, "instruction stream not in code units");
    let insn_units = insn_bytes / 2;
    let after_insns = out.position();
    out.move_to(insns_size_pos);
    out.write_u32(insn_units)?;
    out.move_to(after_insns);

    if !code.tries.is_empty() {
        if insn_units % 2 == 1 {
            out.write_u16(0)?;
        }
        let tries_pos = out.position();
        out.forward(code.tries.len() as u32 * size_of::<TryItem>() as u32);

        let handlers_base = out.position();
        out.write_uleb128(code.handlers.len() as u32)?;
        let mut handler_offsets = Vec::with_capacity(code.handlers.len());
        for handler in &code.handlers {
            handler_offsets.push(out.position() - handlers_base);
            let pair_count = handler.pairs.len() as i32;
            out.write_sleb128(if handler.catch_all_addr.is_some() {
                -pair_count
            } else {
                pair_count
            })?;
            for pair in &handler.pairs {
                let rewritten = graph.lookup_type(pair.type_idx);
                keep.record_class(rewritten);
                out.write_uleb128(rewritten as u32)?;
                out.write_uleb128(pair.addr)?;
            }
            if let Some(addr) = handler.catch_all_addr {
                out.write_uleb128(addr)?;
            }
        }

        let end = out.position();
        out.move_to(tries_pos);
        for try_block in &code.tries {
            out.write_u32(try_block.start_addr)?;
            out.write_u16(try_block.insn_count)?;
            out.write_u16(handler_offsets[try_block.handler_index] as u16)?;
        }
        out.move_to(end);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lens::{IdentityLens, NoKeep};
    use crate::program::{TryBlock, TypeAddrPair};
    use crate::writer::buffer::HeapBufferProvider;

    fn emit(code: &DexCode) -> Vec<u8> {
        let provider = HeapBufferProvider::new();
        let mut out = OutputBuffer::new(&provider, 256);
        let program = DexProgram::new();
        write_code_item(
            &mut out,
            code,
            0,
            0,
            &program,
            &RawInstructionEncoder,
            &IdentityLens,
            &mut NoKeep,
        )
        .unwrap();
        out.steal_buffer()
    }

    fn plain_code(insns: Vec<u16>) -> DexCode {
        DexCode {
            registers_size: 1,
            ins_size: 0,
            outs_size: 0,
            insns,
            tries: Vec::new(),
            handlers: Vec::new(),
            debug_info: None,
        }
    }

    #[test]
    fn test_plain_code_item() {
        let code = plain_code(vec![0x000e]);
        let bytes = emit(&code);
        assert_eq!(bytes.len() as u32, size_of_code_item(&code, &IdentityLens));
        // registers, ins, outs, tries
        assert_eq!(&bytes[..8], &[1, 0, 0, 0, 0, 0, 0, 0]);
        // debug_info_off 0, insns_size 1, return-void unit
        assert_eq!(&bytes[8..12], &[0, 0, 0, 0]);
        assert_eq!(&bytes[12..16], &[1, 0, 0, 0]);
        assert_eq!(&bytes[16..], &[0x0e, 0x00]);
    }

    #[test]
    fn test_tries_and_handlers() {
        let mut code = plain_code(vec![0, 0, 0, 0x000e]);
        code.tries.push(TryBlock {
            start_addr: 0,
            insn_count: 4,
            handler_index: 0,
        });
        code.handlers.push(CatchHandler {
            pairs: vec![TypeAddrPair {
                type_idx: 3,
                addr: 2,
            }],
            catch_all_addr: Some(3),
        });
        let bytes = emit(&code);
        assert_eq!(bytes.len() as u32, size_of_code_item(&code, &IdentityLens));
        // 4 even code units: no pad, try item at 24.
        assert_eq!(bytes[6], 1); // tries_size
        assert_eq!(&bytes[24..28], &[0, 0, 0, 0]); // start_addr
        assert_eq!(&bytes[28..30], &[4, 0]); // insn_count
        assert_eq!(&bytes[30..32], &[1, 0]); // handler_off
        // handler list: size 1, then -1 pairs, (type 3, addr 2), catch-all 3.
        assert_eq!(&bytes[32..], &[0x01, 0x7f, 0x03, 0x02, 0x03]);
    }

    #[test]
    fn test_odd_insns_padded_before_tries() {
        let mut code = plain_code(vec![0x000e]);
        code.tries.push(TryBlock {
            start_addr: 0,
            insn_count: 1,
            handler_index: 0,
        });
        code.handlers.push(CatchHandler {
            pairs: Vec::new(),
            catch_all_addr: Some(0),
        });
        let bytes = emit(&code);
        assert_eq!(bytes.len() as u32, size_of_code_item(&code, &IdentityLens));
        // 16 header + 2 insns + 2 pad, tries start at 20.
        assert_eq!(&bytes[18..20], &[0, 0]);
        assert_eq!(&bytes[20..24], &[0, 0, 0, 0]);
        // handler list: size 1, -0 pairs with catch-all, addr 0.
        assert_eq!(&bytes[28..], &[0x01, 0x00, 0x00]);
    }

    #[test]
    fn test_size_without_tries_has_no_padding() {
        let code = plain_code(vec![0x000e]);
        assert_eq!(size_of_code_item(&code, &IdentityLens), 18);
    }
}
