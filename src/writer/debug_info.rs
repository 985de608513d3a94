use crate::leb128::{encode_leb128, encode_leb128p1};
use crate::lens::GraphLens;
use crate::program::{DexDebugInfo, DexProgram};

#[rustfmt::skip]
pub mod opcodes {
    pub const DBG_END_SEQUENCE: u8         = 0x00;
    pub const DBG_ADVANCE_PC: u8           = 0x01;
    pub const DBG_ADVANCE_LINE: u8         = 0x02;
    pub const DBG_START_LOCAL: u8          = 0x03;
    pub const DBG_START_LOCAL_EXTENDED: u8 = 0x04;
    pub const DBG_END_LOCAL: u8            = 0x05;
    pub const DBG_RESTART_LOCAL: u8        = 0x06;
    pub const DBG_SET_PROLOGUE_END: u8     = 0x07;
    pub const DBG_SET_EPILOGUE_BEGIN: u8   = 0x08;
    pub const DBG_SET_FILE: u8             = 0x09;

    pub const DBG_FIRST_SPECIAL: u8        = 0x0a;
    pub const DBG_LINE_BASE: i8            = -4;
    pub const DBG_LINE_RANGE: u8           = 15;
}

/// Produces the serialized form of one debug_info_item. The writer stores
/// the returned bytes verbatim, so a pipeline with its own debug bytecode
/// generator plugs in here.
pub trait DebugInfoEncoder {
    fn generate(
        &self,
        info: &DexDebugInfo,
        program: &DexProgram,
        graph: &dyn GraphLens,
    ) -> Vec<u8>;
}

/// Default encoder: header (line start, parameter names) followed by the
/// pre-encoded event stream and END_SEQUENCE.
pub struct DebugEventWriter;

impl DebugInfoEncoder for DebugEventWriter {
    fn generate(
        &self,
        info: &DexDebugInfo,
        _program: &DexProgram,
        _graph: &dyn GraphLens,
    ) -> Vec<u8> {
        let mut out = Vec::with_capacity(info.events.len() + 8);
        push_uleb(&mut out, info.line_start);
        push_uleb(&mut out, info.parameter_names.len() as u32);
        for name in &info.parameter_names {
            let (bytes, size) = encode_leb128p1(match name {
                Some(index) => *index as i32,
                None => -1,
            });
            out.extend_from_slice(&bytes[..size]);
        }
        out.extend_from_slice(&info.events);
        out.push(opcodes::DBG_END_SEQUENCE);
        out
    }
}

fn push_uleb(out: &mut Vec<u8>, value: u32) {
    let (bytes, size) = encode_leb128(value);
    out.extend_from_slice(&bytes[..size]);
}
