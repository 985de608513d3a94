use std::result;

pub mod error;
pub mod leb128;
pub mod lens;
pub mod modifiers;
pub mod mutf8;
pub mod options;
pub mod program;
pub mod writer;

pub type Result<T> = result::Result<T, error::DexWriteError>;
