use std::fmt::Debug;

use thiserror::Error;

#[derive(Error)]
pub enum DexWriteError {
    #[error("Default interface methods are only supported starting with Android N: {method}")]
    DefaultInterfaceMethod { method: String },

    #[error("Static interface methods are only supported starting with Android N: {method}")]
    StaticInterfaceMethod { method: String },

    #[error("Private interface methods are only supported starting with Android N: {method}")]
    PrivateInterfaceMethod { method: String },

    #[error("Interface must not have constructors: {method}")]
    InterfaceConstructor { method: String },

    #[error("Interface methods must not be protected or package private: {method}")]
    InterfaceMethodVisibility { method: String },

    #[error(
        "Invoke-custom is only supported starting with Android O \
         ({call_sites} call sites, {method_handles} method handles)"
    )]
    InvokeCustomUnsupported {
        call_sites: usize,
        method_handles: usize,
    },

    #[error("Buffer limit reached ({requested} bytes requested, limit is {limit})")]
    BufferExhausted { requested: usize, limit: usize },

    #[error("Too many entries in {pool} pool ({count}, at most {max})")]
    PoolOverflow {
        pool: &'static str,
        count: usize,
        max: usize,
    },

    #[error("Renamed string {value:?} is not present in the string pool")]
    StringNotInPool { value: String },
}

#[macro_export]
macro_rules! write_err {
    ($name:ident) => {
        Err($crate::error::DexWriteError::$name)
    };
    ($name:ident { $($arg:tt)* }) => {
        Err($crate::error::DexWriteError::$name { $($arg)* })
    };
    ($name:ident, $($arg:tt)*) => {
        Err($crate::error::DexWriteError::$name($($arg)*))
    };
}

impl Debug for DexWriteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self)
    }
}

/// Receives diagnostics before a fatal error is propagated to the caller.
pub trait DiagnosticSink {
    fn warning(&self, message: &str);

    fn error(&self, message: &str);
}

/// Default sink forwarding everything to the `log` facade.
pub struct LogSink;

impl DiagnosticSink for LogSink {
    fn warning(&self, message: &str) {
        log::warn!("{}", message);
    }

    fn error(&self, message: &str) {
        log::error!("{}", message);
    }
}
