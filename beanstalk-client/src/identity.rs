//! # Process Identity
//!
//! The pool records which process created it and compares on every
//! checkout/release. A forked child sees a different identity and resets
//! the pool instead of sharing sockets with its parent.
//!
//! The probe is a trait so tests can simulate a fork without forking.

/// Source of the identity the pool is bound to.
pub trait ProcessIdentity: Send + Sync {
    /// Identity of the calling process.
    fn current(&self) -> u32;
}

/// Reads the operating-system process id.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsProcess;

impl ProcessIdentity for OsProcess {
    #[inline]
    fn current(&self) -> u32 {
        std::process::id()
    }
}
