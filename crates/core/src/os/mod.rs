//! Linux-compatible process environment.
//!
//! Everything a statically-linked libc expects to find before its first
//! instruction runs:
//! 1. **Loader:** Minimal `PT_LOAD` segment copy and entry-point setup.
//! 2. **Auxv:** The auxiliary-vector keys the bootstrap publishes.
//! 3. **Bootstrap:** The one-shot initial stack image (canary, platform
//!    string, program headers, argv/envp, auxiliary vector).

/// Auxiliary-vector keys.
pub mod auxv;
/// Initial stack image construction.
pub mod bootstrap;
/// ELF segment loader.
pub mod loader;
