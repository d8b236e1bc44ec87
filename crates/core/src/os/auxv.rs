//! Auxiliary-vector keys.
//!
//! The kernel-to-userspace key/value pairs libc reads during startup. Only
//! the keys the bootstrap actually publishes are defined; values match the
//! Linux `AT_*` constants.

/// Key of one auxiliary-vector entry.
///
/// Serialized as one guest word followed by the value word; the vector is
/// terminated by a `(Null, 0)` pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuxKey {
    /// End of the auxiliary vector (`AT_NULL`).
    Null = 0,
    /// Guest address of the program-header table (`AT_PHDR`).
    Phdr = 3,
    /// Size in bytes of one program-header entry (`AT_PHENT`).
    Phent = 4,
    /// Number of program-header entries (`AT_PHNUM`).
    Phnum = 5,
    /// Page size in bytes (`AT_PAGESZ`).
    Pagesz = 6,
    /// Interpreter load base; always 0 here, static-only (`AT_BASE`).
    Base = 7,
    /// Processor flags; always 0 (`AT_FLAGS`).
    Flags = 8,
    /// Program entry point (`AT_ENTRY`).
    Entry = 9,
    /// Real user id; the sandbox has one fixed identity, 0 (`AT_UID`).
    Uid = 11,
    /// Effective user id, 0 (`AT_EUID`).
    Euid = 12,
    /// Real group id, 0 (`AT_GID`).
    Gid = 13,
    /// Effective group id, 0 (`AT_EGID`).
    Egid = 14,
    /// Guest address of the platform identifier string (`AT_PLATFORM`).
    Platform = 15,
    /// Hardware capability bitmask; always 0 (`AT_HWCAP`).
    Hwcap = 16,
    /// Clock ticks per second (`AT_CLKTCK`).
    Clktck = 17,
    /// Secure-execution flag; always 1 in the sandbox (`AT_SECURE`).
    Secure = 23,
    /// Guest address of 16 random bytes (`AT_RANDOM`).
    Random = 25,
}

impl AuxKey {
    /// The key as a guest word.
    pub fn val(self) -> u64 {
        self as u64
    }
}
