//! SSA intermediate representation
//!
//! A small typed SSA-form IR: virtual registers, basic blocks with exactly
//! one terminator each, and a textual printing suitable for a downstream
//! toolchain. Pointers are opaque; the pointee type is supplied at each
//! load and store.

// Note: instr must come before types to avoid circular deps
mod instr;
mod types;
mod builder;
mod lower;
mod verify;

// Re-export in logical order
pub use instr::*;
pub use types::*;
pub use builder::*;
pub use lower::*;
pub use verify::*;
