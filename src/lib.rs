//! jasm: a single-file assembler for a small x86-64 assembly dialect,
//! featuring:
//! - a two-pass assembler (label/data resolution, then code emission)
//! - an ELF64 executable writer
//! - a raw headerless binary writer

pub mod assembler;
pub mod logging;
pub mod writer;
