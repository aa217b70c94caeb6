//! An emulator for the LS-8, a toy 8-bit machine with 256 bytes of memory
//! and eight registers.
//!
//! Programs are text files holding one binary byte per line, see
//! [`region::Chunk`].

pub mod memory;
pub mod opcode;
pub mod region;
pub mod vm;
