use std::fmt;

use crate::cpu::OpCode;

/// Errors surfaced by the emulator core.
///
/// Most of these are structural defects rather than recoverable runtime
/// conditions: the frame loop propagates them up and the host aborts the
/// run. Writes to read-only or disabled memory are deliberately *not*
/// errors; the bus drops them the way the hardware does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A bus request hit an address no region owns. The MMU installs a
    /// full-range fallback block, so seeing this outside of hand-built
    /// buses indicates a wiring bug.
    AddressOutOfRange(u16),
    /// The CPU fetched an opcode with no table entry.
    InstructionNotFound(OpCode),
    /// The fetched opcode maps to a placeholder entry. Only meaningful
    /// while the instruction tables are being filled in; a complete build
    /// never produces it.
    InstructionNotImplemented(OpCode),
    /// The ROM header declares a memory bank controller we do not
    /// emulate. Callers degrade to an inert cartridge instead of
    /// aborting.
    UnsupportedCartridge(u8),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::AddressOutOfRange(addr) => {
                write!(f, "no memory region owns address 0x{addr:04X}")
            }
            Error::InstructionNotFound(opcode) => {
                write!(f, "unknown opcode {opcode}")
            }
            Error::InstructionNotImplemented(opcode) => {
                write!(f, "opcode {opcode} is not implemented")
            }
            Error::UnsupportedCartridge(kind) => {
                write!(f, "unsupported cartridge type 0x{kind:02X}")
            }
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;
