use super::OpCode;

/// One unit of CPU work: a micro-op plus the cycle cost it consumes.
///
/// Multi-cycle instructions are chains of these: executing a command may
/// yield a continuation that is pushed back to the front of the queue, so
/// a taken branch charges its extra cycles through a follow-up command
/// while the not-taken path stops after the base cost. Interrupts are
/// only examined between chains, never in the middle of one.
pub(crate) struct Command {
    pub(crate) cost: u8,
    pub(crate) kind: CommandKind,
}

pub(crate) enum CommandKind {
    /// Decode and run a fetched opcode through the instruction tables.
    Execute(OpCode),
    /// Late program-counter load for a taken jump.
    Jump(u16),
    /// Push the current program counter, then jump (taken CALL, RST).
    Call(u16),
    /// Pop the program counter (taken RET); RETI re-enables interrupts
    /// on the way out.
    Return { enable_ime: bool },
}

impl Command {
    pub(crate) fn execute(cost: u8, opcode: OpCode) -> Self {
        Self {
            cost,
            kind: CommandKind::Execute(opcode),
        }
    }

    pub(crate) fn jump(target: u16) -> Self {
        Self {
            cost: 1,
            kind: CommandKind::Jump(target),
        }
    }

    pub(crate) fn call(target: u16) -> Self {
        Self {
            cost: 3,
            kind: CommandKind::Call(target),
        }
    }

    pub(crate) fn ret(enable_ime: bool) -> Self {
        Self {
            cost: 3,
            kind: CommandKind::Return { enable_ime },
        }
    }
}
