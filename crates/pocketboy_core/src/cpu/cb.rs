//! 0xCB-prefixed opcode table: rotates, shifts, swap, and bit tests.
//!
//! The 256-entry space is fully regular — operation in the top bits,
//! operand register in the low three — so the whole table is built out of
//! four exec functions that re-derive their operands from the opcode
//! byte. Costs include the prefix fetch: two machine cycles for register
//! operands, four for (HL) read-modify-write forms, three for BIT (HL).

use lazy_static::lazy_static;

use crate::error::Result;
use crate::machine::mmu::Mmu;

use super::command::Command;
use super::opcodes::Instruction;
use super::{Cpu, Flag};

lazy_static! {
    static ref CB_OPCODES: [Instruction; 256] = build_table();
}

pub(super) fn lookup(op: u8) -> Instruction {
    CB_OPCODES[op as usize]
}

fn build_table() -> [Instruction; 256] {
    let placeholder = Instruction {
        mnemonic: "CB",
        cost: 2,
        exec: |_, _, _| Ok(None),
    };
    let mut table = [placeholder; 256];

    for op in 0..=0xFFu8 {
        let uses_hl = op & 0x07 == 6;
        let (mnemonic, cost, exec): (&'static str, u8, super::opcodes::ExecFn) = match op >> 6 {
            0 => {
                let mnemonic = match (op >> 3) & 0x07 {
                    0 => "RLC r",
                    1 => "RRC r",
                    2 => "RL r",
                    3 => "RR r",
                    4 => "SLA r",
                    5 => "SRA r",
                    6 => "SWAP r",
                    _ => "SRL r",
                };
                (mnemonic, if uses_hl { 4 } else { 2 }, rotate_shift)
            }
            1 => ("BIT b,r", if uses_hl { 3 } else { 2 }, bit),
            2 => ("RES b,r", if uses_hl { 4 } else { 2 }, res),
            _ => ("SET b,r", if uses_hl { 4 } else { 2 }, set),
        };
        table[op as usize] = Instruction {
            mnemonic,
            cost,
            exec,
        };
    }
    table
}

fn rotate_shift(cpu: &mut Cpu, mmu: &mut Mmu, op: u8) -> Result<Option<Command>> {
    let index = op & 0x07;
    let value = cpu.read_reg8(mmu, index)?;
    let result = match (op >> 3) & 0x07 {
        0 => cpu.alu_rlc(value, true),
        1 => cpu.alu_rrc(value, true),
        2 => cpu.alu_rl(value, true),
        3 => cpu.alu_rr(value, true),
        4 => cpu.alu_sla(value),
        5 => cpu.alu_sra(value),
        6 => cpu.alu_swap(value),
        _ => cpu.alu_srl(value),
    };
    cpu.write_reg8(mmu, index, result)?;
    Ok(None)
}

fn bit(cpu: &mut Cpu, mmu: &mut Mmu, op: u8) -> Result<Option<Command>> {
    let value = cpu.read_reg8(mmu, op & 0x07)?;
    let mask = 1 << ((op >> 3) & 0x07);
    cpu.set_flag(Flag::Z, value & mask == 0);
    cpu.set_flag(Flag::N, false);
    cpu.set_flag(Flag::H, true);
    Ok(None)
}

fn res(cpu: &mut Cpu, mmu: &mut Mmu, op: u8) -> Result<Option<Command>> {
    let index = op & 0x07;
    let mask = 1 << ((op >> 3) & 0x07);
    let value = cpu.read_reg8(mmu, index)?;
    cpu.write_reg8(mmu, index, value & !mask)?;
    Ok(None)
}

fn set(cpu: &mut Cpu, mmu: &mut Mmu, op: u8) -> Result<Option<Command>> {
    let index = op & 0x07;
    let mask = 1 << ((op >> 3) & 0x07);
    let value = cpu.read_reg8(mmu, index)?;
    cpu.write_reg8(mmu, index, value | mask)?;
    Ok(None)
}
