//! Single-byte opcode table.
//!
//! Every opcode maps to an [`Instruction`]: its base cycle cost (in
//! machine cycles) and an exec function. Variable-cost instructions
//! (conditional jumps, calls, returns) declare their not-taken cost here
//! and charge the taken path through a continuation [`Command`], so the
//! cycle accounting falls out of the command chain rather than a special
//! case in the runner. The eleven holes in the map are the hardware's
//! illegal opcodes; fetching one fails with `InstructionNotFound`.

use lazy_static::lazy_static;

use crate::error::Result;
use crate::machine::mmu::Mmu;

use super::command::Command;
use super::{Cpu, Flag};

pub(super) type ExecFn = fn(&mut Cpu, &mut Mmu, u8) -> Result<Option<Command>>;

#[derive(Copy, Clone)]
pub(super) struct Instruction {
    pub(super) mnemonic: &'static str,
    pub(super) cost: u8,
    pub(super) exec: ExecFn,
}

lazy_static! {
    static ref OPCODES: [Option<Instruction>; 256] = build_table();
}

pub(super) fn lookup(op: u8) -> Option<Instruction> {
    OPCODES[op as usize]
}

fn build_table() -> [Option<Instruction>; 256] {
    let mut table: [Option<Instruction>; 256] = [None; 256];
    let mut set = |op: u8, mnemonic: &'static str, cost: u8, exec: ExecFn| {
        table[op as usize] = Some(Instruction {
            mnemonic,
            cost,
            exec,
        });
    };

    set(0x00, "NOP", 1, nop);
    set(0x10, "STOP", 1, stop);
    set(0x76, "HALT", 1, halt);
    set(0xF3, "DI", 1, di);
    set(0xFB, "EI", 1, ei);

    set(0x27, "DAA", 1, daa);
    set(0x2F, "CPL", 1, cpl);
    set(0x37, "SCF", 1, scf);
    set(0x3F, "CCF", 1, ccf);

    set(0x07, "RLCA", 1, rlca);
    set(0x0F, "RRCA", 1, rrca);
    set(0x17, "RLA", 1, rla);
    set(0x1F, "RRA", 1, rra);

    // 8-bit register/memory transfers, 0x40-0x7F (0x76 is HALT above).
    for op in 0x40..=0x7F {
        if op == 0x76 {
            continue;
        }
        let cost = if op & 0x07 == 6 || (op >> 3) & 0x07 == 6 {
            2
        } else {
            1
        };
        set(op, "LD r,r'", cost, ld_r_r);
    }

    // LD r,d8 (covers LD (HL),d8 at 0x36).
    for op in [0x06, 0x0E, 0x16, 0x1E, 0x26, 0x2E, 0x36, 0x3E] {
        let cost = if op == 0x36 { 3 } else { 2 };
        set(op, "LD r,d8", cost, ld_r_d8);
    }

    // 16-bit immediate loads.
    for op in [0x01, 0x11, 0x21, 0x31] {
        set(op, "LD rr,d16", 3, ld_rr_d16);
    }

    // A <-> indirect transfers through BC/DE/HL+/HL-.
    for op in [0x02, 0x12, 0x22, 0x32] {
        set(op, "LD (rr),A", 2, ld_indirect_store);
    }
    for op in [0x0A, 0x1A, 0x2A, 0x3A] {
        set(op, "LD A,(rr)", 2, ld_indirect_load);
    }

    set(0x08, "LD (a16),SP", 5, ld_a16_sp);

    // 16-bit increments/decrements and ADD HL,rr.
    for op in [0x03, 0x13, 0x23, 0x33] {
        set(op, "INC rr", 2, inc_rr);
    }
    for op in [0x0B, 0x1B, 0x2B, 0x3B] {
        set(op, "DEC rr", 2, dec_rr);
    }
    for op in [0x09, 0x19, 0x29, 0x39] {
        set(op, "ADD HL,rr", 2, add_hl_rr);
    }

    // 8-bit increments/decrements (covers (HL) forms).
    for op in [0x04, 0x0C, 0x14, 0x1C, 0x24, 0x2C, 0x34, 0x3C] {
        let cost = if op == 0x34 { 3 } else { 1 };
        set(op, "INC r", cost, inc_r);
    }
    for op in [0x05, 0x0D, 0x15, 0x1D, 0x25, 0x2D, 0x35, 0x3D] {
        let cost = if op == 0x35 { 3 } else { 1 };
        set(op, "DEC r", cost, dec_r);
    }

    // ALU on a register operand, 0x80-0xBF.
    for op in 0x80..=0xBF {
        let cost = if op & 0x07 == 6 { 2 } else { 1 };
        set(op, "ALU A,r", cost, alu_r);
    }
    // ALU on an immediate operand.
    for op in [0xC6, 0xCE, 0xD6, 0xDE, 0xE6, 0xEE, 0xF6, 0xFE] {
        set(op, "ALU A,d8", 2, alu_d8);
    }

    // Relative jumps.
    set(0x18, "JR r8", 2, jr_r8);
    for op in [0x20, 0x28, 0x30, 0x38] {
        set(op, "JR cc,r8", 2, jr_cc);
    }

    // Absolute jumps.
    set(0xC3, "JP a16", 3, jp_a16);
    for op in [0xC2, 0xCA, 0xD2, 0xDA] {
        set(op, "JP cc,a16", 3, jp_cc);
    }
    set(0xE9, "JP (HL)", 1, jp_hl);

    // Calls, returns, restarts.
    set(0xCD, "CALL a16", 3, call_a16);
    for op in [0xC4, 0xCC, 0xD4, 0xDC] {
        set(op, "CALL cc,a16", 3, call_cc);
    }
    set(0xC9, "RET", 1, ret);
    set(0xD9, "RETI", 1, reti);
    for op in [0xC0, 0xC8, 0xD0, 0xD8] {
        set(op, "RET cc", 2, ret_cc);
    }
    for op in [0xC7, 0xCF, 0xD7, 0xDF, 0xE7, 0xEF, 0xF7, 0xFF] {
        set(op, "RST", 1, rst);
    }

    // Stack transfers.
    for op in [0xC5, 0xD5, 0xE5, 0xF5] {
        set(op, "PUSH rr", 4, push_rr);
    }
    for op in [0xC1, 0xD1, 0xE1, 0xF1] {
        set(op, "POP rr", 3, pop_rr);
    }

    // High-page and absolute A transfers.
    set(0xE0, "LDH (a8),A", 3, ldh_a8_store);
    set(0xF0, "LDH A,(a8)", 3, ldh_a8_load);
    set(0xE2, "LDH (C),A", 2, ldh_c_store);
    set(0xF2, "LDH A,(C)", 2, ldh_c_load);
    set(0xEA, "LD (a16),A", 4, ld_a16_store);
    set(0xFA, "LD A,(a16)", 4, ld_a16_load);

    // Stack-pointer arithmetic.
    set(0xE8, "ADD SP,r8", 4, add_sp_r8);
    set(0xF8, "LD HL,SP+r8", 3, ld_hl_sp_r8);
    set(0xF9, "LD SP,HL", 2, ld_sp_hl);

    table
}

// ---- Control -------------------------------------------------------

fn nop(_cpu: &mut Cpu, _mmu: &mut Mmu, _op: u8) -> Result<Option<Command>> {
    Ok(None)
}

fn halt(cpu: &mut Cpu, _mmu: &mut Mmu, _op: u8) -> Result<Option<Command>> {
    cpu.halted = true;
    Ok(None)
}

fn stop(cpu: &mut Cpu, mmu: &mut Mmu, _op: u8) -> Result<Option<Command>> {
    // STOP is a two-byte instruction; the padding byte is consumed and
    // ignored. We treat the low-power state like HALT: parked until an
    // interrupt request arrives.
    let _padding = cpu.fetch8(mmu)?;
    cpu.halted = true;
    log::debug!("cpu stopped at pc=0x{:04X}", cpu.regs.pc);
    Ok(None)
}

fn di(cpu: &mut Cpu, _mmu: &mut Mmu, _op: u8) -> Result<Option<Command>> {
    cpu.ime = false;
    cpu.ime_enable_pending = false;
    cpu.ime_enable_delay = false;
    Ok(None)
}

fn ei(cpu: &mut Cpu, _mmu: &mut Mmu, _op: u8) -> Result<Option<Command>> {
    cpu.ime_enable_pending = true;
    Ok(None)
}

fn daa(cpu: &mut Cpu, _mmu: &mut Mmu, _op: u8) -> Result<Option<Command>> {
    cpu.alu_daa();
    Ok(None)
}

fn cpl(cpu: &mut Cpu, _mmu: &mut Mmu, _op: u8) -> Result<Option<Command>> {
    cpu.regs.a = !cpu.regs.a;
    cpu.set_flag(Flag::N, true);
    cpu.set_flag(Flag::H, true);
    Ok(None)
}

fn scf(cpu: &mut Cpu, _mmu: &mut Mmu, _op: u8) -> Result<Option<Command>> {
    cpu.set_flag(Flag::N, false);
    cpu.set_flag(Flag::H, false);
    cpu.set_flag(Flag::C, true);
    Ok(None)
}

fn ccf(cpu: &mut Cpu, _mmu: &mut Mmu, _op: u8) -> Result<Option<Command>> {
    let carry = cpu.flag(Flag::C);
    cpu.set_flag(Flag::N, false);
    cpu.set_flag(Flag::H, false);
    cpu.set_flag(Flag::C, !carry);
    Ok(None)
}

// ---- Rotates on A (Z always cleared) -------------------------------

fn rlca(cpu: &mut Cpu, _mmu: &mut Mmu, _op: u8) -> Result<Option<Command>> {
    cpu.regs.a = cpu.alu_rlc(cpu.regs.a, false);
    Ok(None)
}

fn rrca(cpu: &mut Cpu, _mmu: &mut Mmu, _op: u8) -> Result<Option<Command>> {
    cpu.regs.a = cpu.alu_rrc(cpu.regs.a, false);
    Ok(None)
}

fn rla(cpu: &mut Cpu, _mmu: &mut Mmu, _op: u8) -> Result<Option<Command>> {
    cpu.regs.a = cpu.alu_rl(cpu.regs.a, false);
    Ok(None)
}

fn rra(cpu: &mut Cpu, _mmu: &mut Mmu, _op: u8) -> Result<Option<Command>> {
    cpu.regs.a = cpu.alu_rr(cpu.regs.a, false);
    Ok(None)
}

// ---- Loads ---------------------------------------------------------

fn ld_r_r(cpu: &mut Cpu, mmu: &mut Mmu, op: u8) -> Result<Option<Command>> {
    let value = cpu.read_reg8(mmu, op & 0x07)?;
    cpu.write_reg8(mmu, (op >> 3) & 0x07, value)?;
    Ok(None)
}

fn ld_r_d8(cpu: &mut Cpu, mmu: &mut Mmu, op: u8) -> Result<Option<Command>> {
    let value = cpu.fetch8(mmu)?;
    cpu.write_reg8(mmu, (op >> 3) & 0x07, value)?;
    Ok(None)
}

fn ld_rr_d16(cpu: &mut Cpu, mmu: &mut Mmu, op: u8) -> Result<Option<Command>> {
    let value = cpu.fetch16(mmu)?;
    match (op >> 4) & 0x03 {
        0 => cpu.regs.set_bc(value),
        1 => cpu.regs.set_de(value),
        2 => cpu.regs.set_hl(value),
        _ => cpu.regs.sp = value,
    }
    Ok(None)
}

/// Indirect address for the 0x02/0x12/0x22/0x32 column; HL+ and HL-
/// post-adjust HL.
fn indirect_addr(cpu: &mut Cpu, op: u8) -> u16 {
    match (op >> 4) & 0x03 {
        0 => cpu.regs.bc(),
        1 => cpu.regs.de(),
        2 => {
            let addr = cpu.regs.hl();
            cpu.regs.set_hl(addr.wrapping_add(1));
            addr
        }
        _ => {
            let addr = cpu.regs.hl();
            cpu.regs.set_hl(addr.wrapping_sub(1));
            addr
        }
    }
}

fn ld_indirect_store(cpu: &mut Cpu, mmu: &mut Mmu, op: u8) -> Result<Option<Command>> {
    let addr = indirect_addr(cpu, op);
    mmu.write_byte(addr, cpu.regs.a)?;
    Ok(None)
}

fn ld_indirect_load(cpu: &mut Cpu, mmu: &mut Mmu, op: u8) -> Result<Option<Command>> {
    let addr = indirect_addr(cpu, op);
    cpu.regs.a = mmu.read_byte(addr)?;
    Ok(None)
}

fn ld_a16_sp(cpu: &mut Cpu, mmu: &mut Mmu, _op: u8) -> Result<Option<Command>> {
    let addr = cpu.fetch16(mmu)?;
    mmu.write_word(addr, cpu.regs.sp)?;
    Ok(None)
}

fn ldh_a8_store(cpu: &mut Cpu, mmu: &mut Mmu, _op: u8) -> Result<Option<Command>> {
    let offset = cpu.fetch8(mmu)? as u16;
    mmu.write_byte(0xFF00 | offset, cpu.regs.a)?;
    Ok(None)
}

fn ldh_a8_load(cpu: &mut Cpu, mmu: &mut Mmu, _op: u8) -> Result<Option<Command>> {
    let offset = cpu.fetch8(mmu)? as u16;
    cpu.regs.a = mmu.read_byte(0xFF00 | offset)?;
    Ok(None)
}

fn ldh_c_store(cpu: &mut Cpu, mmu: &mut Mmu, _op: u8) -> Result<Option<Command>> {
    mmu.write_byte(0xFF00 | cpu.regs.c as u16, cpu.regs.a)?;
    Ok(None)
}

fn ldh_c_load(cpu: &mut Cpu, mmu: &mut Mmu, _op: u8) -> Result<Option<Command>> {
    cpu.regs.a = mmu.read_byte(0xFF00 | cpu.regs.c as u16)?;
    Ok(None)
}

fn ld_a16_store(cpu: &mut Cpu, mmu: &mut Mmu, _op: u8) -> Result<Option<Command>> {
    let addr = cpu.fetch16(mmu)?;
    mmu.write_byte(addr, cpu.regs.a)?;
    Ok(None)
}

fn ld_a16_load(cpu: &mut Cpu, mmu: &mut Mmu, _op: u8) -> Result<Option<Command>> {
    let addr = cpu.fetch16(mmu)?;
    cpu.regs.a = mmu.read_byte(addr)?;
    Ok(None)
}

// ---- 16-bit arithmetic ---------------------------------------------

fn pair_value(cpu: &Cpu, op: u8) -> u16 {
    match (op >> 4) & 0x03 {
        0 => cpu.regs.bc(),
        1 => cpu.regs.de(),
        2 => cpu.regs.hl(),
        _ => cpu.regs.sp,
    }
}

fn set_pair_value(cpu: &mut Cpu, op: u8, value: u16) {
    match (op >> 4) & 0x03 {
        0 => cpu.regs.set_bc(value),
        1 => cpu.regs.set_de(value),
        2 => cpu.regs.set_hl(value),
        _ => cpu.regs.sp = value,
    }
}

fn inc_rr(cpu: &mut Cpu, _mmu: &mut Mmu, op: u8) -> Result<Option<Command>> {
    set_pair_value(cpu, op, pair_value(cpu, op).wrapping_add(1));
    Ok(None)
}

fn dec_rr(cpu: &mut Cpu, _mmu: &mut Mmu, op: u8) -> Result<Option<Command>> {
    set_pair_value(cpu, op, pair_value(cpu, op).wrapping_sub(1));
    Ok(None)
}

fn add_hl_rr(cpu: &mut Cpu, _mmu: &mut Mmu, op: u8) -> Result<Option<Command>> {
    cpu.alu_add16_hl(pair_value(cpu, op));
    Ok(None)
}

fn add_sp_r8(cpu: &mut Cpu, mmu: &mut Mmu, _op: u8) -> Result<Option<Command>> {
    let imm = cpu.fetch8(mmu)?;
    cpu.regs.sp = cpu.alu_add16_signed(cpu.regs.sp, imm);
    Ok(None)
}

fn ld_hl_sp_r8(cpu: &mut Cpu, mmu: &mut Mmu, _op: u8) -> Result<Option<Command>> {
    let imm = cpu.fetch8(mmu)?;
    let value = cpu.alu_add16_signed(cpu.regs.sp, imm);
    cpu.regs.set_hl(value);
    Ok(None)
}

fn ld_sp_hl(cpu: &mut Cpu, _mmu: &mut Mmu, _op: u8) -> Result<Option<Command>> {
    cpu.regs.sp = cpu.regs.hl();
    Ok(None)
}

// ---- 8-bit arithmetic ----------------------------------------------

fn inc_r(cpu: &mut Cpu, mmu: &mut Mmu, op: u8) -> Result<Option<Command>> {
    let index = (op >> 3) & 0x07;
    let value = cpu.read_reg8(mmu, index)?;
    let result = cpu.alu_inc8(value);
    cpu.write_reg8(mmu, index, result)?;
    Ok(None)
}

fn dec_r(cpu: &mut Cpu, mmu: &mut Mmu, op: u8) -> Result<Option<Command>> {
    let index = (op >> 3) & 0x07;
    let value = cpu.read_reg8(mmu, index)?;
    let result = cpu.alu_dec8(value);
    cpu.write_reg8(mmu, index, result)?;
    Ok(None)
}

/// ALU operation select shared by the register and immediate forms:
/// 0=ADD 1=ADC 2=SUB 3=SBC 4=AND 5=XOR 6=OR 7=CP.
fn dispatch_alu(cpu: &mut Cpu, select: u8, value: u8) {
    match select & 0x07 {
        0 => cpu.alu_add(value, false),
        1 => cpu.alu_add(value, true),
        2 => cpu.alu_sub(value, false),
        3 => cpu.alu_sub(value, true),
        4 => cpu.alu_and(value),
        5 => cpu.alu_xor(value),
        6 => cpu.alu_or(value),
        _ => cpu.alu_cp(value),
    }
}

fn alu_r(cpu: &mut Cpu, mmu: &mut Mmu, op: u8) -> Result<Option<Command>> {
    let value = cpu.read_reg8(mmu, op & 0x07)?;
    dispatch_alu(cpu, (op >> 3) & 0x07, value);
    Ok(None)
}

fn alu_d8(cpu: &mut Cpu, mmu: &mut Mmu, op: u8) -> Result<Option<Command>> {
    let value = cpu.fetch8(mmu)?;
    dispatch_alu(cpu, (op >> 3) & 0x07, value);
    Ok(None)
}

// ---- Jumps, calls, returns -----------------------------------------

fn jr_r8(cpu: &mut Cpu, mmu: &mut Mmu, _op: u8) -> Result<Option<Command>> {
    let offset = cpu.fetch8(mmu)? as i8;
    let target = cpu.regs.pc.wrapping_add(offset as u16);
    Ok(Some(Command::jump(target)))
}

fn jr_cc(cpu: &mut Cpu, mmu: &mut Mmu, op: u8) -> Result<Option<Command>> {
    let offset = cpu.fetch8(mmu)? as i8;
    if cpu.condition((op >> 3) & 0x03) {
        let target = cpu.regs.pc.wrapping_add(offset as u16);
        Ok(Some(Command::jump(target)))
    } else {
        Ok(None)
    }
}

fn jp_a16(cpu: &mut Cpu, mmu: &mut Mmu, _op: u8) -> Result<Option<Command>> {
    let target = cpu.fetch16(mmu)?;
    Ok(Some(Command::jump(target)))
}

fn jp_cc(cpu: &mut Cpu, mmu: &mut Mmu, op: u8) -> Result<Option<Command>> {
    let target = cpu.fetch16(mmu)?;
    if cpu.condition((op >> 3) & 0x03) {
        Ok(Some(Command::jump(target)))
    } else {
        Ok(None)
    }
}

fn jp_hl(cpu: &mut Cpu, _mmu: &mut Mmu, _op: u8) -> Result<Option<Command>> {
    cpu.regs.pc = cpu.regs.hl();
    Ok(None)
}

fn call_a16(cpu: &mut Cpu, mmu: &mut Mmu, _op: u8) -> Result<Option<Command>> {
    let target = cpu.fetch16(mmu)?;
    Ok(Some(Command::call(target)))
}

fn call_cc(cpu: &mut Cpu, mmu: &mut Mmu, op: u8) -> Result<Option<Command>> {
    let target = cpu.fetch16(mmu)?;
    if cpu.condition((op >> 3) & 0x03) {
        Ok(Some(Command::call(target)))
    } else {
        Ok(None)
    }
}

fn ret(_cpu: &mut Cpu, _mmu: &mut Mmu, _op: u8) -> Result<Option<Command>> {
    Ok(Some(Command::ret(false)))
}

fn reti(_cpu: &mut Cpu, _mmu: &mut Mmu, _op: u8) -> Result<Option<Command>> {
    Ok(Some(Command::ret(true)))
}

fn ret_cc(cpu: &mut Cpu, _mmu: &mut Mmu, op: u8) -> Result<Option<Command>> {
    if cpu.condition((op >> 3) & 0x03) {
        Ok(Some(Command::ret(false)))
    } else {
        Ok(None)
    }
}

fn rst(_cpu: &mut Cpu, _mmu: &mut Mmu, op: u8) -> Result<Option<Command>> {
    Ok(Some(Command::call((op & 0x38) as u16)))
}

// ---- Stack ---------------------------------------------------------

fn push_rr(cpu: &mut Cpu, mmu: &mut Mmu, op: u8) -> Result<Option<Command>> {
    let value = match (op >> 4) & 0x03 {
        0 => cpu.regs.bc(),
        1 => cpu.regs.de(),
        2 => cpu.regs.hl(),
        _ => cpu.regs.af(),
    };
    cpu.push_word(mmu, value)?;
    Ok(None)
}

fn pop_rr(cpu: &mut Cpu, mmu: &mut Mmu, op: u8) -> Result<Option<Command>> {
    let value = cpu.pop_word(mmu)?;
    match (op >> 4) & 0x03 {
        0 => cpu.regs.set_bc(value),
        1 => cpu.regs.set_de(value),
        2 => cpu.regs.set_hl(value),
        _ => cpu.regs.set_af(value),
    }
    Ok(None)
}
