//! Whole-machine tests: programs running on the assembled GameBoy with
//! all subsystems interleaved by the clock.

use super::mmu::regs;
use super::GameBoy;

/// Flat (mapper-less) ROM with `code` placed at the entry point 0x0100.
fn rom_with_program(code: &[u8]) -> Vec<u8> {
    let mut rom = vec![0u8; 0x8000];
    rom[0x0100..0x0100 + code.len()].copy_from_slice(code);
    rom
}

#[test]
fn frame_stepping_advances_exactly_one_frame() {
    let mut gb = GameBoy::new();
    // JP 0x0100: spin in place.
    gb.load_rom(&rom_with_program(&[0xC3, 0x00, 0x01]));

    gb.step_frame().unwrap();
    assert_eq!(gb.frames(), 1);
    // LY wrapped back to the top of the frame.
    assert_eq!(gb.mmu.read_byte(regs::LY).unwrap(), 0);

    gb.step_frame().unwrap();
    assert_eq!(gb.frames(), 2);
}

#[test]
fn post_boot_state_matches_the_handoff() {
    let mut gb = GameBoy::new();
    gb.load_rom(&rom_with_program(&[0xC3, 0x00, 0x01]));
    assert_eq!(gb.cpu.regs.pc, 0x0100);
    assert_eq!(gb.cpu.regs.af(), 0x01B0);
    assert_eq!(gb.cpu.regs.sp, 0xFFFE);
    assert_eq!(gb.mmu.read_byte(regs::LCDC).unwrap(), 0x91);
    assert_eq!(gb.mmu.read_byte(regs::BGP).unwrap(), 0xFC);
}

#[test]
fn serial_debug_output_is_collected_from_a_running_program() {
    let mut gb = GameBoy::new();
    #[rustfmt::skip]
    let code = [
        0x3E, b'o',       // LD A,'o'
        0xE0, 0x01,       // LDH (SB),A
        0x3E, 0x81,       // LD A,0x81
        0xE0, 0x02,       // LDH (SC),A
        0x3E, b'k',       // LD A,'k'
        0xE0, 0x01,       // LDH (SB),A
        0x3E, 0x81,       // LD A,0x81
        0xE0, 0x02,       // LDH (SC),A
        0xC3, 0x10, 0x01, // JP 0x0110
    ];
    gb.load_rom(&rom_with_program(&code));
    gb.step_frame().unwrap();
    assert_eq!(gb.serial_output(), b"ok");
}

#[test]
fn dma_trigger_from_a_program_fills_oam() {
    let mut gb = GameBoy::new();
    #[rustfmt::skip]
    let code = [
        0x3E, 0xC0,       // LD A,0xC0
        0xE0, 0x46,       // LDH (DMA),A
        0xC3, 0x04, 0x01, // JP 0x0104
    ];
    gb.load_rom(&rom_with_program(&code));
    for offset in 0u16..0xA0 {
        gb.mmu.write_byte(0xC000 + offset, 0xA0 - offset as u8).unwrap();
    }

    gb.step_frame().unwrap();
    for offset in 0u16..0xA0 {
        assert_eq!(
            gb.mmu.read_byte(0xFE00 + offset).unwrap(),
            0xA0 - offset as u8
        );
    }
}

#[test]
fn vblank_interrupt_reaches_its_handler() {
    let mut gb = GameBoy::new();
    let mut rom = rom_with_program(&[
        0x3E, 0x01, // LD A,0x01
        0xE0, 0xFF, // LDH (IE),A
        0xFB, // EI
        0x76, // HALT
        0xC3, 0x06, 0x01, // JP 0x0106
    ]);
    // V-Blank vector: record a marker in HRAM and return.
    rom[0x0040..0x0045].copy_from_slice(&[
        0x3E, 0x99, // LD A,0x99
        0xE0, 0x80, // LDH (0xFF80),A
        0xD9, // RETI
    ]);
    gb.load_rom(&rom);

    gb.step_frame().unwrap();
    assert_eq!(gb.mmu.read_byte(0xFF80).unwrap(), 0x99);
    assert!(gb.cpu.ime, "RETI restored the master enable");
}

#[test]
fn timer_interrupt_reaches_its_handler() {
    let mut gb = GameBoy::new();
    #[rustfmt::skip]
    let mut rom = rom_with_program(&[
        0x3E, 0x04,       // LD A,0x04
        0xE0, 0xFF,       // LDH (IE),A  (timer only)
        0x3E, 0xF0,       // LD A,0xF0
        0xE0, 0x06,       // LDH (TMA),A
        0x3E, 0x05,       // LD A,0x05
        0xE0, 0x07,       // LDH (TAC),A  (enable, fastest period)
        0xFB,             // EI
        0x76,             // HALT
        0xC3, 0x0E, 0x01, // JP 0x010E
    ]);
    rom[0x0050..0x0055].copy_from_slice(&[
        0x3E, 0x77, // LD A,0x77
        0xE0, 0x81, // LDH (0xFF81),A
        0xD9, // RETI
    ]);
    gb.load_rom(&rom);

    gb.step_frame().unwrap();
    assert_eq!(gb.mmu.read_byte(0xFF81).unwrap(), 0x77);
    // The reload value came from TMA.
    assert!(gb.mmu.read_byte(regs::TIMA).unwrap() >= 0xF0);
}

#[test]
fn unsupported_mapper_degrades_to_an_inert_cartridge() {
    let mut rom = vec![0u8; 0x8000];
    rom[0x0147] = 0x19; // MBC5
    let mut gb = GameBoy::new();
    gb.load_rom(&rom);
    assert_eq!(gb.mmu.read_byte(0x0000).unwrap(), 0xFF);
    assert_eq!(gb.mmu.read_byte(0x4000).unwrap(), 0xFF);
}

#[test]
fn reset_survives_a_cartridge_swap() {
    let mut gb = GameBoy::new();
    gb.load_rom(&rom_with_program(&[0xC3, 0x00, 0x01]));
    gb.mmu.write_byte(0x8000, 0x55).unwrap();
    gb.mmu.write_byte(0xFE00, 0x66).unwrap();
    gb.step_frame().unwrap();

    // Loading the next ROM must not leak the previous game's video state.
    let mut second = rom_with_program(&[0xC3, 0x00, 0x01]);
    second[0x0000] = 0x42;
    gb.load_rom(&second);
    assert_eq!(gb.mmu.read_byte(0x8000).unwrap(), 0x00);
    assert_eq!(gb.mmu.read_byte(0xFE00).unwrap(), 0x00);
    assert_eq!(gb.mmu.read_byte(0x0000).unwrap(), 0x42);
    assert_eq!(gb.frames(), 0);
}

#[test]
fn buttons_feed_the_joypad_matrix() {
    use super::Button;

    let mut gb = GameBoy::new();
    gb.load_rom(&rom_with_program(&[0xC3, 0x00, 0x01]));
    gb.set_button(Button::Start, true);
    gb.mmu.write_byte(regs::JOYP, 0x10).unwrap(); // select buttons
    assert_eq!(gb.mmu.read_byte(regs::JOYP).unwrap() & 0x0F, 0x07);
    gb.set_button(Button::Start, false);
    assert_eq!(gb.mmu.read_byte(regs::JOYP).unwrap() & 0x0F, 0x0F);
}
