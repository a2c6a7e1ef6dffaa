//! Bus mapper: translates 16-bit CPU addresses into the 17-bit
//! physical address space the ROM/RAM arenas live in, per the A16
//! banking rule (spec §3/§4.1).
//!
//! Port I/O is a separate address space, dispatched by
//! [`crate::peripherals::Peripherals`]; this module only owns the
//! byte-addressed memory side of the bus.

use crate::descramble;
use crate::memory::{Ram, Rom, RomError};

/// Bus mapper owning the ROM and RAM arenas.
#[derive(Debug, Clone)]
pub struct Bus {
    rom: Rom,
    ram: Ram,
}

impl Bus {
    pub fn new() -> Self {
        Self {
            rom: Rom::new(),
            ram: Ram::new(),
        }
    }

    /// RAM is cleared on reset; the descrambled ROM image persists
    /// (it is immutable after load, the same way a physical EPROM
    /// survives a reset button).
    pub fn reset(&mut self) {
        self.ram.reset();
    }

    /// Descramble a raw EPROM image and load it as the boot ROM.
    pub fn load_rom(&mut self, eprom: &[u8]) -> Result<(), RomError> {
        let data = descramble::descramble_rom(eprom)?;
        self.rom.load(&data);
        Ok(())
    }

    pub fn is_rom_loaded(&self) -> bool {
        self.rom.is_loaded()
    }

    /// Direct access to physical RAM, for the DMA pump, which
    /// addresses RAM directly rather than through the CPU-side
    /// banking rule (spec §4.5's `ch0_a16` input is independent of
    /// PIO's `CPUA16`/keyboard's `FORC16`).
    pub fn ram_mut(&mut self) -> &mut Ram {
        &mut self.ram
    }

    /// Translate a 16-bit CPU address into its 17-bit physical RAM
    /// address (spec §3's bank-bit rule, resolved in SPEC_FULL.md §3):
    /// the high bank bit is asserted only when the address has a bit
    /// set in its top three bits *and* `cpua16` is high *and* `forc16`
    /// is low.
    fn physical_addr(addr16: u16, cpua16: bool, forc16: bool) -> u32 {
        let mut addr = addr16 as u32;
        if addr16 & 0xE000 != 0 && cpua16 && !forc16 {
            addr |= 0x10000;
        }
        addr
    }

    /// Read a byte at a 16-bit CPU address. Addresses below 1024
    /// always read the boot ROM regardless of banking.
    pub fn read(&self, addr16: u16, cpua16: bool, forc16: bool) -> u8 {
        if addr16 < 1024 {
            self.rom.read(addr16 as usize)
        } else {
            self.ram.read(Self::physical_addr(addr16, cpua16, forc16))
        }
    }

    /// Write a byte at a 16-bit CPU address. Writes below 1024 land
    /// in the ROM window and are silently discarded (the firmware
    /// deliberately writes there during self-test, spec §4.1).
    pub fn write(&mut self, addr16: u16, value: u8, cpua16: bool, forc16: bool) {
        if addr16 < 1024 {
            log::debug!("discarded write {value:#04x} to ROM window at {addr16:#06x}");
        } else {
            self.ram
                .write(Self::physical_addr(addr16, cpua16, forc16), value);
        }
    }
}

impl Default for Bus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loaded_bus() -> Bus {
        let mut bus = Bus::new();
        bus.load_rom(&[0u8; 1024]).unwrap();
        bus
    }

    #[test]
    fn test_read_below_1024_is_rom() {
        let bus = loaded_bus();
        assert_eq!(bus.read(0, false, false), bus.rom.read(0));
    }

    #[test]
    fn test_write_below_1024_is_discarded() {
        let mut bus = loaded_bus();
        let before = bus.read(10, false, false);
        bus.write(10, 0xFF, false, false);
        assert_eq!(bus.read(10, false, false), before);
    }

    #[test]
    fn test_ram_roundtrip_above_1024() {
        let mut bus = loaded_bus();
        bus.write(0x2000, 0x55, false, false);
        assert_eq!(bus.read(0x2000, false, false), 0x55);
    }

    #[test]
    fn test_bank_bit_requires_all_three_conditions() {
        let mut bus = loaded_bus();
        // Address has a top-three bit set (0xE000), cpua16 high, forc16 low.
        bus.write(0xE000, 0xAB, true, false);
        assert_eq!(bus.ram_mut().read(0x1E000), 0xAB);
        assert_eq!(bus.read(0xE000, true, false), 0xAB);
    }

    #[test]
    fn test_forc16_suppresses_bank_bit() {
        let mut bus = loaded_bus();
        bus.write(0xE000, 0xAB, true, false);
        assert_eq!(bus.read(0xE000, true, true), bus.ram_mut().read(0x0E000));
    }

    #[test]
    fn test_cpua16_low_suppresses_bank_bit() {
        let mut bus = loaded_bus();
        bus.write(0xE000, 0xCD, false, false);
        assert_eq!(bus.ram_mut().read(0x0E000), 0xCD);
        assert_eq!(bus.ram_mut().read(0x1E000), 0);
    }

    #[test]
    fn test_address_without_top_bits_never_banks() {
        let mut bus = loaded_bus();
        // 0x1000 has no bit set in 0xE000.
        bus.write(0x1000, 0x99, true, false);
        assert_eq!(bus.ram_mut().read(0x1000), 0x99);
        assert_eq!(bus.ram_mut().read(0x11000), 0);
    }

    #[test]
    fn test_bank_switch_scenario_s6() {
        // With FORC16=0 and CPUA16=1, reads from 0xE000 return ram[0x1E000];
        // after FORC16=1, the same read returns ram[0x0E000].
        let mut bus = loaded_bus();
        bus.ram_mut().write(0x1E000, 0x11);
        bus.ram_mut().write(0x0E000, 0x22);
        assert_eq!(bus.read(0xE000, true, false), 0x11);
        assert_eq!(bus.read(0xE000, true, true), 0x22);
    }
}
