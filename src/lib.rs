//! Digital music workstation emulator core.
//!
//! This crate provides the deterministic, cycle-driven core of a
//! Z80-based sampler/sequencer: memory banking, boot ROM
//! descrambling, the PIO/SIO/CTC peripherals, five DMA controllers, a
//! 35-track floppy drive, the keyboard matrix, the two LED banks, and
//! the interrupt arbiter. It does not include a Z80 instruction
//! interpreter — [`CpuCore`] is a trait boundary callers implement
//! with their own, consumed via [`Emulator::step`].
//!
//! # Architecture
//!
//! - `memory`: fixed-size ROM/RAM arenas
//! - `descramble`: boot ROM bit-permutation recovery
//! - `bus`: 16-bit CPU address to 17-bit physical address translation
//! - `peripherals`: PIO, SIO, CTC, DMA, FDD, LEDs, keyboard, interrupt
//!   arbiter, and the port-address dispatch table
//! - `trace`: the injectable trace-sink boundary
//! - `emu`: the cycle driver tying the above together behind the
//!   `CpuBus`/`CpuCore` traits
//!
//! # Memory map (17-bit physical address space)
//!
//! | Address range       | Region                          |
//! |----------------------|---------------------------------|
//! | 0x00000 - 0x003FF    | Boot ROM (1 KiB, descrambled)    |
//! | 0x00400 - 0x0FFFF    | RAM, bank 0                      |
//! | 0x10000 - 0x1FFFF    | RAM, bank 1 (A16 banking)        |

pub mod bus;
pub mod descramble;
mod emu;
pub mod memory;
pub mod peripherals;
pub mod trace;


pub use emu::{CpuBus, CpuCore, Emulator};
pub use memory::RomError;
pub use peripherals::FloppyError;

/// CPU clock rate in Hz, used to derive the floppy rotation period
/// (spec §4.7: 300 RPM at this clock).
pub const CPU_CLOCK: u32 = 2_500_000;
