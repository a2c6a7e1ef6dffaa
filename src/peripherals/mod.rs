//! Peripheral subsystem: PIO, SIO, CTC, DMA, FDD, LED banks, keyboard,
//! channel-configuration latches, and the interrupt arbiter, plus the
//! port-address dispatch table that fans I/O accesses out to them.
//!
//! The dispatch table (spec §9 "Dynamic dispatch": "a table keyed by
//! port-address ranges") is realized as the match arms in
//! [`Peripherals::in_port`]/[`Peripherals::out_port`], keyed on the
//! port ranges from spec §6.

pub mod channel_config;
pub mod ctc;
pub mod dma;
pub mod fdd;
pub mod interrupt;
pub mod keyboard;
pub mod led;
pub mod pio;
pub mod sio;

pub use channel_config::ChannelConfigBank;
pub use ctc::Ctc;
pub use dma::Dma;
pub use fdd::{Fdd, FloppyError};
pub use interrupt::InterruptArbiter;
pub use keyboard::Keyboard;
pub use led::Led;
pub use pio::Pio;
pub use sio::Sio;

use crate::memory::Ram;

/// All peripheral state, owned as one value by [`crate::Emulator`].
#[derive(Debug, Clone)]
pub struct Peripherals {
    pub pio: Pio,
    pub sio: Sio,
    pub ctc: Ctc,
    pub dma: Dma,
    pub fdd: Fdd,
    pub led: Led,
    pub keyboard: Keyboard,
    pub channel_config: ChannelConfigBank,
    pub interrupt: InterruptArbiter,
}

impl Peripherals {
    pub fn new() -> Self {
        Self {
            pio: Pio::new(),
            sio: Sio::new(),
            ctc: Ctc::new(),
            dma: Dma::new(),
            fdd: Fdd::new(),
            led: Led::new(),
            keyboard: Keyboard::new(),
            channel_config: ChannelConfigBank::new(),
            interrupt: InterruptArbiter::new(),
        }
    }

    /// Reset every peripheral to its power-up state. The floppy image
    /// itself is not unloaded (it survives resets the way a physical
    /// disk stays in the drive).
    pub fn reset(&mut self) {
        self.pio.reset();
        self.sio.reset();
        self.ctc.reset();
        self.dma.reset();
        self.fdd.reset();
        self.led.reset();
        self.keyboard.reset();
        self.channel_config.reset();
        self.interrupt.reset();
    }

    pub fn load_floppy(&mut self, image: &[u8]) -> Result<(), FloppyError> {
        self.fdd.load(image)
    }

    pub fn press_key(&mut self, key_id: u8) {
        self.keyboard.press(key_id);
    }

    pub fn release_key(&mut self, key_id: u8) {
        self.keyboard.release(key_id);
    }

    /// Current CPUA16 bank bit, as exported by PIO port B bit 5.
    pub fn cpua16(&self) -> bool {
        self.pio.cpua16()
    }

    /// Current FORC16 bit, latched by a KBDCS write.
    pub fn forc16(&self) -> bool {
        self.keyboard.forc16()
    }

    /// `int_ack`: drain the arbiter's pending vector.
    pub fn acknowledge_interrupt(&mut self) -> u8 {
        self.interrupt.acknowledge()
    }

    pub fn interrupt_pending(&self) -> bool {
        self.interrupt.pending()
    }

    /// If either LED latch changed since the last poll, the decoded
    /// (IC112, IC115) panel snapshot to report to the front-end.
    pub fn poll_led_change(&mut self) -> Option<(u16, u8)> {
        if self.led.poll_changed() {
            Some((self.led.panel_main(), self.led.panel_seq()))
        } else {
            None
        }
    }

    /// Handle one `IN` from the CPU. `port` is the low 8 bits of the
    /// Z80 I/O address (spec §6's port map).
    pub fn in_port(&mut self, port: u8) -> u8 {
        match port {
            0x50..=0x53 => match port & 0x03 {
                0 => self.pio.read_a_data(self.fdd.track() == 0),
                1 => self.pio.read_a_ctrl(),
                2 => self.pio.read_b_data(),
                3 => self.pio.read_b_ctrl(),
                _ => unreachable!(),
            },
            0x60..=0x63 => match port & 0x03 {
                0 => self.sio.read_data(sio::Channel::A),
                1 => {
                    let fdd = &mut self.fdd;
                    self.sio.read_control(sio::Channel::A, || fdd.receive())
                }
                2 => self.sio.read_data(sio::Channel::B),
                3 => {
                    let fdd = &mut self.fdd;
                    self.sio.read_control(sio::Channel::B, || fdd.receive())
                }
                _ => unreachable!(),
            },
            0x80 => self.keyboard.read_row(),
            _ => {
                log::debug!("read from unmapped I/O port {port:#04x}");
                0
            }
        }
    }

    /// Handle one `OUT` from the CPU.
    pub fn out_port(&mut self, port: u8, value: u8) {
        match port {
            0x00..=0x3F => {
                let controller = ((port >> 4) & 0x03) as usize;
                self.dma.write(controller, port & 0x0F, value);
            }
            0x40..=0x43 => {
                self.ctc.write_channel((port & 0x03) as usize, value);
            }
            0x50..=0x53 => match port & 0x03 {
                0 => self.pio.write_a_data(value),
                1 => self.pio.write_a_ctrl(value),
                2 => {
                    if let Some(step_in) = self.pio.write_b_data(value) {
                        self.fdd.step(step_in);
                    }
                }
                3 => self.pio.write_b_ctrl(value),
                _ => unreachable!(),
            },
            0x60..=0x63 => {
                match port & 0x03 {
                    0 => log::debug!("SIO channel A transmit data {value:#04x} (no tx path modeled)"),
                    1 => self.sio.write_control(sio::Channel::A, value),
                    2 => log::debug!("SIO channel B transmit data {value:#04x} (no tx path modeled)"),
                    3 => self.sio.write_control(sio::Channel::B, value),
                    _ => unreachable!(),
                }
                self.fdd.set_motor(self.sio.dtr_a());
            }
            0x70..=0x7F => {
                self.dma.write(4, port & 0x0F, value);
            }
            0x80..=0x8F => {
                self.channel_config.write_port(port, value);
            }
            0xC0 => self.led.write_reg0(value),
            0xC1 => self.led.write_reg1(value),
            0xC2 => log::debug!("release/accessory latch write {value:#04x}"),
            0xC3 => self.keyboard.write_select(value),
            _ => log::debug!("write to unmapped I/O port {port:#04x}={value:#04x}"),
        }
    }

    /// Advance FDD rotation, CTC timers, and the DMA pump by the
    /// cycles the CPU's last instruction used (spec §4.10). `ram` is
    /// the physical RAM the active DMA path writes into directly,
    /// bypassing the CPU-side bus/bank translation.
    pub fn tick(&mut self, delta_cycles: u64, ram: &mut Ram) -> bool {
        if let Some(edge) = self.fdd.advance(delta_cycles) {
            let cts = self.sio.last_cts(sio::Channel::A);
            if let Some(vector) = self.sio.signal_status(sio::Channel::A, cts, edge) {
                self.interrupt.raise(vector);
            }
        }

        if let Some(vector) = self.ctc.advance(delta_cycles) {
            self.interrupt.raise(vector);
        }

        if let Some(transfer) = self.dma.pump(self.channel_config.ch0_a16()) {
            let byte = self.fdd.receive();
            if transfer.dest_addr >= crate::memory::ROM_SIZE as u32 {
                ram.write(transfer.dest_addr, byte);
            } else {
                log::debug!(
                    "DMA transfer target {:#07x} below ROM window, discarded",
                    transfer.dest_addr
                );
            }
            if transfer.end_of_process {
                self.ctc.trigger(0);
            }
        }

        self.interrupt.pending()
    }
}

impl Default for Peripherals {
    fn default() -> Self {
        Self::new()
    }
}
