//! Five 8237-style DMA controllers, four channels each. Only
//! controller 0 / channel 0 (floppy → RAM) actually moves data; every
//! other channel still accepts and stores its register writes and
//! still ticks its rate countdown (spec §9 open question 2).

const CONTROLLERS: usize = 5;
const CHANNELS: usize = 4;

/// Transfer-type field of the mode register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferType {
    Verify,
    Write,
    Read,
    Illegal,
}

impl TransferType {
    fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            0 => TransferType::Verify,
            1 => TransferType::Write,
            2 => TransferType::Read,
            _ => TransferType::Illegal,
        }
    }
}

#[derive(Debug, Clone)]
struct DmaChannel {
    addr: u16,
    wc: u16,
    flip_flop: bool,
    request: bool,
    /// Initial value 1 per spec §3 invariant.
    mask: bool,
    transfer: TransferType,
    autoinit: bool,
    addr_dec: bool,
    /// 2-bit mode: 0=demand, 1=single, 2=block, 3=cascade.
    mode: u8,
    rate_timer: u32,
}

impl DmaChannel {
    fn new() -> Self {
        Self {
            addr: 0,
            wc: 0,
            flip_flop: false,
            request: false,
            mask: true,
            transfer: TransferType::Verify,
            autoinit: false,
            addr_dec: false,
            mode: 0,
            rate_timer: 0,
        }
    }
}

/// Command register flags (8237 layout, spec §3).
#[derive(Debug, Clone, Copy, Default)]
pub struct DmaCommand {
    pub mem2mem: bool,
    pub ch0_addr_hold: bool,
    pub disable: bool,
    pub timing: bool,
    pub priority: bool,
    pub write_sel: bool,
    pub dreq: bool,
    pub dack: bool,
}

#[derive(Debug, Clone)]
struct DmaController {
    command: DmaCommand,
    channels: [DmaChannel; CHANNELS],
}

impl DmaController {
    fn new() -> Self {
        Self {
            command: DmaCommand::default(),
            channels: [
                DmaChannel::new(),
                DmaChannel::new(),
                DmaChannel::new(),
                DmaChannel::new(),
            ],
        }
    }

    fn master_clear(&mut self) {
        *self = Self::new();
    }
}

/// Outcome of one channel's pump tick, reported so the caller (bus
/// orchestrator) can perform the actual RAM write / CTC trigger —
/// `Dma` itself doesn't own RAM or the floppy stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transfer {
    pub controller: usize,
    pub channel: usize,
    pub dest_addr: u32,
    pub end_of_process: bool,
}

/// All five DMA controllers.
#[derive(Debug, Clone)]
pub struct Dma {
    controllers: [DmaController; CONTROLLERS],
}

impl Dma {
    pub fn new() -> Self {
        Self {
            controllers: [
                DmaController::new(),
                DmaController::new(),
                DmaController::new(),
                DmaController::new(),
                DmaController::new(),
            ],
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Write one register of one controller. `reg` is the low nibble
    /// of the port address (0x0..0xF, per spec §4.5's 8237 layout).
    pub fn write(&mut self, controller: usize, reg: u8, data: u8) {
        let dma = &mut self.controllers[controller];
        match reg {
            0x0 | 0x2 | 0x4 | 0x6 => {
                let c = ((reg >> 1) & 0x03) as usize;
                let ch = &mut dma.channels[c];
                if ch.flip_flop {
                    ch.addr = (ch.addr & 0x00FF) | ((data as u16) << 8);
                } else {
                    ch.addr = (ch.addr & 0xFF00) | data as u16;
                }
                ch.flip_flop = !ch.flip_flop;
            }
            0x1 | 0x3 | 0x5 | 0x7 => {
                let c = ((reg >> 1) & 0x03) as usize;
                let ch = &mut dma.channels[c];
                if ch.flip_flop {
                    ch.wc = (ch.wc & 0x00FF) | ((data as u16) << 8);
                } else {
                    ch.wc = (ch.wc & 0xFF00) | data as u16;
                }
                ch.flip_flop = !ch.flip_flop;
            }
            0x8 => {
                dma.command = DmaCommand {
                    mem2mem: data & (1 << 0) != 0,
                    ch0_addr_hold: data & (1 << 1) != 0,
                    disable: data & (1 << 2) != 0,
                    timing: data & (1 << 3) != 0,
                    priority: data & (1 << 4) != 0,
                    write_sel: data & (1 << 5) != 0,
                    dreq: data & (1 << 6) != 0,
                    dack: data & (1 << 7) != 0,
                };
            }
            0x9 => {
                let c = (data & 0x03) as usize;
                dma.channels[c].request = data & (1 << 2) != 0;
            }
            0xA => {
                let c = (data & 0x03) as usize;
                let ch = &mut dma.channels[c];
                ch.mask = data & (1 << 2) != 0;
                if !ch.mask {
                    ch.rate_timer = 0;
                }
            }
            0xB => {
                let c = (data & 0x03) as usize;
                let ch = &mut dma.channels[c];
                ch.transfer = TransferType::from_bits(data >> 2);
                ch.autoinit = data & (1 << 4) != 0;
                ch.addr_dec = data & (1 << 5) != 0;
                ch.mode = data >> 6;
            }
            0xC => {
                for ch in &mut dma.channels {
                    ch.flip_flop = false;
                }
            }
            0xD => {
                dma.master_clear();
            }
            0xF => {
                for (i, ch) in dma.channels.iter_mut().enumerate() {
                    ch.mask = data & (1 << i) != 0;
                }
            }
            _ => {
                log::debug!("DMA {controller} unknown register write {reg:#x}={data:#x}");
            }
        }
    }

    /// Advance every channel's rate countdown one host step. When a
    /// channel's countdown reaches the transfer threshold, returns a
    /// [`Transfer`] describing the one channel whose transfer the
    /// caller should actually perform (controller 0 / channel 0);
    /// every other qualifying channel's countdown still resets, it
    /// just never yields a `Transfer`.
    pub fn pump(&mut self, ch0_a16: bool) -> Option<Transfer> {
        let mut result = None;
        for (ci, dma) in self.controllers.iter_mut().enumerate() {
            for (i, ch) in dma.channels.iter_mut().enumerate() {
                if ch.mask || ch.mode != 1 {
                    continue;
                }
                if ch.rate_timer < 100 {
                    ch.rate_timer += 1;
                    continue;
                }

                let end_of_process = ch.wc == 0;
                let is_active_path = ci == 0 && i == 0;

                if is_active_path {
                    let dest_addr = ch.addr as u32 | if ch0_a16 { 0x10000 } else { 0 };
                    result = Some(Transfer {
                        controller: ci,
                        channel: i,
                        dest_addr,
                        end_of_process,
                    });
                } else {
                    log::debug!(
                        "DMA controller {ci} channel {i} rate threshold reached with no transfer path"
                    );
                }

                if end_of_process {
                    ch.mask = true;
                } else {
                    if ch.addr_dec {
                        ch.addr = ch.addr.wrapping_sub(1);
                    } else {
                        ch.addr = ch.addr.wrapping_add(1);
                    }
                    ch.wc = ch.wc.wrapping_sub(1);
                    ch.rate_timer = 0;
                }
            }
        }
        result
    }
}

impl Default for Dma {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unmask_single_mode(dma: &mut Dma, controller: usize, channel: usize) {
        dma.write(controller, 0xB, (channel as u8) | (1 << 6)); // mode=single
        dma.write(controller, 0xA, channel as u8); // mask bit0=0 => unmasked
    }

    #[test]
    fn test_master_clear_sets_all_masks_and_clears_flip_flops() {
        let mut dma = Dma::new();
        dma.write(0, 0xA, 0b0000_0000); // unmask channel 0
        dma.write(0, 0x0, 0x55); // set a flip-flop
        dma.write(0, 0xD, 0);
        let c0 = &dma.controllers[0];
        assert!(c0.channels.iter().all(|ch| ch.mask));
        assert!(c0.channels.iter().all(|ch| !ch.flip_flop));
    }

    #[test]
    fn test_bulk_mask_sets_all_four_bits() {
        let mut dma = Dma::new();
        dma.write(0, 0xF, 0b0000_1010);
        let c0 = &dma.controllers[0];
        assert!(!c0.channels[0].mask);
        assert!(c0.channels[1].mask);
        assert!(!c0.channels[2].mask);
        assert!(c0.channels[3].mask);
    }

    #[test]
    fn test_address_write_alternates_low_high_on_flip_flop() {
        let mut dma = Dma::new();
        dma.write(0, 0x0, 0x34);
        dma.write(0, 0x0, 0x12);
        assert_eq!(dma.controllers[0].channels[0].addr, 0x1234);
    }

    #[test]
    fn test_word_count_write_alternates_low_high() {
        let mut dma = Dma::new();
        dma.write(0, 0x1, 0x10);
        dma.write(0, 0x1, 0x00);
        assert_eq!(dma.controllers[0].channels[0].wc, 0x0010);
    }

    #[test]
    fn test_unmasking_resets_rate_timer() {
        let mut dma = Dma::new();
        dma.controllers[0].channels[0].mask = false;
        dma.controllers[0].channels[0].rate_timer = 42;
        dma.write(0, 0xA, 0b100); // mask=1 bit set -> masked
        assert!(dma.controllers[0].channels[0].mask);
        dma.write(0, 0xA, 0b000); // unmask channel 0
        assert_eq!(dma.controllers[0].channels[0].rate_timer, 0);
    }

    #[test]
    fn test_pump_reaches_threshold_after_100_ticks() {
        let mut dma = Dma::new();
        unmask_single_mode(&mut dma, 0, 0);
        dma.write(0, 0x1, 5); // word count low byte
        dma.write(0, 0x1, 0); // high byte -> wc = 5
        for _ in 0..100 {
            assert_eq!(dma.pump(false), None);
        }
        assert!(dma.pump(false).is_some());
    }

    #[test]
    fn test_transfer_yields_dest_addr_with_a16_bit() {
        let mut dma = Dma::new();
        unmask_single_mode(&mut dma, 0, 0);
        dma.write(0, 0x0, 0x00);
        dma.write(0, 0x0, 0x00);
        dma.write(0, 0x1, 5);
        dma.write(0, 0x1, 0);
        for _ in 0..100 {
            dma.pump(true);
        }
        let t = dma.pump(true).unwrap();
        assert_eq!(t.dest_addr, 0x10000);
        assert_eq!(t.controller, 0);
        assert_eq!(t.channel, 0);
    }

    #[test]
    fn test_end_of_process_masks_channel_and_triggers_ctc() {
        let mut dma = Dma::new();
        unmask_single_mode(&mut dma, 0, 0);
        // word count left at 0 => immediate end-of-process
        for _ in 0..100 {
            dma.pump(false);
        }
        let t = dma.pump(false).unwrap();
        assert!(t.end_of_process);
        assert!(dma.controllers[0].channels[0].mask);
    }

    #[test]
    fn test_non_eop_transfer_adjusts_address_and_word_count() {
        let mut dma = Dma::new();
        unmask_single_mode(&mut dma, 0, 0);
        dma.write(0, 0x1, 2);
        dma.write(0, 0x1, 0); // wc = 2
        for _ in 0..100 {
            dma.pump(false);
        }
        dma.pump(false);
        assert_eq!(dma.controllers[0].channels[0].addr, 1);
        assert_eq!(dma.controllers[0].channels[0].wc, 1);
    }

    #[test]
    fn test_other_controllers_tick_but_never_transfer() {
        let mut dma = Dma::new();
        unmask_single_mode(&mut dma, 1, 2);
        for _ in 0..100 {
            assert_eq!(dma.pump(false), None);
        }
        // threshold reached but controller 1 / channel 2 has no path
        assert_eq!(dma.pump(false), None);
    }
}
