//! Z80 SIO: two serial channels, one of which (A) carries the floppy
//! receive path and the disk-rotation index pulse on its DCD line.

/// Which of the two SIO channels is being addressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    A,
    B,
}

/// IRQ vector index, used when `status_affects_vector` reshapes the
/// base vector around the event kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum VectorKind {
    TxeB = 0,
    ExiB = 1,
    RxneB = 2,
    SpecialB = 3,
    TxeA = 4,
    ExiA = 5,
    RxneA = 6,
    SpecialA = 7,
}

#[derive(Debug, Clone)]
struct SioChannel {
    ptr_latch: u8,
    crc_reset_code: u8,

    exi_enable: bool,
    tx_int_enable: bool,
    rx_int_mode: u8,

    rx_enable: bool,

    rts: bool,
    dtr: bool,

    sync_bits: u16,

    last_cts: bool,
    last_dcd: bool,

    rx_data: u8,
    rx_not_empty: bool,

    /// Three pending-interrupt flags (spec §3). Only `exi_pending` has
    /// a write path in this system (WR0 command 2 clears it); `rx`/`tx`
    /// are carried for parity with the original's per-channel struct
    /// but have no producer or consumer in the firmware this core runs.
    #[allow(dead_code)]
    exi_pending: bool,
    #[allow(dead_code)]
    rx_pending: bool,
    #[allow(dead_code)]
    tx_pending: bool,
}

impl SioChannel {
    fn new() -> Self {
        Self {
            ptr_latch: 0,
            crc_reset_code: 0,
            exi_enable: false,
            tx_int_enable: false,
            rx_int_mode: 0,
            rx_enable: false,
            rts: false,
            dtr: false,
            sync_bits: 0,
            last_cts: false,
            last_dcd: false,
            rx_data: 0,
            rx_not_empty: false,
            exi_pending: false,
            rx_pending: false,
            tx_pending: false,
        }
    }
}

/// The full SIO peripheral: shared vector state plus two channels.
#[derive(Debug, Clone)]
pub struct Sio {
    vector: u8,
    status_affects_vector: bool,
    a: SioChannel,
    b: SioChannel,
}

impl Sio {
    pub fn new() -> Self {
        Self {
            vector: 0,
            status_affects_vector: false,
            a: SioChannel::new(),
            b: SioChannel::new(),
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    fn channel(&self, ch: Channel) -> &SioChannel {
        match ch {
            Channel::A => &self.a,
            Channel::B => &self.b,
        }
    }

    fn channel_mut(&mut self, ch: Channel) -> &mut SioChannel {
        match ch {
            Channel::A => &mut self.a,
            Channel::B => &mut self.b,
        }
    }

    /// Channel A's DTR line; channel A's DTR is the floppy motor control.
    pub fn dtr_a(&self) -> bool {
        self.a.dtr
    }

    /// Last known CTS edge for a channel, so a caller advancing only
    /// DCD (the FDD index pulse) can report the unchanged CTS value.
    pub fn last_cts(&self, ch: Channel) -> bool {
        self.channel(ch).last_cts
    }

    /// Read the control register. If the pointer is parked at WR0 and
    /// the receiver is empty and enabled, pulls one byte in from the
    /// floppy stream first (`fdd_next_byte` is only invoked in that
    /// case).
    pub fn read_control(&mut self, ch: Channel, fdd_next_byte: impl FnOnce() -> u8) -> u8 {
        let c = self.channel_mut(ch);
        match c.ptr_latch {
            0 => {
                if !c.rx_not_empty && c.rx_enable {
                    c.rx_data = fdd_next_byte();
                    c.rx_not_empty = true;
                }
                let mut result = 0u8;
                if c.rx_not_empty {
                    result |= 1 << 0;
                }
                if c.last_dcd {
                    result |= 1 << 3;
                }
                if c.last_cts {
                    result |= 1 << 5;
                }
                result
            }
            _ => {
                c.ptr_latch = 0;
                0
            }
        }
    }

    /// Read the data register; clears rx-not-empty.
    pub fn read_data(&mut self, ch: Channel) -> u8 {
        let c = self.channel_mut(ch);
        c.rx_not_empty = false;
        c.rx_data
    }

    /// Write the control register, dispatching on the channel's
    /// register pointer (WR0..WR7).
    pub fn write_control(&mut self, ch: Channel, data: u8) {
        let is_a = matches!(ch, Channel::A);
        let c = self.channel_mut(ch);
        match c.ptr_latch {
            0 => {
                let cmd = (data >> 3) & 0x07;
                if cmd == 2 {
                    c.exi_pending = false;
                }
                c.ptr_latch = data & 0x07;
                c.crc_reset_code = (data >> 6) & 0x03;
            }
            1 => {
                c.ptr_latch = 0;
                c.exi_enable = data & (1 << 0) != 0;
                c.tx_int_enable = data & (1 << 1) != 0;
                if is_a {
                    self.status_affects_vector = data & (1 << 2) != 0;
                }
                c.rx_int_mode = (data >> 3) & 0x03;
            }
            2 => {
                if is_a {
                    self.vector = data;
                }
                self.channel_mut(ch).ptr_latch = 0;
            }
            3 => {
                c.ptr_latch = 0;
                c.rx_enable = data & (1 << 0) != 0;
            }
            4 => {
                c.ptr_latch = 0;
            }
            5 => {
                c.ptr_latch = 0;
                c.rts = data & (1 << 1) != 0;
                c.dtr = data & (1 << 7) != 0;
            }
            6 => {
                c.ptr_latch = 0;
                c.sync_bits = (c.sync_bits & 0xFF00) | data as u16;
            }
            7 => {
                c.ptr_latch = 0;
                c.sync_bits = (c.sync_bits & 0x00FF) | ((data as u16) << 8);
            }
            _ => unreachable!("SIO pointer latch out of range"),
        }
    }

    /// External/status line change (CTS/DCD) — raises an interrupt if
    /// the channel's edge actually moved and `exi_enable` is set.
    /// Returns the IRQ vector byte to present, if one was raised.
    pub fn signal_status(&mut self, ch: Channel, cts: bool, dcd: bool) -> Option<u8> {
        let is_a = matches!(ch, Channel::A);
        let status_affects_vector = self.status_affects_vector;
        let base_vector = self.vector;
        let c = self.channel_mut(ch);

        if c.last_cts == cts && c.last_dcd == dcd {
            return None;
        }
        c.last_cts = cts;
        c.last_dcd = dcd;

        if !c.exi_enable {
            return None;
        }

        let vector = if status_affects_vector {
            let kind = if is_a {
                VectorKind::ExiA
            } else {
                VectorKind::ExiB
            };
            (base_vector & 0xF1) | ((kind as u8) << 1)
        } else {
            base_vector
        };
        Some(vector)
    }
}

impl Default for Sio {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wr0_sets_pointer_and_crc_code() {
        let mut sio = Sio::new();
        sio.write_control(Channel::A, 0b1100_0011); // crc=11, cmd=0, ptr=3
        assert_eq!(sio.a.ptr_latch, 3);
        assert_eq!(sio.a.crc_reset_code, 0b11);
    }

    #[test]
    fn test_wr0_cmd2_clears_exi_pending_not_status_edges() {
        let mut sio = Sio::new();
        sio.a.exi_pending = true;
        sio.a.last_cts = true;
        sio.a.last_dcd = true;
        sio.write_control(Channel::A, 2 << 3); // ptr=0, cmd=2 (reset ext/status int)
        assert!(!sio.a.exi_pending);
        assert!(sio.a.last_cts, "cmd 2 must not touch the CTS edge latch");
        assert!(sio.a.last_dcd, "cmd 2 must not touch the DCD edge latch");
    }

    #[test]
    fn test_wr1_sets_enables_and_status_affects_vector_on_a_only() {
        let mut sio = Sio::new();
        sio.write_control(Channel::A, 1); // ptr -> WR1
        sio.write_control(Channel::A, 0b0000_0111); // exi=1 tx=1 status_affects=1
        assert!(sio.a.exi_enable);
        assert!(sio.a.tx_int_enable);
        assert!(sio.status_affects_vector);

        // Channel B write to WR1 must not touch the shared flag.
        sio.status_affects_vector = false;
        sio.write_control(Channel::B, 1);
        sio.write_control(Channel::B, 0b0000_0111);
        assert!(!sio.status_affects_vector);
    }

    #[test]
    fn test_wr2_sets_shared_vector_from_channel_a_only() {
        let mut sio = Sio::new();
        sio.write_control(Channel::A, 2);
        sio.write_control(Channel::A, 0x77);
        assert_eq!(sio.vector, 0x77);

        sio.write_control(Channel::B, 2);
        sio.write_control(Channel::B, 0x99);
        assert_eq!(sio.vector, 0x77, "channel B must not set the shared vector");
    }

    #[test]
    fn test_wr3_sets_rx_enable() {
        let mut sio = Sio::new();
        sio.write_control(Channel::A, 3);
        sio.write_control(Channel::A, 1);
        assert!(sio.a.rx_enable);
    }

    #[test]
    fn test_wr5_sets_rts_and_dtr() {
        let mut sio = Sio::new();
        sio.write_control(Channel::A, 5);
        sio.write_control(Channel::A, 0b1000_0010);
        assert!(sio.a.rts);
        assert!(sio.a.dtr);
        assert!(sio.dtr_a());
    }

    #[test]
    fn test_wr6_wr7_build_sync_word() {
        let mut sio = Sio::new();
        sio.write_control(Channel::A, 6);
        sio.write_control(Channel::A, 0xCD);
        sio.write_control(Channel::A, 7);
        sio.write_control(Channel::A, 0xAB);
        assert_eq!(sio.a.sync_bits, 0xABCD);
    }

    #[test]
    fn test_read_control_pulls_fdd_byte_when_empty_and_enabled() {
        let mut sio = Sio::new();
        sio.a.rx_enable = true;
        let status = sio.read_control(Channel::A, || 0x42);
        assert_eq!(status & 1, 1);
        assert_eq!(sio.a.rx_data, 0x42);
    }

    #[test]
    fn test_read_control_does_not_pull_when_already_full() {
        let mut sio = Sio::new();
        sio.a.rx_enable = true;
        sio.a.rx_not_empty = true;
        sio.a.rx_data = 0x11;
        let mut called = false;
        sio.read_control(Channel::A, || {
            called = true;
            0xFF
        });
        assert!(!called);
        assert_eq!(sio.a.rx_data, 0x11);
    }

    #[test]
    fn test_read_data_clears_rx_not_empty() {
        let mut sio = Sio::new();
        sio.a.rx_data = 0x55;
        sio.a.rx_not_empty = true;
        assert_eq!(sio.read_data(Channel::A), 0x55);
        assert!(!sio.a.rx_not_empty);
    }

    #[test]
    fn test_signal_status_raises_only_on_edge() {
        let mut sio = Sio::new();
        sio.a.exi_enable = true;
        assert_eq!(sio.signal_status(Channel::A, false, false), None);
        assert!(sio.signal_status(Channel::A, false, true).is_some());
        // no further edge -> no repeat interrupt
        assert_eq!(sio.signal_status(Channel::A, false, true), None);
    }

    #[test]
    fn test_signal_status_vector_shape_with_status_affects_vector() {
        let mut sio = Sio::new();
        sio.a.exi_enable = true;
        sio.status_affects_vector = true;
        sio.vector = 0b1111_0000;
        let v = sio.signal_status(Channel::A, false, true).unwrap();
        assert_eq!(v, (0b1111_0000 & 0xF1) | ((VectorKind::ExiA as u8) << 1));
    }

    #[test]
    fn test_signal_status_plain_vector_without_status_affects_vector() {
        let mut sio = Sio::new();
        sio.b.exi_enable = true;
        sio.status_affects_vector = false;
        sio.vector = 0x40;
        assert_eq!(sio.signal_status(Channel::B, true, false), Some(0x40));
    }

    #[test]
    fn test_signal_status_none_without_exi_enable() {
        let mut sio = Sio::new();
        assert_eq!(sio.signal_status(Channel::A, false, true), None);
    }
}
