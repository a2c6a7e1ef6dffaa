//! Z80 CTC: four timer/counter channels sharing one vector base and
//! one interrupt-cooldown counter.

const CHANNELS: usize = 4;

#[derive(Debug, Clone)]
struct CtcChannel {
    reset: bool,
    /// `true` = pulse trigger, `false` = automatic.
    trigger: bool,
    /// `true` = rising edge.
    edge: bool,
    /// `true` = divide by 256, `false` = divide by 16.
    prescaler: bool,
    /// `true` = counter mode, `false` = timer mode.
    counter_mode: bool,
    interrupt_enable: bool,

    time_constant: u8,
    counter: u8,
    cycle_accum: u64,
}

impl CtcChannel {
    fn new() -> Self {
        Self {
            reset: false,
            trigger: false,
            edge: false,
            prescaler: false,
            counter_mode: false,
            interrupt_enable: false,
            time_constant: 0,
            counter: 0,
            cycle_accum: 0,
        }
    }
}

/// The four-channel counter/timer peripheral.
#[derive(Debug, Clone)]
pub struct Ctc {
    vector: u8,
    /// One-bit latch, armed per channel: next write to that channel is
    /// the time constant rather than a control word.
    time_constant_latch: [bool; CHANNELS],
    pending_irq: u8,
    irq_cooldown: u8,
    channels: [CtcChannel; CHANNELS],
}

impl Ctc {
    pub fn new() -> Self {
        Self {
            vector: 0,
            time_constant_latch: [false; CHANNELS],
            pending_irq: 0,
            irq_cooldown: 0,
            channels: [
                CtcChannel::new(),
                CtcChannel::new(),
                CtcChannel::new(),
                CtcChannel::new(),
            ],
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Write one channel's port (spec §4.4's two-step protocol).
    pub fn write_channel(&mut self, channel: usize, data: u8) {
        if self.time_constant_latch[channel] {
            let ch = &mut self.channels[channel];
            ch.time_constant = data;
            ch.counter = data;
            self.time_constant_latch[channel] = false;
            ch.reset = false;
            return;
        }

        if data & 1 == 0 {
            self.vector = data;
            return;
        }

        let ch = &mut self.channels[channel];
        self.time_constant_latch[channel] = data & (1 << 2) != 0;
        ch.reset |= data & (1 << 1) != 0;
        ch.trigger = data & (1 << 3) != 0;
        ch.edge = data & (1 << 4) != 0;
        ch.prescaler = data & (1 << 5) != 0;
        ch.counter_mode = data & (1 << 6) != 0;
        ch.interrupt_enable = data & (1 << 7) != 0;
    }

    /// External trigger (driven by DMA controller 0 / channel 0's
    /// end-of-process pulse to channel 0). Decrements a counter-mode
    /// channel; underflow reloads and may raise its pending bit.
    pub fn trigger(&mut self, channel: usize) {
        let ch = &mut self.channels[channel];
        if !ch.counter_mode {
            return;
        }
        ch.counter = ch.counter.wrapping_sub(1);
        if ch.counter == 0 {
            ch.counter = ch.time_constant;
            if ch.interrupt_enable {
                self.pending_irq |= 1 << channel;
            }
        }
    }

    /// Advance every non-reset timer-mode channel by `delta_cycles`,
    /// then run the vectored-IRQ cooldown/dispatch. Returns the IRQ
    /// vector byte to present to the CPU, if one became ready this step.
    pub fn advance(&mut self, delta_cycles: u64) -> Option<u8> {
        for i in 0..CHANNELS {
            let ch = &mut self.channels[i];
            if ch.reset || ch.trigger || ch.counter_mode || ch.time_constant == 0 {
                continue;
            }
            ch.cycle_accum += delta_cycles;
            let limit = ch.time_constant as u64 * if ch.prescaler { 256 } else { 16 } * 2;
            if ch.cycle_accum >= limit {
                ch.cycle_accum -= limit;
                if ch.interrupt_enable {
                    self.pending_irq |= 1 << i;
                }
            }
        }

        if self.irq_cooldown > 0 {
            self.irq_cooldown -= 1;
            return None;
        }

        for i in 0..CHANNELS {
            if self.pending_irq & (1 << i) != 0 {
                let vector = (self.vector & 0xF1) | ((i as u8) << 1);
                self.pending_irq &= !(1 << i);
                self.irq_cooldown = 2;
                return Some(vector);
            }
        }
        None
    }
}

impl Default for Ctc {
    fn default() -> Self {
        Self::new()
    }
}
