//! The cycle driver: the boundary between this crate's deterministic
//! peripheral model and an external Z80 instruction interpreter (out
//! of scope here, spec §1).
//!
//! The interpreter is never owned by [`Emulator`] — it is borrowed for
//! the duration of one [`Emulator::step`] call through the generic
//! [`CpuCore`] parameter, and it reaches back into the emulator only
//! through the [`CpuBus`] trait `Emulator` implements. This avoids the
//! `Rc<RefCell<_>>` cycle a mutually-referencing CPU/bus pair would
//! otherwise need.

use crate::bus::Bus;
use crate::memory::RomError;
use crate::peripherals::{FloppyError, Peripherals};
use crate::trace::{NullTraceSink, TraceEvent, TraceSink};

/// Everything the Z80 core needs from the outside world: memory,
/// ports, and the interrupt-acknowledge cycle. `Emulator` implements
/// this; the core never sees `Bus`/`Peripherals` directly.
pub trait CpuBus {
    fn read(&mut self, addr: u16) -> u8;
    fn write(&mut self, addr: u16, value: u8);
    fn in_port(&mut self, port: u8) -> u8;
    fn out_port(&mut self, port: u8, value: u8);
    /// Called once per instruction boundary when the interrupt line is
    /// asserted and the core's own IFF1/EI state allows it to take the
    /// interrupt. Returns the vector byte to dispatch through IM2's
    /// table (or to treat as an IM1 RST 38h trigger, at the core's
    /// discretion).
    fn int_ack(&mut self) -> u8;
    /// Whether an interrupt is currently pending (so the core can
    /// decide whether to poll `int_ack` at all).
    fn irq_pending(&self) -> bool;
    /// Called by the core when it executes (or leaves) a `HALT`
    /// instruction, reporting the new halt state (spec §6's
    /// `halt(ctx, state)` callback). `Emulator` latches this so a
    /// driver loop can use [`Emulator::is_halted`] as one of its
    /// cancellation conditions (spec §5).
    fn halt(&mut self, state: bool);
}

/// The external Z80 instruction interpreter. Consumed, not
/// implemented, by this crate — callers supply their own core.
pub trait CpuCore {
    /// Execute exactly one instruction (or accept one pending
    /// interrupt), returning the number of T-states it consumed.
    fn step(&mut self, bus: &mut dyn CpuBus) -> u32;
    /// A driver loop's own convenience query of the core's halt state;
    /// distinct from [`CpuBus::halt`], which is the core's push
    /// notification *into* the emulator. A real core can back both
    /// from the same internal flag.
    fn is_halted(&self) -> bool;
}

/// Owns the bus (ROM/RAM) and every peripheral, and drives them
/// forward in lockstep with an externally-supplied CPU core.
pub struct Emulator {
    bus: Bus,
    peripherals: Peripherals,
    trace: Box<dyn TraceSink>,
    halted: bool,
}

impl Emulator {
    pub fn new() -> Self {
        Self {
            bus: Bus::new(),
            peripherals: Peripherals::new(),
            trace: Box::new(NullTraceSink),
            halted: false,
        }
    }

    /// Whether the CPU last reported itself halted through the
    /// [`CpuBus::halt`] callback.
    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Replace the trace sink (e.g. with a real file-backed writer
    /// supplied by the caller).
    pub fn set_trace_sink(&mut self, sink: Box<dyn TraceSink>) {
        self.trace = sink;
    }

    pub fn reset(&mut self) {
        self.bus.reset();
        self.peripherals.reset();
        self.halted = false;
    }

    pub fn load_rom(&mut self, eprom: &[u8]) -> Result<(), RomError> {
        let result = self.bus.load_rom(eprom);
        if result.is_ok() {
            self.trace.append(TraceEvent::Map {
                cpua16: self.peripherals.cpua16(),
                forc16: self.peripherals.forc16(),
            });
        }
        result
    }

    pub fn load_floppy(&mut self, image: &[u8]) -> Result<(), FloppyError> {
        self.peripherals.load_floppy(image)
    }

    pub fn press_key(&mut self, key_id: u8) {
        self.peripherals.press_key(key_id);
    }

    pub fn release_key(&mut self, key_id: u8) {
        self.peripherals.release_key(key_id);
    }

    /// If either LED latch changed since the last call, the decoded
    /// (main-panel, sequencer-panel) bitfields to report to a
    /// front-end.
    pub fn poll_led_change(&mut self) -> Option<(u16, u8)> {
        self.peripherals.poll_led_change()
    }

    pub fn peripherals(&self) -> &Peripherals {
        &self.peripherals
    }

    /// Advance the machine by one cycle-step (spec §4.10): run one
    /// CPU instruction (or interrupt acceptance), then advance every
    /// peripheral by the T-states that instruction consumed. Returns
    /// the T-state count, so a driver loop can accumulate wall-clock
    /// or host-audio timing from it.
    pub fn step<C: CpuCore>(&mut self, cpu: &mut C) -> u32 {
        let delta_cycles = cpu.step(self);
        self.trace.append(TraceEvent::Step {
            pc: 0,
            cycles: delta_cycles,
        });

        let ram = self.bus.ram_mut();
        if self.peripherals.tick(delta_cycles as u64, ram) {
            self.trace.append(TraceEvent::Irq { vector: 0 });
        }

        delta_cycles
    }
}

impl Default for Emulator {
    fn default() -> Self {
        Self::new()
    }
}

impl CpuBus for Emulator {
    fn read(&mut self, addr: u16) -> u8 {
        let value = self
            .bus
            .read(addr, self.peripherals.cpua16(), self.peripherals.forc16());
        self.trace.append(TraceEvent::Read { addr, value });
        value
    }

    fn write(&mut self, addr: u16, value: u8) {
        self.bus
            .write(addr, value, self.peripherals.cpua16(), self.peripherals.forc16());
        self.trace.append(TraceEvent::Write { addr, value });
    }

    fn in_port(&mut self, port: u8) -> u8 {
        let value = self.peripherals.in_port(port);
        self.trace.append(TraceEvent::In { port, value });
        value
    }

    fn out_port(&mut self, port: u8, value: u8) {
        self.peripherals.out_port(port, value);
        self.trace.append(TraceEvent::Out { port, value });
    }

    fn int_ack(&mut self) -> u8 {
        let vector = self.peripherals.acknowledge_interrupt();
        self.trace.append(TraceEvent::Irq { vector });
        vector
    }

    fn irq_pending(&self) -> bool {
        self.peripherals.interrupt_pending()
    }

    fn halt(&mut self, state: bool) {
        self.halted = state;
    }
}
