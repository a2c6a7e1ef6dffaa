//! Trace sink boundary (spec §9 "Global mutable state"): the core
//! never owns a file handle or a global on/off switch. It only knows
//! about a trait with an `append`/`set_enabled` pair; an external
//! binary-trace-writer crate (out of scope for this core, spec §1)
//! implements [`TraceSink`] and serializes [`TraceEvent`] to the wire
//! format spec §6 documents.

/// One record of the trace file format (spec §6). Each variant
/// carries exactly the fields that format's record needs; the sink
/// is responsible for the actual byte layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceEvent {
    /// One CPU instruction boundary.
    Step { pc: u16, cycles: u32 },
    /// 16-bit-addressed memory read.
    Read { addr: u16, value: u8 },
    /// 16-bit-addressed memory write.
    Write { addr: u16, value: u8 },
    /// 32-bit physical-addressed memory read.
    Read32 { addr: u32, value: u8 },
    /// 32-bit physical-addressed memory write.
    Write32 { addr: u32, value: u8 },
    /// Port input.
    In { port: u8, value: u8 },
    /// Port output.
    Out { port: u8, value: u8 },
    /// A named register/state dump.
    Dump { label: &'static str },
    /// A bank/mapping change.
    Map { cpua16: bool, forc16: bool },
    /// Device-table header record.
    Devices,
    /// `I` register changed.
    SetI { value: u8 },
    /// Interrupt mode changed.
    SetIm { mode: u8 },
    /// `EI`/`DI` changed IFF1.
    SetEi { enabled: bool },
    /// An interrupt was delivered.
    Irq { vector: u8 },
}

/// Injectable trace sink. The core calls `append` at every traced
/// boundary and `set_enabled` at the handful of points the original
/// firmware toggled tracing (index-pulse edges, disk-wait
/// countdowns); whether that actually produces output is entirely the
/// sink's business.
pub trait TraceSink {
    fn append(&mut self, event: TraceEvent);
    fn set_enabled(&mut self, enabled: bool);
}

/// Default sink: discards every event. A caller that doesn't care
/// about tracing pays no cost beyond one vtable call per traced
/// boundary.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullTraceSink;

impl TraceSink for NullTraceSink {
    fn append(&mut self, _event: TraceEvent) {}
    fn set_enabled(&mut self, _enabled: bool) {}
}
