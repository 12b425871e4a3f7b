//! # ssm64-core
//!
//! Edge-accurate emulation core for the SSM-64 serial stack machine (v0.3.0).
//!
//! The SSM-64 is a slave serial peripheral: a host toggles chip-select and
//! clocks two-byte messages (opcode + operand) into it; the device executes
//! exactly one operation on its 64-cell byte stack per message and shifts a
//! one-byte response back out during the tail of the same 24-edge exchange.
//! A time-multiplexed four-digit seven-segment display continuously shows
//! the last command byte and last response byte.
//!
//! ## Architecture
//!
//! - [`Ssm64`] — Top-level device wiring link, stack, and display together
//! - [`SerialLink`] — Bit-serial receiver/dispatcher/transmitter engine,
//!   one atomic protocol step per serial-clock edge
//! - [`Stack`] — 64-cell operand stack with unguarded wrapping pointer moves
//! - [`command`] — Opcode decode and single-message execution
//! - [`DisplayMux`] — Free-running four-digit display multiplexer and
//!   framebuffer renderer (independent clock domain, read-only view)
//! - [`script`] — Text command scripts for driving the emulator
//! - [`savestate`] — Emulator state snapshots (bincode + deflate)
//!
//! ## Clock domains
//!
//! The serial domain advances only through [`Ssm64::clock_edge`] while
//! selected. The display domain advances through [`DisplayMux::tick`] and
//! never writes core state; it reads the `(command, response)` byte pair,
//! which the serial domain updates only at message completion.

pub mod command;
pub mod display;
pub mod link;
pub mod savestate;
pub mod script;
pub mod stack;

pub use display::DisplayMux;
pub use link::SerialLink;
pub use script::Message;
pub use stack::Stack;

/// Stack capacity in cells.
pub const STACK_DEPTH: usize = 64;
/// Stack pointer value marking an empty stack (the reset value).
pub const SP_EMPTY: u8 = 0x40;
/// Stack pointer value marking a full stack.
pub const SP_FULL: u8 = 0x00;
/// Serial-clock edges per complete transaction (2 bytes in + 1 byte out).
pub const FRAME_EDGES: u8 = 24;
/// Number of multiplexed digit positions.
pub const DIGIT_COUNT: usize = 4;
/// Reference-clock ticks a digit stays enabled before the mux advances.
/// At a 16 kHz reference clock this refreshes the full display at ~62 Hz.
pub const DIGIT_DWELL_TICKS: u32 = 64;

/// Display framebuffer width in pixels.
pub const SCREEN_WIDTH: usize = 128;
/// Display framebuffer height in pixels.
pub const SCREEN_HEIGHT: usize = 64;

/// Cap on retained transaction trace entries.
const TRACE_CAP: usize = 200;

/// Main SSM-64 device combining all subsystems.
pub struct Ssm64 {
    pub link: SerialLink,
    pub stack: Stack,
    pub display: DisplayMux,
    /// Debug counter: selected serial-clock edges since reset.
    pub dbg_edges: u64,
    /// Transaction trace for diagnostics (first 200 entries when enabled).
    pub link_trace: Vec<String>,
    pub trace_enabled: bool,
}

impl Ssm64 {
    /// Create a new device with all registers in power-on state.
    pub fn new() -> Self {
        Ssm64 {
            link: SerialLink::new(),
            stack: Stack::new(),
            display: DisplayMux::new(),
            dbg_edges: 0,
            link_trace: Vec::new(),
            trace_enabled: false,
        }
    }

    /// Reset registers, stack, and display to power-on state.
    ///
    /// The `resync_on_select` policy is preserved across resets.
    pub fn reset(&mut self) {
        self.link.reset();
        self.stack.reset();
        self.display.reset();
        self.dbg_edges = 0;
        self.link_trace.clear();
        // Note: trace_enabled is NOT cleared on reset (host-side setting)
    }

    // --- Pin-level interface ---

    /// Drive the chip-select line.
    pub fn set_select(&mut self, level: bool) {
        self.link.set_select(level);
    }

    /// Advance one serial-clock cycle; returns the output line level.
    pub fn clock_edge(&mut self, mosi: bool) -> bool {
        let miso = self.link.clock_edge(mosi, &mut self.stack);
        if self.link.selected {
            self.dbg_edges += 1;
        }
        miso
    }

    // --- Read-only view for the display domain ---

    /// Last fully received command byte.
    pub fn command(&self) -> u8 {
        self.link.command
    }

    /// Last computed response byte.
    pub fn response(&self) -> u8 {
        self.link.response
    }

    // --- Host-side conveniences ---

    /// Run one complete 24-edge selected exchange and return the byte
    /// presented on the output line during edges 17–24. Built strictly on
    /// the pin-level interface.
    pub fn transfer(&mut self, op: u8, arg: u8) -> u8 {
        self.set_select(true);
        let mut reply = 0u8;
        for edge in 0..FRAME_EDGES {
            let mosi = match edge {
                0..=7 => op >> (7 - edge) & 1 != 0,
                8..=15 => arg >> (15 - edge) & 1 != 0,
                _ => false, // drain edges; input is don't-care
            };
            let miso = self.clock_edge(mosi);
            if edge >= 16 {
                reply = reply << 1 | miso as u8;
            }
        }
        self.set_select(false);

        if self.trace_enabled && self.link_trace.len() < TRACE_CAP {
            self.link_trace.push(format!(
                "{:<5} CMD=0x{:02X} ARG=0x{:02X} -> 0x{:02X} SP=0x{:02X}",
                command::mnemonic(op),
                op,
                arg,
                reply,
                self.stack.sp
            ));
        }
        reply
    }

    /// Run a parsed script message.
    pub fn run_message(&mut self, msg: Message) -> u8 {
        self.transfer(msg.op, msg.arg)
    }

    /// Advance the display clock domain by `ticks` reference ticks and
    /// redraw the framebuffer from the current byte pair.
    pub fn refresh_display(&mut self, ticks: u32) {
        let (cmd, rsp) = (self.link.command, self.link.response);
        for _ in 0..ticks {
            self.display.tick();
        }
        self.display.render_to_framebuffer(cmd, rsp);
    }

    /// Display framebuffer as packed 0RGB pixels for windowing frontends.
    pub fn framebuffer_u32(&self) -> Vec<u32> {
        self.display
            .framebuffer
            .chunks_exact(4)
            .map(|px| (px[0] as u32) << 16 | (px[1] as u32) << 8 | px[2] as u32)
            .collect()
    }

    // --- Save states ---

    /// Capture the full emulator state.
    pub fn save_state(&self) -> savestate::SaveState {
        savestate::SaveState {
            link: savestate::LinkState {
                bit_count: self.link.bit_count,
                shift_in: self.link.shift_in,
                command: self.link.command,
                argument: self.link.argument,
                response: self.link.response,
                shift_out: self.link.shift_out,
                selected: self.link.selected,
                resync_on_select: self.link.resync_on_select,
                dbg_messages: self.link.dbg_messages,
            },
            stack: savestate::StackState {
                cells: self.stack.cells.to_vec(),
                sp: self.stack.sp,
            },
            display: self.display.save_state(),
            dbg_edges: self.dbg_edges,
        }
    }

    /// Restore the emulator state captured by [`Ssm64::save_state`].
    pub fn load_state(&mut self, s: savestate::SaveState) {
        self.link.bit_count = s.link.bit_count;
        self.link.shift_in = s.link.shift_in;
        self.link.command = s.link.command;
        self.link.argument = s.link.argument;
        self.link.response = s.link.response;
        self.link.shift_out = s.link.shift_out;
        self.link.selected = s.link.selected;
        self.link.resync_on_select = s.link.resync_on_select;
        self.link.dbg_messages = s.link.dbg_messages;
        let n = s.stack.cells.len().min(STACK_DEPTH);
        self.stack.cells[..n].copy_from_slice(&s.stack.cells[..n]);
        self.stack.sp = s.stack.sp;
        self.display.load_state(s.display);
        self.dbg_edges = s.dbg_edges;
    }
}

impl Default for Ssm64 {
    fn default() -> Self {
        Self::new()
    }
}
