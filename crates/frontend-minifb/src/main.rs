//! SSM-64 emulator frontend v0.3.0.
//!
//! Provides two execution modes:
//!
//! - **GUI mode** (default): Scaled window showing the four-digit
//!   seven-segment display, keyboard command entry, save states.
//! - **Headless mode** (`--headless`): Runs a command script and prints
//!   each response plus an ASCII rendering of the final display.
//!
//! ## GUI keys
//!
//! - `0`–`9`: append a decimal digit to the pending operand
//! - `Backspace`: clear the pending operand
//! - `P`=push `O`=pop `K`=peek `R`=ready `E`=is-empty `F`=is-full
//! - `A`=add `S`=sub `I`=inc `M`=mul `D`=mod
//! - `W`=and `Y`=or `N`=not `X`=xor
//! - `F5`=save state `F9`=load state `Esc`=quit

use minifb::{Key, KeyRepeat, Scale, ScaleMode, Window, WindowOptions};
use ssm64_core::command::{
    self, OP_ADD, OP_AND, OP_INC, OP_IS_EMPTY, OP_IS_FULL, OP_MOD, OP_MUL, OP_NOT, OP_OR,
    OP_PEEK, OP_POP, OP_PUSH, OP_READY, OP_SUB, OP_XOR,
};
use ssm64_core::{savestate, script, DisplayMux, Message, Ssm64, SCREEN_HEIGHT, SCREEN_WIDTH};
use std::env;
use std::fs;
use std::path::Path;

/// Display-domain reference ticks advanced per video frame
/// (four full digit sweeps per frame at the default dwell).
const TICKS_PER_FRAME: u32 = 1024;

/// GUI command keys: (key, opcode, consumes pending operand).
const KEY_COMMANDS: [(Key, u8, bool); 15] = [
    (Key::P, OP_PUSH, true),
    (Key::O, OP_POP, false),
    (Key::K, OP_PEEK, false),
    (Key::R, OP_READY, false),
    (Key::E, OP_IS_EMPTY, false),
    (Key::F, OP_IS_FULL, false),
    (Key::A, OP_ADD, false),
    (Key::S, OP_SUB, false),
    (Key::I, OP_INC, false),
    (Key::M, OP_MUL, false),
    (Key::D, OP_MOD, false),
    (Key::W, OP_AND, false),
    (Key::Y, OP_OR, false),
    (Key::N, OP_NOT, false),
    (Key::X, OP_XOR, false),
];

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        usage(&args[0]);
        std::process::exit(0);
    }

    let headless = args.iter().any(|a| a == "--headless");
    let trace = args.iter().any(|a| a == "--trace");
    let resync = args.iter().any(|a| a == "--resync");
    let script_path: Option<String> = args.iter().skip(1).find(|a| !a.starts_with("--")).cloned();

    let mut ssm = Ssm64::new();
    ssm.trace_enabled = trace;
    ssm.link.resync_on_select = resync;

    let messages: Vec<Message> = match script_path {
        Some(ref path) => {
            let src = match fs::read_to_string(path) {
                Ok(s) => s,
                Err(e) => {
                    eprintln!("Error: failed to read {}: {}", path, e);
                    std::process::exit(1);
                }
            };
            match script::parse_script(&src) {
                Ok(msgs) => msgs,
                Err(e) => {
                    eprintln!("Error: {}: {}", path, e);
                    std::process::exit(1);
                }
            }
        }
        None => Vec::new(),
    };

    if headless {
        if script_path.is_none() {
            eprintln!("Error: --headless needs a script file");
            std::process::exit(1);
        }
        run_headless(&mut ssm, &messages, trace);
    } else {
        run_gui(&mut ssm, &messages, script_path.as_deref());
    }
}

fn usage(prog: &str) {
    eprintln!("SSM-64 Emulator v0.3.0 - Rust");
    eprintln!("Usage: {} [script.ssm] [options]", prog);
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --headless           Run the script without a window");
    eprintln!("  --trace              Record and print a transaction trace");
    eprintln!("  --resync             Re-frame the serial link on every select edge");
    eprintln!();
    eprintln!("GUI keys: 0-9=operand P=push O=pop K=peek R=ready E=empty F=full");
    eprintln!("          A=add S=sub I=inc M=mul D=mod W=and Y=or N=not X=xor");
    eprintln!("          F5=Save F9=Load Esc=Quit");
}

fn print_transaction(msg: Message, reply: u8) {
    println!(
        "{:<5} 0x{:02X} 0x{:02X} -> 0x{:02X}",
        command::mnemonic(msg.op),
        msg.op,
        msg.arg,
        reply
    );
}

// ─── Headless Mode ──────────────────────────────────────────────────────────

fn run_headless(ssm: &mut Ssm64, messages: &[Message], trace: bool) {
    for &msg in messages {
        let reply = ssm.run_message(msg);
        print_transaction(msg, reply);
    }

    ssm.refresh_display(TICKS_PER_FRAME);
    println!();
    for line in DisplayMux::render_ascii(ssm.command(), ssm.response()).lines() {
        println!("  {}", line);
    }
    println!();
    println!(
        "{} messages, {} edges, SP=0x{:02X}",
        ssm.link.dbg_messages, ssm.dbg_edges, ssm.stack.sp
    );

    if trace {
        for (i, entry) in ssm.link_trace.iter().enumerate() {
            println!("[TRACE {:3}] {}", i, entry);
        }
    }
}

// ─── GUI Mode ───────────────────────────────────────────────────────────────

fn run_gui(ssm: &mut Ssm64, startup: &[Message], script_path: Option<&str>) {
    // Run any startup script before opening the window.
    for &msg in startup {
        let reply = ssm.run_message(msg);
        print_transaction(msg, reply);
    }

    let mut window = Window::new(
        "SSM-64 Emulator v0.3.0",
        SCREEN_WIDTH,
        SCREEN_HEIGHT,
        WindowOptions {
            scale: Scale::X4,
            scale_mode: ScaleMode::AspectRatioStretch,
            resize: true,
            ..Default::default()
        },
    )
    .expect("Failed to create window");
    window.set_target_fps(60);

    let state_file = savestate::state_path(script_path);
    let mut operand: u8 = 0;

    const DIGIT_KEYS: [Key; 10] = [
        Key::Key0, Key::Key1, Key::Key2, Key::Key3, Key::Key4,
        Key::Key5, Key::Key6, Key::Key7, Key::Key8, Key::Key9,
    ];

    while window.is_open() && !window.is_key_down(Key::Escape) {
        // Operand entry (decimal, wrapping at 256 like the wire format)
        for (d, &key) in DIGIT_KEYS.iter().enumerate() {
            if window.is_key_pressed(key, KeyRepeat::No) {
                operand = operand.wrapping_mul(10).wrapping_add(d as u8);
            }
        }
        if window.is_key_pressed(Key::Backspace, KeyRepeat::No) {
            operand = 0;
        }

        for &(key, op, takes_operand) in KEY_COMMANDS.iter() {
            if window.is_key_pressed(key, KeyRepeat::No) {
                let arg = if takes_operand { operand } else { 0 };
                let reply = ssm.transfer(op, arg);
                print_transaction(Message { op, arg }, reply);
                if takes_operand {
                    operand = 0;
                }
            }
        }

        if window.is_key_pressed(Key::F5, KeyRepeat::No) {
            match savestate::save_to_file(&ssm.save_state(), Path::new(&state_file)) {
                Ok(()) => println!("State saved: {}", state_file),
                Err(e) => eprintln!("Save failed: {}", e),
            }
        }
        if window.is_key_pressed(Key::F9, KeyRepeat::No) {
            match savestate::load_from_file(Path::new(&state_file)) {
                Ok(s) => {
                    ssm.load_state(s);
                    println!("State loaded: {}", state_file);
                }
                Err(e) => eprintln!("Load failed: {}", e),
            }
        }

        ssm.refresh_display(TICKS_PER_FRAME);
        let buffer = ssm.framebuffer_u32();
        window
            .update_with_buffer(&buffer, SCREEN_WIDTH, SCREEN_HEIGHT)
            .expect("window update");
        window.set_title(&format!(
            "SSM-64 v0.3.0 - CMD 0x{:02X} RSP 0x{:02X} - operand {} - depth {}",
            ssm.command(),
            ssm.response(),
            operand,
            ssm.stack.depth()
        ));
    }
}
