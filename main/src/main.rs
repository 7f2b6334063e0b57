use std::{fs::{File, OpenOptions}, io::{BufWriter, Write}, path::{Path, PathBuf}};

use anyhow::Context;
use clap::Parser;
use log::LevelFilter;
use minifb::{Key, Window, WindowOptions};
use simple_logger::SimpleLogger;

use pmx_core_emulator::{
    asm::assemble_file,
    device::{display::{HEIGHT, WIDTH}, rgb444_to_rgb888, Color, Display},
    opcode::disassemble,
    Cell, Core, Fault, MachineConfig, TraceRecord, Tracer, STACK_CAPACITY,
};
use pmx_utils::read_program_file;

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Mode {
    /// One instruction per frame.
    Step,

    /// Run the whole program in the first frame.
    Run,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => LevelFilter::Off,
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "pmx", about = "Run a PMX program in a window.")]
struct Args {
    /// Program to load: comma/newline separated cells, or assembly with --asm.
    #[arg(default_value = "program.rom")]
    program: PathBuf,

    /// Treat the program as assembly source.
    #[arg(long)]
    asm: bool,

    #[arg(long, value_enum, default_value_t = Mode::Step)]
    mode: Mode,

    /// Append a record of every executed instruction to this file.
    #[arg(long, value_name = "FILE")]
    trace: Option<PathBuf>,

    /// Run without opening a window.
    #[arg(long)]
    headless: bool,

    /// Stop after this many frames.
    #[arg(long)]
    frames: Option<u64>,

    #[arg(long, value_enum, default_value_t = LogLevel::Info)]
    log_level: LogLevel,

    #[arg(long, default_value_t = STACK_CAPACITY)]
    stack_capacity: usize,

    /// Print a listing of the program and exit.
    #[arg(long)]
    disassemble: bool,
}

/// Writes trace records to a file in the plain-text log layout.
struct FileTracer {
    out: BufWriter<File>,
    failed: bool,
}

impl FileTracer {
    fn new(file: File) -> Self {
        Self { out: BufWriter::new(file), failed: false }
    }
}

impl Tracer for FileTracer {
    fn trace(&mut self, record: &TraceRecord<'_>) {
        if self.failed {
            return;
        }

        if let Err(e) = write!(self.out, "{record}") {
            log::error!("writing trace failed, tracing stopped: {e}");
            self.failed = true;
        }
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    SimpleLogger::new()
        .with_level(args.log_level.into())
        .init()
        .context("initialising logger")?;

    if args.disassemble {
        for (addr, line) in disassemble(&read_cells(&args.program, args.asm)?) {
            println!("{addr:>6}  {line}");
        }
        return Ok(());
    }

    let config = MachineConfig { stack_capacity: args.stack_capacity, ..MachineConfig::default() };
    let mut core = Core::with_config(config).context("configuring machine")?;

    let program = read_cells(&args.program, args.asm)?;
    core.load_program(&program)
        .with_context(|| format!("loading {}", args.program.display()))?;
    log::info!("loaded {} cells from {}", program.len(), args.program.display());

    if let Some(path) = &args.trace {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("opening trace file {}", path.display()))?;
        core.set_tracer(FileTracer::new(file));
    }

    if let Some(display) = core.devices.device_mut::<Display>() {
        display.draw_string("START", 0, 0, 4, Color::Red.rgb444());
    }

    if args.headless {
        run_headless(&mut core, &args);
        return Ok(());
    }

    run_window(&mut core, &args)
}

fn read_cells(path: &Path, asm: bool) -> anyhow::Result<Vec<Cell>> {
    if asm {
        assemble_file(path).with_context(|| format!("assembling {}", path.display()))
    } else {
        read_program_file(path).with_context(|| format!("reading {}", path.display()))
    }
}

/// Runs one frame's worth of instructions. A fault has already halted the machine by the time
/// it is returned, so it is only reported.
fn run_quantum(core: &mut Core, mode: Mode) {
    let result = match mode {
        Mode::Step => core.step().map(|_| ()),
        Mode::Run => core.execute_until_halt(),
    };

    if let Err(fault) = result {
        report_fault(core, &fault);
    }
}

fn report_fault(core: &Core, fault: &Fault) {
    log::error!("machine halted: {fault} (pc {})", core.program_counter);
}

fn run_headless(core: &mut Core, args: &Args) {
    let mut frame = 0;
    while !core.is_halted() && args.frames.is_none_or(|limit| frame < limit) {
        run_quantum(core, args.mode);
        frame += 1;
    }

    log::info!("stopped after {frame} frames");
    if let Some(display) = core.devices.device::<Display>() {
        let lit = display.pixels().iter().filter(|p| **p != Color::Black.rgb444()).count();
        log::info!("{lit} pixels lit");
    }
}

fn run_window(core: &mut Core, args: &Args) -> anyhow::Result<()> {
    let mut window = Window::new("PMX Virtual Machine", WIDTH, HEIGHT, WindowOptions::default())
        .context("opening window")?;
    window.set_target_fps(60);

    let mut buffer = vec![0u32; WIDTH * HEIGHT];
    let mut frame = 0;

    while window.is_open() && !window.is_key_down(Key::Escape) {
        if args.frames.is_some_and(|limit| frame >= limit) {
            break;
        }

        if !core.is_halted() {
            run_quantum(core, args.mode);
        }

        if let Some(display) = core.devices.device::<Display>() {
            for (out, pixel) in buffer.iter_mut().zip(display.pixels()) {
                *out = rgb444_to_rgb888(*pixel);
            }
        }

        window.update_with_buffer(&buffer, WIDTH, HEIGHT)
            .context("presenting frame")?;
        frame += 1;
    }

    Ok(())
}

#[cfg(test)]
mod test {
    use super::{run_quantum, Mode};
    use pmx_core_emulator::{Core, ExecutionResult};

    #[test]
    fn test_quantum_modes() {
        let source = "POT 1\nPOT 2\nADD\nHALT";

        let mut core = Core::new_with_assembly(source).unwrap();
        run_quantum(&mut core, Mode::Step);
        assert_eq!(core.working_stack.cells(), [1]);
        assert!(!core.is_halted());

        let mut core = Core::new_with_assembly(source).unwrap();
        run_quantum(&mut core, Mode::Run);
        assert!(core.is_halted());
        assert_eq!(core.step(), Ok(ExecutionResult::Halt));
    }

    #[test]
    fn test_quantum_reports_fault() {
        let mut core = Core::new_with_assembly("ADD").unwrap();
        run_quantum(&mut core, Mode::Run);
        assert!(core.is_halted());
    }
}
