use std::io;
use std::path::{Path, PathBuf};
use std::process;
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Context};
use clap::{error::ErrorKind, CommandFactory, Parser};
use env_logger::Env;

use patchy::{
  bridge::Bridge,
  console::ConsoleRenderer,
  cpu::DEFAULT_MEMORY_WORDS,
  interrupt::{self, INTERRUPT_EXIT_STATUS},
  Architecture,
  Assembler,
  Cpu,
  EngineConfig,
  Program,
  RunSummary,
  Status,
};

const EXIT_SUCCESS : i32 = 0;
const EXIT_FAILURE : i32 = 1;
const EXIT_FAULTED : i32 = 2;

/// How long the Ctrl-C handler waits for the CPU to hand over a core dump.
const DUMP_TIMEOUT: Duration = Duration::from_millis(500);

#[derive(Parser, Debug)]
#[command(author, version, about = "A small virtual computer: assembler, binary images, and CPU")]
struct Options {
  /// Binary image to load and run.
  image: Option<PathBuf>,

  /// Print the instruction set and exit.
  #[arg(long)]
  info: bool,

  /// Same as --info.
  #[arg(long)]
  instructions: bool,

  /// Assemble this source file.
  #[arg(long, value_name = "SOURCE")]
  assemble: Option<PathBuf>,

  /// Print the disassembled program before running it.
  #[arg(long)]
  showprog: bool,

  /// Run the assembled program without writing an image.
  #[arg(long)]
  run: bool,

  /// Stop after assembling.
  #[arg(long)]
  no_exec: bool,

  /// Run without the console renderer.
  #[arg(long)]
  headless: bool,

  /// Where --assemble writes the binary image.
  #[arg(long, value_name = "FILE", default_value = "out.bin")]
  out: PathBuf,

  /// Log every executed instruction.
  #[arg(long)]
  debug: bool,

  /// Data memory size in 16 bit words.
  #[arg(
    long,
    env = "PATCHY_MEMORY_WORDS",
    default_value_t = DEFAULT_MEMORY_WORDS as u32,
    value_parser = clap::value_parser!(u32).range(1..=65536)
  )]
  memory_words: u32,

  /// Send the renderer a snapshot every N cycles; 0 disables snapshots.
  #[arg(long, env = "PATCHY_SNAPSHOT_INTERVAL", default_value_t = 1)]
  snapshot_interval: u64,

  /// Bound on queued renderer events; unbounded when absent.
  #[arg(long, env = "PATCHY_BRIDGE_CAPACITY")]
  bridge_capacity: Option<usize>,
}

impl Options {
  fn engine_config(&self) -> EngineConfig {
    EngineConfig {
      memory_words      : self.memory_words as usize,
      snapshot_interval : self.snapshot_interval,
    }
  }
}

fn main() {
  let options = Options::parse();

  let default_level = match options.debug {
    true  => "debug",
    false => "info"
  };
  env_logger::Builder::from_env(Env::default().default_filter_or(default_level)).init();

  #[cfg(feature = "trace_execution")]
  log::info!("Execution tracing ENABLED");

  let status = match execute(&options) {
    Ok(status) => status,
    Err(error) => {
      eprintln!("error: {:#}", error);
      EXIT_FAILURE
    }
  };
  process::exit(status);
}

fn execute(options: &Options) -> anyhow::Result<i32> {
  let architecture = Architecture::load().context("building the instruction table")?;

  if options.info || options.instructions {
    println!("{}", architecture.instructions_s());
    return Ok(EXIT_SUCCESS);
  }

  let program = match (&options.assemble, &options.image) {

    (Some(source), _) => {
      let program = assemble(&architecture, source)?;
      if !options.run {
        program.write_image(&options.out)?;
        log::info!("Wrote {}", options.out.display());
      }
      if options.no_exec {
        if options.showprog {
          show_program(&architecture, &program);
        }
        return Ok(EXIT_SUCCESS);
      }
      program
    }

    (None, Some(image)) => Program::read_image(image)?,

    (None, None) => {
      Options::command()
        .error(ErrorKind::MissingRequiredArgument, "give an IMAGE to run, --assemble SOURCE, or --instructions")
        .exit()
    }

  };

  if options.showprog {
    show_program(&architecture, &program);
  }

  let summary = run(&architecture, program, options)?;
  println!("{}", summary);

  Ok(
    match (summary.interrupted, &summary.status) {
      (true, _)                   => INTERRUPT_EXIT_STATUS,
      (false, Status::Faulted(_)) => EXIT_FAULTED,
      (false, _)                  => EXIT_SUCCESS,
    }
  )
}

fn assemble(architecture: &Architecture, source: &Path) -> anyhow::Result<Program> {
  let text =
    std::fs::read_to_string(source)
      .with_context(|| format!("reading {}", source.display()))?;
  let (program, summary) =
    Assembler::new(architecture)
      .assemble_with_summary(&text)
      .with_context(|| format!("assembling {}", source.display()))?;
  print!("{}", summary);
  Ok(program)
}

fn show_program(architecture: &Architecture, program: &Program) {
  for (address, instruction) in program.iter().enumerate() {
    println!("  0x{:x} {}", address, architecture.disassemble(instruction));
  }
}

/**
  Runs the CPU on its own thread. Unless headless, the console renderer runs on this
  thread until the CPU closes the bridge.
*/
fn run(architecture: &Architecture, program: Program, options: &Options) -> anyhow::Result<RunSummary> {
  let mut cpu = Cpu::new(architecture, options.engine_config());
  cpu.load_instructions(program)?;
  cpu.set_interrupt(interrupt::install(DUMP_TIMEOUT).context("installing the Ctrl-C handler")?);

  if options.headless {
    let summary = cpu.run();
    if options.debug {
      eprintln!("{}", cpu.dump_core());
    }
    return Ok(summary);
  }

  let bridge = Bridge::new(options.bridge_capacity);
  cpu.set_renderer_output(bridge.engine_events);
  cpu.set_renderer_input(bridge.engine_input);
  let render_events = bridge.render_events;
  let render_input  = bridge.render_input;

  thread::scope(|scope| {
    let engine = scope.spawn(|| cpu.run());

    let rendered =
      ConsoleRenderer::new(io::stdin().lock(), io::stdout())
        .run(render_events, render_input);
    let summary = engine.join().map_err(|_| anyhow!("the CPU thread panicked"))?;

    let outcome = rendered.context("writing to the console")?;
    log::debug!("Renderer finished: {:?}", outcome);
    Ok(summary)
  })
}
