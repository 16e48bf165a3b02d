use clap::{value_parser, ArgAction, Args, Parser, Subcommand, ValueEnum};
use irpmaster::{
    decode::{identify, Decode, DecodeOracle, RenderOracle},
    parse_params,
    protocols::ProtocolDatabase,
    Cleaner, IrSequence, IrSignal, ModulatedIrSequence, Parameters, Pass, Pronto, Protocol, RenderSession,
    RepeatFinder, DEFAULT_FREQUENCY,
};
use irptool::config::Config;
use itertools::Itertools;
use log::{debug, error, info, Level, LevelFilter, Metadata, Record};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "irptool",
    version = env!("CARGO_PKG_VERSION"),
    author = env!("CARGO_PKG_AUTHORS"),
    about = "Render IRP protocols, convert Pronto Hex and analyze captured IR",
    subcommand_required = true
)]
struct App {
    /// Increase message verbosity
    #[arg(long, short, action = ArgAction::Count, global = true, conflicts_with = "quiet")]
    verbose: u8,

    /// Silence all warnings
    #[arg(long, short, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Configuration file
    #[arg(long = "config", global = true, name = "CONFIG")]
    config: Option<PathBuf>,

    /// Location of IrpProtocols.xml
    #[arg(long = "irp-protocols", global = true)]
    irp_protocols: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a protocol with parameters and print
    Render(Render),
    /// Parse a pronto hex code, or make a short form code
    Pronto(ProntoCommand),
    /// Find the repeating part of a captured signal
    Analyze(Analyze),
}

#[derive(Clone, Copy, ValueEnum)]
enum RenderPass {
    Intro,
    Repeat,
    Ending,
    All,
}

impl From<RenderPass> for Pass {
    fn from(pass: RenderPass) -> Self {
        match pass {
            RenderPass::Intro => Pass::Intro,
            RenderPass::Repeat => Pass::Repeat,
            RenderPass::Ending => Pass::Ending,
            RenderPass::All => Pass::All,
        }
    }
}

#[derive(Args)]
struct Render {
    /// IRP Notation or name of protocol in IrpProtocols.xml
    #[arg(long = "irp", short = 'i', name = "IRP")]
    irp: String,

    /// Set IRP parameter like KEY=VALUE
    #[arg(
        long = "argument",
        short = 'a',
        value_delimiter = ',',
        name = "ARGUMENT"
    )]
    arguments: Vec<String>,

    /// Render one pass only
    #[arg(long = "pass", short = 'p', conflicts_with_all = ["pronto", "REPEATS"])]
    pass: Option<RenderPass>,

    /// Print as pronto hex
    #[arg(long = "pronto", short = 'P', conflicts_with = "REPEATS")]
    pronto: bool,

    /// Number of repeats to render
    #[arg(
        long = "repeats",
        short = 'R',
        value_parser = value_parser!(u64).range(0..99),
        name = "REPEATS"
    )]
    repeats: Option<u64>,
}

#[derive(Args)]
struct ProntoCommand {
    /// Make the short form code of this protocol (rc5, rc5x, rc6 or nec1)
    #[arg(long = "short", short = 's', name = "PROTOCOL", conflicts_with = "PRONTO")]
    short: Option<String>,

    /// Set parameter like KEY=VALUE
    #[arg(
        long = "argument",
        short = 'a',
        value_delimiter = ',',
        requires = "PROTOCOL",
        name = "ARGUMENT"
    )]
    arguments: Vec<String>,

    /// Pronto Hex code
    #[arg(name = "PRONTO", required_unless_present = "PROTOCOL", num_args = 1..)]
    pronto: Vec<String>,
}

#[derive(Args)]
struct Analyze {
    /// Carrier frequency in Hz of the capture
    #[arg(long = "frequency", short = 'f', value_parser = value_parser!(u32).range(0..1_000_000))]
    frequency: Option<u32>,

    /// Absolute tolerance in microseconds
    #[arg(long = "absolute-tolerance", name = "AEPS")]
    aeps: Option<f64>,

    /// Relative tolerance as a fraction
    #[arg(long = "relative-tolerance", name = "EPS")]
    eps: Option<f64>,

    /// Check the signal against this protocol, given as IRP Notation or name
    #[arg(long = "protocol", name = "PROTOCOL", requires = "ARGUMENT")]
    protocol: Option<String>,

    /// Protocol parameters to check against, like KEY=VALUE
    #[arg(
        long = "argument",
        short = 'a',
        value_delimiter = ',',
        requires = "PROTOCOL",
        name = "ARGUMENT"
    )]
    arguments: Vec<String>,

    /// Raw IR text
    #[arg(name = "RAWIR", required = true, num_args = 1..)]
    rawir: Vec<String>,
}

fn main() {
    let args = App::parse();

    log::set_logger(&CLI_LOGGER).unwrap();

    let level = if args.quiet {
        LevelFilter::Error
    } else {
        match args.verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    log::set_max_level(level);

    let mut config = match &args.config {
        Some(path) => match Config::load(path) {
            Ok(config) => config,
            Err(e) => {
                error!("{e}");
                std::process::exit(2);
            }
        },
        None => Config::default(),
    };

    if args.irp_protocols.is_some() {
        config.irp_protocols.clone_from(&args.irp_protocols);
    }

    match &args.command {
        Commands::Render(render_args) => render(&config, render_args),
        Commands::Pronto(pronto_args) => pronto(pronto_args),
        Commands::Analyze(analyze_args) => analyze(&mut config, analyze_args),
    }
}

/// IRP Notation is given as is, anything else is looked up by name
fn find_protocol(config: &Config, irp: &str) -> Protocol {
    let text = if irp.trim_start().starts_with('{') {
        irp.to_owned()
    } else {
        let Some(path) = &config.irp_protocols else {
            error!("‘{irp}’ is not IRP Notation and no IrpProtocols.xml is given");
            std::process::exit(2);
        };

        let database = match ProtocolDatabase::parse(path) {
            Ok(database) => database,
            Err(e) => {
                error!("{e}");
                std::process::exit(2);
            }
        };

        match database.find(irp) {
            Some(entry) => {
                info!("using protocol {}: {}", entry.name, entry.irp);
                entry.irp.clone()
            }
            None => {
                error!("{}: protocol {irp} not found", path.display());
                std::process::exit(2);
            }
        }
    };

    match Protocol::parse(&text) {
        Ok(protocol) => protocol,
        Err(e) => {
            error!("{text}: {e}");
            std::process::exit(2);
        }
    }
}

fn arguments(arguments: &[String]) -> Parameters {
    match parse_params(&arguments.join(" ")) {
        Ok(params) => params,
        Err(e) => {
            error!("{e}");
            std::process::exit(2);
        }
    }
}

fn render(config: &Config, args: &Render) {
    let protocol = find_protocol(config, &args.irp);
    let params = arguments(&args.arguments);

    if let Some(pass) = args.pass {
        match protocol.render_pass(&mut RenderSession::new(), &params, pass.into(), true) {
            Ok(seq) => println!("{}", seq.to_print_string(true, false, " ")),
            Err(e) => {
                error!("{}: {e}", e.kind());
                std::process::exit(2);
            }
        }

        return;
    }

    let signal = match protocol.render_ir_signal(&params) {
        Ok(signal) => signal,
        Err(e) => {
            error!("{}: {e}", e.kind());
            std::process::exit(2);
        }
    };

    info!("carrier: {}Hz", signal.frequency);

    if let Some(duty_cycle) = signal.duty_cycle {
        info!("duty cycle: {}%", (duty_cycle * 100.0).round());
    }

    if args.pronto {
        println!("{}", Pronto::to_string(&signal));
    } else if let Some(repeats) = args.repeats {
        let seq = signal.to_modulated_ir_sequence_explicit(1, repeats as usize, 1);

        println!("{}", seq.to_print_string(true, false, " "));
    } else {
        println!("{}", signal.to_print_string());
    }
}

fn pronto(args: &ProntoCommand) {
    if let Some(protocol) = &args.short {
        let params = arguments(&args.arguments);

        let (Some(device), Some(function)) = (params.get("D"), params.get("F")) else {
            error!("parameters D and F are required for a short form code");
            std::process::exit(2);
        };

        match Pronto::short_ccf(protocol, *device, params.get("S").copied(), *function) {
            Ok(Some(ccf)) => println!("{ccf}"),
            Ok(None) => {
                error!("no short form pronto for protocol {protocol}");
                std::process::exit(2);
            }
            Err(e) => {
                error!("{e}");
                std::process::exit(2);
            }
        }

        return;
    }

    let code = args.pronto.join(" ");

    let signal = match Pronto::parse(&code) {
        Ok(signal) => signal,
        Err(e) => {
            error!("{code}: {e}");
            std::process::exit(2);
        }
    };

    print_signal(&signal);
}

fn print_signal(signal: &IrSignal) {
    println!("frequency: {}Hz", signal.frequency.round());

    for (name, seq) in [
        ("intro", &signal.intro),
        ("repeat", &signal.repeat),
        ("ending", &signal.ending),
    ] {
        if !seq.is_empty() {
            println!("{name}: {}", seq.to_print_string(true, false, " "));
        }
    }
}

fn analyze(config: &mut Config, args: &Analyze) {
    if let Some(aeps) = args.aeps {
        config.absolute_tolerance = aeps;
    }

    if let Some(eps) = args.eps {
        config.relative_tolerance = eps;
    }

    let text = args.rawir.join(" ");

    // signed or unsigned; an odd count gets a trailing gap
    let durations = match IrSequence::parse(&text, true) {
        Ok(durations) => durations,
        Err(e) => {
            error!("{text}: {e}");
            std::process::exit(2);
        }
    };

    let frequency = args.frequency.map_or(DEFAULT_FREQUENCY, f64::from);

    let seq = ModulatedIrSequence::new(durations, frequency, None);

    let cleaner = Cleaner::new(&seq, &config.cleaner_options());

    debug!(
        "timings: {}",
        cleaner.timings().iter().map(|t| t.to_string()).join(" ")
    );

    let finder = RepeatFinder::new(&seq, &config.repeat_finder_options());

    let signal = match finder.to_ir_signal_clean(&seq) {
        Ok(signal) => signal,
        Err(e) => {
            error!("{e}");
            std::process::exit(2);
        }
    };

    println!("repeat finder: {}", finder.data());
    print_signal(&signal);

    if let Some(irp) = &args.protocol {
        let protocol = find_protocol(config, irp);
        let params = arguments(&args.arguments);

        let mut oracle = RenderOracle::new();
        oracle.absolute_tolerance = config.absolute_tolerance;
        oracle.relative_tolerance = config.relative_tolerance;
        oracle.add(irp, protocol, vec![params.clone()]);

        for decode in oracle.decode(&signal.to_modulated_ir_sequence(1)) {
            debug!("decoded: {} {:?}", decode.protocol, decode.parameters);
        }

        let expected = Decode::new(irp, params);

        if identify(&oracle, &signal, &expected) {
            println!("identified as {irp}");
        } else {
            println!("not identified as {irp}");
            std::process::exit(1);
        }
    }
}

static CLI_LOGGER: CliLogger = CliLogger;

struct CliLogger;

impl log::Log for CliLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            eprintln!(
                "{}: {}",
                match record.level() {
                    Level::Trace => "trace",
                    Level::Debug => "debug",
                    Level::Info => "info",
                    Level::Warn => "warn",
                    Level::Error => "error",
                },
                record.args()
            );
        }
    }

    fn flush(&self) {}
}
