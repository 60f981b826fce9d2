use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

use bounded_buffer::{Config, EventLog, Orchestrator, Verbosity, WorkConfig};

const USAGE: &str = "Usage: bounded_buffer [--config FILE] [--capacity N] [--producers N] \
[--items N] [--consumers N] [--no-delay] [--quiet | --summary | --verbose]";

#[derive(Debug, Default, PartialEq)]
struct Args {
    config: Option<PathBuf>,
    capacity: Option<usize>,
    producers: Option<usize>,
    items: Option<usize>,
    consumers: Option<usize>,
    no_delay: bool,
    verbosity: Option<Verbosity>,
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<Args, String> {
    let mut parsed = Args::default();
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                let path = args.next().ok_or("--config needs a file path")?;
                parsed.config = Some(PathBuf::from(path));
            }
            "--capacity" => parsed.capacity = Some(parse_count(&arg, args.next())?),
            "--producers" => parsed.producers = Some(parse_count(&arg, args.next())?),
            "--items" => parsed.items = Some(parse_count(&arg, args.next())?),
            "--consumers" => parsed.consumers = Some(parse_count(&arg, args.next())?),
            "--no-delay" => parsed.no_delay = true,
            "--quiet" => parsed.verbosity = Some(Verbosity::Quiet),
            "--summary" => parsed.verbosity = Some(Verbosity::Summary),
            "--verbose" => parsed.verbosity = Some(Verbosity::Events),
            other => return Err(format!("Unknown argument '{other}'")),
        }
    }

    Ok(parsed)
}

fn parse_count(flag: &str, value: Option<String>) -> Result<usize, String> {
    let value = value.ok_or_else(|| format!("{flag} needs a number"))?;
    value
        .parse()
        .map_err(|_| format!("{flag} expects a non-negative integer, got '{value}'"))
}

fn build_config(args: &Args) -> bounded_buffer::Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    if let Some(capacity) = args.capacity {
        config = config.with_capacity(capacity);
    }
    if let Some(producers) = args.producers {
        config = config.with_producers(producers);
    }
    if let Some(items) = args.items {
        config = config.with_items_per_producer(items);
    }
    if let Some(consumers) = args.consumers {
        config = config.with_consumers(consumers);
    }
    if args.no_delay {
        config = config.with_work(WorkConfig::none());
    }
    if let Some(verbosity) = args.verbosity {
        config = config.with_verbosity(verbosity);
    }
    config.validate()?;
    Ok(config)
}

/// Usage or configuration problems.
const EXIT_USAGE: u8 = 2;
/// The run failed or its report did not balance.
const EXIT_RUN_FAILED: u8 = 1;

fn exit_status(args: impl IntoIterator<Item = String>) -> u8 {
    let args = match parse_args(args) {
        Ok(args) => args,
        Err(message) => {
            eprintln!("{message}\n{USAGE}");
            return EXIT_USAGE;
        }
    };

    let config = match build_config(&args) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            return EXIT_USAGE;
        }
    };

    let log = EventLog::new(config.verbosity);
    let report = match Orchestrator::new(config).with_log(log).run() {
        Ok(report) => report,
        Err(err) => {
            eprintln!("{err}");
            return EXIT_RUN_FAILED;
        }
    };

    if log.enabled(Verbosity::Summary) {
        println!("{}", report.render(EventLog::should_use_colors()));
    }

    match report.check() {
        Ok(_) => 0,
        Err(err) => {
            eprintln!("{err}");
            EXIT_RUN_FAILED
        }
    }
}

fn main() -> ExitCode {
    ExitCode::from(exit_status(env::args().skip(1)))
}
