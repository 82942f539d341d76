//! Runs a demo pipeline of periodic generators, relays, and a collector.
#![warn(
    missing_docs,
    trivial_casts,
    trivial_numeric_casts,
    unused_import_braces,
    unused_qualifications
)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions, clippy::default_trait_access)]

use std::fs::File;
use std::path::PathBuf;

use clap::Parser;
use devs::{
    AtomicBehavior, AtomicModel, CoupledModel, Message, Outbox, SchedulerKind, Simulation,
    SimulationConfig, Strategy, Time, INFINITY, TOTAL,
};
use eyre::WrapErr;
use indicatif::{ProgressBar, ProgressStyle};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaChaRng;

/// Runs a DEVS simulation of a generator-relay-collector pipeline.
#[derive(Parser, Debug)]
#[command(version, author)]
struct Opt {
    /// Simulation configuration file in JSON format.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Simulated time at which the run stops; overrides the configuration.
    #[arg(long)]
    duration: Option<Time>,

    /// Synchronization strategy; overrides the configuration.
    #[arg(long)]
    strategy: Option<Strategy>,

    /// Scheduler used by the coordinators; overrides the configuration.
    #[arg(long)]
    scheduler: Option<SchedulerKind>,

    /// Number of worker threads; overrides the configuration.
    #[arg(long)]
    workers: Option<usize>,

    /// Number of generators in the pipeline.
    #[arg(long, default_value_t = 4)]
    generators: usize,

    /// Seed used to draw generator periods and relay delays.
    #[arg(long, default_value_t = 17)]
    seed: u64,

    /// Verbosity.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Store the logs this file.
    #[arg(long)]
    log_output: Option<PathBuf>,

    /// Do not log to the stderr.
    #[arg(long)]
    no_stderr: bool,

    /// Show a progress bar over simulated time.
    #[arg(long)]
    progress: bool,
}

impl Opt {
    /// Level of the kernel logs: `warn` by default, one step more detailed per `-v`.
    fn log_level(&self) -> log::LevelFilter {
        match self.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    }

    /// Loads the configuration file, if any, and applies command-line overrides.
    fn simulation_config(&self) -> eyre::Result<SimulationConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let file = File::open(path)
                    .wrap_err_with(|| format!("unable to open `{}`", path.display()))?;
                SimulationConfig::from_json(file).wrap_err("unable to load configuration")?
            }
            None => SimulationConfig::default(),
        };
        if let Some(duration) = self.duration {
            config.duration = duration;
        }
        if let Some(strategy) = self.strategy {
            config.strategy = strategy;
        }
        if let Some(scheduler) = self.scheduler {
            config.scheduler = scheduler;
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        config.validate()?;
        Ok(config)
    }
}

/// Emits a sequence number every `period`.
#[derive(Debug, Clone)]
struct Generator {
    period: Time,
    sent: u64,
}

impl AtomicBehavior<u64> for Generator {
    fn internal_transition(&mut self) {
        self.sent += 1;
    }
    fn output(&self, outbox: &mut Outbox<'_, u64>) -> devs::Result<()> {
        outbox.post("out", self.sent)
    }
    fn time_advance(&self) -> Time {
        self.period
    }
}

/// Forwards the number of values received, `delay` after the first of them arrived.
#[derive(Debug, Clone)]
struct Relay {
    delay: Time,
    sigma: Time,
    held: u64,
}

impl AtomicBehavior<u64> for Relay {
    fn external_transition(&mut self, elapsed: Time, messages: &[Message<u64>]) {
        self.sigma = if self.held == 0 {
            self.delay
        } else {
            self.sigma - elapsed
        };
        self.held += messages.len() as u64;
    }
    fn internal_transition(&mut self) {
        self.held = 0;
        self.sigma = INFINITY;
    }
    fn output(&self, outbox: &mut Outbox<'_, u64>) -> devs::Result<()> {
        outbox.post("out", self.held)
    }
    fn time_advance(&self) -> Time {
        self.sigma
    }
}

/// Counts everything that reaches the end of the pipeline.
#[derive(Debug, Clone, Default)]
struct Collector {
    messages: usize,
    values: u64,
}

impl AtomicBehavior<u64> for Collector {
    fn external_transition(&mut self, _elapsed: Time, messages: &[Message<u64>]) {
        self.messages += messages.len();
        self.values += messages.iter().map(Message::payload).sum::<u64>();
    }
    fn post_simulation(&mut self) {
        log::info!(
            "collector received {} messages carrying {} values",
            self.messages,
            self.values
        );
    }
}

/// Builds `generators` generator-relay pairs feeding one collector.
fn pipeline(generators: usize, seed: u64) -> eyre::Result<CoupledModel<u64>> {
    let mut rng = ChaChaRng::seed_from_u64(seed);
    let mut root = CoupledModel::new("pipeline");
    root.add_child(AtomicModel::new("collector", Collector::default()))?;
    for i in 0..generators {
        let generator = format!("generator_{}", i);
        let relay = format!("relay_{}", i);
        let period = rng.gen_range(1.0..5.0);
        let delay = rng.gen_range(0.1..1.0);
        log::debug!("{}: period {:.3}, delay {:.3}", generator, period, delay);
        root.add_child(
            AtomicModel::new(generator.as_str(), Generator { period, sent: 0 })
                .with_output_port("out"),
        )?;
        root.add_child(
            AtomicModel::new(
                relay.as_str(),
                Relay {
                    delay,
                    sigma: INFINITY,
                    held: 0,
                },
            )
            .with_input_port("in")
            .with_output_port("out"),
        )?;
        root.add_internal_coupling(&generator, &relay, Some("out"), Some("in"))?;
        root.add_internal_coupling(&relay, "collector", Some("out"), Some("in"))?;
    }
    Ok(root)
}

/// Installs a logger for the kernel and this binary; records of other crates are kept at `warn`.
fn set_up_logger(opt: &Opt) -> eyre::Result<()> {
    let level = opt.log_level();
    let mut dispatch = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{:7} {}: {}",
                format!("[{}]", record.level()),
                record.target(),
                message
            ));
        })
        .level(log::LevelFilter::Warn)
        .level_for("devs", level)
        .level_for("devs_sim", level);
    if let Some(path) = &opt.log_output {
        let file = File::create(path)
            .wrap_err_with(|| format!("unable to create log file `{}`", path.display()))?;
        dispatch = dispatch.chain(file);
    }
    if !opt.no_stderr {
        dispatch = dispatch.chain(std::io::stderr());
    }
    dispatch.apply()?;
    Ok(())
}

fn run(opt: &Opt) -> eyre::Result<()> {
    let config = opt.simulation_config()?;
    let model = pipeline(opt.generators, opt.seed)?;
    let mut simulation = Simulation::new(model, config)?;
    if opt.progress {
        let pb = ProgressBar::new(100)
            .with_style(ProgressStyle::default_bar().template("{msg} {wide_bar} {percent}%")?);
        while let Some(time) = simulation.step()? {
            pb.set_position(simulation.percentage() as u64);
            pb.set_message(format!("[t={:.2}]", time));
        }
        pb.finish();
    } else {
        simulation.simulate()?;
    }
    let stats = simulation.stats();
    let width = stats.keys().map(String::len).max().unwrap_or(0);
    for (path, counts) in stats.iter().filter(|(path, _)| path.as_str() != TOTAL) {
        println!("{:width$}  {}", path, counts, width = width);
    }
    if let Some(total) = stats.get(TOTAL) {
        println!("{:width$}  {}", TOTAL, total, width = width);
    }
    println!(
        "simulated {} time units in {}",
        simulation.time(),
        humantime::format_duration(simulation.elapsed())
    );
    Ok(())
}

fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    let opt = Opt::parse();
    set_up_logger(&opt)?;
    run(&opt)
}
