use clap::{Parser, ValueEnum};
use ncquad::benchmark::integrands::{catalog, Kind, TestFunction};
use ncquad::settings::{AdaptiveSettings, FixedSettings};
use ncquad::{QuadratureError, Rule};
use serde::Serialize;
use std::error::Error;
use std::fs::File;
use std::io::Write;
use std::time::Instant;

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum Preset {
    All,
    Fast,
    Accurate,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
enum Mode {
    All,
    FixedSequential,
    FixedParallel,
    AdaptiveSequential,
    AdaptiveParallel,
}

impl Mode {
    const EACH: [Mode; 4] = [
        Mode::FixedSequential,
        Mode::FixedParallel,
        Mode::AdaptiveSequential,
        Mode::AdaptiveParallel,
    ];
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Parameter preset
    #[arg(short, long, value_enum, default_value_t = Preset::All)]
    preset: Preset,
    /// Integration mode to run
    #[arg(short, long, value_enum, default_value_t = Mode::All)]
    mode: Mode,
    /// Only run this rule
    #[arg(short, long)]
    rule: Option<Rule>,
    /// Number of worker threads in the parallel modes
    #[arg(short, long, default_value_t = 4)]
    threads: usize,
    /// Output file
    #[arg(short, long, default_value = "benchmark_results.json")]
    output: String,
}

#[derive(Debug, Serialize)]
struct BenchmarkResult {
    preset: &'static str,
    rule: &'static str,
    mode: Mode,
    integrand: &'static str,
    integral: String,
    kind: Kind,
    a: f64,
    b: f64,
    value: f64,
    abs_error: f64,
    time_s: f64,
    subdivisions: usize,
    degraded: bool,
}

/// The parameters of one preset.
struct Config {
    name: &'static str,
    fixed: FixedSettings,
    adaptive: AdaptiveSettings,
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    let mut configs = Vec::new();
    if matches!(args.preset, Preset::All | Preset::Fast) {
        configs.push(Config {
            name: "fast",
            fixed: FixedSettings { threads: args.threads, ..FixedSettings::fast() },
            adaptive: AdaptiveSettings { threads: args.threads, ..AdaptiveSettings::fast() },
        });
    }
    if matches!(args.preset, Preset::All | Preset::Accurate) {
        configs.push(Config {
            name: "accurate",
            fixed: FixedSettings { threads: args.threads, ..FixedSettings::accurate() },
            adaptive: AdaptiveSettings { threads: args.threads, ..AdaptiveSettings::accurate() },
        });
    }

    let modes: Vec<Mode> = match args.mode {
        Mode::All => Mode::EACH.to_vec(),
        mode => vec![mode],
    };
    let rules: Vec<Rule> = match args.rule {
        Some(rule) => vec![rule],
        None => Rule::ALL.to_vec(),
    };

    let mut results = Vec::new();
    for config in &configs {
        println!("running the {} preset", config.name);
        for &mode in &modes {
            println!();
            println!("{mode:?}");
            for &rule in &rules {
                for function in catalog() {
                    print!("Calculating {} with the {}... ", function.describe(), rule);
                    std::io::stdout().flush()?;
                    results.push(run_one(config, mode, rule, &function)?);
                    println!("done.");
                }
            }
        }
    }

    let json = serde_json::to_string_pretty(&results)?;
    let mut file = File::create(&args.output)?;
    file.write_all(json.as_bytes())?;
    println!("Benchmark results written to {}", args.output);
    Ok(())
}

fn run_one(
    config: &Config,
    mode: Mode,
    rule: Rule,
    function: &TestFunction,
) -> Result<BenchmarkResult, QuadratureError> {
    let (a, b) = (function.a, function.b);
    let start = Instant::now();
    let (value, subdivisions, degraded) = match mode {
        Mode::FixedSequential => {
            let settings = FixedSettings { rule, threads: 1, ..config.fixed };
            (settings.integrate(function, a, b)?, settings.subdivisions, false)
        }
        Mode::FixedParallel => {
            let settings = FixedSettings { rule, ..config.fixed };
            (settings.integrate(function, a, b)?, settings.subdivisions, false)
        }
        Mode::AdaptiveSequential | Mode::AdaptiveParallel => {
            let threads = if mode == Mode::AdaptiveSequential { 1 } else { config.adaptive.threads };
            let settings = AdaptiveSettings { rule, threads, ..config.adaptive };
            let result = settings.integrate(function, a, b)?;
            (result.value, result.subdivisions, result.degraded)
        }
        Mode::All => unreachable!("expanded before running"),
    };
    let time_s = start.elapsed().as_secs_f64();

    Ok(BenchmarkResult {
        preset: config.name,
        rule: rule.name(),
        mode,
        integrand: function.name,
        integral: function.describe(),
        kind: function.kind,
        a,
        b,
        value,
        abs_error: function.abs_error(value),
        time_s,
        subdivisions,
        degraded,
    })
}
