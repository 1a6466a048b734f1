use std::{fs, io::Write, ops::ControlFlow, path::PathBuf, time::Duration};

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing_subscriber::EnvFilter;

use gardenlab::{
    engine,
    live::{render_live_frame, run_live, LiveOptions},
    report::{build_run_html_report, build_run_report, build_sweep_summary},
    scenario::ScenarioLoader,
    stats::monte_carlo,
    store::RunStore,
    sweep::sweep,
    web::{self, WebServerConfig},
};

#[derive(Debug, Parser)]
#[command(author, version, about = "Chaos garden policy lab")]
struct Cli {
    /// SQLite database holding saved runs
    #[arg(long, global = true, default_value = "gardenlab.db")]
    db: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run one scenario and save the result
    Run {
        #[arg(long)]
        scenario: PathBuf,
    },
    /// Grid-search policy levers and save every ranked result
    Sweep {
        #[arg(long)]
        scenario: PathBuf,
        #[arg(long, value_delimiter = ',', default_values_t = web::DEFAULT_WATERING_LEVELS)]
        watering: Vec<f64>,
        #[arg(long, value_delimiter = ',', default_values_t = web::DEFAULT_PESTICIDE_CAPS)]
        pesticide: Vec<f64>,
        #[arg(long, value_delimiter = ',', default_values_t = web::DEFAULT_CORRIDOR_LEVELS)]
        corridor: Vec<f64>,
    },
    /// Estimate a confidence interval over consecutive seeds
    MonteCarlo {
        #[arg(long)]
        scenario: PathBuf,
        #[arg(long, default_value_t = 20)]
        runs: u64,
        #[arg(long, default_value_t = 0.95)]
        confidence: f64,
    },
    /// Render a saved run as Markdown or HTML
    Report {
        #[arg(long)]
        run_id: u64,
        #[arg(long)]
        out: PathBuf,
        /// md or html; inferred from the output extension when omitted
        #[arg(long)]
        format: Option<String>,
    },
    /// Print the best saved runs
    Leaderboard {
        #[arg(default_value_t = 5)]
        limit: usize,
    },
    /// Replay a scenario day by day in the terminal
    Live {
        #[arg(long)]
        scenario: PathBuf,
        #[arg(long, default_value_t = 250)]
        interval_ms: u64,
        #[arg(long)]
        max_days: Option<u32>,
    },
    /// Serve the HTTP API
    Serve {
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        #[arg(long, default_value_t = 8787)]
        port: u16,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("gardenlab=info".parse()?))
        .init();

    let cli = Cli::parse();
    let loader = ScenarioLoader::new(".");

    match cli.command {
        Command::Run { scenario } => {
            let store = RunStore::open(&cli.db)?;
            let result = engine::run(&loader.load(&scenario)?);
            let run_id = store.save(&result, json!({ "mode": "single" }))?;
            println!(
                "Run completed: run_id={} avg_resilience={:.4}",
                run_id, result.average_resilience
            );
        }
        Command::Sweep {
            scenario,
            watering,
            pesticide,
            corridor,
        } => {
            let store = RunStore::open(&cli.db)?;
            let base = loader.load(&scenario)?;
            let results = sweep(&base, &watering, &pesticide, &corridor);
            for (index, result) in results.iter().enumerate() {
                let run_id = store.save(result, json!({ "mode": "sweep", "rank": index + 1 }))?;
                println!(
                    "Saved run_id={} scenario={} avg_resilience={:.4}",
                    run_id, result.scenario_name, result.average_resilience
                );
            }
            println!("Sweep completed: {} runs", results.len());
        }
        Command::MonteCarlo {
            scenario,
            runs,
            confidence,
        } => {
            let base = loader.load(&scenario)?;
            let seeds: Vec<u64> = (0..runs).map(|i| base.seed.wrapping_add(i)).collect();
            let summary = monte_carlo(&base, &seeds, confidence)?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Command::Report {
            run_id,
            out,
            format,
        } => {
            let store = RunStore::open(&cli.db)?;
            let stored = store.get(run_id)?;
            let format = format.unwrap_or_else(|| {
                match out.extension().and_then(|ext| ext.to_str()) {
                    Some("html") => "html".to_string(),
                    _ => "md".to_string(),
                }
            });
            let report = match format.to_lowercase().as_str() {
                "html" => build_run_html_report(&stored),
                "md" => build_run_report(&stored),
                other => bail!("unknown report format '{other}', expected md or html"),
            };
            fs::write(&out, report)?;
            println!("Report written to {}", out.display());
        }
        Command::Leaderboard { limit } => {
            let store = RunStore::open(&cli.db)?;
            println!("{}", build_sweep_summary(&store.top_runs(limit)?));
        }
        Command::Live {
            scenario,
            interval_ms,
            max_days,
        } => {
            let config = loader.load(&scenario)?;
            let total_days = max_days.unwrap_or(config.days);
            let options = LiveOptions {
                interval: Duration::from_millis(interval_ms),
                max_days,
            };
            let result = run_live(&config, options, |day, _| {
                let frame = render_live_frame(&config.name, total_days, interval_ms, day);
                let mut stdout = std::io::stdout().lock();
                let _ = writeln!(stdout, "\x1b[2J\x1b[H{frame}");
                let _ = stdout.flush();
                ControlFlow::Continue(())
            })
            .await;
            println!(
                "\nLive run completed: {} days avg_resilience={:.4}",
                result.days, result.average_resilience
            );
        }
        Command::Serve { host, port } => {
            let store = RunStore::open(&cli.db)?;
            println!("API server listening on http://{}:{}", host, port);
            web::run(WebServerConfig { store, host, port }).await?;
        }
    }

    Ok(())
}
