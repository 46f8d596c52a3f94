use clap::{Parser, Subcommand, ValueEnum};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;

use pulse_sdk::{StreamClient, StreamOptions, TELEMETRY_PATH, TRACES_PATH};

#[derive(Parser)]
#[command(name = "pulse-cli")]
#[command(about = "Query and follow a portfolio-pulse service", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:3001")]
    url: String,

    /// Admin bearer token, needed by `resolve`.
    #[arg(short, long)]
    key: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Request totals over the last 24 hours
    Stats,
    /// Busiest endpoints
    Endpoints {
        #[arg(short, long, default_value_t = 10)]
        limit: u32,
    },
    /// Per-hour latency and error rate
    Hourly {
        #[arg(long, default_value_t = 24)]
        hours: u32,
    },
    /// Unresolved alerts
    Alerts,
    /// Mark an alert resolved
    Resolve { id: i64 },
    /// Search stored traces
    Traces {
        #[arg(short, long)]
        method: Option<String>,
        #[arg(short, long)]
        path: Option<String>,
        #[arg(short, long)]
        status: Option<u16>,
        #[arg(long)]
        min_duration: Option<f64>,
        #[arg(short, long, default_value_t = 20)]
        limit: u32,
    },
    /// Follow a live stream until interrupted
    Tail {
        stream: TailTarget,
        /// Chaos flags for the telemetry stream, e.g. `cpu,memory`
        #[arg(long)]
        chaos: Option<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum TailTarget {
    Telemetry,
    Traces,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    match cli.command {
        Commands::Stats => {
            let res = client.get(format!("{base}/api/traces/stats")).send().await?;
            print_response(res).await?;
        }
        Commands::Endpoints { limit } => {
            let res = client
                .get(format!("{base}/api/traces/endpoints"))
                .query(&[("limit", limit)])
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Hourly { hours } => {
            let res = client
                .get(format!("{base}/api/traces/hourly"))
                .query(&[("hours", hours)])
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Alerts => {
            let res = client.get(format!("{base}/api/alerts")).send().await?;
            print_response(res).await?;
        }
        Commands::Resolve { id } => {
            let key = cli.key.ok_or("resolve requires --key")?;
            let mut headers = HeaderMap::new();
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {key}"))?,
            );
            let res = client
                .post(format!("{base}/api/alerts/{id}/resolve"))
                .headers(headers)
                .send()
                .await?;
            if res.status().is_success() {
                println!("Alert {id} resolved");
            } else {
                print_response(res).await?;
            }
        }
        Commands::Traces {
            method,
            path,
            status,
            min_duration,
            limit,
        } => {
            let mut query: Vec<(&str, String)> = vec![("limit", limit.to_string())];
            if let Some(method) = method {
                query.push(("method", method));
            }
            if let Some(path) = path {
                query.push(("path", path));
            }
            if let Some(status) = status {
                query.push(("statusCode", status.to_string()));
            }
            if let Some(min) = min_duration {
                query.push(("minDuration", min.to_string()));
            }
            let res = client
                .get(format!("{base}/api/traces"))
                .query(&query)
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Tail { stream, chaos } => tail(base, stream, chaos).await?,
    }

    Ok(())
}

async fn tail(
    base: &str,
    target: TailTarget,
    chaos: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let (path, options) = match target {
        TailTarget::Telemetry => (TELEMETRY_PATH, StreamOptions::telemetry()),
        TailTarget::Traces => (TRACES_PATH, StreamOptions::traces()),
    };
    let client: StreamClient<Value> = StreamClient::new(base, path, options)?;

    match chaos.filter(|_| matches!(target, TailTarget::Telemetry)) {
        Some(flags) => client.set_query(Some(&format!("chaos={flags}"))),
        None => client.connect(),
    }

    let mut states = client.state_changes();
    let mut updates = client.updates();
    let mut printed = 0u64;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = states.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = *states.borrow_and_update();
                eprintln!("[{state:?}]");
            }
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let received = *updates.borrow_and_update();
                let items = client.items();
                // Anything older than the window was evicted before we looked.
                let fresh = (received - printed).min(items.len() as u64) as usize;
                for item in &items[items.len() - fresh..] {
                    println!("{item}");
                }
                printed = received;
            }
        }
    }

    client.disconnect();
    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: service returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
