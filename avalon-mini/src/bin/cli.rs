//! Command-line interface for avalon-mini.
//!
//! Most commands talk to the daemon via its HTTP API. `query` talks to a
//! device directly, which is handy when setting one up.

use std::env;

use anyhow::{Context, Result, bail};

use avalon_mini::api_client::{self, types::DevicePatchRequest, types::DeviceState};
use avalon_mini::config::DeviceEndpoint;
use avalon_mini::protocol::{self, Client as DeviceClient};
use avalon_mini::types::{WorkLevel, WorkMode};

fn usage() -> ! {
    eprintln!("Usage: avalon-cli <command> [args]");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  status                 Show device status");
    eprintln!("  refresh                Poll the device now and show status");
    eprintln!("  entities               List entities");
    eprintln!("  on | off               Soft power on or off");
    eprintln!("  mode <m>               Set work mode (heating, mining, night)");
    eprintln!("  level <l>              Set work level (eco, super)");
    eprintln!("  display <on|off>       Turn the display on or off");
    eprintln!("  query <host[:port]> [--summary]");
    eprintln!("                         Query a device directly and dump its status,");
    eprintln!("                         or its cgminer summary with --summary");
    eprintln!();
    eprintln!("Environment:");
    eprintln!(
        "  AVALON_API_URL    API base URL (default: {})",
        api_client::DEFAULT_BASE_URL
    );
    std::process::exit(1);
}

#[tokio::main]
async fn main() -> Result<()> {
    avalon_mini::tracing::init_stdout();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        usage();
    }

    let command = &args[1];
    let arg = args.get(2).map(String::as_str);

    match (command.as_str(), arg) {
        ("status", None) => cmd_status().await?,
        ("refresh", None) => cmd_refresh().await?,
        ("entities", None) => cmd_entities().await?,
        ("on", None) => cmd_patch(power(true)).await?,
        ("off", None) => cmd_patch(power(false)).await?,
        ("mode", Some(value)) => {
            let mode: WorkMode = value
                .parse()
                .map_err(|_| anyhow::anyhow!("unknown mode {value:?}"))?;
            cmd_patch(DevicePatchRequest {
                mode: Some(mode),
                ..Default::default()
            })
            .await?
        }
        ("level", Some(value)) => {
            let level: WorkLevel = value
                .parse()
                .map_err(|_| anyhow::anyhow!("unknown level {value:?}"))?;
            cmd_patch(DevicePatchRequest {
                level: Some(level),
                ..Default::default()
            })
            .await?
        }
        ("display", Some(value)) => {
            let on = match value {
                "on" => true,
                "off" => false,
                other => bail!("display takes on or off, not {other:?}"),
            };
            cmd_patch(DevicePatchRequest {
                display: Some(on),
                ..Default::default()
            })
            .await?
        }
        ("query", Some(target)) => match args.get(3).map(String::as_str) {
            None => cmd_query(target).await?,
            Some("--summary") => cmd_query_summary(target).await?,
            Some(other) => bail!("unknown query option {other:?}"),
        },
        _ => {
            eprintln!("Unknown command or arguments: {}", args[1..].join(" "));
            eprintln!("Run without arguments to see usage.");
            std::process::exit(1);
        }
    }

    Ok(())
}

/// Build an API client, honoring AVALON_API_URL if set.
fn make_client() -> Result<api_client::Client> {
    match env::var("AVALON_API_URL") {
        Ok(url) => api_client::Client::with_base_url(url),
        Err(_) => api_client::Client::new(),
    }
}

fn power(on: bool) -> DevicePatchRequest {
    DevicePatchRequest {
        power: Some(on),
        ..Default::default()
    }
}

async fn cmd_status() -> Result<()> {
    let state = make_client()?.get_device().await?;
    print_state(&state);
    Ok(())
}

async fn cmd_refresh() -> Result<()> {
    let state = make_client()?.refresh_device().await?;
    print_state(&state);
    Ok(())
}

async fn cmd_entities() -> Result<()> {
    let entities = make_client()?.get_entities().await?;
    for entity in entities {
        let value = match &entity.value {
            Some(v) => serde_json::to_string(v)?,
            None => "-".to_string(),
        };
        let unit = entity.unit.as_deref().unwrap_or("");
        println!("{:<32} {:<24} {value} {unit}", entity.id, entity.name);
    }
    Ok(())
}

async fn cmd_patch(request: DevicePatchRequest) -> Result<()> {
    let state = make_client()?.patch_device(&request).await?;
    print_state(&state);
    Ok(())
}

/// Query a device directly, bypassing the daemon.
fn device_client(target: &str) -> Result<DeviceClient> {
    let endpoint = DeviceEndpoint::parse(target, target).context("invalid device address")?;
    Ok(DeviceClient::new(endpoint))
}

async fn cmd_query(target: &str) -> Result<()> {
    let client = device_client(target)?;

    let raw = client.estats().await?;
    println!("{raw}");
    println!();

    let parsed = protocol::parse(&raw)?;
    println!("{parsed:#?}");
    let missing = parsed.missing_fields();
    if !missing.is_empty() {
        println!("Missing: {}", missing.join(", "));
    }
    Ok(())
}

/// Dump the device's cgminer `summary`, bypassing the daemon.
async fn cmd_query_summary(target: &str) -> Result<()> {
    let raw = device_client(target)?.summary().await?;
    for section in raw.split('|').filter(|s| !s.is_empty()) {
        println!("{section}");
    }
    Ok(())
}

fn print_state(state: &DeviceState) {
    fn show<T: std::fmt::Display>(value: Option<T>) -> String {
        value.map_or_else(|| "-".to_string(), |v| v.to_string())
    }

    println!("Device:      {} ({})", state.name, state.address);
    println!(
        "Available:   {}",
        if state.available { "yes" } else { "no" }
    );
    if let Some(error) = &state.last_error {
        println!("Last error:  {error}");
    }
    println!(
        "Power:       {}",
        show(state.power_on.map(|on| if on { "on" } else { "off" }))
    );
    println!(
        "Standby:     {}",
        show(state.soft_off.map(|on| if on { "yes" } else { "no" }))
    );
    println!("Mode:        {}", show(state.mode));
    println!("Level:       {}", show(state.level));
    println!(
        "Display:     {}",
        show(state.display_on.map(|on| if on { "on" } else { "off" }))
    );
    println!("Hashrate:    {} TH/s", show(state.hashrate_ths));
    println!("Room temp:   {} °C", show(state.inlet_temp_c));
    println!("Target temp: {} °C", show(state.target_temp_c));
    println!("Power draw:  {} W", show(state.power_draw_w));
}
