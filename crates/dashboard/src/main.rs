//! # Plug Dashboard (console)
//!
//! Front-end de terminal da camada de rede: escuta a telemetria da tomada,
//! envia comandos e roda as operações compostas de calibração.
//!
//! ## Uso
//! ```bash
//! plug_dashboard listen --seconds 60
//! plug_dashboard --device 192.168.4.1 send CAL_KNOWN 5.0
//! plug_dashboard diagnostic
//! plug_dashboard configure-auto-cal --enabled --sensitivity 0.8
//! ```

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use crossbeam_channel::{Receiver, TryRecvError};
use plug_core::changes::check_change;
use plug_core::command::Command;
use plug_core::config::AppConfig;
use plug_core::types::PowerReading;
use plug_dashboard::{CommandResult, Dashboard, DashboardEvent, OperationReport};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(
    name = "plug_dashboard",
    version,
    about = "Monitor de tomada inteligente – telemetria UDP e comandos do dispositivo"
)]
struct Cli {
    /// Caminho do config.toml (padrão: ao lado do executável)
    #[arg(long)]
    config: Option<PathBuf>,

    /// IP do dispositivo, sobrescreve `device_ip` do config
    #[arg(long)]
    device: Option<String>,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand, Debug)]
enum CliCommand {
    /// Escuta a telemetria e imprime leituras e status
    Listen {
        /// Encerra após N segundos (padrão: até ser interrompido)
        #[arg(long)]
        seconds: Option<u64>,
    },
    /// Envia um comando, ex: `send CAL_KNOWN 5.0`
    Send { name: String, arg: Option<String> },
    /// Coleta todos os diagnósticos do dispositivo
    Diagnostic,
    /// Restaura calibração e aprendizado aos valores de fábrica
    FactoryReset,
    /// Configura a auto-calibração
    ConfigureAutoCal {
        #[arg(long, conflicts_with = "disabled")]
        enabled: bool,
        #[arg(long)]
        disabled: bool,
        #[arg(long, default_value_t = 0.7)]
        sensitivity: f64,
        #[arg(long, default_value_t = 0.1)]
        learning_rate: f64,
    },
}

fn main() -> anyhow::Result<()> {
    // ── Logging ──
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();

    // ── Config ──
    let config_path = cli.config.clone().unwrap_or_else(AppConfig::default_path);
    let mut config = AppConfig::load(&config_path);

    if !config_path.exists() {
        if let Err(e) = config.save(&config_path) {
            warn!("Não foi possível salvar config padrão: {e}");
        }
    }
    if let Some(ip) = cli.device {
        config.dashboard.device_ip = ip;
    }
    for problem in config.validate() {
        warn!("Config: {problem}");
    }

    let dashboard = Dashboard::new(&config);

    match cli.command {
        CliCommand::Listen { seconds } => listen(dashboard, &config, seconds.map(Duration::from_secs)),
        CliCommand::Send { name, arg } => {
            let command = Command::from_cli(&name, arg.as_deref());
            let result = dashboard.device().send(&command);
            print_result(&command.encode(), &result);
            if result.is_success() {
                Ok(())
            } else {
                bail!("{} falhou: {result}", command.name)
            }
        }
        CliCommand::Diagnostic => finish(dashboard.device().comprehensive_diagnostic()),
        CliCommand::FactoryReset => finish(dashboard.device().factory_reset_calibration()),
        CliCommand::ConfigureAutoCal {
            enabled,
            disabled,
            sensitivity,
            learning_rate,
        } => finish(dashboard.device().configure_auto_calibration(
            enabled || !disabled,
            sensitivity,
            learning_rate,
        )),
    }
}

/// Loop de escuta: drena eventos, sinaliza saltos e consulta a auto-calibração.
fn listen(mut dashboard: Dashboard, config: &AppConfig, limit: Option<Duration>) -> anyhow::Result<()> {
    let threshold = config.dashboard.significant_change_watts;
    let poll_every = config.dashboard.auto_cal_poll();

    let mut previous: Option<PowerReading> = None;
    dashboard.on_reading(move |reading| {
        println!("⚡ {:>9.2} W", reading.value);
        if let Some(change) = previous.and_then(|p| check_change(&p, reading, threshold)) {
            println!(
                "   ↳ mudança de {:+.1} W (troca de carga ou auto-calibração)",
                change.delta()
            );
        }
        previous = Some(*reading);
    });
    dashboard.on_status(|status| println!("ℹ  {status}"));

    dashboard
        .start_listening()
        .context("Falha ao iniciar o listener")?;

    // ── Banner ──
    println!();
    println!("══════════════════════════════════════════════");
    println!("   ⚡ PLUG DASHBOARD – ESCUTANDO");
    println!("══════════════════════════════════════════════");
    println!("  Telemetria: 0.0.0.0:{}", dashboard.local_port().unwrap_or_default());
    println!("  Comandos:   porta {}", config.dashboard.device_port);
    println!("══════════════════════════════════════════════");
    println!();

    let started = Instant::now();
    let mut last_poll = Instant::now();
    let mut pending_poll: Option<Receiver<CommandResult>> = None;

    loop {
        for event in dashboard.pump_events() {
            match event {
                DashboardEvent::Connection(state) => info!("Conexão: {state}"),
                DashboardEvent::ListenerFatal(reason) => {
                    dashboard.stop_listening();
                    bail!("Listener encerrado: {reason}");
                }
                DashboardEvent::Reading(_) | DashboardEvent::Status(_) => {}
            }
        }

        // Consulta de auto-calibração fora desta thread; no máximo uma em voo
        match pending_poll.as_ref().map(|rx| rx.try_recv()) {
            Some(Ok(result)) => {
                pending_poll = None;
                if let Some(stats) = dashboard.apply_auto_calibration_status(&result) {
                    let summary: Vec<String> =
                        stats.iter().map(|(k, v)| format!("{k}={v}")).collect();
                    info!("Auto-calibração: {}", summary.join(", "));
                }
            }
            Some(Err(TryRecvError::Disconnected)) => pending_poll = None,
            Some(Err(TryRecvError::Empty)) | None => {}
        }
        if pending_poll.is_none()
            && last_poll.elapsed() >= poll_every
            && dashboard.device_target().is_some()
        {
            last_poll = Instant::now();
            pending_poll = Some(dashboard.poll_auto_calibration_async());
        }

        if limit.is_some_and(|l| started.elapsed() >= l) {
            break;
        }
        std::thread::sleep(Duration::from_millis(50));
    }

    dashboard.stop_listening();
    let (timestamps, _) = dashboard.get_snapshot();
    println!();
    println!("  {} leituras recebidas", timestamps.len());
    println!("  {} eventos de auto-calibração", dashboard.auto_cal_events().len());
    Ok(())
}

fn print_result(label: &str, result: &CommandResult) {
    let mark = if result.is_success() { "✔" } else { "✘" };
    println!("{mark} {label:<24} {result}");
}

fn finish(report: OperationReport) -> anyhow::Result<()> {
    for (step, result) in &report.steps {
        print_result(step, result);
    }
    let failed = report.failed_steps();
    if failed.is_empty() {
        Ok(())
    } else {
        bail!("Passos com falha: {}", failed.join(", "))
    }
}
