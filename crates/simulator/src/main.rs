//! # Plug Simulator
//!
//! Substituto em software da tomada medidora: envia frames de potência
//! via UDP para o dashboard e responde ao protocolo de comandos.
//!
//! ## Uso
//! ```bash
//! plug_simulator                       # usa config.toml
//! plug_simulator --dashboard 10.0.0.5  # destino inicial da telemetria
//! ```
//!
//! Um `DASHBOARD_READY` recebido na porta de comandos redireciona a
//! telemetria para o IP que anunciou.

mod device;

use anyhow::Context;
use clap::Parser;
use device::SimulatedDevice;
use parking_lot::Mutex;
use plug_core::config::AppConfig;
use plug_core::protocol::{DISCOVERY, MAX_DATAGRAM, encode_power_frame, encode_status_frame};
use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// A cada quantos frames de potência sai um frame de status.
const STATUS_EVERY: u64 = 15;

#[derive(Parser, Debug)]
#[command(name = "plug_simulator", version, about = "Simulador da tomada inteligente")]
struct Cli {
    /// Caminho do config.toml (padrão: ao lado do executável)
    #[arg(long)]
    config: Option<PathBuf>,

    /// IP inicial do dashboard
    #[arg(long)]
    dashboard: Option<IpAddr>,

    /// Intervalo entre frames (segundos)
    #[arg(long)]
    interval: Option<f64>,
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

    // ── Carregar config ──
    let config_path = cli.config.unwrap_or_else(AppConfig::default_path);
    let config = AppConfig::load(&config_path);
    let sim = &config.simulator;

    let dashboard_ip = match cli.dashboard {
        Some(ip) => ip,
        None => sim.dashboard_ip.parse().unwrap_or_else(|_| {
            warn!("dashboard_ip inválido: {:?}, usando 127.0.0.1", sim.dashboard_ip);
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        }),
    };
    let interval_secs = cli.interval.unwrap_or(sim.interval_secs);
    let interval = Duration::try_from_secs_f64(interval_secs)
        .with_context(|| format!("Intervalo inválido: {interval_secs}"))?;

    let target = Arc::new(Mutex::new(SocketAddr::new(dashboard_ip, sim.dashboard_port)));
    let device = Arc::new(Mutex::new(SimulatedDevice::new(sim.base_load_watts, sim.line_voltage)));

    // ── Sockets UDP ──
    let telemetry = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).context("Falha ao criar socket UDP")?;
    let commands = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, sim.command_port))
        .with_context(|| format!("Falha ao bind porta de comandos {}", sim.command_port))?;

    std::thread::Builder::new()
        .name("command-server".into())
        .spawn({
            let device = Arc::clone(&device);
            let target = Arc::clone(&target);
            let dashboard_port = sim.dashboard_port;
            move || serve_commands(commands, device, target, dashboard_port)
        })
        .context("Falha ao iniciar thread de comandos")?;

    // ── Banner ──
    println!();
    println!("══════════════════════════════════════════════");
    println!("   ⚡ PLUG SIMULATOR – ATIVO");
    println!("══════════════════════════════════════════════");
    println!("  Telemetria: {}", *target.lock());
    println!("  Comandos:   0.0.0.0:{}", sim.command_port);
    println!("  Intervalo:  {interval_secs:.1}s");
    println!("  Carga:      {:.0} W @ {:.0} V", sim.base_load_watts, sim.line_voltage);
    println!("══════════════════════════════════════════════");
    println!();

    // ── Loop principal ──
    let mut rng = rand::thread_rng();
    let mut frames: u64 = 0;
    loop {
        let cycle_start = Instant::now();

        let (frame, status) = {
            let mut dev = device.lock();
            let (watts, amps) = dev.sample(&mut rng);
            let status = (frames % STATUS_EVERY == 0).then(|| encode_status_frame(&dev.status_line()));
            (encode_power_frame(watts, amps), status)
        };
        let dest = *target.lock();

        for payload in std::iter::once(frame).chain(status) {
            match telemetry.send_to(payload.as_bytes(), dest) {
                Ok(_) => debug!("→ {dest}: {payload}"),
                Err(e) => error!("Erro ao enviar UDP: {e}"),
            }
        }
        frames += 1;

        // Dormir pelo tempo restante do intervalo
        let elapsed = cycle_start.elapsed();
        if elapsed < interval {
            std::thread::sleep(interval - elapsed);
        }
    }
}

/// Atende comandos até o processo terminar.
fn serve_commands(
    sock: UdpSocket,
    device: Arc<Mutex<SimulatedDevice>>,
    target: Arc<Mutex<SocketAddr>>,
    dashboard_port: u16,
) {
    let mut buf = [0u8; MAX_DATAGRAM];
    loop {
        let (size, from) = match sock.recv_from(&mut buf) {
            Ok(r) => r,
            Err(e) => {
                warn!("Erro ao receber comando: {e}");
                std::thread::sleep(Duration::from_millis(100));
                continue;
            }
        };
        let text = String::from_utf8_lossy(&buf[..size]);

        if text.trim().as_bytes() == DISCOVERY {
            let new_target = SocketAddr::new(from.ip(), dashboard_port);
            *target.lock() = new_target;
            info!("Dashboard anunciado em {} – telemetria redirecionada", from.ip());
            continue;
        }

        let reply = device.lock().handle_command(&text);
        if let Some(reply) = reply {
            info!("← {}: {} → {reply}", from.ip(), text.trim());
            if let Err(e) = sock.send_to(reply.as_bytes(), from) {
                warn!("Erro ao responder {from}: {e}");
            }
        }
    }
}
