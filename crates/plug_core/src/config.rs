//! Configuração unificada via TOML.
//!
//! Um único `config.toml` ao lado do executável cobre dashboard, histórico
//! e simulador. Campos ausentes assumem o valor padrão.

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Erros ao persistir a configuração.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Erro ao serializar configuração: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Erro ao gravar {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Configuração do dashboard (listener + canal de comandos).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    /// Porta UDP de telemetria
    pub listen_port: u16,
    /// Porta de comandos do dispositivo
    pub device_port: u16,
    /// IP fixo do dispositivo (vazio = usa o último remetente visto)
    pub device_ip: String,
    /// Timeout de recepção do listener (segundos)
    pub receive_timeout_secs: f64,
    /// Timeout de resposta de comandos (segundos)
    pub command_timeout_secs: f64,
    /// Espera máxima pelo fim da thread de escuta no `stop()` (segundos)
    pub stop_join_timeout_secs: f64,
    /// Erros consecutivos até o listener se encerrar
    pub max_consecutive_errors: u32,
    /// Pausa após um erro de recepção (segundos)
    pub error_backoff_secs: f64,
    /// Envia `DASHBOARD_READY` ao iniciar
    pub discovery_enabled: bool,
    /// IPs tentados quando o broadcast de descoberta falha
    pub discovery_candidates: Vec<String>,
    /// Intervalo de consulta das estatísticas de auto-calibração (segundos)
    pub auto_cal_poll_secs: f64,
    /// Delta entre leituras consecutivas sinalizado como mudança (W)
    pub significant_change_watts: f64,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            listen_port: 3333,
            device_port: 3334,
            device_ip: String::new(),
            receive_timeout_secs: 2.0,
            command_timeout_secs: 5.0,
            stop_join_timeout_secs: 2.0,
            max_consecutive_errors: 5,
            error_backoff_secs: 1.0,
            discovery_enabled: true,
            discovery_candidates: vec![
                "192.168.1.161".into(),
                "192.168.4.1".into(),
                "192.168.0.161".into(),
            ],
            auto_cal_poll_secs: 30.0,
            significant_change_watts: 50.0,
        }
    }
}

impl DashboardConfig {
    pub fn receive_timeout(&self) -> Duration {
        secs(self.receive_timeout_secs)
    }

    pub fn command_timeout(&self) -> Duration {
        secs(self.command_timeout_secs)
    }

    pub fn stop_join_timeout(&self) -> Duration {
        secs(self.stop_join_timeout_secs)
    }

    pub fn error_backoff(&self) -> Duration {
        secs(self.error_backoff_secs)
    }

    pub fn auto_cal_poll(&self) -> Duration {
        secs(self.auto_cal_poll_secs)
    }

    /// IP fixo do dispositivo, se configurado e válido.
    pub fn static_device_ip(&self) -> Option<IpAddr> {
        if self.device_ip.trim().is_empty() {
            return None;
        }
        match self.device_ip.trim().parse() {
            Ok(ip) => Some(ip),
            Err(_) => {
                warn!("device_ip inválido: {:?}", self.device_ip);
                None
            }
        }
    }

    /// Candidatos de descoberta válidos; entradas inválidas são ignoradas.
    pub fn discovery_ips(&self) -> Vec<IpAddr> {
        self.discovery_candidates
            .iter()
            .filter_map(|ip| ip.trim().parse().ok())
            .collect()
    }
}

/// Capacidade dos buffers de histórico.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub readings: usize,
    pub auto_cal_events: usize,
    pub device_recognitions: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            readings: 300,
            auto_cal_events: 50,
            device_recognitions: 30,
        }
    }
}

/// Configuração do simulador de tomada.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Destino inicial da telemetria
    pub dashboard_ip: String,
    pub dashboard_port: u16,
    /// Porta onde o simulador atende comandos
    pub command_port: u16,
    /// Intervalo entre frames de telemetria (segundos)
    pub interval_secs: f64,
    /// Carga média simulada (W)
    pub base_load_watts: f64,
    /// Tensão de linha usada para converter corrente em potência (V)
    pub line_voltage: f64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            dashboard_ip: Ipv4Addr::LOCALHOST.to_string(),
            dashboard_port: 3333,
            command_port: 3334,
            interval_secs: 2.0,
            base_load_watts: 120.0,
            line_voltage: 120.0,
        }
    }
}

/// Configuração raiz do aplicativo.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub dashboard: DashboardConfig,
    pub history: HistoryConfig,
    pub simulator: SimulatorConfig,
}

impl AppConfig {
    /// Carrega configuração de um arquivo TOML.
    pub fn load(path: &Path) -> Self {
        if path.exists() {
            match std::fs::read_to_string(path) {
                Ok(content) => match toml::from_str::<AppConfig>(&content) {
                    Ok(config) => {
                        info!("Configuração carregada de {}", path.display());
                        return config;
                    }
                    Err(e) => {
                        warn!("Erro ao parsear {}: {}", path.display(), e);
                    }
                },
                Err(e) => {
                    warn!("Erro ao ler {}: {}", path.display(), e);
                }
            }
        }

        info!("Usando configuração padrão");
        AppConfig::default()
    }

    /// Salva configuração em arquivo TOML.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        info!("Configuração salva em {}", path.display());
        Ok(())
    }

    /// Retorna o caminho padrão do config.toml.
    pub fn default_path() -> PathBuf {
        let exe_dir = std::env::current_exe()
            .map(|p| p.parent().unwrap_or(Path::new(".")).to_path_buf())
            .unwrap_or_else(|_| PathBuf::from("."));
        exe_dir.join("config.toml")
    }

    /// Valida a configuração e retorna lista de erros.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        let d = &self.dashboard;

        if d.listen_port == 0 {
            errors.push("Porta de telemetria não pode ser 0".into());
        }
        if d.device_port == 0 {
            errors.push("Porta de comandos não pode ser 0".into());
        }
        for (name, value) in [
            ("receive_timeout_secs", d.receive_timeout_secs),
            ("command_timeout_secs", d.command_timeout_secs),
            ("stop_join_timeout_secs", d.stop_join_timeout_secs),
        ] {
            if !(value > 0.0 && value <= 60.0) {
                errors.push(format!("{name} inválido: {value} (0–60 s)"));
            }
        }
        if d.max_consecutive_errors == 0 {
            errors.push("max_consecutive_errors deve ser ≥ 1".into());
        }
        if self.history.readings == 0 {
            errors.push("Histórico de leituras precisa de capacidade > 0".into());
        }
        if self.simulator.interval_secs < 0.1 || self.simulator.interval_secs > 60.0 {
            errors.push(format!(
                "Intervalo do simulador inválido: {} (0.1–60.0)",
                self.simulator.interval_secs
            ));
        }

        errors
    }
}

/// Converte segundos de config em `Duration`, saturando valores inválidos.
fn secs(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(Duration::ZERO)
}
