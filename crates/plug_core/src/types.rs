//! Definição de tipos do protocolo da tomada inteligente.
//!
//! Leituras de potência, estado de conexão, eventos de auto-calibração e
//! reconhecimento de dispositivos. Todos os tipos são valores simples
//! (`Clone`) para que o [`HistoryStore`](crate::history::HistoryStore)
//! devolva cópias e nunca referências vivas.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::net::SocketAddr;
use std::time::{SystemTime, UNIX_EPOCH};

/// Segundos desde a época Unix, com fração.
pub fn now_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

// ──────────────────────────────────────────────
// Leituras
// ──────────────────────────────────────────────

/// Leitura de potência recebida por telemetria.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct PowerReading {
    /// Instante de chegada do datagrama (segundos Unix)
    pub timestamp: f64,
    /// Potência (W), sempre ≥ 0
    pub value: f64,
}

impl PowerReading {
    /// Cria uma leitura; valores negativos ou não finitos viram 0.0.
    pub fn new(timestamp: f64, value: f64) -> Self {
        let value = if value.is_finite() && value > 0.0 { value } else { 0.0 };
        Self { timestamp, value }
    }
}

// ──────────────────────────────────────────────
// Conexão
// ──────────────────────────────────────────────

/// Estado de conexão com o dispositivo.
///
/// O último endereço de origem visto vence (last-writer-wins).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Listening,
    Connected(SocketAddr),
}

impl ConnectionState {
    /// Endereço do dispositivo conectado, se houver.
    pub fn address(&self) -> Option<SocketAddr> {
        match self {
            ConnectionState::Connected(addr) => Some(*addr),
            _ => None,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "desconectado"),
            ConnectionState::Listening => write!(f, "escutando"),
            ConnectionState::Connected(addr) => write!(f, "conectado a {}", addr.ip()),
        }
    }
}

// ──────────────────────────────────────────────
// Estatísticas tipadas
// ──────────────────────────────────────────────

/// Valor escalar tipado de uma estatística `chave=valor`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum StatValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
}

impl StatValue {
    /// Valor numérico (inteiro ou float).
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            StatValue::Int(v) => Some(*v as f64),
            StatValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            StatValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            StatValue::Bool(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for StatValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatValue::Int(v) => write!(f, "{v}"),
            StatValue::Float(v) => write!(f, "{v}"),
            StatValue::Bool(v) => write!(f, "{}", if *v { "YES" } else { "NO" }),
            StatValue::Text(v) => write!(f, "{v}"),
        }
    }
}

/// Mapa de estatísticas ordenado por chave.
pub type Stats = BTreeMap<String, StatValue>;

// ──────────────────────────────────────────────
// Auto-calibração
// ──────────────────────────────────────────────

/// Tipo de evento de calibração registrado pelo dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AutoCalEventKind {
    /// Contador `COUNT` do dispositivo aumentou entre duas consultas
    AutoCalibrationPerformed,
    ManualCalibration,
    AutoCalEnabled,
    AutoCalDisabled,
    LearningReset,
    LearnedCalibrationApplied,
    CheckTriggered,
    ZeroCalibration,
    BiasRecalibrated,
    CalibrationReset,
    StatisticsReset,
}

impl fmt::Display for AutoCalEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            AutoCalEventKind::AutoCalibrationPerformed => "Auto-calibração realizada",
            AutoCalEventKind::ManualCalibration => "Calibração manual",
            AutoCalEventKind::AutoCalEnabled => "Auto-calibração ativada",
            AutoCalEventKind::AutoCalDisabled => "Auto-calibração desativada",
            AutoCalEventKind::LearningReset => "Dados de aprendizado zerados",
            AutoCalEventKind::LearnedCalibrationApplied => "Calibração aprendida aplicada",
            AutoCalEventKind::CheckTriggered => "Verificação de auto-calibração disparada",
            AutoCalEventKind::ZeroCalibration => "Calibração de zero",
            AutoCalEventKind::BiasRecalibrated => "Bias recalibrado",
            AutoCalEventKind::CalibrationReset => "Calibração restaurada ao padrão",
            AutoCalEventKind::StatisticsReset => "Estatísticas zeradas",
        };
        f.write_str(label)
    }
}

/// Evento de auto-calibração com as estatísticas do momento.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutoCalEvent {
    pub timestamp: f64,
    pub kind: AutoCalEventKind,
    pub stats: Stats,
}

impl AutoCalEvent {
    pub fn now(kind: AutoCalEventKind, stats: Stats) -> Self {
        Self {
            timestamp: now_secs(),
            kind,
            stats,
        }
    }
}

// ──────────────────────────────────────────────
// Reconhecimento de dispositivos
// ──────────────────────────────────────────────

/// Dispositivo reconhecido pelo firmware a partir da corrente medida.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceRecognition {
    pub timestamp: f64,
    /// Corrente consultada (A)
    pub current_amps: f64,
    /// Corpo da resposta `DEVICE_RECOGNIZED:` (ex: `NAME=Hair Dryer,TYPICAL=5.00A`)
    pub device_info: String,
}
