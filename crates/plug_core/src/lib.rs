//! # Plug Core
//!
//! Crate compartilhada do monitor de tomada inteligente: tipos de dados,
//! protocolo textual de telemetria, respostas e comandos do dispositivo,
//! histórico limitado e configuração TOML.
//!
//! ## Módulos
//! - [`types`] – Leituras, estado de conexão, eventos de auto-calibração
//! - [`protocol`] – Parser dos frames de telemetria (`power:`, `POWER=`, `status:`)
//! - [`reply`] – Decodificação de respostas e estatísticas `chave=valor`
//! - [`command`] – Codificação e validação de comandos
//! - [`history`] – Buffers FIFO limitados sob um único lock
//! - [`config`] – Configuração unificada via TOML
//! - [`changes`] – Heurística de mudança significativa de potência

pub mod types;
pub mod protocol;
pub mod reply;
pub mod command;
pub mod history;
pub mod config;
pub mod changes;

// Re-exports convenientes
pub use command::{Command, CommandArg, ValidationError};
pub use config::{AppConfig, DashboardConfig, HistoryConfig, SimulatorConfig};
pub use history::{HistoryBuffer, HistoryStore};
pub use protocol::{ParsedMessage, parse_message};
pub use reply::{Reply, parse_reply};
pub use types::{AutoCalEvent, AutoCalEventKind, ConnectionState, PowerReading, StatValue, Stats};
