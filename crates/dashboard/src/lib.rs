//! # Plug Dashboard
//!
//! Camada de rede do monitor de tomada inteligente.
//!
//! ## Módulos
//! - [`listener`] – Thread de escuta da telemetria UDP
//! - [`channel`] – Comando/resposta síncrono com socket efêmero
//! - [`device`] – Operações tipadas e composições sobre o canal
//! - [`events`] – Fila limitada entre threads de fundo e o consumidor
//! - [`dashboard`] – Fachada para UI, CLI e exportação

pub mod listener;
pub mod channel;
pub mod device;
pub mod events;
pub mod dashboard;

pub use channel::{CommandResult, send_command, spawn_command};
pub use dashboard::Dashboard;
pub use device::{DeviceClient, OperationReport};
pub use events::DashboardEvent;
pub use listener::{ListenerError, TelemetryListener};
