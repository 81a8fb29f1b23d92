//! Fila de eventos entre as threads de rede e o consumidor.
//!
//! Threads de fundo publicam; o consumidor drena no próprio ritmo
//! (ver [`Dashboard::pump_events`](crate::dashboard::Dashboard::pump_events)).

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use plug_core::types::{ConnectionState, PowerReading};
use tracing::debug;

/// Capacidade da fila; com a fila cheia, eventos novos são descartados.
pub const EVENT_QUEUE_CAPACITY: usize = 256;

/// Evento publicado pela thread de escuta.
#[derive(Debug, Clone, PartialEq)]
pub enum DashboardEvent {
    Reading(PowerReading),
    Status(String),
    Connection(ConnectionState),
    /// Listener encerrado por falha estrutural; requer novo `start()`
    ListenerFatal(String),
}

/// Cria a fila limitada de eventos.
pub fn event_queue() -> (Sender<DashboardEvent>, Receiver<DashboardEvent>) {
    bounded(EVENT_QUEUE_CAPACITY)
}

/// Publica sem bloquear: se o consumidor está lento, descarta o evento.
pub(crate) fn publish(tx: &Sender<DashboardEvent>, event: DashboardEvent) {
    match tx.try_send(event) {
        Ok(()) => {}
        Err(TrySendError::Full(ev)) => debug!("Fila de eventos cheia, descartando {ev:?}"),
        Err(TrySendError::Disconnected(_)) => {}
    }
}
