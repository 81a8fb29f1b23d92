//! Heurística de "mudança significativa" entre leituras consecutivas.
//!
//! Um salto acima do limiar (50 W por padrão) pode ser troca de carga ou
//! ajuste de auto-calibração no dispositivo; as duas causas não se
//! distinguem pela telemetria. O resultado é só um sinal, nunca vira
//! [`AutoCalEvent`](crate::types::AutoCalEvent).

use crate::types::PowerReading;

/// Direção do salto.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeDirection {
    Rise,
    Drop,
}

/// Salto de potência entre duas leituras consecutivas.
#[derive(Debug, Clone, PartialEq)]
pub struct PowerChange {
    pub timestamp: f64,
    pub from_watts: f64,
    pub to_watts: f64,
}

impl PowerChange {
    pub fn delta(&self) -> f64 {
        self.to_watts - self.from_watts
    }

    pub fn direction(&self) -> ChangeDirection {
        if self.delta() >= 0.0 {
            ChangeDirection::Rise
        } else {
            ChangeDirection::Drop
        }
    }
}

/// Compara uma leitura nova com a anterior.
pub fn check_change(
    previous: &PowerReading,
    current: &PowerReading,
    threshold: f64,
) -> Option<PowerChange> {
    if (current.value - previous.value).abs() > threshold {
        Some(PowerChange {
            timestamp: current.timestamp,
            from_watts: previous.value,
            to_watts: current.value,
        })
    } else {
        None
    }
}

/// Todos os saltos acima do limiar numa série de leituras.
pub fn significant_changes(readings: &[PowerReading], threshold: f64) -> Vec<PowerChange> {
    readings
        .windows(2)
        .filter_map(|w| check_change(&w[0], &w[1], threshold))
        .collect()
}
