//! Protocolo textual de telemetria.
//!
//! Cada datagrama UDP carrega um frame UTF-8. Formatos aceitos, na ordem
//! em que são tentados:
//!
//! ```text
//! power:123.45 W (1.234 A)   → potência antes do token "W" (piso 5.0 W)
//! 42.10                      → número puro, formato legado (piso 5.0 W)
//! SEQ=7,...,POWER=42.10,...  → valor após "POWER=" (piso 0.6 W)
//! status:<texto>             → mensagem de status, não entra no histórico
//! ```
//!
//! Valores abaixo do piso de ruído são considerados bias do sensor e viram
//! `0.0`. O parser nunca falha: fragmentos numéricos inválidos degradam
//! para [`ParsedMessage::Unrecognized`].

use regex::Regex;
use std::sync::LazyLock;

/// Payload enviado ao próprio socket para desbloquear o loop de escuta.
pub const SENTINEL: &[u8] = b"STOP";

/// Anúncio de presença enviado pelo dashboard na porta de comandos.
pub const DISCOVERY: &[u8] = b"DASHBOARD_READY";

/// Prefixo de frames de status.
pub const STATUS_PREFIX: &str = "status:";

/// Prefixo de frames de potência.
pub const POWER_PREFIX: &str = "power:";

/// Marcador de potência no frame estendido do firmware.
pub const POWER_MARKER: &str = "POWER=";

/// Tamanho do buffer de recepção (frames do firmware cabem com folga).
pub const MAX_DATAGRAM: usize = 1024;

/// Piso de ruído dos formatos `power:` e número puro (W).
pub const POWER_NOISE_FLOOR: f64 = 5.0;

/// Piso de ruído do formato `POWER=` e do fallback sem unidade (W).
pub const FINE_NOISE_FLOOR: f64 = 0.6;

static WATTS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([\d.]+)\s*W").expect("regex de watts válida"));

static NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\d.]+").expect("regex numérica válida"));

static MARKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"POWER=([\d.]+)").expect("regex POWER= válida"));

/// Resultado do parse de um frame de telemetria.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedMessage {
    /// Potência em watts, já com o piso de ruído aplicado
    Power(f64),
    /// Texto após `status:`
    Status(String),
    Unrecognized,
}

/// Erros internos do parser. Nunca escapam de [`parse_message`].
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ParseError {
    #[error("Número inválido: {0:?}")]
    InvalidNumber(String),

    #[error("Frame sem valor de potência: {0:?}")]
    MissingValue(String),
}

/// Interpreta um frame de telemetria.
pub fn parse_message(raw: &str) -> ParsedMessage {
    let message = raw.trim();

    match parse_power(message) {
        Ok(Some(watts)) => return ParsedMessage::Power(watts),
        Ok(None) => {}
        Err(e) => {
            tracing::debug!("Frame descartado: {e}");
            return ParsedMessage::Unrecognized;
        }
    }

    match message.strip_prefix(STATUS_PREFIX) {
        Some(rest) => ParsedMessage::Status(rest.trim().to_string()),
        None => ParsedMessage::Unrecognized,
    }
}

/// Extrai a potência de um frame.
///
/// `Ok(None)` quando nenhum formato de potência se aplica.
pub fn parse_power(message: &str) -> Result<Option<f64>, ParseError> {
    if let Some(rest) = message.strip_prefix(POWER_PREFIX) {
        if let Some(caps) = WATTS_RE.captures(rest) {
            let watts = parse_number(&caps[1])?;
            return Ok(Some(apply_floor(watts, POWER_NOISE_FLOOR)));
        }
        // Sem unidade: primeiro número do frame
        return match NUMBER_RE.find(rest) {
            Some(m) => Ok(Some(apply_floor(parse_number(m.as_str())?, FINE_NOISE_FLOOR))),
            None => Err(ParseError::MissingValue(message.to_string())),
        };
    }

    if is_bare_number(message) {
        let watts = parse_number(message)?;
        return Ok(Some(apply_floor(watts, POWER_NOISE_FLOOR)));
    }

    if message.contains(POWER_MARKER) {
        return match MARKER_RE.captures(message) {
            Some(caps) => Ok(Some(apply_floor(parse_number(&caps[1])?, FINE_NOISE_FLOOR))),
            None => Err(ParseError::MissingValue(message.to_string())),
        };
    }

    Ok(None)
}

/// Dígitos com no máximo um ponto decimal.
fn is_bare_number(s: &str) -> bool {
    let digits = s.chars().filter(|c| c.is_ascii_digit()).count();
    let dots = s.chars().filter(|&c| c == '.').count();
    digits > 0 && dots <= 1 && digits + dots == s.len()
}

fn parse_number(s: &str) -> Result<f64, ParseError> {
    s.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| ParseError::InvalidNumber(s.to_string()))
}

fn apply_floor(watts: f64, floor: f64) -> f64 {
    if watts < floor { 0.0 } else { watts }
}

/// Monta um frame `power:` no formato do firmware.
pub fn encode_power_frame(watts: f64, amps: f64) -> String {
    format!("{POWER_PREFIX}{watts:.2} W ({amps:.3} A)")
}

/// Monta um frame `status:`.
pub fn encode_status_frame(text: &str) -> String {
    format!("{STATUS_PREFIX}{text}")
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────
