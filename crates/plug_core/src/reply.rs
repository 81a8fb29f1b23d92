//! Decodificação das respostas do dispositivo.
//!
//! ```text
//! RELAY_OK                                  → Ack
//! RESET_LEARNING:SUCCESS                    → Ack
//! DEVICE_LIST:Hair Dryer;Kettle             → Value
//! SYSTEM_STATUS:UPTIME=42s,AUTO_CAL=ON,...  → Stats
//! SET_BIAS:ERROR,INVALID_RANGE              → Error
//! HELLO                                     → Unrecognized
//! ```
//!
//! Valores de estatísticas passam por tentativas tipadas em ordem fixa:
//! inteiro, float, booleano e por fim texto.

use crate::types::{StatValue, Stats};

const ACK_SUFFIX: &str = "_OK";
const SUCCESS: &str = "SUCCESS";
const ERROR: &str = "ERROR";

/// Estatísticas de auto-calibração dentro da resposta de `AUTO_CAL_STATUS`.
pub const AUTO_CAL_STATS_MARKER: &str = "AUTO_CAL_STATS:";
/// Resultado de reconhecimento de dispositivo.
pub const DEVICE_RECOGNIZED_MARKER: &str = "DEVICE_RECOGNIZED:";
/// Corpo de reconhecimento quando nenhum dispositivo casa.
pub const NO_DEVICE: &str = "NONE";

/// Resposta decodificada.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Ack { tag: String },
    Value { tag: String, value: String },
    Stats { tag: String, stats: Stats },
    Error { tag: String, detail: String },
    /// Sem `:` e sem sufixo `_OK`; não é uma resposta do protocolo
    Unrecognized { text: String },
}

impl Reply {
    pub fn tag(&self) -> &str {
        match self {
            Reply::Ack { tag }
            | Reply::Value { tag, .. }
            | Reply::Stats { tag, .. }
            | Reply::Error { tag, .. } => tag,
            Reply::Unrecognized { text } => text,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Reply::Error { .. })
    }

    /// Resposta reconhecida e sem erro.
    pub fn is_ok(&self) -> bool {
        matches!(
            self,
            Reply::Ack { .. } | Reply::Value { .. } | Reply::Stats { .. }
        )
    }
}

/// Decodifica o texto de uma resposta.
pub fn parse_reply(raw: &str) -> Reply {
    let text = raw.trim();

    let Some((tag, body)) = text.split_once(':') else {
        return match text.strip_suffix(ACK_SUFFIX) {
            Some(tag) if !tag.is_empty() => Reply::Ack { tag: tag.to_string() },
            _ => Reply::Unrecognized { text: text.to_string() },
        };
    };

    let tag = tag.trim().to_string();
    let body = body.trim();

    if tag == ERROR {
        return Reply::Error { tag, detail: body.to_string() };
    }
    if let Some(detail) = body.strip_prefix(ERROR) {
        let detail = detail.trim_start_matches([',', ':']).to_string();
        return Reply::Error { tag, detail };
    }
    if body.is_empty() || body == SUCCESS {
        return Reply::Ack { tag };
    }
    if body.contains('=') {
        return Reply::Stats { tag, stats: parse_stats(body) };
    }
    Reply::Value { tag, value: body.to_string() }
}

/// Decodifica uma lista `k1=v1,k2=v2,...`.
///
/// Tokens sem `=` (ex: `SUCCESS`) são ignorados.
pub fn parse_stats(body: &str) -> Stats {
    body.split(',')
        .filter_map(|pair| pair.split_once('='))
        .map(|(key, value)| (key.trim().to_string(), parse_stat_value(value.trim())))
        .collect()
}

/// Estatísticas que seguem `marker` em qualquer posição da resposta.
///
/// O firmware aninha `AUTO_CAL_STATS:` dentro de `AUTO_CAL_STATUS:`.
pub fn stats_after(reply: &str, marker: &str) -> Option<Stats> {
    reply
        .find(marker)
        .map(|idx| parse_stats(reply[idx + marker.len()..].trim()))
}

/// Tipagem de um valor: inteiro → float → booleano → texto.
pub fn parse_stat_value(value: &str) -> StatValue {
    if !value.is_empty() && value.chars().all(|c| c.is_ascii_digit()) {
        if let Ok(v) = value.parse::<i64>() {
            return StatValue::Int(v);
        }
    }
    if is_decimal(value) {
        if let Ok(v) = value.parse::<f64>() {
            return StatValue::Float(v);
        }
    }
    match value.to_ascii_uppercase().as_str() {
        "YES" | "ON" | "TRUE" => StatValue::Bool(true),
        "NO" | "OFF" | "FALSE" => StatValue::Bool(false),
        _ => StatValue::Text(value.to_string()),
    }
}

fn is_decimal(value: &str) -> bool {
    let digits = value.chars().filter(|c| c.is_ascii_digit()).count();
    let dots = value.chars().filter(|&c| c == '.').count();
    digits > 0 && dots == 1 && digits + dots == value.len()
}
