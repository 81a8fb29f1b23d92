//! Comandos do dispositivo: codificação e validação.
//!
//! Formato no fio: `<TOKEN>` ou `<TOKEN>:<arg>`, ex: `RELAY_TOGGLE`,
//! `CAL_KNOWN:5.0`, `MANUAL_CAL:1.5330,200.00`.
//!
//! Argumentos numéricos são validados **antes** de qualquer I/O; um
//! comando inválido nunca chega ao socket.

use std::fmt;
use std::ops::RangeInclusive;

// Tokens conhecidos
pub const RELAY_TOGGLE: &str = "RELAY_TOGGLE";
pub const PING: &str = "PING";
pub const AUTO_CAL_ON: &str = "AUTO_CAL_ON";
pub const AUTO_CAL_OFF: &str = "AUTO_CAL_OFF";
pub const AUTO_CAL_STATUS: &str = "AUTO_CAL_STATUS";
pub const AUTO_CAL_SENSITIVITY: &str = "AUTO_CAL_SENSITIVITY";
pub const AUTO_CAL_LEARNING_RATE: &str = "AUTO_CAL_LEARNING_RATE";
pub const TRIGGER_AUTO_CAL: &str = "TRIGGER_AUTO_CAL";
pub const LIST_DEVICES: &str = "LIST_DEVICES";
pub const RECOGNIZE_CURRENT: &str = "RECOGNIZE_CURRENT";
pub const AUTO_RECOGNIZE: &str = "AUTO_RECOGNIZE";
pub const LEARNING_STATS: &str = "LEARNING_STATS";
pub const RESET_LEARNING: &str = "RESET_LEARNING";
pub const APPLY_LEARNING: &str = "APPLY_LEARNING";
pub const CAL_KNOWN: &str = "CAL_KNOWN";
pub const ZERO_CAL: &str = "ZERO_CAL";
pub const SCALE_CAL: &str = "SCALE_CAL";
pub const MANUAL_CAL: &str = "MANUAL_CAL";
pub const RESET_CAL: &str = "RESET_CAL";
pub const CAL_STATUS: &str = "CAL_STATUS";
pub const RECALIBRATE_BIAS: &str = "RECALIBRATE_BIAS";
pub const GET_CURRENT: &str = "GET_CURRENT";
pub const DEBUG_ADC: &str = "DEBUG_ADC";
pub const MEASUREMENT_STATS: &str = "MEASUREMENT_STATS";
pub const RESET_STATS: &str = "RESET_STATS";
pub const BUFFER_ANALYSIS: &str = "BUFFER_ANALYSIS";
pub const AUTO_DETECT: &str = "AUTO_DETECT";
pub const AUTO_DETECT_ON: &str = "AUTO_DETECT_ON";
pub const AUTO_DETECT_OFF: &str = "AUTO_DETECT_OFF";
pub const SYSTEM_STATUS: &str = "SYSTEM_STATUS";
pub const SCT_INFO: &str = "SCT_INFO";
pub const RESTART: &str = "RESTART";
pub const GET_CONFIG: &str = "GET_CONFIG";
pub const HELP: &str = "HELP";
pub const SET_BIAS: &str = "SET_BIAS";
pub const SET_SCALE: &str = "SET_SCALE";

/// Faixa de sensibilidade e taxa de aprendizado.
pub const UNIT_RANGE: RangeInclusive<f64> = 0.0..=1.0;
/// Tensão de bias (V).
pub const BIAS_RANGE: RangeInclusive<f64> = 0.1..=3.0;
/// Fator de escala (A/V).
pub const SCALE_RANGE: RangeInclusive<f64> = 1.0..=1000.0;
/// Corrente de calibração (A), limite inferior exclusivo.
pub const MAX_CAL_CURRENT: f64 = 100.0;

/// Argumento de um comando.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandArg {
    Number(f64),
    /// `MANUAL_CAL:<bias>,<scale>`
    Pair(f64, f64),
    Text(String),
}

impl fmt::Display for CommandArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // Debug mantém o ".0" de inteiros (ex: CAL_KNOWN:5.0)
            CommandArg::Number(v) => write!(f, "{v:?}"),
            CommandArg::Pair(bias, scale) => write!(f, "{bias:.4},{scale:.2}"),
            CommandArg::Text(s) => f.write_str(s),
        }
    }
}

/// Erros de validação de comando.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("Token de comando inválido: {0:?}")]
    InvalidToken(String),

    #[error("{command}: argumento obrigatório ausente")]
    MissingArgument { command: String },

    #[error("{command}: argumento não numérico {value:?}")]
    NotANumber { command: String, value: String },

    #[error("{command}: {value} fora da faixa ({bounds})")]
    OutOfRange {
        command: String,
        value: f64,
        bounds: &'static str,
    },
}

/// Comando para o dispositivo.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub name: String,
    pub arg: Option<CommandArg>,
}

impl Command {
    /// Comando sem argumento.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arg: None,
        }
    }

    pub fn with_arg(name: impl Into<String>, arg: CommandArg) -> Self {
        Self {
            name: name.into(),
            arg: Some(arg),
        }
    }

    pub fn number(name: impl Into<String>, value: f64) -> Self {
        Self::with_arg(name, CommandArg::Number(value))
    }

    /// Interpreta o argumento textual da CLI (`5.0`, `1.533,200`, `texto`).
    pub fn from_cli(name: &str, arg: Option<&str>) -> Self {
        let name = name.trim().to_ascii_uppercase();
        let Some(raw) = arg.map(str::trim).filter(|a| !a.is_empty()) else {
            return Self::new(name);
        };
        if let Ok(v) = raw.parse::<f64>() {
            return Self::number(name, v);
        }
        if let Some((a, b)) = raw.split_once(',') {
            if let (Ok(a), Ok(b)) = (a.trim().parse(), b.trim().parse()) {
                return Self::with_arg(name, CommandArg::Pair(a, b));
            }
        }
        Self::with_arg(name, CommandArg::Text(raw.to_string()))
    }

    /// Payload no fio.
    pub fn encode(&self) -> String {
        match &self.arg {
            Some(arg) => format!("{}:{arg}", self.name),
            None => self.name.clone(),
        }
    }

    /// Valida token e faixas numéricas. Nenhum I/O.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let valid_token = !self.name.is_empty()
            && self
                .name
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_');
        if !valid_token {
            return Err(ValidationError::InvalidToken(self.name.clone()));
        }

        match self.name.as_str() {
            AUTO_CAL_SENSITIVITY | AUTO_CAL_LEARNING_RATE => {
                let v = self.number_arg()?;
                self.check_range(v, &UNIT_RANGE, "0.0–1.0")
            }
            CAL_KNOWN | SCALE_CAL => {
                let v = self.number_arg()?;
                if v > 0.0 && v <= MAX_CAL_CURRENT {
                    Ok(())
                } else {
                    Err(self.out_of_range(v, "0–100 A, exclusivo em 0"))
                }
            }
            SET_BIAS => {
                let v = self.number_arg()?;
                self.check_range(v, &BIAS_RANGE, "0.1–3.0 V")
            }
            SET_SCALE => {
                let v = self.number_arg()?;
                self.check_range(v, &SCALE_RANGE, "1.0–1000.0 A/V")
            }
            MANUAL_CAL => match &self.arg {
                Some(CommandArg::Pair(bias, scale)) => {
                    self.check_range(*bias, &BIAS_RANGE, "0.1–3.0 V")?;
                    self.check_range(*scale, &SCALE_RANGE, "1.0–1000.0 A/V")
                }
                Some(other) => Err(ValidationError::NotANumber {
                    command: self.name.clone(),
                    value: other.to_string(),
                }),
                None => Err(self.missing()),
            },
            RECOGNIZE_CURRENT => {
                let v = self.number_arg()?;
                if v >= 0.0 {
                    Ok(())
                } else {
                    Err(self.out_of_range(v, "≥ 0 A"))
                }
            }
            _ => match &self.arg {
                Some(CommandArg::Number(v)) if !v.is_finite() => Err(ValidationError::NotANumber {
                    command: self.name.clone(),
                    value: v.to_string(),
                }),
                _ => Ok(()),
            },
        }
    }

    fn number_arg(&self) -> Result<f64, ValidationError> {
        match &self.arg {
            Some(CommandArg::Number(v)) if v.is_finite() => Ok(*v),
            Some(other) => Err(ValidationError::NotANumber {
                command: self.name.clone(),
                value: other.to_string(),
            }),
            None => Err(self.missing()),
        }
    }

    fn check_range(
        &self,
        v: f64,
        range: &RangeInclusive<f64>,
        bounds: &'static str,
    ) -> Result<(), ValidationError> {
        if range.contains(&v) {
            Ok(())
        } else {
            Err(self.out_of_range(v, bounds))
        }
    }

    fn out_of_range(&self, value: f64, bounds: &'static str) -> ValidationError {
        ValidationError::OutOfRange {
            command: self.name.clone(),
            value,
            bounds,
        }
    }

    fn missing(&self) -> ValidationError {
        ValidationError::MissingArgument {
            command: self.name.clone(),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}
