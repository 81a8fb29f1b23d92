//! Estado simulado da tomada e respostas no formato do firmware.

use plug_core::command::{self as cmd, BIAS_RANGE, MAX_CAL_CURRENT, SCALE_RANGE, UNIT_RANGE};
use plug_core::protocol::DISCOVERY;
use rand::Rng;
use std::time::Instant;

/// Bias padrão do ADC (V).
pub const DEFAULT_BIAS: f64 = 1.65;
/// Escala padrão do SCT-013 (A/V).
pub const DEFAULT_SCALE: f64 = 100.0;
/// Ruído relativo da carga simulada.
const LOAD_NOISE: f64 = 0.05;
const MAX_LEARNING_POINTS: u32 = 20;

/// Dispositivo conhecido: nome, corrente típica e faixa (A).
struct KnownDevice {
    name: &'static str,
    typical: f64,
    min: f64,
    max: f64,
}

const KNOWN_DEVICES: &[KnownDevice] = &[
    KnownDevice { name: "Phone Charger", typical: 0.1, min: 0.05, max: 0.2 },
    KnownDevice { name: "Laptop", typical: 0.5, min: 0.3, max: 0.8 },
    KnownDevice { name: "Desk Lamp", typical: 0.6, min: 0.4, max: 0.9 },
    KnownDevice { name: "Hair Dryer", typical: 5.0, min: 4.0, max: 6.0 },
    KnownDevice { name: "Kettle", typical: 8.5, min: 7.5, max: 10.0 },
];

/// Estado interno da tomada simulada.
#[derive(Debug)]
pub struct SimulatedDevice {
    pub relay_on: bool,
    pub auto_cal: bool,
    pub auto_detect: bool,
    pub sensitivity: f64,
    pub learning_rate: f64,
    pub bias: f64,
    pub scale: f64,
    pub cal_count: u64,
    pub auto_cal_count: u64,
    pub learning_points: u32,
    pub recognitions_ok: u64,
    pub recognitions_failed: u64,
    base_load_watts: f64,
    line_voltage: f64,
    last_amps: f64,
    started: Instant,
}

impl SimulatedDevice {
    pub fn new(base_load_watts: f64, line_voltage: f64) -> Self {
        Self {
            relay_on: true,
            auto_cal: true,
            auto_detect: true,
            sensitivity: 0.7,
            learning_rate: 0.1,
            bias: DEFAULT_BIAS,
            scale: DEFAULT_SCALE,
            cal_count: 0,
            auto_cal_count: 0,
            learning_points: 0,
            recognitions_ok: 0,
            recognitions_failed: 0,
            base_load_watts,
            line_voltage: if line_voltage > 0.0 { line_voltage } else { 120.0 },
            last_amps: 0.0,
            started: Instant::now(),
        }
    }

    /// Nova amostra `(watts, amps)`. Relé desligado mede zero.
    pub fn sample<R: Rng>(&mut self, rng: &mut R) -> (f64, f64) {
        let amps = if self.relay_on {
            let true_amps = self.base_load_watts / self.line_voltage;
            let noise = 1.0 + rng.gen_range(-LOAD_NOISE..=LOAD_NOISE);
            (true_amps * noise * self.scale / DEFAULT_SCALE).max(0.0)
        } else {
            0.0
        };
        self.last_amps = amps;

        // Auto-calibração ocasional, mais frequente com sensibilidade alta
        if self.auto_cal && self.relay_on && rng.gen_bool(0.02 * self.sensitivity.clamp(0.0, 1.0)) {
            self.auto_cal_count += 1;
            if self.learning_points < MAX_LEARNING_POINTS {
                self.learning_points += 1;
            }
        }

        (amps * self.line_voltage, amps)
    }

    fn uptime_secs(&self) -> u64 {
        self.started.elapsed().as_secs()
    }

    /// Resposta para um comando recebido.
    ///
    /// `None` para o anúncio de descoberta, que não tem resposta.
    pub fn handle_command(&mut self, raw: &str) -> Option<String> {
        let text = raw.trim();
        if text.as_bytes() == DISCOVERY {
            return None;
        }
        let (token, arg) = match text.split_once(':') {
            Some((t, a)) => (t, Some(a.trim())),
            None => (text, None),
        };

        let reply = match token {
            "RELAY_ON" | "RELAY_OFF" => {
                self.relay_on = token == "RELAY_ON";
                format!("{token}:SUCCESS")
            }
            cmd::RELAY_TOGGLE => {
                self.relay_on = !self.relay_on;
                format!("RELAY_TOGGLE:SUCCESS,STATE={}", on_off(self.relay_on))
            }
            cmd::PING => "PONG:ESP32_READY,AUTO_CAL_ENABLED".into(),

            cmd::AUTO_CAL_ON | cmd::AUTO_CAL_OFF => {
                self.auto_cal = token == cmd::AUTO_CAL_ON;
                format!("{token}:SUCCESS")
            }
            cmd::AUTO_CAL_STATUS => format!("AUTO_CAL_STATUS:{}", self.auto_cal_stats()),
            cmd::AUTO_CAL_SENSITIVITY => match number(arg).filter(|v| UNIT_RANGE.contains(v)) {
                Some(v) => {
                    self.sensitivity = v;
                    format!("AUTO_CAL_SENSITIVITY:SUCCESS,VALUE={v:.2}")
                }
                None => "AUTO_CAL_SENSITIVITY:ERROR,INVALID_RANGE".into(),
            },
            cmd::AUTO_CAL_LEARNING_RATE => match number(arg).filter(|v| UNIT_RANGE.contains(v)) {
                Some(v) => {
                    self.learning_rate = v;
                    format!("LEARNING_RATE:SUCCESS,VALUE={v:.2}")
                }
                None => "LEARNING_RATE:ERROR,INVALID_RANGE".into(),
            },
            cmd::TRIGGER_AUTO_CAL => {
                if self.auto_cal {
                    self.auto_cal_count += 1;
                    format!("TRIGGER_AUTO_CAL:SUCCESS,COUNT={}", self.auto_cal_count)
                } else {
                    "TRIGGER_AUTO_CAL:ERROR,AUTO_CAL_DISABLED".into()
                }
            }

            cmd::LIST_DEVICES => {
                let names: Vec<&str> = KNOWN_DEVICES.iter().map(|d| d.name).collect();
                format!("DEVICE_LIST:{}", names.join(";"))
            }
            cmd::RECOGNIZE_CURRENT => match number(arg).filter(|v| *v >= 0.0) {
                Some(amps) => self.recognize(amps),
                None => "RECOGNIZE_CURRENT:ERROR,INVALID_CURRENT".into(),
            },
            cmd::AUTO_RECOGNIZE => {
                let amps = self.last_amps;
                self.recognize(amps);
                format!("AUTO_RECOGNIZE:PROCESSED,CURRENT={amps:.3}A")
            }

            cmd::LEARNING_STATS => format!(
                "LEARNING_STATS:POINTS={},RATE={:.2},MAX_POINTS={MAX_LEARNING_POINTS}",
                self.learning_points, self.learning_rate
            ),
            cmd::RESET_LEARNING => {
                self.learning_points = 0;
                "RESET_LEARNING:SUCCESS".into()
            }
            cmd::APPLY_LEARNING => {
                if self.learning_points == 0 {
                    "APPLY_LEARNING:ERROR,NO_LEARNING_DATA".into()
                } else {
                    self.cal_count += 1;
                    "APPLY_LEARNING:SUCCESS".into()
                }
            }

            cmd::CAL_KNOWN | cmd::SCALE_CAL => {
                match number(arg).filter(|v| *v > 0.0 && *v <= MAX_CAL_CURRENT) {
                    Some(known) => {
                        let true_amps = self.base_load_watts / self.line_voltage;
                        if true_amps > 0.0 && self.relay_on {
                            self.scale = (DEFAULT_SCALE * known / true_amps)
                                .clamp(*SCALE_RANGE.start(), *SCALE_RANGE.end());
                        }
                        self.cal_count += 1;
                        format!("{token}:SUCCESS,SCALE={:.2}", self.scale)
                    }
                    None => format!("{token}:ERROR,INVALID_CURRENT"),
                }
            }
            cmd::ZERO_CAL | cmd::RECALIBRATE_BIAS => {
                self.bias = DEFAULT_BIAS;
                self.cal_count += 1;
                format!("ZERO_CAL:SUCCESS,BIAS={:.4}", self.bias)
            }
            cmd::MANUAL_CAL => {
                let pair = arg.and_then(|a| a.split_once(',')).and_then(|(b, s)| {
                    Some((b.trim().parse::<f64>().ok()?, s.trim().parse::<f64>().ok()?))
                });
                match pair {
                    Some((bias, scale)) if BIAS_RANGE.contains(&bias) && SCALE_RANGE.contains(&scale) => {
                        self.bias = bias;
                        self.scale = scale;
                        self.cal_count += 1;
                        format!("MANUAL_CAL:SUCCESS,BIAS={bias:.4},SCALE={scale:.2}")
                    }
                    _ => "MANUAL_CAL:ERROR,INVALID_FORMAT".into(),
                }
            }
            cmd::RESET_CAL => {
                self.bias = DEFAULT_BIAS;
                self.scale = DEFAULT_SCALE;
                format!("RESET_CAL:SUCCESS,BIAS={:.4},SCALE={:.2}", self.bias, self.scale)
            }
            cmd::CAL_STATUS => format!("CAL_STATUS:{}", self.cal_status()),
            cmd::SET_BIAS => match number(arg).filter(|v| BIAS_RANGE.contains(v)) {
                Some(v) => {
                    self.bias = v;
                    format!("SET_BIAS:SUCCESS,VALUE={v:.4}")
                }
                None => "SET_BIAS:ERROR,INVALID_RANGE".into(),
            },
            cmd::SET_SCALE => match number(arg).filter(|v| SCALE_RANGE.contains(v)) {
                Some(v) => {
                    self.scale = v;
                    format!("SET_SCALE:SUCCESS,VALUE={v:.2}")
                }
                None => "SET_SCALE:ERROR,INVALID_RANGE".into(),
            },

            cmd::GET_CURRENT => format!(
                "CURRENT:INSTANT={:.3}A,DETECTED={:.3}A,VRMS={:.6}V",
                self.last_amps,
                self.last_amps,
                self.last_amps / self.scale
            ),
            cmd::DEBUG_ADC => "DEBUG_ADC:COMPLETE,CHECK_SERIAL_OUTPUT".into(),
            cmd::MEASUREMENT_STATS => format!(
                "MEASUREMENT_STATS:LAST={:.3}A,CAL_COUNT={},UPTIME={}s",
                self.last_amps,
                self.cal_count,
                self.uptime_secs()
            ),
            cmd::RESET_STATS => {
                self.recognitions_ok = 0;
                self.recognitions_failed = 0;
                "RESET_STATS:SUCCESS".into()
            }
            cmd::BUFFER_ANALYSIS => format!(
                "BUFFER_ANALYSIS:SAMPLES=1000,MEAN={:.4}V,RMS={:.6}V",
                self.bias,
                self.last_amps / self.scale
            ),

            cmd::AUTO_DETECT => format!("AUTO_DETECT:SUCCESS,CURRENT={:.3}A", self.last_amps),
            cmd::AUTO_DETECT_ON | cmd::AUTO_DETECT_OFF => {
                self.auto_detect = token == cmd::AUTO_DETECT_ON;
                format!("{token}:SUCCESS")
            }

            cmd::SYSTEM_STATUS => format!(
                "SYSTEM_STATUS:UPTIME={}s,AUTO_CAL={},AUTO_DET={},CAL_COUNT={},UDP_RUNNING=YES",
                self.uptime_secs(),
                on_off(self.auto_cal),
                on_off(self.auto_detect),
                self.cal_count
            ),
            cmd::SCT_INFO => format!(
                "SCT_INFO:THEORETICAL={DEFAULT_SCALE:.1}A/V,CURRENT_SCALE={:.2}A/V,BIAS={:.4}V,BURDEN=22.0OHM",
                self.scale, self.bias
            ),
            cmd::RESTART => {
                self.started = Instant::now();
                "RESTART:ACKNOWLEDGED".into()
            }
            cmd::GET_CONFIG => format!(
                "CONFIG:AUTO_CAL={},AUTO_DET={},LEARNING=ON,DEVICE_RECOG=ON,SENSITIVITY={:.2}",
                on_off(self.auto_cal),
                on_off(self.auto_detect),
                self.sensitivity
            ),
            cmd::HELP => "HELP:Commands available - RELAY_ON/OFF/TOGGLE, AUTO_CAL_ON/OFF, AUTO_DETECT, \
                          CAL_KNOWN, ZERO_CAL, MANUAL_CAL, SYSTEM_STATUS, PING"
                .into(),

            _ => format!("ERROR:UNKNOWN_COMMAND:{text}"),
        };
        Some(reply)
    }

    fn auto_cal_stats(&self) -> String {
        format!(
            "AUTO_CAL_STATS:ENABLED={},COUNT={},UPTIME={}h,SUCCESS={},FAILED={},LEARNING_PTS={},SENSITIVITY={:.2}",
            if self.auto_cal { "YES" } else { "NO" },
            self.auto_cal_count,
            self.uptime_secs() / 3600,
            self.recognitions_ok,
            self.recognitions_failed,
            self.learning_points,
            self.sensitivity
        )
    }

    fn cal_status(&self) -> String {
        format!(
            "BIAS_V={:.4},SCALE={:.2},AUTO_CAL={},AUTO_DET={},LOAD={:.3},LEARNING_PTS={}",
            self.bias,
            self.scale,
            on_off(self.auto_cal),
            on_off(self.auto_detect),
            self.last_amps,
            self.learning_points
        )
    }

    fn recognize(&mut self, amps: f64) -> String {
        match KNOWN_DEVICES.iter().find(|d| (d.min..=d.max).contains(&amps)) {
            Some(d) => {
                self.recognitions_ok += 1;
                format!(
                    "DEVICE_RECOGNIZED:NAME={},TYPICAL={:.2}A,RANGE={:.2}-{:.2}A",
                    d.name, d.typical, d.min, d.max
                )
            }
            None => {
                self.recognitions_failed += 1;
                "DEVICE_RECOGNIZED:NONE".into()
            }
        }
    }

    /// Texto de status periódico.
    pub fn status_line(&self) -> String {
        format!(
            "relay {}, auto-cal {} (count {})",
            on_off(self.relay_on),
            on_off(self.auto_cal),
            self.auto_cal_count
        )
    }
}

fn number(arg: Option<&str>) -> Option<f64> {
    arg.and_then(|a| a.parse::<f64>().ok()).filter(|v| v.is_finite())
}

fn on_off(flag: bool) -> &'static str {
    if flag { "ON" } else { "OFF" }
}
