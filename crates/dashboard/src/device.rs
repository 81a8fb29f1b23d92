//! Operações tipadas sobre o canal de comandos.
//!
//! Cada método é um único `send_command`. As composições (diagnóstico,
//! configuração de auto-calibração, reset de fábrica) são sequências de
//! chamadas independentes; o resultado de cada passo é guardado no
//! [`OperationReport`] e nenhum passo interrompe os seguintes.

use crate::channel::{CommandResult, send_command};
use plug_core::command::{self as cmd, Command, CommandArg};
use std::net::SocketAddr;
use std::time::Duration;
use tracing::{info, warn};

/// Sensibilidade restaurada pelo reset de fábrica.
pub const FACTORY_SENSITIVITY: f64 = 0.7;
/// Taxa de aprendizado restaurada pelo reset de fábrica.
pub const FACTORY_LEARNING_RATE: f64 = 0.1;

/// Erro devolvido quando não há endereço de destino.
pub const NO_DEVICE_ADDRESS: &str = "no device address";

/// Cliente de comandos para um dispositivo.
///
/// Comandos inválidos devolvem `ValidationError` antes de tudo; sem destino,
/// os válidos devolvem `TransportError` sem tocar a rede.
#[derive(Debug, Clone, Copy)]
pub struct DeviceClient {
    target: Option<SocketAddr>,
    timeout: Duration,
}

impl DeviceClient {
    pub fn new(target: Option<SocketAddr>, timeout: Duration) -> Self {
        Self { target, timeout }
    }

    pub fn target(&self) -> Option<SocketAddr> {
        self.target
    }

    /// Envia um comando qualquer. `RESTART` não espera resposta.
    pub fn send(&self, command: &Command) -> CommandResult {
        if let Err(e) = command.validate() {
            warn!("Comando rejeitado: {e}");
            return CommandResult::ValidationError(e);
        }
        let Some(target) = self.target else {
            return CommandResult::TransportError(NO_DEVICE_ADDRESS.into());
        };
        let expect_reply = command.name != cmd::RESTART;
        send_command(command, target, expect_reply, self.timeout)
    }

    fn simple(&self, name: &str) -> CommandResult {
        self.send(&Command::new(name))
    }

    fn with_number(&self, name: &str, value: f64) -> CommandResult {
        self.send(&Command::number(name, value))
    }

    // ── Relé e conectividade ──

    pub fn relay_toggle(&self) -> CommandResult {
        self.simple(cmd::RELAY_TOGGLE)
    }

    pub fn ping(&self) -> CommandResult {
        self.simple(cmd::PING)
    }

    // ── Auto-calibração ──

    pub fn enable_auto_calibration(&self) -> CommandResult {
        self.simple(cmd::AUTO_CAL_ON)
    }

    pub fn disable_auto_calibration(&self) -> CommandResult {
        self.simple(cmd::AUTO_CAL_OFF)
    }

    pub fn auto_calibration_status(&self) -> CommandResult {
        self.simple(cmd::AUTO_CAL_STATUS)
    }

    /// Sensibilidade em [0, 1].
    pub fn set_sensitivity(&self, value: f64) -> CommandResult {
        self.with_number(cmd::AUTO_CAL_SENSITIVITY, value)
    }

    /// Taxa de aprendizado em [0, 1].
    pub fn set_learning_rate(&self, value: f64) -> CommandResult {
        self.with_number(cmd::AUTO_CAL_LEARNING_RATE, value)
    }

    pub fn trigger_auto_calibration(&self) -> CommandResult {
        self.simple(cmd::TRIGGER_AUTO_CAL)
    }

    // ── Reconhecimento ──

    pub fn list_devices(&self) -> CommandResult {
        self.simple(cmd::LIST_DEVICES)
    }

    pub fn recognize_current(&self, amps: f64) -> CommandResult {
        self.with_number(cmd::RECOGNIZE_CURRENT, amps)
    }

    pub fn auto_recognize(&self) -> CommandResult {
        self.simple(cmd::AUTO_RECOGNIZE)
    }

    // ── Aprendizado ──

    pub fn learning_stats(&self) -> CommandResult {
        self.simple(cmd::LEARNING_STATS)
    }

    pub fn reset_learning(&self) -> CommandResult {
        self.simple(cmd::RESET_LEARNING)
    }

    pub fn apply_learning(&self) -> CommandResult {
        self.simple(cmd::APPLY_LEARNING)
    }

    // ── Calibração ──

    /// Calibra com uma carga de corrente conhecida, em (0, 100] A.
    pub fn calibrate_known(&self, amps: f64) -> CommandResult {
        self.with_number(cmd::CAL_KNOWN, amps)
    }

    pub fn zero_calibration(&self) -> CommandResult {
        self.simple(cmd::ZERO_CAL)
    }

    pub fn scale_calibration(&self, amps: f64) -> CommandResult {
        self.with_number(cmd::SCALE_CAL, amps)
    }

    pub fn manual_calibration(&self, bias: f64, scale: f64) -> CommandResult {
        self.send(&Command::with_arg(cmd::MANUAL_CAL, CommandArg::Pair(bias, scale)))
    }

    pub fn reset_calibration(&self) -> CommandResult {
        self.simple(cmd::RESET_CAL)
    }

    pub fn calibration_status(&self) -> CommandResult {
        self.simple(cmd::CAL_STATUS)
    }

    pub fn recalibrate_bias(&self) -> CommandResult {
        self.simple(cmd::RECALIBRATE_BIAS)
    }

    pub fn set_bias(&self, volts: f64) -> CommandResult {
        self.with_number(cmd::SET_BIAS, volts)
    }

    pub fn set_scale(&self, factor: f64) -> CommandResult {
        self.with_number(cmd::SET_SCALE, factor)
    }

    // ── Diagnóstico ──

    pub fn current_readings(&self) -> CommandResult {
        self.simple(cmd::GET_CURRENT)
    }

    pub fn debug_adc(&self) -> CommandResult {
        self.simple(cmd::DEBUG_ADC)
    }

    pub fn measurement_stats(&self) -> CommandResult {
        self.simple(cmd::MEASUREMENT_STATS)
    }

    pub fn reset_statistics(&self) -> CommandResult {
        self.simple(cmd::RESET_STATS)
    }

    pub fn buffer_analysis(&self) -> CommandResult {
        self.simple(cmd::BUFFER_ANALYSIS)
    }

    // ── Detecção automática ──

    pub fn auto_detect(&self) -> CommandResult {
        self.simple(cmd::AUTO_DETECT)
    }

    pub fn set_auto_detect(&self, enabled: bool) -> CommandResult {
        self.simple(if enabled { cmd::AUTO_DETECT_ON } else { cmd::AUTO_DETECT_OFF })
    }

    // ── Sistema ──

    pub fn system_status(&self) -> CommandResult {
        self.simple(cmd::SYSTEM_STATUS)
    }

    pub fn sct_info(&self) -> CommandResult {
        self.simple(cmd::SCT_INFO)
    }

    /// Reinicia o dispositivo. Não há resposta.
    pub fn restart(&self) -> CommandResult {
        self.simple(cmd::RESTART)
    }

    pub fn get_config(&self) -> CommandResult {
        self.simple(cmd::GET_CONFIG)
    }

    pub fn help(&self) -> CommandResult {
        self.simple(cmd::HELP)
    }

    // ──────────────────────────────────────────────
    // Composições
    // ──────────────────────────────────────────────

    /// Coleta todos os diagnósticos disponíveis.
    pub fn comprehensive_diagnostic(&self) -> OperationReport {
        info!("Executando diagnóstico completo");
        let mut report = OperationReport::default();
        report.record("system_status", self.system_status());
        report.record("calibration_status", self.calibration_status());
        report.record("auto_calibration_stats", self.auto_calibration_status());
        report.record("learning_stats", self.learning_stats());
        report.record("measurement_stats", self.measurement_stats());
        report.record("current_readings", self.current_readings());
        report.record("known_devices", self.list_devices());
        report.record("sct_info", self.sct_info());
        report.record("buffer_analysis", self.buffer_analysis());
        report
    }

    /// Liga ou desliga a auto-calibração e ajusta os parâmetros.
    pub fn configure_auto_calibration(
        &self,
        enabled: bool,
        sensitivity: f64,
        learning_rate: f64,
    ) -> OperationReport {
        let mut report = OperationReport::default();
        let toggle = if enabled {
            self.enable_auto_calibration()
        } else {
            self.disable_auto_calibration()
        };
        report.record("enable", toggle);
        report.record("sensitivity", self.set_sensitivity(sensitivity));
        report.record("learning_rate", self.set_learning_rate(learning_rate));
        report.record("final_status", self.auto_calibration_status());
        report
    }

    /// Restaura calibração, aprendizado e estatísticas aos valores de fábrica.
    pub fn factory_reset_calibration(&self) -> OperationReport {
        info!("Reset de fábrica da calibração");
        let mut report = OperationReport::default();
        report.record("reset_calibration", self.reset_calibration());
        report.record("reset_learning", self.reset_learning());
        report.record("reset_statistics", self.reset_statistics());
        report.record("enable_auto_cal", self.enable_auto_calibration());
        report.record("set_sensitivity", self.set_sensitivity(FACTORY_SENSITIVITY));
        report.record("set_learning_rate", self.set_learning_rate(FACTORY_LEARNING_RATE));
        report.record("final_status", self.system_status());
        report
    }
}

/// Resultado de cada passo de uma operação composta, em ordem.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OperationReport {
    pub steps: Vec<(&'static str, CommandResult)>,
}

impl OperationReport {
    fn record(&mut self, step: &'static str, result: CommandResult) {
        self.steps.push((step, result));
    }

    pub fn get(&self, step: &str) -> Option<&CommandResult> {
        self.steps.iter().find(|(s, _)| *s == step).map(|(_, r)| r)
    }

    pub fn all_succeeded(&self) -> bool {
        self.steps.iter().all(|(_, r)| r.is_success())
    }

    pub fn failed_steps(&self) -> Vec<&'static str> {
        self.steps
            .iter()
            .filter(|(_, r)| !r.is_success())
            .map(|(s, _)| *s)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, UdpSocket};
    use std::thread::JoinHandle;

    /// Dispositivo falso: responde `<TOKEN>:SUCCESS` e registra os comandos.
    fn echo_device(count: usize) -> (SocketAddr, JoinHandle<Vec<String>>) {
        let sock = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
        let addr = sock.local_addr().unwrap();
        let handle = std::thread::spawn(move || {
            sock.set_read_timeout(Some(Duration::from_secs(3))).unwrap();
            let mut seen = Vec::new();
            let mut buf = [0u8; 1024];
            for _ in 0..count {
                let Ok((n, from)) = sock.recv_from(&mut buf) else { break };
                let text = String::from_utf8_lossy(&buf[..n]).to_string();
                let token = text.split(':').next().unwrap_or_default().to_string();
                sock.send_to(format!("{token}:SUCCESS").as_bytes(), from).unwrap();
                seen.push(text);
            }
            seen
        });
        (addr, handle)
    }

    #[test]
    fn without_target_nothing_is_sent() {
        let client = DeviceClient::new(None, Duration::from_millis(100));
        assert_eq!(
            client.ping(),
            CommandResult::TransportError(NO_DEVICE_ADDRESS.into())
        );
    }

    #[test]
    fn validation_comes_before_target_check() {
        let client = DeviceClient::new(None, Duration::from_millis(100));
        for bad in [-0.1, 1.1] {
            assert!(matches!(
                client.set_sensitivity(bad),
                CommandResult::ValidationError(_)
            ));
        }
        assert!(matches!(
            client.send(&Command::new("not a token")),
            CommandResult::ValidationError(_)
        ));
    }

    #[test]
    fn factory_reset_runs_every_step_in_order() {
        let (addr, device) = echo_device(7);
        let client = DeviceClient::new(Some(addr), Duration::from_secs(2));
        let report = client.factory_reset_calibration();

        assert_eq!(report.steps.len(), 7);
        assert!(report.all_succeeded(), "falhas: {:?}", report.failed_steps());
        assert_eq!(
            device.join().unwrap(),
            vec![
                "RESET_CAL",
                "RESET_LEARNING",
                "RESET_STATS",
                "AUTO_CAL_ON",
                "AUTO_CAL_SENSITIVITY:0.7",
                "AUTO_CAL_LEARNING_RATE:0.1",
                "SYSTEM_STATUS",
            ]
        );
    }

    #[test]
    fn invalid_step_does_not_stop_composition() {
        // Sensibilidade inválida não vai para o fio: o dispositivo vê 3 comandos
        let (addr, device) = echo_device(3);
        let client = DeviceClient::new(Some(addr), Duration::from_secs(2));
        let report = client.configure_auto_calibration(false, 1.5, 0.2);

        assert!(matches!(
            report.get("sensitivity"),
            Some(CommandResult::ValidationError(_))
        ));
        assert_eq!(report.failed_steps(), vec!["sensitivity"]);
        assert!(report.get("final_status").is_some_and(|r| r.is_success()));
        assert_eq!(
            device.join().unwrap(),
            vec!["AUTO_CAL_OFF", "AUTO_CAL_LEARNING_RATE:0.2", "AUTO_CAL_STATUS"]
        );
    }

    #[test]
    fn restart_does_not_wait() {
        let silent = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
        let client = DeviceClient::new(silent.local_addr().ok(), Duration::from_secs(5));
        assert_eq!(client.restart(), CommandResult::Sent);
    }

    #[test]
    fn manual_calibration_wire_format() {
        let (addr, device) = echo_device(1);
        let client = DeviceClient::new(Some(addr), Duration::from_secs(2));
        assert!(client.manual_calibration(1.533, 200.0).is_success());
        assert_eq!(device.join().unwrap(), vec!["MANUAL_CAL:1.5330,200.00"]);
    }

    #[test]
    fn diagnostic_collects_nine_sections() {
        let (addr, device) = echo_device(9);
        let client = DeviceClient::new(Some(addr), Duration::from_secs(2));
        let report = client.comprehensive_diagnostic();
        assert_eq!(report.steps.len(), 9);
        assert!(report.get("buffer_analysis").is_some());
        device.join().unwrap();
    }
}
