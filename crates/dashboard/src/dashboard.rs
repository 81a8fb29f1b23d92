//! Fachada do dashboard para colaboradores (UI, CLI, exportação).
//!
//! Junta listener, histórico, fila de eventos e cliente de comandos. O
//! destino dos comandos é o último remetente de telemetria (porta de
//! comandos configurada); sem remetente, usa `device_ip` do config.

use crate::channel::{CommandResult, spawn_command};
use crate::device::{DeviceClient, NO_DEVICE_ADDRESS};
use crate::events::{DashboardEvent, event_queue};
use crate::listener::{ListenerError, TelemetryListener};
use crossbeam_channel::{Receiver, bounded};
use parking_lot::Mutex;
use plug_core::changes::{PowerChange, significant_changes};
use plug_core::command::{Command, CommandArg};
use plug_core::config::{AppConfig, DashboardConfig};
use plug_core::history::HistoryStore;
use plug_core::reply::{
    AUTO_CAL_STATS_MARKER, DEVICE_RECOGNIZED_MARKER, NO_DEVICE, Reply, stats_after,
};
use plug_core::types::{
    AutoCalEvent, AutoCalEventKind, ConnectionState, DeviceRecognition, PowerReading, StatValue,
    Stats, now_secs,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, info, warn};

type ReadingCallback = Box<dyn FnMut(&PowerReading) + Send>;
type StatusCallback = Box<dyn FnMut(&str) + Send>;

/// Estado do dashboard.
pub struct Dashboard {
    config: DashboardConfig,
    history: Arc<HistoryStore>,
    listener: TelemetryListener,
    events: Receiver<DashboardEvent>,

    reading_callbacks: Vec<ReadingCallback>,
    status_callbacks: Vec<StatusCallback>,

    /// Última consulta de `AUTO_CAL_STATUS`, para detectar aumento de `COUNT`
    last_auto_cal_stats: Mutex<Option<Stats>>,
}

impl Dashboard {
    pub fn new(config: &AppConfig) -> Self {
        let history = Arc::new(HistoryStore::new(&config.history));
        let (tx, rx) = event_queue();
        let listener = TelemetryListener::new(config.dashboard.clone(), Arc::clone(&history), tx);

        Self {
            config: config.dashboard.clone(),
            history,
            listener,
            events: rx,
            reading_callbacks: Vec::new(),
            status_callbacks: Vec::new(),
            last_auto_cal_stats: Mutex::new(None),
        }
    }

    // ── Listener ──

    pub fn start_listening(&self) -> Result<(), ListenerError> {
        self.listener.start()
    }

    pub fn stop_listening(&self) {
        self.listener.stop();
    }

    pub fn is_listening(&self) -> bool {
        self.listener.is_running()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.listener.connection_state()
    }

    pub fn local_port(&self) -> Option<u16> {
        self.listener.local_port()
    }

    // ── Eventos ──

    pub fn on_reading<F>(&mut self, callback: F)
    where
        F: FnMut(&PowerReading) + Send + 'static,
    {
        self.reading_callbacks.push(Box::new(callback));
    }

    pub fn on_status<F>(&mut self, callback: F)
    where
        F: FnMut(&str) + Send + 'static,
    {
        self.status_callbacks.push(Box::new(callback));
    }

    /// Drena a fila de eventos na thread do chamador.
    ///
    /// Callbacks de leitura e status são chamados aqui; todos os eventos
    /// drenados são devolvidos em ordem.
    pub fn pump_events(&mut self) -> Vec<DashboardEvent> {
        let drained: Vec<DashboardEvent> = self.events.try_iter().collect();
        for event in &drained {
            match event {
                DashboardEvent::Reading(reading) => {
                    for cb in &mut self.reading_callbacks {
                        cb(reading);
                    }
                }
                DashboardEvent::Status(status) => {
                    for cb in &mut self.status_callbacks {
                        cb(status);
                    }
                }
                DashboardEvent::Connection(_) | DashboardEvent::ListenerFatal(_) => {}
            }
        }
        drained
    }

    // ── Histórico ──

    pub fn history(&self) -> &Arc<HistoryStore> {
        &self.history
    }

    /// Cópia das leituras como `(timestamps, valores)`.
    pub fn get_snapshot(&self) -> (Vec<f64>, Vec<f64>) {
        self.history.snapshot()
    }

    pub fn clear_history(&self) -> usize {
        let count = self.history.clear();
        *self.last_auto_cal_stats.lock() = None;
        info!("{count} leituras e histórico de auto-calibração apagados");
        count
    }

    pub fn auto_cal_events(&self) -> Vec<AutoCalEvent> {
        self.history.auto_cal_events()
    }

    pub fn recognitions(&self) -> Vec<DeviceRecognition> {
        self.history.recognitions()
    }

    /// Saltos de potência acima do limiar configurado.
    ///
    /// Heurística: não distingue troca de carga de ajuste do dispositivo.
    pub fn significant_changes(&self) -> Vec<PowerChange> {
        significant_changes(&self.history.readings(), self.config.significant_change_watts)
    }

    // ── Comandos ──

    /// Endereço de comandos do dispositivo, se conhecido.
    pub fn device_target(&self) -> Option<SocketAddr> {
        let ip = self
            .connection_state()
            .address()
            .map(|addr| addr.ip())
            .or_else(|| self.config.static_device_ip())?;
        Some(SocketAddr::new(ip, self.config.device_port))
    }

    /// Cliente de comandos apontado para o destino atual.
    pub fn device(&self) -> DeviceClient {
        DeviceClient::new(self.device_target(), self.config.command_timeout())
    }

    /// Envia um comando pelo nome, bloqueando até a resposta ou o timeout.
    pub fn send_command(&self, name: &str, arg: Option<CommandArg>) -> CommandResult {
        let command = Command {
            name: name.to_string(),
            arg,
        };
        self.device().send(&command)
    }

    /// Envia um comando numa thread curta; o resultado chega pelo receiver.
    pub fn send_command_async(&self, command: Command) -> Receiver<CommandResult> {
        let immediate = |result: CommandResult| {
            let (tx, rx) = bounded(1);
            let _ = tx.send(result);
            rx
        };
        if let Err(e) = command.validate() {
            warn!("Comando rejeitado: {e}");
            return immediate(CommandResult::ValidationError(e));
        }
        let Some(target) = self.device_target() else {
            return immediate(CommandResult::TransportError(NO_DEVICE_ADDRESS.into()));
        };
        let expect_reply = command.name != plug_core::command::RESTART;
        spawn_command(command, target, expect_reply, self.config.command_timeout())
    }

    // ── Operações com registro de eventos ──

    /// Calibração com corrente conhecida.
    pub fn calibrate_known(&self, amps: f64) -> CommandResult {
        let result = self.device().calibrate_known(amps);
        self.record_on_success(
            &result,
            AutoCalEventKind::ManualCalibration,
            Stats::from([("CURRENT".to_string(), StatValue::Float(amps))]),
        );
        result
    }

    pub fn manual_calibration(&self, bias: f64, scale: f64) -> CommandResult {
        let result = self.device().manual_calibration(bias, scale);
        self.record_on_success(
            &result,
            AutoCalEventKind::ManualCalibration,
            Stats::from([
                ("BIAS".to_string(), StatValue::Float(bias)),
                ("SCALE".to_string(), StatValue::Float(scale)),
            ]),
        );
        result
    }

    pub fn set_auto_calibration(&self, enabled: bool) -> CommandResult {
        let device = self.device();
        let (result, kind) = if enabled {
            (device.enable_auto_calibration(), AutoCalEventKind::AutoCalEnabled)
        } else {
            (device.disable_auto_calibration(), AutoCalEventKind::AutoCalDisabled)
        };
        self.record_on_success(&result, kind, Stats::new());
        result
    }

    pub fn reset_learning(&self) -> CommandResult {
        let result = self.device().reset_learning();
        self.record_on_success(&result, AutoCalEventKind::LearningReset, Stats::new());
        result
    }

    pub fn apply_learning(&self) -> CommandResult {
        let result = self.device().apply_learning();
        self.record_on_success(
            &result,
            AutoCalEventKind::LearnedCalibrationApplied,
            Stats::new(),
        );
        result
    }

    pub fn trigger_auto_calibration(&self) -> CommandResult {
        let result = self.device().trigger_auto_calibration();
        self.record_on_success(&result, AutoCalEventKind::CheckTriggered, Stats::new());
        result
    }

    pub fn zero_calibration(&self) -> CommandResult {
        let result = self.device().zero_calibration();
        self.record_on_success(&result, AutoCalEventKind::ZeroCalibration, Stats::new());
        result
    }

    pub fn recalibrate_bias(&self) -> CommandResult {
        let result = self.device().recalibrate_bias();
        self.record_on_success(&result, AutoCalEventKind::BiasRecalibrated, Stats::new());
        result
    }

    pub fn reset_calibration(&self) -> CommandResult {
        let result = self.device().reset_calibration();
        self.record_on_success(&result, AutoCalEventKind::CalibrationReset, Stats::new());
        result
    }

    pub fn reset_statistics(&self) -> CommandResult {
        let result = self.device().reset_statistics();
        self.record_on_success(&result, AutoCalEventKind::StatisticsReset, Stats::new());
        result
    }

    /// Pede ao firmware que reconheça a carga pela corrente.
    ///
    /// Um reconhecimento só é registrado quando a resposta traz
    /// `DEVICE_RECOGNIZED:` com algo além de `NONE`.
    pub fn recognize_current_device(&self, amps: f64) -> CommandResult {
        let result = self.device().recognize_current(amps);
        if let Some(text) = result.reply_text() {
            if let Some(idx) = text.find(DEVICE_RECOGNIZED_MARKER) {
                let info = text[idx + DEVICE_RECOGNIZED_MARKER.len()..].trim();
                if !info.is_empty() && info != NO_DEVICE {
                    info!("Dispositivo reconhecido: {amps:.2} A → {info}");
                    self.history.push_recognition(DeviceRecognition {
                        timestamp: now_secs(),
                        current_amps: amps,
                        device_info: info.to_string(),
                    });
                }
            }
        }
        result
    }

    /// Consulta as estatísticas de auto-calibração, bloqueando até a resposta.
    ///
    /// Registra [`AutoCalEventKind::AutoCalibrationPerformed`] quando `COUNT`
    /// aumentou desde a consulta anterior. Devolve as estatísticas lidas.
    pub fn check_auto_calibration(&self) -> Option<Stats> {
        let result = self.device().auto_calibration_status();
        self.apply_auto_calibration_status(&result)
    }

    /// Dispara `AUTO_CAL_STATUS` numa thread de comando.
    ///
    /// Entregue o resultado a [`Dashboard::apply_auto_calibration_status`]
    /// quando chegar; o laço do chamador não espera pela rede.
    pub fn poll_auto_calibration_async(&self) -> Receiver<CommandResult> {
        self.send_command_async(Command::new(plug_core::command::AUTO_CAL_STATUS))
    }

    /// Processa a resposta de `AUTO_CAL_STATUS` (comparação de `COUNT`).
    pub fn apply_auto_calibration_status(&self, result: &CommandResult) -> Option<Stats> {
        let Some(text) = result.reply_text() else {
            debug!("Consulta de auto-calibração sem resposta: {result}");
            return None;
        };
        let stats = stats_after(text, AUTO_CAL_STATS_MARKER)?;

        let mut last = self.last_auto_cal_stats.lock();
        let previous = last.as_ref().and_then(|s| s.get("COUNT")).and_then(StatValue::as_i64);
        let current = stats.get("COUNT").and_then(StatValue::as_i64);
        if let (Some(prev), Some(cur)) = (previous, current) {
            if cur > prev {
                info!("Auto-calibração realizada pelo dispositivo (COUNT {prev} → {cur})");
                self.history.push_auto_cal_event(AutoCalEvent::now(
                    AutoCalEventKind::AutoCalibrationPerformed,
                    stats.clone(),
                ));
            }
        }
        *last = Some(stats.clone());
        Some(stats)
    }

    fn record_on_success(&self, result: &CommandResult, kind: AutoCalEventKind, mut stats: Stats) {
        if !result.is_success() {
            warn!("{kind}: falhou ({result})");
            return;
        }
        if let Some(Reply::Stats { stats: reply_stats, .. }) = result.reply() {
            stats.extend(reply_stats);
        }
        info!("{kind}");
        self.history.push_auto_cal_event(AutoCalEvent::now(kind, stats));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, UdpSocket};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread::JoinHandle;
    use std::time::{Duration, Instant};

    fn config_with_device(device: Option<SocketAddr>) -> AppConfig {
        let mut config = AppConfig::default();
        config.dashboard.listen_port = 0;
        config.dashboard.discovery_enabled = false;
        config.dashboard.receive_timeout_secs = 0.2;
        config.dashboard.command_timeout_secs = 1.0;
        if let Some(addr) = device {
            config.dashboard.device_ip = addr.ip().to_string();
            config.dashboard.device_port = addr.port();
        }
        config
    }

    /// Dispositivo que responde cada comando com a próxima resposta do roteiro.
    fn scripted_device(replies: Vec<&'static str>) -> (SocketAddr, JoinHandle<Vec<String>>) {
        let sock = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
        let addr = sock.local_addr().unwrap();
        let handle = std::thread::spawn(move || {
            sock.set_read_timeout(Some(Duration::from_secs(3))).unwrap();
            let mut seen = Vec::new();
            let mut buf = [0u8; 1024];
            for reply in replies {
                let Ok((n, from)) = sock.recv_from(&mut buf) else { break };
                seen.push(String::from_utf8_lossy(&buf[..n]).to_string());
                sock.send_to(reply.as_bytes(), from).unwrap();
            }
            seen
        });
        (addr, handle)
    }

    #[test]
    fn commands_without_target_fail_fast() {
        let dash = Dashboard::new(&config_with_device(None));
        assert_eq!(dash.device_target(), None);
        assert_eq!(
            dash.send_command("PING", None),
            CommandResult::TransportError(NO_DEVICE_ADDRESS.into())
        );
        let rx = dash.send_command_async(Command::new("PING"));
        assert!(matches!(
            rx.recv_timeout(Duration::from_secs(1)),
            Ok(CommandResult::TransportError(_))
        ));
    }

    #[test]
    fn invalid_command_without_target_is_a_validation_error() {
        let dash = Dashboard::new(&config_with_device(None));
        let rx = dash.send_command_async(Command::number("AUTO_CAL_SENSITIVITY", -0.1));
        assert!(matches!(
            rx.recv_timeout(Duration::from_secs(1)),
            Ok(CommandResult::ValidationError(_))
        ));
        assert!(matches!(
            dash.send_command("AUTO_CAL_SENSITIVITY", Some(CommandArg::Number(1.1))),
            CommandResult::ValidationError(_)
        ));
    }

    #[test]
    fn successful_calibration_is_logged() {
        let (addr, device) = scripted_device(vec!["CAL_KNOWN:SUCCESS,SCALE=101.50"]);
        let dash = Dashboard::new(&config_with_device(Some(addr)));

        assert!(dash.calibrate_known(5.0).is_success());
        let events = dash.auto_cal_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, AutoCalEventKind::ManualCalibration);
        assert_eq!(events[0].stats["CURRENT"], StatValue::Float(5.0));
        assert_eq!(events[0].stats["SCALE"], StatValue::Float(101.5));
        assert_eq!(device.join().unwrap(), vec!["CAL_KNOWN:5.0"]);
    }

    #[test]
    fn failed_operation_is_not_logged() {
        let (addr, device) = scripted_device(vec!["ZERO_CAL:ERROR,LOAD_PRESENT"]);
        let dash = Dashboard::new(&config_with_device(Some(addr)));
        assert!(!dash.zero_calibration().is_success());
        assert!(dash.auto_cal_events().is_empty());
        device.join().unwrap();
    }

    #[test]
    fn auto_cal_count_increase_records_event() {
        let (addr, device) = scripted_device(vec![
            "AUTO_CAL_STATUS:AUTO_CAL_STATS:ENABLED=YES,COUNT=3,SENSITIVITY=0.70",
            "AUTO_CAL_STATUS:AUTO_CAL_STATS:ENABLED=YES,COUNT=3,SENSITIVITY=0.70",
            "AUTO_CAL_STATUS:AUTO_CAL_STATS:ENABLED=YES,COUNT=4,SENSITIVITY=0.70",
        ]);
        let dash = Dashboard::new(&config_with_device(Some(addr)));

        // Primeira consulta só estabelece a referência
        assert!(dash.check_auto_calibration().is_some());
        assert!(dash.auto_cal_events().is_empty());
        dash.check_auto_calibration();
        assert!(dash.auto_cal_events().is_empty());
        let stats = dash.check_auto_calibration().unwrap();
        assert_eq!(stats["COUNT"], StatValue::Int(4));

        let events = dash.auto_cal_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, AutoCalEventKind::AutoCalibrationPerformed);
        device.join().unwrap();
    }

    #[test]
    fn async_auto_cal_poll_records_count_increase() {
        let (addr, device) = scripted_device(vec![
            "AUTO_CAL_STATUS:AUTO_CAL_STATS:ENABLED=YES,COUNT=7",
            "AUTO_CAL_STATUS:AUTO_CAL_STATS:ENABLED=YES,COUNT=8",
        ]);
        let dash = Dashboard::new(&config_with_device(Some(addr)));

        for expected in [7, 8] {
            let rx = dash.poll_auto_calibration_async();
            let result = rx.recv_timeout(Duration::from_secs(3)).unwrap();
            let stats = dash.apply_auto_calibration_status(&result).unwrap();
            assert_eq!(stats["COUNT"], StatValue::Int(expected));
        }

        let events = dash.auto_cal_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, AutoCalEventKind::AutoCalibrationPerformed);
        assert_eq!(device.join().unwrap(), vec!["AUTO_CAL_STATUS", "AUTO_CAL_STATUS"]);
    }

    #[test]
    fn auto_cal_status_without_stats_is_ignored() {
        let dash = Dashboard::new(&config_with_device(None));
        assert!(dash.apply_auto_calibration_status(&CommandResult::Timeout).is_none());
        assert!(
            dash.apply_auto_calibration_status(&CommandResult::Reply("PONG:ESP32_READY".into()))
                .is_none()
        );
        assert!(dash.auto_cal_events().is_empty());
    }

    #[test]
    fn recognition_is_logged_unless_none() {
        let (addr, device) = scripted_device(vec![
            "DEVICE_RECOGNIZED:NAME=Kettle,TYPICAL=8.50A",
            "DEVICE_RECOGNIZED:NONE",
        ]);
        let dash = Dashboard::new(&config_with_device(Some(addr)));

        dash.recognize_current_device(8.4);
        dash.recognize_current_device(0.1);
        let recognitions = dash.recognitions();
        assert_eq!(recognitions.len(), 1);
        assert_eq!(recognitions[0].device_info, "NAME=Kettle,TYPICAL=8.50A");
        assert_eq!(recognitions[0].current_amps, 8.4);
        device.join().unwrap();
    }

    #[test]
    fn telemetry_sender_becomes_command_target() {
        let mut dash = Dashboard::new(&config_with_device(None));
        let seen = Arc::new(AtomicUsize::new(0));
        dash.on_reading({
            let seen = Arc::clone(&seen);
            move |_| {
                seen.fetch_add(1, Ordering::SeqCst);
            }
        });
        dash.start_listening().unwrap();

        let device = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
        let port = dash.local_port().unwrap();
        device.send_to(b"power:250.00 W (2.083 A)", (Ipv4Addr::LOCALHOST, port)).unwrap();

        let deadline = Instant::now() + Duration::from_secs(3);
        while seen.load(Ordering::SeqCst) == 0 && Instant::now() < deadline {
            dash.pump_events();
            std::thread::sleep(Duration::from_millis(20));
        }
        assert_eq!(seen.load(Ordering::SeqCst), 1);
        assert_eq!(
            dash.device_target(),
            Some(SocketAddr::new(Ipv4Addr::LOCALHOST.into(), 3334))
        );
        assert_eq!(dash.get_snapshot().1, vec![250.0]);

        assert_eq!(dash.clear_history(), 1);
        assert!(dash.get_snapshot().0.is_empty());
        dash.stop_listening();
    }

    #[test]
    fn status_callback_runs_on_pump() {
        let mut dash = Dashboard::new(&config_with_device(None));
        let got = Arc::new(Mutex::new(Vec::<String>::new()));
        dash.on_status({
            let got = Arc::clone(&got);
            move |s| got.lock().push(s.to_string())
        });
        dash.start_listening().unwrap();
        let device = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
        let port = dash.local_port().unwrap();
        device.send_to(b"status: calibrating", (Ipv4Addr::LOCALHOST, port)).unwrap();

        let deadline = Instant::now() + Duration::from_secs(3);
        while got.lock().is_empty() && Instant::now() < deadline {
            dash.pump_events();
            std::thread::sleep(Duration::from_millis(20));
        }
        assert_eq!(*got.lock(), vec!["calibrating".to_string()]);
        assert_eq!(dash.history().reading_count(), 0);
        dash.stop_listening();
    }
}
