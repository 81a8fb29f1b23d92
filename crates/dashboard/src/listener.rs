//! Thread de rede que escuta a telemetria UDP da tomada.
//!
//! Um único socket de longa duração, numa única thread, alimenta o
//! [`HistoryStore`] e a fila de eventos. `start()` é idempotente e
//! `stop()` é cooperativo: baixa a flag, acorda o loop com um datagrama
//! sentinela e espera a thread por tempo limitado.
//!
//! Flag, socket, handle e estado de conexão ficam sob um único lock; o
//! histórico tem o seu próprio. Nenhum caminho segura os dois ao mesmo
//! tempo.

use crate::events::{DashboardEvent, publish};
use crossbeam_channel::Sender;
use parking_lot::Mutex;
use plug_core::config::DashboardConfig;
use plug_core::history::HistoryStore;
use plug_core::protocol::{DISCOVERY, MAX_DATAGRAM, ParsedMessage, SENTINEL, parse_message};
use plug_core::types::{ConnectionState, PowerReading, now_secs};
use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Menor timeout de recepção aceito pelo socket.
const MIN_RECEIVE_TIMEOUT: Duration = Duration::from_millis(10);

/// Erros estruturais do listener.
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    #[error("Falha ao bind porta {port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: io::Error,
    },

    #[error("Listener encerrado após {0} erros consecutivos")]
    Fatal(u32),
}

#[derive(Debug, Default)]
struct ListenerState {
    running: bool,
    /// Incrementado a cada `start()`; loops antigos não tocam o estado novo
    run_id: u64,
    socket: Option<Arc<UdpSocket>>,
    handle: Option<JoinHandle<()>>,
    local_port: Option<u16>,
    connection: ConnectionState,
}

/// Listener de telemetria.
pub struct TelemetryListener {
    config: DashboardConfig,
    history: Arc<HistoryStore>,
    events: Sender<DashboardEvent>,
    state: Arc<Mutex<ListenerState>>,
}

impl TelemetryListener {
    pub fn new(
        config: DashboardConfig,
        history: Arc<HistoryStore>,
        events: Sender<DashboardEvent>,
    ) -> Self {
        Self {
            config,
            history,
            events,
            state: Arc::new(Mutex::new(ListenerState::default())),
        }
    }

    /// Inicia a thread de escuta. Não faz nada se já estiver rodando.
    pub fn start(&self) -> Result<(), ListenerError> {
        let mut state = self.state.lock();
        if state.running {
            debug!("Listener já está rodando");
            return Ok(());
        }

        // Loop anterior encerrado por falha: só recolhe o handle
        if let Some(old) = state.handle.take() {
            if old.is_finished() {
                let _ = old.join();
            }
        }

        let port = self.config.listen_port;
        let socket = bind_socket(port, self.config.receive_timeout())
            .map_err(|source| ListenerError::Bind { port, source })?;
        let socket = Arc::new(socket);
        let local_port = socket.local_addr().map(|a| a.port()).unwrap_or(port);

        state.run_id += 1;
        let ctx = LoopContext {
            run_id: state.run_id,
            socket: Arc::clone(&socket),
            state: Arc::clone(&self.state),
            history: Arc::clone(&self.history),
            events: self.events.clone(),
            max_errors: self.config.max_consecutive_errors.max(1),
            backoff: self.config.error_backoff(),
            discovery: self.config.discovery_enabled.then(|| Discovery {
                device_port: self.config.device_port,
                candidates: self.config.discovery_ips(),
            }),
        };

        let handle = std::thread::Builder::new()
            .name("udp-listener".into())
            .spawn(move || ctx.run())
            .map_err(|source| ListenerError::Bind { port, source })?;

        state.running = true;
        state.socket = Some(socket);
        state.handle = Some(handle);
        state.local_port = Some(local_port);
        state.connection = ConnectionState::Listening;
        drop(state);

        info!("Listener escutando em 0.0.0.0:{local_port}");
        publish(
            &self.events,
            DashboardEvent::Connection(ConnectionState::Listening),
        );
        Ok(())
    }

    /// Para a thread de escuta. Seguro antes de `start()` e repetido.
    pub fn stop(&self) {
        let (handle, port) = {
            let mut state = self.state.lock();
            if !state.running && state.handle.is_none() {
                debug!("stop() sem listener ativo");
                return;
            }
            state.running = false;
            state.connection = ConnectionState::Disconnected;
            state.socket = None;
            (state.handle.take(), state.local_port.take())
        };

        if let Some(port) = port {
            wake_listener(port);
        }
        if let Some(handle) = handle {
            join_bounded(handle, self.config.stop_join_timeout());
        }

        publish(
            &self.events,
            DashboardEvent::Connection(ConnectionState::Disconnected),
        );
        info!("Listener parado");
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().running
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.state.lock().connection
    }

    /// Porta efetivamente ligada (útil com `listen_port = 0`).
    pub fn local_port(&self) -> Option<u16> {
        self.state.lock().local_port
    }
}

impl Drop for TelemetryListener {
    fn drop(&mut self) {
        self.stop();
    }
}

// ──────────────────────────────────────────────
// Loop de recepção
// ──────────────────────────────────────────────

struct Discovery {
    device_port: u16,
    candidates: Vec<IpAddr>,
}

struct LoopContext {
    run_id: u64,
    socket: Arc<UdpSocket>,
    state: Arc<Mutex<ListenerState>>,
    history: Arc<HistoryStore>,
    events: Sender<DashboardEvent>,
    max_errors: u32,
    backoff: Duration,
    discovery: Option<Discovery>,
}

/// Contagem de erros de recepção consecutivos.
///
/// Timeouts não passam por aqui; só erros reais contam.
#[derive(Debug)]
struct ErrorStrikes {
    count: u32,
    max: u32,
}

impl ErrorStrikes {
    fn new(max: u32) -> Self {
        Self { count: 0, max: max.max(1) }
    }

    fn reset(&mut self) {
        self.count = 0;
    }

    /// Registra um erro. Verdadeiro quando o limite foi atingido.
    fn strike(&mut self) -> bool {
        self.count += 1;
        self.count >= self.max
    }
}

fn is_timeout(e: &io::Error) -> bool {
    matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock)
}

impl LoopContext {
    fn run(self) {
        let socket = Arc::clone(&self.socket);
        self.run_with(move |buf| socket.recv_from(buf));
    }

    /// Loop de recepção sobre uma fonte de datagramas qualquer.
    fn run_with<R>(self, mut recv: R)
    where
        R: FnMut(&mut [u8]) -> io::Result<(usize, SocketAddr)>,
    {
        if let Some(d) = &self.discovery {
            send_discovery(d.device_port, &d.candidates);
        }

        let mut buf = [0u8; MAX_DATAGRAM];
        let mut strikes = ErrorStrikes::new(self.max_errors);

        while self.is_current() {
            match recv(&mut buf) {
                Ok((size, addr)) => {
                    strikes.reset();
                    let payload = &buf[..size];
                    if payload == SENTINEL {
                        continue;
                    }
                    let text = String::from_utf8_lossy(payload);
                    debug!("← {}: {}", addr.ip(), text.trim());
                    self.handle_message(&text, addr);
                }
                Err(ref e) if is_timeout(e) => {
                    // Timeout normal, continua
                }
                Err(e) => {
                    if !self.is_current() {
                        break;
                    }
                    let exhausted = strikes.strike();
                    warn!("Erro ao receber UDP ({}/{}): {e}", strikes.count, strikes.max);
                    if exhausted {
                        self.fail(ListenerError::Fatal(strikes.count));
                        break;
                    }
                    std::thread::sleep(self.backoff);
                }
            }
        }

        debug!("Thread de escuta encerrada");
    }

    fn is_current(&self) -> bool {
        let state = self.state.lock();
        state.running && state.run_id == self.run_id
    }

    fn handle_message(&self, text: &str, addr: SocketAddr) {
        match parse_message(text) {
            ParsedMessage::Power(watts) => {
                let reading = PowerReading::new(now_secs(), watts);
                if !self.update_connection(addr) {
                    return;
                }
                self.history.push_reading(reading);
                publish(&self.events, DashboardEvent::Reading(reading));
            }
            ParsedMessage::Status(status) => {
                info!("Status do dispositivo: {status}");
                publish(&self.events, DashboardEvent::Status(status));
            }
            ParsedMessage::Unrecognized => {
                debug!("Formato desconhecido de {}: {:?}", addr.ip(), text.trim());
            }
        }
    }

    /// Registra o remetente como dispositivo conectado (último vence).
    ///
    /// Falso quando este loop já não é o atual.
    fn update_connection(&self, addr: SocketAddr) -> bool {
        let changed = {
            let mut state = self.state.lock();
            if !state.running || state.run_id != self.run_id {
                return false;
            }
            let next = ConnectionState::Connected(addr);
            let changed = state.connection != next;
            state.connection = next;
            changed
        };
        if changed {
            info!("Conectado a {} – dados ao vivo", addr.ip());
            publish(
                &self.events,
                DashboardEvent::Connection(ConnectionState::Connected(addr)),
            );
        }
        true
    }

    fn fail(&self, err: ListenerError) {
        {
            let mut state = self.state.lock();
            if state.run_id != self.run_id {
                return;
            }
            state.running = false;
            state.socket = None;
            state.local_port = None;
            state.connection = ConnectionState::Disconnected;
        }
        error!("{err}");
        publish(&self.events, DashboardEvent::ListenerFatal(err.to_string()));
        publish(
            &self.events,
            DashboardEvent::Connection(ConnectionState::Disconnected),
        );
    }
}

// ──────────────────────────────────────────────
// Socket, sentinela e descoberta
// ──────────────────────────────────────────────

/// Socket de escuta em 0.0.0.0 com SO_REUSEADDR.
fn bind_socket(port: u16, timeout: Duration) -> io::Result<UdpSocket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
    socket.bind(&addr.into())?;

    let socket: UdpSocket = socket.into();
    socket.set_read_timeout(Some(timeout.max(MIN_RECEIVE_TIMEOUT)))?;
    Ok(socket)
}

/// Envia o sentinela para desbloquear o `recv_from` do loop.
fn wake_listener(port: u16) {
    let result = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0))
        .and_then(|s| s.send_to(SENTINEL, (Ipv4Addr::LOCALHOST, port)));
    if let Err(e) = result {
        debug!("Falha ao enviar sentinela para a porta {port}: {e}");
    }
}

/// Espera a thread terminar por no máximo `timeout`.
fn join_bounded(handle: JoinHandle<()>, timeout: Duration) {
    let deadline = Instant::now() + timeout;
    while !handle.is_finished() && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(10));
    }
    if handle.is_finished() {
        if handle.join().is_err() {
            error!("Thread de escuta terminou em pânico");
        }
    } else {
        warn!("Thread de escuta não terminou em {timeout:?}; seguindo sem join");
    }
}

/// Como o anúncio de descoberta saiu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryRoute {
    Broadcast,
    /// Broadcast falhou; número de candidatos que aceitaram o envio
    Unicast(usize),
    Failed,
}

/// Anuncia `DASHBOARD_READY` na porta de comandos do dispositivo.
///
/// Broadcast primeiro; se falhar, unicast para cada candidato. Nenhuma
/// resposta é esperada.
pub fn send_discovery(device_port: u16, candidates: &[IpAddr]) -> DiscoveryRoute {
    announce(
        || {
            let s = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))?;
            s.set_broadcast(true)?;
            s.send_to(DISCOVERY, (Ipv4Addr::BROADCAST, device_port))
        },
        device_port,
        candidates,
    )
}

fn announce<B>(broadcast: B, device_port: u16, candidates: &[IpAddr]) -> DiscoveryRoute
where
    B: FnOnce() -> io::Result<usize>,
{
    match broadcast() {
        Ok(_) => {
            info!("Broadcast de descoberta enviado para a porta {device_port}");
            DiscoveryRoute::Broadcast
        }
        Err(e) => {
            warn!("Broadcast de descoberta falhou: {e}. Tentando IPs conhecidos...");
            match UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)) {
                Ok(sock) => DiscoveryRoute::Unicast(send_unicast(&sock, device_port, candidates)),
                Err(e) => {
                    warn!("Descoberta por unicast também falhou: {e}");
                    DiscoveryRoute::Failed
                }
            }
        }
    }
}

/// Envia o anúncio a cada candidato; devolve quantos envios deram certo.
fn send_unicast(sock: &UdpSocket, device_port: u16, candidates: &[IpAddr]) -> usize {
    let sent = candidates
        .iter()
        .filter(|ip| match sock.send_to(DISCOVERY, (**ip, device_port)) {
            Ok(_) => true,
            Err(e) => {
                debug!("Descoberta para {ip} falhou: {e}");
                false
            }
        })
        .count();
    info!("Descoberta enviada para {sent}/{} IPs conhecidos", candidates.len());
    sent
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::event_queue;
    use crossbeam_channel::Receiver;

    fn test_config() -> DashboardConfig {
        DashboardConfig {
            listen_port: 0,
            receive_timeout_secs: 0.2,
            stop_join_timeout_secs: 2.0,
            discovery_enabled: false,
            ..Default::default()
        }
    }

    fn listener() -> (TelemetryListener, Arc<HistoryStore>, Receiver<DashboardEvent>) {
        let history = Arc::new(HistoryStore::default());
        let (tx, rx) = event_queue();
        let l = TelemetryListener::new(test_config(), Arc::clone(&history), tx);
        (l, history, rx)
    }

    fn send_to_listener(l: &TelemetryListener, payload: &str) -> UdpSocket {
        let device = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
        let port = l.local_port().unwrap();
        device.send_to(payload.as_bytes(), (Ipv4Addr::LOCALHOST, port)).unwrap();
        device
    }

    fn wait_for<F: Fn(&DashboardEvent) -> bool>(rx: &Receiver<DashboardEvent>, f: F) -> DashboardEvent {
        let deadline = Instant::now() + Duration::from_secs(3);
        while Instant::now() < deadline {
            if let Ok(ev) = rx.recv_timeout(Duration::from_millis(50)) {
                if f(&ev) {
                    return ev;
                }
            }
        }
        panic!("evento esperado não chegou");
    }

    #[test]
    fn stop_before_start_is_noop() {
        let (l, _, rx) = listener();
        l.stop();
        l.stop();
        assert!(!l.is_running());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn double_start_keeps_single_loop() {
        let (l, _, _rx) = listener();
        l.start().unwrap();
        let port = l.local_port();
        l.start().unwrap();
        assert!(l.is_running());
        assert_eq!(l.local_port(), port);
        l.stop();
        assert!(!l.is_running());
        assert_eq!(l.connection_state(), ConnectionState::Disconnected);
    }

    #[test]
    fn power_frame_reaches_history_and_events() {
        let (l, history, rx) = listener();
        l.start().unwrap();
        let device = send_to_listener(&l, "power:642.10 W (5.35 A)");

        let ev = wait_for(&rx, |e| matches!(e, DashboardEvent::Reading(_)));
        assert!(matches!(ev, DashboardEvent::Reading(r) if r.value == 642.10));
        assert_eq!(history.reading_count(), 1);
        assert_eq!(
            l.connection_state(),
            ConnectionState::Connected(device.local_addr().unwrap())
        );
        l.stop();
    }

    #[test]
    fn status_and_garbage_do_not_touch_history() {
        let (l, history, rx) = listener();
        l.start().unwrap();
        send_to_listener(&l, "garbage");
        send_to_listener(&l, "status: calibrating");

        let ev = wait_for(&rx, |e| matches!(e, DashboardEvent::Status(_)));
        assert_eq!(ev, DashboardEvent::Status("calibrating".into()));
        assert_eq!(history.reading_count(), 0);
        assert_eq!(l.connection_state(), ConnectionState::Listening);
        l.stop();
    }

    #[test]
    fn invalid_utf8_is_decoded_leniently() {
        let (l, history, rx) = listener();
        l.start().unwrap();
        let device = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
        let port = l.local_port().unwrap();
        device.send_to(&[0xFF, 0xFE, b'!'], (Ipv4Addr::LOCALHOST, port)).unwrap();
        device.send_to(b"POWER=42.10W", (Ipv4Addr::LOCALHOST, port)).unwrap();

        wait_for(&rx, |e| matches!(e, DashboardEvent::Reading(_)));
        assert_eq!(history.readings()[0].value, 42.10);
        assert!(l.is_running());
        l.stop();
    }

    #[test]
    fn readings_keep_arrival_order() {
        let (l, history, rx) = listener();
        l.start().unwrap();
        let device = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
        let port = l.local_port().unwrap();
        for w in [100.0, 200.0, 300.0] {
            device
                .send_to(format!("power:{w:.2} W (1.000 A)").as_bytes(), (Ipv4Addr::LOCALHOST, port))
                .unwrap();
            wait_for(&rx, |e| matches!(e, DashboardEvent::Reading(_)));
        }
        let (_, values) = history.snapshot();
        assert_eq!(values, vec![100.0, 200.0, 300.0]);
        l.stop();
    }

    #[test]
    fn stop_returns_quickly_and_restart_works() {
        let (l, _, _rx) = listener();
        l.start().unwrap();
        let t0 = Instant::now();
        l.stop();
        assert!(t0.elapsed() < Duration::from_secs(2));
        l.start().unwrap();
        assert!(l.is_running());
        l.stop();
    }

    #[test]
    fn bind_conflict_is_reported() {
        // Porta ocupada por socket sem SO_REUSEADDR
        let taken = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).unwrap();
        let port = taken.local_addr().unwrap().port();
        let history = Arc::new(HistoryStore::default());
        let (tx, _rx) = event_queue();
        let l = TelemetryListener::new(
            DashboardConfig {
                listen_port: port,
                ..test_config()
            },
            history,
            tx,
        );
        assert!(matches!(l.start(), Err(ListenerError::Bind { .. })));
        assert!(!l.is_running());
    }

    /// Contexto ligado ao estado de `l`, como se `start()` tivesse rodado.
    fn attached_context(l: &TelemetryListener, max_errors: u32) -> LoopContext {
        let mut state = l.state.lock();
        state.run_id += 1;
        state.running = true;
        state.connection = ConnectionState::Listening;
        LoopContext {
            run_id: state.run_id,
            socket: Arc::new(UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).unwrap()),
            state: Arc::clone(&l.state),
            history: Arc::clone(&l.history),
            events: l.events.clone(),
            max_errors,
            backoff: Duration::ZERO,
            discovery: None,
        }
    }

    enum Step {
        Datagram(&'static str),
        Timeout,
        Failure,
    }

    /// Fonte de datagramas roteirizada; ao fim do roteiro baixa a flag.
    fn scripted_recv(
        steps: Vec<Step>,
        state: Arc<Mutex<ListenerState>>,
        calls: Arc<Mutex<usize>>,
    ) -> impl FnMut(&mut [u8]) -> io::Result<(usize, SocketAddr)> {
        let from = SocketAddr::from((Ipv4Addr::LOCALHOST, 40_000));
        let mut steps = steps.into_iter();
        move |buf| {
            *calls.lock() += 1;
            match steps.next() {
                Some(Step::Datagram(text)) => {
                    buf[..text.len()].copy_from_slice(text.as_bytes());
                    Ok((text.len(), from))
                }
                Some(Step::Timeout) => Err(io::ErrorKind::WouldBlock.into()),
                Some(Step::Failure) => Err(io::ErrorKind::ConnectionReset.into()),
                None => {
                    state.lock().running = false;
                    Err(io::ErrorKind::TimedOut.into())
                }
            }
        }
    }

    fn drain(rx: &Receiver<DashboardEvent>) -> Vec<DashboardEvent> {
        rx.try_iter().collect()
    }

    #[test]
    fn strikes_reach_limit_and_reset() {
        let mut strikes = ErrorStrikes::new(3);
        assert!(!strikes.strike());
        assert!(!strikes.strike());
        strikes.reset();
        assert!(!strikes.strike());
        assert!(!strikes.strike());
        assert!(strikes.strike());
        assert!(ErrorStrikes::new(0).strike());
    }

    #[test]
    fn consecutive_errors_end_in_listener_fatal() {
        let (l, _, rx) = listener();
        let ctx = attached_context(&l, 5);
        let calls = Arc::new(Mutex::new(0));
        // Timeouts intercalados não contam nem zeram
        let steps = vec![
            Step::Failure,
            Step::Failure,
            Step::Timeout,
            Step::Failure,
            Step::Timeout,
            Step::Failure,
            Step::Failure,
            Step::Datagram("power:100.00 W (1.000 A)"),
        ];
        ctx.run_with(scripted_recv(steps, Arc::clone(&l.state), Arc::clone(&calls)));

        assert_eq!(*calls.lock(), 7, "o loop devia parar no quinto erro");
        assert!(!l.is_running());
        assert_eq!(l.connection_state(), ConnectionState::Disconnected);
        let events = drain(&rx);
        assert!(events.iter().any(|e| matches!(
            e,
            DashboardEvent::ListenerFatal(msg) if msg.contains('5')
        )));
        assert_eq!(
            events.last(),
            Some(&DashboardEvent::Connection(ConnectionState::Disconnected))
        );
    }

    #[test]
    fn datagram_between_errors_resets_the_count() {
        let (l, history, rx) = listener();
        let ctx = attached_context(&l, 5);
        let calls = Arc::new(Mutex::new(0));
        let mut steps: Vec<Step> = (0..4).map(|_| Step::Failure).collect();
        steps.push(Step::Datagram("power:100.00 W (1.000 A)"));
        steps.extend((0..4).map(|_| Step::Failure));
        ctx.run_with(scripted_recv(steps, Arc::clone(&l.state), Arc::clone(&calls)));

        assert_eq!(*calls.lock(), 10);
        assert_eq!(history.reading_count(), 1);
        assert!(!drain(&rx).iter().any(|e| matches!(e, DashboardEvent::ListenerFatal(_))));
    }

    #[test]
    fn failed_broadcast_falls_back_to_unicast() {
        let device = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
        device.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
        let port = device.local_addr().unwrap().port();

        let route = announce(
            || Err(io::ErrorKind::PermissionDenied.into()),
            port,
            &[IpAddr::V4(Ipv4Addr::LOCALHOST)],
        );

        assert_eq!(route, DiscoveryRoute::Unicast(1));
        let mut buf = [0u8; 64];
        let (n, _) = device.recv_from(&mut buf).unwrap();
        assert_eq!(&buf[..n], DISCOVERY);
    }

    #[test]
    fn successful_broadcast_skips_unicast() {
        let device = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
        device.set_read_timeout(Some(Duration::from_millis(200))).unwrap();
        let port = device.local_addr().unwrap().port();

        let route = announce(|| Ok(DISCOVERY.len()), port, &[IpAddr::V4(Ipv4Addr::LOCALHOST)]);

        assert_eq!(route, DiscoveryRoute::Broadcast);
        let mut buf = [0u8; 64];
        assert!(device.recv_from(&mut buf).is_err());
    }

    #[test]
    fn unicast_counts_only_accepted_sends() {
        let device = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
        device.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
        let port = device.local_addr().unwrap().port();
        let sock = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).unwrap();

        // Socket IPv4 não envia para destino IPv6
        let candidates = [IpAddr::V4(Ipv4Addr::LOCALHOST), "::1".parse().unwrap()];
        assert_eq!(send_unicast(&sock, port, &candidates), 1);

        let mut buf = [0u8; 64];
        let (n, _) = device.recv_from(&mut buf).unwrap();
        assert_eq!(&buf[..n], DISCOVERY);
        assert_eq!(send_unicast(&sock, port, &[]), 0);
    }
}
