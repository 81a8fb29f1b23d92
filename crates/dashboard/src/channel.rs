//! Canal de comando/resposta com o dispositivo.
//!
//! Cada chamada abre o próprio socket efêmero, transmite um comando e faz no
//! máximo um `recv_from` com timeout. Não existe estado compartilhado entre
//! chamadas.

use crossbeam_channel::{Receiver, bounded};
use plug_core::command::{Command, ValidationError};
use plug_core::protocol::MAX_DATAGRAM;
use plug_core::reply::{Reply, parse_reply};
use std::fmt;
use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};
use std::time::Duration;
use tracing::{debug, warn};

/// Menor timeout aceito por `set_read_timeout` (zero é inválido).
const MIN_TIMEOUT: Duration = Duration::from_millis(1);

/// Resultado de um comando. Sempre um valor, nunca um `Err`.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandResult {
    /// Texto da resposta, sem espaços nas pontas
    Reply(String),
    /// Enviado sem aguardar resposta
    Sent,
    /// Nenhuma resposta dentro do prazo
    Timeout,
    /// Falha de rede ao enviar ou receber
    TransportError(String),
    /// Argumento rejeitado antes de qualquer I/O
    ValidationError(ValidationError),
}

impl CommandResult {
    /// Resposta decodificada, se houve resposta.
    pub fn reply(&self) -> Option<Reply> {
        match self {
            CommandResult::Reply(text) => Some(parse_reply(text)),
            _ => None,
        }
    }

    pub fn reply_text(&self) -> Option<&str> {
        match self {
            CommandResult::Reply(text) => Some(text),
            _ => None,
        }
    }

    /// Enviado sem resposta, ou respondido sem erro num formato conhecido.
    pub fn is_success(&self) -> bool {
        match self {
            CommandResult::Sent => true,
            CommandResult::Reply(text) => parse_reply(text).is_ok(),
            _ => false,
        }
    }
}

impl fmt::Display for CommandResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandResult::Reply(text) => f.write_str(text),
            CommandResult::Sent => f.write_str("enviado"),
            CommandResult::Timeout => f.write_str("sem resposta (timeout)"),
            CommandResult::TransportError(e) => write!(f, "erro de transporte: {e}"),
            CommandResult::ValidationError(e) => write!(f, "comando inválido: {e}"),
        }
    }
}

/// Envia um comando e, se `expect_reply`, espera uma única resposta.
pub fn send_command(
    command: &Command,
    target: SocketAddr,
    expect_reply: bool,
    timeout: Duration,
) -> CommandResult {
    if let Err(e) = command.validate() {
        warn!("Comando rejeitado: {e}");
        return CommandResult::ValidationError(e);
    }

    let payload = command.encode();
    match exchange(&payload, target, expect_reply, timeout) {
        Ok(Some(reply)) => {
            debug!("→ {target} {payload} ← {reply}");
            CommandResult::Reply(reply)
        }
        Ok(None) => {
            debug!("→ {target} {payload} (sem resposta esperada)");
            CommandResult::Sent
        }
        Err(e) if is_timeout(&e) => {
            debug!("→ {target} {payload}: timeout após {timeout:?}");
            CommandResult::Timeout
        }
        Err(e) => {
            warn!("Erro de transporte em {payload} para {target}: {e}");
            CommandResult::TransportError(e.to_string())
        }
    }
}

/// Executa [`send_command`] numa thread curta; o resultado chega pelo receiver.
pub fn spawn_command(
    command: Command,
    target: SocketAddr,
    expect_reply: bool,
    timeout: Duration,
) -> Receiver<CommandResult> {
    let (tx, rx) = bounded(1);
    let spawned = std::thread::Builder::new()
        .name("command-worker".into())
        .spawn({
            let tx = tx.clone();
            move || {
                let _ = tx.send(send_command(&command, target, expect_reply, timeout));
            }
        });
    if let Err(e) = spawned {
        let _ = tx.send(CommandResult::TransportError(e.to_string()));
    }
    rx
}

fn exchange(
    payload: &str,
    target: SocketAddr,
    expect_reply: bool,
    timeout: Duration,
) -> io::Result<Option<String>> {
    let local: SocketAddr = if target.is_ipv4() {
        (Ipv4Addr::UNSPECIFIED, 0).into()
    } else {
        (Ipv6Addr::UNSPECIFIED, 0).into()
    };
    let socket = UdpSocket::bind(local)?;
    socket.send_to(payload.as_bytes(), target)?;

    if !expect_reply {
        return Ok(None);
    }

    socket.set_read_timeout(Some(timeout.max(MIN_TIMEOUT)))?;
    let mut buf = [0u8; MAX_DATAGRAM];
    let (size, _) = socket.recv_from(&mut buf)?;
    Ok(Some(String::from_utf8_lossy(&buf[..size]).trim().to_string()))
}

fn is_timeout(e: &io::Error) -> bool {
    matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut)
}
