//! Cliente de telemetria: conexão, leitura contínua e reconexão.
//!
//! Máquina de estados:
//!
//! ```text
//! Disconnected ──start()──▶ Connecting ──ok──▶ Connected
//!                              ▲    │              │
//!                              │    └──erro──┐     │ erro / EOF
//!                              │             ▼     ▼
//!                              └──backoff── Failed(motivo)
//!
//! qualquer estado ──stop()──▶ Disconnected
//! ```
//!
//! Uma única thread coordena conexão, decodificação e mutação do registro.
//! Não há limite de tentativas: o cliente reconecta até `stop()`.

use crate::publish::Monitor;
use crate::transport::Connector;
use crossbeam_channel::{Receiver, Sender, TryRecvError, after, bounded, select};
use moisture_core::config::AppConfig;
use moisture_core::protocol::FrameBuffer;
use moisture_core::types::ConnectionState;
use std::io::{self, ErrorKind, Read};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Tamanho do buffer de leitura do socket.
const READ_CHUNK: usize = 4096;

/// Parâmetros de temporização do cliente.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientSettings {
    /// Espera entre `Failed` e a próxima tentativa
    pub reconnect_delay: Duration,
    /// Idade máxima de uma leitura antes de marcar o sensor como desconectado
    pub stale_after: Option<Duration>,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            reconnect_delay: Duration::from_secs(5),
            stale_after: None,
        }
    }
}

impl ClientSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            reconnect_delay: config.connection.reconnect_delay(),
            stale_after: config.sensors.stale_after(),
        }
    }
}

struct Worker {
    stop_tx: Sender<()>,
    handle: JoinHandle<()>,
}

/// Consumidor passivo do stream de telemetria.
pub struct TelemetryClient<C: Connector> {
    connector: C,
    monitor: Monitor,
    settings: ClientSettings,
    worker: Option<Worker>,
}

impl<C: Connector> TelemetryClient<C> {
    pub fn new(connector: C, monitor: Monitor, settings: ClientSettings) -> Self {
        Self {
            connector,
            monitor,
            settings,
            worker: None,
        }
    }

    pub fn monitor(&self) -> &Monitor {
        &self.monitor
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    /// Inicia o ciclo de conexão. Não faz nada se já estiver rodando.
    pub fn start(&mut self) -> io::Result<()> {
        if self.worker.is_some() {
            debug!("Cliente já em execução");
            return Ok(());
        }

        // Canal sem mensagens: o drop do Sender sinaliza a parada
        let (stop_tx, stop_rx) = bounded::<()>(0);
        let connector = self.connector.clone();
        let monitor = self.monitor.clone();
        let settings = self.settings.clone();

        let handle = std::thread::Builder::new()
            .name("telemetry-client".into())
            .spawn(move || client_loop(connector, &monitor, &settings, &stop_rx))?;

        self.worker = Some(Worker { stop_tx, handle });
        Ok(())
    }

    /// Cancela conexão e reconexão pendente.
    ///
    /// Bloqueia até a thread terminar (no máximo um timeout de leitura ou de
    /// conexão); ao retornar o estado é sempre `Disconnected`.
    pub fn stop(&mut self) {
        if let Some(Worker { stop_tx, handle }) = self.worker.take() {
            drop(stop_tx);
            if handle.join().is_err() {
                error!("Thread do cliente terminou com pânico");
            }
            info!("Cliente de telemetria parado");
        }
        self.monitor.set_connection(ConnectionState::Disconnected);
    }
}

impl<C: Connector> Drop for TelemetryClient<C> {
    fn drop(&mut self) {
        if self.worker.is_some() {
            self.stop();
        }
    }
}

// ──────────────────────────────────────────────
// Thread coordenadora
// ──────────────────────────────────────────────

enum LoopExit {
    Stopped,
    Failed(String),
}

fn stop_requested(stop_rx: &Receiver<()>) -> bool {
    !matches!(stop_rx.try_recv(), Err(TryRecvError::Empty))
}

fn client_loop<C: Connector>(mut connector: C, monitor: &Monitor, settings: &ClientSettings, stop_rx: &Receiver<()>) {
    let target = connector.describe();
    let mut frames = FrameBuffer::new();

    loop {
        monitor.set_connection(ConnectionState::Connecting);
        let attempt = connector.connect();

        // stop() durante o connect: descarta o resultado
        if stop_requested(stop_rx) {
            break;
        }

        let reason = match attempt {
            Ok(stream) => {
                info!("Conectado a {target}");
                monitor.set_connection(ConnectionState::Connected);
                // Frame parcial da conexão anterior não continua nesta
                frames.clear();
                match receive_loop(stream, &mut frames, monitor, settings, stop_rx) {
                    LoopExit::Stopped => break,
                    LoopExit::Failed(reason) => reason,
                }
            }
            Err(e) => e.to_string(),
        };

        warn!(
            "Conexão com {target} falhou: {reason}. Tentando novamente em {:.1}s...",
            settings.reconnect_delay.as_secs_f64()
        );
        monitor.set_connection(ConnectionState::Failed(reason));

        select! {
            recv(stop_rx) -> _ => break,
            recv(after(settings.reconnect_delay)) -> _ => {}
        }
    }

    debug!("Thread do cliente encerrada");
}

fn receive_loop<S: Read>(
    mut stream: S,
    frames: &mut FrameBuffer,
    monitor: &Monitor,
    settings: &ClientSettings,
    stop_rx: &Receiver<()>,
) -> LoopExit {
    let mut buf = [0u8; READ_CHUNK];

    loop {
        if stop_requested(stop_rx) {
            return LoopExit::Stopped;
        }

        match stream.read(&mut buf) {
            Ok(0) => return LoopExit::Failed("Conexão encerrada pelo hub".into()),
            Ok(size) => {
                for result in frames.push(&buf[..size]) {
                    match result {
                        Ok(frame) => {
                            let outcome = monitor.apply_frame(&frame);
                            debug!(
                                "Frame aplicado: {} leituras, {} chaves ignoradas",
                                outcome.applied,
                                frame.skipped + outcome.out_of_range
                            );
                        }
                        Err(e) => {
                            debug!("Frame descartado: {e}");
                            monitor.record_rejected_frame();
                        }
                    }
                }
            }
            Err(ref e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted) => {
                // Timeout normal, continua
            }
            Err(e) => return LoopExit::Failed(e.to_string()),
        }

        if let Some(max_age) = settings.stale_after {
            monitor.expire_stale(max_age);
        }
    }
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────
