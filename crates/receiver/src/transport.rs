//! Transporte TCP até o hub de sensores.
//!
//! O cliente só conhece o trait [`Connector`]; a implementação real usa
//! `TcpStream` com timeout de leitura, e os testes usam streams em memória.

use moisture_core::config::ConnectionConfig;
use std::io::{self, Read};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;
use tracing::debug;

/// Abre streams de leitura para a fonte de telemetria.
///
/// O stream retornado deve devolver `TimedOut`/`WouldBlock` periodicamente
/// quando ocioso, para que o cliente consiga checar pedidos de parada.
pub trait Connector: Clone + Send + 'static {
    type Stream: Read + Send + 'static;

    fn connect(&mut self) -> io::Result<Self::Stream>;

    /// Descrição do destino para logs.
    fn describe(&self) -> String;
}

/// Conector TCP para `host:port`.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    endpoint: String,
    connect_timeout: Duration,
    read_timeout: Duration,
}

impl TcpConnector {
    pub fn new(endpoint: impl Into<String>, connect_timeout: Duration, read_timeout: Duration) -> Self {
        Self {
            endpoint: endpoint.into(),
            connect_timeout,
            read_timeout,
        }
    }

    pub fn from_config(config: &ConnectionConfig) -> Self {
        Self::new(config.endpoint(), config.connect_timeout(), config.read_timeout())
    }
}

impl Connector for TcpConnector {
    type Stream = TcpStream;

    fn connect(&mut self) -> io::Result<TcpStream> {
        let mut last_err = None;

        for addr in self.endpoint.to_socket_addrs()? {
            match TcpStream::connect_timeout(&addr, self.connect_timeout) {
                Ok(stream) => {
                    stream.set_read_timeout(Some(self.read_timeout))?;
                    stream.set_nodelay(true).ok();
                    return Ok(stream);
                }
                Err(e) => {
                    debug!("Falha ao conectar em {addr}: {e}");
                    last_err = Some(e);
                }
            }
        }

        Err(last_err.unwrap_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("Nenhum endereço para {}", self.endpoint),
            )
        }))
    }

    fn describe(&self) -> String {
        self.endpoint.clone()
    }
}
