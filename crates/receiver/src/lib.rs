//! # Moisture Receiver
//!
//! Cliente de telemetria que mantém uma conexão TCP com o hub de sensores,
//! decodifica os frames recebidos e publica snapshots imutáveis do registro
//! e do conjunto de alertas.
//!
//! ## Módulos
//! - [`transport`] – Abstração de conexão e conector TCP
//! - [`publish`] – Estado compartilhado e snapshots para a apresentação
//! - [`client`] – Máquina de estados de conexão e reconexão

pub mod transport;
pub mod publish;
pub mod client;

pub use client::{ClientSettings, TelemetryClient};
pub use publish::{Monitor, MonitorSnapshot, Subscription};
pub use transport::{Connector, TcpConnector};
