//! # Moisture Core
//!
//! Crate compartilhada com o modelo de dados, classificador, decodificador
//! de frames JSON e configuração TOML do monitor de umidade.
//!
//! ## Módulos
//! - [`types`] – Entidades, leituras e estado da conexão
//! - [`classifier`] – Classificação DRY/OK/WET e escala normalizada
//! - [`protocol`] – Decodificação tolerante dos frames `entity_<n>`
//! - [`registry`] – Registro fixo de entidades e validação de edições
//! - [`alerts`] – Conjunto de entidades que precisam de rega
//! - [`config`] – Configuração unificada via TOML

pub mod types;
pub mod classifier;
pub mod protocol;
pub mod registry;
pub mod alerts;
pub mod config;

// Re-exports convenientes
pub use alerts::{Alert, evaluate_alerts};
pub use classifier::{Classification, MoistureStatus, classify};
pub use config::AppConfig;
pub use protocol::{DecodedFrame, FrameBuffer, ProtocolError, decode_frame};
pub use registry::{EntityRegistry, ValidationError};
pub use types::{ConnectionState, Entity, EntityConfig, Reading, SensorSpec};
