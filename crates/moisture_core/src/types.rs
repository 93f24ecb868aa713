//! Definição de tipos do monitor de umidade.
//!
//! Cada sensor remoto é uma "entidade" com configuração (thresholds, nome)
//! e última leitura conhecida. O estado da conexão fica aqui também porque
//! é publicado junto com os snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Tensão de alimentação padrão do sensor (V).
pub const DEFAULT_SUPPLY_VOLTAGE: f32 = 3.3;

/// Código máximo do ADC de 10 bits do hub remoto.
pub const DEFAULT_MAX_CODE: u16 = 1023;

pub const DEFAULT_DRY_THRESHOLD: f32 = 1.5;
pub const DEFAULT_WET_THRESHOLD: f32 = 2.5;

/// Intervalo sugerido de atualização (s). Apenas informativo.
pub const DEFAULT_UPDATE_INTERVAL_SECS: u32 = 2;

// ──────────────────────────────────────────────
// Sensor
// ──────────────────────────────────────────────

/// Características elétricas comuns a todos os sensores.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorSpec {
    /// Tensão de alimentação (V), limite superior da faixa de leitura
    pub supply_voltage: f32,
    /// Maior código nativo do conversor
    pub max_code: u16,
}

impl Default for SensorSpec {
    fn default() -> Self {
        Self {
            supply_voltage: DEFAULT_SUPPLY_VOLTAGE,
            max_code: DEFAULT_MAX_CODE,
        }
    }
}

impl SensorSpec {
    /// Reescala uma tensão para o código nativo do sensor.
    ///
    /// `round(voltage * max_code / supply_voltage)`, saturado em `0..=max_code`.
    pub fn raw_code(&self, voltage: f32) -> u16 {
        if self.supply_voltage <= 0.0 || !voltage.is_finite() {
            return 0;
        }
        let code = (voltage * self.max_code as f32 / self.supply_voltage).round();
        code.clamp(0.0, self.max_code as f32) as u16
    }

    /// `true` se o valor está em `[0, supply_voltage]`.
    pub fn in_range(&self, value: f32) -> bool {
        value.is_finite() && (0.0..=self.supply_voltage).contains(&value)
    }
}

// ──────────────────────────────────────────────
// Entidade
// ──────────────────────────────────────────────

/// Configuração de uma entidade monitorada.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityConfig {
    /// Abaixo deste valor o solo está seco (V)
    pub dry_threshold: f32,
    /// Acima deste valor o solo está encharcado (V)
    pub wet_threshold: f32,
    /// Intervalo sugerido de atualização (s), não aplicado pelo cliente
    pub update_interval_hint: u32,
    /// Nome exibido, editável pelo usuário
    pub display_name: String,
}

impl EntityConfig {
    /// Configuração padrão para a posição `index` ("Plant 1", "Plant 2"…).
    pub fn positional(index: usize) -> Self {
        Self {
            dry_threshold: DEFAULT_DRY_THRESHOLD,
            wet_threshold: DEFAULT_WET_THRESHOLD,
            update_interval_hint: DEFAULT_UPDATE_INTERVAL_SECS,
            display_name: default_name(index),
        }
    }
}

/// Nome posicional de uma entidade.
pub fn default_name(index: usize) -> String {
    format!("Plant {}", index + 1)
}

/// Última leitura observada de uma entidade.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// Tensão medida (V)
    pub voltage: f32,
    /// Tensão reescalada para o código do ADC, saturada em `0..=max_code`
    pub raw_code: u16,
    /// Momento da última atualização (`None` antes do primeiro contato)
    pub last_update: Option<DateTime<Utc>>,
    /// `true` após a primeira leitura válida
    pub connected: bool,
}

/// Par configuração + leitura, indexado pela posição no registro.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub index: usize,
    pub config: EntityConfig,
    pub reading: Reading,
}

// ──────────────────────────────────────────────
// Conexão
// ──────────────────────────────────────────────

/// Estado da conexão com a fonte de telemetria.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    /// Falha com motivo legível
    Failed(String),
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }

    /// Texto curto para logs e barras de status.
    pub fn describe(&self) -> String {
        match self {
            ConnectionState::Disconnected => "Desconectado".into(),
            ConnectionState::Connecting => "Conectando".into(),
            ConnectionState::Connected => "Conectado".into(),
            ConnectionState::Failed(reason) => format!("Falha: {reason}"),
        }
    }
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────
