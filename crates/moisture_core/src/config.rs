//! Configuração unificada via TOML.
//!
//! Um único `config.toml` ao lado do executável. Seções ausentes usam os
//! valores padrão do hub de referência (40 sensores, 3.3 V, ADC 10 bits).

use crate::registry::EntityRegistry;
use crate::types::{
    DEFAULT_DRY_THRESHOLD, DEFAULT_MAX_CODE, DEFAULT_SUPPLY_VOLTAGE, DEFAULT_UPDATE_INTERVAL_SECS,
    DEFAULT_WET_THRESHOLD, EntityConfig, SensorSpec, default_name,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Erros de leitura/escrita do arquivo de configuração.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Erro de E/S em {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Erro ao parsear {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Erro ao serializar configuração: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Conexão com o hub de sensores.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// IP ou hostname do hub
    pub host: String,
    /// Porta TCP
    pub port: u16,
    /// Espera antes de reconectar após falha (segundos)
    pub reconnect_delay_secs: f64,
    /// Tempo máximo para estabelecer a conexão (segundos)
    pub connect_timeout_secs: f64,
    /// Timeout de leitura; define a cadência de checagem de stop/staleness
    pub read_timeout_ms: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: "172.20.10.2".into(),
            port: 5000,
            reconnect_delay_secs: 5.0,
            connect_timeout_secs: 5.0,
            read_timeout_ms: 1000,
        }
    }
}

impl ConnectionConfig {
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::try_from_secs_f64(self.reconnect_delay_secs).unwrap_or(Duration::from_secs(5))
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.connect_timeout_secs)
            .ok()
            .filter(|d| !d.is_zero())
            .unwrap_or(Duration::from_secs(5))
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms.max(1))
    }
}

/// Parâmetros comuns dos sensores.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorsConfig {
    /// Quantidade de entidades monitoradas
    pub count: usize,
    /// Tensão de alimentação (V)
    pub supply_voltage: f32,
    /// Código máximo do ADC
    pub max_code: u16,
    pub default_dry_threshold: f32,
    pub default_wet_threshold: f32,
    /// Intervalo sugerido (s), apenas informativo
    pub update_interval_secs: u32,
    /// Sem leitura por este tempo a entidade volta a "desconectada" (0 = nunca)
    pub stale_after_secs: f64,
}

impl Default for SensorsConfig {
    fn default() -> Self {
        Self {
            count: 40,
            supply_voltage: DEFAULT_SUPPLY_VOLTAGE,
            max_code: DEFAULT_MAX_CODE,
            default_dry_threshold: DEFAULT_DRY_THRESHOLD,
            default_wet_threshold: DEFAULT_WET_THRESHOLD,
            update_interval_secs: DEFAULT_UPDATE_INTERVAL_SECS,
            stale_after_secs: 0.0,
        }
    }
}

impl SensorsConfig {
    pub fn sensor_spec(&self) -> SensorSpec {
        SensorSpec {
            supply_voltage: self.supply_voltage,
            max_code: self.max_code,
        }
    }

    pub fn stale_after(&self) -> Option<Duration> {
        Duration::try_from_secs_f64(self.stale_after_secs)
            .ok()
            .filter(|d| !d.is_zero())
    }
}

/// Ajuste individual de uma entidade.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntityOverride {
    pub index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dry_threshold: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wet_threshold: Option<f32>,
}

/// Configuração raiz do aplicativo.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub connection: ConnectionConfig,
    pub sensors: SensorsConfig,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub entities: Vec<EntityOverride>,
}

impl AppConfig {
    /// Carrega configuração de um arquivo TOML.
    ///
    /// Arquivo ausente ou inválido resulta na configuração padrão.
    pub fn load(path: &Path) -> Self {
        if path.exists() {
            match Self::try_load(path) {
                Ok(config) => {
                    info!("Configuração carregada de {}", path.display());
                    return config;
                }
                Err(e) => warn!("{e}"),
            }
        }

        info!("Usando configuração padrão");
        AppConfig::default()
    }

    /// Carrega configuração propagando erros.
    pub fn try_load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Salva configuração em arquivo TOML.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        info!("Configuração salva em {}", path.display());
        Ok(())
    }

    /// Retorna o caminho padrão do config.toml.
    pub fn default_path() -> PathBuf {
        let exe_dir = std::env::current_exe()
            .map(|p| p.parent().unwrap_or(Path::new(".")).to_path_buf())
            .unwrap_or_else(|_| PathBuf::from("."));
        exe_dir.join("config.toml")
    }

    /// Valida a configuração e retorna lista de erros.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        let conn = &self.connection;
        let sensors = &self.sensors;

        if conn.host.trim().is_empty() {
            errors.push("Host do hub não pode ser vazio".into());
        }
        if conn.port == 0 {
            errors.push("Porta do hub não pode ser 0".into());
        }
        if !(conn.reconnect_delay_secs.is_finite() && conn.reconnect_delay_secs >= 0.0) {
            errors.push(format!(
                "Atraso de reconexão inválido: {}",
                conn.reconnect_delay_secs
            ));
        }
        if !(conn.connect_timeout_secs.is_finite() && conn.connect_timeout_secs > 0.0) {
            errors.push(format!(
                "Timeout de conexão inválido: {}",
                conn.connect_timeout_secs
            ));
        }
        if conn.read_timeout_ms == 0 {
            errors.push("Timeout de leitura não pode ser 0".into());
        }
        if sensors.count == 0 {
            errors.push("Quantidade de sensores não pode ser 0".into());
        }
        if !(sensors.supply_voltage.is_finite() && sensors.supply_voltage > 0.0) {
            errors.push(format!(
                "Tensão de alimentação inválida: {}",
                sensors.supply_voltage
            ));
        }
        if sensors.max_code == 0 {
            errors.push("Código máximo do ADC não pode ser 0".into());
        }
        if !sensors.stale_after_secs.is_finite() || sensors.stale_after_secs < 0.0 {
            errors.push(format!(
                "Tempo de staleness inválido: {}",
                sensors.stale_after_secs
            ));
        }

        let probe = EntityRegistry::new(0, sensors.sensor_spec());
        if let Err(e) = probe.validate_thresholds(sensors.default_dry_threshold, sensors.default_wet_threshold) {
            errors.push(format!("Thresholds padrão inválidos: {e}"));
        }
        for ov in &self.entities {
            if ov.index >= sensors.count {
                errors.push(format!(
                    "Ajuste para entidade {} fora da faixa (0–{})",
                    ov.index,
                    sensors.count.saturating_sub(1)
                ));
            }
        }

        errors
    }

    /// Configuração padrão de uma entidade, sem os ajustes individuais.
    fn base_entity(&self, index: usize) -> EntityConfig {
        EntityConfig {
            dry_threshold: self.sensors.default_dry_threshold,
            wet_threshold: self.sensors.default_wet_threshold,
            update_interval_hint: self.sensors.update_interval_secs,
            display_name: default_name(index),
        }
    }

    /// Monta o registro de entidades com defaults e ajustes aplicados.
    ///
    /// Ajustes inválidos são ignorados com aviso.
    pub fn build_registry(&self) -> EntityRegistry {
        let mut registry =
            EntityRegistry::with_defaults(self.sensors.count, self.sensors.sensor_spec(), |i| self.base_entity(i));

        for ov in &self.entities {
            if let Some(name) = &ov.name {
                if let Err(e) = registry.update_name(ov.index, name) {
                    warn!("Nome ignorado para entidade {}: {e}", ov.index);
                }
            }
            if ov.dry_threshold.is_some() || ov.wet_threshold.is_some() {
                let Some(current) = registry.get(ov.index).map(|e| e.config.clone()) else {
                    warn!("Ajuste ignorado: entidade {} inexistente", ov.index);
                    continue;
                };
                let dry = ov.dry_threshold.unwrap_or(current.dry_threshold);
                let wet = ov.wet_threshold.unwrap_or(current.wet_threshold);
                if let Err(e) = registry.update_thresholds(ov.index, dry, wet) {
                    warn!("Thresholds ignorados para entidade {}: {e}", ov.index);
                }
            }
        }

        registry
    }
}
