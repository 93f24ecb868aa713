//! Registro de entidades de tamanho fixo.
//!
//! Guarda configuração e última leitura de cada sensor. O número de
//! entidades é definido na construção e nunca muda.

use crate::protocol::DecodedFrame;
use crate::types::{Entity, EntityConfig, Reading, SensorSpec};
use chrono::{DateTime, Utc};
use tracing::debug;

/// Erros de validação nas edições do registro.
///
/// Toda edição rejeitada deixa o registro intacto.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("Entidade {index} inexistente (total: {count})")]
    IndexOutOfRange { index: usize, count: usize },

    #[error("Threshold seco ({dry}) deve ser menor que o úmido ({wet})")]
    InvertedThresholds { dry: f32, wet: f32 },

    #[error("Threshold {value} fora da faixa do sensor (0–{max})")]
    ThresholdOutOfRange { value: f32, max: f32 },

    #[error("Valor numérico inválido: {0:?}")]
    NotANumber(String),

    #[error("Nome não pode ser vazio")]
    EmptyName,

    #[error("Tensão não finita: {0}")]
    NonFiniteVoltage(f32),
}

/// Resultado da aplicação de um frame no registro.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameOutcome {
    pub applied: usize,
    /// Índices fora do registro
    pub out_of_range: usize,
}

/// Tabela fixa de entidades monitoradas.
#[derive(Debug, Clone)]
pub struct EntityRegistry {
    sensor: SensorSpec,
    entities: Vec<Entity>,
}

impl EntityRegistry {
    /// Cria `count` entidades com nomes posicionais e thresholds padrão.
    pub fn new(count: usize, sensor: SensorSpec) -> Self {
        Self::with_defaults(count, sensor, EntityConfig::positional)
    }

    /// Cria `count` entidades a partir de uma fábrica de configuração.
    pub fn with_defaults(count: usize, sensor: SensorSpec, make: impl Fn(usize) -> EntityConfig) -> Self {
        let entities = (0..count)
            .map(|index| Entity {
                index,
                config: make(index),
                reading: Reading::default(),
            })
            .collect();
        Self { sensor, entities }
    }

    pub fn sensor(&self) -> SensorSpec {
        self.sensor
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Entity> {
        self.entities.get(index)
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    fn entity_mut(&mut self, index: usize) -> Result<&mut Entity, ValidationError> {
        let count = self.entities.len();
        self.entities
            .get_mut(index)
            .ok_or(ValidationError::IndexOutOfRange { index, count })
    }

    // ── Leituras ──

    /// Sobrescreve a leitura da entidade com o horário atual.
    pub fn update_reading(&mut self, index: usize, voltage: f32) -> Result<(), ValidationError> {
        self.update_reading_at(index, voltage, Utc::now())
    }

    /// Sobrescreve a leitura da entidade com um horário explícito.
    pub fn update_reading_at(
        &mut self,
        index: usize,
        voltage: f32,
        at: DateTime<Utc>,
    ) -> Result<(), ValidationError> {
        if !voltage.is_finite() {
            return Err(ValidationError::NonFiniteVoltage(voltage));
        }
        let raw_code = self.sensor.raw_code(voltage);
        let entity = self.entity_mut(index)?;
        entity.reading = Reading {
            voltage,
            raw_code,
            last_update: Some(at),
            connected: true,
        };
        Ok(())
    }

    /// Aplica todas as tensões de um frame decodificado, entidade a entidade.
    ///
    /// Entidades ausentes do frame não são alteradas.
    pub fn apply_frame(&mut self, frame: &DecodedFrame, at: DateTime<Utc>) -> FrameOutcome {
        let mut outcome = FrameOutcome::default();
        for (&index, &voltage) in &frame.voltages {
            match self.update_reading_at(index, voltage, at) {
                Ok(()) => outcome.applied += 1,
                Err(e) => {
                    debug!("Leitura ignorada: {e}");
                    outcome.out_of_range += 1;
                }
            }
        }
        outcome
    }

    /// Marca como desconectadas as entidades sem leitura desde `cutoff`.
    ///
    /// Retorna quantas entidades mudaram de estado.
    pub fn mark_stale(&mut self, cutoff: DateTime<Utc>) -> usize {
        let mut changed = 0;
        for entity in &mut self.entities {
            let reading = &mut entity.reading;
            if reading.connected && reading.last_update.is_some_and(|t| t < cutoff) {
                reading.connected = false;
                changed += 1;
            }
        }
        changed
    }

    // ── Edições de configuração ──

    /// Valida um par de thresholds contra a faixa do sensor.
    pub fn validate_thresholds(&self, dry: f32, wet: f32) -> Result<(), ValidationError> {
        for value in [dry, wet] {
            if !self.sensor.in_range(value) {
                return Err(ValidationError::ThresholdOutOfRange {
                    value,
                    max: self.sensor.supply_voltage,
                });
            }
        }
        if dry >= wet {
            return Err(ValidationError::InvertedThresholds { dry, wet });
        }
        Ok(())
    }

    pub fn update_thresholds(&mut self, index: usize, dry: f32, wet: f32) -> Result<(), ValidationError> {
        self.validate_thresholds(dry, wet)?;
        let entity = self.entity_mut(index)?;
        entity.config.dry_threshold = dry;
        entity.config.wet_threshold = wet;
        Ok(())
    }

    /// Igual a [`update_thresholds`](Self::update_thresholds), mas a partir de texto digitado.
    pub fn update_thresholds_text(&mut self, index: usize, dry: &str, wet: &str) -> Result<(), ValidationError> {
        let dry = parse_voltage(dry)?;
        let wet = parse_voltage(wet)?;
        self.update_thresholds(index, dry, wet)
    }

    pub fn update_name(&mut self, index: usize, name: &str) -> Result<(), ValidationError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ValidationError::EmptyName);
        }
        let entity = self.entity_mut(index)?;
        entity.config.display_name = name.to_string();
        Ok(())
    }
}

/// Converte texto em tensão, aceitando vírgula decimal.
pub fn parse_voltage(text: &str) -> Result<f32, ValidationError> {
    let normalized = text.trim().replace(',', ".");
    normalized
        .parse::<f32>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| ValidationError::NotANumber(text.to_string()))
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn registry(count: usize) -> EntityRegistry {
        EntityRegistry::new(count, SensorSpec::default())
    }

    #[test]
    fn new_registry_has_positional_entities() {
        let reg = registry(40);
        assert_eq!(reg.len(), 40);
        assert_eq!(reg.get(0).unwrap().config.display_name, "Plant 1");
        assert_eq!(reg.get(39).unwrap().config.display_name, "Plant 40");
        assert!(reg.entities().iter().all(|e| !e.reading.connected));
    }

    #[test]
    fn update_reading_stores_voltage_and_raw_code() {
        let mut reg = registry(3);
        reg.update_reading(1, 1.8).unwrap();
        let reading = &reg.get(1).unwrap().reading;
        assert_eq!(reading.voltage, 1.8);
        assert_eq!(reading.raw_code, (1.8f32 * 1023.0 / 3.3).round() as u16);
        assert!(reading.connected);
        assert!(reading.last_update.is_some());
    }

    #[test]
    fn update_reading_rejects_unknown_index() {
        let mut reg = registry(3);
        assert_eq!(
            reg.update_reading(3, 1.0),
            Err(ValidationError::IndexOutOfRange { index: 3, count: 3 })
        );
    }

    #[test]
    fn apply_frame_leaves_missing_entities_untouched() {
        let mut reg = registry(3);
        let now = Utc::now();
        reg.update_reading_at(0, 2.0, now).unwrap();

        let mut frame = DecodedFrame::default();
        frame.voltages.insert(1, 1.1);
        frame.voltages.insert(7, 1.1);
        let outcome = reg.apply_frame(&frame, now);

        assert_eq!(outcome, FrameOutcome { applied: 1, out_of_range: 1 });
        assert_eq!(reg.get(0).unwrap().reading.voltage, 2.0);
        assert_eq!(reg.get(1).unwrap().reading.voltage, 1.1);
        assert!(!reg.get(2).unwrap().reading.connected);
    }

    #[test]
    fn thresholds_update_is_idempotent() {
        let mut reg = registry(2);
        reg.update_thresholds(0, 1.2, 2.8).unwrap();
        let once = reg.get(0).unwrap().clone();
        reg.update_thresholds(0, 1.2, 2.8).unwrap();
        assert_eq!(reg.get(0).unwrap(), &once);
    }

    #[test]
    fn inverted_thresholds_are_rejected() {
        let mut reg = registry(2);
        let before = reg.get(0).unwrap().config.clone();
        assert_eq!(
            reg.update_thresholds(0, 2.0, 1.0),
            Err(ValidationError::InvertedThresholds { dry: 2.0, wet: 1.0 })
        );
        assert!(reg.update_thresholds(0, 1.5, 1.5).is_err());
        assert_eq!(reg.get(0).unwrap().config, before);
    }

    #[test]
    fn out_of_range_thresholds_are_rejected() {
        let mut reg = registry(2);
        assert!(matches!(
            reg.update_thresholds(0, -0.1, 2.0),
            Err(ValidationError::ThresholdOutOfRange { .. })
        ));
        assert!(matches!(
            reg.update_thresholds(0, 1.0, 3.4),
            Err(ValidationError::ThresholdOutOfRange { .. })
        ));
        assert!(reg.update_thresholds(0, 0.0, 3.3).is_ok());
    }

    #[test]
    fn text_thresholds_are_parsed() {
        let mut reg = registry(1);
        reg.update_thresholds_text(0, " 1,2 ", "2.9").unwrap();
        let cfg = &reg.get(0).unwrap().config;
        assert_eq!(cfg.dry_threshold, 1.2);
        assert_eq!(cfg.wet_threshold, 2.9);

        assert_eq!(
            reg.update_thresholds_text(0, "abc", "2.0"),
            Err(ValidationError::NotANumber("abc".into()))
        );
        assert_eq!(reg.get(0).unwrap().config.dry_threshold, 1.2);
    }

    #[test]
    fn names_are_trimmed_and_validated() {
        let mut reg = registry(2);
        reg.update_name(1, "  Basil ").unwrap();
        assert_eq!(reg.get(1).unwrap().config.display_name, "Basil");
        assert_eq!(reg.update_name(1, "   "), Err(ValidationError::EmptyName));
        assert_eq!(reg.get(1).unwrap().config.display_name, "Basil");
    }

    #[test]
    fn stale_entities_are_marked_disconnected() {
        let mut reg = registry(2);
        let now = Utc::now();
        reg.update_reading_at(0, 1.0, now - Duration::seconds(30)).unwrap();
        reg.update_reading_at(1, 1.0, now).unwrap();

        assert_eq!(reg.mark_stale(now - Duration::seconds(10)), 1);
        assert!(!reg.get(0).unwrap().reading.connected);
        assert!(reg.get(1).unwrap().reading.connected);
        assert_eq!(reg.mark_stale(now - Duration::seconds(10)), 0);
    }
}
