//! Agregação de alertas – entidades que precisam de rega.

use crate::classifier::{Classification, classify};
use crate::types::Entity;
use serde::{Deserialize, Serialize};

/// Uma entidade em estado de alerta.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub index: usize,
    pub name: String,
    pub voltage: f32,
    pub classification: Classification,
}

/// Classifica a leitura atual de uma entidade com os thresholds dela.
pub fn classify_entity(entity: &Entity, max_voltage: f32) -> Classification {
    classify(
        entity.reading.voltage,
        entity.config.dry_threshold,
        entity.config.wet_threshold,
        max_voltage,
    )
}

/// Recalcula o conjunto completo de alertas, na ordem dos índices.
///
/// Entidades sem leitura (ou marcadas como desconectadas) não geram alerta.
pub fn evaluate_alerts(entities: &[Entity], max_voltage: f32) -> Vec<Alert> {
    entities
        .iter()
        .filter(|e| e.reading.connected)
        .filter_map(|e| {
            let classification = classify_entity(e, max_voltage);
            classification.needs_attention.then(|| Alert {
                index: e.index,
                name: e.config.display_name.clone(),
                voltage: e.reading.voltage,
                classification,
            })
        })
        .collect()
}

/// Nomes exibidos das entidades em alerta.
pub fn alert_names(alerts: &[Alert]) -> Vec<String> {
    alerts.iter().map(|a| a.name.clone()).collect()
}
