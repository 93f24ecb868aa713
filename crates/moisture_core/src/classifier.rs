//! Classificação de umidade em três faixas.
//!
//! A escala normalizada (0–100) é dividida em sub-faixas disjuntas para que
//! a posição na barra já indique a categoria:
//!
//! ```text
//! 0 ─── DRY ─── 20 ────── OK ────── 80 ─── WET ─── 100
//! ```

use serde::{Deserialize, Serialize};

/// Limite superior da faixa DRY na escala normalizada.
pub const DRY_BAND_END: f32 = 20.0;
/// Limite superior da faixa OK na escala normalizada.
pub const OK_BAND_END: f32 = 80.0;
pub const SCALE_MAX: f32 = 100.0;

/// Categoria de umidade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MoistureStatus {
    Dry,
    Ok,
    Wet,
}

impl MoistureStatus {
    /// Texto de status exibido ao usuário.
    pub fn label(self) -> &'static str {
        match self {
            MoistureStatus::Dry => "DRY - WATER NEEDED!",
            MoistureStatus::Ok => "PERFECT",
            MoistureStatus::Wet => "TOO WET",
        }
    }
}

/// Resultado da classificação.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub status: MoistureStatus,
    /// Valor para barra de progresso, sempre em `[0, 100]`
    pub normalized: f32,
    pub needs_attention: bool,
}

/// Classifica uma tensão contra os thresholds da entidade.
///
/// Função pura: não falha para nenhuma entrada. Divisões por faixas vazias
/// (`dry == 0`, `wet == max_voltage`, `dry == wet`) caem no limite da faixa.
pub fn classify(voltage: f32, dry_threshold: f32, wet_threshold: f32, max_voltage: f32) -> Classification {
    let (status, raw) = if voltage < dry_threshold {
        let value = if dry_threshold == 0.0 {
            0.0
        } else {
            (voltage / dry_threshold) * DRY_BAND_END
        };
        (MoistureStatus::Dry, value)
    } else if voltage > wet_threshold {
        let span = max_voltage - wet_threshold;
        let value = if span <= 0.0 {
            SCALE_MAX
        } else {
            OK_BAND_END + ((voltage - wet_threshold) / span) * (SCALE_MAX - OK_BAND_END)
        };
        (MoistureStatus::Wet, value)
    } else {
        let span = wet_threshold - dry_threshold;
        let value = if span <= 0.0 {
            DRY_BAND_END
        } else {
            DRY_BAND_END + ((voltage - dry_threshold) / span) * (OK_BAND_END - DRY_BAND_END)
        };
        (MoistureStatus::Ok, value)
    };

    Classification {
        status,
        normalized: clamp_scale(raw),
        needs_attention: status == MoistureStatus::Dry,
    }
}

fn clamp_scale(value: f32) -> f32 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, SCALE_MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAX: f32 = 3.3;

    fn sweep() -> impl Iterator<Item = f32> {
        (0..=66).map(|i| i as f32 * 0.05)
    }

    #[test]
    fn below_dry_needs_attention() {
        for v in sweep().filter(|v| *v < 1.5) {
            let c = classify(v, 1.5, 2.5, MAX);
            assert_eq!(c.status, MoistureStatus::Dry, "v = {v}");
            assert!(c.needs_attention);
            assert!(c.normalized < DRY_BAND_END);
        }
    }

    #[test]
    fn above_wet_is_wet() {
        for v in sweep().filter(|v| *v > 2.5) {
            let c = classify(v, 1.5, 2.5, MAX);
            assert_eq!(c.status, MoistureStatus::Wet, "v = {v}");
            assert!(!c.needs_attention);
            assert!(c.normalized >= OK_BAND_END);
        }
    }

    #[test]
    fn between_thresholds_is_ok() {
        for v in [1.5, 1.8, 2.0, 2.5] {
            let c = classify(v, 1.5, 2.5, MAX);
            assert_eq!(c.status, MoistureStatus::Ok, "v = {v}");
            assert!(!c.needs_attention);
            assert!((DRY_BAND_END..=OK_BAND_END).contains(&c.normalized));
        }
    }

    #[test]
    fn band_edges_map_to_breakpoints() {
        assert_eq!(classify(1.5, 1.5, 2.5, MAX).normalized, 20.0);
        assert_eq!(classify(2.5, 1.5, 2.5, MAX).normalized, 80.0);
        assert_eq!(classify(MAX, 1.5, 2.5, MAX).normalized, 100.0);
        assert_eq!(classify(0.0, 1.5, 2.5, MAX).normalized, 0.0);
    }

    #[test]
    fn zero_dry_threshold_does_not_divide_by_zero() {
        let c = classify(-0.2, 0.0, 2.5, MAX);
        assert_eq!(c.status, MoistureStatus::Dry);
        assert_eq!(c.normalized, 0.0);
    }

    #[test]
    fn wet_threshold_at_supply_voltage_stays_in_scale() {
        let c = classify(3.4, 1.5, MAX, MAX);
        assert_eq!(c.status, MoistureStatus::Wet);
        assert_eq!(c.normalized, 100.0);
    }

    #[test]
    fn normalized_always_in_scale() {
        let thresholds = [(0.0, 0.5), (0.0, MAX), (1.5, 2.5), (3.0, MAX), (1.0, 1.0)];
        for (dry, wet) in thresholds {
            for v in sweep().chain([-5.0, 10.0, f32::MAX, f32::MIN]) {
                let n = classify(v, dry, wet, MAX).normalized;
                assert!((0.0..=100.0).contains(&n), "v={v} dry={dry} wet={wet} n={n}");
            }
        }
    }

    #[test]
    fn labels_match_status() {
        assert_eq!(MoistureStatus::Dry.label(), "DRY - WATER NEEDED!");
        assert_eq!(MoistureStatus::Ok.label(), "PERFECT");
        assert_eq!(MoistureStatus::Wet.label(), "TOO WET");
    }
}
