//! Protocolo de entrada do hub de sensores.
//!
//! Cada frame é um objeto JSON com uma tensão por sensor:
//!
//! ```text
//! {"entity_0": 1.82, "entity_1": 2.41, ...}
//! ```
//!
//! O hub não delimita mensagens; o TCP pode entregar um objeto partido em
//! vários chunks ou vários objetos no mesmo chunk. [`FrameBuffer`] acumula
//! os bytes e extrai cada objeto completo (com ou sem `\n` entre eles).
//!
//! A decodificação é tolerante: chaves fora do padrão ou valores não
//! numéricos são contados em [`DecodedFrame::skipped`] e ignorados.

use serde_json::Value;
use std::collections::BTreeMap;

/// Prefixo das chaves de sensor.
pub const ENTITY_KEY_PREFIX: &str = "entity_";

/// Limite de bytes acumulados sem completar um frame.
pub const MAX_BUFFERED_BYTES: usize = 64 * 1024;

/// Erros do protocolo. Nunca derrubam a conexão.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ProtocolError {
    #[error("Frame não é um objeto JSON")]
    NotAnObject,

    #[error("Frame malformado: {0}")]
    Malformed(String),

    #[error("Buffer excedeu {0} bytes sem completar um frame")]
    FrameTooLarge(usize),
}

/// Mapeamento parcial índice → tensão extraído de um frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedFrame {
    pub voltages: BTreeMap<usize, f32>,
    /// Chaves descartadas (padrão inválido, valor não numérico ou não finito)
    pub skipped: usize,
}

impl DecodedFrame {
    pub fn is_empty(&self) -> bool {
        self.voltages.is_empty()
    }
}

/// Extrai o índice de uma chave `entity_<n>`.
pub fn parse_entity_key(key: &str) -> Option<usize> {
    let digits = key.strip_prefix(ENTITY_KEY_PREFIX)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Decodifica um buffer contendo exatamente um objeto JSON.
pub fn decode_frame(data: &[u8]) -> Result<DecodedFrame, ProtocolError> {
    let value: Value =
        serde_json::from_slice(data).map_err(|e| ProtocolError::Malformed(e.to_string()))?;
    decode_value(value)
}

fn decode_value(value: Value) -> Result<DecodedFrame, ProtocolError> {
    let Value::Object(map) = value else {
        return Err(ProtocolError::NotAnObject);
    };

    let mut frame = DecodedFrame::default();
    for (key, value) in map {
        let voltage = value.as_f64().map(|v| v as f32).filter(|v| v.is_finite());
        match (parse_entity_key(&key), voltage) {
            (Some(index), Some(voltage)) => {
                frame.voltages.insert(index, voltage);
            }
            _ => frame.skipped += 1,
        }
    }
    Ok(frame)
}

// ──────────────────────────────────────────────
// Buffer de stream
// ──────────────────────────────────────────────

enum Step {
    Frame(Value, usize),
    Invalid(String),
    Incomplete,
}

/// Acumula chunks do stream e entrega frames completos.
pub struct FrameBuffer {
    buf: Vec<u8>,
    limit: usize,
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self::with_limit(MAX_BUFFERED_BYTES)
    }

    pub fn with_limit(limit: usize) -> Self {
        Self {
            buf: Vec::new(),
            limit,
        }
    }

    /// Bytes pendentes aguardando o fim de um objeto.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    /// Descarta qualquer frame parcial (usado ao reconectar).
    pub fn clear(&mut self) {
        self.buf.clear();
    }

    /// Adiciona um chunk e retorna o resultado de cada objeto completado.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Result<DecodedFrame, ProtocolError>> {
        self.buf.extend_from_slice(chunk);
        let mut results = Vec::new();

        loop {
            // Ressincroniza no próximo '{'
            let start = self.buf.iter().position(|&b| b == b'{');
            let junk_end = start.unwrap_or(self.buf.len());
            if self.buf[..junk_end].iter().any(|b| !b.is_ascii_whitespace()) {
                results.push(Err(ProtocolError::Malformed(format!(
                    "{junk_end} bytes fora de um objeto"
                ))));
            }
            self.buf.drain(..junk_end);
            if self.buf.is_empty() {
                break;
            }

            let step = {
                let mut stream = serde_json::Deserializer::from_slice(&self.buf).into_iter::<Value>();
                match stream.next() {
                    Some(Ok(value)) => Step::Frame(value, stream.byte_offset()),
                    Some(Err(e)) if e.is_eof() => Step::Incomplete,
                    Some(Err(e)) => Step::Invalid(e.to_string()),
                    None => Step::Incomplete,
                }
            };

            match step {
                Step::Frame(value, consumed) => {
                    self.buf.drain(..consumed);
                    results.push(decode_value(value));
                }
                Step::Invalid(reason) => {
                    // Descarta o objeto quebrado até o próximo '{'
                    let next = self.buf[1..]
                        .iter()
                        .position(|&b| b == b'{')
                        .map_or(self.buf.len(), |p| p + 1);
                    self.buf.drain(..next);
                    results.push(Err(ProtocolError::Malformed(reason)));
                }
                Step::Incomplete => break,
            }
        }

        if self.buf.len() > self.limit {
            self.buf.clear();
            results.push(Err(ProtocolError::FrameTooLarge(self.limit)));
        }

        results
    }
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────
