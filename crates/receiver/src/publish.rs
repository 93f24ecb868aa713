//! Estado publicado para a camada de apresentação.
//!
//! [`Monitor`] guarda o registro de entidades atrás de um lock e, a cada
//! mudança (frame aplicado, edição, transição de conexão), gera um
//! [`MonitorSnapshot`] imutável. Consumidores leem o último snapshot ou
//! assinam um channel; nunca enxergam um frame aplicado pela metade.
//!
//! Assinantes lentos perdem snapshots intermediários, nunca o mais recente:
//! com o buffer cheio, o mais antigo é descartado para abrir espaço.

use chrono::{DateTime, Utc};
use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use moisture_core::alerts::{Alert, alert_names, evaluate_alerts};
use moisture_core::protocol::DecodedFrame;
use moisture_core::registry::{EntityRegistry, FrameOutcome, ValidationError};
use moisture_core::types::{ConnectionState, Entity};
use serde::Serialize;
use std::ops::Deref;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tracing::{debug, info};

/// Buffer de cada assinante.
pub const SUBSCRIBER_BUFFER: usize = 64;

/// Visão consistente do monitor em um instante.
#[derive(Debug, Clone, Serialize)]
pub struct MonitorSnapshot {
    pub connection: ConnectionState,
    pub entities: Vec<Entity>,
    /// Entidades que precisam de rega, em ordem de índice
    pub alerts: Vec<Alert>,
    pub frames_decoded: u64,
    /// Frames descartados por JSON inválido ou buffer estourado
    pub frames_rejected: u64,
    /// Chaves ignoradas dentro de frames válidos
    pub keys_skipped: u64,
    pub published_at: DateTime<Utc>,
}

impl MonitorSnapshot {
    /// Nomes exibidos das entidades em alerta.
    pub fn alert_names(&self) -> Vec<String> {
        alert_names(&self.alerts)
    }
}

/// Canal de snapshots de um assinante.
///
/// Derefs para o `Receiver`; ao ser dropado o assinante é removido.
pub struct Subscription {
    rx: Receiver<Arc<MonitorSnapshot>>,
    _alive: Arc<()>,
}

impl Deref for Subscription {
    type Target = Receiver<Arc<MonitorSnapshot>>;

    fn deref(&self) -> &Self::Target {
        &self.rx
    }
}

struct Subscriber {
    tx: Sender<Arc<MonitorSnapshot>>,
    /// Ponta de leitura usada para descartar o snapshot mais antigo
    oldest: Receiver<Arc<MonitorSnapshot>>,
    alive: Weak<()>,
}

impl Subscriber {
    /// Entrega o snapshot, descartando o mais antigo se o buffer estiver cheio.
    fn deliver(&self, snapshot: &Arc<MonitorSnapshot>) -> bool {
        if self.alive.strong_count() == 0 {
            return false;
        }
        let mut msg = Arc::clone(snapshot);
        loop {
            match self.tx.try_send(msg) {
                Ok(()) => return true,
                Err(TrySendError::Full(back)) => {
                    debug!("Assinante lento, descartando snapshot antigo");
                    let _ = self.oldest.try_recv();
                    msg = back;
                }
                Err(TrySendError::Disconnected(_)) => return false,
            }
        }
    }
}

struct Inner {
    registry: EntityRegistry,
    connection: ConnectionState,
    frames_decoded: u64,
    frames_rejected: u64,
    keys_skipped: u64,
    latest: Arc<MonitorSnapshot>,
    subscribers: Vec<Subscriber>,
}

impl Inner {
    fn build_snapshot(&self) -> MonitorSnapshot {
        let entities = self.registry.entities().to_vec();
        let alerts = evaluate_alerts(&entities, self.registry.sensor().supply_voltage);
        MonitorSnapshot {
            connection: self.connection.clone(),
            entities,
            alerts,
            frames_decoded: self.frames_decoded,
            frames_rejected: self.frames_rejected,
            keys_skipped: self.keys_skipped,
            published_at: Utc::now(),
        }
    }

    /// Recalcula o snapshot completo e entrega aos assinantes.
    fn publish(&mut self) {
        let snapshot = Arc::new(self.build_snapshot());
        self.latest = Arc::clone(&snapshot);

        self.subscribers.retain(|sub| sub.deliver(&snapshot));
    }
}

/// Handle compartilhado do estado do monitor.
#[derive(Clone)]
pub struct Monitor {
    inner: Arc<Mutex<Inner>>,
}

impl Monitor {
    pub fn new(registry: EntityRegistry) -> Self {
        let mut inner = Inner {
            registry,
            connection: ConnectionState::Disconnected,
            frames_decoded: 0,
            frames_rejected: 0,
            keys_skipped: 0,
            latest: Arc::new(MonitorSnapshot {
                connection: ConnectionState::Disconnected,
                entities: Vec::new(),
                alerts: Vec::new(),
                frames_decoded: 0,
                frames_rejected: 0,
                keys_skipped: 0,
                published_at: Utc::now(),
            }),
            subscribers: Vec::new(),
        };
        inner.latest = Arc::new(inner.build_snapshot());
        Self {
            inner: Arc::new(Mutex::new(inner)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Último snapshot publicado.
    pub fn snapshot(&self) -> Arc<MonitorSnapshot> {
        Arc::clone(&self.lock().latest)
    }

    /// Assina os próximos snapshots.
    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = bounded(SUBSCRIBER_BUFFER);
        let alive = Arc::new(());
        self.lock().subscribers.push(Subscriber {
            tx,
            oldest: rx.clone(),
            alive: Arc::downgrade(&alive),
        });
        Subscription { rx, _alive: alive }
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.lock().connection.clone()
    }

    // ── Edições do usuário ──

    pub fn update_thresholds(&self, index: usize, dry: f32, wet: f32) -> Result<(), ValidationError> {
        self.edit(|reg| reg.update_thresholds(index, dry, wet))
    }

    pub fn update_thresholds_text(&self, index: usize, dry: &str, wet: &str) -> Result<(), ValidationError> {
        self.edit(|reg| reg.update_thresholds_text(index, dry, wet))
    }

    pub fn update_name(&self, index: usize, name: &str) -> Result<(), ValidationError> {
        self.edit(|reg| reg.update_name(index, name))
    }

    fn edit(
        &self,
        apply: impl FnOnce(&mut EntityRegistry) -> Result<(), ValidationError>,
    ) -> Result<(), ValidationError> {
        let mut inner = self.lock();
        apply(&mut inner.registry)?;
        inner.publish();
        Ok(())
    }

    // ── Usados pelo cliente de telemetria ──

    /// Troca o estado da conexão, publicando apenas se mudou.
    pub(crate) fn set_connection(&self, state: ConnectionState) {
        let mut inner = self.lock();
        if inner.connection == state {
            return;
        }
        info!("Conexão: {}", state.describe());
        inner.connection = state;
        inner.publish();
    }

    /// Aplica todas as tensões de um frame e só então republica.
    pub(crate) fn apply_frame(&self, frame: &DecodedFrame) -> FrameOutcome {
        let mut inner = self.lock();
        let outcome = inner.registry.apply_frame(frame, Utc::now());
        inner.frames_decoded += 1;
        inner.keys_skipped += (frame.skipped + outcome.out_of_range) as u64;
        inner.publish();
        outcome
    }

    pub(crate) fn record_rejected_frame(&self) {
        let mut inner = self.lock();
        inner.frames_rejected += 1;
        inner.publish();
    }

    /// Marca entidades sem leitura há mais de `max_age` como desconectadas.
    pub(crate) fn expire_stale(&self, max_age: Duration) -> usize {
        let Ok(max_age) = chrono::Duration::from_std(max_age) else {
            return 0;
        };
        let mut inner = self.lock();
        let changed = inner.registry.mark_stale(Utc::now() - max_age);
        if changed > 0 {
            info!("{changed} sensor(es) sem leitura há mais de {}s", max_age.num_seconds());
            inner.publish();
        }
        changed
    }
}
