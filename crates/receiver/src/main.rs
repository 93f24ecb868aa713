//! # Moisture Receiver
//!
//! Monitor de umidade em modo console. Conecta ao hub de sensores via TCP,
//! reconecta sozinho após falhas e registra no log as mudanças de conexão e
//! a lista de plantas que precisam de rega.
//!
//! ## Uso
//! ```bash
//! moisture_receiver                    # config.toml ao lado do executável
//! moisture_receiver /etc/moisture.toml # config explícito
//! ```

use moisture_core::config::AppConfig;
use moisture_receiver::{ClientSettings, Monitor, TcpConnector, TelemetryClient};
use std::path::PathBuf;
use tracing::{error, info, warn};

fn main() {
    // ── Logging ──
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    // ── Config ──
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(AppConfig::default_path);
    let config = AppConfig::load(&config_path);

    // Salva config padrão se não existir
    if !config_path.exists() {
        if let Err(e) = config.save(&config_path) {
            warn!("Não foi possível salvar config padrão: {e}");
        }
    }

    for problem in config.validate() {
        warn!("Config: {problem}");
    }

    // ── Monitor + cliente ──
    let monitor = Monitor::new(config.build_registry());
    let connector = TcpConnector::from_config(&config.connection);
    let mut client = TelemetryClient::new(connector, monitor.clone(), ClientSettings::from_config(&config));
    let updates = monitor.subscribe();

    // ── Banner ──
    println!();
    println!("══════════════════════════════════════════════");
    println!("   🌱 MOISTURE RECEIVER – ATIVO");
    println!("══════════════════════════════════════════════");
    println!("  Hub:       {}", config.connection.endpoint());
    println!("  Sensores:  {}", config.sensors.count);
    println!("  Reconexão: {:.1}s", config.connection.reconnect_delay_secs);
    println!("══════════════════════════════════════════════");
    println!();

    if let Err(e) = client.start() {
        error!("Falha ao iniciar cliente de telemetria: {e}");
        std::process::exit(1);
    }

    // ── Loop principal ──
    // Transições de conexão já são logadas pelo Monitor
    let mut last_alerts: Vec<String> = Vec::new();

    for snapshot in updates.iter() {
        let alerts = snapshot.alert_names();
        if alerts != last_alerts {
            if alerts.is_empty() {
                info!("Nenhuma planta precisa de rega");
            } else {
                warn!("Precisam de rega ({}): {}", alerts.len(), alerts.join(", "));
            }
            last_alerts = alerts;
        }
    }

    // Encerra a thread do cliente antes de sair
    client.stop();
}
