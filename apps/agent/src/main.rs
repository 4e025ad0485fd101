// [apps/agent/src/main.rs]
/*!
 * =================================================================
 * APARATO: SCAN AGENT SHELL (V3.0 - SOLDIER SHELL)
 * CLASIFICACIÓN: APPLICATION LAYER (ENTRY POINT)
 * RESPONSABILIDAD: BOOTSTRAP DE ENTORNO E IGNICIÓN DEL MOTOR
 *
 * # Mathematical Proof (Deterministic Init):
 * El nodo solo inicia si la sinapsis con el sistema de archivos y el
 * entorno de red es estable. El uso de Arc<AtomicBool> asegura que la
 * señal de apagado se propague sin condiciones de carrera entre hilos.
 * =================================================================
 */

use anyhow::{Context, Result};
use clap::Parser;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::{info, warn};

// --- SINAPSIS CON LA LIBRERÍA LOCAL Y DOMINIO ---
use neoscan_agent_lib::engine::{AgentEngine, AgentEngineSettings};
use neoscan_infra_agent_client::MasterClient;

/**
 * Directivas de mando para el nodo de reconocimiento.
 * Configuración inyectada vía CLI o variables de entorno.
 */
#[derive(Parser, Debug)]
#[command(
    author = "NeoScan Core Team",
    version = "3.0",
    about = "NeoScan Sovereign Reconnaissance Node"
)]
struct SovereignAgentDirectives {
    /// Endpoint central del Master.
    #[arg(long, env = "MASTER_URL")]
    master_endpoint: String,

    /// Hostname físico declarado en el registro de flota.
    #[arg(long, env = "AGENT_HOSTNAME")]
    hostname: String,

    /// Dirección IP anunciada al Master.
    #[arg(long, env = "AGENT_IP", default_value = "127.0.0.1")]
    advertised_ip: String,

    /// Puerto de servicio que sella la identidad física.
    #[arg(long, env = "AGENT_PORT", default_value_t = 9000)]
    service_port: u16,

    /// Proxy SOCKS5 opcional para los dials de escaneo.
    #[arg(long, env = "SOCKS5_PROXY")]
    socks5_proxy: Option<String>,

    /// Conexiones TCP simultáneas por defecto del escáner.
    #[arg(long, env = "SCANNER_DEFAULT_RATE", default_value_t = 100)]
    default_scan_rate: u32,

    /// Directorio de caché local (identidad + snapshot de reglas).
    #[arg(long, env = "AGENT_CACHE_DIRECTORY", default_value = "agent_cache")]
    cache_directory: String,

    /// Intervalo de sincronía del snapshot de reglas.
    #[arg(long, env = "RULE_REFRESH_INTERVAL_SECONDS", default_value_t = 300)]
    rule_refresh_interval_seconds: u64,

    /// Clave pre-compartida que verifica los bundles firmados.
    #[arg(long, env = "NEOSCAN_RULE_ENCRYPTION_KEY", default_value = "neoscan-default-rule-key")]
    rule_encryption_key: String,

    /// Intervalo del pulso de vida hacia el Master.
    #[arg(long, env = "HEARTBEAT_INTERVAL_SECONDS", default_value_t = 30)]
    heartbeat_interval_seconds: u64,

    /// Intervalo de drenado de la cola de tareas.
    #[arg(long, env = "QUEUE_POLL_INTERVAL_SECONDS", default_value_t = 5)]
    queue_poll_interval_seconds: u64,
}

/**
 * Punto de ignición del binario del agente.
 *
 * # Errors:
 * - `IO_FAULT`: Si el sistema no puede reclamar el directorio de caché.
 * - `IDENTITY_COLLISION`: Si la identidad física ya está tomada.
 */
#[tokio::main]
async fn main() -> Result<()> {
    // 1. INICIALIZACIÓN DEL SISTEMA DE OBSERVABILIDAD
    tracing_subscriber::fmt::init();

    info!("💠 [SHELL]: Global initiation sequence V3.0 starting...");

    // 2. PARSEO DE DIRECTIVAS ESTRATÉGICAS
    let agent_directives = SovereignAgentDirectives::parse();

    // 3. PREPARACIÓN DEL ESTRATO DE PERSISTENCIA LOCAL
    let local_cache_directory = PathBuf::from(&agent_directives.cache_directory);
    if !local_cache_directory.exists() {
        fs::create_dir_all(&local_cache_directory)
            .context("IO_FAULT: Unable to claim local cache directory.")?;
        info!("📂 [SHELL]: Local cache strata materialized.");
    }

    // 4. PROTOCOLO DE SEÑALES DE SISTEMA (Terminación Ordenada)
    let termination_signal_atomic = Arc::new(AtomicBool::new(false));
    let signal_flag_reference = Arc::clone(&termination_signal_atomic);

    tokio::spawn(async move {
        if (tokio::signal::ctrl_c().await).is_ok() {
            warn!("⚠️ [SIGNAL]: Termination requested by host. Sealing current strata...");
            signal_flag_reference.store(true, std::sync::atomic::Ordering::SeqCst);
        }
    });

    // 5. CONSTRUCCIÓN DEL ENLACE TÁCTICO (UPLINK)
    let master_uplink = Arc::new(MasterClient::new(
        agent_directives.master_endpoint.clone(),
        env!("CARGO_PKG_VERSION"),
    ));

    // 6. INSTANCIACIÓN E IGNICIÓN DEL MOTOR DEL AGENTE
    let engine_settings = AgentEngineSettings {
        master_endpoint: agent_directives.master_endpoint,
        hostname: agent_directives.hostname,
        advertised_ip: agent_directives.advertised_ip,
        service_port: agent_directives.service_port,
        socks5_proxy: agent_directives.socks5_proxy,
        default_scan_rate: agent_directives.default_scan_rate,
        local_cache_directory,
        rule_refresh_interval_seconds: agent_directives.rule_refresh_interval_seconds,
        rule_encryption_key: agent_directives.rule_encryption_key,
        heartbeat_interval_seconds: agent_directives.heartbeat_interval_seconds,
        queue_poll_interval_seconds: agent_directives.queue_poll_interval_seconds,
        agent_version: env!("CARGO_PKG_VERSION").to_string(),
    };

    let sovereign_engine_instance = AgentEngine::new(
        master_uplink,
        termination_signal_atomic,
        engine_settings,
    );

    info!("🚀 [SHELL]: Handing control to AgentEngine. Transitioning to OPERATIONAL.");
    sovereign_engine_instance.ignite_sovereign_operations().await?;

    // 7. CIERRE DETERMINISTA
    info!("🏁 [SHELL]: Shutdown sequence concluded. Sovereign node offline.");
    Ok(())
}
