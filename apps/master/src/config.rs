// [apps/master/src/config.rs]
/*!
 * =================================================================
 * APARATO: MASTER STRATEGIC CONFIGURATION (V4.1 - ENV CAPTURE)
 * CLASIFICACIÓN: APPLICATION SHELL (ESTRATO L3)
 * RESPONSABILIDAD: CAPTURA Y NORMALIZACIÓN DE DIRECTIVAS DE ENTORNO
 *
 * # Logic:
 * Toda opción reconocida posee un default operativo sano; solo
 * DATABASE_URL es imperativa y su ausencia aborta la ignición.
 * =================================================================
 */

use std::env;

/// Configuración estratégica completa del Master.
#[derive(Debug, Clone)]
pub struct MasterConfig {
    /// Puerto TCP de escucha del API.
    pub listen_port: u16,
    /// URL del motor libSQL (local, memoria o remoto).
    pub database_url: String,
    /// Token de acceso para despliegues remotos.
    pub database_token: Option<String>,
    /// Intervalo del tick del planificador de workflows.
    pub scheduler_interval_seconds: u64,
    /// Umbral de silencio de latidos antes de sellar 'offline'.
    pub liveness_timeout_seconds: i64,
    /// Intervalo del worker de herramientas de sistema.
    pub system_worker_interval_seconds: u64,
    /// Directorio de reglas de huellas para la hidratación inicial.
    pub rule_path: String,
    /// Clave pre-compartida que firma los bundles distribuidos.
    pub rule_encryption_key: String,
    /// Ámbito de aplicación de la lista blanca (None = global).
    pub whitelist_scope: Option<String>,
    /// Ámbito de aplicación de las políticas de omisión (None = global).
    pub skip_policy_scope: Option<String>,
    /// Tope de tareas simultáneas por agente para la elegibilidad.
    pub agent_capacity_limit: u32,
}

impl MasterConfig {
    /**
     * Hidrata la configuración desde el entorno del proceso.
     *
     * # Panics:
     * Aborta la ignición si DATABASE_URL no está definida.
     */
    pub fn from_environment() -> Self {
        Self {
            listen_port: parse_env("PORT", 3000),
            database_url: env::var("DATABASE_URL")
                .expect("CRITICAL_FAULT: DATABASE_URL not defined in runtime environment."),
            database_token: env::var("DATABASE_AUTH_TOKEN").ok(),
            scheduler_interval_seconds: parse_env("NEOSCAN_SCHEDULER_INTERVAL_SECONDS", 1),
            liveness_timeout_seconds: parse_env("NEOSCAN_LIVENESS_TIMEOUT_SECONDS", 90),
            system_worker_interval_seconds: parse_env("NEOSCAN_SYSTEM_WORKER_INTERVAL_SECONDS", 5),
            rule_path: env::var("NEOSCAN_RULE_PATH").unwrap_or_else(|_| "rules".to_string()),
            rule_encryption_key: env::var("NEOSCAN_RULE_ENCRYPTION_KEY")
                .unwrap_or_else(|_| "neoscan-default-rule-key".to_string()),
            whitelist_scope: env::var("NEOSCAN_WHITELIST_SCOPE").ok(),
            skip_policy_scope: env::var("NEOSCAN_SKIP_POLICY_SCOPE").ok(),
            agent_capacity_limit: parse_env("NEOSCAN_AGENT_CAPACITY_LIMIT", 5),
        }
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, default_value: T) -> T {
    env::var(key)
        .ok()
        .and_then(|raw_value| raw_value.parse::<T>().ok())
        .unwrap_or(default_value)
}
