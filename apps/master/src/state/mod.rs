// [apps/master/src/state/mod.rs]
/*!
 * =================================================================
 * APARATO: SOVEREIGN STATE ORCHESTRATOR (V4.2 - FLEET HUB)
 * CLASIFICACIÓN: APPLICATION STATE (ESTRATO L1-APP)
 * RESPONSABILIDAD: ORQUESTACIÓN DE REPOSITORIOS, TELEMETRÍA Y SNAPSHOT
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. COMPOSITION ROOT: Centraliza los repositorios de autoridad única
 *    y los gestores de estado caliente compartidos por handlers y
 *    daemons.
 * 2. HOT STATE DISCIPLINE: La telemetría de flota y el snapshot
 *    firmado viven en RAM detrás de cerrojos de lectura/escritura;
 *    el motor libSQL permanece como única verdad durable.
 * =================================================================
 */

pub mod fleet_telemetry;

use crate::config::MasterConfig;
use crate::services::snapshot::SignedSnapshot;
use neoscan_infra_db::repositories::{
    AgentRepository, PolicyRepository, ProjectRepository, RuleRepository, TagRepository,
    TaskRepository,
};
use neoscan_infra_db::StoreClient;
use std::sync::{Arc, RwLock};
use tracing::debug;

/**
 * Contenedor de estado compartido (Thread-Safe) del Master.
 * Actúa como la placa base donde se conectan todos los estratos.
 */
#[derive(Clone)]
pub struct AppState {
    /// Cliente del grafo de activos (única verdad durable).
    pub database_client: StoreClient,
    /// Configuración estratégica inmutable del proceso.
    pub config: Arc<MasterConfig>,

    // --- REPOSITORIOS DE AUTORIDAD ÚNICA ---
    pub agent_repository: Arc<AgentRepository>,
    pub task_repository: Arc<TaskRepository>,
    pub project_repository: Arc<ProjectRepository>,
    pub policy_repository: Arc<PolicyRepository>,
    pub tag_repository: Arc<TagRepository>,
    pub rule_repository: Arc<RuleRepository>,

    // --- ESTADO CALIENTE EN RAM ---
    /// Radar de latidos vivos de la flota (buffer write-behind).
    pub fleet_telemetry: Arc<fleet_telemetry::FleetTelemetryManager>,
    /// Snapshot firmado vigente de reglas (publish-then-swap).
    pub snapshot_store: Arc<RwLock<Option<Arc<SignedSnapshot>>>>,
}

impl AppState {
    /**
     * Forja una nueva instancia del Estado Maestro inyectando todas
     * las dependencias desde el cliente de persistencia.
     */
    pub fn new(database_client: StoreClient, config: MasterConfig) -> Self {
        debug!("🧬 [APP_STATE]: Executing sovereign ignition sequence V4.2...");

        Self {
            agent_repository: Arc::new(AgentRepository::new(database_client.clone())),
            task_repository: Arc::new(TaskRepository::new(database_client.clone())),
            project_repository: Arc::new(ProjectRepository::new(database_client.clone())),
            policy_repository: Arc::new(PolicyRepository::new(database_client.clone())),
            tag_repository: Arc::new(TagRepository::new(database_client.clone())),
            rule_repository: Arc::new(RuleRepository::new(database_client.clone())),
            fleet_telemetry: Arc::new(fleet_telemetry::FleetTelemetryManager::new()),
            snapshot_store: Arc::new(RwLock::new(None)),
            database_client,
            config: Arc::new(config),
        }
    }

    /// Puntero al snapshot firmado vigente, si ya fue cristalizado.
    pub fn current_snapshot(&self) -> Option<Arc<SignedSnapshot>> {
        self.snapshot_store
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Publica un snapshot recién sellado reemplazando el vigente.
    pub fn publish_snapshot(&self, fresh_snapshot: SignedSnapshot) {
        let mut store_guard = self
            .snapshot_store
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *store_guard = Some(Arc::new(fresh_snapshot));
    }
}
