// [apps/agent/src/engine.rs]
/*!
 * =================================================================
 * APARATO: ADAPTIVE AGENT ENGINE (V3.5 - FLEET SOLDIER)
 * CLASIFICACIÓN: WORKER EXECUTION LAYER (ESTRATO L1-WORKER)
 * RESPONSABILIDAD: REGISTRO, LATIDOS, COLA DE TAREAS Y SINCRONÍA
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. STABLE IDENTITY: El agent_id asignado por el Master se ancla en
 *    disco; un re-arranque reutiliza la identidad y jamás re-registra.
 * 2. PARALLEL DAEMONS: Latidos y sincronía de reglas laten en hilos
 *    propios; el bucle principal drena y ejecuta la cola de tareas.
 * 3. GRACEFUL SEAL: La señal de terminación aborta el trabajo en
 *    vuelo y los resultados parciales ya reportados permanecen.
 * =================================================================
 */

use crate::monitor::{NodeCounters, SystemMonitor};
use crate::tools::{ScanToolRegistry, ToolExecutionContext};
use chrono::Utc;
use neoscan_core_probe::cache::{database_from_file, publish_database};
use neoscan_core_probe::dialer::{Dialer, DialerConfig};
use neoscan_core_probe::engine::ProbeEngineConfig;
use neoscan_core_probe::parser::parse_probe_database;
use neoscan_domain_models::agent::{AgentRegistrationRequest, AgentStatus, HeartbeatSignal};
use neoscan_domain_models::task::{AgentTask, TaskResultReport, TaskStatus};
use neoscan_infra_agent_client::{MasterClient, RuleSnapshotSynchronizer, SnapshotRefresh, UplinkError};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, error, info, instrument, warn};

/// Nombre del ancla de identidad dentro del directorio de caché.
const IDENTITY_ANCHOR_FILENAME: &str = "agent.identity";
/// Plazo de tarea por defecto cuando la etapa no lo porta.
const DEFAULT_TASK_TIMEOUT_SECONDS: u64 = 3600;

/// Directivas operativas completas del nodo.
#[derive(Debug, Clone)]
pub struct AgentEngineSettings {
    pub master_endpoint: String,
    pub hostname: String,
    pub advertised_ip: String,
    pub service_port: u16,
    pub socks5_proxy: Option<String>,
    pub default_scan_rate: u32,
    pub local_cache_directory: PathBuf,
    pub rule_refresh_interval_seconds: u64,
    pub rule_encryption_key: String,
    pub heartbeat_interval_seconds: u64,
    pub queue_poll_interval_seconds: u64,
    pub agent_version: String,
}

pub struct AgentEngine {
    master_uplink: Arc<MasterClient>,
    settings: AgentEngineSettings,
    termination_signal: Arc<AtomicBool>,
    node_counters: Arc<NodeCounters>,
    tool_registry: Arc<ScanToolRegistry>,
    network_dialer: Arc<Dialer>,
}

impl AgentEngine {
    pub fn new(
        master_uplink: Arc<MasterClient>,
        termination_signal: Arc<AtomicBool>,
        settings: AgentEngineSettings,
    ) -> Self {
        let network_dialer = Arc::new(Dialer::new(DialerConfig {
            socks5_proxy: settings.socks5_proxy.clone(),
            connect_timeout: Duration::from_secs(5),
            rate_per_second: Some(settings.default_scan_rate.max(1)),
        }));

        Self {
            master_uplink,
            settings,
            termination_signal,
            node_counters: Arc::new(NodeCounters::default()),
            tool_registry: Arc::new(ScanToolRegistry::new()),
            network_dialer,
        }
    }

    /**
     * Secuencia de ignición completa del nodo: identidad, daemons y
     * bucle principal de misiones. Bloquea hasta la señal de cierre.
     */
    #[instrument(skip(self), fields(hostname = %self.settings.hostname))]
    pub async fn ignite_sovereign_operations(&self) -> anyhow::Result<()> {
        info!("🚀 [ENGINE]: Adaptive ignition sequence V3.5 initialized.");

        // 1. IDENTIDAD ESTABLE (ancla en disco o registro nuevo)
        let agent_identity = self.resolve_sovereign_identity().await?;
        info!("🛰️ [ENGINE]: Operating as unit {}.", agent_identity);

        // 2. CACHÉ LOCAL DE REGLAS (si existe, el motor arranca caliente)
        let rule_cache_path = self.settings.local_cache_directory.join("service-probes.cache");
        if rule_cache_path.exists() {
            match database_from_file(&rule_cache_path) {
                Ok(resident_database) => {
                    info!("🧬 [ENGINE]: Probe cache warm ({} probes).", resident_database.probes.len());
                }
                Err(load_fault) => warn!("⚠️ [ENGINE]: Stale probe cache rejected: {}", load_fault),
            }
        }

        // 3. DAEMON DE LATIDOS (vitalidad + métricas)
        self.spawn_heartbeat_daemon(agent_identity.clone());

        // 4. DAEMON DE SINCRONÍA DE REGLAS (poll firmado + swap)
        self.spawn_rule_sync_daemon(rule_cache_path);

        // 5. BUCLE PRINCIPAL DE MISIONES
        while !self.termination_signal.load(Ordering::SeqCst) {
            match self.master_uplink.pull_task_queue(&agent_identity).await {
                Ok(task_queue) if !task_queue.is_empty() => {
                    for queued_task in task_queue {
                        if self.termination_signal.load(Ordering::SeqCst) {
                            break;
                        }
                        self.execute_task_lifecycle(&agent_identity, queued_task).await;
                    }
                }
                Ok(_) => {
                    sleep(Duration::from_secs(self.settings.queue_poll_interval_seconds)).await;
                }
                Err(uplink_fault) => {
                    debug!("💤 [ENGINE]: Master strata busy; pulsing later. Detail: {}", uplink_fault);
                    sleep(Duration::from_secs(self.settings.queue_poll_interval_seconds.max(5))).await;
                }
            }
        }

        info!("🏁 [ENGINE]: Termination signal honored. Node sealing down.");
        Ok(())
    }

    /**
     * Identidad estable del nodo: ancla en disco, o registro nuevo.
     *
     * # Errors:
     * Una colisión (hostname, port) sin ancla local es irrecuperable:
     * otra instancia posee la identidad física.
     */
    async fn resolve_sovereign_identity(&self) -> anyhow::Result<String> {
        let identity_anchor_path = self
            .settings
            .local_cache_directory
            .join(IDENTITY_ANCHOR_FILENAME);

        if let Ok(anchored_identity) = tokio::fs::read_to_string(&identity_anchor_path).await {
            let trimmed_identity = anchored_identity.trim().to_string();
            if !trimmed_identity.is_empty() {
                return Ok(trimmed_identity);
            }
        }

        let registration_request = AgentRegistrationRequest {
            hostname: self.settings.hostname.clone(),
            ip: self.settings.advertised_ip.clone(),
            port: self.settings.service_port,
            operating_system: Some(std::env::consts::OS.to_string()),
            architecture: Some(std::env::consts::ARCH.to_string()),
            cpu_cores: Some(num_cpus::get() as u32),
            memory_megabytes: None,
            disk_gigabytes: None,
            agent_version: Some(self.settings.agent_version.clone()),
            capabilities: self.tool_registry.declared_capabilities(),
        };

        match self.master_uplink.register(&registration_request).await {
            Ok(receipt) => {
                tokio::fs::create_dir_all(&self.settings.local_cache_directory).await?;
                tokio::fs::write(&identity_anchor_path, receipt.agent_id.as_bytes()).await?;
                Ok(receipt.agent_id)
            }
            Err(UplinkError::AlreadyRegistered) => {
                anyhow::bail!(
                    "IDENTITY_COLLISION: ({}, {}) ya registrado y el ancla local está ausente",
                    self.settings.hostname,
                    self.settings.service_port
                )
            }
            Err(registration_fault) => Err(registration_fault.into()),
        }
    }

    /// Daemon de latidos: vitalidad + instantánea de métricas.
    fn spawn_heartbeat_daemon(&self, agent_identity: String) {
        let uplink_handle = Arc::clone(&self.master_uplink);
        let counters_handle = Arc::clone(&self.node_counters);
        let signal_handle = Arc::clone(&self.termination_signal);
        let beat_interval = Duration::from_secs(self.settings.heartbeat_interval_seconds.max(5));

        tokio::spawn(async move {
            while !signal_handle.load(Ordering::Relaxed) {
                let heartbeat_signal = HeartbeatSignal {
                    agent_id: agent_identity.clone(),
                    status: AgentStatus::Online,
                    metrics: Some(SystemMonitor::capture_snapshot(
                        &agent_identity,
                        &counters_handle,
                        Some("portscan".to_string()),
                    )),
                };

                if let Err(pulse_fault) = uplink_handle.send_heartbeat(&heartbeat_signal).await {
                    warn!("⚠️ [VITALITY]: Pulse rejected: {}", pulse_fault);
                }
                sleep(beat_interval).await;
            }
        });
    }

    /// Daemon de sincronía de reglas: poll firmado + recarga del motor.
    fn spawn_rule_sync_daemon(&self, rule_cache_path: PathBuf) {
        let synchronizer = RuleSnapshotSynchronizer::new(
            Arc::clone(&self.master_uplink),
            rule_cache_path,
            self.settings.rule_encryption_key.clone(),
        );
        let signal_handle = Arc::clone(&self.termination_signal);
        let refresh_interval =
            Duration::from_secs(self.settings.rule_refresh_interval_seconds.max(10));

        tokio::spawn(async move {
            while !signal_handle.load(Ordering::Relaxed) {
                match synchronizer.refresh_once().await {
                    Ok(SnapshotRefresh::Updated { version_hash, bundle_bytes }) => {
                        // Swap caliente: el bundle verificado recarga el motor.
                        match parse_probe_database(&String::from_utf8_lossy(&bundle_bytes)) {
                            Ok(fresh_database) => {
                                publish_database(fresh_database);
                                info!("♻️ [RULE_SYNC]: Engine reloaded at version {}.", version_hash);
                            }
                            Err(parse_fault) => {
                                error!("❌ [RULE_SYNC]: Verified bundle failed to parse: {}", parse_fault);
                            }
                        }
                    }
                    Ok(SnapshotRefresh::Unchanged) => {}
                    Err(sync_fault) => {
                        debug!("💤 [RULE_SYNC]: Refresh deferred: {}", sync_fault);
                    }
                }
                sleep(refresh_interval).await;
            }
        });
    }

    /**
     * Ciclo de vida de una misión: resolver herramienta, ejecutar con
     * plazo y sellar el reporte en el Master.
     */
    #[instrument(skip(self, queued_task), fields(task = %queued_task.task_id, tool = %queued_task.tool_name))]
    async fn execute_task_lifecycle(&self, agent_identity: &str, queued_task: AgentTask) {
        self.node_counters.running_tasks.fetch_add(1, Ordering::Relaxed);

        let timeout_seconds = queued_task.tool_params["timeout_seconds"]
            .as_u64()
            .unwrap_or(DEFAULT_TASK_TIMEOUT_SECONDS);

        let execution_verdict = match self.tool_registry.resolve(&queued_task.tool_name) {
            Some(tool_handler) => {
                let execution_context = ToolExecutionContext {
                    task: queued_task.clone(),
                    dialer: Arc::clone(&self.network_dialer),
                    probe_config: ProbeEngineConfig::default(),
                    termination_signal: Arc::clone(&self.termination_signal),
                    deadline: Instant::now() + Duration::from_secs(timeout_seconds),
                    default_rate: self.settings.default_scan_rate,
                };
                tool_handler(execution_context).await
            }
            None => Err(anyhow::anyhow!(
                "unsupported tool '{}' on this node",
                queued_task.tool_name
            )),
        };

        self.node_counters.running_tasks.fetch_sub(1, Ordering::Relaxed);

        let result_report = match execution_verdict {
            Ok(tool_output) => {
                self.node_counters.completed_tasks.fetch_add(1, Ordering::Relaxed);
                info!("✅ [ENGINE]: Task {} sealed as completed.", queued_task.task_id);
                TaskResultReport {
                    task_id: queued_task.task_id.clone(),
                    agent_id: agent_identity.to_string(),
                    status: TaskStatus::Completed,
                    results: tool_output,
                    error_detail: None,
                    reported_at: Utc::now(),
                }
            }
            Err(execution_fault) => {
                self.node_counters.failed_tasks.fetch_add(1, Ordering::Relaxed);
                warn!("⚠️ [ENGINE]: Task {} collapsed: {}", queued_task.task_id, execution_fault);
                TaskResultReport {
                    task_id: queued_task.task_id.clone(),
                    agent_id: agent_identity.to_string(),
                    status: TaskStatus::Failed,
                    results: Value::Null,
                    error_detail: Some(execution_fault.to_string()),
                    reported_at: Utc::now(),
                }
            }
        };

        if let Err(report_fault) = self.master_uplink.report_task_result(&result_report).await {
            error!("❌ [ENGINE]: Result uplink failed for {}: {}", queued_task.task_id, report_fault);
        }
    }
}
