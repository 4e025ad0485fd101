// [apps/master/src/kernel.rs]
/**
 * =================================================================
 * APARATO: MASTER SOVEREIGN KERNEL (V4.4 - FLEET IGNITION)
 * CLASIFICACIÓN: COMPOSITION ROOT (ESTRATO L1-APP)
 * RESPONSABILIDAD: BOOTSTRAP DE INFRAESTRUCTURA E IGNICIÓN SEGURA
 *
 * VISION HIPER-HOLÍSTICA:
 * Actúa como la placa base donde se conectan todos los servicios:
 * catálogo de capacidades, hidratación y sellado del snapshot de
 * reglas, daemons autónomos (planificador, vitalidad, worker de
 * sistema) y finalmente el transporte HTTP.
 * =================================================================
 */

use crate::config::MasterConfig;
use crate::routes::create_master_router;
use crate::services::{
    spawn_liveness_daemon, SnapshotAssemblyService, SystemTaskWorker, WorkflowSchedulerService,
};
use crate::state::AppState;
use neoscan_infra_db::StoreClient;
use std::net::{IpAddr, SocketAddr};
use tracing::{error, info, instrument, warn};

/// Catálogo inicial de capacidades de la plataforma.
const CAPABILITY_SEED: &[(&str, &str, &[&str])] = &[
    (
        "portscan",
        "Escaneo TCP de puertos con detección de servicios",
        &["portscan", "nmap"],
    ),
    (
        "webfingerprint",
        "Identificación de activos y tecnologías web",
        &["webfingerprint", "webscan"],
    ),
    (
        "subdomain",
        "Enumeración de subdominios del alcance",
        &["subdomain_enum"],
    ),
];

pub struct MasterKernel {
    pub application_state: AppState,
}

impl MasterKernel {
    /**
     * Realiza la ignición del cliente de persistencia y el estado.
     * Establece la conexión a la base ANTES de levantar servicios.
     */
    #[instrument(skip(config))]
    pub async fn ignite(config: MasterConfig) -> Self {
        let database_client = StoreClient::connect(
            &config.database_url,
            config.database_token.clone(),
        )
        .await
        .expect("FATAL: Database link collapse. Ignition aborted.");

        Self {
            application_state: AppState::new(database_client, config),
        }
    }

    /**
     * Lanza todas las operaciones autónomas del centro de mando y el
     * servidor HTTP principal. Bloquea hasta el colapso del proceso.
     */
    pub async fn launch_sovereign_operations(self) {
        let shared_application_state = self.application_state.clone();
        let listen_port = shared_application_state.config.listen_port;

        // --- 1. SIEMBRA DEL CATÁLOGO DE CAPACIDADES ---
        for (capability_name, description, tool_names) in CAPABILITY_SEED {
            if let Err(seed_fault) = shared_application_state
                .agent_repository
                .seed_capability(capability_name, description, tool_names)
                .await
            {
                warn!("⚠️ [KERNEL]: Capability '{}' seed incomplete: {}", capability_name, seed_fault);
            }
        }

        // --- 2. HIDRATACIÓN Y SELLADO DEL SNAPSHOT DE REGLAS ---
        let assembly_service = SnapshotAssemblyService::new(shared_application_state.clone());
        if let Err(hydration_fault) = assembly_service.hydrate_rules_from_disk().await {
            warn!("⚠️ [KERNEL]: Rule hydration incomplete: {}", hydration_fault);
        }
        if let Err(seal_fault) = assembly_service.rebuild_and_publish().await {
            warn!("⚠️ [KERNEL]: Initial snapshot seal incomplete: {}", seal_fault);
        }

        // --- 3. DESPLIEGUE DE DAEMONS AUTÓNOMOS ---

        // A. Planificador de workflows (materialización + veto + despacho)
        WorkflowSchedulerService::new(shared_application_state.clone()).spawn_scheduler_daemon();

        // B. Worker de herramientas de sistema (sys_*)
        SystemTaskWorker::new(shared_application_state.clone()).spawn_worker_daemon();

        // C. Vitalidad de flota (sellado offline + purga de radar)
        spawn_liveness_daemon(shared_application_state.clone());

        // --- 4. IGNICIÓN DEL TRANSPORTE HTTP (AXUM) ---
        let master_router = create_master_router(shared_application_state);

        let bind_address = SocketAddr::new(
            "0.0.0.0".parse::<IpAddr>().expect("FATAL: Invalid bind address."),
            listen_port,
        );

        info!("🚀 [KERNEL_ONLINE]: Sovereign Command Center listening at {}", bind_address);

        let tcp_listener = tokio::net::TcpListener::bind(bind_address)
            .await
            .expect("CRITICAL_FAULT: Failed to bind network port.");

        if let Err(server_error) = axum::serve(tcp_listener, master_router).await {
            error!("💀 [KERNEL_COLLAPSE]: Runtime failure: {}", server_error);
            std::process::exit(1);
        }
    }
}
