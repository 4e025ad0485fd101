// [apps/master/src/services/mod.rs]
/**
 * =================================================================
 * APARATO: SERVICE ORCHESTRATION HUB (V4.0 - COMMAND ENABLED)
 * CLASIFICACIÓN: APPLICATION SERVICES (ESTRATO L4)
 * RESPONSABILIDAD: EXPOSICIÓN NOMINAL DE DAEMONS Y MOTORES
 *
 * VISION HIPER-HOLÍSTICA:
 * Actúa como la central de registro de la inteligencia del Master.
 * 1. MODULARIDAD: Cada servicio opera como una unidad atómica aislada.
 * 2. LOOP DISCIPLINE: Ningún daemon deja escapar pánicos ni errores
 *    fuera de su iteración; el proceso jamás colapsa por un tick.
 * =================================================================
 */

pub mod dispatcher;
pub mod liveness;
pub mod policy_gate;
pub mod scheduler;
pub mod snapshot;
pub mod system_worker;

// --- RE-EXPORTACIONES SOBERANAS (NOMINAL ACCESS) ---

pub use dispatcher::TaskDispatchService;
pub use liveness::spawn_liveness_daemon;
pub use policy_gate::PolicyEnforcer;
pub use scheduler::WorkflowSchedulerService;
pub use snapshot::SnapshotAssemblyService;
pub use system_worker::SystemTaskWorker;
