// [apps/agent/src/tools/mod.rs]
/*!
 * =================================================================
 * APARATO: SCAN TOOL REGISTRY (V3.2 - TABLE DISPATCH)
 * CLASIFICACIÓN: WORKER EXECUTION LAYER (ESTRATO L1-WORKER)
 * RESPONSABILIDAD: DESPACHO NOMINAL DE HERRAMIENTAS DE ESCANEO
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. TABLE LOOKUP: Las herramientas viven en una tabla nominal
 *    nombre -> manejador; jamás reflexión.
 * 2. SHARED CONTEXT: Cada ejecución recibe el marcador inyectado
 *    (proxy + ráfaga + plazos), la señal de cancelación y el plazo
 *    derivado de la etapa.
 * =================================================================
 */

pub mod port_service;

use futures::future::BoxFuture;
use neoscan_core_probe::dialer::Dialer;
use neoscan_core_probe::engine::ProbeEngineConfig;
use neoscan_domain_models::task::AgentTask;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tokio::time::Instant;

/// Contexto de ejecución entregado a cada herramienta.
#[derive(Clone)]
pub struct ToolExecutionContext {
    pub task: AgentTask,
    /// Marcador compartido del nodo (SOCKS5, ráfaga, timeouts).
    pub dialer: Arc<Dialer>,
    /// Configuración del motor de huellas para service_detect.
    pub probe_config: ProbeEngineConfig,
    /// Señal de terminación ordenada del nodo.
    pub termination_signal: Arc<AtomicBool>,
    /// Plazo absoluto de la tarea (derivado de la etapa).
    pub deadline: Instant,
    /// Tasa de conexiones por defecto cuando la tarea no la fija.
    pub default_rate: u32,
}

/// Manejador de una herramienta de escaneo (despacho por tabla).
pub type ScanToolHandler =
    fn(ToolExecutionContext) -> BoxFuture<'static, anyhow::Result<Value>>;

/// Tabla nominal de herramientas soportadas por este nodo.
pub struct ScanToolRegistry {
    tool_table: HashMap<&'static str, ScanToolHandler>,
}

impl Default for ScanToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ScanToolRegistry {
    pub fn new() -> Self {
        let mut tool_table: HashMap<&'static str, ScanToolHandler> = HashMap::new();
        tool_table.insert("portscan", port_service::execute_port_service_scan);
        Self { tool_table }
    }

    /// Nombres de capacidad que este nodo declara en su registro.
    pub fn declared_capabilities(&self) -> Vec<String> {
        let mut capability_names: Vec<String> =
            self.tool_table.keys().map(|name| name.to_string()).collect();
        capability_names.sort();
        capability_names
    }

    pub fn resolve(&self, tool_name: &str) -> Option<ScanToolHandler> {
        self.tool_table.get(tool_name).copied()
    }
}
