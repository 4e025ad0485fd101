// [apps/agent/src/monitor.rs]
/**
 * =================================================================
 * APARATO: HEURISTIC SYSTEM MONITOR (V3.1 - SOBERANO)
 * CLASIFICACIÓN: WORKER INFRASTRUCTURE (ESTRATO L1-WORKER)
 * RESPONSABILIDAD: TELEMETRÍA DE SILICIO CON ADAPTACIÓN VIRTUAL
 *
 * # Logic:
 * En infraestructuras efímeras el acceso a sensores suele estar
 * capado por el hipervisor. Este aparato:
 * 1. Lee los pseudo-archivos de /proc (loadavg, meminfo).
 * 2. Proyecta la carga a porcentaje sobre los núcleos físicos.
 * 3. Degrada a cero cuando el descriptor no existe, jamás a pánico.
 *
 * # Performance:
 * Complejidad O(1). Las lecturas de /proc son pseudo-archivos en
 * memoria con impacto despreciable sobre el bucle de escaneo.
 * =================================================================
 */

use chrono::Utc;
use neoscan_domain_models::agent::{AgentMetricsSnapshot, WorkStatus};
use std::fs;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

/// Contadores vivos del nodo compartidos con el motor de misiones.
#[derive(Default)]
pub struct NodeCounters {
    pub running_tasks: AtomicU32,
    pub completed_tasks: AtomicU64,
    pub failed_tasks: AtomicU64,
    pub network_bytes_sent: AtomicU64,
    pub network_bytes_received: AtomicU64,
}

pub struct SystemMonitor;

impl SystemMonitor {
    /**
     * Captura instantánea de las constantes vitales del nodo.
     */
    #[must_use]
    pub fn capture_snapshot(
        agent_id: &str,
        counters: &Arc<NodeCounters>,
        active_scan_type: Option<String>,
    ) -> AgentMetricsSnapshot {
        let running_tasks = counters.running_tasks.load(Ordering::Relaxed);

        AgentMetricsSnapshot {
            agent_id: agent_id.to_string(),
            cpu_usage_percent: Self::read_cpu_usage_percent(),
            memory_usage_percent: Self::read_memory_usage_percent(),
            disk_usage_percent: Self::read_disk_usage_percent(),
            network_bytes_sent: counters.network_bytes_sent.load(Ordering::Relaxed),
            network_bytes_received: counters.network_bytes_received.load(Ordering::Relaxed),
            running_tasks,
            completed_tasks: counters.completed_tasks.load(Ordering::Relaxed),
            failed_tasks: counters.failed_tasks.load(Ordering::Relaxed),
            work_status: if running_tasks > 0 {
                WorkStatus::Working
            } else {
                WorkStatus::Idle
            },
            scan_type: active_scan_type,
            captured_at: Utc::now(),
        }
    }

    /**
     * Proyección de la carga de 1 minuto sobre los núcleos físicos,
     * acotada a [0,100].
     */
    fn read_cpu_usage_percent() -> f64 {
        let load_average = fs::read_to_string("/proc/loadavg")
            .unwrap_or_default()
            .split_whitespace()
            .next()
            .and_then(|value| value.parse::<f64>().ok())
            .unwrap_or(0.0);

        let core_count = num_cpus::get().max(1) as f64;
        ((load_average / core_count) * 100.0).clamp(0.0, 100.0)
    }

    /**
     * Ocupación de RAM por sustracción diferencial (Total - Disponible).
     */
    fn read_memory_usage_percent() -> f64 {
        let Ok(meminfo_content) = fs::read_to_string("/proc/meminfo") else {
            return 0.0;
        };

        let mut memory_total_kb = 0u64;
        let mut memory_available_kb = 0u64;
        for line in meminfo_content.lines() {
            if line.starts_with("MemTotal:") {
                memory_total_kb = Self::parse_kilobyte_value(line);
            }
            if line.starts_with("MemAvailable:") {
                memory_available_kb = Self::parse_kilobyte_value(line);
            }
        }

        if memory_total_kb == 0 {
            return 0.0;
        }
        let occupied_kb = memory_total_kb.saturating_sub(memory_available_kb);
        ((occupied_kb as f64 / memory_total_kb as f64) * 100.0).clamp(0.0, 100.0)
    }

    /**
     * Ocupación de disco del volumen de caché. Sin statvfs en la
     * librería estándar la métrica llega por variable de entorno del
     * supervisor del nodo; ausente, degrada a 0.
     */
    fn read_disk_usage_percent() -> f64 {
        std::env::var("AGENT_DISK_USAGE_PERCENT")
            .ok()
            .and_then(|raw| raw.parse::<f64>().ok())
            .map(|value| value.clamp(0.0, 100.0))
            .unwrap_or(0.0)
    }

    fn parse_kilobyte_value(line: &str) -> u64 {
        line.split_whitespace()
            .nth(1)
            .and_then(|value| value.parse::<u64>().ok())
            .unwrap_or(0)
    }
}
