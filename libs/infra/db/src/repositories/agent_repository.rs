// [libs/infra/db/src/repositories/agent_repository.rs]
/*!
 * =================================================================
 * APARATO: AGENT FLEET REPOSITORY (V3.5 - REGISTRY AUTHORITY)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: IDENTIDAD, VITALIDAD Y ELEGIBILIDAD DE LA FLOTA
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. PHYSICAL IDENTITY: El par (hostname, port) sella la identidad
 *    física; una segunda alta del mismo par aflora AlreadyExists.
 * 2. CAPABILITY GOVERNANCE: Toda capacidad declarada debe existir en
 *    el catálogo soberano; las capacidades se proyectan como etiquetas
 *    raíz con provenance 'agent_capability'.
 * 3. IDEMPOTENT VITALITY: El upsert de métricas está sellado por
 *    agent_id; latidos duplicados convergen al mismo estado.
 * =================================================================
 */

use crate::errors::StoreError;
use crate::repositories::parse_stored_timestamp;
use crate::StoreClient;
use chrono::Utc;
use libsql::{params, Row};
use neoscan_domain_models::agent::{
    AgentMetricsSnapshot, AgentRecord, AgentRegistrationReceipt, AgentRegistrationRequest,
    AgentStatus, CapabilityRecord, WorkStatus,
};
use neoscan_domain_models::tag::TagSource;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Filtro de listado de flota con ejes multi-valor.
#[derive(Debug, Clone, Default)]
pub struct AgentListFilter {
    pub status: Option<AgentStatus>,
    /// Coincidencia parcial sobre agent_id, hostname o ip.
    pub keyword: Option<String>,
    /// Pertenencia a cualquiera de estas etiquetas.
    pub tag_ids: Vec<i64>,
    /// Posesión de cualquiera de estas capacidades (id o nombre).
    pub capabilities: Vec<String>,
    /// Soporte de cualquiera de estas herramientas (eje distinto:
    /// la herramienta se resuelve a su capacidad requerida).
    pub task_support: Vec<String>,
}

/// Candidato elegible para despacho, ya ordenado por carga.
#[derive(Debug, Clone)]
pub struct EligibleAgent {
    pub agent_id: String,
    pub running_tasks: u32,
    pub last_heartbeat: Option<String>,
}

/// Repositorio de autoridad única para el registro de la flota.
pub struct AgentRepository {
    database_client: StoreClient,
}

impl AgentRepository {
    pub fn new(client: StoreClient) -> Self {
        Self {
            database_client: client,
        }
    }

    /**
     * Alta de un agente con identidad física (hostname, port).
     *
     * # Errors:
     * - `StoreError::AlreadyExists`: El par físico ya está registrado.
     * - `StoreError::InvalidCapability`: Capacidad fuera del catálogo.
     */
    #[instrument(skip(self, registration_request), fields(hostname = %registration_request.hostname, port = registration_request.port))]
    pub async fn register(
        &self,
        registration_request: &AgentRegistrationRequest,
    ) -> Result<AgentRegistrationReceipt, StoreError> {
        registration_request
            .validate()
            .map_err(|violation| StoreError::InvalidInput(violation.to_string()))?;

        let database_connection = self.database_client.get_connection()?;

        // 1. Identidad física: colisión de (hostname, port) aflora 409.
        let mut collision_probe = database_connection
            .query(
                "SELECT agent_id FROM agents WHERE hostname = ?1 AND port = ?2",
                params![
                    registration_request.hostname.clone(),
                    registration_request.port as i64
                ],
            )
            .await?;
        if collision_probe.next().await?.is_some() {
            warn!("⛔ [REGISTRY]: Physical identity collision for {}:{}.",
                registration_request.hostname, registration_request.port);
            return Err(StoreError::AlreadyExists);
        }

        // 2. Gobernanza de capacidades contra el catálogo soberano.
        let mut resolved_capability_ids: Vec<i64> = Vec::new();
        for capability_name in &registration_request.capabilities {
            let mut catalog_probe = database_connection
                .query(
                    "SELECT capability_id FROM capabilities WHERE name = ?1",
                    params![capability_name.clone()],
                )
                .await?;
            match catalog_probe.next().await? {
                Some(catalog_row) => resolved_capability_ids.push(catalog_row.get::<i64>(0)?),
                None => {
                    return Err(StoreError::InvalidCapability(capability_name.clone()));
                }
            }
        }

        // 3. Alta del registro soberano.
        let assigned_agent_id = Uuid::new_v4().to_string();
        database_connection
            .execute(
                "INSERT INTO agents (agent_id, hostname, ip, port, operating_system, architecture,
                                     cpu_cores, memory_megabytes, disk_gigabytes, agent_version,
                                     status, last_heartbeat)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, 'online', CURRENT_TIMESTAMP)",
                params![
                    assigned_agent_id.clone(),
                    registration_request.hostname.clone(),
                    registration_request.ip.clone(),
                    registration_request.port as i64,
                    registration_request.operating_system.clone(),
                    registration_request.architecture.clone(),
                    registration_request.cpu_cores.map(|cores| cores as i64),
                    registration_request.memory_megabytes.map(|mb| mb as i64),
                    registration_request.disk_gigabytes.map(|gb| gb as i64),
                    registration_request.agent_version.clone()
                ],
            )
            .await?;

        // 4. Vinculación de capacidades y proyección como etiquetas raíz.
        for (capability_name, capability_id) in registration_request
            .capabilities
            .iter()
            .zip(resolved_capability_ids.iter())
        {
            database_connection
                .execute(
                    "INSERT OR IGNORE INTO agent_capabilities (agent_id, capability_id) VALUES (?1, ?2)",
                    params![assigned_agent_id.clone(), *capability_id],
                )
                .await?;

            let capability_tag_id = self
                .ensure_capability_tag(&database_connection, capability_name)
                .await?;
            database_connection
                .execute(
                    "INSERT OR IGNORE INTO entity_tags (entity_type, entity_id, tag_id, source)
                     VALUES ('agent', ?1, ?2, ?3)",
                    params![
                        assigned_agent_id.clone(),
                        capability_tag_id,
                        TagSource::AgentCapability.as_str()
                    ],
                )
                .await?;
        }

        info!("🛰️ [REGISTRY]: Agent {} enlisted as {}.", registration_request.hostname, assigned_agent_id);
        Ok(AgentRegistrationReceipt {
            agent_id: assigned_agent_id,
            status: "registered".to_string(),
        })
    }

    /// Etiqueta raíz (path "/", level 0) que proyecta una capacidad.
    async fn ensure_capability_tag(
        &self,
        database_connection: &libsql::Connection,
        capability_name: &str,
    ) -> Result<i64, StoreError> {
        let mut tag_probe = database_connection
            .query(
                "SELECT tag_id FROM tags WHERE name = ?1 AND category = 'capability'",
                params![capability_name],
            )
            .await?;
        if let Some(tag_row) = tag_probe.next().await? {
            return Ok(tag_row.get::<i64>(0)?);
        }

        database_connection
            .execute(
                "INSERT INTO tags (name, parent_id, path, level, category)
                 VALUES (?1, NULL, '/', 0, 'capability')",
                params![capability_name],
            )
            .await?;

        let mut created_probe = database_connection
            .query(
                "SELECT tag_id FROM tags WHERE name = ?1 AND category = 'capability'",
                params![capability_name],
            )
            .await?;
        created_probe
            .next()
            .await?
            .ok_or(StoreError::TransactionError)?
            .get::<i64>(0)
            .map_err(StoreError::from)
    }

    /**
     * Recupera el registro completo de un agente con capacidades y etiquetas.
     */
    pub async fn get(&self, agent_id: &str) -> Result<AgentRecord, StoreError> {
        let database_connection = self.database_client.get_connection()?;
        let mut record_probe = database_connection
            .query(
                "SELECT agent_id, hostname, ip, port, operating_system, architecture, cpu_cores,
                        memory_megabytes, disk_gigabytes, agent_version, status, last_heartbeat,
                        token_expiry, group_name, registered_at,
                        (SELECT GROUP_CONCAT(c.name) FROM agent_capabilities ac
                            JOIN capabilities c ON c.capability_id = ac.capability_id
                            WHERE ac.agent_id = agents.agent_id) AS capability_names,
                        (SELECT GROUP_CONCAT(et.tag_id) FROM entity_tags et
                            WHERE et.entity_type = 'agent' AND et.entity_id = agents.agent_id) AS tag_identifiers
                 FROM agents WHERE agent_id = ?1",
                params![agent_id],
            )
            .await?;

        match record_probe.next().await? {
            Some(record_row) => self.map_row_to_agent_record(&record_row),
            None => Err(StoreError::NotFound),
        }
    }

    /**
     * Listado filtrado de la flota. Los filtros multi-valor operan con
     * semántica "cualquiera de"; la paginación se aplica al final.
     */
    #[instrument(skip(self, filter))]
    pub async fn list(
        &self,
        filter: &AgentListFilter,
        page: u32,
        page_size: u32,
    ) -> Result<(Vec<AgentRecord>, u64), StoreError> {
        let database_connection = self.database_client.get_connection()?;
        let mut fleet_probe = database_connection
            .query(
                "SELECT agent_id, hostname, ip, port, operating_system, architecture, cpu_cores,
                        memory_megabytes, disk_gigabytes, agent_version, status, last_heartbeat,
                        token_expiry, group_name, registered_at,
                        (SELECT GROUP_CONCAT(c.name) FROM agent_capabilities ac
                            JOIN capabilities c ON c.capability_id = ac.capability_id
                            WHERE ac.agent_id = agents.agent_id) AS capability_names,
                        (SELECT GROUP_CONCAT(et.tag_id) FROM entity_tags et
                            WHERE et.entity_type = 'agent' AND et.entity_id = agents.agent_id) AS tag_identifiers
                 FROM agents ORDER BY registered_at ASC, agent_id ASC",
                (),
            )
            .await?;

        let mut full_fleet: Vec<AgentRecord> = Vec::new();
        while let Some(fleet_row) = fleet_probe.next().await? {
            full_fleet.push(self.map_row_to_agent_record(&fleet_row)?);
        }

        let tool_capabilities = if filter.task_support.is_empty() {
            Vec::new()
        } else {
            self.resolve_tool_capabilities(&database_connection, &filter.task_support)
                .await?
        };

        let filtered_fleet: Vec<AgentRecord> = full_fleet
            .into_iter()
            .filter(|candidate| self.filter_accepts(filter, &tool_capabilities, candidate))
            .collect();

        let total_matches = filtered_fleet.len() as u64;
        let effective_page_size = page_size.max(1) as usize;
        let window_start = (page.max(1) as usize - 1) * effective_page_size;
        let paginated_window: Vec<AgentRecord> = filtered_fleet
            .into_iter()
            .skip(window_start)
            .take(effective_page_size)
            .collect();

        Ok((paginated_window, total_matches))
    }

    /// Resuelve nombres de herramienta a capacidades del catálogo.
    async fn resolve_tool_capabilities(
        &self,
        database_connection: &libsql::Connection,
        tool_names: &[String],
    ) -> Result<Vec<String>, StoreError> {
        let mut catalog_probe = database_connection
            .query("SELECT name, tool_names FROM capabilities", ())
            .await?;

        let mut covering_capabilities = Vec::new();
        while let Some(catalog_row) = catalog_probe.next().await? {
            let capability_name: String = catalog_row.get(0)?;
            let declared_tools: Option<String> = catalog_row.get(1)?;
            let tool_catalog: Vec<String> = declared_tools
                .unwrap_or_default()
                .split(',')
                .map(|tool| tool.trim().to_string())
                .collect();
            if tool_names
                .iter()
                .any(|requested| tool_catalog.iter().any(|owned| owned == requested))
            {
                covering_capabilities.push(capability_name);
            }
        }
        Ok(covering_capabilities)
    }

    fn filter_accepts(
        &self,
        filter: &AgentListFilter,
        tool_capabilities: &[String],
        candidate: &AgentRecord,
    ) -> bool {
        if let Some(required_status) = filter.status {
            if candidate.status != required_status {
                return false;
            }
        }

        if let Some(keyword) = &filter.keyword {
            let folded_keyword = keyword.to_ascii_lowercase();
            let keyword_hits = candidate.agent_id.to_ascii_lowercase().contains(&folded_keyword)
                || candidate.hostname.to_ascii_lowercase().contains(&folded_keyword)
                || candidate.ip.to_ascii_lowercase().contains(&folded_keyword);
            if !keyword_hits {
                return false;
            }
        }

        if !filter.tag_ids.is_empty()
            && !filter
                .tag_ids
                .iter()
                .any(|requested| candidate.tag_ids.contains(requested))
        {
            return false;
        }

        if !filter.capabilities.is_empty()
            && !filter
                .capabilities
                .iter()
                .any(|requested| candidate.capabilities.iter().any(|owned| owned == requested))
        {
            return false;
        }

        if !filter.task_support.is_empty()
            && !tool_capabilities
                .iter()
                .any(|required| candidate.capabilities.iter().any(|owned| owned == required))
        {
            return false;
        }

        true
    }

    /**
     * Transición administrativa o de latido del estado del agente.
     */
    pub async fn update_status(
        &self,
        agent_id: &str,
        next_status: AgentStatus,
    ) -> Result<(), StoreError> {
        let database_connection = self.database_client.get_connection()?;
        let affected_rows = database_connection
            .execute(
                "UPDATE agents SET status = ?2 WHERE agent_id = ?1",
                params![agent_id, next_status.as_str()],
            )
            .await?;
        if affected_rows == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    /**
     * Baja definitiva con cascada de capacidades, métricas y etiquetas.
     */
    #[instrument(skip(self))]
    pub async fn delete(&self, agent_id: &str) -> Result<(), StoreError> {
        let database_connection = self.database_client.get_connection()?;
        let affected_rows = database_connection
            .execute("DELETE FROM agents WHERE agent_id = ?1", params![agent_id])
            .await?;
        if affected_rows == 0 {
            return Err(StoreError::NotFound);
        }

        database_connection
            .execute(
                "DELETE FROM agent_capabilities WHERE agent_id = ?1",
                params![agent_id],
            )
            .await?;
        database_connection
            .execute(
                "DELETE FROM agent_metrics WHERE agent_id = ?1",
                params![agent_id],
            )
            .await?;
        database_connection
            .execute(
                "DELETE FROM entity_tags WHERE entity_type = 'agent' AND entity_id = ?1",
                params![agent_id],
            )
            .await?;

        info!("🗑️ [REGISTRY]: Agent {} decommissioned with full cascade.", agent_id);
        Ok(())
    }

    /**
     * Ingesta de un latido: sella last_heartbeat y transiciona estado.
     * 'offline -> online' con cualquier latido válido; 'exception' si
     * el propio agente lo reporta. Un agente en mantenimiento conserva
     * su estado administrativo.
     */
    #[instrument(skip(self), fields(agent = %agent_id))]
    pub async fn touch_heartbeat(
        &self,
        agent_id: &str,
        reported_status: AgentStatus,
    ) -> Result<(), StoreError> {
        let database_connection = self.database_client.get_connection()?;

        let effective_status = match reported_status {
            AgentStatus::Exception => AgentStatus::Exception,
            _ => AgentStatus::Online,
        };

        let affected_rows = database_connection
            .execute(
                "UPDATE agents
                 SET last_heartbeat = CURRENT_TIMESTAMP,
                     status = CASE WHEN status = 'maintenance' THEN status ELSE ?2 END
                 WHERE agent_id = ?1",
                params![agent_id, effective_status.as_str()],
            )
            .await?;

        if affected_rows == 0 {
            return Err(StoreError::NotFound);
        }
        debug!("📡 [VITALITY]: Pulse sealed for unit {}.", agent_id);
        Ok(())
    }

    /**
     * Upsert idempotente de la última instantánea de métricas.
     */
    pub async fn upsert_metrics(
        &self,
        metrics_snapshot: &AgentMetricsSnapshot,
    ) -> Result<(), StoreError> {
        metrics_snapshot
            .validate()
            .map_err(|violation| StoreError::InvalidInput(violation.to_string()))?;

        let database_connection = self.database_client.get_connection()?;
        database_connection
            .execute(
                "INSERT INTO agent_metrics (agent_id, cpu_usage_percent, memory_usage_percent,
                        disk_usage_percent, network_bytes_sent, network_bytes_received,
                        running_tasks, completed_tasks, failed_tasks, work_status, scan_type, captured_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
                 ON CONFLICT(agent_id) DO UPDATE SET
                        cpu_usage_percent = excluded.cpu_usage_percent,
                        memory_usage_percent = excluded.memory_usage_percent,
                        disk_usage_percent = excluded.disk_usage_percent,
                        network_bytes_sent = excluded.network_bytes_sent,
                        network_bytes_received = excluded.network_bytes_received,
                        running_tasks = excluded.running_tasks,
                        completed_tasks = excluded.completed_tasks,
                        failed_tasks = excluded.failed_tasks,
                        work_status = excluded.work_status,
                        scan_type = excluded.scan_type,
                        captured_at = excluded.captured_at",
                params![
                    metrics_snapshot.agent_id.clone(),
                    metrics_snapshot.cpu_usage_percent,
                    metrics_snapshot.memory_usage_percent,
                    metrics_snapshot.disk_usage_percent,
                    metrics_snapshot.network_bytes_sent as i64,
                    metrics_snapshot.network_bytes_received as i64,
                    metrics_snapshot.running_tasks as i64,
                    metrics_snapshot.completed_tasks as i64,
                    metrics_snapshot.failed_tasks as i64,
                    metrics_snapshot.work_status.as_str(),
                    metrics_snapshot.scan_type.clone(),
                    metrics_snapshot.captured_at.to_rfc3339()
                ],
            )
            .await?;
        Ok(())
    }

    /**
     * Última instantánea de métricas conocida del agente.
     */
    pub async fn get_metrics(&self, agent_id: &str) -> Result<AgentMetricsSnapshot, StoreError> {
        let database_connection = self.database_client.get_connection()?;
        let mut metrics_probe = database_connection
            .query(
                "SELECT agent_id, cpu_usage_percent, memory_usage_percent, disk_usage_percent,
                        network_bytes_sent, network_bytes_received, running_tasks, completed_tasks,
                        failed_tasks, work_status, scan_type, captured_at
                 FROM agent_metrics WHERE agent_id = ?1",
                params![agent_id],
            )
            .await?;

        let metrics_row = metrics_probe.next().await?.ok_or(StoreError::NotFound)?;
        let work_status_label: String = metrics_row.get(9)?;
        let captured_at_label: String = metrics_row.get(11)?;

        Ok(AgentMetricsSnapshot {
            agent_id: metrics_row.get(0)?,
            cpu_usage_percent: metrics_row.get(1)?,
            memory_usage_percent: metrics_row.get(2)?,
            disk_usage_percent: metrics_row.get(3)?,
            network_bytes_sent: metrics_row.get::<i64>(4)?.max(0) as u64,
            network_bytes_received: metrics_row.get::<i64>(5)?.max(0) as u64,
            running_tasks: metrics_row.get::<i64>(6)?.max(0) as u32,
            completed_tasks: metrics_row.get::<i64>(7)?.max(0) as u64,
            failed_tasks: metrics_row.get::<i64>(8)?.max(0) as u64,
            work_status: WorkStatus::parse(&work_status_label).unwrap_or(WorkStatus::Idle),
            scan_type: metrics_row.get(10)?,
            captured_at: parse_stored_timestamp(&captured_at_label).unwrap_or_else(Utc::now),
        })
    }

    /**
     * Barrido de vitalidad: todo agente con silencio de latidos superior
     * al umbral transiciona a 'offline'. Retorna los afectados.
     */
    #[instrument(skip(self))]
    pub async fn mark_stale_offline(
        &self,
        timeout_seconds: i64,
    ) -> Result<Vec<String>, StoreError> {
        let database_connection = self.database_client.get_connection()?;
        let mut sweep_results = database_connection
            .query(
                "UPDATE agents SET status = 'offline'
                 WHERE status IN ('online', 'exception')
                 AND (last_heartbeat IS NULL
                      OR datetime(last_heartbeat, '+' || ?1 || ' seconds') < CURRENT_TIMESTAMP)
                 RETURNING agent_id",
                params![timeout_seconds],
            )
            .await?;

        let mut silenced_agents = Vec::new();
        while let Some(sweep_row) = sweep_results.next().await? {
            silenced_agents.push(sweep_row.get::<String>(0)?);
        }
        Ok(silenced_agents)
    }

    /**
     * Candidatos elegibles para una capacidad: en línea, con la
     * capacidad requerida y con carga bajo el tope. Orden: menor carga
     * primero, empate por latido más antiguo.
     */
    #[instrument(skip(self))]
    pub async fn find_eligible_agents(
        &self,
        required_capability: &str,
        capacity_limit: u32,
    ) -> Result<Vec<EligibleAgent>, StoreError> {
        let database_connection = self.database_client.get_connection()?;
        let mut eligibility_probe = database_connection
            .query(
                "SELECT a.agent_id, COALESCE(m.running_tasks, 0) AS running_tasks, a.last_heartbeat
                 FROM agents a
                 JOIN agent_capabilities ac ON ac.agent_id = a.agent_id
                 JOIN capabilities c ON c.capability_id = ac.capability_id
                 LEFT JOIN agent_metrics m ON m.agent_id = a.agent_id
                 WHERE a.status = 'online' AND c.name = ?1
                   AND COALESCE(m.running_tasks, 0) < ?2
                 ORDER BY running_tasks ASC, a.last_heartbeat ASC",
                params![required_capability, capacity_limit as i64],
            )
            .await?;

        let mut eligible_candidates = Vec::new();
        while let Some(candidate_row) = eligibility_probe.next().await? {
            eligible_candidates.push(EligibleAgent {
                agent_id: candidate_row.get(0)?,
                running_tasks: candidate_row.get::<i64>(1)?.max(0) as u32,
                last_heartbeat: candidate_row.get(2)?,
            });
        }
        Ok(eligible_candidates)
    }

    /// Catálogo soberano completo de capacidades.
    pub async fn list_capability_catalog(&self) -> Result<Vec<CapabilityRecord>, StoreError> {
        let database_connection = self.database_client.get_connection()?;
        let mut catalog_probe = database_connection
            .query(
                "SELECT capability_id, name, description, tool_names FROM capabilities ORDER BY name ASC",
                (),
            )
            .await?;

        let mut catalog_entries = Vec::new();
        while let Some(catalog_row) = catalog_probe.next().await? {
            let declared_tools: Option<String> = catalog_row.get(3)?;
            catalog_entries.push(CapabilityRecord {
                capability_id: catalog_row.get(0)?,
                name: catalog_row.get(1)?,
                description: catalog_row.get(2)?,
                tool_names: declared_tools
                    .unwrap_or_default()
                    .split(',')
                    .filter(|tool| !tool.trim().is_empty())
                    .map(|tool| tool.trim().to_string())
                    .collect(),
            });
        }
        Ok(catalog_entries)
    }

    /**
     * Siembra idempotente de una entrada del catálogo de capacidades.
     */
    pub async fn seed_capability(
        &self,
        name: &str,
        description: &str,
        tool_names: &[&str],
    ) -> Result<(), StoreError> {
        let database_connection = self.database_client.get_connection()?;
        database_connection
            .execute(
                "INSERT INTO capabilities (name, description, tool_names)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(name) DO UPDATE SET
                        description = excluded.description,
                        tool_names = excluded.tool_names",
                params![name, description, tool_names.join(",")],
            )
            .await?;
        Ok(())
    }

    fn map_row_to_agent_record(&self, record_row: &Row) -> Result<AgentRecord, StoreError> {
        let status_label: String = record_row.get(10)?;
        let last_heartbeat_label: Option<String> = record_row.get(11)?;
        let token_expiry_label: Option<String> = record_row.get(12)?;
        let registered_at_label: String = record_row.get(14)?;
        let capability_names: Option<String> = record_row.get(15)?;
        let tag_identifiers: Option<String> = record_row.get(16)?;

        Ok(AgentRecord {
            agent_id: record_row.get(0)?,
            hostname: record_row.get(1)?,
            ip: record_row.get(2)?,
            port: record_row.get::<i64>(3)?.clamp(0, u16::MAX as i64) as u16,
            operating_system: record_row.get(4)?,
            architecture: record_row.get(5)?,
            cpu_cores: record_row.get::<Option<i64>>(6)?.map(|cores| cores.max(0) as u32),
            memory_megabytes: record_row.get::<Option<i64>>(7)?.map(|mb| mb.max(0) as u64),
            disk_gigabytes: record_row.get::<Option<i64>>(8)?.map(|gb| gb.max(0) as u64),
            agent_version: record_row.get(9)?,
            status: AgentStatus::parse(&status_label).ok_or_else(|| {
                StoreError::MappingError(format!("estado de agente desconocido '{}'", status_label))
            })?,
            last_heartbeat: last_heartbeat_label
                .as_deref()
                .and_then(parse_stored_timestamp),
            token_expiry: token_expiry_label
                .as_deref()
                .and_then(parse_stored_timestamp),
            capabilities: capability_names
                .unwrap_or_default()
                .split(',')
                .filter(|name| !name.is_empty())
                .map(|name| name.to_string())
                .collect(),
            tag_ids: tag_identifiers
                .unwrap_or_default()
                .split(',')
                .filter_map(|raw_id| raw_id.parse::<i64>().ok())
                .collect(),
            group_name: record_row.get(13)?,
            registered_at: parse_stored_timestamp(&registered_at_label).unwrap_or_else(Utc::now),
        })
    }
}
