// [libs/infra/db/src/schema.rs]
/**
 * =================================================================
 * APARATO: ASSET GRAPH DATABASE SCHEMA (V3.4 - FLEET STRATA)
 * CLASIFICACIÓN: INFRASTRUCTURE LAYER (ESTRATO L3)
 * RESPONSABILIDAD: GOBERNANZA ESTRUCTURAL E IDEMPOTENCIA TOTAL
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. FLEET REGISTRY: Tablas de agentes con unicidad física (hostname, port).
 * 2. DISPATCH LEDGER: Clave de idempotencia de materialización
 *    (project_id, stage_id, input_target) y resultados únicos por task_id.
 * 3. IDEMPOTENCIA: Gestión de errores para migraciones en caliente.
 * 4. PERFORMANCE: Índices de aceleración para el despacho masivo.
 * =================================================================
 */

use anyhow::{Context, Result};
use libsql::Connection;
use tracing::{debug, info, instrument, warn};

/**
 * ESTRATO 1: SOLIDIFICACIÓN (Génesis de Tablas)
 * Define las entidades base del grafo de activos NeoScan.
 */
const ASSET_GRAPH_TABLES: &[(&str, &str)] = &[
    ("TABLE_AGENTS", r#"
        CREATE TABLE IF NOT EXISTS agents (
            agent_id TEXT PRIMARY KEY,
            hostname TEXT NOT NULL,
            ip TEXT NOT NULL,
            port INTEGER NOT NULL,
            operating_system TEXT,
            architecture TEXT,
            cpu_cores INTEGER,
            memory_megabytes INTEGER,
            disk_gigabytes INTEGER,
            agent_version TEXT,
            status TEXT DEFAULT 'online',
            last_heartbeat DATETIME,
            token_expiry DATETIME,
            registered_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            UNIQUE(hostname, port)
        );
    "#),
    ("TABLE_AGENT_METRICS", r#"
        CREATE TABLE IF NOT EXISTS agent_metrics (
            agent_id TEXT PRIMARY KEY,
            cpu_usage_percent REAL DEFAULT 0,
            memory_usage_percent REAL DEFAULT 0,
            disk_usage_percent REAL DEFAULT 0,
            network_bytes_sent INTEGER DEFAULT 0,
            network_bytes_received INTEGER DEFAULT 0,
            running_tasks INTEGER DEFAULT 0,
            completed_tasks INTEGER DEFAULT 0,
            failed_tasks INTEGER DEFAULT 0,
            work_status TEXT DEFAULT 'idle',
            scan_type TEXT,
            captured_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );
    "#),
    ("TABLE_CAPABILITIES", r#"
        CREATE TABLE IF NOT EXISTS capabilities (
            capability_id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT UNIQUE NOT NULL,
            description TEXT,
            tool_names TEXT
        );
    "#),
    ("TABLE_AGENT_CAPABILITIES", r#"
        CREATE TABLE IF NOT EXISTS agent_capabilities (
            agent_id TEXT NOT NULL,
            capability_id INTEGER NOT NULL,
            PRIMARY KEY(agent_id, capability_id)
        );
    "#),
    ("TABLE_TAGS", r#"
        CREATE TABLE IF NOT EXISTS tags (
            tag_id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            parent_id INTEGER,
            path TEXT NOT NULL DEFAULT '/',
            level INTEGER NOT NULL DEFAULT 0,
            category TEXT
        );
    "#),
    ("TABLE_MATCH_RULES", r#"
        CREATE TABLE IF NOT EXISTS match_rules (
            rule_id INTEGER PRIMARY KEY AUTOINCREMENT,
            entity_type TEXT NOT NULL,
            field TEXT NOT NULL,
            operator TEXT NOT NULL,
            value TEXT NOT NULL,
            ignore_case INTEGER DEFAULT 0,
            priority INTEGER DEFAULT 100,
            enabled INTEGER DEFAULT 1,
            tag_id INTEGER NOT NULL
        );
    "#),
    ("TABLE_ENTITY_TAGS", r#"
        CREATE TABLE IF NOT EXISTS entity_tags (
            entity_type TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            tag_id INTEGER NOT NULL,
            source TEXT NOT NULL,
            rule_id INTEGER,
            UNIQUE(entity_type, entity_id, tag_id, source)
        );
    "#),
    ("TABLE_PROJECTS", r#"
        CREATE TABLE IF NOT EXISTS projects (
            project_id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            target_scope TEXT NOT NULL DEFAULT '[]',
            status TEXT DEFAULT 'pending',
            environment TEXT,
            tag_names TEXT DEFAULT '[]',
            notify_config TEXT DEFAULT '{}',
            export_config TEXT DEFAULT '{}',
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );
    "#),
    ("TABLE_WORKFLOWS", r#"
        CREATE TABLE IF NOT EXISTS workflows (
            workflow_id TEXT PRIMARY KEY,
            project_id TEXT NOT NULL,
            name TEXT NOT NULL,
            sequence_index INTEGER NOT NULL DEFAULT 0
        );
    "#),
    ("TABLE_SCAN_STAGES", r#"
        CREATE TABLE IF NOT EXISTS scan_stages (
            stage_id TEXT PRIMARY KEY,
            workflow_id TEXT NOT NULL,
            tool_name TEXT NOT NULL,
            target_policy TEXT DEFAULT 'per_target',
            timeout_seconds INTEGER DEFAULT 3600,
            retry_limit INTEGER DEFAULT 0,
            performance_settings TEXT DEFAULT '{}',
            output_config TEXT DEFAULT '{}',
            enabled INTEGER DEFAULT 1,
            sequence_index INTEGER NOT NULL DEFAULT 0
        );
    "#),
    ("TABLE_AGENT_TASKS", r#"
        CREATE TABLE IF NOT EXISTS agent_tasks (
            task_id TEXT PRIMARY KEY,
            project_id TEXT NOT NULL,
            stage_id TEXT NOT NULL,
            tool_name TEXT NOT NULL,
            task_category TEXT NOT NULL,
            input_target TEXT NOT NULL,
            tool_params TEXT DEFAULT '{}',
            assigned_agent_id TEXT,
            status TEXT DEFAULT 'pending',
            skip_reason TEXT,
            retry_count INTEGER DEFAULT 0,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            dispatched_at DATETIME,
            completed_at DATETIME,
            updated_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            UNIQUE(project_id, stage_id, input_target)
        );
    "#),
    ("TABLE_TASK_RESULTS", r#"
        CREATE TABLE IF NOT EXISTS task_results (
            task_id TEXT PRIMARY KEY,
            agent_id TEXT NOT NULL,
            status TEXT NOT NULL,
            results TEXT DEFAULT '{}',
            error_detail TEXT,
            reported_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );
    "#),
    ("TABLE_ASSETS", r#"
        CREATE TABLE IF NOT EXISTS assets (
            entity_id TEXT NOT NULL,
            entity_type TEXT NOT NULL DEFAULT 'host',
            attributes TEXT DEFAULT '{}',
            discovered_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            PRIMARY KEY(entity_type, entity_id)
        );
    "#),
    ("TABLE_WHITELIST_RULES", r#"
        CREATE TABLE IF NOT EXISTS whitelist_rules (
            rule_id INTEGER PRIMARY KEY AUTOINCREMENT,
            target_type TEXT NOT NULL,
            value TEXT NOT NULL,
            enabled INTEGER DEFAULT 1,
            scope TEXT
        );
    "#),
    ("TABLE_SKIP_POLICIES", r#"
        CREATE TABLE IF NOT EXISTS skip_policies (
            policy_id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            enabled INTEGER DEFAULT 1,
            scope TEXT,
            condition_rules TEXT DEFAULT '[]'
        );
    "#),
    ("TABLE_FINGERPRINT_RULES", r#"
        CREATE TABLE IF NOT EXISTS fingerprint_rules (
            rule_id INTEGER PRIMARY KEY AUTOINCREMENT,
            rule_file TEXT NOT NULL,
            content TEXT NOT NULL,
            enabled INTEGER DEFAULT 1,
            source TEXT DEFAULT 'builtin',
            updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );
    "#),
    ("TABLE_RULE_BACKUPS", r#"
        CREATE TABLE IF NOT EXISTS rule_backups (
            backup_id TEXT PRIMARY KEY,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            rules_json TEXT NOT NULL
        );
    "#),
];

/**
 * ESTRATO 2: EVOLUCIÓN (Mutaciones de Columna)
 * Repara despliegues anteriores a la columna de agrupación de flota;
 * las columnas presentes en el génesis jamás se repiten aquí.
 */
const EVOLUTIONARY_STRATA: &[(&str, &str)] = &[
    ("AGENT_GROUP", "ALTER TABLE agents ADD COLUMN group_name TEXT"),
];

/**
 * ESTRATO 3: ENDURECIMIENTO (Índices de Aceleración)
 * Optimiza el acceso para los ticks de despacho de la flota.
 */
const ACCELERATION_INDEXES: &[(&str, &str)] = &[
    ("IDX_AGENTS_STATUS", "CREATE INDEX IF NOT EXISTS idx_agents_status ON agents(status);"),
    ("IDX_TASKS_DISPATCH", "CREATE INDEX IF NOT EXISTS idx_tasks_dispatch ON agent_tasks(status, task_category);"),
    ("IDX_TASKS_STAGE", "CREATE INDEX IF NOT EXISTS idx_tasks_stage ON agent_tasks(project_id, stage_id);"),
    ("IDX_ENTITY_TAGS", "CREATE INDEX IF NOT EXISTS idx_entity_tags_entity ON entity_tags(entity_type, entity_id, source);"),
    ("IDX_TAGS_PATH", "CREATE INDEX IF NOT EXISTS idx_tags_path ON tags(path);"),
    ("IDX_RULES_CANONICAL", "CREATE INDEX IF NOT EXISTS idx_rules_canonical ON fingerprint_rules(rule_file, content);"),
    ("IDX_STAGES_WORKFLOW", "CREATE INDEX IF NOT EXISTS idx_stages_workflow ON scan_stages(workflow_id, sequence_index);"),
];

/**
 * Ejecuta la secuencia maestra de sincronización del esquema estructural.
 *
 * # Errors:
 * Retorna error si alguna tabla base falla en solidificarse, indicando
 * un colapso en el enlace con el motor.
 */
#[instrument(skip(database_connection))]
pub async fn apply_full_asset_schema(database_connection: &Connection) -> Result<()> {
    info!("🏗️ [SCHEMA_ENGINE]: Initiating structural synchronization V3.4...");

    solidify_base_strata(database_connection).await?;
    execute_evolutionary_repair(database_connection).await?;
    harden_access_layer(database_connection).await?;

    info!("✅ [SCHEMA_ENGINE]: Asset graph V3.4 level and certified.");
    Ok(())
}

async fn solidify_base_strata(db: &Connection) -> Result<()> {
    for (identifier, sql) in ASSET_GRAPH_TABLES {
        debug!("  ↳ Solidifying: {}", identifier);
        db.execute(*sql, ())
            .await
            .with_context(|| format!("CRITICAL_SOLIDIFICATION_FAULT: {}", identifier))?;
    }
    Ok(())
}

async fn execute_evolutionary_repair(db: &Connection) -> Result<()> {
    for (identifier, sql) in EVOLUTIONARY_STRATA {
        match db.execute(*sql, ()).await {
            Ok(_) => debug!("  🟢 [REPAIR_OK]: Applied evolutionary stratum {}", identifier),
            Err(repair_fault) => {
                let message = repair_fault.to_string();
                if message.contains("duplicate column name") {
                    debug!("  ⚪ [REPAIR_SKIP]: {} already level.", identifier);
                } else {
                    warn!("  ⚠️ [REPAIR_BYPASS]: {} check incomplete: {}", identifier, message);
                }
            }
        }
    }
    Ok(())
}

async fn harden_access_layer(db: &Connection) -> Result<()> {
    for (identifier, sql) in ACCELERATION_INDEXES {
        debug!("  ↳ Hardening: {}", identifier);
        db.execute(*sql, ())
            .await
            .with_context(|| format!("CRITICAL_HARDENING_FAULT: {}", identifier))?;
    }
    Ok(())
}
