// [apps/master/src/main.rs]
/*!
 * =================================================================
 * APARATO: MASTER MAIN ENTRY POINT (V4.0 - GOLD MASTER)
 * CLASIFICACIÓN: APPLICATION SHELL (ESTRATO L3)
 * RESPONSABILIDAD: BOOTSTRAP DE INFRAESTRUCTURA E IGNICIÓN SEGURA
 *
 * # Mathematical Proof (Deterministic Ignition):
 * El proceso garantiza que el esquema y el snapshot de reglas queden
 * cristalizados ANTES de la apertura del socket TCP, previniendo
 * estados de carrera donde un agente solicite un bundle aún no
 * sellado.
 * =================================================================
 */

use neoscan_master::prelude::*;

use dotenvy::dotenv;
use neoscan_shared_watchtower::init_tracing;
use tracing::info;

/**
 * Punto de ignición supremo del binario del Master.
 */
fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. CARGA DE ENTORNO SOBERANO
    dotenv().ok();

    // 2. INICIALIZACIÓN DE OBSERVABILIDAD (WATCHTOWER)
    init_tracing("neoscan_master");

    // 3. CONFIGURACIÓN DEL RUNTIME SOBERANO
    let runtime_master = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime_master.block_on(async {
        info!("🛰️  [COMMAND_CENTER]: Global ignition sequence starting...");

        // 4. ADQUISICIÓN DE COORDENADAS ESTRATÉGICAS
        let master_configuration = MasterConfig::from_environment();

        // 5. CONSTRUCCIÓN DEL KERNEL SOBERANO (ESTRATO L1-APP)
        let kernel_instance = MasterKernel::ignite(master_configuration).await;

        // 6. IGNICIÓN DE OPERACIONES DE LA FLOTA
        info!("🚀 [NEOSCAN_ONLINE]: Master fully operational.");
        kernel_instance.launch_sovereign_operations().await;

        Ok(())
    })
}
