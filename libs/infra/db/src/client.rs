// [libs/infra/db/src/client.rs]
/*!
 * =================================================================
 * APARATO: STORE CLIENT (V3.3 - BACKEND TRIAGE)
 * CLASIFICACIÓN: INFRASTRUCTURE LAYER (ESTRATO L3)
 * RESPONSABILIDAD: APERTURA DE ENLACES libSQL Y BOOTSTRAP DE ESQUEMA
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. BACKEND TRIAGE: La URL se clasifica en remoto, archivo local o
 *    memoria efímera ANTES de abrir el driver; cada backend posee su
 *    propia disciplina de arranque y de credenciales.
 * 2. EPHEMERAL PINNING: En memoria compartida, la misma conexión que
 *    aplicó el esquema queda retenida de por vida; si la última
 *    conexión muriera, SQLite descartaría las tablas entre hilos.
 * =================================================================
 */

use crate::errors::StoreError;
use crate::schema::apply_full_asset_schema;
use libsql::{Builder, Connection, Database};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Clasificación del destino físico de una URL de conexión.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StorageBackend {
    /// Cluster remoto (libsql:// o https://); exige token de acceso.
    Remote,
    /// Archivo SQLite en el disco local.
    LocalFile,
    /// Segmento de memoria compartida (tests y herramientas).
    EphemeralMemory,
}

fn classify_backend(connection_url: &str) -> StorageBackend {
    if connection_url.starts_with("libsql://") || connection_url.starts_with("https://") {
        StorageBackend::Remote
    } else if connection_url.contains(":memory:") || connection_url.contains("mode=memory") {
        StorageBackend::EphemeralMemory
    } else {
        StorageBackend::LocalFile
    }
}

/// Cliente del grafo de activos. Clonarlo comparte el driver subyacente.
#[derive(Clone)]
pub struct StoreClient {
    driver: Arc<Database>,
    /// Conexión retenida que fija el segmento de memoria compartida.
    _schema_pin: Option<Arc<Connection>>,
}

impl StoreClient {
    /**
     * Abre el enlace, clasifica el backend y deja el esquema aplicado.
     *
     * # Errors:
     * - `StoreError::ConfigurationError`: URL vacía, o backend remoto
     *   sin token de acceso.
     * - `StoreError::ConnectionError`: El driver rechazó la apertura o
     *   el esquema no pudo solidificarse.
     */
    #[instrument(skip(access_token))]
    pub async fn connect(
        connection_url: &str,
        access_token: Option<String>,
    ) -> Result<Self, StoreError> {
        if connection_url.trim().is_empty() {
            return Err(StoreError::ConfigurationError(
                "la URL de conexión está vacía".into(),
            ));
        }

        let backend = classify_backend(connection_url);
        info!("🔌 [STORE]: Opening {:?} link to [{}].", backend, connection_url);

        let driver = match backend {
            StorageBackend::Remote => {
                let Some(token) = access_token else {
                    return Err(StoreError::ConfigurationError(
                        "backend remoto sin token de acceso".into(),
                    ));
                };
                Builder::new_remote(connection_url.to_string(), token)
                    .build()
                    .await
            }
            StorageBackend::LocalFile | StorageBackend::EphemeralMemory => {
                Builder::new_local(connection_url).build().await
            }
        }
        .map_err(|open_fault| StoreError::ConnectionError(open_fault.to_string()))?;

        let driver = Arc::new(driver);

        // El bootstrap corre sobre una conexión dedicada. En memoria,
        // esa misma conexión queda retenida como pin del segmento.
        let bootstrap_connection = driver
            .connect()
            .map_err(|link_fault| StoreError::ConnectionError(link_fault.to_string()))?;

        apply_full_asset_schema(&bootstrap_connection)
            .await
            .map_err(|schema_fault| StoreError::ConnectionError(schema_fault.to_string()))?;

        let schema_pin = match backend {
            StorageBackend::EphemeralMemory => {
                info!("📌 [STORE]: Ephemeral segment pinned by its bootstrap connection.");
                Some(Arc::new(bootstrap_connection))
            }
            StorageBackend::Remote | StorageBackend::LocalFile => None,
        };

        Ok(Self {
            driver,
            _schema_pin: schema_pin,
        })
    }

    /// Asigna una conexión fresca del driver compartido.
    pub fn get_connection(&self) -> Result<Connection, StoreError> {
        self.driver.connect().map_err(|allocation_fault| {
            warn!("⚠️ [STORE]: Connection allocation rejected: {}", allocation_fault);
            StoreError::ConnectionError(allocation_fault.to_string())
        })
    }
}
