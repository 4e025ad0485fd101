// [libs/core/probe-engine/src/probe.rs]
/*!
 * =================================================================
 * APARATO: PROBE DATABASE MODEL (V3.1 - IMMUTABLE STRATA)
 * CLASIFICACIÓN: CORE ENGINE (ESTRATO L1)
 * RESPONSABILIDAD: REPRESENTACIÓN INMUTABLE DE SONDAS Y DIRECTIVAS
 *
 * # Mathematical Proof (Fallback Acyclicity):
 * La resolución de la cadena de fallback usa un conjunto de visitados;
 * un ciclo accidental en las directivas 'fallback' de la base jamás
 * produce recursión infinita: la cadena se trunca en el primer nodo
 * repetido.
 * =================================================================
 */

use regex::bytes::Regex;
use std::collections::HashMap;

/// Protocolo de transporte de una sonda.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeProtocol {
    Tcp,
    Udp,
}

impl ProbeProtocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProbeProtocol::Tcp => "tcp",
            ProbeProtocol::Udp => "udp",
        }
    }
}

/// Directiva de coincidencia precompilada ('match' o 'softmatch').
#[derive(Debug)]
pub struct MatchDirective {
    /// Familia de servicio declarada (ssh, http, smtp, ...).
    pub service: String,
    /// Patrón binario precompilado sobre el banner crudo.
    pub pattern: Regex,
    /// true para 'softmatch': registra familia sin sellar la huella.
    pub is_soft: bool,
    /// Plantillas de versión con referencias $1..$9.
    pub product_template: Option<String>,
    pub version_template: Option<String>,
    pub info_template: Option<String>,
    pub hostname_template: Option<String>,
    pub operating_system_template: Option<String>,
    pub device_type_template: Option<String>,
    pub cpe_templates: Vec<String>,
}

/// Sonda de servicio: payload, puertos preferidos y directivas.
#[derive(Debug)]
pub struct ServiceProbe {
    pub name: String,
    pub protocol: ProbeProtocol,
    /// Bytes a emitir tras conectar; vacío para la sonda NULL.
    pub payload: Vec<u8>,
    /// Puertos donde esta sonda tiene prioridad absoluta.
    pub ports: Vec<u16>,
    /// Puertos TLS donde esta sonda tiene prioridad secundaria.
    pub ssl_ports: Vec<u16>,
    /// Rareza 1..=9: menor es más común; el motor corta en el tope configurado.
    pub rarity: u8,
    /// Nombre de la sonda cuyos patrones se heredan tras los propios.
    pub fallback: Option<String>,
    pub matches: Vec<MatchDirective>,
}

impl ServiceProbe {
    /// La sonda NULL no emite payload: escucha servicios que hablan primero.
    pub fn is_null_probe(&self) -> bool {
        self.payload.is_empty()
    }
}

/// Base de sondas inmutable, parseada una única vez por snapshot.
#[derive(Debug, Default)]
pub struct ProbeDatabase {
    pub probes: Vec<ServiceProbe>,
    name_index: HashMap<String, usize>,
}

impl ProbeDatabase {
    pub fn new(probes: Vec<ServiceProbe>) -> Self {
        let name_index = probes
            .iter()
            .enumerate()
            .map(|(position, probe)| (probe.name.clone(), position))
            .collect();
        Self { probes, name_index }
    }

    pub fn probe_by_name(&self, probe_name: &str) -> Option<&ServiceProbe> {
        self.name_index
            .get(probe_name)
            .map(|position| &self.probes[*position])
    }

    /**
     * Resuelve la cadena completa de sondas heredadas vía 'fallback',
     * comenzando por la propia sonda. Protegida contra ciclos.
     */
    pub fn fallback_chain<'db>(&'db self, origin: &'db ServiceProbe) -> Vec<&'db ServiceProbe> {
        let mut resolved_chain: Vec<&ServiceProbe> = vec![origin];
        let mut visited_names: Vec<&str> = vec![origin.name.as_str()];

        let mut cursor = origin;
        while let Some(fallback_name) = cursor.fallback.as_deref() {
            if visited_names.contains(&fallback_name) {
                break;
            }
            match self.probe_by_name(fallback_name) {
                Some(inherited_probe) => {
                    resolved_chain.push(inherited_probe);
                    visited_names.push(inherited_probe.name.as_str());
                    cursor = inherited_probe;
                }
                None => break,
            }
        }

        resolved_chain
    }

    /**
     * Directivas aplicables a una sonda en orden de definición,
     * incluyendo las heredadas por la cadena de fallback.
     */
    pub fn directives_with_fallback<'db>(
        &'db self,
        origin: &'db ServiceProbe,
    ) -> Vec<&'db MatchDirective> {
        self.fallback_chain(origin)
            .into_iter()
            .flat_map(|probe| probe.matches.iter())
            .collect()
    }
}
