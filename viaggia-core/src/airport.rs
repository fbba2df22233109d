use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::warn;

use crate::iata::{self, ProviderAirport};
use crate::{CoreError, CoreResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Airport {
    pub id: u32,
    pub code: String,
    pub name: String,
    pub city: String,
}

/// Read-only airport reference data, indexed by id and by IATA code.
#[derive(Debug, Clone, Default)]
pub struct AirportDirectory {
    airports: Vec<Airport>,
    by_id: HashMap<u32, usize>,
    by_code: HashMap<String, usize>,
}

impl AirportDirectory {
    /// Builds the directory, rejecting duplicate ids or codes.
    pub fn new(mut airports: Vec<Airport>) -> CoreResult<Self> {
        airports.sort_by_key(|a| a.id);

        let mut by_id = HashMap::with_capacity(airports.len());
        let mut by_code = HashMap::with_capacity(airports.len());

        for (idx, airport) in airports.iter_mut().enumerate() {
            airport.code = iata::normalize_code(&airport.code)?;

            if by_id.insert(airport.id, idx).is_some() {
                return Err(CoreError::ValidationError(format!("Duplicate airport id {}", airport.id)));
            }
            if by_code.insert(airport.code.clone(), idx).is_some() {
                return Err(CoreError::ValidationError(format!("Duplicate airport code {}", airport.code)));
            }
        }

        Ok(Self { airports, by_id, by_code })
    }

    /// Assigns ids 1.. in provider order. Entries with a bad or repeated code are skipped.
    pub fn from_provider(airports: Vec<ProviderAirport>) -> Self {
        let mut accepted: Vec<Airport> = Vec::with_capacity(airports.len());

        for pa in airports {
            let code = match iata::normalize_code(&pa.code) {
                Ok(code) => code,
                Err(e) => {
                    warn!("Skipping provider airport '{}': {}", pa.name, e);
                    continue;
                }
            };
            if accepted.iter().any(|a| a.code == code) {
                continue;
            }
            accepted.push(Airport {
                id: accepted.len() as u32 + 1,
                code,
                name: pa.name,
                city: pa.city,
            });
        }

        // Ids and codes are unique by construction.
        Self::new(accepted).unwrap_or_default()
    }

    pub fn list(&self) -> &[Airport] {
        &self.airports
    }

    pub fn get_by_id(&self, id: u32) -> CoreResult<&Airport> {
        self.by_id
            .get(&id)
            .map(|&idx| &self.airports[idx])
            .ok_or_else(|| CoreError::NotFound(format!("Airport {}", id)))
    }

    pub fn get_by_code(&self, code: &str) -> CoreResult<&Airport> {
        let key = code.trim().to_ascii_uppercase();
        self.by_code
            .get(&key)
            .map(|&idx| &self.airports[idx])
            .ok_or_else(|| CoreError::NotFound(format!("Airport {}", key)))
    }

    pub fn contains(&self, id: u32) -> bool {
        self.by_id.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.airports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.airports.is_empty()
    }
}

/// The Italian airports the service ships with when no provider list is available.
pub fn default_airports() -> Vec<Airport> {
    [
        (1, "FCO", "Aeroporto Leonardo da Vinci", "Roma"),
        (2, "MXP", "Aeroporto di Milano-Malpensa", "Milano"),
        (3, "VCE", "Aeroporto Marco Polo", "Venezia"),
        (4, "NAP", "Aeroporto di Napoli", "Napoli"),
        (5, "CTA", "Aeroporto di Catania", "Catania"),
    ]
    .into_iter()
    .map(|(id, code, name, city)| Airport {
        id,
        code: code.to_string(),
        name: name.to_string(),
        city: city.to_string(),
    })
    .collect()
}
