use tracker_core::{Config, Location};

/// Tracked sites, in configuration order.
#[derive(Debug, Clone)]
pub struct LocationRegistry {
    locations: Vec<Location>,
}

impl LocationRegistry {
    pub fn new(locations: Vec<Location>) -> Self {
        Self { locations }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.locations.clone())
    }

    pub fn locations(&self) -> &[Location] {
        &self.locations
    }

    pub fn get(&self, id: &str) -> Option<&Location> {
        self.locations.iter().find(|l| l.id == id)
    }

    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }
}
