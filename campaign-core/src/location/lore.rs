use super::LocationData;
use serde::{Deserialize, Serialize};

/// A known place inside a lore region.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoreLocation {
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub description: String,
}

/// A named in-world area.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoreRegion {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub locations: Vec<LoreLocation>,
}

/// The campaign's world lore.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Lore {
    regions: Vec<LoreRegion>,
}

impl Lore {
    pub fn new(regions: Vec<LoreRegion>) -> Self {
        Self { regions }
    }

    pub fn regions(&self) -> &[LoreRegion] {
        &self.regions
    }

    pub fn region(&self, id: &str) -> Option<&LoreRegion> {
        self.regions.iter().find(|r| r.id == id)
    }

    pub fn add_region(&mut self, region: LoreRegion) {
        match self.regions.iter_mut().find(|r| r.id == region.id) {
            Some(existing) => *existing = region,
            None => self.regions.push(region),
        }
    }

    /// Find a location by name (case-insensitive). Restricted to `region_id`
    /// when given, otherwise every region is searched in order.
    pub fn find(
        &self,
        name: &str,
        region_id: Option<&str>,
    ) -> Option<(&LoreRegion, &LoreLocation)> {
        let wanted = name.trim().to_lowercase();
        self.regions
            .iter()
            .filter(|r| region_id.map_or(true, |id| r.id == id))
            .find_map(|region| {
                region
                    .locations
                    .iter()
                    .find(|l| l.name.trim().to_lowercase() == wanted)
                    .map(|l| (region, l))
            })
    }
}

impl LoreLocation {
    /// Build a full location from this lore entry.
    pub fn to_location(&self, region: &LoreRegion) -> LocationData {
        let mut location = LocationData::new(self.name.clone(), self.kind.clone());
        location.description = self.description.clone();
        location.region = Some(region.id.clone());
        location
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lore() -> Lore {
        Lore::new(vec![
            LoreRegion {
                id: "north".to_string(),
                name: "Northern Reach".to_string(),
                description: String::new(),
                locations: vec![LoreLocation {
                    name: "Frostgate".to_string(),
                    kind: "city".to_string(),
                    description: "A walled city.".to_string(),
                }],
            },
            LoreRegion {
                id: "south".to_string(),
                name: "Sunlands".to_string(),
                description: String::new(),
                locations: vec![LoreLocation {
                    name: "Frostgate".to_string(),
                    kind: "inn".to_string(),
                    description: "An ironically named inn.".to_string(),
                }],
            },
        ])
    }

    #[test]
    fn test_find_within_region() {
        let lore = lore();
        let (region, location) = lore.find("frostgate", Some("south")).unwrap();
        assert_eq!(region.id, "south");
        assert_eq!(location.kind, "inn");
        assert!(lore.find("Frostgate", Some("east")).is_none());
    }

    #[test]
    fn test_find_any_region() {
        let lore = lore();
        let (region, _) = lore.find(" FROSTGATE ", None).unwrap();
        assert_eq!(region.id, "north");
    }

    #[test]
    fn test_to_location() {
        let lore = lore();
        let (region, entry) = lore.find("Frostgate", Some("north")).unwrap();
        let location = entry.to_location(region);
        assert_eq!(location.region.as_deref(), Some("north"));
        assert_eq!(location.description, "A walled city.");
    }
}
