//! Serializable output shape for one technology.

use crate::record::{TechFlags, TechRecord};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TechOutput {
    pub id: String,
    /// Internal name (the script key).
    pub name: String,
    pub display_name: String,
    pub area: String,
    pub category: Vec<String>,
    pub tier: u32,
    pub cost: f64,
    pub weight: f64,
    pub flags: OutputFlags,
    /// Raw prerequisite ids, including unresolved ones.
    pub prerequisites: Vec<String>,
    pub child_techs: Vec<String>,
    pub source: OutputSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputFlags {
    pub is_rare: bool,
    pub is_dangerous: bool,
    pub is_starting_tech: bool,
}

impl From<TechFlags> for OutputFlags {
    fn from(flags: TechFlags) -> Self {
        Self {
            is_rare: flags.is_rare,
            is_dangerous: flags.is_dangerous,
            is_starting_tech: flags.is_starting_tech,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputSource {
    pub file: String,
    pub mod_id: String,
    pub mod_name: Option<String>,
    pub load_order: u32,
}

impl TechOutput {
    pub fn new(record: &TechRecord, display_name: String, child_techs: Vec<String>) -> Self {
        let provenance = &record.provenance;
        Self {
            id: record.id.clone(),
            name: record.id.clone(),
            display_name,
            area: record.area.clone(),
            category: record.category.clone(),
            tier: record.tier,
            cost: record.cost,
            weight: record.weight,
            flags: record.flags.into(),
            prerequisites: record
                .prerequisites
                .ids()
                .into_iter()
                .map(String::from)
                .collect(),
            child_techs,
            source: OutputSource {
                file: provenance.file.clone(),
                mod_id: provenance.source_id.clone(),
                mod_name: provenance.source_name.clone(),
                load_order: provenance.load_order,
            },
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Prerequisites, Provenance};

    fn sample() -> TechRecord {
        let provenance = Provenance::new("mod/b.txt", "4242", 2).with_name("Mod");
        let mut r = TechRecord::new("tech_b", provenance);
        r.area = "physics".into();
        r.tier = 1;
        r.cost = 480.0;
        r.weight = 12.5;
        r.flags.is_rare = true;
        r.prerequisites = Prerequisites::required(["tech_a", "tech_missing"]);
        r
    }

    #[test]
    fn json_uses_camel_case_keys() {
        let out = TechOutput::new(&sample(), "B".into(), vec!["tech_c".into()]);
        let value: serde_json::Value = serde_json::from_str(&out.to_json().unwrap()).unwrap();
        assert_eq!(value["displayName"], "B");
        assert_eq!(value["childTechs"][0], "tech_c");
        assert_eq!(value["flags"]["isRare"], true);
        assert_eq!(value["flags"]["isStartingTech"], false);
        assert_eq!(value["source"]["modId"], "4242");
        assert_eq!(value["source"]["modName"], "Mod");
        assert_eq!(value["source"]["loadOrder"], 2);
    }

    #[test]
    fn decoded_output_matches_record() {
        let record = sample();
        let out = TechOutput::new(&record, "B".into(), Vec::new());
        let back = TechOutput::from_json(&out.to_json().unwrap()).unwrap();
        assert_eq!(back.prerequisites, record.prerequisites.ids());
        assert_eq!(back.flags, OutputFlags::from(record.flags));
        assert_eq!((back.tier, back.cost, back.weight), (1, 480.0, 12.5));
    }
}
