use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::Result;

/// Display names for skill ids, loaded from `{"skill_names": {"<id>": "<name>"}}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SkillNames {
    names: HashMap<u32, String>,
}

impl SkillNames {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)?;
        let mut names = Self::new();
        let loaded = names.load_from_json(&content)?;
        log::info!("Loaded {} skill names from {:?}", loaded, path.as_ref());
        Ok(names)
    }

    pub fn load_from_json(&mut self, json_data: &str) -> Result<usize> {
        let data: serde_json::Value = serde_json::from_str(json_data)?;
        let mut loaded = 0;
        if let Some(skill_names) = data.get("skill_names").and_then(|v| v.as_object()) {
            for (key, value) in skill_names {
                match (key.parse::<u32>(), value.as_str()) {
                    (Ok(skill_id), Some(name)) => {
                        self.insert(skill_id, name.to_string());
                        loaded += 1;
                    }
                    _ => log::debug!("Skipping skill name entry {:?}", key),
                }
            }
        }
        Ok(loaded)
    }

    pub fn insert(&mut self, skill_id: u32, name: String) {
        self.names.insert(skill_id, name);
    }

    pub fn get(&self, skill_id: u32) -> Option<&str> {
        self.names.get(&skill_id).map(String::as_str)
    }

    pub fn display_name(&self, skill_id: u32) -> String {
        self.get(skill_id)
            .map(str::to_string)
            .unwrap_or_else(|| skill_id.to_string())
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
