//! nodes.toml inventory parser.
//!
//! The daemon learns its cluster from a static TOML inventory:
//!
//! ```toml
//! [[node]]
//! id = 1
//! hostname = "compute-01"
//! cpus = 4
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use freshet_state::ResourceNode;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryConfig {
    #[serde(default)]
    pub node: Vec<NodeConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    pub id: u32,
    pub hostname: String,
    pub cpus: u32,
}

impl InventoryConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: InventoryConfig = toml::from_str(&content)?;
        if config.node.is_empty() {
            anyhow::bail!("inventory {} lists no nodes", path.display());
        }
        Ok(config)
    }

    /// Registry entries, every CPU initially available.
    pub fn nodes(&self) -> Vec<ResourceNode> {
        self.node
            .iter()
            .map(|n| ResourceNode::new(n.id, n.hostname.clone(), n.cpus))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_three_node_inventory() {
        let toml = r#"
            [[node]]
            id = 1
            hostname = "compute-01"
            cpus = 4

            [[node]]
            id = 2
            hostname = "compute-02"
            cpus = 4

            [[node]]
            id = 3
            hostname = "compute-03"
            cpus = 8
        "#;
        let config: InventoryConfig = toml::from_str(toml).unwrap();
        let nodes = config.nodes();
        assert_eq!(nodes.len(), 3);
        assert_eq!(nodes[2].hostname, "compute-03");
        assert_eq!(nodes[2].total_cpus, 8);
        assert_eq!(nodes[2].available_cpus, 8);
    }

    #[test]
    fn empty_inventory_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nodes.toml");
        std::fs::write(&path, "").unwrap();
        assert!(InventoryConfig::from_file(&path).is_err());
    }

    #[test]
    fn missing_fields_are_a_parse_error() {
        let result: Result<InventoryConfig, _> = toml::from_str("[[node]]\nid = 1\n");
        assert!(result.is_err());
    }
}
