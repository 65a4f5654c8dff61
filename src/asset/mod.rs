pub mod loader;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::error::{GraphError, GraphResult};
use crate::runtime::blueprint::{Blueprint, NodeId, PruneReport, PrunedLink};
use crate::runtime::link::Link;
use crate::runtime::port::PortStorage;
use crate::runtime::registry::NodeRegistry;

/// Serialized form of a blueprint: nodes by kind and params, plus every
/// link half with its GUID.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlueprintDocument {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<NodeId>,
    #[serde(default)]
    pub nodes: Vec<NodeDocument>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDocument {
    pub id: NodeId,
    pub label: String,
    pub kind: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub params: Value,
    #[serde(default)]
    pub ports: Vec<PortDocument>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortDocument {
    pub field: String,
    /// Omitted when null; a null default reads back as the declared one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    /// Defaults of each sub-port, present only on dynamic ports.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_ports: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<Link>,
}

/// Vacant arena slots tolerated in a document, left by removed nodes.
const MAX_ID_GAP: usize = 4096;

impl Blueprint {
    pub fn to_document(&self) -> BlueprintDocument {
        let nodes = self
            .nodes()
            .map(|entry| NodeDocument {
                id: entry.id(),
                label: entry.label().to_string(),
                kind: entry.kind().to_string(),
                params: entry.node().params(),
                ports: entry
                    .ports()
                    .iter()
                    .map(|port| {
                        let (default, sub_ports) = match port.storage() {
                            PortStorage::Flow => (None, None),
                            PortStorage::Fixed(slot) => {
                                let default = slot.default_value();
                                ((!default.is_null()).then(|| default.clone()), None)
                            }
                            PortStorage::Dynamic(slots) => {
                                (None, Some(slots.iter().map(|s| s.default_value().clone()).collect()))
                            }
                        };
                        PortDocument {
                            field: port.field().to_string(),
                            default,
                            sub_ports,
                            links: port.links().to_vec(),
                        }
                    })
                    .collect(),
            })
            .collect();

        BlueprintDocument {
            id: self.id().to_string(),
            name: self.name().to_string(),
            root: self.root(),
            nodes,
        }
    }

    /// Rebuilds a blueprint, creating each node through `registry`.
    ///
    /// Node ids and link GUIDs are kept. Ports the current node declarations
    /// no longer have, and links that no longer resolve, are dropped and
    /// listed in the returned report.
    pub fn from_document(doc: BlueprintDocument, registry: &NodeRegistry) -> GraphResult<(Blueprint, PruneReport)> {
        let limit = doc.nodes.len() + MAX_ID_GAP;
        if let Some(node) = doc.nodes.iter().find(|n| n.id.0 as usize >= limit) {
            return Err(GraphError::Document(format!(
                "node id {} out of range for {} nodes",
                node.id,
                doc.nodes.len()
            )));
        }

        let mut blueprint = Blueprint::new(&doc.id, &doc.name);
        let mut report = PruneReport::default();

        for node in &doc.nodes {
            let prepared = registry.prepare(&node.kind, node.params.clone())?;
            blueprint.insert_node(node.id, &node.label, prepared)?;
        }

        for node in doc.nodes {
            for port in node.ports {
                if blueprint.port(node.id, &port.field).is_err() {
                    for link in &port.links {
                        warn!(node = %node.id, field = %port.field, link = %link.id(), "port no longer declared, dropping link");
                        report.removed.push(PrunedLink {
                            id: link.id(),
                            owner: node.id,
                            field: port.field.clone(),
                            target_node: link.target_node(),
                            target_field: link.target_field().to_string(),
                        });
                    }
                    continue;
                }
                if let Some(defaults) = port.sub_ports {
                    if let Err(e) = blueprint.restore_sub_ports(node.id, &port.field, defaults) {
                        warn!(node = %node.id, field = %port.field, error = %e, "stored sub-ports ignored");
                    }
                }
                if let Some(default) = port.default {
                    if let Err(e) = blueprint.set_default(node.id, &port.field, default) {
                        warn!(node = %node.id, field = %port.field, error = %e, "stored default ignored");
                    }
                }
                for link in port.links {
                    blueprint.restore_link(node.id, &port.field, link)?;
                }
            }
        }

        if let Some(root) = doc.root {
            blueprint
                .set_root(root)
                .map_err(|_| GraphError::Document(format!("root {} is not a node", root)))?;
        }

        report.merge(blueprint.resync());
        Ok((blueprint, report))
    }
}
