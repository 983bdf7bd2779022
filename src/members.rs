//! Do-group family tree.
//!
//! Every generation of a do-group is a node: do-groups are laid out left to
//! right, Kick-In years top to bottom with the newest year first. Edges run
//! from a generation to the generations it descends from.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::debug;

const NODE_SIZE: u32 = 5;
const EDGE_SIZE: u32 = 1;
/// Alpha suffix of dimmed node colours
const DIMMED_ALPHA: &str = "60";

/// Answer of `/members/dogroups/data`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DogroupData {
    #[serde(default)]
    pub dogroups: Vec<String>,
    /// Years are numbers, but also used as object keys in `data`
    #[serde(default)]
    pub years: Vec<Value>,
    /// do-group name → year → generation
    #[serde(default)]
    pub data: BTreeMap<String, BTreeMap<String, Generation>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Generation {
    pub id: i64,
    #[serde(default)]
    pub parents: Vec<ParentRef>,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParentRef {
    pub id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphNode {
    pub id: i64,
    pub x: usize,
    pub y: usize,
    pub label: String,
    pub color: String,
    pub size: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphEdge {
    pub source: i64,
    pub target: i64,
    pub size: u32,
    pub hidden: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DogroupTree {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

fn year_key(year: &Value) -> String {
    match year {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl DogroupTree {
    pub fn from_data(data: &DogroupData) -> Self {
        let x_of: HashMap<&str, usize> = data
            .dogroups
            .iter()
            .enumerate()
            .map(|(x, name)| (name.as_str(), x))
            .collect();
        let y_of: HashMap<String, usize> = data
            .years
            .iter()
            .rev()
            .enumerate()
            .map(|(y, year)| (year_key(year), y))
            .collect();

        let mut tree = DogroupTree::default();
        let mut ids = HashSet::new();

        for dogroup in &data.dogroups {
            let Some(generations) = data.data.get(dogroup) else {
                continue;
            };
            for (year, generation) in generations {
                let Some(&y) = y_of.get(year) else {
                    debug!(dogroup = %dogroup, year = %year, "Generation outside the year list");
                    continue;
                };
                if !ids.insert(generation.id) {
                    continue;
                }
                tree.nodes.push(GraphNode {
                    id: generation.id,
                    x: x_of.get(dogroup.as_str()).copied().unwrap_or_default(),
                    y,
                    label: format!("{} {}", dogroup, year),
                    color: generation.color.clone(),
                    size: NODE_SIZE,
                });
            }
        }

        let mut seen = HashSet::new();
        for dogroup in &data.dogroups {
            for generation in data.data.get(dogroup).into_iter().flat_map(|g| g.values()) {
                if !ids.contains(&generation.id) {
                    continue;
                }
                for parent in &generation.parents {
                    if !ids.contains(&parent.id) {
                        debug!(child = generation.id, parent = parent.id, "Parent generation missing");
                        continue;
                    }
                    if seen.insert((generation.id, parent.id)) {
                        tree.edges.push(GraphEdge {
                            source: generation.id,
                            target: parent.id,
                            size: EDGE_SIZE,
                            hidden: false,
                        });
                    }
                }
            }
        }

        tree
    }

    /// Nodes sharing an edge with `node`, in either direction
    pub fn neighbours(&self, node: i64) -> HashSet<i64> {
        self.edges
            .iter()
            .filter_map(|e| {
                if e.source == node {
                    Some(e.target)
                } else if e.target == node {
                    Some(e.source)
                } else {
                    None
                }
            })
            .collect()
    }

    /// The tree as drawn while hovering `node`: everything that is not
    /// `node` or one of its neighbours is dimmed, edges not touching it
    /// are hidden.
    pub fn highlight(&self, node: i64) -> DogroupTree {
        let neighbours = self.neighbours(node);

        let nodes = self
            .nodes
            .iter()
            .map(|n| {
                let mut n = n.clone();
                if n.id != node && !neighbours.contains(&n.id) {
                    let base: String = n.color.chars().take(7).collect();
                    n.color = format!("{}{}", base, DIMMED_ALPHA);
                }
                n
            })
            .collect();

        let edges = self
            .edges
            .iter()
            .map(|e| GraphEdge {
                hidden: e.source != node && e.target != node,
                ..e.clone()
            })
            .collect();

        DogroupTree { nodes, edges }
    }
}
