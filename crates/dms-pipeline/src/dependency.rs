//! # Resource Dependency Levels
//!
//! Orders resources for writes and bulk loads: a resource's level is one
//! more than the highest level among the resources it references, and 1
//! when it references none.
//!
//! Only non-descriptor references count. Two abstract superclasses are
//! resolved to a concrete representative before lookup:
//!
//! | Referenced | Resolved to |
//! |---|---|
//! | `EducationOrganization` | `School` |
//! | `GeneralStudentProgramAssociation` | `StudentProgramAssociation` |
//!
//! References to resources that are not part of the document set are
//! ignored.

use std::collections::BTreeMap;

use dms_core::{ProjectName, ResourceName};
use dms_schema::ApiSchemaDocuments;
use serde::{Deserialize, Serialize};

const SUBSTITUTIONS: [(&str, &str); 2] = [
    ("EducationOrganization", "School"),
    ("GeneralStudentProgramAssociation", "StudentProgramAssociation"),
];

/// Operations every ordered resource supports.
const OPERATIONS: [&str; 2] = ["Create", "Update"];

/// Compute a level for every key of `graph`.
///
/// Edges to keys missing from `graph` are ignored. A key currently being
/// visited counts as level 0, so cycles terminate and a self-reference
/// adds nothing.
pub fn dependency_levels<K: Ord + Clone>(graph: &BTreeMap<K, Vec<K>>) -> BTreeMap<K, usize> {
    let mut levels = BTreeMap::new();
    for key in graph.keys() {
        visit(key, graph, &mut levels);
    }
    levels
}

fn visit<K: Ord + Clone>(
    key: &K,
    graph: &BTreeMap<K, Vec<K>>,
    levels: &mut BTreeMap<K, usize>,
) -> usize {
    if let Some(&level) = levels.get(key) {
        return level;
    }
    levels.insert(key.clone(), 0);

    let deepest = graph
        .get(key)
        .into_iter()
        .flatten()
        .filter(|dep| graph.contains_key(*dep))
        .map(|dep| visit(dep, graph, levels))
        .max()
        .unwrap_or(0);

    let level = deepest + 1;
    levels.insert(key.clone(), level);
    level
}

/// One entry of the load order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceDependency {
    /// `/{projectEndpoint}/{resourceEndpoint}`
    pub resource: String,
    pub order: usize,
    pub operations: Vec<String>,
}

/// Derives the load order from a document set.
#[derive(Debug, Default, Clone, Copy)]
pub struct DependencyCalculator;

type ResourceKey = (ProjectName, ResourceName);

impl DependencyCalculator {
    pub fn new() -> Self {
        Self
    }

    /// Every resource with its level, sorted by `(order, resource)`.
    pub fn resource_load_order(&self, documents: &ApiSchemaDocuments) -> Vec<ResourceDependency> {
        let mut graph: BTreeMap<ResourceKey, Vec<ResourceKey>> = BTreeMap::new();
        let mut paths: BTreeMap<ResourceKey, String> = BTreeMap::new();

        for (project, endpoint, schema) in documents.all_resources() {
            let key = (project.project_name.clone(), schema.resource_name.clone());
            let deps = schema
                .document_references()
                .filter_map(|reference| {
                    let target = reference.resource_name.as_ref()?;
                    let target_project = reference
                        .project_name
                        .clone()
                        .unwrap_or_else(|| project.project_name.clone());
                    Some((target_project, substitute(target)))
                })
                .collect();
            graph.insert(key.clone(), deps);
            paths.insert(key, format!("/{}/{}", project.project_endpoint_name, endpoint));
        }

        let levels = dependency_levels(&graph);
        let mut order: Vec<ResourceDependency> = levels
            .into_iter()
            .filter_map(|(key, level)| {
                Some(ResourceDependency {
                    resource: paths.get(&key)?.clone(),
                    order: level,
                    operations: OPERATIONS.iter().map(|op| op.to_string()).collect(),
                })
            })
            .collect();
        order.sort_by(|a, b| (a.order, &a.resource).cmp(&(b.order, &b.resource)));

        tracing::debug!(resources = order.len(), "computed resource load order");
        order
    }
}

fn substitute(resource: &ResourceName) -> ResourceName {
    SUBSTITUTIONS
        .iter()
        .find(|(from, _)| *from == resource.as_str())
        .map(|(_, to)| ResourceName::new(*to))
        .unwrap_or_else(|| resource.clone())
}
