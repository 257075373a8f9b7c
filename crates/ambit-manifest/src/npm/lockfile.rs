//! package-lock.json reader: rebuilds the node_modules tree in memory.
//!
//! Lockfile v2/v3 record installed packages as a flat map keyed by
//! node_modules path; v1 nests them as a tree and leaves the root's direct
//! requirements to the sibling package.json. Both shapes are normalised
//! into the same graph: nodes are installed package copies, edges are
//! declared dependencies resolved by walking up the node_modules chain.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use ambit_util::errors::{AmbitError, AmbitResult};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde_json::Value;

use crate::model::{
    DepTypes, EcosystemDetails, Manifest, NpmDetails, NpmInstance, Requirement,
};

/// One installed copy of a package.
#[derive(Debug, Clone)]
pub struct NpmNode {
    /// Key inside the lockfile `packages` map; empty for the root.
    pub lock_path: String,
    /// Directory name the copy is installed under.
    pub disk_name: String,
    /// Real package name; differs from `disk_name` for aliased installs
    /// and is only final after the rename pass.
    pub name: String,
    pub version: String,
}

/// A declared dependency edge.
#[derive(Debug, Clone)]
pub struct NpmEdge {
    /// Constraint as written (`^1.0.0`, `npm:real@^2.0.0`).
    pub spec: String,
    pub dep_types: DepTypes,
    /// On-disk (aliased) name the edge resolves through, when the spec is
    /// an `npm:` alias.
    pub known_as: Option<String>,
}

/// The reconstructed node_modules tree.
pub struct NpmGraph {
    graph: DiGraph<NpmNode, NpmEdge>,
    by_path: HashMap<String, NodeIndex>,
    root: NodeIndex,
    pub lockfile_version: u8,
}

impl NpmGraph {
    pub fn root(&self) -> &NpmNode {
        &self.graph[self.root]
    }

    pub fn node_by_path(&self, lock_path: &str) -> Option<&NpmNode> {
        self.by_path.get(lock_path).map(|&idx| &self.graph[idx])
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Direct dependencies of the node at `lock_path`.
    pub fn dependencies_of(&self, lock_path: &str) -> Vec<(&NpmNode, &NpmEdge)> {
        let Some(&idx) = self.by_path.get(lock_path) else {
            return Vec::new();
        };
        self.graph
            .edges_directed(idx, Direction::Outgoing)
            .map(|e| (&self.graph[e.target()], e.weight()))
            .collect()
    }

    /// All installed copies, grouped by real package name.
    pub fn instances(&self) -> BTreeMap<String, Vec<NpmInstance>> {
        let mut out: BTreeMap<String, Vec<NpmInstance>> = BTreeMap::new();
        for idx in self.graph.node_indices() {
            if idx == self.root {
                continue;
            }
            let node = &self.graph[idx];
            out.entry(node.name.clone()).or_default().push(NpmInstance {
                lock_path: node.lock_path.clone(),
                version: node.version.clone(),
                known_as: (node.disk_name != node.name).then(|| node.disk_name.clone()),
            });
        }
        out
    }
}

/// Read a package-lock.json into the shared manifest model.
pub fn read(path: &Path) -> AmbitResult<Manifest> {
    let graph = read_graph(path)?;

    let mut requirements = Vec::new();
    let mut groups: BTreeMap<_, Vec<String>> = BTreeMap::new();
    for (node, edge) in graph.dependencies_of(&graph.root().lock_path) {
        let mut req = Requirement::new(&node.name, &edge.spec);
        req.dep_types = edge.dep_types;
        if edge.dep_types.contains(DepTypes::DEV) {
            groups.entry(req.key()).or_default().push("dev".to_string());
        }
        if edge.dep_types.contains(DepTypes::OPTIONAL) {
            groups
                .entry(req.key())
                .or_default()
                .push("optional".to_string());
        }
        requirements.push(req);
    }

    let root = graph.root();
    Ok(Manifest {
        file_path: path.to_path_buf(),
        root: Requirement::new(&root.name, &root.version),
        requirements,
        groups,
        local_manifests: Vec::new(),
        ecosystem: EcosystemDetails::Npm(NpmDetails {
            lockfile_version: graph.lockfile_version,
            instances: graph.instances(),
        }),
    })
}

/// Read a package-lock.json into the node_modules graph.
pub fn read_graph(path: &Path) -> AmbitResult<NpmGraph> {
    let contents = std::fs::read_to_string(path).map_err(|e| AmbitError::ManifestRead {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    let doc: Value = serde_json::from_str(&contents).map_err(|e| AmbitError::ManifestRead {
        path: path.to_path_buf(),
        message: format!("invalid JSON: {e}"),
    })?;

    let lockfile_version = doc
        .get("lockfileVersion")
        .and_then(Value::as_u64)
        .unwrap_or(1) as u8;

    if doc.get("packages").is_some() {
        read_packages_shape(path, &doc, lockfile_version)
    } else {
        read_v1_shape(path, &doc, lockfile_version)
    }
}

const DEP_FIELDS: [(&str, DepTypes); 4] = [
    ("dependencies", DepTypes::PROD),
    ("devDependencies", DepTypes::DEV),
    ("optionalDependencies", DepTypes::OPTIONAL),
    ("peerDependencies", DepTypes::PEER),
];

/// v2/v3: `packages` map keyed by node_modules path.
fn read_packages_shape(path: &Path, doc: &Value, lockfile_version: u8) -> AmbitResult<NpmGraph> {
    let packages = doc
        .get("packages")
        .and_then(Value::as_object)
        .ok_or_else(|| AmbitError::ManifestRead {
            path: path.to_path_buf(),
            message: "packages is not an object".to_string(),
        })?;

    let mut graph = DiGraph::new();
    let mut by_path: HashMap<String, NodeIndex> = HashMap::new();
    let mut root = None;

    for (key, entry) in packages {
        let disk_name = disk_name_of(key);
        let name = entry
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or(&disk_name)
            .to_string();
        let node = NpmNode {
            lock_path: key.clone(),
            disk_name,
            name: if key.is_empty() {
                doc.get("name")
                    .and_then(Value::as_str)
                    .unwrap_or(&name)
                    .to_string()
            } else {
                name
            },
            version: entry
                .get("version")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        };
        let idx = graph.add_node(node);
        if key.is_empty() {
            root = Some(idx);
        }
        by_path.insert(key.clone(), idx);
    }

    let root = root.ok_or_else(|| AmbitError::ManifestRead {
        path: path.to_path_buf(),
        message: "lockfile has no root package entry".to_string(),
    })?;

    // Edges: resolve each declared name by walking up the node_modules
    // chain; the first ancestor level that owns a copy wins.
    let mut aliases: Vec<(NodeIndex, String)> = Vec::new();
    for (key, entry) in packages {
        let from = by_path[key.as_str()];
        for (field, dep_type) in DEP_FIELDS {
            let Some(deps) = entry.get(field).and_then(Value::as_object) else {
                continue;
            };
            for (dep_name, spec) in deps {
                let spec = spec.as_str().unwrap_or_default().to_string();
                let known_as = parse_alias(&spec).map(|_| dep_name.clone());
                match resolve_dep(&by_path, key, dep_name) {
                    Some(to) => {
                        if let Some(real) = parse_alias(&spec) {
                            aliases.push((to, real.to_string()));
                        }
                        graph.add_edge(
                            from,
                            to,
                            NpmEdge {
                                spec,
                                dep_types: dep_type,
                                known_as,
                            },
                        );
                    }
                    None => {
                        if dep_type.contains(DepTypes::OPTIONAL) {
                            tracing::debug!("Optional dependency {dep_name} not installed");
                        } else {
                            tracing::warn!(
                                "Dependency {dep_name} of {} is missing from the lockfile",
                                if key.is_empty() { "the root" } else { key }
                            );
                        }
                    }
                }
            }
        }
    }

    // Alias rename pass, strictly after edge construction: resolution above
    // used on-disk names.
    for (idx, real_name) in aliases {
        graph[idx].name = real_name;
    }

    Ok(NpmGraph {
        graph,
        by_path,
        root,
        lockfile_version,
    })
}

/// v1: nested `dependencies` tree; root requirements come from the sibling
/// package.json because the lockfile does not record them.
fn read_v1_shape(path: &Path, doc: &Value, lockfile_version: u8) -> AmbitResult<NpmGraph> {
    let mut graph = DiGraph::new();
    let mut by_path: HashMap<String, NodeIndex> = HashMap::new();

    let root_name = doc
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let root = graph.add_node(NpmNode {
        lock_path: String::new(),
        disk_name: root_name.clone(),
        name: root_name,
        version: doc
            .get("version")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
    });
    by_path.insert(String::new(), root);

    collect_v1_nodes(doc, "", &mut graph, &mut by_path);

    // The root's direct requirement specs live in package.json.
    let manifest_path = path.with_file_name("package.json");
    let pkg_json: Option<Value> = std::fs::read_to_string(&manifest_path)
        .ok()
        .and_then(|c| serde_json::from_str(&c).ok());
    if pkg_json.is_none() {
        tracing::warn!(
            "No readable package.json next to {}; root requirements unavailable",
            path.display()
        );
    }

    let mut aliases: Vec<(NodeIndex, String)> = Vec::new();

    // Root edges from package.json specs.
    if let Some(pkg) = &pkg_json {
        for (field, dep_type) in DEP_FIELDS {
            let Some(deps) = pkg.get(field).and_then(Value::as_object) else {
                continue;
            };
            for (dep_name, spec) in deps {
                let spec = spec.as_str().unwrap_or_default().to_string();
                let known_as = parse_alias(&spec).map(|_| dep_name.clone());
                match resolve_dep(&by_path, "", dep_name) {
                    Some(to) => {
                        if let Some(real) = parse_alias(&spec) {
                            aliases.push((to, real.to_string()));
                        }
                        graph.add_edge(
                            root,
                            to,
                            NpmEdge {
                                spec,
                                dep_types: dep_type,
                                known_as,
                            },
                        );
                    }
                    None => tracing::warn!("Dependency {dep_name} missing from v1 lockfile"),
                }
            }
        }
    }

    // Non-root edges from each node's `requires` map.
    let mut stack = vec![(String::new(), doc)];
    while let Some((prefix, value)) = stack.pop() {
        let Some(deps) = value.get("dependencies").and_then(Value::as_object) else {
            continue;
        };
        for (name, entry) in deps {
            let lock_path = if prefix.is_empty() {
                format!("node_modules/{name}")
            } else {
                format!("{prefix}/node_modules/{name}")
            };
            if let Some(requires) = entry.get("requires").and_then(Value::as_object) {
                let from = by_path[lock_path.as_str()];
                for (dep_name, spec) in requires {
                    let spec = spec.as_str().unwrap_or_default().to_string();
                    match resolve_dep(&by_path, &lock_path, dep_name) {
                        Some(to) => {
                            let known_as = parse_alias(&spec).map(|_| dep_name.clone());
                            if let Some(real) = parse_alias(&spec) {
                                aliases.push((to, real.to_string()));
                            }
                            graph.add_edge(
                                from,
                                to,
                                NpmEdge {
                                    spec,
                                    dep_types: DepTypes::PROD,
                                    known_as,
                                },
                            );
                        }
                        None => {
                            tracing::warn!("Dependency {dep_name} of {lock_path} is missing")
                        }
                    }
                }
            }
            stack.push((lock_path, entry));
        }
    }

    for (idx, real_name) in aliases {
        graph[idx].name = real_name;
    }

    Ok(NpmGraph {
        graph,
        by_path,
        root,
        lockfile_version,
    })
}

fn collect_v1_nodes(
    value: &Value,
    prefix: &str,
    graph: &mut DiGraph<NpmNode, NpmEdge>,
    by_path: &mut HashMap<String, NodeIndex>,
) {
    let Some(deps) = value.get("dependencies").and_then(Value::as_object) else {
        return;
    };
    for (name, entry) in deps {
        let lock_path = if prefix.is_empty() {
            format!("node_modules/{name}")
        } else {
            format!("{prefix}/node_modules/{name}")
        };
        let idx = graph.add_node(NpmNode {
            lock_path: lock_path.clone(),
            disk_name: name.clone(),
            name: name.clone(),
            version: entry
                .get("version")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        });
        by_path.insert(lock_path.clone(), idx);
        collect_v1_nodes(entry, &lock_path, graph, by_path);
    }
}

/// Resolve `dep_name` declared by the node at `from_path`: the first
/// ancestor node_modules level that contains a copy owns the edge.
fn resolve_dep(
    by_path: &HashMap<String, NodeIndex>,
    from_path: &str,
    dep_name: &str,
) -> Option<NodeIndex> {
    let mut base = from_path.to_string();
    loop {
        let candidate = if base.is_empty() {
            format!("node_modules/{dep_name}")
        } else {
            format!("{base}/node_modules/{dep_name}")
        };
        if let Some(&idx) = by_path.get(candidate.as_str()) {
            return Some(idx);
        }
        if base.is_empty() {
            return None;
        }
        // Strip the last node_modules/<x> segment.
        base = match base.rfind("/node_modules/") {
            Some(pos) => base[..pos].to_string(),
            None => String::new(),
        };
    }
}

/// Real package name behind an `npm:name@range` alias spec.
fn parse_alias(spec: &str) -> Option<&str> {
    let rest = spec.strip_prefix("npm:")?;
    // Scoped names contain a '@' at position 0; the version separator is
    // the last '@'.
    let at = rest.rfind('@').filter(|&i| i > 0)?;
    Some(&rest[..at])
}

/// Last path segment of a lockfile key (`node_modules/@scope/name` keeps
/// the scope).
pub(crate) fn disk_name_of(key: &str) -> String {
    match key.rfind("node_modules/") {
        Some(pos) => key[pos + "node_modules/".len()..].to_string(),
        None => key.to_string(),
    }
}
