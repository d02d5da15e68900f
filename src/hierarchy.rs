use crate::entity::{Entity, LevelKind, StatusOption};
use crate::error::MalformedHierarchy;
use lazy_static::lazy_static;
use log::{debug, warn};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeSet, HashMap, HashSet};

lazy_static! {
    // Header cells that leak into dropdown payloads when the upstream sheet is read verbatim.
    static ref PLACEHOLDER_REGEX: Regex =
        Regex::new(r"^(?:[A-Za-z]+ID_Name|Employee_Status)$").unwrap();
}

// Header cell of single-column sheets; only a header row when it is both id and label.
const VALUE_HEADER: &str = "value";

const STATUS_KEYS: [&str; 3] = ["statuses", "employeeStatuses", "creditStatuses"];
const MAPPING_KEYS: [&str; 2] = ["branchMap", "branchMappings"];
const GENERIC_ID_KEYS: [&str; 3] = ["id", "ID", "value"];
const GENERIC_LABEL_KEYS: [&str; 3] = ["name", "label", "Name"];

/// Serializable form of a [`HierarchyIndex`], used as the cached payload.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct IndexSnapshot {
    pub entities: Vec<Entity>,
    #[serde(default)]
    pub statuses: Vec<StatusOption>,
}

/// Immutable lookup structure over one report's location hierarchy.
///
/// Every parent link stored here points at an entity on a strictly shallower level,
/// so ancestor walks always terminate at a root.
#[derive(Clone, Debug, Default)]
pub struct HierarchyIndex {
    by_level: [Vec<String>; LevelKind::COUNT],
    by_id: HashMap<String, Entity>,
    children_of: HashMap<String, BTreeSet<String>>,
    statuses: Vec<StatusOption>,
    issues: Vec<MalformedHierarchy>,
}

impl HierarchyIndex {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: IndexSnapshot) -> Self {
        let mut builder = IndexBuilder::new();
        for entity in snapshot.entities {
            builder.push(entity);
        }
        for status in snapshot.statuses {
            builder.push_status(status.id, status.label);
        }
        builder.build()
    }

    pub fn snapshot(&self) -> IndexSnapshot {
        IndexSnapshot {
            entities: LevelKind::ALL
                .into_iter()
                .flat_map(|level| self.entities(level))
                .cloned()
                .collect(),
            statuses: self.statuses.clone(),
        }
    }

    pub fn get(&self, id: &str) -> Option<&Entity> {
        self.by_id.get(id)
    }

    /// All entities at `level`, in payload order.
    pub fn entities(&self, level: LevelKind) -> impl Iterator<Item = &Entity> + '_ {
        self.by_level[level.depth()]
            .iter()
            .filter_map(move |id| self.by_id.get(id))
    }

    pub fn count(&self, level: LevelKind) -> usize {
        self.by_level[level.depth()].len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty() && self.statuses.is_empty()
    }

    pub fn children(&self, id: &str) -> impl Iterator<Item = &Entity> + '_ {
        self.children_of
            .get(id)
            .into_iter()
            .flatten()
            .filter_map(move |child| self.by_id.get(child))
    }

    pub fn parent(&self, entity: &Entity) -> Option<&Entity> {
        entity.parent_id.as_deref().and_then(|id| self.by_id.get(id))
    }

    /// Ancestor chain of `id`, nearest first. Bounded by the number of levels.
    pub fn ancestors(&self, id: &str) -> Vec<&Entity> {
        let mut chain = Vec::new();
        let mut visited = HashSet::new();
        let mut current = self.by_id.get(id);

        while let Some(entity) = current {
            if chain.len() >= LevelKind::COUNT || !visited.insert(entity.id.as_str()) {
                break;
            }
            current = self.parent(entity);
            if let Some(parent) = current {
                chain.push(parent);
            }
        }

        chain
    }

    pub fn has_ancestor(&self, id: &str, ancestor_id: &str) -> bool {
        self.ancestors(id).iter().any(|a| a.id == ancestor_id)
    }

    /// Entities at `level` below `ancestor_id`, found by walking `children_of` downward.
    /// Order follows `entities(level)`.
    pub fn descendants_at(&self, ancestor_id: &str, level: LevelKind) -> Vec<&Entity> {
        let mut found = HashSet::new();
        let mut stack = vec![ancestor_id];

        while let Some(id) = stack.pop() {
            if let Some(children) = self.children_of.get(id) {
                for child in children {
                    match self.by_id.get(child) {
                        Some(entity) if entity.level == level => {
                            found.insert(entity.id.as_str());
                        }
                        Some(entity) if entity.level.is_ancestor_of(level) => {
                            stack.push(entity.id.as_str());
                        }
                        _ => {}
                    }
                }
            }
        }

        self.entities(level)
            .filter(|e| found.contains(e.id.as_str()))
            .collect()
    }

    pub fn statuses(&self) -> &[StatusOption] {
        &self.statuses
    }

    pub fn issues(&self) -> &[MalformedHierarchy] {
        &self.issues
    }
}

/// Accumulates entities in payload order and validates parent links on `build`.
#[derive(Default)]
pub struct IndexBuilder {
    entities: Vec<Entity>,
    positions: HashMap<String, usize>,
    statuses: Vec<StatusOption>,
    issues: Vec<MalformedHierarchy>,
}

impl IndexBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `entity` unless its id is already known. Returns whether it was added.
    ///
    /// A repeat at the same level may still fill in a missing parent or replace a
    /// label that was only the id.
    pub fn push(&mut self, entity: Entity) -> bool {
        if entity.id.is_empty() || is_placeholder(&entity.id, &entity.label) {
            return false;
        }

        if let Some(&pos) = self.positions.get(&entity.id) {
            let existing = &mut self.entities[pos];
            if existing.level != entity.level {
                self.issues.push(MalformedHierarchy::DuplicateId {
                    id: entity.id,
                    level: entity.level,
                    existing: existing.level,
                });
            } else {
                if existing.parent_id.is_none() {
                    existing.parent_id = entity.parent_id;
                }
                if existing.label == existing.id && entity.label != entity.id {
                    existing.label = entity.label;
                }
            }
            return false;
        }

        self.positions.insert(entity.id.clone(), self.entities.len());
        self.entities.push(entity);
        true
    }

    /// Sets the parent of `child_id` if it has none yet. First link wins.
    pub fn link(&mut self, child_id: &str, parent_id: &str) {
        if let Some(&pos) = self.positions.get(child_id) {
            let child = &mut self.entities[pos];
            if child.parent_id.is_none() {
                child.parent_id = Some(parent_id.to_string());
            }
        }
    }

    pub fn push_status(&mut self, id: impl Into<String>, label: impl Into<String>) {
        let (id, label) = (id.into(), label.into());
        if id.is_empty() || is_placeholder(&id, &label) {
            return;
        }
        if self.statuses.iter().all(|s| s.id != id) {
            self.statuses.push(StatusOption { id, label });
        }
    }

    pub fn issue(&mut self, issue: MalformedHierarchy) {
        self.issues.push(issue);
    }

    pub fn build(self) -> HierarchyIndex {
        let IndexBuilder {
            entities,
            statuses,
            mut issues,
            ..
        } = self;

        let levels: HashMap<String, LevelKind> =
            entities.iter().map(|e| (e.id.clone(), e.level)).collect();

        let mut index = HierarchyIndex {
            statuses,
            ..HierarchyIndex::default()
        };

        for mut entity in entities {
            if let Some(parent_id) = entity.parent_id.take() {
                match levels.get(&parent_id) {
                    None => issues.push(MalformedHierarchy::MissingParent {
                        id: entity.id.clone(),
                        level: entity.level,
                        parent_id,
                    }),
                    Some(&parent_level) if !parent_level.is_ancestor_of(entity.level) => {
                        issues.push(MalformedHierarchy::ParentNotAbove {
                            id: entity.id.clone(),
                            level: entity.level,
                            parent_id,
                            parent_level,
                        })
                    }
                    Some(_) => {
                        index
                            .children_of
                            .entry(parent_id.clone())
                            .or_default()
                            .insert(entity.id.clone());
                        entity.parent_id = Some(parent_id);
                    }
                }
            }

            index.by_level[entity.level.depth()].push(entity.id.clone());
            index.by_id.insert(entity.id.clone(), entity);
        }

        for issue in &issues {
            warn!("malformed hierarchy: {}", issue);
        }
        index.issues = issues;
        index
    }
}

/// Normalize a dropdown-data payload into a [`HierarchyIndex`].
///
/// Accepts every payload shape the report endpoints are known to return:
/// - a flat array of branch rows carrying `cluster` / `region` / `area` sub-objects
/// - an object with `clusters`, `regions`, `areas` and `branches` lists
/// - a `branchMap` or `branchMappings` dictionary keyed by branch label
/// - `branchToRegionMap` / `regionToBranchMap` pairs
/// - a cached [`IndexSnapshot`]
///
/// This never fails. Broken parent links degrade the entity to a root and are
/// recorded in [`HierarchyIndex::issues`]; an unreadable payload yields an empty index.
///
/// # Examples
/// ```
/// use report_console::hierarchy::build_index;
/// use report_console::entity::LevelKind;
/// use serde_json::json;
///
/// let index = build_index(&json!([
///     { "id": "B100", "name": "Andheri", "region": "North-A", "cluster": "North" }
/// ]));
/// assert_eq!(index.count(LevelKind::Branch), 1);
/// assert_eq!(index.get("B100").unwrap().parent_id.as_deref(), Some("North-A"));
/// ```
pub fn build_index(raw: &Value) -> HierarchyIndex {
    let mut builder = IndexBuilder::new();

    match raw {
        Value::Array(rows) => read_branch_rows(&mut builder, rows),
        Value::Object(map) => read_object_payload(&mut builder, map),
        Value::Null => builder.issue(MalformedHierarchy::UnrecognizedPayload(
            "payload is empty".to_string(),
        )),
        other => builder.issue(MalformedHierarchy::UnrecognizedPayload(format!(
            "expected an object or array, got {}",
            kind_of(other)
        ))),
    }

    let index = builder.build();
    debug!(
        "built hierarchy index: {} clusters, {} regions, {} areas, {} branches, {} statuses",
        index.count(LevelKind::Cluster),
        index.count(LevelKind::Region),
        index.count(LevelKind::Area),
        index.count(LevelKind::Branch),
        index.statuses().len()
    );
    index
}

#[derive(Clone, Debug)]
struct NodeRef {
    id: String,
    // An id-only reference points at an entity defined elsewhere and never creates one.
    label: Option<String>,
}

impl NodeRef {
    fn named(name: &str) -> Option<Self> {
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        Some(NodeRef {
            id: name.to_string(),
            label: Some(name.to_string()),
        })
    }
}

fn read_object_payload(builder: &mut IndexBuilder, map: &Map<String, Value>) {
    let mut recognized = false;

    if let Some(Value::Array(items)) = map.get("entities") {
        recognized = true;
        for item in items {
            match serde_json::from_value::<Entity>(item.clone()) {
                Ok(entity) => {
                    builder.push(entity);
                }
                Err(e) => debug!("skipping unreadable snapshot entity: {}", e),
            }
        }
    }

    let explicit_lists = [
        ("clusters", LevelKind::Cluster, None),
        ("regions", LevelKind::Region, Some(LevelKind::Cluster)),
        ("areas", LevelKind::Area, Some(LevelKind::Region)),
    ];
    for (key, level, parent_level) in explicit_lists {
        let Some(Value::Array(items)) = map.get(key) else {
            continue;
        };
        recognized = true;
        for item in items {
            let Some(node) = node_ref(item, Some(level)) else {
                continue;
            };
            let label = node.label.unwrap_or_else(|| node.id.clone());
            let mut entity = Entity::create(node.id, label, level);
            if let (Some(parent_level), Value::Object(fields)) = (parent_level, item) {
                entity.parent_id = first_text(fields, &level_keys(parent_level, &["Id", "ID"]));
            }
            builder.push(entity);
        }
    }

    if let Some(Value::Array(rows)) = map.get("branches") {
        recognized = true;
        read_branch_rows(builder, rows);
    }

    for key in MAPPING_KEYS {
        let Some(Value::Object(mappings)) = map.get(key) else {
            continue;
        };
        recognized = true;
        for (branch_key, details) in mappings {
            let Some(branch) = NodeRef::named(branch_key) else {
                continue;
            };
            let mut chain = Vec::new();
            if let Value::Object(fields) = details {
                for level in [LevelKind::Cluster, LevelKind::Region, LevelKind::Area] {
                    if let Some(node) = fields
                        .get(level.as_str())
                        .and_then(|v| node_ref(v, Some(level)))
                    {
                        chain.push((level, node));
                    }
                }
            }
            chain.push((LevelKind::Branch, branch));
            attach_chain(builder, &chain);
        }
    }

    if let Some(Value::Object(groups)) = map.get("regionToBranchMap") {
        recognized = true;
        for (region_key, branches) in groups {
            let Some(region) = NodeRef::named(region_key) else {
                continue;
            };
            ensure(builder, LevelKind::Region, &region);
            if let Value::Array(items) = branches {
                for item in items {
                    if let Some(branch) = branch_ref(item) {
                        attach_chain(
                            builder,
                            &[(LevelKind::Region, region.clone()), (LevelKind::Branch, branch)],
                        );
                    }
                }
            }
        }
    }

    if let Some(Value::Object(pairs)) = map.get("branchToRegionMap") {
        recognized = true;
        for (branch_key, region) in pairs {
            let (Some(branch), Some(region)) = (
                NodeRef::named(branch_key),
                node_ref(region, Some(LevelKind::Region)),
            ) else {
                continue;
            };
            attach_chain(
                builder,
                &[(LevelKind::Region, region), (LevelKind::Branch, branch)],
            );
        }
    }

    for key in STATUS_KEYS {
        let Some(Value::Array(items)) = map.get(key) else {
            continue;
        };
        recognized = true;
        for item in items {
            if let Some(node) = node_ref(item, None) {
                let label = node.label.unwrap_or_else(|| node.id.clone());
                builder.push_status(node.id, label);
            }
        }
    }

    if !recognized {
        let keys: Vec<&str> = map.keys().map(String::as_str).collect();
        builder.issue(MalformedHierarchy::UnrecognizedPayload(format!(
            "no hierarchy fields among [{}]",
            keys.join(", ")
        )));
    }
}

fn read_branch_rows(builder: &mut IndexBuilder, rows: &[Value]) {
    for row in rows {
        let Some(branch) = branch_ref(row) else {
            continue;
        };

        let mut chain = Vec::new();
        if let Value::Object(fields) = row {
            for level in [LevelKind::Cluster, LevelKind::Region, LevelKind::Area] {
                if let Some(node) = fields
                    .get(level.as_str())
                    .and_then(|v| node_ref(v, Some(level)))
                {
                    chain.push((level, node));
                } else if let Some(id) = first_text(fields, &level_keys(level, &["Id", "ID"])) {
                    chain.push((level, NodeRef { id, label: None }));
                }
            }
        }
        chain.push((LevelKind::Branch, branch));
        attach_chain(builder, &chain);
    }
}

fn branch_ref(value: &Value) -> Option<NodeRef> {
    let mut node = node_ref(value, Some(LevelKind::Branch))?;
    if node.label.is_none() {
        node.label = Some(node.id.clone());
    }
    Some(node)
}

fn ensure(builder: &mut IndexBuilder, level: LevelKind, node: &NodeRef) {
    if let Some(label) = &node.label {
        builder.push(Entity::create(&node.id, label, level));
    }
}

// `chain` runs root to leaf; each present node is linked to the nearest one above it.
fn attach_chain(builder: &mut IndexBuilder, chain: &[(LevelKind, NodeRef)]) {
    for (level, node) in chain {
        ensure(builder, *level, node);
    }
    for pair in chain.windows(2) {
        builder.link(&pair[1].1.id, &pair[0].1.id);
    }
}

fn node_ref(value: &Value, level: Option<LevelKind>) -> Option<NodeRef> {
    match value {
        Value::Object(fields) => {
            let level_id = level.and_then(|l| first_text(fields, &level_keys(l, &["ID", "Id"])));
            let level_label = level.and_then(|l| first_text(fields, &level_keys(l, &["Name"])));
            let id = level_id.or_else(|| first_text(fields, &GENERIC_ID_KEYS));
            let label = level_label.or_else(|| first_text(fields, &GENERIC_LABEL_KEYS));
            match (id, label) {
                (Some(id), label) => Some(NodeRef { id, label }),
                (None, Some(label)) => NodeRef::named(&label),
                (None, None) => None,
            }
        }
        other => text(other).and_then(|s| NodeRef::named(&s)),
    }
}

// `Branch` + ["ID"] -> ["BranchID", "branchID"]
fn level_keys(level: LevelKind, suffixes: &[&str]) -> Vec<String> {
    let lower = level.as_str();
    let mut capitalized = lower.to_string();
    capitalized[..1].make_ascii_uppercase();

    suffixes
        .iter()
        .flat_map(|suffix| [format!("{}{}", capitalized, suffix), format!("{}{}", lower, suffix)])
        .collect()
}

fn first_text<K: AsRef<str>>(fields: &Map<String, Value>, keys: &[K]) -> Option<String> {
    keys.iter()
        .find_map(|key| fields.get(key.as_ref()).and_then(text))
}

fn text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn is_placeholder(id: &str, label: &str) -> bool {
    let (id, label) = (id.trim(), label.trim());
    PLACEHOLDER_REGEX.is_match(id)
        || PLACEHOLDER_REGEX.is_match(label)
        || (id == VALUE_HEADER && label == VALUE_HEADER)
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
