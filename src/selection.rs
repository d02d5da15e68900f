use crate::entity::{Entity, LevelKind, StatusOption};
use crate::error::ResolverError;
use crate::hierarchy::HierarchyIndex;
use serde::{Deserialize, Serialize};

/// The current dropdown choice per level. At most one id per level.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionState {
    slots: [Option<String>; LevelKind::COUNT],
}

impl SelectionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, level: LevelKind) -> Option<&str> {
        self.slots[level.depth()].as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    /// Selected `(level, id)` pairs, root level first.
    pub fn iter(&self) -> impl Iterator<Item = (LevelKind, &str)> + '_ {
        LevelKind::ALL
            .into_iter()
            .filter_map(move |level| self.get(level).map(|id| (level, id)))
    }

    fn set(&mut self, level: LevelKind, id: &str) {
        self.slots[level.depth()] = Some(id.to_string());
    }

    fn clear(&mut self, level: LevelKind) {
        self.slots[level.depth()] = None;
    }
}

/// The levels one report form shows, e.g. Region + Branch, or the full chain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportLevels(Vec<LevelKind>);

impl ReportLevels {
    pub fn new(levels: impl IntoIterator<Item = LevelKind>) -> Self {
        let mut levels: Vec<LevelKind> = levels.into_iter().collect();
        levels.sort();
        levels.dedup();
        ReportLevels(levels)
    }

    pub fn full() -> Self {
        ReportLevels(LevelKind::ALL.to_vec())
    }

    /// For forms with no location dropdowns.
    pub fn none() -> Self {
        ReportLevels(Vec::new())
    }

    pub fn contains(&self, level: LevelKind) -> bool {
        self.0.contains(&level)
    }

    pub fn iter(&self) -> impl Iterator<Item = LevelKind> + '_ {
        self.0.iter().copied()
    }

    /// The deepest level of the report; always populated even from a broken payload.
    pub fn leaf(&self) -> Option<LevelKind> {
        self.0.last().copied()
    }
}

impl Default for ReportLevels {
    fn default() -> Self {
        Self::full()
    }
}

/// Keeps one report's cascading dropdowns consistent with a [`HierarchyIndex`].
pub struct HierarchyResolver<'a> {
    index: &'a HierarchyIndex,
    levels: ReportLevels,
}

impl<'a> HierarchyResolver<'a> {
    pub fn new(index: &'a HierarchyIndex) -> Self {
        Self::with_levels(index, ReportLevels::full())
    }

    pub fn with_levels(index: &'a HierarchyIndex, levels: ReportLevels) -> Self {
        HierarchyResolver { index, levels }
    }

    pub fn index(&self) -> &'a HierarchyIndex {
        self.index
    }

    pub fn levels(&self) -> &ReportLevels {
        &self.levels
    }

    /// Apply a dropdown change at `level`.
    ///
    /// Choosing an entity clears every deeper level and rewrites every shallower level
    /// from the entity's ancestor chain; shallower levels with no ancestor are cleared.
    /// Choosing `None` (or an empty id) clears `level` and everything below it and
    /// leaves the shallower levels alone.
    ///
    /// The result depends only on `(current, level, entity_id)`, so repeating a call
    /// yields the same state.
    pub fn select(
        &self,
        current: &SelectionState,
        level: LevelKind,
        entity_id: Option<&str>,
    ) -> Result<SelectionState, ResolverError> {
        if !self.levels.contains(level) {
            return Err(ResolverError::LevelNotInReport(level));
        }

        let entity_id = entity_id.map(str::trim).filter(|id| !id.is_empty());
        let Some(entity_id) = entity_id else {
            let mut next = current.clone();
            next.clear(level);
            for deeper in level.descendants() {
                next.clear(deeper);
            }
            return Ok(next);
        };

        let entity = self
            .index
            .get(entity_id)
            .ok_or_else(|| ResolverError::UnknownEntity(entity_id.to_string()))?;
        if entity.level != level {
            return Err(ResolverError::LevelMismatch {
                id: entity_id.to_string(),
                expected: level,
                actual: entity.level,
            });
        }

        let mut next = current.clone();
        for deeper in level.descendants() {
            next.clear(deeper);
        }
        for shallower in level.ancestors() {
            next.clear(shallower);
        }
        next.set(level, &entity.id);
        for ancestor in self.index.ancestors(&entity.id) {
            if self.levels.contains(ancestor.level) {
                next.set(ancestor.level, &ancestor.id);
            }
        }

        Ok(next)
    }

    /// Options for the dropdown at `level` given the current selection.
    ///
    /// Without a selection above `level` this is every entity at `level`. Otherwise only
    /// entities under all of the selected ancestors are returned. The value currently
    /// selected at `level` is always kept. Order follows the payload.
    pub fn options(&self, current: &SelectionState, level: LevelKind) -> Vec<&'a Entity> {
        if !self.levels.contains(level) {
            return Vec::new();
        }

        let anchors: Vec<&str> = level
            .ancestors()
            .filter(|l| self.levels.contains(*l))
            .filter_map(|l| current.get(l))
            .collect();
        let selected = current.get(level);

        self.index
            .entities(level)
            .filter(|entity| {
                anchors.is_empty()
                    || selected == Some(entity.id.as_str())
                    || anchors
                        .iter()
                        .all(|anchor| self.index.has_ancestor(&entity.id, anchor))
            })
            .collect()
    }

    pub fn status_options(&self) -> &'a [StatusOption] {
        self.index.statuses()
    }
}

/// [`HierarchyResolver::select`] over the full four-level chain.
///
/// # Examples
/// ```
/// use report_console::entity::LevelKind;
/// use report_console::hierarchy::build_index;
/// use report_console::selection::{select_at_level, SelectionState};
/// use serde_json::json;
///
/// let index = build_index(&json!([{ "id": "B101", "region": "North-A", "cluster": "North" }]));
/// let sel = select_at_level(&index, &SelectionState::new(), LevelKind::Branch, Some("B101")).unwrap();
/// assert_eq!(sel.get(LevelKind::Cluster), Some("North"));
/// assert_eq!(sel.get(LevelKind::Region), Some("North-A"));
/// ```
pub fn select_at_level(
    index: &HierarchyIndex,
    current: &SelectionState,
    level: LevelKind,
    entity_id: Option<&str>,
) -> Result<SelectionState, ResolverError> {
    HierarchyResolver::new(index).select(current, level, entity_id)
}

/// [`HierarchyResolver::options`] over the full four-level chain.
pub fn options_for<'a>(
    index: &'a HierarchyIndex,
    current: &SelectionState,
    level: LevelKind,
) -> Vec<&'a Entity> {
    HierarchyResolver::new(index).options(current, level)
}
