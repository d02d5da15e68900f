mod common;

use common::{death_index, employee_payload, ids};
use report_console::{
    HierarchyResolver, LevelKind, ReportLevels, ResolverError, SelectionState, build_index,
    options_for, select_at_level,
};
use serde_json::json;

fn select(index: &report_console::HierarchyIndex, level: LevelKind, id: &str) -> SelectionState {
    select_at_level(index, &SelectionState::new(), level, Some(id)).unwrap()
}

#[test]
fn test_options_narrow_by_cluster() {
    let index = death_index();
    let sel = select(&index, LevelKind::Cluster, "North");

    assert_eq!(ids(options_for(&index, &sel, LevelKind::Region)), ["North-A", "North-B"]);
    assert_eq!(
        ids(options_for(&index, &sel, LevelKind::Branch)),
        ["B100", "B101", "B200"]
    );
    // Nothing selected above the root level.
    assert_eq!(
        ids(options_for(&index, &SelectionState::new(), LevelKind::Cluster)),
        ["North", "South"]
    );
}

#[test]
fn test_select_branch_fills_ancestors() {
    let index = death_index();
    let sel = select(&index, LevelKind::Branch, "B101");

    assert_eq!(sel.get(LevelKind::Cluster), Some("North"));
    assert_eq!(sel.get(LevelKind::Region), Some("North-A"));
    assert_eq!(sel.get(LevelKind::Area), None);
    assert_eq!(sel.get(LevelKind::Branch), Some("B101"));

    let branches = ids(options_for(&index, &sel, LevelKind::Branch));
    assert_eq!(branches, ["B100", "B101"]);
}

#[test]
fn test_select_is_idempotent() {
    let index = death_index();
    let start = select(&index, LevelKind::Branch, "B300");

    let once = select_at_level(&index, &start, LevelKind::Region, Some("North-B")).unwrap();
    let twice = select_at_level(&index, &once, LevelKind::Region, Some("North-B")).unwrap();
    assert_eq!(once, twice);

    let again = select_at_level(&index, &start, LevelKind::Region, Some("North-B")).unwrap();
    assert_eq!(once, again);
}

#[test]
fn test_select_clears_deeper_levels() {
    let index = death_index();
    let start = select(&index, LevelKind::Branch, "B300");

    let sel = select_at_level(&index, &start, LevelKind::Region, Some("North-A")).unwrap();
    assert_eq!(sel.get(LevelKind::Cluster), Some("North"));
    assert_eq!(sel.get(LevelKind::Region), Some("North-A"));
    assert_eq!(sel.get(LevelKind::Area), None);
    assert_eq!(sel.get(LevelKind::Branch), None);
}

#[test]
fn test_clear_keeps_shallower_levels() {
    let index = death_index();
    let start = select(&index, LevelKind::Branch, "B101");

    let sel = select_at_level(&index, &start, LevelKind::Region, None).unwrap();
    assert_eq!(sel.get(LevelKind::Cluster), Some("North"));
    assert_eq!(sel.get(LevelKind::Region), None);
    assert_eq!(sel.get(LevelKind::Branch), None);

    // An empty id behaves like a clear.
    let blank = select_at_level(&index, &start, LevelKind::Region, Some("  ")).unwrap();
    assert_eq!(blank, sel);

    let all = select_at_level(&index, &start, LevelKind::Cluster, None).unwrap();
    assert!(all.is_empty());
}

#[test]
fn test_select_rejects_unknown_and_wrong_level() {
    let index = death_index();
    let empty = SelectionState::new();

    assert_eq!(
        select_at_level(&index, &empty, LevelKind::Branch, Some("B999")),
        Err(ResolverError::UnknownEntity("B999".to_string()))
    );
    assert_eq!(
        select_at_level(&index, &empty, LevelKind::Region, Some("B100")),
        Err(ResolverError::LevelMismatch {
            id: "B100".to_string(),
            expected: LevelKind::Region,
            actual: LevelKind::Branch,
        })
    );
}

#[test]
fn test_current_selection_always_offered() {
    let index = death_index();
    // A state left over from an earlier payload: the branch no longer sits under South.
    let stale: SelectionState = serde_json::from_value(json!({
        "slots": ["South", null, null, "B101"]
    }))
    .unwrap();

    let branches = ids(options_for(&index, &stale, LevelKind::Branch));
    assert_eq!(branches, ["B101", "B300"]);
}

#[test]
fn test_orphan_branch_clears_stale_ancestors() {
    let mut payload = common::death_payload();
    payload["branches"] = json!(["B900"]);
    let index = build_index(&payload);

    let start = select(&index, LevelKind::Branch, "B100");
    let sel = select_at_level(&index, &start, LevelKind::Branch, Some("B900")).unwrap();

    assert_eq!(sel.get(LevelKind::Branch), Some("B900"));
    assert_eq!(sel.get(LevelKind::Region), None);
    assert_eq!(sel.get(LevelKind::Cluster), None);
}

#[test]
fn test_report_levels_subset() {
    let index = death_index();
    let resolver = HierarchyResolver::with_levels(
        &index,
        ReportLevels::new([LevelKind::Branch, LevelKind::Region]),
    );
    assert_eq!(resolver.levels().leaf(), Some(LevelKind::Branch));

    let sel = resolver
        .select(&SelectionState::new(), LevelKind::Branch, Some("B200"))
        .unwrap();
    assert_eq!(sel.get(LevelKind::Region), Some("North-B"));
    assert_eq!(sel.get(LevelKind::Cluster), None);

    assert_eq!(
        resolver.select(&sel, LevelKind::Cluster, Some("North")),
        Err(ResolverError::LevelNotInReport(LevelKind::Cluster))
    );
    assert!(resolver.options(&sel, LevelKind::Cluster).is_empty());

    let sel = resolver
        .select(&SelectionState::new(), LevelKind::Region, Some("North-A"))
        .unwrap();
    assert_eq!(ids(resolver.options(&sel, LevelKind::Branch)), ["B100", "B101"]);
}

#[test]
fn test_area_level_cascade() {
    let index = build_index(&employee_payload());
    let resolver = HierarchyResolver::new(&index);

    let sel = resolver
        .select(&SelectionState::new(), LevelKind::Area, Some("Pune City"))
        .unwrap();
    assert_eq!(sel.get(LevelKind::Region), Some("Pune"));
    assert_eq!(sel.get(LevelKind::Cluster), Some("West"));
    assert_eq!(ids(resolver.options(&sel, LevelKind::Branch)), ["Kothrud"]);

    let sel = resolver.select(&sel, LevelKind::Region, Some("Mumbai")).unwrap();
    assert_eq!(sel.get(LevelKind::Area), None);
    assert_eq!(ids(resolver.options(&sel, LevelKind::Area)), ["West Mumbai"]);
    assert_eq!(ids(resolver.options(&sel, LevelKind::Branch)), ["Andheri", "Bandra"]);

    let statuses: Vec<&str> = resolver.status_options().iter().map(|s| s.id.as_str()).collect();
    assert_eq!(statuses, ["Active", "Resigned"]);
}
