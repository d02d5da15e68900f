#![allow(dead_code)]

use report_console::{HierarchyIndex, build_index};
use serde_json::{Value, json};

/// Two clusters; North has regions North-A (B100, B101) and North-B (B200).
pub fn death_payload() -> Value {
    json!({
        "clusters": [
            { "id": "North", "name": "North" },
            { "id": "South", "name": "South" }
        ],
        "regions": [
            { "id": "North-A", "name": "North A", "clusterId": "North" },
            { "id": "North-B", "name": "North B", "clusterId": "North" },
            { "id": "South-A", "name": "South A", "clusterId": "South" }
        ],
        "branchMap": {
            "B100": { "cluster": { "id": "North" }, "region": { "id": "North-A" } },
            "B101": { "cluster": { "id": "North" }, "region": { "id": "North-A" } },
            "B200": { "cluster": { "id": "North" }, "region": { "id": "North-B" } },
            "B300": { "cluster": { "id": "South" }, "region": { "id": "South-A" } }
        }
    })
}

pub fn death_index() -> HierarchyIndex {
    build_index(&death_payload())
}

/// Label-keyed four-level payload with placeholder header rows.
pub fn employee_payload() -> Value {
    json!({
        "branches": [{ "label": "BranchID_Name" }, { "label": "Andheri" }, { "label": "Bandra" }, { "label": "Kothrud" }],
        "areas": [{ "label": "AreaID_Name" }, { "label": "West Mumbai" }, { "label": "Pune City" }],
        "regions": [{ "label": "RegionID_Name" }, { "label": "Mumbai" }, { "label": "Pune" }],
        "clusters": [{ "label": "ClusterID_Name" }, { "label": "West" }],
        "employeeStatuses": [{ "label": "Employee_Status" }, { "label": "Active" }, { "label": "Resigned" }],
        "branchMappings": {
            "Andheri": { "cluster": "West", "region": "Mumbai", "area": "West Mumbai" },
            "Bandra": { "cluster": "West", "region": "Mumbai", "area": "West Mumbai" },
            "Kothrud": { "cluster": "West", "region": "Pune", "area": "Pune City" }
        }
    })
}

pub fn ids<'a>(entities: impl IntoIterator<Item = &'a report_console::Entity>) -> Vec<&'a str> {
    entities.into_iter().map(|e| e.id.as_str()).collect()
}
