//! Canned guest outputs for E2E tests.
//!
//! Builders for the JSON and text the guest tools print, shared by the
//! simulated VM and by tests that script a guest by hand.

use serde_json::{Value, json};

/// Store path prefix used for generated launch wrappers.
pub const STORE_HASH: &str = "/nix/store/0a1b2c3d4e5f";

/// Sway tree with one workspace holding `windows` as `(title, app_id)` pairs.
pub fn sway_tree(windows: &[(&str, &str)]) -> String {
    let nodes: Vec<Value> = windows
        .iter()
        .enumerate()
        .map(|(i, (name, app_id))| {
            json!({ "id": 10 + i, "name": name, "type": "con", "app_id": app_id, "nodes": [] })
        })
        .collect();
    json!({
        "id": 1,
        "name": "root",
        "type": "root",
        "nodes": [
            { "id": 2, "name": "__i3", "type": "output", "nodes": [] },
            { "id": 3, "name": "1", "type": "workspace", "nodes": nodes, "floating_nodes": [] }
        ]
    })
    .to_string()
}

/// Path of the `<name>-start` wrapper in the store.
pub fn wrapper_path(name: &str) -> String {
    format!("{STORE_HASH}-{name}-start/bin/{name}-start")
}

/// Record in the older shape: fields under `config`, enablements under `confinement`.
pub fn confined_record(name: &str, enablements: u8) -> Value {
    json!({
        "instance": [0, 1, 2, 3],
        "pid": 4242,
        "config": {
            "id": "",
            "path": wrapper_path(name),
            "args": [format!("{name}-start")],
            "confinement": {
                "app_id": 4,
                "enablements": enablements,
                "username": "chronos"
            }
        }
    })
}

/// Record in the newer shape: one store path argument, enablements beside it.
pub fn package_record(prefix: &str, name: &str, enablements: u8) -> Value {
    json!({
        "pid": 4242,
        "config": {
            "args": [format!("{STORE_HASH}-{prefix}-{name}-1.0/bin/{name}")],
            "enablements": enablements
        }
    })
}

/// Listing keyed by instance id, as printed by `--json ps`.
pub fn keyed_listing(records: &[Value]) -> String {
    let map: serde_json::Map<String, Value> = records
        .iter()
        .enumerate()
        .map(|(i, r)| (format!("{:032x}", i + 1), r.clone()))
        .collect();
    Value::Object(map).to_string()
}

/// `getfacl --numeric` output granting `subjects` traversal.
pub fn acl_listing(subjects: &[u32]) -> String {
    let mut out = String::from("user::rwx\n");
    for subject in subjects {
        out.push_str(&format!("user:{subject}:--x\n"));
    }
    out.push_str("group::r-x\nmask::r-x\nother::---\n");
    out
}

/// Message the setuid helper prints for a user missing from its configuration.
pub fn deny_output(helper: &str, uid: u32) -> String {
    format!("{helper}: uid {uid} is not in the {helper}rc file\n")
}

/// The same message followed by the tool's verbose error line.
pub fn deny_output_verbose(tool: &str, helper: &str, uid: u32) -> String {
    format!(
        "{}{tool}: *cannot obtain uid from {helper}: permission denied\n",
        deny_output(helper, uid)
    )
}
