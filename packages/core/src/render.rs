//! Human-readable text rendering of navigator nodes, wire trees and task
//! progress.
//!
//! The output is plain text for terminals and logs. It is not a stable
//! format; scripts should use the JSON output of the CLI instead.

use crate::navigator::Description;
use crate::task::ProgressUpdate;
use crate::xml::DataNode;

/// Render a node description.
///
/// ```text
/// Service at URL: /api/space/device-management
///   Contains following collections:
///     devices  /api/space/device-management/devices
///   Contains following methods:
///     discover_devices  /api/space/device-management/discover-devices
/// ```
pub fn render_description(d: &Description) -> String {
    let mut out = format!("{} at URL: {}\n", d.kind, d.href);

    if !d.collections.is_empty() {
        out.push_str("  Contains following collections:\n");
        push_pairs(&mut out, &d.collections);
    }
    if !d.methods.is_empty() {
        out.push_str("  Contains following methods:\n");
        push_pairs(&mut out, &d.methods);
    }

    out
}

/// Render a wire tree, one element per line, two spaces per level.
///
/// ```text
/// device  href=/api/space/device-management/devices/1
///   name: sw-core-01
///   ip-address: 10.0.0.1
/// ```
pub fn render_node(node: &DataNode) -> String {
    let mut out = String::new();
    push_node(&mut out, node, 0);
    out
}

/// Render one progress update as a status line plus sub-task states.
pub fn render_progress(update: &ProgressUpdate) -> String {
    let percentage = update
        .percentage
        .map(|p| format!("  {p:.0}%"))
        .unwrap_or_default();
    let mut out = format!("task {}  [{}]{}", update.task_id, update.state, percentage);
    if let Some(status) = &update.status {
        out.push_str(&format!("  {status}"));
    }
    out.push('\n');

    for sub in &update.sub_tasks {
        let id = sub.id.as_deref().unwrap_or("-");
        out.push_str(&format!("  sub-task {id}  [{}]\n", sub.state));
    }
    out
}

// --- helpers -----------------------------------------------------------------

fn push_pairs(out: &mut String, pairs: &[(String, String)]) {
    let width = pairs.iter().map(|(name, _)| name.len()).max().unwrap_or(0);
    for (name, href) in pairs {
        out.push_str(&format!("    {name:<width$}  {href}\n"));
    }
}

fn push_node(out: &mut String, node: &DataNode, depth: usize) {
    let indent = "  ".repeat(depth);
    out.push_str(&indent);
    out.push_str(node.name());

    if node.is_leaf() && node.attributes().is_empty() {
        if let Some(text) = node.text() {
            out.push_str(": ");
            out.push_str(text);
        }
        out.push('\n');
        return;
    }

    for (name, value) in node.attributes() {
        out.push_str(&format!("  {name}={value}"));
    }
    if let Some(text) = node.text() {
        out.push_str(&format!("  \"{text}\""));
    }
    out.push('\n');

    for child in node.children() {
        push_node(out, child, depth + 1);
    }
}

// --- tests -------------------------------------------------------------------
