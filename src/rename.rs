/// Rewrites `name` from below `source_path` to below `target_path`.
///
/// Both paths are compared without their surrounding slashes, and matching
/// only happens on whole path segments. When `name` is the selector itself
/// (a single parameter rather than a subtree) the parent of the selector is
/// replaced, so the leaf name survives under the target path.
///
/// Names that do not live under `source_path` are returned unchanged, as is
/// every name when there is no target path.
pub fn rename_parameter(name: &str, source_path: &str, target_path: Option<&str>) -> String {
    let target = match target_path {
        Some(t) if !t.is_empty() => t.trim_matches('/'),
        _ => return name.to_string(),
    };
    let source = source_path.trim_matches('/');

    let anchor = if !source.is_empty() && name.trim_matches('/') == source {
        match source.rfind('/') {
            Some(i) => &source[..i],
            None => "",
        }
    } else {
        source
    };

    let relative = name.strip_prefix('/').unwrap_or(name);
    let rest = if anchor.is_empty() {
        Some(relative)
    } else {
        relative
            .strip_prefix(anchor)
            .and_then(|r| r.strip_prefix('/'))
    };

    match rest {
        Some(rest) if target.is_empty() => format!("/{}", rest),
        Some(rest) => format!("/{}/{}", target, rest),
        None => name.to_string(),
    }
}
