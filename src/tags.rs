use std::io::Write;

use crate::copier::CopyError;
use crate::parameter_store::ParameterStore;
use crate::ssm_parameters::{SSMRequestError, SSMTags};

/// Changes needed to make a target tag set equal to a source tag set.
#[derive(Debug, Default, PartialEq)]
pub struct TagDiff {
    pub remove: Vec<String>,
    pub add: SSMTags,
}

impl TagDiff {
    pub fn between(source: &SSMTags, target: &SSMTags) -> Self {
        let remove = target
            .keys()
            .filter(|key| !source.contains_key(*key))
            .cloned()
            .collect();
        let add = source
            .iter()
            .filter(|(key, value)| target.get(*key) != Some(*value))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        TagDiff { remove, add }
    }

    pub fn is_empty(&self) -> bool {
        self.remove.is_empty() && self.add.is_empty()
    }

    fn added_keys(&self) -> String {
        self.add.keys().map(String::as_str).collect::<Vec<_>>().join(",")
    }
}

/// Makes the tags of `new_name` in `target` equal to those of `name` in `source`.
///
/// A target parameter that does not exist yet counts as untagged. With
/// `dry_run` the changes are only printed.
pub fn sync_tags(
    source: &dyn ParameterStore,
    target: &dyn ParameterStore,
    name: &str,
    new_name: &str,
    dry_run: bool,
    out: &mut dyn Write,
) -> Result<TagDiff, CopyError> {
    let source_tags = source
        .list_tags(name)
        .map_err(|e| CopyError::request(name, new_name, e))?;
    let target_tags = match target.list_tags(new_name) {
        Ok(tags) => tags,
        Err(SSMRequestError::ResourceNotFound { .. }) => SSMTags::new(),
        Err(e) => return Err(CopyError::request(name, new_name, e)),
    };

    let diff = TagDiff::between(&source_tags, &target_tags);
    debug!("tag changes for {}: {:?}", new_name, diff);
    if diff.is_empty() {
        return Ok(diff);
    }

    if !diff.remove.is_empty() {
        let keys = diff.remove.join(",");
        if dry_run {
            writeln!(out, "DRY-RUN: remove tags {} from {}", keys, new_name)?;
        } else {
            target
                .remove_tags(new_name, &diff.remove)
                .map_err(|e| CopyError::request(name, new_name, e))?;
            writeln!(out, "INFO: removed tags {} from {}", keys, new_name)?;
        }
    }

    if !diff.add.is_empty() {
        let keys = diff.added_keys();
        if dry_run {
            writeln!(out, "DRY-RUN: adding tags {} to {}", keys, new_name)?;
        } else {
            target
                .add_tags(new_name, &diff.add)
                .map_err(|e| CopyError::request(name, new_name, e))?;
            writeln!(out, "INFO: added tags {} to {}", keys, new_name)?;
        }
    }

    Ok(diff)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameter_store::memory::MemoryStore;

    fn tags(pairs: &[(&str, &str)]) -> SSMTags {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn diff_removes_missing_and_adds_changed() {
        let diff = TagDiff::between(&tags(&[("a", "1"), ("b", "2")]), &tags(&[("b", "9"), ("c", "3")]));
        assert_eq!(diff.remove, vec!["c".to_string()]);
        assert_eq!(diff.add, tags(&[("a", "1"), ("b", "2")]));
    }

    #[test]
    fn diff_of_equal_sets_is_empty() {
        let same = tags(&[("env", "prod")]);
        assert!(TagDiff::between(&same, &same).is_empty());
    }

    #[test]
    fn sync_removes_then_adds() {
        let source = MemoryStore::default().with("/app/db", "x", &[("a", "1"), ("b", "2")]);
        let target = MemoryStore::default().with("/app/db", "x", &[("b", "9"), ("c", "3")]);
        let mut out = Vec::new();

        sync_tags(&source, &target, "/app/db", "/app/db", false, &mut out).unwrap();

        assert_eq!(target.tags("/app/db"), tags(&[("a", "1"), ("b", "2")]));
        assert_eq!(
            *target.mutations.borrow(),
            vec!["remove-tags /app/db".to_string(), "add-tags /app/db".to_string()]
        );
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "INFO: removed tags c from /app/db\nINFO: added tags a,b to /app/db\n"
        );
    }

    #[test]
    fn sync_with_missing_target_only_previews_in_dry_run() {
        let source = MemoryStore::default().with("/app/db", "x", &[("team", "core")]);
        let target = MemoryStore::default();
        let mut out = Vec::new();

        let diff = sync_tags(&source, &target, "/app/db", "/new/db", true, &mut out).unwrap();

        assert_eq!(diff.add, tags(&[("team", "core")]));
        assert_eq!(target.mutation_count(), 0);
        assert_eq!(String::from_utf8(out).unwrap(), "DRY-RUN: adding tags team to /new/db\n");
    }

    #[test]
    fn sync_skips_calls_when_nothing_changes() {
        let source = MemoryStore::default().with("/a", "x", &[("k", "v")]);
        let target = MemoryStore::default().with("/a", "x", &[("k", "v")]);
        let mut out = Vec::new();

        assert!(sync_tags(&source, &target, "/a", "/a", false, &mut out).unwrap().is_empty());
        assert_eq!(target.mutation_count(), 0);
        assert!(out.is_empty());
    }
}
