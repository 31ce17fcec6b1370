//! Delta computation: which local artifacts still lack a remote counterpart.
//!
//! Pure functions. Matching is by display name only; content is never compared.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::artifact::{LocalArtifact, RemoteEntry};
use super::ids::LocalId;

/// Which artifacts a pass is allowed to consider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "scope", content = "local_id", rename_all = "snake_case")]
pub enum PassScope {
    /// Everything in the recording namespace.
    All,

    /// One artifact (the per-recording upload right after it was committed).
    Single(LocalId),
}

impl PassScope {
    pub fn admits(&self, artifact: &LocalArtifact) -> bool {
        match self {
            PassScope::All => true,
            PassScope::Single(id) => &artifact.local_id == id,
        }
    }
}

/// Set of names already present in the destination container.
pub fn remote_names(entries: &[RemoteEntry]) -> HashSet<&str> {
    entries.iter().map(|e| e.display_name.as_str()).collect()
}

/// `{ a ∈ local : a.display_name ∉ remote }`, in the catalog's enumeration order.
///
/// Two local artifacts with the same name are both kept; the remote store decides
/// what the second upload does.
pub fn compute_delta(
    local: Vec<LocalArtifact>,
    remote: &HashSet<&str>,
    scope: &PassScope,
) -> Vec<LocalArtifact> {
    local
        .into_iter()
        .filter(|a| scope.admits(a))
        .filter(|a| !remote.contains(a.display_name.as_str()))
        .collect()
}
