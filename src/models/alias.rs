//! Display alias ↔ canonical id resolution.
//!
//! The forward table maps a user-facing name to either one canonical id or a set of
//! interchangeable deployments. Sets are resolved by a uniform random pick on every call so
//! traffic spreads across them. The reverse table only inverts scalar entries: a canonical
//! id that appears inside a set has no single display name to map back to, so `swap` leaves
//! it untouched.
//!
//! When several display names point at the same scalar id, inversion keeps the last one in
//! table order (display names sort ascending). `swap(resolve(name)) == name` therefore holds
//! only for that last name; the others swap back to it.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// What a display alias points at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AliasTarget {
    Scalar(String),
    Alternatives(Vec<String>),
}

impl AliasTarget {
    /// Every canonical id this target may resolve to.
    pub fn candidates(&self) -> &[String] {
        match self {
            AliasTarget::Scalar(id) => std::slice::from_ref(id),
            AliasTarget::Alternatives(ids) => ids,
        }
    }
}

impl From<&str> for AliasTarget {
    fn from(id: &str) -> Self {
        AliasTarget::Scalar(id.to_string())
    }
}

impl From<String> for AliasTarget {
    fn from(id: String) -> Self {
        AliasTarget::Scalar(id)
    }
}

impl From<Vec<String>> for AliasTarget {
    fn from(ids: Vec<String>) -> Self {
        AliasTarget::Alternatives(ids)
    }
}

impl From<Vec<&str>> for AliasTarget {
    fn from(ids: Vec<&str>) -> Self {
        AliasTarget::Alternatives(ids.into_iter().map(str::to_string).collect())
    }
}

/// Forward alias table, keyed by display name.
pub type AliasTable = BTreeMap<String, AliasTarget>;

/// Immutable forward + reverse alias maps, built together once.
#[derive(Debug, Clone, Default)]
pub struct AliasResolver {
    forward: BTreeMap<String, AliasTarget>,
    reverse: HashMap<String, String>,
}

impl AliasResolver {
    pub fn new<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<AliasTarget>,
    {
        let mut forward = BTreeMap::new();
        for (display, target) in entries {
            let target = match target.into() {
                // An empty set can never resolve; treat the alias as absent.
                AliasTarget::Alternatives(ids) if ids.is_empty() => continue,
                other => other,
            };
            forward.insert(display.into(), target);
        }

        // Later entries overwrite earlier ones for a shared canonical id.
        let mut reverse = HashMap::new();
        for (display, target) in &forward {
            if let AliasTarget::Scalar(id) = target {
                reverse.insert(id.clone(), display.clone());
            }
        }

        Self { forward, reverse }
    }

    pub fn from_table(table: &AliasTable) -> Self {
        Self::new(table.iter().map(|(k, v)| (k.clone(), v.clone())))
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }

    pub fn len(&self) -> usize {
        self.forward.len()
    }

    pub fn target(&self, display: &str) -> Option<&AliasTarget> {
        self.forward.get(display)
    }

    /// Display name → canonical id. Unknown names pass through unchanged.
    pub fn resolve(&self, name: &str) -> String {
        match self.forward.get(name) {
            None => name.to_string(),
            Some(AliasTarget::Scalar(id)) => id.clone(),
            Some(AliasTarget::Alternatives(ids)) => {
                let pick = rand::rng().random_range(0..ids.len());
                ids[pick].clone()
            }
        }
    }

    /// Canonical id → display name, for scalar aliases only. Falls back to `name`.
    pub fn swap(&self, name: &str) -> String {
        self.reverse
            .get(name)
            .cloned()
            .unwrap_or_else(|| name.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn resolver() -> AliasResolver {
        AliasResolver::new([
            ("gpt-4o", AliasTarget::from("gpt-4o-2024-08-06")),
            ("flux", AliasTarget::from("black-forest-labs/FLUX.1-schnell")),
            (
                "llama-3.3-70b",
                AliasTarget::from(vec![
                    "meta/llama-3.3-70b-instruct",
                    "llama-3.3-70b-versatile",
                    "Llama-3.3-70B-Instruct-Turbo",
                ]),
            ),
        ])
    }

    #[test]
    fn unknown_names_pass_through() {
        let r = resolver();
        assert_eq!(r.resolve("some-canonical-id"), "some-canonical-id");
        assert_eq!(r.swap("nobody-knows"), "nobody-knows");
    }

    #[test]
    fn scalar_resolution_is_deterministic() {
        let r = resolver();
        for _ in 0..50 {
            assert_eq!(r.resolve("gpt-4o"), "gpt-4o-2024-08-06");
        }
    }

    #[test]
    fn alternatives_cover_every_candidate_and_nothing_else() {
        let r = resolver();
        let allowed: HashSet<&str> = r
            .target("llama-3.3-70b")
            .unwrap()
            .candidates()
            .iter()
            .map(String::as_str)
            .collect();

        let mut seen = HashSet::new();
        for _ in 0..500 {
            let id = r.resolve("llama-3.3-70b");
            assert!(allowed.contains(id.as_str()), "unexpected id {}", id);
            seen.insert(id);
        }
        assert_eq!(seen.len(), allowed.len());
    }

    #[test]
    fn swap_inverts_scalar_aliases() {
        let r = resolver();
        for name in ["gpt-4o", "flux"] {
            assert_eq!(r.swap(&r.resolve(name)), name);
        }
    }

    #[test]
    fn alternatives_are_excluded_from_reverse_map() {
        let r = resolver();
        assert_eq!(
            r.swap("llama-3.3-70b-versatile"),
            "llama-3.3-70b-versatile"
        );
    }

    #[test]
    fn shared_canonical_id_swaps_to_last_display_name() {
        let r = AliasResolver::new([("gpt-4o-latest", "gpt-4o"), ("4o", "gpt-4o")]);
        assert_eq!(r.swap("gpt-4o"), "gpt-4o-latest");
        assert_eq!(r.swap(&r.resolve("gpt-4o-latest")), "gpt-4o-latest");
        // The shadowed name does not round-trip.
        assert_eq!(r.swap(&r.resolve("4o")), "gpt-4o-latest");
    }

    #[test]
    fn empty_alternatives_are_dropped() {
        let r = AliasResolver::new([("ghost", AliasTarget::Alternatives(vec![]))]);
        assert!(r.is_empty());
        assert_eq!(r.resolve("ghost"), "ghost");
    }

    #[test]
    fn builds_from_yaml_table() {
        let table: AliasTable =
            serde_yaml::from_str("a: one\nb:\n  - two\n  - three\n").unwrap();
        let r = AliasResolver::from_table(&table);
        assert_eq!(r.resolve("a"), "one");
        assert_eq!(r.swap("one"), "a");
        assert!(["two", "three"].contains(&r.resolve("b").as_str()));
    }
}
