//! Symbolic reference resolution.
//!
//! Plans refer to nodes by id or by name. A reference is resolved by trying
//! an ordered list of [`Strategy`] functions; the first one that matches wins.
//! Containers get a longer, fuzzier list than plain targets.

use crate::scene::{NodeId, NodeKind, SceneGraph, SceneNode, is_structured_id};
use std::collections::HashMap;
use thiserror::Error;

/// Shortest common run of normalized characters the last-resort container
/// scan accepts.
const MIN_SIMILARITY: usize = 3;

/// Resolution failures. Always scoped to one operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("no node matches '{0}'")]
    NotFound(String),
    #[error("no node has id '{0}'")]
    UnknownId(String),
    #[error("'{reference}' is a {found}, expected {expected}")]
    TypeMismatch {
        reference: String,
        expected: &'static str,
        found: NodeKind,
    },
}

/// One way of matching a reference against the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    ExactId,
    BatchCache,
    ExactName,
    CaseInsensitiveName,
    /// Case, whitespace and punctuation are ignored.
    NormalizedName,
    Substring,
    /// Longest common normalized run, containers only.
    ContainerSimilarity,
}

const TARGET_STRATEGIES: &[Strategy] = &[
    Strategy::ExactId,
    Strategy::BatchCache,
    Strategy::ExactName,
    Strategy::CaseInsensitiveName,
];

const CONTAINER_STRATEGIES: &[Strategy] = &[
    Strategy::ExactId,
    Strategy::BatchCache,
    Strategy::ExactName,
    Strategy::CaseInsensitiveName,
    Strategy::NormalizedName,
    Strategy::Substring,
    Strategy::ContainerSimilarity,
];

/// What a strategy sees: the live nodes and the names created in this plan.
pub struct ResolveContext<'n, 'b> {
    pub nodes: &'n [SceneNode],
    pub batch: &'b HashMap<String, NodeId>,
}

impl Strategy {
    /// Every node this strategy accepts for `reference`, in document order.
    pub fn matches<'n>(self, reference: &str, ctx: &ResolveContext<'n, '_>) -> Vec<&'n SceneNode> {
        let nodes = ctx.nodes.iter();
        match self {
            Strategy::ExactId => nodes.filter(|n| n.id == reference).collect(),
            Strategy::BatchCache => match ctx.batch.get(reference) {
                Some(id) => nodes.filter(|n| &n.id == id).collect(),
                None => Vec::new(),
            },
            Strategy::ExactName => nodes.filter(|n| n.name == reference).collect(),
            Strategy::CaseInsensitiveName => {
                let wanted = reference.to_lowercase();
                nodes.filter(|n| n.name.to_lowercase() == wanted).collect()
            }
            Strategy::NormalizedName => {
                let wanted = normalize(reference);
                if wanted.is_empty() {
                    return Vec::new();
                }
                nodes.filter(|n| normalize(&n.name) == wanted).collect()
            }
            Strategy::Substring => {
                let wanted = normalize(reference);
                if wanted.is_empty() {
                    return Vec::new();
                }
                nodes
                    .filter(|n| {
                        let name = normalize(&n.name);
                        name.contains(&wanted) || (name.len() >= MIN_SIMILARITY && wanted.contains(&name))
                    })
                    .collect()
            }
            Strategy::ContainerSimilarity => {
                let wanted = normalize(reference);
                let mut best: Option<(&'n SceneNode, usize)> = None;
                for node in nodes.filter(|n| n.kind.is_container()) {
                    let score = longest_common_run(&wanted, &normalize(&node.name));
                    if score >= MIN_SIMILARITY && best.is_none_or(|(_, s)| score > s) {
                        best = Some((node, score));
                    }
                }
                best.map(|(node, _)| vec![node]).unwrap_or_default()
            }
        }
    }
}

/// Lowercase alphanumerics only.
fn normalize(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

fn longest_common_run(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let mut prev = vec![0usize; b.len() + 1];
    let mut best = 0;
    for ca in &a {
        let mut row = vec![0usize; b.len() + 1];
        for (j, cb) in b.iter().enumerate() {
            if ca == cb {
                row[j + 1] = prev[j] + 1;
                best = best.max(row[j + 1]);
            }
        }
        prev = row;
    }
    best
}

/// Resolves references for one plan application.
///
/// Names declared by `add` operations are remembered so later operations in
/// the same plan can refer to freshly created nodes.
#[derive(Debug, Default)]
pub struct NodeResolver {
    batch: HashMap<String, NodeId>,
}

impl NodeResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a node created in this plan under its declared name.
    pub fn remember(&mut self, name: impl Into<String>, id: NodeId) {
        self.batch.entry(name.into()).or_insert(id);
    }

    fn run<'a>(
        &self,
        reference: &str,
        nodes: &'a [SceneNode],
        strategies: &[Strategy],
        prefer_containers: bool,
    ) -> Result<&'a SceneNode, ResolveError> {
        let ctx = ResolveContext {
            nodes,
            batch: &self.batch,
        };
        for &strategy in strategies {
            let found = strategy.matches(reference, &ctx);
            let pick = if prefer_containers {
                found.iter().find(|n| n.kind.is_container()).or(found.first())
            } else {
                found.first()
            };
            if let Some(node) = pick {
                log::debug!("Resolved '{}' to {} via {:?}", reference, node.id, strategy);
                return Ok(*node);
            }
            // A structured id never falls back to name matching.
            if strategy == Strategy::ExactId && is_structured_id(reference) {
                return Err(ResolveError::UnknownId(reference.to_string()));
            }
        }
        Err(ResolveError::NotFound(reference.to_string()))
    }

    /// Resolve a node to modify or place against.
    pub fn resolve_target<S: SceneGraph + ?Sized>(
        &self,
        scene: &S,
        reference: &str,
    ) -> Result<SceneNode, ResolveError> {
        let nodes = scene.all_nodes();
        self.run(reference.trim(), &nodes, TARGET_STRATEGIES, false)
            .cloned()
    }

    /// Resolve the container a node should be appended to.
    ///
    /// The page id resolves to itself. A match that is not a container walks
    /// up to its nearest container ancestor.
    pub fn resolve_container<S: SceneGraph + ?Sized>(
        &self,
        scene: &S,
        reference: &str,
    ) -> Result<NodeId, ResolveError> {
        let reference = reference.trim();
        if scene.root().is_ok_and(|root| root == reference) {
            return Ok(reference.to_string());
        }
        let nodes = scene.all_nodes();
        let node = self.run(reference, &nodes, CONTAINER_STRATEGIES, true)?;
        if node.kind.is_container() {
            return Ok(node.id.clone());
        }

        let mut parent = node.parent_id.clone();
        while let Some(id) = parent {
            let Some(ancestor) = nodes.iter().find(|n| n.id == id) else {
                break;
            };
            if ancestor.kind.is_container() {
                log::debug!(
                    "'{}' is a {}, using enclosing {} {}",
                    reference,
                    node.kind,
                    ancestor.kind,
                    ancestor.id
                );
                return Ok(ancestor.id.clone());
            }
            parent = ancestor.parent_id.clone();
        }
        Err(ResolveError::TypeMismatch {
            reference: reference.to_string(),
            expected: "container",
            found: node.kind,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::MemoryScene;
    use kurbo::Rect;

    fn rect() -> Rect {
        Rect::new(0.0, 0.0, 10.0, 10.0)
    }

    #[test]
    fn test_exact_id_beats_name() {
        let mut scene = MemoryScene::new();
        let a = scene.insert(NodeKind::Rectangle, "A", rect());
        // A node literally named like another node's id.
        let _decoy = scene.insert(NodeKind::Rectangle, &a, rect());
        let resolver = NodeResolver::new();
        assert_eq!(resolver.resolve_target(&scene, &a).unwrap().id, a);
    }

    #[test]
    fn test_matches_outlive_the_batch_cache() {
        let mut scene = MemoryScene::new();
        let id = scene.insert(NodeKind::Frame, "Card", rect());
        let nodes = scene.all_nodes();
        let found = {
            let batch = HashMap::new();
            let ctx = ResolveContext { nodes: &nodes, batch: &batch };
            Strategy::ExactName.matches("Card", &ctx)
        };
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, id);
    }

    #[test]
    fn test_unknown_structured_id_does_not_fall_back() {
        let mut scene = MemoryScene::new();
        scene.insert(NodeKind::Rectangle, "99:1", rect());
        let resolver = NodeResolver::new();
        assert_eq!(
            resolver.resolve_target(&scene, "99:1"),
            Err(ResolveError::UnknownId("99:1".into()))
        );
    }

    #[test]
    fn test_batch_cache_beats_canvas_name() {
        let mut scene = MemoryScene::new();
        let _old = scene.insert(NodeKind::Rectangle, "Button", rect());
        let new = scene.insert(NodeKind::Rectangle, "Rectangle", rect());
        let mut resolver = NodeResolver::new();
        resolver.remember("Button", new.clone());
        assert_eq!(resolver.resolve_target(&scene, "Button").unwrap().id, new);
    }

    #[test]
    fn test_case_insensitive_target() {
        let mut scene = MemoryScene::new();
        let id = scene.insert(NodeKind::Text, "Hero Title", rect());
        let resolver = NodeResolver::new();
        assert_eq!(resolver.resolve_target(&scene, "hero title").unwrap().id, id);
        assert!(matches!(
            resolver.resolve_target(&scene, "herotitle"),
            Err(ResolveError::NotFound(_))
        ));
    }

    #[test]
    fn test_container_normalized_and_substring() {
        let mut scene = MemoryScene::new();
        let card = scene.insert(NodeKind::Frame, "Pricing Card", rect());
        let resolver = NodeResolver::new();
        assert_eq!(resolver.resolve_container(&scene, "pricing-card").unwrap(), card);
        assert_eq!(resolver.resolve_container(&scene, "pricing").unwrap(), card);
    }

    #[test]
    fn test_container_prefers_container_kinds() {
        let mut scene = MemoryScene::new();
        let _label = scene.insert(NodeKind::Text, "Header", rect());
        let frame = scene.insert(NodeKind::Frame, "Header", rect());
        let resolver = NodeResolver::new();
        assert_eq!(resolver.resolve_container(&scene, "Header").unwrap(), frame);
    }

    #[test]
    fn test_container_similarity_last_resort() {
        let mut scene = MemoryScene::new();
        let nav = scene.insert(NodeKind::Frame, "Navigation Bar", rect());
        let _footer = scene.insert(NodeKind::Frame, "Footer", rect());
        let resolver = NodeResolver::new();
        assert_eq!(resolver.resolve_container(&scene, "nav menu").unwrap(), nav);
        assert!(resolver.resolve_container(&scene, "xy").is_err());
    }

    #[test]
    fn test_container_walks_to_enclosing_container() {
        let mut scene = MemoryScene::new();
        let frame = scene.insert(NodeKind::Frame, "Card", rect());
        let _title = scene.insert_into(&frame, NodeKind::Text, "Title", rect()).unwrap();
        let resolver = NodeResolver::new();
        assert_eq!(resolver.resolve_container(&scene, "Title").unwrap(), frame);
    }

    #[test]
    fn test_top_level_non_container_is_type_mismatch() {
        let mut scene = MemoryScene::new();
        scene.insert(NodeKind::Rectangle, "Box", rect());
        let resolver = NodeResolver::new();
        assert!(matches!(
            resolver.resolve_container(&scene, "Box"),
            Err(ResolveError::TypeMismatch { found: NodeKind::Rectangle, .. })
        ));
    }

    #[test]
    fn test_page_id_is_a_container() {
        let scene = MemoryScene::new();
        let root = scene.root().unwrap();
        assert_eq!(NodeResolver::new().resolve_container(&scene, &root).unwrap(), root);
    }

    #[test]
    fn test_longest_common_run() {
        assert_eq!(longest_common_run("navmenu", "navigationbar"), 3);
        assert_eq!(longest_common_run("abc", "xyz"), 0);
        assert_eq!(normalize("Pricing - Card!"), "pricingcard");
    }
}
