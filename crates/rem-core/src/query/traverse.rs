//! Breadth-first traversal over inline adjacency.
//!
//! The frontier is an explicit queue and every discovered key is recorded in
//! a visited map with the depth it was first reached at. A key is emitted at
//! most once, at its first (and therefore minimum) depth; later sightings are
//! suppressed. Siblings keep edge order, so ties at one depth follow
//! discovery order.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use rem_models::{Entity, GraphEdge, TraversalRow};
use rem_traits::{EdgeSource, NodeHandle, Result};
use tracing::{debug, warn};

/// Scope and bounds of one traversal.
pub struct TraversalBounds<'a> {
    pub tenant_id: &'a str,
    pub user_id: Option<&'a str>,
    pub max_depth: u32,
    /// Followed relation types; `None` follows every edge.
    pub edge_types: Option<HashSet<&'a str>>,
    pub max_rows: usize,
}

impl TraversalBounds<'_> {
    fn follows(&self, rel_type: &str) -> bool {
        self.edge_types
            .as_ref()
            .is_none_or(|types| types.contains(rel_type))
    }
}

/// One typed record awaiting expansion. A key stored in several tables
/// yields one entry per table.
struct Frontier {
    node: NodeHandle,
    edges: Vec<GraphEdge>,
    depth: u32,
    path: Vec<String>,
}

impl Frontier {
    fn new(entity: Entity, depth: u32, path: Vec<String>) -> Self {
        Self {
            node: NodeHandle::from(&entity),
            edges: entity.graph_edges,
            depth,
            path,
        }
    }
}

/// Resolve a key against every source, in registration order.
///
/// The same key may live in several tables; all visible records are
/// returned.
pub async fn resolve_node(
    sources: &[Arc<dyn EdgeSource>],
    tenant_id: &str,
    entity_key: &str,
    user_id: Option<&str>,
) -> Result<Vec<Entity>> {
    let mut records = Vec::new();
    for source in sources {
        if let Some(entity) = source.resolve(tenant_id, entity_key, user_id).await? {
            records.push(entity);
        }
    }
    Ok(records)
}

/// Expand outbound edges from `start_key` level by level.
///
/// An unknown start key yields no rows. Edges pointing at keys no source can
/// resolve (or the caller cannot see) are skipped. A key found in several
/// tables is reported once, typed by the first source holding it, and the
/// edges of every record under that key are followed.
pub async fn breadth_first(
    sources: &[Arc<dyn EdgeSource>],
    start_key: &str,
    bounds: &TraversalBounds<'_>,
) -> Result<Vec<TraversalRow>> {
    let roots = resolve_node(sources, bounds.tenant_id, start_key, bounds.user_id).await?;
    if roots.is_empty() {
        debug!(start_key = %start_key, "Traversal root not found");
        return Ok(Vec::new());
    }

    let mut visited: HashMap<String, u32> = HashMap::new();
    visited.insert(start_key.to_string(), 0);

    let mut queue: VecDeque<Frontier> = roots
        .into_iter()
        .map(|root| Frontier::new(root, 0, vec![start_key.to_string()]))
        .collect();

    let mut rows = Vec::new();
    while let Some(current) = queue.pop_front() {
        if current.depth >= bounds.max_depth {
            continue;
        }

        for edge in &current.edges {
            if !bounds.follows(&edge.rel_type) || visited.contains_key(&edge.dst) {
                continue;
            }

            let next_depth = current.depth + 1;
            visited.insert(edge.dst.clone(), next_depth);

            let records =
                resolve_node(sources, bounds.tenant_id, &edge.dst, bounds.user_id).await?;
            let Some(first) = records.first() else {
                debug!(
                    from = %current.node.entity_key,
                    from_type = %current.node.entity_type,
                    dst = %edge.dst,
                    "Skipping dangling edge"
                );
                continue;
            };

            let mut path = current.path.clone();
            path.push(edge.dst.clone());

            rows.push(TraversalRow {
                depth: next_depth,
                entity_key: first.entity_key.clone(),
                entity_type: first.entity_type,
                entity_id: first.entity_id,
                rel_type: edge.rel_type.clone(),
                rel_weight: edge.weight,
                path: path.clone(),
            });

            if rows.len() >= bounds.max_rows {
                warn!(
                    start_key = %start_key,
                    max_rows = bounds.max_rows,
                    "Traversal truncated at row limit"
                );
                return Ok(rows);
            }

            queue.extend(
                records
                    .into_iter()
                    .map(|record| Frontier::new(record, next_depth, path.clone())),
            );
        }
    }

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rem_models::{EntityType, GraphEdge};

    /// In-memory table keyed by entity key.
    struct MapSource {
        entity_type: EntityType,
        entities: HashMap<String, Entity>,
    }

    impl MapSource {
        fn new(entity_type: EntityType, entities: Vec<Entity>) -> Arc<dyn EdgeSource> {
            Arc::new(Self {
                entity_type,
                entities: entities
                    .into_iter()
                    .map(|e| (e.entity_key.clone(), e))
                    .collect(),
            })
        }
    }

    #[async_trait]
    impl EdgeSource for MapSource {
        fn entity_type(&self) -> EntityType {
            self.entity_type
        }

        async fn resolve(
            &self,
            _tenant_id: &str,
            entity_key: &str,
            user_id: Option<&str>,
        ) -> Result<Option<Entity>> {
            Ok(self
                .entities
                .get(entity_key)
                .filter(|e| e.is_visible_to(user_id))
                .cloned())
        }
    }

    fn node(key: &str, edges: &[(&str, &str)]) -> Entity {
        edges.iter().fold(
            Entity::new("t1", key, EntityType::Resource),
            |entity, (dst, rel)| entity.with_edge(GraphEdge::new(*dst, *rel)),
        )
    }

    fn bounds(max_depth: u32) -> TraversalBounds<'static> {
        TraversalBounds {
            tenant_id: "t1",
            user_id: None,
            max_depth,
            edge_types: None,
            max_rows: 1_000,
        }
    }

    fn keys(rows: &[TraversalRow]) -> Vec<&str> {
        rows.iter().map(|r| r.entity_key.as_str()).collect()
    }

    #[tokio::test]
    async fn test_cycle_is_visited_once() {
        let sources = vec![MapSource::new(
            EntityType::Resource,
            vec![
                node("a", &[("b", "next")]),
                node("b", &[("c", "next")]),
                node("c", &[("a", "next"), ("b", "next")]),
            ],
        )];

        let rows = breadth_first(&sources, "a", &bounds(10)).await.unwrap();
        assert_eq!(keys(&rows), vec!["b", "c"]);
        assert_eq!(rows[1].path, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_first_visit_depth_wins() {
        // a -> b -> d and a -> d: d is reached at depth 1 first.
        let sources = vec![MapSource::new(
            EntityType::Resource,
            vec![
                node("a", &[("b", "x"), ("d", "y")]),
                node("b", &[("d", "x")]),
                node("d", &[]),
            ],
        )];

        let rows = breadth_first(&sources, "a", &bounds(5)).await.unwrap();
        assert_eq!(keys(&rows), vec!["b", "d"]);
        assert_eq!(rows[1].depth, 1);
        assert_eq!(rows[1].rel_type, "y");
    }

    #[tokio::test]
    async fn test_ties_follow_discovery_order() {
        let sources = vec![MapSource::new(
            EntityType::Resource,
            vec![
                node("root", &[("z", "r"), ("m", "r")]),
                node("z", &[("z1", "r")]),
                node("m", &[("a1", "r")]),
                node("z1", &[]),
                node("a1", &[]),
            ],
        )];

        let rows = breadth_first(&sources, "root", &bounds(5)).await.unwrap();
        assert_eq!(keys(&rows), vec!["z", "m", "z1", "a1"]);
    }

    #[tokio::test]
    async fn test_depth_bound() {
        let sources = vec![MapSource::new(
            EntityType::Resource,
            vec![
                node("a", &[("b", "r")]),
                node("b", &[("c", "r")]),
                node("c", &[("d", "r")]),
                node("d", &[]),
            ],
        )];

        let rows = breadth_first(&sources, "a", &bounds(2)).await.unwrap();
        assert_eq!(keys(&rows), vec!["b", "c"]);
        assert!(rows.iter().all(|r| r.depth <= 2));

        assert!(breadth_first(&sources, "a", &bounds(0)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_filtered_edge_prunes_descendants() {
        // d is reachable only through the filtered "attendee" edge.
        let sources = vec![MapSource::new(
            EntityType::Resource,
            vec![
                node("a", &[("b", "keep"), ("d", "attendee")]),
                node("b", &[("c", "keep")]),
                node("c", &[]),
                node("d", &[("e", "keep")]),
                node("e", &[]),
            ],
        )];
        let mut filtered = bounds(5);
        filtered.edge_types = Some(HashSet::from(["keep"]));

        let rows = breadth_first(&sources, "a", &filtered).await.unwrap();
        assert_eq!(keys(&rows), vec!["b", "c"]);
        assert!(rows.iter().all(|r| r.rel_type == "keep"));
    }

    #[tokio::test]
    async fn test_cross_table_edges_and_dangling_keys() {
        let sources = vec![
            MapSource::new(
                EntityType::Resource,
                vec![node("doc", &[("standup", "documented_in"), ("ghost", "cites")])],
            ),
            MapSource::new(
                EntityType::Moment,
                vec![Entity::new("t1", "standup", EntityType::Moment)],
            ),
        ];

        let rows = breadth_first(&sources, "doc", &bounds(3)).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].entity_type, EntityType::Moment);
    }

    #[tokio::test]
    async fn test_colliding_keys_expand_every_table() {
        // "standup" is both a resource and a moment; only the moment links on.
        let sources = vec![
            MapSource::new(
                EntityType::Resource,
                vec![Entity::new("t1", "standup", EntityType::Resource)],
            ),
            MapSource::new(
                EntityType::Moment,
                vec![
                    Entity::new("t1", "standup", EntityType::Moment)
                        .with_edge(GraphEdge::new("notes", "r")),
                ],
            ),
            MapSource::new(
                EntityType::File,
                vec![
                    Entity::new("t1", "root", EntityType::File)
                        .with_edge(GraphEdge::new("standup", "r")),
                    Entity::new("t1", "notes", EntityType::File),
                ],
            ),
        ];

        let rows = breadth_first(&sources, "root", &bounds(5)).await.unwrap();
        assert_eq!(keys(&rows), vec!["standup", "notes"]);
        assert_eq!(rows[0].entity_type, EntityType::Resource);
        assert_eq!(rows[1].depth, 2);
        assert_eq!(rows[1].path, vec!["root", "standup", "notes"]);

        let records = resolve_node(&sources, "t1", "standup", None).await.unwrap();
        let types: Vec<EntityType> = records.iter().map(|e| e.entity_type).collect();
        assert_eq!(types, vec![EntityType::Resource, EntityType::Moment]);
    }

    #[tokio::test]
    async fn test_row_limit_truncates() {
        let sources = vec![MapSource::new(
            EntityType::Resource,
            vec![
                node("a", &[("b", "r"), ("c", "r"), ("d", "r")]),
                node("b", &[]),
                node("c", &[]),
                node("d", &[]),
            ],
        )];
        let mut limited = bounds(5);
        limited.max_rows = 2;

        let rows = breadth_first(&sources, "a", &limited).await.unwrap();
        assert_eq!(keys(&rows), vec!["b", "c"]);
    }

    #[tokio::test]
    async fn test_hidden_nodes_are_skipped() {
        let private = Entity::new("t1", "secret", EntityType::Resource).with_user("alice");
        let sources = vec![MapSource::new(
            EntityType::Resource,
            vec![node("a", &[("secret", "r")]), private],
        )];
        let mut scoped = bounds(3);
        scoped.user_id = Some("bob");

        assert!(breadth_first(&sources, "a", &scoped).await.unwrap().is_empty());
        assert!(breadth_first(&sources, "missing", &bounds(3)).await.unwrap().is_empty());
    }
}
