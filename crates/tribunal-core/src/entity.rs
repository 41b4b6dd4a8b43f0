//! Evaluator-neutral entity graph.
//!
//! The engine describes principals, resources and their attributes as plain
//! JSON values; an `Evaluator` implementation translates the graph into its
//! own entity store. Attribute values that point at another entity use the
//! `{"__entity": {"type": .., "id": ..}}` escape.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Fully qualified entity reference, e.g. `Coding_Agent::Tool::"bash"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityUid {
    #[serde(rename = "type")]
    pub type_name: String,
    pub id: String,
}

impl EntityUid {
    pub fn new(type_name: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            id: id.into(),
        }
    }

    /// The attribute value referencing this entity.
    pub fn to_attr(&self) -> Value {
        json!({ "__entity": { "type": self.type_name, "id": self.id } })
    }

    pub fn to_json(&self) -> Value {
        json!({ "type": self.type_name, "id": self.id })
    }
}

impl fmt::Display for EntityUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{:?}", self.type_name, self.id)
    }
}

/// One entity: identity, attributes and parent entities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub uid: EntityUid,
    pub attrs: Map<String, Value>,
    pub parents: Vec<EntityUid>,
}

impl Entity {
    pub fn new(uid: EntityUid) -> Self {
        Self {
            uid,
            attrs: Map::new(),
            parents: Vec::new(),
        }
    }

    pub fn attr(mut self, name: impl Into<String>, value: Value) -> Self {
        self.attrs.insert(name.into(), value);
        self
    }

    pub fn parent(mut self, uid: EntityUid) -> Self {
        self.parents.push(uid);
        self
    }

    pub fn to_json(&self) -> Value {
        json!({
            "uid": self.uid.to_json(),
            "attrs": self.attrs,
            "parents": self.parents.iter().map(EntityUid::to_json).collect::<Vec<_>>(),
        })
    }
}

/// The entity store for one trajectory.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityGraph {
    entities: BTreeMap<EntityUid, Entity>,
}

impl EntityGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an entity.
    pub fn upsert(&mut self, entity: Entity) {
        self.entities.insert(entity.uid.clone(), entity);
    }

    /// Insert an entity that must not exist yet. Returns `false` and leaves
    /// the graph untouched when the uid is already present.
    pub fn insert(&mut self, entity: Entity) -> bool {
        if self.entities.contains_key(&entity.uid) {
            return false;
        }
        self.entities.insert(entity.uid.clone(), entity);
        true
    }

    pub fn remove(&mut self, uid: &EntityUid) -> Option<Entity> {
        self.entities.remove(uid)
    }

    pub fn get(&self, uid: &EntityUid) -> Option<&Entity> {
        self.entities.get(uid)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    /// Every entity as a JSON array, in uid order.
    pub fn to_json(&self) -> Value {
        Value::Array(self.entities.values().map(Entity::to_json).collect())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn upsert_replaces_and_insert_refuses_duplicates() {
        let uid = EntityUid::new("A::Trajectory", "traj-1");
        let mut graph = EntityGraph::new();

        graph.upsert(Entity::new(uid.clone()).attr("step_count", json!(1)));
        graph.upsert(Entity::new(uid.clone()).attr("step_count", json!(2)));
        assert_eq!(graph.len(), 1);
        assert_eq!(graph.get(&uid).unwrap().attrs["step_count"], json!(2));

        assert!(!graph.insert(Entity::new(uid.clone())));
        assert_eq!(graph.get(&uid).unwrap().attrs["step_count"], json!(2));
    }

    #[test]
    fn entity_json_uses_reference_escape() {
        let traj = EntityUid::new("A::Trajectory", "t");
        let msg = Entity::new(EntityUid::new("A::Message", "m"))
            .attr("role", EntityUid::new("A::Role", "user").to_attr())
            .parent(traj);

        assert_eq!(
            msg.to_json(),
            json!({
                "uid": { "type": "A::Message", "id": "m" },
                "attrs": { "role": { "__entity": { "type": "A::Role", "id": "user" } } },
                "parents": [{ "type": "A::Trajectory", "id": "t" }],
            })
        );
    }
}
