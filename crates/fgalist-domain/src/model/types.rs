//! Core type definitions for the authorization model.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// The id that marks a typed public wildcard (`user:*`).
pub const WILDCARD_ID: &str = "*";

/// An object identifier (e.g., "document:readme").
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Object {
    /// The type portion (e.g., "document").
    pub object_type: String,
    /// The ID portion (e.g., "readme").
    pub object_id: String,
}

impl Object {
    /// Creates a new Object from type and ID.
    pub fn new(object_type: impl Into<String>, object_id: impl Into<String>) -> Self {
        Self {
            object_type: object_type.into(),
            object_id: object_id.into(),
        }
    }

    /// Parses an object from "type:id" format.
    pub fn parse(value: &str) -> Result<Self, &'static str> {
        let (object_type, object_id) = value
            .split_once(':')
            .ok_or("object must be in 'type:id' format")?;
        if object_type.is_empty() || object_id.is_empty() {
            return Err("object type and id cannot be empty");
        }
        if object_id.contains('#') {
            return Err("object id cannot contain '#'");
        }
        Ok(Self::new(object_type, object_id))
    }
}

impl fmt::Display for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.object_type, self.object_id)
    }
}

/// A subject that holds a relation.
///
/// The `Display` form (`user:alice`, `group:eng#member`, `user:*`) is the
/// canonical key used for deduplication.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum User {
    /// A concrete subject (e.g., user:alice).
    Object { user_type: String, user_id: String },
    /// A userset reference (e.g., group:engineering#member).
    Userset {
        userset_type: String,
        userset_id: String,
        relation: String,
    },
    /// Every subject of a type (e.g., user:*).
    Wildcard { wildcard_type: String },
}

impl User {
    /// Creates a new Object variant.
    pub fn object(user_type: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self::Object {
            user_type: user_type.into(),
            user_id: user_id.into(),
        }
    }

    /// Creates a new Userset variant.
    pub fn userset(
        userset_type: impl Into<String>,
        userset_id: impl Into<String>,
        relation: impl Into<String>,
    ) -> Self {
        Self::Userset {
            userset_type: userset_type.into(),
            userset_id: userset_id.into(),
            relation: relation.into(),
        }
    }

    /// Creates a new Wildcard variant.
    pub fn wildcard(wildcard_type: impl Into<String>) -> Self {
        Self::Wildcard {
            wildcard_type: wildcard_type.into(),
        }
    }

    /// Parses `type:id`, `type:id#relation` or `type:*`.
    pub fn parse(value: &str) -> Result<Self, &'static str> {
        let (object_part, relation) = match value.split_once('#') {
            Some((object_part, relation)) => {
                if relation.is_empty() {
                    return Err("userset relation cannot be empty");
                }
                (object_part, Some(relation))
            }
            None => (value, None),
        };

        let (user_type, user_id) = object_part
            .split_once(':')
            .ok_or("user must be in 'type:id' format")?;
        if user_type.is_empty() || user_id.is_empty() {
            return Err("user type and id cannot be empty");
        }

        match (user_id, relation) {
            (WILDCARD_ID, None) => Ok(Self::wildcard(user_type)),
            (WILDCARD_ID, Some(_)) => Err("wildcard cannot carry a relation"),
            (_, Some(relation)) => Ok(Self::userset(user_type, user_id, relation)),
            (_, None) => Ok(Self::object(user_type, user_id)),
        }
    }

    /// The type of the subject.
    pub fn user_type(&self) -> &str {
        match self {
            User::Object { user_type, .. } => user_type,
            User::Userset { userset_type, .. } => userset_type,
            User::Wildcard { wildcard_type } => wildcard_type,
        }
    }

    /// The relation of a userset subject.
    pub fn relation(&self) -> Option<&str> {
        match self {
            User::Userset { relation, .. } => Some(relation),
            _ => None,
        }
    }

    /// Whether this is a typed public wildcard.
    pub fn is_wildcard(&self) -> bool {
        matches!(self, User::Wildcard { .. })
    }
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            User::Object { user_type, user_id } => write!(f, "{user_type}:{user_id}"),
            User::Userset {
                userset_type,
                userset_id,
                relation,
            } => write!(f, "{userset_type}:{userset_id}#{relation}"),
            User::Wildcard { wildcard_type } => write!(f, "{wildcard_type}:{WILDCARD_ID}"),
        }
    }
}

impl From<User> for String {
    fn from(user: User) -> Self {
        user.to_string()
    }
}

impl TryFrom<String> for User {
    type Error = &'static str;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        User::parse(&value)
    }
}

/// A condition attached to a relationship tuple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipCondition {
    /// Name of a condition defined in the model.
    pub name: String,
    /// Parameter values stored with the tuple.
    #[serde(default)]
    pub context: HashMap<String, serde_json::Value>,
}

/// A relationship tuple `object#relation@user`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TupleKey {
    /// The object of the relationship ("type:id").
    pub object: String,
    /// The relation between user and object.
    pub relation: String,
    /// The subject ("type:id", "type:id#relation" or "type:*").
    pub user: String,
    /// Optional condition that must hold for the tuple to apply.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<RelationshipCondition>,
}

impl TupleKey {
    /// Creates a new unconditioned tuple.
    pub fn new(
        object: impl Into<String>,
        relation: impl Into<String>,
        user: impl Into<String>,
    ) -> Self {
        Self {
            object: object.into(),
            relation: relation.into(),
            user: user.into(),
            condition: None,
        }
    }

    /// Attaches a condition to the tuple.
    pub fn with_condition(
        mut self,
        name: impl Into<String>,
        context: HashMap<String, serde_json::Value>,
    ) -> Self {
        self.condition = Some(RelationshipCondition {
            name: name.into(),
            context,
        });
        self
    }
}

impl fmt::Display for TupleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}@{}", self.object, self.relation, self.user)
    }
}

/// An authorization model defining types and their relations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthorizationModel {
    /// Schema version (e.g., "1.1").
    pub schema_version: String,
    /// Type definitions in the model.
    pub type_definitions: Vec<TypeDefinition>,
    /// Conditions referenced by conditional tuples.
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

impl AuthorizationModel {
    /// Creates an empty model with the given schema version.
    pub fn new(schema_version: impl Into<String>) -> Self {
        Self {
            schema_version: schema_version.into(),
            type_definitions: Vec::new(),
            conditions: Vec::new(),
        }
    }

    /// Adds a type definition.
    pub fn with_type(mut self, type_definition: TypeDefinition) -> Self {
        self.type_definitions.push(type_definition);
        self
    }

    /// Adds a condition definition.
    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Finds a condition by name.
    pub fn find_condition(&self, name: &str) -> Option<&Condition> {
        self.conditions.iter().find(|c| c.name == name)
    }
}

/// A type definition within the authorization model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeDefinition {
    /// The type name (e.g., "document", "folder").
    pub type_name: String,
    /// Relations defined on this type.
    #[serde(default)]
    pub relations: Vec<RelationDefinition>,
}

impl TypeDefinition {
    /// Creates a type with no relations.
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            relations: Vec::new(),
        }
    }

    /// Adds a relation.
    pub fn with_relation(mut self, relation: RelationDefinition) -> Self {
        self.relations.push(relation);
        self
    }
}

/// A relation definition on a type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationDefinition {
    /// The relation name.
    pub name: String,
    /// Subject types that may be directly assigned. Empty allows any.
    #[serde(default)]
    pub type_constraints: Vec<TypeConstraint>,
    /// The userset rewrite for this relation.
    pub rewrite: Userset,
}

impl RelationDefinition {
    /// Creates a relation with the given rewrite and no type constraints.
    pub fn new(name: impl Into<String>, rewrite: Userset) -> Self {
        Self {
            name: name.into(),
            type_constraints: Vec::new(),
            rewrite,
        }
    }

    /// Sets the directly related types.
    pub fn with_types<I, T>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<TypeConstraint>,
    {
        self.type_constraints = types.into_iter().map(Into::into).collect();
        self
    }
}

/// A directly related type: `user`, `user:*` or `group#member`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeConstraint {
    /// The type reference.
    pub type_name: String,
    /// Condition required on tuples of this type, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
}

impl TypeConstraint {
    /// Whether a subject of this shape is allowed by the constraint.
    pub fn allows(&self, user: &User) -> bool {
        match user {
            User::Object { user_type, .. } => self.type_name == *user_type,
            User::Wildcard { wildcard_type } => self
                .type_name
                .strip_suffix(":*")
                .is_some_and(|t| t == wildcard_type),
            User::Userset {
                userset_type,
                relation,
                ..
            } => self
                .type_name
                .split_once('#')
                .is_some_and(|(t, r)| t == userset_type && r == relation),
        }
    }
}

impl From<&str> for TypeConstraint {
    fn from(type_name: &str) -> Self {
        Self {
            type_name: type_name.to_string(),
            condition: None,
        }
    }
}

impl From<String> for TypeConstraint {
    fn from(type_name: String) -> Self {
        Self {
            type_name,
            condition: None,
        }
    }
}

/// A named condition expression.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Condition {
    /// The condition name referenced from tuples.
    pub name: String,
    /// The CEL expression.
    pub expression: String,
    /// Declared parameters; all must be bound at evaluation time.
    #[serde(default)]
    pub parameters: Vec<ConditionParameter>,
}

impl Condition {
    /// Creates a condition.
    pub fn new(
        name: impl Into<String>,
        expression: impl Into<String>,
        parameters: Vec<ConditionParameter>,
    ) -> Self {
        Self {
            name: name.into(),
            expression: expression.into(),
            parameters,
        }
    }
}

/// A typed condition parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionParameter {
    /// Parameter name as used in the expression.
    pub name: String,
    /// CEL type name (e.g., "int", "string", "timestamp").
    pub type_name: String,
}

impl ConditionParameter {
    /// Creates a parameter.
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
        }
    }
}

/// A userset defines how a relation is computed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Userset {
    /// Direct assignment (this).
    This,
    /// Computed userset from another relation on the same object.
    ComputedUserset { relation: String },
    /// Tuple to userset (relation from a related object).
    TupleToUserset {
        tupleset: String,
        computed_userset: String,
    },
    /// Union of multiple usersets.
    Union { children: Vec<Userset> },
    /// Intersection of multiple usersets.
    Intersection { children: Vec<Userset> },
    /// Exclusion (base but not subtract).
    Exclusion {
        base: Box<Userset>,
        subtract: Box<Userset>,
    },
}

impl Userset {
    /// Shorthand for a computed userset.
    pub fn computed(relation: impl Into<String>) -> Self {
        Self::ComputedUserset {
            relation: relation.into(),
        }
    }

    /// Shorthand for a tuple to userset.
    pub fn tuple_to_userset(tupleset: impl Into<String>, computed: impl Into<String>) -> Self {
        Self::TupleToUserset {
            tupleset: tupleset.into(),
            computed_userset: computed.into(),
        }
    }

    /// Shorthand for a union.
    pub fn union(children: Vec<Userset>) -> Self {
        Self::Union { children }
    }

    /// Shorthand for an intersection.
    pub fn intersection(children: Vec<Userset>) -> Self {
        Self::Intersection { children }
    }

    /// Shorthand for an exclusion.
    pub fn exclusion(base: Userset, subtract: Userset) -> Self {
        Self::Exclusion {
            base: Box::new(base),
            subtract: Box::new(subtract),
        }
    }
}
