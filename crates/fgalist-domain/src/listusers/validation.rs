//! Pre-flight checks for ListUsers requests.

use crate::error::{DomainError, DomainResult};
use crate::model::{Object, TupleKey, TypeSystem, User};

use super::types::{ListUsersRequest, UserFilter};

/// Checks a request against the model before expansion starts.
///
/// Verifies the object and relation, every user filter and every contextual
/// tuple. The first failure is returned; on success the parsed object is
/// handed back.
pub fn validate_request(
    request: &ListUsersRequest,
    type_system: &TypeSystem,
) -> DomainResult<Object> {
    let object = Object::parse(&request.object).map_err(|e| DomainError::InvalidObjectFormat {
        value: format!("{}: {}", request.object, e),
    })?;

    if !is_valid_name(&request.relation) {
        return Err(DomainError::InvalidRelationFormat {
            value: request.relation.clone(),
        });
    }

    if request.user_filters.is_empty() {
        return Err(DomainError::InvalidUserFilter {
            message: "at least one user filter is required".to_string(),
        });
    }
    for filter in &request.user_filters {
        validate_user_filter(filter, type_system)?;
    }

    type_system.get_relation(&object.object_type, &request.relation)?;

    for tuple in request.contextual_tuples.iter() {
        validate_contextual_tuple(tuple, type_system).map_err(|reason| {
            DomainError::InvalidContextualTuple {
                tuple: tuple.to_string(),
                reason,
            }
        })?;
    }

    Ok(object)
}

fn validate_user_filter(filter: &UserFilter, type_system: &TypeSystem) -> DomainResult<()> {
    if !is_valid_name(&filter.type_name) {
        return Err(DomainError::InvalidUserFilter {
            message: format!("invalid user filter type '{}'", filter.type_name),
        });
    }
    type_system.get_type(&filter.type_name)?;

    if let Some(relation) = &filter.relation {
        if !is_valid_name(relation) {
            return Err(DomainError::InvalidUserFilter {
                message: format!("invalid user filter relation '{relation}'"),
            });
        }
        type_system.get_relation(&filter.type_name, relation)?;
    }
    Ok(())
}

fn validate_contextual_tuple(tuple: &TupleKey, type_system: &TypeSystem) -> Result<(), String> {
    let object = Object::parse(&tuple.object).map_err(|e| format!("object: {e}"))?;
    if !type_system.has_type(&object.object_type) {
        return Err(format!("type '{}' is not defined", object.object_type));
    }
    if !type_system.has_relation(&object.object_type, &tuple.relation) {
        return Err(format!(
            "relation '{}' is not defined on type '{}'",
            tuple.relation, object.object_type
        ));
    }

    let user = User::parse(&tuple.user).map_err(|e| format!("user: {e}"))?;
    if !type_system.has_type(user.user_type()) {
        return Err(format!("type '{}' is not defined", user.user_type()));
    }
    if let Some(relation) = user.relation() {
        if !type_system.has_relation(user.user_type(), relation) {
            return Err(format!(
                "relation '{}' is not defined on type '{}'",
                relation,
                user.user_type()
            ));
        }
    }

    if !type_system.is_tuple_valid(&object.object_type, &tuple.relation, &user) {
        return Err(format!(
            "'{}' is not an allowed type for relation '{}#{}'",
            tuple.user, object.object_type, tuple.relation
        ));
    }

    if let Some(condition) = &tuple.condition {
        if type_system.find_condition(&condition.name).is_none() {
            return Err(format!("condition '{}' is not defined", condition.name));
        }
    }

    Ok(())
}

/// Only alphanumeric, underscore and dash, same as object types.
fn is_valid_name(value: &str) -> bool {
    !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}
