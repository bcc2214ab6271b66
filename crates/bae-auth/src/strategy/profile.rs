//! UserInfo claims to [`AuthProfile`] normalization

use serde_json::{Map, Value};

use crate::error::AuthError;
use crate::types::{AuthProfile, Role};

/// Build a profile from UserInfo claims.
///
/// - `id`: `id`, else `sub`, else `preferred_username`
/// - `display_name`: `displayName`, else `name`, else `preferred_username`, else `username`
/// - `username`: `username`, else `preferred_username`
/// - `organizations`: as sent, else empty
/// - `roles`: as sent (objects or plain names), else one role named `default_role`
///
/// # Errors
///
/// Returns [`AuthError::ProfileFetch`] when no identifier can be derived.
pub fn normalize_profile(claims: Map<String, Value>, default_role: &str) -> Result<AuthProfile, AuthError> {
    let id = first_string(&claims, &["id", "sub", "preferred_username"]).ok_or_else(|| {
        AuthError::ProfileFetch("UserInfo response carries no subject identifier".to_string())
    })?;

    let display_name = first_string(
        &claims,
        &["displayName", "name", "preferred_username", "username"],
    );
    let username = first_string(&claims, &["username", "preferred_username"]);
    let email = first_string(&claims, &["email"]);

    let organizations = match claims.get("organizations") {
        Some(Value::Array(orgs)) => orgs.clone(),
        _ => Vec::new(),
    };

    let roles = match claims.get("roles") {
        Some(Value::Array(roles)) => roles.iter().filter_map(parse_role).collect(),
        _ => vec![Role::named(default_role)],
    };

    Ok(AuthProfile {
        id,
        username,
        display_name,
        email,
        organizations,
        roles,
        claims,
    })
}

fn first_string(claims: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match claims.get(*key) {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

fn parse_role(value: &Value) -> Option<Role> {
    match value {
        Value::String(name) => Some(Role::named(name.as_str())),
        Value::Object(role) => {
            let name = role.get("name").and_then(Value::as_str);
            let id = role.get("id").and_then(Value::as_str);
            match (id, name) {
                (Some(id), Some(name)) => Some(Role {
                    id: id.to_string(),
                    name: name.to_string(),
                }),
                (Some(single), None) | (None, Some(single)) => Some(Role::named(single)),
                (None, None) => None,
            }
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn claims(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("claims must be an object"),
        }
    }

    #[test]
    fn test_preferred_username_only() {
        let profile =
            normalize_profile(claims(json!({"preferred_username": "username"})), "seller").unwrap();

        assert_eq!(profile.id, "username");
        assert_eq!(profile.username.as_deref(), Some("username"));
        assert_eq!(profile.display_name.as_deref(), Some("username"));
        assert!(profile.organizations.is_empty());
        assert_eq!(profile.roles, vec![Role::named("seller")]);
    }

    #[test]
    fn test_sub_and_name_take_precedence() {
        let profile = normalize_profile(
            claims(json!({
                "sub": "248289761001",
                "name": "Jane Doe",
                "preferred_username": "j.doe",
                "email": "janedoe@example.com",
            })),
            "customer",
        )
        .unwrap();

        assert_eq!(profile.id, "248289761001");
        assert_eq!(profile.display_name.as_deref(), Some("Jane Doe"));
        assert_eq!(profile.username.as_deref(), Some("j.doe"));
        assert_eq!(profile.email.as_deref(), Some("janedoe@example.com"));
        assert_eq!(profile.roles, vec![Role::named("customer")]);
    }

    #[test]
    fn test_existing_fields_are_kept() {
        let profile = normalize_profile(
            claims(json!({
                "id": "u-1",
                "sub": "ignored",
                "displayName": "Display",
                "username": "user",
                "organizations": [{"id": "org-1", "name": "ACME"}],
                "roles": [{"id": "admin", "name": "Admin"}, "seller"],
            })),
            "customer",
        )
        .unwrap();

        assert_eq!(profile.id, "u-1");
        assert_eq!(profile.display_name.as_deref(), Some("Display"));
        assert_eq!(profile.username.as_deref(), Some("user"));
        assert_eq!(profile.organizations.len(), 1);
        assert_eq!(
            profile.roles,
            vec![
                Role {
                    id: "admin".to_string(),
                    name: "Admin".to_string()
                },
                Role::named("seller"),
            ]
        );
    }

    #[test]
    fn test_missing_subject_is_an_error() {
        let result = normalize_profile(claims(json!({"name": "Nobody"})), "seller");
        assert!(matches!(result, Err(AuthError::ProfileFetch(_))));
    }
}
