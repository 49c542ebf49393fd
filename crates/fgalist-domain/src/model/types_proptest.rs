//! Property-based tests for subject and object parsing.

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use crate::model::{Object, User};

    fn object_strategy() -> impl Strategy<Value = String> {
        ("[a-z]{1,10}", "[a-z0-9_-]{1,20}").prop_map(|(t, id)| format!("{t}:{id}"))
    }

    fn userset_strategy() -> impl Strategy<Value = String> {
        ("[a-z]{1,10}", "[a-z0-9]{1,10}", "[a-z_]{1,10}")
            .prop_map(|(t, id, rel)| format!("{t}:{id}#{rel}"))
    }

    proptest! {
        #[test]
        fn test_object_subject_key_is_stable(raw in object_strategy()) {
            let user = User::parse(&raw);
            prop_assert!(user.is_ok(), "failed for: {}", raw);
            prop_assert_eq!(user.unwrap().to_string(), raw.clone());
            prop_assert!(Object::parse(&raw).is_ok());
        }

        #[test]
        fn test_userset_subject_carries_relation(raw in userset_strategy()) {
            let user = User::parse(&raw).unwrap();
            prop_assert!(user.relation().is_some());
            prop_assert_eq!(user.to_string(), raw.clone());
            prop_assert!(Object::parse(&raw).is_err());
        }

        #[test]
        fn test_wildcard_subject_for_any_type(t in "[a-z]{1,10}") {
            let user = User::parse(&format!("{t}:*")).unwrap();
            prop_assert!(user.is_wildcard());
            prop_assert_eq!(user.user_type(), t.as_str());
        }

        #[test]
        fn test_strings_without_colon_are_rejected(raw in "[a-z0-9]{1,20}") {
            prop_assert!(User::parse(&raw).is_err());
            prop_assert!(Object::parse(&raw).is_err());
        }
    }
}
