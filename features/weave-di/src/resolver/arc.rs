use std::{any::type_name, sync::Arc};

use crate::{
    errors::RequireError,
    resolver::{Resolver, Slot, SlotValue},
    types::Injectable,
};

impl<T: Injectable> Resolver for Arc<T> {
    fn resolve(slot: &Slot) -> Result<Self, RequireError> {
        let instance = match &slot.value {
            SlotValue::Value(instance) => instance,
            SlotValue::Empty => return Err(RequireError::NoValue(slot.token)),
            SlotValue::Absent => return Err(RequireError::Absent(slot.token)),
        };

        instance
            .downcast::<T>()
            .map_err(|actual_type| RequireError::DowncastFailed {
                required_type: type_name::<T>(),
                actual_type,
            })
    }
}

impl<Resolvable: Resolver> Resolver for Option<Resolvable> {
    fn resolve(slot: &Slot) -> Result<Self, RequireError> {
        match Resolvable::resolve(slot) {
            Ok(resolved) => Ok(Some(resolved)),
            // Absent or valueless dependencies do not fail an Option
            Err(RequireError::NoValue(_) | RequireError::Absent(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{resolver::Deps, token::Token, types::Instance};

    fn deps() -> Deps {
        let bound: Token<String> = Token::new("bound");
        let absent: Token<u32> = Token::new("absent");
        let empty: Token<u32> = Token::new("empty");
        let nullable: Token<Option<u32>> = Token::new("nullable");

        let mut deps = Deps::default();
        deps.insert(
            "bound",
            Slot {
                token: bound.info(),
                value: SlotValue::Value(Instance::new("hello".to_string())),
            },
        );
        deps.insert(
            "absent",
            Slot {
                token: absent.info(),
                value: SlotValue::Absent,
            },
        );
        deps.insert(
            "empty",
            Slot {
                token: empty.info(),
                value: SlotValue::Empty,
            },
        );
        deps.insert(
            "nullable",
            Slot {
                token: nullable.info(),
                value: SlotValue::Value(Instance::new(None::<u32>)),
            },
        );
        deps
    }

    #[test]
    fn required_values_resolve() {
        let value: Arc<String> = deps().get("bound").unwrap();
        assert_eq!(value.as_str(), "hello");
    }

    #[test]
    fn absent_values_only_resolve_as_option() {
        let deps = deps();

        assert!(matches!(
            deps.get::<Arc<u32>>("absent"),
            Err(RequireError::Absent(_))
        ));
        assert!(matches!(
            deps.get::<Arc<u32>>("empty"),
            Err(RequireError::NoValue(_))
        ));
        assert!(deps.get::<Option<Arc<u32>>>("absent").unwrap().is_none());
        assert!(deps.get::<Option<Arc<u32>>>("empty").unwrap().is_none());
    }

    #[test]
    fn empty_bindings_are_bound() {
        let deps = deps();

        assert!(deps.is_bound("empty").unwrap());
        assert!(!deps.is_bound("absent").unwrap());
        assert!(deps.is_bound("bound").unwrap());
        assert!(matches!(
            deps.is_bound("missing"),
            Err(RequireError::UnknownDependency("missing"))
        ));
    }

    #[test]
    fn explicit_none_is_not_absence() {
        let value = deps().get::<Option<Arc<Option<u32>>>>("nullable").unwrap();

        let value = value.expect("bound null must be present");
        assert!(value.is_none());
    }

    #[test]
    fn wrong_type_and_unknown_names_fail() {
        let deps = deps();

        assert!(matches!(
            deps.get::<Arc<u32>>("bound"),
            Err(RequireError::DowncastFailed { .. })
        ));
        assert!(matches!(
            deps.get::<Option<Arc<u32>>>("bound"),
            Err(RequireError::DowncastFailed { .. })
        ));
        assert!(matches!(
            deps.get::<Arc<String>>("missing"),
            Err(RequireError::UnknownDependency("missing"))
        ));
    }
}
