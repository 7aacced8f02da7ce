//! The open set of values a store accepts.
//!
//! An [`Action`] describes an intended state transition. It is a marker trait:
//! there are no required fields, and types opt in explicitly so it is obvious at
//! the definition site that a struct is meant to be dispatched.
//!
//! ```ignore
//! #[derive(Debug)]
//! struct Increment { by: i64 }
//! impl Action for Increment {}
//!
//! let store = Store::new(0i64, |count, action| match action.downcast_ref::<Increment>() {
//!     Some(inc) => count + inc.by,
//!     None => *count,
//! });
//! store.dispatch(Increment { by: 2 });
//! ```

use std::any::{Any, TypeId};
use std::fmt;

/// Marker trait for anything that can be dispatched to a store.
///
/// Actions are shared behind an `Arc` once dispatched and are never mutated
/// afterwards, so they must be `Send + Sync`.
pub trait Action: AsAny + Send + Sync + fmt::Debug + 'static {}

/// Type-erasure helper so mutators can recover the concrete action type.
///
/// Implemented for every `'static` type; not meant to be implemented by hand.
#[doc(hidden)]
pub trait AsAny {
    fn as_any(&self) -> &dyn Any;

    fn concrete_type_name(&self) -> &'static str;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn concrete_type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }
}

impl<'a> dyn Action + 'a {
    /// Downcast to a concrete action type.
    pub fn downcast_ref<T: Action>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    /// Check whether this action is of type `T`.
    pub fn is<T: Action>(&self) -> bool {
        self.as_any().is::<T>()
    }

    /// `TypeId` of the concrete action.
    pub fn action_type_id(&self) -> TypeId {
        self.as_any().type_id()
    }

    /// Human-readable name of the concrete action type (for logging).
    pub fn type_name(&self) -> &'static str {
        self.concrete_type_name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[derive(Debug, Clone, PartialEq)]
    struct Rename {
        to: String,
    }
    impl Action for Rename {}

    #[derive(Debug)]
    struct Reset;
    impl Action for Reset {}

    #[test]
    fn test_downcast_to_concrete_type() {
        let action: Arc<dyn Action> = Arc::new(Rename {
            to: "ada".to_string(),
        });

        let rename = action.downcast_ref::<Rename>();
        assert_eq!(
            rename,
            Some(&Rename {
                to: "ada".to_string()
            })
        );
        assert!(action.downcast_ref::<Reset>().is_none());
    }

    #[test]
    fn test_is_checks_concrete_type() {
        let action: &dyn Action = &Reset;

        assert!(action.is::<Reset>());
        assert!(!action.is::<Rename>());
        assert_eq!(action.action_type_id(), TypeId::of::<Reset>());
    }

    #[test]
    fn test_type_name_names_concrete_type() {
        let action: Box<dyn Action> = Box::new(Reset);
        assert!(action.type_name().ends_with("Reset"));
    }

    #[test]
    fn test_debug_goes_through_trait_object() {
        let action: Arc<dyn Action> = Arc::new(Rename {
            to: "grace".to_string(),
        });
        let debug = format!("{:?}", action);
        assert!(debug.contains("Rename"));
        assert!(debug.contains("grace"));
    }
}
