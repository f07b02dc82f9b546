//! Type-erased instance values.
//!
//! Every value flowing through a compiled activation delegate is an
//! [`AnyArc`] that holds an `Arc<T>` for the value's declared type `T`.
//! Storing the `Arc<T>` itself (rather than `T`) lets the same path serve
//! concrete types and trait objects: an `Arc<dyn Logger>` is erased and
//! recovered exactly like an `Arc<ConsoleLogger>`.

use std::any::Any;
use std::sync::Arc;

/// An erased instance. Always wraps an `Arc<T>` for some `T: ?Sized`.
pub type AnyArc = Arc<dyn Any + Send + Sync>;

/// Erases a shared value so it can flow through the resolution engine.
pub fn erase<T: ?Sized + Send + Sync + 'static>(value: Arc<T>) -> AnyArc {
    Arc::new(value)
}

/// Recovers a typed view of an erased value, or `None` if it holds another type.
pub fn unerase<T: ?Sized + Send + Sync + 'static>(value: &AnyArc) -> Option<Arc<T>> {
    value.downcast_ref::<Arc<T>>().cloned()
}

/// Returns true when the erased value holds an `Arc<T>`.
pub fn holds<T: ?Sized + Send + Sync + 'static>(value: &AnyArc) -> bool {
    value.is::<Arc<T>>()
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Greeter: Send + Sync {
        fn greet(&self) -> String;
    }

    struct English;

    impl Greeter for English {
        fn greet(&self) -> String {
            "hello".into()
        }
    }

    #[test]
    fn trait_objects_survive_erasure() {
        let greeter: Arc<dyn Greeter> = Arc::new(English);
        let erased = erase(greeter);

        assert!(holds::<dyn Greeter>(&erased));
        assert!(!holds::<English>(&erased));
        assert_eq!(unerase::<dyn Greeter>(&erased).unwrap().greet(), "hello");
    }

    #[test]
    fn concrete_values_keep_identity() {
        let value = Arc::new(42_u32);
        let erased = erase(value.clone());
        let back = unerase::<u32>(&erased).unwrap();

        assert!(Arc::ptr_eq(&value, &back));
        assert!(unerase::<u64>(&erased).is_none());
    }
}
