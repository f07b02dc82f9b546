use ferrous_ioc::{
    ActivationStrategy, Container, ErrorKind, GenericShape, GenericType, LocateKey, Lifetime, Locator, LocatorCore,
    OpenGenericStrategy, TypeKey,
};
use std::any::type_name;
use std::marker::PhantomData;
use std::sync::Arc;

struct Repository<T> {
    entity: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T: 'static> GenericType for Repository<T> {
    fn generic_shape() -> GenericShape {
        GenericShape::new("Repository", vec![TypeKey::of::<T>()])
    }
}

struct User;
struct Order;
struct Secret;

fn repository<T: 'static>() -> ActivationStrategy {
    ActivationStrategy::build::<Repository<T>>()
        .construct(|_| {
            Ok(Repository {
                entity: type_name::<T>(),
                _marker: PhantomData,
            })
        })
        .export_generic_as_self()
        .finish()
}

fn close_repository(shape: &GenericShape) -> Option<ActivationStrategy> {
    let argument = &shape.arguments()[0];
    if *argument == TypeKey::of::<User>() {
        Some(repository::<User>())
    } else if *argument == TypeKey::of::<Order>() {
        Some(repository::<Order>())
    } else if *argument == TypeKey::of::<Secret>() {
        Some(repository::<Secret>())
    } else {
        None
    }
}

fn open_repository() -> OpenGenericStrategy {
    OpenGenericStrategy::new("Repository", 1)
}

fn closed_count(container: &Container) -> usize {
    container
        .injection_scope()
        .exports()
        .collection(&TypeKey::definition("Repository", 1))
        .and_then(|collection| collection.primary())
        .and_then(|strategy| strategy.generic_activation().map(|generic| generic.closed_count()))
        .unwrap_or_default()
}

#[test]
fn closes_each_requested_type() {
    let container = Container::new();
    container
        .configure(|r| {
            r.open_generic(open_repository().close_with(close_repository));
        })
        .unwrap();

    let users = container.locate_generic::<Repository<User>>().unwrap();
    let orders = container.locate_generic::<Repository<Order>>().unwrap();
    assert!(users.entity.ends_with("User"));
    assert!(orders.entity.ends_with("Order"));
    assert_eq!(closed_count(&container), 2);
}

#[test]
fn rejected_arguments_are_remembered() {
    let container = Container::new();
    container
        .configure(|r| {
            r.open_generic(
                open_repository()
                    .constrain(0, |argument| *argument != TypeKey::of::<Secret>())
                    .close_with(close_repository),
            );
        })
        .unwrap();

    for _ in 0..3 {
        let error = container.locate_generic::<Repository<Secret>>().err().unwrap();
        assert_eq!(error.kind(), ErrorKind::MissingDependency);
    }
    assert!(container.locate_generic::<Repository<User>>().is_ok());
    assert_eq!(closed_count(&container), 2);
}

#[test]
fn lifestyle_templates_are_per_closed_type() {
    let container = Container::new();
    container
        .configure(|r| {
            r.open_generic(
                open_repository()
                    .lifetime(Lifetime::Singleton)
                    .close_with(close_repository),
            );
        })
        .unwrap();

    let a = container.locate_generic::<Repository<User>>().unwrap();
    let b = container.locate_generic::<Repository<User>>().unwrap();
    let c = container.locate_generic::<Repository<Order>>().unwrap();
    assert!(Arc::ptr_eq(&a, &b));
    assert!(c.entity.ends_with("Order"));
}

#[test]
fn closed_registrations_beat_the_open_definition() {
    let container = Container::new();
    container
        .configure(|r| {
            r.open_generic(open_repository().close_with(close_repository));
            r.export(
                ActivationStrategy::build::<Repository<User>>()
                    .construct(|_| {
                        Ok(Repository {
                            entity: "custom",
                            _marker: PhantomData,
                        })
                    })
                    .export_generic_as_self()
                    .finish(),
            );
        })
        .unwrap();

    assert_eq!(container.locate_generic::<Repository<User>>().unwrap().entity, "custom");
    assert!(container.locate_generic::<Repository<Order>>().unwrap().entity.ends_with("Order"));
}

#[test]
fn keyed_open_generics_need_the_key() {
    let container = Container::new();
    container
        .configure(|r| {
            r.open_generic(
                open_repository()
                    .export_keyed("archive")
                    .close_with(close_repository),
            );
        })
        .unwrap();

    let type_key = TypeKey::of_generic::<Repository<User>>();
    let keyed = container
        .locate_value(&type_key, Some(&LocateKey::from("archive")), None, None)
        .unwrap();
    assert!(keyed.is_some());
    assert!(container.locate_value(&type_key, None, None, None).unwrap().is_none());
}
