use ferrous_ioc::{
    ActivationStrategy, Container, Dependency, Func, FuncWithContext, InjectionContext, Lazy, Lifetime, Locator,
    TypedLocator,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

struct Connection {
    serial: usize,
}

fn counting_container(lifetime: Lifetime) -> (Container, Arc<AtomicUsize>) {
    let created = Arc::new(AtomicUsize::new(0));
    let counter = created.clone();
    let container = Container::new();
    container
        .configure(move |r| {
            r.add_factory::<Connection, _>(lifetime, move |_| {
                Ok(Connection {
                    serial: counter.fetch_add(1, Ordering::SeqCst),
                })
            });
        })
        .unwrap();
    (container, created)
}

#[test]
fn func_activates_on_every_call() {
    let (container, created) = counting_container(Lifetime::Transient);
    let factory = container.resolve::<Func<Connection>>().unwrap();
    assert_eq!(created.load(Ordering::SeqCst), 0);

    let first = factory.call().unwrap();
    let second = factory.call().unwrap();
    assert_ne!(first.serial, second.serial);
    assert_eq!(created.load(Ordering::SeqCst), 2);
}

#[test]
fn func_respects_the_lifestyle() {
    let (container, created) = counting_container(Lifetime::Singleton);
    let factory = container.resolve::<Func<Connection>>().unwrap();
    assert!(Arc::ptr_eq(&factory.call().unwrap(), &factory.call().unwrap()));
    assert_eq!(created.load(Ordering::SeqCst), 1);
}

#[test]
fn lazy_defers_and_keeps_the_value() {
    let (container, created) = counting_container(Lifetime::Transient);
    let lazy = container.resolve::<Lazy<Connection>>().unwrap();
    assert!(!lazy.is_created());
    assert_eq!(created.load(Ordering::SeqCst), 0);

    let a = lazy.value().unwrap();
    let b = lazy.clone().value().unwrap();
    assert!(lazy.is_created());
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(created.load(Ordering::SeqCst), 1);
}

#[test]
fn wrappers_are_injected_as_dependencies() {
    struct Pool {
        connect: Func<Connection>,
        spare: Lazy<Connection>,
    }

    let (container, _) = counting_container(Lifetime::Transient);
    container
        .configure(|r| {
            r.export(
                ActivationStrategy::build::<Pool>()
                    .import(Dependency::on::<Func<Connection>>())
                    .import(Dependency::on::<Lazy<Connection>>())
                    .construct(|args| {
                        Ok(Pool {
                            connect: args.get(0)?,
                            spare: args.get(1)?,
                        })
                    })
                    .finish(),
            );
        })
        .unwrap();

    let pool = container.locate::<Pool>().unwrap();
    assert!(!pool.spare.is_created());
    pool.connect.call().unwrap();
    pool.spare.value().unwrap();
    assert!(pool.spare.is_created());
}

#[test]
fn func_with_context_supplies_missing_values() {
    struct Greeting {
        text: String,
    }

    let container = Container::new();
    container
        .configure(|r| {
            r.export(
                ActivationStrategy::build::<Greeting>()
                    .import(Dependency::on::<Arc<String>>().named("name"))
                    .construct(|args| {
                        let name: Arc<String> = args.get(0)?;
                        Ok(Greeting {
                            text: format!("hello {name}"),
                        })
                    })
                    .finish(),
            );
        })
        .unwrap();

    let factory = container.resolve::<FuncWithContext<Greeting>>().unwrap();
    let ada = factory
        .call(&InjectionContext::new().with_named("name", Arc::new(String::from("ada"))))
        .unwrap();
    let bob = factory
        .call(&InjectionContext::new().with_value(Arc::new(String::from("bob"))))
        .unwrap();

    assert_eq!(ada.text, "hello ada");
    assert_eq!(bob.text, "hello bob");
    assert!(factory.call(&InjectionContext::new()).is_err());
}

#[test]
fn typed_locator_resolves_from_the_injection_site() {
    let (container, _) = counting_container(Lifetime::Scoped);
    let scope = container.begin_lifetime_scope(None);

    let locator = scope.resolve::<TypedLocator>().unwrap();
    let via_locator = locator.locate::<Connection>().unwrap();
    let direct = scope.locate::<Connection>().unwrap();
    assert!(Arc::ptr_eq(&via_locator, &direct));
}

#[test]
fn collections_can_be_sorted_by_the_dependency() {
    struct Plugin {
        order: u8,
    }
    struct Host {
        plugins: Vec<Arc<Plugin>>,
    }

    let container = Container::new();
    container
        .configure(|r| {
            for order in [3_u8, 1, 2] {
                r.export(
                    ActivationStrategy::build::<Plugin>()
                        .construct(move |_| Ok(Plugin { order }))
                        .finish(),
                );
            }
            r.export(
                ActivationStrategy::build::<Host>()
                    .import(
                        Dependency::on::<Vec<Arc<Plugin>>>()
                            .sorted_by::<Plugin, _>(|a, b| a.order.cmp(&b.order)),
                    )
                    .construct(|args| Ok(Host { plugins: args.get(0)? }))
                    .finish(),
            );
        })
        .unwrap();

    let host = container.locate::<Host>().unwrap();
    let orders: Vec<_> = host.plugins.iter().map(|p| p.order).collect();
    assert_eq!(orders, vec![1, 2, 3]);

    let unsorted: Vec<_> = container
        .locate_all::<Plugin>()
        .unwrap()
        .iter()
        .map(|p| p.order)
        .collect();
    assert_eq!(unsorted, vec![3, 1, 2]);
}
