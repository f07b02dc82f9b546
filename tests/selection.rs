use ferrous_ioc::{
    ActivationStrategy, Container, ContainerConfiguration, Dependency, ErrorKind, LocateKey, Locator, Strategy,
};
use std::sync::Arc;

trait Transport: Send + Sync {
    fn name(&self) -> &'static str;
}

#[derive(Default)]
struct Tcp;
#[derive(Default)]
struct Udp;
#[derive(Default)]
struct Quic;

impl Transport for Tcp {
    fn name(&self) -> &'static str {
        "tcp"
    }
}

impl Transport for Udp {
    fn name(&self) -> &'static str {
        "udp"
    }
}

impl Transport for Quic {
    fn name(&self) -> &'static str {
        "quic"
    }
}

fn transport<T: Transport + Default + 'static>(priority: i32) -> ActivationStrategy {
    ActivationStrategy::build::<T>()
        .construct(|_| Ok(T::default()))
        .export_as::<dyn Transport, _>(|t| t as Arc<dyn Transport>)
        .priority(priority)
        .finish()
}

#[test]
fn highest_priority_wins() {
    let container = Container::new();
    container
        .configure(|r| {
            r.export(transport::<Tcp>(0));
            r.export(transport::<Quic>(10));
            r.export(transport::<Udp>(5));
        })
        .unwrap();

    assert_eq!(container.locate::<dyn Transport>().unwrap().name(), "quic");
}

#[test]
fn equal_priorities_prefer_the_first_registration() {
    let container = Container::new();
    container
        .configure(|r| {
            r.export(transport::<Udp>(1));
            r.export(transport::<Tcp>(1));
        })
        .unwrap();

    assert_eq!(container.locate::<dyn Transport>().unwrap().name(), "udp");
}

#[test]
fn locate_all_follows_selection_order() {
    let container = Container::new();
    container
        .configure(|r| {
            r.export(transport::<Tcp>(0));
            r.export(transport::<Quic>(10));
            r.export(transport::<Udp>(5));
        })
        .unwrap();

    let names: Vec<_> = container
        .locate_all::<dyn Transport>()
        .unwrap()
        .iter()
        .map(|t| t.name())
        .collect();
    assert_eq!(names, vec!["quic", "udp", "tcp"]);
}

#[test]
fn empty_collections_resolve_empty() {
    let container = Container::new();
    assert!(container.locate_all::<dyn Transport>().unwrap().is_empty());
}

#[test]
fn keyed_lookup_prefers_exact_keys_then_any() {
    let container = Container::new();
    container
        .configure(|r| {
            r.add_keyed_singleton("primary", String::from("db-primary"));
            r.add_keyed_singleton(LocateKey::Any, String::from("db-fallback"));
            r.add_keyed_singleton(7, String::from("db-seven"));
        })
        .unwrap();

    assert_eq!(&*container.locate_keyed::<String>("primary").unwrap(), "db-primary");
    assert_eq!(&*container.locate_keyed::<String>(7).unwrap(), "db-seven");
    assert_eq!(&*container.locate_keyed::<String>("replica").unwrap(), "db-fallback");
    assert!(container.try_locate::<String>().unwrap().is_none());
}

#[test]
fn keyed_miss_without_wildcard_is_missing() {
    let container = Container::new();
    container
        .configure(|r| {
            r.add_keyed_singleton("a", 1_u32);
        })
        .unwrap();

    let error = container.locate_keyed::<u32>("b").unwrap_err();
    assert_eq!(error.kind(), ErrorKind::MissingDependency);
    assert!(container.try_locate_keyed::<u32>("b").unwrap().is_none());
}

#[test]
fn keyed_dependencies_select_by_key() {
    struct Reports {
        store: Arc<String>,
    }

    let container = Container::new();
    container
        .configure(|r| {
            r.add_keyed_singleton("archive", String::from("cold"));
            r.add_keyed_singleton("live", String::from("hot"));
            r.export(
                ActivationStrategy::build::<Reports>()
                    .import(Dependency::on::<Arc<String>>().with_key("archive"))
                    .construct(|args| Ok(Reports { store: args.get(0)? }))
                    .finish(),
            );
        })
        .unwrap();

    assert_eq!(&*container.locate::<Reports>().unwrap().store, "cold");
}

#[test]
fn filters_skip_rejected_strategies() {
    let container = Container::new();
    container
        .configure(|r| {
            r.export(transport::<Quic>(10));
            r.export(transport::<Tcp>(0));
        })
        .unwrap();

    let quic = ferrous_ioc::TypeKey::of::<Quic>();
    let located = container
        .locate_filtered::<dyn Transport, _>(move |strategy| *strategy.activation_type() != quic)
        .unwrap();
    assert_eq!(located.name(), "tcp");
    assert_eq!(container.locate::<dyn Transport>().unwrap().name(), "quic");
}

#[test]
fn base_types_are_indexed_only_when_enabled() {
    let strategy = || {
        ActivationStrategy::build::<Udp>()
            .construct(|_| Ok(Udp))
            .export_as_self()
            .base_type::<dyn Transport, _>(|u| u as Arc<dyn Transport>)
            .finish()
    };

    let plain = Container::new();
    plain.configure(|r| {
        r.export(strategy());
    })
    .unwrap();
    assert!(plain.try_locate::<dyn Transport>().unwrap().is_none());
    assert!(plain.locate::<Udp>().is_ok());

    let widened = Container::with_configuration(ContainerConfiguration::default().with_export_as_base(true));
    widened
        .configure(|r| {
            r.export(strategy());
        })
        .unwrap();
    assert_eq!(widened.locate::<dyn Transport>().unwrap().name(), "udp");
}

#[test]
fn named_exports_are_indexed_by_name() {
    let container = Container::new();
    container
        .configure(|r| {
            r.export(
                ActivationStrategy::build::<Tcp>()
                    .construct(|_| Ok(Tcp))
                    .export_as_self()
                    .export_name("wire")
                    .finish(),
            );
        })
        .unwrap();

    let exports = container.injection_scope().exports();
    let by_name = exports.collection_by_name("wire").unwrap();
    assert_eq!(by_name.strategies().len(), 1);
    assert!(exports.collection_by_name("radio").is_none());
}
