use ferrous_ioc::{
    ActivationStrategy, Container, ContainerConfiguration, DiError, Dependency, ErrorKind, Func, Locator,
};
use std::sync::Arc;

struct Left {
    _right: Arc<Right>,
}

struct Right {
    _left: Arc<Left>,
}

fn cyclic(configuration: ContainerConfiguration) -> Container {
    let container = Container::with_configuration(configuration);
    container
        .configure(|r| {
            r.export(
                ActivationStrategy::build::<Left>()
                    .import(Dependency::on::<Arc<Right>>().named("right"))
                    .construct(|args| Ok(Left { _right: args.get(0)? }))
                    .finish(),
            );
            r.export(
                ActivationStrategy::build::<Right>()
                    .import(Dependency::on::<Arc<Left>>().named("left"))
                    .construct(|args| Ok(Right { _left: args.get(0)? }))
                    .finish(),
            );
        })
        .unwrap();
    container
}

#[test]
fn constructor_cycles_hit_the_depth_limit() {
    let container = cyclic(ContainerConfiguration::default().with_max_object_graph_depth(10));
    let error = container.locate::<Left>().err().unwrap();

    match &error {
        DiError::GraphTooDeep { depth, limit, .. } => {
            assert_eq!(*limit, 10);
            assert_eq!(*depth, 11);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(error.trail().unwrap().len(), 10);
}

#[test]
fn default_limit_also_terminates() {
    let container = cyclic(ContainerConfiguration::default());
    assert_eq!(container.locate::<Right>().err().unwrap().kind(), ErrorKind::GraphTooDeep);
    // Failed compiles are not cached.
    assert_eq!(container.cache_statistics().entries, 0);
}

#[test]
fn cycles_through_func_are_still_bounded() {
    struct Node {
        _next: Func<Node>,
    }

    let container = Container::with_configuration(ContainerConfiguration::default().with_max_object_graph_depth(16));
    container
        .configure(|r| {
            r.export(
                ActivationStrategy::build::<Node>()
                    .import(Dependency::on::<Func<Node>>())
                    .construct(|args| Ok(Node { _next: args.get(0)? }))
                    .finish(),
            );
        })
        .unwrap();

    assert_eq!(container.locate::<Node>().err().unwrap().kind(), ErrorKind::GraphTooDeep);
}

#[test]
fn missing_dependencies_report_their_path() {
    struct Leaf;
    struct Middle {
        _leaf: Arc<Leaf>,
    }
    struct Top {
        _middle: Arc<Middle>,
    }

    let container = Container::new();
    container
        .configure(|r| {
            r.export(
                ActivationStrategy::build::<Middle>()
                    .import(Dependency::on::<Arc<Leaf>>().named("leaf"))
                    .construct(|args| Ok(Middle { _leaf: args.get(0)? }))
                    .finish(),
            );
            r.export(
                ActivationStrategy::build::<Top>()
                    .import(Dependency::on::<Arc<Middle>>().named("middle"))
                    .construct(|args| Ok(Top { _middle: args.get(0)? }))
                    .finish(),
            );
        })
        .unwrap();

    let error = container.locate::<Top>().err().unwrap();
    assert_eq!(error.kind(), ErrorKind::MissingDependency);

    let trail = error.trail().unwrap();
    assert_eq!(trail.len(), 2);
    let path: Vec<_> = trail.from_root().map(|location| location.member.as_deref()).collect();
    assert_eq!(path, vec![Some("middle"), Some("leaf")]);

    let message = error.to_string();
    assert!(message.contains("Leaf"));
    assert!(message.contains("('middle')"));
}

#[test]
fn optional_dependencies_resolve_to_nothing() {
    struct Cache;
    struct Service {
        cache: Option<Arc<Cache>>,
        retries: Arc<u32>,
    }

    let container = Container::new();
    container
        .configure(|r| {
            r.export(
                ActivationStrategy::build::<Service>()
                    .import(Dependency::on::<Arc<Cache>>().optional())
                    .import(Dependency::on::<Arc<u32>>().with_default(Arc::new(3_u32)))
                    .construct(|args| {
                        Ok(Service {
                            cache: args.optional(0)?,
                            retries: args.get(1)?,
                        })
                    })
                    .finish(),
            );
        })
        .unwrap();

    let service = container.locate::<Service>().unwrap();
    assert!(service.cache.is_none());
    assert_eq!(*service.retries, 3);
}
