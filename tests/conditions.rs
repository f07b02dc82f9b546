use ferrous_ioc::{
    ActivationStrategy, Container, Dependency, Locator, LocatorCore, StaticInjectionContext, Strategy,
    StrategyBuilder, TypeKey, WhenInjectedBelow, WhenInjectedInto, WhenTargetNamed,
};
use std::sync::Arc;

trait Sink: Send + Sync {
    fn label(&self) -> &'static str;
}

struct Named(&'static str);

impl Sink for Named {
    fn label(&self) -> &'static str {
        self.0
    }
}

fn sink(label: &'static str) -> StrategyBuilder<Named> {
    ActivationStrategy::build::<Named>()
        .construct(move |_| Ok(Named(label)))
        .export_as::<dyn Sink, _>(|s| s as Arc<dyn Sink>)
}

struct Audit {
    sink: Arc<dyn Sink>,
}

struct Billing {
    sink: Arc<dyn Sink>,
}

struct Api {
    billing: Arc<Billing>,
}

fn consumer<T: Send + Sync + 'static>(
    make: fn(Arc<dyn Sink>) -> T,
    dependency: Dependency,
) -> ActivationStrategy {
    ActivationStrategy::build::<T>()
        .import(dependency)
        .construct(move |args| Ok(make(args.get(0)?)))
        .finish()
}

#[test]
fn injected_into_picks_per_consumer() {
    let container = Container::new();
    container
        .configure(|r| {
            r.export(sink("audit-file").when(WhenInjectedInto::type_of::<Audit>()).finish());
            r.export(sink("console").finish());
            r.export(consumer(|sink| Audit { sink }, Dependency::on::<Arc<dyn Sink>>()));
            r.export(consumer(|sink| Billing { sink }, Dependency::on::<Arc<dyn Sink>>()));
        })
        .unwrap();

    assert_eq!(container.locate::<Audit>().unwrap().sink.label(), "audit-file");
    assert_eq!(container.locate::<Billing>().unwrap().sink.label(), "console");
    assert_eq!(container.locate::<dyn Sink>().unwrap().label(), "console");
}

#[test]
fn injected_below_matches_any_ancestor() {
    let container = Container::new();
    container
        .configure(|r| {
            r.export(
                sink("api-scoped")
                    .when(WhenInjectedBelow::new(vec![TypeKey::of::<Api>()]))
                    .finish(),
            );
            r.export(sink("console").finish());
            r.export(consumer(|sink| Billing { sink }, Dependency::on::<Arc<dyn Sink>>()));
            r.export(
                ActivationStrategy::build::<Api>()
                    .import(Dependency::on::<Arc<Billing>>())
                    .construct(|args| Ok(Api { billing: args.get(0)? }))
                    .finish(),
            );
        })
        .unwrap();

    assert_eq!(container.locate::<Api>().unwrap().billing.sink.label(), "api-scoped");
    assert_eq!(container.locate::<Billing>().unwrap().sink.label(), "console");
}

#[test]
fn target_names_select_strategies() {
    let container = Container::new();
    container
        .configure(|r| {
            r.export(sink("primary").when(WhenTargetNamed::new("primary")).finish());
            r.export(sink("fallback").finish());
            r.export(consumer(
                |sink| Audit { sink },
                Dependency::on::<Arc<dyn Sink>>().named("primary"),
            ));
            r.export(consumer(
                |sink| Billing { sink },
                Dependency::on::<Arc<dyn Sink>>().named("secondary"),
            ));
        })
        .unwrap();

    assert_eq!(container.locate::<Audit>().unwrap().sink.label(), "primary");
    assert_eq!(container.locate::<Billing>().unwrap().sink.label(), "fallback");
}

#[test]
fn closures_are_conditions() {
    let container = Container::new();
    container
        .configure(|r| {
            r.export(
                sink("never")
                    .priority(10)
                    .when(|_: &dyn Strategy, _: &StaticInjectionContext| false)
                    .finish(),
            );
            r.export(
                sink("root-only")
                    .when(|_: &dyn Strategy, context: &StaticInjectionContext| context.target().is_none())
                    .finish(),
            );
        })
        .unwrap();

    assert_eq!(container.locate::<dyn Sink>().unwrap().label(), "root-only");
}

#[test]
fn unmet_conditions_leave_the_type_missing() {
    let container = Container::new();
    container
        .configure(|r| {
            r.export(sink("audit-only").when(WhenInjectedInto::type_of::<Audit>()).finish());
        })
        .unwrap();

    assert!(container.try_locate::<dyn Sink>().unwrap().is_none());
    assert!(!container.can_locate(&TypeKey::of::<dyn Sink>(), None));
}
