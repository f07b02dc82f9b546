use ferrous_ioc::{
    Container, ContainerConfiguration, DiError, ErrorKind, LateRegistration, Locator, LocatorCore,
    ResolutionObserver, TypeKey,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[test]
fn repeated_locates_hit_the_cache() {
    let container = Container::new();
    container
        .configure(|r| {
            r.add_singleton(3_u8);
            r.add_transient_factory::<String, _>(|_| Ok(String::from("fresh")));
        })
        .unwrap();

    for _ in 0..4 {
        container.locate::<u8>().unwrap();
        container.locate::<String>().unwrap();
    }

    let stats = container.cache_statistics();
    assert_eq!(stats.misses, 2);
    assert_eq!(stats.hits, 6);
    assert_eq!(stats.compiled, 2);
    assert_eq!(stats.entries, 2);
    assert!((stats.hit_ratio() - 0.75).abs() < f64::EPSILON);
}

#[test]
fn keyed_and_unkeyed_requests_are_cached_apart() {
    let container = Container::new();
    container
        .configure(|r| {
            r.add_singleton(String::from("default"));
            r.add_keyed_singleton("alt", String::from("alternative"));
        })
        .unwrap();

    assert_eq!(&*container.locate::<String>().unwrap(), "default");
    assert_eq!(&*container.locate_keyed::<String>("alt").unwrap(), "alternative");
    assert_eq!(&*container.locate::<String>().unwrap(), "default");
    assert_eq!(container.cache_statistics().entries, 2);
}

#[test]
fn filtered_and_missing_requests_are_not_cached() {
    let container = Container::new();
    container
        .configure(|r| {
            r.add_singleton(1_i32);
        })
        .unwrap();

    container.locate_filtered::<i32, _>(|_| true).unwrap();
    assert!(container.try_locate::<i64>().unwrap().is_none());
    assert_eq!(container.cache_statistics().entries, 0);
}

#[test]
fn late_registrations_invalidate_the_cache() {
    let container = Container::new();
    container
        .configure(|r| {
            r.add_singleton(String::from("first"));
        })
        .unwrap();
    assert_eq!(&*container.locate::<String>().unwrap(), "first");
    assert!(container.injection_scope().has_resolved());

    container
        .configure(|r| {
            r.export(
                ferrous_ioc::ActivationStrategy::build::<String>()
                    .instance(String::from("second"))
                    .priority(1)
                    .finish(),
            );
        })
        .unwrap();

    let stats = container.cache_statistics();
    assert_eq!(stats.generations, 1);
    assert_eq!(stats.entries, 0);
    assert_eq!(&*container.locate::<String>().unwrap(), "second");
}

#[test]
fn late_registrations_can_be_rejected() {
    let container = Container::with_configuration(
        ContainerConfiguration::default().with_late_registration(LateRegistration::Reject),
    );
    container
        .configure(|r| {
            r.add_singleton(1_u32);
        })
        .unwrap();
    container
        .configure(|r| {
            r.add_singleton(2_u64);
        })
        .unwrap();

    assert!(container.can_locate(&TypeKey::of::<u32>(), None));
    let error = container
        .configure(|r| {
            r.add_singleton(3_u16);
        })
        .unwrap_err();
    assert_eq!(error.kind(), ErrorKind::ConfigurationLocked);
    assert!(!container.can_locate(&TypeKey::of::<u16>(), None));
}

#[derive(Default)]
struct Recorder {
    resolving: AtomicUsize,
    resolved: AtomicUsize,
    compiled: Mutex<Vec<TypeKey>>,
    failed: Mutex<Vec<ErrorKind>>,
}

impl ResolutionObserver for Recorder {
    fn resolving(&self, _type_key: &TypeKey) {
        self.resolving.fetch_add(1, Ordering::SeqCst);
    }

    fn resolved(&self, _type_key: &TypeKey, _elapsed: Duration) {
        self.resolved.fetch_add(1, Ordering::SeqCst);
    }

    fn compiled(&self, type_key: &TypeKey) {
        self.compiled.lock().unwrap().push(type_key.clone());
    }

    fn failed(&self, _type_key: &TypeKey, error: &DiError) {
        self.failed.lock().unwrap().push(error.kind());
    }
}

#[test]
fn observers_see_every_top_level_locate() {
    let recorder = Arc::new(Recorder::default());
    let container = Container::new();
    let observer = recorder.clone();
    container
        .configure(move |r| {
            r.add_singleton(9_u8);
            r.add_transient_factory::<u16, _>(|_| Err(DiError::general("broken factory")));
            r.observer(observer);
        })
        .unwrap();

    container.locate::<u8>().unwrap();
    container.locate::<u8>().unwrap();
    assert!(container.locate::<u16>().is_err());

    assert_eq!(recorder.resolving.load(Ordering::SeqCst), 3);
    assert_eq!(recorder.resolved.load(Ordering::SeqCst), 2);
    assert_eq!(
        *recorder.compiled.lock().unwrap(),
        vec![TypeKey::of::<u8>(), TypeKey::of::<u16>()]
    );
    assert_eq!(*recorder.failed.lock().unwrap(), vec![ErrorKind::GeneralLocateFailure]);
}

#[derive(Clone, Default)]
struct Capture(Arc<Mutex<Vec<u8>>>);

impl std::io::Write for Capture {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[test]
fn tracing_observer_emits_events() {
    let capture = Capture::default();
    let writer = capture.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new("ferrous_ioc=debug"))
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .finish();

    tracing::subscriber::with_default(subscriber, || {
        let container = Container::new();
        container
            .configure(|r| {
                r.add_singleton(1_u8);
                r.observer(Arc::new(ferrous_ioc::TracingObserver::with_label("orders")));
            })
            .unwrap();
        container.locate::<u8>().unwrap();
        assert!(container.locate::<u64>().is_err());
    });

    let output = String::from_utf8(capture.0.lock().unwrap().clone()).unwrap();
    assert!(output.contains("resolved"));
    assert!(output.contains("container=\"orders\"") || output.contains("container=orders"));
    assert!(output.contains("resolution failed"));
}
