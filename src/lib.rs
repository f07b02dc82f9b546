//! # ferrous-ioc
//!
//! An inversion-of-control container core: registered activation
//! strategies are compiled into cached delegates that build object graphs.
//!
//! ## Features
//!
//! - **Compiled activation**: each requested type is lowered once into a
//!   delegate and cached; later locates are a lookup plus a call
//! - **Lock-free reads**: strategy indexes and caches live in persistent
//!   AVL maps published through `arc-swap`
//! - **Priorities, keys and conditions**: the highest-priority strategy whose
//!   conditions pass wins; keyed exports fall back to `LocateKey::Any`
//! - **Lifestyles**: singleton, per lifetime scope (optionally per named
//!   scope), per object graph, and transient
//! - **Decorators, enrichment and wrappers**: `Func<T>`, `Lazy<T>`,
//!   `Owned<T>`, `FuncWithContext<T>`, collections as `Vec<Arc<T>>`
//! - **Open generics** closed on demand from a `GenericShape`
//! - **Deterministic disposal**: last activated, first disposed
//!
//! ## Quick Start
//!
//! ```rust
//! use ferrous_ioc::{ActivationStrategy, Container, Dependency, Lifetime, Locator};
//! use std::sync::Arc;
//!
//! struct Database {
//!     url: String,
//! }
//!
//! struct UserService {
//!     db: Arc<Database>,
//! }
//!
//! let container = Container::new();
//! container.configure(|r| {
//!     r.add_singleton(Database { url: "postgres://localhost".into() });
//!     r.export(
//!         ActivationStrategy::build::<UserService>()
//!             .import(Dependency::on::<Arc<Database>>())
//!             .construct(|args| Ok(UserService { db: args.get(0)? }))
//!             .lifetime(Lifetime::Transient)
//!             .finish(),
//!     );
//! }).unwrap();
//!
//! let users = container.locate::<UserService>().unwrap();
//! assert_eq!(users.db.url, "postgres://localhost");
//! ```
//!
//! ## Lifetime Scopes
//!
//! ```rust
//! use ferrous_ioc::{Container, Locator};
//! use std::sync::Arc;
//!
//! struct RequestId(u32);
//!
//! let container = Container::new();
//! container.configure(|r| {
//!     r.add_scoped_factory::<RequestId, _>(|_| Ok(RequestId(7)));
//! }).unwrap();
//!
//! let first = container.begin_lifetime_scope(None);
//! let second = container.begin_lifetime_scope(None);
//! let a = first.locate::<RequestId>().unwrap();
//! assert!(Arc::ptr_eq(&a, &first.locate::<RequestId>().unwrap()));
//! assert!(!Arc::ptr_eq(&a, &second.locate::<RequestId>().unwrap()));
//! ```

pub mod cache;
pub mod collection;
pub mod compiler;
pub mod config;
pub mod context;
pub mod disposal;
pub mod error;
pub mod key;
pub mod lifestyle;
pub mod lifetime;
pub mod observer;
pub mod persistent;
pub mod scope;
pub mod strategy;
pub mod traits;
pub mod value;
pub mod wrappers;

pub use cache::CacheStatistics;
pub use collection::{Registration, StrategyCollection, StrategyCollectionContainer, StrategyInspector};
pub use compiler::{
    ActivationCompiler, ActivationDelegate, InjectionTarget, MissingStrategyProvider, ProvidedStrategy, Request,
    RequestKind, StaticInjectionContext,
};
pub use config::{ContainerConfiguration, LateRegistration};
pub use context::InjectionContext;
pub use disposal::{dispose_fn, CleanupFn, DisposalScope, DisposeFn};
pub use error::{DiError, DiResult, ErrorKind, LocationInfo, LocationTrail};
pub use key::{GenericShape, GenericType, LocateKey, TypeIdentity, TypeKey};
pub use lifestyle::{CreateInstance, InstanceKey, Lifestyle, Singleton, SingletonPerObjectGraph, SingletonPerScope};
pub use lifetime::Lifetime;
pub use observer::{ResolutionObserver, TracingObserver};
pub use persistent::{AtomicMap, PersistentMap};
pub use scope::{ActivationFrame, Container, InjectionScope, LifetimeScope};
pub use strategy::{
    ActivationStrategy, Arguments, Condition, ConstructionPlan, DecoratorBuilder, DecoratorStrategy,
    Dependency, ExportType, InstanceComparer, OpenGenericStrategy, Strategy, StrategyBuilder, StrategyFilter,
    TypeConstraint, WhenInjectedBelow, WhenInjectedInto, WhenTargetNamed,
};
pub use traits::{Dispose, Locator, LocatorCore};
pub use value::{erase, unerase, AnyArc};
pub use wrappers::{Func, FuncWithContext, Lazy, Owned, Resolvable, TypedLocator, WrapperKind};
