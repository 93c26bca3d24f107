#[macro_use]
pub(crate) mod macros;

pub(crate) mod any;
pub(crate) mod cache;
pub(crate) mod config;
pub(crate) mod container;
pub(crate) mod dependency;
pub(crate) mod dependency_resolver;
pub(crate) mod handler;
pub(crate) mod inject;
pub(crate) mod instantiator;
pub(crate) mod lifecycle;
pub(crate) mod lifetime;
pub(crate) mod registry;
pub(crate) mod scope;
pub(crate) mod service;

pub mod errors;
pub mod utils;

pub use any::{AnyInstance, TypeInfo};
pub use config::Config;
pub use container::{Container, StopReport};
pub use dependency::{Dependency, Multiplicity};
pub use dependency_resolver::{DependencyResolver, Resolved, Resolver};
pub use errors::{InstantiateErrorKind, InstantiatorErrorKind, LifecycleErrorKind, RegisterErrorKind, ResolveErrorKind};
pub use inject::{Inject, InjectAll, Named, OneOf, Param, ParamName};
pub use instantiator::{instance, Instantiator};
pub use lifecycle::{Lifecycle, LifecycleState, Transition};
pub use lifetime::ApplicationLifetime;
pub use registry::Lifetime;
pub use service::{Managed, Service};
