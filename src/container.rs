use parking_lot::Mutex;
use std::{
    any::type_name,
    future::{self, Future},
    sync::Arc,
    time::Duration,
};
use tokio::{signal, task::JoinSet, time};
use tracing::{debug, error, info, info_span, warn};

use crate::{
    any::{AnyInstance, TypeInfo},
    config::Config,
    dependency::Multiplicity,
    dependency_resolver::{DependencyResolver, Resolved, Resolver},
    errors::{InstantiatorErrorKind, LifecycleErrorKind, RegisterErrorKind, ResolveErrorKind},
    handler::Handler as _,
    instantiator::{boxed_instantiator, BoxedCloneInstantiator, Instantiator},
    lifecycle::{Lifecycle, LifecycleState},
    lifetime::ApplicationLifetime,
    registry::{Binding, FactoryData, Lifetime, Registry, ServiceData},
    scope::ScopeContext,
    service::{Managed, ManagedService, Service},
};

/// Outcome of [`Container::stop`]. The container is stopped even if some services failed to stop.
#[derive(Debug, Default)]
pub struct StopReport {
    pub failures: Vec<LifecycleErrorKind>,
}

impl StopReport {
    #[inline]
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

pub(crate) struct Shared {
    registry: Mutex<Registry>,
    pub(crate) lifecycle: Lifecycle,
    config: Config,
}

impl Shared {
    async fn start(&self, timeout: Option<Duration>) -> Result<(), LifecycleErrorKind> {
        let timeout = timeout.or(self.config.start_timeout);
        let services = self.registry.lock().services();

        self.lifecycle
            .start(start_services(services, timeout, self.config.rollback_partial_start))
            .await
    }

    pub(crate) async fn stop(&self) -> Result<StopReport, LifecycleErrorKind> {
        let services = self.registry.lock().services();

        self.lifecycle.stop(stop_services(services)).await
    }
}

async fn start_services(
    services: Vec<Arc<dyn ManagedService>>,
    timeout: Option<Duration>,
    rollback: bool,
) -> Result<(), LifecycleErrorKind> {
    let mut tasks = JoinSet::new();
    for service in &services {
        let service = service.clone();
        tasks.spawn(async move { service.start().await });
    }
    debug!(services = services.len(), "Services spawned");

    let result = match timeout {
        Some(timeout) => time::timeout(timeout, join_started(&mut tasks))
            .await
            .unwrap_or_else(|_| {
                let err = LifecycleErrorKind::StartTimeout { timeout };
                error!("{}", err);
                Err(err)
            }),
        None => join_started(&mut tasks).await,
    };

    if let Err(err) = result {
        tasks.shutdown().await;
        if rollback {
            rollback_started(&services).await;
        }
        return Err(err);
    }
    Ok(())
}

async fn join_started(tasks: &mut JoinSet<Result<(), LifecycleErrorKind>>) -> Result<(), LifecycleErrorKind> {
    while let Some(joined) = tasks.join_next().await {
        joined??;
    }
    Ok(())
}

async fn rollback_started(services: &[Arc<dyn ManagedService>]) {
    for service in services.iter().filter(|service| service.state() == LifecycleState::Started) {
        match service.stop().await {
            Ok(()) => info!(service = service.name(), "Rolled back"),
            Err(err) => warn!(service = service.name(), "Rollback failed: {}", err),
        }
    }
}

async fn stop_services(services: Vec<Arc<dyn ManagedService>>) -> StopReport {
    let mut tasks = JoinSet::new();
    for service in services {
        if service.state() != LifecycleState::Started {
            debug!(service = service.name(), "Not started, skipped");
            continue;
        }
        tasks.spawn(async move { service.stop().await });
    }

    let mut report = StopReport::default();
    while let Some(joined) = tasks.join_next().await {
        if let Err(err) = joined.map_err(LifecycleErrorKind::from).and_then(|stopped| stopped) {
            warn!("{}", err);
            report.failures.push(err);
        }
    }
    report
}

/// Registry of bindings with the lifecycle of the registered services.
///
/// Clones share the registry, the lifecycle and the current scope.
/// Use [`Container::enter`] to get a handle with a fresh scope.
#[derive(Clone)]
pub struct Container {
    shared: Arc<Shared>,
    scope: ScopeContext,
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

impl Container {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// Creates a container with [`ApplicationLifetime`] registered as a singleton
    #[must_use]
    pub fn with_config(config: Config) -> Self {
        let shared = Arc::new_cyclic(|shared| {
            let mut registry = Registry::default();
            registry.add_singleton(
                TypeInfo::of::<ApplicationLifetime>(),
                AnyInstance::new(Arc::new(ApplicationLifetime::new(shared.clone()))),
            );

            Shared {
                registry: Mutex::new(registry),
                lifecycle: Lifecycle::new("container"),
                config,
            }
        });

        Self {
            shared,
            scope: ScopeContext::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.shared.config
    }

    /// Creates a handle over the same registry and lifecycle with a fresh scope
    #[must_use]
    pub fn enter(&self) -> Self {
        let scope = ScopeContext::new();
        debug!(parent = self.scope.id(), scope = scope.id(), "Scope entered");

        Self {
            shared: self.shared.clone(),
            scope,
        }
    }

    #[inline]
    #[must_use]
    pub fn scope_id(&self) -> u64 {
        self.scope.id()
    }
}

impl Container {
    /// Registers a singleton keyed by its own type. Registrations of the same key accumulate.
    #[allow(clippy::missing_errors_doc)]
    pub fn register_singleton<T: Send + Sync + 'static>(&self, value: T) -> Result<&Self, RegisterErrorKind> {
        self.register_singleton_as::<T>(Arc::new(value))
    }

    /// Registers a singleton keyed by `K`, which may be a trait object
    #[allow(clippy::missing_errors_doc)]
    pub fn register_singleton_as<K>(&self, value: Arc<K>) -> Result<&Self, RegisterErrorKind>
    where
        K: ?Sized + Send + Sync + 'static,
    {
        self.shared.registry.lock().add_singleton(TypeInfo::of::<K>(), AnyInstance::new(value));
        debug!(dependency = type_name::<K>(), "Singleton registered");
        Ok(self)
    }

    /// Constructs the singleton right away, resolving the dependencies of the instantiator.
    ///
    /// # Errors
    /// Returns [`RegisterErrorKind::Resolve`] if the dependencies can't be resolved or the instantiator fails
    pub fn register_singleton_factory<Inst, Deps>(&self, instantiator: Inst) -> Result<&Self, RegisterErrorKind>
    where
        Inst: Instantiator<Deps>,
        Inst::Provides: Send + Sync,
        Deps: DependencyResolver,
    {
        self.register_singleton_factory_as::<Inst::Provides, Inst, Deps>(instantiator)
    }

    /// # Errors
    /// Returns [`RegisterErrorKind::Resolve`] if the dependencies can't be resolved or the instantiator fails
    pub fn register_singleton_factory_as<K, Inst, Deps>(&self, instantiator: Inst) -> Result<&Self, RegisterErrorKind>
    where
        K: ?Sized + Send + Sync + 'static,
        Inst: Instantiator<Deps>,
        Inst::Provides: Into<Arc<K>>,
        Deps: DependencyResolver,
    {
        let instance = self.instantiate(boxed_instantiator::<K, Inst, Deps>(instantiator))?;
        self.shared.registry.lock().add_singleton(TypeInfo::of::<K>(), instance);
        debug!(dependency = type_name::<K>(), "Singleton constructed and registered");
        Ok(self)
    }

    /// Registers a factory called on every lookup.
    ///
    /// # Errors
    /// - Returns [`RegisterErrorKind::BindingExists`] if the key already has a transient or scoped factory
    /// - Returns [`RegisterErrorKind::MissingTypeHint`] if a declared dependency has no candidate types
    /// - Returns [`RegisterErrorKind::Resolve`] if a required dependency isn't registered
    pub fn register_transient<Inst, Deps>(&self, instantiator: Inst) -> Result<&Self, RegisterErrorKind>
    where
        Inst: Instantiator<Deps>,
        Inst::Provides: Send + Sync,
        Deps: DependencyResolver,
    {
        self.register_transient_as::<Inst::Provides, Inst, Deps>(instantiator)
    }

    /// Same as [`Container::register_transient`], keyed by `K`.
    /// To key by a trait object, return `Arc<dyn Trait>` or `Box<dyn Trait>` from the instantiator.
    #[allow(clippy::missing_errors_doc)]
    pub fn register_transient_as<K, Inst, Deps>(&self, instantiator: Inst) -> Result<&Self, RegisterErrorKind>
    where
        K: ?Sized + Send + Sync + 'static,
        Inst: Instantiator<Deps>,
        Inst::Provides: Into<Arc<K>>,
        Deps: DependencyResolver,
    {
        self.register_factory::<K, Inst, Deps>(instantiator, Binding::Transient)
    }

    /// Registers a factory called at most once per scope.
    ///
    /// # Errors
    /// - Returns [`RegisterErrorKind::BindingExists`] if the key already has a transient or scoped factory
    /// - Returns [`RegisterErrorKind::MissingTypeHint`] if a declared dependency has no candidate types
    /// - Returns [`RegisterErrorKind::Resolve`] if a required dependency isn't registered
    pub fn register_scoped<Inst, Deps>(&self, instantiator: Inst) -> Result<&Self, RegisterErrorKind>
    where
        Inst: Instantiator<Deps>,
        Inst::Provides: Send + Sync,
        Deps: DependencyResolver,
    {
        self.register_scoped_as::<Inst::Provides, Inst, Deps>(instantiator)
    }

    #[allow(clippy::missing_errors_doc)]
    pub fn register_scoped_as<K, Inst, Deps>(&self, instantiator: Inst) -> Result<&Self, RegisterErrorKind>
    where
        K: ?Sized + Send + Sync + 'static,
        Inst: Instantiator<Deps>,
        Inst::Provides: Into<Arc<K>>,
        Deps: DependencyResolver,
    {
        self.register_factory::<K, Inst, Deps>(instantiator, Binding::Scoped)
    }

    fn register_factory<K, Inst, Deps>(&self, instantiator: Inst, binding: fn(FactoryData) -> Binding) -> Result<&Self, RegisterErrorKind>
    where
        K: ?Sized + Send + Sync + 'static,
        Inst: Instantiator<Deps>,
        Inst::Provides: Into<Arc<K>>,
        Deps: DependencyResolver,
    {
        let type_info = TypeInfo::of::<K>();
        let factory = FactoryData {
            instantiator: boxed_instantiator::<K, Inst, Deps>(instantiator),
            dependencies: <Inst as Instantiator<Deps>>::dependencies(),
        };

        let mut registry = self.shared.registry.lock();
        registry.check_factory(type_info, &factory.dependencies)?;

        let binding = binding(factory);
        let lifetime = binding.lifetime();
        registry.add_factory(type_info, binding)?;
        debug!(dependency = type_info.name, %lifetime, "Factory registered");
        Ok(self)
    }

    /// # Errors
    /// Returns [`RegisterErrorKind::ServiceExists`] if a service of the same type is registered
    pub fn register_service<S: Service>(&self, service: S) -> Result<&Self, RegisterErrorKind> {
        self.register_service_as::<S>(Arc::new(service))
    }

    /// Registers a service keyed by `K`, which may be a trait object with [`Service`] as a supertrait.
    ///
    /// # Errors
    /// Returns [`RegisterErrorKind::ServiceExists`] if a service with the same key is registered
    pub fn register_service_as<K>(&self, service: Arc<K>) -> Result<&Self, RegisterErrorKind>
    where
        K: ?Sized + Service,
    {
        let managed = Arc::new(Managed::new(service));
        let service = ServiceData {
            instance: AnyInstance::new::<K>(managed.inner().clone()),
            handle: AnyInstance::new::<Managed<K>>(managed.clone()),
            managed,
        };

        self.shared.registry.lock().add_service(TypeInfo::of::<K>(), service)?;
        debug!(dependency = type_name::<K>(), "Service registered");
        Ok(self)
    }

    /// Constructs the service right away, resolving the dependencies of the instantiator.
    ///
    /// # Errors
    /// - Returns [`RegisterErrorKind::ServiceExists`] if a service of the same type is registered
    /// - Returns [`RegisterErrorKind::Resolve`] if the dependencies can't be resolved or the instantiator fails
    pub fn register_service_factory<Inst, Deps>(&self, instantiator: Inst) -> Result<&Self, RegisterErrorKind>
    where
        Inst: Instantiator<Deps>,
        Inst::Provides: Service,
        Deps: DependencyResolver,
    {
        self.register_service_factory_as::<Inst::Provides, Inst, Deps>(instantiator)
    }

    #[allow(clippy::missing_errors_doc)]
    pub fn register_service_factory_as<K, Inst, Deps>(&self, instantiator: Inst) -> Result<&Self, RegisterErrorKind>
    where
        K: ?Sized + Service,
        Inst: Instantiator<Deps>,
        Inst::Provides: Into<Arc<K>>,
        Deps: DependencyResolver,
    {
        self.shared.registry.lock().check_service_slot(TypeInfo::of::<K>())?;

        let instance = self.instantiate(boxed_instantiator::<K, Inst, Deps>(instantiator))?;
        self.register_service_as::<K>(instance.downcast()?)
    }
}

impl Container {
    /// Resolves a set of declared dependencies, the same way parameters of instantiators are resolved.
    ///
    /// # Errors
    /// - Returns [`ResolveErrorKind::NotFound`] if a required dependency isn't registered
    /// - Returns [`ResolveErrorKind::MultipleSingletons`] if a single dependency matches several singletons
    /// - Returns [`ResolveErrorKind::Instantiator`] if an instantiator fails
    pub fn resolve<Deps: DependencyResolver>(&self) -> Result<Deps, ResolveErrorKind> {
        let span = info_span!("resolve", dependency = type_name::<Deps>(), scope = self.scope.id());
        let _guard = span.enter();

        Deps::resolve(&Resolver::new(self, TypeInfo::of::<Self>()))
    }

    #[allow(clippy::missing_errors_doc)]
    pub fn get_singleton<K: ?Sized + Send + Sync + 'static>(&self) -> Result<Arc<K>, ResolveErrorKind> {
        self.get::<K>(Lifetime::Singleton)
    }

    /// # Errors
    /// Returns [`ResolveErrorKind::MultipleSingletons`] if several singletons are registered under `K`
    pub fn find_singleton<K: ?Sized + Send + Sync + 'static>(&self) -> Result<Option<Arc<K>>, ResolveErrorKind> {
        self.find::<K>(Lifetime::Singleton)
    }

    #[allow(clippy::missing_errors_doc)]
    pub fn get_singletons<K: ?Sized + Send + Sync + 'static>(&self) -> Result<Vec<Arc<K>>, ResolveErrorKind> {
        match self.find_singletons::<K>()? {
            Some(singletons) => Ok(singletons),
            None => Err(not_registered::<K>(Lifetime::Singleton)),
        }
    }

    /// Every singleton registered under `K` in registration order
    #[allow(clippy::missing_errors_doc)]
    pub fn find_singletons<K: ?Sized + Send + Sync + 'static>(&self) -> Result<Option<Vec<Arc<K>>>, ResolveErrorKind> {
        let span = info_span!("find_singletons", dependency = type_name::<K>(), scope = self.scope.id());
        let _guard = span.enter();

        let type_info = TypeInfo::of::<K>();
        let binding = self.shared.registry.lock().get(type_info, Lifetime::Singleton);
        let Some(binding) = binding else {
            debug!("Not registered");
            return Ok(None);
        };

        self.instance_of(type_info, binding)?
            .into_many()
            .iter()
            .map(AnyInstance::downcast::<K>)
            .collect::<Result<_, _>>()
            .map(Some)
    }

    /// Constructs a new instance on every call
    #[allow(clippy::missing_errors_doc)]
    pub fn get_transient<K: ?Sized + Send + Sync + 'static>(&self) -> Result<Arc<K>, ResolveErrorKind> {
        self.get::<K>(Lifetime::Transient)
    }

    #[allow(clippy::missing_errors_doc)]
    pub fn find_transient<K: ?Sized + Send + Sync + 'static>(&self) -> Result<Option<Arc<K>>, ResolveErrorKind> {
        self.find::<K>(Lifetime::Transient)
    }

    /// Gets the instance of the current scope, constructing it on first use
    #[allow(clippy::missing_errors_doc)]
    pub fn get_scoped<K: ?Sized + Send + Sync + 'static>(&self) -> Result<Arc<K>, ResolveErrorKind> {
        self.get::<K>(Lifetime::Scoped)
    }

    #[allow(clippy::missing_errors_doc)]
    pub fn find_scoped<K: ?Sized + Send + Sync + 'static>(&self) -> Result<Option<Arc<K>>, ResolveErrorKind> {
        self.find::<K>(Lifetime::Scoped)
    }

    #[allow(clippy::missing_errors_doc)]
    pub fn get_service<K: ?Sized + Service>(&self) -> Result<Arc<K>, ResolveErrorKind> {
        self.get::<K>(Lifetime::Service)
    }

    #[allow(clippy::missing_errors_doc)]
    pub fn find_service<K: ?Sized + Service>(&self) -> Result<Option<Arc<K>>, ResolveErrorKind> {
        self.find::<K>(Lifetime::Service)
    }

    /// Gets the service with its lifecycle
    #[allow(clippy::missing_errors_doc)]
    pub fn get_service_handle<K: ?Sized + Service>(&self) -> Result<Arc<Managed<K>>, ResolveErrorKind> {
        let binding = self.shared.registry.lock().get(TypeInfo::of::<K>(), Lifetime::Service);

        match binding {
            Some(Binding::Service(service)) => service.handle.downcast(),
            _ => Err(not_registered::<K>(Lifetime::Service)),
        }
    }

    fn get<K: ?Sized + Send + Sync + 'static>(&self, lifetime: Lifetime) -> Result<Arc<K>, ResolveErrorKind> {
        match self.find::<K>(lifetime)? {
            Some(dependency) => Ok(dependency),
            None => Err(not_registered::<K>(lifetime)),
        }
    }

    fn find<K: ?Sized + Send + Sync + 'static>(&self, lifetime: Lifetime) -> Result<Option<Arc<K>>, ResolveErrorKind> {
        let span = info_span!("find", dependency = type_name::<K>(), %lifetime, scope = self.scope.id());
        let _guard = span.enter();

        let type_info = TypeInfo::of::<K>();
        let binding = self.shared.registry.lock().get(type_info, lifetime);
        let Some(binding) = binding else {
            debug!("Not registered");
            return Ok(None);
        };

        match self.instance_of(type_info, binding)?.into_one() {
            Ok(instance) => instance.downcast().map(Some),
            Err(err) => {
                error!("{}", err);
                Err(err)
            }
        }
    }

    /// Resolves the key by precedence of lifetimes, `None` if nothing is registered under it
    pub(crate) fn resolve_binding(&self, type_info: TypeInfo, multiplicity: Multiplicity) -> Result<Option<Resolved>, ResolveErrorKind> {
        let binding = self.shared.registry.lock().lookup(type_info);
        let Some(binding) = binding else {
            return Ok(None);
        };

        if let (Binding::Singletons(_), Multiplicity::Single) = (&binding, multiplicity) {
            let err = ResolveErrorKind::MultipleSingletons {
                type_name: type_info.name,
            };
            error!("{}", err);
            return Err(err);
        }

        self.instance_of(type_info, binding).map(Some)
    }

    fn instance_of(&self, type_info: TypeInfo, binding: Binding) -> Result<Resolved, ResolveErrorKind> {
        match binding {
            Binding::Singleton(instance) => Ok(Resolved::One(instance)),
            Binding::Singletons(instances) => Ok(Resolved::Many(instances)),
            Binding::Transient(factory) => self.instantiate(factory.instantiator).map(Resolved::One),
            Binding::Scoped(factory) => self.scoped(type_info, factory).map(Resolved::One),
            Binding::Service(service) => Ok(Resolved::One(service.instance)),
        }
    }

    fn scoped(&self, type_info: TypeInfo, factory: FactoryData) -> Result<AnyInstance, ResolveErrorKind> {
        if let Some(instance) = self.scope.get(&type_info) {
            debug!("Found in cache");
            return Ok(instance);
        }
        debug!("Not found in cache");

        let instance = self.instantiate(factory.instantiator)?;
        debug!("Cached");
        Ok(self.scope.insert(type_info, instance))
    }

    fn instantiate(&self, mut instantiator: BoxedCloneInstantiator) -> Result<AnyInstance, ResolveErrorKind> {
        match instantiator.call(self.clone()) {
            Ok(instance) => Ok(instance),
            Err(InstantiatorErrorKind::Deps(err)) => {
                error!("{}", err);
                Err(ResolveErrorKind::Instantiator(InstantiatorErrorKind::Deps(Box::new(err))))
            }
            Err(InstantiatorErrorKind::Factory(err)) => {
                error!("{}", err);
                Err(ResolveErrorKind::Instantiator(InstantiatorErrorKind::Factory(err)))
            }
        }
    }
}

fn not_registered<K: ?Sized>(lifetime: Lifetime) -> ResolveErrorKind {
    let err = ResolveErrorKind::NotRegistered {
        lifetime,
        type_name: type_name::<K>(),
    };
    error!("{}", err);
    err
}

impl Container {
    #[inline]
    #[must_use]
    pub fn state(&self) -> LifecycleState {
        self.shared.lifecycle.state()
    }

    /// Starts every registered service concurrently.
    /// `timeout` bounds the whole startup, [`Config::start_timeout`] is used if it's `None`.
    ///
    /// # Errors
    /// - Returns [`LifecycleErrorKind::InvalidTransition`] if the container is starting, started or stopping
    /// - Returns [`LifecycleErrorKind::StartTimeout`] if the services didn't start in time
    /// - Returns the first error of a failed service
    pub async fn start(&self, timeout: Option<Duration>) -> Result<(), LifecycleErrorKind> {
        self.shared.start(timeout).await
    }

    /// Stops every started service concurrently. The container is stopped even if some services fail to stop.
    ///
    /// # Errors
    /// Returns [`LifecycleErrorKind::InvalidTransition`] if the container isn't started
    pub async fn stop(&self) -> Result<StopReport, LifecycleErrorKind> {
        self.shared.stop().await
    }

    /// Starts the container and waits for Ctrl-C or a stop requested through [`ApplicationLifetime`].
    ///
    /// # Errors
    /// Returns an error if the container fails to start
    pub async fn run(&self, timeout: Option<Duration>) -> Result<Option<StopReport>, LifecycleErrorKind> {
        self.run_until(timeout, async {
            if let Err(err) = signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {}", err);
                future::pending::<()>().await;
            }
        })
        .await
    }

    /// Starts the container and stops it when `shutdown` completes.
    /// Returns `None` if the container was stopped elsewhere.
    ///
    /// # Errors
    /// Returns an error if the container fails to start
    pub async fn run_until<F>(&self, timeout: Option<Duration>, shutdown: F) -> Result<Option<StopReport>, LifecycleErrorKind>
    where
        F: Future<Output = ()>,
    {
        self.start(timeout).await?;

        tokio::select! {
            () = self.stopped() => {
                info!("Container stopped");
                Ok(None)
            }
            () = shutdown => {
                info!("Shutdown requested");
                match self.stop().await {
                    Ok(report) => Ok(Some(report)),
                    Err(LifecycleErrorKind::InvalidTransition { .. }) => {
                        self.stopped().await;
                        Ok(None)
                    }
                    Err(err) => Err(err),
                }
            }
        }
    }

    pub async fn starting(&self) {
        self.shared.lifecycle.starting().await;
    }

    pub async fn started(&self) {
        self.shared.lifecycle.started().await;
    }

    pub async fn stopping(&self) {
        self.shared.lifecycle.stopping().await;
    }

    pub async fn stopped(&self) {
        self.shared.lifecycle.stopped().await;
    }
}

#[cfg(test)]
mod tests {
    use super::Container;
    use crate::{
        config::Config,
        errors::{InstantiatorErrorKind, LifecycleErrorKind, RegisterErrorKind, ResolveErrorKind},
        inject::Inject,
        instance,
        lifecycle::LifecycleState,
        lifetime::ApplicationLifetime,
        registry::Lifetime,
        service::Service,
        utils::future::BoxFuture,
        InstantiateErrorKind,
    };

    use std::{
        future,
        sync::{
            atomic::{AtomicBool, AtomicU8, Ordering},
            Arc,
        },
        time::Duration,
    };
    use tokio::{task, time};
    use tracing_test::traced_test;

    struct Request;
    struct Session;
    struct Missing;

    #[derive(Default)]
    struct Database {
        connected: AtomicBool,
    }

    impl Service for Database {
        fn start(&self) -> BoxFuture<'_, anyhow::Result<()>> {
            Box::pin(async {
                self.connected.store(true, Ordering::SeqCst);
                Ok(())
            })
        }

        fn stop(&self) -> BoxFuture<'_, anyhow::Result<()>> {
            Box::pin(async {
                self.connected.store(false, Ordering::SeqCst);
                Ok(())
            })
        }
    }

    struct Broker {
        database: Arc<Database>,
    }

    impl Service for Broker {
        fn start(&self) -> BoxFuture<'_, anyhow::Result<()>> {
            Box::pin(async { Ok(()) })
        }

        fn stop(&self) -> BoxFuture<'_, anyhow::Result<()>> {
            Box::pin(async { Ok(()) })
        }
    }

    struct Hanging;

    impl Service for Hanging {
        fn start(&self) -> BoxFuture<'_, anyhow::Result<()>> {
            Box::pin(future::pending())
        }

        fn stop(&self) -> BoxFuture<'_, anyhow::Result<()>> {
            Box::pin(async { Ok(()) })
        }
    }

    struct Flaky;

    impl Service for Flaky {
        fn start(&self) -> BoxFuture<'_, anyhow::Result<()>> {
            Box::pin(async { Ok(()) })
        }

        fn stop(&self) -> BoxFuture<'_, anyhow::Result<()>> {
            Box::pin(async { Err(anyhow::anyhow!("flush failed")) })
        }
    }

    struct Broken;

    impl Service for Broken {
        fn start(&self) -> BoxFuture<'_, anyhow::Result<()>> {
            Box::pin(async { Err(anyhow::anyhow!("connection refused")) })
        }

        fn stop(&self) -> BoxFuture<'_, anyhow::Result<()>> {
            Box::pin(async { Ok(()) })
        }
    }

    #[test]
    #[traced_test]
    fn test_transient_distinct() {
        let container = Container::new();
        container.register_transient(|| Ok::<_, InstantiateErrorKind>(Request)).unwrap();

        let request_1 = container.get_transient::<Request>().unwrap();
        let request_2 = container.get_transient::<Request>().unwrap();

        assert!(!Arc::ptr_eq(&request_1, &request_2));
    }

    #[test]
    #[traced_test]
    fn test_singleton_same() {
        let container = Container::new();
        container.register_singleton(Request).unwrap();

        let request_1 = container.get_singleton::<Request>().unwrap();
        let request_2 = container.enter().get_singleton::<Request>().unwrap();

        assert!(Arc::ptr_eq(&request_1, &request_2));
    }

    #[test]
    #[traced_test]
    fn test_singleton_factory_constructed_on_registration() {
        let calls = Arc::new(AtomicU8::new(0));

        let container = Container::new();
        container.register_singleton(Request).unwrap();
        container
            .register_singleton_factory({
                let calls = calls.clone();
                move |Inject(_request): Inject<Request>| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, InstantiateErrorKind>(Session)
                }
            })
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        container.get_singleton::<Session>().unwrap();
        container.get_singleton::<Session>().unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    #[traced_test]
    fn test_scoped_per_scope() {
        let container = Container::new();
        container.register_scoped(|| Ok::<_, InstantiateErrorKind>(Session)).unwrap();

        let session_1 = container.get_scoped::<Session>().unwrap();
        let session_2 = container.clone().get_scoped::<Session>().unwrap();
        assert!(Arc::ptr_eq(&session_1, &session_2));

        let scoped = container.enter();
        let session_3 = scoped.get_scoped::<Session>().unwrap();
        let session_4 = scoped.get_scoped::<Session>().unwrap();
        assert!(!Arc::ptr_eq(&session_1, &session_3));
        assert!(Arc::ptr_eq(&session_3, &session_4));
        assert_ne!(container.scope_id(), scoped.scope_id());
        assert!(logs_contain("Found in cache"));
    }

    #[test]
    #[traced_test]
    fn test_binding_exists() {
        let container = Container::new();
        container.register_transient(|| Ok::<_, InstantiateErrorKind>(Request)).unwrap();

        match container.register_scoped(|| Ok::<_, InstantiateErrorKind>(Request)) {
            Err(RegisterErrorKind::BindingExists { lifetime, .. }) => assert_eq!(lifetime, Lifetime::Transient),
            Err(err) => panic!("unexpected error: {err}"),
            Ok(_) => panic!("key is already registered as transient"),
        }
        assert!(matches!(
            container.register_transient(instance(5u8)).and_then(|container| container.register_transient(instance(6u8))),
            Err(RegisterErrorKind::BindingExists { .. })
        ));
    }

    #[test]
    #[traced_test]
    fn test_transient_missing_dependency_at_registration() {
        let calls = Arc::new(AtomicU8::new(0));

        let container = Container::new();
        let result = container.register_transient({
            let calls = calls.clone();
            move |Inject(_missing): Inject<Missing>| {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, InstantiateErrorKind>(Request)
            }
        });

        match result {
            Err(RegisterErrorKind::Resolve(ResolveErrorKind::NotFound { dependant, dependency })) => {
                assert_eq!(dependant, std::any::type_name::<Request>());
                assert!(dependency.contains("Missing"));
            }
            Err(err) => panic!("unexpected error: {err}"),
            Ok(_) => panic!("dependency isn't registered"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(container.find_transient::<Request>().unwrap().is_none());
    }

    #[test]
    #[traced_test]
    fn test_optional_dependency() {
        let container = Container::new();
        container
            .register_transient(|missing: Option<Inject<Missing>>| {
                assert!(missing.is_none());
                Ok::<_, InstantiateErrorKind>(Request)
            })
            .unwrap();

        container.get_transient::<Request>().unwrap();
    }

    #[test]
    #[traced_test]
    fn test_get_and_find() {
        let container = Container::new();

        assert!(container.find_singleton::<Request>().unwrap().is_none());
        assert!(container.find_singletons::<Request>().unwrap().is_none());
        assert!(container.find_scoped::<Request>().unwrap().is_none());
        assert!(container.find_service::<Database>().unwrap().is_none());

        match container.get_scoped::<Request>() {
            Err(ResolveErrorKind::NotRegistered { lifetime, type_name }) => {
                assert_eq!(lifetime, Lifetime::Scoped);
                assert_eq!(type_name, std::any::type_name::<Request>());
            }
            Err(err) => panic!("unexpected error: {err}"),
            Ok(_) => panic!("request isn't registered"),
        }

        container.register_singleton(1u8).unwrap().register_singleton(2u8).unwrap();
        assert_eq!(
            container.get_singletons::<u8>().unwrap().iter().map(|value| **value).collect::<Vec<_>>(),
            [1, 2]
        );
        assert!(matches!(
            container.get_singleton::<u8>(),
            Err(ResolveErrorKind::MultipleSingletons { .. })
        ));
    }

    #[test]
    #[traced_test]
    fn test_singleton_precedence() {
        let container = Container::new();
        container
            .register_transient(|| Ok::<_, InstantiateErrorKind>(5u8))
            .unwrap()
            .register_singleton(7u8)
            .unwrap();

        let Inject(value) = container.resolve::<Inject<u8>>().unwrap();
        assert_eq!(*value, 7);
        assert_eq!(*container.get_transient::<u8>().unwrap(), 5);
    }

    #[test]
    #[traced_test]
    fn test_factory_error() {
        let container = Container::new();
        container
            .register_transient(|| Err::<Request, _>(anyhow::anyhow!("no route")))
            .unwrap();

        match container.get_transient::<Request>() {
            Err(ResolveErrorKind::Instantiator(InstantiatorErrorKind::Factory(err))) => {
                assert_eq!(err.to_string(), "no route");
            }
            Err(err) => panic!("unexpected error: {err}"),
            Ok(_) => panic!("factory fails"),
        }
    }

    #[test]
    #[traced_test]
    fn test_service_registration() {
        let container = Container::new();
        container.register_service(Database::default()).unwrap();

        let database = container.get_service::<Database>().unwrap();
        let handle = container.get_service_handle::<Database>().unwrap();
        assert!(Arc::ptr_eq(&database, handle.inner()));
        assert_eq!(handle.state(), LifecycleState::Stopped);

        assert!(matches!(
            container.register_service(Database::default()),
            Err(RegisterErrorKind::ServiceExists { .. })
        ));
        let Inject(resolved) = container.resolve::<Inject<Database>>().unwrap();
        assert!(Arc::ptr_eq(&database, &resolved));
    }

    #[tokio::test]
    #[traced_test]
    async fn test_start_stop() {
        let container = Container::new();
        container.register_service(Database::default()).unwrap();
        container
            .register_service_factory(|Inject(database): Inject<Database>| Ok::<_, InstantiateErrorKind>(Broker { database }))
            .unwrap();

        container.start(None).await.unwrap();
        assert_eq!(container.state(), LifecycleState::Started);
        container.started().await;

        let database = container.get_service::<Database>().unwrap();
        let broker = container.get_service::<Broker>().unwrap();
        assert!(database.connected.load(Ordering::SeqCst));
        assert!(Arc::ptr_eq(&database, &broker.database));
        assert_eq!(
            container.get_service_handle::<Broker>().unwrap().state(),
            LifecycleState::Started
        );

        let report = container.stop().await.unwrap();
        assert!(report.is_clean());
        assert_eq!(container.state(), LifecycleState::Stopped);
        assert!(!database.connected.load(Ordering::SeqCst));
    }

    #[tokio::test]
    #[traced_test]
    async fn test_invalid_container_transitions() {
        let container = Container::new();

        assert!(matches!(
            container.stop().await,
            Err(LifecycleErrorKind::InvalidTransition { .. })
        ));

        container.start(None).await.unwrap();
        assert!(matches!(
            container.start(None).await,
            Err(LifecycleErrorKind::InvalidTransition { .. })
        ));
    }

    #[tokio::test]
    #[traced_test]
    async fn test_failing_stop_reaches_stopped() {
        let container = Container::new();
        container.register_service(Flaky).unwrap().register_service(Database::default()).unwrap();

        container.start(None).await.unwrap();
        let report = container.stop().await.unwrap();

        assert_eq!(report.failures.len(), 1);
        assert!(matches!(
            &report.failures[0],
            LifecycleErrorKind::Service { service, .. } if *service == std::any::type_name::<Flaky>()
        ));
        assert_eq!(container.state(), LifecycleState::Stopped);
        let flaky = container.get_service_handle::<Flaky>().unwrap();
        assert_eq!(flaky.state(), LifecycleState::Stopped);
        time::timeout(Duration::from_secs(1), container.stopped()).await.unwrap();
        time::timeout(Duration::from_secs(1), flaky.stopped()).await.unwrap();
    }

    #[tokio::test]
    #[traced_test]
    async fn test_boundary_waiters_without_services() {
        let container = Container::new();

        let starting = tokio::spawn({
            let container = container.clone();
            async move { container.starting().await }
        });
        let stopping = tokio::spawn({
            let container = container.clone();
            async move { container.stopping().await }
        });
        task::yield_now().await;

        container.start(None).await.unwrap();
        container.stop().await.unwrap();

        time::timeout(Duration::from_secs(1), starting).await.unwrap().unwrap();
        time::timeout(Duration::from_secs(1), stopping).await.unwrap().unwrap();
    }

    #[tokio::test]
    #[traced_test]
    async fn test_start_timeout() {
        let container = Container::new();
        container.register_service(Hanging).unwrap().register_service(Database::default()).unwrap();

        match container.start(Some(Duration::from_millis(50))).await {
            Err(LifecycleErrorKind::StartTimeout { timeout }) => assert_eq!(timeout, Duration::from_millis(50)),
            Err(err) => panic!("unexpected error: {err}"),
            Ok(()) => panic!("hanging service never starts"),
        }

        assert_eq!(container.state(), LifecycleState::Stopped);
        assert_eq!(container.get_service_handle::<Hanging>().unwrap().state(), LifecycleState::Stopped);
        assert_eq!(container.get_service_handle::<Database>().unwrap().state(), LifecycleState::Stopped);
    }

    #[tokio::test]
    #[traced_test]
    async fn test_config_start_timeout() {
        let container = Container::with_config(Config {
            start_timeout: Some(Duration::from_millis(20)),
            ..Config::default()
        });
        container.register_service(Hanging).unwrap();

        assert!(matches!(
            container.start(None).await,
            Err(LifecycleErrorKind::StartTimeout { .. })
        ));
    }

    #[tokio::test]
    #[traced_test]
    async fn test_failed_start_rolls_back() {
        let container = Container::new();
        container.register_service(Database::default()).unwrap().register_service(Broken).unwrap();

        match container.start(None).await {
            Err(LifecycleErrorKind::Service { service, source }) => {
                assert_eq!(service, std::any::type_name::<Broken>());
                assert_eq!(source.to_string(), "connection refused");
            }
            Err(err) => panic!("unexpected error: {err}"),
            Ok(()) => panic!("broken service fails to start"),
        }

        assert_eq!(container.state(), LifecycleState::Stopped);
        assert_eq!(container.get_service_handle::<Database>().unwrap().state(), LifecycleState::Stopped);
        assert!(!container.get_service::<Database>().unwrap().connected.load(Ordering::SeqCst));
    }

    #[tokio::test]
    #[traced_test]
    async fn test_run_until() {
        let container = Container::new();
        container.register_service(Database::default()).unwrap();

        let report = container.run_until(None, async {}).await.unwrap();

        assert!(report.is_some_and(|report| report.is_clean()));
        assert_eq!(container.state(), LifecycleState::Stopped);
    }

    #[tokio::test]
    #[traced_test]
    async fn test_application_lifetime() {
        let container = Container::new();
        let lifetime = container.get_singleton::<ApplicationLifetime>().unwrap();

        let (result, report) = tokio::join!(container.run_until(None, future::pending()), async {
            lifetime.started().await;
            assert_eq!(lifetime.state(), LifecycleState::Started);
            lifetime.stop_application().await
        });

        assert!(result.unwrap().is_none());
        assert!(report.unwrap().is_clean());
        assert_eq!(lifetime.state(), LifecycleState::Stopped);

        drop(container);
        assert_eq!(lifetime.state(), LifecycleState::Unknown);
        assert!(matches!(
            lifetime.stop_application().await,
            Err(LifecycleErrorKind::Detached)
        ));
    }
}
