use std::{
    collections::BTreeMap,
    fmt::{self, Display, Formatter},
    sync::Arc,
};
use tracing::error;

use crate::{
    any::{AnyInstance, TypeInfo},
    dependency::{Dependency, Multiplicity},
    errors::{RegisterErrorKind, ResolveErrorKind},
    instantiator::BoxedCloneInstantiator,
    service::ManagedService,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifetime {
    Singleton,
    Transient,
    Scoped,
    Service,
}

impl Display for Lifetime {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Singleton => "Singleton",
            Self::Transient => "Transient",
            Self::Scoped => "Scoped",
            Self::Service => "Service",
        })
    }
}

#[derive(Clone)]
pub(crate) struct FactoryData {
    pub(crate) instantiator: BoxedCloneInstantiator,
    pub(crate) dependencies: Vec<Dependency>,
}

#[derive(Clone)]
pub(crate) struct ServiceData {
    /// `Arc<K>` of the user service
    pub(crate) instance: AnyInstance,
    /// `Arc<Managed<K>>` of the same service
    pub(crate) handle: AnyInstance,
    pub(crate) managed: Arc<dyn ManagedService>,
}

#[derive(Clone)]
pub(crate) enum Binding {
    Singleton(AnyInstance),
    Singletons(Vec<AnyInstance>),
    Transient(FactoryData),
    Scoped(FactoryData),
    Service(ServiceData),
}

impl Binding {
    #[must_use]
    pub(crate) fn lifetime(&self) -> Lifetime {
        match self {
            Self::Singleton(_) | Self::Singletons(_) => Lifetime::Singleton,
            Self::Transient(_) => Lifetime::Transient,
            Self::Scoped(_) => Lifetime::Scoped,
            Self::Service(_) => Lifetime::Service,
        }
    }
}

/// Bindings of one key. Transient and scoped share the factory slot.
#[derive(Default)]
struct Bindings {
    singletons: Vec<AnyInstance>,
    factory: Option<Binding>,
    service: Option<ServiceData>,
}

impl Bindings {
    fn singleton(&self) -> Option<Binding> {
        match self.singletons.as_slice() {
            [] => None,
            [instance] => Some(Binding::Singleton(instance.clone())),
            instances => Some(Binding::Singletons(instances.to_vec())),
        }
    }
}

#[derive(Default)]
pub(crate) struct Registry {
    bindings: BTreeMap<TypeInfo, Bindings>,
    services: Vec<TypeInfo>,
}

impl Registry {
    /// The first registration stores the instance, the next ones accumulate into a list.
    pub(crate) fn add_singleton(&mut self, type_info: TypeInfo, instance: AnyInstance) {
        self.bindings.entry(type_info).or_default().singletons.push(instance);
    }

    /// # Errors
    /// Returns [`RegisterErrorKind::BindingExists`] if a transient or scoped factory is already registered
    pub(crate) fn add_factory(&mut self, type_info: TypeInfo, binding: Binding) -> Result<(), RegisterErrorKind> {
        self.check_factory_slot(type_info)?;
        self.bindings.entry(type_info).or_default().factory = Some(binding);
        Ok(())
    }

    /// # Errors
    /// Returns [`RegisterErrorKind::ServiceExists`] if a service is already registered
    pub(crate) fn add_service(&mut self, type_info: TypeInfo, service: ServiceData) -> Result<(), RegisterErrorKind> {
        self.check_service_slot(type_info)?;
        self.bindings.entry(type_info).or_default().service = Some(service);
        self.services.push(type_info);
        Ok(())
    }

    pub(crate) fn check_factory_slot(&self, type_info: TypeInfo) -> Result<(), RegisterErrorKind> {
        match self.bindings.get(&type_info).and_then(|bindings| bindings.factory.as_ref()) {
            Some(binding) => {
                let err = RegisterErrorKind::BindingExists {
                    type_name: type_info.name,
                    lifetime: binding.lifetime(),
                };
                error!("{}", err);
                Err(err)
            }
            None => Ok(()),
        }
    }

    pub(crate) fn check_service_slot(&self, type_info: TypeInfo) -> Result<(), RegisterErrorKind> {
        if self.bindings.get(&type_info).is_some_and(|bindings| bindings.service.is_some()) {
            let err = RegisterErrorKind::ServiceExists {
                type_name: type_info.name,
            };
            error!("{}", err);
            return Err(err);
        }
        Ok(())
    }

    /// Dry run of a factory registration, no factory is invoked.
    ///
    /// # Errors
    /// - Returns [`RegisterErrorKind::BindingExists`] if the key already has a transient or scoped factory
    /// - Returns [`RegisterErrorKind::MissingTypeHint`] if a dependency has no candidate types
    /// - Returns [`ResolveErrorKind::NotFound`] if no candidate of a required dependency is registered
    /// - Returns [`ResolveErrorKind::MultipleSingletons`] if a single dependency matches several singletons
    pub(crate) fn check_factory(&self, dependant: TypeInfo, dependencies: &[Dependency]) -> Result<(), RegisterErrorKind> {
        self.check_factory_slot(dependant)?;

        if let Some(dependency) = dependencies.iter().find(|dependency| dependency.candidates.is_empty()) {
            let err = RegisterErrorKind::MissingTypeHint {
                dependant: dependant.name,
                parameter: dependency.name.unwrap_or("_").to_owned(),
            };
            error!("{}", err);
            return Err(err);
        }

        for dependency in dependencies {
            let available = dependency.candidates.iter().find_map(|candidate| self.lookup(*candidate));

            match available {
                Some(Binding::Singletons(instances)) if dependency.multiplicity == Multiplicity::Single => {
                    let err = ResolveErrorKind::MultipleSingletons {
                        type_name: instances.first().map_or(dependant.name, |instance| instance.type_info().name),
                    };
                    error!("{}", err);
                    return Err(err.into());
                }
                None if dependency.required => {
                    let err = ResolveErrorKind::NotFound {
                        dependant: dependant.name,
                        dependency: dependency.to_string(),
                    };
                    error!("{}", err);
                    return Err(err.into());
                }
                _ => {}
            }
        }

        Ok(())
    }

    /// Binding of the key by precedence: singleton, then transient or scoped, then service.
    #[must_use]
    pub(crate) fn lookup(&self, type_info: TypeInfo) -> Option<Binding> {
        let bindings = self.bindings.get(&type_info)?;

        bindings
            .singleton()
            .or_else(|| bindings.factory.clone())
            .or_else(|| bindings.service.clone().map(Binding::Service))
    }

    /// Binding of the key registered with the given lifetime.
    #[must_use]
    pub(crate) fn get(&self, type_info: TypeInfo, lifetime: Lifetime) -> Option<Binding> {
        let bindings = self.bindings.get(&type_info)?;

        match lifetime {
            Lifetime::Singleton => bindings.singleton(),
            Lifetime::Transient | Lifetime::Scoped => bindings
                .factory
                .as_ref()
                .filter(|binding| binding.lifetime() == lifetime)
                .cloned(),
            Lifetime::Service => bindings.service.clone().map(Binding::Service),
        }
    }

    /// Services in registration order.
    #[must_use]
    pub(crate) fn services(&self) -> Vec<Arc<dyn ManagedService>> {
        self.services
            .iter()
            .filter_map(|type_info| self.bindings.get(type_info))
            .filter_map(|bindings| bindings.service.as_ref())
            .map(|service| service.managed.clone())
            .collect()
    }
}
