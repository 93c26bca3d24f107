use tracing::{debug, error};

use crate::{
    any::{AnyInstance, TypeInfo},
    dependency::Dependency,
    errors::ResolveErrorKind,
    Container,
};

/// Declares and resolves the dependencies of a factory.
///
/// Implemented for the parameter wrappers ([`crate::Inject`], [`crate::InjectAll`], [`crate::OneOf`],
/// [`crate::Named`], [`Option`]) and for tuples of them.
pub trait DependencyResolver: Sized {
    /// Descriptors in declaration order. Checked on registration of transient and scoped factories.
    #[must_use]
    fn dependencies() -> Vec<Dependency>;

    /// # Errors
    /// Returns an error if a required dependency can't be resolved
    fn resolve(resolver: &Resolver<'_>) -> Result<Self, ResolveErrorKind>;
}

/// Instances found for one dependency.
#[derive(Clone)]
pub enum Resolved {
    One(AnyInstance),
    Many(Vec<AnyInstance>),
}

impl Resolved {
    /// # Errors
    /// Returns [`ResolveErrorKind::MultipleSingletons`] if several instances were resolved
    pub fn into_one(self) -> Result<AnyInstance, ResolveErrorKind> {
        match self {
            Resolved::One(instance) => Ok(instance),
            Resolved::Many(mut instances) if instances.len() == 1 => Ok(instances.remove(0)),
            Resolved::Many(instances) => Err(ResolveErrorKind::MultipleSingletons {
                type_name: instances.first().map_or("unknown", |instance| instance.type_info().name),
            }),
        }
    }

    #[must_use]
    pub fn into_many(self) -> Vec<AnyInstance> {
        match self {
            Resolved::One(instance) => vec![instance],
            Resolved::Many(instances) => instances,
        }
    }
}

/// Resolution context of one factory call.
pub struct Resolver<'a> {
    container: &'a Container,
    dependant: TypeInfo,
}

impl<'a> Resolver<'a> {
    #[inline]
    #[must_use]
    pub(crate) const fn new(container: &'a Container, dependant: TypeInfo) -> Self {
        Self { container, dependant }
    }

    #[inline]
    #[must_use]
    pub fn dependant(&self) -> TypeInfo {
        self.dependant
    }

    /// Resolves a dependency, returning the index of the candidate that matched.
    ///
    /// # Errors
    /// Returns [`ResolveErrorKind::NotFound`] if the dependency is required and no candidate resolves
    pub fn resolve_dependency(&self, dependency: &Dependency) -> Result<Option<(usize, Resolved)>, ResolveErrorKind> {
        for (index, candidate) in dependency.candidates.iter().enumerate() {
            if let Some(resolved) = self.container.resolve_binding(*candidate, dependency.multiplicity)? {
                debug!(%candidate, "Dependency resolved");
                return Ok(Some((index, resolved)));
            }
        }

        if dependency.required {
            let err = ResolveErrorKind::NotFound {
                dependant: self.dependant.name,
                dependency: dependency.to_string(),
            };
            error!("{}", err);
            return Err(err);
        }

        debug!(%dependency, "Optional dependency not found");
        Ok(None)
    }
}

macro_rules! impl_dependency_resolver {
    (
        [$($ty:ident),*]
    ) => {
        #[allow(non_snake_case, unused_mut)]
        impl<$($ty,)*> DependencyResolver for ($($ty,)*)
        where
            $( $ty: DependencyResolver, )*
        {
            #[inline]
            fn dependencies() -> Vec<Dependency> {
                let mut dependencies = Vec::new();
                $( dependencies.extend($ty::dependencies()); )*
                dependencies
            }

            #[inline]
            #[allow(unused_variables)]
            fn resolve(resolver: &Resolver<'_>) -> Result<Self, ResolveErrorKind> {
                Ok(($($ty::resolve(resolver)?,)*))
            }
        }
    };
}

all_the_tuples!(impl_dependency_resolver);
