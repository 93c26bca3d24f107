use std::{marker::PhantomData, sync::Arc};

use crate::{
    dependency::Dependency,
    dependency_resolver::{DependencyResolver, Resolved, Resolver},
    errors::ResolveErrorKind,
};

/// Factory parameter resolved from a single declared dependency.
pub trait Param: Sized {
    #[must_use]
    fn dependency() -> Dependency;

    /// Builds the parameter from the instances of the candidate at `index`.
    ///
    /// # Errors
    /// Returns an error if the resolved instances don't match the declared shape
    fn from_resolved(index: usize, resolved: Resolved) -> Result<Self, ResolveErrorKind>;
}

fn resolve_param<P: Param>(resolver: &Resolver<'_>, dependency: &Dependency) -> Result<Option<P>, ResolveErrorKind> {
    match resolver.resolve_dependency(dependency)? {
        Some((index, resolved)) => P::from_resolved(index, resolved).map(Some),
        None => Ok(None),
    }
}

fn resolve_required<P: Param>(resolver: &Resolver<'_>) -> Result<P, ResolveErrorKind> {
    let dependency = P::dependency();
    match resolve_param(resolver, &dependency)? {
        Some(param) => Ok(param),
        None => Err(ResolveErrorKind::NotFound {
            dependant: resolver.dependant().name,
            dependency: dependency.to_string(),
        }),
    }
}

/// Required dependency on a single instance of `Dep`.
pub struct Inject<Dep: ?Sized>(pub Arc<Dep>);

impl<Dep: ?Sized + Send + Sync + 'static> Param for Inject<Dep> {
    fn dependency() -> Dependency {
        Dependency::single::<Dep>()
    }

    fn from_resolved(_index: usize, resolved: Resolved) -> Result<Self, ResolveErrorKind> {
        resolved.into_one()?.downcast().map(Self)
    }
}

impl<Dep: ?Sized + Send + Sync + 'static> DependencyResolver for Inject<Dep> {
    fn dependencies() -> Vec<Dependency> {
        vec![Self::dependency()]
    }

    fn resolve(resolver: &Resolver<'_>) -> Result<Self, ResolveErrorKind> {
        resolve_required(resolver)
    }
}

/// Dependency on every singleton registered under `Dep`.
///
/// Transient, scoped and service bindings produce a single element.
pub struct InjectAll<Dep: ?Sized>(pub Vec<Arc<Dep>>);

impl<Dep: ?Sized + Send + Sync + 'static> Param for InjectAll<Dep> {
    fn dependency() -> Dependency {
        Dependency::many::<Dep>()
    }

    fn from_resolved(_index: usize, resolved: Resolved) -> Result<Self, ResolveErrorKind> {
        resolved
            .into_many()
            .iter()
            .map(|instance| instance.downcast())
            .collect::<Result<_, _>>()
            .map(Self)
    }
}

impl<Dep: ?Sized + Send + Sync + 'static> DependencyResolver for InjectAll<Dep> {
    fn dependencies() -> Vec<Dependency> {
        vec![Self::dependency()]
    }

    fn resolve(resolver: &Resolver<'_>) -> Result<Self, ResolveErrorKind> {
        resolve_required(resolver)
    }
}

/// Dependency on the first of two alternatives that resolves.
pub enum OneOf<A: ?Sized, B: ?Sized> {
    First(Arc<A>),
    Second(Arc<B>),
}

impl<A, B> Param for OneOf<A, B>
where
    A: ?Sized + Send + Sync + 'static,
    B: ?Sized + Send + Sync + 'static,
{
    fn dependency() -> Dependency {
        let mut dependency = Dependency::single::<A>();
        dependency.candidates.extend(Dependency::single::<B>().candidates);
        dependency
    }

    fn from_resolved(index: usize, resolved: Resolved) -> Result<Self, ResolveErrorKind> {
        let instance = resolved.into_one()?;
        if index == 0 {
            instance.downcast().map(Self::First)
        } else {
            instance.downcast().map(Self::Second)
        }
    }
}

impl<A, B> DependencyResolver for OneOf<A, B>
where
    A: ?Sized + Send + Sync + 'static,
    B: ?Sized + Send + Sync + 'static,
{
    fn dependencies() -> Vec<Dependency> {
        vec![Self::dependency()]
    }

    fn resolve(resolver: &Resolver<'_>) -> Result<Self, ResolveErrorKind> {
        resolve_required(resolver)
    }
}

/// Name of a [`Named`] parameter.
pub trait ParamName {
    const NAME: &'static str;
}

/// Parameter labelled with a name.
///
/// The name only goes into the [`Dependency`](crate::Dependency) descriptor, where it shows up in
/// errors and logs. The value is still passed by position like any other parameter.
///
/// ```rust
/// use warden::{Inject, Named, ParamName};
///
/// struct Primary;
///
/// impl ParamName for Primary {
///     const NAME: &'static str = "primary";
/// }
///
/// struct Database;
///
/// fn connect(Named { value: Inject(db), .. }: Named<Primary, Inject<Database>>) {
///     let _ = db;
/// }
/// ```
pub struct Named<N, P> {
    pub value: P,
    name: PhantomData<fn() -> N>,
}

impl<N, P> Named<N, P> {
    #[inline]
    #[must_use]
    pub fn into_inner(self) -> P {
        self.value
    }
}

impl<N: ParamName, P: Param> Param for Named<N, P> {
    fn dependency() -> Dependency {
        P::dependency().named(N::NAME)
    }

    fn from_resolved(index: usize, resolved: Resolved) -> Result<Self, ResolveErrorKind> {
        P::from_resolved(index, resolved).map(|value| Self { value, name: PhantomData })
    }
}

impl<N: ParamName, P: Param> DependencyResolver for Named<N, P> {
    fn dependencies() -> Vec<Dependency> {
        vec![Self::dependency()]
    }

    fn resolve(resolver: &Resolver<'_>) -> Result<Self, ResolveErrorKind> {
        resolve_required(resolver)
    }
}

impl<P: Param> DependencyResolver for Option<P> {
    fn dependencies() -> Vec<Dependency> {
        vec![P::dependency().optional()]
    }

    fn resolve(resolver: &Resolver<'_>) -> Result<Self, ResolveErrorKind> {
        resolve_param(resolver, &P::dependency().optional())
    }
}
