use std::sync::Arc;
use tracing::debug;

use crate::{
    any::{AnyInstance, TypeInfo},
    dependency::Dependency,
    dependency_resolver::{DependencyResolver, Resolver},
    errors::{InstantiateErrorKind, InstantiatorErrorKind, ResolveErrorKind},
    handler::{handler_fn, BoxCloneHandler},
    Container,
};

/// Constructor of a dependency.
///
/// Implemented for closures and functions whose parameters implement [`DependencyResolver`],
/// so the parameter list is the declared dependency list.
pub trait Instantiator<Deps>: Clone + Send + Sync + 'static
where
    Deps: DependencyResolver,
{
    type Provides: 'static;
    type Error: Into<InstantiateErrorKind>;

    fn instantiate(&mut self, dependencies: Deps) -> Result<Self::Provides, Self::Error>;

    #[inline]
    #[must_use]
    fn dependencies() -> Vec<Dependency> {
        Deps::dependencies()
    }
}

pub(crate) type BoxedCloneInstantiator = BoxCloneHandler<InstantiatorErrorKind<ResolveErrorKind, InstantiateErrorKind>>;

/// Erases the instantiator, storing its result under the key `Key`.
#[must_use]
pub(crate) fn boxed_instantiator<Key, Inst, Deps>(instantiator: Inst) -> BoxedCloneInstantiator
where
    Key: ?Sized + Send + Sync + 'static,
    Inst: Instantiator<Deps>,
    Inst::Provides: Into<Arc<Key>>,
    Deps: DependencyResolver,
{
    let dependant = TypeInfo::of::<Key>();

    BoxCloneHandler::new(handler_fn({
        move |container: Container| {
            let resolver = Resolver::new(&container, dependant);
            let dependencies = match Deps::resolve(&resolver) {
                Ok(dependencies) => dependencies,
                Err(err) => return Err(InstantiatorErrorKind::Deps(err)),
            };
            let dependency = match instantiator.clone().instantiate(dependencies) {
                Ok(dependency) => dependency,
                Err(err) => return Err(InstantiatorErrorKind::Factory(err.into())),
            };

            debug!(%dependant, "Instantiated");

            Ok(AnyInstance::new::<Key>(dependency.into()))
        }
    }))
}

macro_rules! impl_instantiator {
    (
        [$($ty:ident),*]
    ) => {
        #[allow(non_snake_case)]
        impl<F, Response, Err, $($ty,)*> Instantiator<($($ty,)*)> for F
        where
            F: FnMut($($ty,)*) -> Result<Response, Err> + Clone + Send + Sync + 'static,
            Response: 'static,
            Err: Into<InstantiateErrorKind>,
            $( $ty: DependencyResolver, )*
        {
            type Provides = Response;
            type Error = Err;

            fn instantiate(&mut self, ($($ty,)*): ($($ty,)*)) -> Result<Self::Provides, Self::Error> {
                self($($ty,)*)
            }
        }
    };
}

all_the_tuples!(impl_instantiator);

/// Wrapper to create an instantiator that just returns passed value.
/// It can be used when the value was created outside the container,
/// construction is skipped and every lookup gets a clone of it.
#[inline]
#[must_use]
pub fn instance<T: Clone + Send + Sync + 'static>(val: T) -> impl Instantiator<(), Provides = T, Error = InstantiateErrorKind> {
    move || Ok(val.clone())
}

#[cfg(test)]
mod tests {
    use super::{boxed_instantiator, instance, DependencyResolver, InstantiateErrorKind, Instantiator};
    use crate::{
        dependency::Dependency,
        errors::InstantiatorErrorKind,
        handler::Handler as _,
        inject::{Inject, InjectAll},
        Container, ResolveErrorKind,
    };

    use std::sync::{
        atomic::{AtomicU8, Ordering},
        Arc,
    };
    use tracing::debug;
    use tracing_test::traced_test;

    struct Request(bool);
    struct Response(bool);

    #[test]
    #[allow(dead_code)]
    fn test_factory_helper() {
        fn resolver<Deps: DependencyResolver, F: Instantiator<Deps>>(_f: F) {}
        fn resolver_with_dep<Deps: DependencyResolver>() {
            resolver(|| Ok::<_, InstantiateErrorKind>(()));
            resolver(|Inject(_request): Inject<Request>| Ok::<_, InstantiateErrorKind>(()));
        }
    }

    #[test]
    fn test_dependencies_from_signature() {
        fn dependencies<Deps: DependencyResolver, F: Instantiator<Deps>>(_f: F) -> Vec<Dependency> {
            F::dependencies()
        }

        let deps = dependencies(|_: Inject<Request>, _: Option<Inject<Response>>, _: InjectAll<u8>| {
            Ok::<_, InstantiateErrorKind>(())
        });

        assert_eq!(
            deps,
            vec![
                Dependency::single::<Request>(),
                Dependency::single::<Response>().optional(),
                Dependency::many::<u8>(),
            ]
        );
    }

    #[test]
    #[traced_test]
    fn test_boxed_instantiator() {
        let instantiator_response_call_count = Arc::new(AtomicU8::new(0));

        let mut instantiator_response = boxed_instantiator::<Response, _, _>({
            let instantiator_response_call_count = instantiator_response_call_count.clone();
            move |Inject(request): Inject<Request>| {
                instantiator_response_call_count.fetch_add(1, Ordering::SeqCst);

                debug!("Call instantiator response");
                Ok::<_, InstantiateErrorKind>(Response(request.0))
            }
        });

        let container = Container::new();
        container.register_singleton(Request(true)).unwrap();

        let response_1 = instantiator_response.call(container.clone()).unwrap();
        let response_2 = instantiator_response.call(container).unwrap();

        assert!(response_1.downcast::<Response>().unwrap().0);
        assert!(!Arc::ptr_eq(
            &response_1.downcast::<Response>().unwrap(),
            &response_2.downcast::<Response>().unwrap()
        ));
        assert_eq!(instantiator_response_call_count.load(Ordering::SeqCst), 2);
    }

    #[test]
    #[traced_test]
    fn test_boxed_instantiator_errors() {
        let mut missing_deps = boxed_instantiator::<Response, _, _>(|Inject(request): Inject<Request>| {
            Ok::<_, InstantiateErrorKind>(Response(request.0))
        });
        let mut failing = boxed_instantiator::<Response, _, _>(|| Err::<Response, _>(anyhow::anyhow!("boom")));

        let container = Container::new();

        match missing_deps.call(container.clone()) {
            Err(InstantiatorErrorKind::Deps(ResolveErrorKind::NotFound { dependant, .. })) => {
                assert_eq!(dependant, std::any::type_name::<Response>());
            }
            Err(err) => panic!("unexpected error: {err}"),
            Ok(_) => panic!("request isn't registered"),
        }
        match failing.call(container) {
            Err(InstantiatorErrorKind::Factory(err)) => assert_eq!(err.to_string(), "boom"),
            Err(err) => panic!("unexpected error: {err}"),
            Ok(_) => panic!("factory fails"),
        }
    }

    #[test]
    fn test_instance() {
        let mut instantiator = instance(Arc::new(5u8));

        let first = instantiator.instantiate(()).unwrap();
        let second = instantiator.instantiate(()).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
    }
}
