use super::base::Handler;
use crate::{any::AnyInstance, container::Container};

type DynInstanceHandler<Error> = dyn InstanceHandler<Error> + Send + Sync;

/// Type-erased factory of instances. Every clone owns a copy of the captured state.
pub(crate) struct BoxCloneHandler<Error>(Box<DynInstanceHandler<Error>>);

impl<Error> BoxCloneHandler<Error> {
    #[inline]
    #[must_use]
    pub(crate) fn new<H>(handler: H) -> Self
    where
        H: Handler<Container, Response = AnyInstance, Error = Error> + Clone + Send + Sync + 'static,
    {
        Self(Box::new(handler))
    }
}

trait InstanceHandler<Error>: Handler<Container, Response = AnyInstance, Error = Error> {
    fn clone_box(&self) -> Box<DynInstanceHandler<Error>>;
}

impl<Error, H> InstanceHandler<Error> for H
where
    H: Handler<Container, Response = AnyInstance, Error = Error> + Clone + Send + Sync + 'static,
{
    #[inline]
    fn clone_box(&self) -> Box<DynInstanceHandler<Error>> {
        Box::new(self.clone())
    }
}

impl<Error> Clone for BoxCloneHandler<Error> {
    #[inline]
    fn clone(&self) -> Self {
        Self(self.0.clone_box())
    }
}

impl<Error> Handler<Container> for BoxCloneHandler<Error> {
    type Response = AnyInstance;
    type Error = Error;

    #[inline]
    fn call(&mut self, container: Container) -> Result<AnyInstance, Error> {
        self.0.call(container)
    }
}
