mod base;
mod boxed_clone;
mod handler_fn;

pub(crate) use base::Handler;
pub(crate) use boxed_clone::BoxCloneHandler;
pub(crate) use handler_fn::handler_fn;
