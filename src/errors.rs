mod dependency_resolver;
mod instantiate;
mod instantiator;
mod lifecycle;
mod register;

pub use dependency_resolver::ResolveErrorKind;
pub use instantiate::InstantiateErrorKind;
pub use instantiator::InstantiatorErrorKind;
pub use lifecycle::LifecycleErrorKind;
pub use register::RegisterErrorKind;

pub type InstantiatorResult<T> = Result<T, InstantiateErrorKind>;
