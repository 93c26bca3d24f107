use super::{instantiate::InstantiateErrorKind, instantiator::InstantiatorErrorKind};
use crate::{any::TypeInfo, registry::Lifetime};

#[derive(thiserror::Error, Debug)]
pub enum ResolveErrorKind {
    #[error("Required dependency not found: {dependency} (required by {dependant})")]
    NotFound { dependant: &'static str, dependency: String },
    #[error("{lifetime} not found: {type_name}")]
    NotRegistered { lifetime: Lifetime, type_name: &'static str },
    #[error("Multiple singletons of type {type_name} found")]
    MultipleSingletons { type_name: &'static str },
    #[error("Incorrect instance type. Actual: {actual}, expected: {expected}")]
    IncorrectType { expected: TypeInfo, actual: TypeInfo },
    #[error(transparent)]
    Instantiator(InstantiatorErrorKind<Box<ResolveErrorKind>, InstantiateErrorKind>),
}
