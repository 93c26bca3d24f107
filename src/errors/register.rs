use super::dependency_resolver::ResolveErrorKind;
use crate::registry::Lifetime;

#[derive(thiserror::Error, Debug)]
pub enum RegisterErrorKind {
    #[error("Binding already exists: {type_name} is registered as {lifetime}")]
    BindingExists { type_name: &'static str, lifetime: Lifetime },
    #[error("Service already exists: {type_name}")]
    ServiceExists { type_name: &'static str },
    #[error("Missing type hint for parameter: {parameter} of {dependant}")]
    MissingTypeHint { dependant: &'static str, parameter: String },
    #[error(transparent)]
    Resolve(#[from] ResolveErrorKind),
}
