use std::fmt::{self, Display, Formatter};

use crate::any::TypeInfo;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Multiplicity {
    Single,
    Many,
}

/// Declared dependency of a factory parameter.
///
/// Candidates are tried in declaration order, the first one that resolves wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    pub name: Option<&'static str>,
    pub candidates: Vec<TypeInfo>,
    pub required: bool,
    pub multiplicity: Multiplicity,
}

impl Dependency {
    #[inline]
    #[must_use]
    pub fn single<T: ?Sized + 'static>() -> Self {
        Self::one_of(vec![TypeInfo::of::<T>()])
    }

    #[inline]
    #[must_use]
    pub fn many<T: ?Sized + 'static>() -> Self {
        Self {
            multiplicity: Multiplicity::Many,
            ..Self::single::<T>()
        }
    }

    #[inline]
    #[must_use]
    pub fn one_of(candidates: Vec<TypeInfo>) -> Self {
        Self {
            name: None,
            candidates,
            required: true,
            multiplicity: Multiplicity::Single,
        }
    }

    #[inline]
    #[must_use]
    pub fn optional(self) -> Self {
        Self { required: false, ..self }
    }

    #[inline]
    #[must_use]
    pub fn named(self, name: &'static str) -> Self {
        Self { name: Some(name), ..self }
    }
}

impl Display for Dependency {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if let Some(name) = self.name {
            write!(f, "{name}: ")?;
        }
        if self.multiplicity == Multiplicity::Many {
            f.write_str("many ")?;
        }
        for (index, candidate) in self.candidates.iter().enumerate() {
            if index > 0 {
                f.write_str(" | ")?;
            }
            write!(f, "{candidate}")?;
        }
        if !self.required {
            f.write_str(" (optional)")?;
        }
        Ok(())
    }
}
