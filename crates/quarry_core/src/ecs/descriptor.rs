//! # Type Descriptors
//!
//! A descriptor is the precomputed form of a query shape:
//! - Ordered include type indices (every one must be present)
//! - Ordered exclude type indices (none may be present)
//! - Field bindings mapping a bound component type to its table
//!
//! Shapes describe themselves through [`QueryShape`]. Sub-worlds build each
//! shape's descriptor once and cache it.

use std::any::{type_name, TypeId};
use std::collections::HashMap;

use super::component::Component;
use crate::error::{EcsError, EcsResult};
use crate::memory::{IndexSet, ResultPool, ScratchList};

/// A bound component column inside a descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldBinding {
    /// Index of the component table in the sub-world.
    pub type_index: usize,
    /// `TypeId` of the component.
    pub type_id: TypeId,
    /// Position of the binding within the shape.
    pub position: usize,
}

/// Immutable include/exclude sets plus field bindings for one query shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDescriptor {
    include: Box<[usize]>,
    exclude: Box<[usize]>,
    bindings: Box<[FieldBinding]>,
}

impl TypeDescriptor {
    /// Builds a descriptor from raw type indices, without bindings.
    ///
    /// Duplicates are dropped; first occurrence wins the ordering.
    #[must_use]
    pub fn from_indices(include: &[usize], exclude: &[usize]) -> Self {
        Self {
            include: dedup(include),
            exclude: dedup(exclude),
            bindings: Box::new([]),
        }
    }

    /// Runs `Q::describe` against a sub-world's type registry.
    ///
    /// Scratch space comes from `pool` and is returned before this returns.
    ///
    /// # Errors
    ///
    /// Whatever the shape's `describe` reports, plus pool errors.
    pub fn build<Q: QueryShape>(
        type_indices: &HashMap<TypeId, usize>,
        pool: &ResultPool,
    ) -> EcsResult<Self> {
        let seen = pool.acquire_index_set("descriptor seen")?;
        let terms = match pool.acquire_list("descriptor terms") {
            Ok(terms) => terms,
            Err(err) => {
                pool.release(seen)?;
                return Err(err);
            }
        };

        let mut builder = DescriptorBuilder {
            type_indices,
            seen,
            terms,
        };
        let described = Q::describe(&mut builder).map(|()| builder.finish());

        let DescriptorBuilder { seen, terms, .. } = builder;
        pool.release(terms)?;
        pool.release(seen)?;
        described
    }

    /// Type indices that must be present, in declaration order.
    #[inline]
    #[must_use]
    pub fn include(&self) -> &[usize] {
        &self.include
    }

    /// Type indices that must be absent, in declaration order.
    #[inline]
    #[must_use]
    pub fn exclude(&self) -> &[usize] {
        &self.exclude
    }

    /// Bound columns, in shape order.
    #[inline]
    #[must_use]
    pub fn bindings(&self) -> &[FieldBinding] {
        &self.bindings
    }

    /// Finds the binding for component type `T`.
    #[must_use]
    pub fn binding_of<T: 'static>(&self) -> Option<&FieldBinding> {
        let id = TypeId::of::<T>();
        self.bindings.iter().find(|binding| binding.type_id == id)
    }
}

fn dedup(indices: &[usize]) -> Box<[usize]> {
    let mut out: Vec<usize> = Vec::with_capacity(indices.len());
    for &index in indices {
        if !out.contains(&index) {
            out.push(index);
        }
    }
    out.into_boxed_slice()
}

#[derive(Debug, Clone, Copy)]
enum Term {
    Include(usize),
    Exclude(usize),
    Bind(FieldBinding),
}

/// Collects a shape's terms while its descriptor is built.
pub struct DescriptorBuilder<'a> {
    type_indices: &'a HashMap<TypeId, usize>,
    /// Every type index mentioned so far, for the fast "new type" path.
    seen: IndexSet,
    terms: ScratchList<Term>,
}

impl DescriptorBuilder<'_> {
    /// Requires `T` and binds its column.
    ///
    /// # Errors
    ///
    /// - [`EcsError::Unregistered`] if `T` has no table
    /// - [`EcsError::ContradictoryQuery`] if `T` is excluded
    /// - [`EcsError::DuplicateBinding`] if `T` is bound already
    pub fn bind<T: Component>(&mut self) -> EcsResult<&mut Self> {
        let type_index = self.index_of::<T>()?;
        if self.seen.contains(&type_index) {
            if self.is_excluded(type_index) {
                return Err(contradiction::<T>());
            }
            if self.binding(type_index).is_some() {
                return Err(EcsError::DuplicateBinding {
                    type_name: type_name::<T>(),
                });
            }
        }

        let position = self.terms.iter().filter(|t| matches!(t, Term::Bind(_))).count();
        self.seen.insert(type_index);
        self.terms.push(Term::Bind(FieldBinding {
            type_index,
            type_id: TypeId::of::<T>(),
            position,
        }));
        Ok(self)
    }

    /// Requires `T` without binding its column.
    ///
    /// # Errors
    ///
    /// - [`EcsError::Unregistered`] if `T` has no table
    /// - [`EcsError::ContradictoryQuery`] if `T` is excluded
    pub fn require<T: Component>(&mut self) -> EcsResult<&mut Self> {
        let type_index = self.index_of::<T>()?;
        if self.seen.insert(type_index) {
            self.terms.push(Term::Include(type_index));
        } else if self.is_excluded(type_index) {
            return Err(contradiction::<T>());
        }
        Ok(self)
    }

    /// Rejects entities that have `T`.
    ///
    /// # Errors
    ///
    /// - [`EcsError::Unregistered`] if `T` has no table
    /// - [`EcsError::ContradictoryQuery`] if `T` is required
    pub fn exclude<T: Component>(&mut self) -> EcsResult<&mut Self> {
        let type_index = self.index_of::<T>()?;
        if self.seen.insert(type_index) {
            self.terms.push(Term::Exclude(type_index));
        } else if !self.is_excluded(type_index) {
            return Err(contradiction::<T>());
        }
        Ok(self)
    }

    fn index_of<T: Component>(&self) -> EcsResult<usize> {
        self.type_indices
            .get(&TypeId::of::<T>())
            .copied()
            .ok_or(EcsError::Unregistered {
                type_name: type_name::<T>(),
            })
    }

    fn is_excluded(&self, type_index: usize) -> bool {
        self.terms
            .iter()
            .any(|term| matches!(term, Term::Exclude(i) if *i == type_index))
    }

    fn binding(&self, type_index: usize) -> Option<&FieldBinding> {
        self.terms.iter().find_map(|term| match term {
            Term::Bind(binding) if binding.type_index == type_index => Some(binding),
            _ => None,
        })
    }

    fn finish(&self) -> TypeDescriptor {
        let mut include = Vec::new();
        let mut exclude = Vec::new();
        let mut bindings = Vec::new();
        for term in self.terms.iter() {
            match *term {
                Term::Include(index) => {
                    if !include.contains(&index) {
                        include.push(index);
                    }
                }
                Term::Exclude(index) => exclude.push(index),
                Term::Bind(binding) => {
                    if !include.contains(&binding.type_index) {
                        include.push(binding.type_index);
                    }
                    bindings.push(binding);
                }
            }
        }
        TypeDescriptor {
            include: include.into_boxed_slice(),
            exclude: exclude.into_boxed_slice(),
            bindings: bindings.into_boxed_slice(),
        }
    }
}

fn contradiction<T>() -> EcsError {
    EcsError::ContradictoryQuery {
        type_name: type_name::<T>(),
    }
}

/// A query shape: the set of component types a query requires, excludes
/// and binds.
///
/// Tuples of up to five components bind every member.
///
/// # Example
///
/// ```rust,ignore
/// struct Drifting;
///
/// impl QueryShape for Drifting {
///     fn describe(builder: &mut DescriptorBuilder<'_>) -> EcsResult<()> {
///         builder.bind::<Position>()?.require::<Velocity>()?.exclude::<Anchored>()?;
///         Ok(())
///     }
/// }
/// ```
pub trait QueryShape: 'static {
    /// Declares the shape's terms.
    ///
    /// # Errors
    ///
    /// Propagates builder errors.
    fn describe(builder: &mut DescriptorBuilder<'_>) -> EcsResult<()>;
}

macro_rules! impl_tuple_shape {
    ($($t:ident),+) => {
        impl<$($t: Component),+> QueryShape for ($($t,)+) {
            fn describe(builder: &mut DescriptorBuilder<'_>) -> EcsResult<()> {
                $(builder.bind::<$t>()?;)+
                Ok(())
            }
        }
    };
}

impl_tuple_shape!(A);
impl_tuple_shape!(A, B);
impl_tuple_shape!(A, B, C);
impl_tuple_shape!(A, B, C, D);
impl_tuple_shape!(A, B, C, D, E);

#[cfg(test)]
#[allow(dead_code)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Pos;
    impl Component for Pos {}

    #[derive(Default)]
    struct Vel;
    impl Component for Vel {}

    #[derive(Default)]
    struct Frozen;
    impl Component for Frozen {}

    #[derive(Default)]
    struct Ghost;
    impl Component for Ghost {}

    fn registry() -> HashMap<TypeId, usize> {
        let mut map = HashMap::new();
        map.insert(TypeId::of::<Pos>(), 0);
        map.insert(TypeId::of::<Vel>(), 1);
        map.insert(TypeId::of::<Frozen>(), 2);
        map
    }

    struct Moving;

    impl QueryShape for Moving {
        fn describe(builder: &mut DescriptorBuilder<'_>) -> EcsResult<()> {
            builder.require::<Vel>()?.bind::<Pos>()?.exclude::<Frozen>()?;
            Ok(())
        }
    }

    struct SelfDefeating;

    impl QueryShape for SelfDefeating {
        fn describe(builder: &mut DescriptorBuilder<'_>) -> EcsResult<()> {
            builder.bind::<Pos>()?.exclude::<Pos>()?;
            Ok(())
        }
    }

    #[test]
    fn test_tuple_shape_binds_in_order() {
        let pool = ResultPool::new(8, 100, true);
        let descriptor = TypeDescriptor::build::<(Vel, Pos)>(&registry(), &pool).unwrap();

        assert_eq!(descriptor.include(), &[1, 0]);
        assert!(descriptor.exclude().is_empty());
        assert_eq!(descriptor.bindings()[0].type_index, 1);
        assert_eq!(descriptor.binding_of::<Pos>().map(|b| b.position), Some(1));
        assert_eq!(pool.outstanding_count(), 0);
    }

    #[test]
    fn test_custom_shape() {
        let pool = ResultPool::new(8, 100, true);
        let descriptor = TypeDescriptor::build::<Moving>(&registry(), &pool).unwrap();

        assert_eq!(descriptor.include(), &[1, 0]);
        assert_eq!(descriptor.exclude(), &[2]);
        assert_eq!(descriptor.bindings().len(), 1);
        assert!(descriptor.binding_of::<Vel>().is_none());
    }

    #[test]
    fn test_shape_errors_release_scratch() {
        let pool = ResultPool::new(8, 100, true);
        assert!(matches!(
            TypeDescriptor::build::<SelfDefeating>(&registry(), &pool),
            Err(EcsError::ContradictoryQuery { .. })
        ));
        assert!(matches!(
            TypeDescriptor::build::<(Pos, Ghost)>(&registry(), &pool),
            Err(EcsError::Unregistered { .. })
        ));
        assert!(matches!(
            TypeDescriptor::build::<(Pos, Pos)>(&registry(), &pool),
            Err(EcsError::DuplicateBinding { .. })
        ));
        assert_eq!(pool.outstanding_count(), 0);
        assert_eq!(pool.idle_count(), 2);
    }

    #[test]
    fn test_from_indices_dedups() {
        let descriptor = TypeDescriptor::from_indices(&[3, 1, 3], &[2, 2]);
        assert_eq!(descriptor.include(), &[3, 1]);
        assert_eq!(descriptor.exclude(), &[2]);
        assert!(descriptor.bindings().is_empty());
    }
}
