//! # Fixed-Arity Views
//!
//! `View1` through `View5` bind one to five component columns of a
//! sub-world and hand out mutable references to all of them at once for
//! every matching entity.
//!
//! Columns are resolved once when the view is built. Each pass matches
//! into a pooled entity list, then visits the matches in ascending slot
//! order. Writes through a view bypass component hooks.

use std::any::type_name;
use std::marker::PhantomData;
use std::rc::Rc;

use super::component::Component;
use super::descriptor::{QueryShape, TypeDescriptor};
use super::entity::EntityId;
use super::matcher::collect_matches;
use super::sub_world::SubWorld;
use super::table::ErasedTable;
use crate::error::{EcsError, EcsResult};
use crate::memory::EntityList;

/// Type index the descriptor binds for `T`.
fn bound_index<T: Component>(descriptor: &TypeDescriptor) -> EcsResult<usize> {
    descriptor
        .binding_of::<T>()
        .map(|binding| binding.type_index)
        .ok_or(EcsError::UnboundColumn {
            type_name: type_name::<T>(),
        })
}

fn bound_column<'a, T: Component>(
    tables: &'a [Box<dyn ErasedTable>],
    index: usize,
) -> EcsResult<&'a [T]> {
    tables
        .get(index)
        .and_then(|table| table.downcast_ref::<T>())
        .map(|table| table.raw_components())
        .ok_or(EcsError::UnboundColumn {
            type_name: type_name::<T>(),
        })
}

macro_rules! fixed_view {
    ($doc:literal, $view:ident, $ctor:ident, $ctor_of:ident, $n:literal; $($t:ident => $v:ident),+) => {
        #[doc = $doc]
        pub struct $view<'w, $($t: Component),+> {
            sub_world: &'w mut SubWorld,
            descriptor: Rc<TypeDescriptor>,
            indices: [usize; $n],
            context: &'static str,
            _marker: PhantomData<fn() -> ($($t,)+)>,
        }

        impl<'w, $($t: Component),+> $view<'w, $($t),+> {
            fn bind(sub_world: &'w mut SubWorld, descriptor: Rc<TypeDescriptor>) -> EcsResult<Self> {
                let indices = [$(bound_index::<$t>(&descriptor)?),+];
                let names = [$(type_name::<$t>()),+];
                for (position, index) in indices.iter().enumerate() {
                    if indices[..position].contains(index) {
                        return Err(EcsError::DuplicateBinding {
                            type_name: names[position],
                        });
                    }
                }
                Ok(Self {
                    sub_world,
                    descriptor,
                    indices,
                    context: stringify!($view),
                    _marker: PhantomData,
                })
            }

            /// Tags the pooled lists this view acquires.
            #[must_use]
            pub fn with_context(mut self, context: &'static str) -> Self {
                self.context = context;
                self
            }

            /// The descriptor this view runs.
            #[must_use]
            pub fn descriptor(&self) -> &TypeDescriptor {
                &self.descriptor
            }

            /// Appends the matches to `out`, ascending by slot.
            ///
            /// # Errors
            ///
            /// See [`collect_matches`].
            pub fn entities_into(&self, out: &mut Vec<EntityId>) -> EcsResult<()> {
                collect_matches(out, &self.descriptor, &self.sub_world.query_view(), &[])
            }

            /// Collects the matches into a pooled list the caller must release.
            ///
            /// # Errors
            ///
            /// Pool errors, plus those of `entities_into`.
            pub fn entities(&self) -> EcsResult<EntityList> {
                let pool = self.sub_world.pool();
                let mut list = pool.acquire_entities(self.context)?;
                if let Err(err) = self.entities_into(&mut list) {
                    pool.release(list)?;
                    return Err(err);
                }
                Ok(list)
            }

            /// The bound value columns, indexed by slot.
            ///
            /// # Errors
            ///
            /// [`EcsError::UnboundColumn`] if a table cannot be resolved.
            pub fn columns(&self) -> EcsResult<($(&[$t],)+)> {
                let tables = self.sub_world.tables();
                let [$($v),+] = self.indices;
                Ok(($(bound_column::<$t>(tables, $v)?,)+))
            }

            /// Calls `f` with every match and mutable access to its bound values.
            ///
            /// # Errors
            ///
            /// Pool and matching errors. The pooled list is released on
            /// every path.
            pub fn for_each<F>(&mut self, mut f: F) -> EcsResult<()>
            where
                F: FnMut(EntityId, $(&mut $t),+),
            {
                let pool = Rc::clone(self.sub_world.pool());
                let mut matched = pool.acquire_entities(self.context)?;
                let outcome = self.apply(&mut matched, &mut f);
                let released = pool.release(matched);
                outcome.and(released)
            }

            fn apply<F>(&mut self, matched: &mut Vec<EntityId>, f: &mut F) -> EcsResult<()>
            where
                F: FnMut(EntityId, $(&mut $t),+),
            {
                collect_matches(matched, &self.descriptor, &self.sub_world.query_view(), &[])?;

                let (tables, _) = self.sub_world.tables_mut();
                let mut picked: [Option<&mut (dyn ErasedTable + 'static)>; $n] = Default::default();
                for (index, table) in tables.iter_mut().enumerate() {
                    if let Some(position) = self.indices.iter().position(|&wanted| wanted == index) {
                        picked[position] = Some(&mut **table);
                    }
                }
                let [$(Some($v)),+] = picked else {
                    return Err(EcsError::UnboundColumn {
                        type_name: type_name::<($($t,)+)>(),
                    });
                };
                $(
                    let $v = $v.downcast_mut::<$t>().ok_or(EcsError::UnboundColumn {
                        type_name: type_name::<$t>(),
                    })?;
                )+

                for &entity in matched.iter() {
                    let slot = entity.index();
                    let ($(Some($v),)+) = ($($v.slot_mut(slot),)+) else {
                        continue;
                    };
                    f(entity, $($v),+);
                }
                Ok(())
            }
        }

        impl SubWorld {
            #[doc = concat!("Builds a [`", stringify!($view), "`] binding exactly its component types.")]
            ///
            /// # Errors
            ///
            /// [`EcsError::Unregistered`] if a type has no table, plus
            /// [`EcsError::DuplicateBinding`] for repeated types.
            pub fn $ctor<$($t: Component),+>(&mut self) -> EcsResult<$view<'_, $($t),+>> {
                let descriptor = self.descriptor::<($($t,)+)>()?;
                $view::bind(self, descriptor)
            }

            #[doc = concat!("Builds a [`", stringify!($view), "`] over shape `Q`, which must bind every listed type.")]
            ///
            /// # Errors
            ///
            /// Shape errors, plus [`EcsError::UnboundColumn`] if `Q` does
            /// not bind a listed type.
            pub fn $ctor_of<Q: QueryShape, $($t: Component),+>(&mut self) -> EcsResult<$view<'_, $($t),+>> {
                let descriptor = self.descriptor::<Q>()?;
                $view::bind(self, descriptor)
            }
        }
    };
}

fixed_view!("View over one component column.", View1, view1, view1_of, 1; A => a);
fixed_view!("View over two component columns.", View2, view2, view2_of, 2; A => a, B => b);
fixed_view!("View over three component columns.", View3, view3, view3_of, 3; A => a, B => b, C => c);
fixed_view!(
    "View over four component columns.",
    View4, view4, view4_of, 4;
    A => a, B => b, C => c, D => d
);
fixed_view!(
    "View over five component columns.",
    View5, view5, view5_of, 5;
    A => a, B => b, C => c, D => d, E => e
);

#[cfg(test)]
#[allow(dead_code)]
mod tests {
    use super::*;
    use crate::config::WorldConfig;
    use crate::ecs::DescriptorBuilder;

    #[derive(Clone, Copy, Debug, Default, PartialEq)]
    struct Pos(f32);
    impl Component for Pos {}

    #[derive(Clone, Copy, Debug, Default, PartialEq)]
    struct Vel(f32);
    impl Component for Vel {}

    #[derive(Clone, Copy, Debug, Default, PartialEq)]
    struct Frozen;
    impl Component for Frozen {}

    #[derive(Clone, Copy, Debug, Default, PartialEq)]
    struct Mass(u8);
    impl Component for Mass {}

    #[derive(Clone, Copy, Debug, Default, PartialEq)]
    struct Spin(i8);
    impl Component for Spin {}

    #[derive(Clone, Copy, Debug, Default, PartialEq)]
    struct Heat(u16);
    impl Component for Heat {}

    struct Thawed;

    impl QueryShape for Thawed {
        fn describe(builder: &mut DescriptorBuilder<'_>) -> EcsResult<()> {
            builder.bind::<Pos>()?.bind::<Vel>()?.exclude::<Frozen>()?;
            Ok(())
        }
    }

    fn sub_world() -> (SubWorld, Vec<EntityId>) {
        let mut sub = SubWorld::standalone(0, &WorldConfig::default()).unwrap();
        sub.register::<Pos>(None).unwrap();
        sub.register::<Vel>(None).unwrap();
        sub.register::<Frozen>(None).unwrap();
        let ids: Vec<EntityId> = (1..=4).map(|serial| sub.create_entity(serial).unwrap()).collect();
        for (i, &id) in ids.iter().enumerate() {
            sub.set(id, Pos(i as f32)).unwrap();
        }
        sub.set(ids[1], Vel(1.0)).unwrap();
        sub.set(ids[2], Vel(2.0)).unwrap();
        sub.set(ids[3], Vel(3.0)).unwrap();
        sub.set(ids[3], Frozen).unwrap();
        (sub, ids)
    }

    #[test]
    fn test_for_each_mutates_in_place() {
        let (mut sub, ids) = sub_world();
        let mut seen = Vec::new();
        sub.view2::<Pos, Vel>()
            .unwrap()
            .for_each(|id, pos, vel| {
                pos.0 += vel.0;
                seen.push(id.slot());
            })
            .unwrap();

        assert_eq!(seen, vec![1, 2, 3]);
        assert_eq!(sub.get::<Pos>(ids[0]).unwrap(), &Pos(0.0));
        assert_eq!(sub.get::<Pos>(ids[1]).unwrap(), &Pos(2.0));
        assert_eq!(sub.get::<Pos>(ids[3]).unwrap(), &Pos(6.0));
        assert_eq!(sub.pool().outstanding_count(), 0);
    }

    #[test]
    fn test_shaped_view_excludes() {
        let (mut sub, _) = sub_world();
        let view = sub
            .view2_of::<Thawed, Pos, Vel>()
            .unwrap()
            .with_context("thawed movers");
        let list = view.entities().unwrap();
        assert_eq!(list.context(), "thawed movers");
        assert_eq!(list.iter().map(|id| id.slot()).collect::<Vec<_>>(), vec![1, 2]);
        sub.pool().release(list).unwrap();
    }

    #[test]
    fn test_columns_are_slot_indexed() {
        let (mut sub, ids) = sub_world();
        let view = sub.view1::<Vel>().unwrap();
        let (vel,) = view.columns().unwrap();
        assert_eq!(vel[ids[2].index()], Vel(2.0));
        assert_eq!(vel[ids[0].index()], Vel::default());
    }

    #[test]
    fn test_binding_errors() {
        let (mut sub, _) = sub_world();
        assert!(matches!(
            sub.view2_of::<(Pos,), Pos, Vel>(),
            Err(EcsError::UnboundColumn { .. })
        ));
        assert!(matches!(
            sub.view2_of::<(Pos,), Pos, Pos>(),
            Err(EcsError::DuplicateBinding { .. })
        ));
    }

    #[test]
    fn test_five_columns() {
        let (mut sub, ids) = sub_world();
        sub.register::<Mass>(None).unwrap();
        sub.register::<Spin>(None).unwrap();
        sub.register::<Heat>(None).unwrap();
        sub.set(ids[2], Mass(4)).unwrap();
        sub.set(ids[2], Spin(-1)).unwrap();
        sub.set(ids[2], Heat(300)).unwrap();

        let mut hits = 0;
        sub.view5::<Pos, Vel, Mass, Spin, Heat>()
            .unwrap()
            .for_each(|_, pos, vel, mass, spin, heat| {
                hits += 1;
                heat.0 += u16::from(mass.0);
                spin.0 = -spin.0;
                pos.0 = vel.0;
            })
            .unwrap();

        assert_eq!(hits, 1);
        assert_eq!(sub.get::<Heat>(ids[2]).unwrap(), &Heat(304));
        assert_eq!(sub.get::<Spin>(ids[2]).unwrap(), &Spin(1));
        assert_eq!(sub.get::<Pos>(ids[2]).unwrap(), &Pos(2.0));
    }
}
