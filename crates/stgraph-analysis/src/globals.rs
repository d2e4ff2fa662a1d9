//! The well-known-object bundle (§6 "consumed from the runtime").
//!
//! The source VM sets this up once at image-load time as process-wide
//! state. There is no image-load phase to hook here, so it is an explicit
//! argument threaded into the builder/analyzer instead of a mutable
//! singleton (§9 design notes) — this also makes several independently
//! configured analyses in one process (tests, in particular) trivial
//! without shared statics.

use crate::types::ObjectRef;

/// Identities needed by the type analyzer's fast paths. `boolean_class` and
/// `nil_class` are not literally named in the source `globals` struct; they
/// are `trueObject->getClass()->getClass()` and `nilObject->getClass()`
/// respectively, computed once at image-load time there. Since this port
/// has no object memory to walk, both are carried as already-resolved
/// fields instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Globals {
    pub nil_object: ObjectRef,
    pub nil_class: ObjectRef,
    pub true_object: ObjectRef,
    pub false_object: ObjectRef,
    pub boolean_class: ObjectRef,
    pub array_class: ObjectRef,
    pub small_int_class: ObjectRef,
}

impl Default for Globals {
    /// Stable, arbitrary ids good enough for identity comparison within one
    /// analysis run. Real values come from the loader's object memory; nothing
    /// here depends on the particular numbers chosen.
    fn default() -> Self {
        Globals {
            nil_object: ObjectRef(0),
            nil_class: ObjectRef(1),
            true_object: ObjectRef(2),
            false_object: ObjectRef(3),
            boolean_class: ObjectRef(4),
            array_class: ObjectRef(5),
            small_int_class: ObjectRef(6),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_globals_are_distinct() {
        let g = Globals::default();
        let ids = [
            g.nil_object,
            g.nil_class,
            g.true_object,
            g.false_object,
            g.boolean_class,
            g.array_class,
            g.small_int_class,
        ];
        for (i, a) in ids.iter().enumerate() {
            for (j, b) in ids.iter().enumerate() {
                if i != j {
                    assert_ne!(a, b);
                }
            }
        }
    }
}
