//! The type lattice (component F's data model): a small closed sum with no
//! fixed-point iteration, since sends widen straight to [`Type::Polytype`].
//!
//! `ObjectValue`/`ObjectRef` stand in for the out-of-scope object memory: a
//! `Literal` carries an exact value (a tagged small integer, a symbol, or an
//! identity drawn from [`crate::globals::Globals`]); a `Monotype` carries
//! only the class identity, not a value.

use serde::{Deserialize, Serialize};

/// Opaque identity for a well-known runtime object (a singleton like `nil`
/// or a class like `SmallInteger`). Real identity comparison in the source
/// VM is pointer equality on `TObject*`; here it's equality on a stable id
/// handed out by [`crate::globals::Globals`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectRef(pub u32);

/// The exact value a `Literal` type carries. Small integers and literal
/// table entries (`Symbol`/`String`) are compared by value; everything else
/// (singletons, classes) is compared by [`ObjectRef`] identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ObjectValue {
    SmallInteger(i64),
    Symbol(String),
    String(String),
    Object(ObjectRef),
}

impl ObjectValue {
    /// `isSmallInteger(object)`: true only for an exact tagged-integer
    /// literal, never for a `Monotype(smallIntClass)` (that's a class
    /// identity, not a tagged value).
    pub fn is_small_integer(&self) -> bool {
        matches!(self, ObjectValue::SmallInteger(_))
    }

    fn as_small_integer(&self) -> Option<i64> {
        match self {
            ObjectValue::SmallInteger(n) => Some(*n),
            _ => None,
        }
    }

    fn identity(&self) -> Option<ObjectRef> {
        match self {
            ObjectValue::Object(r) => Some(*r),
            _ => None,
        }
    }
}

/// Element of the type lattice (§1.1/§4.F). No ordering or join operator is
/// defined beyond the phi rule (`Composite` of operand types) — sends
/// conservatively widen to `Polytype` rather than needing one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Type {
    /// No information yet, or reset after an unrecognized shape.
    Undefined,
    /// An exact compile-time-known value.
    Literal(ObjectValue),
    /// Known class, unknown exact value.
    Monotype(ObjectRef),
    /// Heterogeneous tuple (the `markArguments` array), one subtype per slot.
    Array(Vec<Type>),
    /// Disjunction of subtypes, produced only by phi merges.
    Composite(Vec<Type>),
    /// Top: no useful information, and none is coming (a `sendMessage`, or
    /// any widened default).
    Polytype,
}

impl Type {
    pub fn is_undefined(&self) -> bool {
        matches!(self, Type::Undefined)
    }

    pub fn is_polytype(&self) -> bool {
        matches!(self, Type::Polytype)
    }

    /// `isSmallInteger(type.getValue())`: only an exact small-integer
    /// literal counts, matching the tagged-pointer predicate it ports.
    pub fn is_small_integer_literal(&self) -> bool {
        matches!(self, Type::Literal(v) if v.is_small_integer())
    }

    pub fn as_small_integer(&self) -> Option<i64> {
        match self {
            Type::Literal(v) => v.as_small_integer(),
            _ => None,
        }
    }

    /// True for a `Literal`/`Monotype` whose underlying identity equals
    /// `class`. Used by the `isInt1`/`isInt2` "literal int or SmallInt
    /// monotype" test and by the `isNil` unary send.
    pub fn identity_is(&self, class: ObjectRef) -> bool {
        match self {
            Type::Monotype(r) => *r == class,
            Type::Literal(v) => v.identity() == Some(class),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_integer_literal_reports_itself() {
        let t = Type::Literal(ObjectValue::SmallInteger(5));
        assert!(t.is_small_integer_literal());
        assert_eq!(t.as_small_integer(), Some(5));
    }

    #[test]
    fn monotype_is_not_a_small_integer_literal() {
        let t = Type::Monotype(ObjectRef(3));
        assert!(!t.is_small_integer_literal());
        assert_eq!(t.as_small_integer(), None);
    }

    #[test]
    fn identity_is_matches_literal_object_and_monotype() {
        let nil = ObjectRef(1);
        assert!(Type::Literal(ObjectValue::Object(nil)).identity_is(nil));
        assert!(Type::Monotype(nil).identity_is(nil));
        assert!(!Type::Literal(ObjectValue::SmallInteger(1)).identity_is(nil));
    }
}
