//! Value kinds and resolved metadata references.
//!
//! Every SSA node carries a [`Value`]: a kind tag plus an optional
//! known-constant payload. The kind set mirrors the JVM computational
//! types; `Illegal` marks nodes that produce no usable value (terminators,
//! block markers).
//!
//! Metadata references ([`ClassRef`], [`FieldRef`], [`MethodRef`]) arrive
//! pre-resolved from the type-resolution collaborator: offsets, kinds and
//! identities are already known by the time the builder sees them.

use std::fmt;

// =============================================================================
// Value Kinds
// =============================================================================

/// Primitive/reference kind tag of an SSA value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ValueKind {
    Void = 0,
    Int = 1,
    Long = 2,
    Float = 3,
    Double = 4,
    Object = 5,
    /// No usable value (terminators, markers).
    Illegal = 255,
}

impl ValueKind {
    /// 64-bit kinds occupy two local slots in JVM frame layout.
    #[inline]
    pub const fn is_wide(self) -> bool {
        matches!(self, ValueKind::Long | ValueKind::Double)
    }

    /// Floating-point kinds select the XMM register file.
    #[inline]
    pub const fn is_float(self) -> bool {
        matches!(self, ValueKind::Float | ValueKind::Double)
    }

    /// Byte size of an array element of this kind.
    #[inline]
    pub const fn element_size(self) -> u8 {
        match self {
            ValueKind::Int | ValueKind::Float => 4,
            ValueKind::Long | ValueKind::Double | ValueKind::Object => 8,
            ValueKind::Void | ValueKind::Illegal => 0,
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ValueKind::Void => "void",
            ValueKind::Int => "int",
            ValueKind::Long => "long",
            ValueKind::Float => "float",
            ValueKind::Double => "double",
            ValueKind::Object => "object",
            ValueKind::Illegal => "illegal",
        };
        f.write_str(s)
    }
}

// =============================================================================
// Constants
// =============================================================================

/// A compile-time-known constant payload.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConstValue {
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Null,
}

impl ConstValue {
    /// Kind tag of this constant.
    pub const fn kind(self) -> ValueKind {
        match self {
            ConstValue::Int(_) => ValueKind::Int,
            ConstValue::Long(_) => ValueKind::Long,
            ConstValue::Float(_) => ValueKind::Float,
            ConstValue::Double(_) => ValueKind::Double,
            ConstValue::Null => ValueKind::Object,
        }
    }

    /// Integer payload if this is an `Int`.
    pub const fn as_int(self) -> Option<i32> {
        match self {
            ConstValue::Int(v) => Some(v),
            _ => None,
        }
    }

    /// Long payload if this is a `Long`.
    pub const fn as_long(self) -> Option<i64> {
        match self {
            ConstValue::Long(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for ConstValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstValue::Int(v) => write!(f, "{}", v),
            ConstValue::Long(v) => write!(f, "{}L", v),
            ConstValue::Float(v) => write!(f, "{}f", v),
            ConstValue::Double(v) => write!(f, "{}d", v),
            ConstValue::Null => f.write_str("null"),
        }
    }
}

// =============================================================================
// Value
// =============================================================================

/// A typed result slot: kind tag plus optional known constant.
///
/// Immutable once attached to a node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Value {
    kind: ValueKind,
    constant: Option<ConstValue>,
}

impl Value {
    /// A value of the given kind with no known constant.
    pub const fn of(kind: ValueKind) -> Self {
        Value {
            kind,
            constant: None,
        }
    }

    /// A value carrying a known constant.
    pub const fn constant(c: ConstValue) -> Self {
        Value {
            kind: c.kind(),
            constant: Some(c),
        }
    }

    /// The no-value marker used by terminators and markers.
    pub const ILLEGAL: Value = Value::of(ValueKind::Illegal);

    #[inline]
    pub const fn kind(self) -> ValueKind {
        self.kind
    }

    /// Known-constant payload, if any.
    #[inline]
    pub const fn as_constant(self) -> Option<ConstValue> {
        self.constant
    }

    #[inline]
    pub const fn is_constant(self) -> bool {
        self.constant.is_some()
    }
}

// =============================================================================
// Resolved metadata references
// =============================================================================

/// Opaque identity of a resolved class, assigned by the resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClassId(pub u32);

/// A resolved class: identity plus display name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassRef {
    pub id: ClassId,
    pub name: String,
}

/// A resolved field access site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldRef {
    /// Declaring class.
    pub holder: ClassRef,
    pub name: String,
    /// Byte offset within the object (or the class mirror for statics).
    pub offset: i32,
    pub kind: ValueKind,
    pub is_static: bool,
    pub is_volatile: bool,
}

/// A resolved call target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodRef {
    pub holder: ClassRef,
    pub name: String,
    pub params: Vec<ValueKind>,
    pub return_kind: ValueKind,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_predicates() {
        assert!(ValueKind::Long.is_wide());
        assert!(ValueKind::Double.is_wide());
        assert!(!ValueKind::Int.is_wide());
        assert!(ValueKind::Float.is_float());
        assert!(!ValueKind::Long.is_float());
    }

    #[test]
    fn test_constant_value() {
        let v = Value::constant(ConstValue::Int(7));
        assert_eq!(v.kind(), ValueKind::Int);
        assert_eq!(v.as_constant().and_then(ConstValue::as_int), Some(7));

        let plain = Value::of(ValueKind::Object);
        assert!(!plain.is_constant());
    }

    #[test]
    fn test_element_size() {
        assert_eq!(ValueKind::Int.element_size(), 4);
        assert_eq!(ValueKind::Double.element_size(), 8);
        assert_eq!(ValueKind::Object.element_size(), 8);
    }
}
