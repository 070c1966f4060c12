//! Grace value types and their compatibility rules.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ir::IrType;

/// Bit width used for `int` values.
pub const INT_BITS: u32 = 32;
/// Bit width used for `bool` values.
pub const BOOL_BITS: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Type {
    Int,
    Bool,
    String,
    Array { element: Box<Type>, size: u32 },
}

impl Type {
    pub fn array(element: Type, size: u32) -> Self {
        Type::Array {
            element: Box::new(element),
            size,
        }
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Type::Array { .. })
    }

    /// `int` and `bool` can be compared with `==` and `!=`.
    pub fn is_scalar(&self) -> bool {
        matches!(self, Type::Int | Type::Bool)
    }

    /// Element type and length of an array type.
    pub fn element(&self) -> Option<(&Type, u32)> {
        match self {
            Type::Array { element, size } => Some((element, *size)),
            _ => None,
        }
    }

    /// Target representation of a value of this type.
    pub fn render(&self) -> IrType {
        match self {
            Type::Int => IrType::Int(INT_BITS),
            Type::Bool => IrType::Int(BOOL_BITS),
            Type::String => IrType::Ptr,
            Type::Array { element, size } => IrType::Array(Box::new(element.render()), *size),
        }
    }

    /// Target representation of a parameter of this type; arrays are passed by
    /// reference.
    pub fn render_param(&self) -> IrType {
        match self {
            Type::Array { .. } => IrType::Ptr,
            other => other.render(),
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Int => write!(f, "int"),
            Type::Bool => write!(f, "bool"),
            Type::String => write!(f, "string"),
            Type::Array { element, size } => write!(f, "{element}[{size}]"),
        }
    }
}

/// Structural equality; no coercion between types.
pub fn equals(a: &Type, b: &Type) -> bool {
    a == b
}

/// Whether a value of type `value` may be stored into a `target` slot.
///
/// Grace has no implicit widening, so this is an exact match.
pub fn is_assignable(target: &Type, value: &Type) -> bool {
    equals(target, value)
}
