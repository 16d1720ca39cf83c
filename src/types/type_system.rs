//! Semantic type model for Sable
//!
//! Equality is nominal for named and struct types: two values compare by
//! their name only. Arrays compare their element types and functions
//! compare their signatures structurally.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Primitive types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PrimitiveType {
    I8, I16, I32, I64,
    U8, U16, U32, U64,
    F32, F64,
    Str,
    Bool,
    Byte,
}

impl PrimitiveType {
    /// Every builtin primitive, in prelude declaration order
    pub const ALL: [PrimitiveType; 13] = [
        Self::I8, Self::I16, Self::I32, Self::I64,
        Self::U8, Self::U16, Self::U32, Self::U64,
        Self::F32, Self::F64,
        Self::Str, Self::Bool, Self::Byte,
    ];

    /// Source-level spelling
    pub fn name(&self) -> &'static str {
        match self {
            Self::I8 => "i8",
            Self::I16 => "i16",
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::U8 => "u8",
            Self::U16 => "u16",
            Self::U32 => "u32",
            Self::U64 => "u64",
            Self::F32 => "f32",
            Self::F64 => "f64",
            Self::Str => "str",
            Self::Bool => "bool",
            Self::Byte => "byte",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|p| p.name() == name)
    }

    /// Get the size in bytes (str is a fat pointer)
    pub fn size_of(&self) -> usize {
        match self {
            Self::I8 | Self::U8 | Self::Bool | Self::Byte => 1,
            Self::I16 | Self::U16 => 2,
            Self::I32 | Self::U32 | Self::F32 => 4,
            Self::I64 | Self::U64 | Self::F64 => 8,
            Self::Str => 16,
        }
    }

    /// Check if this is a signed integer type
    pub fn is_signed(&self) -> bool {
        matches!(self, Self::I8 | Self::I16 | Self::I32 | Self::I64)
    }

    /// Check if this is an integer type
    pub fn is_integer(&self) -> bool {
        matches!(self,
            Self::I8 | Self::I16 | Self::I32 | Self::I64 |
            Self::U8 | Self::U16 | Self::U32 | Self::U64 | Self::Byte
        )
    }

    /// Check if this is a floating-point type
    pub fn is_float(&self) -> bool {
        matches!(self, Self::F32 | Self::F64)
    }

    pub fn is_numeric(&self) -> bool {
        self.is_integer() || self.is_float()
    }
}

impl fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A semantic type attached to symbols after resolution
#[derive(Debug, Clone)]
pub enum Type {
    Primitive(PrimitiveType),
    /// User-declared alias. `definition` is absent for forward references.
    Named {
        name: String,
        definition: Option<Box<Type>>,
    },
    /// Fields keyed by name; ordering carries no meaning
    Struct {
        name: String,
        fields: BTreeMap<String, Type>,
    },
    Array(Box<Type>),
    Function {
        params: Vec<Type>,
        ret: Option<Box<Type>>,
    },
}

impl Type {
    pub fn primitive(prim: PrimitiveType) -> Self {
        Self::Primitive(prim)
    }

    pub fn named(name: impl Into<String>, definition: Option<Type>) -> Self {
        Self::Named {
            name: name.into(),
            definition: definition.map(Box::new),
        }
    }

    pub fn array(elem: Type) -> Self {
        Self::Array(Box::new(elem))
    }

    pub fn function(params: Vec<Type>, ret: Option<Type>) -> Self {
        Self::Function {
            params,
            ret: ret.map(Box::new),
        }
    }

    /// Follow alias definitions down to the underlying type.
    /// Forward references without a definition stop at the alias itself.
    pub fn unwrap_alias(&self) -> &Type {
        let mut current = self;
        while let Self::Named { definition: Some(def), .. } = current {
            current = def;
        }
        current
    }

    /// Nominal types carry a name; structural ones do not
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Primitive(p) => Some(p.name()),
            Self::Named { name, .. } | Self::Struct { name, .. } => Some(name),
            Self::Array(_) | Self::Function { .. } => None,
        }
    }

    /// Whether a value of type `value` may be stored where `self` is expected
    pub fn accepts(&self, value: &Type) -> bool {
        self == value || self.unwrap_alias() == value.unwrap_alias()
    }
}

impl PartialEq for Type {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Primitive(a), Self::Primitive(b)) => a == b,
            (Self::Named { name: a, .. }, Self::Named { name: b, .. }) => a == b,
            (Self::Struct { name: a, .. }, Self::Struct { name: b, .. }) => a == b,
            (Self::Array(a), Self::Array(b)) => a == b,
            (
                Self::Function { params: pa, ret: ra },
                Self::Function { params: pb, ret: rb },
            ) => pa == pb && ra == rb,
            _ => false,
        }
    }
}

impl Eq for Type {}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primitive(p) => write!(f, "{}", p),
            Self::Named { name, .. } => f.write_str(name),
            Self::Struct { name, fields } => {
                if fields.is_empty() {
                    return write!(f, "{} {{}}", name);
                }
                let body: Vec<String> = fields
                    .iter()
                    .map(|(field, ty)| format!("{}: {}", field, ty))
                    .collect();
                write!(f, "{} {{ {} }}", name, body.join(", "))
            }
            Self::Array(elem) => write!(f, "[]{}", elem),
            Self::Function { params, ret } => {
                let params: Vec<String> = params.iter().map(|p| p.to_string()).collect();
                write!(f, "fn({})", params.join(", "))?;
                if let Some(ret) = ret {
                    write!(f, " -> {}", ret)?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn point(fields: &[(&str, Type)]) -> Type {
        Type::Struct {
            name: "Point".to_string(),
            fields: fields
                .iter()
                .map(|(n, t)| (n.to_string(), t.clone()))
                .collect(),
        }
    }

    #[test]
    fn test_nominal_struct_equality() {
        let i32_ty = Type::primitive(PrimitiveType::I32);
        let a = point(&[("x", i32_ty.clone())]);
        let b = point(&[("y", Type::primitive(PrimitiveType::Str)), ("z", i32_ty)]);
        assert_eq!(a, b);

        let other = Type::Struct {
            name: "Vec2".to_string(),
            fields: BTreeMap::new(),
        };
        assert_ne!(a, other);
    }

    #[test]
    fn test_named_equality_ignores_definition() {
        let forward = Type::named("Node", None);
        let resolved = Type::named("Node", Some(point(&[])));
        assert_eq!(forward, resolved);
        assert_ne!(forward, Type::named("Leaf", None));
        // a named alias is never equal to a primitive of a different variant
        assert_ne!(
            Type::named("i32", None),
            Type::primitive(PrimitiveType::I32)
        );
    }

    #[test]
    fn test_function_equality() {
        let i32_ty = Type::primitive(PrimitiveType::I32);
        let add = Type::function(vec![i32_ty.clone(), i32_ty.clone()], Some(i32_ty.clone()));
        let same = Type::function(vec![i32_ty.clone(), i32_ty.clone()], Some(i32_ty.clone()));
        let no_ret = Type::function(vec![i32_ty.clone(), i32_ty.clone()], None);
        let fewer = Type::function(vec![i32_ty.clone()], Some(i32_ty));
        assert_eq!(add, same);
        assert_ne!(add, no_ret);
        assert_ne!(add, fewer);
    }

    #[test]
    fn test_display() {
        let i32_ty = Type::primitive(PrimitiveType::I32);
        let str_ty = Type::primitive(PrimitiveType::Str);
        assert_eq!(Type::array(i32_ty.clone()).to_string(), "[]i32");
        assert_eq!(
            Type::function(vec![i32_ty.clone(), str_ty.clone()], Some(i32_ty.clone())).to_string(),
            "fn(i32, str) -> i32"
        );
        assert_eq!(Type::function(vec![], None).to_string(), "fn()");
        assert_eq!(
            point(&[("y", str_ty), ("x", i32_ty)]).to_string(),
            "Point { x: i32, y: str }"
        );
        assert_eq!(point(&[]).to_string(), "Point {}");
    }

    #[test]
    fn test_unwrap_alias() {
        let inner = Type::primitive(PrimitiveType::F64);
        let alias = Type::named("Meters", Some(Type::named("Length", Some(inner.clone()))));
        assert_eq!(alias.unwrap_alias(), &inner);
        assert!(alias.accepts(&inner));
        assert!(!Type::primitive(PrimitiveType::I32).accepts(&inner));
    }

    #[test]
    fn test_primitive_lookup() {
        assert_eq!(PrimitiveType::from_name("u16"), Some(PrimitiveType::U16));
        assert_eq!(PrimitiveType::from_name("usize"), None);
        assert!(PrimitiveType::Byte.is_integer());
        assert!(!PrimitiveType::Str.is_numeric());
    }
}
