//! Static type lattice for alias variables and expressions

use std::fmt;

/// Value types, ordered by promotion rank.
///
/// Combining two operands yields the higher of the two tags. `String` sits
/// at the top so that concatenation absorbs every numeric type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TypeTag {
    Int,
    Long,
    Float,
    Double,
    String,
}

impl TypeTag {
    pub const ALL: [TypeTag; 5] = [
        TypeTag::Int,
        TypeTag::Long,
        TypeTag::Float,
        TypeTag::Double,
        TypeTag::String,
    ];

    /// Look up a type keyword as written in scripts
    pub fn from_keyword(word: &str) -> Option<TypeTag> {
        match word {
            "int" => Some(TypeTag::Int),
            "long" => Some(TypeTag::Long),
            "float" => Some(TypeTag::Float),
            "double" => Some(TypeTag::Double),
            "string" => Some(TypeTag::String),
            _ => None,
        }
    }

    pub fn keyword(self) -> &'static str {
        match self {
            TypeTag::Int => "int",
            TypeTag::Long => "long",
            TypeTag::Float => "float",
            TypeTag::Double => "double",
            TypeTag::String => "string",
        }
    }

    pub fn promote(self, other: TypeTag) -> TypeTag {
        self.max(other)
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_order() {
        assert!(TypeTag::Int < TypeTag::Long);
        assert!(TypeTag::Long < TypeTag::Float);
        assert!(TypeTag::Float < TypeTag::Double);
        assert!(TypeTag::Double < TypeTag::String);
        assert_eq!(TypeTag::Int.promote(TypeTag::Double), TypeTag::Double);
        assert_eq!(TypeTag::String.promote(TypeTag::Long), TypeTag::String);
    }

    #[test]
    fn test_keywords() {
        for tag in TypeTag::ALL {
            assert_eq!(TypeTag::from_keyword(tag.keyword()), Some(tag));
        }
        assert_eq!(TypeTag::from_keyword("bool"), None);
    }
}
