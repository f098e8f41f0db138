/// Result type alias for type-expression and typedef processing
pub type Result<T> = std::result::Result<T, Error>;

/// Error types raised while turning doc-comment annotations into schemas
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// The type expression is not valid in the supported grammar
    TypeSyntax {
        expression: String,
        offset: usize,
        message: String,
    },
    /// The expression parsed, but its kind has no schema conversion
    UnsupportedType(String),
    /// A generic other than `Array<T>`
    UnsupportedGeneric(String),
    /// `@property {T} a.b` appeared before `a` was declared
    UndeclaredParent { property: String, parent: String },
    /// Positional `a.b` declared under an array whose items are already one schema
    HomogeneousArrayParent { property: String, parent: String },
    /// `@propertyOpenapi` names a property that was never declared
    UnknownExtensionTarget { property: String, keyword: String },
    /// `@typedef` without a type name
    MissingTypedefName,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::TypeSyntax {
                expression,
                offset,
                message,
            } => write!(
                f,
                "invalid type expression `{}` at offset {}: {}",
                expression, offset, message
            ),
            Error::UnsupportedType(kind) => write!(f, "unsupported type kind {}", kind),
            Error::UnsupportedGeneric(subject) => {
                write!(f, "unsupported generic type {}", subject)
            }
            Error::UndeclaredParent { property, parent } => write!(
                f,
                "property {} is declared before its parent {}",
                property, parent
            ),
            Error::HomogeneousArrayParent { property, parent } => write!(
                f,
                "property {} cannot be added to {}, its items already share one schema",
                property, parent
            ),
            Error::UnknownExtensionTarget { property, keyword } => write!(
                f,
                "cannot set {} on undeclared property {}",
                keyword, property
            ),
            Error::MissingTypedefName => write!(f, "typedef has no name"),
        }
    }
}

impl std::error::Error for Error {}
