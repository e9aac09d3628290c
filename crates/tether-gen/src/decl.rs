//! Input declaration model
//!
//! Generation input is a collection of native type/function
//! declarations, each carrying a stable identity (module path plus
//! name) and a documented parameter/return signature. Parsing source
//! text into this model is the frontend's concern; this crate only
//! consumes it.

use serde::{Deserialize, Serialize};

use tether_abi::{PrimitiveKind, WireValue};

/// A parameter type as declared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParamType {
    /// A concrete primitive kind
    Concrete(PrimitiveKind),
    /// A generic parameter, resolved against the declaration's
    /// [`GenericDecl`] bindings during monomorphization
    Generic(String),
    /// A struct/enum passed by reference; degrades to an opaque
    /// handle, its internal shape never participates in naming
    Opaque,
}

/// A declared return type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RetDecl {
    /// No return value
    Void,
    /// A concrete primitive kind
    Concrete(PrimitiveKind),
    /// A generic parameter
    Generic(String),
    /// A struct/enum returned by value or reference; degrades to an
    /// opaque handle
    Opaque,
}

/// One declared parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamDecl {
    /// Parameter name (kept for generated documentation)
    pub name: String,
    /// Declared type
    pub ty: ParamType,
    /// Whether the declaration carries a default value. Exported
    /// variants must have fixed arity, so this fails generation.
    pub has_default: bool,
}

impl ParamDecl {
    /// A plain required parameter.
    pub fn required(name: &str, ty: ParamType) -> Self {
        ParamDecl {
            name: name.to_string(),
            ty,
            has_default: false,
        }
    }
}

/// A generic parameter with its closed set of admissible kinds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenericDecl {
    /// Generic parameter name as it appears in `ParamType::Generic`
    pub name: String,
    /// The concrete kinds this parameter ranges over, in declaration
    /// order; expansion preserves this order
    pub kinds: Vec<PrimitiveKind>,
}

/// How a function is attached to its owner.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FnReceiver {
    /// Free or associated function, no receiver
    Static,
    /// Instance method, receives a handle
    Instance,
    /// Constructor: a static entry whose result becomes a fresh
    /// handle wrapped by the lifetime bridge
    Constructor,
}

/// One declared native function or method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FnDecl {
    /// Overload-group base name
    pub base_name: String,
    /// Owning type name, empty for free functions
    pub owner: String,
    /// Receiver discipline
    pub receiver: FnReceiver,
    /// Whether the native implementation completes asynchronously
    pub is_async: bool,
    /// Parameters in declaration order
    pub params: Vec<ParamDecl>,
    /// Return type
    pub ret: RetDecl,
    /// Generic parameters, empty for concrete declarations
    pub generics: Vec<GenericDecl>,
    /// Whether the declaration is variadic. Disallowed; fails
    /// generation with `UnsupportedSignature`.
    pub is_variadic: bool,
    /// Native symbol this declaration dispatches to
    pub target: String,
}

impl FnDecl {
    /// Qualified display name for error reporting.
    pub fn qualified_name(&self) -> String {
        if self.owner.is_empty() {
            self.base_name.clone()
        } else {
            format!("{}::{}", self.owner, self.base_name)
        }
    }
}

/// A constant attached to a type or module, captured as a literal
/// value at generation time. Immutable in the generated surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstDecl {
    /// Constant name
    pub name: String,
    /// Baked literal value
    pub value: WireValue,
}

/// One exported native type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeDecl {
    /// Type name, unique within the crate
    pub name: String,
    /// Stable numeric type id used by handles
    pub type_id: u32,
    /// Constants baked into the proxy class
    pub consts: Vec<ConstDecl>,
    /// Constructors, instance methods and associated functions
    pub functions: Vec<FnDecl>,
}

/// One exported crate: the whole generation input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrateDecl {
    /// Stable module path identifying the crate
    pub module: String,
    /// Module-level constants
    pub consts: Vec<ConstDecl>,
    /// Free functions
    pub functions: Vec<FnDecl>,
    /// Exported types
    pub types: Vec<TypeDecl>,
}

impl CrateDecl {
    /// An empty crate declaration with the given module path.
    pub fn new(module: &str) -> Self {
        CrateDecl {
            module: module.to_string(),
            consts: Vec::new(),
            functions: Vec::new(),
            types: Vec::new(),
        }
    }
}
