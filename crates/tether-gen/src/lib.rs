//! Tether generation side
//!
//! Turns native declarations into the two artifacts consumed by the
//! runtime bridge:
//!
//! - a [`DispatchTable`] binding every concrete call variant to an
//!   integer index in one of the four call spaces, and
//! - per-type [`ProxyClass`] descriptions of the generated host
//!   surface (factory, baked constants, method bindings).
//!
//! Both artifacts of one pass carry the same [`BuildStamp`]; mixing
//! artifacts from different passes is rejected by the executor at
//! link time. Generation is all-or-nothing: any error aborts the
//! pass with nothing emitted.
//!
//! The textual emission of proxy source files is a separate
//! templating concern and not part of this crate.

#![warn(missing_docs)]

pub mod decl;
pub mod mono;
pub mod proxy;
pub mod table;

pub use decl::{ConstDecl, CrateDecl, FnDecl, FnReceiver, GenericDecl, ParamDecl, ParamType, RetDecl, TypeDecl};
pub use mono::{monomorphize_crate, monomorphize_group, MonoVariant};
pub use proxy::{generate, Generation, MethodBinding, ProxyClass, ProxyUnit};
pub use table::{DispatchTable, DispatchTableBuilder};

pub use tether_abi::BuildStamp;
