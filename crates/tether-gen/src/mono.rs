//! Signature monomorphizer
//!
//! Flattens generic/overloaded native declarations into concrete,
//! uniquely named call variants. The host has no overload dispatch,
//! so name mangling at generation time is the only resolution
//! mechanism: each variant of a multi-variant group is exported as
//! `<base>_<kind>_<kind>...` over its parameter kinds in declaration
//! order. A group with a single concrete variant keeps its base name.

use rustc_hash::FxHashMap;

use tether_abi::{CallSpace, GenError, GenResult, PrimitiveKind, ReturnKind};

use crate::decl::{CrateDecl, FnDecl, FnReceiver, ParamType, RetDecl};

/// One concrete call variant produced by monomorphization.
///
/// Not yet numbered; the dispatch table builder assigns indices in
/// first-seen declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonoVariant {
    /// Owning type, empty for free functions
    pub owner: String,
    /// Overload-group base name
    pub base: String,
    /// Flattened exported name
    pub flat_name: String,
    /// Receiver discipline of the original declaration
    pub receiver: FnReceiver,
    /// Whether the variant settles asynchronously
    pub is_async: bool,
    /// Concrete parameter kinds, fixed arity
    pub params: Vec<PrimitiveKind>,
    /// Concrete return shape
    pub ret: ReturnKind,
    /// Native symbol the variant dispatches to
    pub target: String,
}

impl MonoVariant {
    /// The call space this variant will be numbered in.
    ///
    /// Constructors are static entries: the runtime wraps their
    /// result into a fresh handle.
    pub fn space(&self) -> CallSpace {
        match (self.receiver, self.is_async) {
            (FnReceiver::Instance, false) => CallSpace::InstanceSync,
            (FnReceiver::Instance, true) => CallSpace::InstanceAsync,
            (_, false) => CallSpace::StaticSync,
            (_, true) => CallSpace::StaticAsync,
        }
    }

    /// Qualified display name for error reporting.
    pub fn qualified_name(&self) -> String {
        if self.owner.is_empty() {
            self.flat_name.clone()
        } else {
            format!("{}::{}", self.owner, self.flat_name)
        }
    }
}

/// Flattened name for a signature: base plus one suffix per
/// parameter kind, in declaration order. Nullary variants keep the
/// bare base name.
fn flat_name(base: &str, params: &[PrimitiveKind]) -> String {
    if params.is_empty() {
        return base.to_string();
    }
    let mut name = String::from(base);
    for kind in params {
        name.push('_');
        name.push_str(kind.suffix());
    }
    name
}

fn signature_string(params: &[PrimitiveKind]) -> String {
    params
        .iter()
        .map(|k| k.suffix())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Expand one declaration into its concrete variants.
///
/// Generic parameters range over their closed kind sets; expansion is
/// the cartesian product in declaration order with the rightmost
/// generic cycling fastest. Struct/enum parameters degrade to `Obj`.
fn expand_decl(decl: &FnDecl) -> GenResult<Vec<MonoVariant>> {
    if decl.is_variadic {
        return Err(GenError::UnsupportedSignature {
            name: decl.qualified_name(),
            reason: "variadic parameters are not exportable".to_string(),
        });
    }
    if let Some(param) = decl.params.iter().find(|p| p.has_default) {
        return Err(GenError::UnsupportedSignature {
            name: decl.qualified_name(),
            reason: format!("parameter '{}' has a default value", param.name),
        });
    }
    for generic in &decl.generics {
        if generic.kinds.is_empty() {
            return Err(GenError::UnsupportedSignature {
                name: decl.qualified_name(),
                reason: format!("generic '{}' has an empty kind set", generic.name),
            });
        }
    }
    if decl.receiver == FnReceiver::Constructor && !matches!(decl.ret, RetDecl::Opaque) {
        return Err(GenError::UnsupportedSignature {
            name: decl.qualified_name(),
            reason: "constructor must return an owned native resource".to_string(),
        });
    }

    let resolve_generic = |name: &str, binding: &[PrimitiveKind]| -> GenResult<PrimitiveKind> {
        decl.generics
            .iter()
            .position(|g| g.name == name)
            .map(|pos| binding[pos])
            .ok_or_else(|| GenError::UnsupportedSignature {
                name: decl.qualified_name(),
                reason: format!("unbound generic parameter '{name}'"),
            })
    };

    let mut variants = Vec::new();
    let mut binding: Vec<usize> = vec![0; decl.generics.len()];
    loop {
        let kinds: Vec<PrimitiveKind> = decl
            .generics
            .iter()
            .zip(&binding)
            .map(|(g, &i)| g.kinds[i])
            .collect();

        let mut params = Vec::with_capacity(decl.params.len());
        for param in &decl.params {
            let kind = match &param.ty {
                ParamType::Concrete(kind) => *kind,
                ParamType::Generic(name) => resolve_generic(name, &kinds)?,
                ParamType::Opaque => PrimitiveKind::Obj,
            };
            params.push(kind);
        }

        let ret = match &decl.ret {
            RetDecl::Void => ReturnKind::Void,
            RetDecl::Concrete(kind) => ReturnKind::Value(*kind),
            RetDecl::Generic(name) => ReturnKind::Value(resolve_generic(name, &kinds)?),
            RetDecl::Opaque => ReturnKind::Value(PrimitiveKind::Obj),
        };

        variants.push(MonoVariant {
            owner: decl.owner.clone(),
            base: decl.base_name.clone(),
            flat_name: String::new(), // named by the group pass
            receiver: decl.receiver,
            is_async: decl.is_async,
            params,
            ret,
            target: decl.target.clone(),
        });

        // Odometer step, rightmost generic fastest.
        let mut pos = binding.len();
        loop {
            if pos == 0 {
                return Ok(variants);
            }
            pos -= 1;
            binding[pos] += 1;
            if binding[pos] < decl.generics[pos].kinds.len() {
                break;
            }
            binding[pos] = 0;
        }
    }
}

/// Monomorphize one overload group (declarations sharing an owner and
/// base name).
///
/// Fails with `AmbiguousOverload` if two concrete variants share a
/// parameter signature — including declarations differing only in
/// return type, which the host cannot select between.
pub fn monomorphize_group(decls: &[&FnDecl]) -> GenResult<Vec<MonoVariant>> {
    let mut variants = Vec::new();
    for decl in decls {
        variants.extend(expand_decl(decl)?);
    }

    let mut seen: FxHashMap<Vec<PrimitiveKind>, ()> = FxHashMap::default();
    for variant in &variants {
        if seen.insert(variant.params.clone(), ()).is_some() {
            return Err(GenError::AmbiguousOverload {
                owner: variant.owner.clone(),
                base: variant.base.clone(),
                signature: signature_string(&variant.params),
            });
        }
    }

    let single = variants.len() == 1;
    for variant in &mut variants {
        variant.flat_name = if single {
            variant.base.clone()
        } else {
            flat_name(&variant.base, &variant.params)
        };
    }
    Ok(variants)
}

/// Monomorphize a whole crate declaration, preserving declaration
/// order: free functions first, then each type's functions, grouped
/// by base name at first occurrence.
///
/// Also enforces that flattened names are unique per owner across
/// groups — the host sees one flat namespace per proxy unit.
pub fn monomorphize_crate(krate: &CrateDecl) -> GenResult<Vec<MonoVariant>> {
    let mut all = Vec::new();
    monomorphize_scope(&krate.functions, &mut all)?;
    for ty in &krate.types {
        monomorphize_scope(&ty.functions, &mut all)?;
    }

    let mut names: FxHashMap<(String, String), ()> = FxHashMap::default();
    for variant in &all {
        let key = (variant.owner.clone(), variant.flat_name.clone());
        if names.insert(key, ()).is_some() {
            return Err(GenError::AmbiguousOverload {
                owner: variant.owner.clone(),
                base: variant.base.clone(),
                signature: format!("flattened name '{}' already exported", variant.flat_name),
            });
        }
    }
    Ok(all)
}

fn monomorphize_scope(decls: &[FnDecl], out: &mut Vec<MonoVariant>) -> GenResult<()> {
    let mut order: Vec<String> = Vec::new();
    let mut groups: FxHashMap<String, Vec<&FnDecl>> = FxHashMap::default();
    for decl in decls {
        if !groups.contains_key(&decl.base_name) {
            order.push(decl.base_name.clone());
        }
        groups.entry(decl.base_name.clone()).or_default().push(decl);
    }
    for base in order {
        out.extend(monomorphize_group(&groups[&base])?);
    }
    Ok(())
}
