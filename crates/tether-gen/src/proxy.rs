//! Proxy class descriptions and the generation pass
//!
//! A [`ProxyClass`] is the generation-time description of one native
//! type as the host will see it: a factory reachable through a named
//! `new`-style entry (the emitted class keeps its constructor
//! private), constant fields baked as literals, and one flattened
//! method binding per concrete variant. Free functions get a unit of
//! their own. Descriptions carry no runtime state.
//!
//! [`generate`] runs the whole pass — monomorphize, number, stamp —
//! and either yields a complete [`Generation`] or nothing at all.

use serde::{Deserialize, Serialize};

use tether_abi::{BuildStamp, EntryKey, GenResult, PrimitiveKind, ReturnKind};

use crate::decl::{ConstDecl, CrateDecl, FnReceiver};
use crate::mono::monomorphize_crate;
use crate::table::{DispatchTable, DispatchTableBuilder};

/// What a generated call site embeds for one flattened variant: the
/// exported name, the dispatch key, and the positional signature it
/// marshals against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodBinding {
    /// Flattened exported name
    pub flat_name: String,
    /// Dispatch key `(space, index)`
    pub key: EntryKey,
    /// Parameter kinds in positional order
    pub params: Vec<PrimitiveKind>,
    /// Return shape
    pub ret: ReturnKind,
}

/// Generation-time description of one native type's proxy surface.
///
/// The explicit disposal and `clone` methods of the emitted class are
/// not indexed entries: they call the lifetime bridge directly
/// (release and duplicate are resource hooks, not dispatchable
/// signatures).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProxyClass {
    /// Native type name
    pub type_name: String,
    /// Stable numeric type id carried by handles of this type
    pub type_id: u32,
    /// Constant fields baked at generation time
    pub consts: Vec<ConstDecl>,
    /// Factory variants (constructor entries); results are wrapped
    /// into fresh handles by the bridge
    pub factories: Vec<MethodBinding>,
    /// Instance and static method bindings, sync and async
    pub methods: Vec<MethodBinding>,
}

/// One emitted proxy unit, stamped with the pass identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ProxyUnit {
    /// A native type's class surface
    Class {
        /// The described class
        class: ProxyClass,
        /// Stamp of the generation pass
        stamp: BuildStamp,
    },
    /// The free-function surface of a module
    FreeFunctions {
        /// Module path
        module: String,
        /// Module-level constants
        consts: Vec<ConstDecl>,
        /// Flattened free-function bindings
        bindings: Vec<MethodBinding>,
        /// Stamp of the generation pass
        stamp: BuildStamp,
    },
}

impl ProxyUnit {
    /// Stamp of the pass that emitted this unit.
    pub fn stamp(&self) -> &BuildStamp {
        match self {
            ProxyUnit::Class { stamp, .. } => stamp,
            ProxyUnit::FreeFunctions { stamp, .. } => stamp,
        }
    }
}

/// The complete output of one generation pass: proxy units plus the
/// dispatch table, all under one stamp.
#[derive(Debug, Clone)]
pub struct Generation {
    /// Emitted proxy units, one per type plus one for free functions
    pub units: Vec<ProxyUnit>,
    /// The stamped dispatch table
    pub table: DispatchTable,
}

impl Generation {
    /// Stamp shared by the table and every unit.
    pub fn stamp(&self) -> &BuildStamp {
        self.table.stamp()
    }
}

/// Run a full generation pass over one crate declaration.
///
/// `symbols` is the native symbol set present at build time;
/// `baseline` carries the previous pass's table when regenerating
/// against already-compiled callers.
pub fn generate(
    krate: &CrateDecl,
    symbols: impl IntoIterator<Item = String>,
    baseline: Option<DispatchTable>,
) -> GenResult<Generation> {
    let variants = monomorphize_crate(krate)?;

    let mut builder = DispatchTableBuilder::new(symbols);
    if let Some(baseline) = baseline {
        builder = builder.with_baseline(baseline);
    }

    // (owner, receiver, binding) in registration order.
    let mut bindings: Vec<(String, FnReceiver, MethodBinding)> = Vec::new();
    for variant in variants {
        let owner = variant.owner.clone();
        let receiver = variant.receiver;
        let flat_name = variant.flat_name.clone();
        let params = variant.params.clone();
        let ret = variant.ret;
        let key = builder.register(variant)?;
        bindings.push((
            owner,
            receiver,
            MethodBinding {
                flat_name,
                key,
                params,
                ret,
            },
        ));
    }
    let table = builder.build()?;
    let stamp = table.stamp().clone();

    let mut units = Vec::new();
    let free: Vec<MethodBinding> = bindings
        .iter()
        .filter(|(owner, _, _)| owner.is_empty())
        .map(|(_, _, b)| b.clone())
        .collect();
    if !free.is_empty() || !krate.consts.is_empty() {
        units.push(ProxyUnit::FreeFunctions {
            module: krate.module.clone(),
            consts: krate.consts.clone(),
            bindings: free,
            stamp: stamp.clone(),
        });
    }

    for ty in &krate.types {
        let factories = bindings
            .iter()
            .filter(|(owner, receiver, _)| owner == &ty.name && *receiver == FnReceiver::Constructor)
            .map(|(_, _, b)| b.clone())
            .collect();
        let methods = bindings
            .iter()
            .filter(|(owner, receiver, _)| owner == &ty.name && *receiver != FnReceiver::Constructor)
            .map(|(_, _, b)| b.clone())
            .collect();
        units.push(ProxyUnit::Class {
            class: ProxyClass {
                type_name: ty.name.clone(),
                type_id: ty.type_id,
                consts: ty.consts.clone(),
                factories,
                methods,
            },
            stamp: stamp.clone(),
        });
    }

    Ok(Generation { units, table })
}
