//! End-to-end tests over the whole pipeline: declarations are
//! monomorphized and numbered by the generation pass, then an
//! executor is linked against the table and drives calls through a
//! stateful in-process native library.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use tether_abi::{CallError, NativeEntryPoint, NativeRef, PrimitiveKind, WireValue};
use tether_bridge::{CallExecutor, Completer, NativeInvoker};
use tether_gen::{
    generate, ConstDecl, CrateDecl, FnDecl, FnReceiver, GenericDecl, ParamDecl, ParamType,
    RetDecl, TypeDecl,
};

static SAMPLE_BUFFER: Lazy<Vec<u8>> = Lazy::new(|| (0u8..32).collect());

// ============================================================================
// Fixture native library
// ============================================================================

#[derive(Clone)]
struct Widget {
    x: bool,
    y: bool,
    z: bool,
    d: Vec<u8>,
}

/// In-process stand-in for a wrapped native library: a store of
/// widget resources plus the process-wide `set_*` defaults.
struct WidgetLib {
    next: AtomicU64,
    widgets: Mutex<FxHashMap<u64, Widget>>,
    default_bool: Mutex<Option<bool>>,
    default_uint: Mutex<Option<u64>>,
    /// Async calls parked until the test settles them.
    parked: Mutex<Vec<(Completer, WireValue)>>,
    reclaimed: Mutex<Vec<NativeRef>>,
}

impl WidgetLib {
    fn new() -> Arc<Self> {
        Arc::new(WidgetLib {
            next: AtomicU64::new(1),
            widgets: Mutex::new(FxHashMap::default()),
            default_bool: Mutex::new(None),
            default_uint: Mutex::new(None),
            parked: Mutex::new(Vec::new()),
            reclaimed: Mutex::new(Vec::new()),
        })
    }

    fn with_widget<R>(&self, r: NativeRef, f: impl FnOnce(&mut Widget) -> R) -> Result<R, String> {
        let mut widgets = self.widgets.lock();
        let widget = widgets
            .get_mut(&r.as_raw())
            .ok_or_else(|| format!("no widget {}", r.as_raw()))?;
        Ok(f(widget))
    }

    /// Settle every parked async call.
    fn settle_parked(&self) {
        for (completer, value) in self.parked.lock().drain(..) {
            completer.fulfill(value);
        }
    }

    fn parked_count(&self) -> usize {
        self.parked.lock().len()
    }
}

impl NativeInvoker for WidgetLib {
    fn invoke(
        &self,
        entry: &NativeEntryPoint,
        receiver: Option<NativeRef>,
        args: &[WireValue],
    ) -> Result<WireValue, String> {
        match entry.target.as_str() {
            "widget_lib::Widget::new" => {
                let id = self.next.fetch_add(1, Ordering::SeqCst);
                let widget = Widget {
                    x: args[0].as_bool().ok_or("bad arg")?,
                    y: args[1].as_bool().ok_or("bad arg")?,
                    z: args[2].as_bool().ok_or("bad arg")?,
                    d: args[3].as_bin().ok_or("bad arg")?.to_vec(),
                };
                self.widgets.lock().insert(id, widget);
                Ok(WireValue::Handle(NativeRef::from_raw(id)))
            }
            "widget_lib::Widget::get_x" => {
                self.with_widget(receiver.ok_or("no receiver")?, |w| WireValue::Bool(w.x))
            }
            "widget_lib::Widget::get_y" => {
                self.with_widget(receiver.ok_or("no receiver")?, |w| WireValue::Bool(w.y))
            }
            "widget_lib::Widget::get_z" => {
                self.with_widget(receiver.ok_or("no receiver")?, |w| WireValue::Bool(w.z))
            }
            "widget_lib::Widget::get_d" => self
                .with_widget(receiver.ok_or("no receiver")?, |w| {
                    WireValue::Bin(w.d.clone())
                }),
            "widget_lib::Widget::set_x" => {
                let flag = args[0].as_bool().ok_or("bad arg")?;
                self.with_widget(receiver.ok_or("no receiver")?, |w| w.x = flag)?;
                Ok(WireValue::Undefined)
            }
            "widget_lib::Widget::set_default" => {
                // Returns the previous process-wide default, or the
                // unset sentinel on the first call.
                let previous = match &args[0] {
                    WireValue::Bool(b) => self
                        .default_bool
                        .lock()
                        .replace(*b)
                        .map(WireValue::Bool),
                    WireValue::Uint(u) => self
                        .default_uint
                        .lock()
                        .replace(*u)
                        .map(WireValue::Uint),
                    other => return Err(format!("bad default kind {}", other.type_name())),
                };
                Ok(previous.unwrap_or(WireValue::Undefined))
            }
            "widget_lib::ping" => Ok(WireValue::Uint(args[0].as_uint().ok_or("bad arg")? + 1)),
            other => Err(format!("unknown symbol {other}")),
        }
    }

    fn invoke_async(
        &self,
        entry: &NativeEntryPoint,
        receiver: Option<NativeRef>,
        args: Vec<WireValue>,
        completer: Completer,
    ) {
        match entry.target.as_str() {
            // Parked until the test settles it.
            "widget_lib::Widget::load" => {
                let result = receiver
                    .ok_or_else(|| "no receiver".to_string())
                    .and_then(|r| self.with_widget(r, |w| WireValue::Bin(w.d.clone())));
                match result {
                    Ok(value) => self.parked.lock().push((completer, value)),
                    Err(e) => completer.reject(e),
                }
            }
            // Settles from a worker thread.
            "widget_lib::compute" => {
                let input = args[0].as_uint().unwrap_or(0);
                std::thread::spawn(move || {
                    completer.fulfill(WireValue::Uint(input * 2));
                });
            }
            other => completer.reject(format!("unknown symbol {other}")),
        }
    }

    fn duplicate(&self, resource: NativeRef) -> Result<NativeRef, String> {
        let copy = self
            .widgets
            .lock()
            .get(&resource.as_raw())
            .cloned()
            .ok_or_else(|| format!("no widget {}", resource.as_raw()))?;
        let id = self.next.fetch_add(1, Ordering::SeqCst);
        self.widgets.lock().insert(id, copy);
        Ok(NativeRef::from_raw(id))
    }

    fn reclaim(&self, resource: NativeRef) {
        self.widgets.lock().remove(&resource.as_raw());
        self.reclaimed.lock().push(resource);
    }
}

// ============================================================================
// Declarations
// ============================================================================

fn widget_fn(base: &str, receiver: FnReceiver, is_async: bool, params: Vec<ParamDecl>, ret: RetDecl) -> FnDecl {
    FnDecl {
        base_name: base.to_string(),
        owner: "Widget".to_string(),
        receiver,
        is_async,
        params,
        ret,
        generics: vec![],
        is_variadic: false,
        target: format!("widget_lib::Widget::{base}"),
    }
}

fn widget_crate() -> CrateDecl {
    let mut krate = CrateDecl::new("widget_lib");
    krate.functions.push(FnDecl {
        base_name: "ping".to_string(),
        owner: String::new(),
        receiver: FnReceiver::Static,
        is_async: false,
        params: vec![ParamDecl::required(
            "n",
            ParamType::Concrete(PrimitiveKind::Uint),
        )],
        ret: RetDecl::Concrete(PrimitiveKind::Uint),
        generics: vec![],
        is_variadic: false,
        target: "widget_lib::ping".to_string(),
    });
    krate.functions.push(FnDecl {
        base_name: "compute".to_string(),
        owner: String::new(),
        receiver: FnReceiver::Static,
        is_async: true,
        params: vec![ParamDecl::required(
            "n",
            ParamType::Concrete(PrimitiveKind::Uint),
        )],
        ret: RetDecl::Concrete(PrimitiveKind::Uint),
        generics: vec![],
        is_variadic: false,
        target: "widget_lib::compute".to_string(),
    });

    let bool_param = |name: &str| ParamDecl::required(name, ParamType::Concrete(PrimitiveKind::Bool));
    krate.types.push(TypeDecl {
        name: "Widget".to_string(),
        type_id: 7,
        consts: vec![ConstDecl {
            name: "MAX_BUFFER".to_string(),
            value: WireValue::Uint(4096),
        }],
        functions: vec![
            widget_fn(
                "new",
                FnReceiver::Constructor,
                false,
                vec![
                    bool_param("x"),
                    bool_param("y"),
                    bool_param("z"),
                    ParamDecl::required("d", ParamType::Concrete(PrimitiveKind::Bin)),
                ],
                RetDecl::Opaque,
            ),
            widget_fn("get_x", FnReceiver::Instance, false, vec![], RetDecl::Concrete(PrimitiveKind::Bool)),
            widget_fn("get_y", FnReceiver::Instance, false, vec![], RetDecl::Concrete(PrimitiveKind::Bool)),
            widget_fn("get_z", FnReceiver::Instance, false, vec![], RetDecl::Concrete(PrimitiveKind::Bool)),
            widget_fn("get_d", FnReceiver::Instance, false, vec![], RetDecl::Concrete(PrimitiveKind::Bin)),
            widget_fn(
                "set_x",
                FnReceiver::Instance,
                false,
                vec![bool_param("flag")],
                RetDecl::Void,
            ),
            widget_fn(
                "load",
                FnReceiver::Instance,
                true,
                vec![],
                RetDecl::Concrete(PrimitiveKind::Bin),
            ),
            FnDecl {
                base_name: "set_default".to_string(),
                owner: "Widget".to_string(),
                receiver: FnReceiver::Static,
                is_async: false,
                params: vec![ParamDecl::required("value", ParamType::Generic("T".to_string()))],
                ret: RetDecl::Generic("T".to_string()),
                generics: vec![GenericDecl {
                    name: "T".to_string(),
                    kinds: vec![PrimitiveKind::Bool, PrimitiveKind::Uint],
                }],
                is_variadic: false,
                target: "widget_lib::Widget::set_default".to_string(),
            },
        ],
    });
    krate
}

fn widget_symbols() -> Vec<String> {
    vec![
        "widget_lib::ping".to_string(),
        "widget_lib::compute".to_string(),
        "widget_lib::Widget::new".to_string(),
        "widget_lib::Widget::get_x".to_string(),
        "widget_lib::Widget::get_y".to_string(),
        "widget_lib::Widget::get_z".to_string(),
        "widget_lib::Widget::get_d".to_string(),
        "widget_lib::Widget::set_x".to_string(),
        "widget_lib::Widget::load".to_string(),
        "widget_lib::Widget::set_default".to_string(),
    ]
}

struct Harness {
    lib: Arc<WidgetLib>,
    exec: CallExecutor,
    indices: FxHashMap<String, (tether_abi::CallSpace, u32)>,
}

impl Harness {
    fn new() -> Self {
        let lib = WidgetLib::new();
        let generation = generate(&widget_crate(), widget_symbols(), None).unwrap();
        let table = Arc::new(generation.table.clone());
        let mut indices = FxHashMap::default();
        for entry in table.entries() {
            indices.insert(entry.qualified_name(), (entry.space, entry.index));
        }
        let exec = CallExecutor::link(table, generation.stamp(), lib.clone()).unwrap();
        Harness { lib, exec, indices }
    }

    fn index(&self, qualified: &str) -> u32 {
        self.indices[qualified].1
    }
}

// ============================================================================
// Tests
// ============================================================================

#[test]
fn test_widget_full_lifecycle() {
    let h = Harness::new();
    let handle = h
        .exec
        .construct(
            h.index("Widget::new"),
            &[
                WireValue::Bool(true),
                WireValue::Bool(true),
                WireValue::Bool(true),
                WireValue::Bin(SAMPLE_BUFFER.clone()),
            ],
            7,
            "Widget",
        )
        .unwrap();

    for getter in ["Widget::get_x", "Widget::get_y", "Widget::get_z"] {
        let value = h.exec.call(&handle, h.index(getter), &[]).unwrap();
        assert_eq!(value, WireValue::Bool(true), "{getter}");
    }
    let d = h.exec.call(&handle, h.index("Widget::get_d"), &[]).unwrap();
    assert_eq!(d.as_bin(), Some(SAMPLE_BUFFER.as_slice()));

    h.exec
        .call(&handle, h.index("Widget::set_x"), &[WireValue::Bool(false)])
        .unwrap();
    let x = h.exec.call(&handle, h.index("Widget::get_x"), &[]).unwrap();
    assert_eq!(x, WireValue::Bool(false));

    handle.release().unwrap();
    assert!(h.lib.widgets.lock().is_empty());
    let err = h
        .exec
        .call(&handle, h.index("Widget::get_x"), &[])
        .unwrap_err();
    assert!(matches!(err, CallError::UseAfterRelease { .. }));
    let err = handle.release().unwrap_err();
    assert!(matches!(err, CallError::AlreadyReleased { .. }));
}

#[test]
fn test_same_index_in_different_spaces_is_distinct() {
    let h = Harness::new();
    // ping and get_x both sit at index 0 of their respective spaces.
    let (ping_space, ping_index) = h.indices["ping"];
    let (get_x_space, get_x_index) = h.indices["Widget::get_x"];
    assert_eq!(ping_index, 0);
    assert_eq!(get_x_index, 0);
    assert_ne!(ping_space, get_x_space);

    let pong = h.exec.static_call(ping_index, &[WireValue::Uint(41)]).unwrap();
    assert_eq!(pong, WireValue::Uint(42));
}

#[test]
fn test_set_default_returns_previous_value() {
    let h = Harness::new();
    let set_bool = h.index("Widget::set_default_bool");
    let set_uint = h.index("Widget::set_default_uint");

    // Unset sentinel on first call, previous value afterwards. The
    // two flattened variants keep independent defaults.
    let first = h.exec.static_call(set_bool, &[WireValue::Bool(true)]).unwrap();
    assert!(first.is_undefined());
    let second = h.exec.static_call(set_bool, &[WireValue::Bool(false)]).unwrap();
    assert_eq!(second, WireValue::Bool(true));

    let first = h.exec.static_call(set_uint, &[WireValue::Uint(9)]).unwrap();
    assert!(first.is_undefined());
    let second = h.exec.static_call(set_uint, &[WireValue::Uint(10)]).unwrap();
    assert_eq!(second, WireValue::Uint(9));
}

#[test]
fn test_argument_mismatch_never_reaches_native() {
    let h = Harness::new();
    let err = h
        .exec
        .static_call(h.index("ping"), &[WireValue::Str("nope".into())])
        .unwrap_err();
    assert!(matches!(
        err,
        CallError::ArgumentTypeMismatch { position: 0, .. }
    ));
    assert!(err.is_host_local());
}

#[test]
fn test_concurrent_async_calls_settle_independently() {
    let h = Harness::new();
    let compute = h.index("compute");
    let a = h.exec.async_static_call(compute, &[WireValue::Uint(3)]).unwrap();
    let b = h.exec.async_static_call(compute, &[WireValue::Uint(5)]).unwrap();

    let rb = h.exec.queue().run_until_settled(&b);
    let ra = h.exec.queue().run_until_settled(&a);
    assert_eq!(ra, Ok(WireValue::Uint(6)));
    assert_eq!(rb, Ok(WireValue::Uint(10)));

    // Settled results are stable.
    assert_eq!(a.try_result(), Some(Ok(WireValue::Uint(6))));
    assert_eq!(b.try_result(), Some(Ok(WireValue::Uint(10))));
}

#[test]
fn test_two_async_calls_on_one_handle_settle_once_each() {
    let h = Harness::new();
    let handle = h
        .exec
        .construct(
            h.index("Widget::new"),
            &[
                WireValue::Bool(true),
                WireValue::Bool(false),
                WireValue::Bool(true),
                WireValue::Bin(vec![9, 9, 9]),
            ],
            7,
            "Widget",
        )
        .unwrap();

    let load = h.index("Widget::load");
    let a = h.exec.async_call(&handle, load, &[]).unwrap();
    let b = h.exec.async_call(&handle, load, &[]).unwrap();
    assert_eq!(h.lib.parked_count(), 2);

    h.lib.settle_parked();
    let ra = h.exec.queue().run_until_settled(&a);
    let rb = h.exec.queue().run_until_settled(&b);
    assert_eq!(ra.unwrap().as_bin(), Some([9, 9, 9].as_slice()));
    assert_eq!(rb.unwrap().as_bin(), Some([9, 9, 9].as_slice()));

    // Both settlements already applied; nothing left to drain and the
    // results stay put.
    assert_eq!(h.exec.queue().drain(), 0);
    assert!(a.is_settled() && b.is_settled());

    handle.release().unwrap();
    assert_eq!(h.lib.reclaimed.lock().len(), 1);
}

#[test]
fn test_release_during_inflight_async_defers_reclamation() {
    let h = Harness::new();
    let handle = h
        .exec
        .construct(
            h.index("Widget::new"),
            &[
                WireValue::Bool(false),
                WireValue::Bool(false),
                WireValue::Bool(false),
                WireValue::Bin(SAMPLE_BUFFER.clone()),
            ],
            7,
            "Widget",
        )
        .unwrap();

    let awaitable = h.exec.async_call(&handle, h.index("Widget::load"), &[]).unwrap();
    assert_eq!(h.lib.parked_count(), 1);

    // Release while the call is parked: new calls fail immediately,
    // but the resource survives until the call settles.
    handle.release().unwrap();
    assert!(matches!(
        h.exec.call(&handle, h.index("Widget::get_x"), &[]),
        Err(CallError::UseAfterRelease { .. })
    ));
    assert!(h.lib.reclaimed.lock().is_empty());

    h.lib.settle_parked();
    let result = h.exec.queue().run_until_settled(&awaitable);
    assert_eq!(result.unwrap().as_bin(), Some(SAMPLE_BUFFER.as_slice()));
    assert_eq!(h.lib.reclaimed.lock().len(), 1);
}

#[test]
fn test_duplicate_creates_independent_resource() {
    let h = Harness::new();
    let handle = h
        .exec
        .construct(
            h.index("Widget::new"),
            &[
                WireValue::Bool(true),
                WireValue::Bool(false),
                WireValue::Bool(false),
                WireValue::Bin(vec![1, 2, 3]),
            ],
            7,
            "Widget",
        )
        .unwrap();
    let copy = handle.duplicate().unwrap();

    // Mutating the copy leaves the original untouched.
    h.exec
        .call(&copy, h.index("Widget::set_x"), &[WireValue::Bool(false)])
        .unwrap();
    let original_x = h.exec.call(&handle, h.index("Widget::get_x"), &[]).unwrap();
    assert_eq!(original_x, WireValue::Bool(true));

    copy.release().unwrap();
    let still = h.exec.call(&handle, h.index("Widget::get_x"), &[]).unwrap();
    assert_eq!(still, WireValue::Bool(true));
    handle.release().unwrap();
    assert_eq!(h.lib.reclaimed.lock().len(), 2);
}

#[test]
fn test_collector_backstop_reclaims_leaked_handle() {
    let h = Harness::new();
    let handle = h
        .exec
        .construct(
            h.index("Widget::new"),
            &[
                WireValue::Bool(true),
                WireValue::Bool(true),
                WireValue::Bool(true),
                WireValue::Bin(vec![]),
            ],
            7,
            "Widget",
        )
        .unwrap();
    let token = handle.native_ref().unwrap();
    drop(handle); // leaked without release

    assert!(h.exec.registry().finalize(token, h.lib.as_ref()));
    assert!(h.lib.widgets.lock().is_empty());
    // A second notification for the same token is a no-op.
    assert!(!h.exec.registry().finalize(token, h.lib.as_ref()));
    assert_eq!(h.lib.reclaimed.lock().len(), 1);
}

#[test]
fn test_regenerated_table_rejects_stale_proxy() {
    let lib = WidgetLib::new();
    let first = generate(&widget_crate(), widget_symbols(), None).unwrap();

    // Regenerate with an extra declaration: new stamp. Appended in
    // the static-async space so every retained entry keeps its index.
    let mut krate = widget_crate();
    krate.functions.push(FnDecl {
        base_name: "pong".to_string(),
        owner: String::new(),
        receiver: FnReceiver::Static,
        is_async: true,
        params: vec![],
        ret: RetDecl::Void,
        generics: vec![],
        is_variadic: false,
        target: "widget_lib::ping".to_string(),
    });
    let second = generate(&krate, widget_symbols(), Some(first.table.clone())).unwrap();

    let err = CallExecutor::link(
        Arc::new(second.table.clone()),
        first.stamp(),
        lib.clone(),
    )
    .unwrap_err();
    assert!(matches!(err, CallError::StaleBinding { .. }));

    // Retained entries kept their indices across the regeneration.
    for entry in first.table.entries() {
        let kept = second.table.lookup(entry.key()).unwrap();
        assert_eq!(kept.flat_name, entry.flat_name);
    }
}
