//! Type & interface registry.
//!
//! Holds the global, ordered list of type descriptors and interface
//! descriptors, and serves subtype creation. Registration is a one-time
//! setup activity (not a per-value operation), so unlike the rest of this
//! crate — which is single-threaded and uses `Rc`/`RefCell` throughout —
//! this module guards its tables with a `Mutex`. That's the one
//! deliberate exception to the no-internal-synchronization rule, and it
//! only ever contends during startup-time registration, never during value
//! operations.

use std::any::Any;
use std::sync::{Arc, Mutex, OnceLock};

/// Permanent, process-wide type identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(pub u16);

/// Permanent, process-wide interface identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InterfaceId(pub u16);

/// `Null` is the root of the single-inheritance chain and acts as the
/// sentinel for "no ancestor".
pub const NULL_TYPE: TypeId = TypeId(0);

#[derive(Clone)]
pub struct InterfaceBinding {
    pub interface: InterfaceId,
    /// Type-erased method table. Callers that statically know the
    /// interface's concrete vtable shape downcast this via
    /// `lookup_interface` + `Any::downcast_ref`.
    pub methods: Arc<dyn Any + Send + Sync>,
}

impl std::fmt::Debug for InterfaceBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterfaceBinding")
            .field("interface", &self.interface)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct TypeDescriptor {
    pub id: TypeId,
    pub ancestor: TypeId,
    pub name: String,
    /// Offset, in the ancestor's shared-block layout, at which this type's
    /// own fields begin. Built-in compound kinds in this crate are plain
    /// Rust structs (no raw byte layout), so the value itself is
    /// informational rather than load-bearing.
    pub data_offset: usize,
    pub data_size: usize,
    pub interfaces: Vec<InterfaceBinding>,
}

struct InterfaceDescriptor {
    name: &'static str,
    method_count: usize,
}

struct Registry {
    types: Vec<TypeDescriptor>,
    interfaces: Vec<InterfaceDescriptor>,
}

impl Registry {
    fn new() -> Self {
        let mut r = Registry {
            types: Vec::new(),
            interfaces: Vec::new(),
        };
        // Type 0 is always Null.
        r.types.push(TypeDescriptor {
            id: NULL_TYPE,
            ancestor: NULL_TYPE,
            name: "Null".to_string(),
            data_offset: 0,
            data_size: 0,
            interfaces: Vec::new(),
        });
        r
    }
}

fn registry() -> &'static Mutex<Registry> {
    static REGISTRY: OnceLock<Mutex<Registry>> = OnceLock::new();
    REGISTRY.get_or_init(|| Mutex::new(Registry::new()))
}

fn align_up(value: usize, alignment: usize) -> usize {
    debug_assert!(alignment.is_power_of_two());
    (value + alignment - 1) & !(alignment - 1)
}

/// Register a new interface. Ids are assigned in call order and are
/// permanent for the life of the process.
pub fn register_interface(name: &'static str, method_count: usize) -> InterfaceId {
    let mut reg = registry().lock().expect("type registry poisoned");
    let id = InterfaceId(reg.interfaces.len() as u16);
    reg.interfaces.push(InterfaceDescriptor { name, method_count });
    id
}

pub fn interface_name(id: InterfaceId) -> Option<&'static str> {
    let reg = registry().lock().expect("type registry poisoned");
    reg.interfaces.get(id.0 as usize).map(|d| d.name)
}

/// Number of methods a registered interface declares, for callers that
/// verify a type-erased method table before downcasting it.
pub fn interface_method_count(id: InterfaceId) -> Option<usize> {
    let reg = registry().lock().expect("type registry poisoned");
    reg.interfaces.get(id.0 as usize).map(|d| d.method_count)
}

/// Register a brand-new root-level type (ancestor is implicitly `Null`).
pub fn add_type(name: impl Into<String>, bindings: Vec<InterfaceBinding>) -> TypeId {
    subtype(name, NULL_TYPE, 0, 1, bindings)
}

/// Create a subtype of `ancestor`.
///
/// - `data_size`/`alignment` describe this type's own fields (beyond the
///   ancestor's); `data_offset` is computed as
///   `align(ancestor.data_offset + ancestor.data_size, alignment)`.
/// - For each interface binding: if the ancestor already implements that
///   interface, the new binding **replaces** the inherited one in the
///   subtype's own table entry (an overlay that only touches the
///   interfaces the caller actually supplies); `Arc<dyn Any>` method
///   tables are swapped wholesale per interface rather than per-slot,
///   since this crate's interfaces are native Rust traits dispatched by
///   the concrete compound kind, not by a raw function-pointer array.
///   Otherwise the interface is newly appended.
pub fn subtype(
    name: impl Into<String>,
    ancestor: TypeId,
    data_size: usize,
    alignment: usize,
    bindings: Vec<InterfaceBinding>,
) -> TypeId {
    let mut reg = registry().lock().expect("type registry poisoned");
    let ancestor_desc = reg
        .types
        .get(ancestor.0 as usize)
        .unwrap_or_else(|| fatal("subtype: unknown ancestor type id"))
        .clone();

    let data_offset = align_up(ancestor_desc.data_offset + ancestor_desc.data_size, alignment);
    let mut interfaces = ancestor_desc.interfaces.clone();

    for binding in bindings {
        if let Some(existing) = interfaces.iter_mut().find(|b| b.interface == binding.interface) {
            existing.methods = binding.methods;
        } else {
            interfaces.push(binding);
        }
    }

    let id = TypeId(reg.types.len() as u16);
    reg.types.push(TypeDescriptor {
        id,
        ancestor,
        name: name.into(),
        data_offset,
        data_size,
        interfaces,
    });
    id
}

fn fatal(msg: &str) -> ! {
    // An unknown ancestor or a missing method during composition means the
    // caller mis-registered a type; there's no safe way to continue.
    panic!("type registry: {msg}");
}

/// Look up a type's ancestor id. Panics if `id` was never registered —
/// an unregistered type id reaching this call is a programming error.
pub fn ancestor_of(id: TypeId) -> TypeId {
    let reg = registry().lock().expect("type registry poisoned");
    reg.types
        .get(id.0 as usize)
        .unwrap_or_else(|| fatal("ancestor_of: unknown type id"))
        .ancestor
}

pub fn type_name(id: TypeId) -> String {
    let reg = registry().lock().expect("type registry poisoned");
    reg.types
        .get(id.0 as usize)
        .map(|d| d.name.clone())
        .unwrap_or_else(|| "<unknown>".to_string())
}

/// Walk the ancestor chain from `id` up to `Null`. Every type is trivially
/// a subtype of itself.
pub fn is_subtype(id: TypeId, ancestor: TypeId) -> bool {
    let mut cur = id;
    loop {
        if cur == ancestor {
            return true;
        }
        if cur == NULL_TYPE {
            return cur == ancestor;
        }
        let next = ancestor_of(cur);
        if next == cur {
            return false;
        }
        cur = next;
    }
}

/// Linear search over the type's interface array — these lists stay small
/// (a handful of interfaces per type), so a linear scan beats a hash map.
pub fn lookup_interface(id: TypeId, interface: InterfaceId) -> Option<Arc<dyn Any + Send + Sync>> {
    let reg = registry().lock().expect("type registry poisoned");
    reg.types.get(id.0 as usize).and_then(|d| {
        d.interfaces
            .iter()
            .find(|b| b.interface == interface)
            .map(|b| b.methods.clone())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_is_type_zero() {
        assert_eq!(NULL_TYPE, TypeId(0));
        assert_eq!(type_name(NULL_TYPE), "Null");
    }

    #[test]
    fn subtype_chain_walks_to_null() {
        let base = add_type("TestBase", vec![]);
        let mid = subtype("TestMid", base, 8, 8, vec![]);
        let leaf = subtype("TestLeaf", mid, 4, 4, vec![]);

        assert!(is_subtype(leaf, leaf));
        assert!(is_subtype(leaf, mid));
        assert!(is_subtype(leaf, base));
        assert!(is_subtype(leaf, NULL_TYPE));
        assert!(!is_subtype(base, leaf));
    }

    #[test]
    fn data_offset_is_aligned_to_ancestor_tail() {
        let base = add_type("OffsetBase", vec![]);
        // ancestor data_offset=0, data_size=0 -> first subtype offset 0
        let a = subtype("OffsetA", base, 3, 1, vec![]);
        let reg = registry().lock().unwrap();
        let desc_a = reg.types.iter().find(|d| d.id == a).unwrap();
        assert_eq!(desc_a.data_offset, 0);
        drop(reg);

        let b = subtype("OffsetB", a, 5, 8, vec![]);
        let reg = registry().lock().unwrap();
        let desc_b = reg.types.iter().find(|d| d.id == b).unwrap();
        // ancestor tail = 0 + 3 = 3, aligned up to 8 -> 8
        assert_eq!(desc_b.data_offset, 8);
    }

    #[test]
    fn interface_registration_and_lookup() {
        let iface = register_interface("TestReader", 3);
        assert_eq!(interface_name(iface), Some("TestReader"));

        let methods: Arc<dyn Any + Send + Sync> = Arc::new(42u32);
        let ty = add_type(
            "TestReaderImpl",
            vec![InterfaceBinding {
                interface: iface,
                methods: methods.clone(),
            }],
        );

        let found = lookup_interface(ty, iface).expect("interface present");
        assert_eq!(*found.downcast_ref::<u32>().unwrap(), 42);

        let other_iface = register_interface("TestOther", 1);
        assert!(lookup_interface(ty, other_iface).is_none());
    }

    #[test]
    fn subtype_overlays_inherited_interface() {
        let iface = register_interface("TestOverlay", 1);
        let base_methods: Arc<dyn Any + Send + Sync> = Arc::new(1u32);
        let base = add_type(
            "OverlayBase",
            vec![InterfaceBinding {
                interface: iface,
                methods: base_methods,
            }],
        );

        let overridden: Arc<dyn Any + Send + Sync> = Arc::new(2u32);
        let derived = subtype(
            "OverlayDerived",
            base,
            0,
            1,
            vec![InterfaceBinding {
                interface: iface,
                methods: overridden,
            }],
        );

        let found = lookup_interface(derived, iface).unwrap();
        assert_eq!(*found.downcast_ref::<u32>().unwrap(), 2);
    }
}
