//! Struct/compound memory manager.
//!
//! Every non-primitive, non-string `Value` variant (extended-form `Status`,
//! `Array`, `Map`, `StringIO`, `SockAddr`, iterators, sockets, files) shares
//! one `CompoundData` header. Real memory safety comes from `Rc` (Rust
//! guarantees we never use-after-free); the *application-level* refcount —
//! "the count of non-parent references" — is a separate, derived quantity:
//! `Rc::strong_count(&rc) - total parent edge weight`. Keeping it derived
//! (rather than a hand-maintained counter that must track every
//! `Clone`/`Drop` in lockstep) means Rust's own Clone/Drop impls for `Rc` do
//! all the per-reference bookkeeping for us; we only ever touch the *edge
//! weights*, which is exactly the bookkeeping `adopt`/`abandon` are
//! responsible for.
//!
//! Parent back-pointers are `Weak`, not `Rc`: a two-node mutual cycle
//! (array A containing B, B containing A) is a genuine strong-Rc cycle
//! through the *forward* containment (A's items hold `Rc<B>`, B's items
//! hold `Rc<A>`) — that's the cycle the reachability walk exists to break.
//! If the parent-set also held strong references, we'd have created an
//! unbreakable second cycle purely for bookkeeping, defeating the purpose.

use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::rc::{Rc, Weak};

use crate::registry::TypeId;

/// Shared payload for every compound kind. Each kind that can reference
/// other `Value`s (Array, Map) must be able to drop those references on
/// request, which is how cycle collection breaks a dead component.
pub trait CompoundPayload {
    /// Drop all `Value` children this payload holds, releasing their
    /// strong references. No-op for payloads with no children (Status,
    /// SockAddr, StringIO).
    fn clear_children(&mut self);
}

pub struct CompoundData {
    pub type_id: TypeId,
    pub destroying: Cell<bool>,
    parents: RefCell<ParentSet>,
    pub payload: RefCell<Box<dyn CompoundPayload>>,
}

impl CompoundData {
    pub fn new(type_id: TypeId, payload: Box<dyn CompoundPayload>) -> Rc<CompoundData> {
        Rc::new(CompoundData {
            type_id,
            destroying: Cell::new(false),
            parents: RefCell::new(ParentSet::new()),
            payload: RefCell::new(payload),
        })
    }
}

/// A strong handle to a compound value's shared block.
///
/// Cloning is a plain `Rc::clone` — the shared block is untouched. There
/// is deliberately no custom `Drop` here: ordinary Rust scoped destruction
/// already gives every *acyclic* structure correct, automatic reclamation.
/// Cyclic structures need the explicit `release_child`/cycle-collection
/// path below, invoked by the container operations (`Array::delete`,
/// `Map::del`, …) that actually remove a child from a parent's storage.
#[derive(Clone)]
pub struct Compound(pub Rc<CompoundData>);

impl Compound {
    pub fn new(type_id: TypeId, payload: Box<dyn CompoundPayload>) -> Self {
        Compound(CompoundData::new(type_id, payload))
    }

    pub fn type_id(&self) -> TypeId {
        self.0.type_id
    }

    pub fn ptr_eq(a: &Compound, b: &Compound) -> bool {
        Rc::ptr_eq(&a.0, &b.0)
    }
}

// Identity equality: two compound values are the spec's "same object",
// never structural equality (two distinct arrays with equal contents are
// not `==`, matching the shared-block semantics the refcounting relies on).
impl PartialEq for Compound {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl std::fmt::Debug for Compound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Compound")
            .field("type_id", &self.0.type_id)
            .field("strong_count", &Rc::strong_count(&self.0))
            .finish()
    }
}

/// Parent-set representation: two inline slots, overflowing to a chunked
/// list of 8-slot chunks once more than two parents reference the same
/// child.
enum ParentSet {
    Inline([Option<(Weak<CompoundData>, u32)>; 2]),
    Chunked(Vec<[Option<(Weak<CompoundData>, u32)>; 8]>),
}

impl ParentSet {
    fn new() -> Self {
        ParentSet::Inline([None, None])
    }

    fn iter(&self) -> impl Iterator<Item = &(Weak<CompoundData>, u32)> {
        let slice: Box<dyn Iterator<Item = &Option<(Weak<CompoundData>, u32)>>> = match self {
            ParentSet::Inline(slots) => Box::new(slots.iter()),
            ParentSet::Chunked(chunks) => Box::new(chunks.iter().flat_map(|c| c.iter())),
        };
        slice.filter_map(|s| s.as_ref())
    }

    fn total_weight(&self) -> u32 {
        self.iter().map(|(_, w)| *w).sum()
    }

    /// Find an existing edge to `parent`, or insert a fresh one with
    /// weight 1. Returns `true` if an existing edge's weight was bumped.
    fn bump_or_insert(&mut self, parent: &Rc<CompoundData>) {
        // First pass: bump an existing edge if present.
        if self.bump_existing(parent) {
            return;
        }
        // No existing edge: insert into the first free slot, converting
        // to chunked storage if both inline slots are occupied.
        match self {
            ParentSet::Inline(slots) => {
                for slot in slots.iter_mut() {
                    if slot.is_none() {
                        *slot = Some((Rc::downgrade(parent), 1));
                        return;
                    }
                }
                // Both inline slots full: promote to chunked.
                let mut chunk: [Option<(Weak<CompoundData>, u32)>; 8] = Default::default();
                chunk[0] = slots[0].take();
                chunk[1] = slots[1].take();
                chunk[2] = Some((Rc::downgrade(parent), 1));
                *self = ParentSet::Chunked(vec![chunk]);
            }
            ParentSet::Chunked(chunks) => {
                for chunk in chunks.iter_mut() {
                    for slot in chunk.iter_mut() {
                        if slot.is_none() {
                            *slot = Some((Rc::downgrade(parent), 1));
                            return;
                        }
                    }
                }
                let mut chunk: [Option<(Weak<CompoundData>, u32)>; 8] = Default::default();
                chunk[0] = Some((Rc::downgrade(parent), 1));
                chunks.push(chunk);
            }
        }
    }

    fn bump_existing(&mut self, parent: &Rc<CompoundData>) -> bool {
        let slots: Box<dyn Iterator<Item = &mut Option<(Weak<CompoundData>, u32)>>> = match self {
            ParentSet::Inline(s) => Box::new(s.iter_mut()),
            ParentSet::Chunked(c) => Box::new(c.iter_mut().flat_map(|c| c.iter_mut())),
        };
        for slot in slots {
            if let Some((weak, weight)) = slot {
                if weak.upgrade().map(|p| Rc::ptr_eq(&p, parent)).unwrap_or(false) {
                    *weight += 1;
                    return true;
                }
            }
        }
        false
    }

    /// Decrement the edge to `parent`; remove it once the weight hits
    /// zero. Returns `true` if the edge was fully removed.
    fn decrement(&mut self, parent: &Rc<CompoundData>) -> bool {
        let removed = {
            let slots: Box<dyn Iterator<Item = &mut Option<(Weak<CompoundData>, u32)>>> = match self {
                ParentSet::Inline(s) => Box::new(s.iter_mut()),
                ParentSet::Chunked(c) => Box::new(c.iter_mut().flat_map(|c| c.iter_mut())),
            };
            let mut removed = false;
            for slot in slots {
                if let Some((weak, weight)) = slot {
                    if weak.upgrade().map(|p| Rc::ptr_eq(&p, parent)).unwrap_or(false) {
                        *weight -= 1;
                        if *weight == 0 {
                            *slot = None;
                            removed = true;
                        }
                        break;
                    }
                }
            }
            removed
        };
        self.contract_if_small();
        removed
    }

    fn len(&self) -> usize {
        self.iter().count()
    }

    /// Contract a sparsely-populated chunked list back to inline once two
    /// or fewer entries remain.
    fn contract_if_small(&mut self) {
        if let ParentSet::Chunked(_) = self {
            if self.len() <= 2 {
                let mut new_inline = [None, None];
                let mut i = 0;
                for (weak, weight) in self.iter() {
                    new_inline[i] = Some((weak.clone(), *weight));
                    i += 1;
                }
                *self = ParentSet::Inline(new_inline);
            }
        }
    }
}

/// Total strong references to `rc` not accounted for by a tracked parent
/// edge — the "external" refcount used for reachability testing.
fn derived_external(rc: &Rc<CompoundData>) -> usize {
    let weight = rc.parents.borrow().total_weight() as usize;
    Rc::strong_count(rc).saturating_sub(weight)
}

/// Register that `parent` now holds `child` as a structural member,
/// converting one unit of `child`'s external refcount into a
/// parent-tracked edge.
pub fn adopt(parent: &Compound, child: &Compound) {
    child.0.parents.borrow_mut().bump_or_insert(&parent.0);
}

/// Undo one unit of the edge registered by `adopt`. Returns `true` when
/// the parent no longer references the child at all.
pub fn abandon(parent: &Compound, child: &Compound) -> bool {
    child.0.parents.borrow_mut().decrement(&parent.0)
}

/// Release a child that a container (`parent`) is giving up ownership of:
/// abandon the parent edge, then attempt cycle collection. `child` must
/// be the exact `Value`/`Compound` instance removed from `parent`'s
/// storage.
///
/// After this call returns and `child` is dropped by the caller (its
/// natural end of scope), the block is freed immediately in the acyclic
/// case (ordinary `Rc` drop) or was already torn down here if it turned
/// out to be part of a now-unreachable cycle.
pub fn release_child(parent: &Compound, child: Compound) {
    abandon(parent, &child);
    maybe_collect(child);
}

/// Give up a reference that was never parent-tracked — a local variable,
/// a temporary, or any other binding that owns a `Value` directly rather
/// than through a container's storage. This is the hook a `Value`'s own
/// scope-exit path runs before letting the underlying `Rc` drop normally.
pub fn drop_external(value: Compound) {
    maybe_collect(value);
}

/// Attempt cycle collection starting from `start`, which the caller is
/// giving up its one remaining strong reference to.
fn maybe_collect(start: Compound) {
    // Taking ownership of the Rc out of `start` leaves exactly one strong
    // hold (this function's own `start_rc`) for whatever the caller had.
    let start_rc = start.0;
    if derived_external(&start_rc) > 1 {
        return;
    }
    if start_rc.destroying.get() {
        return;
    }

    // Reachability walk: BFS upward through parent edges. If we find any
    // node (other than our own transient holds) with nonzero derived
    // external refcount, the structure is still reachable from a live
    // root and must not be collected. The start node carries two of our
    // own holds throughout the walk (`start_rc` plus the queue/visited
    // clone below); every other node carries exactly one.
    let mut visited: Vec<Rc<CompoundData>> = Vec::new();
    let mut seen_ptrs: HashSet<*const CompoundData> = HashSet::new();
    let mut queue = vec![Rc::clone(&start_rc)];
    seen_ptrs.insert(Rc::as_ptr(&start_rc));

    while let Some(node) = queue.pop() {
        let own_holds = if Rc::ptr_eq(&node, &start_rc) { 2 } else { 1 };
        let external = derived_external(&node).saturating_sub(own_holds);
        if external > 0 {
            return; // still reachable from a live root; abort collection.
        }

        let parents = node.parents.borrow();
        for (weak, _weight) in parents.iter() {
            if let Some(p) = weak.upgrade() {
                let ptr = Rc::as_ptr(&p);
                if seen_ptrs.insert(ptr) {
                    queue.push(p);
                }
            }
        }
        drop(parents);
        visited.push(node);
    }

    // Every node reachable by walking parents is itself unreachable from a
    // live root: the whole component is dead. Break it by clearing every
    // member's forward references to its children, then let the normal
    // `Drop` cascade finish the job.
    for node in &visited {
        node.destroying.set(true);
    }
    for node in &visited {
        node.payload.borrow_mut().clear_children();
    }
}
