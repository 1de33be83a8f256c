//! The data graph: per-path persistent storage for the traversal.
//!
//! Every logical node the controller visits gets a slot in this graph, keyed
//! purely by the control-flow path that reached it. Blocks store an ordered
//! list of typed node cells plus an ordered list of named-block references;
//! named blocks add identity-keyed reassociation (and therefore reordering)
//! on top of the positional scheme.

use std::any::Any;
use std::cell::{Cell, Ref, RefCell, RefMut};
use std::collections::BTreeMap;
use std::mem;
use std::rc::{Rc, Weak};

use crate::Flow;
use crate::id::{CapturedId, ValueId};

// --- Node cells ---

/// A typed cell stored in a data block slot.
pub(crate) trait DataNode: Any {
    /// Release any recomputable caches held by this node.
    fn clear_cache(&self) {}
}

/// Persistent state. Survives cache clearing.
pub struct ValueNode<T> {
    value: RefCell<T>,
}

impl<T> ValueNode<T> {
    fn new(value: T) -> Self {
        Self {
            value: RefCell::new(value),
        }
    }

    #[inline]
    pub fn borrow(&self) -> Ref<'_, T> {
        self.value.borrow()
    }

    #[inline]
    pub fn borrow_mut(&self) -> RefMut<'_, T> {
        self.value.borrow_mut()
    }
}

impl<T: 'static> DataNode for ValueNode<T> {}

/// A recomputable cache. Released when the containing block's caches clear.
pub struct CacheNode<T> {
    value: RefCell<Option<T>>,
}

impl<T> CacheNode<T> {
    #[inline]
    pub fn borrow(&self) -> Ref<'_, Option<T>> {
        self.value.borrow()
    }

    #[inline]
    pub fn borrow_mut(&self) -> RefMut<'_, Option<T>> {
        self.value.borrow_mut()
    }
}

impl<T: 'static> DataNode for CacheNode<T> {
    fn clear_cache(&self) {
        *self.value.borrow_mut() = None;
    }
}

/// A cache cell with a captured identity key: the value is only valid while
/// the key matches. Used to memoize expensive conversions.
pub struct KeyedNode<T> {
    key: RefCell<CapturedId>,
    value: RefCell<Option<T>>,
}

impl<T> KeyedNode<T> {
    /// The cached value, if it was stored under `key`.
    pub fn lookup(&self, key: &ValueId) -> Option<T>
    where
        T: Clone,
    {
        self.get_ref(key).map(|value| value.clone())
    }

    /// Borrowed flavor of [`Self::lookup`].
    pub fn get_ref(&self, key: &ValueId) -> Option<Ref<'_, T>> {
        if key.is_null() || !self.key.borrow().matches(key) {
            return None;
        }
        Ref::filter_map(self.value.borrow(), Option::as_ref).ok()
    }

    pub fn store(&self, key: &ValueId, value: T) {
        self.key.borrow_mut().capture(key);
        *self.value.borrow_mut() = Some(value);
    }
}

impl<T: 'static> DataNode for KeyedNode<T> {
    fn clear_cache(&self) {
        self.key.borrow_mut().clear();
        *self.value.borrow_mut() = None;
    }
}

/// A nested data block (used by the if/switch/loop wrappers).
struct BlockNode {
    block: Rc<RefCell<DataBlock>>,
}

impl DataNode for BlockNode {
    fn clear_cache(&self) {
        self.block.borrow_mut().clear_caches();
    }
}

/// A naming map stored in the graph. The map itself is persistent state;
/// the named blocks inside it clear their caches through deactivation.
struct MapNode {
    map: Rc<RefCell<NamingMap>>,
}

impl DataNode for MapNode {}

// --- Blocks ---

/// An ordered store of data nodes plus named-block references.
///
/// The slot sequence is fixed per traversal path: the Nth `get_*` call under
/// this block always lands in the Nth slot, and reusing a slot at a different
/// type is a hard failure.
#[derive(Default)]
pub struct DataBlock {
    slots: Vec<Rc<dyn DataNode>>,
    named_refs: Vec<NamedBlockRef>,
    /// Set once this block's caches have been released; reset on re-entry.
    cache_cleared: bool,
}

impl DataBlock {
    /// Release all recomputable caches in this block, recursively, and
    /// deactivate every named-block reference it holds. Idempotent.
    fn clear_caches(&mut self) {
        if self.cache_cleared {
            return;
        }
        self.cache_cleared = true;
        for slot in &self.slots {
            slot.clear_cache();
        }
        for named in &self.named_refs {
            named.deactivate();
        }
    }
}

// --- Named blocks ---

/// A data block addressed by identity within a naming map.
struct NamedBlock {
    block: Rc<RefCell<DataBlock>>,
    /// How many block slots reference this named block.
    ref_count: Cell<usize>,
    /// How many of those references are currently active.
    active_count: Cell<usize>,
    /// Manually owned: outlives its references, caches still clear.
    manual_delete: Cell<bool>,
    /// The owning map, for unlinking on destruction.
    map: Weak<RefCell<NamingMap>>,
    key: CapturedId,
}

/// One block slot's claim on a named block.
struct NamedBlockRef {
    node: Rc<NamedBlock>,
    active: Cell<bool>,
}

impl NamedBlockRef {
    fn new(node: Rc<NamedBlock>) -> Self {
        node.ref_count.set(node.ref_count.get() + 1);
        Self {
            node,
            active: Cell::new(false),
        }
    }

    fn matches(&self, id: &ValueId, map: &Rc<RefCell<NamingMap>>) -> bool {
        self.node.key.matches(id) && self.node.map.as_ptr() == Rc::as_ptr(map)
    }

    fn activate(&self) {
        if !self.active.replace(true) {
            let node = &self.node;
            node.active_count.set(node.active_count.get() + 1);
        }
    }

    fn deactivate(&self) {
        if self.active.replace(false) {
            let node = &self.node;
            let remaining = node.active_count.get() - 1;
            node.active_count.set(remaining);
            if remaining == 0 {
                node.block.borrow_mut().clear_caches();
            }
        }
    }
}

impl Clone for NamedBlockRef {
    fn clone(&self) -> Self {
        Self::new(self.node.clone())
    }
}

impl Drop for NamedBlockRef {
    // Deterministic order: deactivate (clearing caches when the active count
    // reaches zero), then unlink from the map, then release storage.
    fn drop(&mut self) {
        self.deactivate();
        let node = &self.node;
        let remaining = node.ref_count.get() - 1;
        node.ref_count.set(remaining);
        if remaining > 0 {
            return;
        }
        if node.manual_delete.get() {
            node.block.borrow_mut().clear_caches();
        } else if let Some(map) = node.map.upgrade() {
            log::trace!("reclaiming named block {:?}", node.key);
            let removed = map.borrow_mut().entries.remove(&node.key);
            // The map's Rc is dropped outside the borrow: tearing the block
            // down can recursively unlink nested named blocks from the same
            // map.
            drop(removed);
        }
    }
}

/// Identity-to-named-block mapping, itself stored as a data node.
#[derive(Default)]
pub(crate) struct NamingMap {
    entries: BTreeMap<CapturedId, Rc<NamedBlock>>,
}

impl NamingMap {
    /// Remove the map's claim on `id`. Existing references keep the block
    /// alive; its caches are cleared now.
    fn delete(&mut self, id: &ValueId) {
        let key = CapturedId::from(id);
        if let Some(node) = self.entries.remove(&key) {
            node.block.borrow_mut().clear_caches();
        }
    }
}

// --- The graph ---

struct GraphCore {
    root: Rc<RefCell<DataBlock>>,
    /// Named-block references stranded by an aborted traversal, kept alive
    /// until the next complete refresh can re-reference them.
    holding: RefCell<Vec<NamedBlockRef>>,
}

/// The whole per-system data graph.
pub struct DataGraph {
    core: Rc<GraphCore>,
}

impl Default for DataGraph {
    fn default() -> Self {
        Self {
            core: Rc::new(GraphCore {
                root: Rc::new(RefCell::new(DataBlock::default())),
                holding: RefCell::new(Vec::new()),
            }),
        }
    }
}

impl DataGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop the references parked by aborted traversals. Called after a
    /// complete refresh, which has re-referenced everything still alive.
    pub(crate) fn reclaim_holding(&self) {
        let stranded = mem::take(&mut *self.core.holding.borrow_mut());
        if !stranded.is_empty() {
            log::trace!("reclaiming {} stranded named-block reference(s)", stranded.len());
        }
        drop(stranded);
    }
}

// --- The cursor ---

/// The active traversal of a data graph.
///
/// Tracks the current block, the position of the next slot to visit, the
/// current naming map, and the named-block references used so far in the
/// current block scope.
pub struct DataTraversal {
    core: Rc<GraphCore>,
    block: Rc<RefCell<DataBlock>>,
    next_slot: usize,
    map: Option<Rc<RefCell<NamingMap>>>,
    /// Index into the current block's reference list of the next expected
    /// named block.
    predicted: usize,
    /// References consumed or created in the current block scope.
    used: Vec<NamedBlockRef>,
    gc_enabled: bool,
    cache_clearing_enabled: bool,
}

impl DataTraversal {
    pub(crate) fn begin(graph: &DataGraph, gc_enabled: bool, cache_clearing_enabled: bool) -> Self {
        let root = graph.core.root.clone();
        root.borrow_mut().cache_cleared = false;
        Self {
            core: graph.core.clone(),
            block: root,
            next_slot: 0,
            map: None,
            predicted: 0,
            used: Vec::new(),
            gc_enabled,
            cache_clearing_enabled,
        }
    }

    /// Close the root block scope. `completed` is false when the traversal
    /// was aborted.
    pub(crate) fn finish(mut self, completed: bool) {
        self.end_block_scope(!completed);
    }

    /// Whether garbage collection of named blocks is enabled for this pass.
    #[inline]
    pub fn gc_enabled(&self) -> bool {
        self.gc_enabled
    }

    /// Whether cache clearing (of untaken branches) is enabled for this pass.
    #[inline]
    pub fn cache_clearing_enabled(&self) -> bool {
        self.cache_clearing_enabled
    }

    fn get_slot<N: DataNode>(&mut self, init: impl FnOnce() -> N) -> (Rc<N>, bool) {
        let mut block = self.block.borrow_mut();
        debug_assert!(self.next_slot <= block.slots.len());
        if self.next_slot < block.slots.len() {
            let slot = block.slots[self.next_slot].clone();
            drop(block);
            let any: Rc<dyn Any> = slot;
            let Ok(node) = any.downcast::<N>() else {
                panic!(
                    "data slot type mismatch at position {}: expected {}; \
                     the controller's control-flow structure changed between traversals",
                    self.next_slot,
                    std::any::type_name::<N>(),
                );
            };
            self.next_slot += 1;
            (node, false)
        } else {
            let node = Rc::new(init());
            block.slots.push(node.clone() as Rc<dyn DataNode>);
            self.next_slot += 1;
            (node, true)
        }
    }

    /// Fetch the next data node as persistent state of type `T`.
    ///
    /// Returns the node and a *fresh* flag: true the first time this slot is
    /// visited (`init` just ran).
    ///
    /// Every call site that reaches this in the same block, in the same
    /// order, gets the same slot on every traversal; a type change is a hard
    /// failure.
    pub fn get_data<T: 'static>(&mut self, init: impl FnOnce() -> T) -> (Rc<ValueNode<T>>, bool) {
        self.get_slot(|| ValueNode::new(init()))
    }

    /// Fetch the next data node as a recomputable cache of type `T`.
    pub fn get_cached<T: 'static>(&mut self) -> Rc<CacheNode<T>> {
        self.get_slot(|| CacheNode {
            value: RefCell::new(None),
        })
        .0
    }

    /// Fetch the next data node as an identity-keyed cache of type `T`.
    pub fn get_keyed<T: 'static>(&mut self) -> Rc<KeyedNode<T>> {
        self.get_slot(|| KeyedNode {
            key: RefCell::new(CapturedId::default()),
            value: RefCell::new(None),
        })
        .0
    }

    /// Fetch the next data node as a nested data block.
    pub(crate) fn get_block(&mut self) -> Rc<RefCell<DataBlock>> {
        self.get_slot(|| BlockNode {
            block: Rc::new(RefCell::new(DataBlock::default())),
        })
        .0
        .block
        .clone()
    }

    fn get_naming_map(&mut self) -> Rc<RefCell<NamingMap>> {
        self.get_slot(|| MapNode {
            map: Rc::new(RefCell::new(NamingMap::default())),
        })
        .0
        .map
        .clone()
    }

    /// Clear the caches of a block without traversing it (used for untaken
    /// branches). No-op unless cache clearing is enabled for this pass.
    pub(crate) fn clear_block(&self, block: &Rc<RefCell<DataBlock>>) {
        if self.cache_clearing_enabled {
            block.borrow_mut().clear_caches();
        }
    }

    /// Resolve the named block for `id` in the current naming map, creating
    /// it if GC is enabled, and record the use in the current block scope.
    pub(crate) fn acquire_named_block(&mut self, id: &ValueId) -> Rc<RefCell<DataBlock>> {
        let map_rc = self
            .map
            .clone()
            .unwrap_or_else(|| panic!("named block {id:?} used outside a naming context"));

        // Hot path: the next predicted reference under this block is the one
        // we're being asked for.
        let hot = {
            let block = self.block.borrow();
            block
                .named_refs
                .get(self.predicted)
                .filter(|existing| existing.matches(id, &map_rc))
                .cloned()
        };

        let taken = if let Some(taken) = hot {
            self.predicted += 1;
            taken
        } else if !self.gc_enabled {
            panic!("named block {id:?} encountered out of order while GC is disabled");
        } else {
            let mut map = map_rc.borrow_mut();
            let key = CapturedId::from(id);
            let node = map
                .entries
                .entry(key.clone())
                .or_insert_with(|| {
                    log::trace!("creating named block {key:?}");
                    Rc::new(NamedBlock {
                        block: Rc::new(RefCell::new(DataBlock::default())),
                        ref_count: Cell::new(0),
                        active_count: Cell::new(0),
                        manual_delete: Cell::new(false),
                        map: Rc::downgrade(&map_rc),
                        key,
                    })
                })
                .clone();
            drop(map);
            NamedBlockRef::new(node)
        };

        taken.activate();
        let block = taken.node.block.clone();
        self.used.push(taken);
        block
    }

    /// Mark the named block for `id` (in the current map) as manually owned:
    /// it survives losing all references until [`delete_named_block`] runs.
    pub(crate) fn set_manual_delete(&self, id: &ValueId, manual: bool) {
        if let Some(map) = &self.map
            && let Some(node) = map.borrow().entries.get(&CapturedId::from(id))
        {
            node.manual_delete.set(manual);
        }
    }

    pub(crate) fn delete_named_block(&self, id: &ValueId) {
        if let Some(map) = &self.map {
            map.borrow_mut().delete(id);
        }
    }

    /// Close the current block scope: with GC on and a normal exit, the
    /// block's reference list becomes the used list and residual references
    /// are reclaimed; on an abort the used list is parked on the graph's
    /// holding list instead.
    fn end_block_scope(&mut self, aborted: bool) {
        let used = mem::take(&mut self.used);
        if aborted {
            self.core.holding.borrow_mut().extend(used);
        } else if self.gc_enabled {
            let residue = mem::replace(&mut self.block.borrow_mut().named_refs, used);
            drop(residue);
        }
        // With GC off, `used` only holds duplicates of predicted references;
        // dropping them rebalances the counts.
    }
}

/// Saved cursor state for one open block scope.
pub struct BlockScope {
    block: Rc<RefCell<DataBlock>>,
    next_slot: usize,
    predicted: usize,
    used: Vec<NamedBlockRef>,
}

/// Saved cursor state for one open naming scope.
pub struct NamingScope {
    map: Option<Rc<RefCell<NamingMap>>>,
}

impl DataTraversal {
    /// Point the cursor into `block`, returning the state to restore with
    /// [`Self::close_block`].
    pub(crate) fn open_block(&mut self, block: Rc<RefCell<DataBlock>>) -> BlockScope {
        block.borrow_mut().cache_cleared = false;
        BlockScope {
            block: mem::replace(&mut self.block, block),
            next_slot: mem::replace(&mut self.next_slot, 0),
            predicted: mem::replace(&mut self.predicted, 0),
            used: mem::take(&mut self.used),
        }
    }

    pub(crate) fn close_block(&mut self, scope: BlockScope, aborted: bool) {
        self.end_block_scope(aborted);
        self.block = scope.block;
        self.next_slot = scope.next_slot;
        self.predicted = scope.predicted;
        self.used = scope.used;
    }

    /// Make the naming map stored at the cursor's current slot the active
    /// one, returning the state to restore with [`Self::close_naming`].
    pub(crate) fn open_naming(&mut self) -> NamingScope {
        let map = self.get_naming_map();
        NamingScope {
            map: mem::replace(&mut self.map, Some(map)),
        }
    }

    pub(crate) fn close_naming(&mut self, scope: NamingScope) {
        self.map = scope.map;
    }
}

/// Run `f` with the cursor positioned inside `block`, restoring the cursor's
/// block-local state afterwards.
pub fn scoped_data_block<R>(
    trav: &mut DataTraversal,
    block: Rc<RefCell<DataBlock>>,
    f: impl FnOnce(&mut DataTraversal) -> Flow<R>,
) -> Flow<R> {
    let scope = trav.open_block(block);
    let result = f(trav);
    trav.close_block(scope, result.is_err());
    result
}

/// Run `f` under the naming map stored at the cursor's current slot,
/// restoring the previously active map afterwards.
pub fn scoped_naming_context<R>(
    trav: &mut DataTraversal,
    f: impl FnOnce(&mut DataTraversal) -> Flow<R>,
) -> Flow<R> {
    let scope = trav.open_naming();
    let result = f(trav);
    trav.close_naming(scope);
    result
}

/// Run `f` inside the named block for `id` under the current naming map.
pub fn scoped_named_block<R>(
    trav: &mut DataTraversal,
    id: &ValueId,
    f: impl FnOnce(&mut DataTraversal) -> Flow<R>,
) -> Flow<R> {
    let block = trav.acquire_named_block(id);
    scoped_data_block(trav, block, f)
}

/// Like [`scoped_named_block`], but marks the block manually owned: losing
/// all references clears its caches without destroying its state.
pub fn scoped_named_block_manual<R>(
    trav: &mut DataTraversal,
    id: &ValueId,
    f: impl FnOnce(&mut DataTraversal) -> Flow<R>,
) -> Flow<R> {
    let block = trav.acquire_named_block(id);
    trav.set_manual_delete(id, true);
    scoped_data_block(trav, block, f)
}

/// Drop the current naming map's claim on `id`. Pending references keep the
/// block's storage alive until they are garbage collected; its caches are
/// cleared immediately.
pub fn delete_named_block(trav: &DataTraversal, id: &ValueId) {
    trav.delete_named_block(id);
}
