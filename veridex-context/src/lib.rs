//! Backtrackable memory primitives for the Veridex verifier.
//!
//! The search core explores a tree of case splits and must be able to undo
//! every state change when a branch is abandoned. This crate provides the
//! memory layer that makes that cheap:
//!
//! - [`Context`] — a stack of undo scopes with `push`/`pop`/`pop_to`.
//! - [`Cdo`] — a context-dependent cell. Writing it records the previous
//!   value the first time it is touched within a scope; popping the scope
//!   restores it.
//! - [`CdList`] — a context-dependent grow-only list. Elements appended
//!   within a scope disappear when the scope is popped.
//!
//! All types are single-threaded by design: the search core never shares a
//! context across threads, so cells are reference-counted rather than
//! atomically shared. Reads are O(1); a pop costs time proportional to the
//! number of writes performed at the popped level.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// An undo action recorded on the trail, run exactly once when its scope pops.
type UndoRecord = Box<dyn FnOnce()>;

struct ContextInner {
    /// One entry per open scope; `scopes.len()` is the current level.
    scopes: Vec<Vec<UndoRecord>>,
}

/// A stack of undo scopes.
///
/// `Context` is a cheap handle: cloning it yields another handle to the same
/// underlying scope stack, which is how cells register their undo records.
/// Scopes nest strictly; popping runs the undo records of the innermost
/// scope in reverse order of registration.
#[derive(Clone)]
pub struct Context {
    inner: Rc<RefCell<ContextInner>>,
}

impl Context {
    /// Create a context at level 0 with no open scopes.
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(ContextInner { scopes: Vec::new() })),
        }
    }

    /// Current nesting level. Level 0 means no scope is open; writes made at
    /// level 0 are permanent.
    pub fn level(&self) -> usize {
        self.inner.borrow().scopes.len()
    }

    /// Open a new scope.
    pub fn push(&self) {
        self.inner.borrow_mut().scopes.push(Vec::new());
    }

    /// Close the innermost scope, undoing every write made inside it.
    ///
    /// Popping at level 0 is a programmer error; it is a debug assertion and
    /// a no-op in release builds.
    pub fn pop(&self) {
        let records = {
            let mut inner = self.inner.borrow_mut();
            debug_assert!(!inner.scopes.is_empty(), "pop on a context at level 0");
            match inner.scopes.pop() {
                Some(records) => records,
                None => return,
            }
        };
        // Undo in reverse registration order. The borrow on the scope stack
        // is released first: records touch cell state, never the stack.
        for undo in records.into_iter().rev() {
            undo();
        }
    }

    /// Pop scopes until the context is back at `level`.
    pub fn pop_to(&self, level: usize) {
        while self.level() > level {
            self.pop();
        }
    }

    fn record(&self, undo: UndoRecord) {
        let mut inner = self.inner.borrow_mut();
        if let Some(scope) = inner.scopes.last_mut() {
            scope.push(undo);
        }
        // At level 0 there is nothing to undo to: the write is permanent.
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context").field("level", &self.level()).finish()
    }
}

struct CdoState<T> {
    value: T,
    /// Highest level at which the current value has already been saved.
    saved_at: usize,
}

/// A context-dependent cell.
///
/// The first write within a scope saves the previous value on the context's
/// trail; popping the scope restores it. Writes at level 0 are permanent.
pub struct Cdo<T: Clone + 'static> {
    state: Rc<RefCell<CdoState<T>>>,
    ctx: Context,
}

impl<T: Clone + 'static> Cdo<T> {
    /// Create a cell holding `value`, attached to `ctx`.
    ///
    /// The initial value is treated as the level-0 value: popping every
    /// scope restores it regardless of the level the cell was created at.
    pub fn new(ctx: &Context, value: T) -> Self {
        Self {
            state: Rc::new(RefCell::new(CdoState { value, saved_at: 0 })),
            ctx: ctx.clone(),
        }
    }

    /// Read the current value.
    pub fn get(&self) -> T {
        self.state.borrow().value.clone()
    }

    /// Write `value`, saving the previous value on first write per scope.
    pub fn set(&self, value: T) {
        let level = self.ctx.level();
        let mut st = self.state.borrow_mut();
        if st.saved_at < level {
            let old = st.value.clone();
            let previous_saved_at = st.saved_at;
            st.saved_at = level;
            let state = Rc::clone(&self.state);
            self.ctx.record(Box::new(move || {
                let mut st = state.borrow_mut();
                st.value = old;
                st.saved_at = previous_saved_at;
            }));
        }
        st.value = value;
    }

    /// Apply `f` to the current value and store the result.
    pub fn update(&self, f: impl FnOnce(&T) -> T) {
        let next = f(&self.state.borrow().value);
        self.set(next);
    }
}

impl<T: Clone + fmt::Debug + 'static> fmt::Debug for Cdo<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Cdo").field(&self.state.borrow().value).finish()
    }
}

struct CdListState<T> {
    items: Vec<T>,
    saved_at: usize,
}

/// A context-dependent grow-only list.
///
/// Elements appended within a scope are truncated away when the scope pops.
/// Appends at level 0 are permanent.
pub struct CdList<T: Clone + 'static> {
    state: Rc<RefCell<CdListState<T>>>,
    ctx: Context,
}

impl<T: Clone + 'static> CdList<T> {
    /// Create an empty list attached to `ctx`.
    pub fn new(ctx: &Context) -> Self {
        Self {
            state: Rc::new(RefCell::new(CdListState { items: Vec::new(), saved_at: 0 })),
            ctx: ctx.clone(),
        }
    }

    /// Number of elements currently visible.
    pub fn len(&self) -> usize {
        self.state.borrow().items.len()
    }

    /// True when no element is currently visible.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append an element at the current level.
    pub fn push_back(&self, item: T) {
        let level = self.ctx.level();
        let mut st = self.state.borrow_mut();
        if st.saved_at < level {
            let old_len = st.items.len();
            let previous_saved_at = st.saved_at;
            st.saved_at = level;
            let state = Rc::clone(&self.state);
            self.ctx.record(Box::new(move || {
                let mut st = state.borrow_mut();
                st.items.truncate(old_len);
                st.saved_at = previous_saved_at;
            }));
        }
        st.items.push(item);
    }

    /// Clone of the element at `index`, if visible.
    pub fn get(&self, index: usize) -> Option<T> {
        self.state.borrow().items.get(index).cloned()
    }

    /// Snapshot of the currently visible elements.
    pub fn to_vec(&self) -> Vec<T> {
        self.state.borrow().items.clone()
    }
}

impl<T: Clone + PartialEq + 'static> CdList<T> {
    /// True when an equal element is currently visible.
    pub fn contains(&self, item: &T) -> bool {
        self.state.borrow().items.contains(item)
    }
}

impl<T: Clone + fmt::Debug + 'static> fmt::Debug for CdList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.state.borrow().items.iter()).finish()
    }
}
