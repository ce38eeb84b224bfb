//! Persistent scopes.
//!
//! A [`Frame`] is one scope's bindings and a [`Stack`] is the chain of active
//! frames. Both are backed by `im` collections: every "modifying" operation
//! returns a new value that shares structure with the receiver, and the
//! receiver is left untouched. Closures rely on this to capture a frame in
//! O(1), and concurrent argument evaluation relies on it to share one stack
//! snapshot between threads without locking.

use crate::ast::{Name, Value};

/// One lexical scope's immutable name -> value bindings.
#[derive(Clone, Default, PartialEq)]
pub struct Frame {
    bindings: im::HashMap<Name, Value>,
}

impl Frame {
    pub fn new() -> Self {
        Frame {
            bindings: im::HashMap::new(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.bindings.get(name)
    }

    /// New frame with `name` bound to `value`; the receiver is unchanged.
    #[must_use]
    pub fn set(&self, name: Name, value: Value) -> Frame {
        Frame {
            bindings: self.bindings.update(name, value),
        }
    }

    /// New frame without `name`; the receiver is unchanged.
    #[must_use]
    pub fn del(&self, name: &str) -> Frame {
        Frame {
            bindings: self.bindings.without(name),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Bindings sorted by name
    pub fn bindings(&self) -> Vec<(Name, Value)> {
        let mut result: Vec<_> = self
            .bindings
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        result.sort_by(|a, b| a.0.cmp(&b.0));
        result
    }
}

impl std::fmt::Debug for Frame {
    // Names only: printing values would recurse through captured frames.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&Name> = self.bindings.keys().collect();
        names.sort();
        f.debug_set().entries(names).finish()
    }
}

/// The chain of active frames, innermost last in storage and first in lookup.
#[derive(Clone, Default, PartialEq, Debug)]
pub struct Stack {
    frames: im::Vector<Frame>,
}

impl Stack {
    pub fn new() -> Self {
        Stack {
            frames: im::Vector::new(),
        }
    }

    /// Number of frames
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    #[must_use]
    pub fn push(&self, frame: Frame) -> Stack {
        let mut frames = self.frames.clone();
        frames.push_back(frame);
        Stack { frames }
    }

    /// Stack without its top frame; popping an empty stack yields an empty stack.
    #[must_use]
    pub fn pop(&self) -> Stack {
        let mut frames = self.frames.clone();
        frames.pop_back();
        Stack { frames }
    }

    pub fn peek(&self) -> Option<&Frame> {
        self.frames.back()
    }

    /// Swap the top frame for `frame` (push onto an empty stack).
    /// Tail calls use this so the depth stays constant.
    #[must_use]
    pub fn replace_top(&self, frame: Frame) -> Stack {
        let mut frames = self.frames.clone();
        frames.pop_back();
        frames.push_back(frame);
        Stack { frames }
    }

    /// Bind `name` in the top frame, creating one if the stack is empty.
    #[must_use]
    pub fn bind(&self, name: Name, value: Value) -> Stack {
        let top = self.peek().cloned().unwrap_or_default();
        self.replace_top(top.set(name, value))
    }

    /// Search frames from innermost to outermost.
    pub fn lookup(&self, name: &str) -> Option<&Value> {
        self.frames.iter().rev().find_map(|frame| frame.get(name))
    }

    /// Frames from innermost to outermost
    pub fn frames(&self) -> impl Iterator<Item = &Frame> {
        self.frames.iter().rev()
    }
}
