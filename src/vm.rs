//! Frame-stack virtual machine: one contiguous vector of value cells
//! plus a stack of call frames. A frame owns the cells from its
//! `base` to the next frame's base (or the end of memory).
//!
//! `enter`/`leave` must stay paired on every path. The evaluator
//! models unwinding as values rather than panics, so the pairing is a
//! matter of calling `leave` after the body evaluation returns,
//! whatever it returned; tests assert the balance after every
//! top-level turn.

use crate::value::Value;
use crate::{EvalError, MAX_FRAMES};

/// Activation record. `return_addr` is reserved for a bytecode
/// backend and always zero in the tree-walking engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    pub base: usize,
    pub return_addr: usize,
}

/// The VM: value memory and call stack. The root frame is entered
/// once per session and owns the top-level slots.
#[derive(Default)]
pub struct Vm {
    mem: Vec<Value>,
    frames: Vec<Frame>,
}

impl Vm {
    pub fn new() -> Self {
        Vm::default()
    }

    /// A VM with its root frame already entered and `locals` cells
    /// reserved. This is how a session VM starts.
    pub fn with_root(locals: usize) -> Self {
        let mut vm = Vm::default();
        vm.mem.resize(locals, Value::nil());
        vm.frames.push(Frame {
            base: 0,
            return_addr: 0,
        });
        vm
    }

    /// Push a frame whose base is the current memory size and append
    /// `locals` Nil cells for it.
    pub fn enter(&mut self, locals: usize) -> Result<(), EvalError> {
        if self.frames.len() >= MAX_FRAMES {
            return Err(EvalError::StackOverflow);
        }
        let base = self.mem.len();
        let new_len = base.checked_add(locals).ok_or(EvalError::StackOverflow)?;
        self.mem.resize(new_len, Value::nil());
        self.frames.push(Frame {
            base,
            return_addr: 0,
        });
        Ok(())
    }

    /// Pop the top frame and truncate memory back to its base.
    pub fn leave(&mut self) -> Result<(), EvalError> {
        let frame = self.frames.pop().ok_or(EvalError::LeaveWithoutEnter)?;
        self.mem.truncate(frame.base);
        Ok(())
    }

    fn cell(&self, frame: Frame, slot: usize) -> Result<&Value, EvalError> {
        let len = self.mem.len() - frame.base;
        self.mem
            .get(frame.base + slot)
            .ok_or(EvalError::SlotOutOfRange { slot, len })
    }

    fn cell_mut(&mut self, frame: Frame, slot: usize) -> Result<&mut Value, EvalError> {
        let len = self.mem.len() - frame.base;
        self.mem
            .get_mut(frame.base + slot)
            .ok_or(EvalError::SlotOutOfRange { slot, len })
    }

    /// Read a local of the top frame.
    pub fn local(&self, slot: usize) -> Result<&Value, EvalError> {
        let frame = *self.frames.last().ok_or(EvalError::NoActiveFrame)?;
        self.cell(frame, slot)
    }

    /// Mutable access to a local of the top frame.
    pub fn local_mut(&mut self, slot: usize) -> Result<&mut Value, EvalError> {
        let frame = *self.frames.last().ok_or(EvalError::NoActiveFrame)?;
        self.cell_mut(frame, slot)
    }

    /// Read a slot of the root (top-level) frame.
    pub fn global(&self, slot: usize) -> Result<&Value, EvalError> {
        let frame = *self.frames.first().ok_or(EvalError::NoActiveFrame)?;
        self.cell(frame, slot)
    }

    /// Mutable access to a slot of the root frame.
    pub fn global_mut(&mut self, slot: usize) -> Result<&mut Value, EvalError> {
        let frame = *self.frames.first().ok_or(EvalError::NoActiveFrame)?;
        self.cell_mut(frame, slot)
    }

    /// Grow the root frame to at least `locals` cells. Only possible
    /// while no call frame sits above it, since growth would shift
    /// every later base; the driver calls this between turns.
    pub fn reserve_root(&mut self, locals: usize) -> Result<(), EvalError> {
        let root = *self.frames.first().ok_or(EvalError::NoActiveFrame)?;
        if self.frames.len() == 1 {
            let wanted = root.base.checked_add(locals).ok_or(EvalError::StackOverflow)?;
            if self.mem.len() < wanted {
                self.mem.resize(wanted, Value::nil());
            }
        }
        Ok(())
    }

    /// Current frame-stack depth.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Total number of live value cells.
    pub fn mem_len(&self) -> usize {
        self.mem.len()
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    /// Human-readable call stack for the `@stack` intrinsic, top
    /// frame first.
    pub fn stack_trace(&self) -> String {
        let mut out = String::new();
        for (i, frame) in self.frames.iter().enumerate().rev() {
            let end = self
                .frames
                .get(i + 1)
                .map_or(self.mem.len(), |next| next.base);
            out.push_str(&format!(
                "frame #{i}: base={}, slots={}\n",
                frame.base,
                end - frame.base
            ));
        }
        out
    }
}
