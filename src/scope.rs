//! Parse-time name resolution. Each function gets one [`Scope`]: a
//! stack of block-level `name -> slot` maps plus a flat vector of
//! every declared name. Slots are handed out monotonically across all
//! nested blocks, so leaving a block removes names from visibility
//! but never frees their slots; the final name count is the frame
//! size the function needs at runtime.
//!
//! Scopes exist only while parsing. Afterwards every identifier node
//! carries its slot index directly and no scope object survives.

use std::collections::HashMap;

#[derive(Debug)]
pub struct Scope {
    /// Visibility stack: one map per open block.
    blocks: Vec<HashMap<String, usize>>,
    /// Every name ever declared in this function, in slot order.
    names: Vec<String>,
}

impl Default for Scope {
    fn default() -> Self {
        Scope::new()
    }
}

impl Scope {
    pub fn new() -> Self {
        Scope {
            blocks: vec![HashMap::new()],
            names: Vec::new(),
        }
    }

    /// Declare a name in the innermost block and allocate its slot.
    pub fn add(&mut self, name: &str) -> usize {
        let slot = self.names.len();
        self.names.push(name.to_owned());
        if let Some(block) = self.blocks.last_mut() {
            block.insert(name.to_owned(), slot);
        }
        slot
    }

    /// Search the block stack top-down for a visible binding.
    pub fn find(&self, name: &str) -> Option<usize> {
        self.blocks
            .iter()
            .rev()
            .find_map(|block| block.get(name).copied())
    }

    /// Open a block scope.
    pub fn enter(&mut self) {
        self.blocks.push(HashMap::new());
    }

    /// Close the innermost block scope. The function-level block at
    /// the bottom of the stack is never popped.
    pub fn leave(&mut self) {
        if self.blocks.len() > 1 {
            self.blocks.pop();
        }
    }

    /// Number of slots allocated so far (the running frame size).
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Declared names in slot order, for diagnostics.
    pub fn names(&self) -> &[String] {
        &self.names
    }
}
