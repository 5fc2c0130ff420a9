use crate::ir::StateId;

/// Hands out state numbers for suspension points in the order they're encountered.
///
/// The start of the body always owns state 0, so the first suspension point gets 1.
#[derive(Debug, Clone, Default)]
pub struct StateAllocator {
    allocated: u32,
}

impl StateAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&mut self) -> StateId {
        self.allocated += 1;

        StateId::Suspended(self.allocated)
    }
}
