use crate::bound::{ReturnShape, Ty};
use crate::ir::CapabilitySet;

use super::error::LoweringError;

/// Decides which capabilities the state machine type implements.
///
/// Returns the capability set along with the element type.
pub fn select_capabilities(ret: &Ty) -> Result<(CapabilitySet, Ty), LoweringError> {
    match ret.return_shape() {
        ReturnShape::Iterable(elem) => Ok((CapabilitySet::IterableIterator, elem.clone())),
        ReturnShape::Iterator(elem) => Ok((CapabilitySet::IteratorOnly, elem.clone())),
        ReturnShape::Other => Err(LoweringError::UnexpectedReturnShape(ret.clone())),
    }
}

