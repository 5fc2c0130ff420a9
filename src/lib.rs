pub mod bound;
pub mod errors;
pub mod interp;
pub mod ir;
pub mod lower;
pub mod source;
pub mod util;
