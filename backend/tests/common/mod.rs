// Not every utils is used in every test, so we allow dead code
#![allow(unused_imports, dead_code)]

mod memory_blobs;
pub use memory_blobs::*;
mod memory_store;
pub use memory_store::*;
mod test_setup;
pub use test_setup::*;
