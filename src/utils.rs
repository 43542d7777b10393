pub mod compat;
pub mod debug_fn;
pub mod errorfmt;
pub mod mmap;
pub mod oserror;
