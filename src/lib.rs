#![allow(
    clippy::len_zero,
    clippy::needless_lifetimes,
    clippy::enum_variant_names,
    clippy::useless_format
)]

#[macro_use]
mod macros;
pub mod allocator;
pub mod config;
pub mod display;
pub mod error;
pub mod feedback;
pub mod format;
pub mod format_list;
pub mod gfx_api;
#[cfg(test)]
mod it;
pub mod logger;
pub mod surface;
pub mod swapchain;
pub mod timeline;
pub mod utils;
pub mod video;
pub mod wire;
pub mod wl_usr;
