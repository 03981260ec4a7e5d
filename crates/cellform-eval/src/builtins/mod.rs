//! Builtin executor catalog.
//!
//! `meta` holds the operator executors the builder rewrites infix/postfix
//! tokens into; the rest are ordinary worksheet functions grouped the way a
//! function reference lists them.

mod address;
mod logical;
mod math;
mod meta;
mod text;
mod utils;

use crate::registry::FunctionRegistry;

pub(crate) fn install(registry: &mut FunctionRegistry) {
    meta::install(registry);
    math::install(registry);
    logical::install(registry);
    text::install(registry);
    address::install(registry);
}
