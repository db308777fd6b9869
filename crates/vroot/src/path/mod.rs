//! Path canonicalization and virtual-root resolution.
//!
//! - [`clean`]: lexical simplification, no base or alias knowledge
//! - [`Resolver`]: base path, aliases and virtual cwd applied on top

mod clean;
mod resolver;

pub use clean::{
    basename, clean, clean_in_place, parent, trim_trailing_slash, trim_trailing_slashes,
};
pub use resolver::{LookupFlags, Resolved, Resolver};
