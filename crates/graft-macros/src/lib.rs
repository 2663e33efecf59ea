//! Procedural macros for graft.
//!
//! - `#[entry_point("name")]` registers a type as a named entry point in the
//!   link-time `ENTRY_POINTS` slice of `graft-core`.
//!
//! Expansions refer to `::graft::core`, so use the macro through the `graft`
//! crate.
//!
//! ```rust,ignore
//! use graft::prelude::*;
//!
//! #[entry_point("greeter.Main", owner = "greeter")]
//! pub struct Greeter {
//!     metadata: Arc<Metadata>,
//! }
//!
//! impl Plugin for Greeter {
//!     fn on_initialize(&mut self) -> Result<(), BoxError> {
//!         info!("Hello from {}", self.metadata.display_name());
//!         Ok(())
//!     }
//! }
//!
//! impl EntryPoint for Greeter {
//!     fn construct(metadata: Arc<Metadata>) -> Result<Self, BoxError> {
//!         Ok(Self { metadata })
//!     }
//! }
//! ```
//!
//! Without `owner` the entry point belongs to the host and any plugin can
//! list it. With `owner` only the plugin with that id can.

mod entry_point;

use proc_macro::TokenStream;

/// Registers the annotated struct or enum as a named entry point.
///
/// The type must implement `graft::core::EntryPoint`. The item itself is
/// emitted unchanged.
#[proc_macro_attribute]
pub fn entry_point(attr: TokenStream, item: TokenStream) -> TokenStream {
    match entry_point::entry_point(attr.into(), item.into()) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}
