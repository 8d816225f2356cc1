//! Procedural macros for setthings schema types.
//!
//! `#[derive(Settings)]` writes the schema description consumed by the
//! compiler in `setthings-schema` and a `<Type>Fields` accessor used to select
//! properties when staging updates.

mod attrs;
mod expand;

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

/// Derives `setthings::schema::Settings` for a struct with named fields.
///
/// Container attributes, `#[settings(...)]`:
/// - `rename_all = "PascalCase"`: case rule applied to field identifiers
///   (`camelCase`, `snake_case`, `SCREAMING_SNAKE_CASE`, `kebab-case`,
///   `lowercase` and `UPPERCASE` are also accepted).
/// - `crate = "path"`: path to the `setthings` facade, `::setthings` by default.
///
/// Field attributes, `#[setting(...)]`:
/// - `node`: the field is a nested settings type and is expanded recursively.
/// - `name = "Name"`: overrides the final key segment.
/// - `default = "value"`: declared default in invariant string form.
/// - `skip`: the field is not part of the schema and keeps its `Default` value.
#[proc_macro_derive(Settings, attributes(settings, setting))]
pub fn derive_settings(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand::derive_settings(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}
