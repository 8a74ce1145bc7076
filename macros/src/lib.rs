//! Derive macros for Reducible
//!
//! # Available Macros
//!
//! - `#[derive(Action)]` - Generates case accessors for action enums
//!
//! # Example
//!
//! ```ignore
//! use reducible_macros::Action;
//!
//! #[derive(Action, Clone, Debug)]
//! enum AppAction {
//!     Counter(CounterAction),
//!     SetSheet(bool),
//!     SetSheetDelayCompleted,
//! }
//!
//! // Generated methods:
//! assert!(AppAction::SetSheet(true).is_set_sheet());
//! assert_eq!(AppAction::SetSheet(true).into_set_sheet(), Some(true));
//!
//! // Extractors plug straight into an ActionCase:
//! let case = ActionCase::new(AppAction::Counter, AppAction::into_counter);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use proc_macro::TokenStream;
use proc_macro2::Span;
use quote::{format_ident, quote};
use syn::{Data, DeriveInput, Fields, Ident, Variant, parse_macro_input};

/// Derive macro for Action enums
///
/// Generates, for every variant `FooBar`:
/// - `is_foo_bar()` - Returns true if the action is that variant
///
/// and for variants carrying exactly one unnamed field of type `T`:
/// - `as_foo_bar()` - Borrows the payload (`Option<&T>`)
/// - `into_foo_bar()` - Extracts the payload (`Option<T>`)
///
/// plus `variant_name()`, the name of the variant as written.
///
/// `into_*` has the `fn(Action) -> Option<T>` shape an `ActionCase`
/// extractor expects, which is how parent reducers route child actions.
///
/// # Panics
///
/// This macro will produce a compile error (not a runtime panic) if applied
/// to a non-enum type.
#[proc_macro_derive(Action)]
pub fn derive_action(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let Data::Enum(data_enum) = &input.data else {
        return syn::Error::new_spanned(input, "#[derive(Action)] can only be used on enums")
            .to_compile_error()
            .into();
    };

    let name_arms = data_enum.variants.iter().map(|variant| {
        let pattern = pattern(variant);
        let label = variant.ident.to_string();
        quote! { #pattern => #label, }
    });

    let predicates = data_enum.variants.iter().map(|variant| {
        let pattern = pattern(variant);
        let method = method_ident("is", &variant.ident);
        let doc = format!("Returns true if this action is `{}`", variant.ident);
        quote! {
            #[doc = #doc]
            #[must_use]
            pub const fn #method(&self) -> bool {
                matches!(self, #pattern)
            }
        }
    });

    let accessors = data_enum.variants.iter().filter_map(|variant| {
        let Fields::Unnamed(fields) = &variant.fields else {
            return None;
        };
        if fields.unnamed.len() != 1 {
            return None;
        }
        let field_ty = &fields.unnamed[0].ty;
        let ident = &variant.ident;
        let as_method = method_ident("as", ident);
        let into_method = method_ident("into", ident);
        let as_doc = format!("Borrows the payload if this action is `{ident}`");
        let into_doc = format!("Extracts the payload if this action is `{ident}`");

        Some(quote! {
            #[doc = #as_doc]
            #[must_use]
            #[allow(unreachable_patterns)]
            pub const fn #as_method(&self) -> Option<&#field_ty> {
                match self {
                    Self::#ident(value) => Some(value),
                    _ => None,
                }
            }

            #[doc = #into_doc]
            #[must_use]
            #[allow(unreachable_patterns)]
            pub fn #into_method(self) -> Option<#field_ty> {
                match self {
                    Self::#ident(value) => Some(value),
                    _ => None,
                }
            }
        })
    });

    let expanded = quote! {
        impl #impl_generics #name #ty_generics #where_clause {
            /// Returns the name of this action's variant
            #[must_use]
            pub const fn variant_name(&self) -> &'static str {
                match self {
                    #(#name_arms)*
                }
            }

            #(#predicates)*

            #(#accessors)*
        }
    };

    TokenStream::from(expanded)
}

/// A pattern matching any value of `variant`.
fn pattern(variant: &Variant) -> proc_macro2::TokenStream {
    let ident = &variant.ident;
    match &variant.fields {
        Fields::Named(_) => quote! { Self::#ident { .. } },
        Fields::Unnamed(_) => quote! { Self::#ident(..) },
        Fields::Unit => quote! { Self::#ident },
    }
}

fn method_ident(prefix: &str, variant: &Ident) -> Ident {
    format_ident!("{}_{}", prefix, snake_case(&variant.to_string()), span = Span::call_site())
}

/// `SetSheetDelayCompleted` becomes `set_sheet_delay_completed`, `URLLoaded`
/// becomes `url_loaded`.
fn snake_case(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if c.is_uppercase() {
            let prev_lower = i > 0 && (chars[i - 1].is_lowercase() || chars[i - 1].is_ascii_digit());
            let acronym_end = i > 0
                && chars[i - 1].is_uppercase()
                && chars.get(i + 1).is_some_and(|next| next.is_lowercase());
            if prev_lower || acronym_end {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}
