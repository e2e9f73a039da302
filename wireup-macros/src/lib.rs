use proc_macro::TokenStream;
use quote::{quote, ToTokens};
use std::env::var_os;
use syn::parse::Parse;

mod attr_parsing;
mod injectable;

/// Implements `wireup::Injectable` for a struct.
///
/// Every field marked with `#[inject]` is resolved by its capability, `#[inject("id")]` resolves it by instance id.
/// Marked fields must be `wireup::Inject<T>`.
#[proc_macro_derive(Injectable, attributes(inject))]
pub fn derive_injectable(item: TokenStream) -> TokenStream {
    expand_with(item, injectable::expand)
}

fn expand_with<F, I, K>(input: TokenStream, f: F) -> TokenStream
where
    F: FnOnce(I) -> syn::Result<K>,
    I: Parse,
    K: ToTokens,
{
    expand(syn::parse(input).and_then(f))
}

fn expand<T>(result: syn::Result<T>) -> TokenStream
where
    T: ToTokens,
{
    match result {
        Ok(tokens) => {
            let tokens = (quote! { #tokens }).into();
            if var_os("WIREUP_MACROS_DEBUG").is_some() {
                eprintln!("{tokens}");
            }
            tokens
        }
        Err(err) => err.into_compile_error().into(),
    }
}
