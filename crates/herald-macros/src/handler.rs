use proc_macro::TokenStream;
use proc_macro2::Span;
use quote::quote;
use syn::parse::Parser;
use syn::punctuated::Punctuated;
use syn::{Ident, Item, LitStr, Meta, Token, parse_macro_input};

struct HandlerArgs {
    name: Option<LitStr>,
    production_only: bool,
}

fn parse_args(attr: TokenStream) -> syn::Result<HandlerArgs> {
    let metas = Punctuated::<Meta, Token![,]>::parse_terminated.parse(attr)?;
    let mut args = HandlerArgs {
        name: None,
        production_only: false,
    };

    for meta in metas {
        match &meta {
            Meta::Path(path) if path.is_ident("production_only") => {
                args.production_only = true;
            }
            Meta::NameValue(nv) if nv.path.is_ident("name") => {
                let syn::Expr::Lit(syn::ExprLit {
                    lit: syn::Lit::Str(name),
                    ..
                }) = &nv.value
                else {
                    return Err(syn::Error::new_spanned(&nv.value, "expected a string literal"));
                };
                args.name = Some(name.clone());
            }
            other => {
                return Err(syn::Error::new_spanned(
                    other,
                    "unknown argument, expected `name = \"...\"` or `production_only`",
                ));
            }
        }
    }
    Ok(args)
}

/// Implementation of `#[register_handler(...)]`.
///
/// Leaves the decorated type unchanged and appends a
/// `#[::herald_framework::linkme::distributed_slice]` static that adds it to
/// `::herald_framework::HANDLERS`.
pub fn register_handler(attr: TokenStream, item: TokenStream) -> TokenStream {
    let args = match parse_args(attr) {
        Ok(args) => args,
        Err(err) => return err.into_compile_error().into(),
    };
    let item = parse_macro_input!(item as Item);

    let (ident, generics) = match &item {
        Item::Struct(s) => (&s.ident, &s.generics),
        Item::Enum(e) => (&e.ident, &e.generics),
        other => {
            return syn::Error::new_spanned(other, "#[register_handler] applies to structs and enums")
                .into_compile_error()
                .into();
        }
    };
    if !generics.params.is_empty() {
        return syn::Error::new_spanned(generics, "generic handlers cannot be registered")
            .into_compile_error()
            .into();
    }

    let static_name = Ident::new(
        &format!("_HERALD_HANDLER_{}", ident.to_string().to_uppercase()),
        Span::call_site(),
    );
    let name = args
        .name
        .unwrap_or_else(|| LitStr::new(&ident.to_string(), ident.span()));
    let production_only = args.production_only;

    quote! {
        #item

        #[::herald_framework::linkme::distributed_slice(::herald_framework::HANDLERS)]
        #[linkme(crate = ::herald_framework::linkme)]
        static #static_name: ::herald_framework::HandlerRegistration =
            ::herald_framework::HandlerRegistration::of::<#ident>(#name, #production_only);
    }
    .into()
}
