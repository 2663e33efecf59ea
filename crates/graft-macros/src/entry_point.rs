use proc_macro2::{Span, TokenStream};
use quote::quote;
use syn::parse::{Parse, ParseStream};
use syn::spanned::Spanned;
use syn::{Ident, Item, LitStr, Token};

/// Arguments of `#[entry_point("name", owner = "plugin-id")]`.
struct EntryPointArgs {
    name: LitStr,
    owner: Option<LitStr>,
}

impl Parse for EntryPointArgs {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let name: LitStr = input.parse()?;
        if name.value().trim().is_empty() {
            return Err(syn::Error::new(name.span(), "entry point name must not be empty"));
        }

        let mut owner = None;
        while !input.is_empty() {
            input.parse::<Token![,]>()?;
            if input.is_empty() {
                break;
            }
            let key: Ident = input.parse()?;
            input.parse::<Token![=]>()?;
            let value: LitStr = input.parse()?;
            match key.to_string().as_str() {
                "owner" if owner.is_none() => owner = Some(value),
                "owner" => return Err(syn::Error::new(key.span(), "duplicate `owner`")),
                other => {
                    return Err(syn::Error::new(
                        key.span(),
                        format!("unknown argument `{other}`, expected `owner`"),
                    ));
                }
            }
        }

        Ok(Self { name, owner })
    }
}

/// Leaves the item unchanged and appends a static registering it in
/// `::graft::core::ENTRY_POINTS`.
pub fn entry_point(attr: TokenStream, item: TokenStream) -> syn::Result<TokenStream> {
    let args: EntryPointArgs = syn::parse2(attr)?;
    let item: Item = syn::parse2(item)?;

    let (ident, generics) = match &item {
        Item::Struct(s) => (&s.ident, &s.generics),
        Item::Enum(e) => (&e.ident, &e.generics),
        other => {
            return Err(syn::Error::new(
                other.span(),
                "#[entry_point] can only be applied to a struct or enum",
            ));
        }
    };
    if !generics.params.is_empty() {
        return Err(syn::Error::new(
            generics.span(),
            "#[entry_point] types cannot be generic",
        ));
    }

    let static_name = Ident::new(
        &format!("_GRAFT_ENTRY_POINT_{}", ident.to_string().to_uppercase()),
        Span::call_site(),
    );
    let name = &args.name;
    let descriptor = match &args.owner {
        Some(owner) => quote!(::graft::core::EntryPointDescriptor::owned::<#ident>(#name, #owner)),
        None => quote!(::graft::core::EntryPointDescriptor::new::<#ident>(#name)),
    };

    Ok(quote! {
        #item

        #[::graft::core::linkme::distributed_slice(::graft::core::ENTRY_POINTS)]
        #[linkme(crate = ::graft::core::linkme)]
        #[doc(hidden)]
        static #static_name: ::graft::core::EntryPointDescriptor = #descriptor;
    })
}

#[cfg(test)]
mod tests {
    use quote::quote;

    use super::*;

    #[test]
    fn test_parse_name_only() {
        let args: EntryPointArgs = syn::parse2(quote!("demo.Main")).unwrap();
        assert_eq!(args.name.value(), "demo.Main");
        assert!(args.owner.is_none());
    }

    #[test]
    fn test_parse_owner() {
        let args: EntryPointArgs = syn::parse2(quote!("demo.Main", owner = "demo",)).unwrap();
        assert_eq!(args.owner.map(|o| o.value()), Some("demo".to_string()));
    }

    #[test]
    fn test_rejects_unknown_argument() {
        assert!(syn::parse2::<EntryPointArgs>(quote!("demo.Main", parent = "x")).is_err());
        assert!(syn::parse2::<EntryPointArgs>(quote!("  ")).is_err());
    }

    #[test]
    fn test_expansion_registers_descriptor() {
        let tokens = entry_point(quote!("demo.Main", owner = "demo"), quote!(struct Demo;)).unwrap();
        let expanded = tokens.to_string();
        assert!(expanded.contains("_GRAFT_ENTRY_POINT_DEMO"));
        assert!(expanded.contains("owned"));
        assert!(expanded.contains("\"demo.Main\""));
    }

    #[test]
    fn test_rejects_functions_and_generics() {
        assert!(entry_point(quote!("demo.Main"), quote!(fn demo() {})).is_err());
        assert!(entry_point(quote!("demo.Main"), quote!(struct Demo<T>(T);)).is_err());
    }
}
