//! Code generation for `#[derive(Settings)]`.

use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use syn::{Data, DeriveInput, Fields, LitStr};

use crate::attrs::{ContainerAttrs, FieldAttrs, field_identifier};

struct SchemaField<'a> {
    ident: &'a syn::Ident,
    ty: &'a syn::Type,
    segment_ident: String,
    attrs: FieldAttrs,
}

impl SchemaField<'_> {
    fn segment(&self) -> String {
        self.attrs
            .name
            .as_ref()
            .map_or_else(|| self.segment_ident.clone(), LitStr::value)
    }
}

pub(crate) fn derive_settings(input: &DeriveInput) -> syn::Result<TokenStream> {
    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            "Settings cannot be derived for generic types",
        ));
    }

    let named = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(named) => named,
            _ => {
                return Err(syn::Error::new_spanned(
                    &input.ident,
                    "Settings can only be derived for structs with named fields",
                ));
            }
        },
        Data::Enum(_) | Data::Union(_) => {
            return Err(syn::Error::new_spanned(
                &input.ident,
                "Settings can only be derived for structs",
            ));
        }
    };

    let container = ContainerAttrs::from_attrs(&input.attrs)?;
    let mut fields = Vec::with_capacity(named.named.len());
    for field in &named.named {
        let attrs = FieldAttrs::from_field(field)?;
        if attrs.skip {
            continue;
        }
        let Some(ident) = field.ident.as_ref() else {
            continue;
        };
        fields.push(SchemaField {
            ident,
            ty: &field.ty,
            segment_ident: field_identifier(ident, container.rename_all),
            attrs,
        });
    }

    let krate = &container.krate;
    let ident = &input.ident;
    let vis = &input.vis;
    let fields_ident = format_ident!("{}Fields", ident);

    let properties = fields.iter().map(|field| property(krate, field));
    let accessors = fields.iter().map(|field| accessor(krate, field));

    let fields_doc =
        format!("Field selectors for [`{ident}`], generated by `#[derive(Settings)]`.");

    Ok(quote! {
        #[doc = #fields_doc]
        #vis struct #fields_ident<R> {
            path: #krate::schema::FieldPath,
            _root: ::core::marker::PhantomData<fn() -> R>,
        }

        impl<R> ::core::clone::Clone for #fields_ident<R> {
            fn clone(&self) -> Self {
                Self {
                    path: ::core::clone::Clone::clone(&self.path),
                    _root: ::core::marker::PhantomData,
                }
            }
        }

        impl<R> ::core::fmt::Debug for #fields_ident<R> {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                f.debug_tuple(::core::stringify!(#fields_ident))
                    .field(&self.path)
                    .finish()
            }
        }

        #[allow(clippy::must_use_candidate, dead_code)]
        impl<R: 'static> #fields_ident<R> {
            #(#accessors)*
        }

        #[automatically_derived]
        impl #krate::schema::Settings for #ident {
            type Fields<R: 'static> = #fields_ident<R>;

            fn properties() -> ::std::vec::Vec<#krate::schema::Property<Self>> {
                ::std::vec![#(#properties),*]
            }

            fn fields_at<R: 'static>(path: #krate::schema::FieldPath) -> Self::Fields<R> {
                #fields_ident {
                    path,
                    _root: ::core::marker::PhantomData,
                }
            }
        }
    })
}

fn option_lit(lit: Option<&LitStr>) -> TokenStream {
    match lit {
        Some(lit) => quote!(::core::option::Option::Some(#lit)),
        None => quote!(::core::option::Option::None),
    }
}

fn property(krate: &syn::Path, field: &SchemaField<'_>) -> TokenStream {
    let member = field.ident;
    let ty = field.ty;
    let ident = &field.segment_ident;
    let rename = option_lit(field.attrs.name.as_ref());

    if field.attrs.node {
        quote! {
            #krate::schema::Property::<Self>::node::<#ty>(
                #ident,
                #rename,
                |settings| &settings.#member,
                |settings| &mut settings.#member,
            )
        }
    } else {
        let default = option_lit(field.attrs.default.as_ref());
        quote! {
            #krate::schema::Property::<Self>::leaf::<#ty>(
                #ident,
                #rename,
                #default,
                |settings| &settings.#member,
                |settings| &mut settings.#member,
            )
        }
    }
}

fn accessor(krate: &syn::Path, field: &SchemaField<'_>) -> TokenStream {
    let method = field.ident;
    let ty = field.ty;
    let segment = field.segment();

    if field.attrs.node {
        let doc = format!("Selects the `{segment}` node.");
        quote! {
            #[doc = #doc]
            pub fn #method(&self) -> <#ty as #krate::schema::Settings>::Fields<R> {
                <#ty as #krate::schema::Settings>::fields_at::<R>(self.path.join(#segment))
            }
        }
    } else {
        let doc = format!("Selects the `{segment}` property.");
        quote! {
            #[doc = #doc]
            pub fn #method(&self) -> #krate::schema::Selector<R, #ty> {
                #krate::schema::Selector::new(self.path.join(#segment))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expand(input: DeriveInput) -> syn::Result<String> {
        derive_settings(&input).map(|tokens| tokens.to_string().split_whitespace().collect())
    }

    #[test]
    fn generic_structs_are_rejected() {
        let err = expand(syn::parse_quote! {
            struct Wrapper<T> { inner: T }
        })
        .expect_err("generic");
        assert!(err.to_string().contains("generic"));
    }

    #[test]
    fn enums_and_tuple_structs_are_rejected() {
        assert!(expand(syn::parse_quote!(enum Mode { Fast })).is_err());
        assert!(expand(syn::parse_quote!(struct Pair(u8, u8);)).is_err());
    }

    #[test]
    fn leaves_and_nodes_expand_with_resolved_segments() {
        let code = expand(syn::parse_quote! {
            #[settings(rename_all = "PascalCase", crate = "crate::facade")]
            pub struct Site {
                #[setting(node, name = "Net")]
                network: Network,
                #[setting(default = "on")]
                mode_name: String,
                #[setting(skip)]
                cache: Vec<u8>,
            }
        })
        .unwrap();

        assert!(code.contains("pubstructSiteFields<R>"));
        assert!(code.contains("crate::facade::schema::Property::<Self>::node::<Network>"));
        assert!(code.contains("\"Network\""));
        assert!(code.contains("\"Net\""));
        assert!(code.contains("\"ModeName\""));
        assert!(code.contains("\"on\""));
        assert!(!code.contains("cache"));
    }
}
