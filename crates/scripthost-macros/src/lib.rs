//! Derive macro for projecting Rust enums into scripts.
//!
//! `#[derive(ScriptEnum)]` implements `scripthost::ScriptEnum` for a fieldless
//! enum, producing an `EnumDescriptor` the enum registry can consume.
//!
//! Supported attributes:
//! - `#[script_enum(name = "...", description = "...")]` on the enum. The name
//!   defaults to the type name; the description defaults to the doc comment.
//! - `#[script_value(description = "...", hidden)]` on a variant. `hidden` (or
//!   `hidden = true`) keeps the member out of every script host. The
//!   description defaults to the variant's doc comment.
//!
//! ```ignore
//! use scripthost::ScriptEnum;
//!
//! /// Team colours.
//! #[derive(ScriptEnum, Clone, Copy)]
//! #[script_enum(name = "Color")]
//! enum Color {
//!     Red = 0,
//!     Green = 1,
//!     #[script_value(hidden)]
//!     Debug = 2,
//! }
//! ```

use std::result::Result as StdResult;

use proc_macro2::TokenStream;
use quote::quote;
use syn::{
    Data, DeriveInput, Expr, ExprLit, Fields, Lit, Meta, punctuated::Punctuated,
    spanned::Spanned,
};

/// Internal result type for macro parsing.
type Result<T> = StdResult<T, syn::Error>;

#[derive(Debug, Default)]
/// Metadata parsed from a #[script_enum(...)] attribute.
struct EnumAttrs {
    /// Exposed global name override.
    name: Option<String>,
    /// Description override.
    description: Option<String>,
}

#[derive(Debug, Default)]
/// Metadata parsed from a #[script_value(...)] attribute.
struct ValueAttrs {
    /// Description override.
    description: Option<String>,
    /// Whether the member is hidden from scripts.
    hidden: bool,
}

#[derive(Debug)]
/// A variant of the enum being derived.
struct EnumMember {
    /// Variant identifier.
    ident: syn::Ident,
    /// Resolved description, if any.
    description: Option<String>,
    /// Whether the member is hidden.
    hidden: bool,
}

/// Collect and normalize doc comment strings from attributes.
fn extract_doc_comment(attrs: &[syn::Attribute]) -> String {
    let mut docs = Vec::new();
    for attr in attrs {
        if attr.path().is_ident("doc")
            && let Meta::NameValue(meta) = &attr.meta
            && let Expr::Lit(ExprLit {
                lit: Lit::Str(s), ..
            }) = &meta.value
        {
            let doc = s.value();
            let doc = doc.trim();
            if !doc.is_empty() {
                docs.push(doc.to_string());
            }
        }
    }
    docs.join("\n")
}

/// Parse a boolean literal from an expression.
fn parse_bool_lit(expr: &Expr) -> Result<bool> {
    if let Expr::Lit(ExprLit {
        lit: Lit::Bool(b), ..
    }) = expr
    {
        Ok(b.value())
    } else {
        Err(syn::Error::new(expr.span(), "expected a boolean literal"))
    }
}

/// Parse a string literal from an expression.
fn parse_string_lit(expr: &Expr) -> Result<String> {
    if let Expr::Lit(ExprLit {
        lit: Lit::Str(s), ..
    }) = expr
    {
        Ok(s.value())
    } else {
        Err(syn::Error::new(expr.span(), "expected a string literal"))
    }
}

/// Parse the comma separated metas of every attribute named `name`.
fn attr_metas(attrs: &[syn::Attribute], name: &str) -> Result<Vec<Meta>> {
    let mut metas = Vec::new();
    for attr in attrs {
        if !attr.path().is_ident(name) {
            continue;
        }
        let nested =
            attr.parse_args_with(Punctuated::<Meta, syn::Token![,]>::parse_terminated)?;
        metas.extend(nested);
    }
    Ok(metas)
}

/// Parse enum metadata from #[script_enum(...)].
fn parse_enum_attrs(attrs: &[syn::Attribute]) -> Result<EnumAttrs> {
    let mut enum_attrs = EnumAttrs::default();
    for meta in attr_metas(attrs, "script_enum")? {
        match &meta {
            Meta::NameValue(nv) if nv.path.is_ident("name") => {
                enum_attrs.name = Some(parse_string_lit(&nv.value)?);
            }
            Meta::NameValue(nv) if nv.path.is_ident("description") => {
                enum_attrs.description = Some(parse_string_lit(&nv.value)?);
            }
            _ => {
                return Err(syn::Error::new(
                    meta.span(),
                    "unsupported script_enum argument; expected `name` or `description`",
                ));
            }
        }
    }
    Ok(enum_attrs)
}

/// Parse member metadata from #[script_value(...)].
fn parse_value_attrs(attrs: &[syn::Attribute]) -> Result<ValueAttrs> {
    let mut value_attrs = ValueAttrs::default();
    for meta in attr_metas(attrs, "script_value")? {
        match &meta {
            Meta::Path(path) if path.is_ident("hidden") => value_attrs.hidden = true,
            Meta::NameValue(nv) if nv.path.is_ident("hidden") => {
                value_attrs.hidden = parse_bool_lit(&nv.value)?;
            }
            Meta::NameValue(nv) if nv.path.is_ident("description") => {
                value_attrs.description = Some(parse_string_lit(&nv.value)?);
            }
            _ => {
                return Err(syn::Error::new(
                    meta.span(),
                    "unsupported script_value argument; expected `description` or `hidden`",
                ));
            }
        }
    }
    Ok(value_attrs)
}

/// Explicit description, falling back to the doc comment.
fn resolve_description(explicit: Option<String>, attrs: &[syn::Attribute]) -> Option<String> {
    explicit.or_else(|| {
        let docs = extract_doc_comment(attrs);
        (!docs.is_empty()).then_some(docs)
    })
}

/// Validate the input and collect its members.
fn parse_members(input: &DeriveInput) -> Result<Vec<EnumMember>> {
    let Data::Enum(data) = &input.data else {
        return Err(syn::Error::new(
            input.ident.span(),
            "ScriptEnum can only be derived for enums",
        ));
    };
    if !input.generics.params.is_empty() {
        return Err(syn::Error::new(
            input.generics.span(),
            "ScriptEnum cannot be derived for generic enums",
        ));
    }

    data.variants
        .iter()
        .map(|variant| {
            if !matches!(variant.fields, Fields::Unit) {
                return Err(syn::Error::new(
                    variant.span(),
                    "ScriptEnum variants must not carry fields",
                ));
            }
            let attrs = parse_value_attrs(&variant.attrs)?;
            Ok(EnumMember {
                ident: variant.ident.clone(),
                description: resolve_description(attrs.description, &variant.attrs),
                hidden: attrs.hidden,
            })
        })
        .collect()
}

/// Expand the derive into a `ScriptEnum` impl.
fn inner_script_enum(input: &DeriveInput) -> Result<TokenStream> {
    let members = parse_members(input)?;
    let attrs = parse_enum_attrs(&input.attrs)?;
    let ident = &input.ident;
    let name = attrs.name.unwrap_or_else(|| ident.to_string());

    let description = resolve_description(attrs.description, &input.attrs).map(|d| {
        quote! { .description(#d) }
    });

    let values = members.iter().map(|member| {
        let variant = &member.ident;
        let member_name = variant.to_string();
        let hidden = member.hidden;
        let description = member.description.as_ref().map(|d| {
            quote! { .description(#d) }
        });
        quote! {
            .value(
                ::scripthost::EnumValueDescriptor::new(#member_name, #ident::#variant as i64)
                    #description
                    .hidden(#hidden)
            )
        }
    });

    Ok(quote! {
        impl ::scripthost::ScriptEnum for #ident {
            fn descriptor() -> ::scripthost::EnumDescriptor {
                ::scripthost::EnumDescriptor::new(#name)
                    #description
                    #(#values)*
            }
        }
    })
}

/// Derive `scripthost::ScriptEnum` for a fieldless enum.
#[proc_macro_derive(ScriptEnum, attributes(script_enum, script_value))]
pub fn derive_script_enum(input: proc_macro::TokenStream) -> proc_macro::TokenStream {
    let input = syn::parse_macro_input!(input as DeriveInput);
    match inner_script_enum(&input) {
        Ok(tokens) => tokens.into(),
        Err(e) => e.to_compile_error().into(),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_doc_extraction() {
        let attrs: Vec<syn::Attribute> = vec![
            syn::parse_quote! { #[doc = " First line"] },
            syn::parse_quote! { #[doc = ""] },
            syn::parse_quote! { #[doc = " Second line"] },
        ];
        assert_eq!(extract_doc_comment(&attrs), "First line\nSecond line");
    }

    #[test]
    fn test_enum_attrs() {
        let attrs: Vec<syn::Attribute> = vec![syn::parse_quote! {
            #[script_enum(name = "Colour", description = "Paint")]
        }];
        let parsed = parse_enum_attrs(&attrs).unwrap();
        assert_eq!(parsed.name.as_deref(), Some("Colour"));
        assert_eq!(parsed.description.as_deref(), Some("Paint"));
    }

    #[test]
    fn test_value_attrs_hidden_forms() {
        let bare: Vec<syn::Attribute> = vec![syn::parse_quote! { #[script_value(hidden)] }];
        assert!(parse_value_attrs(&bare).unwrap().hidden);

        let explicit: Vec<syn::Attribute> =
            vec![syn::parse_quote! { #[script_value(hidden = false, description = "x")] }];
        let parsed = parse_value_attrs(&explicit).unwrap();
        assert!(!parsed.hidden);
        assert_eq!(parsed.description.as_deref(), Some("x"));
    }

    #[test]
    fn test_unknown_argument_rejected() {
        let attrs: Vec<syn::Attribute> = vec![syn::parse_quote! { #[script_value(secret)] }];
        let err = parse_value_attrs(&attrs).unwrap_err();
        assert!(err.to_string().contains("unsupported script_value argument"));
    }

    #[test]
    fn test_members_with_docs() {
        let input: DeriveInput = syn::parse_quote! {
            enum Mode {
                /// Normal play
                Play = 1,
                #[script_value(hidden, description = "internal")]
                Debug = 9,
            }
        };
        let members = parse_members(&input).unwrap();
        assert_eq!(members.len(), 2);
        assert_eq!(members[0].description.as_deref(), Some("Normal play"));
        assert!(!members[0].hidden);
        assert_eq!(members[1].description.as_deref(), Some("internal"));
        assert!(members[1].hidden);
    }

    #[test]
    fn test_rejects_struct() {
        let input: DeriveInput = syn::parse_quote! { struct NotAnEnum; };
        let err = inner_script_enum(&input).unwrap_err();
        assert!(err.to_string().contains("only be derived for enums"));
    }

    #[test]
    fn test_rejects_data_variants() {
        let input: DeriveInput = syn::parse_quote! {
            enum Shape { Circle(f32), Square }
        };
        let err = inner_script_enum(&input).unwrap_err();
        assert!(err.to_string().contains("must not carry fields"));
    }

    #[test]
    fn test_expansion_mentions_descriptor() {
        let input: DeriveInput = syn::parse_quote! {
            #[script_enum(name = "Color")]
            enum Color { Red = 0, Green = 1 }
        };
        let tokens = inner_script_enum(&input).unwrap().to_string();
        assert!(tokens.contains("impl :: scripthost :: ScriptEnum for Color"));
        assert!(tokens.contains("Color :: Green as i64"));
    }
}
