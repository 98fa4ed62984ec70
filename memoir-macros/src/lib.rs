//! Proc macros for structured model replies.
//!
//! Provides `#[derive(StructuredOutput)]`, which turns a plain struct into a
//! JSON schema plus ready-to-embed prompt instructions, so that the shape we
//! ask the model for and the shape we deserialize stay in one place.
//!
//! # Example
//!
//! ```ignore
//! /// Facts extracted from one interview stage
//! #[derive(StructuredOutput, Deserialize)]
//! #[output(name = "fact_sheet")]
//! struct FactSheet {
//!     /// One atomic statement per entry
//!     facts: Vec<String>,
//!     /// Optional remarks from the extractor
//!     #[output(optional)]
//!     notes: String,
//! }
//! ```

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{parse_macro_input, DeriveInput, Field, Lit, Meta, Type};

/// Derive macro for structured-output descriptions.
///
/// # Attributes
///
/// - `#[output(name = "...")]` - Override the schema name (defaults to snake_case struct name)
/// - `#[output(optional)]` on fields - Mark field as optional in the schema
/// - `#[output(rename = "...")]` on fields - Override the field name in the schema
#[proc_macro_derive(StructuredOutput, attributes(output))]
pub fn derive_structured_output(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand_structured_output(input)
        .unwrap_or_else(|err| err.to_compile_error())
        .into()
}

fn expand_structured_output(input: DeriveInput) -> syn::Result<TokenStream2> {
    let struct_name = &input.ident;
    let schema_name = get_schema_name(&input)?;
    let description = get_doc_comment(&input.attrs);

    let fields = match &input.data {
        syn::Data::Struct(data) => match &data.fields {
            syn::Fields::Named(named) => &named.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    &input,
                    "StructuredOutput only supports structs with named fields",
                ))
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                &input,
                "StructuredOutput only supports structs",
            ))
        }
    };

    let mut property_tokens = Vec::new();
    let mut example_tokens = Vec::new();
    let mut required_fields = Vec::new();

    for field in fields {
        let field_name_str = get_field_name(field)?;
        let field_desc = get_doc_comment(&field.attrs);
        let field_type = &field.ty;

        let type_schema = type_to_schema(field_type);
        let type_example = type_to_example(field_type);

        let desc_token = if field_desc.is_empty() {
            quote! {}
        } else {
            quote! { property["description"] = serde_json::json!(#field_desc); }
        };

        property_tokens.push(quote! {
            {
                let mut property = #type_schema;
                #desc_token
                properties.insert(#field_name_str.to_string(), property);
            }
        });

        example_tokens.push(quote! {
            example.insert(#field_name_str.to_string(), #type_example);
        });

        if !is_field_optional(field) && !is_option_type(field_type) {
            required_fields.push(field_name_str);
        }
    }

    let required_array: Vec<_> = required_fields.iter().map(|s| quote! { #s }).collect();

    Ok(quote! {
        impl #struct_name {
            /// Get the schema name.
            pub fn schema_name() -> &'static str {
                #schema_name
            }

            /// Get the schema description.
            pub fn schema_description() -> &'static str {
                #description
            }

            /// Generate the JSON schema for this reply shape.
            pub fn json_schema() -> serde_json::Value {
                let mut properties = serde_json::Map::new();
                #(#property_tokens)*

                let required: Vec<&str> = vec![#(#required_array),*];

                serde_json::json!({
                    "type": "object",
                    "properties": properties,
                    "required": required
                })
            }

            /// A skeleton value showing the expected shape.
            pub fn example_json() -> serde_json::Value {
                let mut example = serde_json::Map::new();
                #(#example_tokens)*
                serde_json::Value::Object(example)
            }

            /// Prompt text asking the model to reply with this shape only.
            pub fn format_instructions() -> String {
                format!(
                    "Respond with ONLY a JSON object (no markdown, no text outside the JSON). {}\nSchema:\n{}\nShape:\n{}",
                    Self::schema_description(),
                    Self::json_schema(),
                    Self::example_json(),
                )
            }
        }
    })
}

fn get_schema_name(input: &DeriveInput) -> syn::Result<String> {
    for attr in &input.attrs {
        if attr.path().is_ident("output") {
            let meta = attr.parse_args::<Meta>()?;
            if let Meta::NameValue(nv) = meta {
                if nv.path.is_ident("name") {
                    if let syn::Expr::Lit(expr_lit) = &nv.value {
                        if let Lit::Str(s) = &expr_lit.lit {
                            return Ok(s.value());
                        }
                    }
                }
            }
        }
    }

    Ok(to_snake_case(&input.ident.to_string()))
}

fn get_field_name(field: &Field) -> syn::Result<String> {
    for attr in &field.attrs {
        if attr.path().is_ident("output") {
            if let Ok(Meta::NameValue(nv)) = attr.parse_args::<Meta>() {
                if nv.path.is_ident("rename") {
                    if let syn::Expr::Lit(expr_lit) = &nv.value {
                        if let Lit::Str(s) = &expr_lit.lit {
                            return Ok(s.value());
                        }
                    }
                }
            }
        }
    }

    field
        .ident
        .as_ref()
        .map(|ident| ident.to_string())
        .ok_or_else(|| syn::Error::new_spanned(field, "expected a named field"))
}

fn is_field_optional(field: &Field) -> bool {
    field.attrs.iter().any(|attr| {
        attr.path().is_ident("output")
            && matches!(attr.parse_args::<Meta>(), Ok(Meta::Path(path)) if path.is_ident("optional"))
    })
}

fn get_doc_comment(attrs: &[syn::Attribute]) -> String {
    let mut docs = Vec::new();
    for attr in attrs {
        if attr.path().is_ident("doc") {
            if let Meta::NameValue(nv) = &attr.meta {
                if let syn::Expr::Lit(expr_lit) = &nv.value {
                    if let Lit::Str(s) = &expr_lit.lit {
                        docs.push(s.value().trim().to_string());
                    }
                }
            }
        }
    }
    docs.join(" ")
}

fn is_option_type(ty: &Type) -> bool {
    last_segment(ty).is_some_and(|segment| segment.ident == "Option")
}

fn last_segment(ty: &Type) -> Option<&syn::PathSegment> {
    match ty {
        Type::Path(type_path) => type_path.path.segments.last(),
        _ => None,
    }
}

fn inner_type(segment: &syn::PathSegment) -> Option<&Type> {
    if let syn::PathArguments::AngleBracketed(args) = &segment.arguments {
        if let Some(syn::GenericArgument::Type(inner)) = args.args.first() {
            return Some(inner);
        }
    }
    None
}

fn type_to_schema(ty: &Type) -> TokenStream2 {
    let Some(segment) = last_segment(ty) else {
        return quote! { serde_json::json!({}) };
    };

    match segment.ident.to_string().as_str() {
        "String" | "str" => quote! { serde_json::json!({"type": "string"}) },
        "i8" | "i16" | "i32" | "i64" | "isize" | "u8" | "u16" | "u32" | "u64" | "usize" => {
            quote! { serde_json::json!({"type": "integer"}) }
        }
        "f32" | "f64" => quote! { serde_json::json!({"type": "number"}) },
        "bool" => quote! { serde_json::json!({"type": "boolean"}) },
        "Option" => match inner_type(segment) {
            Some(inner) => type_to_schema(inner),
            None => quote! { serde_json::json!({}) },
        },
        "Vec" => match inner_type(segment) {
            Some(inner) => {
                let inner_schema = type_to_schema(inner);
                quote! {
                    serde_json::json!({
                        "type": "array",
                        "items": #inner_schema
                    })
                }
            }
            None => quote! { serde_json::json!({"type": "array"}) },
        },
        _ => quote! { serde_json::json!({"type": "object"}) },
    }
}

fn type_to_example(ty: &Type) -> TokenStream2 {
    let Some(segment) = last_segment(ty) else {
        return quote! { serde_json::Value::Null };
    };

    match segment.ident.to_string().as_str() {
        "String" | "str" => quote! { serde_json::json!("...") },
        "i8" | "i16" | "i32" | "i64" | "isize" | "u8" | "u16" | "u32" | "u64" | "usize" => {
            quote! { serde_json::json!(0) }
        }
        "f32" | "f64" => quote! { serde_json::json!(0.0) },
        "bool" => quote! { serde_json::json!(false) },
        "Option" => match inner_type(segment) {
            Some(inner) => type_to_example(inner),
            None => quote! { serde_json::Value::Null },
        },
        "Vec" => match inner_type(segment) {
            Some(inner) => {
                let inner_example = type_to_example(inner);
                quote! { serde_json::Value::Array(vec![#inner_example]) }
            }
            None => quote! { serde_json::json!([]) },
        },
        _ => quote! { serde_json::json!({}) },
    }
}

fn to_snake_case(s: &str) -> String {
    let mut result = String::new();
    for (i, c) in s.chars().enumerate() {
        if c.is_uppercase() {
            if i > 0 {
                result.push('_');
            }
            result.push(c.to_ascii_lowercase());
        } else {
            result.push(c);
        }
    }
    result
}
