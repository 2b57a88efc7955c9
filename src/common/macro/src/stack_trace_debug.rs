// Copyright 2023 Greptime Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! implement `::common_error::ext::StackError`

use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::spanned::Spanned;
use syn::{Fields, Ident, ItemEnum, Variant};

pub fn stack_trace_style_impl(args: TokenStream2, input: TokenStream2) -> TokenStream2 {
    if !args.is_empty() {
        return syn::Error::new(args.span(), "stack_trace_debug doesn't take arguments")
            .to_compile_error();
    }

    let error_enum_definition: ItemEnum = match syn::parse2(input.clone()) {
        Ok(item) => item,
        Err(e) => return e.to_compile_error(),
    };
    let enum_name = &error_enum_definition.ident;
    let variants = error_enum_definition
        .variants
        .iter()
        .map(ErrorVariant::from_enum_variant)
        .collect::<Vec<_>>();

    let debug_fmt_arms = variants.iter().map(|v| v.to_debug_match_arm(enum_name));
    let next_arms = variants.iter().map(|v| v.to_next_match_arm(enum_name));
    let (impl_generics, ty_generics, where_clause) =
        error_enum_definition.generics.split_for_impl();

    quote! {
        #input

        impl #impl_generics ::common_error::ext::StackError for #enum_name #ty_generics #where_clause {
            fn debug_fmt(&self, layer: usize, buf: &mut Vec<String>) {
                match self {
                    #(#debug_fmt_arms)*
                }
            }

            fn next(&self) -> Option<&dyn ::common_error::ext::StackError> {
                match self {
                    #(#next_arms)*
                }
            }
        }

        impl #impl_generics ::std::fmt::Debug for #enum_name #ty_generics #where_clause {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                let mut buf = vec![];
                ::common_error::ext::StackError::debug_fmt(self, 0, &mut buf);
                write!(f, "{}", buf.join("\n"))
            }
        }
    }
}

/// The fields of one error variant that take part in the stack trace.
struct ErrorVariant {
    name: Ident,
    has_location: bool,
    has_source: bool,
    has_external_cause: bool,
}

impl ErrorVariant {
    fn from_enum_variant(variant: &Variant) -> Self {
        let mut has_location = false;
        let mut has_source = false;
        let mut has_external_cause = false;

        if let Fields::Named(fields) = &variant.fields {
            for field in &fields.named {
                match field.ident.as_ref().map(|ident| ident.to_string()).as_deref() {
                    Some("location") => has_location = true,
                    Some("source") => has_source = true,
                    Some("error") => has_external_cause = true,
                    _ => {}
                }
            }
        }

        Self {
            name: variant.ident.clone(),
            has_location,
            has_source,
            has_external_cause,
        }
    }

    fn to_debug_match_arm(&self, enum_name: &Ident) -> TokenStream2 {
        let name = &self.name;
        match (self.has_location, self.has_source, self.has_external_cause) {
            (true, true, _) => quote! {
                #enum_name::#name { location, source, .. } => {
                    buf.push(format!("{}: {}, at {}", layer, self, location));
                    ::common_error::ext::StackError::debug_fmt(source, layer + 1, buf);
                }
            },
            (true, false, true) => quote! {
                #enum_name::#name { location, error, .. } => {
                    buf.push(format!("{}: {}, at {}", layer, self, location));
                    buf.push(format!("{}: {:?}", layer + 1, error));
                }
            },
            (true, false, false) => quote! {
                #enum_name::#name { location, .. } => {
                    buf.push(format!("{}: {}, at {}", layer, self, location));
                }
            },
            (false, true, _) => quote! {
                #enum_name::#name { source, .. } => {
                    buf.push(format!("{}: {}", layer, self));
                    ::common_error::ext::StackError::debug_fmt(source, layer + 1, buf);
                }
            },
            (false, false, true) => quote! {
                #enum_name::#name { error, .. } => {
                    buf.push(format!("{}: {}", layer, self));
                    buf.push(format!("{}: {:?}", layer + 1, error));
                }
            },
            (false, false, false) => quote! {
                #enum_name::#name { .. } => {
                    buf.push(format!("{}: {}", layer, self));
                }
            },
        }
    }

    fn to_next_match_arm(&self, enum_name: &Ident) -> TokenStream2 {
        let name = &self.name;
        if self.has_source {
            quote! {
                #enum_name::#name { source, .. } => {
                    Some(source as &dyn ::common_error::ext::StackError)
                }
            }
        } else {
            quote! {
                #enum_name::#name { .. } => None,
            }
        }
    }
}
