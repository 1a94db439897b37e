extern crate proc_macro;
use proc_macro::TokenStream;
use quote::quote;
use syn::{Data, DeriveInput, Fields, parse_macro_input};

/// Derives `Encode` for structs with named fields (fields are encoded in
/// declaration order) and for enums with unit variants (encoded as the
/// variant index byte).
#[proc_macro_derive(Encode)]
pub fn encode_derive(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let name = input.ident;

    let encode_impl = match input.data {
        Data::Struct(data) => {
            let fields = match data.fields {
                Fields::Named(fields) => fields.named,
                _ => {
                    return syn::Error::new_spanned(
                        name,
                        "only structs with named fields are supported for Encode",
                    )
                    .to_compile_error()
                    .into();
                }
            };

            let encoding = fields.iter().map(|f| {
                let field_name = &f.ident;
                quote! {
                    encoder = encoder.append(&self.#field_name);
                }
            });

            quote! {
                impl crate::storage::encdec::Encode for #name {
                    fn encode(&self) -> Vec<u8> {
                        let mut encoder = crate::storage::encdec::EncodeBuilder::new();

                        #(#encoding)*

                        encoder.build()
                    }
                }
            }
        }
        Data::Enum(data_enum) => {
            let variant_encodings = data_enum.variants.iter().enumerate().map(
                |(index, variant)| {
                    let variant_name = &variant.ident;
                    let variant_index = index as u8;

                    match &variant.fields {
                        Fields::Unit => {
                            quote! {
                                Self::#variant_name => vec![#variant_index]
                            }
                        }
                        _ => syn::Error::new_spanned(
                            variant_name,
                            "only unit variants are supported for Encode",
                        )
                        .to_compile_error(),
                    }
                },
            );

            quote! {
                impl crate::storage::encdec::Encode for #name {
                    fn encode(&self) -> Vec<u8> {
                        match self {
                            #(#variant_encodings),*
                        }
                    }
                }
            }
        }
        _ => {
            return syn::Error::new_spanned(name, "Encode only supports structs and enums")
                .to_compile_error()
                .into();
        }
    };

    encode_impl.into()
}

/// Derives `Decode`, mirroring the `Encode` derive: named-field structs are
/// decoded field by field, unit enums from the variant index byte.
#[proc_macro_derive(Decode)]
pub fn decode_derive(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let name = input.ident;

    let decode_impl = match input.data {
        Data::Struct(data) => {
            let fields = match data.fields {
                Fields::Named(fields) => fields.named,
                _ => {
                    return syn::Error::new_spanned(
                        &name,
                        "only structs with named fields are supported for Decode",
                    )
                    .to_compile_error()
                    .into();
                }
            };

            let field_names: Vec<_> = fields.iter().map(|f| &f.ident).collect();
            let field_decodes = fields.iter().map(|f| {
                let field_name = &f.ident;
                let field_ty = &f.ty;

                quote! {
                    let (#field_name, rest) =
                        <#field_ty as crate::storage::encdec::Decode>::decode(bytes)?;
                    bytes = rest;
                }
            });

            quote! {
                impl crate::storage::encdec::Decode for #name {
                    fn decode(bytes: &[u8]) -> crate::DecodingResult<Self> {
                        let mut bytes = bytes;

                        #(#field_decodes)*
                        Ok((Self {
                            #(#field_names: #field_names),*
                        }, bytes))
                    }
                }
            }
        }
        Data::Enum(data_enum) => {
            let variant_decodings =
                data_enum
                    .variants
                    .iter()
                    .enumerate()
                    .map(|(index, variant)| {
                        let variant_name = &variant.ident;
                        let variant_index = index as u8;

                        match &variant.fields {
                            Fields::Unit => {
                                quote! {
                                    #variant_index => Ok((Self::#variant_name, bytes))
                                }
                            }
                            _ => syn::Error::new_spanned(
                                variant_name,
                                "only unit variants are supported for Decode",
                            )
                            .to_compile_error(),
                        }
                    });

            quote! {
                impl crate::storage::encdec::Decode for #name {
                    fn decode(bytes: &[u8]) -> crate::DecodingResult<Self> {
                        if bytes.is_empty() {
                            return Err(crate::DecodingError::MalformedInput(
                                "enum insufficient bytes".to_string(),
                                bytes.to_vec(),
                            ));
                        }

                        let kind = bytes[0];
                        let bytes = &bytes[1..];
                        match kind {
                            #(#variant_decodings,)*
                            _ => Err(crate::DecodingError::InvalidEnumKind(bytes.to_vec())),
                        }
                    }
                }
            }
        }
        _ => {
            return syn::Error::new_spanned(name, "Decode only supports structs and enums")
                .to_compile_error()
                .into();
        }
    };

    decode_impl.into()
}
