mod attr;

use crate::injectable::attr::{parse_field_attrs, InjectArgs};

use proc_macro2::TokenStream;
use quote::quote;
use syn::{Data, DeriveInput, Error, Index, Member};

pub(crate) fn expand(input: DeriveInput) -> syn::Result<TokenStream> {
    let Data::Struct(data) = &input.data else {
        return Err(Error::new_spanned(&input.ident, "`Injectable` can only be derived for structs"));
    };

    let mut descriptors = Vec::new();
    for (index, field) in data.fields.iter().enumerate() {
        let Some(args) = parse_field_attrs(&field.attrs) else {
            continue;
        };
        let (member, name) = match &field.ident {
            Some(ident) => (Member::Named(ident.clone()), ident.to_string()),
            None => (Member::Unnamed(Index::from(index)), index.to_string()),
        };
        descriptors.push(descriptor(&member, &name, args?));
    }

    let ident = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    Ok(quote! {
        impl #impl_generics ::wireup::Injectable for #ident #ty_generics #where_clause {
            fn fields(&self) -> ::std::vec::Vec<::wireup::Field<'_>> {
                ::std::vec![#(#descriptors),*]
            }
        }
    })
}

fn descriptor(member: &Member, name: &str, InjectArgs { instance_id }: InjectArgs) -> TokenStream {
    let with_instance_id = instance_id.map(|instance_id| quote! { .with_instance_id(#instance_id) });
    quote! {
        ::wireup::Field::new(#name, &self.#member) #with_instance_id
    }
}
