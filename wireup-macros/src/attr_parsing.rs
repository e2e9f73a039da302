use syn::{parse::Parse, Attribute, Meta};

pub(crate) trait Combine: Sized {
    fn combine(self, other: Self) -> syn::Result<Self>;
}

/// Parses and combines every `#[ident]` / `#[ident(...)]` attribute. A bare `#[ident]` parses as `T::default()`.
pub(crate) fn parse_attrs<T>(ident: &str, attrs: &[Attribute]) -> Option<syn::Result<T>>
where
    T: Combine + Parse + Default,
{
    let mut iter = attrs.iter().filter(|attr| attr.meta.path().is_ident(ident)).map(|attr| match &attr.meta {
        Meta::Path(_) => Ok(T::default()),
        Meta::List(_) => attr.parse_args::<T>(),
        Meta::NameValue(_) => Err(syn::Error::new_spanned(attr, "expected `#[inject]` or `#[inject(\"id\")]`")),
    });

    let first = match iter.next()? {
        Ok(first) => first,
        Err(err) => return Some(Err(err)),
    };

    Some(iter.try_fold(first, |out, next| out.combine(next?)))
}
