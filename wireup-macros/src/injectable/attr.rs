use syn::{
    parse::{Parse, ParseStream},
    Attribute, LitStr,
};

use crate::attr_parsing::{parse_attrs, Combine};

#[derive(Default)]
pub(super) struct InjectArgs {
    pub(super) instance_id: Option<LitStr>,
}

impl Parse for InjectArgs {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        if input.is_empty() {
            return Ok(Self::default());
        }

        let instance_id: LitStr = input.parse()?;
        if instance_id.value().is_empty() {
            return Err(syn::Error::new_spanned(instance_id, "instance id can't be empty"));
        }
        if !input.is_empty() {
            return Err(input.error("unexpected attribute"));
        }

        Ok(Self {
            instance_id: Some(instance_id),
        })
    }
}

impl Combine for InjectArgs {
    fn combine(self, other: Self) -> syn::Result<Self> {
        match (self.instance_id, other.instance_id) {
            (Some(_), Some(second)) => Err(syn::Error::new_spanned(second, "instance id specified more than once")),
            (first, second) => Ok(Self {
                instance_id: first.or(second),
            }),
        }
    }
}

pub(super) fn parse_field_attrs(attrs: &[Attribute]) -> Option<syn::Result<InjectArgs>> {
    parse_attrs("inject", attrs)
}
