//! Parsing of `#[settings(...)]` and `#[setting(...)]` attributes.

use heck::{
    ToKebabCase, ToLowerCamelCase, ToShoutySnakeCase, ToSnakeCase, ToUpperCamelCase,
};
use syn::ext::IdentExt;
use syn::{Attribute, Field, Lit, LitStr, Path};

#[derive(Clone, Copy)]
pub(crate) enum RenameRule {
    Pascal,
    Camel,
    Snake,
    ScreamingSnake,
    Kebab,
    Lower,
    Upper,
}

impl RenameRule {
    fn parse(lit: &LitStr) -> syn::Result<Self> {
        let rule = match lit.value().as_str() {
            "PascalCase" => Self::Pascal,
            "camelCase" => Self::Camel,
            "snake_case" => Self::Snake,
            "SCREAMING_SNAKE_CASE" => Self::ScreamingSnake,
            "kebab-case" => Self::Kebab,
            "lowercase" => Self::Lower,
            "UPPERCASE" => Self::Upper,
            other => {
                return Err(syn::Error::new(
                    lit.span(),
                    format!("unknown rename_all rule `{other}`"),
                ));
            }
        };
        Ok(rule)
    }

    pub(crate) fn apply(self, ident: &str) -> String {
        match self {
            Self::Pascal => ident.to_upper_camel_case(),
            Self::Camel => ident.to_lower_camel_case(),
            Self::Snake => ident.to_snake_case(),
            Self::ScreamingSnake => ident.to_shouty_snake_case(),
            Self::Kebab => ident.to_kebab_case(),
            Self::Lower => ident.to_lowercase(),
            Self::Upper => ident.to_uppercase(),
        }
    }
}

/// Options declared on the struct.
pub(crate) struct ContainerAttrs {
    pub(crate) rename_all: Option<RenameRule>,
    pub(crate) krate: Path,
}

impl ContainerAttrs {
    pub(crate) fn from_attrs(attrs: &[Attribute]) -> syn::Result<Self> {
        let mut rename_all = None;
        let mut krate = None;

        for attr in attrs.iter().filter(|attr| attr.path().is_ident("settings")) {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("rename_all") {
                    let lit: LitStr = meta.value()?.parse()?;
                    rename_all = Some(RenameRule::parse(&lit)?);
                    Ok(())
                } else if meta.path.is_ident("crate") {
                    let lit: LitStr = meta.value()?.parse()?;
                    krate = Some(lit.parse::<Path>()?);
                    Ok(())
                } else {
                    Err(meta.error("unsupported settings attribute"))
                }
            })?;
        }

        Ok(Self {
            rename_all,
            krate: match krate {
                Some(path) => path,
                None => syn::parse_quote!(::setthings),
            },
        })
    }
}

/// Options declared on one field.
pub(crate) struct FieldAttrs {
    pub(crate) node: bool,
    pub(crate) skip: bool,
    pub(crate) name: Option<LitStr>,
    pub(crate) default: Option<LitStr>,
}

impl FieldAttrs {
    pub(crate) fn from_field(field: &Field) -> syn::Result<Self> {
        let mut parsed = Self {
            node: false,
            skip: false,
            name: None,
            default: None,
        };

        for attr in field.attrs.iter().filter(|attr| attr.path().is_ident("setting")) {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("node") {
                    parsed.node = true;
                    Ok(())
                } else if meta.path.is_ident("skip") {
                    parsed.skip = true;
                    Ok(())
                } else if meta.path.is_ident("name") || meta.path.is_ident("rename") {
                    let lit: LitStr = meta.value()?.parse()?;
                    if lit.value().is_empty() {
                        return Err(syn::Error::new(lit.span(), "setting name cannot be empty"));
                    }
                    parsed.name = Some(lit);
                    Ok(())
                } else if meta.path.is_ident("default") {
                    let lit: Lit = meta.value()?.parse()?;
                    parsed.default = Some(default_literal(&lit)?);
                    Ok(())
                } else {
                    Err(meta.error("unsupported setting attribute"))
                }
            })?;
        }

        if parsed.node && parsed.default.is_some() {
            return Err(syn::Error::new_spanned(
                field,
                "a nested settings node cannot declare a default",
            ));
        }

        Ok(parsed)
    }
}

/// Declared defaults are kept in their invariant string form; numeric and
/// boolean literals are accepted as shorthand.
fn default_literal(lit: &Lit) -> syn::Result<LitStr> {
    let text = match lit {
        Lit::Str(value) => return Ok(value.clone()),
        Lit::Int(value) => value.base10_digits().to_owned(),
        Lit::Float(value) => value.base10_digits().to_owned(),
        Lit::Bool(value) => value.value.to_string(),
        Lit::Char(value) => value.value().to_string(),
        _ => {
            return Err(syn::Error::new_spanned(
                lit,
                "default must be a string, numeric, boolean or char literal",
            ));
        }
    };
    Ok(LitStr::new(&text, lit.span()))
}

/// Effective identifier of a field before any explicit override.
pub(crate) fn field_identifier(field: &syn::Ident, rule: Option<RenameRule>) -> String {
    let raw = field.unraw().to_string();
    match rule {
        Some(rule) => rule.apply(&raw),
        None => raw,
    }
}
