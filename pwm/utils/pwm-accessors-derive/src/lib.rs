//! # Accessor Derive
//!
//! Generates getters and builder-style setters for plain configuration
//! structs whose fields are `Copy`.

use proc_macro::TokenStream;
use quote::{format_ident, quote};
use syn::{Data, DeriveInput, Fields, LitBool, parse_macro_input, spanned::Spanned};

/// Derive to generate, for each **named** field:
///
/// - `const .<field>(&self) -> Ty`
/// - `.set_<field>(&mut self, value: Ty) -> &mut Self`
/// - `const .with_<field>(mut self, value: Ty) -> Self`
///
/// Field attributes:
///
/// - `#[accessors(skip)]`: generate nothing for the field.
/// - `#[accessors(readonly)]`: generate only the getter.
///
/// Fields that are not skipped must be `Copy`.
///
/// # Example
///
/// ```
/// use pwm_accessors_derive::Accessors;
///
/// #[derive(Accessors)]
/// struct Timing {
///     cycle_us: u32,
///     #[accessors(readonly)]
///     revision: u8,
///     #[accessors(skip)]
///     label: String,
/// }
///
/// let mut t = Timing { cycle_us: 1, revision: 3, label: String::new() };
/// t.set_cycle_us(10).set_cycle_us(20);
/// let t = t.with_cycle_us(42);
/// assert_eq!(t.cycle_us(), 42);
/// assert_eq!(t.revision(), 3);
/// ```
#[proc_macro_derive(Accessors, attributes(accessors))]
pub fn derive_accessors(input: TokenStream) -> TokenStream {
    let DeriveInput {
        ident,
        generics,
        data,
        ..
    } = parse_macro_input!(input as DeriveInput);

    let fields = match data {
        Data::Struct(s) => match s.fields {
            Fields::Named(n) => n.named,
            Fields::Unnamed(u) => {
                return syn::Error::new(u.span(), "Accessors only supports named fields")
                    .to_compile_error()
                    .into();
            }
            Fields::Unit => {
                return syn::Error::new(ident.span(), "Accessors does not apply to unit structs")
                    .to_compile_error()
                    .into();
            }
        },
        _ => {
            return syn::Error::new(ident.span(), "Accessors can only be derived for structs")
                .to_compile_error()
                .into();
        }
    };

    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();

    let mut methods = Vec::new();

    for field in fields {
        let Some(fname) = &field.ident else { continue };
        let mode = field_mode(&field.attrs);
        if mode == Mode::Skip {
            continue;
        }

        let ty = &field.ty;
        methods.push(quote! {
            #[inline]
            #[must_use]
            pub const fn #fname(&self) -> #ty {
                self.#fname
            }
        });

        if mode == Mode::ReadOnly {
            continue;
        }

        let set_name = format_ident!("set_{}", fname);
        let with_name = format_ident!("with_{}", fname);
        methods.push(quote! {
            #[inline]
            pub fn #set_name(&mut self, value: #ty) -> &mut Self {
                self.#fname = value;
                self
            }

            #[inline]
            #[must_use]
            pub const fn #with_name(mut self, value: #ty) -> Self {
                self.#fname = value;
                self
            }
        });
    }

    let expanded = quote! {
        impl #impl_generics #ident #ty_generics #where_clause {
            #(#methods)*
        }
    };

    TokenStream::from(expanded)
}

#[derive(Copy, Clone, Eq, PartialEq)]
enum Mode {
    ReadWrite,
    ReadOnly,
    Skip,
}

fn field_mode(attrs: &[syn::Attribute]) -> Mode {
    let mut mode = Mode::ReadWrite;
    for attr in attrs {
        if !attr.path().is_ident("accessors") {
            continue;
        }

        // Accept #[accessors(skip)], #[accessors(skip = true)] and #[accessors(readonly)]
        let _ = attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("skip") {
                if meta.input.is_empty() {
                    mode = Mode::Skip;
                } else if let Ok(v) = meta.value()?.parse::<LitBool>()
                    && v.value
                {
                    mode = Mode::Skip;
                }
            } else if meta.path.is_ident("readonly") && mode != Mode::Skip {
                mode = Mode::ReadOnly;
            }
            Ok(())
        });
    }
    mode
}
