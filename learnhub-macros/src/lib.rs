//! Procedural macros for LearnHub
//!
//! This crate provides macros to reduce boilerplate in the LearnHub backend:
//!
//! - `#[derive(EntitySchema)]` - Generate the static column metadata and
//!   filter/search/sort allow-lists of an entity type

use convert_case::{Case, Casing};
use proc_macro::TokenStream;
use proc_macro2::Span;
use quote::quote;
use syn::ext::IdentExt;
use syn::{
    parse_macro_input, Data, DeriveInput, Fields, GenericArgument, Ident, LitStr, PathArguments,
    Type,
};

/// Generate an `EntitySchema` implementation from an annotated struct.
///
/// # Usage
///
/// ```ignore
/// #[derive(EntitySchema, sqlx::FromRow)]
/// #[entity(table = "courses", default_sort = "created_at", default_dir = "desc")]
/// pub struct Course {
///     #[primary_key]
///     #[filterable]
///     #[sortable]
///     pub id: i64,
///
///     #[searchable]
///     #[sortable]
///     pub name: String,
///
///     #[sqlx(skip)]
///     #[relations]
///     pub relations: LoadedRelations,
/// }
/// ```
///
/// # Generated Code
///
/// - `const META: EntityMeta` with the table name, the snake_case type name
///   (used for `<type>_resource` field selections), every column with its
///   storage kind, and the searchable/filterable/sortable allow-lists
/// - `column_value`, a match over the declared columns
/// - `loaded` / `loaded_mut` accessors for the `#[relations]` field
#[proc_macro_derive(
    EntitySchema,
    attributes(entity, primary_key, searchable, filterable, sortable, relations)
)]
pub fn derive_entity_schema(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match expand_entity_schema(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

/// Struct-level `#[entity(...)]` options
struct EntityOptions {
    table: String,
    default_sort: String,
    default_dir: String,
}

impl EntityOptions {
    fn parse(input: &DeriveInput) -> syn::Result<Self> {
        let mut table = None;
        let mut default_sort = "created_at".to_string();
        let mut default_dir = "desc".to_string();

        for attr in input.attrs.iter().filter(|a| a.path().is_ident("entity")) {
            attr.parse_nested_meta(|meta| {
                let value: LitStr = meta.value()?.parse()?;
                if meta.path.is_ident("table") {
                    table = Some(value.value());
                } else if meta.path.is_ident("default_sort") {
                    default_sort = value.value();
                } else if meta.path.is_ident("default_dir") {
                    default_dir = value.value().to_lowercase();
                } else {
                    return Err(meta.error("unsupported entity option"));
                }
                Ok(())
            })?;
        }

        let table = table.ok_or_else(|| {
            syn::Error::new_spanned(&input.ident, "missing #[entity(table = \"...\")]")
        })?;

        if default_dir != "asc" && default_dir != "desc" {
            return Err(syn::Error::new_spanned(
                &input.ident,
                "default_dir must be \"asc\" or \"desc\"",
            ));
        }

        Ok(Self {
            table,
            default_sort,
            default_dir,
        })
    }
}

/// A persisted column collected from a struct field
struct ColumnField {
    ident: Ident,
    name: String,
    kind: &'static str,
    primary_key: bool,
    searchable: bool,
    filterable: bool,
    sortable: bool,
}

fn expand_entity_schema(input: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let options = EntityOptions::parse(input)?;
    let struct_name = &input.ident;

    let Data::Struct(data) = &input.data else {
        return Err(syn::Error::new_spanned(
            struct_name,
            "EntitySchema can only be derived for structs",
        ));
    };
    let Fields::Named(fields) = &data.fields else {
        return Err(syn::Error::new_spanned(
            struct_name,
            "EntitySchema requires named fields",
        ));
    };

    let mut columns = Vec::new();
    let mut relations_field = None;

    for field in &fields.named {
        let Some(ident) = field.ident.clone() else {
            continue;
        };
        let has = |name: &str| field.attrs.iter().any(|a| a.path().is_ident(name));

        if has("relations") {
            relations_field = Some(ident);
            continue;
        }

        let kind = column_kind(&field.ty);
        columns.push(ColumnField {
            name: ident.unraw().to_string(),
            ident,
            kind,
            primary_key: has("primary_key"),
            searchable: has("searchable"),
            filterable: has("filterable"),
            sortable: has("sortable"),
        });
    }

    let relations_field = relations_field.ok_or_else(|| {
        syn::Error::new_spanned(struct_name, "missing a #[relations] LoadedRelations field")
    })?;

    let primary_key = columns
        .iter()
        .find(|c| c.primary_key)
        .map(|c| c.name.clone())
        .unwrap_or_else(|| "id".to_string());

    if !columns.iter().any(|c| c.name == options.default_sort) {
        return Err(syn::Error::new_spanned(
            struct_name,
            format!("default_sort column `{}` is not a field", options.default_sort),
        ));
    }

    let type_name = struct_name.to_string().to_case(Case::Snake);
    let table = &options.table;
    let default_sort = &options.default_sort;
    let default_dir = if options.default_dir == "asc" {
        quote! { crate::query::SortDirection::Asc }
    } else {
        quote! { crate::query::SortDirection::Desc }
    };

    let column_defs = columns.iter().map(|c| {
        let name = &c.name;
        let kind = Ident::new(c.kind, Span::call_site());
        quote! {
            crate::query::ColumnDef {
                name: #name,
                kind: crate::query::ColumnKind::#kind,
            }
        }
    });

    let names_where = |pred: fn(&ColumnField) -> bool| {
        let names: Vec<&String> = columns.iter().filter(|c| pred(c)).map(|c| &c.name).collect();
        quote! { &[#(#names),*] }
    };
    let searchable = names_where(|c| c.searchable);
    let filterable = names_where(|c| c.filterable);
    let sortable = names_where(|c| c.sortable);

    let value_arms = columns.iter().map(|c| {
        let name = &c.name;
        let ident = &c.ident;
        quote! {
            #name => Some(crate::query::SqlValue::from(self.#ident.clone())),
        }
    });

    Ok(quote! {
        impl crate::query::EntitySchema for #struct_name {
            const META: crate::query::EntityMeta = crate::query::EntityMeta {
                type_name: #type_name,
                table: #table,
                primary_key: #primary_key,
                columns: &[#(#column_defs),*],
                searchable: #searchable,
                filterable: #filterable,
                sortable: #sortable,
                default_sort: #default_sort,
                default_direction: #default_dir,
            };

            fn column_value(&self, column: &str) -> Option<crate::query::SqlValue> {
                match column {
                    #(#value_arms)*
                    _ => None,
                }
            }

            fn loaded(&self) -> &crate::query::LoadedRelations {
                &self.#relations_field
            }

            fn loaded_mut(&mut self) -> &mut crate::query::LoadedRelations {
                &mut self.#relations_field
            }
        }
    })
}

/// Map a Rust field type to its storage kind, unwrapping `Option<T>`.
fn column_kind(ty: &Type) -> &'static str {
    let Type::Path(path) = ty else {
        return "Text";
    };
    let Some(segment) = path.path.segments.last() else {
        return "Text";
    };

    // Option<T> stores as T
    if segment.ident == "Option" {
        if let PathArguments::AngleBracketed(args) = &segment.arguments {
            if let Some(GenericArgument::Type(inner)) = args.args.first() {
                return column_kind(inner);
            }
        }
        return "Text";
    }

    let kind = match segment.ident.to_string().as_str() {
        "i8" | "i16" | "i32" | "i64" | "u8" | "u16" | "u32" | "u64" => "Integer",
        "f32" | "f64" => "Real",
        "bool" => "Boolean",
        "DateTime" | "NaiveDateTime" => "Timestamp",
        _ => "Text",
    };
    kind
}
