use proc_macro::TokenStream;
use quote::quote;
use syn::parse::Parser;
use syn::{parse_macro_input, ItemFn, LitStr};

#[derive(Clone, Copy)]
enum Format {
    Table,
    Json,
    JsonPretty,
}

impl Format {
    fn to_tokens(self) -> proc_macro2::TokenStream {
        match self {
            Format::Table => quote!(heapguard::Format::Table),
            Format::Json => quote!(heapguard::Format::Json),
            Format::JsonPretty => quote!(heapguard::Format::JsonPretty),
        }
    }
}

#[derive(Clone, Copy)]
enum Target {
    Stderr,
    Stdout,
}

impl Target {
    fn to_tokens(self) -> proc_macro2::TokenStream {
        match self {
            Target::Stderr => quote!(heapguard::Target::Stderr),
            Target::Stdout => quote!(heapguard::Target::Stdout),
        }
    }
}

/// Reports blocks still live on the default tracker when `main` returns.
///
/// Installs a [`ReportGuard`](../heapguard/struct.ReportGuard.html) as the
/// first local of the function, so the report runs after every other local
/// has been dropped. Nothing is reported if the process exits early, e.g.
/// through a fail-fast out-of-memory.
///
/// # Parameters
///
/// * `format` - `"table"`, `"json"` or `"json-pretty"`. Default: the tracker's
///   configured format (`HEAPGUARD_FORMAT`, then `"table"`)
/// * `target` - `"stderr"` (default) or `"stdout"`
///
/// # Examples
///
/// ```rust,ignore
/// #[heapguard::main]
/// fn main() {
///     let _leaked = heapguard::allocate(16);
/// }
/// ```
///
/// ```rust,ignore
/// #[heapguard::main(format = "json", target = "stdout")]
/// fn main() {
///     // Your code here
/// }
/// ```
///
/// Works on async entry points; place it after the runtime attribute:
///
/// ```rust,ignore
/// #[tokio::main]
/// #[heapguard::main]
/// async fn main() {
///     // Your code here
/// }
/// ```
#[proc_macro_attribute]
pub fn main(attr: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as ItemFn);
    let attrs = &input.attrs;
    let vis = &input.vis;
    let sig = &input.sig;
    let block = &input.block;

    let mut format: Option<Format> = None;
    let mut target = Target::Stderr;

    if !attr.is_empty() {
        let parser = syn::meta::parser(|meta| {
            if meta.path.is_ident("format") {
                meta.input.parse::<syn::Token![=]>()?;
                let lit: LitStr = meta.input.parse()?;
                format = Some(match lit.value().as_str() {
                    "table" => Format::Table,
                    "json" => Format::Json,
                    "json-pretty" => Format::JsonPretty,
                    other => {
                        return Err(meta.error(format!(
                            "Unknown format {:?}. Expected one of: \"table\", \"json\", \"json-pretty\"",
                            other
                        )))
                    }
                });
                return Ok(());
            }

            if meta.path.is_ident("target") {
                meta.input.parse::<syn::Token![=]>()?;
                let lit: LitStr = meta.input.parse()?;
                target = match lit.value().as_str() {
                    "stderr" => Target::Stderr,
                    "stdout" => Target::Stdout,
                    other => {
                        return Err(meta.error(format!(
                            "Unknown target {:?}. Expected \"stderr\" or \"stdout\"",
                            other
                        )))
                    }
                };
                return Ok(());
            }

            Err(meta.error("Unknown parameter. Supported: format=\"..\", target=\"..\""))
        });

        if let Err(e) = parser.parse2(proc_macro2::TokenStream::from(attr)) {
            return e.to_compile_error().into();
        }
    }

    let with_format = format.map(|format| {
        let format_token = format.to_tokens();
        quote! { .format(#format_token) }
    });
    let target_token = target.to_tokens();

    let body = quote! {
        let _heapguard = heapguard::ReportGuard::new()
            #with_format
            .target(#target_token);
        #block
    };

    let wrapped_body = if sig.asyncness.is_some() {
        quote! { async { #body }.await }
    } else {
        body
    };

    let output = quote! {
        #(#attrs)*
        #vis #sig {
            #wrapped_body
        }
    };

    output.into()
}
