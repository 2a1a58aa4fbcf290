//! Proc macros for stepler
//!
//! Provides the `#[stepler::test]` attribute macro that runs an async test
//! function with its fixtures injected by parameter name.

use proc_macro::TokenStream;
use quote::{format_ident, quote};
use syn::{FnArg, ItemFn, Pat, PatType, ReturnType, Type};

/// Attribute macro for fixture-driven tests.
///
/// Each parameter names a fixture; its type is the fixture's value type and
/// the parameter is bound to an `Arc` of it. A parameter of reference type
/// (`req: &mut FixtureRequest<'_>`) receives the request itself, for fixtures
/// chosen at runtime.
///
/// # Example
///
/// ```ignore
/// use stepler::client::Volume;
/// use stepler::steps::VolumeSteps;
///
/// #[stepler::test]
/// async fn test_extend(volume: Volume, volume_steps: VolumeSteps) -> Result<(), StepError> {
///     volume_steps.extend_volume(&volume, 2, true).await
/// }
/// ```
///
/// # Registry
///
/// By default fixtures come from `stepler::suite::registry_from_env()`.
/// `#[stepler::test(registry = my_registry)]` uses `my_registry()` instead,
/// which must return a `stepler::fixture::Registry`.
///
/// # What it does
///
/// 1. Opens a session and a test scope, resolving autouse fixtures
/// 2. Resolves each parameter's fixture and runs the body, catching panics
/// 3. Tears down the test scope, then the session, always
/// 4. Fails the test if the body failed or any teardown failed
#[proc_macro_attribute]
pub fn test(attr: TokenStream, item: TokenStream) -> TokenStream {
    let mut args = TestArgs::default();
    let parser = syn::meta::parser(|meta| {
        if meta.path.is_ident("registry") {
            args.registry = Some(meta.value()?.parse()?);
            Ok(())
        } else {
            Err(meta.error("unsupported stepler::test argument, expected `registry = path`"))
        }
    });
    syn::parse_macro_input!(attr with parser);

    let input_fn = syn::parse_macro_input!(item as ItemFn);
    test_impl(&args, &input_fn)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

#[derive(Default)]
struct TestArgs {
    registry: Option<syn::Path>,
}

/// How one parameter of the test function is supplied
enum Injected {
    /// Fixture resolved by name
    Fixture { name: syn::Ident, ty: Box<Type> },
    /// The fixture request itself
    Request,
}

fn injected(arg: &FnArg) -> syn::Result<Injected> {
    let FnArg::Typed(PatType { pat, ty, .. }) = arg else {
        return Err(syn::Error::new_spanned(arg, "stepler tests cannot take self"));
    };
    if matches!(ty.as_ref(), Type::Reference(_)) {
        return Ok(Injected::Request);
    }
    match pat.as_ref() {
        Pat::Ident(ident) => Ok(Injected::Fixture {
            name: ident.ident.clone(),
            ty: ty.clone(),
        }),
        other => Err(syn::Error::new_spanned(
            other,
            "fixture parameters must be plain identifiers naming the fixture",
        )),
    }
}

/// Check if a function has an explicit return type (e.g., `-> Result<...>`)
fn has_result_return(input_fn: &ItemFn) -> bool {
    matches!(&input_fn.sig.output, ReturnType::Type(..))
}

/// Inner implementation that works with `proc_macro2` types for testability
fn test_impl(args: &TestArgs, input_fn: &ItemFn) -> syn::Result<proc_macro2::TokenStream> {
    if input_fn.sig.asyncness.is_none() {
        return Err(syn::Error::new_spanned(
            input_fn.sig.fn_token,
            "stepler tests must be async",
        ));
    }

    let fn_name = &input_fn.sig.ident;
    let fn_vis = &input_fn.vis;
    let fn_attrs = &input_fn.attrs;
    let fn_block = &input_fn.block;
    let fn_inputs = input_fn.sig.inputs.iter();
    let fn_output = &input_fn.sig.output;
    let body_name = format_ident!("__stepler_{}", fn_name);

    let mut resolve = Vec::new();
    let mut call_args = Vec::new();
    for arg in &input_fn.sig.inputs {
        match injected(arg)? {
            Injected::Fixture { name, ty } => {
                let key = name.to_string();
                resolve.push(quote! {
                    let #name = __req.get::<#ty>(#key).await?;
                });
                call_args.push(quote! { #name });
            }
            Injected::Request => call_args.push(quote! { &mut __req }),
        }
    }

    // Fixture parameters arrive as Arc<T>
    let body_inputs = fn_inputs.map(|arg| match arg {
        FnArg::Typed(PatType { pat, ty, .. }) if !matches!(ty.as_ref(), Type::Reference(_)) => {
            quote! { #pat: ::std::sync::Arc<#ty> }
        }
        other => quote! { #other },
    });

    let finish_body = if has_result_return(input_fn) {
        quote! {
            __result.map_err(|e| -> ::stepler::fixture::BoxError { e.to_string().into() })
        }
    } else {
        quote! {
            let () = __result;
            Ok::<(), ::stepler::fixture::BoxError>(())
        }
    };

    let registry = match &args.registry {
        Some(path) => quote! { #path() },
        None => quote! {
            ::stepler::suite::registry_from_env()
                .unwrap_or_else(|e| panic!("stepler: cannot build the fixture registry: {}", e))
        },
    };

    Ok(quote! {
        #(#fn_attrs)*
        #[::stepler::__private::tokio::test(crate = "::stepler::__private::tokio")]
        #fn_vis async fn #fn_name() {
            use ::stepler::__private::futures::FutureExt as _;

            async fn #body_name(#(#body_inputs),*) #fn_output #fn_block

            let registry: ::stepler::fixture::Registry = #registry;
            let mut session = ::stepler::fixture::Session::new(::std::sync::Arc::new(registry));
            let mut scope = session.test_scope();

            let outcome = ::std::panic::AssertUnwindSafe(async {
                scope.setup_autouse().await?;
                let mut __req = scope.request();
                #(#resolve)*
                let __result = #body_name(#(#call_args),*).await;
                #finish_body
            })
            .catch_unwind()
            .await;

            let mut teardown = scope.finish().await;
            teardown.extend(session.finish().await);
            for failure in &teardown {
                eprintln!("[stepler] {}", failure);
            }

            match outcome {
                Ok(Ok(())) if teardown.is_empty() => {}
                Ok(Ok(())) => panic!("{} teardown(s) failed", teardown.len()),
                Ok(Err(e)) => panic!("{}", e),
                Err(panic) => ::std::panic::resume_unwind(panic),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::{has_result_return, injected, test_impl, Injected, TestArgs};
    use syn::ItemFn;

    fn parse_fn(code: &str) -> ItemFn {
        syn::parse_str(code).expect("Failed to parse test function")
    }

    fn expand(code: &str) -> String {
        test_impl(&TestArgs::default(), &parse_fn(code))
            .unwrap()
            .to_string()
    }

    #[test]
    fn test_fixture_param_named_after_binding() {
        let f = parse_fn("async fn test_it(volume_steps: VolumeSteps) {}");
        match injected(&f.sig.inputs[0]).unwrap() {
            Injected::Fixture { name, .. } => assert_eq!(name, "volume_steps"),
            Injected::Request => panic!("expected a fixture"),
        }
    }

    #[test]
    fn test_reference_param_is_request() {
        let f = parse_fn("async fn test_it(req: &mut FixtureRequest<'_>) {}");
        assert!(matches!(
            injected(&f.sig.inputs[0]).unwrap(),
            Injected::Request
        ));
    }

    #[test]
    fn test_destructured_param_rejected() {
        let f = parse_fn("async fn test_it((a, b): (u32, u32)) {}");
        assert!(injected(&f.sig.inputs[0]).is_err());
    }

    #[test]
    fn test_has_result_return() {
        assert!(has_result_return(&parse_fn(
            "async fn test_it() -> Result<(), StepError> { Ok(()) }"
        )));
        assert!(!has_result_return(&parse_fn("async fn test_it() {}")));
    }

    #[test]
    fn test_impl_resolves_fixtures_by_name() {
        let output = expand("async fn test_volume(volume: Volume) { let _ = volume; }");

        assert!(output.contains("tokio :: test"), "Should have tokio::test");
        assert!(output.contains("get :: < Volume > (\"volume\")"));
        assert!(output.contains(":: std :: sync :: Arc < Volume >"));
        assert!(output.contains("registry_from_env"));
        assert!(output.contains("catch_unwind"), "Should wrap with catch_unwind");
        assert!(output.contains("session . finish"), "Should tear down the session");
    }

    #[test]
    fn test_impl_with_result_converts_error() {
        let output = expand("async fn test_it() -> Result<(), StepError> { Ok(()) }");

        assert!(output.contains("map_err"), "Should convert errors for Result return type");
    }

    #[test]
    fn test_impl_with_custom_registry() {
        let args = TestArgs {
            registry: Some(syn::parse_str("crate::fakes::registry").unwrap()),
        };
        let output = test_impl(&args, &parse_fn("async fn test_it() {}"))
            .unwrap()
            .to_string();

        assert!(output.contains("crate :: fakes :: registry ()"));
        assert!(!output.contains("registry_from_env"));
    }

    #[test]
    fn test_impl_rejects_sync_fn() {
        let err = test_impl(&TestArgs::default(), &parse_fn("fn test_it() {}")).unwrap_err();
        assert!(err.to_string().contains("must be async"));
    }

    #[test]
    fn test_impl_preserves_function_name() {
        let output = expand("async fn my_custom_test() {}");

        assert!(output.contains("my_custom_test"), "Should preserve function name");
        assert!(output.contains("__stepler_my_custom_test"));
    }
}
