//! The `#[service]` attribute.
//!
//! Reads the helper attributes on the methods of an `impl` block, strips them,
//! and emits an `impl ::hookline::Service` next to the block.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{
    Attribute, Expr, FnArg, Ident, ImplItem, ImplItemFn, ItemImpl, LitInt, LitStr, Token,
    bracketed,
    parse::{Parse, ParseStream},
    parse_macro_input,
    punctuated::Punctuated,
};

const SUBSCRIBE: &str = "subscribe";
const HANDLER: &str = "handler";
const HOOK: &str = "hook";
const ON_CONNECTED: &str = "on_connected";

/// Arguments of `#[subscribe(...)]`.
struct SubscribeArgs {
    subject: LitStr,
    hooks: Vec<LitStr>,
    data_quota: Option<LitInt>,
    queue: Option<LitStr>,
    max_messages: Option<LitInt>,
    meta: Option<Expr>,
}

impl Parse for SubscribeArgs {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let subject: LitStr = input.parse()?;
        if subject.value().trim().is_empty() {
            return Err(syn::Error::new(subject.span(), "subject must not be empty"));
        }

        let mut args = SubscribeArgs {
            subject,
            hooks: Vec::new(),
            data_quota: None,
            queue: None,
            max_messages: None,
            meta: None,
        };

        while !input.is_empty() {
            input.parse::<Token![,]>()?;
            if input.is_empty() {
                break;
            }

            let ident: Ident = input.parse()?;
            input.parse::<Token![=]>()?;

            match ident.to_string().as_str() {
                "hooks" => {
                    let content;
                    bracketed!(content in input);
                    let hooks = Punctuated::<LitStr, Token![,]>::parse_terminated(&content)?;
                    args.hooks = hooks.into_iter().collect();
                }
                "data_quota" => args.data_quota = Some(input.parse()?),
                "queue" => args.queue = Some(input.parse()?),
                "max_messages" => args.max_messages = Some(input.parse()?),
                "meta" => args.meta = Some(input.parse()?),
                other => {
                    return Err(syn::Error::new(
                        ident.span(),
                        format!("unknown attribute: {}", other),
                    ));
                }
            }
        }

        Ok(args)
    }
}

impl SubscribeArgs {
    fn declaration(&self, handler: &str) -> TokenStream2 {
        let subject = &self.subject;
        let hooks = &self.hooks;
        let data_quota = self.data_quota.as_ref().map(|q| quote! { .data_quota(#q) });
        let queue = self.queue.as_ref().map(|q| quote! { .queue_group(#q) });
        let max_messages = self.max_messages.as_ref().map(|m| quote! { .max_messages(#m) });
        let meta = self.meta.as_ref().map(|m| quote! { .meta(#m) });

        quote! {
            ::hookline::Declaration::new(
                #subject,
                #handler,
                ::hookline::BindingConfig::new()
                    #(.hook(#hooks))*
                    #data_quota
                    #queue
                    #max_messages
                    #meta,
            )
        }
    }
}

/// What the helper attributes on one method asked for.
#[derive(Default)]
struct Roles {
    subscriptions: Vec<SubscribeArgs>,
    handler: bool,
    hook: bool,
    on_connected: bool,
}

fn is_helper(attr: &Attribute) -> bool {
    [SUBSCRIBE, HANDLER, HOOK, ON_CONNECTED]
        .iter()
        .any(|name| attr.path().is_ident(name))
}

fn read_roles(method: &ImplItemFn) -> syn::Result<Roles> {
    let mut roles = Roles::default();
    for attr in method.attrs.iter().filter(|attr| is_helper(attr)) {
        if attr.path().is_ident(SUBSCRIBE) {
            roles.subscriptions.push(attr.parse_args()?);
            continue;
        }
        attr.meta.require_path_only()?;
        if attr.path().is_ident(HANDLER) {
            roles.handler = true;
        } else if attr.path().is_ident(HOOK) {
            roles.hook = true;
        } else {
            roles.on_connected = true;
        }
    }

    let is_handler = roles.handler || !roles.subscriptions.is_empty();
    if roles.hook && is_handler {
        return Err(syn::Error::new_spanned(
            &method.sig.ident,
            "a method cannot be both a hook and a handler",
        ));
    }
    if roles.on_connected && (roles.hook || is_handler) {
        return Err(syn::Error::new_spanned(
            &method.sig.ident,
            "an `on_connected` method cannot also be a hook or a handler",
        ));
    }
    Ok(roles)
}

fn require_ref_self(method: &ImplItemFn) -> syn::Result<()> {
    match method.sig.inputs.first() {
        Some(FnArg::Receiver(receiver))
            if receiver.reference.is_some() && receiver.mutability.is_none() =>
        {
            Ok(())
        }
        _ => Err(syn::Error::new_spanned(
            &method.sig,
            "service methods must take `&self`",
        )),
    }
}

/// `let __table = __table.<kind>("name", closure);`
fn table_entry(method: &ImplItemFn, kind: &str) -> syn::Result<TokenStream2> {
    require_ref_self(method)?;
    if method.sig.inputs.len() != 2 {
        return Err(syn::Error::new_spanned(
            &method.sig.inputs,
            format!("a {} takes `&self` and a `Context`", kind),
        ));
    }

    let name = &method.sig.ident;
    let name_str = name.to_string();
    let register = Ident::new(kind, name.span());
    let call = if method.sig.asyncness.is_some() {
        quote! { __this.#name(ctx).await }
    } else {
        quote! { __this.#name(ctx) }
    };

    Ok(quote! {
        let __table = {
            let __this = ::std::sync::Arc::clone(&self);
            __table.#register(#name_str, move |ctx: ::hookline::Context| {
                let __this = ::std::sync::Arc::clone(&__this);
                async move { #call }
            })
        };
    })
}

fn on_connected_body(method: &ImplItemFn) -> syn::Result<TokenStream2> {
    require_ref_self(method)?;
    let name = &method.sig.ident;
    let args = match method.sig.inputs.len() {
        1 => quote! {},
        2 => quote! { client },
        _ => {
            return Err(syn::Error::new_spanned(
                &method.sig.inputs,
                "an `on_connected` method takes `&self` and optionally the client",
            ));
        }
    };
    let call = if method.sig.asyncness.is_some() {
        quote! { self.#name(#args).await }
    } else {
        quote! { self.#name(#args) }
    };
    Ok(quote! {
        ::std::boxed::Box::pin(async move {
            let _ = &client;
            #call;
        })
    })
}

pub(crate) fn service_impl(attr: TokenStream, item: TokenStream) -> TokenStream {
    if !attr.is_empty() {
        return syn::Error::new(
            proc_macro2::Span::call_site(),
            "`#[service]` takes no arguments",
        )
        .to_compile_error()
        .into();
    }

    let mut input = parse_macro_input!(item as ItemImpl);
    if let Some((_, path, _)) = &input.trait_ {
        return syn::Error::new_spanned(path, "`#[service]` goes on an inherent `impl` block")
            .to_compile_error()
            .into();
    }

    let mut entries = Vec::new();
    let mut declarations = Vec::new();
    let mut on_connected: Option<TokenStream2> = None;
    let mut errors: Option<syn::Error> = None;
    let mut push_error = |err: syn::Error| match &mut errors {
        Some(existing) => existing.combine(err),
        None => errors = Some(err),
    };

    for item in &mut input.items {
        let ImplItem::Fn(method) = item else {
            continue;
        };

        match read_roles(method) {
            Ok(roles) => {
                let name_str = method.sig.ident.to_string();
                if roles.hook {
                    match table_entry(method, HOOK) {
                        Ok(entry) => entries.push(entry),
                        Err(err) => push_error(err),
                    }
                }
                if roles.handler || !roles.subscriptions.is_empty() {
                    match table_entry(method, HANDLER) {
                        Ok(entry) => entries.push(entry),
                        Err(err) => push_error(err),
                    }
                }
                for subscription in &roles.subscriptions {
                    declarations.push(subscription.declaration(&name_str));
                }
                if roles.on_connected {
                    if on_connected.is_some() {
                        push_error(syn::Error::new_spanned(
                            &method.sig.ident,
                            "only one `on_connected` method is allowed",
                        ));
                    } else {
                        match on_connected_body(method) {
                            Ok(body) => on_connected = Some(body),
                            Err(err) => push_error(err),
                        }
                    }
                }
            }
            Err(err) => push_error(err),
        }

        method.attrs.retain(|attr| !is_helper(attr));
    }

    if let Some(errors) = errors {
        let compile_errors = errors.to_compile_error();
        return quote! {
            #input
            #compile_errors
        }
        .into();
    }

    let self_ty = &input.self_ty;
    let (impl_generics, _, where_clause) = input.generics.split_for_impl();

    let on_connected_fn = on_connected.map(|body| {
        quote! {
            fn on_connected(
                &self,
                client: ::std::sync::Arc<dyn ::hookline::BusClient>,
            ) -> ::hookline::BoxFuture<'_, ()> {
                #body
            }
        }
    });

    let expanded = quote! {
        #input

        impl #impl_generics ::hookline::Service for #self_ty #where_clause {
            fn methods(self: ::std::sync::Arc<Self>) -> ::hookline::MethodTable {
                let __table = ::hookline::MethodTable::new();
                #(#entries)*
                __table
            }

            fn bindings(&self) -> ::std::vec::Vec<::hookline::Declaration> {
                ::std::vec![#(#declarations),*]
            }

            #on_connected_fn
        }
    };

    TokenStream::from(expanded)
}
