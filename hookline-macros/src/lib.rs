//! Procedural macros for hookline.

use proc_macro::TokenStream;

mod service;

/// Implement `hookline::Service` for the type of an `impl` block.
///
/// Methods take `&self` plus one `Context` argument and are exposed by their
/// own name. Helper attributes:
///
/// - `#[subscribe("subject", hooks = ["a", "b"], data_quota = 1024, queue = "workers", max_messages = 10, meta = expr)]`:
///   bind the subject to this method. Repeat it to bind several subjects.
/// - `#[handler]`: expose the method as a handler without binding it.
/// - `#[hook]`: expose the method as a hook.
/// - `#[on_connected]`: run the method once the bus connection is up. It may
///   take the `Arc<dyn BusClient>` as its only argument.
///
/// # Example
///
/// ```rust,ignore
/// #[hookline::service]
/// impl Orders {
///     #[hook]
///     async fn auth(&self, ctx: Context) -> bool {
///         ctx.envelope().header("token").is_some()
///     }
///
///     #[subscribe("orders.create", hooks = ["auth"])]
///     async fn create(&self, ctx: Context) -> Result<Reply<u64>, BoxError> {
///         let order: Order = ctx.decode()?;
///         Ok(Reply(self.store.insert(order).await?))
///     }
/// }
/// ```
#[proc_macro_attribute]
pub fn service(attr: TokenStream, item: TokenStream) -> TokenStream {
    service::service_impl(attr, item)
}
