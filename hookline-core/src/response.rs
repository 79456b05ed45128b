//! Response conversion traits.

use crate::codec;
use crate::error::BoxError;
use crate::hook::HookOutcome;
use bytes::Bytes;
use serde::Serialize;

/// Trait for converting a hook's return value into a [`HookOutcome`].
///
/// # Implementations
///
/// - `bool` → `true` = Pass, `false` = Block
/// - `HookOutcome` → As is
/// - `Result<T, E>` → Delegates to inner `T` or faults with `E`
///
/// There is no truthiness: `0`, `""` or `None` do not convert.
#[diagnostic::on_unimplemented(
    message = "`{Self}` is not an `IntoHookOutcome`",
    label = "hooks must return `bool`, `HookOutcome`, or a `Result` of either",
    note = "IntoHookOutcome must implement the `into_outcome` method."
)]
pub trait IntoHookOutcome {
    /// Convert into pass, block, or fault.
    fn into_outcome(self) -> Result<HookOutcome, BoxError>;
}

impl IntoHookOutcome for bool {
    fn into_outcome(self) -> Result<HookOutcome, BoxError> {
        Ok(if self {
            HookOutcome::Pass
        } else {
            HookOutcome::Block
        })
    }
}

impl IntoHookOutcome for HookOutcome {
    fn into_outcome(self) -> Result<HookOutcome, BoxError> {
        Ok(self)
    }
}

impl<T, E> IntoHookOutcome for Result<T, E>
where
    T: IntoHookOutcome,
    E: Into<BoxError>,
{
    fn into_outcome(self) -> Result<HookOutcome, BoxError> {
        match self {
            Ok(t) => t.into_outcome(),
            Err(e) => Err(e.into()),
        }
    }
}

/// A handler return value that is sent back to the requester.
///
/// The value is JSON encoded and published to the reply target, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply<T>(pub T);

/// Trait for converting a handler's return value into optional reply bytes.
///
/// # Implementations
///
/// - `()` → no reply
/// - `Reply<T>` → `T` encoded as JSON
/// - `Result<T, E>` → Delegates to inner `T` or faults with `E`
#[diagnostic::on_unimplemented(
    message = "`{Self}` is not an `IntoHandlerOutput`",
    label = "handlers must return `()`, `Reply<T>`, or a `Result` of either",
    note = "IntoHandlerOutput must implement the `into_handler_output` method."
)]
pub trait IntoHandlerOutput {
    /// Convert into reply bytes or an error.
    fn into_handler_output(self) -> Result<Option<Bytes>, BoxError>;
}

impl IntoHandlerOutput for () {
    fn into_handler_output(self) -> Result<Option<Bytes>, BoxError> {
        Ok(None)
    }
}

impl<T: Serialize> IntoHandlerOutput for Reply<T> {
    fn into_handler_output(self) -> Result<Option<Bytes>, BoxError> {
        Ok(Some(codec::encode(&self.0)?))
    }
}

impl<T, E> IntoHandlerOutput for Result<T, E>
where
    T: IntoHandlerOutput,
    E: Into<BoxError>,
{
    fn into_handler_output(self) -> Result<Option<Bytes>, BoxError> {
        match self {
            Ok(t) => t.into_handler_output(),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bool_outcomes() {
        assert_eq!(true.into_outcome().unwrap(), HookOutcome::Pass);
        assert_eq!(false.into_outcome().unwrap(), HookOutcome::Block);
    }

    #[test]
    fn test_result_error_is_fault() {
        let result: Result<bool, std::io::Error> = Err(std::io::Error::other("denied"));
        let err = result.into_outcome().unwrap_err();
        assert_eq!(err.to_string(), "denied");
    }

    #[test]
    fn test_unit_handler_output_has_no_reply() {
        assert!(().into_handler_output().unwrap().is_none());
    }

    #[test]
    fn test_reply_encodes_json() {
        let bytes = Reply(serde_json::json!({ "id": 1 }))
            .into_handler_output()
            .unwrap()
            .unwrap();
        assert_eq!(bytes.as_ref(), br#"{"id":1}"#);
    }

    #[test]
    fn test_failed_handler_output() {
        let result: Result<(), BoxError> = Err("handler exploded".into());
        assert!(result.into_handler_output().is_err());
    }
}
