//! Type-erased values flowing through the receive and send pipelines.

use std::any::{type_name, Any, TypeId};
use std::fmt;

/// Runtime type information for a value requested from or passed to a call.
#[derive(Clone, Copy)]
pub struct TypeInfo {
    id: TypeId,
    name: &'static str,
}

impl TypeInfo {
    /// Returns the type information of `T`.
    #[must_use]
    pub fn of<T: 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }

    /// Returns `true` if this describes `T`.
    #[must_use]
    pub fn is<T: 'static>(&self) -> bool {
        self.id == TypeId::of::<T>()
    }

    /// Returns the type name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for TypeInfo {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeInfo {}

impl fmt::Debug for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl fmt::Display for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// A value of any `Send + Sync` type, tagged with its [`TypeInfo`].
///
/// This is the subject of the send pipeline: `respond(value)` wraps the
/// handler's value, transforms replace it, and the render phase turns it
/// into [`OutgoingContent`](crate::OutgoingContent).
pub struct AnyValue {
    value: Box<dyn Any + Send + Sync>,
    type_info: TypeInfo,
}

impl AnyValue {
    /// Wraps a value.
    pub fn new<T: Send + Sync + 'static>(value: T) -> Self {
        Self {
            value: Box::new(value),
            type_info: TypeInfo::of::<T>(),
        }
    }

    /// Wraps the unit value.
    #[must_use]
    pub fn unit() -> Self {
        Self::new(())
    }

    /// Returns the type of the wrapped value.
    #[must_use]
    pub const fn type_info(&self) -> TypeInfo {
        self.type_info
    }

    /// Returns the type name of the wrapped value.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        self.type_info.name
    }

    /// Returns `true` if the wrapped value is a `T`.
    #[must_use]
    pub fn is<T: 'static>(&self) -> bool {
        self.value.is::<T>()
    }

    /// Borrows the value as `T`.
    #[must_use]
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.value.downcast_ref()
    }

    /// Mutably borrows the value as `T`.
    pub fn downcast_mut<T: 'static>(&mut self) -> Option<&mut T> {
        self.value.downcast_mut()
    }

    /// Unwraps the value as `T`, or returns `self` unchanged.
    ///
    /// # Errors
    ///
    /// Returns the original value if it is not a `T`.
    pub fn downcast<T: 'static>(self) -> Result<T, Self> {
        let type_info = self.type_info;
        self.value
            .downcast::<T>()
            .map(|boxed| *boxed)
            .map_err(|value| Self { value, type_info })
    }

    /// Wraps `value`, flattening it if it already is an `AnyValue`.
    pub fn flatten<T: Send + Sync + 'static>(value: T) -> Self {
        match Self::new(value).downcast::<Self>() {
            Ok(inner) => inner,
            Err(wrapped) => wrapped,
        }
    }
}

impl fmt::Debug for AnyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnyValue")
            .field("type", &self.type_info)
            .finish_non_exhaustive()
    }
}

/// The subject of the receive pipeline.
///
/// `type_info` is the type the handler asked for; `value` starts as the raw
/// request body (`Bytes`) and is replaced by transforms.
#[derive(Debug)]
pub struct ApplicationReceiveRequest {
    /// The requested type.
    pub type_info: TypeInfo,
    /// The current value.
    pub value: AnyValue,
}

impl ApplicationReceiveRequest {
    /// Creates a receive request.
    #[must_use]
    pub const fn new(type_info: TypeInfo, value: AnyValue) -> Self {
        Self { type_info, value }
    }

    /// Returns `true` once the value has the requested type.
    #[must_use]
    pub fn is_satisfied(&self) -> bool {
        self.value.type_info() == self.type_info
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[test]
    fn test_type_info_equality() {
        assert_eq!(TypeInfo::of::<String>(), TypeInfo::of::<String>());
        assert_ne!(TypeInfo::of::<String>(), TypeInfo::of::<&'static str>());
        assert!(TypeInfo::of::<Bytes>().is::<Bytes>());
        assert!(TypeInfo::of::<Vec<u8>>().name().contains("Vec<u8>"));
    }

    #[test]
    fn test_any_value_downcast() {
        let value = AnyValue::new(42_u32);
        assert!(value.is::<u32>());
        assert_eq!(value.downcast_ref::<u32>(), Some(&42));
        assert_eq!(value.downcast::<u32>().unwrap(), 42);
    }

    #[test]
    fn test_any_value_downcast_mismatch_keeps_value() {
        let value = AnyValue::new("hello".to_string());
        let value = value.downcast::<u32>().unwrap_err();
        assert_eq!(value.type_info(), TypeInfo::of::<String>());
        assert_eq!(value.downcast_ref::<String>().unwrap(), "hello");
    }

    #[test]
    fn test_any_value_flatten() {
        let inner = AnyValue::new(7_i64);
        let flat = AnyValue::flatten(inner);
        assert!(flat.is::<i64>());

        let wrapped = AnyValue::flatten(7_i64);
        assert!(wrapped.is::<i64>());
    }

    #[test]
    fn test_receive_request_satisfied() {
        let raw = ApplicationReceiveRequest::new(
            TypeInfo::of::<String>(),
            AnyValue::new(Bytes::from_static(b"x")),
        );
        assert!(!raw.is_satisfied());

        let done = ApplicationReceiveRequest::new(TypeInfo::of::<String>(), AnyValue::new("x".to_string()));
        assert!(done.is_satisfied());
    }
}
