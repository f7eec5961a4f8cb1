// runtime.rs: Runtime accessor interface for buffer handles.
//
// The fixed external call surface through which unpacked programs read
// buffer metadata. This module only builds call sites; the calls are
// resolved by the runtime / code generator.
//
// Preconditions: handles passed to `Accessor::call` are `handle`-typed.
// Postconditions: returned calls carry the accessor's declared return type.
// Failure modes: none.
// Side effects: none.

use crate::ir::{Expr, Type};

/// Name of the error-signalling call raised by a failed null-check guard.
pub const RAISE_BUFFER_ARGUMENT_IS_NULL: &str = "raise_buffer_argument_is_null";

/// One accessor of the runtime buffer interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Accessor {
    Host,
    DeviceHandle,
    ElemSize,
    HostDirty,
    DeviceDirty,
    Min,
    Extent,
    Stride,
    IsNotNull,
}

impl Accessor {
    /// Non-dimensional metadata fields, in binding order.
    pub const SCALAR_FIELDS: [Accessor; 5] = [
        Accessor::Host,
        Accessor::DeviceHandle,
        Accessor::ElemSize,
        Accessor::HostDirty,
        Accessor::DeviceDirty,
    ];

    /// Per-dimension metadata fields, in binding order.
    pub const DIMENSION_FIELDS: [Accessor; 3] = [Accessor::Min, Accessor::Extent, Accessor::Stride];

    pub const ALL: [Accessor; 9] = [
        Accessor::Host,
        Accessor::DeviceHandle,
        Accessor::ElemSize,
        Accessor::HostDirty,
        Accessor::DeviceDirty,
        Accessor::Min,
        Accessor::Extent,
        Accessor::Stride,
        Accessor::IsNotNull,
    ];

    /// External function name.
    pub fn symbol(self) -> &'static str {
        match self {
            Accessor::Host => "get_host",
            Accessor::DeviceHandle => "get_device_handle",
            Accessor::ElemSize => "get_elem_size",
            Accessor::HostDirty => "get_host_dirty",
            Accessor::DeviceDirty => "get_device_dirty",
            Accessor::Min => "get_min",
            Accessor::Extent => "get_extent",
            Accessor::Stride => "get_stride",
            Accessor::IsNotNull => "is_not_null",
        }
    }

    /// Field suffix of the symbol this accessor defines (`<buffer>.<field>`).
    /// `IsNotNull` backs guards, not bindings.
    pub fn field(self) -> Option<&'static str> {
        match self {
            Accessor::Host => Some("host"),
            Accessor::DeviceHandle => Some("dev"),
            Accessor::ElemSize => Some("elem_size"),
            Accessor::HostDirty => Some("host_dirty"),
            Accessor::DeviceDirty => Some("dev_dirty"),
            Accessor::Min => Some("min"),
            Accessor::Extent => Some("extent"),
            Accessor::Stride => Some("stride"),
            Accessor::IsNotNull => None,
        }
    }

    pub fn return_type(self) -> Type {
        match self {
            Accessor::Host => Type::Handle,
            Accessor::DeviceHandle => Type::U64,
            Accessor::ElemSize | Accessor::Min | Accessor::Extent | Accessor::Stride => Type::I32,
            Accessor::HostDirty | Accessor::DeviceDirty | Accessor::IsNotNull => Type::Bool,
        }
    }

    /// True if the accessor takes a dimension index after the handle.
    pub fn is_per_dimension(self) -> bool {
        matches!(self, Accessor::Min | Accessor::Extent | Accessor::Stride)
    }

    pub fn from_symbol(symbol: &str) -> Option<Accessor> {
        Accessor::ALL.into_iter().find(|a| a.symbol() == symbol)
    }

    pub fn from_field(field: &str) -> Option<Accessor> {
        Accessor::ALL.into_iter().find(|a| a.field() == Some(field))
    }

    /// Build the call site `symbol(handle[, dim])`.
    ///
    /// `dim` is ignored for non-dimensional accessors.
    pub fn call(self, handle: &Expr, dim: Option<u32>) -> Expr {
        let mut args = vec![handle.clone()];
        if self.is_per_dimension() {
            args.push(Expr::int(i64::from(dim.unwrap_or(0))));
        }
        Expr::call(self.return_type(), self.symbol(), args)
    }
}

/// `raise_buffer_argument_is_null("<buffer>")`, the payload of a null-check guard.
pub fn raise_buffer_argument_is_null(buffer_name: &str) -> Expr {
    Expr::call(
        Type::I32,
        RAISE_BUFFER_ARGUMENT_IS_NULL,
        vec![Expr::string(buffer_name)],
    )
}

/// Return type of any runtime entry point, by external name.
pub fn return_type_of(symbol: &str) -> Option<Type> {
    if symbol == RAISE_BUFFER_ARGUMENT_IS_NULL {
        return Some(Type::I32);
    }
    Accessor::from_symbol(symbol).map(Accessor::return_type)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle() -> Expr {
        Expr::var("img.buffer", Type::Handle)
    }

    #[test]
    fn dimension_accessors_take_index_argument() {
        let call = Accessor::Extent.call(&handle(), Some(2));
        let Expr::Call { ty, name, args } = call else {
            panic!("expected call")
        };
        assert_eq!(ty, Type::I32);
        assert_eq!(name, "get_extent");
        assert_eq!(args, vec![handle(), Expr::int(2)]);
    }

    #[test]
    fn scalar_accessors_take_only_handle() {
        for acc in Accessor::SCALAR_FIELDS {
            let Expr::Call { args, .. } = acc.call(&handle(), Some(7)) else {
                panic!("expected call")
            };
            assert_eq!(args.len(), 1, "{:?} should take one argument", acc);
        }
    }

    #[test]
    fn field_and_symbol_lookup_agree() {
        for acc in Accessor::ALL {
            assert_eq!(Accessor::from_symbol(acc.symbol()), Some(acc));
            if let Some(field) = acc.field() {
                assert_eq!(Accessor::from_field(field), Some(acc));
            }
        }
        assert_eq!(Accessor::from_field("buffer"), None);
    }

    #[test]
    fn return_types_match_interface() {
        assert_eq!(return_type_of("get_host"), Some(Type::Handle));
        assert_eq!(return_type_of("get_device_handle"), Some(Type::U64));
        assert_eq!(return_type_of("get_host_dirty"), Some(Type::Bool));
        assert_eq!(return_type_of("is_not_null"), Some(Type::Bool));
        assert_eq!(return_type_of(RAISE_BUFFER_ARGUMENT_IS_NULL), Some(Type::I32));
        assert_eq!(return_type_of("sqrt"), None);
    }
}
