//! 宿主运行时句柄

use std::fmt;

macro_rules! native_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
        pub struct $name(usize);

        impl $name {
            /// 空句柄
            pub const NULL: $name = $name(0);

            pub const fn from_raw(raw: usize) -> Self {
                $name(raw)
            }

            pub const fn raw(self) -> usize {
                self.0
            }

            /// 非空即有效
            pub const fn is_valid(self) -> bool {
                self.0 != 0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                if self.is_valid() {
                    write!(f, "{}({:#x})", stringify!($name), self.0)
                } else {
                    write!(f, "{}(NULL)", stringify!($name))
                }
            }
        }
    };
}

native_handle!(
    /// 宿主类型句柄
    ClassHandle
);

native_handle!(
    /// 宿主字段句柄
    FieldHandle
);
