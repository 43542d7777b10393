macro_rules! bitflags {
    ($name:ident: $rep:ty; $($var:ident = $val:expr,)*) => {
        #[derive(Copy, Clone, Eq, PartialEq, Default, Hash)]
        pub struct $name(pub $rep);

        $(
            pub const $var: $name = $name($val);
        )*

        #[allow(dead_code)]
        impl $name {
            pub fn none() -> Self {
                Self(0)
            }

            pub fn contains(self, other: Self) -> bool {
                self.0 & other.0 == other.0
            }

            pub fn intersects(self, other: Self) -> bool {
                self.0 & other.0 != 0
            }
        }

        impl std::ops::BitOr for $name {
            type Output = Self;

            fn bitor(self, rhs: Self) -> Self {
                Self(self.0 | rhs.0)
            }
        }

        impl std::ops::BitOrAssign for $name {
            fn bitor_assign(&mut self, rhs: Self) {
                self.0 |= rhs.0;
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                let mut any = false;
                let mut rem = self.0;
                $(
                    if $val != 0 && self.0 & $val == $val {
                        if any {
                            f.write_str(" | ")?;
                        }
                        f.write_str(stringify!($var))?;
                        any = true;
                        rem &= !$val;
                    }
                )*
                if rem != 0 || !any {
                    if any {
                        f.write_str(" | ")?;
                    }
                    write!(f, "0x{:x}", rem)?;
                }
                Ok(())
            }
        }
    };
}

macro_rules! id {
    ($name:ident) => {
        #[derive(Debug, Copy, Clone, Hash, Ord, PartialOrd, Eq, PartialEq)]
        pub struct $name(u32);

        #[allow(dead_code)]
        impl $name {
            pub const NONE: Self = $name(0);

            pub const fn from_raw(raw: u32) -> Self {
                Self(raw)
            }

            pub fn raw(self) -> u32 {
                self.0
            }
        }

        impl From<crate::wire::ObjectId> for $name {
            fn from(f: crate::wire::ObjectId) -> Self {
                Self(f.raw())
            }
        }

        impl From<$name> for crate::wire::ObjectId {
            fn from(f: $name) -> Self {
                crate::wire::ObjectId::from_raw(f.0)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                std::fmt::Display::fmt(&self.0, f)
            }
        }
    };
}
