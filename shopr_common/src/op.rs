//! Operator-impl helper for transparent numeric newtypes.
//!
//! `op!(binary Money, Add, add)` expands to the obvious `impl Add for Money`
//! that forwards to the inner integer. Keeps the newtype definitions free of
//! operator boilerplate.

#[macro_export]
macro_rules! op {
    (binary $name:ident, $op:ident, $fn:ident) => {
        impl std::ops::$op for $name {
            type Output = Self;

            fn $fn(self, rhs: Self) -> Self::Output {
                Self(std::ops::$op::$fn(self.0, rhs.0))
            }
        }
    };
    (inplace $name:ident, $op:ident, $fn:ident) => {
        impl std::ops::$op for $name {
            fn $fn(&mut self, rhs: Self) {
                std::ops::$op::$fn(&mut self.0, rhs.0);
            }
        }
    };
    (unary $name:ident, $op:ident, $fn:ident) => {
        impl std::ops::$op for $name {
            type Output = Self;

            fn $fn(self) -> Self::Output {
                Self(std::ops::$op::$fn(self.0))
            }
        }
    };
}
