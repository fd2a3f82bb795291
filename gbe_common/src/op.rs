/// Implements the standard arithmetic operator traits for single-field tuple structs.
///
/// Three forms are supported:
/// * `op!(binary T, Trait, method)` for binary operators like `Add` and `Sub`,
/// * `op!(inplace T, Trait, method)` for in-place operators like `SubAssign`,
/// * `op!(unary T, Trait, method)` for unary operators like `Neg`.
#[macro_export]
macro_rules! op {
    (binary $ty:ty, $trait:ident, $method:ident) => {
        impl $trait for $ty {
            type Output = Self;

            fn $method(self, rhs: Self) -> Self::Output {
                Self(self.0.$method(rhs.0))
            }
        }
    };
    (inplace $ty:ty, $trait:ident, $method:ident) => {
        impl $trait for $ty {
            fn $method(&mut self, rhs: Self) {
                self.0.$method(rhs.0);
            }
        }
    };
    (unary $ty:ty, $trait:ident, $method:ident) => {
        impl $trait for $ty {
            type Output = Self;

            fn $method(self) -> Self::Output {
                Self(self.0.$method())
            }
        }
    };
}
