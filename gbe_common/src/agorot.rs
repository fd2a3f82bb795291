use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, Mul, Neg, Sub, SubAssign},
};

use serde::{Deserialize, Serialize};
use sqlx::Type;

use crate::op;

//--------------------------------------      Agorot        ----------------------------------------------------------
/// A monetary amount in agorot, the minor unit of the new Israeli shekel (1 ₪ = 100 agorot).
///
/// All prices, deposits and refunds in the settlement engine are integer agorot. Floating point never enters the
/// ledger.
#[derive(Debug, Clone, Copy, Default, Type, Ord, PartialOrd, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct Agorot(i64);

op!(binary Agorot, Add, add);
op!(binary Agorot, Sub, sub);
op!(inplace Agorot, SubAssign, sub_assign);
op!(unary Agorot, Neg, neg);

impl Mul<i64> for Agorot {
    type Output = Self;

    fn mul(self, rhs: i64) -> Self::Output {
        Self::from(self.value() * rhs)
    }
}

impl Sum for Agorot {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

impl From<i64> for Agorot {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl PartialEq for Agorot {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for Agorot {}

impl Display for Agorot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let shekels = self.0 as f64 / 100.0;
        write!(f, "₪{shekels:0.2}")
    }
}

impl Agorot {
    pub fn value(&self) -> i64 {
        self.0
    }

    /// Convenience constructor for whole-shekel amounts.
    pub fn from_shekels(shekels: i64) -> Self {
        Self(shekels * 100)
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Subtraction clamped at zero. Used for "remaining to pay" style calculations that must never go negative.
    pub fn saturating_sub(self, rhs: Self) -> Self {
        Self(self.0.saturating_sub(rhs.0).max(0))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn display_is_in_shekels() {
        assert_eq!(Agorot::from(12_345).to_string(), "₪123.45");
        assert_eq!(Agorot::from_shekels(100).to_string(), "₪100.00");
    }

    #[test]
    fn arithmetic() {
        let a = Agorot::from(500);
        let b = Agorot::from(200);
        assert_eq!(a + b, Agorot::from(700));
        assert_eq!(a - b, Agorot::from(300));
        assert_eq!(-(a - b), Agorot::from(-300));
        assert_eq!(b * 3, Agorot::from(600));
        let total: Agorot = vec![a, b, b].into_iter().sum();
        assert_eq!(total, Agorot::from(900));
    }

    #[test]
    fn saturating_sub_never_goes_negative() {
        let price = Agorot::from_shekels(100);
        let paid = Agorot::from_shekels(150);
        assert_eq!(price.saturating_sub(paid), Agorot::from(0));
        assert_eq!(paid.saturating_sub(price), Agorot::from_shekels(50));
    }
}
