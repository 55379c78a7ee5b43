
//! Simple math utilities.

use std::convert::TryFrom;

/// Simple two-dimensional vector of any numerical type.
/// Supports only few mathematical operations
/// as this is used mainly as data struct.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct Vec2<T> (pub T, pub T);

impl<T> Vec2<T> {

    /// Maps all components of this vector to a new type, yielding a vector of that new type.
    pub fn map<B>(self, map: impl Fn(T) -> B) -> Vec2<B> {
        Vec2(map(self.0), map(self.1))
    }

    /// Try to convert all components of this vector to a new type,
    /// yielding either a vector of that new type, or an error.
    pub fn try_from<S>(value: Vec2<S>) -> std::result::Result<Self, T::Error> where T: TryFrom<S> {
        let x = T::try_from(value.0)?;
        let y = T::try_from(value.1)?;
        Ok(Vec2(x, y))
    }

    /// Seeing this vector as a dimension or size (width and height),
    /// this returns the area that this dimensions contains (`width * height`).
    #[inline] pub fn area(self) -> T where T: std::ops::Mul<T, Output = T> {
        self.0 * self.1
    }

    /// The first component of this 2D vector.
    #[inline] pub fn x(self) -> T where T: Copy { self.0 }

    /// The second component of this 2D vector.
    #[inline] pub fn y(self) -> T where T: Copy { self.1 }

    /// The first component of this 2D vector.
    #[inline] pub fn width(self) -> T where T: Copy { self.0 }

    /// The second component of this 2D vector.
    #[inline] pub fn height(self) -> T where T: Copy { self.1 }
}

impl Vec2<usize> {

    /// Divide both components, rounding according to the specified mode.
    pub fn divide(self, divisor: usize, mode: RoundingMode) -> Self {
        self.map(|value| mode.divide(value, divisor))
    }

    /// Whether any of the two components is zero.
    pub fn has_zero_area(self) -> bool {
        self.0 == 0 || self.1 == 0
    }
}


impl<T: std::ops::Add<T>> std::ops::Add<Vec2<T>> for Vec2<T> {
    type Output = Vec2<T::Output>;
    fn add(self, other: Vec2<T>) -> Self::Output {
        Vec2(self.0 + other.0, self.1 + other.1)
    }
}

impl<T: std::ops::Sub<T>> std::ops::Sub<Vec2<T>> for Vec2<T> {
    type Output = Vec2<T::Output>;
    fn sub(self, other: Vec2<T>) -> Self::Output {
        Vec2(self.0 - other.0, self.1 - other.1)
    }
}

impl<T: std::ops::Mul<T> + Copy> std::ops::Mul<T> for Vec2<T> {
    type Output = Vec2<T::Output>;
    fn mul(self, factor: T) -> Self::Output {
        Vec2(self.0 * factor, self.1 * factor)
    }
}

impl<T> From<(T, T)> for Vec2<T> {
    fn from((x, y): (T, T)) -> Self { Vec2(x, y) }
}

impl<T> From<Vec2<T>> for (T, T) {
    fn from(vec2: Vec2<T>) -> Self { (vec2.0, vec2.1) }
}


/// Whether to round up or down when dividing sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoundingMode {

    /// Round down.
    Down,

    /// Round up.
    Up,
}

impl RoundingMode {

    /// Divide `dividend` by `divisor`, rounding in this direction.
    pub fn divide(self, dividend: usize, divisor: usize) -> usize {
        match self {
            RoundingMode::Up => (dividend + divisor - 1) / divisor,
            RoundingMode::Down => dividend / divisor,
        }
    }

    /// Round `value` to a multiple of `multiple` in this direction.
    pub fn to_multiple(self, value: usize, multiple: usize) -> usize {
        self.divide(value, multiple) * multiple
    }
}
