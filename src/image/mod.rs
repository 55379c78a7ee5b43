
//! Image planes, rectangles, and the in-memory image handed to and returned from the codec.
//! Use `write::pixels_to_pik` to encode and `read::pik_to_pixels` to decode.

pub mod convert;
pub mod params;
pub mod read;
pub mod write;

use std::ops::Range;
use std::path::Path;

use crate::error::{Error, Result, UnitResult};
use crate::math::Vec2;


/// A rectangular grid of samples, stored row by row.
#[derive(Clone, Debug, PartialEq)]
pub struct Plane<T> {
    size: Vec2<usize>,
    samples: Vec<T>,
}

/// A plane of floating point samples.
pub type PlaneF = Plane<f32>;

impl<T: Copy + Default> Plane<T> {

    /// Create a plane filled with the default value.
    pub fn new(size: Vec2<usize>) -> Self {
        Self::filled(size, T::default())
    }

    /// Create a plane filled with the default value,
    /// failing instead of aborting if the samples cannot be allocated.
    pub fn try_new(size: Vec2<usize>) -> Result<Self> {
        let count = size.width().checked_mul(size.height())
            .ok_or_else(|| Error::invalid("image too large"))?;

        let mut samples = Vec::new();
        samples.try_reserve_exact(count).map_err(|_| Error::invalid("image too large"))?;
        samples.resize(count, T::default());

        Ok(Plane { size, samples })
    }

    /// Create a plane where every sample has the specified value.
    pub fn filled(size: Vec2<usize>, value: T) -> Self {
        Plane { size, samples: vec![value; size.area()] }
    }

    /// Create a plane by computing each sample from its position.
    pub fn from_fn(size: Vec2<usize>, mut sample: impl FnMut(Vec2<usize>) -> T) -> Self {
        let mut samples = Vec::with_capacity(size.area());

        for y in 0 .. size.height() {
            for x in 0 .. size.width() {
                samples.push(sample(Vec2(x, y)));
            }
        }

        Plane { size, samples }
    }

    /// Use existing samples. Panics if the sample count does not match the size.
    pub fn from_samples(size: Vec2<usize>, samples: Vec<T>) -> Self {
        assert_eq!(samples.len(), size.area(), "sample count does not match plane size");
        Plane { size, samples }
    }

    /// The width and height of this plane.
    #[inline] pub fn size(&self) -> Vec2<usize> { self.size }

    /// The number of samples in each row.
    #[inline] pub fn width(&self) -> usize { self.size.width() }

    /// The number of rows.
    #[inline] pub fn height(&self) -> usize { self.size.height() }

    /// The area covered by this plane, positioned at the origin.
    pub fn rect(&self) -> Rect { Rect::from_size(self.size) }

    /// All samples, row by row.
    pub fn samples(&self) -> &[T] { &self.samples }

    /// All samples, row by row.
    pub fn samples_mut(&mut self) -> &mut [T] { &mut self.samples }

    /// Consume the plane, returning its samples.
    pub fn into_samples(self) -> Vec<T> { self.samples }

    /// The samples of one row.
    #[inline]
    pub fn row(&self, y: usize) -> &[T] {
        let start = y * self.size.width();
        &self.samples[start .. start + self.size.width()]
    }

    /// The samples of one row.
    #[inline]
    pub fn row_mut(&mut self, y: usize) -> &mut [T] {
        let start = y * self.size.width();
        let width = self.size.width();
        &mut self.samples[start .. start + width]
    }

    /// The sample at the specified position.
    #[inline]
    pub fn get(&self, x: usize, y: usize) -> T {
        debug_assert!(x < self.size.width() && y < self.size.height(), "sample position out of bounds");
        self.samples[y * self.size.width() + x]
    }

    /// Replace the sample at the specified position.
    #[inline]
    pub fn set(&mut self, x: usize, y: usize, value: T) {
        debug_assert!(x < self.size.width() && y < self.size.height(), "sample position out of bounds");
        let width = self.size.width();
        self.samples[y * width + x] = value;
    }

    /// Mutable reference to the sample at the specified position.
    #[inline]
    pub fn get_mut(&mut self, x: usize, y: usize) -> &mut T {
        let width = self.size.width();
        &mut self.samples[y * width + x]
    }

    /// Copy the samples inside `rect` into a new plane.
    pub fn crop(&self, rect: Rect) -> Self {
        debug_assert!(self.rect().contains_rect(rect), "crop outside of plane");
        Plane::from_fn(rect.size, |position| self.get(rect.position.x() + position.x(), rect.position.y() + position.y()))
    }

    /// Copy all samples of `source` to `target_position` in this plane.
    pub fn paste(&mut self, source: &Plane<T>, target_position: Vec2<usize>) {
        debug_assert!(self.rect().contains_rect(Rect::new(target_position, source.size)), "paste outside of plane");

        for y in 0 .. source.height() {
            let target_row = self.row_mut(target_position.y() + y);
            let target = &mut target_row[target_position.x() .. target_position.x() + source.width()];
            target.copy_from_slice(source.row(y));
        }
    }

    /// Copy the samples, repeating the last column and row to fill the larger size.
    pub fn padded(&self, size: Vec2<usize>) -> Self {
        debug_assert!(size.width() >= self.width() && size.height() >= self.height(), "padding smaller than plane");
        let last = self.size - Vec2(1, 1);
        Plane::from_fn(size, |position| self.get(position.x().min(last.x()), position.y().min(last.y())))
    }
}


/// Three planes of identical size, usually one per color channel.
#[derive(Clone, Debug, PartialEq)]
pub struct Image3<T> {

    /// The channels of this image.
    pub planes: [Plane<T>; 3],
}

/// Three planes of floating point samples.
pub type Image3F = Image3<f32>;

impl<T: Copy + Default> Image3<T> {

    /// Three planes filled with the default value.
    pub fn new(size: Vec2<usize>) -> Self {
        Image3 { planes: [Plane::new(size), Plane::new(size), Plane::new(size)] }
    }

    /// Three planes filled with the default value, failing if they cannot be allocated.
    pub fn try_new(size: Vec2<usize>) -> Result<Self> {
        Ok(Image3 { planes: [ Plane::try_new(size)?, Plane::try_new(size)?, Plane::try_new(size)? ] })
    }

    /// Combine three planes. Panics if their sizes differ.
    pub fn from_planes(planes: [Plane<T>; 3]) -> Self {
        assert!(planes[1].size() == planes[0].size() && planes[2].size() == planes[0].size(), "plane sizes differ");
        Image3 { planes }
    }

    /// The size shared by all planes.
    pub fn size(&self) -> Vec2<usize> { self.planes[0].size() }

    /// One of the three planes.
    pub fn plane(&self, channel: usize) -> &Plane<T> { &self.planes[channel] }

    /// One of the three planes.
    pub fn plane_mut(&mut self, channel: usize) -> &mut Plane<T> { &mut self.planes[channel] }

    /// Copy the samples inside `rect` into a new image.
    pub fn crop(&self, rect: Rect) -> Self {
        self.map_planes(|plane| plane.crop(rect))
    }

    /// Copy all samples of `source` to `target_position` in this image.
    pub fn paste(&mut self, source: &Image3<T>, target_position: Vec2<usize>) {
        for (plane, source) in self.planes.iter_mut().zip(&source.planes) {
            plane.paste(source, target_position);
        }
    }

    /// Copy the samples, repeating the last column and row to fill the larger size.
    pub fn padded(&self, size: Vec2<usize>) -> Self {
        self.map_planes(|plane| plane.padded(size))
    }

    /// Create a new image by transforming each plane.
    pub fn map_planes<B>(&self, mut map: impl FnMut(&Plane<T>) -> Plane<B>) -> Image3<B> {
        Image3 { planes: [ map(&self.planes[0]), map(&self.planes[1]), map(&self.planes[2]) ] }
    }
}

impl Image3F {

    /// Add the samples of another image of the same size.
    pub fn add_assign(&mut self, other: &Image3F) {
        debug_assert_eq!(self.size(), other.size(), "image sizes differ");

        for (plane, other) in self.planes.iter_mut().zip(&other.planes) {
            for (sample, &addend) in plane.samples_mut().iter_mut().zip(other.samples()) {
                *sample += addend;
            }
        }
    }

    /// Subtract the samples of another image of the same size.
    pub fn sub_assign(&mut self, other: &Image3F) {
        debug_assert_eq!(self.size(), other.size(), "image sizes differ");

        for (plane, other) in self.planes.iter_mut().zip(&other.planes) {
            for (sample, &subtrahend) in plane.samples_mut().iter_mut().zip(other.samples()) {
                *sample -= subtrahend;
            }
        }
    }
}


/// An axis-aligned area, in pixels or in blocks depending on context.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct Rect {

    /// The top left corner.
    pub position: Vec2<usize>,

    /// Width and height.
    pub size: Vec2<usize>,
}

impl Rect {

    /// Create a rectangle from its top left corner and size.
    pub fn new(position: Vec2<usize>, size: Vec2<usize>) -> Self {
        Rect { position, size }
    }

    /// Create a rectangle at the origin.
    pub fn from_size(size: Vec2<usize>) -> Self {
        Rect { position: Vec2(0, 0), size }
    }

    /// The exclusive bottom right corner.
    pub fn end(self) -> Vec2<usize> { self.position + self.size }

    /// The horizontal coordinates inside this rectangle.
    pub fn x_range(self) -> Range<usize> { self.position.x() .. self.end().x() }

    /// The vertical coordinates inside this rectangle.
    pub fn y_range(self) -> Range<usize> { self.position.y() .. self.end().y() }

    /// Whether the position lies inside this rectangle.
    pub fn contains(self, position: Vec2<usize>) -> bool {
        self.x_range().contains(&position.x()) && self.y_range().contains(&position.y())
    }

    /// Whether the other rectangle lies completely inside this rectangle.
    pub fn contains_rect(self, other: Rect) -> bool {
        other.position.x() >= self.position.x() && other.position.y() >= self.position.y()
            && other.end().x() <= self.end().x() && other.end().y() <= self.end().y()
    }

    /// Multiply position and size by the factor.
    pub fn scaled(self, factor: usize) -> Self {
        Rect::new(self.position * factor, self.size * factor)
    }

    /// The same rectangle, positioned relative to `origin`.
    pub fn relative_to(self, origin: Vec2<usize>) -> Self {
        Rect::new(self.position - origin, self.size)
    }

    /// Grow by `amount` on each side, then round the corners outwards to multiples of `alignment`,
    /// without leaving `bounds`.
    pub fn expanded_aligned(self, amount: usize, alignment: usize, bounds: Rect) -> Self {
        let start = self.position.map(|value| value.saturating_sub(amount) / alignment * alignment);
        let end = self.end().map(|value| (value + amount + alignment - 1) / alignment * alignment);

        let start = Vec2(start.x().max(bounds.position.x()), start.y().max(bounds.position.y()));
        let end = Vec2(end.x().min(bounds.end().x()), end.y().min(bounds.end().y()));
        Rect::new(start, end - start)
    }
}


/// An image together with the information the codec needs about its origin.
/// The samples are linear light, scaled to the range `0..=255`, in the order red, green, blue.
#[derive(Clone, Debug, PartialEq)]
pub struct CodecInOut {

    /// Linear samples.
    pub image: Image3F,

    /// The bit depth of the samples the image was loaded from.
    /// Required for encoding.
    pub original_bits_per_sample: Option<u32>,

    /// The number of bytes the image was decoded from, zero when it was not decoded.
    pub encoded_size: usize,
}

impl CodecInOut {

    /// Wrap a linear image.
    pub fn new(image: Image3F, original_bits_per_sample: Option<u32>) -> Self {
        CodecInOut { image, original_bits_per_sample, encoded_size: 0 }
    }

    /// Convert interleaved 8 bit sRGB samples to a linear image.
    pub fn from_srgb8(size: Vec2<usize>, interleaved_rgb: &[u8]) -> Result<Self> {
        if interleaved_rgb.len() != size.area() * 3 {
            return Err(Error::invalid("pixel count does not match image size"));
        }

        let table = convert::srgb8_to_linear_table();
        let plane = |channel: usize| Plane::from_fn(size, |position| {
            let index = (position.y() * size.width() + position.x()) * 3 + channel;
            table[interleaved_rgb[index] as usize]
        });

        Ok(CodecInOut::new(Image3::from_planes([plane(0), plane(1), plane(2)]), Some(8)))
    }

    /// Convert the linear image to interleaved 8 bit sRGB samples.
    pub fn to_srgb8(&self) -> Vec<u8> {
        let size = self.size();
        let mut interleaved = Vec::with_capacity(size.area() * 3);

        for y in 0 .. size.height() {
            for x in 0 .. size.width() {
                for plane in &self.image.planes {
                    interleaved.push(convert::srgb8_from_linear(plane.get(x, y)));
                }
            }
        }

        interleaved
    }

    /// Load an 8 bit sRGB image file, for example a png.
    pub fn read_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let image = ::image::open(path).map_err(|error| match error {
            ::image::ImageError::IoError(error) => Error::from(error),
            other => Error::invalid(other.to_string()),
        })?;

        let rgb = image.to_rgb8();
        let size = Vec2(rgb.width() as usize, rgb.height() as usize);
        Self::from_srgb8(size, rgb.as_raw())
    }

    /// The dimensions of the image.
    pub fn size(&self) -> Vec2<usize> { self.image.size() }

    /// Fails unless the image can be encoded.
    pub fn validate(&self) -> UnitResult {
        if self.size().has_zero_area() {
            return Err(Error::invalid("empty image"));
        }

        match self.original_bits_per_sample {
            None => Err(Error::invalid("missing original bit depth")),
            Some(0) => Err(Error::invalid("missing original bit depth")),
            Some(_) => Ok(()),
        }
    }
}


#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn impossible_allocations_fail(){
        assert!(matches!(Plane::<f32>::try_new(Vec2(usize::MAX, 2)), Err(Error::Invalid(_))));
        assert!(matches!(Image3F::try_new(Vec2(usize::MAX / 8, 2)), Err(Error::Invalid(_))));

        let image = Image3F::try_new(Vec2(3, 2)).unwrap();
        assert_eq!(image, Image3F::new(Vec2(3, 2)));
    }

    #[test]
    fn crop_and_paste(){
        let plane = Plane::from_fn(Vec2(5, 4), |position| (position.y() * 10 + position.x()) as f32);
        let cropped = plane.crop(Rect::new(Vec2(1, 2), Vec2(3, 2)));
        assert_eq!(cropped.row(0), &[21.0, 22.0, 23.0]);
        assert_eq!(cropped.row(1), &[31.0, 32.0, 33.0]);

        let mut target = Plane::new(Vec2(5, 4));
        target.paste(&cropped, Vec2(2, 0));
        assert_eq!(target.row(1), &[0.0, 0.0, 31.0, 32.0, 33.0]);
    }

    #[test]
    fn padding_repeats_edges(){
        let plane = Plane::from_fn(Vec2(2, 2), |position| (position.y() * 2 + position.x()) as u8);
        let padded = plane.padded(Vec2(3, 3));
        assert_eq!(padded.samples(), &[0, 1, 1, 2, 3, 3, 2, 3, 3]);
    }

    #[test]
    fn expanded_rectangle_is_aligned_and_bounded(){
        let bounds = Rect::from_size(Vec2(10, 9));
        let expanded = Rect::new(Vec2(8, 0), Vec2(2, 8)).expanded_aligned(1, 4, bounds);
        assert_eq!(expanded, Rect::new(Vec2(4, 0), Vec2(6, 9)));
    }

    #[test]
    fn validation(){
        let empty = CodecInOut::new(Image3::new(Vec2(0, 3)), Some(8));
        assert!(matches!(empty.validate(), Err(Error::Invalid(_))));

        let without_depth = CodecInOut::new(Image3::new(Vec2(2, 3)), None);
        assert!(matches!(without_depth.validate(), Err(Error::Invalid(_))));

        assert!(CodecInOut::new(Image3::new(Vec2(2, 3)), Some(8)).validate().is_ok());
    }

    #[test]
    fn srgb_round_trip(){
        let size = Vec2(16, 16);
        let pixels: Vec<u8> = (0 .. size.area() * 3).map(|index| (index % 256) as u8).collect();
        let image = CodecInOut::from_srgb8(size, &pixels).unwrap();
        assert_eq!(image.to_srgb8(), pixels);
    }
}
