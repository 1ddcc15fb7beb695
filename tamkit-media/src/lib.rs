pub mod contour;
pub mod draw;
pub mod image;
pub mod mask;
pub mod npy;
pub mod video;

pub use crate::image::Image;
pub use crate::mask::Mask;
pub use crate::video::{VideoFrames, VideoWriter};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RGB(pub u8, pub u8, pub u8);

impl From<RGB> for ::image::Rgb<u8> {
    fn from(value: RGB) -> Self {
        ::image::Rgb([value.0, value.1, value.2])
    }
}
