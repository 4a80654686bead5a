use std::io::Read;
use std::io::Write;

use crate::error::ImageError;

pub enum GenericImageColors {
    RGB,
    RGBA,
}

pub struct GenericImage {
    pub width: u32,
    pub height: u32,
    pub colors: GenericImageColors,
    pub data: Vec<u8>,
}

impl GenericImageColors {
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            GenericImageColors::RGB => 3,
            GenericImageColors::RGBA => 4,
        }
    }
}

pub trait GenericImageTo {
    fn to_rgb(&self) -> Result<GenericImage, ImageError>;
    fn to_rgba(&self) -> Result<GenericImage, ImageError>;
}

pub trait WriteImage<W: Write, I: GenericImageTo> {
    fn write_image(writer: W, image: &I) -> Result<(), ImageError>;
}

pub trait ReadImage<R: Read> {
    fn read_image(reader: R) -> Result<Box<Self>, ImageError>;
}
