use std::io::BufRead;
use std::io::BufReader;
use std::io::Read;

use log::debug;
use nom::character::complete::{digit1, space0, space1};
use nom::combinator::{all_consuming, map_res};
use nom::sequence::{delimited, preceded, tuple};
use nom::IResult;

use crate::error::{DecodeError, ImageError};
use crate::image::{GenericImage, GenericImageColors, GenericImageTo, ReadImage};

const PPM_MAGIC: &str = "P3";

#[derive(Debug, PartialEq, Eq)]
pub struct PixmapHeader {
    pub width: u32,
    pub height: u32,
    pub max_value: u32,
}

impl PixmapHeader {
    fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// An ASCII "P3" pixmap, held as a rescaled RGBA buffer.
pub struct PpmImage {
    header: PixmapHeader,
    data: Vec<u8>,
}

fn integer(i: &str) -> IResult<&str, u32> {
    map_res(digit1, str::parse)(i)
}

fn dimensions_line(i: &str) -> IResult<&str, (u32, u32)> {
    all_consuming(delimited(
        space0,
        tuple((integer, preceded(space1, integer))),
        space0,
    ))(i)
}

fn max_value_line(i: &str) -> IResult<&str, u32> {
    all_consuming(delimited(space0, integer, space0))(i)
}

fn next_line<I>(lines: &mut I) -> Result<Option<String>, ImageError>
where
    I: Iterator<Item = std::io::Result<String>>,
{
    match lines.next() {
        None => Ok(None),
        Some(line) => {
            let line = line?;
            Ok(Some(line.trim_end_matches('\r').to_string()))
        }
    }
}

/// Reads the three header lines: magic, dimensions, max channel value.
pub fn parse_header<I>(lines: &mut I) -> Result<PixmapHeader, ImageError>
where
    I: Iterator<Item = std::io::Result<String>>,
{
    let magic = next_line(lines)?.ok_or(DecodeError::TruncatedHeader)?;
    if magic != PPM_MAGIC {
        return Err(DecodeError::BadMagic.into());
    }

    let dimensions = next_line(lines)?.ok_or(DecodeError::TruncatedHeader)?;
    let (width, height) = match dimensions_line(&dimensions) {
        Ok((_, (w, h))) if w > 0 && h > 0 => (w, h),
        _ => return Err(DecodeError::BadDimensions.into()),
    };

    let max = next_line(lines)?.ok_or(DecodeError::TruncatedHeader)?;
    let max_value = match max_value_line(&max) {
        Ok((_, m)) if m > 0 => m,
        _ => return Err(DecodeError::BadMaxValue.into()),
    };

    Ok(PixmapHeader {
        width,
        height,
        max_value,
    })
}

fn scale(value: u32, max_value: u32) -> u8 {
    (value as u64 * 255 / max_value as u64) as u8
}

fn parse_pixel_line(line: &str, line_no: usize) -> Result<(u32, u32, u32), DecodeError> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() != 3 {
        return Err(DecodeError::BadPixelLine { line: line_no });
    }

    let mut values = [0u32; 3];
    for (i, token) in tokens.iter().enumerate() {
        match all_consuming(integer)(*token) {
            Ok((_, v)) => values[i] = v,
            Err(_) => return Err(DecodeError::BadChannelValue { line: line_no }),
        }
    }
    Ok((values[0], values[1], values[2]))
}

/// Reads one RGB triple per line into `data`, rescaling each channel to
/// 0..=255 with truncating division and forcing alpha to 255.
///
/// The line count must match the header exactly: extra lines and early end
/// of stream both fail the file.
pub fn decode_pixels<I>(
    lines: &mut I,
    header: &PixmapHeader,
    data: &mut [u8],
) -> Result<(), ImageError>
where
    I: Iterator<Item = std::io::Result<String>>,
{
    let expected = header.pixel_count();
    let mut cursor = 0;
    let mut line_no = 3;

    while let Some(line) = next_line(lines)? {
        line_no += 1;
        if cursor == data.len() {
            return Err(DecodeError::ExtraPixels { expected }.into());
        }
        let (r, g, b) = parse_pixel_line(&line, line_no)?;
        data[cursor] = scale(r, header.max_value);
        data[cursor + 1] = scale(g, header.max_value);
        data[cursor + 2] = scale(b, header.max_value);
        data[cursor + 3] = 255;
        cursor += 4;
    }

    if cursor < data.len() {
        return Err(DecodeError::MissingPixels {
            expected,
            found: cursor / 4,
        }
        .into());
    }
    Ok(())
}

impl<R: Read> ReadImage<R> for PpmImage {
    fn read_image(reader: R) -> Result<Box<Self>, ImageError> {
        let mut lines = BufReader::new(reader).lines();

        let header = parse_header(&mut lines)?;
        debug!("header: {:?}", header);

        let mut data = vec![0u8; header.pixel_count() * 4];
        decode_pixels(&mut lines, &header, &mut data)?;

        Ok(Box::new(PpmImage { header, data }))
    }
}

impl GenericImageTo for PpmImage {
    fn to_rgb(&self) -> Result<GenericImage, ImageError> {
        let mut data = Vec::with_capacity(self.header.pixel_count() * 3);
        for pixel in self.data.chunks(4) {
            data.extend_from_slice(&pixel[..3]);
        }
        Ok(GenericImage {
            width: self.header.width,
            height: self.header.height,
            colors: GenericImageColors::RGB,
            data,
        })
    }

    fn to_rgba(&self) -> Result<GenericImage, ImageError> {
        Ok(GenericImage {
            width: self.header.width,
            height: self.header.height,
            colors: GenericImageColors::RGBA,
            data: self.data.clone(),
        })
    }
}

#[cfg(test)]
fn decode(input: &str) -> Result<Box<PpmImage>, ImageError> {
    PpmImage::read_image(input.as_bytes())
}

#[cfg(test)]
fn decode_err(input: &str) -> DecodeError {
    match decode(input) {
        Err(ImageError::Decode(e)) => e,
        Err(e) => panic!("expected decode error, got {:?}", e),
        Ok(_) => panic!("expected decode error, got an image"),
    }
}

#[test]
fn test_decode_two_pixels() {
    let image = decode("P3\n2 1\n255\n255 0 0\n0 255 0\n").unwrap();
    assert_eq!(image.header.width, 2);
    assert_eq!(image.header.height, 1);
    assert_eq!(image.data, vec![255, 0, 0, 255, 0, 255, 0, 255]);
}

#[test]
fn test_decode_crlf_lines() {
    let image = decode("P3\r\n1 1\r\n255\r\n10 20 30\r\n").unwrap();
    assert_eq!(image.data, vec![10, 20, 30, 255]);
}

#[test]
fn test_scale_boundaries() {
    assert_eq!(scale(0, 100), 0);
    assert_eq!(scale(100, 100), 255);
    // truncating division: 1 * 255 / 100 = 2, not 3
    assert_eq!(scale(1, 100), 2);
}

#[test]
fn test_scale_rescales_small_max() {
    let image = decode("P3\n1 1\n7\n0 3 7\n").unwrap();
    assert_eq!(image.data, vec![0, 109, 255, 255]);
}

#[test]
fn test_bad_magic() {
    assert_eq!(decode_err("P6\n1 1\n255\n0 0 0\n"), DecodeError::BadMagic);
}

#[test]
fn test_empty_input() {
    assert_eq!(decode_err(""), DecodeError::TruncatedHeader);
}

#[test]
fn test_header_cut_short() {
    assert_eq!(decode_err("P3\n2 2\n"), DecodeError::TruncatedHeader);
}

#[test]
fn test_bad_dimensions() {
    assert_eq!(decode_err("P3\n2\n255\n"), DecodeError::BadDimensions);
    assert_eq!(decode_err("P3\n2 2 2\n255\n"), DecodeError::BadDimensions);
    assert_eq!(decode_err("P3\nfour 2\n255\n"), DecodeError::BadDimensions);
    assert_eq!(decode_err("P3\n0 2\n255\n"), DecodeError::BadDimensions);
}

#[test]
fn test_bad_max_value() {
    assert_eq!(decode_err("P3\n1 1\nmax\n0 0 0\n"), DecodeError::BadMaxValue);
    assert_eq!(decode_err("P3\n1 1\n0\n0 0 0\n"), DecodeError::BadMaxValue);
}

#[test]
fn test_bad_pixel_line_token_count() {
    assert_eq!(
        decode_err("P3\n1 1\n255\n1 2\n"),
        DecodeError::BadPixelLine { line: 4 }
    );
    assert_eq!(
        decode_err("P3\n1 1\n255\n1 2 3 4\n"),
        DecodeError::BadPixelLine { line: 4 }
    );
}

#[test]
fn test_bad_channel_value() {
    assert_eq!(
        decode_err("P3\n1 2\n255\n0 0 0\n1 red 3\n"),
        DecodeError::BadChannelValue { line: 5 }
    );
    assert_eq!(
        decode_err("P3\n1 1\n255\n-1 0 0\n"),
        DecodeError::BadChannelValue { line: 4 }
    );
}

#[test]
fn test_missing_pixel_lines() {
    assert_eq!(
        decode_err("P3\n2 2\n255\n0 0 0\n"),
        DecodeError::MissingPixels {
            expected: 4,
            found: 1
        }
    );
}

#[test]
fn test_extra_pixel_lines() {
    assert_eq!(
        decode_err("P3\n1 1\n255\n0 0 0\n1 1 1\n"),
        DecodeError::ExtraPixels { expected: 1 }
    );
}

#[test]
fn test_to_rgb_drops_alpha() {
    let image = decode("P3\n2 1\n255\n1 2 3\n4 5 6\n").unwrap();
    let rgb = image.to_rgb().unwrap();
    assert_eq!(rgb.data, vec![1, 2, 3, 4, 5, 6]);
}
