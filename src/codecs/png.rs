use std::io::BufWriter;
use std::io::Write;

use log::debug;
use miniz_oxide::deflate::compress_to_vec_zlib;

use crate::error::ImageError;
use crate::image::{GenericImageColors, GenericImageTo, WriteImage};

const PNG_SIGNATURE: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
const COMPRESSION_LEVEL: u8 = 6;

/// 8-bit truecolor PNG writer: signature, IHDR, one zlib IDAT, IEND.
pub struct PngImage {}

fn color_type(colors: &GenericImageColors) -> u8 {
    match colors {
        GenericImageColors::RGB => 2,
        GenericImageColors::RGBA => 6,
    }
}

fn write_chunk<W: Write>(w: &mut W, name: &[u8; 4], data: &[u8]) -> Result<(), ImageError> {
    w.write_all(&(data.len() as u32).to_be_bytes())?;
    w.write_all(name)?;
    w.write_all(data)?;

    // chunk crc covers the name and the data, not the length
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(name);
    hasher.update(data);
    w.write_all(&hasher.finalize().to_be_bytes())?;
    Ok(())
}

fn ihdr_data(width: u32, height: u32, colors: &GenericImageColors) -> [u8; 13] {
    let mut data = [0u8; 13];
    data[..4].copy_from_slice(&width.to_be_bytes());
    data[4..8].copy_from_slice(&height.to_be_bytes());
    data[8] = 8; // bit depth
    data[9] = color_type(colors);
    // compression, filter and interlace methods stay 0
    data
}

fn filtered_scanlines(data: &[u8], scanline_len: usize) -> Vec<u8> {
    let mut raw = Vec::with_capacity(data.len() + data.len() / scanline_len);
    for scanline in data.chunks(scanline_len) {
        raw.push(0); // filter type None
        raw.extend_from_slice(scanline);
    }
    raw
}

impl<W: Write, I: GenericImageTo> WriteImage<W, I> for PngImage {
    fn write_image(writer: W, image: &I) -> Result<(), ImageError> {
        let mut buf = BufWriter::new(writer);
        let img = image.to_rgba()?;
        let scanline_len = img.width as usize * img.colors.bytes_per_pixel();

        buf.write_all(&PNG_SIGNATURE)?;
        write_chunk(&mut buf, b"IHDR", &ihdr_data(img.width, img.height, &img.colors))?;

        let raw = filtered_scanlines(&img.data, scanline_len);
        let compressed = compress_to_vec_zlib(&raw, COMPRESSION_LEVEL);
        debug!(
            "idat: {} filtered bytes compressed to {}",
            raw.len(),
            compressed.len()
        );
        write_chunk(&mut buf, b"IDAT", &compressed)?;

        write_chunk(&mut buf, b"IEND", &[])?;
        buf.flush()?;
        Ok(())
    }
}

#[cfg(test)]
use crate::codecs::ppm::PpmImage;
#[cfg(test)]
use crate::image::ReadImage;
#[cfg(test)]
use std::convert::TryInto;

#[cfg(test)]
fn encode(input: &str) -> Vec<u8> {
    let image = PpmImage::read_image(input.as_bytes()).unwrap();
    let mut out: Vec<u8> = Vec::new();
    PngImage::write_image(&mut out, &*image).unwrap();
    out
}

#[cfg(test)]
fn chunk_at(png: &[u8], offset: usize) -> (&str, &[u8], usize) {
    let len = u32::from_be_bytes(png[offset..offset + 4].try_into().unwrap()) as usize;
    let name = std::str::from_utf8(&png[offset + 4..offset + 8]).unwrap();
    let data = &png[offset + 8..offset + 8 + len];

    let mut hasher = crc32fast::Hasher::new();
    hasher.update(name.as_bytes());
    hasher.update(data);
    let crc = u32::from_be_bytes(png[offset + 8 + len..offset + 12 + len].try_into().unwrap());
    assert_eq!(hasher.finalize(), crc, "bad crc on {} chunk", name);

    (name, data, offset + 12 + len)
}

#[test]
fn test_encode_signature_and_chunk_order() {
    let png = encode("P3\n2 1\n255\n255 0 0\n0 255 0\n");
    assert_eq!(png[..8], PNG_SIGNATURE);

    let (name, _, next) = chunk_at(&png, 8);
    assert_eq!(name, "IHDR");
    let (name, _, next) = chunk_at(&png, next);
    assert_eq!(name, "IDAT");
    let (name, data, next) = chunk_at(&png, next);
    assert_eq!(name, "IEND");
    assert!(data.is_empty());
    assert_eq!(next, png.len());
}

#[test]
fn test_encode_ihdr_fields() {
    let png = encode("P3\n2 3\n255\n0 0 0\n0 0 0\n0 0 0\n0 0 0\n0 0 0\n0 0 0\n");
    let (_, ihdr, _) = chunk_at(&png, 8);

    assert_eq!(ihdr.len(), 13);
    assert_eq!(u32::from_be_bytes(ihdr[..4].try_into().unwrap()), 2);
    assert_eq!(u32::from_be_bytes(ihdr[4..8].try_into().unwrap()), 3);
    assert_eq!(ihdr[8], 8); // bit depth
    assert_eq!(ihdr[9], 6); // truecolor with alpha
    assert_eq!(&ihdr[10..], &[0, 0, 0]);
}

#[test]
fn test_encode_idat_scanlines() {
    use miniz_oxide::inflate::decompress_to_vec_zlib;

    let png = encode("P3\n2 2\n255\n255 0 0\n0 255 0\n0 0 255\n255 255 255\n");
    let (_, _, after_ihdr) = chunk_at(&png, 8);
    let (name, idat, _) = chunk_at(&png, after_ihdr);
    assert_eq!(name, "IDAT");

    let raw = decompress_to_vec_zlib(idat).unwrap();
    assert_eq!(
        raw,
        vec![
            0, 255, 0, 0, 255, 0, 255, 0, 255, // first scanline, filter None
            0, 0, 0, 255, 255, 255, 255, 255, 255, // second scanline
        ]
    );
}

#[test]
fn test_encode_alpha_always_opaque() {
    use miniz_oxide::inflate::decompress_to_vec_zlib;

    let png = encode("P3\n3 1\n100\n0 1 2\n50 50 50\n100 100 100\n");
    let (_, _, after_ihdr) = chunk_at(&png, 8);
    let (_, idat, _) = chunk_at(&png, after_ihdr);

    let raw = decompress_to_vec_zlib(idat).unwrap();
    for pixel in raw[1..].chunks(4) {
        assert_eq!(pixel[3], 255);
    }
}
