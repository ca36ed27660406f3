//! Reading and writing image files.
//!
//! Colour images are loaded as RGBA8 from any format the `image` crate was
//! built with and always written as PNG. Single channel images use the binary
//! PGM flavour of PNM.
use crate::core::Error;
use crate::source::SourceImage;
use image::codecs::pnm::{PnmEncoder, PnmSubtype, SampleEncoding};
use image::{
    ColorType, DynamicImage, ExtendedColorType, GrayImage, ImageEncoder, ImageFormat, RgbaImage,
};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

fn load_error(path: &Path, reason: impl ToString) -> Error {
    Error::ImageLoad {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

fn write_error(path: &Path, reason: impl ToString) -> Error {
    Error::OutputWrite {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

fn open(path: &Path) -> Result<DynamicImage, Error> {
    image::ImageReader::open(path)
        .map_err(|e| load_error(path, e))?
        .with_guessed_format()
        .map_err(|e| load_error(path, e))?
        .decode()
        .map_err(|e| load_error(path, e))
}

/// Loads an 8 bit per channel image and expands it to RGBA8.
pub fn load_rgba(path: &Path) -> Result<SourceImage, Error> {
    let image = open(path)?;
    match image.color() {
        ColorType::L8 | ColorType::La8 | ColorType::Rgb8 | ColorType::Rgba8 => {}
        other => {
            return Err(load_error(
                path,
                format!("unsupported pixel layout {:?}, expected 8 bits per channel", other),
            ))
        }
    }
    let image = image.into_rgba8();
    if image.width() == 0 || image.height() == 0 {
        return Err(load_error(path, "image is empty"));
    }
    log::debug!(
        "loaded `{}` ({}x{})",
        path.display(),
        image.width(),
        image.height()
    );
    Ok(SourceImage::from(image))
}

/// Loads a single channel, 8 bit image.
pub fn load_gray(path: &Path) -> Result<GrayImage, Error> {
    match open(path)? {
        DynamicImage::ImageLuma8(image) => Ok(image),
        other => Err(load_error(
            path,
            format!(
                "expected an 8 bit single channel image, found {:?}",
                other.color()
            ),
        )),
    }
}

/// Writes `image` as PNG, whatever the extension of `path`.
pub fn save_png(path: &Path, image: &RgbaImage) -> Result<(), Error> {
    image
        .save_with_format(path, ImageFormat::Png)
        .map_err(|e| write_error(path, e))
}

/// Writes `image` as a binary (`P5`) PGM.
pub fn save_pgm(path: &Path, image: &GrayImage) -> Result<(), Error> {
    let mut writer = BufWriter::new(File::create(path).map_err(|e| write_error(path, e))?);
    PnmEncoder::new(&mut writer)
        .with_subtype(PnmSubtype::Graymap(SampleEncoding::Binary))
        .write_image(
            image.as_raw(),
            image.width(),
            image.height(),
            ExtendedColorType::L8,
        )
        .map_err(|e| write_error(path, e))?;
    writer.flush().map_err(|e| write_error(path, e))
}

/// Luma rendition of a colour image.
pub fn to_gray(image: &RgbaImage) -> GrayImage {
    image::imageops::grayscale(image)
}
