//! Image I/O adaptors: PNG, JPEG, MJPG-by-index loaders, and PNG/JPEG
//! storers. These are the only place the crate talks to `image` and to the
//! MJPG index binary format.
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use byteorder::{BigEndian, ReadBytesExt};
use image::{DynamicImage, GenericImageView, ImageFormat};

use crate::buffer::BufferStore;
use crate::error::LoadError;
use crate::pixel::Argb8;

fn io_err(e: std::io::Error) -> LoadError {
    LoadError::Io(e.to_string())
}

/// Decode `bytes` under the given format and install into register `i`,
/// enforcing that the decoded dimensions match the register's declared
/// `(w, h)`. On any failure the register is left (or made) unloaded.
fn decode_into_register(
    store: &mut BufferStore,
    i: usize,
    bytes: &[u8],
    format: ImageFormat,
) -> Result<(), LoadError> {
    let (w, h, channels) = store.dims_channels(i);
    let result = image::load_from_memory_with_format(bytes, format)
        .map_err(|e| LoadError::Decode(e.to_string()))
        .and_then(|img| install_from_dynamic_image(store, i, w, h, channels, img));

    if result.is_err() {
        store.take_pixels(i);
    }
    result
}

fn install_from_dynamic_image(
    store: &mut BufferStore,
    i: usize,
    w: u32,
    h: u32,
    channels: u8,
    img: DynamicImage,
) -> Result<(), LoadError> {
    let (iw, ih) = img.dimensions();
    if iw != w || ih != h {
        return Err(LoadError::DimensionMismatch { expected: (w, h), found: (iw, ih) });
    }
    let rgba = img.to_rgba8();
    let mut pixels = vec![0u8; w as usize * h as usize * channels as usize];
    let stride = channels as usize;
    for (idx, px) in rgba.pixels().enumerate() {
        let colour = Argb8::new(px[3], px[0], px[1], px[2]);
        colour.write(&mut pixels[idx * stride..idx * stride + stride], channels);
    }
    store.install_pixels(i, pixels);
    Ok(())
}

pub fn load_png(store: &mut BufferStore, i: usize, path: &Path) -> Result<(), LoadError> {
    let bytes = fs::read(path).map_err(io_err)?;
    decode_into_register(store, i, &bytes, ImageFormat::Png)
}

pub fn load_jpeg(store: &mut BufferStore, i: usize, path: &Path) -> Result<(), LoadError> {
    let bytes = fs::read(path).map_err(io_err)?;
    decode_into_register(store, i, &bytes, ImageFormat::Jpeg)
}

/// The companion JPEG-stream file for an index path: the index path minus
/// its last extension (`movie.mjpg.ix` -> `movie.mjpg`).
fn companion_path(index_path: &Path) -> PathBuf {
    index_path.with_extension("")
}

/// Parse an MJPG index file: a big-endian `u64` record count followed by
/// that many big-endian `u64` byte offsets, required to be non-negative
/// (automatic for `u64`) and strictly ascending.
fn read_index(index_path: &Path) -> Result<Vec<u64>, LoadError> {
    let mut file = fs::File::open(index_path).map_err(io_err)?;
    let count = file.read_u64::<BigEndian>().map_err(|e| {
        LoadError::MalformedIndex(format!("could not read record count: {}", e))
    })?;
    let mut offsets = Vec::with_capacity(count as usize);
    for idx in 0..count {
        let offset = file.read_u64::<BigEndian>().map_err(|e| {
            LoadError::MalformedIndex(format!("truncated at record {}: {}", idx, e))
        })?;
        if let Some(&prev) = offsets.last() {
            if offset <= prev {
                return Err(LoadError::MalformedIndex(format!(
                    "offsets must be strictly ascending (record {}: {} <= {})",
                    idx, offset, prev
                )));
            }
        }
        offsets.push(offset);
    }
    Ok(offsets)
}

/// Load frame `f` of the MJPG stream named by `index_path` into register
/// `i`, reusing the JPEG decode path.
pub fn load_mjpg(
    store: &mut BufferStore,
    i: usize,
    f: i64,
    index_path: &Path,
) -> Result<(), LoadError> {
    let offsets = read_index(index_path)?;
    if f < 0 || f as u64 >= offsets.len() as u64 {
        return Err(LoadError::FrameIndexOutOfRange { requested: f, count: offsets.len() as u64 });
    }
    let start = offsets[f as usize];
    let companion = companion_path(index_path);
    let mut file = fs::File::open(&companion).map_err(io_err)?;
    let file_len = file.metadata().map_err(io_err)?.len();
    let end = offsets.get(f as usize + 1).copied().unwrap_or(file_len);
    if start > file_len || end > file_len || start >= end {
        return Err(LoadError::MalformedIndex(format!(
            "frame {} offset {} out of bounds for a {}-byte file",
            f, start, file_len
        )));
    }
    use std::io::Seek;
    file.seek(std::io::SeekFrom::Start(start)).map_err(io_err)?;
    let mut bytes = vec![0u8; (end - start) as usize];
    file.read_exact(&mut bytes).map_err(io_err)?;
    decode_into_register(store, i, &bytes, ImageFormat::Jpeg)
}

/// Build an RGBA8 `image::DynamicImage` view of a loaded register, up- or
/// down-converting each pixel through its declared channel encoding.
fn to_dynamic_image(store: &BufferStore, i: usize) -> DynamicImage {
    let (w, h, channels) = store.dims_channels(i);
    let pixels =
        store.pixels(i).unwrap_or_else(|| crate::error::vm_fault!("store on unloaded buffer {}", i));
    let stride = channels as usize;
    let mut rgba = image::RgbaImage::new(w, h);
    for (idx, px) in rgba.pixels_mut().enumerate() {
        let colour = Argb8::read(&pixels[idx * stride..idx * stride + stride], channels);
        *px = image::Rgba([colour.r, colour.g, colour.b, colour.a]);
    }
    DynamicImage::ImageRgba8(rgba)
}

pub fn store_png(store: &BufferStore, i: usize, path: &Path) -> Result<(), LoadError> {
    let img = to_dynamic_image(store, i);
    img.save_with_format(path, ImageFormat::Png).map_err(|e| LoadError::Encode(e.to_string()))
}

/// Build an opaque RGB8 image from a register, reading each pixel as
/// [`Argb8`] and calling `down_to_rgb` directly. `image`'s own
/// `Rgba -> Rgb` conversion (as reached through `DynamicImage::to_rgb8`)
/// drops alpha rather than compositing over black, which would silently
/// mis-render a translucent 4-channel buffer.
fn to_rgb_image(store: &BufferStore, i: usize) -> image::RgbImage {
    let (w, h, channels) = store.dims_channels(i);
    let pixels =
        store.pixels(i).unwrap_or_else(|| crate::error::vm_fault!("store on unloaded buffer {}", i));
    let stride = channels as usize;
    let mut rgb = image::RgbImage::new(w, h);
    for (idx, px) in rgb.pixels_mut().enumerate() {
        let (r, g, b) = Argb8::read(&pixels[idx * stride..idx * stride + stride], channels).down_to_rgb();
        *px = image::Rgb([r, g, b]);
    }
    rgb
}

/// Store as JPEG (or append to an MJPG stream). JPEG has no alpha channel,
/// so ARGB buffers are composited over opaque black first, matching the
/// down-conversion the pixel module already defines.
pub fn store_jpeg(
    store: &BufferStore,
    i: usize,
    path: &Path,
    mjpg: bool,
    quality: u8,
) -> Result<(), LoadError> {
    let quality = quality.min(100);
    let img = to_rgb_image(store, i);

    let mut bytes = Vec::new();
    {
        let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut bytes, quality);
        encoder
            .encode(&img, img.width(), img.height(), image::ColorType::Rgb8)
            .map_err(|e| LoadError::Encode(e.to_string()))?;
    }

    if mjpg {
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(io_err)?;
        file.write_all(&bytes).map_err(io_err)?;
    } else {
        fs::write(path, &bytes).map_err(io_err)?;
    }
    Ok(())
}
