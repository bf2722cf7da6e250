use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use image::RgbImage;
use crate::error::DetectError;
use crate::Result;

const IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "bmp", "webp"];

/// Source of frames for the loop.
///
/// `Ok(None)` is end-of-stream. An `Err` is a failed acquisition, which the loop also treats as
/// the end of the stream.
pub trait FrameSource {
    fn produce_frame(&mut self) -> Result<Option<RgbImage>>;

    fn describe(&self) -> String;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn produce_frame(&mut self) -> Result<Option<RgbImage>> {
        (**self).produce_frame()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

/// A single still image, produced once.
pub struct ImageFileSource {
    path: PathBuf,
    image: Option<RgbImage>,
}

impl ImageFileSource {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let image = image::open(&path)
            .map_err(|e| DetectError::device_open(&path.display().to_string(), e))?
            .to_rgb8();
        Ok(Self { path, image: Some(image) })
    }
}

impl FrameSource for ImageFileSource {
    fn produce_frame(&mut self) -> Result<Option<RgbImage>> {
        Ok(self.image.take())
    }

    fn describe(&self) -> String {
        format!("image {}", self.path.display())
    }
}

/// Every image in a directory, in file name order.
pub struct ImageDirSource {
    dir: PathBuf,
    pending: VecDeque<PathBuf>,
}

impl ImageDirSource {
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        let shown = dir.display().to_string();
        let entries = fs::read_dir(&dir).map_err(|e| DetectError::device_open(&shown, e))?;

        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && has_image_extension(p))
            .collect();
        paths.sort();

        if paths.is_empty() {
            return Err(DetectError::device_open(&shown, "directory holds no images"));
        }
        log::info!("Found {} images in {}", paths.len(), shown);
        Ok(Self { dir, pending: paths.into() })
    }

    pub fn remaining(&self) -> usize {
        self.pending.len()
    }
}

impl FrameSource for ImageDirSource {
    fn produce_frame(&mut self) -> Result<Option<RgbImage>> {
        let Some(path) = self.pending.pop_front() else {
            return Ok(None);
        };
        let image = image::open(&path)
            .map_err(|e| DetectError::Capture(format!("{}: {}", path.display(), e)))?;
        Ok(Some(image.to_rgb8()))
    }

    fn describe(&self) -> String {
        format!("directory {}", self.dir.display())
    }
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

#[cfg(target_os = "linux")]
pub use v4l2_source::V4l2Source;

#[cfg(target_os = "linux")]
mod v4l2_source {
    use image::RgbImage;
    use v4l::buffer::Type;
    use v4l::io::mmap::Stream;
    use v4l::io::traits::CaptureStream;
    use v4l::video::Capture;
    use v4l::{Device, FourCC};
    use crate::error::DetectError;
    use crate::Result;
    use super::FrameSource;

    /// V4L2 camera delivering YUYV frames, converted to RGB.
    pub struct V4l2Source {
        path: String,
        // the stream holds its own handle to the device, this keeps the format owner alive
        _device: Device,
        stream: Stream<'static>,
        width: u32,
        height: u32,
        stride: u32,
    }

    impl V4l2Source {
        pub fn open(path: &str, width: u32, height: u32) -> Result<Self> {
            let device = Device::with_path(path).map_err(|e| DetectError::device_open(path, e))?;

            let mut format = device.format().map_err(|e| DetectError::device_open(path, e))?;
            format.width = width;
            format.height = height;
            format.fourcc = FourCC::new(b"YUYV");
            let format = device.set_format(&format).map_err(|e| DetectError::device_open(path, e))?;
            if format.fourcc != FourCC::new(b"YUYV") {
                return Err(DetectError::device_open(path, format!("YUYV not supported, device offers {}", format.fourcc)));
            }

            let stream = Stream::with_buffers(&device, Type::VideoCapture, 4)
                .map_err(|e| DetectError::device_open(path, e))?;

            log::info!("Opened {} at {}x{} YUYV, stride {}", path, format.width, format.height, format.stride);
            Ok(Self {
                path: path.to_string(),
                _device: device,
                stream,
                width: format.width,
                height: format.height,
                stride: format.stride,
            })
        }
    }

    impl FrameSource for V4l2Source {
        fn produce_frame(&mut self) -> Result<Option<RgbImage>> {
            let (buffer, meta) = self.stream.next().map_err(|e| DetectError::Capture(e.to_string()))?;
            let used = (meta.bytesused as usize).min(buffer.len());
            let used = if used == 0 { buffer.len() } else { used };

            yuyv_to_rgb(&buffer[..used], self.width, self.height, self.stride)
                .and_then(|rgb| RgbImage::from_raw(self.width, self.height, rgb))
                .map(Some)
                .ok_or_else(|| DetectError::Capture(format!("short frame ({} bytes) from {}", used, self.path)))
        }

        fn describe(&self) -> String {
            format!("camera {} ({}x{})", self.path, self.width, self.height)
        }
    }

    /// Converts a YUYV frame whose rows start `stride` bytes apart. A stride of 0 means tightly
    /// packed rows. `None` if the buffer is shorter than the frame.
    pub(crate) fn yuyv_to_rgb(yuyv: &[u8], width: u32, height: u32, stride: u32) -> Option<Vec<u8>> {
        let row_bytes = width as usize * 2;
        let stride = (stride as usize).max(row_bytes);
        let mut rgb = Vec::with_capacity(width as usize * height as usize * 3);
        for row in 0..height as usize {
            let start = row * stride;
            let line = yuyv.get(start..start + row_bytes)?;
            yuyv_row_to_rgb(line, &mut rgb);
        }
        Some(rgb)
    }

    fn yuyv_row_to_rgb(line: &[u8], rgb: &mut Vec<u8>) {
        for chunk in line.chunks_exact(4) {
            let u = chunk[1] as f32 - 128.0;
            let v = chunk[3] as f32 - 128.0;
            for y in [chunk[0] as f32, chunk[2] as f32] {
                let r = (y + 1.402 * v).clamp(0.0, 255.0) as u8;
                let g = (y - 0.344 * u - 0.714 * v).clamp(0.0, 255.0) as u8;
                let b = (y + 1.772 * u).clamp(0.0, 255.0) as u8;
                rgb.extend_from_slice(&[r, g, b]);
            }
        }
    }

}

/// Opens a frame source from a command-line style spec: `/dev/videoN`, `v4l2:///dev/videoN`,
/// a directory of images, or a single image file.
pub fn open_source(spec: &str, width: u32, height: u32) -> Result<Box<dyn FrameSource>> {
    let device = spec.strip_prefix("v4l2://").unwrap_or(spec);
    if device.starts_with("/dev/video") {
        return open_camera(device, width, height);
    }

    let path = Path::new(spec);
    if path.is_dir() {
        Ok(Box::new(ImageDirSource::open(path)?))
    } else if path.is_file() {
        Ok(Box::new(ImageFileSource::open(path)?))
    } else {
        Err(DetectError::device_open(spec, "no such camera, image, or directory"))
    }
}

#[cfg(target_os = "linux")]
fn open_camera(device: &str, width: u32, height: u32) -> Result<Box<dyn FrameSource>> {
    Ok(Box::new(V4l2Source::open(device, width, height)?))
}

#[cfg(not(target_os = "linux"))]
fn open_camera(device: &str, _width: u32, _height: u32) -> Result<Box<dyn FrameSource>> {
    Err(DetectError::device_open(device, "V4L2 capture is only available on Linux"))
}
