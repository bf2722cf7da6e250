use std::fs;
use std::path::{Path, PathBuf};
use image::RgbImage;
use crate::error::DetectError;
use crate::Result;

/// Named output surface that takes one annotated frame per call.
pub trait FrameSink {
    fn display(&mut self, image: &RgbImage) -> Result<()>;

    fn name(&self) -> &str;
}

impl<S: FrameSink + ?Sized> FrameSink for Box<S> {
    fn display(&mut self, image: &RgbImage) -> Result<()> {
        (**self).display(image)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Writes frames into a directory, either as `frame_000001.jpg`, `frame_000002.jpg`, ... or as a
/// single `latest.jpg` that is replaced on every frame.
pub struct DirectorySink {
    name: String,
    directory: PathBuf,
    latest_only: bool,
    frame_id: u64,
}

impl DirectorySink {
    pub fn new<P: AsRef<Path>>(directory: P, latest_only: bool) -> Result<Self> {
        let directory = directory.as_ref().to_path_buf();
        fs::create_dir_all(&directory)
            .map_err(|e| DetectError::Display(format!("{}: {}", directory.display(), e)))?;
        Ok(Self {
            name: directory.display().to_string(),
            directory,
            latest_only,
            frame_id: 0,
        })
    }

    /// Path the next frame will be written to.
    pub fn next_path(&self) -> PathBuf {
        if self.latest_only {
            self.directory.join("latest.jpg")
        } else {
            self.directory.join(format!("frame_{:06}.jpg", self.frame_id + 1))
        }
    }

    pub fn frames_written(&self) -> u64 {
        self.frame_id
    }
}

impl FrameSink for DirectorySink {
    fn display(&mut self, image: &RgbImage) -> Result<()> {
        let target = self.next_path();
        let save_err = |e: &dyn std::fmt::Display| DetectError::Display(format!("{}: {}", target.display(), e));

        if self.latest_only {
            // readers never see a half-written file
            let tmp = self.directory.join("latest.tmp.jpg");
            image.save(&tmp).map_err(|e| save_err(&e))?;
            fs::rename(&tmp, &target).map_err(|e| save_err(&e))?;
        } else {
            image.save(&target).map_err(|e| save_err(&e))?;
        }

        self.frame_id += 1;
        log::trace!("Frame {} written to {}", self.frame_id, target.display());
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbered_frames() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = DirectorySink::new(dir.path().join("out"), false).unwrap();
        let img = RgbImage::new(8, 8);
        sink.display(&img).unwrap();
        sink.display(&img).unwrap();
        assert!(dir.path().join("out/frame_000001.jpg").is_file());
        assert!(dir.path().join("out/frame_000002.jpg").is_file());
        assert_eq!(sink.frames_written(), 2);
    }

    #[test]
    fn latest_only_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = DirectorySink::new(dir.path(), true).unwrap();
        let img = RgbImage::new(8, 8);
        sink.display(&img).unwrap();
        sink.display(&img).unwrap();
        assert!(dir.path().join("latest.jpg").is_file());
        assert!(!dir.path().join("latest.tmp.jpg").exists());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
