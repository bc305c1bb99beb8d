use std::{
    collections::VecDeque,
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};

use crate::{
    controller::{Acquired, FrameSource},
    error::StartupError,
    types::Frame,
};

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

/// Replays a directory of still images as a video stream, in file-name order.
pub struct ImageReplay {
    pending: VecDeque<PathBuf>,
}

impl ImageReplay {
    pub fn open(dir: &Path) -> Result<Self, StartupError> {
        let entries = fs::read_dir(dir).map_err(|source| StartupError::UnreadableArtifact {
            what: "replay directory",
            path: dir.to_path_buf(),
            source,
        })?;

        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| is_image(path))
            .collect();
        paths.sort();

        log::info!("replaying {} images from {}", paths.len(), dir.display());
        Ok(Self {
            pending: paths.into(),
        })
    }

    pub fn remaining(&self) -> usize {
        self.pending.len()
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
}

fn load_frame(path: &Path) -> Result<Frame> {
    let image = image::open(path)
        .with_context(|| format!("failed to decode {}", path.display()))?
        .to_rgba8();
    let (width, height) = image.dimensions();
    Ok(Frame::new(image.into_raw(), width, height))
}

impl FrameSource for ImageReplay {
    fn read_frame(&mut self) -> Acquired {
        let Some(path) = self.pending.pop_front() else {
            return Acquired::Closed;
        };
        match load_frame(&path) {
            Ok(frame) => {
                log::trace!("replaying {} ({} left)", path.display(), self.remaining());
                Acquired::Frame(frame)
            }
            Err(err) => {
                log::debug!("skipping replay image: {err:?}");
                Acquired::Unavailable
            }
        }
    }

    fn release(&mut self) {
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_extension_filter() {
        assert!(is_image(Path::new("frames/0001.png")));
        assert!(is_image(Path::new("frames/0002.JPG")));
        assert!(is_image(Path::new("a.jpeg")));
        assert!(!is_image(Path::new("notes.txt")));
        assert!(!is_image(Path::new("no_extension")));
    }

    #[test]
    fn test_missing_directory_is_startup_error() {
        let err = ImageReplay::open(Path::new("definitely/not/here")).err();
        assert!(matches!(
            err,
            Some(StartupError::UnreadableArtifact { what: "replay directory", .. })
        ));
    }

    #[test]
    fn test_unreadable_image_is_transient_then_closed() {
        let mut replay = ImageReplay {
            pending: VecDeque::from([PathBuf::from("definitely/not/here.png")]),
        };
        assert_eq!(replay.remaining(), 1);
        assert!(matches!(replay.read_frame(), Acquired::Unavailable));
        assert!(matches!(replay.read_frame(), Acquired::Closed));
    }
}
