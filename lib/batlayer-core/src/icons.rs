use crate::config::IconSize;
use crate::level::{StateId, STATE_COUNT};
use crate::platform::{ElementHandle, IconImage, ImageDecoderImpl};
use log::debug;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Could not open '{}': {source}", path.display())]
    Missing {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Could not decode '{}': {source}", path.display())]
    Malformed {
        path: PathBuf,
        source: png::DecodingError,
    },
    #[error("Could not decode '{}': {reason}", path.display())]
    Unsupported { path: PathBuf, reason: String },
}

/// Where the images for each level live: `<root>/<size>/battery<percent>.png`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IconSet {
    root: PathBuf,
    size: IconSize,
}

impl IconSet {
    pub fn new(root: PathBuf, size: IconSize) -> Self {
        Self { root, size }
    }

    pub fn path_for(&self, state: StateId) -> PathBuf {
        self.root
            .join(self.size.dir_name())
            .join(format!("battery{}.png", state.percent()))
    }
}

/// A decoded image and, while it is on screen, the compositor element showing it.
#[derive(Debug)]
pub struct IconResource {
    state: StateId,
    image: Arc<IconImage>,
    attachment: Option<ElementHandle>,
}

impl IconResource {
    pub fn state(&self) -> StateId {
        self.state
    }

    pub fn image(&self) -> &Arc<IconImage> {
        &self.image
    }

    pub fn attachment(&self) -> Option<ElementHandle> {
        self.attachment
    }

    pub fn is_attached(&self) -> bool {
        self.attachment.is_some()
    }

    pub(crate) fn set_attachment(&mut self, handle: ElementHandle) {
        self.attachment = Some(handle);
    }

    pub(crate) fn take_attachment(&mut self) -> Option<ElementHandle> {
        self.attachment.take()
    }
}

/// Owns one slot per level. A slot is decoded the first time it is asked for and then kept for
/// the rest of the run; nothing is ever evicted.
pub struct IconCache<D: ImageDecoderImpl> {
    decoder: D,
    icon_set: IconSet,
    overrides: [Option<PathBuf>; STATE_COUNT],
    slots: [Option<IconResource>; STATE_COUNT],
}

impl<D: ImageDecoderImpl> IconCache<D> {
    pub fn new(decoder: D, icon_set: IconSet) -> Self {
        Self {
            decoder,
            icon_set,
            overrides: Default::default(),
            slots: Default::default(),
        }
    }

    /// Uses `path` for `state` instead of the icon set's file. Only affects slots not yet loaded.
    pub fn set_override(&mut self, state: StateId, path: PathBuf) {
        self.overrides[state.index()] = Some(path);
    }

    pub fn path_for(&self, state: StateId) -> PathBuf {
        self.overrides[state.index()]
            .clone()
            .unwrap_or_else(|| self.icon_set.path_for(state))
    }

    pub fn get_or_load(&mut self, state: StateId) -> Result<&mut IconResource, DecodeError> {
        let slot = &mut self.slots[state.index()];
        let resource = match slot.take() {
            Some(resource) => resource,
            None => {
                let path = self.overrides[state.index()]
                    .clone()
                    .unwrap_or_else(|| self.icon_set.path_for(state));
                let image = self.decoder.decode(&path)?;
                debug!(
                    "Loaded {} ({}x{}) for {state}",
                    path.display(),
                    image.size.width,
                    image.size.height
                );
                IconResource {
                    state,
                    image: Arc::new(image),
                    attachment: None,
                }
            }
        };

        Ok(slot.insert(resource))
    }

    /// Decodes every level up front, failing on the first image that cannot be loaded.
    pub fn preload_all(&mut self) -> Result<(), DecodeError> {
        for state in StateId::all() {
            self.get_or_load(state)?;
        }
        Ok(())
    }

    /// Returns a slot only if it has already been loaded.
    pub fn get_mut(&mut self, state: StateId) -> Option<&mut IconResource> {
        self.slots[state.index()].as_mut()
    }

    pub fn get(&self, state: StateId) -> Option<&IconResource> {
        self.slots[state.index()].as_ref()
    }

    pub fn loaded_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn attached(&self) -> impl Iterator<Item = &IconResource> {
        self.slots
            .iter()
            .flatten()
            .filter(|resource| resource.is_attached())
    }

    pub fn decoder(&self) -> &D {
        &self.decoder
    }

    pub fn decoder_mut(&mut self) -> &mut D {
        &mut self.decoder
    }
}
