//! Run inputs taken from the environment: credential, task text, images.
//!
//! All of these are checked before the agent is started. Any problem here
//! is fatal for the run.

use crate::driver::options::{ImageAttachment, LoadedImage};
use crate::utils::paths::resolve_against;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const API_KEY_VAR: &str = "ANTHROPIC_API_KEY";
pub const TASK_VAR: &str = "AGENT_TASK";
pub const IMAGES_VAR: &str = "AGENT_IMAGES";

/// Upper bound on task text, from either the environment or a file.
pub const MAX_TASK_BYTES: usize = 1024 * 1024;

#[derive(Debug, Error)]
pub enum InputError {
    #[error("{0} environment variable is not set")]
    MissingEnv(&'static str),

    #[error("AGENT_IMAGES is not a valid image list")]
    InvalidImages(#[source] serde_json::Error),

    #[error("failed to read image {path}")]
    ImageRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read task file {path}")]
    TaskFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("task file {0} is empty")]
    EmptyTaskFile(PathBuf),

    #[error("task is {size} bytes; the limit is {limit}")]
    TaskTooLarge { size: usize, limit: usize },
}

/// Validated inputs for one run.
#[derive(Debug, Clone)]
pub struct RunInputs {
    pub task: String,
    pub images: Vec<LoadedImage>,
}

/// Where the inputs come from. Tests pass a map instead of the real env.
pub struct InputSource<F> {
    lookup: F,
    task_file: Option<PathBuf>,
    /// Relative image paths resolve against this
    base_dir: PathBuf,
}

impl InputSource<fn(&str) -> Option<String>> {
    /// Read from the process environment.
    pub fn from_env(task_file: Option<PathBuf>, base_dir: PathBuf) -> Self {
        fn lookup(name: &str) -> Option<String> {
            std::env::var(name).ok()
        }
        InputSource {
            lookup: lookup as fn(&str) -> Option<String>,
            task_file,
            base_dir,
        }
    }
}

impl<F> InputSource<F>
where
    F: Fn(&str) -> Option<String>,
{
    pub fn with_lookup(lookup: F, task_file: Option<PathBuf>, base_dir: PathBuf) -> Self {
        Self {
            lookup,
            task_file,
            base_dir,
        }
    }

    /// Set-but-empty counts as unset.
    fn var(&self, name: &str) -> Option<String> {
        (self.lookup)(name).filter(|v| !v.trim().is_empty())
    }

    /// Credential first, then task, then images.
    pub fn load(&self) -> Result<RunInputs, InputError> {
        self.var(API_KEY_VAR)
            .ok_or(InputError::MissingEnv(API_KEY_VAR))?;

        let task = self.load_task()?;
        let images = self.load_images()?;

        Ok(RunInputs { task, images })
    }

    fn load_task(&self) -> Result<String, InputError> {
        let task = match &self.task_file {
            Some(path) => {
                let path = resolve_against(&self.base_dir, path);
                let size = std::fs::metadata(&path)
                    .map_err(|source| InputError::TaskFile {
                        path: path.clone(),
                        source,
                    })?
                    .len() as usize;
                check_task_size(size)?;
                let text = std::fs::read_to_string(&path).map_err(|source| {
                    InputError::TaskFile {
                        path: path.clone(),
                        source,
                    }
                })?;
                if text.trim().is_empty() {
                    return Err(InputError::EmptyTaskFile(path));
                }
                text
            }
            None => self.var(TASK_VAR).ok_or(InputError::MissingEnv(TASK_VAR))?,
        };
        check_task_size(task.len())?;
        Ok(task)
    }

    fn load_images(&self) -> Result<Vec<LoadedImage>, InputError> {
        let raw = match self.var(IMAGES_VAR) {
            Some(raw) => raw,
            None => return Ok(Vec::new()),
        };
        let attachments: Vec<ImageAttachment> =
            serde_json::from_str(&raw).map_err(InputError::InvalidImages)?;

        attachments
            .iter()
            .map(|attachment| load_image(&self.base_dir, attachment))
            .collect()
    }
}

fn check_task_size(size: usize) -> Result<(), InputError> {
    if size > MAX_TASK_BYTES {
        return Err(InputError::TaskTooLarge {
            size,
            limit: MAX_TASK_BYTES,
        });
    }
    Ok(())
}

fn load_image(base_dir: &Path, attachment: &ImageAttachment) -> Result<LoadedImage, InputError> {
    let path = resolve_against(base_dir, &attachment.path);
    let bytes = std::fs::read(&path).map_err(|source| InputError::ImageRead {
        path: path.clone(),
        source,
    })?;
    tracing::debug!("Attached {} ({} bytes)", path.display(), bytes.len());
    Ok(LoadedImage::from_bytes(attachment.media_type, &bytes))
}
