pub mod inputs;
pub mod settings;

pub use inputs::{InputError, InputSource, RunInputs};
pub use settings::Settings;
