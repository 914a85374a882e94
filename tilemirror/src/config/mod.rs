//! Configuration file support.
//!
//! Settings are read from an INI file, by default
//! `<config_dir>/tilemirror/config.ini`:
//!
//! ```ini
//! [output]
//! root = ./OfflineMap
//!
//! [download]
//! active_window = 120   ; seconds
//! idle_window = 30      ; seconds, 0 disables the duty cycle
//! workers = 1           ; 1 = sequential
//! timeout = 30          ; HTTP timeout in seconds
//!
//! [georef]
//! transform_program = gdaltransform
//! translate_program = gdal_translate
//! ```
//!
//! A missing file yields the defaults. Missing keys keep their defaults.
//! Command-line flags override anything read here.

mod file;
mod parser;

pub use file::{
    config_directory, config_file_path, ConfigFile, ConfigFileError, DownloadSettings,
    GeorefSettings, OutputSettings,
};
