//! Georeferencing through the GDAL command-line tools.
//!
//! Two subprocesses are involved:
//!
//! 1. `gdaltransform` reprojects the mosaic's lon/lat corners from
//!    EPSG:4326 into EPSG:3857 (corners on stdin, `x y` pairs on stdout).
//! 2. `gdal_translate` copies the raster while stamping the projected
//!    bounding box and spatial reference onto it.
//!
//! Processes are started with an argument vector, never through a shell.

use std::ffi::{OsStr, OsString};
use std::io::{self, Write};
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::coord::LatLonBounds;

/// Spatial reference of the lon/lat corners.
pub const SOURCE_SRS: &str = "EPSG:4326";

/// Spatial reference stamped onto mosaics.
pub const TARGET_SRS: &str = "EPSG:3857";

pub const DEFAULT_TRANSFORM_PROGRAM: &str = "gdaltransform";
pub const DEFAULT_TRANSLATE_PROGRAM: &str = "gdal_translate";

/// Georeferencing failures. All of them are recoverable for the caller.
#[derive(Debug, Error)]
pub enum GeorefError {
    #[error("{program} not found")]
    ToolMissing { program: String },

    #[error("Failed to run {program}: {source}")]
    Io { program: String, source: io::Error },

    #[error("{program} exited with status {code:?}: {stderr}")]
    NonZeroExit {
        program: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("Unexpected output from {program}: {output:?}")]
    UnparseableOutput { program: String, output: String },
}

/// Captured result of a finished subprocess.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// Successful exit with the given stdout.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            success: true,
            code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }
}

/// Runs external programs.
pub trait CommandRunner: Send + Sync {
    /// Runs `program` with `args`, feeding `stdin` if given, and waits for it.
    ///
    /// A non-zero exit is reported through [`CommandOutput::success`], not
    /// as an error.
    fn run(
        &self,
        program: &str,
        args: &[OsString],
        stdin: Option<&str>,
    ) -> Result<CommandOutput, GeorefError>;
}

impl<T: CommandRunner + ?Sized> CommandRunner for Arc<T> {
    fn run(
        &self,
        program: &str,
        args: &[OsString],
        stdin: Option<&str>,
    ) -> Result<CommandOutput, GeorefError> {
        (**self).run(program, args, stdin)
    }
}

/// Runs programs with [`std::process::Command`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemCommandRunner;

impl CommandRunner for SystemCommandRunner {
    fn run(
        &self,
        program: &str,
        args: &[OsString],
        stdin: Option<&str>,
    ) -> Result<CommandOutput, GeorefError> {
        let io_err = |source: io::Error| GeorefError::Io {
            program: program.to_string(),
            source,
        };

        let mut child = Command::new(program)
            .args(args)
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| match e.kind() {
                io::ErrorKind::NotFound => GeorefError::ToolMissing {
                    program: program.to_string(),
                },
                _ => io_err(e),
            })?;

        if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
            pipe.write_all(input.as_bytes()).map_err(io_err)?;
        }

        let output = child.wait_with_output().map_err(io_err)?;

        Ok(CommandOutput {
            success: output.status.success(),
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Output driver passed to `gdal_translate -of`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RasterFormat {
    Jpeg,
    GTiff,
}

impl RasterFormat {
    /// JPEG for `.jpg`/`.jpeg` files, GeoTIFF for everything else.
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(OsStr::to_str)
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("jpg") | Some("jpeg") => RasterFormat::Jpeg,
            _ => RasterFormat::GTiff,
        }
    }

    pub fn driver_name(&self) -> &'static str {
        match self {
            RasterFormat::Jpeg => "JPEG",
            RasterFormat::GTiff => "GTiff",
        }
    }
}

/// A point in the target spatial reference (meters for EPSG:3857).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectedPoint {
    pub x: f64,
    pub y: f64,
}

/// Drives the two GDAL steps.
#[derive(Debug, Clone)]
pub struct Georeferencer<R> {
    runner: R,
    transform_program: String,
    translate_program: String,
}

impl<R: CommandRunner> Georeferencer<R> {
    pub fn new(runner: R) -> Self {
        Self::with_programs(runner, DEFAULT_TRANSFORM_PROGRAM, DEFAULT_TRANSLATE_PROGRAM)
    }

    /// Uses custom program names or paths for the two tools.
    pub fn with_programs(
        runner: R,
        transform_program: impl Into<String>,
        translate_program: impl Into<String>,
    ) -> Self {
        Self {
            runner,
            transform_program: transform_program.into(),
            translate_program: translate_program.into(),
        }
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Reprojects (lon, lat) corners into the target spatial reference.
    pub fn reproject(&self, corners: [(f64, f64); 2]) -> Result<[ProjectedPoint; 2], GeorefError> {
        let program = self.transform_program.as_str();
        let args: Vec<OsString> = ["-s_srs", SOURCE_SRS, "-t_srs", TARGET_SRS, "-output_xy"]
            .iter()
            .map(OsString::from)
            .collect();
        let input: String = corners
            .iter()
            .map(|(lon, lat)| format!("{:.7} {:.7}\n", lon, lat))
            .collect();

        let output = self.run_checked(program, &args, Some(&input))?;
        parse_points(program, &output.stdout)
    }

    /// Writes `dst` as a copy of `src` tagged with the projected bounds.
    pub fn stamp(
        &self,
        format: RasterFormat,
        upper_left: ProjectedPoint,
        lower_right: ProjectedPoint,
        src: &Path,
        dst: &Path,
    ) -> Result<(), GeorefError> {
        let mut args: Vec<OsString> = vec![
            "-of".into(),
            format.driver_name().into(),
            "-a_srs".into(),
            TARGET_SRS.into(),
            "-a_ullr".into(),
        ];
        for value in [upper_left.x, upper_left.y, lower_right.x, lower_right.y] {
            args.push(value.to_string().into());
        }
        args.push(src.as_os_str().to_owned());
        args.push(dst.as_os_str().to_owned());

        self.run_checked(&self.translate_program, &args, None)?;
        Ok(())
    }

    /// Reprojects `bounds` and stamps `src` into `dst`.
    pub fn georeference(
        &self,
        bounds: &LatLonBounds,
        src: &Path,
        dst: &Path,
    ) -> Result<[ProjectedPoint; 2], GeorefError> {
        let [upper_left, lower_right] = self.reproject([
            (bounds.lon_min, bounds.lat_max),
            (bounds.lon_max, bounds.lat_min),
        ])?;
        self.stamp(RasterFormat::from_path(dst), upper_left, lower_right, src, dst)?;
        Ok([upper_left, lower_right])
    }

    fn run_checked(
        &self,
        program: &str,
        args: &[OsString],
        stdin: Option<&str>,
    ) -> Result<CommandOutput, GeorefError> {
        info!(
            program,
            args = ?args,
            "Running georeferencing tool"
        );
        let output = self.runner.run(program, args, stdin)?;
        if !output.success {
            return Err(GeorefError::NonZeroExit {
                program: program.to_string(),
                code: output.code,
                stderr: output.stderr.trim().to_string(),
            });
        }
        Ok(output)
    }
}

fn parse_points(program: &str, stdout: &str) -> Result<[ProjectedPoint; 2], GeorefError> {
    let unparseable = || GeorefError::UnparseableOutput {
        program: program.to_string(),
        output: stdout.to_string(),
    };

    let mut points = stdout
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            let mut fields = line.split_whitespace().map(str::parse::<f64>);
            match (fields.next(), fields.next()) {
                (Some(Ok(x)), Some(Ok(y))) => Some(ProjectedPoint { x, y }),
                _ => None,
            }
        });

    match (points.next(), points.next()) {
        (Some(Some(first)), Some(Some(second))) => Ok([first, second]),
        _ => Err(unparseable()),
    }
}
