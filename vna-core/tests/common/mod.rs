#![allow(dead_code)]

use std::collections::HashMap;
use std::ffi::OsStr;
use std::io;
use std::os::unix::process::ExitStatusExt;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Output};
use std::sync::Mutex;

use serde_json::Value;

use vna_core::CommandRunner;

pub const FRAME_WIDTH: u32 = 320;
pub const FRAME_HEIGHT: u32 = 180;

pub fn fixture(name: &str) -> Value {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures/ffprobe")
        .join(format!("{name}.json"));
    let contents = std::fs::read_to_string(&path).expect("fixture readable");
    serde_json::from_str(&contents).expect("fixture is json")
}

/// How the fake ffmpeg handles one `-ss` position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frame {
    Jpeg,
    /// Leaves half a file behind and exits non-zero.
    ExitFailure,
    /// Exits zero but writes bytes that are not an image.
    Corrupt,
    SpawnError,
}

/// Scripted stand-in for ffprobe and ffmpeg, told apart by program name.
pub struct FakeTools {
    report: Option<Value>,
    frames: HashMap<String, Frame>,
    default_frame: Frame,
    pub calls: Mutex<Vec<(PathBuf, Vec<String>)>>,
}

impl FakeTools {
    pub fn new() -> Self {
        Self {
            report: None,
            frames: HashMap::new(),
            default_frame: Frame::Jpeg,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_report(mut self, report: Value) -> Self {
        self.report = Some(report);
        self
    }

    pub fn with_frame(mut self, seek: &str, frame: Frame) -> Self {
        self.frames.insert(seek.to_string(), frame);
        self
    }

    pub fn with_default_frame(mut self, frame: Frame) -> Self {
        self.default_frame = frame;
        self
    }

    pub fn ffmpeg_calls(&self) -> Vec<Vec<String>> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(program, args)| is_named(program, "ffmpeg") && args != &["-version"])
            .map(|(_, args)| args.clone())
            .collect()
    }

    fn probe(&self) -> io::Result<Output> {
        match &self.report {
            Some(report) => Ok(output(0, serde_json::to_vec(report).unwrap(), Vec::new())),
            None => Ok(output(1, Vec::new(), b"Invalid data found".to_vec())),
        }
    }

    fn extract(&self, args: &[String]) -> io::Result<Output> {
        let seek = args
            .iter()
            .position(|arg| arg == "-ss")
            .map(|at| args[at + 1].clone())
            .unwrap_or_default();
        let target = PathBuf::from(args.last().unwrap());
        let frame = self.frames.get(&seek).copied().unwrap_or(self.default_frame);
        match frame {
            Frame::Jpeg => {
                image::RgbImage::from_pixel(FRAME_WIDTH, FRAME_HEIGHT, image::Rgb([16, 32, 48]))
                    .save(&target)
                    .map_err(|err| io::Error::new(io::ErrorKind::Other, err.to_string()))?;
                Ok(output(0, Vec::new(), Vec::new()))
            }
            Frame::ExitFailure => {
                std::fs::write(&target, [0xFF, 0xD8, 0xFF])?;
                Ok(output(1, Vec::new(), b"Conversion failed!".to_vec()))
            }
            Frame::Corrupt => {
                std::fs::write(&target, b"definitely not a jpeg")?;
                Ok(output(0, Vec::new(), Vec::new()))
            }
            Frame::SpawnError => Err(io::Error::new(io::ErrorKind::NotFound, "ffmpeg not found")),
        }
    }
}

impl CommandRunner for FakeTools {
    fn output(&self, command: &mut Command) -> io::Result<Output> {
        let program = PathBuf::from(command.get_program());
        let args: Vec<String> = command
            .get_args()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect();
        self.calls
            .lock()
            .unwrap()
            .push((program.clone(), args.clone()));

        if args == ["-version"] {
            let name = program.file_name().and_then(OsStr::to_str).unwrap_or("tool");
            return Ok(output(0, format!("{name} version test\n").into_bytes(), Vec::new()));
        }
        if is_named(&program, "ffprobe") {
            self.probe()
        } else {
            self.extract(&args)
        }
    }
}

fn is_named(program: &Path, needle: &str) -> bool {
    program
        .file_name()
        .and_then(OsStr::to_str)
        .is_some_and(|name| name.contains(needle))
}

fn output(code: i32, stdout: Vec<u8>, stderr: Vec<u8>) -> Output {
    Output {
        status: ExitStatus::from_raw(code << 8),
        stdout,
        stderr,
    }
}
