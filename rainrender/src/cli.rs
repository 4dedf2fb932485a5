use std::path::PathBuf;

use clap::{value_parser, Arg, ArgAction, Command};

pub const FFMPEG_ENV: &str = "RAINRENDER_FFMPEG";
pub const FFPROBE_ENV: &str = "RAINRENDER_FFPROBE";

pub fn build_cli() -> Command {
    Command::new(env!("CARGO_PKG_NAME"))
        .author(env!("CARGO_PKG_AUTHORS"))
        .about("Render clean, looped and device-targeted ambience files from a rain recording")
        .version(env!("CARGO_PKG_VERSION"))
        .arg(
            Arg::new("rumble")
                .long("rumble")
                .help("Also render a low rumble tone and the distant-storm variant")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("no-echo")
                .long("no-echo")
                .help("Leave the echo off the layered mix")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("dry-run")
                .long("dry-run")
                .help("Print the planned renders and engine commands without running them")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("ffmpeg")
                .long("ffmpeg")
                .value_name("PATH")
                .help("ffmpeg executable used to render")
                .env(FFMPEG_ENV)
                .default_value("ffmpeg")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("ffprobe")
                .long("ffprobe")
                .value_name("PATH")
                .help("ffprobe executable used to measure the input")
                .env(FFPROBE_ENV)
                .default_value("ffprobe")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("file_path")
                .value_name("FILE_PATH")
                .help("Path to the input audio file")
                .required(true)
                .value_parser(value_parser!(PathBuf)),
        )
}
