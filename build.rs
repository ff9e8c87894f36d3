use std::env;
use std::path::PathBuf;

fn main() {
    for variable in [
        "FFMPEG_DIR",
        "FFMPEG_PKG_CONFIG_PATH",
        "VCPKG_ROOT",
        "VCPKGRS_DYNAMIC",
        "VCPKGRS_TRIPLET",
    ] {
        println!("cargo:rerun-if-env-changed={variable}");
    }

    // Only Windows builds need help locating FFmpeg; elsewhere pkg-config
    // inside ffmpeg-sys-next does the work.
    if env::var("CARGO_CFG_TARGET_OS").unwrap_or_default() != "windows" {
        return;
    }
    if env::var_os("FFMPEG_DIR").is_some() {
        return;
    }

    let Ok(vcpkg_root) = env::var("VCPKG_ROOT") else {
        println!(
            "cargo:warning=segmux: FFMPEG_DIR is not set. Install FFmpeg (e.g. via vcpkg) and point FFMPEG_DIR at it."
        );
        return;
    };

    let triplet = env::var("VCPKGRS_TRIPLET").unwrap_or_else(|_| "x64-windows".to_string());
    let candidate = PathBuf::from(&vcpkg_root).join("installed").join(&triplet);

    if candidate.exists() {
        println!(
            "cargo:warning=segmux: found vcpkg FFmpeg at {}; set FFMPEG_DIR to it to make discovery explicit.",
            candidate.display(),
        );
    } else {
        println!(
            "cargo:warning=segmux: VCPKG_ROOT is set but {} does not exist.",
            candidate.display(),
        );
    }
}
