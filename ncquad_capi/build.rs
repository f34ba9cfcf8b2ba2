//! A build script to install the C header of `ncquad`

use std::env;
use std::fs;
use std::io;
use std::path::PathBuf;

fn main() -> io::Result<()> {
    println!("cargo:rerun-if-changed=include/ncquad.h");
    println!("cargo:rerun-if-env-changed=CARGO_C_NCQUAD_INSTALL_PREFIX");

    if let Ok(prefix) = env::var("CARGO_C_NCQUAD_INSTALL_PREFIX") {
        let include_path = PathBuf::from(prefix).join("include").join("ncquad_capi");
        fs::create_dir_all(&include_path)?;
        fs::copy("include/ncquad.h", include_path.join("ncquad.h"))?;
    }
    Ok(())
}
