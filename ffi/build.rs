//! Generates `include/bizmap.h` from the `extern "C"` surface.
//!
//! Header generation never fails the build: a parse problem is reported as a
//! cargo warning and the previous header is left in place.

use std::env;
use std::fs;
use std::path::PathBuf;

fn main() {
    println!("cargo:rerun-if-changed=src");
    println!("cargo:rerun-if-changed=cbindgen.toml");

    let crate_dir = match env::var("CARGO_MANIFEST_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(_) => return,
    };
    let include_dir = crate_dir.join("include");
    if let Err(err) = fs::create_dir_all(&include_dir) {
        println!("cargo:warning=cannot create {}: {err}", include_dir.display());
        return;
    }

    let config = cbindgen::Config::from_root_or_default(&crate_dir);
    match cbindgen::Builder::new()
        .with_crate(&crate_dir)
        .with_config(config)
        .generate()
    {
        Ok(bindings) => {
            bindings.write_to_file(include_dir.join("bizmap.h"));
        }
        Err(err) => println!("cargo:warning=bizmap.h not regenerated: {err}"),
    }
}
